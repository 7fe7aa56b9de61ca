// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/detector.rs - 文档检测器
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  crop::{DEFAULT_CROP_MARGIN, crop_image, select_crop},
  model::{DecodeConfig, DecodeError, DetectItem, InferenceBackend, decode, letterbox},
};

const DEFAULT_TARGET_SIZE: u32 = 640;

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("推理后端错误: {0}")]
  Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("输出解码错误: {0}")]
  Decode(#[from] DecodeError),
}

/// letterbox + 推理 + 解码 + 裁剪
///
/// 检测器本身不保存任何跨调用的状态，后端由检测器独占。
pub struct DocumentDetector<B> {
  backend: B,
  target_size: u32,
  decode: DecodeConfig,
  margin: u32,
}

impl<B: InferenceBackend> DocumentDetector<B> {
  pub fn new(backend: B) -> Self {
    Self {
      backend,
      target_size: DEFAULT_TARGET_SIZE,
      decode: DecodeConfig::default(),
      margin: DEFAULT_CROP_MARGIN,
    }
  }

  pub fn with_target_size(mut self, target_size: u32) -> Self {
    self.target_size = target_size;
    self
  }

  pub fn with_decode_config(mut self, decode: DecodeConfig) -> Self {
    self.decode = decode;
    self
  }

  pub fn with_margin(mut self, margin: u32) -> Self {
    self.margin = margin;
    self
  }

  pub fn margin(&self) -> u32 {
    self.margin
  }

  pub fn backend(&self) -> &B {
    &self.backend
  }

  /// 检测图像中的物体，坐标为原图像素坐标
  pub fn run_detection(&self, image: &RgbImage) -> Result<Vec<DetectItem>, DetectError> {
    let letterboxed = letterbox(image, self.target_size);

    let now = std::time::Instant::now();
    let output = self
      .backend
      .infer(&letterboxed.tensor)
      .map_err(|e| DetectError::Backend(Box::new(e)))?;
    debug!("推理完成，耗时: {:.2?}", now.elapsed());

    let items = decode(&output, &letterboxed.info, &self.decode)?;
    debug!("检测到 {} 个物体", items.len());
    Ok(items)
  }

  /// 裁剪出面积最大的检测框；返回 (图像, 是否裁剪)
  ///
  /// 没有检测结果或裁剪区域退化时返回原图的拷贝。
  pub fn crop_document(&self, image: &RgbImage) -> Result<(RgbImage, bool), DetectError> {
    let items = self.run_detection(image)?;
    let (rect, found) = select_crop(&items, image.width(), image.height(), self.margin);

    if !found {
      info!("未检测到文档，返回原图");
      return Ok((image.clone(), false));
    }

    if rect.is_degenerate() {
      info!("裁剪区域无效 {:?}，返回原图", rect);
      return Ok((image.clone(), false));
    }

    info!(
      "裁剪区域: ({}, {}) - ({}, {}), 原图 {}x{}",
      rect.x1,
      rect.y1,
      rect.x2,
      rect.y2,
      image.width(),
      image.height()
    );
    Ok((crop_image(image, &rect), true))
  }
}

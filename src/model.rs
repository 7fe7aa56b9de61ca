// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use serde::Serialize;

use crate::frame::RgbNhwcFrame;

/// 推理后端：固定尺寸的输入帧 -> 原始输出张量
///
/// 后端句柄不可重入，并发调用需要由持有者自行串行化。
pub trait InferenceBackend {
  type Error: std::error::Error + Send + Sync + 'static;

  fn infer(&self, input: &RgbNhwcFrame) -> Result<RawOutput, Self::Error>;
}

/// 单个输出张量，数据按行优先展开
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
  pub shape: Vec<usize>,
  pub data: Vec<f32>,
}

impl OutputTensor {
  pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
    Self { shape, data }
  }
}

/// 后端的全部输出，顺序与模型输出顺序一致
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawOutput {
  pub tensors: Vec<OutputTensor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectItem {
  pub class_id: u32,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]
}

impl DetectItem {
  pub fn width(&self) -> f32 {
    self.bbox[2] - self.bbox[0]
  }

  pub fn height(&self) -> f32 {
    self.bbox[3] - self.bbox[1]
  }

  pub fn area(&self) -> f32 {
    self.width() * self.height()
  }

  pub fn label(&self) -> &'static str {
    coco_label(self.class_id)
  }
}

mod decode;
mod detector;
mod label;
mod letterbox;
#[cfg(feature = "rknpu")]
mod rknn;

pub use self::decode::{
  BOX_ATTRIBUTES, DecodeConfig, DecodeError, NUM_CLASSES, PERSON_CLASS_ID, decode, iou,
  non_max_suppression,
};
pub use self::detector::{DetectError, DocumentDetector};
pub use self::label::{COCO_CLASSES, coco_label};
pub use self::letterbox::{LETTERBOX_FILL, LetterboxInfo, LetterboxResult, letterbox};
#[cfg(feature = "rknpu")]
pub use self::rknn::{RknnBackend, RknnBackendBuilder, RknnBackendError, candidate_count};

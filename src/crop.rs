// 该文件是 Shanan （山南西风） 项目的一部分。
// src/crop.rs - 裁剪区域选择
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use image::{RgbImage, imageops};
use serde::Serialize;

use crate::model::DetectItem;

pub const DEFAULT_CROP_MARGIN: u32 = 10;

/// 原图上的整数裁剪区域，右/下边界不包含
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRect {
  pub x1: u32,
  pub y1: u32,
  pub x2: u32,
  pub y2: u32,
}

impl CropRect {
  pub fn full(width: u32, height: u32) -> Self {
    Self {
      x1: 0,
      y1: 0,
      x2: width,
      y2: height,
    }
  }

  pub fn width(&self) -> u32 {
    self.x2.saturating_sub(self.x1)
  }

  pub fn height(&self) -> u32 {
    self.y2.saturating_sub(self.y1)
  }

  pub fn is_degenerate(&self) -> bool {
    self.x1 >= self.x2 || self.y1 >= self.y2
  }
}

/// 面积最大的检测框，面积相同时取先出现的
pub fn largest_detection(items: &[DetectItem]) -> Option<&DetectItem> {
  let mut best: Option<&DetectItem> = None;
  for item in items {
    match best {
      Some(current) if !(item.area() > current.area()) => {}
      _ => best = Some(item),
    }
  }
  best
}

/// 选择裁剪区域；返回 (区域, 是否找到检测框)
///
/// 没有检测框时返回整幅图像。
pub fn select_crop(
  items: &[DetectItem],
  width: u32,
  height: u32,
  margin: u32,
) -> (CropRect, bool) {
  let Some(best) = largest_detection(items) else {
    return (CropRect::full(width, height), false);
  };

  let margin = margin as i64;
  let (w, h) = (width as i64, height as i64);
  // 与 int() 一致，向零取整
  let [x1, y1, x2, y2] = best.bbox.map(|v| v as i64);

  let rect = CropRect {
    x1: (x1 - margin).clamp(0, w) as u32,
    y1: (y1 - margin).clamp(0, h) as u32,
    x2: (x2 + margin).clamp(0, w) as u32,
    y2: (y2 + margin).clamp(0, h) as u32,
  };
  (rect, true)
}

pub fn crop_image(image: &RgbImage, rect: &CropRect) -> RgbImage {
  imageops::crop_imm(image, rect.x1, rect.y1, rect.width(), rect.height()).to_image()
}

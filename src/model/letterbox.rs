// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/letterbox.rs - Letterbox 预处理
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::borrow::Cow;

use image::{Rgb, RgbImage, imageops};
use tracing::debug;

use crate::frame::RgbNhwcFrame;

/// 填充色，必须与模型训练时的预处理一致
pub const LETTERBOX_FILL: [u8; 3] = [114, 114, 114];

/// 记录 letterbox 变换参数，用于把张量坐标映射回原图
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxInfo {
  pub scale: f32,
  pub pad_x: f32,
  pub pad_y: f32,
  pub orig_width: u32,
  pub orig_height: u32,
}

impl LetterboxInfo {
  /// 先去掉填充，再除以缩放比例
  pub fn unscale_point(&self, x: f32, y: f32) -> (f32, f32) {
    ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
  }

  /// 还原边界框并裁剪到原图范围内
  pub fn unscale_bbox(&self, bbox: [f32; 4]) -> [f32; 4] {
    let (w, h) = (self.orig_width as f32, self.orig_height as f32);
    let (x1, y1) = self.unscale_point(bbox[0], bbox[1]);
    let (x2, y2) = self.unscale_point(bbox[2], bbox[3]);
    [
      x1.clamp(0.0, w),
      y1.clamp(0.0, h),
      x2.clamp(0.0, w),
      y2.clamp(0.0, h),
    ]
  }
}

#[derive(Debug, Clone)]
pub struct LetterboxResult {
  pub tensor: RgbNhwcFrame,
  pub info: LetterboxInfo,
}

/// 等比缩放到 target_size × target_size，剩余部分用灰色填充
pub fn letterbox(image: &RgbImage, target_size: u32) -> LetterboxResult {
  let (orig_width, orig_height) = image.dimensions();
  let target = target_size as f32;

  let scale = (target / orig_height as f32).min(target / orig_width as f32);
  let new_width = ((orig_width as f32 * scale).round_ties_even() as u32).min(target_size);
  let new_height = ((orig_height as f32 * scale).round_ties_even() as u32).min(target_size);

  let resized: Cow<'_, RgbImage> = if (new_width, new_height) == (orig_width, orig_height) {
    Cow::Borrowed(image)
  } else {
    Cow::Owned(imageops::resize(
      image,
      new_width,
      new_height,
      imageops::FilterType::Triangle,
    ))
  };

  let pad_x = (target - new_width as f32) / 2.0;
  let pad_y = (target - new_height as f32) / 2.0;

  // 奇数填充时多出的一个像素落在右侧/下侧
  let left = (pad_x - 0.1).round().max(0.0) as i64;
  let top = (pad_y - 0.1).round().max(0.0) as i64;

  let mut canvas = RgbImage::from_pixel(target_size, target_size, Rgb(LETTERBOX_FILL));
  imageops::replace(&mut canvas, resized.as_ref(), left, top);

  debug!(
    "letterbox: {}x{} -> {}x{}, 缩放 {:.4}, 填充 ({:.1}, {:.1})",
    orig_width, orig_height, new_width, new_height, scale, pad_x, pad_y
  );

  LetterboxResult {
    tensor: RgbNhwcFrame::from(canvas),
    info: LetterboxInfo {
      scale,
      pad_x,
      pad_y,
      orig_width,
      orig_height,
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const GRAY: [u8; 3] = LETTERBOX_FILL;

  fn solid(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb(color))
  }

  #[test]
  fn landscape_image_is_padded_vertically() {
    let result = letterbox(&solid(1280, 960, [200, 10, 10]), 640);
    let info = result.info;

    assert_eq!(result.tensor.width(), 640);
    assert_eq!(result.tensor.height(), 640);
    assert_eq!(info.scale, 0.5);
    assert_eq!(info.pad_x, 0.0);
    assert_eq!(info.pad_y, 80.0);

    assert_eq!(result.tensor.pixel(0, 0), GRAY);
    assert_eq!(result.tensor.pixel(320, 79), GRAY);
    assert_eq!(result.tensor.pixel(320, 80), [200, 10, 10]);
    assert_eq!(result.tensor.pixel(320, 559), [200, 10, 10]);
    assert_eq!(result.tensor.pixel(320, 560), GRAY);
  }

  #[test]
  fn odd_padding_puts_extra_row_at_bottom() {
    // 已经是目标宽度，不需要缩放
    let result = letterbox(&solid(640, 321, [0, 255, 0]), 640);
    assert_eq!(result.info.scale, 1.0);
    assert_eq!(result.info.pad_y, 159.5);

    assert_eq!(result.tensor.pixel(10, 158), GRAY);
    assert_eq!(result.tensor.pixel(10, 159), [0, 255, 0]);
    assert_eq!(result.tensor.pixel(10, 479), [0, 255, 0]);
    assert_eq!(result.tensor.pixel(10, 480), GRAY);
  }

  #[test]
  fn square_image_of_target_size_is_copied_verbatim() {
    let mut image = solid(640, 640, [1, 2, 3]);
    image.put_pixel(17, 33, Rgb([9, 8, 7]));
    let result = letterbox(&image, 640);

    assert_eq!(result.info.scale, 1.0);
    assert_eq!(result.info.pad_x, 0.0);
    assert_eq!(result.info.pad_y, 0.0);
    assert_eq!(result.tensor.pixel(17, 33), [9, 8, 7]);
    assert_eq!(result.tensor.pixel(0, 0), [1, 2, 3]);
  }

  #[test]
  fn small_images_are_scaled_up() {
    let result = letterbox(&solid(100, 50, [50, 60, 70]), 640);
    assert_eq!(result.tensor.width(), 640);
    assert_eq!(result.info.scale, 6.4);
    assert_eq!(result.info.pad_x, 0.0);
    assert_eq!(result.info.pad_y, 160.0);
    assert_eq!(result.tensor.pixel(5, 159), GRAY);
    assert_eq!(result.tensor.pixel(5, 161), [50, 60, 70]);
  }

  #[test]
  fn inverse_transform_maps_content_region_to_original_corners() {
    for &(w, h) in &[(1280, 960), (960, 1280), (333, 777), (1001, 999), (64, 640)] {
      let result = letterbox(&solid(w, h, [0, 0, 0]), 640);
      let info = result.info;
      assert_eq!(result.tensor.width(), 640);
      assert_eq!(result.tensor.height(), 640);

      let content_w = 640.0 - 2.0 * info.pad_x;
      let content_h = 640.0 - 2.0 * info.pad_y;

      let (x0, y0) = info.unscale_point(info.pad_x, info.pad_y);
      assert!(x0.abs() <= 1.0 && y0.abs() <= 1.0, "{w}x{h}: ({x0}, {y0})");

      let (x1, y1) = info.unscale_point(info.pad_x + content_w, info.pad_y + content_h);
      assert!((x1 - w as f32).abs() <= 1.0, "{w}x{h}: x1 = {x1}");
      assert!((y1 - h as f32).abs() <= 1.0, "{w}x{h}: y1 = {y1}");
    }
  }

  #[test]
  fn unscale_bbox_clamps_to_image() {
    let info = LetterboxInfo {
      scale: 0.5,
      pad_x: 0.0,
      pad_y: 80.0,
      orig_width: 1280,
      orig_height: 960,
    };
    // 完全落在上方灰条内
    let bbox = info.unscale_bbox([100.0, 10.0, 200.0, 60.0]);
    assert_eq!(bbox, [200.0, 0.0, 400.0, 0.0]);
    // 超出右下角
    let bbox = info.unscale_bbox([600.0, 500.0, 700.0, 639.0]);
    assert_eq!(bbox, [1200.0, 840.0, 1280.0, 960.0]);
  }
}

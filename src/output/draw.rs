// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::{crop::CropRect, model::DetectItem};

const DETECTION_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const CROP_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const LINE_THICKNESS: i32 = 2;

pub struct Draw {
  detection_color: [u8; 3],
  crop_color: [u8; 3],
  thickness: i32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      detection_color: DETECTION_COLOR,
      crop_color: CROP_COLOR,
      thickness: LINE_THICKNESS,
    }
  }
}

impl Draw {
  // 坐标为原图像素坐标 [x_min, y_min, x_max, y_max]
  fn draw_rect(&self, image: &mut RgbImage, bbox: [f32; 4], color: [u8; 3]) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let x_min = (bbox[0].floor() as i32).clamp(0, w - 1);
    let y_min = (bbox[1].floor() as i32).clamp(0, h - 1);
    let x_max = (bbox[2].ceil() as i32).clamp(0, w - 1);
    let y_max = (bbox[3].ceil() as i32).clamp(0, h - 1);

    // 加粗边框，逐圈向内收缩
    for t in 0..self.thickness {
      let width = x_max - x_min - 2 * t;
      let height = y_max - y_min - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, Rgb(color));
    }
  }

  /// 画出所有检测框，以及最终的裁剪区域（如果有）
  pub fn draw_detections(
    &self,
    image: &RgbImage,
    items: &[DetectItem],
    crop: Option<&CropRect>,
  ) -> RgbImage {
    let mut canvas = image.clone();
    for item in items {
      self.draw_rect(&mut canvas, item.bbox, self.detection_color);
    }
    if let Some(rect) = crop {
      self.draw_rect(
        &mut canvas,
        [rect.x1 as f32, rect.y1 as f32, rect.x2 as f32, rect.y2 as f32],
        self.crop_color,
      );
    }
    canvas
  }
}

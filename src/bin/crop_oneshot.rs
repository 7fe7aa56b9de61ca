// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/crop_oneshot.rs - 单张图片裁剪
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::Result;
use clap::Parser;
use url::Url;

use shanan_cropper::{
  FromUrl,
  input::ImageFileInput,
  model::{DecodeConfig, DocumentDetector, RknnBackendBuilder},
  output::{SaveImageFileOutput, cropped_sibling_path},
  task::{OneShotCropTask, Task},
};
use tracing::info;

/// 检测并裁剪单张图片中的文档
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// RKNN 模型路径
  #[arg(long, env = "CROPPER_MODEL", value_name = "MODEL")]
  pub model: Url,
  /// 输入图片，例如 image:///data/scan.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出图片，默认为输入旁边的 <stem>_cropped.<ext>
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<Url>,
  /// 置信度阈值
  #[arg(long, default_value = "0.1")]
  pub conf: f32,
  /// NMS IOU 阈值
  #[arg(long, default_value = "0.45")]
  pub iou: f32,
  /// 裁剪边距（像素）
  #[arg(long, default_value = "10")]
  pub margin: u32,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);

  let input = ImageFileInput::from_url(&args.input)?;
  let output = match &args.output {
    Some(url) => SaveImageFileOutput::from_url(url)?,
    None => SaveImageFileOutput::new(cropped_sibling_path(input.path())),
  };
  info!("输出路径: {}", output.path().display());

  let backend = RknnBackendBuilder::from_url(&args.model)?.build()?;
  let target_size = backend.input_size();
  let detector = DocumentDetector::new(backend)
    .with_target_size(target_size)
    .with_decode_config(DecodeConfig {
      conf_threshold: args.conf,
      iou_threshold: args.iou,
      ..DecodeConfig::default()
    })
    .with_margin(args.margin);

  let report = OneShotCropTask.run_task(input, &detector, output)?;
  if report.cropped {
    println!(
      "Cropped to {}x{}: {}",
      report.width,
      report.height,
      report.output.display()
    );
  } else {
    println!("No document detected, saved original: {}", report.output.display());
  }

  Ok(())
}

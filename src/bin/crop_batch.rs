// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/crop_batch.rs - 批量裁剪目录中的图片
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use shanan_cropper::{
  FromUrl,
  input::DirectoryInput,
  model::{DecodeConfig, DocumentDetector, RknnBackendBuilder},
  output::DirectoryOutput,
  task::{BatchCropTask, BatchOutcome, Task},
};

/// 批量裁剪目录中的文档图片
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// RKNN 模型路径
  #[arg(long, env = "CROPPER_MODEL", value_name = "MODEL")]
  pub model: Url,
  /// 输入目录，例如 folder:///data/scans?ext=jpg,png
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出目录，缺省时写到输入旁边的 <stem>_cropped.<ext>
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
  info!("输入目录: {}", args.input);

  let input = DirectoryInput::from_url(&args.input)?;
  if input.is_empty() {
    warn!("目录中没有匹配的图片: {}", input.directory().display());
  }
  let output = args
    .output
    .as_ref()
    .map(DirectoryOutput::from_url)
    .transpose()?;

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

  let stop = Arc::new(AtomicBool::new(false));
  let handler_stop = stop.clone();
  ctrlc::set_handler(move || {
    info!("收到中断信号，处理完当前图片后退出...");
    handler_stop.store(true, Ordering::SeqCst);
  })?;

  let summary = BatchCropTask::default()
    .with_stop_flag(stop)
    .run_task(input, &detector, output)?;

  for entry in &summary.entries {
    match &entry.outcome {
      BatchOutcome::Cropped => println!("[cropped]      {}", entry.input.display()),
      BatchOutcome::NoDetection => println!("[no-detection] {}", entry.input.display()),
      BatchOutcome::Failed(reason) => {
        println!("[failed]       {}: {}", entry.input.display(), reason)
      }
    }
  }
  if summary.interrupted {
    println!("Interrupted after {} files", summary.entries.len());
  }
  println!("{}", summary);

  Ok(())
}

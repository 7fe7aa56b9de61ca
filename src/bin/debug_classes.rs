// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/debug_classes.rs - 打印检测到的类别，调试用
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use shanan_cropper::{
  FromUrl,
  crop::select_crop,
  input::ImageFileInput,
  model::{DecodeConfig, DocumentDetector, RknnBackendBuilder},
  output::{Record, SaveImageFileOutput, draw::Draw},
};

/// 打印一张图片上的全部检测结果
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// RKNN 模型路径
  #[arg(long, env = "CROPPER_MODEL", value_name = "MODEL")]
  pub model: Url,
  /// 输入图片
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 标注后的图片输出路径，同时写出同名 .txt 记录
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<Url>,
  /// 置信度阈值
  #[arg(long, default_value = "0.1")]
  pub conf: f32,
  /// NMS IOU 阈值
  #[arg(long, default_value = "0.45")]
  pub iou: f32,
  /// 同时显示 person 类别
  #[arg(long)]
  pub all_classes: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let input = ImageFileInput::from_url(&args.input)?;
  let image = input.image();
  info!(
    "输入图片: {} ({}x{})",
    input.path().display(),
    image.width(),
    image.height()
  );

  let mut decode = DecodeConfig {
    conf_threshold: args.conf,
    iou_threshold: args.iou,
    ..DecodeConfig::default()
  };
  if args.all_classes {
    decode.excluded_classes.clear();
  }

  let backend = RknnBackendBuilder::from_url(&args.model)?.build()?;
  let target_size = backend.input_size();
  let detector = DocumentDetector::new(backend)
    .with_target_size(target_size)
    .with_decode_config(decode);

  let items = detector.run_detection(image)?;
  println!("{} detections:", items.len());
  for (index, item) in items.iter().enumerate() {
    println!(
      "  #{:<3} class {:>2} {:<16} score {:.4}  area {:>10.1}  box [{:.1}, {:.1}, {:.1}, {:.1}]",
      index,
      item.class_id,
      item.label(),
      item.score,
      item.area(),
      item.bbox[0],
      item.bbox[1],
      item.bbox[2],
      item.bbox[3]
    );
  }

  let (rect, found) = select_crop(&items, image.width(), image.height(), detector.margin());
  if found {
    println!(
      "Crop: ({}, {}) - ({}, {}) {}x{}",
      rect.x1,
      rect.y1,
      rect.x2,
      rect.y2,
      rect.width(),
      rect.height()
    );
  } else {
    println!("Crop: none");
  }

  if let Some(url) = &args.output {
    let output = SaveImageFileOutput::from_url(url)?;
    let crop = found.then_some(&rect);
    let annotated = Draw::default().draw_detections(image, &items, crop);
    output.save_image(&annotated)?;
    Record {
      label_with_name: true,
    }
    .record(&items, output.path())?;
    info!("标注结果已保存: {}", output.path().display());
  }

  Ok(())
}

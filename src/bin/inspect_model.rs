// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/inspect_model.rs - 查看模型输出形状
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
  frame::RgbNhwcFrame,
  model::{BOX_ATTRIBUTES, InferenceBackend, NUM_CLASSES, RknnBackendBuilder, candidate_count},
};

/// 用全零输入运行一次推理，打印各输出张量
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// RKNN 模型路径
  #[arg(long, env = "CROPPER_MODEL", value_name = "MODEL")]
  pub model: Url,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  info!("模型文件路径: {}", args.model);

  let backend = RknnBackendBuilder::from_url(&args.model)?.build()?;
  let size = backend.input_size();
  let frame = RgbNhwcFrame::with_shape(size as usize, size as usize);

  let now = std::time::Instant::now();
  let output = backend.infer(&frame)?;
  info!("推理完成，耗时: {:.2?}", now.elapsed());

  println!("Input: 1x{}x{}x3 (NHWC, u8)", size, size);
  println!("Expected candidates: {}", candidate_count(size));
  println!(
    "Outputs: {} (model declares {})",
    output.tensors.len(),
    backend.num_outputs()
  );
  for (index, tensor) in output.tensors.iter().enumerate() {
    println!(
      "  [{}] shape {:?}, {} values",
      index,
      tensor.shape,
      tensor.data.len()
    );
  }

  let detection_attributes = BOX_ATTRIBUTES + NUM_CLASSES;
  match output.tensors.first().map(|t| t.shape.as_slice()) {
    Some([1, attributes, _]) if *attributes >= detection_attributes => {
      println!(
        "Detection head OK: {} attributes ({} extra)",
        attributes,
        attributes - detection_attributes
      );
    }
    _ => println!("Detection head not recognized"),
  }

  Ok(())
}

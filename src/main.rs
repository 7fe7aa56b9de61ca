// 该文件是 Shanan （山南西风） 项目的一部分。
// src/main.rs - 文档裁剪服务主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use url::Url;

use shanan_cropper::{
  FromUrl,
  config::CropperConfig,
  model::{DocumentDetector, RknnBackend, RknnBackendBuilder},
  server::{AppState, ModelState, serve},
};

/// 文档检测与裁剪服务
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// TOML 配置文件
  #[arg(long, env = "CROPPER_CONFIG", value_name = "FILE")]
  pub config: Option<PathBuf>,
  /// RKNN 模型路径，例如 rknn:///opt/models/yolo11n-seg.rknn
  #[arg(long, env = "CROPPER_MODEL", value_name = "MODEL")]
  pub model: Option<Url>,
  /// 监听地址
  #[arg(long, env = "CROPPER_HOST")]
  pub host: Option<String>,
  /// 监听端口
  #[arg(long, env = "CROPPER_PORT")]
  pub port: Option<u16>,
  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub conf: Option<f32>,
  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub iou: Option<f32>,
  /// 裁剪边距（像素）
  #[arg(long)]
  pub margin: Option<u32>,
}

impl Args {
  fn load_config(&self) -> Result<CropperConfig> {
    let mut config = match &self.config {
      Some(path) => CropperConfig::from_file(path)?,
      None => CropperConfig::default(),
    };
    if let Some(model) = &self.model {
      config.server.model = Some(model.to_string());
    }
    if let Some(host) = &self.host {
      config.server.host = host.clone();
    }
    if let Some(port) = self.port {
      config.server.port = port;
    }
    if let Some(conf) = self.conf {
      config.detection.conf_threshold = conf;
    }
    if let Some(iou) = self.iou {
      config.detection.iou_threshold = iou;
    }
    if let Some(margin) = self.margin {
      config.crop.margin = margin;
    }
    config.validate()?;
    Ok(config)
  }
}

fn load_detector(config: &CropperConfig) -> Result<DocumentDetector<RknnBackend>> {
  let model = config
    .server
    .model
    .as_deref()
    .context("未指定模型路径")?;
  let url = Url::parse(model).with_context(|| format!("模型路径无效: {}", model))?;
  let backend = RknnBackendBuilder::from_url(&url)?
    .input_size(config.detection.target_size)
    .build()?;

  Ok(
    DocumentDetector::new(backend)
      .with_target_size(config.detection.target_size)
      .with_decode_config(config.detection.decode_config())
      .with_margin(config.crop.margin),
  )
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let config = args.load_config()?;
  info!("配置: {:?}", config);

  let model = match load_detector(&config) {
    Ok(detector) => {
      info!("模型就绪");
      ModelState::ready(detector)
    }
    Err(e) => {
      error!("模型加载失败，服务以不可用状态启动: {:#}", e);
      ModelState::unavailable(format!("{:#}", e))
    }
  };

  let state = AppState::new(model)
    .with_jpeg_quality(config.crop.jpeg_quality)
    .with_max_upload_mb(config.server.max_upload_mb);

  let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
    .parse()
    .with_context(|| format!("监听地址无效: {}:{}", config.server.host, config.server.port))?;

  serve(addr, state).await?;
  info!("服务已退出");
  Ok(())
}

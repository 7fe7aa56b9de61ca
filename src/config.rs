// 该文件是 Shanan （山南西风） 项目的一部分。
// src/config.rs - 配置文件
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

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::{
  crop::DEFAULT_CROP_MARGIN,
  model::{DecodeConfig, PERSON_CLASS_ID},
  output::DEFAULT_JPEG_QUALITY,
};

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("读取配置文件失败: {0}")]
  Io(#[from] std::io::Error),
  #[error("配置文件格式错误: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("配置无效: {0}")]
  Invalid(String),
}

/// ```toml
/// [detection]
/// target_size = 640
/// conf_threshold = 0.10
/// iou_threshold = 0.45
/// excluded_classes = [0]
///
/// [crop]
/// margin = 10
/// jpeg_quality = 90
///
/// [server]
/// host = "0.0.0.0"
/// port = 3099
/// model = "rknn:///opt/models/yolo11n-seg.rknn"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropperConfig {
  pub detection: DetectionConfig,
  pub crop: CropConfig,
  pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
  pub target_size: u32,
  pub conf_threshold: f32,
  pub iou_threshold: f32,
  pub excluded_classes: Vec<u32>,
}

impl Default for DetectionConfig {
  fn default() -> Self {
    let decode = DecodeConfig::default();
    Self {
      target_size: 640,
      conf_threshold: decode.conf_threshold,
      iou_threshold: decode.iou_threshold,
      excluded_classes: vec![PERSON_CLASS_ID],
    }
  }
}

impl DetectionConfig {
  pub fn decode_config(&self) -> DecodeConfig {
    DecodeConfig {
      conf_threshold: self.conf_threshold,
      iou_threshold: self.iou_threshold,
      excluded_classes: self.excluded_classes.clone(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropConfig {
  pub margin: u32,
  pub jpeg_quality: u8,
}

impl Default for CropConfig {
  fn default() -> Self {
    Self {
      margin: DEFAULT_CROP_MARGIN,
      jpeg_quality: DEFAULT_JPEG_QUALITY,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host: String,
  pub port: u16,
  pub model: Option<String>,
  /// 上传文件大小上限（MB）
  pub max_upload_mb: usize,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host: "0.0.0.0".to_string(),
      port: 3099,
      model: None,
      max_upload_mb: 32,
    }
  }
}

impl CropperConfig {
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    info!("读取配置文件: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    Self::from_toml_str(&text)
  }

  pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
    let config: Self = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    let detection = &self.detection;
    if detection.target_size == 0 {
      return Err(ConfigError::Invalid("target_size 必须大于 0".to_string()));
    }
    if !(0.0..=1.0).contains(&detection.conf_threshold) {
      return Err(ConfigError::Invalid(format!(
        "conf_threshold 必须在 [0, 1] 内, 实际为 {}",
        detection.conf_threshold
      )));
    }
    if !(0.0..=1.0).contains(&detection.iou_threshold) {
      return Err(ConfigError::Invalid(format!(
        "iou_threshold 必须在 [0, 1] 内, 实际为 {}",
        detection.iou_threshold
      )));
    }
    if !(1..=100).contains(&self.crop.jpeg_quality) {
      return Err(ConfigError::Invalid(format!(
        "jpeg_quality 必须在 [1, 100] 内, 实际为 {}",
        self.crop.jpeg_quality
      )));
    }
    if self.server.max_upload_mb == 0 {
      return Err(ConfigError::Invalid("max_upload_mb 必须大于 0".to_string()));
    }
    Ok(())
  }
}

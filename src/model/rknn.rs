// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/rknn.rs - RKNN 推理后端
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use rknpu::{Context, InitFlags, TensorFormat, TensorType};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbNhwcFrame,
  input::AsNhwcFrame,
  model::{InferenceBackend, OutputTensor, RawOutput},
};

const RKNN_NUM_INPUTS: u32 = 1;
const RKNN_MIN_OUTPUTS: u32 = 1;
const RKNN_DEFAULT_SIZE: u32 = 640;
const RKNN_STRIDES: [u32; 3] = [8, 16, 32];

/// 三个检测头的候选框总数，640 输入时为 8400
pub fn candidate_count(size: u32) -> usize {
  RKNN_STRIDES
    .iter()
    .map(|&stride| {
      let side = (size / stride) as usize;
      side * side
    })
    .sum()
}

#[derive(Error, Debug)]
pub enum RknnBackendError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}, 错误: {1}")]
  ModelInvalid(String, rknpu::Error),
  #[error("RKNN 错误: {0}")]
  RknnError(#[from] rknpu::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("输入尺寸不匹配: 期望 {expected}x{expected}, 实际 {width}x{height}")]
  InputSizeMismatch {
    expected: u32,
    width: usize,
    height: usize,
  },
  #[error("读取第 {0} 个输出失败: {1}")]
  OutputError(usize, String),
}

impl RknnBackendError {
  fn invalid(msg: &str, e: rknpu::Error) -> Self {
    RknnBackendError::ModelInvalid(msg.to_string(), e)
  }
}

pub struct RknnBackendBuilder {
  model_path: PathBuf,
  input_size: u32,
}

impl FromUrlWithScheme for RknnBackendBuilder {
  const SCHEME: &'static str = "rknn";
}

impl FromUrl for RknnBackendBuilder {
  type Error = RknnBackendError;

  /// `rknn:///path/model.rknn?size=640`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RknnBackendError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut input_size = RKNN_DEFAULT_SIZE;
    for (key, value) in url.query_pairs() {
      if key == "size" {
        input_size = value.parse().map_err(|_| {
          RknnBackendError::ModelPathError(format!("无效的输入尺寸: {}", value))
        })?;
      }
    }

    Ok(RknnBackendBuilder {
      model_path: crate::url_to_path(url),
      input_size,
    })
  }
}

impl RknnBackendBuilder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      input_size: RKNN_DEFAULT_SIZE,
    }
  }

  pub fn input_size(mut self, size: u32) -> Self {
    self.input_size = size;
    self
  }

  pub fn build(self) -> Result<RknnBackend, RknnBackendError> {
    info!("加载模型文件: {}", self.model_path.display());
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 RKNN 推理上下文");
    let context = Context::new(&model_data, InitFlags::default())?;

    match context.sdk_version() {
      Ok(version) => {
        if let Ok(api_ver) = version.api_version() {
          debug!("模型 API 版本: {}", api_ver);
        }
        if let Ok(drv_ver) = version.driver_version() {
          debug!("模型驱动版本: {}", drv_ver);
        }
      }
      Err(e) => {
        error!("查询 SDK 版本失败: {}", e);
        return Err(RknnBackendError::invalid("无法查询 SDK 版本", e));
      }
    }

    let num_inputs = context
      .num_inputs()
      .map_err(|e| RknnBackendError::invalid("无法获取输入数量", e))?;
    let num_outputs = context
      .num_outputs()
      .map_err(|e| RknnBackendError::invalid("无法获取输出数量", e))?;
    debug!("模型输入数量: {}", num_inputs);
    debug!("模型输出数量: {}", num_outputs);

    if num_inputs != RKNN_NUM_INPUTS {
      let msg = format!(
        "预期模型输入数量为 {}, 实际为 {}",
        RKNN_NUM_INPUTS, num_inputs
      );
      error!("{}", msg);
      return Err(RknnBackendError::invalid(&msg, rknpu::Error::InvalidModel));
    }

    if num_outputs < RKNN_MIN_OUTPUTS {
      let msg = format!(
        "预期模型输出数量至少为 {}, 实际为 {}",
        RKNN_MIN_OUTPUTS, num_outputs
      );
      error!("{}", msg);
      return Err(RknnBackendError::invalid(&msg, rknpu::Error::InvalidModel));
    }

    info!("模型加载完成");
    Ok(RknnBackend {
      context,
      input_size: self.input_size,
      num_outputs: num_outputs as usize,
    })
  }
}

pub struct RknnBackend {
  context: Context,
  input_size: u32,
  num_outputs: usize,
}

impl RknnBackend {
  pub fn input_size(&self) -> u32 {
    self.input_size
  }

  pub fn num_outputs(&self) -> usize {
    self.num_outputs
  }

  // 第一个输出按 (1, A, N) 解释，其余输出（如分割原型）保持一维
  fn output_shape(&self, index: usize, len: usize) -> Vec<usize> {
    let candidates = candidate_count(self.input_size);
    if index == 0 && candidates > 0 && len % candidates == 0 {
      vec![1, len / candidates, candidates]
    } else {
      vec![len]
    }
  }
}

impl InferenceBackend for RknnBackend {
  type Error = RknnBackendError;

  fn infer(&self, input: &RgbNhwcFrame) -> Result<RawOutput, Self::Error> {
    let size = self.input_size as usize;
    if input.width() != size || input.height() != size {
      return Err(RknnBackendError::InputSizeMismatch {
        expected: self.input_size,
        width: input.width(),
        height: input.height(),
      });
    }

    debug!("设置模型输入");
    self
      .context
      .set_input(0, input.as_nhwc(), TensorFormat::NHWC, TensorType::UInt8)?;

    debug!("执行模型推理");
    self.context.run()?;

    debug!("获取模型输出");
    let output = self.context.get_outputs()?;

    let mut tensors = Vec::with_capacity(self.num_outputs);
    for index in 0..self.num_outputs {
      let data = output
        .get_f32(index)
        .map_err(|e| RknnBackendError::OutputError(index, e.to_string()))?
        .to_vec();
      let shape = self.output_shape(index, data.len());
      debug!("输出 {} 形状: {:?}", index, shape);
      tensors.push(OutputTensor::new(shape, data));
    }

    Ok(RawOutput { tensors })
  }
}

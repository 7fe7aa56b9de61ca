// 集成测试共用的推理后端

#![allow(dead_code)]

use std::{collections::VecDeque, sync::Mutex};

use image::{ImageFormat, Rgb, RgbImage};
use shanan_cropper::{
  frame::RgbNhwcFrame,
  model::{InferenceBackend, OutputTensor, RawOutput},
};

/// 检测 + 分割模型的输出通道数：4 + 80 + 32
pub const SEG_ATTRIBUTES: usize = 116;

/// letterbox 坐标系下的一个候选框
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
  pub cx: f32,
  pub cy: f32,
  pub w: f32,
  pub h: f32,
  pub class_id: usize,
  pub score: f32,
}

pub fn candidate(cx: f32, cy: f32, w: f32, h: f32, class_id: usize, score: f32) -> Candidate {
  Candidate {
    cx,
    cy,
    w,
    h,
    class_id,
    score,
  }
}

/// 生成 (1, 116, N) 的输出；N 至少为 1，多余的候选框全为 0
pub fn raw_output(candidates: &[Candidate]) -> RawOutput {
  let n = candidates.len().max(1);
  let mut data = vec![0.0; SEG_ATTRIBUTES * n];
  for (i, c) in candidates.iter().enumerate() {
    data[i] = c.cx;
    data[n + i] = c.cy;
    data[2 * n + i] = c.w;
    data[3 * n + i] = c.h;
    data[(4 + c.class_id) * n + i] = c.score;
    // 掩码系数不参与检测
    data[(84 + i % 32) * n + i] = 7.5;
  }
  RawOutput {
    tensors: vec![
      OutputTensor::new(vec![1, SEG_ATTRIBUTES, n], data),
      OutputTensor::new(vec![1, 32, 4, 4], vec![0.0; 32 * 16]),
    ],
  }
}

#[derive(Debug, thiserror::Error)]
#[error("scripted backend: {0}")]
pub struct ScriptError(pub String);

/// 按顺序返回预先准备好的输出；用完后重复最后一个
pub struct ScriptedBackend {
  outputs: Mutex<VecDeque<RawOutput>>,
  last: Mutex<Option<RawOutput>>,
  calls: Mutex<Vec<(usize, usize)>>,
}

impl ScriptedBackend {
  pub fn new(outputs: Vec<RawOutput>) -> Self {
    Self {
      outputs: Mutex::new(outputs.into()),
      last: Mutex::new(None),
      calls: Mutex::new(Vec::new()),
    }
  }

  pub fn always(candidates: &[Candidate]) -> Self {
    Self::new(vec![raw_output(candidates)])
  }

  /// 每次调用时输入帧的 (宽, 高)
  pub fn calls(&self) -> Vec<(usize, usize)> {
    self.calls.lock().unwrap().clone()
  }
}

impl InferenceBackend for ScriptedBackend {
  type Error = ScriptError;

  fn infer(&self, input: &RgbNhwcFrame) -> Result<RawOutput, Self::Error> {
    self
      .calls
      .lock()
      .unwrap()
      .push((input.width(), input.height()));

    let mut last = self.last.lock().unwrap();
    if let Some(next) = self.outputs.lock().unwrap().pop_front() {
      *last = Some(next);
    }
    last
      .clone()
      .ok_or_else(|| ScriptError("no scripted output".to_string()))
  }
}

pub struct FailingBackend;

impl InferenceBackend for FailingBackend {
  type Error = ScriptError;

  fn infer(&self, _input: &RgbNhwcFrame) -> Result<RawOutput, Self::Error> {
    Err(ScriptError("npu fault".to_string()))
  }
}

pub fn solid_image(width: u32, height: u32) -> RgbImage {
  RgbImage::from_fn(width, height, |x, y| {
    Rgb([(x % 251) as u8, (y % 241) as u8, 128])
  })
}

pub fn png_bytes(image: &RgbImage) -> Vec<u8> {
  let mut buf = std::io::Cursor::new(Vec::new());
  image.write_to(&mut buf, ImageFormat::Png).unwrap();
  buf.into_inner()
}

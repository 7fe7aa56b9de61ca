// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/decode.rs - 检测输出解码
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use thiserror::Error;
use tracing::{debug, error};

use crate::model::{DetectItem, LetterboxInfo, OutputTensor, RawOutput};

pub const BOX_ATTRIBUTES: usize = 4;
pub const NUM_CLASSES: usize = 80;
pub const PERSON_CLASS_ID: u32 = 0;

const DEFAULT_CONF_THRESHOLD: f32 = 0.10;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

#[derive(Debug, Clone, PartialEq)]
pub struct DecodeConfig {
  /// 分数必须严格大于该阈值
  pub conf_threshold: f32,
  /// NMS 中 IoU 超过该值的框被抑制
  pub iou_threshold: f32,
  /// 直接丢弃的类别，默认只有 person
  pub excluded_classes: Vec<u32>,
}

impl Default for DecodeConfig {
  fn default() -> Self {
    Self {
      conf_threshold: DEFAULT_CONF_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      excluded_classes: vec![PERSON_CLASS_ID],
    }
  }
}

#[derive(Error, Debug, PartialEq)]
pub enum DecodeError {
  #[error("模型没有输出张量")]
  MissingOutput,
  #[error("输出张量形状错误: 期望 (1, >= {expected}, N), 实际 {shape:?}")]
  UnexpectedShape { shape: Vec<usize>, expected: usize },
  #[error("输出张量数据长度不匹配: 形状 {shape:?} 需要 {expected}, 实际 {actual}")]
  LengthMismatch {
    shape: Vec<usize>,
    expected: usize,
    actual: usize,
  },
}

/// 把 (1, A, N) 的输出按 (N, A) 读取
struct PredictionView<'a> {
  data: &'a [f32],
  num_candidates: usize,
}

impl<'a> TryFrom<&'a OutputTensor> for PredictionView<'a> {
  type Error = DecodeError;

  fn try_from(tensor: &'a OutputTensor) -> Result<Self, Self::Error> {
    let expected_attributes = BOX_ATTRIBUTES + NUM_CLASSES;
    let (attributes, num_candidates) = match tensor.shape.as_slice() {
      &[1, attributes, num_candidates] if attributes >= expected_attributes => {
        (attributes, num_candidates)
      }
      _ => {
        return Err(DecodeError::UnexpectedShape {
          shape: tensor.shape.clone(),
          expected: expected_attributes,
        });
      }
    };

    let expected = attributes * num_candidates;
    if tensor.data.len() != expected {
      return Err(DecodeError::LengthMismatch {
        shape: tensor.shape.clone(),
        expected,
        actual: tensor.data.len(),
      });
    }

    Ok(Self {
      data: &tensor.data,
      num_candidates,
    })
  }
}

impl PredictionView<'_> {
  fn attribute(&self, attribute: usize, candidate: usize) -> f32 {
    self.data[attribute * self.num_candidates + candidate]
  }

  /// 返回 (最高分, 类别)，并列时取第一个
  fn best_class(&self, candidate: usize) -> (f32, u32) {
    let mut best_score = self.attribute(BOX_ATTRIBUTES, candidate);
    let mut best_class = 0usize;
    for c in 1..NUM_CLASSES {
      let score = self.attribute(BOX_ATTRIBUTES + c, candidate);
      if score > best_score {
        best_score = score;
        best_class = c;
      }
    }
    (best_score, best_class as u32)
  }

  /// 坐标含非有限值时返回 None；负的宽高按绝对值处理，保证 x1 <= x2, y1 <= y2
  fn bbox_xyxy(&self, candidate: usize) -> Option<[f32; 4]> {
    let cx = self.attribute(0, candidate);
    let cy = self.attribute(1, candidate);
    let w = self.attribute(2, candidate);
    let h = self.attribute(3, candidate);
    if ![cx, cy, w, h].iter().all(|v| v.is_finite()) {
      return None;
    }

    let (ax, bx) = (cx - w / 2.0, cx + w / 2.0);
    let (ay, by) = (cy - h / 2.0, cy + h / 2.0);
    let bbox = [ax.min(bx), ay.min(by), ax.max(bx), ay.max(by)];
    bbox.iter().all(|v| v.is_finite()).then_some(bbox)
  }
}

/// 解码第一个输出张量，返回原图坐标下的检测结果
///
/// 过滤顺序固定：置信度 -> 类别 -> 坐标转换（丢弃非有限坐标）-> NMS -> 还原坐标。
/// 没有候选框通过过滤时返回空列表。
pub fn decode(
  output: &RawOutput,
  info: &LetterboxInfo,
  config: &DecodeConfig,
) -> Result<Vec<DetectItem>, DecodeError> {
  let tensor = output.tensors.first().ok_or_else(|| {
    error!("模型输出为空");
    DecodeError::MissingOutput
  })?;
  let view = PredictionView::try_from(tensor).inspect_err(|e| error!("无法解析模型输出: {}", e))?;

  let mut confident = 0usize;
  let mut invalid = 0usize;
  let mut candidates = Vec::new();
  for i in 0..view.num_candidates {
    let (score, class_id) = view.best_class(i);
    // NaN 也在这里被丢弃
    if !(score > config.conf_threshold) {
      continue;
    }
    confident += 1;

    if config.excluded_classes.contains(&class_id) {
      continue;
    }

    let Some(bbox) = view.bbox_xyxy(i) else {
      invalid += 1;
      continue;
    };
    candidates.push(DetectItem {
      class_id,
      score,
      bbox,
    });
  }

  debug!(
    "候选框 {} 个, 置信度过滤后 {} 个, 类别过滤后 {} 个, 无效坐标 {} 个",
    view.num_candidates,
    confident,
    candidates.len() + invalid,
    invalid
  );

  if candidates.is_empty() {
    return Ok(Vec::new());
  }

  let kept = non_max_suppression(candidates, config.iou_threshold);
  debug!("NMS 后保留 {} 个", kept.len());

  Ok(
    kept
      .into_iter()
      .map(|item| DetectItem {
        bbox: info.unscale_bbox(item.bbox),
        ..item
      })
      .collect(),
  )
}

/// 与类别无关的贪心 NMS，结果按分数降序排列
pub fn non_max_suppression(mut items: Vec<DetectItem>, iou_threshold: f32) -> Vec<DetectItem> {
  // sort_by 是稳定排序，同分时保持输入顺序
  items.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut suppressed = vec![false; items.len()];
  let mut kept = Vec::with_capacity(items.len());

  for i in 0..items.len() {
    if suppressed[i] {
      continue;
    }
    for j in (i + 1)..items.len() {
      if !suppressed[j] && iou(&items[i].bbox, &items[j].bbox) > iou_threshold {
        suppressed[j] = true;
      }
    }
    kept.push(items[i].clone());
  }

  kept
}

/// 计算两个 [x1, y1, x2, y2] 边界框的 IoU
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

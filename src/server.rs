// 该文件是 Shanan （山南西风） 项目的一部分。
// src/server.rs - HTTP 裁剪服务
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  net::SocketAddr,
  sync::{Arc, Mutex, PoisonError},
};

use axum::{
  Json, Router,
  extract::{DefaultBodyLimit, Multipart, State},
  http::{HeaderName, StatusCode, header},
  response::{IntoResponse, Response},
  routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::{
  crop::{CropRect, select_crop},
  input::decode_image_bytes,
  model::{DetectError, DocumentDetector, InferenceBackend},
  output::{DEFAULT_JPEG_QUALITY, encode_jpeg},
};

pub const X_CROP_STATUS: &str = "x-crop-status";
const UPLOAD_FIELD: &str = "file";

#[derive(Error, Debug)]
pub enum ApiError {
  #[error("模型不可用: {0}")]
  Unavailable(String),
  #[error("请求无效: {0}")]
  BadRequest(String),
  #[error("检测失败: {0}")]
  Detect(#[from] DetectError),
  #[error("内部错误: {0}")]
  Internal(String),
}

impl ApiError {
  pub fn status_code(&self) -> StatusCode {
    match self {
      ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Detect(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status_code();
    if status.is_server_error() {
      error!("{}", self);
    } else {
      warn!("{}", self);
    }
    (status, Json(json!({ "detail": self.to_string() }))).into_response()
  }
}

/// 启动时确定的模型状态，之后不再改变
pub enum ModelState<B> {
  Ready(Arc<Mutex<DocumentDetector<B>>>),
  Unavailable(String),
}

impl<B> Clone for ModelState<B> {
  fn clone(&self) -> Self {
    match self {
      ModelState::Ready(detector) => ModelState::Ready(detector.clone()),
      ModelState::Unavailable(reason) => ModelState::Unavailable(reason.clone()),
    }
  }
}

impl<B> ModelState<B> {
  pub fn ready(detector: DocumentDetector<B>) -> Self {
    ModelState::Ready(Arc::new(Mutex::new(detector)))
  }

  pub fn unavailable(reason: impl ToString) -> Self {
    ModelState::Unavailable(reason.to_string())
  }

  pub fn is_ready(&self) -> bool {
    matches!(self, ModelState::Ready(_))
  }

  fn detector(&self) -> Result<Arc<Mutex<DocumentDetector<B>>>, ApiError> {
    match self {
      ModelState::Ready(detector) => Ok(detector.clone()),
      ModelState::Unavailable(reason) => Err(ApiError::Unavailable(reason.clone())),
    }
  }
}

pub struct AppState<B> {
  model: ModelState<B>,
  jpeg_quality: u8,
  max_upload_bytes: usize,
}

impl<B> Clone for AppState<B> {
  fn clone(&self) -> Self {
    Self {
      model: self.model.clone(),
      jpeg_quality: self.jpeg_quality,
      max_upload_bytes: self.max_upload_bytes,
    }
  }
}

impl<B> AppState<B> {
  pub fn new(model: ModelState<B>) -> Self {
    Self {
      model,
      jpeg_quality: DEFAULT_JPEG_QUALITY,
      max_upload_bytes: 32 * 1024 * 1024,
    }
  }

  pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
    self.jpeg_quality = quality;
    self
  }

  pub fn with_max_upload_mb(mut self, mb: usize) -> Self {
    self.max_upload_bytes = mb * 1024 * 1024;
    self
  }
}

pub fn router<B>(state: AppState<B>) -> Router
where
  B: InferenceBackend + Send + 'static,
{
  let body_limit = state.max_upload_bytes;
  Router::new()
    .route("/health", get(health_handler::<B>))
    .route("/api/crop", post(crop_handler::<B>))
    .route("/api/detect", post(detect_handler::<B>))
    .layer(DefaultBodyLimit::max(body_limit))
    .layer(
      CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(X_CROP_STATUS)]),
    )
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

pub async fn serve<B>(addr: SocketAddr, state: AppState<B>) -> Result<(), std::io::Error>
where
  B: InferenceBackend + Send + 'static,
{
  let app = router(state);
  let listener = tokio::net::TcpListener::bind(addr).await?;
  info!("服务监听于 {}", addr);

  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      if let Err(e) = tokio::signal::ctrl_c().await {
        error!("监听中断信号失败: {}", e);
      }
      info!("收到中断信号，准备退出...");
    })
    .await
}

async fn health_handler<B>(State(state): State<AppState<B>>) -> impl IntoResponse {
  match &state.model {
    ModelState::Ready(_) => Json(json!({ "status": "ok", "model": "ready" })),
    ModelState::Unavailable(reason) => Json(json!({
      "status": "degraded",
      "model": "unavailable",
      "detail": reason,
    })),
  }
}

/// 读取上传的 `file` 字段并解码为 RGB 图像
async fn read_upload(mut multipart: Multipart) -> Result<image::RgbImage, ApiError> {
  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| ApiError::BadRequest(e.to_string()))?
  {
    if field.name() != Some(UPLOAD_FIELD) {
      continue;
    }
    let bytes = field
      .bytes()
      .await
      .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if bytes.is_empty() {
      return Err(ApiError::BadRequest("上传文件为空".to_string()));
    }
    return decode_image_bytes(&bytes).map_err(|e| ApiError::BadRequest(e.to_string()));
  }
  Err(ApiError::BadRequest(format!(
    "缺少 multipart 字段 '{}'",
    UPLOAD_FIELD
  )))
}

/// 在阻塞线程池上串行使用检测器
async fn with_detector<B, T, F>(model: &ModelState<B>, f: F) -> Result<T, ApiError>
where
  B: InferenceBackend + Send + 'static,
  T: Send + 'static,
  F: FnOnce(&DocumentDetector<B>) -> Result<T, ApiError> + Send + 'static,
{
  let detector = model.detector()?;
  tokio::task::spawn_blocking(move || {
    // 检测器不保存跨调用的状态，上一次请求 panic 后可以继续使用
    let detector = detector.lock().unwrap_or_else(|poisoned| {
      warn!("检测器锁在上一次请求中被污染，继续使用");
      PoisonError::into_inner(poisoned)
    });
    f(&detector)
  })
  .await
  .map_err(|e| ApiError::Internal(e.to_string()))?
}

async fn crop_handler<B>(
  State(state): State<AppState<B>>,
  multipart: Multipart,
) -> Result<Response, ApiError>
where
  B: InferenceBackend + Send + 'static,
{
  // 模型不可用时不读取上传内容
  state.model.detector()?;
  let image = read_upload(multipart).await?;
  let quality = state.jpeg_quality;

  let (bytes, cropped) = with_detector(&state.model, move |detector| {
    let (result, cropped) = detector.crop_document(&image)?;
    let bytes = encode_jpeg(&result, quality).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((bytes, cropped))
  })
  .await?;

  let status = if cropped { "cropped" } else { "no-detection" };
  info!("裁剪请求完成: {}, {} 字节", status, bytes.len());

  Ok(
    (
      [
        (header::CONTENT_TYPE, "image/jpeg"),
        (HeaderName::from_static(X_CROP_STATUS), status),
      ],
      bytes,
    )
      .into_response(),
  )
}

#[derive(Debug, Serialize)]
pub struct DetectionView {
  pub class_id: u32,
  pub class_name: &'static str,
  pub score: f32,
  pub bbox: [f32; 4],
}

#[derive(Debug, Serialize)]
pub struct DetectResponse {
  pub width: u32,
  pub height: u32,
  pub detections: Vec<DetectionView>,
  /// 最终会使用的裁剪区域，没有可用检测时为空
  pub crop: Option<CropRect>,
}

async fn detect_handler<B>(
  State(state): State<AppState<B>>,
  multipart: Multipart,
) -> Result<Json<DetectResponse>, ApiError>
where
  B: InferenceBackend + Send + 'static,
{
  state.model.detector()?;
  let image = read_upload(multipart).await?;

  let response = with_detector(&state.model, move |detector| {
    let (width, height) = image.dimensions();
    let items = detector.run_detection(&image)?;
    let (rect, found) = select_crop(&items, width, height, detector.margin());
    let detections = items
      .iter()
      .map(|item| DetectionView {
        class_id: item.class_id,
        class_name: item.label(),
        score: item.score,
        bbox: item.bbox,
      })
      .collect();
    Ok(DetectResponse {
      width,
      height,
      detections,
      crop: (found && !rect.is_degenerate()).then_some(rect),
    })
  })
  .await?;

  info!("检测请求完成: {} 个物体", response.detections.len());
  Ok(Json(response))
}

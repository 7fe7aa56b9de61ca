// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 裁剪任务
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

use std::{
  fmt,
  path::PathBuf,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

use tracing::{error, info, warn};

use crate::{
  input::{DirectoryInput, ImageFileInput},
  model::{DocumentDetector, InferenceBackend},
  output::{DirectoryOutput, SaveImageFileOutput, cropped_sibling_path},
};

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

/// 单张图片的裁剪结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CropReport {
  pub output: PathBuf,
  pub cropped: bool,
  pub width: u32,
  pub height: u32,
}

pub struct OneShotCropTask;

impl<B: InferenceBackend> Task<ImageFileInput, &DocumentDetector<B>, SaveImageFileOutput>
  for OneShotCropTask
{
  type Output = CropReport;
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: ImageFileInput,
    model: &DocumentDetector<B>,
    output: SaveImageFileOutput,
  ) -> Result<Self::Output, Self::Error> {
    info!("开始任务: {}", input.path().display());
    let now = std::time::Instant::now();
    let (image, cropped) = model.crop_document(input.image())?;
    info!("处理完成，耗时: {:.2?}", now.elapsed());

    output.save_image(&image)?;

    Ok(CropReport {
      output: output.path().to_path_buf(),
      cropped,
      width: image.width(),
      height: image.height(),
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
  Cropped,
  NoDetection,
  Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
  pub input: PathBuf,
  pub output: Option<PathBuf>,
  pub outcome: BatchOutcome,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
  pub entries: Vec<BatchEntry>,
  pub interrupted: bool,
}

impl BatchSummary {
  fn count(&self, pred: impl Fn(&BatchOutcome) -> bool) -> usize {
    self.entries.iter().filter(|e| pred(&e.outcome)).count()
  }

  pub fn cropped(&self) -> usize {
    self.count(|o| matches!(o, BatchOutcome::Cropped))
  }

  pub fn no_detection(&self) -> usize {
    self.count(|o| matches!(o, BatchOutcome::NoDetection))
  }

  pub fn failed(&self) -> usize {
    self.count(|o| matches!(o, BatchOutcome::Failed(_)))
  }
}

impl fmt::Display for BatchSummary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "Batch complete: {} cropped, {} no-detection, {} failed",
      self.cropped(),
      self.no_detection(),
      self.failed()
    )
  }
}

/// 逐张处理目录中的图片
///
/// 没有输出目录时写到输入旁边的 `<stem>_cropped.<ext>`。
/// 单张失败只记录，不中断整个批次。
#[derive(Default, Debug)]
pub struct BatchCropTask {
  stop: Option<Arc<AtomicBool>>,
}

impl BatchCropTask {
  pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
    self.stop = Some(stop);
    self
  }

  fn should_stop(&self) -> bool {
    self
      .stop
      .as_ref()
      .map(|s| s.load(Ordering::SeqCst))
      .unwrap_or(false)
  }
}

impl<B: InferenceBackend> Task<DirectoryInput, &DocumentDetector<B>, Option<DirectoryOutput>>
  for BatchCropTask
{
  type Output = BatchSummary;
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: DirectoryInput,
    model: &DocumentDetector<B>,
    output: Option<DirectoryOutput>,
  ) -> Result<Self::Output, Self::Error> {
    let total = input.len();
    info!("开始批量任务: {} 张图片", total);

    let mut summary = BatchSummary::default();
    for (index, (path, image)) in input.into_iter().enumerate() {
      if self.should_stop() {
        warn!("中断信号接收，退出任务循环");
        summary.interrupted = true;
        break;
      }
      info!("处理第 {}/{} 张图片: {}", index + 1, total, path.display());

      let target = match &output {
        Some(dir) => dir.output_for(&path),
        None => SaveImageFileOutput::new(cropped_sibling_path(&path)),
      };

      let result = image
        .map_err(anyhow::Error::from)
        .and_then(|image| OneShotCropTask.run_task(image, model, target));

      let entry = match result {
        Ok(report) => BatchEntry {
          input: path,
          output: Some(report.output),
          outcome: if report.cropped {
            BatchOutcome::Cropped
          } else {
            BatchOutcome::NoDetection
          },
        },
        Err(e) => {
          error!("处理失败 {}: {:#}", path.display(), e);
          BatchEntry {
            input: path,
            output: None,
            outcome: BatchOutcome::Failed(format!("{:#}", e)),
          }
        }
      };
      summary.entries.push(entry);
    }

    info!("{}", summary);
    Ok(summary)
  }
}

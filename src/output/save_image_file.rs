// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use std::path::{Path, PathBuf};

use image::{RgbImage, codecs::jpeg::JpegEncoder};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 保存到单个图像文件，格式由扩展名决定
#[derive(Debug, Clone)]
pub struct SaveImageFileOutput {
  path: PathBuf,
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileOutput {
      path: crate::url_to_path(uri),
    })
  }
}

impl SaveImageFileOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn save_image(&self, image: &RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(&self.path)?;
    info!("保存图像到文件: {}", self.path.display());

    Ok(())
  }
}

/// 批量输出目录，文件名与输入相同
#[derive(Debug, Clone)]
pub struct DirectoryOutput {
  directory: PathBuf,
}

impl FromUrlWithScheme for DirectoryOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Self::create(crate::url_to_path(uri))
  }
}

impl DirectoryOutput {
  pub fn create(directory: impl Into<PathBuf>) -> Result<Self, SaveImageFileError> {
    let directory = directory.into();
    std::fs::create_dir_all(&directory)?;
    Ok(Self { directory })
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  pub fn output_for(&self, input: &Path) -> SaveImageFileOutput {
    let name = input.file_name().unwrap_or(input.as_os_str());
    SaveImageFileOutput::new(self.directory.join(name))
  }
}

/// 编码为 JPEG 字节流
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, SaveImageFileError> {
  let mut buf = Vec::new();
  JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(image)?;
  Ok(buf)
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn jpeg_bytes_have_soi_marker() {
    let image = RgbImage::from_pixel(16, 8, Rgb([200, 100, 50]));
    let bytes = encode_jpeg(&image, DEFAULT_JPEG_QUALITY).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (16, 8));
  }

  #[test]
  fn saves_into_missing_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out/nested/result.png");
    let url = Url::parse(&format!("image://{}", path.display())).unwrap();

    let output = SaveImageFileOutput::from_url(&url).unwrap();
    output.save_image(&RgbImage::new(3, 3)).unwrap();
    assert!(path.is_file());
  }

  #[test]
  fn directory_output_keeps_file_name() {
    let dir = tempfile::tempdir().unwrap();
    let output = DirectoryOutput::create(dir.path().join("cropped")).unwrap();
    assert!(output.directory().is_dir());

    let target = output.output_for(Path::new("/elsewhere/page-1.jpg"));
    assert_eq!(target.path(), dir.path().join("cropped/page-1.jpg"));
  }

  #[test]
  fn wrong_scheme_is_rejected() {
    let url = Url::parse("folder:///tmp/x.png").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::SchemeMismatch(_))
    ));
  }
}

// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/read_directory.rs - 目录批量输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{ImageFileInput, ImageFileInputError},
};

pub const DEFAULT_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum DirectoryInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("目录不存在: {0}")]
  NotADirectory(PathBuf),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 目录中的图片，按文件名排序逐张读取
///
/// 文件列表在创建时确定，处理过程中新写入的文件不会被读取。
pub struct DirectoryInput {
  directory: PathBuf,
  files: Vec<PathBuf>,
}

impl FromUrlWithScheme for DirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryInput {
  type Error = DirectoryInputError;

  /// `folder:///path/to/dir?ext=jpg,png`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DirectoryInputError::SchemeMismatch);
    }

    let extensions: Vec<String> = url
      .query_pairs()
      .filter(|(k, _)| k == "ext")
      .flat_map(|(_, v)| {
        v.split(',')
          .map(|ext| ext.trim().to_string())
          .filter(|ext| !ext.is_empty())
          .collect::<Vec<_>>()
      })
      .collect();

    if extensions.is_empty() {
      Self::open(crate::url_to_path(url), &DEFAULT_EXTENSIONS)
    } else {
      Self::open(crate::url_to_path(url), extensions.as_slice())
    }
  }
}

impl DirectoryInput {
  pub fn open<S: AsRef<str>>(
    directory: impl AsRef<Path>,
    extensions: &[S],
  ) -> Result<Self, DirectoryInputError> {
    let directory = directory.as_ref().to_path_buf();
    if !directory.is_dir() {
      return Err(DirectoryInputError::NotADirectory(directory));
    }

    let extensions: Vec<String> = extensions
      .iter()
      .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
      .collect();

    let mut files = Vec::new();
    for entry in std::fs::read_dir(&directory)? {
      let path = entry?.path();
      if !path.is_file() {
        continue;
      }
      // 扩展名不区分大小写
      let matched = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.contains(&ext.to_lowercase()))
        .unwrap_or(false);
      if matched {
        files.push(path);
      } else {
        debug!("跳过文件: {}", path.display());
      }
    }
    files.sort();

    info!(
      "目录 {} 中找到 {} 张图片 (扩展名: {})",
      directory.display(),
      files.len(),
      extensions.join(", ")
    );

    Ok(Self { directory, files })
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  pub fn files(&self) -> &[PathBuf] {
    &self.files
  }

  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }
}

impl IntoIterator for DirectoryInput {
  type Item = (PathBuf, Result<ImageFileInput, ImageFileInputError>);
  type IntoIter = DirectoryInputIter;

  fn into_iter(self) -> Self::IntoIter {
    DirectoryInputIter {
      files: self.files.into_iter(),
    }
  }
}

/// 每次只解码一张图片
pub struct DirectoryInputIter {
  files: std::vec::IntoIter<PathBuf>,
}

impl Iterator for DirectoryInputIter {
  type Item = (PathBuf, Result<ImageFileInput, ImageFileInputError>);

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.files.next()?;
    let image = ImageFileInput::open(&path);
    Some((path, image))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  fn touch_image(dir: &Path, name: &str) {
    RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]))
      .save_with_format(dir.join(name), image::ImageFormat::Png)
      .unwrap();
  }

  #[test]
  fn lists_matching_files_case_insensitively() {
    let dir = tempfile::tempdir().unwrap();
    touch_image(dir.path(), "b.PNG");
    touch_image(dir.path(), "a.png");
    touch_image(dir.path(), "c.jpeg");
    std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
    std::fs::create_dir(dir.path().join("nested.png")).unwrap();

    let input = DirectoryInput::open(dir.path(), &DEFAULT_EXTENSIONS).unwrap();
    let names: Vec<_> = input
      .files()
      .iter()
      .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
      .collect();
    assert_eq!(names, vec!["a.png", "b.PNG", "c.jpeg"]);
  }

  #[test]
  fn extensions_come_from_query() {
    let dir = tempfile::tempdir().unwrap();
    touch_image(dir.path(), "a.png");
    touch_image(dir.path(), "b.jpg");

    let url = Url::parse(&format!("folder://{}?ext=.jpg", dir.path().display())).unwrap();
    let input = DirectoryInput::from_url(&url).unwrap();
    assert_eq!(input.len(), 1);
    assert!(input.files()[0].ends_with("b.jpg"));
  }

  #[test]
  fn iterates_and_reports_broken_files() {
    let dir = tempfile::tempdir().unwrap();
    touch_image(dir.path(), "good.png");
    std::fs::write(dir.path().join("bad.png"), b"not a png").unwrap();

    let input = DirectoryInput::open(dir.path(), &["png"]).unwrap();
    let results: Vec<_> = input.into_iter().collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].0.ends_with("bad.png"));
    assert!(results[0].1.is_err());
    assert!(results[1].1.is_ok());
  }

  #[test]
  fn missing_directory_is_an_error() {
    let err = DirectoryInput::open("/definitely/not/here", &["png"]).err().unwrap();
    assert!(matches!(err, DirectoryInputError::NotADirectory(_)));
  }
}

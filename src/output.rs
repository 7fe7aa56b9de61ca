// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output.rs - 输出定义
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

#[cfg(feature = "annotate")]
pub mod draw;
mod record;
mod save_image_file;

pub use self::record::Record;
pub use self::save_image_file::{
  DEFAULT_JPEG_QUALITY, DirectoryOutput, SaveImageFileError, SaveImageFileOutput, encode_jpeg,
};

/// `<stem>_cropped.<ext>`，与输入文件放在同一目录
pub fn cropped_sibling_path(input: &Path) -> PathBuf {
  let stem = input
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_default();
  let name = match input.extension() {
    Some(ext) => format!("{}_cropped.{}", stem, ext.to_string_lossy()),
    None => format!("{}_cropped", stem),
  };
  input.with_file_name(name)
}

// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/record.rs - 检测结果文本记录
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use crate::model::DetectItem;

/// 每行一个检测结果：`类别, 分数, x1, y1, x2, y2`
pub struct Record {
  pub label_with_name: bool,
}

impl Record {
  pub fn format(&self, items: &[DetectItem]) -> String {
    let mut records = Vec::new();
    for item in items {
      let name = if self.label_with_name {
        item.label().to_string()
      } else {
        format!("{}", item.class_id)
      };
      let record = format!(
        "{}, {:.4}, {:.1}, {:.1}, {:.1}, {:.1}",
        name, item.score, item.bbox[0], item.bbox[1], item.bbox[2], item.bbox[3]
      );
      records.push(record);
    }
    records.join("\n")
  }

  /// 写到与 path 同名的 .txt 文件
  pub fn record(&self, items: &[DetectItem], path: &Path) -> Result<(), std::io::Error> {
    std::fs::write(path.with_extension("txt"), self.format(items))
  }
}

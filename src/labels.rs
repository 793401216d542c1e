// 该文件是 Qianli （千里眼） 项目的一部分。
// src/labels.rs - 类别标签表
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Qianli Project Contributors

use std::path::Path;

use tracing::warn;

/// 类别标签表，行号即类别索引。
///
/// 解码器不校验类别索引范围，越界索引在查询时退化为
/// `class_{id}` 形式的占位名。
#[derive(Debug, Clone, Default)]
pub struct Labels {
  names: Vec<String>,
}

impl Labels {
  pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
    Ok(Self::parse(&std::fs::read_to_string(path)?))
  }

  /// 加载标签文件，读不到时退回空表并告警，类别名降级为占位名。
  ///
  /// 缺省标签文件随仓库发布，但部署时未必在工作目录下，
  /// 标签缺失不应当让整条流水线失败。
  pub fn from_file_or_empty(path: &Path) -> Self {
    match std::fs::read_to_string(path) {
      Ok(text) => Self::parse(&text),
      Err(err) => {
        warn!("标签文件 {} 读取失败: {}, 类别名将使用占位名", path.display(), err);
        Labels::default()
      }
    }
  }

  /// 每行一个类别名，保留空行以维持行号与类别索引的对应关系。
  pub fn parse(text: &str) -> Self {
    Labels {
      names: text.lines().map(|line| line.trim_end().to_string()).collect(),
    }
  }

  pub fn name(&self, class_id: u32) -> String {
    match self.names.get(class_id as usize) {
      Some(name) if !name.is_empty() => name.clone(),
      _ => format!("class_{}", class_id),
    }
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn line_number_is_class_index() {
    let labels = Labels::parse("person\nbicycle\ncar\n");
    assert_eq!(labels.len(), 3);
    assert_eq!(labels.name(0), "person");
    assert_eq!(labels.name(2), "car");
  }

  #[test]
  fn out_of_range_ids_get_placeholder_names() {
    let labels = Labels::parse("person\n");
    assert_eq!(labels.name(80), "class_80");
  }

  #[test]
  fn blank_lines_keep_alignment() {
    let labels = Labels::parse("person\n\ncar\n");
    assert_eq!(labels.name(1), "class_1");
    assert_eq!(labels.name(2), "car");
  }

  #[test]
  fn bundled_coco_list_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("labels/coco.txt");
    let labels = Labels::from_file(&path).unwrap();
    assert_eq!(labels.len(), 80);
    assert_eq!(labels.name(0), "person");
    assert_eq!(labels.name(79), "toothbrush");
  }

  #[test]
  fn missing_file_falls_back_to_empty_table() {
    let labels = Labels::from_file_or_empty(Path::new("/nonexistent/qianli-labels.txt"));
    assert!(labels.is_empty());
    assert_eq!(labels.name(0), "class_0");
  }
}

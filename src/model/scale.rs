// 该文件是 Qianli （千里眼） 项目的一部分。
// src/model/scale.rs - 模型空间到源图像空间的缩放
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

use crate::model::geometry::TensorGeometry;

/// 模型输入空间到源图像像素空间的仿射缩放。
///
/// 预处理做的是不保持纵横比的直接缩放，所以 x 与 y 方向的系数
/// 各自独立。若以后改用 letterbox 缩放，只需要改这里。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
  pub x: f32,
  pub y: f32,
}

impl ScaleFactors {
  pub fn new(source_width: u32, source_height: u32, geometry: &TensorGeometry) -> Self {
    Self {
      x: source_width as f32 / geometry.width as f32,
      y: source_height as f32 / geometry.height as f32,
    }
  }

  /// 把模型输入坐标系下的 [x1, y1, x2, y2] 映射回源图像像素。
  pub fn apply(&self, bbox: [f32; 4]) -> [f32; 4] {
    [
      bbox[0] * self.x,
      bbox[1] * self.y,
      bbox[2] * self.x,
      bbox[3] * self.y,
    ]
  }
}

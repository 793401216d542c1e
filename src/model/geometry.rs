// 该文件是 Qianli （千里眼） 项目的一部分。
// src/model/geometry.rs - 输入张量几何解析
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

use thiserror::Error;

/// 模型配置中表示动态维度的哨兵值。
pub const DYNAMIC_DIM: i64 = -1;

#[derive(Error, Debug)]
pub enum GeometryError {
  #[error("模型配置不受支持: {0}")]
  InvalidModelConfig(String),
  #[error("模型输入尺寸为动态，请提供形状覆盖 (如 --input-shape 1,3,640,640)")]
  DynamicShapeRequiresOverride,
}

/// 张量布局：通道维在前（平面）还是在后（交错）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
  PlanarChw,
  InterleavedHwc,
}

impl TensorLayout {
  /// 解析模型配置中的格式标签。缺省或 FORMAT_NONE 视为通道在前。
  pub fn from_format_tag(tag: Option<&str>) -> Result<Self, GeometryError> {
    match tag {
      None | Some("") | Some("FORMAT_NONE") | Some("FORMAT_NCHW") => Ok(TensorLayout::PlanarChw),
      Some("FORMAT_NHWC") => Ok(TensorLayout::InterleavedHwc),
      Some(other) => Err(GeometryError::InvalidModelConfig(format!(
        "未知的输入格式标签: {}",
        other
      ))),
    }
  }
}

/// 每像素的数值编码。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
  Fp32C1,
  Fp32C3,
}

/// 解析完成的模型输入几何。
///
/// 一旦解析完成即不可变，可在多条并发流水线之间共享。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorGeometry {
  pub channels: u32,
  pub height: u32,
  pub width: u32,
  pub layout: TensorLayout,
  pub element: ElementType,
  pub batch: i64,
}

impl TensorGeometry {
  /// 随张量一起发送给推理服务的逻辑形状。
  ///
  /// 布局只影响这里的维度顺序，不影响预处理产出的字节排布。
  pub fn logical_shape(&self) -> Vec<i64> {
    match self.layout {
      TensorLayout::PlanarChw => vec![
        self.batch,
        self.channels as i64,
        self.height as i64,
        self.width as i64,
      ],
      TensorLayout::InterleavedHwc => vec![
        self.batch,
        self.height as i64,
        self.width as i64,
        self.channels as i64,
      ],
    }
  }
}

/// 从模型声明的维度和布局解析输入几何。
///
/// 4 个维度按 [N,C,H,W] 或 [N,H,W,C] 解释，3 个维度表示配置中
/// 不含批维，发送时需要补一个大小为 1 的批维。宽或高为动态哨兵时
/// 必须通过 `override_shape`（按 [N,C,H,W] 排列）给出确定形状。
pub fn resolve(
  dims: &[i64],
  layout: TensorLayout,
  override_shape: Option<&[i64]>,
) -> Result<TensorGeometry, GeometryError> {
  let (batch, channels, height, width) = match (dims.len(), layout) {
    (4, TensorLayout::PlanarChw) => (dims[0], dims[1], dims[2], dims[3]),
    (4, TensorLayout::InterleavedHwc) => (dims[0], dims[3], dims[1], dims[2]),
    (3, TensorLayout::PlanarChw) => (1, dims[0], dims[1], dims[2]),
    (3, TensorLayout::InterleavedHwc) => (1, dims[2], dims[0], dims[1]),
    (n, _) => {
      return Err(GeometryError::InvalidModelConfig(format!(
        "期望 3 或 4 个输入维度, 实际 {} 个",
        n
      )));
    }
  };

  let (batch, channels, height, width) = if height == DYNAMIC_DIM || width == DYNAMIC_DIM {
    let shape = override_shape.ok_or(GeometryError::DynamicShapeRequiresOverride)?;
    if shape.len() != 4 {
      return Err(GeometryError::InvalidModelConfig(format!(
        "形状覆盖需要 4 个维度, 实际 {} 个",
        shape.len()
      )));
    }
    (shape[0], shape[1], shape[2], shape[3])
  } else {
    (batch, channels, height, width)
  };

  if channels != 1 && channels != 3 {
    return Err(GeometryError::InvalidModelConfig(format!(
      "仅支持 1 或 3 个输入通道, 实际 {} 个",
      channels
    )));
  }
  if height <= 0 || width <= 0 {
    return Err(GeometryError::InvalidModelConfig(format!(
      "输入尺寸非法: {}x{}",
      width, height
    )));
  }

  let element = if channels == 1 {
    ElementType::Fp32C1
  } else {
    ElementType::Fp32C3
  };

  Ok(TensorGeometry {
    channels: channels as u32,
    height: height as u32,
    width: width as u32,
    layout,
    element,
    batch: if batch == DYNAMIC_DIM { 1 } else { batch },
  })
}

// 该文件是 Qianli （千里眼） 项目的一部分。
// src/model/yolov10.rs - YOLOv10 预处理与解码
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

use image::Rgb32FImage;
use image::imageops::{self, FilterType};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::client::config::{self, ModelMetadata};
use crate::client::{ClientError, Infer, InferRequest, RawOutput};
use crate::frame::BgrHwcFrame;
use crate::model::geometry::{self, ElementType, GeometryError, TensorGeometry, TensorLayout};
use crate::model::scale::ScaleFactors;
use crate::model::{DetectItem, DetectResult, Model};

/// 置信度阈值缺省值。换别的检测模型族时这是第一个要调的旋钮。
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.1;

// YOLOv10 输出张量每行的字段布局: [x1, y1, x2, y2, score, class]。
// 解码完全依赖这个顺序，换模型族时必须一起换。
const FIELD_X1: usize = 0;
const FIELD_Y1: usize = 1;
const FIELD_X2: usize = 2;
const FIELD_Y2: usize = 3;
const FIELD_SCORE: usize = 4;
const FIELD_CLASS: usize = 5;

const F32_BYTES: usize = 4;

#[derive(Error, Debug)]
pub enum Yolov10Error {
  #[error("通道字节总数不一致: 期望 {expected} 字节, 实际 {actual} 字节")]
  ByteSizeMismatch { expected: usize, actual: usize },
  #[error("推理结果为空，没有输出张量")]
  EmptyOutput,
  #[error("输出张量形状维度不足 3 个: {0:?}")]
  BadOutputShape(Vec<i64>),
  #[error("几何解析错误: {0}")]
  Geometry(GeometryError),
  #[error("客户端错误: {0}")]
  Client(ClientError),
}

impl From<GeometryError> for Yolov10Error {
  fn from(err: GeometryError) -> Self {
    Yolov10Error::Geometry(err)
  }
}

impl From<ClientError> for Yolov10Error {
  fn from(err: ClientError) -> Self {
    Yolov10Error::Client(err)
  }
}

/// 面向远端推理服务的 YOLOv10 检测任务。
///
/// 持有选定的传输方式和解析好的输入几何，几何在构造后不再变化。
pub struct Yolov10<C> {
  client: C,
  model_name: String,
  model_version: String,
  metadata: ModelMetadata,
  geometry: TensorGeometry,
  confidence_threshold: f32,
  detection_output: Option<String>,
}

pub struct Yolov10Builder {
  model_version: String,
  confidence_threshold: f32,
  detection_output: Option<String>,
  input_shape: Option<Vec<i64>>,
}

impl Default for Yolov10Builder {
  fn default() -> Self {
    Self::new()
  }
}

impl Yolov10Builder {
  pub fn new() -> Self {
    Yolov10Builder {
      model_version: String::new(),
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      detection_output: None,
      input_shape: None,
    }
  }

  pub fn model_version(mut self, version: impl Into<String>) -> Self {
    self.model_version = version.into();
    self
  }

  pub fn confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  /// 指定检测输出张量的名称。缺省沿用按位置取第一个输出的行为，
  /// 多输出模型建议显式指定，避免把无关张量当成检测结果解码。
  pub fn detection_output(mut self, name: impl Into<String>) -> Self {
    self.detection_output = Some(name.into());
    self
  }

  /// 模型声明动态输入尺寸时的形状覆盖，按 [N,C,H,W] 排列。
  pub fn input_shape(mut self, shape: Vec<i64>) -> Self {
    self.input_shape = Some(shape);
    self
  }

  pub fn build<C: Infer>(
    self,
    client: C,
    config_url: &Url,
    model_name: &str,
  ) -> Result<Yolov10<C>, Yolov10Error> {
    info!("获取模型 {} 的配置", model_name);
    let metadata = config::fetch_model_config(config_url, model_name)?;

    let layout = TensorLayout::from_format_tag(metadata.format.as_deref())?;
    let geometry = geometry::resolve(&metadata.dims, layout, self.input_shape.as_deref())?;
    info!(
      "模型输入: {} ({}), 几何 {}x{}x{}, 最大批大小 {}",
      metadata.input_name,
      metadata.datatype,
      geometry.channels,
      geometry.height,
      geometry.width,
      metadata.max_batch_size
    );
    debug!("模型输出张量: {:?}", metadata.output_names);

    Ok(Yolov10 {
      client,
      model_name: model_name.to_string(),
      model_version: self.model_version,
      metadata,
      geometry,
      confidence_threshold: self.confidence_threshold,
      detection_output: self.detection_output,
    })
  }
}

impl<C> Yolov10<C> {
  pub fn geometry(&self) -> &TensorGeometry {
    &self.geometry
  }

  /// 把 BGR 源帧编码成模型期望的平面 fp32 字节缓冲。
  ///
  /// 步骤顺序是固定契约：换成 RGB、转浮点、直接缩放（不做
  /// letterbox）、除以 255、按平面打包。无论模型声明哪种布局，
  /// 字节排布都是通道在前，布局只进逻辑形状头。
  pub fn preprocess(&self, frame: &BgrHwcFrame) -> Result<Vec<u8>, Yolov10Error> {
    let (width, height) = (frame.width(), frame.height());

    // BGR -> RGB，顺带转成浮点。颜色顺序错了不会报错，
    // 只会得到看似合理而实际错误的检测结果。
    let mut rgb = Rgb32FImage::new(width, height);
    for y in 0..height {
      for x in 0..width {
        let [b, g, r] = frame.pixel(x, y);
        rgb.put_pixel(x, y, image::Rgb([r as f32, g as f32, b as f32]));
      }
    }

    // 双线性直接缩放到模型输入尺寸，纵横比交给 ScaleFactors 补偿
    let resized = imageops::resize(
      &rgb,
      self.geometry.width,
      self.geometry.height,
      FilterType::Triangle,
    );

    let plane = self.geometry.width as usize * self.geometry.height as usize;
    let expected = plane * self.geometry.channels as usize * F32_BYTES;
    let mut buffer = Vec::with_capacity(expected);

    match self.geometry.element {
      ElementType::Fp32C3 => {
        for channel in 0..3 {
          for pixel in resized.pixels() {
            buffer.extend_from_slice(&(pixel[channel] / 255.0).to_le_bytes());
          }
        }
      }
      ElementType::Fp32C1 => {
        // 单通道模型取 BT.601 亮度
        for pixel in resized.pixels() {
          let luma = 0.299 * pixel[0] + 0.587 * pixel[1] + 0.114 * pixel[2];
          buffer.extend_from_slice(&(luma / 255.0).to_le_bytes());
        }
      }
    }

    if buffer.len() != expected {
      return Err(Yolov10Error::ByteSizeMismatch {
        expected,
        actual: buffer.len(),
      });
    }

    Ok(buffer)
  }

  /// 把推理服务返回的原始张量解码为源图像坐标下的检测结果。
  ///
  /// 行数取形状的第二维，行宽取第三维；缓冲比形状声明的短时
  /// 直接丢弃尾部行，不视为错误（有的后端会合法地截断或填充）。
  pub fn postprocess(
    &self,
    source_size: (u32, u32),
    outputs: &[RawOutput],
  ) -> Result<DetectResult, Yolov10Error> {
    let tensor = match &self.detection_output {
      Some(name) => outputs
        .iter()
        .find(|output| &output.name == name)
        .ok_or_else(|| Yolov10Error::Client(ClientError::MissingOutput(name.clone())))?,
      None => {
        if outputs.len() > 1 {
          warn!(
            "推理返回 {} 个输出张量且未指定名称，按位置取第一个: {}",
            outputs.len(),
            outputs[0].name
          );
        }
        outputs.first().ok_or(Yolov10Error::EmptyOutput)?
      }
    };

    if tensor.shape.len() < 3 {
      return Err(Yolov10Error::BadOutputShape(tensor.shape.clone()));
    }
    let rows = tensor.shape[1].max(0) as usize;
    let fields = tensor.shape[2].max(0) as usize;

    let scale = ScaleFactors::new(source_size.0, source_size.1, &self.geometry);
    let mut items = Vec::new();

    for row in 0..rows {
      let base = row * fields;
      if base + FIELD_SCORE >= tensor.data.len() {
        break;
      }

      let score = tensor.data[base + FIELD_SCORE];
      if score < self.confidence_threshold {
        continue;
      }

      let Some(&class_raw) = tensor.data.get(base + FIELD_CLASS) else {
        break;
      };

      items.push(DetectItem {
        class_id: class_raw as u32,
        score,
        bbox: scale.apply([
          tensor.data[base + FIELD_X1],
          tensor.data[base + FIELD_Y1],
          tensor.data[base + FIELD_X2],
          tensor.data[base + FIELD_Y2],
        ]),
      });
    }

    debug!("检测到 {} 个目标", items.len());

    Ok(DetectResult {
      items: items.into_boxed_slice(),
    })
  }
}

impl<C: Infer> Model for Yolov10<C> {
  type Input = BgrHwcFrame;
  type Output = DetectResult;
  type Error = Yolov10Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("预处理输入帧 {}x{}", input.width(), input.height());
    let buffer = self.preprocess(input)?;

    let shape = self.geometry.logical_shape();
    let request = InferRequest {
      model_name: &self.model_name,
      model_version: &self.model_version,
      input_name: &self.metadata.input_name,
      datatype: &self.metadata.datatype,
      shape: &shape,
      raw_input: &buffer,
      output_names: &self.metadata.output_names,
    };

    debug!("提交推理请求");
    let outputs = self.client.infer(&request)?;

    self.postprocess((input.width(), input.height()), &outputs)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::geometry::resolve;

  fn detector(model_width: i64, model_height: i64, channels: i64) -> Yolov10<()> {
    let geometry = resolve(
      &[1, channels, model_height, model_width],
      TensorLayout::PlanarChw,
      None,
    )
    .unwrap();

    Yolov10 {
      client: (),
      model_name: "yolov10m".to_string(),
      model_version: String::new(),
      metadata: ModelMetadata {
        input_name: "images".to_string(),
        datatype: "FP32".to_string(),
        format: None,
        dims: vec![1, channels, model_height, model_width],
        max_batch_size: 0,
        output_names: vec!["output0".to_string()],
      },
      geometry,
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      detection_output: None,
    }
  }

  fn solid_frame(width: u32, height: u32, bgr: [u8; 3]) -> BgrHwcFrame {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for _ in 0..(width * height) {
      data.extend_from_slice(&bgr);
    }
    BgrHwcFrame::new(data, width, height)
  }

  fn output(shape: Vec<i64>, data: Vec<f32>) -> RawOutput {
    RawOutput {
      name: "output0".to_string(),
      shape,
      data,
    }
  }

  fn read_f32(buffer: &[u8], index: usize) -> f32 {
    let base = index * 4;
    f32::from_le_bytes([
      buffer[base],
      buffer[base + 1],
      buffer[base + 2],
      buffer[base + 3],
    ])
  }

  #[test]
  fn preprocess_output_length_is_exact() {
    let task = detector(4, 4, 3);
    let buffer = task.preprocess(&solid_frame(19, 11, [0, 0, 0])).unwrap();
    assert_eq!(buffer.len(), 3 * 4 * 4 * 4);

    let task = detector(8, 2, 1);
    let buffer = task.preprocess(&solid_frame(5, 5, [128, 128, 128])).unwrap();
    assert_eq!(buffer.len(), 8 * 2 * 4);
  }

  #[test]
  fn preprocess_swaps_bgr_to_rgb_planes() {
    // 纯蓝帧：BGR 的 B=255。平面打包后 R、G 平面应当全 0，B 平面全 1。
    let task = detector(2, 2, 3);
    let buffer = task.preprocess(&solid_frame(2, 2, [255, 0, 0])).unwrap();

    let plane = 2 * 2;
    for index in 0..plane {
      assert_eq!(read_f32(&buffer, index), 0.0); // R 平面
      assert_eq!(read_f32(&buffer, plane + index), 0.0); // G 平面
      assert_eq!(read_f32(&buffer, 2 * plane + index), 1.0); // B 平面
    }
  }

  #[test]
  fn preprocess_normalizes_to_unit_range() {
    let task = detector(2, 2, 3);
    let buffer = task.preprocess(&solid_frame(4, 4, [51, 102, 204])).unwrap();

    let plane = 2 * 2;
    assert!((read_f32(&buffer, 0) - 0.8).abs() < 1e-5); // R = 204/255
    assert!((read_f32(&buffer, plane) - 0.4).abs() < 1e-5); // G = 102/255
    assert!((read_f32(&buffer, 2 * plane) - 0.2).abs() < 1e-5); // B = 51/255
  }

  #[test]
  fn preprocess_is_deterministic() {
    let task = detector(4, 4, 3);
    let frame = solid_frame(7, 9, [13, 57, 211]);
    assert_eq!(task.preprocess(&frame).unwrap(), task.preprocess(&frame).unwrap());
  }

  #[test]
  fn postprocess_filters_by_confidence() {
    let task = detector(100, 100, 3);
    let outputs = [output(
      vec![1, 2, 6],
      vec![
        10.0, 10.0, 50.0, 50.0, 0.9, 2.0, //
        0.0, 0.0, 0.0, 0.0, 0.05, 1.0,
      ],
    )];

    let result = task.postprocess((100, 100), &outputs).unwrap();
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].bbox, [10.0, 10.0, 50.0, 50.0]);
    assert_eq!(result.items[0].class_id, 2);
    assert_eq!(result.items[0].score, 0.9);
  }

  #[test]
  fn postprocess_rescales_to_source_pixels() {
    let task = detector(50, 50, 3);
    let outputs = [output(vec![1, 1, 6], vec![10.0, 10.0, 50.0, 50.0, 0.9, 2.0])];

    let result = task.postprocess((100, 100), &outputs).unwrap();
    assert_eq!(result.items[0].bbox, [20.0, 20.0, 100.0, 100.0]);
  }

  #[test]
  fn postprocess_tolerates_truncated_buffers() {
    let task = detector(100, 100, 3);
    // 形状声明 4 行，缓冲只装得下 2 行，尾部应当被安静地丢弃
    let outputs = [output(
      vec![1, 4, 6],
      vec![
        10.0, 10.0, 50.0, 50.0, 0.9, 2.0, //
        5.0, 5.0, 20.0, 20.0, 0.8, 1.0,
      ],
    )];

    let result = task.postprocess((100, 100), &outputs).unwrap();
    assert_eq!(result.items.len(), 2);
  }

  #[test]
  fn postprocess_rejects_empty_output_sets() {
    let task = detector(100, 100, 3);
    assert!(matches!(
      task.postprocess((100, 100), &[]),
      Err(Yolov10Error::EmptyOutput)
    ));
  }

  #[test]
  fn postprocess_selects_output_by_name() {
    let mut task = detector(100, 100, 3);
    task.detection_output = Some("detections".to_string());

    let mut named = output(vec![1, 1, 6], vec![10.0, 10.0, 50.0, 50.0, 0.9, 7.0]);
    named.name = "detections".to_string();
    let decoy = output(vec![1, 1, 6], vec![1.0, 1.0, 2.0, 2.0, 0.99, 0.0]);

    let result = task.postprocess((100, 100), &[decoy, named]).unwrap();
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].class_id, 7);
  }

  #[test]
  fn postprocess_truncates_class_id() {
    let task = detector(100, 100, 3);
    let outputs = [output(vec![1, 1, 6], vec![1.0, 1.0, 2.0, 2.0, 0.5, 3.9])];

    let result = task.postprocess((100, 100), &outputs).unwrap();
    assert_eq!(result.items[0].class_id, 3);
  }

  #[test]
  fn postprocess_rejects_flat_shapes() {
    let task = detector(100, 100, 3);
    let outputs = [output(vec![1, 6], vec![1.0; 6])];
    assert!(matches!(
      task.postprocess((100, 100), &outputs),
      Err(Yolov10Error::BadOutputShape(_))
    ));
  }
}

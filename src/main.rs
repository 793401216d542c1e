// 该文件是 Qianli （千里眼） 项目的一部分。
// src/main.rs - 项目主程序
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use qianli::{
  FromUrl,
  client::{TritonTransport, default_config_url},
  input::ImageFileInput,
  labels::Labels,
  model::{DEFAULT_CONFIDENCE_THRESHOLD, Yolov10Builder},
  output::{SaveImageFileOutput, draw::Draw},
  task::{OneShotTask, Task},
};

/// Qianli 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 推理服务器地址 (http://host:8000 或 grpc://host:8001)
  #[arg(long, value_name = "SERVER")]
  pub server: Url,

  /// 模型配置端点地址，缺省为 http://<server_host>:8000
  #[arg(long, value_name = "CONFIG")]
  pub config: Option<Url>,

  /// 模型名称
  #[arg(long, value_name = "MODEL", default_value = "yolov10m")]
  pub model: String,

  /// 模型版本，空字符串表示服务端的最新版本
  #[arg(long, value_name = "VERSION", default_value = "")]
  pub model_version: String,

  /// 输入图像 (image:///path/to/input.jpg)
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出图像 (image:///path/to/output.jpg)
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// 动态输入尺寸的形状覆盖，按 N,C,H,W 排列，如 1,3,640,640
  #[arg(long, value_name = "SHAPE", value_delimiter = ',')]
  pub input_shape: Option<Vec<i64>>,

  /// 检测输出张量名称，缺省取第一个输出
  #[arg(long, value_name = "NAME")]
  pub detection_output: Option<String>,

  /// 标签文件路径，每行一个类别名
  #[arg(long, value_name = "FILE", default_value = "labels/coco.txt")]
  pub labels: PathBuf,

  /// 标签字体文件 (ttf/otf)，缺省只画边框不写文字
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("推理服务器: {}", args.server);
  info!("模型名称: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let transport = TritonTransport::from_url(&args.server)?;
  let config_url = match &args.config {
    Some(url) => url.clone(),
    None => default_config_url(&args.server)?,
  };

  let mut builder = Yolov10Builder::new()
    .model_version(&args.model_version)
    .confidence_threshold(args.confidence);
  if let Some(shape) = args.input_shape {
    builder = builder.input_shape(shape);
  }
  if let Some(name) = args.detection_output {
    builder = builder.detection_output(name);
  }
  let detector = builder.build(transport, &config_url, &args.model)?;

  let input = ImageFileInput::from_url(&args.input)?;

  let labels = Labels::from_file_or_empty(&args.labels);
  let draw = match &args.font {
    Some(path) => Draw::with_font_file(path)?,
    None => Draw::default(),
  };
  let output = SaveImageFileOutput::from_url(&args.output)?
    .with_draw(draw)
    .with_labels(labels);

  OneShotTask.run_task(input, detector, output)?;

  Ok(())
}

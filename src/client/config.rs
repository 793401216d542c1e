// 该文件是 Qianli （千里眼） 项目的一部分。
// src/client/config.rs - 模型配置获取与解析
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

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::client::ClientError;

const DATATYPE_PREFIX: &str = "TYPE_";

#[derive(Debug, Deserialize)]
struct ConfigInput {
  name: String,
  data_type: String,
  #[serde(default)]
  format: Option<String>,
  dims: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct ConfigOutput {
  name: String,
}

#[derive(Debug, Deserialize)]
struct ConfigJson {
  input: Vec<ConfigInput>,
  #[serde(default)]
  output: Vec<ConfigOutput>,
  #[serde(default)]
  max_batch_size: i64,
}

/// 推理服务配置端点返回的模型元数据。
///
/// 布局标签和维度保持原样，几何解析交给 `model::geometry`。
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMetadata {
  pub input_name: String,
  /// 已去掉 `TYPE_` 前缀的数据类型字符串，如 `FP32`。
  pub datatype: String,
  pub format: Option<String>,
  pub dims: Vec<i64>,
  pub max_batch_size: i64,
  pub output_names: Vec<String>,
}

/// 从配置端点获取并解析模型元数据。
///
/// Triton 对未知模型返回带说明文字的错误体，这里单独识别出来，
/// 给调用方一个可操作的错误。
pub fn fetch_model_config(config_url: &Url, model_name: &str) -> Result<ModelMetadata, ClientError> {
  let endpoint = config_url
    .join(&format!("v2/models/{}/config", model_name))
    .map_err(|e| ClientError::InvalidAddress(e.to_string()))?;
  debug!("获取模型配置: {}", endpoint);

  let response = match ureq::get(endpoint.as_str()).call() {
    Ok(response) => response,
    Err(ureq::Error::Status(code, response)) => {
      let body = response.into_string().unwrap_or_default();
      if body.contains("Request for unknown model") {
        return Err(ClientError::UnknownModel(model_name.to_string()));
      }
      return Err(ClientError::ConfigParse(format!(
        "服务器返回状态 {}: {}",
        code, body
      )));
    }
    Err(err) => return Err(ClientError::ConfigFetch(Box::new(err))),
  };

  let config: ConfigJson = response
    .into_json()
    .map_err(|e| ClientError::ConfigParse(e.to_string()))?;

  parse_metadata(config)
}

fn parse_metadata(config: ConfigJson) -> Result<ModelMetadata, ClientError> {
  let input = config
    .input
    .into_iter()
    .next()
    .ok_or_else(|| ClientError::ConfigParse("模型配置缺少输入描述".to_string()))?;

  let datatype = input
    .data_type
    .strip_prefix(DATATYPE_PREFIX)
    .unwrap_or(&input.data_type)
    .to_string();

  let metadata = ModelMetadata {
    input_name: input.name,
    datatype,
    format: input.format,
    dims: input.dims,
    max_batch_size: config.max_batch_size,
    output_names: config.output.into_iter().map(|o| o.name).collect(),
  };
  debug!("模型元数据: {:?}", metadata);

  Ok(metadata)
}

#[cfg(test)]
mod tests {
  use super::*;

  const SAMPLE_CONFIG: &str = r#"{
    "name": "yolov10m",
    "platform": "onnxruntime_onnx",
    "max_batch_size": 0,
    "input": [
      {
        "name": "images",
        "data_type": "TYPE_FP32",
        "format": "FORMAT_NONE",
        "dims": [1, 3, 640, 640]
      }
    ],
    "output": [
      {
        "name": "output0",
        "data_type": "TYPE_FP32",
        "dims": [1, 300, 6]
      }
    ]
  }"#;

  #[test]
  fn parses_triton_config_json() {
    let config: ConfigJson = serde_json::from_str(SAMPLE_CONFIG).unwrap();
    let metadata = parse_metadata(config).unwrap();

    assert_eq!(metadata.input_name, "images");
    assert_eq!(metadata.datatype, "FP32");
    assert_eq!(metadata.format.as_deref(), Some("FORMAT_NONE"));
    assert_eq!(metadata.dims, vec![1, 3, 640, 640]);
    assert_eq!(metadata.max_batch_size, 0);
    assert_eq!(metadata.output_names, vec!["output0".to_string()]);
  }

  #[test]
  fn missing_format_is_accepted() {
    let config: ConfigJson = serde_json::from_str(
      r#"{"input": [{"name": "x", "data_type": "TYPE_FP32", "dims": [3, 416, 416]}]}"#,
    )
    .unwrap();
    let metadata = parse_metadata(config).unwrap();

    assert_eq!(metadata.format, None);
    assert!(metadata.output_names.is_empty());
  }

  #[test]
  fn empty_input_list_fails() {
    let config: ConfigJson = serde_json::from_str(r#"{"input": []}"#).unwrap();
    assert!(matches!(
      parse_metadata(config),
      Err(ClientError::ConfigParse(_))
    ));
  }
}

// 该文件是 Qianli （千里眼） 项目的一部分。
// src/client/http.rs - HTTP 推理传输
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

use std::io::Read;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::client::{ClientError, Infer, InferRequest, RawOutput, f32_from_le_bytes};

/// KServe v2 二进制张量扩展使用的长度头。
const INFERENCE_HEADER_LENGTH: &str = "Inference-Header-Content-Length";

/// 基于 KServe v2 REST 协议的推理传输。
///
/// 输入输出都走二进制张量扩展：请求体是 JSON 头加原始字节，
/// 响应体同样由长度头切分。
pub struct HttpTransport {
  base: Url,
}

impl HttpTransport {
  pub fn new(url: &Url) -> Result<Self, ClientError> {
    if url.host_str().is_none() {
      return Err(ClientError::MissingHost(url.to_string()));
    }

    Ok(HttpTransport { base: url.clone() })
  }

  fn infer_endpoint(&self, request: &InferRequest<'_>) -> Result<Url, ClientError> {
    let path = if request.model_version.is_empty() {
      format!("v2/models/{}/infer", request.model_name)
    } else {
      format!(
        "v2/models/{}/versions/{}/infer",
        request.model_name, request.model_version
      )
    };

    self
      .base
      .join(&path)
      .map_err(|e| ClientError::InvalidAddress(e.to_string()))
  }
}

#[derive(Debug, Deserialize)]
struct ResponseJson {
  outputs: Vec<ResponseOutput>,
}

#[derive(Debug, Deserialize)]
struct ResponseOutput {
  name: String,
  #[serde(default)]
  shape: Vec<i64>,
  /// 未启用二进制扩展时的内联数据。
  #[serde(default)]
  data: Option<Vec<f32>>,
  #[serde(default)]
  parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
  #[serde(default)]
  binary_data_size: Option<usize>,
}

impl Infer for HttpTransport {
  fn infer(&mut self, request: &InferRequest<'_>) -> Result<Vec<RawOutput>, ClientError> {
    let header = serde_json::json!({
      "inputs": [{
        "name": request.input_name,
        "shape": request.shape,
        "datatype": request.datatype,
        "parameters": { "binary_data_size": request.raw_input.len() },
      }],
      "outputs": request
        .output_names
        .iter()
        .map(|name| serde_json::json!({ "name": name, "parameters": { "binary_data": true } }))
        .collect::<Vec<_>>(),
    });
    let mut body =
      serde_json::to_vec(&header).map_err(|e| ClientError::RequestEncode(e.to_string()))?;
    let header_length = body.len();
    body.extend_from_slice(request.raw_input);

    let endpoint = self.infer_endpoint(request)?;
    debug!(
      "提交 HTTP 推理请求: {} (头 {} 字节, 数据 {} 字节)",
      endpoint,
      header_length,
      request.raw_input.len()
    );

    let response = match ureq::post(endpoint.as_str())
      .set(INFERENCE_HEADER_LENGTH, &header_length.to_string())
      .set("Content-Type", "application/octet-stream")
      .send_bytes(&body)
    {
      Ok(response) => response,
      Err(ureq::Error::Status(code, response)) => {
        let text = response.into_string().unwrap_or_default();
        return Err(ClientError::ResponseParse(format!(
          "服务器返回状态 {}: {}",
          code, text
        )));
      }
      Err(err) => return Err(ClientError::Http(Box::new(err))),
    };

    let json_length = response
      .header(INFERENCE_HEADER_LENGTH)
      .and_then(|value| value.parse::<usize>().ok());
    let mut raw = Vec::new();
    response.into_reader().read_to_end(&mut raw)?;

    parse_response(&raw, json_length)
  }
}

/// 按长度头把响应体切成 JSON 部分和二进制部分，再逐个输出取数。
fn parse_response(raw: &[u8], json_length: Option<usize>) -> Result<Vec<RawOutput>, ClientError> {
  let json_length = json_length.unwrap_or(raw.len());
  if json_length > raw.len() {
    return Err(ClientError::ResponseParse(format!(
      "长度头 {} 超过响应体 {} 字节",
      json_length,
      raw.len()
    )));
  }
  let (json_part, binary_part) = raw.split_at(json_length);

  let parsed: ResponseJson =
    serde_json::from_slice(json_part).map_err(|e| ClientError::ResponseParse(e.to_string()))?;

  let mut offset = 0;
  let mut outputs = Vec::with_capacity(parsed.outputs.len());
  for output in parsed.outputs {
    let binary_size = output
      .parameters
      .as_ref()
      .and_then(|parameters| parameters.binary_data_size);

    let data = match (binary_size, output.data) {
      (Some(size), _) => {
        let chunk = binary_part
          .get(offset..offset + size)
          .ok_or_else(|| ClientError::ResponseParse("二进制输出数据不完整".to_string()))?;
        offset += size;
        f32_from_le_bytes(chunk)?
      }
      (None, Some(inline)) => inline,
      (None, None) => return Err(ClientError::MissingOutput(output.name)),
    };

    outputs.push(RawOutput {
      name: output.name,
      shape: output.shape,
      data,
    });
  }

  Ok(outputs)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_binary_extension_response() {
    let json = r#"{"outputs":[{"name":"output0","datatype":"FP32","shape":[1,1,6],"parameters":{"binary_data_size":24}}]}"#;
    let mut raw = json.as_bytes().to_vec();
    for value in [10.0f32, 10.0, 50.0, 50.0, 0.9, 2.0] {
      raw.extend_from_slice(&value.to_le_bytes());
    }

    let outputs = parse_response(&raw, Some(json.len())).unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].name, "output0");
    assert_eq!(outputs[0].shape, vec![1, 1, 6]);
    assert_eq!(outputs[0].data, vec![10.0, 10.0, 50.0, 50.0, 0.9, 2.0]);
  }

  #[test]
  fn parses_inline_json_response() {
    let json = r#"{"outputs":[{"name":"output0","shape":[1,1,2],"data":[0.25,0.75]}]}"#;
    let outputs = parse_response(json.as_bytes(), None).unwrap();
    assert_eq!(outputs[0].data, vec![0.25, 0.75]);
  }

  #[test]
  fn truncated_binary_part_fails() {
    let json = r#"{"outputs":[{"name":"output0","shape":[1,1,2],"parameters":{"binary_data_size":8}}]}"#;
    let mut raw = json.as_bytes().to_vec();
    raw.extend_from_slice(&1.0f32.to_le_bytes());

    assert!(matches!(
      parse_response(&raw, Some(json.len())),
      Err(ClientError::ResponseParse(_))
    ));
  }

  #[test]
  fn oversized_length_header_fails() {
    assert!(parse_response(b"{}", Some(100)).is_err());
  }
}

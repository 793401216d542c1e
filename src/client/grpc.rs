// 该文件是 Qianli （千里眼） 项目的一部分。
// src/client/grpc.rs - gRPC 推理传输
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

use tonic::codegen::http::uri::PathAndQuery;
use tracing::debug;
use url::Url;

use crate::client::{ClientError, Infer, InferRequest, RawOutput, f32_from_le_bytes, pb};

const MODEL_INFER_PATH: &str = "/inference.GRPCInferenceService/ModelInfer";

/// 基于 KServe v2 gRPC 协议的推理传输。
///
/// 对外保持同步接口，内部用自有的 tokio 运行时驱动 tonic 通道，
/// 每张图的流水线仍然是严格顺序的。
pub struct GrpcTransport {
  runtime: tokio::runtime::Runtime,
  grpc: tonic::client::Grpc<tonic::transport::Channel>,
}

impl GrpcTransport {
  pub fn connect(url: &Url) -> Result<Self, ClientError> {
    let host = url
      .host_str()
      .ok_or_else(|| ClientError::MissingHost(url.to_string()))?;
    let endpoint = match url.port() {
      Some(port) => format!("http://{}:{}", host, port),
      None => format!("http://{}", host),
    };

    let runtime = tokio::runtime::Runtime::new()?;
    debug!("建立 gRPC 通道: {}", endpoint);
    let channel = runtime.block_on(async {
      tonic::transport::Channel::from_shared(endpoint.clone())
        .map_err(|e| ClientError::InvalidAddress(e.to_string()))?
        .connect()
        .await
        .map_err(ClientError::from)
    })?;

    Ok(GrpcTransport {
      runtime,
      grpc: tonic::client::Grpc::new(channel),
    })
  }
}

impl Infer for GrpcTransport {
  fn infer(&mut self, request: &InferRequest<'_>) -> Result<Vec<RawOutput>, ClientError> {
    let message = pb::ModelInferRequest {
      model_name: request.model_name.to_string(),
      model_version: request.model_version.to_string(),
      id: String::new(),
      inputs: vec![pb::InferInputTensor {
        name: request.input_name.to_string(),
        datatype: request.datatype.to_string(),
        shape: request.shape.to_vec(),
      }],
      outputs: request
        .output_names
        .iter()
        .map(|name| pb::InferRequestedOutputTensor { name: name.clone() })
        .collect(),
      raw_input_contents: vec![request.raw_input.to_vec()],
    };
    debug!(
      "提交 gRPC 推理请求: 模型 {}, 数据 {} 字节",
      request.model_name,
      request.raw_input.len()
    );

    let runtime = &self.runtime;
    let grpc = &mut self.grpc;
    let response = runtime
      .block_on(async move {
        grpc
          .ready()
          .await
          .map_err(|e| tonic::Status::unknown(format!("服务未就绪: {}", e)))?;
        let codec: tonic::codec::ProstCodec<pb::ModelInferRequest, pb::ModelInferResponse> =
          tonic::codec::ProstCodec::default();
        let path = PathAndQuery::from_static(MODEL_INFER_PATH);
        grpc.unary(tonic::Request::new(message), path, codec).await
      })
      .map_err(ClientError::from)?;

    extract_outputs(response.into_inner())
  }
}

/// 优先取原始字节通道的数据，服务端没给时退回类型化内容。
fn extract_outputs(response: pb::ModelInferResponse) -> Result<Vec<RawOutput>, ClientError> {
  let pb::ModelInferResponse {
    outputs: tensors,
    raw_output_contents,
    ..
  } = response;

  let mut outputs = Vec::with_capacity(tensors.len());
  for (index, tensor) in tensors.into_iter().enumerate() {
    let data = match raw_output_contents.get(index) {
      Some(raw) => f32_from_le_bytes(raw)?,
      None => match tensor.contents {
        Some(contents) => contents.fp32_contents,
        None => return Err(ClientError::MissingOutput(tensor.name)),
      },
    };

    outputs.push(RawOutput {
      name: tensor.name,
      shape: tensor.shape,
      data,
    });
  }

  Ok(outputs)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extracts_raw_byte_outputs() {
    let mut raw = Vec::new();
    for value in [1.0f32, 2.0, 3.0] {
      raw.extend_from_slice(&value.to_le_bytes());
    }
    let response = pb::ModelInferResponse {
      outputs: vec![pb::InferOutputTensor {
        name: "output0".to_string(),
        datatype: "FP32".to_string(),
        shape: vec![1, 1, 3],
        contents: None,
      }],
      raw_output_contents: vec![raw],
      ..Default::default()
    };

    let outputs = extract_outputs(response).unwrap();
    assert_eq!(outputs[0].data, vec![1.0, 2.0, 3.0]);
    assert_eq!(outputs[0].shape, vec![1, 1, 3]);
  }

  #[test]
  fn falls_back_to_typed_contents() {
    let response = pb::ModelInferResponse {
      outputs: vec![pb::InferOutputTensor {
        name: "output0".to_string(),
        datatype: "FP32".to_string(),
        shape: vec![1, 2],
        contents: Some(pb::InferTensorContents {
          fp32_contents: vec![0.5, 0.25],
        }),
      }],
      ..Default::default()
    };

    let outputs = extract_outputs(response).unwrap();
    assert_eq!(outputs[0].data, vec![0.5, 0.25]);
  }

  #[test]
  fn output_without_data_fails() {
    let response = pb::ModelInferResponse {
      outputs: vec![pb::InferOutputTensor {
        name: "output0".to_string(),
        datatype: "FP32".to_string(),
        shape: vec![1],
        contents: None,
      }],
      ..Default::default()
    };

    assert!(matches!(
      extract_outputs(response),
      Err(ClientError::MissingOutput(_))
    ));
  }
}

// 该文件是 Qianli （千里眼） 项目的一部分。
// src/client.rs - 推理服务客户端
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
use url::Url;

use crate::FromUrl;

pub mod config;
mod grpc;
mod http;
mod pb;

pub use self::grpc::GrpcTransport;
pub use self::http::HttpTransport;

#[derive(Error, Debug)]
pub enum ClientError {
  #[error("不支持的服务器 URL 方案: {0}")]
  SchemeMismatch(String),
  #[error("服务器 URL 缺少主机名: {0}")]
  MissingHost(String),
  #[error("无效的服务器地址: {0}")]
  InvalidAddress(String),
  #[error("模型 '{0}' 在服务器上不存在，请检查模型名称")]
  UnknownModel(String),
  #[error("模型配置请求失败: {0}")]
  ConfigFetch(Box<ureq::Error>),
  #[error("模型配置解析失败: {0}")]
  ConfigParse(String),
  #[error("推理请求编码失败: {0}")]
  RequestEncode(String),
  #[error("HTTP 推理请求失败: {0}")]
  Http(Box<ureq::Error>),
  #[error("I/O 错误: {0}")]
  IoError(std::io::Error),
  #[error("推理响应解析失败: {0}")]
  ResponseParse(String),
  #[error("gRPC 通道错误: {0}")]
  GrpcTransport(tonic::transport::Error),
  #[error("gRPC 调用失败: {0}")]
  Grpc(tonic::Status),
  #[error("推理结果中缺少输出张量 '{0}' 的数据")]
  MissingOutput(String),
}

impl From<std::io::Error> for ClientError {
  fn from(err: std::io::Error) -> Self {
    ClientError::IoError(err)
  }
}

impl From<tonic::transport::Error> for ClientError {
  fn from(err: tonic::transport::Error) -> Self {
    ClientError::GrpcTransport(err)
  }
}

impl From<tonic::Status> for ClientError {
  fn from(status: tonic::Status) -> Self {
    ClientError::Grpc(status)
  }
}

/// 一次推理调用的全部输入，预处理产出的字节缓冲随形状头一起提交。
#[derive(Debug)]
pub struct InferRequest<'a> {
  pub model_name: &'a str,
  pub model_version: &'a str,
  pub input_name: &'a str,
  pub datatype: &'a str,
  pub shape: &'a [i64],
  pub raw_input: &'a [u8],
  pub output_names: &'a [String],
}

/// 推理服务返回的一个命名输出缓冲。
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
  pub name: String,
  pub shape: Vec<i64>,
  pub data: Vec<f32>,
}

/// 提交推理请求的能力，HTTP 与 gRPC 各实现一份。
pub trait Infer {
  fn infer(&mut self, request: &InferRequest<'_>) -> Result<Vec<RawOutput>, ClientError>;
}

/// 在构造时按 URL 方案选定传输方式，之后不再变更。
pub enum TritonTransport {
  Http(HttpTransport),
  Grpc(GrpcTransport),
}

impl FromUrl for TritonTransport {
  type Error = ClientError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      "http" => Ok(TritonTransport::Http(HttpTransport::new(url)?)),
      "grpc" => Ok(TritonTransport::Grpc(GrpcTransport::connect(url)?)),
      scheme => Err(ClientError::SchemeMismatch(scheme.to_string())),
    }
  }
}

impl Infer for TritonTransport {
  fn infer(&mut self, request: &InferRequest<'_>) -> Result<Vec<RawOutput>, ClientError> {
    match self {
      TritonTransport::Http(transport) => transport.infer(request),
      TritonTransport::Grpc(transport) => transport.infer(request),
    }
  }
}

/// 推理服务器对应的缺省模型配置端点。
///
/// 模型配置固定走 HTTP 端口 8000，即使推理本身走 gRPC。
pub fn default_config_url(server: &Url) -> Result<Url, ClientError> {
  let host = server
    .host_str()
    .ok_or_else(|| ClientError::MissingHost(server.to_string()))?;

  Url::parse(&format!("http://{}:8000/", host))
    .map_err(|e| ClientError::InvalidAddress(e.to_string()))
}

/// 按小端字节序把原始输出缓冲解码为 f32 序列。
pub(crate) fn f32_from_le_bytes(bytes: &[u8]) -> Result<Vec<f32>, ClientError> {
  if bytes.len() % 4 != 0 {
    return Err(ClientError::ResponseParse(format!(
      "输出字节数 {} 不是 4 的倍数",
      bytes.len()
    )));
  }

  Ok(
    bytes
      .chunks_exact(4)
      .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
      .collect(),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decodes_little_endian_f32() {
    let mut bytes = Vec::new();
    for value in [0.5f32, -2.0, 640.0] {
      bytes.extend_from_slice(&value.to_le_bytes());
    }

    assert_eq!(f32_from_le_bytes(&bytes).unwrap(), vec![0.5, -2.0, 640.0]);
  }

  #[test]
  fn rejects_ragged_buffers() {
    assert!(f32_from_le_bytes(&[0u8; 6]).is_err());
  }

  #[test]
  fn config_endpoint_always_uses_http_port() {
    let server = Url::parse("grpc://triton.local:8001").unwrap();
    let config = default_config_url(&server).unwrap();
    assert_eq!(config.as_str(), "http://triton.local:8000/");
  }

  #[test]
  fn config_endpoint_requires_a_host() {
    let server = Url::parse("mailto:ops@example.com").unwrap();
    assert!(matches!(
      default_config_url(&server),
      Err(ClientError::MissingHost(_))
    ));
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("ftp://localhost:8000").unwrap();
    assert!(matches!(
      TritonTransport::from_url(&url),
      Err(ClientError::SchemeMismatch(_))
    ));
  }
}

// 该文件是 Qianli （千里眼） 项目的一部分。
// src/client/pb.rs - KServe v2 gRPC 协议消息
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

//! `ModelInfer` 调用用到的协议消息子集，字段编号与 Triton 的
//! `grpc_service.proto` 一致。未定义的字段在解码时会被跳过，
//! 编码时我们也从不发送它们，所以在线上与完整定义兼容。

/// 张量数据的类型化表示，仅在服务端不走原始字节通道时出现。
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InferTensorContents {
  #[prost(float, repeated, tag = "6")]
  pub fp32_contents: ::prost::alloc::vec::Vec<f32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InferInputTensor {
  #[prost(string, tag = "1")]
  pub name: ::prost::alloc::string::String,
  #[prost(string, tag = "2")]
  pub datatype: ::prost::alloc::string::String,
  #[prost(int64, repeated, tag = "3")]
  pub shape: ::prost::alloc::vec::Vec<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InferRequestedOutputTensor {
  #[prost(string, tag = "1")]
  pub name: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelInferRequest {
  #[prost(string, tag = "1")]
  pub model_name: ::prost::alloc::string::String,
  #[prost(string, tag = "2")]
  pub model_version: ::prost::alloc::string::String,
  #[prost(string, tag = "3")]
  pub id: ::prost::alloc::string::String,
  #[prost(message, repeated, tag = "5")]
  pub inputs: ::prost::alloc::vec::Vec<InferInputTensor>,
  #[prost(message, repeated, tag = "6")]
  pub outputs: ::prost::alloc::vec::Vec<InferRequestedOutputTensor>,
  /// 输入张量的原始小端字节，与 `inputs` 一一对应。
  #[prost(bytes = "vec", repeated, tag = "7")]
  pub raw_input_contents: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InferOutputTensor {
  #[prost(string, tag = "1")]
  pub name: ::prost::alloc::string::String,
  #[prost(string, tag = "2")]
  pub datatype: ::prost::alloc::string::String,
  #[prost(int64, repeated, tag = "3")]
  pub shape: ::prost::alloc::vec::Vec<i64>,
  #[prost(message, optional, tag = "5")]
  pub contents: ::core::option::Option<InferTensorContents>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelInferResponse {
  #[prost(string, tag = "1")]
  pub model_name: ::prost::alloc::string::String,
  #[prost(string, tag = "2")]
  pub model_version: ::prost::alloc::string::String,
  #[prost(string, tag = "3")]
  pub id: ::prost::alloc::string::String,
  #[prost(message, repeated, tag = "5")]
  pub outputs: ::prost::alloc::vec::Vec<InferOutputTensor>,
  /// 输出张量的原始小端字节，与 `outputs` 一一对应。
  #[prost(bytes = "vec", repeated, tag = "6")]
  pub raw_output_contents: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
}

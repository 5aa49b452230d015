// 该文件是 Shanan （山南西风） 项目的一部分。
// src/service.rs - 远程检测服务定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::{detection::DetectResponse, selection::ImageFile};

#[cfg(feature = "http_service")]
mod http;
#[cfg(feature = "http_service")]
pub use self::http::{HealthStatus, HttpDetectionService, HttpDetectionServiceError};

#[derive(Error, Debug, Clone)]
pub enum ServiceError {
  #[error("服务返回状态码 {status}")]
  Status { status: u16, error: Option<String> },
  #[error("传输错误: {0}")]
  Transport(String),
  /// 2xx 响应体无法完整解析，`error` 为能够从中取出的错误文本
  #[error("响应解析错误: {reason}")]
  Decode { reason: String, error: Option<String> },
}

/// 远程检测服务，每次调用对应一次检测请求
#[async_trait]
pub trait DetectionService: Send + Sync {
  async fn detect(&self, image: &ImageFile) -> Result<DetectResponse, ServiceError>;
}

#[async_trait]
impl<S: DetectionService + ?Sized> DetectionService for Arc<S> {
  async fn detect(&self, image: &ImageFile) -> Result<DetectResponse, ServiceError> {
    (**self).detect(image).await
  }
}

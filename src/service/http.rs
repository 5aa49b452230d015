// 该文件是 Shanan （山南西风） 项目的一部分。
// src/service/http.rs - 基于 HTTP 的检测服务客户端
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

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl,
  detection::DetectResponse,
  selection::ImageFile,
  service::{DetectionService, ServiceError},
};

const HTTP_SCHEMES: [&str; 2] = ["http", "https"];
const DEFAULT_FIELD: &str = "image";
const HEALTH_PATH: &str = "health";

#[derive(Error, Debug)]
pub enum HttpDetectionServiceError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("无效的超时参数: {0}")]
  InvalidTimeout(String),
  #[error("HTTP 客户端错误: {0}")]
  ClientError(#[from] reqwest::Error),
  #[error("地址错误: {0}")]
  UrlError(#[from] url::ParseError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
  pub status: String,
  #[serde(default)]
  pub model: Option<String>,
}

pub struct HttpDetectionService {
  client: reqwest::Client,
  endpoint: Url,
  field: String,
  timeout: Option<Duration>,
}

impl FromUrl for HttpDetectionService {
  type Error = HttpDetectionServiceError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if !HTTP_SCHEMES.contains(&url.scheme()) {
      error!("检测服务地址必须使用 http 或 https 方案: {}", url);
      return Err(HttpDetectionServiceError::SchemeMismatch(
        url.scheme().to_string(),
      ));
    }

    let mut timeout = None;
    let mut field = DEFAULT_FIELD.to_string();
    let mut passthrough = Vec::new();
    for (k, v) in url.query_pairs() {
      match &*k {
        "timeout" => {
          let secs = v
            .parse::<f64>()
            .ok()
            .filter(|s| s.is_finite() && *s > 0.0)
            .ok_or_else(|| HttpDetectionServiceError::InvalidTimeout(v.to_string()))?;
          timeout = Some(Duration::from_secs_f64(secs));
        }
        "field" => field = v.into_owned(),
        _ => passthrough.push((k.into_owned(), v.into_owned())),
      }
    }

    let mut endpoint = url.clone();
    endpoint.set_query(None);
    if !passthrough.is_empty() {
      endpoint.query_pairs_mut().extend_pairs(passthrough);
    }

    Self::new(endpoint, field, timeout)
  }
}

impl HttpDetectionService {
  pub fn new(
    endpoint: Url,
    field: impl Into<String>,
    timeout: Option<Duration>,
  ) -> Result<Self, HttpDetectionServiceError> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
      builder = builder.timeout(timeout);
    }
    let client = builder.build()?;

    let field = field.into();
    info!(
      "检测服务: {} (字段: {}, 超时: {:?})",
      endpoint, field, timeout
    );
    Ok(Self {
      client,
      endpoint,
      field,
      timeout,
    })
  }

  pub fn endpoint(&self) -> &Url {
    &self.endpoint
  }

  pub fn field(&self) -> &str {
    &self.field
  }

  pub fn timeout(&self) -> Option<Duration> {
    self.timeout
  }

  /// 与检测接口同级的健康检查接口，例如 `/api/detect` 对应 `/api/health`
  pub async fn health(&self) -> Result<HealthStatus, HttpDetectionServiceError> {
    let url = self.health_url()?;
    debug!("健康检查: {}", url);
    let status = self
      .client
      .get(url)
      .send()
      .await?
      .error_for_status()?
      .json::<HealthStatus>()
      .await?;
    Ok(status)
  }

  fn health_url(&self) -> Result<Url, HttpDetectionServiceError> {
    let mut base = self.endpoint.clone();
    base.set_query(None);
    // `/api/detect/` 与 `/api/detect` 指向同一个健康检查接口
    if let Ok(mut segments) = base.path_segments_mut() {
      segments.pop_if_empty();
    }
    Ok(base.join(HEALTH_PATH)?)
  }
}

fn error_field(body: &str) -> Option<String> {
  serde_json::from_str::<serde_json::Value>(body)
    .ok()?
    .get("error")?
    .as_str()
    .map(str::to_string)
}

#[async_trait]
impl DetectionService for HttpDetectionService {
  async fn detect(&self, image: &ImageFile) -> Result<DetectResponse, ServiceError> {
    let part = Part::bytes(image.bytes().to_vec())
      .file_name(image.name().to_string())
      .mime_str(image.mime_type())
      .map_err(|e| ServiceError::Transport(e.to_string()))?;
    let form = Form::new().part(self.field.clone(), part);

    debug!("上传图像 {} 到 {}", image.name(), self.endpoint);
    let response = self
      .client
      .post(self.endpoint.clone())
      .multipart(form)
      .send()
      .await
      .map_err(|e| ServiceError::Transport(e.to_string()))?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| ServiceError::Transport(e.to_string()))?;

    if !status.is_success() {
      return Err(ServiceError::Status {
        status: status.as_u16(),
        error: error_field(&body),
      });
    }

    serde_json::from_str::<DetectResponse>(&body).map_err(|e| ServiceError::Decode {
      reason: e.to_string(),
      error: error_field(&body),
    })
  }
}

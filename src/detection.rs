// 该文件是 Shanan （山南西风） 项目的一部分。
// src/detection.rs - 检测结果与响应解析
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::service::ServiceError;

pub const FALLBACK_ERROR_MESSAGE: &str = "An error occurred during detection";
pub const NO_FILE_SELECTED_MESSAGE: &str = "Please select an image first";

const HIGH_CONFIDENCE: f32 = 0.8;
const MEDIUM_CONFIDENCE: f32 = 0.6;

/// 单个检测目标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  pub class_id: i64,
  pub class_name: String,
  pub confidence: f32,
  pub bbox: [f32; 4], // [x1, y1, x2, y2]，原图像素坐标
}

impl Detection {
  pub fn tier(&self) -> ConfidenceTier {
    confidence_tier(self.confidence)
  }
}

/// 检测服务返回的原始响应体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectResponse {
  #[serde(default)]
  pub success: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub result_image: Option<String>,
  #[serde(default)]
  pub detections: Vec<Detection>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub total_detections: Option<usize>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectError {
  #[error("{}", NO_FILE_SELECTED_MESSAGE)]
  NoFileSelected,
  #[error("{0}")]
  ServiceReportedFailure(String),
  #[error("{0}")]
  TransportFailure(String),
}

impl DetectError {
  pub fn service_reported(message: Option<String>) -> Self {
    DetectError::ServiceReportedFailure(or_fallback(message))
  }

  pub fn transport(message: Option<String>) -> Self {
    DetectError::TransportFailure(or_fallback(message))
  }

  pub fn message(&self) -> String {
    self.to_string()
  }
}

// 空字符串与缺失同等对待
fn or_fallback(message: Option<String>) -> String {
  message
    .filter(|m| !m.trim().is_empty())
    .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string())
}

/// 由原始响应一次性推导出的结果
#[derive(Debug, Clone, PartialEq)]
pub enum DetectOutcome {
  Success {
    result_image: String,
    detections: Vec<Detection>,
  },
  Failure(DetectError),
}

impl DetectOutcome {
  pub fn from_service(result: Result<DetectResponse, ServiceError>) -> Self {
    match result {
      Ok(response) => Self::from(response),
      Err(ServiceError::Status { status, error }) => {
        warn!("检测服务返回错误状态码: {}", status);
        Self::reported_or_transport(error)
      }
      Err(ServiceError::Decode { reason, error }) => {
        warn!("检测响应解析失败: {}", reason);
        Self::reported_or_transport(error)
      }
      Err(err) => {
        warn!("检测请求失败: {}", err);
        DetectOutcome::Failure(DetectError::transport(None))
      }
    }
  }

  // 服务给出了错误文本时优先展示，否则视为传输失败
  fn reported_or_transport(error: Option<String>) -> Self {
    match error.filter(|m| !m.trim().is_empty()) {
      Some(message) => DetectOutcome::Failure(DetectError::ServiceReportedFailure(message)),
      None => DetectOutcome::Failure(DetectError::transport(None)),
    }
  }
}

impl From<DetectResponse> for DetectOutcome {
  fn from(response: DetectResponse) -> Self {
    if !response.success {
      return DetectOutcome::Failure(DetectError::service_reported(response.error));
    }

    let Some(result_image) = response.result_image else {
      warn!("检测服务报告成功，但响应中缺少 result_image");
      return DetectOutcome::Failure(DetectError::transport(None));
    };

    if let Some(total) = response.total_detections
      && total != response.detections.len()
    {
      warn!(
        "total_detections 与检测列表长度不一致: {} != {}",
        total,
        response.detections.len()
      );
    }

    debug!("检测成功，共 {} 个目标", response.detections.len());
    DetectOutcome::Success {
      result_image,
      detections: response.detections,
    }
  }
}

/// 置信度分档，仅用于展示，不做过滤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
  High,
  Medium,
  Low,
}

impl ConfidenceTier {
  pub fn color(&self) -> &'static str {
    match self {
      ConfidenceTier::High => "#4CAF50",
      ConfidenceTier::Medium => "#FF9800",
      ConfidenceTier::Low => "#F44336",
    }
  }
}

/// 半开区间：`[0.8, ∞)` 高，`[0.6, 0.8)` 中，其余（含 NaN）低
pub fn confidence_tier(confidence: f32) -> ConfidenceTier {
  if confidence >= HIGH_CONFIDENCE {
    ConfidenceTier::High
  } else if confidence >= MEDIUM_CONFIDENCE {
    ConfidenceTier::Medium
  } else {
    ConfidenceTier::Low
  }
}

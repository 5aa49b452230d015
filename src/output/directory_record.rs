// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::Render,
  view::{DetectionCard, WorkflowView},
};

const DATA_URI_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64";
const UNKNOWN_EXTENSION: &str = "bin";

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("结果图像解码错误: {0}")]
  DecodeError(#[from] base64::DecodeError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 记录文件中的类别写法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
  Name,
  Id,
}

impl RecordKind {
  fn line(&self, card: &DetectionCard) -> String {
    let label = match self {
      RecordKind::Name => card.class_name.clone(),
      RecordKind::Id => card.class_id.to_string(),
    };
    format!(
      "{}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
      label, card.confidence, card.bbox[0], card.bbox[1], card.bbox[2], card.bbox[3]
    )
  }
}

/// 把检测结果按日期分目录保存：`folder:///dir?record=name|id&always`
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  kind: RecordKind,
  frame_counters: Mutex<u16>,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let kind = uri
      .query_pairs()
      .find(|(k, _)| k == "record")
      .map(|(_, v)| if v == "id" { RecordKind::Id } else { RecordKind::Name })
      .unwrap_or(RecordKind::Name);
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(Self::new(uri.path(), kind, always))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>, kind: RecordKind, always: bool) -> Self {
    Self {
      directory: directory.into(),
      kind,
      frame_counters: Mutex::new(0),
      always,
    }
  }

  fn frame_id(&self) -> u16 {
    let mut counter = self
      .frame_counters
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    *counter = counter.wrapping_add(1);
    *counter
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  /// 保存一次成功的检测结果，返回记录文件路径；未保存时返回 `None`
  pub fn record_view(
    &self,
    view: &WorkflowView,
  ) -> Result<Option<PathBuf>, DirectoryRecordOutputError> {
    let Some(result_image) = view.result_image.as_deref() else {
      debug!("没有检测结果，跳过记录");
      return Ok(None);
    };
    if view.detections.is_empty() && !self.always {
      debug!("检测结果为空，跳过记录");
      return Ok(None);
    }

    let stem = self.frame_path()?;
    match decode_data_uri(result_image)? {
      Some(bytes) => {
        let extension = image::guess_format(&bytes)
          .ok()
          .and_then(|format| format.extensions_str().first().copied())
          .unwrap_or(UNKNOWN_EXTENSION);
        let image_path = stem.with_extension(extension);
        std::fs::write(&image_path, bytes)?;
        info!("保存结果图像: {}", image_path.display());
      }
      None => warn!("结果图像不是 data URI，仅保存检测记录: {}", result_image),
    }

    let record_path = stem.with_extension("txt");
    self.write_record(&view.detections, &record_path)?;
    Ok(Some(record_path))
  }

  fn write_record(
    &self,
    detections: &[DetectionCard],
    path: &Path,
  ) -> Result<(), DirectoryRecordOutputError> {
    let records: Vec<String> = detections.iter().map(|card| self.kind.line(card)).collect();
    std::fs::write(path, records.join("\n"))?;
    Ok(())
  }
}

/// 解析 `data:<mime>;base64,<payload>`，不是 base64 data URI 时返回 `None`
fn decode_data_uri(reference: &str) -> Result<Option<Vec<u8>>, base64::DecodeError> {
  let Some(rest) = reference.strip_prefix(DATA_URI_PREFIX) else {
    return Ok(None);
  };
  let Some((header, payload)) = rest.split_once(',') else {
    return Ok(None);
  };
  if !header.ends_with(BASE64_MARKER) {
    return Ok(None);
  }
  STANDARD.decode(payload.trim()).map(Some)
}

impl Render<WorkflowView> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, view: &WorkflowView) -> Result<(), Self::Error> {
    self.record_view(view)?;
    Ok(())
  }
}

// 该文件是 Shanan （山南西风） 项目的一部分。
// src/view.rs - 工作流的展示视图
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

use std::fmt;

use serde::Serialize;
use url::Url;

use crate::{
  detection::{ConfidenceTier, Detection},
  workflow::{WorkflowInner, WorkflowState},
};

const DETECT_LABEL: &str = "Detect Objects";
const DETECTING_LABEL: &str = "Detecting...";
// data URI 等超长引用在文本视图中截断显示
const RESULT_IMAGE_PREVIEW_CHARS: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
  pub name: String,
  pub size_bytes: usize,
}

impl FileInfo {
  pub fn size_mb(&self) -> String {
    format!("{:.2}", self.size_bytes as f64 / 1024.0 / 1024.0)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ButtonView {
  pub enabled: bool,
  pub label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionCard {
  pub index: usize,
  pub class_id: i64,
  pub class_name: String,
  pub confidence: f32,
  pub tier: ConfidenceTier,
  pub color: &'static str,
  pub bbox: [f32; 4],
}

impl DetectionCard {
  pub fn new(index: usize, detection: &Detection) -> Self {
    let tier = detection.tier();
    Self {
      index,
      class_id: detection.class_id,
      class_name: detection.class_name.clone(),
      confidence: detection.confidence,
      tier,
      color: tier.color(),
      bbox: detection.bbox,
    }
  }

  pub fn percent(&self) -> String {
    format!("{:.1}%", self.confidence * 100.0)
  }

  pub fn bbox_text(&self) -> String {
    let [x1, y1, x2, y2] = self.bbox;
    format!("[{:.1}, {:.1}, {:.1}, {:.1}]", x1, y1, x2, y2)
  }
}

/// 某一时刻可直接渲染的完整页面状态
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowView {
  pub file: Option<FileInfo>,
  pub preview: Option<Url>,
  pub detect_button: ButtonView,
  pub submitting: bool,
  pub error: Option<String>,
  pub result_image: Option<String>,
  pub detections: Vec<DetectionCard>,
}

impl WorkflowView {
  pub(crate) fn from_parts(inner: &WorkflowInner) -> Self {
    let selected = inner.selection.current();
    let submitting = inner.state.is_submitting();

    let (result_image, detections) = match &inner.state {
      WorkflowState::Succeeded {
        result_image,
        detections,
      } => (
        Some(result_image.clone()),
        detections
          .iter()
          .enumerate()
          .map(|(i, d)| DetectionCard::new(i, d))
          .collect(),
      ),
      _ => (None, Vec::new()),
    };

    Self {
      file: selected.map(|s| FileInfo {
        name: s.file().name().to_string(),
        size_bytes: s.file().size(),
      }),
      preview: selected.map(|s| s.preview().url().clone()),
      detect_button: ButtonView {
        enabled: selected.is_some() && !submitting,
        label: if submitting {
          DETECTING_LABEL
        } else {
          DETECT_LABEL
        },
      },
      submitting,
      error: inner.state.error().map(|e| e.message()),
      result_image,
      detections,
    }
  }
}

fn shorten(reference: &str) -> String {
  if reference.chars().count() <= RESULT_IMAGE_PREVIEW_CHARS {
    return reference.to_string();
  }
  let head: String = reference.chars().take(RESULT_IMAGE_PREVIEW_CHARS).collect();
  format!("{}... ({} bytes)", head, reference.len())
}

impl fmt::Display for WorkflowView {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.file {
      Some(file) => {
        writeln!(f, "Selected: {}", file.name)?;
        writeln!(f, "Size: {} MB", file.size_mb())?;
      }
      None => writeln!(f, "No image selected")?,
    }
    if let Some(preview) = &self.preview {
      writeln!(f, "Original Image: {}", preview)?;
    }
    writeln!(
      f,
      "[{}]{}",
      self.detect_button.label,
      if self.detect_button.enabled {
        ""
      } else {
        " (disabled)"
      }
    )?;

    if let Some(error) = &self.error {
      writeln!(f, "Error: {}", error)?;
    }
    if let Some(result_image) = &self.result_image {
      writeln!(f, "Detection Results: {}", shorten(result_image))?;
    }
    if !self.detections.is_empty() {
      writeln!(f, "Detected Objects ({})", self.detections.len())?;
      for card in &self.detections {
        writeln!(
          f,
          "  #{} {} {} [{:?}]  Class ID: {}  Bounding Box: {}",
          card.index + 1,
          card.class_name,
          card.percent(),
          card.tier,
          card.class_id,
          card.bbox_text()
        )?;
      }
    }
    Ok(())
  }
}

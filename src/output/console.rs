// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/console.rs - 控制台输出
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

use std::io::Write;

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, output::Render, view::WorkflowView};

#[derive(Error, Debug)]
pub enum ConsoleOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("未知的输出格式: {0}")]
  UnknownFormat(String),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleFormat {
  #[default]
  Text,
  Json,
}

/// `console:text` 或 `console:json`
#[derive(Debug, Clone, Default)]
pub struct ConsoleOutput {
  format: ConsoleFormat,
}

impl ConsoleOutput {
  pub fn new(format: ConsoleFormat) -> Self {
    Self { format }
  }

  pub fn format(&self) -> ConsoleFormat {
    self.format
  }

  pub fn render_to<W: Write>(
    &self,
    writer: &mut W,
    view: &WorkflowView,
  ) -> Result<(), ConsoleOutputError> {
    match self.format {
      ConsoleFormat::Text => write!(writer, "{}", view)?,
      ConsoleFormat::Json => {
        serde_json::to_writer_pretty(&mut *writer, view)?;
        writeln!(writer)?;
      }
    }
    Ok(())
  }
}

impl FromUrlWithScheme for ConsoleOutput {
  const SCHEME: &'static str = "console";
}

impl FromUrl for ConsoleOutput {
  type Error = ConsoleOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ConsoleOutputError::SchemeMismatch);
    }

    let format = match url.path().trim_matches('/') {
      "" | "text" => ConsoleFormat::Text,
      "json" => ConsoleFormat::Json,
      other => return Err(ConsoleOutputError::UnknownFormat(other.to_string())),
    };
    Ok(Self { format })
  }
}

impl Render<WorkflowView> for ConsoleOutput {
  type Error = ConsoleOutputError;

  fn render_result(&self, view: &WorkflowView) -> Result<(), Self::Error> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    self.render_to(&mut lock, view)
  }
}

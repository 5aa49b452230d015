// 该文件是 Shanan （山南西风） 项目的一部分。
// src/selection.rs - 图像选择与本地预览句柄管理
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

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

const PREVIEW_SCHEME: &str = "preview";
const PREVIEW_HOST: &str = "local";
const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Error, Debug)]
pub enum ImageFileError {
  #[error("URI scheme mismatch: expected '{expected}', found '{found}'")]
  SchemeMismatch { expected: &'static str, found: String },
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum PreviewError {
  #[error("预览地址错误: {0}")]
  UrlError(#[from] url::ParseError),
}

/// 用户选择的图像文件（名称、大小、内容）
///
/// 内容以 `Arc<[u8]>` 共享，克隆不会复制图像数据。
#[derive(Debug, Clone)]
pub struct ImageFile {
  name: String,
  bytes: Arc<[u8]>,
}

impl ImageFile {
  pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
    Self {
      name: name.into(),
      bytes: bytes.into(),
    }
  }

  pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageFileError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let name = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| path.display().to_string());
    debug!("读取图像文件: {} ({} 字节)", name, bytes.len());
    Ok(Self::new(name, bytes))
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn size(&self) -> usize {
    self.bytes.len()
  }

  pub fn bytes(&self) -> &[u8] {
    &self.bytes
  }

  /// 根据文件头猜测 MIME 类型，不做任何校验
  pub fn mime_type(&self) -> &'static str {
    image::guess_format(&self.bytes)
      .map(|format| format.to_mime_type())
      .unwrap_or(OCTET_STREAM)
  }
}

impl FromUrlWithScheme for ImageFile {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFile {
  type Error = ImageFileError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileError::SchemeMismatch {
        expected: Self::SCHEME,
        found: url.scheme().to_string(),
      });
    }

    let path = urlencoding::decode(url.path())
      .map(|p| p.into_owned())
      .unwrap_or_else(|_| url.path().to_string());
    Self::open(path)
  }
}

#[derive(Default, Debug)]
struct PreviewTable {
  next_id: u64,
  live: HashMap<u64, Arc<[u8]>>,
}

/// 本地预览表，登记所有存活的预览句柄
#[derive(Clone, Default, Debug)]
pub struct PreviewStore {
  table: Arc<Mutex<PreviewTable>>,
}

impl PreviewStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn table(&self) -> MutexGuard<'_, PreviewTable> {
    self.table.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn create(&self, file: &ImageFile) -> Result<PreviewHandle, PreviewError> {
    let id = {
      let mut table = self.table();
      table.next_id += 1;
      let id = table.next_id;
      table.live.insert(id, file.bytes.clone());
      id
    };

    // 先登记再构造句柄，地址构造失败时也要撤销登记
    let url = match preview_url(id, file.name()) {
      Ok(url) => url,
      Err(err) => {
        self.release(id);
        return Err(err.into());
      }
    };
    debug!("创建预览句柄: {}", url);
    Ok(PreviewHandle {
      id,
      url,
      store: self.clone(),
    })
  }

  /// 解析预览地址，句柄释放后返回 `None`
  pub fn resolve(&self, url: &Url) -> Option<Arc<[u8]>> {
    if url.scheme() != PREVIEW_SCHEME || url.host_str() != Some(PREVIEW_HOST) {
      return None;
    }
    let id = url
      .path_segments()?
      .next()
      .and_then(|segment| segment.parse::<u64>().ok())?;
    self.table().live.get(&id).cloned()
  }

  pub fn live_count(&self) -> usize {
    self.table().live.len()
  }

  fn release(&self, id: u64) {
    if self.table().live.remove(&id).is_some() {
      debug!("释放预览句柄: {}", id);
    }
  }
}

// preview://local/<id>/<name>，只有编号段参与解析
fn preview_url(id: u64, name: &str) -> Result<Url, url::ParseError> {
  let mut url = Url::parse(&format!("{}://{}/", PREVIEW_SCHEME, PREVIEW_HOST))?;
  if let Ok(mut segments) = url.path_segments_mut() {
    // 逐段编码，名称中的 `/`、`..` 不会影响编号段
    segments.clear().push(&id.to_string()).push(name);
  }
  Ok(url)
}

/// 可撤销的本地预览引用，`Drop` 时释放
#[derive(Debug)]
pub struct PreviewHandle {
  id: u64,
  url: Url,
  store: PreviewStore,
}

impl PreviewHandle {
  pub fn url(&self) -> &Url {
    &self.url
  }
}

impl Drop for PreviewHandle {
  fn drop(&mut self) {
    self.store.release(self.id);
  }
}

#[derive(Debug)]
pub struct SelectedImage {
  file: ImageFile,
  preview: PreviewHandle,
}

impl SelectedImage {
  pub fn file(&self) -> &ImageFile {
    &self.file
  }

  pub fn preview(&self) -> &PreviewHandle {
    &self.preview
  }
}

/// 同一时刻最多持有一个 `SelectedImage`
#[derive(Debug)]
pub struct SelectionManager {
  previews: PreviewStore,
  current: Option<SelectedImage>,
}

impl SelectionManager {
  pub fn new(previews: PreviewStore) -> Self {
    Self {
      previews,
      current: None,
    }
  }

  pub fn select(&mut self, file: ImageFile) -> Result<&SelectedImage, PreviewError> {
    // 先释放旧句柄，再创建新句柄
    drop(self.current.take());
    info!("选择图像: {} ({} 字节)", file.name(), file.size());
    let preview = self.previews.create(&file)?;
    Ok(self.current.insert(SelectedImage { file, preview }))
  }

  /// 清空选择，返回是否确实释放了内容
  pub fn clear(&mut self) -> bool {
    match self.current.take() {
      Some(selected) => {
        info!("清除图像选择: {}", selected.file.name());
        true
      }
      None => false,
    }
  }

  pub fn current(&self) -> Option<&SelectedImage> {
    self.current.as_ref()
  }

  pub fn previews(&self) -> &PreviewStore {
    &self.previews
  }
}

// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/common/mod.rs - 测试公共工具
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

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use shanan_lens::{
  detection::{DetectResponse, Detection},
  selection::ImageFile,
  service::{DetectionService, ServiceError},
};

pub const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// 按脚本依次返回响应的检测服务，可选地阻塞在闸门上
#[derive(Default)]
pub struct MockService {
  responses: Mutex<VecDeque<Result<DetectResponse, ServiceError>>>,
  calls: AtomicUsize,
  uploads: Mutex<Vec<String>>,
  gate: Option<Semaphore>,
}

impl MockService {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond(self, response: Result<DetectResponse, ServiceError>) -> Self {
    self.responses.lock().unwrap().push_back(response);
    self
  }

  pub fn respond_json(self, json: &str) -> Self {
    let response = serde_json::from_str(json).unwrap();
    self.respond(Ok(response))
  }

  pub fn gated(mut self) -> Self {
    self.gate = Some(Semaphore::new(0));
    self
  }

  pub fn release(&self) {
    if let Some(gate) = &self.gate {
      gate.add_permits(1);
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn uploads(&self) -> Vec<String> {
    self.uploads.lock().unwrap().clone()
  }
}

#[async_trait]
impl DetectionService for MockService {
  async fn detect(&self, image: &ImageFile) -> Result<DetectResponse, ServiceError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.uploads.lock().unwrap().push(image.name().to_string());
    if let Some(gate) = &self.gate {
      gate.acquire().await.unwrap().forget();
    }
    self
      .responses
      .lock()
      .unwrap()
      .pop_front()
      .unwrap_or_else(|| Err(ServiceError::Transport("no scripted response".to_string())))
  }
}

pub fn image(name: &str) -> ImageFile {
  ImageFile::new(name, PNG_MAGIC.to_vec())
}

pub fn person() -> Detection {
  Detection {
    class_id: 0,
    class_name: "person".to_string(),
    confidence: 0.92,
    bbox: [1.0, 2.0, 3.0, 4.0],
  }
}

pub fn success(result_image: &str, detections: Vec<Detection>) -> Result<DetectResponse, ServiceError> {
  Ok(DetectResponse {
    success: true,
    result_image: Some(result_image.to_string()),
    detections,
    ..Default::default()
  })
}

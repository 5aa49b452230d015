// 该文件是 Shanan （山南西风） 项目的一部分。
// src/workflow.rs - 上传/检测状态机
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

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::{
  detection::{DetectError, DetectOutcome, Detection},
  selection::{ImageFile, PreviewError, PreviewStore, SelectionManager},
  service::DetectionService,
  view::WorkflowView,
};

/// 工作流状态，同一时刻只有一个
#[derive(Debug, Clone, PartialEq, Default)]
pub enum WorkflowState {
  #[default]
  Idle,
  Submitting,
  Succeeded {
    result_image: String,
    detections: Vec<Detection>,
  },
  Failed(DetectError),
}

impl WorkflowState {
  pub fn is_submitting(&self) -> bool {
    matches!(self, WorkflowState::Submitting)
  }

  pub fn error(&self) -> Option<&DetectError> {
    match self {
      WorkflowState::Failed(err) => Some(err),
      _ => None,
    }
  }
}

impl From<DetectOutcome> for WorkflowState {
  fn from(outcome: DetectOutcome) -> Self {
    match outcome {
      DetectOutcome::Success {
        result_image,
        detections,
      } => WorkflowState::Succeeded {
        result_image,
        detections,
      },
      DetectOutcome::Failure(err) => WorkflowState::Failed(err),
    }
  }
}

/// 一次 `submit` 调用的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
  /// 响应已写入状态
  Completed,
  /// 已有请求在途，本次调用被忽略
  Ignored,
  /// 未选择图像，没有发出请求
  Rejected,
  /// 请求期间用户重新选择或重置，响应被丢弃
  Abandoned,
}

#[derive(Debug)]
pub(crate) struct WorkflowInner {
  pub(crate) selection: SelectionManager,
  pub(crate) state: WorkflowState,
  generation: u64,
}

impl WorkflowInner {
  // 任何使在途请求失效的操作都要推进代数
  fn advance(&mut self) -> u64 {
    self.generation = self.generation.wrapping_add(1);
    self.generation
  }
}

/// 检测工作流控制器
///
/// 句柄可以廉价克隆，多个任务共享同一份状态。锁不会跨越 `.await` 持有，
/// 因此在请求进行中依然可以调用 [`DetectionWorkflow::reset`] 或
/// [`DetectionWorkflow::select_file`]。
pub struct DetectionWorkflow<S> {
  service: Arc<S>,
  inner: Arc<Mutex<WorkflowInner>>,
}

impl<S> Clone for DetectionWorkflow<S> {
  fn clone(&self) -> Self {
    Self {
      service: self.service.clone(),
      inner: self.inner.clone(),
    }
  }
}

impl<S: DetectionService> DetectionWorkflow<S> {
  pub fn new(service: S) -> Self {
    Self::with_previews(Arc::new(service), PreviewStore::new())
  }

  pub fn with_previews(service: Arc<S>, previews: PreviewStore) -> Self {
    Self {
      service,
      inner: Arc::new(Mutex::new(WorkflowInner {
        selection: SelectionManager::new(previews),
        state: WorkflowState::Idle,
        generation: 0,
      })),
    }
  }

  fn lock(&self) -> MutexGuard<'_, WorkflowInner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn service(&self) -> &Arc<S> {
    &self.service
  }

  pub fn state(&self) -> WorkflowState {
    self.lock().state.clone()
  }

  pub fn selected_file(&self) -> Option<ImageFile> {
    self.lock().selection.current().map(|s| s.file().clone())
  }

  pub fn previews(&self) -> PreviewStore {
    self.lock().selection.previews().clone()
  }

  pub fn view(&self) -> WorkflowView {
    WorkflowView::from_parts(&self.lock())
  }

  /// 选择新图像：释放旧预览，清空结果与错误，回到 `Idle`
  pub fn select_file(&self, file: ImageFile) -> Result<(), PreviewError> {
    let mut inner = self.lock();
    if inner.state.is_submitting() {
      warn!("请求进行中选择了新图像，旧请求的响应将被丢弃");
    }
    inner.advance();
    inner.state = WorkflowState::Idle;
    inner.selection.select(file)?;
    Ok(())
  }

  /// 重置全部状态，没有选择时也可以安全调用
  pub fn reset(&self) {
    let mut inner = self.lock();
    if inner.state.is_submitting() {
      warn!("请求进行中执行重置，旧请求的响应将被丢弃");
    }
    inner.advance();
    inner.selection.clear();
    inner.state = WorkflowState::Idle;
    debug!("工作流已重置");
  }

  pub async fn submit(&self) -> Submission {
    let (file, ticket) = {
      let mut inner = self.lock();
      if inner.state.is_submitting() {
        debug!("已有检测请求在途，忽略重复提交");
        return Submission::Ignored;
      }
      let Some(file) = inner.selection.current().map(|s| s.file().clone()) else {
        warn!("未选择图像，拒绝提交");
        inner.state = WorkflowState::Failed(DetectError::NoFileSelected);
        return Submission::Rejected;
      };
      let ticket = inner.advance();
      inner.state = WorkflowState::Submitting;
      (file, ticket)
    };

    info!("提交检测请求: {} ({} 字节)", file.name(), file.size());
    let guard = SubmittingGuard {
      inner: &*self.inner,
      ticket,
      armed: true,
    };
    let now = std::time::Instant::now();
    let outcome = DetectOutcome::from_service(self.service.detect(&file).await);
    info!("检测请求结束，耗时: {:.2?}", now.elapsed());

    guard.complete(outcome)
  }
}

/// 保证 `Submitting` 不会因为 future 被丢弃或服务 panic 而悬空
struct SubmittingGuard<'a> {
  inner: &'a Mutex<WorkflowInner>,
  ticket: u64,
  armed: bool,
}

impl SubmittingGuard<'_> {
  fn complete(mut self, outcome: DetectOutcome) -> Submission {
    self.armed = false;
    let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
    if inner.generation != self.ticket {
      warn!("丢弃过期的检测响应 (请求代数 {})", self.ticket);
      return Submission::Abandoned;
    }
    if let DetectOutcome::Failure(err) = &outcome {
      warn!("检测失败: {}", err);
    }
    inner.state = outcome.into();
    Submission::Completed
  }
}

impl Drop for SubmittingGuard<'_> {
  fn drop(&mut self) {
    if !self.armed {
      return;
    }
    let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
    if inner.generation == self.ticket && inner.state.is_submitting() {
      warn!("检测请求被取消，回到空闲状态");
      inner.state = WorkflowState::Idle;
    }
  }
}

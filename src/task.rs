// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 检测任务
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
use tracing::{info, warn};

use crate::{
  output::Render,
  selection::ImageFile,
  service::DetectionService,
  view::WorkflowView,
  workflow::{DetectionWorkflow, Submission, WorkflowState},
};

// 统计平均耗时时跳过的预热次数
const WARMUP_ROUNDS: usize = 2;

#[async_trait]
pub trait Task<S, O>: Sized {
  type Error;
  async fn run_task(
    self,
    input: ImageFile,
    workflow: DetectionWorkflow<S>,
    output: O,
  ) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

#[async_trait]
impl<S, O, RE> Task<S, O> for OneShotTask
where
  S: DetectionService + 'static,
  O: Render<WorkflowView, Error = RE> + Send + Sync + 'static,
  RE: std::error::Error + Sync + Send + 'static,
{
  type Error = anyhow::Error;

  async fn run_task(
    self,
    input: ImageFile,
    workflow: DetectionWorkflow<S>,
    output: O,
  ) -> Result<(), Self::Error> {
    info!("开始任务...");
    workflow.select_file(input)?;
    let submission = workflow.submit().await;
    info!("提交结果: {:?}", submission);

    let view = workflow.view();
    output.render_result(&view)?;

    match submission {
      Submission::Completed => Ok(()),
      other => Err(anyhow::anyhow!("检测请求未完成: {:?}", other)),
    }
  }
}

pub struct RepeatShotTask {
  times: usize,
}

impl RepeatShotTask {
  pub fn new(times: usize) -> Self {
    Self { times }
  }
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self::new(100)
  }
}

#[async_trait]
impl<S, O, RE> Task<S, O> for RepeatShotTask
where
  S: DetectionService + 'static,
  O: Render<WorkflowView, Error = RE> + Send + Sync + 'static,
  RE: std::error::Error + Sync + Send + 'static,
{
  type Error = anyhow::Error;

  async fn run_task(
    self,
    input: ImageFile,
    workflow: DetectionWorkflow<S>,
    output: O,
  ) -> Result<(), Self::Error> {
    info!("开始任务...");
    workflow.select_file(input)?;

    let mut times = Vec::with_capacity(self.times);
    let mut failures = 0usize;
    for i in 0..self.times {
      let now = std::time::Instant::now();
      let submission = workflow.submit().await;
      let elapsed = now.elapsed();
      match workflow.state() {
        WorkflowState::Succeeded { detections, .. } => {
          info!("({})检测完成，{} 个目标，耗时: {:.2?}", i, detections.len(), elapsed);
        }
        WorkflowState::Failed(err) => {
          failures += 1;
          warn!("({})检测失败: {}，耗时: {:.2?}", i, err, elapsed);
        }
        state => warn!("({})提交结果 {:?}，状态 {:?}", i, submission, state),
      }
      times.push(elapsed);
    }

    output.render_result(&workflow.view())?;

    if times.len() > WARMUP_ROUNDS {
      let measured = &times[WARMUP_ROUNDS..];
      warn!(
        "平均检测时间: {:.2?}",
        measured.iter().sum::<Duration>() / measured.len() as u32
      );
    }
    if failures > 0 {
      warn!("失败次数: {}/{}", failures, self.times);
    }

    Ok(())
  }
}

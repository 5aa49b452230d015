// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/test_workflow.rs - 上传/检测状态机测试
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

mod common;

use std::time::Duration;

use common::{MockService, image, person, success};
use shanan_lens::{
  detection::{
    ConfidenceTier, DetectError, Detection, FALLBACK_ERROR_MESSAGE, NO_FILE_SELECTED_MESSAGE,
  },
  service::ServiceError,
  workflow::{DetectionWorkflow, Submission, WorkflowState},
};

async fn wait_for_calls(service: &MockService, calls: usize) {
  while service.calls() < calls {
    tokio::task::yield_now().await;
  }
}

#[tokio::test]
async fn submit_without_selection_is_rejected() {
  let workflow = DetectionWorkflow::new(MockService::new());

  assert_eq!(workflow.submit().await, Submission::Rejected);
  assert_eq!(workflow.service().calls(), 0);
  assert_eq!(
    workflow.state(),
    WorkflowState::Failed(DetectError::NoFileSelected)
  );

  let view = workflow.view();
  assert_eq!(view.error.as_deref(), Some(NO_FILE_SELECTED_MESSAGE));
  assert!(!view.detect_button.enabled);
}

#[tokio::test]
async fn successful_response_round_trip() {
  let service = MockService::new().respond_json(
    r#"{"success": true, "result_image": "X",
        "detections": [{"class_id": 0, "class_name": "person", "confidence": 0.92, "bbox": [1, 2, 3, 4]}]}"#,
  );
  let workflow = DetectionWorkflow::new(service);
  workflow.select_file(image("cat.png")).unwrap();

  assert_eq!(workflow.submit().await, Submission::Completed);
  assert_eq!(workflow.service().uploads(), ["cat.png"]);

  let WorkflowState::Succeeded {
    result_image,
    detections,
  } = workflow.state()
  else {
    panic!("expected success, got {:?}", workflow.state());
  };
  assert_eq!(result_image, "X");
  assert_eq!(detections, vec![person()]);
  assert_eq!(detections[0].tier(), ConfidenceTier::High);

  let view = workflow.view();
  assert_eq!(view.result_image.as_deref(), Some("X"));
  assert_eq!(view.detections.len(), 1);
  assert_eq!(view.detections[0].tier, ConfidenceTier::High);
  assert_eq!(view.detections[0].percent(), "92.0%");
  assert!(view.error.is_none());
  assert!(view.detect_button.enabled);
}

#[tokio::test]
async fn detections_are_surfaced_in_received_order() {
  let received: Vec<Detection> = [("dog", 0.55), ("person", 0.7), ("dog", 0.55), ("cat", 0.99)]
    .iter()
    .enumerate()
    .map(|(i, (name, confidence))| Detection {
      class_id: i as i64,
      class_name: name.to_string(),
      confidence: *confidence,
      bbox: [i as f32, 0.0, 10.0, 10.0],
    })
    .collect();

  let workflow = DetectionWorkflow::new(
    MockService::new()
      .respond(success("X", received.clone()))
      .respond(success("Y", vec![])),
  );
  workflow.select_file(image("a.png")).unwrap();

  workflow.submit().await;
  let view = workflow.view();
  let names: Vec<_> = view.detections.iter().map(|c| c.class_name.as_str()).collect();
  assert_eq!(names, ["dog", "person", "dog", "cat"]);
  let tiers: Vec<_> = view.detections.iter().map(|c| c.tier).collect();
  assert_eq!(
    tiers,
    [
      ConfidenceTier::Low,
      ConfidenceTier::Medium,
      ConfidenceTier::Low,
      ConfidenceTier::High
    ]
  );

  workflow.submit().await;
  assert_eq!(
    workflow.state(),
    WorkflowState::Succeeded {
      result_image: "Y".to_string(),
      detections: vec![],
    }
  );
}

#[tokio::test]
async fn service_reported_failure_uses_service_message() {
  let workflow = DetectionWorkflow::new(
    MockService::new().respond_json(r#"{"success": false, "error": "model unavailable"}"#),
  );
  workflow.select_file(image("a.png")).unwrap();

  assert_eq!(workflow.submit().await, Submission::Completed);
  let state = workflow.state();
  assert_eq!(
    state,
    WorkflowState::Failed(DetectError::ServiceReportedFailure(
      "model unavailable".to_string()
    ))
  );
  assert_eq!(workflow.view().error.as_deref(), Some("model unavailable"));
}

#[tokio::test]
async fn transport_failure_uses_fallback_message() {
  let workflow = DetectionWorkflow::new(
    MockService::new().respond(Err(ServiceError::Transport("connection reset".to_string()))),
  );
  workflow.select_file(image("a.png")).unwrap();

  workflow.submit().await;
  assert_eq!(
    workflow.state(),
    WorkflowState::Failed(DetectError::TransportFailure(
      FALLBACK_ERROR_MESSAGE.to_string()
    ))
  );
}

#[tokio::test]
async fn new_selection_clears_previous_result() {
  let workflow = DetectionWorkflow::new(MockService::new().respond(success("X", vec![person()])));
  let previews = workflow.previews();
  workflow.select_file(image("a.png")).unwrap();
  workflow.submit().await;
  assert!(matches!(workflow.state(), WorkflowState::Succeeded { .. }));
  let old_preview = workflow.view().preview.unwrap();

  workflow.select_file(image("b.png")).unwrap();
  let view = workflow.view();
  assert_eq!(workflow.state(), WorkflowState::Idle);
  assert!(view.result_image.is_none());
  assert!(view.detections.is_empty());
  assert!(view.error.is_none());
  assert_eq!(view.file.map(|f| f.name), Some("b.png".to_string()));

  assert_eq!(previews.live_count(), 1);
  assert!(previews.resolve(&old_preview).is_none());
  assert!(previews.resolve(&view.preview.unwrap()).is_some());
}

#[tokio::test]
async fn new_selection_clears_previous_error() {
  let workflow = DetectionWorkflow::new(MockService::new());
  workflow.submit().await;
  assert!(workflow.view().error.is_some());

  workflow.select_file(image("a.png")).unwrap();
  assert_eq!(workflow.state(), WorkflowState::Idle);
  assert!(workflow.view().error.is_none());
}

#[tokio::test]
async fn reset_returns_to_idle_from_any_state() {
  let workflow = DetectionWorkflow::new(
    MockService::new()
      .respond(success("X", vec![person()]))
      .respond_json(r#"{"success": false}"#),
  );
  let previews = workflow.previews();

  // 没有任何选择时重置
  workflow.reset();
  assert_eq!(workflow.state(), WorkflowState::Idle);

  // 成功之后
  workflow.select_file(image("a.png")).unwrap();
  workflow.submit().await;
  workflow.reset();
  let view = workflow.view();
  assert_eq!(workflow.state(), WorkflowState::Idle);
  assert!(view.file.is_none() && view.preview.is_none() && view.error.is_none());
  assert_eq!(previews.live_count(), 0);

  // 失败之后
  workflow.select_file(image("a.png")).unwrap();
  workflow.submit().await;
  assert_eq!(
    workflow.view().error.as_deref(),
    Some(FALLBACK_ERROR_MESSAGE)
  );
  workflow.reset();
  assert_eq!(workflow.state(), WorkflowState::Idle);
  assert!(workflow.view().error.is_none());
  assert_eq!(previews.live_count(), 0);
  assert!(workflow.selected_file().is_none());
}

#[tokio::test]
async fn duplicate_submit_is_ignored_and_reset_abandons_response() {
  let workflow = DetectionWorkflow::new(
    MockService::new()
      .gated()
      .respond(success("X", vec![person()])),
  );
  workflow.select_file(image("a.png")).unwrap();

  let pending = tokio::spawn({
    let workflow = workflow.clone();
    async move { workflow.submit().await }
  });
  wait_for_calls(workflow.service(), 1).await;

  assert_eq!(workflow.state(), WorkflowState::Submitting);
  let view = workflow.view();
  assert!(!view.detect_button.enabled);
  assert_eq!(view.detect_button.label, "Detecting...");

  assert_eq!(workflow.submit().await, Submission::Ignored);
  assert_eq!(workflow.service().calls(), 1);

  workflow.reset();
  assert_eq!(workflow.state(), WorkflowState::Idle);
  assert_eq!(workflow.previews().live_count(), 0);

  workflow.service().release();
  assert_eq!(pending.await.unwrap(), Submission::Abandoned);
  assert_eq!(workflow.state(), WorkflowState::Idle);
  assert!(workflow.view().result_image.is_none());
}

#[tokio::test]
async fn stale_response_does_not_overwrite_newer_request() {
  let workflow = DetectionWorkflow::new(
    MockService::new()
      .gated()
      .respond(success("stale", vec![person()]))
      .respond(success("fresh", vec![])),
  );
  workflow.select_file(image("a.png")).unwrap();

  let first = tokio::spawn({
    let workflow = workflow.clone();
    async move { workflow.submit().await }
  });
  wait_for_calls(workflow.service(), 1).await;

  // 请求进行中换图，并立即发起新请求
  workflow.select_file(image("b.png")).unwrap();
  assert_eq!(workflow.state(), WorkflowState::Idle);
  let second = tokio::spawn({
    let workflow = workflow.clone();
    async move { workflow.submit().await }
  });
  wait_for_calls(workflow.service(), 2).await;

  // 第一个响应（"stale"）先到达
  workflow.service().release();
  assert_eq!(first.await.unwrap(), Submission::Abandoned);
  assert_eq!(workflow.state(), WorkflowState::Submitting);

  workflow.service().release();
  assert_eq!(second.await.unwrap(), Submission::Completed);
  assert_eq!(
    workflow.state(),
    WorkflowState::Succeeded {
      result_image: "fresh".to_string(),
      detections: vec![],
    }
  );
  assert_eq!(workflow.service().uploads(), ["a.png", "b.png"]);
}

#[tokio::test]
async fn cancelled_submit_clears_loading_state() {
  let workflow = DetectionWorkflow::new(MockService::new().gated());
  workflow.select_file(image("a.png")).unwrap();

  let result = tokio::time::timeout(Duration::from_millis(20), workflow.submit()).await;
  assert!(result.is_err());
  assert_eq!(workflow.state(), WorkflowState::Idle);
  assert!(workflow.view().detect_button.enabled);
}

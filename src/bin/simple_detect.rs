// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/simple_detect.rs - 单张图像上传检测
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

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use shanan_lens::{
  FromUrl,
  output::OutputWrapper,
  selection::ImageFile,
  service::HttpDetectionService,
  task::{OneShotTask, Task},
  workflow::DetectionWorkflow,
};

/// 上传一张图像到检测服务并显示结果
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测服务地址，例如 http://localhost:5000/api/detect?timeout=30
  #[arg(long, value_name = "SERVICE")]
  pub service: Url,
  /// 输入图像，例如 image:///path/to/cat.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出方式（console:text、console:json、folder:///dir）
  #[arg(long, value_name = "OUTPUT", default_value = "console:text")]
  pub output: Url,
  /// 提交前先查询服务健康状态
  #[arg(long)]
  pub check_health: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("检测服务: {}", args.service);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let service = HttpDetectionService::from_url(&args.service)?;
  if args.check_health {
    match service.health().await {
      Ok(health) => info!(
        "服务状态: {} (模型: {})",
        health.status,
        health.model.as_deref().unwrap_or("unknown")
      ),
      Err(err) => warn!("健康检查失败: {}", err),
    }
  }

  let input = ImageFile::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;
  let workflow = DetectionWorkflow::new(service);

  OneShotTask.run_task(input, workflow, output).await?;

  Ok(())
}

// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/interactive_detect.rs - 交互式上传检测
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
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use url::Url;

use shanan_lens::{
  FromUrl,
  output::{OutputWrapper, Render},
  selection::ImageFile,
  service::HttpDetectionService,
  workflow::{DetectionWorkflow, Submission},
};

const HELP: &str = "commands: select <path> | detect | reset | show | help | quit";

/// 交互式检测客户端，检测请求在后台执行，期间可以重新选择或重置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测服务地址
  #[arg(long, value_name = "SERVICE")]
  pub service: Url,
  /// 输出方式
  #[arg(long, value_name = "OUTPUT", default_value = "console:text")]
  pub output: Url,
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  info!("检测服务: {}", args.service);

  let workflow = DetectionWorkflow::new(HttpDetectionService::from_url(&args.service)?);
  let output = std::sync::Arc::new(OutputWrapper::from_url(&args.output)?);

  println!("{}", HELP);
  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  while let Some(line) = lines.next_line().await? {
    let line = line.trim();
    let (command, argument) = line
      .split_once(char::is_whitespace)
      .map(|(c, a)| (c, a.trim()))
      .unwrap_or((line, ""));

    match command {
      "" => continue,
      "select" => {
        let selected = ImageFile::open(argument)
          .map_err(anyhow::Error::from)
          .and_then(|file| workflow.select_file(file).map_err(anyhow::Error::from));
        if let Err(err) = selected {
          error!("无法选择图像 {}: {}", argument, err);
          continue;
        }
      }
      "detect" => {
        let workflow = workflow.clone();
        let output = output.clone();
        tokio::spawn(async move {
          let submission = workflow.submit().await;
          match submission {
            Submission::Completed | Submission::Rejected => {
              if let Err(err) = output.render_result(&workflow.view()) {
                error!("输出失败: {}", err);
              }
            }
            Submission::Ignored => info!("已有检测请求在途"),
            Submission::Abandoned => info!("检测响应已过期，已丢弃"),
          }
        });
        continue;
      }
      "reset" => workflow.reset(),
      "show" => {}
      "help" => {
        println!("{}", HELP);
        continue;
      }
      "quit" | "exit" => break,
      other => {
        println!("unknown command '{}'; {}", other, HELP);
        continue;
      }
    }

    output.render_result(&workflow.view())?;
  }

  workflow.reset();
  Ok(())
}

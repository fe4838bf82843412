//! DEEP 条目同步 CLI
//!
//! 把本地 JSON 条目导入草稿库，再批量保存到服务端，可选地把来源文档标记为已打标签

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use deep_tagging_sdk::tagging::entry::{Entry, EntrySyncListener, Notice, SyncOutcome};
use deep_tagging_sdk::tagging::lead::{LeadDraft, SaveIntent};
use deep_tagging_sdk::{ClientConfig, DeepClient, Framework};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// DEEP 条目同步 CLI
#[derive(Parser, Debug)]
#[command(name = "deep-cli")]
#[command(about = "DEEP 条目同步 CLI - 导入、查看并批量保存条目", long_about = None)]
struct Args {
    /// 服务端基础地址
    #[arg(long, default_value = "http://localhost:8000")]
    api_url: String,

    /// 项目 ID
    #[arg(short, long, default_value = "1")]
    project: String,

    /// 认证 token
    #[arg(long, default_value = "")]
    token: String,

    /// 本地草稿数据库
    #[arg(long, default_value = "sqlite://deep_entries.db?mode=rwc")]
    db: String,

    /// 日志级别（默认: info,deep_tagging_sdk=debug）
    #[arg(long, default_value = "info,deep_tagging_sdk=debug")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 从 JSON 文件导入条目草稿（全部标记为待保存）
    Import {
        #[arg(long)]
        lead: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// 查看条目草稿
    Show {
        #[arg(long)]
        lead: String,
    },
    /// 批量保存条目草稿
    Save {
        #[arg(long)]
        lead: String,
        /// 来源文档标题
        #[arg(long)]
        title: String,
        /// 框架定义 JSON（用于隐藏控件过滤和本地校验）
        #[arg(long)]
        framework: Option<PathBuf>,
        /// 保存成功后标记为已打标签
        #[arg(long)]
        finalize: bool,
        /// 本地校验未通过的条目也发送
        #[arg(long)]
        send_invalid: bool,
    },
}

/// 初始化日志（同时输出到 stdout 和文件）
fn init_logger(log_level: &str) -> Result<()> {
    use std::fs::OpenOptions;
    use std::io;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    // 优先使用环境变量 RUST_LOG（如果设置了），否则使用命令行参数
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("deep-cli.log")
        .context("无法创建日志文件 deep-cli.log")?;

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_target(false)
        .with_ansi(true);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(stdout_layer)
        .with(file_layer)
        .init();
    Ok(())
}

struct CliListener;

#[async_trait::async_trait]
impl EntrySyncListener for CliListener {
    async fn on_sync_start(&self, deletes: usize, updates: usize) {
        info!("[CLI] 🔄 同步开始，待删除: {}, 待更新: {}", deletes, updates);
    }

    async fn on_sync_progress(&self, completed: usize, total: usize) {
        info!("[CLI] 📊 同步进度: {}/{}", completed, total);
    }

    async fn on_sync_finish(&self, success: bool) {
        if success {
            info!("[CLI] ✅ 同步结束");
        } else {
            error!("[CLI] ❌ 同步失败");
        }
    }

    async fn on_notice(&self, notice: Notice) {
        let text = match &notice {
            Notice::EntriesDeleted(n) => format!("已删除 {} 个条目", n),
            Notice::EntriesDeleteFailed(n) => format!("删除 {} 个条目失败", n),
            Notice::EntriesSaved(n) => format!("已保存 {} 个条目", n),
            Notice::EntriesSaveFailed(n) => format!("保存 {} 个条目失败", n),
            Notice::NothingChanged => "没有需要保存的内容".to_string(),
            Notice::EntriesHeldBack(n) => format!("{} 个条目校验未通过，未发送", n),
            Notice::SyncFailed(reason) => format!("保存失败: {}", reason),
            Notice::LeadUpdated => "来源文档已更新".to_string(),
            Notice::LeadFinalized => "来源文档已标记为已打标签".to_string(),
            Notice::LeadUpdateFailed(reason) => format!("更新来源文档失败: {}", reason),
        };
        if notice.is_error() {
            warn!("[CLI] ⚠️ {}", text);
        } else {
            info!("[CLI] 💬 {}", text);
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("读取文件失败: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("解析 JSON 失败: {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(&args.log_level)?;

    let mut config = ClientConfig::new(args.project.clone(), args.token.clone());
    config.api_base_url = args.api_url.clone();
    config.db_url = args.db.clone();
    if let Command::Save { send_invalid, .. } = &args.command {
        config.skip_invalid_entries = !send_invalid;
    }

    let mut client = DeepClient::with_listener(config, Arc::new(CliListener))?;
    client.open_drafts().await?;

    match args.command {
        Command::Import { lead, file } => {
            let entries: Vec<Entry> = read_json(&file)?;
            let mut store = client.load_store(&lead).await?;
            let count = entries.len();
            for mut entry in entries {
                entry.lead = lead.clone();
                store.insert(entry);
            }
            client.persist_store(&lead, &store).await?;
            info!("[CLI] 📥 导入 {} 个条目到来源文档 {}", count, lead);
        }
        Command::Show { lead } => {
            let store = client.load_store(&lead).await?;
            info!("[CLI] 📋 来源文档 {} 共 {} 个条目", lead, store.len());
            for entry in store.entries() {
                info!(
                    "[CLI]   - {} | 服务端ID: {} | {:?} | 属性: {}",
                    entry.client_id,
                    entry.server_id.as_deref().unwrap_or("-"),
                    entry.state(),
                    entry.attributes.len()
                );
            }
        }
        Command::Save {
            lead,
            title,
            framework,
            finalize,
            ..
        } => {
            let framework: Framework = match framework {
                Some(path) => read_json(&path)?,
                None => Framework::default(),
            };
            let mut store = client.load_store(&lead).await?;
            let mut draft = LeadDraft::new(lead.clone(), title);
            let intent = if finalize {
                SaveIntent::Finalize
            } else {
                SaveIntent::Save
            };

            match client.save(&mut store, &framework, &mut draft, intent).await? {
                SyncOutcome::Completed(report) => {
                    info!(
                        "[CLI] ✅ 完成，轮数: {}, 有错误: {}, 来源文档: {:?}",
                        report.rounds, report.had_errors, report.lead
                    );
                    for (client_id, err) in store.errors().iter() {
                        warn!("[CLI]   条目 {} 错误: {:?}", client_id, err);
                    }
                }
                SyncOutcome::LeadInvalid(err) => {
                    error!("[CLI] 来源文档校验未通过: {:?}", err);
                }
                SyncOutcome::Busy => {
                    warn!("[CLI] 已有同步进行中");
                }
            }
        }
    }

    Ok(())
}

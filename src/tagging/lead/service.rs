//! 来源文档收尾
//!
//! 条目同步结束后最多发出一次 UpdateLead：
//! - 有任何条目错误时跳过（部分失败的条目绝不能让来源文档被标记为完成）
//! - 请求完成标签时带上 status = TAGGED
//! - 仅保存且表单未修改时跳过
//!
//! 不做重试。

use crate::tagging::entry::listener::{EntrySyncListener, Notice};
use crate::tagging::lead::api::LeadBackend;
use crate::tagging::lead::models::{LeadDraft, LeadPatch, LeadStatus};
use crate::tagging::reconcile::transform_errors;
use std::sync::Arc;
use tracing::{error, info};

/// 触发同步的用户动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveIntent {
    Save,
    Finalize,
}

/// 来源文档更新结果
#[derive(Debug, Clone, PartialEq)]
pub enum LeadUpdateOutcome {
    Skipped,
    Updated { finalized: bool },
    Failed(String),
}

/// 决定是否需要更新来源文档，以及补丁内容
pub fn decide_lead_update(
    intent: SaveIntent,
    lead: &LeadDraft,
    had_errors: bool,
) -> Option<LeadPatch> {
    if had_errors {
        return None;
    }
    match intent {
        SaveIntent::Finalize => {
            let mut patch = if lead.pristine {
                LeadPatch::default()
            } else {
                LeadPatch::from_draft(lead)
            };
            patch.status = Some(LeadStatus::Tagged);
            Some(patch)
        }
        SaveIntent::Save if lead.pristine => None,
        SaveIntent::Save => Some(LeadPatch::from_draft(lead)),
    }
}

pub struct LeadFinalizer {
    backend: Arc<dyn LeadBackend>,
    project_id: String,
}

impl LeadFinalizer {
    pub fn new(backend: Arc<dyn LeadBackend>, project_id: String) -> Self {
        Self {
            backend,
            project_id,
        }
    }

    /// 按需发出一次 UpdateLead，并通过监听器给出一条提示
    pub async fn run(
        &self,
        intent: SaveIntent,
        lead: &mut LeadDraft,
        had_errors: bool,
        listener: &dyn EntrySyncListener,
    ) -> LeadUpdateOutcome {
        let Some(patch) = decide_lead_update(intent, lead, had_errors) else {
            info!(
                "[LeadSync] 跳过来源文档更新，动作: {:?}, 条目错误: {}, 表单未修改: {}",
                intent, had_errors, lead.pristine
            );
            return LeadUpdateOutcome::Skipped;
        };

        let finalized = patch.status == Some(LeadStatus::Tagged);
        match self
            .backend
            .update_lead(&self.project_id, &lead.id, &patch)
            .await
        {
            Ok(resp) if resp.ok => {
                lead.pristine = true;
                if let Some(status) = resp.result.as_ref().and_then(|r| r.status) {
                    lead.status = Some(status);
                } else if finalized {
                    lead.status = Some(LeadStatus::Tagged);
                }
                info!(
                    "[LeadSync] ✅ 来源文档 {} 已更新，完成标签: {}",
                    lead.id, finalized
                );
                listener
                    .on_notice(if finalized {
                        Notice::LeadFinalized
                    } else {
                        Notice::LeadUpdated
                    })
                    .await;
                LeadUpdateOutcome::Updated { finalized }
            }
            Ok(resp) => {
                let form_error = transform_errors(&resp.errors);
                let message = form_error
                    .internal
                    .clone()
                    .unwrap_or_else(|| format!("字段错误: {}", form_error.fields.len()));
                error!("[LeadSync] 来源文档 {} 更新被拒绝: {}", lead.id, message);
                listener
                    .on_notice(Notice::LeadUpdateFailed(message.clone()))
                    .await;
                LeadUpdateOutcome::Failed(message)
            }
            Err(e) => {
                error!("[LeadSync] 来源文档 {} 更新请求失败: {:?}", lead.id, e);
                let message = e.to_string();
                listener
                    .on_notice(Notice::LeadUpdateFailed(message.clone()))
                    .await;
                LeadUpdateOutcome::Failed(message)
            }
        }
    }
}

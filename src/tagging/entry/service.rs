//! 条目批量同步服务层
//!
//! 一次"保存"或"完成标签"动作触发一次同步：
//! 捕获待删除/待更新的工作 → 按轮次顺序提交 → 全部轮次结束后对账并一次性合并
//! → 没有任何错误时按需更新来源文档。
//!
//! 轮次严格串行，第 N+1 轮在第 N 轮响应处理完之后才发出。
//! 整次请求失败时丢弃累加状态，条目存储保持调用前的样子。

use crate::tagging::batch::SyncAccumulator;
use crate::tagging::entry::api::EntryBackend;
use crate::tagging::entry::listener::{EmptyEntrySyncListener, EntrySyncListener, Notice};
use crate::tagging::entry::models::{EntrySyncerConfig, FormError};
use crate::tagging::entry::store::{EntryStore, PendingWork};
use crate::tagging::framework::Framework;
use crate::tagging::lead::api::LeadBackend;
use crate::tagging::lead::models::LeadDraft;
use crate::tagging::lead::service::{LeadFinalizer, LeadUpdateOutcome, SaveIntent};
use crate::tagging::reconcile::{reconcile, SyncCounts};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 一次同步的汇总
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub counts: SyncCounts,
    /// 发出的 BulkUpdateEntries 请求数
    pub rounds: usize,
    /// 本地校验未通过、未发送的条目数
    pub held_back: usize,
    pub had_errors: bool,
    pub lead: LeadUpdateOutcome,
    pub finished_at: DateTime<Utc>,
}

/// 同步调用的结果
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// 已有同步在进行中，本次调用被忽略
    Busy,
    /// 来源文档字段校验未通过，未发出任何请求
    LeadInvalid(FormError),
    Completed(SyncReport),
}

/// 进行中标记的守卫，离开作用域时复位
struct PendingGuard<'a>(&'a AtomicBool);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// 条目同步器
pub struct EntrySyncer {
    config: EntrySyncerConfig,
    entry_backend: Arc<dyn EntryBackend>,
    lead_finalizer: LeadFinalizer,
    listener: Arc<dyn EntrySyncListener>,
    /// 同一时间只允许一次同步
    pending: AtomicBool,
}

impl EntrySyncer {
    /// 创建新的条目同步器（使用默认空监听器）
    pub fn new(
        config: EntrySyncerConfig,
        entry_backend: Arc<dyn EntryBackend>,
        lead_backend: Arc<dyn LeadBackend>,
    ) -> Self {
        Self::with_listener(
            config,
            entry_backend,
            lead_backend,
            Arc::new(EmptyEntrySyncListener),
        )
    }

    /// 创建新的条目同步器（带自定义监听器）
    pub fn with_listener(
        config: EntrySyncerConfig,
        entry_backend: Arc<dyn EntryBackend>,
        lead_backend: Arc<dyn LeadBackend>,
        listener: Arc<dyn EntrySyncListener>,
    ) -> Self {
        info!(
            "[EntrySync] 创建条目同步器，项目ID: {}, 每轮上限 删除/更新: {}/{}",
            config.project_id, config.limits.delete_len, config.limits.update_len
        );
        Self {
            lead_finalizer: LeadFinalizer::new(lead_backend, config.project_id.clone()),
            config,
            entry_backend,
            listener,
            pending: AtomicBool::new(false),
        }
    }

    pub fn set_listener(&mut self, listener: Arc<dyn EntrySyncListener>) {
        self.listener = listener;
    }

    /// 是否有同步正在进行（界面据此禁用保存按钮）
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// 保存（或完成标签）当前来源文档下的全部条目
    ///
    /// 外层请求失败时返回 Err，此时 `store` 未被修改。
    pub async fn save(
        &self,
        store: &mut EntryStore,
        framework: &Framework,
        lead: &mut LeadDraft,
        intent: SaveIntent,
    ) -> Result<SyncOutcome> {
        if self
            .pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("[EntrySync] 已有同步进行中，忽略本次 {:?}", intent);
            return Ok(SyncOutcome::Busy);
        }
        let _guard = PendingGuard(&self.pending);

        if let Some(lead_error) = lead.validate() {
            warn!("[EntrySync] 来源文档 {} 校验未通过，不发起同步", lead.id);
            return Ok(SyncOutcome::LeadInvalid(lead_error));
        }

        info!(
            "[EntrySync] 🔄 开始同步来源文档 {} 的条目，动作: {:?}",
            lead.id, intent
        );

        let PendingWork {
            deletes,
            entries,
            held_back,
            validation_errors,
        } = store.pending_work(framework, self.config.skip_invalid_entries);
        let held_back = held_back.len();
        if held_back > 0 {
            warn!("[EntrySync] {} 个条目本地校验未通过，暂不发送", held_back);
            self.listener.on_notice(Notice::EntriesHeldBack(held_back)).await;
        }

        let mut acc = SyncAccumulator::new(deletes, entries, self.config.limits);
        self.listener
            .on_sync_start(acc.total_delete_ids.len(), acc.total_entries.len())
            .await;

        if let Err(e) = self.run_rounds(&mut acc).await {
            error!(
                "[EntrySync] 第 {} 轮请求失败，丢弃本次同步: {:?}",
                acc.rounds() + 1,
                e
            );
            self.listener
                .on_notice(Notice::SyncFailed(e.to_string()))
                .await;
            self.listener.on_sync_finish(false).await;
            return Err(e);
        }

        let rounds = acc.rounds();
        let reconciliation = reconcile(acc);
        let counts = reconciliation.counts;
        let had_errors = reconciliation.has_errors() || held_back > 0;
        store.merge(reconciliation, validation_errors);

        self.notify_counts(counts).await;
        self.listener.on_sync_finish(true).await;
        info!(
            "[EntrySync] ✅ 条目同步完成 - 轮数: {}, 保存: {}/{}, 删除: {}/{}",
            rounds,
            counts.save_succeeded,
            counts.save_succeeded + counts.save_failed,
            counts.delete_succeeded,
            counts.delete_succeeded + counts.delete_failed
        );

        let lead_outcome = self
            .lead_finalizer
            .run(intent, lead, had_errors, self.listener.as_ref())
            .await;

        Ok(SyncOutcome::Completed(SyncReport {
            counts,
            rounds,
            held_back,
            had_errors,
            lead: lead_outcome,
            finished_at: Utc::now(),
        }))
    }

    /// 逐轮提交直到两类工作都发送完
    async fn run_rounds(&self, acc: &mut SyncAccumulator) -> Result<()> {
        loop {
            let Some(batch) = acc.next_batch() else {
                return Ok(());
            };
            let (delete_count, entry_count) = (batch.delete_ids.len(), batch.entries.len());
            debug!(
                "[EntrySync] 第 {} 轮，删除: {}, 更新: {}",
                acc.rounds() + 1,
                delete_count,
                entry_count
            );

            let resp = self
                .entry_backend
                .bulk_update_entries(&self.config.project_id, batch.delete_ids, batch.entries)
                .await?;

            acc.absorb(delete_count, entry_count, resp);
            self.listener
                .on_sync_progress(acc.completed_work(), acc.total_work())
                .await;
        }
    }

    async fn notify_counts(&self, counts: SyncCounts) {
        if counts.is_noop() {
            self.listener.on_notice(Notice::NothingChanged).await;
            return;
        }
        let notices = [
            (counts.delete_succeeded, Notice::EntriesDeleted(counts.delete_succeeded)),
            (counts.delete_failed, Notice::EntriesDeleteFailed(counts.delete_failed)),
            (counts.save_succeeded, Notice::EntriesSaved(counts.save_succeeded)),
            (counts.save_failed, Notice::EntriesSaveFailed(counts.save_failed)),
        ];
        for (count, notice) in notices {
            if count > 0 {
                self.listener.on_notice(notice).await;
            }
        }
    }
}

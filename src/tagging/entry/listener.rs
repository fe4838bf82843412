//! 条目同步监听器回调接口

use async_trait::async_trait;

/// 面向用户的提示（界面上通常以 toast 展示）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    EntriesDeleted(usize),
    EntriesDeleteFailed(usize),
    EntriesSaved(usize),
    EntriesSaveFailed(usize),
    /// 没有任何需要同步的内容
    NothingChanged,
    /// 本地校验未通过、暂未发送的条目数
    EntriesHeldBack(usize),
    /// 整次同步失败（外层错误）
    SyncFailed(String),
    LeadUpdated,
    LeadFinalized,
    LeadUpdateFailed(String),
}

impl Notice {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Notice::EntriesDeleteFailed(_)
                | Notice::EntriesSaveFailed(_)
                | Notice::EntriesHeldBack(_)
                | Notice::SyncFailed(_)
                | Notice::LeadUpdateFailed(_)
        )
    }
}

/// 条目同步监听器
#[async_trait]
pub trait EntrySyncListener: Send + Sync {
    /// 同步开始，参数为待删除数和待更新数
    async fn on_sync_start(&self, deletes: usize, updates: usize);

    /// 每轮结束后回调，参数为已完成数和总数
    async fn on_sync_progress(&self, completed: usize, total: usize);

    /// 同步结束（成功或失败）
    async fn on_sync_finish(&self, success: bool);

    async fn on_notice(&self, notice: Notice);
}

/// 默认空实现（无操作）
pub struct EmptyEntrySyncListener;

#[async_trait]
impl EntrySyncListener for EmptyEntrySyncListener {
    async fn on_sync_start(&self, _deletes: usize, _updates: usize) {}
    async fn on_sync_progress(&self, _completed: usize, _total: usize) {}
    async fn on_sync_finish(&self, _success: bool) {}
    async fn on_notice(&self, _notice: Notice) {}
}

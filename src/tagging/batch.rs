//! 分批与累加
//!
//! 服务端每次只接受有限数量的删除和更新。删除和更新各自按已完成数量推进，
//! 但放在同一个请求里提交；两类切片都为空时同步结束。

use crate::tagging::entry::types::{
    BulkUpdateEntriesResp, DeletedEntryRef, EntryInput, EntryPayload, ServerFieldError,
};
use tracing::warn;

/// 每轮最多删除的条目数
pub const DELETE_LEN: usize = 100;
/// 每轮最多更新的条目数
pub const UPDATE_LEN: usize = 100;

/// 每轮请求的数量上限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub delete_len: usize,
    pub update_len: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            delete_len: DELETE_LEN,
            update_len: UPDATE_LEN,
        }
    }
}

/// 一轮请求的内容
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncBatch<'a> {
    pub delete_ids: &'a [String],
    pub entries: &'a [EntryInput],
}

impl SyncBatch<'_> {
    pub fn is_empty(&self) -> bool {
        self.delete_ids.is_empty() && self.entries.is_empty()
    }
}

fn window<T>(items: &[T], done: usize, limit: usize) -> &[T] {
    let start = done.min(items.len());
    let end = done.saturating_add(limit).min(items.len());
    &items[start..end]
}

/// 计算下一轮的切片；两类都已发送完时返回 None
pub fn next_batch<'a>(
    delete_ids: &'a [String],
    entries: &'a [EntryInput],
    deleted_done: usize,
    saved_done: usize,
    limits: BatchLimits,
) -> Option<SyncBatch<'a>> {
    let batch = SyncBatch {
        delete_ids: window(delete_ids, deleted_done, limits.delete_len.max(1)),
        entries: window(entries, saved_done, limits.update_len.max(1)),
    };
    if batch.is_empty() {
        None
    } else {
        Some(batch)
    }
}

/// 一次同步调用期间的累加状态
///
/// 工作列表和标识列表在创建时固定，结果数组只增不减。
/// 结果数组的下标与工作列表的下标一一对应。
#[derive(Debug, Clone)]
pub struct SyncAccumulator {
    limits: BatchLimits,
    /// 待删除条目的服务端 ID
    pub total_delete_ids: Vec<String>,
    /// 与 total_delete_ids 对齐的 clientId
    pub delete_identifiers: Vec<String>,
    pub total_entries: Vec<EntryInput>,
    /// 与 total_entries 对齐的 clientId
    pub stale_identifiers: Vec<String>,
    pub errors: Vec<Option<Vec<ServerFieldError>>>,
    pub results: Vec<Option<EntryPayload>>,
    pub deleted_results: Vec<Option<DeletedEntryRef>>,
    rounds: usize,
}

impl SyncAccumulator {
    pub fn new(
        deletes: Vec<(String, String)>,
        entries: Vec<EntryInput>,
        limits: BatchLimits,
    ) -> Self {
        let (delete_identifiers, total_delete_ids): (Vec<String>, Vec<String>) =
            deletes.into_iter().unzip();
        let stale_identifiers = entries.iter().map(|e| e.client_id.clone()).collect();
        Self {
            limits,
            total_delete_ids,
            delete_identifiers,
            total_entries: entries,
            stale_identifiers,
            errors: Vec::new(),
            results: Vec::new(),
            deleted_results: Vec::new(),
            rounds: 0,
        }
    }

    pub fn next_batch(&self) -> Option<SyncBatch<'_>> {
        next_batch(
            &self.total_delete_ids,
            &self.total_entries,
            self.deleted_results.len(),
            self.results.len(),
            self.limits,
        )
    }

    /// 并入一轮响应
    ///
    /// 响应数组长度与提交的切片不一致时按切片长度补齐（缺失视为该项失败）或截断，
    /// 保证计数器每轮都按提交数量前进。
    pub fn absorb(
        &mut self,
        submitted_deletes: usize,
        submitted_entries: usize,
        resp: BulkUpdateEntriesResp,
    ) {
        let BulkUpdateEntriesResp {
            mut errors,
            mut result,
            mut deleted_result,
        } = resp;

        if deleted_result.len() != submitted_deletes
            || result.len() != submitted_entries
            || errors.len() > submitted_entries
        {
            warn!(
                "[EntrySync] 第 {} 轮响应与请求不对齐，删除: {}/{}, 结果: {}/{}, 错误: {}",
                self.rounds + 1,
                deleted_result.len(),
                submitted_deletes,
                result.len(),
                submitted_entries,
                errors.len()
            );
        }
        deleted_result.resize(submitted_deletes, None);
        result.resize(submitted_entries, None);
        errors.resize(submitted_entries, None);

        self.deleted_results.extend(deleted_result);
        self.results.extend(result);
        self.errors.extend(errors);
        self.rounds += 1;
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn total_work(&self) -> usize {
        self.total_delete_ids.len() + self.total_entries.len()
    }

    pub fn completed_work(&self) -> usize {
        self.deleted_results.len() + self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_work() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagging::entry::models::{Entry, EntryType};
    use proptest::prelude::*;

    fn inputs(n: usize) -> Vec<EntryInput> {
        (0..n)
            .map(|_| EntryInput::from(&Entry::new("lead", EntryType::Excerpt)))
            .collect()
    }

    fn deletes(n: usize) -> Vec<(String, String)> {
        (0..n).map(|i| (format!("c{}", i), format!("{}", i))).collect()
    }

    /// 模拟服务端全部成功，返回轮数
    fn drive(acc: &mut SyncAccumulator) -> usize {
        while let Some(batch) = acc.next_batch() {
            let (d, e) = (batch.delete_ids.len(), batch.entries.len());
            let resp = BulkUpdateEntriesResp {
                errors: vec![None; e],
                result: vec![None; e],
                deleted_result: batch
                    .delete_ids
                    .iter()
                    .map(|id| Some(DeletedEntryRef { id: id.clone() }))
                    .collect(),
            };
            acc.absorb(d, e, resp);
        }
        acc.rounds()
    }

    #[test]
    fn empty_work_has_no_batch() {
        let acc = SyncAccumulator::new(Vec::new(), Vec::new(), BatchLimits::default());
        assert!(acc.next_batch().is_none());
        assert!(acc.is_empty());
    }

    #[test]
    fn slices_advance_independently() {
        let ids: Vec<String> = (0..30).map(|i| i.to_string()).collect();
        let entries = inputs(250);
        let limits = BatchLimits::default();

        let first = next_batch(&ids, &entries, 0, 0, limits).unwrap();
        assert_eq!((first.delete_ids.len(), first.entries.len()), (30, 100));

        let second = next_batch(&ids, &entries, 30, 100, limits).unwrap();
        assert!(second.delete_ids.is_empty());
        assert_eq!(second.entries.len(), 100);
        assert_eq!(second.entries[0].client_id, entries[100].client_id);

        let third = next_batch(&ids, &entries, 30, 200, limits).unwrap();
        assert_eq!(third.entries.len(), 50);
        assert!(next_batch(&ids, &entries, 30, 250, limits).is_none());
    }

    #[test]
    fn deletes_finishing_early_do_not_stop_updates() {
        let mut acc = SyncAccumulator::new(deletes(10), inputs(300), BatchLimits::default());
        assert_eq!(drive(&mut acc), 3);
        assert_eq!(acc.deleted_results.len(), 10);
        assert_eq!(acc.results.len(), 300);
    }

    #[test]
    fn short_response_is_padded() {
        let mut acc = SyncAccumulator::new(deletes(2), inputs(3), BatchLimits::default());
        acc.absorb(2, 3, BulkUpdateEntriesResp::default());
        assert_eq!(acc.deleted_results, vec![None, None]);
        assert_eq!(acc.results.len(), 3);
        assert_eq!(acc.errors.len(), 3);
        assert!(acc.next_batch().is_none());
    }

    proptest! {
        #[test]
        fn rounds_converge(updates in 0usize..700, removals in 0usize..700, update_len in 1usize..150, delete_len in 1usize..150) {
            let limits = BatchLimits { delete_len, update_len };
            let mut acc = SyncAccumulator::new(deletes(removals), inputs(updates), limits);
            let expected = updates.div_ceil(update_len).max(removals.div_ceil(delete_len));
            prop_assert_eq!(drive(&mut acc), expected);
            prop_assert_eq!(acc.completed_work(), updates + removals);
        }
    }
}

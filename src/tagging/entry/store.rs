//! 条目内存存储
//!
//! 编辑会话期间条目的唯一持有者。同步器只在计算批次时读取，
//! 在全部轮次结束后一次性写回对账结果。

use crate::tagging::entry::models::{
    AttributeValue, Entry, EntryErrorMap, EntryState, LeadAttachment, LeadImage,
};
use crate::tagging::entry::types::EntryInput;
use crate::tagging::framework::Framework;
use crate::tagging::reconcile::Reconciliation;
use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// 一次同步开始时捕获的工作
#[derive(Debug, Clone, Default)]
pub struct PendingWork {
    /// (clientId, serverId)
    pub deletes: Vec<(String, String)>,
    pub entries: Vec<EntryInput>,
    /// 本地校验未通过、暂不发送的条目
    pub held_back: Vec<String>,
    /// 待更新条目的本地校验错误，同步成功后随结果一起写回
    pub validation_errors: EntryErrorMap,
}

#[derive(Debug, Clone, Default)]
pub struct EntryStore {
    entries: Vec<Entry>,
    /// 图片 ID → 图片
    images: HashMap<String, LeadImage>,
    /// 条目 clientId → 附件
    attachments: HashMap<String, LeadAttachment>,
    errors: EntryErrorMap,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<Entry>) -> Self {
        Self {
            entries,
            ..Default::default()
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn get(&self, client_id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.client_id == client_id)
    }

    fn get_mut(&mut self, client_id: &str) -> Result<&mut Entry> {
        self.entries
            .iter_mut()
            .find(|e| e.client_id == client_id)
            .ok_or_else(|| anyhow!("条目不存在: {}", client_id))
    }

    pub fn images(&self) -> &HashMap<String, LeadImage> {
        &self.images
    }

    pub fn attachments(&self) -> &HashMap<String, LeadAttachment> {
        &self.attachments
    }

    pub fn errors(&self) -> &EntryErrorMap {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 是否有未同步的修改或删除
    pub fn is_dirty(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.state() != EntryState::Untouched)
    }

    /// 新增条目（总是视为未同步）
    pub fn insert(&mut self, mut entry: Entry) {
        entry.stale = true;
        entry.deleted = false;
        self.entries.push(entry);
    }

    pub fn add_image(&mut self, image: LeadImage) {
        self.images.insert(image.id.clone(), image);
    }

    /// 设置或替换某个控件的取值
    pub fn update_attribute(&mut self, client_id: &str, attribute: AttributeValue) -> Result<()> {
        let entry = self.get_mut(client_id)?;
        match entry
            .attributes
            .iter_mut()
            .find(|a| a.widget == attribute.widget)
        {
            Some(existing) => {
                existing.widget_type = attribute.widget_type;
                existing.data = attribute.data;
            }
            None => entry.attributes.push(attribute),
        }
        entry.stale = true;
        Ok(())
    }

    pub fn set_excerpt(&mut self, client_id: &str, excerpt: Option<String>) -> Result<()> {
        let entry = self.get_mut(client_id)?;
        entry.excerpt = excerpt;
        entry.stale = true;
        Ok(())
    }

    /// 本地删除：未保存过的条目直接移除，不产生删除请求
    pub fn mark_deleted(&mut self, client_id: &str) -> Result<()> {
        let entry = self.get_mut(client_id)?;
        if entry.server_id.is_some() {
            entry.deleted = true;
        } else {
            debug!("[EntryStore] 条目 {} 未保存过，直接移除", client_id);
            self.entries.retain(|e| e.client_id != client_id);
            self.errors.remove(client_id);
            self.attachments.remove(client_id);
        }
        Ok(())
    }

    /// 计算待同步的工作，不修改存储
    pub fn pending_work(&self, framework: &Framework, skip_invalid: bool) -> PendingWork {
        let mut work = PendingWork::default();
        for entry in &self.entries {
            match entry.state() {
                EntryState::PendingDelete => {
                    if let Some(server_id) = &entry.server_id {
                        work.deletes
                            .push((entry.client_id.clone(), server_id.clone()));
                    }
                }
                EntryState::PendingUpdate => {
                    if let Some(error) = framework.validate_entry(entry) {
                        work.validation_errors
                            .insert(entry.client_id.clone(), error);
                        if skip_invalid {
                            work.held_back.push(entry.client_id.clone());
                            continue;
                        }
                    }
                    work.entries.push(framework.entry_input(entry));
                }
                EntryState::Untouched => {}
            }
        }
        debug!(
            "[EntryStore] 待删除: {}, 待更新: {}, 暂不发送: {}",
            work.deletes.len(),
            work.entries.len(),
            work.held_back.len()
        );
        work
    }

    /// 合并对账结果：移除已删除条目，替换已保存条目，附属表增量合并
    ///
    /// `validation_errors` 来自本次同步开始时的本地校验，
    /// 同一条目若有服务端错误则以服务端为准。
    pub fn merge(&mut self, reconciliation: Reconciliation, validation_errors: EntryErrorMap) {
        let Reconciliation {
            mut errors,
            mut saved,
            deleted,
            images,
            attachments,
            ..
        } = reconciliation;
        errors.fill_missing(validation_errors);

        let deleted: HashSet<String> = deleted.into_iter().collect();
        let saved_ids: HashSet<String> = saved.keys().cloned().collect();
        self.entries.retain(|e| !deleted.contains(&e.client_id));
        let mut replaced = 0;
        for entry in self.entries.iter_mut() {
            if let Some(fresh) = saved.remove(&entry.client_id) {
                *entry = fresh;
                replaced += 1;
            }
        }

        self.images.extend(images);
        self.attachments.extend(attachments);

        for client_id in &deleted {
            self.errors.remove(client_id);
            self.attachments.remove(client_id);
        }
        // 保存成功的条目清除旧错误；未参与本次同步的条目错误保持不变
        for client_id in saved_ids.iter().filter(|id| !errors.contains(id)) {
            self.errors.remove(client_id);
        }
        self.errors.merge(errors);

        info!(
            "[EntryStore] 合并同步结果 - 移除: {}, 替换: {}, 当前条目: {}",
            deleted.len(),
            replaced,
            self.entries.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagging::entry::models::{EntryType, FormError};
    use crate::tagging::framework::{Widget, WidgetKind, WidgetType};
    use serde_json::json;

    fn saved_entry(server_id: &str) -> Entry {
        let mut entry = Entry::new("lead", EntryType::Excerpt);
        entry.server_id = Some(server_id.to_string());
        entry.stale = false;
        entry
    }

    fn number_framework() -> Framework {
        Framework {
            id: "f".into(),
            title: "f".into(),
            widgets: vec![Widget {
                id: "n".into(),
                title: "N".into(),
                kind: WidgetKind::Number {
                    min_value: Some(0.0),
                    max_value: None,
                },
                condition: None,
            }],
        }
    }

    #[test]
    fn unsaved_entries_are_dropped_on_delete() {
        let mut store = EntryStore::new();
        let fresh = Entry::new("lead", EntryType::Excerpt);
        let fresh_id = fresh.client_id.clone();
        store.insert(fresh);
        let persisted = saved_entry("7");
        let persisted_id = persisted.client_id.clone();
        store.entries.push(persisted);

        store.mark_deleted(&fresh_id).unwrap();
        store.mark_deleted(&persisted_id).unwrap();
        assert_eq!(store.len(), 1);

        let work = store.pending_work(&Framework::default(), true);
        assert_eq!(work.deletes, vec![(persisted_id, "7".to_string())]);
        assert!(work.entries.is_empty());
        assert!(store.mark_deleted("missing").is_err());
    }

    #[test]
    fn invalid_entries_are_held_back() {
        let mut store = EntryStore::new();
        let entry = Entry::new("lead", EntryType::Excerpt);
        let id = entry.client_id.clone();
        store.insert(entry);
        store
            .update_attribute(&id, AttributeValue::new("n", WidgetType::Number, json!({"value": -1})))
            .unwrap();

        let work = store.pending_work(&number_framework(), true);
        assert!(work.entries.is_empty());
        assert_eq!(work.held_back, vec![id.clone()]);
        assert!(work.validation_errors.contains(&id));
        assert!(store.errors().is_empty());

        let work = store.pending_work(&number_framework(), false);
        assert_eq!(work.entries.len(), 1);
    }

    #[test]
    fn merge_replaces_removes_and_keeps_untouched_errors() {
        let keep = saved_entry("1");
        let gone = saved_entry("2");
        let mut edited = saved_entry("3");
        edited.stale = true;
        let (keep_id, gone_id, edited_id) = (
            keep.client_id.clone(),
            gone.client_id.clone(),
            edited.client_id.clone(),
        );
        let mut store = EntryStore::from_entries(vec![keep, gone, edited.clone()]);
        store.errors.insert(keep_id.clone(), FormError::internal("client"));
        store.errors.insert(edited_id.clone(), FormError::internal("stale server error"));
        store.add_image(LeadImage {
            id: "img-1".into(),
            title: None,
            file_url: None,
        });

        let mut fresh = edited;
        fresh.stale = false;
        fresh.excerpt = Some("updated".into());
        let mut rec = Reconciliation::default();
        rec.saved.insert(edited_id.clone(), fresh);
        rec.deleted.push(gone_id.clone());
        rec.images.insert(
            "img-2".into(),
            LeadImage {
                id: "img-2".into(),
                title: None,
                file_url: None,
            },
        );
        store.merge(rec, EntryErrorMap::default());

        assert_eq!(store.len(), 2);
        assert!(store.get(&gone_id).is_none());
        assert_eq!(store.get(&edited_id).unwrap().excerpt.as_deref(), Some("updated"));
        assert!(!store.is_dirty());
        assert_eq!(store.images().len(), 2);
        assert!(!store.errors().contains(&edited_id));
        assert!(store.errors().contains(&keep_id));
    }

    #[test]
    fn validation_errors_apply_on_merge_without_hiding_server_errors() {
        let mut held = Entry::new("lead", EntryType::Excerpt);
        held.server_id = Some("4".into());
        let mut rejected = Entry::new("lead", EntryType::Excerpt);
        rejected.server_id = Some("5".into());
        let (held_id, rejected_id) = (held.client_id.clone(), rejected.client_id.clone());
        let mut store = EntryStore::from_entries(vec![held, rejected]);
        store.errors.insert(held_id.clone(), FormError::internal("old server error"));

        let mut validation = EntryErrorMap::default();
        validation.insert(held_id.clone(), FormError::internal("client"));
        validation.insert(rejected_id.clone(), FormError::internal("client"));
        let mut rec = Reconciliation::default();
        rec.errors.insert(rejected_id.clone(), FormError::internal("server"));
        store.merge(rec, validation);

        assert_eq!(
            store.errors().get(&held_id).and_then(|e| e.internal.as_deref()),
            Some("client")
        );
        assert_eq!(
            store.errors().get(&rejected_id).and_then(|e| e.internal.as_deref()),
            Some("server")
        );
    }
}

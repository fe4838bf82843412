//! 同步结果对账
//!
//! 把各轮累加得到的按下标对齐的结果数组映射回 clientId，
//! 生成条目错误表、已保存条目表和已删除条目列表。

use crate::tagging::batch::SyncAccumulator;
use crate::tagging::entry::models::{
    AttributeValue, Entry, EntryErrorMap, FormError, FormErrorNode, LeadAttachment, LeadImage,
};
use crate::tagging::entry::types::{EntryPayload, ServerFieldError};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

const NON_FIELD_ERRORS: &str = "nonFieldErrors";

/// 面向用户的计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
    pub delete_succeeded: usize,
    pub delete_failed: usize,
    pub save_succeeded: usize,
    pub save_failed: usize,
}

impl SyncCounts {
    pub fn has_failures(&self) -> bool {
        self.delete_failed > 0 || self.save_failed > 0
    }

    /// 四项计数都为 0
    pub fn is_noop(&self) -> bool {
        *self == SyncCounts::default()
    }
}

/// 对账结果，在最后一轮结束后一次性合并进条目存储
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub errors: EntryErrorMap,
    pub saved: HashMap<String, Entry>,
    pub deleted: Vec<String>,
    pub images: HashMap<String, LeadImage>,
    pub attachments: HashMap<String, LeadAttachment>,
    pub counts: SyncCounts,
}

impl Reconciliation {
    /// 删除和保存中是否出现任何错误
    pub fn has_errors(&self) -> bool {
        self.counts.has_failures() || !self.errors.is_empty()
    }
}

fn field_node(error: &ServerFieldError) -> FormErrorNode {
    if let Some(items) = &error.array_errors {
        let items: BTreeMap<String, FormError> = items
            .iter()
            .map(|item| {
                let mut fe = item
                    .object_errors
                    .as_deref()
                    .map(transform_errors)
                    .unwrap_or_default();
                if fe.internal.is_none() {
                    fe.internal = item.messages.clone();
                }
                (item.client_id.clone(), fe)
            })
            .collect();
        FormErrorNode::Array(items)
    } else if let Some(object_errors) = &error.object_errors {
        let mut fe = transform_errors(object_errors);
        if fe.internal.is_none() {
            fe.internal = error.messages.clone();
        }
        FormErrorNode::Object(fe)
    } else {
        FormErrorNode::Message(error.messages.clone().unwrap_or_else(|| "无效取值".to_string()))
    }
}

/// 把服务端的 ObjectError 列表转为表单错误树
pub fn transform_errors(errors: &[ServerFieldError]) -> FormError {
    let mut form_error = FormError::default();
    for error in errors {
        if error.field == NON_FIELD_ERRORS {
            let message = error.messages.clone().unwrap_or_default();
            form_error.internal = Some(match form_error.internal.take() {
                Some(prev) if !prev.is_empty() => format!("{} {}", prev, message),
                _ => message,
            });
        } else {
            form_error
                .fields
                .insert(error.field.clone(), field_node(error));
        }
    }
    form_error
}

/// 把服务端返回的条目转为本地条目（已同步，stale=false），附带图片和附件
pub fn transform_entry(payload: EntryPayload) -> (Entry, Option<LeadImage>, Option<LeadAttachment>) {
    let entry = Entry {
        client_id: payload.client_id,
        server_id: Some(payload.id),
        lead: payload.lead,
        entry_type: payload.entry_type,
        excerpt: payload.excerpt,
        dropped_excerpt: payload.dropped_excerpt,
        image: payload.image.as_ref().map(|i| i.id.clone()),
        lead_attachment: payload.lead_attachment.as_ref().map(|a| a.id.clone()),
        attributes: payload
            .attributes
            .into_iter()
            .map(|a| AttributeValue {
                client_id: a.client_id,
                id: Some(a.id),
                widget: a.widget,
                widget_type: a.widget_type,
                data: a.data,
            })
            .collect(),
        stale: false,
        deleted: false,
    };
    (entry, payload.image, payload.lead_attachment)
}

/// 对账：下标 i 对应调用开始时捕获的第 i 个标识
pub fn reconcile(acc: SyncAccumulator) -> Reconciliation {
    let mut reconciliation = Reconciliation::default();

    for (index, error) in acc.errors.iter().enumerate() {
        let (Some(client_id), Some(error)) = (acc.stale_identifiers.get(index), error) else {
            continue;
        };
        reconciliation
            .errors
            .insert(client_id.clone(), transform_errors(error));
    }

    for (index, result) in acc.results.into_iter().enumerate() {
        let Some(client_id) = acc.stale_identifiers.get(index) else {
            continue;
        };
        match result {
            Some(payload) => {
                reconciliation.counts.save_succeeded += 1;
                let (entry, image, attachment) = transform_entry(payload);
                if let Some(image) = image {
                    reconciliation.images.insert(image.id.clone(), image);
                }
                if let Some(attachment) = attachment {
                    reconciliation
                        .attachments
                        .insert(client_id.clone(), attachment);
                }
                reconciliation.saved.insert(client_id.clone(), entry);
            }
            None => {
                reconciliation.counts.save_failed += 1;
                if !reconciliation.errors.contains(client_id) {
                    reconciliation
                        .errors
                        .insert(client_id.clone(), FormError::internal("保存条目失败"));
                }
            }
        }
    }

    for (index, deleted) in acc.deleted_results.iter().enumerate() {
        let Some(client_id) = acc.delete_identifiers.get(index) else {
            continue;
        };
        if deleted.is_some() {
            reconciliation.counts.delete_succeeded += 1;
            reconciliation.deleted.push(client_id.clone());
        } else {
            reconciliation.counts.delete_failed += 1;
        }
    }

    debug!(
        "[EntrySync] 对账完成 - 保存成功: {}, 保存失败: {}, 删除成功: {}, 删除失败: {}, 错误条目: {}",
        reconciliation.counts.save_succeeded,
        reconciliation.counts.save_failed,
        reconciliation.counts.delete_succeeded,
        reconciliation.counts.delete_failed,
        reconciliation.errors.len()
    );
    reconciliation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagging::batch::BatchLimits;
    use crate::tagging::entry::models::EntryType;
    use crate::tagging::entry::types::{
        BulkUpdateEntriesResp, DeletedEntryRef, EntryInput, ServerArrayError,
    };

    fn payload_for(input: &EntryInput, id: usize) -> EntryPayload {
        EntryPayload {
            id: id.to_string(),
            client_id: input.client_id.clone(),
            lead: input.lead.clone(),
            entry_type: input.entry_type,
            excerpt: input.excerpt.clone(),
            dropped_excerpt: None,
            image: None,
            lead_attachment: None,
            attributes: Vec::new(),
        }
    }

    #[test]
    fn later_rounds_map_to_later_identifiers() {
        let inputs: Vec<EntryInput> = (0..250)
            .map(|_| EntryInput::from(&Entry::new("lead", EntryType::Excerpt)))
            .collect();
        let mut acc = SyncAccumulator::new(Vec::new(), inputs.clone(), BatchLimits::default());

        let mut offset = 0;
        while let Some(batch) = acc.next_batch() {
            let n = batch.entries.len();
            // 第三轮只有 50 个，且全部失败
            let resp = if offset == 200 {
                BulkUpdateEntriesResp {
                    errors: vec![None; n],
                    result: vec![None; n],
                    deleted_result: Vec::new(),
                }
            } else {
                BulkUpdateEntriesResp {
                    errors: vec![None; n],
                    result: batch
                        .entries
                        .iter()
                        .enumerate()
                        .map(|(i, e)| Some(payload_for(e, offset + i)))
                        .collect(),
                    deleted_result: Vec::new(),
                }
            };
            acc.absorb(0, n, resp);
            offset += n;
        }
        assert_eq!(acc.rounds(), 3);

        let rec = reconcile(acc);
        assert_eq!(rec.counts.save_succeeded, 200);
        assert_eq!(rec.counts.save_failed, 50);
        for (i, input) in inputs.iter().enumerate() {
            if i < 200 {
                assert!(rec.saved.contains_key(&input.client_id));
                assert!(!rec.errors.contains(&input.client_id));
            } else {
                assert!(!rec.saved.contains_key(&input.client_id));
                assert!(rec.errors.contains(&input.client_id));
            }
        }
        assert!(rec.has_errors());
    }

    #[test]
    fn deletes_map_to_client_ids() {
        let mut acc = SyncAccumulator::new(
            vec![("c1".into(), "11".into()), ("c2".into(), "12".into())],
            Vec::new(),
            BatchLimits::default(),
        );
        acc.absorb(
            2,
            0,
            BulkUpdateEntriesResp {
                deleted_result: vec![Some(DeletedEntryRef { id: "11".into() }), None],
                ..Default::default()
            },
        );
        let rec = reconcile(acc);
        assert_eq!(rec.deleted, vec!["c1".to_string()]);
        assert_eq!(rec.counts.delete_succeeded, 1);
        assert_eq!(rec.counts.delete_failed, 1);
        assert!(rec.has_errors());
    }

    #[test]
    fn server_errors_become_form_errors() {
        let errors = vec![
            ServerFieldError {
                field: NON_FIELD_ERRORS.into(),
                messages: Some("Lead is locked".into()),
                object_errors: None,
                array_errors: None,
            },
            ServerFieldError {
                field: "excerpt".into(),
                messages: Some("Too long".into()),
                object_errors: None,
                array_errors: None,
            },
            ServerFieldError {
                field: "attributes".into(),
                messages: None,
                object_errors: None,
                array_errors: Some(vec![ServerArrayError {
                    client_id: "a1".into(),
                    messages: None,
                    object_errors: Some(vec![ServerFieldError {
                        field: "data".into(),
                        messages: Some("Invalid".into()),
                        object_errors: None,
                        array_errors: None,
                    }]),
                }]),
            },
        ];
        let fe = transform_errors(&errors);
        assert_eq!(fe.internal.as_deref(), Some("Lead is locked"));
        assert_eq!(fe.field_message("excerpt"), Some("Too long"));
        match fe.fields.get("attributes") {
            Some(FormErrorNode::Array(items)) => {
                assert_eq!(items["a1"].field_message("data"), Some("Invalid"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}

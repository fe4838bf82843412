//! 条目本地模型定义

use crate::tagging::batch::BatchLimits;
use crate::tagging::framework::WidgetType;
use crate::tagging::serialization::generate_client_id;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 条目类型（与服务端 EntryTagTypeEnum 对应）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    Excerpt,
    Image,
    Attachment,
    DataSeries,
}

/// 条目上某个控件的取值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeValue {
    pub client_id: String,
    /// 服务端 ID，首次保存后才有
    #[serde(default)]
    pub id: Option<String>,
    pub widget: String,
    pub widget_type: WidgetType,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl AttributeValue {
    pub fn new(widget: impl Into<String>, widget_type: WidgetType, data: serde_json::Value) -> Self {
        Self {
            client_id: generate_client_id(),
            id: None,
            widget: widget.into(),
            widget_type,
            data,
        }
    }
}

/// 来源文档中的图片
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadImage {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
}

/// 来源文档中的附件（表格、图表等）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadAttachment {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// 本地条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// 客户端生成的稳定 ID，是跨轮次关联结果的唯一可靠键
    pub client_id: String,
    #[serde(default)]
    pub server_id: Option<String>,
    pub lead: String,
    pub entry_type: EntryType,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub dropped_excerpt: Option<String>,
    /// 图片 ID（图片条目）
    #[serde(default)]
    pub image: Option<String>,
    /// 附件 ID（附件条目）
    #[serde(default)]
    pub lead_attachment: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeValue>,
    /// 上次同步成功后是否被本地修改过
    #[serde(default)]
    pub stale: bool,
    /// 是否已被用户在本地删除
    #[serde(default)]
    pub deleted: bool,
}

/// 条目的同步状态，三者互斥
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Untouched,
    PendingUpdate,
    PendingDelete,
}

impl Entry {
    /// 新建一个尚未保存的条目（stale=true）
    pub fn new(lead: impl Into<String>, entry_type: EntryType) -> Self {
        Self {
            client_id: generate_client_id(),
            server_id: None,
            lead: lead.into(),
            entry_type,
            excerpt: None,
            dropped_excerpt: None,
            image: None,
            lead_attachment: None,
            attributes: Vec::new(),
            stale: true,
            deleted: false,
        }
    }

    /// 删除优先于修改
    pub fn state(&self) -> EntryState {
        if self.deleted {
            EntryState::PendingDelete
        } else if self.stale {
            EntryState::PendingUpdate
        } else {
            EntryState::Untouched
        }
    }

    pub fn attribute(&self, widget_id: &str) -> Option<&AttributeValue> {
        self.attributes.iter().find(|a| a.widget == widget_id)
    }
}

/// 表单错误树（与前端表单库的 error 结构一致）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormError {
    /// 整个对象级别的错误
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FormErrorNode>,
}

/// 错误树节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormErrorNode {
    Message(String),
    Object(FormError),
    /// 数组按元素 clientId 索引
    Array(BTreeMap<String, FormError>),
}

impl FormError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            internal: Some(message.into()),
            fields: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.internal.is_none() && self.fields.is_empty()
    }

    pub fn set_field(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .insert(field.into(), FormErrorNode::Message(message.into()));
    }

    /// 为数组字段中的某个元素记录错误
    pub fn set_array_item(&mut self, field: &str, client_id: &str, error: FormError) {
        let node = self
            .fields
            .entry(field.to_string())
            .or_insert_with(|| FormErrorNode::Array(BTreeMap::new()));
        match node {
            FormErrorNode::Array(items) => {
                items.insert(client_id.to_string(), error);
            }
            other => {
                let mut items = BTreeMap::new();
                items.insert(client_id.to_string(), error);
                *other = FormErrorNode::Array(items);
            }
        }
    }

    /// 某个字段的直接错误信息
    pub fn field_message(&self, field: &str) -> Option<&str> {
        match self.fields.get(field) {
            Some(FormErrorNode::Message(m)) => Some(m),
            _ => None,
        }
    }
}

/// clientId → 条目错误
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryErrorMap(BTreeMap<String, FormError>);

impl EntryErrorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, client_id: &str) -> Option<&FormError> {
        self.0.get(client_id)
    }

    pub fn insert(&mut self, client_id: impl Into<String>, error: FormError) {
        self.0.insert(client_id.into(), error);
    }

    pub fn remove(&mut self, client_id: &str) -> Option<FormError> {
        self.0.remove(client_id)
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.0.contains_key(client_id)
    }

    /// 合并（不是替换）：other 中的键覆盖，其他键保持不变
    pub fn merge(&mut self, other: EntryErrorMap) {
        self.0.extend(other.0);
    }

    /// 只补充尚无错误的条目
    pub fn fill_missing(&mut self, other: EntryErrorMap) {
        for (client_id, error) in other.0 {
            self.0.entry(client_id).or_insert(error);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FormError)> {
        self.0.iter()
    }
}

/// 条目同步器配置
#[derive(Debug, Clone)]
pub struct EntrySyncerConfig {
    /// 项目 ID
    pub project_id: String,
    /// 每轮请求的删除/更新数量上限
    pub limits: BatchLimits,
    /// 本地校验失败的条目是否暂不发送
    pub skip_invalid_entries: bool,
}

impl EntrySyncerConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            limits: BatchLimits::default(),
            skip_invalid_entries: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_takes_precedence_over_stale() {
        let mut entry = Entry::new("lead-1", EntryType::Excerpt);
        assert_eq!(entry.state(), EntryState::PendingUpdate);
        entry.deleted = true;
        assert_eq!(entry.state(), EntryState::PendingDelete);
        entry.deleted = false;
        entry.stale = false;
        assert_eq!(entry.state(), EntryState::Untouched);
    }

    #[test]
    fn error_map_merge_keeps_untouched_keys() {
        let mut map = EntryErrorMap::new();
        map.insert("a", FormError::internal("client side"));
        map.insert("b", FormError::internal("old"));

        let mut incoming = EntryErrorMap::new();
        incoming.insert("b", FormError::internal("server"));
        map.merge(incoming);

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a").unwrap().internal.as_deref(), Some("client side"));
        assert_eq!(map.get("b").unwrap().internal.as_deref(), Some("server"));
    }

    #[test]
    fn entry_parses_camel_case() {
        let entry: Entry = serde_json::from_value(serde_json::json!({
            "clientId": "c1",
            "serverId": "12",
            "lead": "7",
            "entryType": "EXCERPT",
            "excerpt": "floods",
            "attributes": [{
                "clientId": "a1",
                "widget": "w1",
                "widgetType": "TEXT",
                "data": {"value": "x"}
            }]
        }))
        .unwrap();
        assert_eq!(entry.server_id.as_deref(), Some("12"));
        assert_eq!(entry.attributes[0].widget_type, WidgetType::Text);
        assert!(!entry.stale);
        assert_eq!(entry.state(), EntryState::Untouched);
    }
}

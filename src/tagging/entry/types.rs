//! 条目 API DTO（请求和响应结构体）

use crate::tagging::entry::models::{
    AttributeValue, Entry, EntryType, LeadAttachment, LeadImage,
};
use crate::tagging::framework::WidgetType;
use crate::tagging::serialization::deserialize_vec_or_null;
use serde::{Deserialize, Serialize};

/// 发送给服务端的控件取值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeInput {
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub widget: String,
    pub widget_type: WidgetType,
    pub data: serde_json::Value,
}

/// 发送给服务端的条目（BulkEntryInputType）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryInput {
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub lead: String,
    pub entry_type: EntryType,
    pub excerpt: Option<String>,
    pub dropped_excerpt: Option<String>,
    pub image: Option<String>,
    pub lead_attachment: Option<String>,
    pub attributes: Vec<AttributeInput>,
}

impl From<&AttributeValue> for AttributeInput {
    fn from(a: &AttributeValue) -> Self {
        Self {
            client_id: a.client_id.clone(),
            id: a.id.clone(),
            widget: a.widget.clone(),
            widget_type: a.widget_type,
            data: a.data.clone(),
        }
    }
}

impl From<&Entry> for EntryInput {
    fn from(e: &Entry) -> Self {
        Self {
            client_id: e.client_id.clone(),
            id: e.server_id.clone(),
            lead: e.lead.clone(),
            entry_type: e.entry_type,
            excerpt: e.excerpt.clone(),
            dropped_excerpt: e.dropped_excerpt.clone(),
            image: e.image.clone(),
            lead_attachment: e.lead_attachment.clone(),
            attributes: e.attributes.iter().map(AttributeInput::from).collect(),
        }
    }
}

/// 服务端返回的控件取值
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributePayload {
    pub id: String,
    pub client_id: String,
    pub widget: String,
    pub widget_type: WidgetType,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// 服务端返回的条目（EntryResponse 片段）
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPayload {
    pub id: String,
    pub client_id: String,
    pub lead: String,
    pub entry_type: EntryType,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub dropped_excerpt: Option<String>,
    #[serde(default)]
    pub image: Option<LeadImage>,
    #[serde(default)]
    pub lead_attachment: Option<LeadAttachment>,
    #[serde(default, deserialize_with = "deserialize_vec_or_null")]
    pub attributes: Vec<AttributePayload>,
}

/// 服务端字段错误（ObjectError 中的一项）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerFieldError {
    pub field: String,
    #[serde(default)]
    pub messages: Option<String>,
    #[serde(default)]
    pub object_errors: Option<Vec<ServerFieldError>>,
    #[serde(default)]
    pub array_errors: Option<Vec<ServerArrayError>>,
}

/// 服务端数组元素错误，按 clientId 定位元素
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerArrayError {
    pub client_id: String,
    #[serde(default)]
    pub messages: Option<String>,
    #[serde(default)]
    pub object_errors: Option<Vec<ServerFieldError>>,
}

/// 删除确认
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeletedEntryRef {
    pub id: String,
}

/// BulkUpdateEntries 的结果，三个数组与请求数组按下标对齐
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateEntriesResp {
    #[serde(default, deserialize_with = "deserialize_vec_or_null")]
    pub errors: Vec<Option<Vec<ServerFieldError>>>,
    #[serde(default, deserialize_with = "deserialize_vec_or_null")]
    pub result: Vec<Option<EntryPayload>>,
    #[serde(default, deserialize_with = "deserialize_vec_or_null")]
    pub deleted_result: Vec<Option<DeletedEntryRef>>,
}

/// `data.project.entryBulk`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BulkUpdateEntriesData {
    pub project: Option<BulkUpdateEntriesProject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BulkUpdateEntriesProject {
    pub entry_bulk: Option<BulkUpdateEntriesResp>,
}

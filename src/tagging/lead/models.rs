//! 来源文档（Lead）本地模型定义

use crate::tagging::entry::models::FormError;
use serde::{Deserialize, Serialize};

/// 来源文档状态（与服务端 LeadStatusEnum 对应）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    NotTagged,
    InProgress,
    Tagged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadPriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadConfidentiality {
    Unprotected,
    Restricted,
    Confidential,
}

/// 正在编辑的来源文档表单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadDraft {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub published_on: Option<String>,
    #[serde(default)]
    pub priority: Option<LeadPriority>,
    #[serde(default)]
    pub confidentiality: Option<LeadConfidentiality>,
    #[serde(default)]
    pub status: Option<LeadStatus>,
    /// 表单自加载后是否未被修改
    #[serde(default = "default_pristine")]
    pub pristine: bool,
}

fn default_pristine() -> bool {
    true
}

impl LeadDraft {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: None,
            published_on: None,
            priority: None,
            confidentiality: None,
            status: None,
            pristine: true,
        }
    }

    /// 本地校验来源文档字段，返回 None 表示通过
    pub fn validate(&self) -> Option<FormError> {
        let mut error = FormError::default();
        if self.title.trim().is_empty() {
            error.set_field("title", "标题不能为空");
        }
        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                error.set_field("url", "链接必须以 http:// 或 https:// 开头");
            }
        }
        if let Some(date) = self.published_on.as_deref() {
            if chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
                error.set_field("publishedOn", "无效日期");
            }
        }
        if error.is_empty() {
            None
        } else {
            Some(error)
        }
    }
}

/// UpdateLead 的 data 参数（只包含需要修改的字段）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<LeadStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<LeadPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidentiality: Option<LeadConfidentiality>,
}

impl LeadPatch {
    /// 由已修改的表单构造补丁
    pub fn from_draft(draft: &LeadDraft) -> Self {
        Self {
            status: None,
            title: Some(draft.title.clone()),
            url: draft.url.clone(),
            published_on: draft.published_on.clone(),
            priority: draft.priority,
            confidentiality: draft.confidentiality,
        }
    }
}

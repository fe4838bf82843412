//! 来源文档 API DTO

use crate::tagging::entry::types::ServerFieldError;
use crate::tagging::lead::models::LeadStatus;
use crate::tagging::serialization::deserialize_vec_or_null;
use serde::Deserialize;

/// UpdateLead 返回的来源文档片段
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadPayload {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<LeadStatus>,
}

/// UpdateLead 的结果
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeadResp {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub result: Option<LeadPayload>,
    #[serde(default, deserialize_with = "deserialize_vec_or_null")]
    pub errors: Vec<ServerFieldError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateLeadData {
    pub project: Option<UpdateLeadProject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateLeadProject {
    pub lead_update: Option<UpdateLeadResp>,
}

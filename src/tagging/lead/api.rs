//! 来源文档 GraphQL API 客户端

use crate::tagging::graphql::GraphQlClient;
use crate::tagging::lead::models::LeadPatch;
use crate::tagging::lead::types::{UpdateLeadData, UpdateLeadResp};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

const UPDATE_LEAD: &str = r#"
mutation UpdateLead($projectId: ID!, $leadId: ID!, $data: LeadInputType!) {
  project(id: $projectId) {
    leadUpdate(id: $leadId, data: $data) {
      ok
      errors
      result { id title status }
    }
  }
}
"#;

/// 更新来源文档的服务端接口
#[async_trait]
pub trait LeadBackend: Send + Sync {
    async fn update_lead(
        &self,
        project_id: &str,
        lead_id: &str,
        patch: &LeadPatch,
    ) -> Result<UpdateLeadResp>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateLeadVariables<'a> {
    project_id: &'a str,
    lead_id: &'a str,
    data: &'a LeadPatch,
}

/// 来源文档相关的 GraphQL API 客户端
pub struct LeadApi {
    graphql: GraphQlClient,
}

impl LeadApi {
    pub fn new(graphql: GraphQlClient) -> Self {
        Self { graphql }
    }
}

#[async_trait]
impl LeadBackend for LeadApi {
    async fn update_lead(
        &self,
        project_id: &str,
        lead_id: &str,
        patch: &LeadPatch,
    ) -> Result<UpdateLeadResp> {
        info!(
            "[LeadAPI] 📡 更新来源文档 {}，状态: {:?}",
            lead_id, patch.status
        );

        let data: UpdateLeadData = self
            .graphql
            .execute(
                "UpdateLead",
                UPDATE_LEAD,
                &UpdateLeadVariables {
                    project_id,
                    lead_id,
                    data: patch,
                },
            )
            .await?;

        let resp = data
            .project
            .and_then(|p| p.lead_update)
            .ok_or_else(|| anyhow!("响应中缺少 project.leadUpdate 字段"))?;

        if !resp.ok {
            warn!(
                "[LeadAPI] 更新来源文档 {} 未成功，错误数: {}",
                lead_id,
                resp.errors.len()
            );
        }
        Ok(resp)
    }
}

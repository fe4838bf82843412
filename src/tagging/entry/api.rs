//! 条目 GraphQL API 客户端

use crate::tagging::entry::types::{BulkUpdateEntriesData, BulkUpdateEntriesResp, EntryInput};
use crate::tagging::graphql::GraphQlClient;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

const BULK_UPDATE_ENTRIES: &str = r#"
mutation BulkUpdateEntries($projectId: ID!, $deleteIds: [ID!], $entries: [BulkEntryInputType!]) {
  project(id: $projectId) {
    entryBulk(deleteIds: $deleteIds, items: $entries) {
      errors
      result {
        id
        clientId
        lead
        entryType
        excerpt
        droppedExcerpt
        image { id title fileUrl }
        leadAttachment { id title fileUrl type }
        attributes { id clientId widget widgetType data }
      }
      deletedResult { id }
    }
  }
}
"#;

/// 批量保存条目的服务端接口
#[async_trait]
pub trait EntryBackend: Send + Sync {
    /// 一次请求同时提交删除和更新，返回数组与请求数组按下标对齐
    async fn bulk_update_entries(
        &self,
        project_id: &str,
        delete_ids: &[String],
        entries: &[EntryInput],
    ) -> Result<BulkUpdateEntriesResp>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BulkUpdateEntriesVariables<'a> {
    project_id: &'a str,
    delete_ids: &'a [String],
    entries: &'a [EntryInput],
}

/// 条目相关的 GraphQL API 客户端
pub struct EntryApi {
    graphql: GraphQlClient,
}

impl EntryApi {
    pub fn new(graphql: GraphQlClient) -> Self {
        Self { graphql }
    }
}

#[async_trait]
impl EntryBackend for EntryApi {
    async fn bulk_update_entries(
        &self,
        project_id: &str,
        delete_ids: &[String],
        entries: &[EntryInput],
    ) -> Result<BulkUpdateEntriesResp> {
        info!(
            "[EntryAPI] 📡 批量保存条目，项目: {}, 删除: {}, 更新: {}",
            project_id,
            delete_ids.len(),
            entries.len()
        );

        let data: BulkUpdateEntriesData = self
            .graphql
            .execute(
                "BulkUpdateEntries",
                BULK_UPDATE_ENTRIES,
                &BulkUpdateEntriesVariables {
                    project_id,
                    delete_ids,
                    entries,
                },
            )
            .await?;

        let resp = data
            .project
            .and_then(|p| p.entry_bulk)
            .ok_or_else(|| anyhow!("响应中缺少 project.entryBulk 字段"))?;

        debug!(
            "[EntryAPI] ✅ 批量保存响应，结果: {}, 删除确认: {}, 错误: {}",
            resp.result.len(),
            resp.deleted_result.len(),
            resp.errors.iter().filter(|e| e.is_some()).count()
        );
        Ok(resp)
    }
}

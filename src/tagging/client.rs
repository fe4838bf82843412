//! DEEP 客户端
//!
//! 组装 HTTP 客户端、GraphQL API、条目同步器和本地草稿存储。

use crate::tagging::batch::BatchLimits;
use crate::tagging::db::create_sqlite_pool_with_migration;
use crate::tagging::entry::{
    EmptyEntrySyncListener, EntryApi, EntryDraftDao, EntryStore, EntrySyncListener,
    EntrySyncer, EntrySyncerConfig, SyncOutcome,
};
use crate::tagging::framework::Framework;
use crate::tagging::graphql::GraphQlClient;
use crate::tagging::lead::{LeadApi, LeadDraft, SaveIntent};
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tracing::info;

/// 客户端配置
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// 项目 ID
    pub project_id: String,
    /// 认证 token
    pub token: String,
    /// 服务端基础地址
    pub api_base_url: String,
    /// GraphQL 端点路径
    pub graphql_path: String,
    /// 本地草稿使用的 SQLite 数据库 URL
    ///
    /// 例如：`sqlite://deep_entries.db?mode=rwc`
    pub db_url: String,
    /// 每轮请求的删除/更新上限
    pub limits: BatchLimits,
    /// 本地校验未通过的条目是否暂不发送
    pub skip_invalid_entries: bool,
}

impl ClientConfig {
    /// 创建默认配置
    pub fn new(project_id: String, token: String) -> Self {
        Self {
            project_id,
            token,
            api_base_url: "http://localhost:8000".to_string(),
            graphql_path: "/graphql".to_string(),
            db_url: "sqlite://deep_entries.db?mode=rwc".to_string(),
            limits: BatchLimits::default(),
            skip_invalid_entries: true,
        }
    }

    pub fn graphql_endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            self.graphql_path.trim_start_matches('/')
        )
    }

    fn syncer_config(&self) -> EntrySyncerConfig {
        EntrySyncerConfig {
            project_id: self.project_id.clone(),
            limits: self.limits,
            skip_invalid_entries: self.skip_invalid_entries,
        }
    }
}

/// 创建带认证头的 HTTP 客户端（token 通过 default_headers 自动添加）
pub fn build_http_client(token: &str) -> Result<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    if !token.is_empty() {
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token))
                .context("无效的 token")?,
        );
    }
    reqwest::ClientBuilder::new()
        .default_headers(headers)
        .build()
        .context("创建 HTTP 客户端失败")
}

/// DEEP 客户端
pub struct DeepClient {
    config: ClientConfig,
    syncer: EntrySyncer,
    drafts: Option<EntryDraftDao>,
}

impl DeepClient {
    /// 创建客户端（使用默认空监听器）
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_listener(config, Arc::new(EmptyEntrySyncListener))
    }

    /// 创建客户端（带自定义监听器）
    pub fn with_listener(
        config: ClientConfig,
        listener: Arc<dyn EntrySyncListener>,
    ) -> Result<Self> {
        let http_client = build_http_client(&config.token)?;
        let graphql = GraphQlClient::new(http_client, config.graphql_endpoint());
        info!(
            "[Client] 创建客户端，项目ID: {}, GraphQL: {}",
            config.project_id,
            graphql.endpoint()
        );

        let syncer = EntrySyncer::with_listener(
            config.syncer_config(),
            Arc::new(EntryApi::new(graphql.clone())),
            Arc::new(LeadApi::new(graphql)),
            listener,
        );
        Ok(Self {
            config,
            syncer,
            drafts: None,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn syncer(&self) -> &EntrySyncer {
        &self.syncer
    }

    pub fn set_listener(&mut self, listener: Arc<dyn EntrySyncListener>) {
        self.syncer.set_listener(listener);
    }

    /// 打开本地草稿数据库（执行迁移）
    pub async fn open_drafts(&mut self) -> Result<()> {
        let pool = create_sqlite_pool_with_migration(&self.config.db_url).await?;
        self.drafts = Some(EntryDraftDao::new(pool));
        Ok(())
    }

    fn drafts(&self) -> Result<&EntryDraftDao> {
        self.drafts
            .as_ref()
            .ok_or_else(|| anyhow!("本地草稿数据库未打开"))
    }

    /// 从本地草稿恢复编辑会话
    pub async fn load_store(&self, lead_id: &str) -> Result<EntryStore> {
        let entries = self.drafts()?.load_lead_entries(lead_id).await?;
        Ok(EntryStore::from_entries(entries))
    }

    pub async fn persist_store(&self, lead_id: &str, store: &EntryStore) -> Result<()> {
        self.drafts()?
            .save_lead_entries(lead_id, store.entries())
            .await
    }

    /// 同步条目；草稿数据库已打开时，同步完成后写回合并后的条目
    pub async fn save(
        &self,
        store: &mut EntryStore,
        framework: &Framework,
        lead: &mut LeadDraft,
        intent: SaveIntent,
    ) -> Result<SyncOutcome> {
        let outcome = self.syncer.save(store, framework, lead, intent).await?;
        if let (SyncOutcome::Completed(_), Some(drafts)) = (&outcome, &self.drafts) {
            drafts.save_lead_entries(&lead.id, store.entries()).await?;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_cleanly() {
        let mut config = ClientConfig::new("p1".into(), "t".into());
        config.api_base_url = "https://deep.example.org/".into();
        assert_eq!(config.graphql_endpoint(), "https://deep.example.org/graphql");
        assert_eq!(config.limits, BatchLimits::default());
    }

    #[tokio::test]
    async fn drafts_must_be_opened_first() -> Result<()> {
        let client = DeepClient::new(ClientConfig::new("p1".into(), "t".into()))?;
        assert!(client.load_store("lead-1").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn drafts_round_trip_through_client() -> Result<()> {
        let mut config = ClientConfig::new("p1".into(), String::new());
        config.db_url = "sqlite::memory:".into();
        let mut client = DeepClient::new(config)?;
        client.open_drafts().await?;

        let mut store = EntryStore::new();
        store.insert(crate::tagging::entry::Entry::new(
            "lead-1",
            crate::tagging::entry::EntryType::Excerpt,
        ));
        client.persist_store("lead-1", &store).await?;

        let restored = client.load_store("lead-1").await?;
        assert_eq!(restored.entries(), store.entries());
        assert!(restored.is_dirty());
        Ok(())
    }
}

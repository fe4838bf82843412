//! GraphQL 传输层
//!
//! 所有 mutation 共用一个 POST 端点，请求体为 `{operationName, query, variables}`，
//! 响应体为 `{data, errors}`。顶层 `errors` 非空、HTTP 状态非 2xx、body 无法解析
//! 或缺少 `data` 都视为整次请求失败（外层错误）。

use crate::tagging::serialization::{deserialize_vec_or_null, generate_operation_id};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// GraphQL 请求体
#[derive(Debug, Serialize)]
pub struct GraphQlRequest<'a, V: Serialize> {
    #[serde(rename = "operationName")]
    pub operation_name: &'a str,
    pub query: &'a str,
    pub variables: &'a V,
}

/// 统一的 GraphQL 响应包装结构体
///
/// data 字段可能为 null 或缺失，因此使用 Option<T>
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default, deserialize_with = "deserialize_vec_or_null")]
    pub errors: Vec<GraphQlError>,
}

/// GraphQL 顶层错误
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default)]
    pub path: Option<Vec<serde_json::Value>>,
}

/// GraphQL HTTP 客户端
///
/// `client` 应该已经在外部配置好认证头
#[derive(Clone)]
pub struct GraphQlClient {
    client: reqwest::Client,
    endpoint: String,
}

impl GraphQlClient {
    pub fn new(client: reqwest::Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 执行一次 GraphQL 操作并返回 `data`
    pub async fn execute<V, T>(&self, operation_name: &str, query: &str, variables: &V) -> Result<T>
    where
        V: Serialize + Sync,
        T: DeserializeOwned,
    {
        let operation_id = generate_operation_id(operation_name);
        info!("[GraphQL] 📡 发送 {}", operation_name);
        debug!(
            "[GraphQL]   请求URL: {}, 操作ID: {}",
            self.endpoint, operation_id
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("operationID", &operation_id)
            .json(&GraphQlRequest {
                operation_name,
                query,
                variables,
            })
            .send()
            .await
            .with_context(|| format!("{} 请求失败", operation_name))?;

        handle_graphql_response(response, operation_name).await
    }
}

/// 通用 HTTP 响应处理：检查状态码后交给 [`decode_graphql_body`]
pub async fn handle_graphql_response<T: DeserializeOwned>(
    response: reqwest::Response,
    operation_name: &str,
) -> Result<T> {
    let status = response.status();

    // body 只能读取一次
    let body_bytes = response.bytes().await.context("读取响应 body 失败")?;
    let body_str = String::from_utf8_lossy(&body_bytes);
    debug!("[GraphQL] {}响应 Body: {}", operation_name, body_str);

    if !status.is_success() {
        error!(
            "[GraphQL] {}请求失败，HTTP状态: {}, 响应: {}",
            operation_name, status, body_str
        );
        return Err(anyhow::anyhow!("HTTP 错误 {}: {}", status, body_str));
    }

    decode_graphql_body(&body_bytes, operation_name)
}

/// 解析 GraphQL 响应体，顶层错误或缺失 data 均返回 Err
pub fn decode_graphql_body<T: DeserializeOwned>(body: &[u8], operation_name: &str) -> Result<T> {
    let resp: GraphQlResponse<T> = serde_json::from_slice(body).map_err(|e| {
        error!(
            "[GraphQL] {}反序列化失败: {:?}\n原始响应: {}",
            operation_name,
            e,
            String::from_utf8_lossy(body)
        );
        anyhow::anyhow!("反序列化响应失败: {:?}", e)
    })?;

    if !resp.errors.is_empty() {
        let messages = resp
            .errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        error!("[GraphQL] {}服务器错误: {}", operation_name, messages);
        return Err(anyhow::anyhow!("服务器错误: {}", messages));
    }

    resp.data
        .ok_or_else(|| anyhow::anyhow!("{} 响应中缺少 data 字段", operation_name))
}

//! 条目草稿数据访问层（DAO）
//!
//! 把编辑中的条目保存到本地 SQLite，进程重启后可以继续上次的编辑会话。
//! 条目整体以 JSON 存在 payload 列，其余列用于查询。

use crate::tagging::entry::models::Entry;
use anyhow::{Context, Result};
use sqlx::{Pool, Row, Sqlite};
use tracing::debug;

/// 条目草稿 DAO（基于 sqlx）
pub struct EntryDraftDao {
    db: Pool<Sqlite>,
}

impl EntryDraftDao {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// 用给定列表替换某个来源文档下的全部草稿（单个事务）
    pub async fn save_lead_entries(&self, lead_id: &str, entries: &[Entry]) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let mut tx = self.db.begin().await.context("开启事务失败")?;

        sqlx::query("DELETE FROM local_entries WHERE lead_id = ?")
            .bind(lead_id)
            .execute(&mut *tx)
            .await
            .context("清理旧草稿失败")?;

        for (position, entry) in entries.iter().enumerate() {
            let payload = serde_json::to_string(entry).context("序列化条目失败")?;
            let entry_type = serde_json::to_value(entry.entry_type)?
                .as_str()
                .unwrap_or_default()
                .to_string();
            sqlx::query(
                r#"
                INSERT INTO local_entries
                    (client_id, lead_id, position, server_id, entry_type, stale, deleted, payload, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&entry.client_id)
            .bind(lead_id)
            .bind(position as i64)
            .bind(&entry.server_id)
            .bind(entry_type)
            .bind(entry.stale as i64)
            .bind(entry.deleted as i64)
            .bind(payload)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("写入条目草稿失败: {}", entry.client_id))?;
        }

        tx.commit().await.context("提交事务失败")?;
        debug!(
            "[EntryDAO] 保存来源文档 {} 的草稿，共 {} 个条目",
            lead_id,
            entries.len()
        );
        Ok(())
    }

    /// 按原有顺序读取某个来源文档下的草稿
    pub async fn load_lead_entries(&self, lead_id: &str) -> Result<Vec<Entry>> {
        let rows = sqlx::query(
            r#"
            SELECT payload, stale, deleted
            FROM local_entries
            WHERE lead_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(lead_id)
        .fetch_all(&self.db)
        .await
        .context("查询条目草稿失败")?;

        let entries = rows
            .into_iter()
            .map(|row| {
                let payload: String = row.get("payload");
                let mut entry: Entry =
                    serde_json::from_str(&payload).context("解析条目草稿失败")?;
                entry.stale = row.get::<i64, _>("stale") != 0;
                entry.deleted = row.get::<i64, _>("deleted") != 0;
                Ok(entry)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "[EntryDAO] 读取来源文档 {} 的草稿，共 {} 个条目",
            lead_id,
            entries.len()
        );
        Ok(entries)
    }

    /// 删除某个来源文档下的全部草稿
    pub async fn clear_lead(&self, lead_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM local_entries WHERE lead_id = ?")
            .bind(lead_id)
            .execute(&self.db)
            .await
            .context("删除条目草稿失败")?;
        Ok(result.rows_affected())
    }
}

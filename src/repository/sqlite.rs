//! SQLite仓库实现
//!
//! 基于 sqlx 访问与CRUD层共享的数据库（`monitors`、`monitor_logs`、`snippets` 三张表）。
//! 时间统一存储为定宽的 RFC 3339 UTC 文本，比较时交给 SQLite 的 `julianday()`，
//! 以兼容 `CURRENT_TIMESTAMP` 默认值写入的 `YYYY-MM-DD HH:MM:SS` 格式。

use super::{Endpoint, ExpiringRecordRepository, MonitorRepository};
use crate::error::{RepositoryError, RepositoryResult};
use crate::health::CheckOutcome;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info};

/// 建表语句，仅在表不存在时创建
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS monitors (
        id TEXT PRIMARY KEY,
        user_id TEXT,
        name TEXT NOT NULL DEFAULT '',
        url TEXT NOT NULL,
        interval_seconds INTEGER NOT NULL DEFAULT 300,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS monitor_logs (
        id TEXT PRIMARY KEY,
        monitor_id TEXT NOT NULL,
        status TEXT NOT NULL,
        status_code INTEGER,
        response_time_ms INTEGER,
        error_message TEXT,
        checked_at TEXT DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (monitor_id) REFERENCES monitors(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_monitor_logs_monitor_checked
        ON monitor_logs (monitor_id, checked_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS snippets (
        id TEXT PRIMARY KEY,
        hash TEXT NOT NULL UNIQUE,
        content TEXT NOT NULL DEFAULT '',
        expires_at TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    )
    "#,
];

/// SQLite仓库
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// 打开（必要时创建）数据库文件
    ///
    /// # 参数
    /// * `path` - 数据库文件路径
    /// * `max_connections` - 连接池大小
    pub async fn connect<P: AsRef<Path>>(path: P, max_connections: u32) -> RepositoryResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        info!("已连接数据库: {}", path.as_ref().display());
        Ok(Self { pool })
    }

    /// 单连接内存数据库，连接关闭即丢弃数据
    pub async fn in_memory() -> RepositoryResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Ok(Self { pool })
    }

    /// 连接池
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 确保所需的表存在
    pub async fn ensure_schema(&self) -> RepositoryResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("数据库表结构检查完成");
        Ok(())
    }

    /// 写入端点（通常由CRUD层负责，这里用于初始化和测试）
    pub async fn insert_endpoint(&self, endpoint: &Endpoint) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO monitors (id, url, interval_seconds, is_active)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&endpoint.id)
        .bind(&endpoint.url)
        .bind(i64::try_from(endpoint.interval_seconds).unwrap_or(i64::MAX))
        .bind(i64::from(endpoint.is_active))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 写入一条带过期时间的片段（通常由片段服务负责，这里用于测试）
    pub async fn insert_snippet(
        &self,
        id: &str,
        hash: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> RepositoryResult<()> {
        sqlx::query("INSERT INTO snippets (id, hash, expires_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(hash)
            .bind(expires_at.map(format_timestamp))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// 剩余片段数量
    pub async fn snippet_count(&self) -> RepositoryResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM snippets")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// 指定端点最近的探测记录，按时间倒序
    pub async fn list_outcomes(
        &self,
        endpoint_id: &str,
        limit: i64,
    ) -> RepositoryResult<Vec<CheckOutcome>> {
        let rows = sqlx::query(
            r#"
            SELECT id, monitor_id, status, status_code, response_time_ms,
                   COALESCE(error_message, '') AS error_message, checked_at
            FROM monitor_logs
            WHERE monitor_id = ?
            ORDER BY julianday(checked_at) DESC
            LIMIT ?
            "#,
        )
        .bind(endpoint_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(outcome_from_row).collect()
    }
}

#[async_trait]
impl MonitorRepository for SqliteRepository {
    async fn list_active(&self) -> RepositoryResult<Vec<Endpoint>> {
        let rows = sqlx::query(
            r#"
            SELECT id, url, interval_seconds
            FROM monitors
            WHERE is_active = 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> RepositoryResult<Endpoint> {
                let interval: i64 = row.try_get("interval_seconds")?;
                Ok(Endpoint {
                    id: row.try_get("id")?,
                    url: row.try_get("url")?,
                    interval_seconds: u64::try_from(interval).map_err(|_| {
                        RepositoryError::Data(format!("无效的探测间隔: {interval}"))
                    })?,
                    is_active: true,
                })
            })
            .collect()
    }

    async fn last_checked_at(&self, endpoint_id: &str) -> RepositoryResult<Option<DateTime<Utc>>> {
        let checked_at: Option<String> = sqlx::query_scalar(
            r#"
            SELECT checked_at FROM monitor_logs
            WHERE monitor_id = ? AND checked_at IS NOT NULL
            ORDER BY julianday(checked_at) DESC
            LIMIT 1
            "#,
        )
        .bind(endpoint_id)
        .fetch_optional(&self.pool)
        .await?;

        checked_at.as_deref().map(parse_timestamp).transpose()
    }

    async fn record_outcome(&self, outcome: &CheckOutcome) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO monitor_logs (
                id, monitor_id, status, status_code, response_time_ms, error_message, checked_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(outcome.id.to_string())
        .bind(&outcome.endpoint_id)
        .bind(outcome.status.as_str())
        .bind(i64::from(outcome.status_code))
        .bind(i64::try_from(outcome.response_time_ms).unwrap_or(i64::MAX))
        .bind(&outcome.error_message)
        .bind(format_timestamp(outcome.checked_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ExpiringRecordRepository for SqliteRepository {
    async fn delete_expired(&self, now: DateTime<Utc>) -> RepositoryResult<u64> {
        let result = sqlx::query(
            "DELETE FROM snippets WHERE expires_at IS NOT NULL AND julianday(expires_at) < julianday(?)",
        )
        .bind(format_timestamp(now))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// 格式化为定宽的 RFC 3339 UTC 文本
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// SQLite 时间函数接受的无时区文本格式，小数秒可选
const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// 解析 RFC 3339 或 SQLite `CURRENT_TIMESTAMP` 格式，无时区的文本按 UTC 处理
fn parse_timestamp(raw: &str) -> RepositoryResult<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| RepositoryError::Data(format!("无效的时间戳: {raw}")))
}

fn outcome_from_row(row: &SqliteRow) -> RepositoryResult<CheckOutcome> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let status_code: Option<i64> = row.try_get("status_code")?;
    let response_time_ms: Option<i64> = row.try_get("response_time_ms")?;
    let checked_at: String = row.try_get("checked_at")?;

    Ok(CheckOutcome {
        id: id
            .parse()
            .map_err(|e| RepositoryError::Data(format!("无效的记录ID {id}: {e}")))?,
        endpoint_id: row.try_get("monitor_id")?,
        status: status.parse().map_err(RepositoryError::Data)?,
        status_code: u16::try_from(status_code.unwrap_or(0)).unwrap_or(0),
        response_time_ms: u64::try_from(response_time_ms.unwrap_or(0)).unwrap_or(0),
        error_message: row.try_get("error_message")?,
        checked_at: parse_timestamp(&checked_at)?,
    })
}

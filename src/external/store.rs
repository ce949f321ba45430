//! Persistent store (spec.md §6): the core uses only `Exec`, `Query`,
//! `QueryRow` with parameterized SQL — never the full `sqlx` query builder
//! surface, so a non-`sqlx` SQL store could stand in behind the same trait.

use crate::error::{TradingError, TradingResult};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

/// A bound parameter. Kept to the primitive set the core's schema needs.
#[derive(Debug, Clone)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Null,
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

pub type SqlRow = HashMap<String, serde_json::Value>;

/// The narrow SQL-compatible persistence surface (spec.md §6): `Exec`,
/// `Query`, `QueryRow` with parameterized SQL only.
#[async_trait]
pub trait Store: Send + Sync {
    async fn exec(&self, sql: &str, params: &[SqlValue]) -> TradingResult<u64>;
    async fn query(&self, sql: &str, params: &[SqlValue]) -> TradingResult<Vec<SqlRow>>;
    async fn query_row(&self, sql: &str, params: &[SqlValue]) -> TradingResult<Option<SqlRow>>;
}

/// `sqlx`-backed implementation over SQLite, the pack's closest match for a
/// SQL-compatible embedded relational store (the teacher itself uses a
/// DragonflyDB key-value store, which has no relational/indexed schema).
pub struct SqlxStore {
    pool: SqlitePool,
}

impl SqlxStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the core's owned schema if it does not already exist
    /// (spec.md §6): `ai_sessions`, `ai_trade_memory`, `ai_lessons`,
    /// `quests`, `autonomous_state`.
    pub async fn run_migrations(&self) -> TradingResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ai_sessions (
                id TEXT PRIMARY KEY,
                quest_id TEXT,
                symbol TEXT NOT NULL,
                status TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_ai_sessions_status ON ai_sessions(status);")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_ai_sessions_symbol ON ai_sessions(symbol);")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_ai_sessions_updated_at ON ai_sessions(updated_at);",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ai_trade_memory (
                id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ai_lessons (
                id TEXT PRIMARY KEY,
                topic TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quests (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                payload TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS autonomous_state (
                id TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn bind<'q>(
        mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
        params: &'q [SqlValue],
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        for p in params {
            query = match p {
                SqlValue::Text(s) => query.bind(s.as_str()),
                SqlValue::Integer(i) => query.bind(i),
                SqlValue::Real(r) => query.bind(r),
                SqlValue::Null => query.bind(None::<String>),
            };
        }
        query
    }

    fn row_to_map(row: &sqlx::sqlite::SqliteRow) -> SqlRow {
        let mut map = SqlRow::new();
        for column in row.columns() {
            let name = column.name().to_string();
            let value: serde_json::Value = row
                .try_get::<String, _>(column.ordinal())
                .map(serde_json::Value::String)
                .or_else(|_| row.try_get::<i64, _>(column.ordinal()).map(|v| v.into()))
                .or_else(|_| {
                    row.try_get::<f64, _>(column.ordinal())
                        .map(|v| serde_json::Number::from_f64(v).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null))
                })
                .unwrap_or(serde_json::Value::Null);
            map.insert(name, value);
        }
        map
    }
}

#[async_trait]
impl Store for SqlxStore {
    async fn exec(&self, sql: &str, params: &[SqlValue]) -> TradingResult<u64> {
        let query = Self::bind(sqlx::query(sql), params);
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> TradingResult<Vec<SqlRow>> {
        let query = Self::bind(sqlx::query(sql), params);
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(Self::row_to_map).collect())
    }

    async fn query_row(&self, sql: &str, params: &[SqlValue]) -> TradingResult<Option<SqlRow>> {
        let query = Self::bind(sqlx::query(sql), params);
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(Self::row_to_map))
    }
}

/// In-memory store for tests: a single table keyed by the first bound
/// parameter, enough to exercise the session repository's upsert logic
/// without a real database.
#[derive(Default)]
pub struct MockStore {
    rows: tokio::sync::RwLock<HashMap<String, SqlRow>>,
}

#[async_trait]
impl Store for MockStore {
    async fn exec(&self, _sql: &str, params: &[SqlValue]) -> TradingResult<u64> {
        let key = match params.first() {
            Some(SqlValue::Text(s)) => s.clone(),
            _ => return Err(TradingError::Validation("mock store requires a text key as first param".into())),
        };
        let mut rows = self.rows.write().await;
        let mut map = SqlRow::new();
        for (i, p) in params.iter().enumerate() {
            let v = match p {
                SqlValue::Text(s) => serde_json::Value::String(s.clone()),
                SqlValue::Integer(i) => (*i).into(),
                SqlValue::Real(r) => serde_json::Number::from_f64(*r).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null),
                SqlValue::Null => serde_json::Value::Null,
            };
            map.insert(format!("p{i}"), v);
        }
        rows.insert(key, map);
        Ok(1)
    }

    async fn query(&self, _sql: &str, _params: &[SqlValue]) -> TradingResult<Vec<SqlRow>> {
        Ok(self.rows.read().await.values().cloned().collect())
    }

    async fn query_row(&self, _sql: &str, params: &[SqlValue]) -> TradingResult<Option<SqlRow>> {
        let key = match params.first() {
            Some(SqlValue::Text(s)) => s.clone(),
            _ => return Ok(None),
        };
        Ok(self.rows.read().await.get(&key).cloned())
    }
}

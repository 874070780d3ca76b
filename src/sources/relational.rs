//! Relational source boundary, backed by sqlx's `Any` driver

use crate::sources::error::{SourceError, SourceResult};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use std::time::Duration;
use tracing::debug;

lazy_static! {
    static ref IDENTIFIER: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").expect("valid regex");
}

/// Read-only access to the databases dimension values come from.
#[async_trait]
pub trait RelationalSource: Send + Sync {
    fn name(&self) -> &str;

    /// Most frequent non-empty values of a column, at most `max_count`.
    async fn distinct_values(
        &self,
        table: &str,
        column: &str,
        max_count: usize,
    ) -> SourceResult<Vec<(String, u64)>>;

    async fn row_count(&self, table: &str) -> SourceResult<u64>;

    /// Cheap connectivity check
    async fn ping(&self) -> SourceResult<()>;

    /// Fails when the table or column cannot be read.
    async fn check_column(&self, table: &str, column: &str) -> SourceResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn from_url(url: &str) -> SourceResult<Self> {
        let scheme = url.split(':').next().unwrap_or_default().to_ascii_lowercase();
        match scheme.as_str() {
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(SourceError::Configuration(format!("unsupported database scheme '{}'", other))),
        }
    }

    fn quote(self, identifier: &str) -> SourceResult<String> {
        if !IDENTIFIER.is_match(identifier) {
            return Err(SourceError::InvalidIdentifier(identifier.to_string()));
        }
        let quoted = identifier
            .split('.')
            .map(|part| match self {
                Dialect::MySql => format!("`{}`", part),
                Dialect::Postgres | Dialect::Sqlite => format!("\"{}\"", part),
            })
            .collect::<Vec<_>>()
            .join(".");
        Ok(quoted)
    }

    fn text_type(self) -> &'static str {
        match self {
            Dialect::MySql => "CHAR",
            Dialect::Postgres | Dialect::Sqlite => "TEXT",
        }
    }

    /// Grouped value/frequency query for one column.
    pub fn distinct_values_sql(self, table: &str, column: &str, max_count: usize) -> SourceResult<String> {
        let table = self.quote(table)?;
        let column = self.quote(column)?;
        let value = format!("CAST({} AS {})", column, self.text_type());
        Ok(format!(
            "SELECT {value} AS value, COUNT(*) AS frequency FROM {table} \
             WHERE {column} IS NOT NULL AND {value} <> '' \
             GROUP BY {column} ORDER BY frequency DESC, value ASC LIMIT {limit}",
            value = value,
            table = table,
            column = column,
            limit = max_count,
        ))
    }
}

/// A configured source database
pub struct SqlSource {
    name: String,
    dialect: Dialect,
    pool: AnyPool,
}

impl SqlSource {
    /// Create a lazily connecting pool; nothing is dialed until first use.
    pub fn connect_lazy(
        name: impl Into<String>,
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> SourceResult<Self> {
        sqlx::any::install_default_drivers();
        let dialect = Dialect::from_url(url)?;
        let pool = AnyPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(acquire_timeout)
            .connect_lazy(url)?;

        Ok(Self {
            name: name.into(),
            dialect,
            pool,
        })
    }

    /// Wrap an existing pool.
    pub fn from_pool(name: impl Into<String>, dialect: Dialect, pool: AnyPool) -> Self {
        Self {
            name: name.into(),
            dialect,
            pool,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn decode_value(row: &AnyRow) -> SourceResult<Option<(String, u64)>> {
        let value: Option<String> = row.try_get("value")?;
        let frequency: i64 = row.try_get("frequency")?;
        Ok(value.map(|v| (v, u64::try_from(frequency).unwrap_or(0))))
    }
}

#[async_trait]
impl RelationalSource for SqlSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn distinct_values(
        &self,
        table: &str,
        column: &str,
        max_count: usize,
    ) -> SourceResult<Vec<(String, u64)>> {
        let sql = self.dialect.distinct_values_sql(table, column, max_count)?;
        debug!(source = %self.name, sql = %sql, "Extracting distinct values");

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        let mut values = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(pair) = Self::decode_value(row)? {
                values.push(pair);
            }
        }
        Ok(values)
    }

    async fn row_count(&self, table: &str) -> SourceResult<u64> {
        let sql = format!("SELECT COUNT(*) AS n FROM {}", self.dialect.quote(table)?);
        let row = sqlx::query(&sql).fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("n")?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn ping(&self) -> SourceResult<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    async fn check_column(&self, table: &str, column: &str) -> SourceResult<()> {
        let sql = format!(
            "SELECT {} FROM {} LIMIT 1",
            self.dialect.quote(column)?,
            self.dialect.quote(table)?
        );
        sqlx::query(&sql).fetch_optional(&self.pool).await?;
        Ok(())
    }
}

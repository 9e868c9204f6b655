//! SQLite backend
//!
//! SQLite has no array or JSON column types, so string lists and JSON
//! documents are stored as JSON text and parsed on the way out.

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqlitePool, SqliteRow};
use sqlx::{Row as _, Sqlite};

use super::{Backend, Column, ColumnType, Dialect, Row, Statement, Value};

/// Backend over a SQLite connection pool
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, sqlx::Error> {
        tracing::trace!(sql = %statement.sql, "executing statement");

        let result = bind_all(statement).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn fetch_all(
        &self,
        statement: &Statement,
        columns: &[Column],
    ) -> Result<Vec<Row>, sqlx::Error> {
        tracing::trace!(sql = %statement.sql, "running query");

        let rows = bind_all(statement).fetch_all(&self.pool).await?;
        rows.iter().map(|row| decode(row, columns)).collect()
    }

    async fn fetch_scalar(&self, statement: &Statement) -> Result<i64, sqlx::Error> {
        tracing::trace!(sql = %statement.sql, "running scalar query");

        let row = bind_all(statement).fetch_one(&self.pool).await?;
        row.try_get::<i64, _>(0)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn bind_all(statement: &Statement) -> Query<'_, Sqlite, SqliteArguments<'_>> {
    let mut query = sqlx::query(&statement.sql);

    for arg in &statement.args {
        query = match arg {
            Value::Int(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.as_str()),
            Value::Bool(v) => query.bind(*v),
            Value::Bytes(v) => query.bind(v.as_slice()),
            Value::List(v) => query.bind(encode_json(v)),
            Value::Json(v) => query.bind(v.to_string()),
        };
    }

    query
}

fn encode_json(list: &[String]) -> String {
    serde_json::Value::from(list.to_vec()).to_string()
}

fn decode(row: &SqliteRow, columns: &[Column]) -> Result<Row, sqlx::Error> {
    let mut out = Row::new();

    for column in columns {
        let name = column.name;
        let value = match column.kind {
            ColumnType::Int => row.try_get::<Option<i64>, _>(name)?.map(Value::Int),
            ColumnType::Text => row.try_get::<Option<String>, _>(name)?.map(Value::Text),
            ColumnType::Bool => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool),
            ColumnType::Bytes => row.try_get::<Option<Vec<u8>>, _>(name)?.map(Value::Bytes),
            ColumnType::List => match non_empty_text(row, name)? {
                Some(text) => Some(Value::List(
                    serde_json::from_str(&text).map_err(|e| column_decode(name, e))?,
                )),
                None => None,
            },
            ColumnType::Json => match non_empty_text(row, name)? {
                Some(text) => Some(Value::Json(
                    serde_json::from_str(&text).map_err(|e| column_decode(name, e))?,
                )),
                None => None,
            },
        };

        out.insert(name, value.unwrap_or_else(|| column.kind.zero()));
    }

    Ok(out)
}

fn non_empty_text(row: &SqliteRow, name: &str) -> Result<Option<String>, sqlx::Error> {
    Ok(row
        .try_get::<Option<String>, _>(name)?
        .filter(|text| !text.is_empty()))
}

fn column_decode(name: &str, err: serde_json::Error) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: name.to_string(),
        source: Box::new(err),
    }
}

//! PostgreSQL backend
//!
//! String lists are stored as `TEXT[]` and JSON documents as `JSONB`.

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{Postgres, Row as _};

use super::{Backend, Column, ColumnType, Dialect, Row, Statement, Value};

/// Backend over a PostgreSQL connection pool
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Backend for PostgresBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
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

fn bind_all(statement: &Statement) -> Query<'_, Postgres, PgArguments> {
    let mut query = sqlx::query(&statement.sql);

    for arg in &statement.args {
        query = match arg {
            Value::Int(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.as_str()),
            Value::Bool(v) => query.bind(*v),
            Value::Bytes(v) => query.bind(v.as_slice()),
            Value::List(v) => query.bind(v.clone()),
            Value::Json(v) => query.bind(Json(v.clone())),
        };
    }

    query
}

fn decode(row: &PgRow, columns: &[Column]) -> Result<Row, sqlx::Error> {
    let mut out = Row::new();

    for column in columns {
        let name = column.name;
        let value = match column.kind {
            ColumnType::Int => row.try_get::<Option<i64>, _>(name)?.map(Value::Int),
            ColumnType::Text => row.try_get::<Option<String>, _>(name)?.map(Value::Text),
            ColumnType::Bool => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool),
            ColumnType::Bytes => row.try_get::<Option<Vec<u8>>, _>(name)?.map(Value::Bytes),
            ColumnType::List => row
                .try_get::<Option<Vec<String>>, _>(name)?
                .map(Value::List),
            ColumnType::Json => row
                .try_get::<Option<Json<serde_json::Value>>, _>(name)?
                .map(|json| Value::Json(json.0)),
        };

        out.insert(name, value.unwrap_or_else(|| column.kind.zero()));
    }

    Ok(out)
}

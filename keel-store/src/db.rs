//! Connection and schema bootstrap
//!
//! Opens the configured pool, wraps it in the matching backend, and
//! creates the tables and indexes the engines expect.

use std::str::FromStr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::backend::{Backend, Dialect, PostgresBackend, SqliteBackend, Statement};
use crate::codec::Codec;
use crate::config::{Driver, StoreConfig};
use crate::error::{Result, StoreError};
use crate::store::Store;

/// Connect to the configured database
pub async fn connect(config: &StoreConfig) -> anyhow::Result<Store> {
    config.validate()?;

    let backend: Arc<dyn Backend> = match config.driver {
        Driver::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(config.acquire_timeout)
                .connect(&config.url)
                .await?;

            Arc::new(PostgresBackend::new(pool))
        }
        Driver::Sqlite => {
            let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

            // Every connection to an in-memory database opens a fresh one,
            // so the pool is pinned to a single connection that never expires.
            let in_memory = config.url.contains(":memory:") || config.url.contains("mode=memory");
            let mut pool = SqlitePoolOptions::new().acquire_timeout(config.acquire_timeout);
            pool = if in_memory {
                pool.max_connections(1).idle_timeout(None).max_lifetime(None)
            } else {
                pool.max_connections(config.max_connections)
            };

            Arc::new(SqliteBackend::new(pool.connect_with(options).await?))
        }
    };

    tracing::info!(driver = %config.driver, "database connection pool created");

    Ok(Store::new(
        backend,
        Codec::new(config.compression_level),
        config.statement_timeout,
    ))
}

/// Create every table and index used by the store, if missing
pub async fn run_migrations(store: &Store) -> Result<()> {
    let dialect = store.dialect();

    for sql in schema(dialect) {
        let statement = Statement {
            sql,
            args: Vec::new(),
        };

        store
            .backend()
            .execute(&statement)
            .await
            .map_err(|e| StoreError::from_sqlx("schema", e))?;
    }

    tracing::info!(%dialect, "database migrations completed successfully");
    Ok(())
}

/// Physical column types that differ between dialects
struct Types {
    id: &'static str,
    bytes: &'static str,
    json: &'static str,
    list: &'static str,
}

impl Types {
    fn of(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Postgres => Types {
                id: "BIGSERIAL PRIMARY KEY",
                bytes: "BYTEA",
                json: "JSONB",
                list: "TEXT[]",
            },
            Dialect::Sqlite => Types {
                id: "INTEGER PRIMARY KEY AUTOINCREMENT",
                bytes: "BLOB",
                json: "TEXT",
                list: "TEXT",
            },
        }
    }
}

fn schema(dialect: Dialect) -> Vec<String> {
    let Types {
        id,
        bytes,
        json,
        list,
    } = Types::of(dialect);

    vec![
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS "builds" (
                "id"             {id},
                "repo_id"        BIGINT NOT NULL,
                "number"         BIGINT NOT NULL,
                "parent"         BIGINT,
                "event"          VARCHAR(250),
                "status"         VARCHAR(250),
                "error"          VARCHAR(1000),
                "enqueued"       BIGINT,
                "created"        BIGINT,
                "started"        BIGINT,
                "finished"       BIGINT,
                "deploy"         VARCHAR(500),
                "deploy_payload" {json},
                "commit"         VARCHAR(500),
                "branch"         VARCHAR(500),
                "ref"            VARCHAR(500),
                "message"        VARCHAR(2000),
                "author"         VARCHAR(250),
                "sender"         VARCHAR(250),
                "host"           VARCHAR(250),
                UNIQUE ("repo_id", "number")
            )
            "#
        ),
        r#"CREATE INDEX IF NOT EXISTS "builds_status" ON "builds" ("status")"#.to_string(),
        r#"CREATE INDEX IF NOT EXISTS "builds_created" ON "builds" ("created")"#.to_string(),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS "pipelines" (
                "id"        {id},
                "repo_id"   BIGINT NOT NULL,
                "number"    BIGINT NOT NULL,
                "commit"    VARCHAR(500),
                "flavor"    VARCHAR(100),
                "platform"  VARCHAR(100),
                "ref"       VARCHAR(500),
                "type"      VARCHAR(100),
                "version"   VARCHAR(50),
                "services"  BOOLEAN,
                "stages"    BOOLEAN,
                "steps"     BOOLEAN,
                "templates" BOOLEAN,
                "data"      {bytes},
                UNIQUE ("repo_id", "number")
            )
            "#
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS "secrets" (
                "id"            {id},
                "type"          VARCHAR(100) NOT NULL,
                "org"           VARCHAR(250) NOT NULL,
                "repo"          VARCHAR(250),
                "team"          VARCHAR(250),
                "name"          VARCHAR(250) NOT NULL,
                "value"         TEXT,
                "images"        {list},
                "events"        {list},
                "allow_command" BOOLEAN,
                UNIQUE ("type", "org", "repo", "team", "name")
            )
            "#
        ),
        r#"CREATE INDEX IF NOT EXISTS "secrets_type_org" ON "secrets" ("type", "org")"#
            .to_string(),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS "services" (
                "id"           {id},
                "build_id"     BIGINT NOT NULL,
                "repo_id"      BIGINT NOT NULL,
                "number"       BIGINT NOT NULL,
                "name"         VARCHAR(250),
                "image"        VARCHAR(500),
                "status"       VARCHAR(250),
                "error"        VARCHAR(500),
                "exit_code"    BIGINT,
                "created"      BIGINT,
                "started"      BIGINT,
                "finished"     BIGINT,
                "host"         VARCHAR(250),
                "runtime"      VARCHAR(250),
                "distribution" VARCHAR(250),
                UNIQUE ("build_id", "number")
            )
            "#
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_uses_dialect_types() {
        let pg = schema(Dialect::Postgres).join("\n");
        assert!(pg.contains("BIGSERIAL PRIMARY KEY"));
        assert!(pg.contains(r#""deploy_payload" JSONB"#));
        assert!(pg.contains(r#""images"        TEXT[]"#));
        assert!(pg.contains(r#""data"      BYTEA"#));

        let lite = schema(Dialect::Sqlite).join("\n");
        assert!(lite.contains("INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(lite.contains(r#""data"      BLOB"#));
        assert!(!lite.contains("JSONB"));
        assert!(!lite.contains("TEXT[]"));
    }
}

//! Service Repository

use keel_core::domain::service::Service;

use super::{Engine, Filter, Page, Sort};
use crate::backend::{Column, Row};
use crate::codec::{Codec, Entity, RowReader};
use crate::error::{Result, StoreError};

impl Engine<Service> {
    /// Fetch a service by its build-scoped number
    pub async fn get_service_for_build(&self, build_id: i64, number: i64) -> Result<Service> {
        tracing::trace!(build_id, number, "getting service");

        let filter = Filter::new().eq("build_id", build_id).eq("number", number);
        self.find(&filter, &[])
            .await?
            .ok_or_else(|| StoreError::not_found(Service::KIND, format!("{build_id}/{number}")))
    }

    pub async fn list_services_for_build(&self, build_id: i64, page: Page) -> Result<Vec<Service>> {
        let filter = Filter::new().eq("build_id", build_id);
        self.list_ordered(&filter, &[Sort::Asc("number")], Some(page))
            .await
    }

    pub async fn count_services_for_build(&self, build_id: i64) -> Result<i64> {
        self.count(&Filter::new().eq("build_id", build_id)).await
    }
}

// =============================================================================
// Codec
// =============================================================================

const COLUMNS: &[Column] = &[
    Column::int("build_id"),
    Column::int("repo_id"),
    Column::int("number"),
    Column::text("name"),
    Column::text("image"),
    Column::text("status"),
    Column::text("error"),
    Column::int("exit_code"),
    Column::int("created"),
    Column::int("started"),
    Column::int("finished"),
    Column::text("host"),
    Column::text("runtime"),
    Column::text("distribution"),
];

impl Entity for Service {
    const KIND: &'static str = "service";
    const TABLE: &'static str = "services";
    const COLUMNS: &'static [Column] = COLUMNS;
    const ORDER: &'static [Sort] = &[Sort::Asc("id")];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn validate(&self) -> Result<()> {
        if self.build_id <= 0 {
            return Err(StoreError::missing(Self::KIND, "build_id"));
        }

        if self.repo_id <= 0 {
            return Err(StoreError::missing(Self::KIND, "repo_id"));
        }

        if self.number <= 0 {
            return Err(StoreError::missing(Self::KIND, "number"));
        }

        if self.name.is_empty() {
            return Err(StoreError::missing(Self::KIND, "name"));
        }

        if self.image.is_empty() {
            return Err(StoreError::missing(Self::KIND, "image"));
        }

        Ok(())
    }

    fn to_row(&self, _codec: &Codec) -> Result<Row> {
        Ok(Row::new()
            .with("build_id", self.build_id)
            .with("repo_id", self.repo_id)
            .with("number", self.number)
            .with("name", self.name.as_str())
            .with("image", self.image.as_str())
            .with("status", self.status.as_str())
            .with("error", self.error.as_str())
            .with("exit_code", self.exit_code)
            .with("created", self.created)
            .with("started", self.started)
            .with("finished", self.finished)
            .with("host", self.host.as_str())
            .with("runtime", self.runtime.as_str())
            .with("distribution", self.distribution.as_str()))
    }

    fn from_row(mut row: RowReader, _codec: &Codec) -> Result<Self> {
        Ok(Service {
            id: row.int("id")?,
            build_id: row.int("build_id")?,
            repo_id: row.int("repo_id")?,
            number: row.int("number")?,
            name: row.text("name")?,
            image: row.text("image")?,
            status: row.text("status")?,
            error: row.text("error")?,
            exit_code: row.int("exit_code")?,
            created: row.int("created")?,
            started: row.int("started")?,
            finished: row.int("finished")?,
            host: row.text("host")?,
            runtime: row.text("runtime")?,
            distribution: row.text("distribution")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Dialect;
    use crate::backend::mock::MockBackend;
    use std::sync::Arc;
    use std::time::Duration;

    fn service() -> Service {
        Service {
            build_id: 1,
            repo_id: 1,
            number: 1,
            name: "postgres".to_string(),
            image: "postgres:16".to_string(),
            status: "running".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_requires_image() {
        assert!(service().validate().is_ok());

        let mut s = service();
        s.image.clear();
        let err = s.validate().unwrap_err();
        assert!(matches!(err, StoreError::Validation { field: "image", .. }));
    }

    #[tokio::test]
    async fn test_create_returns_assigned_id() {
        let backend = Arc::new(MockBackend::new(Dialect::Sqlite).with_scalar(9));
        let engine: Engine<Service> =
            Engine::new(backend.clone(), Codec::default(), Duration::from_secs(5));

        let created = engine.create(&service()).await.unwrap();
        assert_eq!(created.id, 9);
        assert_eq!(created.name, "postgres");

        let statement = backend.last();
        assert!(statement.sql.starts_with(r#"INSERT INTO "services" ("build_id", "repo_id""#));
        assert!(statement.sql.ends_with("RETURNING id"));
        assert_eq!(statement.args.len(), COLUMNS.len());
    }

    #[tokio::test]
    async fn test_explicit_id_advances_postgres_sequence() {
        let backend = Arc::new(MockBackend::new(Dialect::Postgres).with_scalar(77));
        let engine: Engine<Service> =
            Engine::new(backend.clone(), Codec::default(), Duration::from_secs(5));

        let mut s = service();
        s.id = 77;
        assert_eq!(engine.create(&s).await.unwrap().id, 77);

        let statements = backend.statements();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].sql.starts_with(r#"INSERT INTO "services" ("id", "build_id""#));
        assert_eq!(statements[0].args.len(), COLUMNS.len() + 1);
        assert_eq!(
            statements[1].sql,
            r#"SELECT setval(pg_get_serial_sequence('"services"', 'id'), GREATEST(MAX("id"), 1)) FROM "services""#
        );
    }

    #[tokio::test]
    async fn test_explicit_id_on_sqlite_is_a_single_insert() {
        let backend = Arc::new(MockBackend::new(Dialect::Sqlite).with_scalar(77));
        let engine: Engine<Service> =
            Engine::new(backend.clone(), Codec::default(), Duration::from_secs(5));

        let mut s = service();
        s.id = 77;
        engine.create(&s).await.unwrap();

        let statements = backend.statements();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].sql.starts_with(r#"INSERT INTO "services" ("id", "build_id""#));
    }

    #[tokio::test]
    async fn test_create_without_id_leaves_sequence_alone() {
        let backend = Arc::new(MockBackend::new(Dialect::Postgres).with_scalar(3));
        let engine: Engine<Service> =
            Engine::new(backend.clone(), Codec::default(), Duration::from_secs(5));

        engine.create(&service()).await.unwrap();
        assert_eq!(backend.statements().len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_service_without_query() {
        let backend = Arc::new(MockBackend::new(Dialect::Postgres));
        let engine: Engine<Service> =
            Engine::new(backend.clone(), Codec::default(), Duration::from_secs(5));

        let err = engine.create(&Service::default()).await.unwrap_err();
        assert!(err.is_validation());
        assert!(backend.statements().is_empty());
    }

    #[tokio::test]
    async fn test_update_of_missing_row_is_not_found() {
        let backend = Arc::new(MockBackend::new(Dialect::Postgres));
        let engine: Engine<Service> =
            Engine::new(backend.clone(), Codec::default(), Duration::from_secs(5));

        let mut s = service();
        s.id = 42;
        let err = engine.update(&s).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(backend.last().sql.ends_with(r#"WHERE "id" = $15"#));
    }
}

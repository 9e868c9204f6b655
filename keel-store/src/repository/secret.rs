//! Secret Repository
//!
//! Secret codec and scope-aware lookups. A request names a secret type,
//! an org, a repo or team, and a secret name; each type maps that request
//! onto a different column combination:
//!
//! | type     | predicate                                         |
//! |----------|---------------------------------------------------|
//! | `repo`   | `org = ? AND repo IN (?, '*') AND name = ?`       |
//! | `org`    | `org = ? AND repo = '*' AND name = ?`             |
//! | `shared` | `org = ? AND team = ? AND name = ?`               |
//!
//! Every predicate also matches on `type`. When a repo secret exists both
//! for the exact repository and for the org wildcard, the exact row wins.
//! Secret values are never logged.

use keel_core::domain::secret::{Secret, SecretType, WILDCARD};

use super::{Engine, Filter, Page, Sort};
use crate::backend::{Column, Row};
use crate::codec::{Codec, Entity, RowReader};
use crate::error::{Result, StoreError};

/// Exact repository rows before wildcard rows, then insertion order
const NARROWEST_FIRST: &[Sort] = &[Sort::WildcardLast("repo"), Sort::Asc("id")];

impl Engine<Secret> {
    /// Resolve a secret by scope and name
    ///
    /// `repo_or_team` is the repository for `repo` secrets and the team for
    /// `shared` secrets; it is ignored for `org` secrets.
    pub async fn get_secret(
        &self,
        kind: SecretType,
        org: &str,
        repo_or_team: &str,
        name: &str,
    ) -> Result<Secret> {
        tracing::trace!(%kind, org, repo_or_team, name, "getting secret");

        let filter = scope(kind, org, repo_or_team).eq("name", name);
        let order: &[Sort] = match kind {
            SecretType::Repo => NARROWEST_FIRST,
            SecretType::Org | SecretType::Shared => &[],
        };

        self.find(&filter, order).await?.ok_or_else(|| {
            StoreError::not_found(Secret::KIND, format!("{kind}/{org}/{repo_or_team}/{name}"))
        })
    }

    /// Repo secrets visible to `org/repo`, exact rows before wildcard rows
    pub async fn list_secrets_for_repo(
        &self,
        org: &str,
        repo: &str,
        page: Page,
    ) -> Result<Vec<Secret>> {
        self.list_ordered(&scope(SecretType::Repo, org, repo), NARROWEST_FIRST, Some(page))
            .await
    }

    pub async fn list_secrets_for_org(&self, org: &str, page: Page) -> Result<Vec<Secret>> {
        self.list(&scope(SecretType::Org, org, WILDCARD), Some(page))
            .await
    }

    pub async fn list_secrets_for_team(
        &self,
        org: &str,
        team: &str,
        page: Page,
    ) -> Result<Vec<Secret>> {
        self.list(&scope(SecretType::Shared, org, team), Some(page))
            .await
    }

    /// Dispatch to the list query for `kind`
    pub async fn list_secrets(
        &self,
        kind: SecretType,
        org: &str,
        repo_or_team: &str,
        page: Page,
    ) -> Result<Vec<Secret>> {
        match kind {
            SecretType::Repo => self.list_secrets_for_repo(org, repo_or_team, page).await,
            SecretType::Org => self.list_secrets_for_org(org, page).await,
            SecretType::Shared => self.list_secrets_for_team(org, repo_or_team, page).await,
        }
    }

    pub async fn count_secrets_for_repo(&self, org: &str, repo: &str) -> Result<i64> {
        self.count(&scope(SecretType::Repo, org, repo)).await
    }

    pub async fn count_secrets_for_org(&self, org: &str) -> Result<i64> {
        self.count(&scope(SecretType::Org, org, WILDCARD)).await
    }

    pub async fn count_secrets_for_team(&self, org: &str, team: &str) -> Result<i64> {
        self.count(&scope(SecretType::Shared, org, team)).await
    }

    /// Dispatch to the count query for `kind`
    pub async fn count_secrets(
        &self,
        kind: SecretType,
        org: &str,
        repo_or_team: &str,
    ) -> Result<i64> {
        match kind {
            SecretType::Repo => self.count_secrets_for_repo(org, repo_or_team).await,
            SecretType::Org => self.count_secrets_for_org(org).await,
            SecretType::Shared => self.count_secrets_for_team(org, repo_or_team).await,
        }
    }
}

/// Predicate selecting every secret visible at a scope, before name matching
fn scope(kind: SecretType, org: &str, repo_or_team: &str) -> Filter {
    let filter = Filter::new().eq("type", kind.as_str()).eq("org", org);

    match kind {
        SecretType::Repo => filter.is_in("repo", [repo_or_team, WILDCARD]),
        SecretType::Org => filter.eq("repo", WILDCARD),
        SecretType::Shared => filter.eq("team", repo_or_team),
    }
}

// =============================================================================
// Codec
// =============================================================================

const COLUMNS: &[Column] = &[
    Column::text("type"),
    Column::text("org"),
    Column::text("repo"),
    Column::text("team"),
    Column::text("name"),
    Column::text("value"),
    Column::list("images"),
    Column::list("events"),
    Column::bool("allow_command"),
];

impl Entity for Secret {
    const KIND: &'static str = "secret";
    const TABLE: &'static str = "secrets";
    const COLUMNS: &'static [Column] = COLUMNS;
    const ORDER: &'static [Sort] = &[Sort::Asc("id")];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn validate(&self) -> Result<()> {
        if self.org.is_empty() {
            return Err(StoreError::missing(Self::KIND, "org"));
        }

        match self.kind {
            SecretType::Repo if self.repo.is_empty() => {
                return Err(StoreError::missing(Self::KIND, "repo"));
            }
            SecretType::Org if self.repo != WILDCARD => {
                return Err(StoreError::validation(
                    Self::KIND,
                    "repo",
                    format!("must be {WILDCARD} for org secrets"),
                ));
            }
            SecretType::Shared if self.team.is_empty() => {
                return Err(StoreError::missing(Self::KIND, "team"));
            }
            _ => {}
        }

        if self.name.is_empty() {
            return Err(StoreError::missing(Self::KIND, "name"));
        }

        if self.value.is_empty() {
            return Err(StoreError::missing(Self::KIND, "value"));
        }

        Ok(())
    }

    fn to_row(&self, _codec: &Codec) -> Result<Row> {
        Ok(Row::new()
            .with("type", self.kind.as_str())
            .with("org", self.org.as_str())
            .with("repo", self.repo.as_str())
            .with("team", self.team.as_str())
            .with("name", self.name.as_str())
            .with("value", self.value.as_str())
            .with("images", self.images.clone())
            .with("events", self.events.clone())
            .with("allow_command", self.allow_command))
    }

    fn from_row(mut row: RowReader, _codec: &Codec) -> Result<Self> {
        Ok(Secret {
            id: row.int("id")?,
            kind: row.parse("type")?,
            org: row.text("org")?,
            repo: row.text("repo")?,
            team: row.text("team")?,
            name: row.text("name")?,
            value: row.text("value")?,
            images: row.list("images")?,
            events: row.list("events")?,
            allow_command: row.bool("allow_command")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::backend::{Dialect, Value};
    use std::sync::Arc;
    use std::time::Duration;

    fn secret(kind: SecretType, repo: &str, team: &str) -> Secret {
        Secret {
            kind,
            org: "octo".to_string(),
            repo: repo.to_string(),
            team: team.to_string(),
            name: "docker_password".to_string(),
            value: "hunter2".to_string(),
            ..Default::default()
        }
    }

    fn engine(backend: Arc<MockBackend>) -> Engine<Secret> {
        Engine::new(backend, Codec::default(), Duration::from_secs(5))
    }

    #[test]
    fn test_validate_per_type() {
        assert!(secret(SecretType::Repo, "hello", "").validate().is_ok());
        assert!(secret(SecretType::Repo, WILDCARD, "").validate().is_ok());
        assert!(secret(SecretType::Org, WILDCARD, "").validate().is_ok());
        assert!(secret(SecretType::Shared, "", "ops").validate().is_ok());

        let err = secret(SecretType::Repo, "", "").validate().unwrap_err();
        assert!(matches!(err, StoreError::Validation { field: "repo", .. }));

        let err = secret(SecretType::Org, "hello", "").validate().unwrap_err();
        assert!(matches!(err, StoreError::Validation { field: "repo", .. }));

        let err = secret(SecretType::Shared, "", "").validate().unwrap_err();
        assert!(matches!(err, StoreError::Validation { field: "team", .. }));
    }

    #[test]
    fn test_validate_requires_value() {
        let mut s = secret(SecretType::Repo, "hello", "");
        s.value.clear();

        let err = s.validate().unwrap_err();
        assert!(matches!(err, StoreError::Validation { field: "value", .. }));
    }

    #[test]
    fn test_codec_round_trip() {
        let mut s = secret(SecretType::Shared, "", "ops");
        s.id = 4;
        s.images = vec!["alpine".to_string(), "golang:1.22".to_string()];
        s.events = vec!["push".to_string()];
        s.allow_command = true;

        let codec = Codec::default();
        let row = s.to_row(&codec).unwrap().with("id", 4i64);
        let decoded = Secret::from_row(RowReader::new(Secret::KIND, row), &codec).unwrap();

        assert_eq!(decoded, s);
    }

    #[tokio::test]
    async fn test_repo_lookup_prefers_exact_repo() {
        let backend = Arc::new(MockBackend::new(Dialect::Postgres));
        let err = engine(backend.clone())
            .get_secret(SecretType::Repo, "octo", "hello", "docker_password")
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let statement = backend.last();
        assert!(statement.sql.ends_with(concat!(
            r#"WHERE "type" = $1 AND "org" = $2 AND "repo" IN ($3, $4) AND "name" = $5 "#,
            r#"ORDER BY CASE WHEN "repo" = '*' THEN 1 ELSE 0 END ASC, "id" ASC LIMIT 1"#,
        )));
        assert_eq!(
            statement.args,
            vec![
                Value::from("repo"),
                Value::from("octo"),
                Value::from("hello"),
                Value::from("*"),
                Value::from("docker_password"),
            ]
        );
    }

    #[tokio::test]
    async fn test_org_lookup_matches_wildcard_repo() {
        let backend = Arc::new(MockBackend::new(Dialect::Sqlite));
        let _ = engine(backend.clone())
            .get_secret(SecretType::Org, "octo", "ignored", "token")
            .await;

        let statement = backend.last();
        assert!(statement.sql.ends_with(concat!(
            r#"WHERE "type" = ? AND "org" = ? AND "repo" = ? AND "name" = ? "#,
            r#"ORDER BY "id" ASC LIMIT 1"#,
        )));
        assert_eq!(statement.args[2], Value::from("*"));
    }

    #[tokio::test]
    async fn test_shared_lookup_matches_team() {
        let backend = Arc::new(MockBackend::new(Dialect::Postgres));
        let _ = engine(backend.clone())
            .get_secret(SecretType::Shared, "octo", "ops", "token")
            .await;

        let statement = backend.last();
        assert!(statement
            .sql
            .contains(r#"WHERE "type" = $1 AND "org" = $2 AND "team" = $3 AND "name" = $4"#));
        assert_eq!(statement.args[2], Value::from("ops"));
    }

    #[tokio::test]
    async fn test_list_and_count_share_scope() {
        let backend = Arc::new(MockBackend::new(Dialect::Postgres).with_scalar(3));
        let engine = engine(backend.clone());

        engine
            .list_secrets(SecretType::Shared, "octo", "ops", Page::new(2, 5))
            .await
            .unwrap();
        assert!(backend.last().sql.ends_with(concat!(
            r#"WHERE "type" = $1 AND "org" = $2 AND "team" = $3 "#,
            r#"ORDER BY "id" ASC LIMIT 5 OFFSET 5"#,
        )));

        let count = engine
            .count_secrets(SecretType::Shared, "octo", "ops")
            .await
            .unwrap();
        assert_eq!(count, 3);
        assert_eq!(
            backend.last().sql,
            r#"SELECT COUNT(*) FROM "secrets" WHERE "type" = $1 AND "org" = $2 AND "team" = $3"#
        );
    }
}

//! Build Repository
//!
//! Build codec, build lookups, and the stale-build sweep.

use std::future::Future;

use keel_core::domain::build::{Build, BuildStatus};

use super::{Engine, Filter, Page, Sort};
use crate::backend::{Column, Row, Value};
use crate::config::SweepConfig;
use crate::codec::{Codec, Entity, RowReader};
use crate::error::{Result, StoreError};

impl Engine<Build> {
    /// Terminate builds abandoned before `before`
    ///
    /// Every build created before `before` that is still pending or running
    /// is moved to `error` with `message` as its error, `finished` set to the
    /// current time, and its deploy payload cleared. The predicate and the
    /// write are one statement, so a build a worker finishes concurrently is
    /// either swept or left alone, never both. Returns the builds actually
    /// transitioned; zero is not an error.
    pub async fn clean_builds(&self, message: &str, before: i64) -> Result<u64> {
        let now = chrono::Utc::now().timestamp();

        let assignments = vec![
            ("status", Value::from(BuildStatus::Error.as_str())),
            ("error", Value::from(message)),
            ("finished", Value::from(now)),
            ("deploy_payload", empty_payload()),
        ];

        let affected = self
            .update_matching(assignments, &stale_builds(before))
            .await?;

        if affected > 0 {
            tracing::info!(affected, before, "cleaned stale builds");
        } else {
            tracing::debug!(before, "no stale builds to clean");
        }

        Ok(affected)
    }

    /// Run `clean_builds` every `config.interval` until `shutdown` resolves
    ///
    /// A failed sweep is logged and retried on the next tick.
    pub async fn run_sweep(&self, config: &SweepConfig, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(config.interval);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let before = config.cutoff(chrono::Utc::now().timestamp());

                    match self.clean_builds(&config.message, before).await {
                        Ok(affected) => tracing::debug!(affected, before, "sweep finished"),
                        Err(e) => tracing::error!(error = %e, "sweep failed"),
                    }
                }
                _ = &mut shutdown => break,
            }
        }
    }

    /// Fetch a build by its repository-scoped number
    pub async fn get_build_for_repo(&self, repo_id: i64, number: i64) -> Result<Build> {
        tracing::trace!(repo_id, number, "getting build");

        let filter = Filter::new().eq("repo_id", repo_id).eq("number", number);
        self.find(&filter, &[])
            .await?
            .ok_or_else(|| StoreError::not_found(Build::KIND, format!("{repo_id}/{number}")))
    }

    /// Most recent build of a repository on `branch`
    pub async fn last_build_for_repo(&self, repo_id: i64, branch: &str) -> Result<Build> {
        tracing::trace!(repo_id, branch, "getting last build");

        let filter = Filter::new().eq("repo_id", repo_id).eq("branch", branch);
        self.find(&filter, &[Sort::Desc("number")])
            .await?
            .ok_or_else(|| StoreError::not_found(Build::KIND, format!("{repo_id}@{branch}")))
    }

    /// Builds of a repository, newest first
    pub async fn list_builds_for_repo(&self, repo_id: i64, page: Page) -> Result<Vec<Build>> {
        let filter = Filter::new().eq("repo_id", repo_id);
        self.list_ordered(&filter, &[Sort::Desc("number")], Some(page))
            .await
    }

    /// Pending and running builds created after `after`
    pub async fn list_pending_and_running_builds(&self, after: i64) -> Result<Vec<Build>> {
        let filter = Filter::new()
            .gt("created", after)
            .is_in("status", BuildStatus::ACTIVE.map(|s| s.as_str()));
        self.list(&filter, None).await
    }

    pub async fn count_builds_for_repo(&self, repo_id: i64) -> Result<i64> {
        self.count(&Filter::new().eq("repo_id", repo_id)).await
    }

    pub async fn count_builds_for_status(&self, status: BuildStatus) -> Result<i64> {
        self.count(&Filter::new().eq("status", status.as_str()))
            .await
    }
}

/// Builds created before `before` that never reached a terminal status
fn stale_builds(before: i64) -> Filter {
    Filter::new()
        .lt("created", before)
        .is_in("status", BuildStatus::ACTIVE.map(|s| s.as_str()))
}

fn empty_payload() -> Value {
    Value::Json(serde_json::Value::Object(Default::default()))
}

// =============================================================================
// Codec
// =============================================================================

const COLUMNS: &[Column] = &[
    Column::int("repo_id"),
    Column::int("number"),
    Column::int("parent"),
    Column::text("event"),
    Column::text("status"),
    Column::text("error"),
    Column::int("enqueued"),
    Column::int("created"),
    Column::int("started"),
    Column::int("finished"),
    Column::text("deploy"),
    Column::json("deploy_payload"),
    Column::text("commit"),
    Column::text("branch"),
    Column::text("ref"),
    Column::text("message"),
    Column::text("author"),
    Column::text("sender"),
    Column::text("host"),
];

impl Entity for Build {
    const KIND: &'static str = "build";
    const TABLE: &'static str = "builds";
    const COLUMNS: &'static [Column] = COLUMNS;
    const ORDER: &'static [Sort] = &[Sort::Asc("created"), Sort::Asc("id")];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn validate(&self) -> Result<()> {
        if self.repo_id <= 0 {
            return Err(StoreError::missing(Self::KIND, "repo_id"));
        }

        if self.number <= 0 {
            return Err(StoreError::missing(Self::KIND, "number"));
        }

        if !self.status.is_terminal() && self.finished != 0 {
            return Err(StoreError::validation(
                Self::KIND,
                "finished",
                format!("must be unset while {}", self.status),
            ));
        }

        Ok(())
    }

    fn to_row(&self, _codec: &Codec) -> Result<Row> {
        let payload = serde_json::to_value(&self.deploy_payload)
            .map_err(|e| StoreError::corrupt(Self::KIND, "deploy_payload", e))?;

        Ok(Row::new()
            .with("repo_id", self.repo_id)
            .with("number", self.number)
            .with("parent", self.parent)
            .with("event", self.event.as_str())
            .with("status", self.status.as_str())
            .with("error", self.error.as_str())
            .with("enqueued", self.enqueued)
            .with("created", self.created)
            .with("started", self.started)
            .with("finished", self.finished)
            .with("deploy", self.deploy.as_str())
            .with("deploy_payload", payload)
            .with("commit", self.commit.as_str())
            .with("branch", self.branch.as_str())
            .with("ref", self.git_ref.as_str())
            .with("message", self.message.as_str())
            .with("author", self.author.as_str())
            .with("sender", self.sender.as_str())
            .with("host", self.host.as_str()))
    }

    fn from_row(mut row: RowReader, _codec: &Codec) -> Result<Self> {
        Ok(Build {
            id: row.int("id")?,
            repo_id: row.int("repo_id")?,
            number: row.int("number")?,
            parent: row.int("parent")?,
            event: row.text("event")?,
            status: row.parse("status")?,
            error: row.text("error")?,
            enqueued: row.int("enqueued")?,
            created: row.int("created")?,
            started: row.int("started")?,
            finished: row.int("finished")?,
            deploy: row.text("deploy")?,
            deploy_payload: row.json("deploy_payload")?,
            commit: row.text("commit")?,
            branch: row.text("branch")?,
            git_ref: row.text("ref")?,
            message: row.text("message")?,
            author: row.text("author")?,
            sender: row.text("sender")?,
            host: row.text("host")?,
        })
    }
}

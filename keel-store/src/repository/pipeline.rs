//! Pipeline Repository
//!
//! Pipeline codec and per-repository pipeline queries. The compiled
//! `data` payload is compressed on write and inflated on read.

use keel_core::domain::pipeline::Pipeline;

use super::{Engine, Filter, Page, Sort};
use crate::backend::{Column, Row};
use crate::codec::{Codec, Entity, RowReader};
use crate::error::{Result, StoreError};

impl Engine<Pipeline> {
    /// Pipeline with the highest number for a repository
    ///
    /// One ordered, single-row query; a repository without pipelines is
    /// reported as not found.
    pub async fn last_pipeline_for_repo(&self, repo_id: i64) -> Result<Pipeline> {
        tracing::trace!(repo_id, "getting last pipeline");

        self.find(&Filter::new().eq("repo_id", repo_id), &[Sort::Desc("number")])
            .await?
            .ok_or_else(|| StoreError::not_found(Pipeline::KIND, format!("repo {repo_id}")))
    }

    /// Fetch a pipeline by its repository-scoped number
    pub async fn get_pipeline_for_repo(&self, repo_id: i64, number: i64) -> Result<Pipeline> {
        tracing::trace!(repo_id, number, "getting pipeline");

        let filter = Filter::new().eq("repo_id", repo_id).eq("number", number);
        self.find(&filter, &[])
            .await?
            .ok_or_else(|| StoreError::not_found(Pipeline::KIND, format!("{repo_id}/{number}")))
    }

    /// Pipelines of a repository, most recent first
    pub async fn list_pipelines_for_repo(&self, repo_id: i64, page: Page) -> Result<Vec<Pipeline>> {
        self.list(&Filter::new().eq("repo_id", repo_id), Some(page))
            .await
    }

    pub async fn count_pipelines_for_repo(&self, repo_id: i64) -> Result<i64> {
        self.count(&Filter::new().eq("repo_id", repo_id)).await
    }
}

// =============================================================================
// Codec
// =============================================================================

const COLUMNS: &[Column] = &[
    Column::int("repo_id"),
    Column::int("number"),
    Column::text("commit"),
    Column::text("flavor"),
    Column::text("platform"),
    Column::text("ref"),
    Column::text("type"),
    Column::text("version"),
    Column::bool("services"),
    Column::bool("stages"),
    Column::bool("steps"),
    Column::bool("templates"),
    Column::bytes("data"),
];

impl Entity for Pipeline {
    const KIND: &'static str = "pipeline";
    const TABLE: &'static str = "pipelines";
    const COLUMNS: &'static [Column] = COLUMNS;
    const ORDER: &'static [Sort] = &[Sort::Desc("number"), Sort::Desc("id")];

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

        if self.git_ref.is_empty() {
            return Err(StoreError::missing(Self::KIND, "ref"));
        }

        if self.kind.is_empty() {
            return Err(StoreError::missing(Self::KIND, "type"));
        }

        if self.version.is_empty() {
            return Err(StoreError::missing(Self::KIND, "version"));
        }

        if self.has_sections() && self.data.is_empty() {
            return Err(StoreError::validation(
                Self::KIND,
                "data",
                "is required when a section is flagged",
            ));
        }

        Ok(())
    }

    fn to_row(&self, codec: &Codec) -> Result<Row> {
        let data = codec.compress(Self::KIND, "data", &self.data)?;

        Ok(Row::new()
            .with("repo_id", self.repo_id)
            .with("number", self.number)
            .with("commit", self.commit.as_str())
            .with("flavor", self.flavor.as_str())
            .with("platform", self.platform.as_str())
            .with("ref", self.git_ref.as_str())
            .with("type", self.kind.as_str())
            .with("version", self.version.as_str())
            .with("services", self.services)
            .with("stages", self.stages)
            .with("steps", self.steps)
            .with("templates", self.templates)
            .with("data", data))
    }

    fn from_row(mut row: RowReader, codec: &Codec) -> Result<Self> {
        let data = row.bytes("data")?;

        Ok(Pipeline {
            id: row.int("id")?,
            repo_id: row.int("repo_id")?,
            number: row.int("number")?,
            commit: row.text("commit")?,
            flavor: row.text("flavor")?,
            platform: row.text("platform")?,
            git_ref: row.text("ref")?,
            kind: row.text("type")?,
            version: row.text("version")?,
            services: row.bool("services")?,
            stages: row.bool("stages")?,
            steps: row.bool("steps")?,
            templates: row.bool("templates")?,
            data: codec.decompress(Self::KIND, "data", &data)?,
        })
    }
}

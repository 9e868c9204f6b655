//! Repository Module
//!
//! Data access layer of the store. [`Engine`] implements create, get,
//! update, delete, list and count once for every [`Entity`]; the submodules
//! hold each entity's codec and the queries specific to it.

pub mod build;
pub mod pipeline;
pub mod secret;
pub mod service;

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{Backend, Dialect, Statement, StatementBuilder, Value};
use crate::codec::{self, Codec, Entity, RowReader};
use crate::error::{Result, StoreError};

/// Generic CRUD engine for one entity type
pub struct Engine<E> {
    backend: Arc<dyn Backend>,
    codec: Codec,
    timeout: Duration,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Engine<E> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            codec: self.codec,
            timeout: self.timeout,
            _entity: PhantomData,
        }
    }
}

impl<E> std::fmt::Debug for Engine<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("backend", &self.backend)
            .field("codec", &self.codec)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<E: Entity> Engine<E> {
    pub fn new(backend: Arc<dyn Backend>, codec: Codec, timeout: Duration) -> Self {
        Self {
            backend,
            codec,
            timeout,
            _entity: PhantomData,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.backend.dialect()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Insert a new entity, returning it with its assigned id
    ///
    /// An entity carrying a non-zero id is inserted with that id, and the
    /// table's id sequence is moved past it where the backend keeps one.
    pub async fn create(&self, entity: &E) -> Result<E> {
        entity.validate()?;

        let mut values = self.row_values(entity)?;
        let explicit_id = entity.id() != 0;
        if explicit_id {
            values.insert(0, ("id", Value::Int(entity.id())));
        }

        let mut b = StatementBuilder::new(self.dialect());
        b.push("INSERT INTO ").push_ident(E::TABLE).push(" (");
        b.push_separated(&values, ", ", |b, (name, _)| {
            b.push_ident(name);
        });
        b.push(") VALUES (");
        b.push_separated(values, ", ", |b, (_, value)| {
            b.push_bind(value);
        });
        b.push(") RETURNING id");

        let id = self.run(self.backend.fetch_scalar(&b.build())).await?;

        if explicit_id {
            if let Some(sql) = self.dialect().sync_id_sequence(E::TABLE) {
                let statement = Statement {
                    sql,
                    args: Vec::new(),
                };
                self.run(self.backend.fetch_scalar(&statement)).await?;
            }
        }

        tracing::trace!(entity = E::KIND, id, "created row");

        let mut created = entity.clone();
        created.set_id(id);
        Ok(created)
    }

    /// Fetch by surrogate key
    pub async fn get(&self, id: i64) -> Result<E> {
        self.find(&Filter::new().eq("id", id), &[])
            .await?
            .ok_or_else(|| StoreError::not_found(E::KIND, id))
    }

    /// First match for `filter` under `order`, or the natural order when empty
    pub async fn find(&self, filter: &Filter, order: &[Sort]) -> Result<Option<E>> {
        let statement = self.select(filter, order, Some(Page::first()));
        Ok(self.fetch(statement).await?.into_iter().next())
    }

    /// Replace every column of an existing row
    pub async fn update(&self, entity: &E) -> Result<()> {
        entity.validate()?;

        let id = entity.id();
        let values = self.row_values(entity)?;

        let mut b = StatementBuilder::new(self.dialect());
        b.push("UPDATE ").push_ident(E::TABLE).push(" SET ");
        push_assignments(&mut b, values);
        b.push(" WHERE ").push_ident("id").push(" = ").push_bind(id);

        let affected = self.run(self.backend.execute(&b.build())).await?;
        if affected == 0 {
            return Err(StoreError::not_found(E::KIND, id));
        }

        tracing::trace!(entity = E::KIND, id, "updated row");

        Ok(())
    }

    /// Delete by surrogate key, returning the number of rows removed
    pub async fn delete(&self, id: i64) -> Result<u64> {
        let mut b = StatementBuilder::new(self.dialect());
        b.push("DELETE FROM ")
            .push_ident(E::TABLE)
            .push(" WHERE ")
            .push_ident("id")
            .push(" = ")
            .push_bind(id);

        let affected = self.run(self.backend.execute(&b.build())).await?;

        tracing::trace!(entity = E::KIND, id, affected, "deleted row");

        Ok(affected)
    }

    /// List matches in the entity's natural order
    pub async fn list(&self, filter: &Filter, page: Option<Page>) -> Result<Vec<E>> {
        self.list_ordered(filter, &[], page).await
    }

    /// List matches in an explicit order
    pub async fn list_ordered(
        &self,
        filter: &Filter,
        order: &[Sort],
        page: Option<Page>,
    ) -> Result<Vec<E>> {
        let statement = self.select(filter, order, page);
        self.fetch(statement).await
    }

    pub async fn count(&self, filter: &Filter) -> Result<i64> {
        let mut b = StatementBuilder::new(self.dialect());
        b.push("SELECT COUNT(*) FROM ").push_ident(E::TABLE);
        filter.render(&mut b);

        self.run(self.backend.fetch_scalar(&b.build())).await
    }

    /// Set-based update of every row matching `filter`
    ///
    /// The filter is evaluated by the same statement that writes, so rows
    /// changed concurrently are re-checked by the backend before they are
    /// touched. Returns the rows actually changed.
    pub async fn update_matching(
        &self,
        assignments: Vec<(&'static str, Value)>,
        filter: &Filter,
    ) -> Result<u64> {
        let mut b = StatementBuilder::new(self.dialect());
        b.push("UPDATE ").push_ident(E::TABLE).push(" SET ");
        push_assignments(&mut b, assignments);
        filter.render(&mut b);

        self.run(self.backend.execute(&b.build())).await
    }

    // -------------------------------------------------------------------------

    fn select(&self, filter: &Filter, order: &[Sort], page: Option<Page>) -> Statement {
        let order = if order.is_empty() { E::ORDER } else { order };

        let mut b = StatementBuilder::new(self.dialect());
        b.push("SELECT ")
            .push_separated(codec::select_columns::<E>(), ", ", |b, column| {
                b.push_ident(column.name);
            })
            .push(" FROM ")
            .push_ident(E::TABLE);
        filter.render(&mut b);

        if !order.is_empty() {
            b.push(" ORDER BY ")
                .push_separated(order, ", ", |b, sort| sort.render(b));
        }

        if let Some(page) = page {
            b.push_limit(page.limit(), page.offset());
        }

        b.build()
    }

    async fn fetch(&self, statement: Statement) -> Result<Vec<E>> {
        let columns = codec::select_columns::<E>();
        let rows = self
            .run(self.backend.fetch_all(&statement, &columns))
            .await?;

        rows.into_iter()
            .map(|row| E::from_row(RowReader::new(E::KIND, row), &self.codec))
            .collect()
    }

    /// Encode `entity` and pair every column with its value, in column order
    fn row_values(&self, entity: &E) -> Result<Vec<(&'static str, Value)>> {
        let mut row = entity.to_row(&self.codec)?;

        E::COLUMNS
            .iter()
            .map(|column| {
                row.take(column.name)
                    .map(|value| (column.name, value))
                    .ok_or_else(|| {
                        StoreError::corrupt(E::KIND, column.name, "not produced by encoder")
                    })
            })
            .collect()
    }

    /// Await a backend call under the engine's deadline
    async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(|e| StoreError::from_sqlx(E::KIND, e)),
            Err(_) => {
                tracing::warn!(
                    entity = E::KIND,
                    timeout = ?self.timeout,
                    "statement deadline exceeded"
                );
                Err(StoreError::Timeout(self.timeout))
            }
        }
    }
}

fn push_assignments(b: &mut StatementBuilder, assignments: Vec<(&'static str, Value)>) {
    b.push_separated(assignments, ", ", |b, (name, value)| {
        b.push_ident(name).push(" = ").push_bind(value);
    });
}

// =============================================================================
// Query Types
// =============================================================================

/// Conjunction of column predicates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Eq(&'static str, Value),
    Lt(&'static str, Value),
    Gt(&'static str, Value),
    In(&'static str, Vec<Value>),
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq(column, value.into()));
        self
    }

    pub fn lt(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Lt(column, value.into()));
        self
    }

    pub fn gt(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Gt(column, value.into()));
        self
    }

    pub fn is_in<V: Into<Value>>(
        mut self,
        column: &'static str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.conditions.push(Condition::In(column, values));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Append a `WHERE` clause, or nothing for an empty filter
    pub fn render(&self, b: &mut StatementBuilder) {
        for (i, condition) in self.conditions.iter().enumerate() {
            b.push(if i == 0 { " WHERE " } else { " AND " });

            match condition {
                Condition::Eq(column, value) => {
                    b.push_ident(column).push(" = ").push_value(value.clone());
                }
                Condition::Lt(column, value) => {
                    b.push_ident(column).push(" < ").push_bind(value.clone());
                }
                Condition::Gt(column, value) => {
                    b.push_ident(column).push(" > ").push_bind(value.clone());
                }
                Condition::In(_, values) if values.is_empty() => {
                    b.push("1 = 0");
                }
                Condition::In(column, values) => {
                    b.push_ident(column)
                        .push(" IN (")
                        .push_separated(values, ", ", |b, value| {
                            b.push_bind(value.clone());
                        })
                        .push(")");
                }
            }
        }
    }
}

/// One term of an `ORDER BY`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sort {
    Asc(&'static str),
    Desc(&'static str),
    /// Rows whose column equals the wildcard sort after every other row
    WildcardLast(&'static str),
}

impl Sort {
    fn render(&self, b: &mut StatementBuilder) {
        match self {
            Sort::Asc(column) => {
                b.push_ident(column).push(" ASC");
            }
            Sort::Desc(column) => {
                b.push_ident(column).push(" DESC");
            }
            Sort::WildcardLast(column) => {
                b.push("CASE WHEN ")
                    .push_ident(column)
                    .push(" = '")
                    .push(keel_core::domain::secret::WILDCARD)
                    .push("' THEN 1 ELSE 0 END ASC");
            }
        }
    }
}

/// 1-based page of results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    page: u64,
    per_page: u64,
}

impl Page {
    pub const DEFAULT_PER_PAGE: u64 = 10;
    pub const MAX_PER_PAGE: u64 = 100;

    /// Page numbers start at 1; `per_page` is clamped to `1..=100`
    pub fn new(page: u64, per_page: u64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, Self::MAX_PER_PAGE),
        }
    }

    /// A single row
    pub fn first() -> Self {
        Self::new(1, 1)
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> u64 {
        self.per_page
    }

    /// Rows skipped before this page, capped at `i64::MAX` for the backends
    pub fn offset(&self) -> u64 {
        (self.page - 1)
            .saturating_mul(self.per_page)
            .min(i64::MAX as u64)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_PER_PAGE)
    }
}

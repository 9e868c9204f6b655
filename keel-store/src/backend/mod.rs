//! Backend Adapter
//!
//! One execution interface over the supported relational backends.
//! Each implementation wraps an sqlx pool; statements are rendered for the
//! backend's [`Dialect`] by [`StatementBuilder`], so the engine above never
//! sees placeholder syntax, boolean literals, or how list and JSON columns
//! are physically stored.

#[cfg(test)]
pub mod mock;
pub mod postgres;
pub mod sqlite;

use async_trait::async_trait;
use std::collections::BTreeMap;

pub use postgres::PostgresBackend;
pub use sqlite::SqliteBackend;

/// Statement execution over a pooled backend connection
///
/// Every call checks a connection out for the duration of one statement and
/// returns it on completion, error, or drop. Implementations do not retry.
#[async_trait]
pub trait Backend: Send + Sync + std::fmt::Debug {
    fn dialect(&self) -> Dialect;

    /// Run a mutating statement, returning the number of rows affected
    async fn execute(&self, statement: &Statement) -> Result<u64, sqlx::Error>;

    /// Run a query and decode every row according to `columns`
    async fn fetch_all(
        &self,
        statement: &Statement,
        columns: &[Column],
    ) -> Result<Vec<Row>, sqlx::Error>;

    /// Run a query yielding a single integer (`COUNT(*)`, `RETURNING id`)
    async fn fetch_scalar(&self, statement: &Statement) -> Result<i64, sqlx::Error>;

    /// Close the underlying pool
    async fn close(&self);
}

// =============================================================================
// Dialect
// =============================================================================

/// SQL dialect of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Positional placeholder for the `n`th (1-based) argument
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${n}"),
            Dialect::Sqlite => "?".to_string(),
        }
    }

    pub fn bool_literal(&self, value: bool) -> &'static str {
        match (self, value) {
            (Dialect::Postgres, true) => "TRUE",
            (Dialect::Postgres, false) => "FALSE",
            (Dialect::Sqlite, true) => "1",
            (Dialect::Sqlite, false) => "0",
        }
    }

    /// Row-limiting clause; `offset` is omitted when zero
    pub fn limit(&self, limit: u64, offset: u64) -> String {
        match offset {
            0 => format!(" LIMIT {limit}"),
            _ => format!(" LIMIT {limit} OFFSET {offset}"),
        }
    }

    /// Statement moving `table`'s id sequence past its largest id
    ///
    /// Postgres sequences ignore explicitly inserted ids; SQLite's
    /// `AUTOINCREMENT` already tracks the largest rowid.
    pub fn sync_id_sequence(&self, table: &str) -> Option<String> {
        match self {
            Dialect::Postgres => Some(format!(
                r#"SELECT setval(pg_get_serial_sequence('"{table}"', 'id'), GREATEST(MAX("id"), 1)) FROM "{table}""#
            )),
            Dialect::Sqlite => None,
        }
    }

    /// Whether list and JSON columns are stored natively
    pub fn has_native_json(&self) -> bool {
        matches!(self, Dialect::Postgres)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::Postgres => write!(f, "postgres"),
            Dialect::Sqlite => write!(f, "sqlite"),
        }
    }
}

// =============================================================================
// Values, Columns and Rows
// =============================================================================

/// A dynamically typed column value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Text(String),
    Bool(bool),
    Bytes(Vec<u8>),
    /// Ordered list of strings (`TEXT[]` on Postgres, JSON text on SQLite)
    List(Vec<String>),
    /// JSON document (`JSONB` on Postgres, JSON text on SQLite)
    Json(serde_json::Value),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::List(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

/// Storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Text,
    Bool,
    Bytes,
    List,
    Json,
}

impl ColumnType {
    /// Value a NULL in this column decodes to
    pub fn zero(&self) -> Value {
        match self {
            ColumnType::Int => Value::Int(0),
            ColumnType::Text => Value::Text(String::new()),
            ColumnType::Bool => Value::Bool(false),
            ColumnType::Bytes => Value::Bytes(Vec::new()),
            ColumnType::List => Value::List(Vec::new()),
            ColumnType::Json => Value::Json(serde_json::Value::Object(Default::default())),
        }
    }
}

/// A named, typed column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnType,
}

impl Column {
    pub const fn new(name: &'static str, kind: ColumnType) -> Self {
        Self { name, kind }
    }

    pub const fn int(name: &'static str) -> Self {
        Self::new(name, ColumnType::Int)
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub const fn bool(name: &'static str) -> Self {
        Self::new(name, ColumnType::Bool)
    }

    pub const fn bytes(name: &'static str) -> Self {
        Self::new(name, ColumnType::Bytes)
    }

    pub const fn list(name: &'static str) -> Self {
        Self::new(name, ColumnType::List)
    }

    pub const fn json(name: &'static str) -> Self {
        Self::new(name, ColumnType::Json)
    }
}

/// A decoded row, keyed by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: BTreeMap<&'static str, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: &'static str, value: impl Into<Value>) {
        self.values.insert(column, value.into());
    }

    /// Builder-style [`Row::insert`]
    pub fn with(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn take(&mut self, column: &str) -> Option<Value> {
        self.values.remove(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// =============================================================================
// Statements
// =============================================================================

/// SQL text already rendered for one dialect, plus its arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

/// Incrementally builds a [`Statement`] for a dialect
#[derive(Debug)]
pub struct StatementBuilder {
    dialect: Dialect,
    sql: String,
    args: Vec<Value>,
}

impl StatementBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            args: Vec::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Append a double-quoted identifier
    pub fn push_ident(&mut self, ident: &str) -> &mut Self {
        self.sql.push('"');
        self.sql.push_str(ident);
        self.sql.push('"');
        self
    }

    /// Append a placeholder and record its argument
    pub fn push_bind(&mut self, value: impl Into<Value>) -> &mut Self {
        self.args.push(value.into());
        let placeholder = self.dialect.placeholder(self.args.len());
        self.sql.push_str(&placeholder);
        self
    }

    /// Append `value` as an inline literal where the dialects disagree on
    /// its spelling; everything else is bound
    pub fn push_value(&mut self, value: impl Into<Value>) -> &mut Self {
        match value.into() {
            Value::Bool(b) => {
                let literal = self.dialect.bool_literal(b);
                self.push(literal)
            }
            other => self.push_bind(other),
        }
    }

    /// Append `items` separated by `sep`, rendering each with `f`
    pub fn push_separated<T>(
        &mut self,
        items: impl IntoIterator<Item = T>,
        sep: &str,
        mut f: impl FnMut(&mut Self, T),
    ) -> &mut Self {
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                self.push(sep);
            }
            f(self, item);
        }
        self
    }

    pub fn push_limit(&mut self, limit: u64, offset: u64) -> &mut Self {
        let clause = self.dialect.limit(limit, offset);
        self.push(&clause)
    }

    pub fn build(self) -> Statement {
        Statement {
            sql: self.sql,
            args: self.args,
        }
    }
}

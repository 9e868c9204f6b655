//! Recording backend for unit tests
//!
//! Captures every statement it is handed and answers with canned results,
//! so tests can assert the exact SQL produced for a dialect without a
//! running database.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use super::{Backend, Column, Dialect, Row, Statement};

#[derive(Debug)]
pub struct MockBackend {
    dialect: Dialect,
    statements: Mutex<Vec<Statement>>,
    rows_affected: u64,
    rows: Vec<Row>,
    scalar: i64,
    delay: Duration,
}

impl MockBackend {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            statements: Mutex::new(Vec::new()),
            rows_affected: 0,
            rows: Vec::new(),
            scalar: 0,
            delay: Duration::ZERO,
        }
    }

    pub fn with_rows_affected(mut self, rows_affected: u64) -> Self {
        self.rows_affected = rows_affected;
        self
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_scalar(mut self, scalar: i64) -> Self {
        self.scalar = scalar;
        self
    }

    /// Hold every call for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Statements received so far, oldest first
    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }

    pub fn last(&self) -> Statement {
        self.statements().pop().expect("no statement was executed")
    }

    async fn record(&self, statement: &Statement) {
        self.statements.lock().unwrap().push(statement.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, sqlx::Error> {
        self.record(statement).await;
        Ok(self.rows_affected)
    }

    async fn fetch_all(
        &self,
        statement: &Statement,
        _columns: &[Column],
    ) -> Result<Vec<Row>, sqlx::Error> {
        self.record(statement).await;
        Ok(self.rows.clone())
    }

    async fn fetch_scalar(&self, statement: &Statement) -> Result<i64, sqlx::Error> {
        self.record(statement).await;
        Ok(self.scalar)
    }

    async fn close(&self) {}
}

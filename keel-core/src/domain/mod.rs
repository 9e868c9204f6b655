//! Core domain types
//!
//! This module contains the entities persisted by the storage engine.
//! They are shared between the store (persists) and its callers
//! (dispatcher, API layer, maintenance jobs).

pub mod build;
pub mod pipeline;
pub mod secret;
pub mod service;

pub use build::{Build, BuildStatus};
pub use pipeline::Pipeline;
pub use secret::{Secret, SecretType};
pub use service::Service;

/// A string did not name a known variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {what}: {value}")]
pub struct ParseError {
    what: &'static str,
    value: String,
}

impl ParseError {
    pub fn new(what: &'static str, value: impl Into<String>) -> Self {
        Self {
            what,
            value: value.into(),
        }
    }
}

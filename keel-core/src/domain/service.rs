//! Service domain types

use serde::{Deserialize, Serialize};

/// Sidecar container started alongside a build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub build_id: i64,
    pub repo_id: i64,
    pub number: i64,
    pub name: String,
    pub image: String,
    pub status: String,
    pub error: String,
    pub exit_code: i64,
    pub created: i64,
    pub started: i64,
    pub finished: i64,
    pub host: String,
    pub runtime: String,
    pub distribution: String,
}

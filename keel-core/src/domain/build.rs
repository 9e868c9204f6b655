//! Build domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use super::ParseError;

/// One execution of a pipeline for a repository
///
/// Unset fields carry their zero value (`0`, `""`, empty map) rather than
/// being optional, so a build read back from storage compares equal to the
/// build that was written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub id: i64,
    pub repo_id: i64,
    pub number: i64,
    pub parent: i64,
    pub event: String,
    pub status: BuildStatus,
    pub error: String,
    pub enqueued: i64,
    pub created: i64,
    pub started: i64,
    pub finished: i64,
    pub deploy: String,
    pub deploy_payload: BTreeMap<String, String>,
    pub commit: String,
    pub branch: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub message: String,
    pub author: String,
    pub sender: String,
    pub host: String,
}

impl Build {
    /// Whether the build is still waiting on, or held by, a worker
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Build execution status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    #[default]
    Pending,
    Running,
    Success,
    Failure,
    Killed,
    Error,
}

impl BuildStatus {
    /// Statuses a build can be abandoned in
    pub const ACTIVE: [BuildStatus; 2] = [BuildStatus::Pending, BuildStatus::Running];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Pending => "pending",
            BuildStatus::Running => "running",
            BuildStatus::Success => "success",
            BuildStatus::Failure => "failure",
            BuildStatus::Killed => "killed",
            BuildStatus::Error => "error",
        }
    }

    /// Anything other than pending or running
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BuildStatus::Pending | BuildStatus::Running)
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BuildStatus::Pending),
            "running" => Ok(BuildStatus::Running),
            "success" => Ok(BuildStatus::Success),
            "failure" => Ok(BuildStatus::Failure),
            "killed" => Ok(BuildStatus::Killed),
            "error" => Ok(BuildStatus::Error),
            other => Err(ParseError::new("build status", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            BuildStatus::Pending,
            BuildStatus::Running,
            BuildStatus::Success,
            BuildStatus::Failure,
            BuildStatus::Killed,
            BuildStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<BuildStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let err = "queued".parse::<BuildStatus>().unwrap_err();
        assert_eq!(err.to_string(), "invalid build status: queued");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!BuildStatus::Pending.is_terminal());
        assert!(!BuildStatus::Running.is_terminal());
        assert!(BuildStatus::Success.is_terminal());
        assert!(BuildStatus::Error.is_terminal());

        let build = Build {
            status: BuildStatus::Running,
            ..Default::default()
        };
        assert!(build.is_active());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&BuildStatus::Killed).unwrap();
        assert_eq!(json, "\"killed\"");
    }
}

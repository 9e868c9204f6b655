//! Secret domain types
//!
//! A secret is visible at one of three scopes:
//! - `repo`: one repository, or every repository of an org when `repo` is `*`
//! - `org`: every repository of an org (stored with `repo = "*"`)
//! - `shared`: every repository a team of an org has access to

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::ParseError;

/// Repository value matching every repository in an org
pub const WILDCARD: &str = "*";

/// Named credential or configuration value
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: SecretType,
    pub org: String,
    pub repo: String,
    pub team: String,
    pub name: String,
    pub value: String,
    pub images: Vec<String>,
    pub events: Vec<String>,
    pub allow_command: bool,
}

impl Secret {
    /// Whether this is a repo secret stored for the whole org
    pub fn is_wildcard(&self) -> bool {
        self.repo == WILDCARD
    }

    /// Scope this secret is visible at, as `org/repo` or `org/team`
    pub fn scope(&self) -> String {
        match self.kind {
            SecretType::Shared => format!("{}/{}", self.org, self.team),
            SecretType::Repo | SecretType::Org => format!("{}/{}", self.org, self.repo),
        }
    }
}

// The value must never end up in logs.
impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("org", &self.org)
            .field("repo", &self.repo)
            .field("team", &self.team)
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .field("images", &self.images)
            .field("events", &self.events)
            .field("allow_command", &self.allow_command)
            .finish()
    }
}

/// Visibility level of a secret
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretType {
    #[default]
    Repo,
    Org,
    Shared,
}

impl SecretType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretType::Repo => "repo",
            SecretType::Org => "org",
            SecretType::Shared => "shared",
        }
    }
}

impl std::fmt::Display for SecretType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecretType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "repo" => Ok(SecretType::Repo),
            "org" => Ok(SecretType::Org),
            "shared" => Ok(SecretType::Shared),
            other => Err(ParseError::new("secret type", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_value() {
        let secret = Secret {
            name: "docker_password".to_string(),
            value: "hunter2".to_string(),
            ..Default::default()
        };

        let debug = format!("{secret:?}");
        assert!(debug.contains("docker_password"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_scope() {
        let repo = Secret {
            kind: SecretType::Repo,
            org: "octo".to_string(),
            repo: "*".to_string(),
            ..Default::default()
        };
        assert_eq!(repo.scope(), "octo/*");
        assert!(repo.is_wildcard());

        let shared = Secret {
            kind: SecretType::Shared,
            org: "octo".to_string(),
            team: "ops".to_string(),
            ..Default::default()
        };
        assert_eq!(shared.scope(), "octo/ops");
    }

    #[test]
    fn test_parse_type() {
        assert_eq!("shared".parse::<SecretType>().unwrap(), SecretType::Shared);
        assert!("team".parse::<SecretType>().is_err());
    }
}

//! Pipeline domain types

use serde::{Deserialize, Serialize};

/// Compiled build definition for a repository at a given ref
///
/// `data` holds the compiled sections uncompressed; the section flags
/// report which of them are non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: i64,
    pub repo_id: i64,
    pub number: i64,
    pub commit: String,
    pub flavor: String,
    pub platform: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    pub services: bool,
    pub stages: bool,
    pub steps: bool,
    pub templates: bool,
    pub data: Vec<u8>,
}

impl Pipeline {
    /// True when any compiled section is flagged as present
    pub fn has_sections(&self) -> bool {
        self.services || self.stages || self.steps || self.templates
    }
}

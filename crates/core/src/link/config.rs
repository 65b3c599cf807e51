//! Configuration for link policy.

use serde::{Deserialize, Serialize};

/// Which score links are refused before any work starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkPolicyConfig {
    /// Path segments that mark a restricted collection.
    #[serde(default = "default_restricted_segments")]
    pub restricted_segments: Vec<String>,

    /// Message sent back when a link hits a restricted segment.
    #[serde(default = "default_policy_message")]
    pub policy_message: String,
}

fn default_restricted_segments() -> Vec<String> {
    vec!["official_scores".to_string()]
}

fn default_policy_message() -> String {
    "Official scores are licensed by their publishers and cannot be downloaded.".to_string()
}

impl Default for LinkPolicyConfig {
    fn default() -> Self {
        Self {
            restricted_segments: default_restricted_segments(),
            policy_message: default_policy_message(),
        }
    }
}

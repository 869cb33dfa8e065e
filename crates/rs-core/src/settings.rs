//! # Engine Settings
//!
//! Tunables the host passes in at construction. Loaded by the `configs`
//! crate; every field has a default so an empty config is a working one.

use serde::{Deserialize, Serialize};

use crate::ledger::RepeatPolicy;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub votes: VoteSettings,
    pub comments: CommentSettings,
    pub ranking: RankingSettings,
}

/// Repeat-vote policy, chosen per entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoteSettings {
    pub authenticated_repeat: RepeatPolicy,
    pub anonymous_repeat: RepeatPolicy,
}

impl Default for VoteSettings {
    fn default() -> Self {
        Self {
            authenticated_repeat: RepeatPolicy::Reject,
            anonymous_repeat: RepeatPolicy::Toggle,
        }
    }
}

impl VoteSettings {
    pub fn policy_for(&self, authenticated: bool) -> RepeatPolicy {
        if authenticated {
            self.authenticated_repeat
        } else {
            self.anonymous_repeat
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentSettings {
    /// Inclusive, counted in chars after trimming.
    pub max_content_chars: usize,
    pub max_display_name_chars: usize,
    pub default_display_name: String,
}

impl Default for CommentSettings {
    fn default() -> Self {
        Self {
            max_content_chars: 1000,
            max_display_name_chars: 50,
            default_display_name: "Anonymous".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingSettings {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

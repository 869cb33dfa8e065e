//! # Boundary Schemas
//!
//! Strict request payloads as they arrive from whatever surface hosts the
//! engine. Each one deserializes with unknown fields rejected and is then
//! validated into a typed command; nothing untyped reaches the stores.

use serde::{Deserialize, Serialize};

use crate::comments::CommentDraft;
use crate::error::ValidationError;
use crate::models::{CommentId, TargetId, VoteDirection};
use crate::ranking::ScoreMode;
use crate::settings::{CommentSettings, RankingSettings};

/// Who is asking. The host resolves authentication and extracts the client
/// address from headers; the engine never parses either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Requester {
    #[serde(default)]
    pub user_id: Option<String>,
    pub client_address: String,
}

impl Requester {
    pub fn anonymous(client_address: impl Into<String>) -> Self {
        Self { user_id: None, client_address: client_address.into() }
    }

    pub fn user(user_id: impl Into<String>, client_address: impl Into<String>) -> Self {
        Self { user_id: Some(user_id.into()), client_address: client_address.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VoteRequest {
    pub target_id: TargetId,
    pub direction: String,
}

impl VoteRequest {
    pub fn new(target_id: TargetId, direction: impl Into<String>) -> Self {
        Self { target_id, direction: direction.into() }
    }

    pub fn validate(&self) -> Result<VoteDirection, ValidationError> {
        self.direction.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CommentRequest {
    pub target_id: TargetId,
    pub content: String,
    #[serde(default)]
    pub parent_comment_id: Option<CommentId>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl CommentRequest {
    pub fn top_level(target_id: TargetId, content: impl Into<String>) -> Self {
        Self { target_id, content: content.into(), parent_comment_id: None, display_name: None }
    }

    pub fn reply(target_id: TargetId, parent: CommentId, content: impl Into<String>) -> Self {
        Self { parent_comment_id: Some(parent), ..Self::top_level(target_id, content) }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn validate(&self, settings: &CommentSettings) -> Result<CommentDraft, ValidationError> {
        CommentDraft::new(
            self.target_id,
            &self.content,
            self.display_name.as_deref(),
            self.parent_comment_id,
            settings,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RankRequest {
    pub mode: String,
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// A ranking request after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankQuery {
    pub mode: ScoreMode,
    pub offset: usize,
    pub limit: usize,
}

impl RankRequest {
    pub fn new(mode: impl Into<String>) -> Self {
        Self { mode: mode.into(), offset: None, limit: None }
    }

    /// `limit` defaults to the configured page size and is clamped to the
    /// maximum; an explicit zero is rejected.
    pub fn validate(&self, settings: &RankingSettings) -> Result<RankQuery, ValidationError> {
        let mode: ScoreMode = self.mode.parse()?;
        let limit = match self.limit {
            Some(0) => return Err(ValidationError::InvalidPage("limit must be at least 1".into())),
            Some(n) => n.min(settings.max_page_size),
            None => settings.default_page_size,
        };
        Ok(RankQuery { mode, offset: self.offset.unwrap_or(0), limit })
    }
}

//! # Domain Models
//!
//! These structs represent the engagement records owned by the engine and
//! the read models handed back to callers. Targets (the shared books) are
//! owned elsewhere; we only ever see their integer id and creation time.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Id of the content item votes and comments attach to.
pub type TargetId = i64;

/// Comment ids are assigned by the store, monotonically increasing.
pub type CommentId = i64;

const USER_KEY_PREFIX: &str = "user:";
const ANON_KEY_PREFIX: &str = "anon:";

/// Canonical key distinguishing one voter or liker.
///
/// Never holds a raw client address. Computed per request and only ever
/// persisted as the uniqueness key on vote and like records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VoterIdentity {
    Authenticated { user_id: String },
    Anonymous { fingerprint: String },
}

impl VoterIdentity {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// Single-column form used by the stores (`user:<id>` / `anon:<hex>`).
    pub fn storage_key(&self) -> String {
        match self {
            Self::Authenticated { user_id } => format!("{USER_KEY_PREFIX}{user_id}"),
            Self::Anonymous { fingerprint } => format!("{ANON_KEY_PREFIX}{fingerprint}"),
        }
    }

    pub fn from_storage_key(key: &str) -> Option<Self> {
        if let Some(user_id) = key.strip_prefix(USER_KEY_PREFIX) {
            Some(Self::Authenticated { user_id: user_id.to_string() })
        } else {
            key.strip_prefix(ANON_KEY_PREFIX)
                .map(|fp| Self::Anonymous { fingerprint: fp.to_string() })
        }
    }
}

/// Log-friendly form; fingerprints are abbreviated.
impl fmt::Display for VoterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticated { user_id } => write!(f, "user:{user_id}"),
            Self::Anonymous { fingerprint } => {
                let short = fingerprint.get(..8).unwrap_or(fingerprint.as_str());
                write!(f, "anon:{short}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl fmt::Display for VoteDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact match only: `"Up"` or `" up"` are rejected.
impl FromStr for VoteDirection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(ValidationError::InvalidDirection(other.to_string())),
        }
    }
}

/// A voter's standing on a target after an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteState {
    Up,
    Down,
    None,
}

impl From<Option<VoteDirection>> for VoteState {
    fn from(direction: Option<VoteDirection>) -> Self {
        match direction {
            Some(VoteDirection::Up) => Self::Up,
            Some(VoteDirection::Down) => Self::Down,
            None => Self::None,
        }
    }
}

/// At most one per `(target_id, identity)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub id: Uuid,
    pub target_id: TargetId,
    pub identity: VoterIdentity,
    pub direction: VoteDirection,
    pub created_at: DateTime<Utc>,
}

/// Immutable once posted. Replies point at a top-level comment only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub target_id: TargetId,
    pub author_identity: VoterIdentity,
    pub display_name: String,
    pub parent_comment_id: Option<CommentId>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_comment_id.is_some()
    }
}

/// A validated comment waiting for the store to assign its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub target_id: TargetId,
    pub author_identity: VoterIdentity,
    pub display_name: String,
    pub parent_comment_id: Option<CommentId>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl NewComment {
    pub fn into_comment(self, id: CommentId) -> Comment {
        Comment {
            id,
            target_id: self.target_id,
            author_identity: self.author_identity,
            display_name: self.display_name,
            parent_comment_id: self.parent_comment_id,
            content: self.content,
            created_at: self.created_at,
        }
    }
}

/// Exists means liked. At most one per `(comment_id, identity)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentLikeRecord {
    pub id: Uuid,
    pub comment_id: CommentId,
    pub identity: VoterIdentity,
    pub created_at: DateTime<Utc>,
}

/// A comment as the store returns it for one viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentRow {
    pub comment: Comment,
    pub like_count: u64,
    pub liked_by_viewer: bool,
}

/// Reference to a ranking candidate, supplied by whoever owns targets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
    pub id: TargetId,
    pub created_at: DateTime<Utc>,
}

/// Raw aggregates for one target, read in a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementCounts {
    pub target_id: TargetId,
    pub upvotes: u64,
    pub downvotes: u64,
    pub comment_count: u64,
}

/// Derived on read, never stored. Feeds the ranking engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementSnapshot {
    pub target_id: TargetId,
    pub upvotes: u64,
    pub downvotes: u64,
    pub comment_count: u64,
    pub age_in_days: f64,
}

// ── Read models ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteCounts {
    pub upvotes: u64,
    pub downvotes: u64,
}

impl VoteCounts {
    pub fn net(&self) -> i64 {
        self.upvotes as i64 - self.downvotes as i64
    }
}

/// Result of a vote cast, read back in the same atomic step as the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    pub new_state: VoteState,
    pub counts: VoteCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatus {
    pub has_voted: bool,
    pub direction: Option<VoteDirection>,
}

impl From<Option<VoteDirection>> for VoteStatus {
    fn from(direction: Option<VoteDirection>) -> Self {
        Self { has_voted: direction.is_some(), direction }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeStatus {
    pub is_liked: bool,
    pub like_count: u64,
}

/// One node of the rendered thread. Replies never carry replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: CommentId,
    pub content: String,
    pub author_display_name: String,
    pub created_at: DateTime<Utc>,
    pub like_count: u64,
    pub is_liked: bool,
    pub replies: Vec<CommentView>,
}

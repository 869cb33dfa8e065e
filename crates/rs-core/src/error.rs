//! # AppError
//!
//! Centralized error handling for the Rusty-Shelf engagement engine.
//! Every port and engine operation returns these typed results; nothing
//! panics across the identity-resolution boundary.

use thiserror::Error;

use crate::models::{CommentId, VoteDirection};

/// Input rejected before any mutation took place.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Direction must be exactly `up` or `down`.
    #[error("invalid direction {0:?}, expected \"up\" or \"down\"")]
    InvalidDirection(String),

    #[error("comment content is empty")]
    EmptyContent,

    #[error("comment content is {actual} characters, the limit is {max}")]
    ContentTooLong { max: usize, actual: usize },

    #[error("display name is {actual} characters, the limit is {max}")]
    DisplayNameTooLong { max: usize, actual: usize },

    /// Parent is missing, belongs to another target, or is itself a reply.
    #[error("invalid parent comment {0}")]
    InvalidParent(CommentId),

    #[error("invalid score mode {0:?}, expected one of hot, top, new, discussed")]
    InvalidScoreMode(String),

    #[error("invalid page: {0}")]
    InvalidPage(String),
}

/// The primary error type for all rs-core operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Malformed request (bad direction, empty or over-long content, bad parent)
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Repeat of the same vote under the strict-reject policy
    #[error("conflict: already voted {direction} on this target")]
    AlreadyVoted { direction: VoteDirection },

    /// Resource not found (e.g., Comment, Target)
    #[error("{0} not found with ID {1}")]
    NotFound(&'static str, String),

    /// Backing store unavailable or transaction failure. Not retried here.
    #[error("storage error: {0}")]
    Storage(String),
}

impl AppError {
    /// HTTP-equivalent status for whatever surface renders this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(..) => 404,
            Self::AlreadyVoted { .. } => 409,
            Self::Storage(_) => 503,
        }
    }

    pub fn comment_not_found(id: CommentId) -> Self {
        Self::NotFound("comment", id.to_string())
    }
}

/// A specialized Result type for Rusty-Shelf logic.
pub type Result<T> = std::result::Result<T, AppError>;

//! # Core Traits (Ports)
//!
//! Any store or hashing plugin must implement these traits to be used by the
//! engine. Stores are the source of truth: every mutating method must be a
//! single atomic step (unique key, row lock or compare-and-swap), because two
//! requests from the same identity may race.

use async_trait::async_trait;
#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use crate::error::Result;
use crate::ledger::RepeatPolicy;
use crate::models::{
    Comment, CommentId, CommentRow, EngagementCounts, LikeStatus, NewComment, TargetId,
    VoteCounts, VoteDirection, VoteOutcome, VoteRecord, VoterIdentity,
};

/// One-way digest used for anonymous fingerprints.
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait IdentityHasher: Send + Sync {
    /// Must be deterministic for a fixed `(client_address, target_id)` and
    /// differ across targets.
    fn fingerprint(&self, client_address: &str, target_id: TargetId) -> String;
}

/// Persistence contract for vote records.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait VoteRepo: Send + Sync {
    /// Looks up the existing record, applies [`crate::ledger::plan_vote`] and
    /// writes the result, then reads the counts back, all in one atomic step.
    async fn apply_vote(
        &self,
        target_id: TargetId,
        identity: &VoterIdentity,
        direction: VoteDirection,
        policy: RepeatPolicy,
    ) -> Result<VoteOutcome>;

    async fn vote_direction(
        &self,
        target_id: TargetId,
        identity: &VoterIdentity,
    ) -> Result<Option<VoteDirection>>;

    async fn vote_counts(&self, target_id: TargetId) -> Result<VoteCounts>;

    /// Every live record on a target. Used for audits and tests.
    async fn vote_records(&self, target_id: TargetId) -> Result<Vec<VoteRecord>>;
}

/// Persistence contract for comments and comment likes.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait CommentRepo: Send + Sync {
    /// Assigns the id. Parent validity is checked by the caller; comments are
    /// immutable so the check cannot go stale.
    async fn insert_comment(&self, comment: NewComment) -> Result<Comment>;

    async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>>;

    /// All comments on a target, any order, annotated for `viewer`.
    async fn list_comments(
        &self,
        target_id: TargetId,
        viewer: &VoterIdentity,
    ) -> Result<Vec<CommentRow>>;

    /// Deletes the like if present, inserts it otherwise, and returns the
    /// new state with the updated count. `NotFound` if the comment is gone.
    async fn toggle_like(&self, comment_id: CommentId, identity: &VoterIdentity)
        -> Result<LikeStatus>;

    async fn like_status(&self, comment_id: CommentId, identity: &VoterIdentity)
        -> Result<LikeStatus>;
}

/// Batched aggregate read feeding the ranking engine.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait EngagementReader: Send + Sync {
    /// One entry per requested id, zeroes for targets with no engagement.
    async fn engagement_counts(&self, target_ids: &[TargetId]) -> Result<Vec<EngagementCounts>>;
}

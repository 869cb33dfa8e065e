//! # rs-db-memory
//!
//! In-process implementation of the rs-core storage ports.
//!
//! Each target's votes and each comment's likes live behind one `DashMap`
//! entry. Holding that entry's write guard makes read-plan-write-count a
//! single atomic step, which is what the ledger's uniqueness rule needs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rs_core::error::{AppError, Result};
use rs_core::ledger::{self, RepeatPolicy, VoteTransition};
use rs_core::models::{
    Comment, CommentId, CommentLikeRecord, CommentRow, EngagementCounts, LikeStatus, NewComment,
    TargetId, VoteCounts, VoteDirection, VoteOutcome, VoteRecord, VoterIdentity,
};
use rs_core::traits::{CommentRepo, EngagementReader, VoteRepo};
use uuid::Uuid;

/// Records keyed by `VoterIdentity::storage_key`.
type ByIdentity<T> = HashMap<String, T>;

#[derive(Default)]
pub struct MemoryStore {
    votes: DashMap<TargetId, ByIdentity<VoteRecord>>,
    comments: DashMap<CommentId, Comment>,
    /// Comment ids per target, in insertion order.
    threads: DashMap<TargetId, Vec<CommentId>>,
    likes: DashMap<CommentId, ByIdentity<CommentLikeRecord>>,
    last_comment_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn comment_count(&self, target_id: TargetId) -> u64 {
        self.threads.get(&target_id).map_or(0, |ids| ids.len() as u64)
    }

    fn like_count_and_flag(&self, comment_id: CommentId, key: &str) -> (u64, bool) {
        self.likes
            .get(&comment_id)
            .map_or((0, false), |likes| (likes.len() as u64, likes.contains_key(key)))
    }

    fn ensure_comment(&self, comment_id: CommentId) -> Result<()> {
        if self.comments.contains_key(&comment_id) {
            Ok(())
        } else {
            Err(AppError::comment_not_found(comment_id))
        }
    }
}

#[async_trait]
impl VoteRepo for MemoryStore {
    async fn apply_vote(
        &self,
        target_id: TargetId,
        identity: &VoterIdentity,
        direction: VoteDirection,
        policy: RepeatPolicy,
    ) -> Result<VoteOutcome> {
        let key = identity.storage_key();
        // Write guard on this target's shard until the counts are read.
        let mut records = self.votes.entry(target_id).or_default();

        let existing = records.get(&key).map(|r| r.direction);
        let transition = ledger::plan_vote(existing, direction, policy)?;
        match transition {
            VoteTransition::Insert(d) => {
                records.insert(
                    key,
                    VoteRecord {
                        id: Uuid::now_v7(),
                        target_id,
                        identity: identity.clone(),
                        direction: d,
                        created_at: Utc::now(),
                    },
                );
            }
            VoteTransition::Switch { to, .. } => {
                if let Some(record) = records.get_mut(&key) {
                    record.direction = to;
                }
            }
            VoteTransition::Remove(_) => {
                records.remove(&key);
            }
        }

        let counts = ledger::tally(records.values());
        tracing::trace!(target_id, ?transition, "memory vote write");
        Ok(VoteOutcome { new_state: transition.resulting_state(), counts })
    }

    async fn vote_direction(
        &self,
        target_id: TargetId,
        identity: &VoterIdentity,
    ) -> Result<Option<VoteDirection>> {
        let key = identity.storage_key();
        Ok(self
            .votes
            .get(&target_id)
            .and_then(|records| records.get(&key).map(|r| r.direction)))
    }

    async fn vote_counts(&self, target_id: TargetId) -> Result<VoteCounts> {
        Ok(self
            .votes
            .get(&target_id)
            .map(|records| ledger::tally(records.values()))
            .unwrap_or_default())
    }

    async fn vote_records(&self, target_id: TargetId) -> Result<Vec<VoteRecord>> {
        let mut records: Vec<VoteRecord> = self
            .votes
            .get(&target_id)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by_key(|r| (r.created_at, r.id));
        Ok(records)
    }
}

#[async_trait]
impl CommentRepo for MemoryStore {
    async fn insert_comment(&self, comment: NewComment) -> Result<Comment> {
        let id = self.last_comment_id.fetch_add(1, Ordering::SeqCst) + 1;
        let comment = comment.into_comment(id);
        // Publish the comment before indexing it so listings never see a dangling id.
        self.comments.insert(id, comment.clone());
        self.threads.entry(comment.target_id).or_default().push(id);
        Ok(comment)
    }

    async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>> {
        Ok(self.comments.get(&id).map(|c| c.value().clone()))
    }

    async fn list_comments(
        &self,
        target_id: TargetId,
        viewer: &VoterIdentity,
    ) -> Result<Vec<CommentRow>> {
        let key = viewer.storage_key();
        let ids = self.threads.get(&target_id).map(|ids| ids.value().clone()).unwrap_or_default();

        Ok(ids
            .into_iter()
            .filter_map(|id| self.comments.get(&id).map(|c| c.value().clone()))
            .map(|comment| {
                let (like_count, liked_by_viewer) = self.like_count_and_flag(comment.id, &key);
                CommentRow { comment, like_count, liked_by_viewer }
            })
            .collect())
    }

    async fn toggle_like(
        &self,
        comment_id: CommentId,
        identity: &VoterIdentity,
    ) -> Result<LikeStatus> {
        self.ensure_comment(comment_id)?;
        let key = identity.storage_key();
        let mut likes = self.likes.entry(comment_id).or_default();

        let is_liked = if likes.remove(&key).is_some() {
            false
        } else {
            likes.insert(
                key,
                CommentLikeRecord {
                    id: Uuid::now_v7(),
                    comment_id,
                    identity: identity.clone(),
                    created_at: Utc::now(),
                },
            );
            true
        };
        Ok(LikeStatus { is_liked, like_count: likes.len() as u64 })
    }

    async fn like_status(
        &self,
        comment_id: CommentId,
        identity: &VoterIdentity,
    ) -> Result<LikeStatus> {
        self.ensure_comment(comment_id)?;
        let (like_count, is_liked) = self.like_count_and_flag(comment_id, &identity.storage_key());
        Ok(LikeStatus { is_liked, like_count })
    }
}

#[async_trait]
impl EngagementReader for MemoryStore {
    async fn engagement_counts(&self, target_ids: &[TargetId]) -> Result<Vec<EngagementCounts>> {
        let mut out = Vec::with_capacity(target_ids.len());
        for &target_id in target_ids {
            let votes = self.vote_counts(target_id).await?;
            out.push(EngagementCounts {
                target_id,
                upvotes: votes.upvotes,
                downvotes: votes.downvotes,
                comment_count: self.comment_count(target_id),
            });
        }
        Ok(out)
    }
}

//! # Engine
//!
//! Request-level entry points. Holds the resolver, ledger, comment store and
//! ranking over injected ports; the host owns the lifecycle of the handles.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::comments::CommentThreads;
use crate::error::Result;
use crate::identity::IdentityResolver;
use crate::ledger::{RepeatPolicy, VoteLedger};
use crate::models::{
    Comment, CommentId, CommentView, EngagementCounts, LikeStatus, TargetId, TargetRef,
    VoteCounts, VoteOutcome, VoteStatus, VoterIdentity,
};
use crate::ranking::{self, RankedList};
use crate::requests::{CommentRequest, RankRequest, Requester, VoteRequest};
use crate::settings::EngineSettings;
use crate::traits::{CommentRepo, EngagementReader, IdentityHasher, VoteRepo};

#[derive(Clone)]
pub struct Engine {
    resolver: IdentityResolver,
    ledger: VoteLedger,
    threads: CommentThreads,
    engagement: Arc<dyn EngagementReader>,
    settings: Arc<EngineSettings>,
}

impl Engine {
    /// Wires every port to one store.
    pub fn new<S>(store: Arc<S>, hasher: Arc<dyn IdentityHasher>, settings: EngineSettings) -> Self
    where
        S: VoteRepo + CommentRepo + EngagementReader + 'static,
    {
        Self::from_parts(store.clone(), store.clone(), store, hasher, settings)
    }

    pub fn from_parts(
        votes: Arc<dyn VoteRepo>,
        comments: Arc<dyn CommentRepo>,
        engagement: Arc<dyn EngagementReader>,
        hasher: Arc<dyn IdentityHasher>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            resolver: IdentityResolver::new(hasher),
            ledger: VoteLedger::new(votes),
            threads: CommentThreads::new(comments),
            engagement,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn identity_for(&self, requester: &Requester, target_id: TargetId) -> VoterIdentity {
        self.resolver
            .resolve(requester.user_id.as_deref(), &requester.client_address, target_id)
    }

    // ── Votes ───────────────────────────────────────────────────────────────

    /// Repeat policy follows the identity kind (`engine.votes`).
    pub async fn cast_vote(&self, requester: &Requester, req: &VoteRequest) -> Result<VoteOutcome> {
        let direction = req.validate()?;
        let identity = self.identity_for(requester, req.target_id);
        let policy = self.settings.votes.policy_for(identity.is_authenticated());
        self.ledger.cast_vote(req.target_id, &identity, direction, policy).await
    }

    /// Toggle call site: a repeat always un-votes, whoever the caller is.
    pub async fn toggle_vote(&self, requester: &Requester, req: &VoteRequest) -> Result<VoteOutcome> {
        let direction = req.validate()?;
        let identity = self.identity_for(requester, req.target_id);
        self.ledger
            .cast_vote(req.target_id, &identity, direction, RepeatPolicy::Toggle)
            .await
    }

    pub async fn vote_status(&self, requester: &Requester, target_id: TargetId) -> Result<VoteStatus> {
        let identity = self.identity_for(requester, target_id);
        self.ledger.vote_status(target_id, &identity).await
    }

    pub async fn vote_counts(&self, target_id: TargetId) -> Result<VoteCounts> {
        self.ledger.counts(target_id).await
    }

    // ── Comments ────────────────────────────────────────────────────────────

    pub async fn post_comment(&self, requester: &Requester, req: &CommentRequest) -> Result<Comment> {
        let draft = req.validate(&self.settings.comments)?;
        let identity = self.identity_for(requester, req.target_id);
        self.threads.post_comment(draft, &identity).await
    }

    pub async fn list_comments(
        &self,
        requester: &Requester,
        target_id: TargetId,
    ) -> Result<Vec<CommentView>> {
        let viewer = self.identity_for(requester, target_id);
        self.threads.list_comments(target_id, &viewer).await
    }

    /// Anonymous likers are fingerprinted against the comment's target, the
    /// same key `list_comments` uses for `isLiked`.
    pub async fn toggle_like(&self, requester: &Requester, comment_id: CommentId) -> Result<LikeStatus> {
        let comment = self.threads.get_comment(comment_id).await?;
        let identity = self.identity_for(requester, comment.target_id);
        self.threads.toggle_like(comment_id, &identity).await
    }

    pub async fn like_status(&self, requester: &Requester, comment_id: CommentId) -> Result<LikeStatus> {
        let comment = self.threads.get_comment(comment_id).await?;
        let identity = self.identity_for(requester, comment.target_id);
        self.threads.like_status(comment_id, &identity).await
    }

    // ── Ranking ─────────────────────────────────────────────────────────────

    /// Scores `candidates` from one batched aggregate read. Duplicate
    /// candidates keep their first occurrence.
    #[tracing::instrument(skip(self, candidates), fields(mode = %req.mode, candidates = candidates.len()))]
    pub async fn ranked(
        &self,
        req: &RankRequest,
        candidates: &[TargetRef],
        now: DateTime<Utc>,
    ) -> Result<RankedList> {
        let query = req.validate(&self.settings.ranking)?;

        let mut seen = HashSet::with_capacity(candidates.len());
        let unique: Vec<TargetRef> = candidates
            .iter()
            .filter(|c| seen.insert(c.id))
            .copied()
            .collect();
        let ids: Vec<TargetId> = unique.iter().map(|c| c.id).collect();

        let counts: HashMap<TargetId, EngagementCounts> = self
            .engagement
            .engagement_counts(&ids)
            .await?
            .into_iter()
            .map(|c| (c.target_id, c))
            .collect();

        let targets = unique.iter().map(|c| {
            let engagement = counts.get(&c.id).copied().unwrap_or(EngagementCounts {
                target_id: c.id,
                ..Default::default()
            });
            (engagement, c.created_at)
        });
        let ranked = ranking::rank_at(query.mode, now, targets);
        tracing::debug!(total = ranked.len(), "ranked candidates");
        Ok(RankedList::page(query.mode, ranked, query.offset, query.limit))
    }
}

//! # Vote Ledger
//!
//! One logical vote per `(target, identity)`. The decision of what a cast
//! does lives in [`plan_vote`], a pure function every store calls from inside
//! its atomic section, so the rules are the same whatever the backend.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{
    TargetId, VoteCounts, VoteDirection, VoteOutcome, VoteRecord, VoteState, VoteStatus,
    VoterIdentity,
};
use crate::traits::VoteRepo;

/// What a repeat of the same direction does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatPolicy {
    /// "already voted this way", no mutation.
    Reject,
    /// Un-vote: the record is removed.
    Toggle,
}

/// The single write a cast resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTransition {
    Insert(VoteDirection),
    Switch { from: VoteDirection, to: VoteDirection },
    Remove(VoteDirection),
}

impl VoteTransition {
    pub fn resulting_state(&self) -> VoteState {
        match self {
            Self::Insert(d) | Self::Switch { to: d, .. } => VoteState::from(Some(*d)),
            Self::Remove(_) => VoteState::None,
        }
    }
}

/// Decides the transition for `requested` given the current record.
///
/// A different direction always overwrites in place; there is no
/// intermediate "none" state.
pub fn plan_vote(
    existing: Option<VoteDirection>,
    requested: VoteDirection,
    policy: RepeatPolicy,
) -> Result<VoteTransition> {
    match existing {
        None => Ok(VoteTransition::Insert(requested)),
        Some(current) if current != requested => Ok(VoteTransition::Switch {
            from: current,
            to: requested,
        }),
        Some(current) => match policy {
            RepeatPolicy::Reject => Err(AppError::AlreadyVoted { direction: current }),
            RepeatPolicy::Toggle => Ok(VoteTransition::Remove(current)),
        },
    }
}

/// Counts computed straight from the records, never from a cache.
pub fn tally<'a>(records: impl IntoIterator<Item = &'a VoteRecord>) -> VoteCounts {
    records.into_iter().fold(VoteCounts::default(), |mut acc, r| {
        match r.direction {
            VoteDirection::Up => acc.upvotes += 1,
            VoteDirection::Down => acc.downvotes += 1,
        }
        acc
    })
}

#[derive(Clone)]
pub struct VoteLedger {
    repo: Arc<dyn VoteRepo>,
}

impl VoteLedger {
    pub fn new(repo: Arc<dyn VoteRepo>) -> Self {
        Self { repo }
    }

    #[tracing::instrument(skip(self, identity), fields(identity = %identity))]
    pub async fn cast_vote(
        &self,
        target_id: TargetId,
        identity: &VoterIdentity,
        direction: VoteDirection,
        policy: RepeatPolicy,
    ) -> Result<VoteOutcome> {
        match self.repo.apply_vote(target_id, identity, direction, policy).await {
            Ok(outcome) => {
                tracing::debug!(state = ?outcome.new_state, up = outcome.counts.upvotes,
                    down = outcome.counts.downvotes, "vote applied");
                Ok(outcome)
            }
            Err(err @ AppError::AlreadyVoted { .. }) => {
                tracing::warn!("repeat vote rejected");
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn vote_status(
        &self,
        target_id: TargetId,
        identity: &VoterIdentity,
    ) -> Result<VoteStatus> {
        Ok(self.repo.vote_direction(target_id, identity).await?.into())
    }

    pub async fn counts(&self, target_id: TargetId) -> Result<VoteCounts> {
        self.repo.vote_counts(target_id).await
    }
}

//! # Ranking Engine
//!
//! Pure scoring over [`EngagementSnapshot`]s. Holds no state and takes no
//! locks, so listings can be scored on any number of threads at once.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::models::{EngagementCounts, EngagementSnapshot, TargetId};

const MS_PER_DAY: f64 = 86_400_000.0;

/// A comment is worth half an upvote when competing for hotness.
pub const HOT_COMMENT_WEIGHT: f64 = 0.5;
pub const HOT_GRAVITY: f64 = 1.5;
pub const DISCUSSED_GRAVITY: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreMode {
    Hot,
    Top,
    New,
    Discussed,
}

impl ScoreMode {
    pub const ALL: [ScoreMode; 4] = [Self::Hot, Self::Top, Self::New, Self::Discussed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Top => "top",
            Self::New => "new",
            Self::Discussed => "discussed",
        }
    }
}

impl fmt::Display for ScoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoreMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidScoreMode(s.to_string()))
    }
}

/// Fractional days since `created_at`, negative for timestamps in the future.
fn signed_age_in_days(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - created_at).num_milliseconds() as f64 / MS_PER_DAY
}

/// Fractional days since `created_at`. Never truncated; clamps to 0 for
/// timestamps in the future.
pub fn age_in_days(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    signed_age_in_days(created_at, now).max(0.0)
}

pub fn snapshot(
    counts: EngagementCounts,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> EngagementSnapshot {
    EngagementSnapshot {
        target_id: counts.target_id,
        upvotes: counts.upvotes,
        downvotes: counts.downvotes,
        comment_count: counts.comment_count,
        age_in_days: age_in_days(created_at, now),
    }
}

/// Sort key for `snapshot` under `mode`; higher ranks first.
///
/// Total over any snapshot with a finite, non-negative age: every divisor
/// is at least 1.
pub fn score(mode: ScoreMode, snapshot: &EngagementSnapshot) -> f64 {
    let net = snapshot.upvotes as f64 - snapshot.downvotes as f64;
    let comments = snapshot.comment_count as f64;
    let age = snapshot.age_in_days.max(0.0);

    match mode {
        ScoreMode::Top => net,
        ScoreMode::New => -age,
        ScoreMode::Discussed => comments / (age + 1.0).powf(DISCUSSED_GRAVITY),
        ScoreMode::Hot => (net + HOT_COMMENT_WEIGHT * comments) / (age + 1.0).powf(HOT_GRAVITY),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedItem {
    pub score: f64,
    #[serde(flatten)]
    pub snapshot: EngagementSnapshot,
}

impl RankedItem {
    pub fn target_id(&self) -> TargetId {
        self.snapshot.target_id
    }
}

/// Higher score first, then ascending target id, so pages are reproducible.
fn compare(a: &RankedItem, b: &RankedItem) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.target_id().cmp(&b.target_id()))
}

fn sorted(mut items: Vec<RankedItem>) -> Vec<RankedItem> {
    items.sort_by(compare);
    items
}

pub fn rank(mode: ScoreMode, snapshots: impl IntoIterator<Item = EngagementSnapshot>) -> Vec<RankedItem> {
    sorted(
        snapshots
            .into_iter()
            .map(|s| RankedItem {
                score: score(mode, &s),
                snapshot: s,
            })
            .collect(),
    )
}

/// Snapshots and ranks targets as of `now`.
///
/// The reported age is clamped, but `new` scores on the signed age so that
/// future-dated targets still sort by creation time, latest first.
pub fn rank_at(
    mode: ScoreMode,
    now: DateTime<Utc>,
    targets: impl IntoIterator<Item = (EngagementCounts, DateTime<Utc>)>,
) -> Vec<RankedItem> {
    sorted(
        targets
            .into_iter()
            .map(|(counts, created_at)| {
                let snapshot = snapshot(counts, created_at, now);
                let score = match mode {
                    ScoreMode::New => -signed_age_in_days(created_at, now),
                    _ => score(mode, &snapshot),
                };
                RankedItem { score, snapshot }
            })
            .collect(),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedList {
    pub items: Vec<RankedItem>,
    pub score_mode: ScoreMode,
    pub total: usize,
    pub offset: usize,
}

impl RankedList {
    pub fn page(mode: ScoreMode, ranked: Vec<RankedItem>, offset: usize, limit: usize) -> Self {
        let total = ranked.len();
        let items = ranked.into_iter().skip(offset).take(limit).collect();
        Self { items, score_mode: mode, total, offset }
    }
}

//! # Comment Thread Store
//!
//! Comments with one level of nesting, plus per-comment likes keyed by the
//! same [`VoterIdentity`] rule as votes. Likes are a pure toggle.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::error::{AppError, Result, ValidationError};
use crate::models::{
    Comment, CommentId, CommentRow, CommentView, LikeStatus, NewComment, TargetId, VoterIdentity,
};
use crate::settings::CommentSettings;
use crate::traits::CommentRepo;

/// Comment input that passed every check that needs no storage access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentDraft {
    pub target_id: TargetId,
    pub content: String,
    pub display_name: String,
    pub parent_comment_id: Option<CommentId>,
}

impl CommentDraft {
    pub fn new(
        target_id: TargetId,
        content: &str,
        display_name: Option<&str>,
        parent_comment_id: Option<CommentId>,
        settings: &CommentSettings,
    ) -> std::result::Result<Self, ValidationError> {
        Ok(Self {
            target_id,
            content: validate_content(content, settings.max_content_chars)?,
            display_name: normalize_display_name(display_name, settings)?,
            parent_comment_id,
        })
    }
}

/// Trims, then requires `1..=max` chars.
pub fn validate_content(raw: &str, max: usize) -> std::result::Result<String, ValidationError> {
    let content = raw.trim();
    let len = content.chars().count();
    if len == 0 {
        return Err(ValidationError::EmptyContent);
    }
    if len > max {
        return Err(ValidationError::ContentTooLong { max, actual: len });
    }
    Ok(content.to_string())
}

pub fn normalize_display_name(
    raw: Option<&str>,
    settings: &CommentSettings,
) -> std::result::Result<String, ValidationError> {
    let name = raw.map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Ok(settings.default_display_name.clone());
    }
    let len = name.chars().count();
    if len > settings.max_display_name_chars {
        return Err(ValidationError::DisplayNameTooLong {
            max: settings.max_display_name_chars,
            actual: len,
        });
    }
    Ok(name.to_string())
}

/// Builds the rendered thread from flat rows.
///
/// Top-level comments come newest-first, replies oldest-first. Replies to a
/// reply (never written by us, but possible in imported data) are flattened
/// into the reply list of their top-level ancestor.
pub fn build_thread(rows: Vec<CommentRow>) -> Vec<CommentView> {
    let parents: HashMap<CommentId, Option<CommentId>> = rows
        .iter()
        .map(|r| (r.comment.id, r.comment.parent_comment_id))
        .collect();

    let root_of = |mut id: CommentId| -> Option<CommentId> {
        // Bounded walk; a cycle in bad data must not hang us.
        for _ in 0..=parents.len() {
            match parents.get(&id)? {
                None => return Some(id),
                Some(parent) => id = *parent,
            }
        }
        None
    };

    let (mut tops, replies): (Vec<CommentRow>, Vec<CommentRow>) =
        rows.into_iter().partition(|r| !r.comment.is_reply());

    tops.sort_by(|a, b| {
        b.comment
            .created_at
            .cmp(&a.comment.created_at)
            .then(b.comment.id.cmp(&a.comment.id))
    });

    let mut grouped: HashMap<CommentId, Vec<CommentRow>> = HashMap::new();
    for reply in replies {
        match reply.comment.parent_comment_id.and_then(&root_of) {
            Some(root) => grouped.entry(root).or_default().push(reply),
            None => tracing::warn!(comment_id = reply.comment.id, "dropping orphaned reply"),
        }
    }

    tops.into_iter()
        .map(|top| {
            let mut children = grouped.remove(&top.comment.id).unwrap_or_default();
            children.sort_by(|a, b| {
                a.comment
                    .created_at
                    .cmp(&b.comment.created_at)
                    .then(a.comment.id.cmp(&b.comment.id))
            });
            let mut view = to_view(top);
            view.replies = children.into_iter().map(to_view).collect();
            view
        })
        .collect()
}

fn to_view(row: CommentRow) -> CommentView {
    CommentView {
        id: row.comment.id,
        content: row.comment.content,
        author_display_name: row.comment.display_name,
        created_at: row.comment.created_at,
        like_count: row.like_count,
        is_liked: row.liked_by_viewer,
        replies: Vec::new(),
    }
}

#[derive(Clone)]
pub struct CommentThreads {
    repo: Arc<dyn CommentRepo>,
}

impl CommentThreads {
    pub fn new(repo: Arc<dyn CommentRepo>) -> Self {
        Self { repo }
    }

    /// A parent must exist, be top-level, and sit on the same target.
    #[tracing::instrument(skip(self, draft, identity), fields(target_id = draft.target_id, identity = %identity))]
    pub async fn post_comment(&self, draft: CommentDraft, identity: &VoterIdentity) -> Result<Comment> {
        if let Some(parent_id) = draft.parent_comment_id {
            let parent = self.repo.get_comment(parent_id).await?;
            let valid = parent
                .as_ref()
                .is_some_and(|p| !p.is_reply() && p.target_id == draft.target_id);
            if !valid {
                tracing::info!(parent_id, "rejecting reply to invalid parent");
                return Err(ValidationError::InvalidParent(parent_id).into());
            }
        }

        let comment = self
            .repo
            .insert_comment(NewComment {
                target_id: draft.target_id,
                author_identity: identity.clone(),
                display_name: draft.display_name,
                parent_comment_id: draft.parent_comment_id,
                content: draft.content,
                created_at: Utc::now(),
            })
            .await?;
        tracing::debug!(comment_id = comment.id, "comment posted");
        Ok(comment)
    }

    pub async fn get_comment(&self, comment_id: CommentId) -> Result<Comment> {
        self.repo
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| AppError::comment_not_found(comment_id))
    }

    pub async fn list_comments(
        &self,
        target_id: TargetId,
        viewer: &VoterIdentity,
    ) -> Result<Vec<CommentView>> {
        let rows = self.repo.list_comments(target_id, viewer).await?;
        Ok(build_thread(rows))
    }

    #[tracing::instrument(skip(self, identity), fields(identity = %identity))]
    pub async fn toggle_like(
        &self,
        comment_id: CommentId,
        identity: &VoterIdentity,
    ) -> Result<LikeStatus> {
        let status = self.repo.toggle_like(comment_id, identity).await?;
        tracing::debug!(liked = status.is_liked, count = status.like_count, "like toggled");
        Ok(status)
    }

    pub async fn like_status(
        &self,
        comment_id: CommentId,
        identity: &VoterIdentity,
    ) -> Result<LikeStatus> {
        self.repo.like_status(comment_id, identity).await
    }
}

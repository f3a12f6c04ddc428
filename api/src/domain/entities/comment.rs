//! Comment domain entity
//!
//! Comments attach to a project or a task and may reply to another comment
//! on the same entity.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserId;

pub const MAX_COMMENT_LENGTH: usize = 5000;

/// Authors can edit or delete a comment for this many hours
pub const COMMENT_EDIT_WINDOW_HOURS: i64 = 24;

/// Unique identifier for a comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommentId(pub Uuid);

impl CommentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CommentId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for CommentId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for CommentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of entity a comment is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentEntityType {
    Project,
    Task,
}

impl std::fmt::Display for CommentEntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommentEntityType::Project => write!(f, "project"),
            CommentEntityType::Task => write!(f, "task"),
        }
    }
}

impl std::str::FromStr for CommentEntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "project" => Ok(CommentEntityType::Project),
            "task" => Ok(CommentEntityType::Task),
            _ => Err(format!("Unknown comment entity type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub content: String,
    pub author_id: UserId,
    pub entity_type: CommentEntityType,
    pub entity_id: Uuid,
    pub parent_comment_id: Option<CommentId>,
    pub is_edited: bool,
    pub mentions: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_editable_at(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at <= Duration::hours(COMMENT_EDIT_WINDOW_HOURS)
    }
}

pub fn validate_content(content: &str) -> Result<(), String> {
    let len = content.trim().chars().count();
    if len == 0 || len > MAX_COMMENT_LENGTH {
        return Err(format!(
            "Comment must be between 1 and {} characters",
            MAX_COMMENT_LENGTH
        ));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub content: String,
    pub author_id: UserId,
    pub entity_type: CommentEntityType,
    pub entity_id: Uuid,
    pub parent_comment_id: Option<CommentId>,
    pub mentions: Vec<UserId>,
}

/// A top-level comment with its replies
#[derive(Debug, Clone, Serialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<CommentThread>,
}

/// Build reply trees from a flat list; orphans (parent missing) become roots
pub fn build_threads(mut comments: Vec<Comment>) -> Vec<CommentThread> {
    comments.sort_by_key(|c| c.created_at);

    let ids: std::collections::HashSet<CommentId> = comments.iter().map(|c| c.id).collect();
    let mut children: std::collections::HashMap<CommentId, Vec<Comment>> =
        std::collections::HashMap::new();
    let mut roots = Vec::new();

    for comment in comments {
        match comment.parent_comment_id {
            Some(parent) if ids.contains(&parent) => {
                children.entry(parent).or_default().push(comment)
            }
            _ => roots.push(comment),
        }
    }

    fn attach(
        comment: Comment,
        children: &mut std::collections::HashMap<CommentId, Vec<Comment>>,
    ) -> CommentThread {
        let replies = children
            .remove(&comment.id)
            .unwrap_or_default()
            .into_iter()
            .map(|c| attach(c, children))
            .collect();
        CommentThread { comment, replies }
    }

    roots
        .into_iter()
        .map(|c| attach(c, &mut children))
        .collect()
}

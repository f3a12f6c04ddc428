//! Comment service
//!
//! Threaded comments on projects and tasks, with @-mentions.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::access::ensure_project_access;
use crate::domain::entities::{
    build_threads, validate_content, Comment, CommentEntityType, CommentId, CommentThread,
    NewComment, NewNotification, NotificationType, ProjectId, Task, TaskId, User, UserId,
};
use crate::domain::ports::{
    CommentRepository, Notifier, ProjectRepository, TaskRepository, UserRepository,
};
use crate::error::{AppError, DomainError};

#[derive(Debug, Clone)]
pub struct CreateComment {
    pub entity_type: CommentEntityType,
    pub entity_id: Uuid,
    pub content: String,
    pub parent_comment_id: Option<CommentId>,
    pub mentions: Vec<UserId>,
}

pub struct CommentService<CR, TR, PR, UR>
where
    CR: CommentRepository,
    TR: TaskRepository,
    PR: ProjectRepository,
    UR: UserRepository,
{
    comments: Arc<CR>,
    tasks: Arc<TR>,
    projects: Arc<PR>,
    users: Arc<UR>,
    notifier: Arc<dyn Notifier>,
}

impl<CR, TR, PR, UR> CommentService<CR, TR, PR, UR>
where
    CR: CommentRepository,
    TR: TaskRepository,
    PR: ProjectRepository,
    UR: UserRepository,
{
    pub fn new(
        comments: Arc<CR>,
        tasks: Arc<TR>,
        projects: Arc<PR>,
        users: Arc<UR>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            comments,
            tasks,
            projects,
            users,
            notifier,
        }
    }

    pub async fn create(&self, caller: &User, input: CreateComment) -> Result<Comment, AppError> {
        validate_content(&input.content).map_err(AppError::BadRequest)?;
        let task = self
            .ensure_entity_access(caller, input.entity_type, input.entity_id)
            .await?;

        if let Some(parent_id) = &input.parent_comment_id {
            let parent = self.load(parent_id).await?;
            if parent.entity_type != input.entity_type || parent.entity_id != input.entity_id {
                return Err(AppError::BadRequest(
                    "Parent comment belongs to a different entity".to_string(),
                ));
            }
        }

        let mentions = self.resolve_mentions(&input.mentions).await?;

        let comment = self
            .comments
            .create(&NewComment {
                content: input.content.trim().to_string(),
                author_id: caller.id,
                entity_type: input.entity_type,
                entity_id: input.entity_id,
                parent_comment_id: input.parent_comment_id,
                mentions,
            })
            .await?;

        self.notify_participants(caller, &comment, task.as_ref()).await;
        Ok(comment)
    }

    /// Top-level comments with nested replies, oldest first
    pub async fn list(
        &self,
        caller: &User,
        entity_type: CommentEntityType,
        entity_id: Uuid,
    ) -> Result<Vec<CommentThread>, AppError> {
        self.ensure_entity_access(caller, entity_type, entity_id)
            .await?;
        let comments = self.comments.list_for_entity(entity_type, &entity_id).await?;
        Ok(build_threads(comments))
    }

    pub async fn update(
        &self,
        caller: &User,
        id: &CommentId,
        content: &str,
    ) -> Result<Comment, AppError> {
        validate_content(content).map_err(AppError::BadRequest)?;
        self.load_own(caller, id).await?;
        Ok(self.comments.update_content(id, content.trim()).await?)
    }

    /// Removes the comment and every reply below it
    pub async fn delete(&self, caller: &User, id: &CommentId) -> Result<(), AppError> {
        self.load_own(caller, id).await?;
        self.comments.delete(id).await?;
        Ok(())
    }

    async fn load(&self, id: &CommentId) -> Result<Comment, AppError> {
        self.comments
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Comment {} not found", id)).into())
    }

    async fn load_own(&self, caller: &User, id: &CommentId) -> Result<Comment, AppError> {
        let comment = self.load(id).await?;
        if comment.author_id != caller.id {
            return Err(AppError::forbidden("You can only change your own comments"));
        }
        if !comment.is_editable_at(Utc::now()) {
            return Err(AppError::BadRequest(
                "Comments can only be changed within 24 hours".to_string(),
            ));
        }
        Ok(comment)
    }

    /// Check project access for the commented entity; returns the task for task comments
    async fn ensure_entity_access(
        &self,
        caller: &User,
        entity_type: CommentEntityType,
        entity_id: Uuid,
    ) -> Result<Option<Task>, AppError> {
        match entity_type {
            CommentEntityType::Project => {
                ensure_project_access(self.projects.as_ref(), caller, &ProjectId(entity_id))
                    .await?;
                Ok(None)
            }
            CommentEntityType::Task => {
                let task_id = TaskId(entity_id);
                let task = self
                    .tasks
                    .find_by_id(&task_id)
                    .await?
                    .ok_or_else(|| DomainError::NotFound(format!("Task {} not found", task_id)))?;
                ensure_project_access(self.projects.as_ref(), caller, &task.project_id).await?;
                Ok(Some(task))
            }
        }
    }

    async fn resolve_mentions(&self, requested: &[UserId]) -> Result<Vec<UserId>, AppError> {
        let mut seen = HashSet::new();
        let unique: Vec<UserId> = requested
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        if unique.is_empty() {
            return Ok(unique);
        }

        let found = self.users.find_by_ids(&unique).await?;
        if found.len() != unique.len() {
            return Err(AppError::BadRequest(
                "One or more mentioned users do not exist".to_string(),
            ));
        }
        Ok(unique)
    }

    async fn notify_participants(&self, author: &User, comment: &Comment, task: Option<&Task>) {
        let mut notified: HashSet<UserId> = HashSet::from([author.id]);
        let mut outgoing = Vec::new();

        for user_id in &comment.mentions {
            if notified.insert(*user_id) {
                outgoing.push(NewNotification::new(
                    *user_id,
                    NotificationType::Mention,
                    "You were mentioned",
                    format!("{} mentioned you in a comment", author.full_name()),
                ));
            }
        }

        if let Some(task) = task {
            if let Some(assignee) = task.assignee_id.filter(|a| notified.insert(*a)) {
                outgoing.push(NewNotification::new(
                    assignee,
                    NotificationType::CommentAdded,
                    "New comment",
                    format!("{} commented on \"{}\"", author.full_name(), task.title),
                ));
            }
        }

        for notification in outgoing {
            let notification =
                notification.about(&comment.entity_type.to_string(), comment.entity_id);
            if let Err(e) = self.notifier.notify(notification).await {
                tracing::warn!(error = %e, comment_id = %comment.id, "Failed to send comment notification");
            }
        }
    }
}

//! PostgreSQL adapter for CommentRepository

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::domain::entities::{Comment, CommentEntityType, CommentId, NewComment, UserId};
use crate::domain::ports::CommentRepository;
use crate::entity::{comment_mentions, comments};
use crate::error::DomainError;

/// PostgreSQL implementation of CommentRepository
pub struct PostgresCommentRepository {
    db: DatabaseConnection,
}

impl PostgresCommentRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Mentioned users keyed by comment
    async fn mentions_for(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<UserId>>, DomainError> {
        let mut map: HashMap<Uuid, Vec<UserId>> = HashMap::new();
        if ids.is_empty() {
            return Ok(map);
        }

        let rows = comment_mentions::Entity::find()
            .filter(comment_mentions::Column::CommentId.is_in(ids.iter().copied()))
            .order_by_asc(comment_mentions::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        for row in rows {
            map.entry(row.comment_id)
                .or_default()
                .push(UserId(row.user_id));
        }
        Ok(map)
    }
}

fn to_comment(model: comments::Model, mentions: Vec<UserId>) -> Comment {
    Comment {
        id: CommentId(model.id),
        content: model.content,
        author_id: UserId(model.author_id),
        entity_type: model
            .entity_type
            .parse()
            .unwrap_or(CommentEntityType::Task),
        entity_id: model.entity_id,
        parent_comment_id: model.parent_comment_id.map(CommentId),
        is_edited: model.is_edited,
        mentions,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

#[async_trait]
impl CommentRepository for PostgresCommentRepository {
    async fn find_by_id(&self, id: &CommentId) -> Result<Option<Comment>, DomainError> {
        let result = comments::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        match result {
            Some(model) => {
                let mut mentions = self.mentions_for(&[model.id]).await?;
                let users = mentions.remove(&model.id).unwrap_or_default();
                Ok(Some(to_comment(model, users)))
            }
            None => Ok(None),
        }
    }

    async fn list_for_entity(
        &self,
        entity_type: CommentEntityType,
        entity_id: &Uuid,
    ) -> Result<Vec<Comment>, DomainError> {
        let results = comments::Entity::find()
            .filter(comments::Column::EntityType.eq(entity_type.to_string()))
            .filter(comments::Column::EntityId.eq(*entity_id))
            .order_by_asc(comments::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        let ids: Vec<Uuid> = results.iter().map(|m| m.id).collect();
        let mut mentions = self.mentions_for(&ids).await?;

        Ok(results
            .into_iter()
            .map(|m| {
                let users = mentions.remove(&m.id).unwrap_or_default();
                to_comment(m, users)
            })
            .collect())
    }

    async fn create(&self, comment: &NewComment) -> Result<Comment, DomainError> {
        let id = CommentId::new();
        let now = Utc::now().fixed_offset();

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        let created = comments::ActiveModel {
            id: Set(id.0),
            content: Set(comment.content.clone()),
            author_id: Set(comment.author_id.0),
            entity_type: Set(comment.entity_type.to_string()),
            entity_id: Set(comment.entity_id),
            parent_comment_id: Set(comment.parent_comment_id.map(|p| p.0)),
            is_edited: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

        for user in &comment.mentions {
            comment_mentions::ActiveModel {
                comment_id: Set(id.0),
                user_id: Set(user.0),
                created_at: Set(now),
            }
            .insert(&txn)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;
        }

        txn.commit()
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(to_comment(created, comment.mentions.clone()))
    }

    async fn update_content(
        &self,
        id: &CommentId,
        content: &str,
    ) -> Result<Comment, DomainError> {
        let updated = comments::ActiveModel {
            id: Set(id.0),
            content: Set(content.to_string()),
            is_edited: Set(true),
            updated_at: Set(Utc::now().fixed_offset()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

        let mut mentions = self.mentions_for(&[updated.id]).await?;
        let users = mentions.remove(&updated.id).unwrap_or_default();
        Ok(to_comment(updated, users))
    }

    async fn delete(&self, id: &CommentId) -> Result<(), DomainError> {
        // replies and mentions cascade through their foreign keys
        let result = comments::Entity::delete_by_id(id.0)
            .exec(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound(format!("Comment {} not found", id)));
        }
        Ok(())
    }
}

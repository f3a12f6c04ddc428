//! PostgreSQL adapter for NotificationRepository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::domain::entities::{
    NewNotification, Notification, NotificationId, NotificationType, Page, PageRequest, UserId,
};
use crate::domain::ports::NotificationRepository;
use crate::entity::notifications;
use crate::error::DomainError;

/// PostgreSQL implementation of NotificationRepository
pub struct PostgresNotificationRepository {
    db: DatabaseConnection,
}

impl PostgresNotificationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
    async fn create(&self, notification: &NewNotification) -> Result<Notification, DomainError> {
        let model = notifications::ActiveModel {
            id: Set(NotificationId::new().0),
            user_id: Set(notification.user_id.0),
            notification_type: Set(notification.notification_type.to_string()),
            title: Set(notification.title.clone()),
            message: Set(notification.message.clone()),
            entity_type: Set(notification.entity_type.clone()),
            entity_id: Set(notification.entity_id),
            is_read: Set(false),
            read_at: Set(None),
            created_at: Set(Utc::now().fixed_offset()),
        };

        let result = model
            .insert(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.into())
    }

    async fn find_by_id(&self, id: &NotificationId) -> Result<Option<Notification>, DomainError> {
        let result = notifications::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.map(|m| m.into()))
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        unread_only: bool,
        page: PageRequest,
    ) -> Result<Page<Notification>, DomainError> {
        let mut query =
            notifications::Entity::find().filter(notifications::Column::UserId.eq(user_id.0));
        if unread_only {
            query = query.filter(notifications::Column::IsRead.eq(false));
        }

        let total = query
            .clone()
            .count(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        let results = query
            .order_by_desc(notifications::Column::CreatedAt)
            .offset(page.offset())
            .limit(page.limit)
            .all(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(Page::new(
            results.into_iter().map(|m| m.into()).collect(),
            page,
            total,
        ))
    }

    async fn find_all_for_user(&self, user_id: &UserId) -> Result<Vec<Notification>, DomainError> {
        let results = notifications::Entity::find()
            .filter(notifications::Column::UserId.eq(user_id.0))
            .order_by_desc(notifications::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<Notification, DomainError> {
        let result = notifications::ActiveModel {
            id: Set(id.0),
            is_read: Set(true),
            read_at: Set(Some(Utc::now().fixed_offset())),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.into())
    }

    async fn mark_all_read(&self, user_id: &UserId) -> Result<u64, DomainError> {
        let result = notifications::Entity::update_many()
            .col_expr(notifications::Column::IsRead, Expr::value(true))
            .col_expr(
                notifications::Column::ReadAt,
                Expr::value(Utc::now().fixed_offset()),
            )
            .filter(notifications::Column::UserId.eq(user_id.0))
            .filter(notifications::Column::IsRead.eq(false))
            .exec(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    async fn delete(&self, id: &NotificationId) -> Result<(), DomainError> {
        let result = notifications::Entity::delete_by_id(id.0)
            .exec(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound(format!(
                "Notification {} not found",
                id
            )));
        }
        Ok(())
    }

    async fn count_unread(&self, user_id: &UserId) -> Result<u64, DomainError> {
        notifications::Entity::find()
            .filter(notifications::Column::UserId.eq(user_id.0))
            .filter(notifications::Column::IsRead.eq(false))
            .count(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))
    }
}

/// Convert SeaORM model to domain entity
impl From<notifications::Model> for Notification {
    fn from(model: notifications::Model) -> Self {
        Notification {
            id: NotificationId(model.id),
            user_id: UserId(model.user_id),
            notification_type: model
                .notification_type
                .parse()
                .unwrap_or(NotificationType::System),
            title: model.title,
            message: model.message,
            entity_type: model.entity_type,
            entity_id: model.entity_id,
            is_read: model.is_read,
            read_at: model.read_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

//! PostgreSQL adapter for NotificationPreferenceRepository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::domain::entities::{
    NotificationPreference, NotificationType, PreferenceSettings, UserId,
};
use crate::domain::ports::NotificationPreferenceRepository;
use crate::entity::notification_preferences;
use crate::error::DomainError;

/// PostgreSQL implementation of NotificationPreferenceRepository
pub struct PostgresNotificationPreferenceRepository {
    db: DatabaseConnection,
}

impl PostgresNotificationPreferenceRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_model(
        &self,
        user_id: &UserId,
        notification_type: NotificationType,
    ) -> Result<Option<notification_preferences::Model>, DomainError> {
        notification_preferences::Entity::find()
            .filter(notification_preferences::Column::UserId.eq(user_id.0))
            .filter(
                notification_preferences::Column::NotificationType
                    .eq(notification_type.to_string()),
            )
            .one(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))
    }
}

#[async_trait]
impl NotificationPreferenceRepository for PostgresNotificationPreferenceRepository {
    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<NotificationPreference>, DomainError> {
        let results = notification_preferences::Entity::find()
            .filter(notification_preferences::Column::UserId.eq(user_id.0))
            .order_by_asc(notification_preferences::Column::NotificationType)
            .all(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        // rows with a type this build no longer knows are skipped
        Ok(results.into_iter().filter_map(|m| m.try_into().ok()).collect())
    }

    async fn find(
        &self,
        user_id: &UserId,
        notification_type: NotificationType,
    ) -> Result<Option<NotificationPreference>, DomainError> {
        Ok(self
            .find_model(user_id, notification_type)
            .await?
            .and_then(|m| m.try_into().ok()))
    }

    async fn create(
        &self,
        user_id: &UserId,
        settings: &PreferenceSettings,
    ) -> Result<NotificationPreference, DomainError> {
        let now = Utc::now().fixed_offset();
        let model = notification_preferences::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id.0),
            notification_type: Set(settings.notification_type.to_string()),
            email_enabled: Set(settings.email_enabled),
            push_enabled: Set(settings.push_enabled),
            in_app_enabled: Set(settings.in_app_enabled),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = model.insert(&self.db).await.map_err(|e| {
            let msg = e.to_string();
            if msg.contains("duplicate key") {
                DomainError::AlreadyExists(format!(
                    "Notification preference for type '{}' already exists",
                    settings.notification_type
                ))
            } else {
                DomainError::Database(msg)
            }
        })?;

        result.try_into()
    }

    async fn upsert(
        &self,
        user_id: &UserId,
        settings: &PreferenceSettings,
    ) -> Result<NotificationPreference, DomainError> {
        let Some(current) = self.find_model(user_id, settings.notification_type).await? else {
            return self.create(user_id, settings).await;
        };

        let mut active_model = current.into_active_model();
        active_model.email_enabled = Set(settings.email_enabled);
        active_model.push_enabled = Set(settings.push_enabled);
        active_model.in_app_enabled = Set(settings.in_app_enabled);
        active_model.updated_at = Set(Utc::now().fixed_offset());

        active_model
            .update(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?
            .try_into()
    }

    async fn delete(
        &self,
        user_id: &UserId,
        notification_type: NotificationType,
    ) -> Result<(), DomainError> {
        let result = notification_preferences::Entity::delete_many()
            .filter(notification_preferences::Column::UserId.eq(user_id.0))
            .filter(
                notification_preferences::Column::NotificationType
                    .eq(notification_type.to_string()),
            )
            .exec(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound(format!(
                "Notification preference for type '{}' not found",
                notification_type
            )));
        }
        Ok(())
    }
}

impl TryFrom<notification_preferences::Model> for NotificationPreference {
    type Error = DomainError;

    fn try_from(model: notification_preferences::Model) -> Result<Self, Self::Error> {
        Ok(NotificationPreference {
            id: model.id,
            user_id: UserId(model.user_id),
            notification_type: model
                .notification_type
                .parse()
                .map_err(DomainError::Database)?,
            email_enabled: model.email_enabled,
            push_enabled: model.push_enabled,
            in_app_enabled: model.in_app_enabled,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        })
    }
}

//! Notification preference service
//!
//! Users manage their own delivery settings. Types without a stored row
//! behave as fully enabled.

use std::sync::Arc;

use crate::domain::entities::{
    NotificationPreference, NotificationType, PreferenceSettings, PreferenceStats,
    PreferenceUpdate, User, UserId,
};
use crate::domain::ports::NotificationPreferenceRepository;
use crate::error::{AppError, DomainError};

fn ensure_self(caller: &User, user_id: &UserId) -> Result<(), AppError> {
    if caller.id == *user_id {
        Ok(())
    } else {
        Err(AppError::forbidden(
            "You can only manage your own notification preferences",
        ))
    }
}

pub struct NotificationPreferenceService<PR>
where
    PR: NotificationPreferenceRepository,
{
    preferences: Arc<PR>,
}

impl<PR> NotificationPreferenceService<PR>
where
    PR: NotificationPreferenceRepository,
{
    pub fn new(preferences: Arc<PR>) -> Self {
        Self { preferences }
    }

    pub async fn list(
        &self,
        caller: &User,
        user_id: &UserId,
    ) -> Result<Vec<NotificationPreference>, AppError> {
        ensure_self(caller, user_id)?;
        Ok(self.preferences.list_for_user(user_id).await?)
    }

    pub async fn create(
        &self,
        caller: &User,
        user_id: &UserId,
        settings: PreferenceSettings,
    ) -> Result<NotificationPreference, AppError> {
        ensure_self(caller, user_id)?;
        if self
            .preferences
            .find(user_id, settings.notification_type)
            .await?
            .is_some()
        {
            return Err(DomainError::AlreadyExists(format!(
                "Notification preference for type '{}' already exists",
                settings.notification_type
            ))
            .into());
        }
        Ok(self.preferences.create(user_id, &settings).await?)
    }

    pub async fn update(
        &self,
        caller: &User,
        user_id: &UserId,
        notification_type: NotificationType,
        update: PreferenceUpdate,
    ) -> Result<NotificationPreference, AppError> {
        ensure_self(caller, user_id)?;
        if update.is_empty() {
            return Err(AppError::BadRequest("No fields to update".to_string()));
        }
        let mut preference = self
            .preferences
            .find(user_id, notification_type)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound(format!(
                    "Notification preference for type '{}' not found",
                    notification_type
                ))
            })?;
        update.apply_to(&mut preference);

        Ok(self
            .preferences
            .upsert(
                user_id,
                &PreferenceSettings {
                    notification_type,
                    email_enabled: preference.email_enabled,
                    push_enabled: preference.push_enabled,
                    in_app_enabled: preference.in_app_enabled,
                },
            )
            .await?)
    }

    pub async fn delete(
        &self,
        caller: &User,
        user_id: &UserId,
        notification_type: NotificationType,
    ) -> Result<(), AppError> {
        ensure_self(caller, user_id)?;
        Ok(self.preferences.delete(user_id, notification_type).await?)
    }

    /// Create or overwrite one row per entry; later entries for the same type win
    pub async fn bulk_update(
        &self,
        caller: &User,
        user_id: &UserId,
        settings: Vec<PreferenceSettings>,
    ) -> Result<Vec<NotificationPreference>, AppError> {
        ensure_self(caller, user_id)?;
        if settings.is_empty() {
            return Err(AppError::BadRequest(
                "At least one preference is required".to_string(),
            ));
        }

        let mut saved: Vec<NotificationPreference> = Vec::with_capacity(settings.len());
        for entry in &settings {
            let preference = self.preferences.upsert(user_id, entry).await?;
            saved.retain(|p| p.notification_type != preference.notification_type);
            saved.push(preference);
        }
        tracing::info!(user_id = %user_id, count = saved.len(), "Notification preferences updated");
        Ok(saved)
    }

    /// Fill in an all-enabled row for every type the user has no row for
    pub async fn create_defaults(
        &self,
        caller: &User,
        user_id: &UserId,
    ) -> Result<Vec<NotificationPreference>, AppError> {
        ensure_self(caller, user_id)?;
        let existing = self.preferences.list_for_user(user_id).await?;

        let mut created = Vec::new();
        for notification_type in NotificationType::ALL {
            if existing.iter().any(|p| p.notification_type == notification_type) {
                continue;
            }
            created.push(
                self.preferences
                    .create(user_id, &PreferenceSettings::all_enabled(notification_type))
                    .await?,
            );
        }
        Ok(created)
    }

    pub async fn stats(&self, caller: &User, user_id: &UserId) -> Result<PreferenceStats, AppError> {
        let preferences = self.list(caller, user_id).await?;
        Ok(PreferenceStats::compute(&preferences))
    }
}

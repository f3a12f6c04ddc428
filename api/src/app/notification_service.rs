//! Notification service
//!
//! Persists notifications and pushes them to the recipient's live sockets.
//! Other services reach it through the [`Notifier`] port. The recipient's
//! preference for the type decides whether it is stored and pushed.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Serialize;

use crate::domain::entities::{
    NewNotification, Notification, NotificationId, Page, PageRequest, User, UserId,
};
use crate::domain::ports::{
    NotificationPreferenceRepository, NotificationRepository, Notifier, RealtimePublisher,
};
use crate::error::{AppError, DomainError};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotificationStats {
    pub total: usize,
    pub unread: usize,
    pub read: usize,
    /// Created in the last 7 days
    pub recent: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_entity_type: BTreeMap<String, usize>,
}

pub struct NotificationService<NR, PR>
where
    NR: NotificationRepository,
    PR: NotificationPreferenceRepository,
{
    notifications: Arc<NR>,
    preferences: Arc<PR>,
    publisher: Arc<dyn RealtimePublisher>,
}

impl<NR, PR> NotificationService<NR, PR>
where
    NR: NotificationRepository,
    PR: NotificationPreferenceRepository,
{
    pub fn new(
        notifications: Arc<NR>,
        preferences: Arc<PR>,
        publisher: Arc<dyn RealtimePublisher>,
    ) -> Self {
        Self {
            notifications,
            preferences,
            publisher,
        }
    }

    pub async fn list(
        &self,
        caller: &User,
        unread_only: bool,
        page: PageRequest,
    ) -> Result<Page<Notification>, AppError> {
        Ok(self
            .notifications
            .list_for_user(&caller.id, unread_only, page)
            .await?)
    }

    /// Newest unread notifications, as requested over a socket
    pub async fn unread(&self, user_id: &UserId, limit: u64) -> Result<Vec<Notification>, AppError> {
        let page = self
            .notifications
            .list_for_user(user_id, true, PageRequest::new(Some(1), Some(limit)))
            .await?;
        Ok(page.items)
    }

    pub async fn mark_read(
        &self,
        caller: &User,
        id: &NotificationId,
    ) -> Result<Notification, AppError> {
        let notification = self.load_own(caller, id).await?;
        if notification.is_read {
            return Ok(notification);
        }
        Ok(self.notifications.mark_read(id).await?)
    }

    pub async fn mark_all_read(&self, caller: &User) -> Result<u64, AppError> {
        Ok(self.notifications.mark_all_read(&caller.id).await?)
    }

    pub async fn delete(&self, caller: &User, id: &NotificationId) -> Result<(), AppError> {
        self.load_own(caller, id).await?;
        self.notifications.delete(id).await?;
        Ok(())
    }

    pub async fn stats(&self, caller: &User) -> Result<NotificationStats, AppError> {
        let all = self.notifications.find_all_for_user(&caller.id).await?;
        let week_ago = Utc::now() - Duration::days(7);

        let mut stats = NotificationStats {
            total: all.len(),
            ..Default::default()
        };
        for n in &all {
            if n.is_read {
                stats.read += 1;
            } else {
                stats.unread += 1;
            }
            if n.created_at >= week_ago {
                stats.recent += 1;
            }
            *stats
                .by_type
                .entry(n.notification_type.to_string())
                .or_default() += 1;
            if let Some(entity_type) = &n.entity_type {
                *stats.by_entity_type.entry(entity_type.clone()).or_default() += 1;
            }
        }
        Ok(stats)
    }

    pub async fn count_unread(&self, user_id: &UserId) -> Result<u64, AppError> {
        Ok(self.notifications.count_unread(user_id).await?)
    }

    /// Other users' notifications are reported as missing
    async fn load_own(&self, caller: &User, id: &NotificationId) -> Result<Notification, AppError> {
        self.notifications
            .find_by_id(id)
            .await?
            .filter(|n| n.user_id == caller.id)
            .ok_or_else(|| DomainError::NotFound(format!("Notification {} not found", id)).into())
    }
}

#[async_trait]
impl<NR, PR> Notifier for NotificationService<NR, PR>
where
    NR: NotificationRepository,
    PR: NotificationPreferenceRepository,
{
    async fn notify(
        &self,
        notification: NewNotification,
    ) -> Result<Option<Notification>, DomainError> {
        // No stored preference means every channel is on
        let preference = self
            .preferences
            .find(&notification.user_id, notification.notification_type)
            .await?;
        let (in_app, push) = preference
            .map(|p| (p.in_app_enabled, p.push_enabled))
            .unwrap_or((true, true));

        if !in_app {
            tracing::debug!(
                user_id = %notification.user_id,
                notification_type = %notification.notification_type,
                "Notification muted"
            );
            return Ok(None);
        }

        let created = self.notifications.create(&notification).await?;
        let delivered = if push {
            self.publisher.notify_user(&created.user_id, &created).await
        } else {
            0
        };
        tracing::debug!(
            notification_id = %created.id,
            user_id = %created.user_id,
            delivered,
            "Notification created"
        );
        Ok(Some(created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{NotificationType, PreferenceSettings};
    use crate::test_utils::{
        test_notification, test_user, InMemoryNotificationPreferenceRepository,
        InMemoryNotificationRepository, RecordingPublisher,
    };

    type Service =
        NotificationService<InMemoryNotificationRepository, InMemoryNotificationPreferenceRepository>;

    fn build_with(
        repo: InMemoryNotificationRepository,
        preferences: InMemoryNotificationPreferenceRepository,
    ) -> (Service, Arc<InMemoryNotificationRepository>, Arc<RecordingPublisher>) {
        let repo = Arc::new(repo);
        let publisher = Arc::new(RecordingPublisher::new());
        (
            NotificationService::new(repo.clone(), Arc::new(preferences), publisher.clone()),
            repo,
            publisher,
        )
    }

    fn build(
        repo: InMemoryNotificationRepository,
    ) -> (Service, Arc<InMemoryNotificationRepository>, Arc<RecordingPublisher>) {
        build_with(repo, InMemoryNotificationPreferenceRepository::new())
    }

    #[tokio::test]
    async fn notify_persists_then_pushes() {
        let user = test_user();
        let (service, repo, publisher) = build(InMemoryNotificationRepository::new());

        let created = service
            .notify(
                NewNotification::new(user.id, NotificationType::System, "Hi", "Welcome")
                    .about("project", uuid::Uuid::new_v4()),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(repo.all().len(), 1);
        let pushed = publisher.notifications.read().unwrap();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].0, user.id);
        assert_eq!(pushed[0].1.id, created.id);
    }

    #[tokio::test]
    async fn muted_in_app_skips_store_and_push() {
        let user = test_user();
        let preferences = InMemoryNotificationPreferenceRepository::new().with_settings(
            user.id,
            PreferenceSettings {
                in_app_enabled: false,
                ..PreferenceSettings::all_enabled(NotificationType::Mention)
            },
        );
        let (service, repo, publisher) =
            build_with(InMemoryNotificationRepository::new(), preferences);

        let muted = service
            .notify(NewNotification::new(user.id, NotificationType::Mention, "Hey", "@you"))
            .await
            .unwrap();
        assert!(muted.is_none());
        assert!(repo.all().is_empty());
        assert!(publisher.notifications.read().unwrap().is_empty());

        // other types are unaffected
        let sent = service
            .notify(NewNotification::new(user.id, NotificationType::System, "Hi", "Welcome"))
            .await
            .unwrap();
        assert!(sent.is_some());
        assert_eq!(publisher.notifications.read().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn push_off_still_stores() {
        let user = test_user();
        let preferences = InMemoryNotificationPreferenceRepository::new().with_settings(
            user.id,
            PreferenceSettings {
                push_enabled: false,
                ..PreferenceSettings::all_enabled(NotificationType::TaskAssigned)
            },
        );
        let (service, repo, publisher) =
            build_with(InMemoryNotificationRepository::new(), preferences);

        let stored = service
            .notify(NewNotification::new(user.id, NotificationType::TaskAssigned, "Task", "Go"))
            .await
            .unwrap();
        assert!(stored.is_some());
        assert_eq!(repo.all().len(), 1);
        assert!(publisher.notifications.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn foreign_notifications_are_not_found() {
        let owner = test_user();
        let other = test_user();
        let n = test_notification(&owner.id);
        let (service, _, _) =
            build(InMemoryNotificationRepository::new().with_notification(n.clone()));

        assert!(matches!(
            service.mark_read(&other, &n.id).await,
            Err(AppError::Domain(DomainError::NotFound(_)))
        ));
        assert!(service.delete(&other, &n.id).await.is_err());

        let read = service.mark_read(&owner, &n.id).await.unwrap();
        assert!(read.is_read);
        assert!(read.read_at.is_some());
    }

    #[tokio::test]
    async fn mark_all_read_counts_changes() {
        let user = test_user();
        let mut already = test_notification(&user.id);
        already.is_read = true;
        let (service, _, _) = build(
            InMemoryNotificationRepository::new()
                .with_notification(test_notification(&user.id))
                .with_notification(test_notification(&user.id))
                .with_notification(already),
        );

        assert_eq!(service.mark_all_read(&user).await.unwrap(), 2);
        assert_eq!(service.count_unread(&user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stats_break_down_by_type_and_entity() {
        let user = test_user();
        let mut mention = test_notification(&user.id);
        mention.notification_type = NotificationType::Mention;
        mention.entity_type = Some("task".to_string());
        mention.is_read = true;
        let mut old = test_notification(&user.id);
        old.created_at = Utc::now() - Duration::days(10);
        let (service, _, _) = build(
            InMemoryNotificationRepository::new()
                .with_notification(mention)
                .with_notification(old)
                .with_notification(test_notification(&test_user().id)),
        );

        let stats = service.stats(&user).await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.read, 1);
        assert_eq!(stats.unread, 1);
        assert_eq!(stats.recent, 1);
        assert_eq!(stats.by_type["mention"], 1);
        assert_eq!(stats.by_type["system"], 1);
        assert_eq!(stats.by_entity_type["task"], 1);
    }

    #[tokio::test]
    async fn unread_respects_limit() {
        let user = test_user();
        let (service, _, _) = build(
            InMemoryNotificationRepository::new()
                .with_notification(test_notification(&user.id))
                .with_notification(test_notification(&user.id))
                .with_notification(test_notification(&user.id)),
        );

        assert_eq!(service.unread(&user.id, 2).await.unwrap().len(), 2);
    }
}

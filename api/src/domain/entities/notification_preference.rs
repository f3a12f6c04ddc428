//! Per-user delivery settings for each notification type

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::notification::NotificationType;
use super::user::UserId;

#[derive(Debug, Clone, Serialize)]
pub struct NotificationPreference {
    pub id: Uuid,
    pub user_id: UserId,
    pub notification_type: NotificationType,
    pub email_enabled: bool,
    pub push_enabled: bool,
    pub in_app_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationPreference {
    pub fn all_enabled(&self) -> bool {
        self.email_enabled && self.push_enabled && self.in_app_enabled
    }
}

fn enabled() -> bool {
    true
}

/// Channel settings for one type. Channels left out default to enabled.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PreferenceSettings {
    pub notification_type: NotificationType,
    #[serde(default = "enabled")]
    pub email_enabled: bool,
    #[serde(default = "enabled")]
    pub push_enabled: bool,
    #[serde(default = "enabled")]
    pub in_app_enabled: bool,
}

impl PreferenceSettings {
    pub fn all_enabled(notification_type: NotificationType) -> Self {
        Self {
            notification_type,
            email_enabled: true,
            push_enabled: true,
            in_app_enabled: true,
        }
    }
}

/// Partial update; `None` keeps the stored value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferenceUpdate {
    pub email_enabled: Option<bool>,
    pub push_enabled: Option<bool>,
    pub in_app_enabled: Option<bool>,
}

impl PreferenceUpdate {
    pub fn is_empty(&self) -> bool {
        self.email_enabled.is_none() && self.push_enabled.is_none() && self.in_app_enabled.is_none()
    }

    pub fn apply_to(&self, preference: &mut NotificationPreference) {
        if let Some(v) = self.email_enabled {
            preference.email_enabled = v;
        }
        if let Some(v) = self.push_enabled {
            preference.push_enabled = v;
        }
        if let Some(v) = self.in_app_enabled {
            preference.in_app_enabled = v;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreferenceStats {
    pub total_count: usize,
    pub type_breakdown: BTreeMap<String, usize>,
    pub email_enabled_count: usize,
    pub push_enabled_count: usize,
    pub in_app_enabled_count: usize,
    pub all_enabled_count: usize,
    pub partially_enabled_count: usize,
}

impl PreferenceStats {
    pub fn compute(preferences: &[NotificationPreference]) -> Self {
        let count = |f: fn(&NotificationPreference) -> bool| preferences.iter().filter(|p| f(p)).count();
        let all_enabled_count = count(NotificationPreference::all_enabled);

        let mut type_breakdown = BTreeMap::new();
        for p in preferences {
            *type_breakdown
                .entry(p.notification_type.to_string())
                .or_default() += 1;
        }

        Self {
            total_count: preferences.len(),
            type_breakdown,
            email_enabled_count: count(|p| p.email_enabled),
            push_enabled_count: count(|p| p.push_enabled),
            in_app_enabled_count: count(|p| p.in_app_enabled),
            all_enabled_count,
            partially_enabled_count: preferences.len() - all_enabled_count,
        }
    }
}

//! Audit service
//!
//! Append-only trail of security relevant changes. Writes are fire and
//! forget; reading the trail is reserved for admins.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;

use crate::domain::entities::{
    AuditFilter, AuditLog, AuditLogId, NewAuditLog, Page, PageRequest, User,
};
use crate::domain::ports::AuditLogRepository;
use crate::error::{AppError, DomainError};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditStats {
    pub days: i64,
    pub total: usize,
    pub by_action: BTreeMap<String, usize>,
    pub by_entity_type: BTreeMap<String, usize>,
    /// Keyed by user id; entries without a user count under "anonymous"
    pub by_user: BTreeMap<String, usize>,
}

pub struct AuditService<AR>
where
    AR: AuditLogRepository + 'static,
{
    logs: Arc<AR>,
}

impl<AR> AuditService<AR>
where
    AR: AuditLogRepository + 'static,
{
    pub fn new(logs: Arc<AR>) -> Self {
        Self { logs }
    }

    /// Store an entry in the background; failures are only logged
    pub fn record(&self, entry: NewAuditLog) {
        let logs = self.logs.clone();
        tokio::spawn(async move {
            if let Err(e) = logs.create(&entry).await {
                tracing::warn!(
                    error = %e,
                    action = %entry.action,
                    entity_type = %entry.entity_type,
                    "Failed to write audit log"
                );
            }
        });
    }

    pub async fn list(
        &self,
        caller: &User,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<Page<AuditLog>, AppError> {
        ensure_admin(caller)?;
        Ok(self.logs.list(filter, page).await?)
    }

    pub async fn get(&self, caller: &User, id: &AuditLogId) -> Result<AuditLog, AppError> {
        ensure_admin(caller)?;
        self.logs
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Audit log {} not found", id)).into())
    }

    /// Totals over the last `days` days
    pub async fn stats(&self, caller: &User, days: i64) -> Result<AuditStats, AppError> {
        ensure_admin(caller)?;
        if !(1..=365).contains(&days) {
            return Err(AppError::BadRequest(
                "days must be between 1 and 365".to_string(),
            ));
        }

        let filter = AuditFilter {
            start: Some(Utc::now() - Duration::days(days)),
            ..Default::default()
        };
        let logs = self.logs.find_all(&filter).await?;

        let mut stats = AuditStats {
            days,
            total: logs.len(),
            ..Default::default()
        };
        for log in &logs {
            *stats.by_action.entry(log.action.to_string()).or_default() += 1;
            *stats
                .by_entity_type
                .entry(log.entity_type.clone())
                .or_default() += 1;
            let user = log
                .user_id
                .map(|u| u.to_string())
                .unwrap_or_else(|| "anonymous".to_string());
            *stats.by_user.entry(user).or_default() += 1;
        }
        Ok(stats)
    }
}

fn ensure_admin(caller: &User) -> Result<(), AppError> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(AppError::forbidden("Only admins can read the audit trail"))
    }
}

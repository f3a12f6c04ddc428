//! Time entry service
//!
//! Logging hours, the approval workflow and time statistics. Every change to
//! an entry recomputes the linked task's `actual_hours`.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use super::access::ensure_project_access;
use super::round2;
use crate::domain::entities::{
    validate_entry, NewNotification, NewTimeEntry, NotificationType, Page, PageRequest, ProjectId,
    TaskId, TimeCategory, TimeEntry, TimeEntryFilter, TimeEntryId, TimeEntryUpdate, User,
};
use crate::domain::ports::{Notifier, ProjectRepository, TaskRepository, TimeEntryRepository};
use crate::error::{AppError, DomainError};

/// Input for logging time
#[derive(Debug, Clone)]
pub struct CreateTimeEntry {
    pub project_id: ProjectId,
    pub task_id: Option<TaskId>,
    pub hours: f64,
    pub date: NaiveDate,
    pub category: TimeCategory,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeStatistics {
    pub total_hours: f64,
    pub total_entries: usize,
    pub approved_hours: f64,
    pub pending_hours: f64,
    pub hours_by_category: BTreeMap<String, f64>,
    /// Averaged over the distinct days that have entries
    pub average_hours_per_day: f64,
}

pub fn time_statistics(entries: &[TimeEntry]) -> TimeStatistics {
    let mut stats = TimeStatistics {
        total_entries: entries.len(),
        ..Default::default()
    };
    let mut days = HashSet::new();

    for entry in entries {
        stats.total_hours += entry.hours;
        if entry.is_approved {
            stats.approved_hours += entry.hours;
        } else {
            stats.pending_hours += entry.hours;
        }
        *stats
            .hours_by_category
            .entry(entry.category.to_string())
            .or_default() += entry.hours;
        days.insert(entry.date);
    }

    if !days.is_empty() {
        stats.average_hours_per_day = round2(stats.total_hours / days.len() as f64);
    }
    stats.total_hours = round2(stats.total_hours);
    stats.approved_hours = round2(stats.approved_hours);
    stats.pending_hours = round2(stats.pending_hours);
    for hours in stats.hours_by_category.values_mut() {
        *hours = round2(*hours);
    }
    stats
}

pub struct TimeEntryService<ER, TR, PR>
where
    ER: TimeEntryRepository,
    TR: TaskRepository,
    PR: ProjectRepository,
{
    entries: Arc<ER>,
    tasks: Arc<TR>,
    projects: Arc<PR>,
    notifier: Arc<dyn Notifier>,
}

impl<ER, TR, PR> TimeEntryService<ER, TR, PR>
where
    ER: TimeEntryRepository,
    TR: TaskRepository,
    PR: ProjectRepository,
{
    pub fn new(
        entries: Arc<ER>,
        tasks: Arc<TR>,
        projects: Arc<PR>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            entries,
            tasks,
            projects,
            notifier,
        }
    }

    pub async fn create(&self, caller: &User, input: CreateTimeEntry) -> Result<TimeEntry, AppError> {
        ensure_project_access(self.projects.as_ref(), caller, &input.project_id).await?;
        validate_entry(input.hours, input.date, Utc::now().date_naive())
            .map_err(AppError::BadRequest)?;

        if let Some(task_id) = &input.task_id {
            let task = self
                .tasks
                .find_by_id(task_id)
                .await?
                .ok_or_else(|| DomainError::NotFound(format!("Task {} not found", task_id)))?;
            if task.project_id != input.project_id {
                return Err(AppError::BadRequest(
                    "Task does not belong to the given project".to_string(),
                ));
            }
        }

        if self
            .entries
            .find_duplicate(&caller.id, &input.project_id, input.task_id.as_ref(), input.date)
            .await?
            .is_some()
        {
            return Err(duplicate_error());
        }

        let entry = self
            .entries
            .create(&NewTimeEntry {
                user_id: caller.id,
                project_id: input.project_id,
                task_id: input.task_id,
                hours: input.hours,
                date: input.date,
                category: input.category,
                notes: input.notes,
            })
            .await?;

        self.recompute_task_hours(entry.task_id).await?;
        Ok(entry)
    }

    /// Non-managers only ever see their own entries
    pub async fn list(
        &self,
        caller: &User,
        filter: &TimeEntryFilter,
        page: PageRequest,
    ) -> Result<Page<TimeEntry>, AppError> {
        let filter = scoped(caller, filter);
        Ok(self.entries.list(&filter, page).await?)
    }

    /// Unapproved entries awaiting review (managers only)
    pub async fn pending(&self, caller: &User, page: PageRequest) -> Result<Page<TimeEntry>, AppError> {
        if !caller.is_manager() {
            return Err(AppError::forbidden("Only managers can review time entries"));
        }
        let filter = TimeEntryFilter {
            is_approved: Some(false),
            ..Default::default()
        };
        Ok(self.entries.list(&filter, page).await?)
    }

    pub async fn get(&self, caller: &User, id: &TimeEntryId) -> Result<TimeEntry, AppError> {
        let entry = self.load(id).await?;
        if entry.user_id != caller.id && !caller.is_manager() {
            return Err(AppError::forbidden("Not enough permissions to view this entry"));
        }
        Ok(entry)
    }

    pub async fn update(
        &self,
        caller: &User,
        id: &TimeEntryId,
        update: TimeEntryUpdate,
    ) -> Result<TimeEntry, AppError> {
        let mut entry = self.load_editable(caller, id).await?;
        let original_date = entry.date;

        update.apply_to(&mut entry);
        validate_entry(entry.hours, entry.date, Utc::now().date_naive())
            .map_err(AppError::BadRequest)?;

        if entry.date != original_date {
            let clash = self
                .entries
                .find_duplicate(&entry.user_id, &entry.project_id, entry.task_id.as_ref(), entry.date)
                .await?;
            if clash.is_some_and(|other| other.id != entry.id) {
                return Err(duplicate_error());
            }
        }

        let saved = self.entries.save(&entry).await?;
        self.recompute_task_hours(saved.task_id).await?;
        Ok(saved)
    }

    pub async fn delete(&self, caller: &User, id: &TimeEntryId) -> Result<(), AppError> {
        let entry = self.load_editable(caller, id).await?;
        self.entries.delete(id).await?;
        self.recompute_task_hours(entry.task_id).await
    }

    /// Approve an entry (managers only, never their own)
    pub async fn approve(
        &self,
        caller: &User,
        id: &TimeEntryId,
        notes: Option<String>,
    ) -> Result<TimeEntry, AppError> {
        if !caller.is_manager() {
            return Err(AppError::forbidden("Only managers can approve time entries"));
        }
        let mut entry = self.load(id).await?;
        if entry.user_id == caller.id {
            return Err(AppError::forbidden("You cannot approve your own time entries"));
        }
        if entry.is_approved {
            return Err(DomainError::Conflict("Time entry is already approved".to_string()).into());
        }

        let now = Utc::now();
        entry.is_approved = true;
        entry.approved_by = Some(caller.id);
        entry.approved_at = Some(now);
        if let Some(notes) = notes.filter(|n| !n.trim().is_empty()) {
            entry.append_note("Approval Notes", notes.trim());
        }
        let saved = self.entries.save(&entry).await?;

        self.notify_owner(
            &saved,
            NotificationType::TimeEntryApproved,
            "Time entry approved",
            format!(
                "Your {} hours on {} were approved by {}",
                saved.hours,
                saved.date,
                caller.full_name()
            ),
        )
        .await;
        Ok(saved)
    }

    /// Reject an unapproved entry with a reason (managers only)
    pub async fn reject(
        &self,
        caller: &User,
        id: &TimeEntryId,
        reason: &str,
    ) -> Result<TimeEntry, AppError> {
        if !caller.is_manager() {
            return Err(AppError::forbidden("Only managers can reject time entries"));
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::BadRequest("A rejection reason is required".to_string()));
        }
        let mut entry = self.load(id).await?;
        if entry.is_approved {
            return Err(
                DomainError::Conflict("Approved time entries cannot be rejected".to_string()).into(),
            );
        }

        entry.append_note("Rejection Notes", reason);
        let saved = self.entries.save(&entry).await?;

        self.notify_owner(
            &saved,
            NotificationType::TimeEntryRejected,
            "Time entry rejected",
            format!("Your {} hours on {} were rejected: {}", saved.hours, saved.date, reason),
        )
        .await;
        Ok(saved)
    }

    pub async fn statistics(
        &self,
        caller: &User,
        filter: &TimeEntryFilter,
    ) -> Result<TimeStatistics, AppError> {
        let filter = scoped(caller, filter);
        let entries = self.entries.find_all(&filter).await?;
        Ok(time_statistics(&entries))
    }

    async fn load(&self, id: &TimeEntryId) -> Result<TimeEntry, AppError> {
        self.entries
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Time entry {} not found", id)).into())
    }

    /// Owner-only, unapproved and inside the edit window
    async fn load_editable(&self, caller: &User, id: &TimeEntryId) -> Result<TimeEntry, AppError> {
        let entry = self.load(id).await?;
        if entry.user_id != caller.id {
            return Err(AppError::forbidden("You can only change your own time entries"));
        }
        if entry.is_approved {
            return Err(
                DomainError::Conflict("Approved time entries cannot be changed".to_string()).into(),
            );
        }
        if !entry.is_editable_at(Utc::now()) {
            return Err(AppError::BadRequest(
                "Time entries can only be changed within 7 days of creation".to_string(),
            ));
        }
        Ok(entry)
    }

    async fn recompute_task_hours(&self, task_id: Option<TaskId>) -> Result<(), AppError> {
        if let Some(task_id) = task_id {
            let total = self.entries.total_hours_for_task(&task_id).await?;
            self.tasks.set_actual_hours(&task_id, round2(total)).await?;
        }
        Ok(())
    }

    async fn notify_owner(
        &self,
        entry: &TimeEntry,
        kind: NotificationType,
        title: &str,
        message: String,
    ) {
        let notification =
            NewNotification::new(entry.user_id, kind, title, message).about("time_entry", entry.id.0);
        if let Err(e) = self.notifier.notify(notification).await {
            tracing::warn!(error = %e, entry_id = %entry.id, "Failed to notify entry owner");
        }
    }
}

fn scoped(caller: &User, filter: &TimeEntryFilter) -> TimeEntryFilter {
    let mut filter = filter.clone();
    if !caller.is_manager() {
        filter.user_id = Some(caller.id);
    }
    filter
}

fn duplicate_error() -> AppError {
    DomainError::AlreadyExists(
        "A time entry already exists for this project, task and date".to_string(),
    )
    .into()
}

//! Time entry domain entity

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::project::ProjectId;
use super::task::TaskId;
use super::user::UserId;

/// Maximum hours a single entry may record
pub const MAX_HOURS_PER_ENTRY: f64 = 24.0;

/// Entries can be edited by their owner for this many days after creation
pub const EDIT_WINDOW_DAYS: i64 = 7;

/// Unique identifier for a time entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeEntryId(pub Uuid);

impl TimeEntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TimeEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TimeEntryId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TimeEntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the time was spent on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeCategory {
    Development,
    Testing,
    Documentation,
    Meeting,
    Other,
}

impl std::fmt::Display for TimeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeCategory::Development => write!(f, "development"),
            TimeCategory::Testing => write!(f, "testing"),
            TimeCategory::Documentation => write!(f, "documentation"),
            TimeCategory::Meeting => write!(f, "meeting"),
            TimeCategory::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for TimeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" => Ok(TimeCategory::Development),
            "testing" => Ok(TimeCategory::Testing),
            "documentation" => Ok(TimeCategory::Documentation),
            "meeting" => Ok(TimeCategory::Meeting),
            "other" => Ok(TimeCategory::Other),
            _ => Err(format!("Unknown time category: {}", s)),
        }
    }
}

/// Hours logged by a user against a project (and optionally a task)
#[derive(Debug, Clone, Serialize)]
pub struct TimeEntry {
    pub id: TimeEntryId,
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub task_id: Option<TaskId>,
    pub hours: f64,
    pub date: NaiveDate,
    pub category: TimeCategory,
    pub notes: Option<String>,
    pub is_approved: bool,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeEntry {
    /// Owners may change an entry only within the edit window
    pub fn is_editable_at(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at <= Duration::days(EDIT_WINDOW_DAYS)
    }

    /// Append a labelled block to the notes
    pub fn append_note(&mut self, label: &str, text: &str) {
        let existing = self.notes.take().unwrap_or_default();
        self.notes = Some(format!("{}\n\n{}: {}", existing, label, text));
    }
}

/// Validate hours and date against `today`
pub fn validate_entry(hours: f64, date: NaiveDate, today: NaiveDate) -> Result<(), String> {
    if !hours.is_finite() || hours <= 0.0 || hours > MAX_HOURS_PER_ENTRY {
        return Err(format!(
            "Hours must be greater than 0 and at most {}",
            MAX_HOURS_PER_ENTRY
        ));
    }
    if date > today {
        return Err("Time entries cannot be logged for future dates".to_string());
    }
    Ok(())
}

/// Data needed to create a new time entry
#[derive(Debug, Clone)]
pub struct NewTimeEntry {
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub task_id: Option<TaskId>,
    pub hours: f64,
    pub date: NaiveDate,
    pub category: TimeCategory,
    pub notes: Option<String>,
}

/// Owner edits to an entry
#[derive(Debug, Clone, Default)]
pub struct TimeEntryUpdate {
    pub hours: Option<f64>,
    pub date: Option<NaiveDate>,
    pub category: Option<TimeCategory>,
    pub notes: Option<String>,
}

impl TimeEntryUpdate {
    pub fn apply_to(&self, entry: &mut TimeEntry) {
        if let Some(hours) = self.hours {
            entry.hours = hours;
        }
        if let Some(date) = self.date {
            entry.date = date;
        }
        if let Some(category) = self.category {
            entry.category = category;
        }
        if let Some(notes) = &self.notes {
            entry.notes = Some(notes.clone());
        }
    }
}

/// Filters for listing time entries
#[derive(Debug, Clone, Default)]
pub struct TimeEntryFilter {
    pub user_id: Option<UserId>,
    pub project_id: Option<ProjectId>,
    pub task_id: Option<TaskId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_approved: Option<bool>,
    pub category: Option<TimeCategory>,
}

impl TimeEntryFilter {
    pub fn matches(&self, entry: &TimeEntry) -> bool {
        if self.user_id.is_some_and(|u| u != entry.user_id) {
            return false;
        }
        if self.project_id.is_some_and(|p| p != entry.project_id) {
            return false;
        }
        if self.task_id.is_some() && self.task_id != entry.task_id {
            return false;
        }
        if self.start_date.is_some_and(|d| entry.date < d) {
            return false;
        }
        if self.end_date.is_some_and(|d| entry.date > d) {
            return false;
        }
        if self.is_approved.is_some_and(|a| a != entry.is_approved) {
            return false;
        }
        if self.category.is_some_and(|c| c != entry.category) {
            return false;
        }
        true
    }
}

//! Project domain entity
//!
//! A project groups tasks, time entries and files under a single manager
//! and a team of members.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserId;

/// Role label given to the project manager's own membership
pub const MANAGER_MEMBER_ROLE: &str = "Project Manager";

/// Role label given to members added without an explicit role
pub const DEFAULT_MEMBER_ROLE: &str = "Team Member";

/// Unique identifier for a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub Uuid);

impl ProjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ProjectId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Project status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Planned but not started
    Draft,
    /// Work in progress
    Active,
    /// Temporarily paused
    OnHold,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    /// Completed and cancelled projects are closed
    pub fn is_closed(&self) -> bool {
        matches!(self, ProjectStatus::Completed | ProjectStatus::Cancelled)
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectStatus::Draft => write!(f, "draft"),
            ProjectStatus::Active => write!(f, "active"),
            ProjectStatus::OnHold => write!(f, "on_hold"),
            ProjectStatus::Completed => write!(f, "completed"),
            ProjectStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "draft" => Ok(ProjectStatus::Draft),
            "active" => Ok(ProjectStatus::Active),
            "on_hold" | "onhold" => Ok(ProjectStatus::OnHold),
            "completed" => Ok(ProjectStatus::Completed),
            "cancelled" => Ok(ProjectStatus::Cancelled),
            _ => Err(format!("Unknown project status: {}", s)),
        }
    }
}

/// A managed project
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub budget: f64,
    pub actual_cost: f64,
    pub status: ProjectStatus,
    pub manager_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Days left until the end date (negative once it has passed)
    pub fn days_remaining(&self, today: NaiveDate) -> Option<i64> {
        self.end_date.map(|end| (end - today).num_days())
    }

    /// Days since the start date, never negative
    pub fn days_elapsed(&self, today: NaiveDate) -> i64 {
        (today - self.start_date).num_days().max(0)
    }

    /// Percentage of the budget spent; `None` when no budget is set
    pub fn budget_utilization(&self) -> Option<f64> {
        if self.budget > 0.0 {
            Some(self.actual_cost / self.budget * 100.0)
        } else {
            None
        }
    }
}

/// Check the basic invariants shared by create and update
pub fn validate_project_fields(
    name: &str,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    budget: f64,
    actual_cost: f64,
) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 200 {
        return Err("Project name must be between 1 and 200 characters".to_string());
    }
    if let Some(end) = end_date {
        if end < start_date {
            return Err("End date must not be before start date".to_string());
        }
    }
    if budget < 0.0 || !budget.is_finite() {
        return Err("Budget must be a non-negative number".to_string());
    }
    if actual_cost < 0.0 || !actual_cost.is_finite() {
        return Err("Actual cost must be a non-negative number".to_string());
    }
    Ok(())
}

/// Data needed to create a new project
#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub budget: f64,
    pub manager_id: UserId,
}

/// Partial update of a project
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<f64>,
    pub actual_cost: Option<f64>,
    pub status: Option<ProjectStatus>,
    pub manager_id: Option<UserId>,
}

impl ProjectUpdate {
    /// Apply the update to a copy of the project
    pub fn apply_to(&self, project: &Project) -> Project {
        let mut updated = project.clone();
        if let Some(name) = &self.name {
            updated.name = name.trim().to_string();
        }
        if let Some(description) = &self.description {
            updated.description = Some(description.clone());
        }
        if let Some(start) = self.start_date {
            updated.start_date = start;
        }
        if let Some(end) = self.end_date {
            updated.end_date = Some(end);
        }
        if let Some(budget) = self.budget {
            updated.budget = budget;
        }
        if let Some(cost) = self.actual_cost {
            updated.actual_cost = cost;
        }
        if let Some(status) = self.status {
            updated.status = status;
        }
        if let Some(manager) = self.manager_id {
            updated.manager_id = manager;
        }
        updated
    }
}

/// A user's membership in a project. Leaving sets `left_at`.
#[derive(Debug, Clone, Serialize)]
pub struct TeamMember {
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub role: String,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
}

impl TeamMember {
    pub fn is_active(&self) -> bool {
        self.left_at.is_none()
    }
}

/// Filters for listing projects
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub status: Option<ProjectStatus>,
    pub manager_id: Option<UserId>,
    pub search: Option<String>,
    /// Only projects where this user is an active member
    pub member_id: Option<UserId>,
}

impl ProjectFilter {
    /// Field-level match; `member_id` is resolved by the repository
    pub fn matches(&self, project: &Project) -> bool {
        if self.status.is_some_and(|s| s != project.status) {
            return false;
        }
        if self.manager_id.is_some_and(|m| m != project.manager_id) {
            return false;
        }
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            let in_name = project.name.to_lowercase().contains(&term);
            let in_description = project
                .description
                .as_ref()
                .is_some_and(|d| d.to_lowercase().contains(&term));
            if !in_name && !in_description {
                return false;
            }
        }
        true
    }
}

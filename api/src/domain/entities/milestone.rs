//! Milestone domain entity
//!
//! Milestones are dated checkpoints of a project. A milestone can wait on
//! other milestones of the same project.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::project::ProjectId;

/// Unique identifier for a milestone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MilestoneId(pub Uuid);

impl MilestoneId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MilestoneId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for MilestoneId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for MilestoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Milestone {
    pub id: MilestoneId,
    pub project_id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub due_date: NaiveDate,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Milestone {
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.is_completed && self.due_date < today
    }

    /// Whole days from creation to completion
    pub fn completion_days(&self) -> Option<i64> {
        self.completed_at
            .map(|done| (done.date_naive() - self.created_at.date_naive()).num_days())
    }
}

pub fn validate_milestone_name(name: &str) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 255 {
        return Err("Milestone name must be between 1 and 255 characters".to_string());
    }
    Ok(())
}

pub fn validate_due_date(due_date: NaiveDate, today: NaiveDate) -> Result<(), String> {
    if due_date < today {
        return Err("Due date cannot be in the past".to_string());
    }
    Ok(())
}

/// Data needed to create a new milestone
#[derive(Debug, Clone)]
pub struct NewMilestone {
    pub project_id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub due_date: NaiveDate,
}

/// Partial update of a milestone
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MilestoneUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub is_completed: Option<bool>,
}

impl MilestoneUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.due_date.is_none()
            && self.is_completed.is_none()
    }

    /// Apply the update; completing stamps `completed_at`, reopening clears it
    pub fn apply_to(self, milestone: &mut Milestone, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            milestone.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            milestone.description = Some(description);
        }
        if let Some(due_date) = self.due_date {
            milestone.due_date = due_date;
        }
        match self.is_completed {
            Some(true) if !milestone.is_completed => {
                milestone.is_completed = true;
                milestone.completed_at = Some(now);
            }
            Some(false) if milestone.is_completed => {
                milestone.is_completed = false;
                milestone.completed_at = None;
            }
            _ => {}
        }
    }
}

/// `dependent_id` cannot complete before `prerequisite_id`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MilestoneDependency {
    pub dependent_id: MilestoneId,
    pub prerequisite_id: MilestoneId,
    pub created_at: DateTime<Utc>,
}

/// Whether adding `dependent -> prerequisite` closes a loop
pub fn creates_milestone_cycle(
    edges: &[MilestoneDependency],
    dependent: MilestoneId,
    prerequisite: MilestoneId,
) -> bool {
    if dependent == prerequisite {
        return true;
    }

    let mut graph: HashMap<MilestoneId, Vec<MilestoneId>> = HashMap::new();
    for edge in edges {
        graph
            .entry(edge.dependent_id)
            .or_default()
            .push(edge.prerequisite_id);
    }

    let mut stack = vec![prerequisite];
    let mut seen = HashSet::new();
    while let Some(current) = stack.pop() {
        if current == dependent {
            return true;
        }
        if !seen.insert(current) {
            continue;
        }
        if let Some(next) = graph.get(&current) {
            stack.extend(next.iter().copied());
        }
    }
    false
}

/// Milestone progress of one project
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MilestoneStats {
    pub total_milestones: usize,
    pub completed_milestones: usize,
    pub overdue_milestones: usize,
    pub upcoming_milestones: usize,
    pub completion_percentage: f64,
    pub average_completion_time_days: Option<f64>,
}

impl MilestoneStats {
    pub fn compute(milestones: &[Milestone], today: NaiveDate) -> Self {
        let completed = milestones.iter().filter(|m| m.is_completed).count();
        let overdue = milestones.iter().filter(|m| m.is_overdue(today)).count();

        let durations: Vec<i64> = milestones.iter().filter_map(|m| m.completion_days()).collect();
        let average_completion_time_days = if durations.is_empty() {
            None
        } else {
            let mean = durations.iter().sum::<i64>() as f64 / durations.len() as f64;
            Some((mean * 100.0).round() / 100.0)
        };

        Self {
            total_milestones: milestones.len(),
            completed_milestones: completed,
            overdue_milestones: overdue,
            upcoming_milestones: milestones.len() - completed - overdue,
            completion_percentage: if milestones.is_empty() {
                0.0
            } else {
                (completed as f64 / milestones.len() as f64 * 10_000.0).round() / 100.0
            },
            average_completion_time_days,
        }
    }
}

//! Task domain entity
//!
//! Tasks belong to a project, move through a small status workflow and can
//! depend on other tasks of the same project.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::project::ProjectId;
use super::user::UserId;

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TaskId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Review,
    Done,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Todo => write!(f, "todo"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Review => write!(f, "review"),
            TaskStatus::Done => write!(f, "done"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "todo" | "to_do" => Ok(TaskStatus::Todo),
            "in_progress" | "inprogress" => Ok(TaskStatus::InProgress),
            "review" => Ok(TaskStatus::Review),
            "done" => Ok(TaskStatus::Done),
            _ => Err(format!("Unknown task status: {}", s)),
        }
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "critical" => Ok(TaskPriority::Critical),
            _ => Err(format!("Unknown task priority: {}", s)),
        }
    }
}

/// A unit of work inside a project
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    pub assignee_id: Option<UserId>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub estimated_hours: Option<f64>,
    pub actual_hours: f64,
    pub due_date: Option<NaiveDate>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status != TaskStatus::Done && self.due_date.is_some_and(|due| due < today)
    }

    /// Move to a new status, maintaining `started_at` / `completed_at`
    pub fn transition_to(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        if status == self.status {
            return;
        }
        if status == TaskStatus::InProgress && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if status == TaskStatus::Done {
            self.completed_at = Some(now);
            if self.started_at.is_none() {
                self.started_at = Some(now);
            }
        } else if self.status == TaskStatus::Done {
            self.completed_at = None;
        }
        self.status = status;
        self.updated_at = now;
    }

    /// Hours between start and completion, if both are known
    pub fn completion_hours(&self) -> Option<f64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) if end >= start => {
                Some((end - start).num_seconds() as f64 / 3600.0)
            }
            _ => None,
        }
    }

    /// Completed on or before the due date (tasks without a due date count as on time)
    pub fn completed_on_time(&self) -> Option<bool> {
        let completed = self.completed_at?;
        Some(match self.due_date {
            Some(due) => completed.date_naive() <= due,
            None => true,
        })
    }
}

pub fn validate_task_fields(title: &str, estimated_hours: Option<f64>) -> Result<(), String> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > 200 {
        return Err("Task title must be between 1 and 200 characters".to_string());
    }
    if let Some(hours) = estimated_hours {
        if hours < 0.0 || !hours.is_finite() {
            return Err("Estimated hours must be a non-negative number".to_string());
        }
    }
    Ok(())
}

/// Data needed to create a new task
#[derive(Debug, Clone)]
pub struct NewTask {
    pub project_id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    pub assignee_id: Option<UserId>,
    pub priority: TaskPriority,
    pub estimated_hours: Option<f64>,
    pub due_date: Option<NaiveDate>,
    pub created_by: UserId,
}

/// Partial update of a task's descriptive fields
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub estimated_hours: Option<f64>,
    pub due_date: Option<NaiveDate>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.estimated_hours.is_none()
            && self.due_date.is_none()
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.trim().to_string();
        }
        if let Some(description) = &self.description {
            task.description = Some(description.clone());
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(hours) = self.estimated_hours {
            task.estimated_hours = Some(hours);
        }
        if let Some(due) = self.due_date {
            task.due_date = Some(due);
        }
    }
}

/// Kind of link between two tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    /// The prerequisite blocks this task
    Blocks,
    /// This task depends on the prerequisite
    DependsOn,
    /// Informational link, never blocks
    RelatedTo,
}

impl DependencyType {
    /// Whether an unfinished prerequisite prevents progress
    pub fn is_blocking(&self) -> bool {
        !matches!(self, DependencyType::RelatedTo)
    }
}

impl std::fmt::Display for DependencyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependencyType::Blocks => write!(f, "blocks"),
            DependencyType::DependsOn => write!(f, "depends_on"),
            DependencyType::RelatedTo => write!(f, "related_to"),
        }
    }
}

impl std::str::FromStr for DependencyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "blocks" => Ok(DependencyType::Blocks),
            "depends_on" | "dependson" => Ok(DependencyType::DependsOn),
            "related_to" | "relatedto" => Ok(DependencyType::RelatedTo),
            _ => Err(format!("Unknown dependency type: {}", s)),
        }
    }
}

/// `task_id` cannot progress until `depends_on_id` is done (for blocking types)
#[derive(Debug, Clone, Serialize)]
pub struct TaskDependency {
    pub task_id: TaskId,
    pub depends_on_id: TaskId,
    pub dependency_type: DependencyType,
    pub created_at: DateTime<Utc>,
}

/// True if adding `task -> depends_on` would close a cycle in `edges`
pub fn creates_cycle(edges: &[TaskDependency], task: TaskId, depends_on: TaskId) -> bool {
    if task == depends_on {
        return true;
    }

    let mut graph: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
    for edge in edges {
        graph.entry(edge.task_id).or_default().push(edge.depends_on_id);
    }

    // A cycle exists if `task` is reachable from `depends_on`
    let mut stack = vec![depends_on];
    let mut seen = HashSet::new();
    while let Some(current) = stack.pop() {
        if current == task {
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

/// Filters for listing tasks
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Restrict to these projects (visibility scope)
    pub project_ids: Option<Vec<ProjectId>>,
    pub project_id: Option<ProjectId>,
    pub assignee_id: Option<UserId>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    /// Only tasks overdue as of this date
    pub overdue_as_of: Option<NaiveDate>,
    pub search: Option<String>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(ids) = &self.project_ids {
            if !ids.contains(&task.project_id) {
                return false;
            }
        }
        if self.project_id.is_some_and(|p| p != task.project_id) {
            return false;
        }
        if self.assignee_id.is_some() && self.assignee_id != task.assignee_id {
            return false;
        }
        if self.status.is_some_and(|s| s != task.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != task.priority) {
            return false;
        }
        if let Some(today) = self.overdue_as_of {
            if !task.is_overdue(today) {
                return false;
            }
        }
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            let in_title = task.title.to_lowercase().contains(&term);
            let in_description = task
                .description
                .as_ref()
                .is_some_and(|d| d.to_lowercase().contains(&term));
            if !in_title && !in_description {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_task(status: TaskStatus) -> Task {
        Task {
            id: TaskId::new(),
            project_id: ProjectId::new(),
            title: "Write docs".to_string(),
            description: None,
            assignee_id: None,
            status,
            priority: TaskPriority::Medium,
            estimated_hours: Some(4.0),
            actual_hours: 0.0,
            due_date: NaiveDate::from_ymd_opt(2024, 6, 1),
            started_at: None,
            completed_at: None,
            created_by: UserId::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn edge(task: TaskId, depends_on: TaskId) -> TaskDependency {
        TaskDependency {
            task_id: task,
            depends_on_id: depends_on,
            dependency_type: DependencyType::DependsOn,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn status_parse_and_display() {
        assert_eq!(TaskStatus::InProgress.to_string(), "in_progress");
        assert_eq!(
            "In Progress".parse::<TaskStatus>().unwrap(),
            TaskStatus::InProgress
        );
        assert_eq!("ToDo".parse::<TaskStatus>().unwrap(), TaskStatus::Todo);
        assert!("blocked".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn priority_ordering() {
        assert!(TaskPriority::Critical > TaskPriority::High);
        assert!(TaskPriority::Low < TaskPriority::Medium);
        assert_eq!("HIGH".parse::<TaskPriority>().unwrap(), TaskPriority::High);
    }

    #[test]
    fn starting_sets_started_at_once() {
        let mut task = make_task(TaskStatus::Todo);
        let t0 = Utc::now();
        task.transition_to(TaskStatus::InProgress, t0);
        assert_eq!(task.started_at, Some(t0));

        task.transition_to(TaskStatus::Review, t0 + Duration::hours(1));
        task.transition_to(TaskStatus::InProgress, t0 + Duration::hours(2));
        assert_eq!(task.started_at, Some(t0));
    }

    #[test]
    fn done_sets_and_reopening_clears_completed_at() {
        let mut task = make_task(TaskStatus::InProgress);
        let now = Utc::now();
        task.transition_to(TaskStatus::Done, now);
        assert_eq!(task.completed_at, Some(now));

        task.transition_to(TaskStatus::Review, now);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn completion_hours_from_timestamps() {
        let mut task = make_task(TaskStatus::Todo);
        let start = Utc::now();
        task.transition_to(TaskStatus::InProgress, start);
        task.transition_to(TaskStatus::Done, start + Duration::minutes(90));
        assert_eq!(task.completion_hours(), Some(1.5));
    }

    #[test]
    fn overdue_only_when_not_done() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        assert!(make_task(TaskStatus::Review).is_overdue(today));
        assert!(!make_task(TaskStatus::Done).is_overdue(today));

        let mut no_due = make_task(TaskStatus::Todo);
        no_due.due_date = None;
        assert!(!no_due.is_overdue(today));
    }

    #[test]
    fn cycle_detection_direct_and_transitive() {
        let a = TaskId::new();
        let b = TaskId::new();
        let c = TaskId::new();
        let edges = vec![edge(a, b), edge(b, c)];

        assert!(creates_cycle(&edges, c, a));
        assert!(creates_cycle(&edges, b, a));
        assert!(creates_cycle(&edges, a, a));
        assert!(!creates_cycle(&edges, a, c));
    }

    #[test]
    fn related_links_do_not_block() {
        assert!(!DependencyType::RelatedTo.is_blocking());
        assert!(DependencyType::Blocks.is_blocking());
        assert_eq!(
            "depends-on".parse::<DependencyType>().unwrap(),
            DependencyType::DependsOn
        );
    }

    #[test]
    fn filter_by_status_and_search() {
        let task = make_task(TaskStatus::Todo);
        let filter = TaskFilter {
            status: Some(TaskStatus::Todo),
            search: Some("DOCS".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&task));

        let filter = TaskFilter {
            project_ids: Some(vec![ProjectId::new()]),
            ..Default::default()
        };
        assert!(!filter.matches(&task));
    }
}

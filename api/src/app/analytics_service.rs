//! Analytics service
//!
//! Project health (progress, milestones, time variance, budget, risk) and
//! the per-user dashboard.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;

use super::access::ensure_project_access;
use super::round2;
use super::task_service::{task_statistics, TaskStatistics};
use crate::domain::entities::{
    Milestone, MilestoneStats, PageRequest, Project, ProjectFilter, ProjectId, ProjectStatus, Task,
    TaskFilter, TaskStatus, TimeEntryFilter, User, UserId,
};
use crate::domain::ports::{
    MilestoneRepository, NotificationRepository, ProjectRepository, TaskRepository,
    TimeEntryRepository, UserRepository,
};
use crate::error::AppError;

/// Projects ending within this many days count as schedule risk
const SCHEDULE_WARNING_DAYS: i64 = 30;
const DUE_SOON_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize)]
pub struct Progress {
    pub completion_percentage: f64,
    pub days_elapsed: i64,
    pub days_remaining: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSummary {
    pub estimated_hours: f64,
    pub actual_hours: f64,
    /// actual - estimated
    pub variance_hours: f64,
    pub variance_percentage: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamPerformance {
    pub user_id: UserId,
    pub name: String,
    pub assigned_tasks: usize,
    pub completed_tasks: usize,
    pub hours_logged: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectAnalytics {
    pub project_id: ProjectId,
    pub name: String,
    pub status: ProjectStatus,
    pub progress: Progress,
    pub tasks: TaskStatistics,
    pub milestones: MilestoneStats,
    pub time: TimeSummary,
    pub team: Vec<TeamPerformance>,
    pub budget_utilization: Option<f64>,
    /// `None` when no risk factor applies to the project
    pub risk_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub total_projects: usize,
    pub projects_by_status: BTreeMap<String, usize>,
    pub open_tasks: usize,
    pub overdue_tasks: usize,
    pub due_soon: usize,
    pub hours_this_week: f64,
    pub unread_notifications: u64,
    /// Only reported to managers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_approvals: Option<u64>,
}

/// Risk in percent, capped at 100. Each factor scores 0..=1 and only
/// counts when it applies:
///
/// - overdue milestones, as a share of all milestones;
/// - overdue tasks, as a share of all tasks;
/// - schedule: 1 past the end date, 0.5 within 30 days of it. Needs an end
///   date and an unfinished project;
/// - budget: 1 when spending exceeds the budget. Needs a budget and some
///   spending.
pub fn risk_score(
    project: &Project,
    milestones: &[Milestone],
    tasks: &[Task],
    today: NaiveDate,
) -> Option<f64> {
    let mut factors = Vec::with_capacity(4);

    if !milestones.is_empty() {
        let overdue = milestones.iter().filter(|m| m.is_overdue(today)).count();
        factors.push(overdue as f64 / milestones.len() as f64);
    }

    if !tasks.is_empty() {
        let overdue = tasks.iter().filter(|t| t.is_overdue(today)).count();
        factors.push(overdue as f64 / tasks.len() as f64);
    }

    if project.status != ProjectStatus::Completed {
        match project.days_remaining(today) {
            Some(days) if days < 0 => factors.push(1.0),
            Some(days) if days < SCHEDULE_WARNING_DAYS => factors.push(0.5),
            Some(_) => factors.push(0.0),
            None => {}
        }
    }

    if project.budget > 0.0 && project.actual_cost > 0.0 {
        factors.push(if project.actual_cost > project.budget { 1.0 } else { 0.0 });
    }

    if factors.is_empty() {
        return None;
    }
    let mean = factors.iter().sum::<f64>() / factors.len() as f64;
    Some(round2((mean * 100.0).min(100.0)))
}

pub fn time_summary(tasks: &[Task], actual_hours: f64) -> TimeSummary {
    let estimated: f64 = tasks.iter().filter_map(|t| t.estimated_hours).sum();
    let variance = actual_hours - estimated;
    TimeSummary {
        estimated_hours: round2(estimated),
        actual_hours: round2(actual_hours),
        variance_hours: round2(variance),
        variance_percentage: if estimated > 0.0 {
            Some(round2(variance / estimated * 100.0))
        } else {
            None
        },
    }
}

pub struct AnalyticsService<PR, TR, ER, UR, NR, MR>
where
    PR: ProjectRepository,
    TR: TaskRepository,
    ER: TimeEntryRepository,
    UR: UserRepository,
    NR: NotificationRepository,
    MR: MilestoneRepository,
{
    projects: Arc<PR>,
    tasks: Arc<TR>,
    entries: Arc<ER>,
    users: Arc<UR>,
    notifications: Arc<NR>,
    milestones: Arc<MR>,
}

impl<PR, TR, ER, UR, NR, MR> AnalyticsService<PR, TR, ER, UR, NR, MR>
where
    PR: ProjectRepository,
    TR: TaskRepository,
    ER: TimeEntryRepository,
    UR: UserRepository,
    NR: NotificationRepository,
    MR: MilestoneRepository,
{
    pub fn new(
        projects: Arc<PR>,
        tasks: Arc<TR>,
        entries: Arc<ER>,
        users: Arc<UR>,
        notifications: Arc<NR>,
        milestones: Arc<MR>,
    ) -> Self {
        Self {
            projects,
            tasks,
            entries,
            users,
            notifications,
            milestones,
        }
    }

    pub async fn project_analytics(
        &self,
        caller: &User,
        project_id: &ProjectId,
    ) -> Result<ProjectAnalytics, AppError> {
        let project = ensure_project_access(self.projects.as_ref(), caller, project_id).await?;
        let today = Utc::now().date_naive();

        let tasks = self
            .tasks
            .find_all(&TaskFilter {
                project_id: Some(*project_id),
                ..Default::default()
            })
            .await?;
        let entries = self
            .entries
            .find_all(&TimeEntryFilter {
                project_id: Some(*project_id),
                ..Default::default()
            })
            .await?;
        let milestones = self.milestones.list_for_project(project_id, None).await?;

        let stats = task_statistics(&tasks, today);
        let mut hours_by_user: HashMap<UserId, f64> = HashMap::new();
        for entry in &entries {
            *hours_by_user.entry(entry.user_id).or_default() += entry.hours;
        }
        let total_hours: f64 = hours_by_user.values().sum();

        let member_ids: Vec<UserId> = self
            .projects
            .members(project_id)
            .await?
            .into_iter()
            .filter(|m| m.is_active())
            .map(|m| m.user_id)
            .collect();
        let mut team: Vec<TeamPerformance> = self
            .users
            .find_by_ids(&member_ids)
            .await?
            .into_iter()
            .map(|user| {
                let assigned: Vec<&Task> = tasks
                    .iter()
                    .filter(|t| t.assignee_id == Some(user.id))
                    .collect();
                TeamPerformance {
                    user_id: user.id,
                    name: user.full_name(),
                    assigned_tasks: assigned.len(),
                    completed_tasks: assigned
                        .iter()
                        .filter(|t| t.status == TaskStatus::Done)
                        .count(),
                    hours_logged: round2(hours_by_user.get(&user.id).copied().unwrap_or(0.0)),
                }
            })
            .collect();
        team.sort_by(|a, b| b.hours_logged.total_cmp(&a.hours_logged));

        Ok(ProjectAnalytics {
            project_id: project.id,
            name: project.name.clone(),
            status: project.status,
            progress: Progress {
                completion_percentage: stats.completion_rate,
                days_elapsed: project.days_elapsed(today),
                days_remaining: project.days_remaining(today),
            },
            time: time_summary(&tasks, total_hours),
            team,
            budget_utilization: project.budget_utilization().map(round2),
            risk_score: risk_score(&project, &milestones, &tasks, today),
            milestones: MilestoneStats::compute(&milestones, today),
            tasks: stats,
        })
    }

    pub async fn dashboard(&self, caller: &User) -> Result<Dashboard, AppError> {
        let today = Utc::now().date_naive();

        let project_filter = if caller.is_admin() {
            ProjectFilter::default()
        } else {
            ProjectFilter {
                member_id: Some(caller.id),
                ..Default::default()
            }
        };
        let projects = self.projects.find_all(&project_filter).await?;
        let mut projects_by_status = BTreeMap::new();
        for project in &projects {
            *projects_by_status
                .entry(project.status.to_string())
                .or_insert(0) += 1;
        }

        let open: Vec<Task> = self
            .tasks
            .find_all(&TaskFilter {
                assignee_id: Some(caller.id),
                ..Default::default()
            })
            .await?
            .into_iter()
            .filter(|t| t.status != TaskStatus::Done)
            .collect();
        let soon = today + Duration::days(DUE_SOON_DAYS);

        let week_start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
        let hours_this_week: f64 = self
            .entries
            .find_all(&TimeEntryFilter {
                user_id: Some(caller.id),
                start_date: Some(week_start),
                end_date: Some(today),
                ..Default::default()
            })
            .await?
            .iter()
            .map(|e| e.hours)
            .sum();

        let pending_approvals = if caller.is_manager() {
            let pending = TimeEntryFilter {
                is_approved: Some(false),
                ..Default::default()
            };
            Some(
                self.entries
                    .list(&pending, PageRequest::new(Some(1), Some(1)))
                    .await?
                    .total,
            )
        } else {
            None
        };

        Ok(Dashboard {
            total_projects: projects.len(),
            projects_by_status,
            overdue_tasks: open.iter().filter(|t| t.is_overdue(today)).count(),
            due_soon: open
                .iter()
                .filter(|t| t.due_date.is_some_and(|d| d >= today && d <= soon))
                .count(),
            open_tasks: open.len(),
            hours_this_week: round2(hours_this_week),
            unread_notifications: self.notifications.count_unread(&caller.id).await?,
            pending_approvals,
        })
    }
}

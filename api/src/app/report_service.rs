//! Report service
//!
//! Read-only aggregations over time entries and tasks: time reports,
//! per-project reports and per-user performance.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::access::ensure_project_access;
use super::round2;
use super::task_service::{task_statistics, TaskStatistics};
use crate::domain::entities::{
    Project, ProjectId, TaskFilter, TaskStatus, TimeEntry, TimeEntryFilter, User, UserId,
};
use crate::domain::ports::{ProjectRepository, TaskRepository, TimeEntryRepository, UserRepository};
use crate::error::{AppError, DomainError};

/// Longest range a time report may cover, counting both end dates
pub const MAX_REPORT_DAYS: i64 = 366;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    User,
    Project,
    Category,
    Date,
}

#[derive(Debug, Clone)]
pub struct TimeReportQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub project_id: Option<ProjectId>,
    pub user_id: Option<UserId>,
    pub group_by: GroupBy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeTotals {
    pub total_hours: f64,
    pub approved_hours: f64,
    pub pending_hours: f64,
    pub entries: usize,
    pub labor_cost: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeGroup {
    pub key: String,
    pub label: String,
    #[serde(flatten)]
    pub totals: TimeTotals,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub group_by: GroupBy,
    pub totals: TimeTotals,
    pub groups: Vec<TimeGroup>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberSummary {
    pub user_id: UserId,
    pub name: String,
    pub role: String,
    pub hours: f64,
    pub completed_tasks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetSummary {
    pub budget: f64,
    pub actual_cost: f64,
    pub remaining: f64,
    pub utilization: Option<f64>,
    pub labor_cost: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectReport {
    pub project: Project,
    pub tasks: TaskStatistics,
    pub time: TimeTotals,
    pub members: Vec<MemberSummary>,
    pub budget: BudgetSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserPerformance {
    pub user_id: UserId,
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub tasks_assigned: usize,
    pub tasks_completed: usize,
    pub completion_rate: f64,
    /// Share of completed tasks finished by their due date
    pub on_time_rate: Option<f64>,
    pub hours_logged: f64,
    pub average_hours_per_task: Option<f64>,
}

/// Sum entries, pricing hours at each user's hourly rate
pub fn summarize(entries: &[&TimeEntry], rates: &HashMap<UserId, f64>) -> TimeTotals {
    let mut totals = TimeTotals {
        entries: entries.len(),
        ..Default::default()
    };
    for entry in entries {
        totals.total_hours += entry.hours;
        if entry.is_approved {
            totals.approved_hours += entry.hours;
        } else {
            totals.pending_hours += entry.hours;
        }
        totals.labor_cost += entry.hours * rates.get(&entry.user_id).copied().unwrap_or(0.0);
    }
    totals.total_hours = round2(totals.total_hours);
    totals.approved_hours = round2(totals.approved_hours);
    totals.pending_hours = round2(totals.pending_hours);
    totals.labor_cost = round2(totals.labor_cost);
    totals
}

fn validate_range(start: NaiveDate, end: NaiveDate) -> Result<(), AppError> {
    if start > end {
        return Err(AppError::BadRequest(
            "start_date must not be after end_date".to_string(),
        ));
    }
    if (end - start).num_days() + 1 > MAX_REPORT_DAYS {
        return Err(AppError::BadRequest(format!(
            "Report range cannot exceed {} days",
            MAX_REPORT_DAYS
        )));
    }
    Ok(())
}

pub struct ReportService<ER, TR, PR, UR>
where
    ER: TimeEntryRepository,
    TR: TaskRepository,
    PR: ProjectRepository,
    UR: UserRepository,
{
    entries: Arc<ER>,
    tasks: Arc<TR>,
    projects: Arc<PR>,
    users: Arc<UR>,
}

impl<ER, TR, PR, UR> ReportService<ER, TR, PR, UR>
where
    ER: TimeEntryRepository,
    TR: TaskRepository,
    PR: ProjectRepository,
    UR: UserRepository,
{
    pub fn new(entries: Arc<ER>, tasks: Arc<TR>, projects: Arc<PR>, users: Arc<UR>) -> Self {
        Self {
            entries,
            tasks,
            projects,
            users,
        }
    }

    pub async fn time_report(
        &self,
        caller: &User,
        query: TimeReportQuery,
    ) -> Result<TimeReport, AppError> {
        validate_range(query.start_date, query.end_date)?;

        let user_id = if caller.is_manager() {
            query.user_id
        } else {
            if query.user_id.is_some_and(|u| u != caller.id) {
                return Err(AppError::forbidden(
                    "You can only report on your own time",
                ));
            }
            Some(caller.id)
        };

        let entries = self
            .entries
            .find_all(&TimeEntryFilter {
                user_id,
                project_id: query.project_id,
                start_date: Some(query.start_date),
                end_date: Some(query.end_date),
                ..Default::default()
            })
            .await?;

        let users = self.users_by_id(&entries).await?;
        let rates = rates_of(&users);

        let mut buckets: BTreeMap<String, Vec<&TimeEntry>> = BTreeMap::new();
        for entry in &entries {
            let key = match query.group_by {
                GroupBy::User => entry.user_id.to_string(),
                GroupBy::Project => entry.project_id.to_string(),
                GroupBy::Category => entry.category.to_string(),
                GroupBy::Date => entry.date.to_string(),
            };
            buckets.entry(key).or_default().push(entry);
        }

        let project_names = if query.group_by == GroupBy::Project {
            self.project_names(&entries).await?
        } else {
            HashMap::new()
        };

        let mut groups: Vec<TimeGroup> = buckets
            .into_iter()
            .map(|(key, bucket)| {
                let label = match query.group_by {
                    GroupBy::User => bucket
                        .first()
                        .and_then(|e| users.get(&e.user_id))
                        .map(|u| u.full_name()),
                    GroupBy::Project => bucket
                        .first()
                        .and_then(|e| project_names.get(&e.project_id))
                        .cloned(),
                    GroupBy::Category | GroupBy::Date => None,
                }
                .unwrap_or_else(|| key.clone());
                TimeGroup {
                    key,
                    label,
                    totals: summarize(&bucket, &rates),
                }
            })
            .collect();

        // BTreeMap order already sorts dates ascending
        if query.group_by != GroupBy::Date {
            groups.sort_by(|a, b| b.totals.total_hours.total_cmp(&a.totals.total_hours));
        }

        let all: Vec<&TimeEntry> = entries.iter().collect();
        Ok(TimeReport {
            start_date: query.start_date,
            end_date: query.end_date,
            group_by: query.group_by,
            totals: summarize(&all, &rates),
            groups,
        })
    }

    pub async fn project_report(
        &self,
        caller: &User,
        project_id: &ProjectId,
    ) -> Result<ProjectReport, AppError> {
        let project = ensure_project_access(self.projects.as_ref(), caller, project_id).await?;

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

        let users = self.users_by_id(&entries).await?;
        let rates = rates_of(&users);
        let all: Vec<&TimeEntry> = entries.iter().collect();
        let time = summarize(&all, &rates);

        let memberships: Vec<_> = self
            .projects
            .members(project_id)
            .await?
            .into_iter()
            .filter(|m| m.is_active())
            .collect();
        let member_ids: Vec<UserId> = memberships.iter().map(|m| m.user_id).collect();
        let member_users: HashMap<UserId, User> = self
            .users
            .find_by_ids(&member_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let mut members: Vec<MemberSummary> = memberships
            .into_iter()
            .map(|m| {
                let hours: f64 = entries
                    .iter()
                    .filter(|e| e.user_id == m.user_id)
                    .map(|e| e.hours)
                    .sum();
                MemberSummary {
                    user_id: m.user_id,
                    name: member_users
                        .get(&m.user_id)
                        .map(|u| u.full_name())
                        .unwrap_or_default(),
                    role: m.role,
                    hours: round2(hours),
                    completed_tasks: tasks
                        .iter()
                        .filter(|t| {
                            t.assignee_id == Some(m.user_id) && t.status == TaskStatus::Done
                        })
                        .count(),
                }
            })
            .collect();
        members.sort_by(|a, b| b.hours.total_cmp(&a.hours));

        let budget = BudgetSummary {
            budget: project.budget,
            actual_cost: project.actual_cost,
            remaining: round2(project.budget - project.actual_cost),
            utilization: project.budget_utilization().map(round2),
            labor_cost: time.labor_cost,
        };

        Ok(ProjectReport {
            tasks: task_statistics(&tasks, Utc::now().date_naive()),
            project,
            time,
            members,
            budget,
        })
    }

    /// Anyone may read their own performance; managers may read anyone's
    pub async fn user_performance(
        &self,
        caller: &User,
        user_id: Option<UserId>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<UserPerformance, AppError> {
        if let (Some(start), Some(end)) = (start_date, end_date) {
            validate_range(start, end)?;
        }
        let target = user_id.unwrap_or(caller.id);
        if target != caller.id && !caller.is_manager() {
            return Err(AppError::forbidden(
                "Only managers can view other users' performance",
            ));
        }
        let user = self
            .users
            .find_by_id(&target)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("User {} not found", target)))?;

        let in_range = |date: NaiveDate| {
            start_date.map_or(true, |s| date >= s) && end_date.map_or(true, |e| date <= e)
        };

        let tasks = self
            .tasks
            .find_all(&TaskFilter {
                assignee_id: Some(target),
                ..Default::default()
            })
            .await?;
        let assigned: Vec<_> = tasks
            .iter()
            .filter(|t| in_range(t.created_at.date_naive()))
            .collect();
        let completed: Vec<_> = tasks
            .iter()
            .filter(|t| {
                t.status == TaskStatus::Done
                    && t.completed_at.is_some_and(|c| in_range(c.date_naive()))
            })
            .collect();

        let timed: Vec<bool> = completed
            .iter()
            .filter(|t| t.due_date.is_some())
            .filter_map(|t| t.completed_on_time())
            .collect();
        let on_time_rate = if timed.is_empty() {
            None
        } else {
            let on_time = timed.iter().filter(|ok| **ok).count();
            Some(round2(on_time as f64 / timed.len() as f64 * 100.0))
        };

        let hours: f64 = self
            .entries
            .find_all(&TimeEntryFilter {
                user_id: Some(target),
                start_date,
                end_date,
                ..Default::default()
            })
            .await?
            .iter()
            .map(|e| e.hours)
            .sum();

        Ok(UserPerformance {
            user_id: target,
            name: user.full_name(),
            start_date,
            end_date,
            tasks_assigned: assigned.len(),
            tasks_completed: completed.len(),
            completion_rate: if assigned.is_empty() {
                0.0
            } else {
                round2(completed.len() as f64 / assigned.len() as f64 * 100.0)
            },
            on_time_rate,
            hours_logged: round2(hours),
            average_hours_per_task: if completed.is_empty() {
                None
            } else {
                Some(round2(hours / completed.len() as f64))
            },
        })
    }

    async fn users_by_id(&self, entries: &[TimeEntry]) -> Result<HashMap<UserId, User>, AppError> {
        let ids: Vec<UserId> = entries
            .iter()
            .map(|e| e.user_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        Ok(self
            .users
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect())
    }

    async fn project_names(
        &self,
        entries: &[TimeEntry],
    ) -> Result<HashMap<ProjectId, String>, AppError> {
        let ids: HashSet<ProjectId> = entries.iter().map(|e| e.project_id).collect();
        let mut names = HashMap::new();
        for id in ids {
            if let Some(project) = self.projects.find_by_id(&id).await? {
                names.insert(id, project.name);
            }
        }
        Ok(names)
    }
}

fn rates_of(users: &HashMap<UserId, User>) -> HashMap<UserId, f64> {
    users
        .iter()
        .filter_map(|(id, u)| u.hourly_rate.map(|r| (*id, r)))
        .collect()
}

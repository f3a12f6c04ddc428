//! Milestone service
//!
//! Project members can read milestones; the project manager and admins
//! create, change and link them. Completing a milestone notifies the team.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;

use super::access::{ensure_can_manage, ensure_project_access};
use crate::domain::entities::{
    creates_milestone_cycle, validate_due_date, validate_milestone_name, Milestone,
    MilestoneDependency, MilestoneId, MilestoneStats, MilestoneUpdate, NewMilestone,
    NewNotification, NotificationType, Project, ProjectId, User,
};
use crate::domain::ports::{MilestoneRepository, Notifier, ProjectRepository, RealtimePublisher};
use crate::error::{AppError, DomainError};

/// Input for creating a milestone
#[derive(Debug, Clone)]
pub struct CreateMilestone {
    pub project_id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub due_date: NaiveDate,
    /// Prerequisites within the same project
    pub dependency_ids: Vec<MilestoneId>,
}

/// A milestone with its dependency edges
#[derive(Debug, Clone, Serialize)]
pub struct MilestoneDetail {
    #[serde(flatten)]
    pub milestone: Milestone,
    pub prerequisite_ids: Vec<MilestoneId>,
    pub dependent_ids: Vec<MilestoneId>,
}

pub struct MilestoneService<MR, PR>
where
    MR: MilestoneRepository,
    PR: ProjectRepository,
{
    milestones: Arc<MR>,
    projects: Arc<PR>,
    notifier: Arc<dyn Notifier>,
    publisher: Arc<dyn RealtimePublisher>,
}

impl<MR, PR> MilestoneService<MR, PR>
where
    MR: MilestoneRepository,
    PR: ProjectRepository,
{
    pub fn new(
        milestones: Arc<MR>,
        projects: Arc<PR>,
        notifier: Arc<dyn Notifier>,
        publisher: Arc<dyn RealtimePublisher>,
    ) -> Self {
        Self {
            milestones,
            projects,
            notifier,
            publisher,
        }
    }

    pub async fn create(
        &self,
        caller: &User,
        input: CreateMilestone,
    ) -> Result<Milestone, AppError> {
        let project = ensure_project_access(self.projects.as_ref(), caller, &input.project_id).await?;
        ensure_can_manage(caller, &project)?;
        validate_milestone_name(&input.name).map_err(AppError::BadRequest)?;
        validate_due_date(input.due_date, Utc::now().date_naive()).map_err(AppError::BadRequest)?;

        let mut prerequisites = Vec::new();
        let mut seen = HashSet::new();
        for dep_id in input.dependency_ids.iter().filter(|id| seen.insert(**id)) {
            let dep = self.load(dep_id).await?;
            if dep.project_id != project.id {
                return Err(AppError::BadRequest(format!(
                    "Dependency milestone {} belongs to another project",
                    dep_id
                )));
            }
            prerequisites.push(dep.id);
        }

        let milestone = self
            .milestones
            .create(&NewMilestone {
                project_id: project.id,
                name: input.name.trim().to_string(),
                description: input.description,
                due_date: input.due_date,
            })
            .await?;

        // A new milestone has no dependents yet, so these edges cannot loop
        for dep_id in &prerequisites {
            self.milestones.add_dependency(&milestone.id, dep_id).await?;
        }

        self.publisher
            .project_event(&project.id, "milestone_created", json!(milestone))
            .await;
        tracing::info!(milestone_id = %milestone.id, project_id = %project.id, "Milestone created");
        Ok(milestone)
    }

    /// Milestones of a project by due date
    pub async fn list(
        &self,
        caller: &User,
        project_id: &ProjectId,
        is_completed: Option<bool>,
    ) -> Result<Vec<Milestone>, AppError> {
        ensure_project_access(self.projects.as_ref(), caller, project_id).await?;
        Ok(self
            .milestones
            .list_for_project(project_id, is_completed)
            .await?)
    }

    pub async fn get(
        &self,
        caller: &User,
        project_id: &ProjectId,
        id: &MilestoneId,
    ) -> Result<MilestoneDetail, AppError> {
        ensure_project_access(self.projects.as_ref(), caller, project_id).await?;
        let milestone = self.load(id).await?;
        if milestone.project_id != *project_id {
            return Err(DomainError::NotFound(format!("Milestone {} not found", id)).into());
        }

        let edges = self.milestones.project_dependencies(project_id).await?;
        Ok(MilestoneDetail {
            prerequisite_ids: edges
                .iter()
                .filter(|e| e.dependent_id == milestone.id)
                .map(|e| e.prerequisite_id)
                .collect(),
            dependent_ids: edges
                .iter()
                .filter(|e| e.prerequisite_id == milestone.id)
                .map(|e| e.dependent_id)
                .collect(),
            milestone,
        })
    }

    pub async fn update(
        &self,
        caller: &User,
        id: &MilestoneId,
        update: MilestoneUpdate,
    ) -> Result<Milestone, AppError> {
        if update.is_empty() {
            return Err(AppError::BadRequest("No fields to update".to_string()));
        }
        if let Some(name) = &update.name {
            validate_milestone_name(name).map_err(AppError::BadRequest)?;
        }
        if let Some(due_date) = update.due_date {
            validate_due_date(due_date, Utc::now().date_naive()).map_err(AppError::BadRequest)?;
        }

        let (mut milestone, project) = self.load_manageable(caller, id).await?;
        let was_completed = milestone.is_completed;
        update.apply_to(&mut milestone, Utc::now());
        let saved = self.milestones.save(&milestone).await?;

        if saved.is_completed && !was_completed {
            self.notify_reached(caller, &saved, &project).await;
        }
        self.publisher
            .project_event(&project.id, "milestone_updated", json!(saved))
            .await;
        Ok(saved)
    }

    pub async fn delete(&self, caller: &User, id: &MilestoneId) -> Result<(), AppError> {
        let (milestone, project) = self.load_manageable(caller, id).await?;
        self.milestones.delete(&milestone.id).await?;
        self.publisher
            .project_event(&project.id, "milestone_deleted", json!({ "id": milestone.id }))
            .await;
        tracing::info!(milestone_id = %milestone.id, "Milestone deleted");
        Ok(())
    }

    pub async fn add_dependency(
        &self,
        caller: &User,
        id: &MilestoneId,
        prerequisite_id: &MilestoneId,
    ) -> Result<MilestoneDependency, AppError> {
        if id == prerequisite_id {
            return Err(AppError::BadRequest(
                "A milestone cannot depend on itself".to_string(),
            ));
        }
        let (milestone, project) = self.load_manageable(caller, id).await?;
        let prerequisite = self.load(prerequisite_id).await?;
        if prerequisite.project_id != milestone.project_id {
            return Err(AppError::BadRequest(
                "Milestones must belong to the same project".to_string(),
            ));
        }

        let edges = self.milestones.project_dependencies(&project.id).await?;
        if edges
            .iter()
            .any(|e| e.dependent_id == *id && e.prerequisite_id == *prerequisite_id)
        {
            return Err(DomainError::AlreadyExists("Dependency already exists".to_string()).into());
        }
        if creates_milestone_cycle(&edges, *id, *prerequisite_id) {
            return Err(AppError::BadRequest(
                "Circular dependency detected".to_string(),
            ));
        }

        Ok(self.milestones.add_dependency(id, prerequisite_id).await?)
    }

    pub async fn remove_dependency(
        &self,
        caller: &User,
        id: &MilestoneId,
        prerequisite_id: &MilestoneId,
    ) -> Result<(), AppError> {
        self.load_manageable(caller, id).await?;
        self.milestones.remove_dependency(id, prerequisite_id).await?;
        Ok(())
    }

    pub async fn stats(
        &self,
        caller: &User,
        project_id: &ProjectId,
    ) -> Result<MilestoneStats, AppError> {
        let milestones = self.list(caller, project_id, None).await?;
        Ok(MilestoneStats::compute(&milestones, Utc::now().date_naive()))
    }

    async fn load(&self, id: &MilestoneId) -> Result<Milestone, AppError> {
        self.milestones
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Milestone {} not found", id)).into())
    }

    async fn load_manageable(
        &self,
        caller: &User,
        id: &MilestoneId,
    ) -> Result<(Milestone, Project), AppError> {
        let milestone = self.load(id).await?;
        let project =
            ensure_project_access(self.projects.as_ref(), caller, &milestone.project_id).await?;
        ensure_can_manage(caller, &project)?;
        Ok((milestone, project))
    }

    /// Tell the manager and active members, except whoever completed it
    async fn notify_reached(
        &self,
        caller: &User,
        milestone: &Milestone,
        project: &Project,
    ) {
        let members = match self.projects.members(&project.id).await {
            Ok(members) => members,
            Err(e) => {
                tracing::warn!(error = %e, project_id = %project.id, "Failed to load milestone recipients");
                Vec::new()
            }
        };
        let mut recipients: Vec<_> = members
            .into_iter()
            .filter(|m| m.is_active())
            .map(|m| m.user_id)
            .collect();
        recipients.push(project.manager_id);
        recipients.sort_by_key(|id| id.0);
        recipients.dedup();

        for user_id in recipients.into_iter().filter(|id| *id != caller.id) {
            let notification = NewNotification::new(
                user_id,
                NotificationType::MilestoneReached,
                "Milestone reached",
                format!("\"{}\" in {} was completed", milestone.name, project.name),
            )
            .about("milestone", milestone.id.0);
            if let Err(e) = self.notifier.notify(notification).await {
                tracing::warn!(error = %e, milestone_id = %milestone.id, "Failed to send milestone notification");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::UserRole;
    use crate::test_utils::{
        test_milestone, test_project, test_user, test_user_with_role, InMemoryMilestoneRepository,
        InMemoryProjectRepository, RecordingNotifier, RecordingPublisher,
    };
    use chrono::Duration;

    type Service = MilestoneService<InMemoryMilestoneRepository, InMemoryProjectRepository>;

    struct Harness {
        service: Service,
        milestones: Arc<InMemoryMilestoneRepository>,
        notifier: Arc<RecordingNotifier>,
        publisher: Arc<RecordingPublisher>,
    }

    fn harness(milestones: InMemoryMilestoneRepository, projects: InMemoryProjectRepository) -> Harness {
        let milestones = Arc::new(milestones);
        let notifier = Arc::new(RecordingNotifier::new());
        let publisher = Arc::new(RecordingPublisher::new());
        Harness {
            service: MilestoneService::new(
                milestones.clone(),
                Arc::new(projects),
                notifier.clone(),
                publisher.clone(),
            ),
            milestones,
            notifier,
            publisher,
        }
    }

    fn input(project_id: ProjectId) -> CreateMilestone {
        CreateMilestone {
            project_id,
            name: " Beta ".to_string(),
            description: None,
            due_date: Utc::now().date_naive() + Duration::days(30),
            dependency_ids: vec![],
        }
    }

    #[tokio::test]
    async fn create_requires_manager_and_future_date() {
        let manager = test_user_with_role(UserRole::TeamLead);
        let dev = test_user();
        let project = test_project(&manager.id);
        let h = harness(
            InMemoryMilestoneRepository::new(),
            InMemoryProjectRepository::new()
                .with_project(project.clone())
                .with_member(project.id, dev.id),
        );

        assert!(matches!(
            h.service.create(&dev, input(project.id)).await,
            Err(AppError::Forbidden(_))
        ));

        let mut past = input(project.id);
        past.due_date = Utc::now().date_naive() - Duration::days(1);
        assert!(matches!(
            h.service.create(&manager, past).await,
            Err(AppError::BadRequest(_))
        ));

        let created = h.service.create(&manager, input(project.id)).await.unwrap();
        assert_eq!(created.name, "Beta");
        assert_eq!(h.publisher.event_names(), vec!["milestone_created"]);
        assert_eq!(h.service.list(&dev, &project.id, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_links_prerequisites_in_same_project() {
        let manager = test_user_with_role(UserRole::ProjectManager);
        let project = test_project(&manager.id);
        let elsewhere = test_project(&manager.id);
        let alpha = test_milestone(&project.id);
        let foreign = test_milestone(&elsewhere.id);
        let h = harness(
            InMemoryMilestoneRepository::new()
                .with_milestone(alpha.clone())
                .with_milestone(foreign.clone()),
            InMemoryProjectRepository::new()
                .with_project(project.clone())
                .with_project(elsewhere),
        );

        let mut bad = input(project.id);
        bad.dependency_ids = vec![foreign.id];
        assert!(h.service.create(&manager, bad).await.is_err());

        let mut good = input(project.id);
        good.dependency_ids = vec![alpha.id, alpha.id];
        let beta = h.service.create(&manager, good).await.unwrap();

        let detail = h.service.get(&manager, &project.id, &beta.id).await.unwrap();
        assert_eq!(detail.prerequisite_ids, vec![alpha.id]);
        let alpha_detail = h.service.get(&manager, &project.id, &alpha.id).await.unwrap();
        assert_eq!(alpha_detail.dependent_ids, vec![beta.id]);
    }

    #[tokio::test]
    async fn get_hides_milestones_of_other_projects() {
        let manager = test_user_with_role(UserRole::ProjectManager);
        let project = test_project(&manager.id);
        let other = test_project(&manager.id);
        let milestone = test_milestone(&other.id);
        let h = harness(
            InMemoryMilestoneRepository::new().with_milestone(milestone.clone()),
            InMemoryProjectRepository::new()
                .with_project(project.clone())
                .with_project(other),
        );

        assert!(matches!(
            h.service.get(&manager, &project.id, &milestone.id).await,
            Err(AppError::Domain(DomainError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn completing_notifies_team_once() {
        let manager = test_user_with_role(UserRole::ProjectManager);
        let dev = test_user();
        let qa = test_user_with_role(UserRole::Qa);
        let project = test_project(&manager.id);
        let milestone = test_milestone(&project.id);
        let h = harness(
            InMemoryMilestoneRepository::new().with_milestone(milestone.clone()),
            InMemoryProjectRepository::new()
                .with_project(project.clone())
                .with_member(project.id, manager.id)
                .with_member(project.id, dev.id)
                .with_member(project.id, qa.id),
        );

        let complete = || MilestoneUpdate {
            is_completed: Some(true),
            ..Default::default()
        };
        let done = h.service.update(&manager, &milestone.id, complete()).await.unwrap();
        assert!(done.is_completed);
        assert!(done.completed_at.is_some());

        let mut recipients = h.notifier.recipients();
        recipients.sort_by_key(|id| id.0);
        let mut expected = vec![dev.id, qa.id];
        expected.sort_by_key(|id| id.0);
        assert_eq!(recipients, expected);
        assert!(h
            .notifier
            .sent()
            .iter()
            .all(|n| n.notification_type == NotificationType::MilestoneReached));

        // already complete: no second round
        h.service.update(&manager, &milestone.id, complete()).await.unwrap();
        assert_eq!(h.notifier.sent().len(), 2);

        assert!(matches!(
            h.service.update(&dev, &milestone.id, complete()).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn dependencies_reject_cycles_duplicates_and_foreign_projects() {
        let manager = test_user_with_role(UserRole::ProjectManager);
        let project = test_project(&manager.id);
        let other = test_project(&manager.id);
        let a = test_milestone(&project.id);
        let b = test_milestone(&project.id);
        let foreign = test_milestone(&other.id);
        let h = harness(
            InMemoryMilestoneRepository::new()
                .with_milestone(a.clone())
                .with_milestone(b.clone())
                .with_milestone(foreign.clone()),
            InMemoryProjectRepository::new()
                .with_project(project.clone())
                .with_project(other),
        );

        h.service.add_dependency(&manager, &a.id, &b.id).await.unwrap();
        assert!(matches!(
            h.service.add_dependency(&manager, &a.id, &b.id).await,
            Err(AppError::Domain(DomainError::AlreadyExists(_)))
        ));
        assert!(matches!(
            h.service.add_dependency(&manager, &b.id, &a.id).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(h.service.add_dependency(&manager, &a.id, &a.id).await.is_err());
        assert!(h.service.add_dependency(&manager, &a.id, &foreign.id).await.is_err());

        h.service.remove_dependency(&manager, &a.id, &b.id).await.unwrap();
        h.service.add_dependency(&manager, &b.id, &a.id).await.unwrap();
    }

    #[tokio::test]
    async fn delete_drops_edges_and_stats_count_overdue() {
        let manager = test_user_with_role(UserRole::ProjectManager);
        let project = test_project(&manager.id);
        let a = test_milestone(&project.id);
        let mut late = test_milestone(&project.id);
        late.due_date = Utc::now().date_naive() - Duration::days(2);
        let h = harness(
            InMemoryMilestoneRepository::new()
                .with_milestone(a.clone())
                .with_milestone(late.clone()),
            InMemoryProjectRepository::new().with_project(project.clone()),
        );
        h.service.add_dependency(&manager, &a.id, &late.id).await.unwrap();

        let stats = h.service.stats(&manager, &project.id).await.unwrap();
        assert_eq!(stats.total_milestones, 2);
        assert_eq!(stats.overdue_milestones, 1);
        assert_eq!(stats.upcoming_milestones, 1);

        h.service.delete(&manager, &late.id).await.unwrap();
        assert!(h.milestones.get(&late.id).is_none());
        let detail = h.service.get(&manager, &project.id, &a.id).await.unwrap();
        assert!(detail.prerequisite_ids.is_empty());
    }
}

//! Project service
//!
//! Project lifecycle and team membership.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;

use super::access::{ensure_can_manage, ensure_project_access, load_project};
use crate::domain::entities::{
    validate_project_fields, NewProject, Page, PageRequest, Project, ProjectFilter, ProjectId,
    ProjectUpdate, TeamMember, User, UserId, DEFAULT_MEMBER_ROLE, MANAGER_MEMBER_ROLE,
};
use crate::domain::ports::{ProjectRepository, RealtimePublisher, UserRepository};
use crate::error::{AppError, DomainError};

/// Input for creating a project
#[derive(Debug, Clone)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<f64>,
    pub manager_id: Option<UserId>,
    pub team_member_ids: Vec<UserId>,
}

/// Service for projects and their teams
pub struct ProjectService<PR, UR>
where
    PR: ProjectRepository,
    UR: UserRepository,
{
    projects: Arc<PR>,
    users: Arc<UR>,
    publisher: Arc<dyn RealtimePublisher>,
}

impl<PR, UR> ProjectService<PR, UR>
where
    PR: ProjectRepository,
    UR: UserRepository,
{
    pub fn new(projects: Arc<PR>, users: Arc<UR>, publisher: Arc<dyn RealtimePublisher>) -> Self {
        Self {
            projects,
            users,
            publisher,
        }
    }

    /// Create a project (admins only)
    ///
    /// The manager joins the team as "Project Manager"; the initial members
    /// join as "Team Member". Repeated member ids are ignored.
    pub async fn create(&self, caller: &User, input: CreateProject) -> Result<Project, AppError> {
        if !caller.is_admin() {
            return Err(AppError::forbidden(
                "Only project managers and executives can create projects",
            ));
        }

        let budget = input.budget.unwrap_or(0.0);
        validate_project_fields(&input.name, input.start_date, input.end_date, budget, 0.0)
            .map_err(AppError::BadRequest)?;

        let manager_id = input.manager_id.unwrap_or(caller.id);
        self.require_user(&manager_id, "Manager").await?;

        let mut seen = HashSet::from([manager_id]);
        let member_ids: Vec<UserId> = input
            .team_member_ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect();
        if !member_ids.is_empty() {
            let found: HashSet<UserId> = self
                .users
                .find_by_ids(&member_ids)
                .await?
                .into_iter()
                .map(|u| u.id)
                .collect();
            let missing: Vec<String> = member_ids
                .iter()
                .filter(|id| !found.contains(id))
                .map(|id| id.to_string())
                .collect();
            if !missing.is_empty() {
                return Err(AppError::BadRequest(format!(
                    "Team members not found: {}",
                    missing.join(", ")
                )));
            }
        }

        let project = self
            .projects
            .create(&NewProject {
                name: input.name.trim().to_string(),
                description: input.description,
                start_date: input.start_date,
                end_date: input.end_date,
                budget,
                manager_id,
            })
            .await?;

        self.projects
            .add_member(&project.id, &manager_id, MANAGER_MEMBER_ROLE)
            .await?;
        for member_id in &member_ids {
            self.projects
                .add_member(&project.id, member_id, DEFAULT_MEMBER_ROLE)
                .await?;
        }

        tracing::info!(project_id = %project.id, manager_id = %manager_id, members = member_ids.len(), "Project created");
        Ok(project)
    }

    /// List visible projects
    ///
    /// Non-admins only see projects they belong to. `my_projects` applies the
    /// same restriction to admins.
    pub async fn list(
        &self,
        caller: &User,
        filter: &ProjectFilter,
        my_projects: bool,
        page: PageRequest,
    ) -> Result<Page<Project>, AppError> {
        let mut filter = filter.clone();
        if my_projects || !caller.is_admin() {
            filter.member_id = Some(caller.id);
        }
        Ok(self.projects.list(&filter, page).await?)
    }

    pub async fn get(&self, caller: &User, id: &ProjectId) -> Result<Project, AppError> {
        ensure_project_access(self.projects.as_ref(), caller, id).await
    }

    /// Apply a partial update. Returns the project before and after.
    pub async fn update(
        &self,
        caller: &User,
        id: &ProjectId,
        update: ProjectUpdate,
    ) -> Result<(Project, Project), AppError> {
        let before = load_project(self.projects.as_ref(), id).await?;
        ensure_can_manage(caller, &before)?;

        if let Some(manager_id) = update.manager_id {
            self.require_user(&manager_id, "Manager").await?;
        }

        let updated = update.apply_to(&before);
        validate_project_fields(
            &updated.name,
            updated.start_date,
            updated.end_date,
            updated.budget,
            updated.actual_cost,
        )
        .map_err(AppError::BadRequest)?;

        let saved = self.projects.save(&updated).await?;

        if saved.manager_id != before.manager_id {
            self.projects
                .add_member(&saved.id, &saved.manager_id, MANAGER_MEMBER_ROLE)
                .await?;
        }

        if saved.status != before.status && saved.status.is_closed() {
            self.publisher
                .project_event(
                    &saved.id,
                    "project_status_changed",
                    json!({
                        "status": saved.status,
                        "previous_status": before.status,
                        "updated_by": caller.id,
                    }),
                )
                .await;
        }

        Ok((before, saved))
    }

    /// Delete a project with its tasks and memberships
    pub async fn delete(&self, caller: &User, id: &ProjectId) -> Result<Project, AppError> {
        let project = load_project(self.projects.as_ref(), id).await?;
        ensure_can_manage(caller, &project)?;

        self.projects.delete(id).await?;
        self.publisher
            .project_event(id, "project_deleted", json!({ "deleted_by": caller.id }))
            .await;
        tracing::info!(project_id = %id, "Project deleted");
        Ok(project)
    }

    /// Active team members
    pub async fn members(&self, caller: &User, id: &ProjectId) -> Result<Vec<TeamMember>, AppError> {
        ensure_project_access(self.projects.as_ref(), caller, id).await?;
        let members = self.projects.members(id).await?;
        Ok(members.into_iter().filter(|m| m.is_active()).collect())
    }

    pub async fn add_member(
        &self,
        caller: &User,
        id: &ProjectId,
        user_id: &UserId,
        role: Option<String>,
    ) -> Result<TeamMember, AppError> {
        let project = load_project(self.projects.as_ref(), id).await?;
        ensure_can_manage(caller, &project)?;
        self.require_user(user_id, "User").await?;

        let role = role
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_MEMBER_ROLE.to_string());
        if role.chars().count() > 100 {
            return Err(AppError::BadRequest(
                "Role must be at most 100 characters".to_string(),
            ));
        }

        if let Some(existing) = self.projects.find_member(id, user_id).await? {
            if existing.is_active() {
                return Err(DomainError::AlreadyExists(
                    "User is already a member of this project".to_string(),
                )
                .into());
            }
        }

        let member = self.projects.add_member(id, user_id, &role).await?;
        self.publisher
            .project_event(id, "member_added", json!({ "user_id": user_id, "role": role }))
            .await;
        Ok(member)
    }

    pub async fn remove_member(
        &self,
        caller: &User,
        id: &ProjectId,
        user_id: &UserId,
    ) -> Result<(), AppError> {
        let project = load_project(self.projects.as_ref(), id).await?;
        ensure_can_manage(caller, &project)?;
        if project.manager_id == *user_id {
            return Err(AppError::BadRequest(
                "Cannot remove the project manager from the team".to_string(),
            ));
        }

        self.projects.remove_member(id, user_id).await?;
        self.publisher
            .project_event(id, "member_removed", json!({ "user_id": user_id }))
            .await;
        Ok(())
    }

    async fn require_user(&self, id: &UserId, label: &str) -> Result<User, AppError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("{} {} not found", label, id)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{ProjectStatus, UserRole};
    use crate::test_utils::{
        test_project, test_user, test_user_with_role, InMemoryProjectRepository,
        InMemoryUserRepository, RecordingPublisher,
    };

    struct Harness {
        service: ProjectService<InMemoryProjectRepository, InMemoryUserRepository>,
        projects: Arc<InMemoryProjectRepository>,
        publisher: Arc<RecordingPublisher>,
    }

    fn harness(projects: InMemoryProjectRepository, users: InMemoryUserRepository) -> Harness {
        let projects = Arc::new(projects);
        let publisher = Arc::new(RecordingPublisher::new());
        Harness {
            service: ProjectService::new(projects.clone(), Arc::new(users), publisher.clone()),
            projects,
            publisher,
        }
    }

    fn create_input(members: Vec<UserId>) -> CreateProject {
        CreateProject {
            name: "  Mobile app ".to_string(),
            description: None,
            start_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 8, 1),
            budget: Some(25_000.0),
            manager_id: None,
            team_member_ids: members,
        }
    }

    #[tokio::test]
    async fn create_adds_manager_and_members_once() {
        let admin = test_user_with_role(UserRole::ProjectManager);
        let dev = test_user();
        let h = harness(
            InMemoryProjectRepository::new(),
            InMemoryUserRepository::new()
                .with_user(admin.clone())
                .with_user(dev.clone()),
        );

        let project = h
            .service
            .create(&admin, create_input(vec![dev.id, dev.id, admin.id]))
            .await
            .unwrap();

        assert_eq!(project.name, "Mobile app");
        assert_eq!(project.status, ProjectStatus::Draft);
        assert_eq!(project.manager_id, admin.id);

        let members = h.projects.members(&project.id).await.unwrap();
        assert_eq!(members.len(), 2);
        let manager = members.iter().find(|m| m.user_id == admin.id).unwrap();
        assert_eq!(manager.role, MANAGER_MEMBER_ROLE);
    }

    #[tokio::test]
    async fn create_is_admin_only() {
        let lead = test_user_with_role(UserRole::TeamLead);
        let h = harness(
            InMemoryProjectRepository::new(),
            InMemoryUserRepository::new().with_user(lead.clone()),
        );

        let err = h.service.create(&lead, create_input(vec![])).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn create_rejects_unknown_members_and_bad_dates() {
        let admin = test_user_with_role(UserRole::Executive);
        let h = harness(
            InMemoryProjectRepository::new(),
            InMemoryUserRepository::new().with_user(admin.clone()),
        );

        let err = h
            .service
            .create(&admin, create_input(vec![UserId::new()]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let mut input = create_input(vec![]);
        input.end_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        assert!(h.service.create(&admin, input).await.is_err());
    }

    #[tokio::test]
    async fn list_scopes_non_admins_to_membership() {
        let dev = test_user();
        let mine = test_project(&test_user().id);
        let other = test_project(&test_user().id);
        let h = harness(
            InMemoryProjectRepository::new()
                .with_project(mine.clone())
                .with_project(other)
                .with_member(mine.id, dev.id),
            InMemoryUserRepository::new(),
        );

        let page = h
            .service
            .list(&dev, &ProjectFilter::default(), false, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, mine.id);

        let admin = test_user_with_role(UserRole::Executive);
        let page = h
            .service
            .list(&admin, &ProjectFilter::default(), false, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn closing_a_project_is_broadcast() {
        let manager = test_user_with_role(UserRole::TeamLead);
        let project = test_project(&manager.id);
        let h = harness(
            InMemoryProjectRepository::new().with_project(project.clone()),
            InMemoryUserRepository::new().with_user(manager.clone()),
        );

        let update = ProjectUpdate {
            status: Some(ProjectStatus::Completed),
            ..Default::default()
        };
        let (before, after) = h.service.update(&manager, &project.id, update).await.unwrap();

        assert_eq!(before.status, ProjectStatus::Active);
        assert_eq!(after.status, ProjectStatus::Completed);
        assert_eq!(h.publisher.event_names(), vec!["project_status_changed"]);
    }

    #[tokio::test]
    async fn update_requires_manage_permission() {
        let member = test_user();
        let project = test_project(&test_user().id);
        let h = harness(
            InMemoryProjectRepository::new()
                .with_project(project.clone())
                .with_member(project.id, member.id),
            InMemoryUserRepository::new(),
        );

        let err = h
            .service
            .update(&member, &project.id, ProjectUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn member_management() {
        let manager = test_user();
        let dev = test_user();
        let project = test_project(&manager.id);
        let h = harness(
            InMemoryProjectRepository::new().with_project(project.clone()),
            InMemoryUserRepository::new()
                .with_user(manager.clone())
                .with_user(dev.clone()),
        );

        h.service
            .add_member(&manager, &project.id, &dev.id, None)
            .await
            .unwrap();
        let dup = h
            .service
            .add_member(&manager, &project.id, &dev.id, None)
            .await
            .unwrap_err();
        assert!(matches!(dup, AppError::Domain(DomainError::AlreadyExists(_))));

        h.service
            .remove_member(&manager, &project.id, &dev.id)
            .await
            .unwrap();
        assert_eq!(h.service.members(&manager, &project.id).await.unwrap().len(), 1);

        // re-adding reactivates
        let member = h
            .service
            .add_member(&manager, &project.id, &dev.id, Some("QA".to_string()))
            .await
            .unwrap();
        assert!(member.is_active());
        assert_eq!(member.role, "QA");

        let err = h
            .service
            .remove_member(&manager, &project.id, &manager.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn delete_removes_project() {
        let admin = test_user_with_role(UserRole::ProjectManager);
        let project = test_project(&test_user().id);
        let h = harness(
            InMemoryProjectRepository::new().with_project(project.clone()),
            InMemoryUserRepository::new(),
        );

        h.service.delete(&admin, &project.id).await.unwrap();
        assert!(h.projects.get(&project.id).is_none());
    }
}

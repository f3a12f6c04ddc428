//! Mock implementations of port traits
//!
//! These are in-memory implementations that can be configured for testing.
//! They store data in memory and allow tests to verify behavior.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::domain::entities::{
    AuditFilter, AuditLog, AuditLogId, Comment, CommentEntityType, CommentId, DependencyType,
    DEFAULT_MEMBER_ROLE, MANAGER_MEMBER_ROLE,
    FileFilter, FileId, FilePermission, FileVersion, FileVersionId, Milestone,
    MilestoneDependency, MilestoneId, NewAuditLog, NewComment, NewFilePermission, NewFileVersion,
    NewMilestone, NewNotification, NewProject, NewStoredFile, NewTask, NewTimeEntry, NewUser,
    Notification, NotificationId, NotificationPreference, NotificationType, Page, PageRequest,
    PreferenceSettings, ProfileUpdate, Project, ProjectFilter, ProjectId, ProjectStatus,
    StoredFile, Task, TaskDependency, TaskFilter, TaskId, TaskStatus, TeamMember, TimeEntry,
    TimeEntryFilter, TimeEntryId, User, UserFilter, UserId, UserRole,
};
use crate::domain::ports::{
    AuditLogRepository, CommentRepository, ContentStream, FileRepository, FileStorage,
    MilestoneRepository,
    NotificationPreferenceRepository, NotificationRepository, Notifier, ProjectRepository,
    RealtimePublisher, TaskRepository, TimeEntryRepository, UserRepository,
};
use crate::error::{DomainError, StorageError};

// ============================================================================
// In-Memory User Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<UserId, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with a user for testing
    pub fn with_user(self, user: User) -> Self {
        self.users.write().unwrap().insert(user.id, user);
        self
    }

    pub fn get(&self, id: &UserId) -> Option<User> {
        self.users.read().unwrap().get(id).cloned()
    }

    fn modify(&self, id: &UserId, f: impl FnOnce(&mut User)) -> Result<User, DomainError> {
        let mut users = self.users.write().unwrap();
        let user = users
            .get_mut(id)
            .ok_or_else(|| DomainError::NotFound(format!("User {} not found", id)))?;
        f(user);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        Ok(self.get(id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        let email = email.to_lowercase();
        let users = self.users.read().unwrap();
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, DomainError> {
        let users = self.users.read().unwrap();
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn list(
        &self,
        filter: &UserFilter,
        page: PageRequest,
    ) -> Result<Page<User>, DomainError> {
        let users = self.users.read().unwrap();
        let mut matched: Vec<User> = users.values().filter(|u| filter.matches(u)).cloned().collect();
        matched.sort_by(|a, b| (&a.last_name, &a.first_name).cmp(&(&b.last_name, &b.first_name)));
        Ok(Page::from_vec(matched, page))
    }

    async fn create(&self, user: &NewUser) -> Result<User, DomainError> {
        let email = user.email.to_lowercase();
        let mut users = self.users.write().unwrap();
        if users.values().any(|u| u.email == email) {
            return Err(DomainError::AlreadyExists(format!(
                "Email {} is already registered",
                email
            )));
        }

        let created = User {
            id: UserId::new(),
            email,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            password_hash: user.password_hash.clone(),
            role: user.role,
            hourly_rate: user.hourly_rate,
            avatar_url: None,
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_profile(
        &self,
        id: &UserId,
        update: &ProfileUpdate,
    ) -> Result<User, DomainError> {
        self.modify(id, |u| {
            if let Some(first) = &update.first_name {
                u.first_name = first.clone();
            }
            if let Some(last) = &update.last_name {
                u.last_name = last.clone();
            }
            if let Some(avatar) = &update.avatar_url {
                u.avatar_url = Some(avatar.clone());
            }
        })
    }

    async fn update_role(&self, id: &UserId, role: UserRole) -> Result<User, DomainError> {
        self.modify(id, |u| u.role = role)
    }

    async fn set_active(&self, id: &UserId, active: bool) -> Result<User, DomainError> {
        self.modify(id, |u| u.is_active = active)
    }

    async fn update_password(&self, id: &UserId, password_hash: &str) -> Result<(), DomainError> {
        self.modify(id, |u| u.password_hash = password_hash.to_string())?;
        Ok(())
    }

    async fn touch_last_login(&self, id: &UserId) -> Result<(), DomainError> {
        self.modify(id, |u| u.last_login_at = Some(Utc::now()))?;
        Ok(())
    }
}

// ============================================================================
// In-Memory Project Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryProjectRepository {
    projects: Arc<RwLock<HashMap<ProjectId, Project>>>,
    members: Arc<RwLock<Vec<TeamMember>>>,
}

impl InMemoryProjectRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with a project; its manager becomes an active member
    pub fn with_project(self, project: Project) -> Self {
        self.members.write().unwrap().push(TeamMember {
            project_id: project.id,
            user_id: project.manager_id,
            role: MANAGER_MEMBER_ROLE.to_string(),
            joined_at: Utc::now(),
            left_at: None,
        });
        self.projects.write().unwrap().insert(project.id, project);
        self
    }

    /// Pre-populate with an active membership
    pub fn with_member(self, project_id: ProjectId, user_id: UserId) -> Self {
        self.members.write().unwrap().push(TeamMember {
            project_id,
            user_id,
            role: DEFAULT_MEMBER_ROLE.to_string(),
            joined_at: Utc::now(),
            left_at: None,
        });
        self
    }

    pub fn get(&self, id: &ProjectId) -> Option<Project> {
        self.projects.read().unwrap().get(id).cloned()
    }

    fn member_project_ids(&self, user_id: &UserId) -> Vec<ProjectId> {
        self.members
            .read()
            .unwrap()
            .iter()
            .filter(|m| m.user_id == *user_id && m.is_active())
            .map(|m| m.project_id)
            .collect()
    }

    fn matching(&self, filter: &ProjectFilter) -> Vec<Project> {
        let allowed = filter.member_id.map(|m| self.member_project_ids(&m));
        let projects = self.projects.read().unwrap();
        let mut matched: Vec<Project> = projects
            .values()
            .filter(|p| filter.matches(p))
            .filter(|p| allowed.as_ref().map_or(true, |ids| ids.contains(&p.id)))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched
    }
}

#[async_trait]
impl ProjectRepository for InMemoryProjectRepository {
    async fn find_by_id(&self, id: &ProjectId) -> Result<Option<Project>, DomainError> {
        Ok(self.get(id))
    }

    async fn list(
        &self,
        filter: &ProjectFilter,
        page: PageRequest,
    ) -> Result<Page<Project>, DomainError> {
        Ok(Page::from_vec(self.matching(filter), page))
    }

    async fn find_all(&self, filter: &ProjectFilter) -> Result<Vec<Project>, DomainError> {
        Ok(self.matching(filter))
    }

    async fn create(&self, project: &NewProject) -> Result<Project, DomainError> {
        let created = Project {
            id: ProjectId::new(),
            name: project.name.clone(),
            description: project.description.clone(),
            start_date: project.start_date,
            end_date: project.end_date,
            budget: project.budget,
            actual_cost: 0.0,
            status: ProjectStatus::Draft,
            manager_id: project.manager_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.projects
            .write()
            .unwrap()
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn save(&self, project: &Project) -> Result<Project, DomainError> {
        let mut projects = self.projects.write().unwrap();
        if !projects.contains_key(&project.id) {
            return Err(DomainError::NotFound(format!("Project {} not found", project.id)));
        }
        let mut saved = project.clone();
        saved.updated_at = Utc::now();
        projects.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn delete(&self, id: &ProjectId) -> Result<(), DomainError> {
        self.projects
            .write()
            .unwrap()
            .remove(id)
            .ok_or_else(|| DomainError::NotFound(format!("Project {} not found", id)))?;
        self.members.write().unwrap().retain(|m| m.project_id != *id);
        Ok(())
    }

    async fn members(&self, id: &ProjectId) -> Result<Vec<TeamMember>, DomainError> {
        Ok(self
            .members
            .read()
            .unwrap()
            .iter()
            .filter(|m| m.project_id == *id)
            .cloned()
            .collect())
    }

    async fn find_member(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
    ) -> Result<Option<TeamMember>, DomainError> {
        Ok(self
            .members
            .read()
            .unwrap()
            .iter()
            .find(|m| m.project_id == *project_id && m.user_id == *user_id)
            .cloned())
    }

    async fn add_member(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
        role: &str,
    ) -> Result<TeamMember, DomainError> {
        let mut members = self.members.write().unwrap();
        if let Some(existing) = members
            .iter_mut()
            .find(|m| m.project_id == *project_id && m.user_id == *user_id)
        {
            existing.role = role.to_string();
            existing.left_at = None;
            existing.joined_at = Utc::now();
            return Ok(existing.clone());
        }

        let member = TeamMember {
            project_id: *project_id,
            user_id: *user_id,
            role: role.to_string(),
            joined_at: Utc::now(),
            left_at: None,
        };
        members.push(member.clone());
        Ok(member)
    }

    async fn remove_member(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
    ) -> Result<(), DomainError> {
        let mut members = self.members.write().unwrap();
        let member = members
            .iter_mut()
            .find(|m| m.project_id == *project_id && m.user_id == *user_id && m.is_active())
            .ok_or_else(|| {
                DomainError::NotFound(format!("Member not found in project {}", project_id))
            })?;
        member.left_at = Some(Utc::now());
        Ok(())
    }

    async fn project_ids_for_member(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ProjectId>, DomainError> {
        Ok(self.member_project_ids(user_id))
    }
}

// ============================================================================
// In-Memory Task Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: Arc<RwLock<HashMap<TaskId, Task>>>,
    dependencies: Arc<RwLock<Vec<TaskDependency>>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with a task for testing
    pub fn with_task(self, task: Task) -> Self {
        self.tasks.write().unwrap().insert(task.id, task);
        self
    }

    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.tasks.read().unwrap().get(id).cloned()
    }

    fn matching(&self, filter: &TaskFilter) -> Vec<Task> {
        let tasks = self.tasks.read().unwrap();
        let mut matched: Vec<Task> = tasks.values().filter(|t| filter.matches(t)).cloned().collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>, DomainError> {
        Ok(self.get(id))
    }

    async fn find_by_ids(&self, ids: &[TaskId]) -> Result<Vec<Task>, DomainError> {
        let tasks = self.tasks.read().unwrap();
        Ok(ids.iter().filter_map(|id| tasks.get(id).cloned()).collect())
    }

    async fn list(
        &self,
        filter: &TaskFilter,
        page: PageRequest,
    ) -> Result<Page<Task>, DomainError> {
        Ok(Page::from_vec(self.matching(filter), page))
    }

    async fn find_all(&self, filter: &TaskFilter) -> Result<Vec<Task>, DomainError> {
        Ok(self.matching(filter))
    }

    async fn create(&self, task: &NewTask) -> Result<Task, DomainError> {
        let created = Task {
            id: TaskId::new(),
            project_id: task.project_id,
            title: task.title.clone(),
            description: task.description.clone(),
            assignee_id: task.assignee_id,
            status: TaskStatus::Todo,
            priority: task.priority,
            estimated_hours: task.estimated_hours,
            actual_hours: 0.0,
            due_date: task.due_date,
            started_at: None,
            completed_at: None,
            created_by: task.created_by,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.tasks.write().unwrap().insert(created.id, created.clone());
        Ok(created)
    }

    async fn save(&self, task: &Task) -> Result<Task, DomainError> {
        let mut tasks = self.tasks.write().unwrap();
        if !tasks.contains_key(&task.id) {
            return Err(DomainError::NotFound(format!("Task {} not found", task.id)));
        }
        let mut saved = task.clone();
        saved.updated_at = Utc::now();
        tasks.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn delete(&self, id: &TaskId) -> Result<(), DomainError> {
        self.tasks
            .write()
            .unwrap()
            .remove(id)
            .ok_or_else(|| DomainError::NotFound(format!("Task {} not found", id)))?;
        self.dependencies
            .write()
            .unwrap()
            .retain(|d| d.task_id != *id && d.depends_on_id != *id);
        Ok(())
    }

    async fn set_actual_hours(&self, id: &TaskId, hours: f64) -> Result<(), DomainError> {
        let mut tasks = self.tasks.write().unwrap();
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| DomainError::NotFound(format!("Task {} not found", id)))?;
        task.actual_hours = hours;
        Ok(())
    }

    async fn dependencies(&self, id: &TaskId) -> Result<Vec<TaskDependency>, DomainError> {
        Ok(self
            .dependencies
            .read()
            .unwrap()
            .iter()
            .filter(|d| d.task_id == *id)
            .cloned()
            .collect())
    }

    async fn project_dependencies(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<TaskDependency>, DomainError> {
        let tasks = self.tasks.read().unwrap();
        Ok(self
            .dependencies
            .read()
            .unwrap()
            .iter()
            .filter(|d| {
                tasks
                    .get(&d.task_id)
                    .is_some_and(|t| t.project_id == *project_id)
            })
            .cloned()
            .collect())
    }

    async fn add_dependency(
        &self,
        task_id: &TaskId,
        depends_on_id: &TaskId,
        dependency_type: DependencyType,
    ) -> Result<TaskDependency, DomainError> {
        let mut deps = self.dependencies.write().unwrap();
        if deps
            .iter()
            .any(|d| d.task_id == *task_id && d.depends_on_id == *depends_on_id)
        {
            return Err(DomainError::AlreadyExists("Dependency already exists".to_string()));
        }
        let dep = TaskDependency {
            task_id: *task_id,
            depends_on_id: *depends_on_id,
            dependency_type,
            created_at: Utc::now(),
        };
        deps.push(dep.clone());
        Ok(dep)
    }

    async fn remove_dependency(
        &self,
        task_id: &TaskId,
        depends_on_id: &TaskId,
    ) -> Result<(), DomainError> {
        let mut deps = self.dependencies.write().unwrap();
        let before = deps.len();
        deps.retain(|d| !(d.task_id == *task_id && d.depends_on_id == *depends_on_id));
        if deps.len() == before {
            return Err(DomainError::NotFound("Dependency not found".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// In-Memory Milestone Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryMilestoneRepository {
    milestones: Arc<RwLock<HashMap<MilestoneId, Milestone>>>,
    dependencies: Arc<RwLock<Vec<MilestoneDependency>>>,
}

impl InMemoryMilestoneRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with a milestone for testing
    pub fn with_milestone(self, milestone: Milestone) -> Self {
        self.milestones
            .write()
            .unwrap()
            .insert(milestone.id, milestone);
        self
    }

    pub fn get(&self, id: &MilestoneId) -> Option<Milestone> {
        self.milestones.read().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl MilestoneRepository for InMemoryMilestoneRepository {
    async fn find_by_id(&self, id: &MilestoneId) -> Result<Option<Milestone>, DomainError> {
        Ok(self.get(id))
    }

    async fn list_for_project(
        &self,
        project_id: &ProjectId,
        is_completed: Option<bool>,
    ) -> Result<Vec<Milestone>, DomainError> {
        let milestones = self.milestones.read().unwrap();
        let mut matched: Vec<Milestone> = milestones
            .values()
            .filter(|m| m.project_id == *project_id)
            .filter(|m| is_completed.map_or(true, |c| m.is_completed == c))
            .cloned()
            .collect();
        matched.sort_by_key(|m| m.due_date);
        Ok(matched)
    }

    async fn create(&self, milestone: &NewMilestone) -> Result<Milestone, DomainError> {
        let created = Milestone {
            id: MilestoneId::new(),
            project_id: milestone.project_id,
            name: milestone.name.clone(),
            description: milestone.description.clone(),
            due_date: milestone.due_date,
            is_completed: false,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.milestones
            .write()
            .unwrap()
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn save(&self, milestone: &Milestone) -> Result<Milestone, DomainError> {
        let mut milestones = self.milestones.write().unwrap();
        if !milestones.contains_key(&milestone.id) {
            return Err(DomainError::NotFound(format!(
                "Milestone {} not found",
                milestone.id
            )));
        }
        let mut saved = milestone.clone();
        saved.updated_at = Utc::now();
        milestones.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn delete(&self, id: &MilestoneId) -> Result<(), DomainError> {
        self.milestones
            .write()
            .unwrap()
            .remove(id)
            .ok_or_else(|| DomainError::NotFound(format!("Milestone {} not found", id)))?;
        self.dependencies
            .write()
            .unwrap()
            .retain(|d| d.dependent_id != *id && d.prerequisite_id != *id);
        Ok(())
    }

    async fn project_dependencies(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<MilestoneDependency>, DomainError> {
        let milestones = self.milestones.read().unwrap();
        Ok(self
            .dependencies
            .read()
            .unwrap()
            .iter()
            .filter(|d| {
                milestones
                    .get(&d.dependent_id)
                    .is_some_and(|m| m.project_id == *project_id)
            })
            .cloned()
            .collect())
    }

    async fn add_dependency(
        &self,
        dependent_id: &MilestoneId,
        prerequisite_id: &MilestoneId,
    ) -> Result<MilestoneDependency, DomainError> {
        let mut deps = self.dependencies.write().unwrap();
        if deps
            .iter()
            .any(|d| d.dependent_id == *dependent_id && d.prerequisite_id == *prerequisite_id)
        {
            return Err(DomainError::AlreadyExists("Dependency already exists".to_string()));
        }
        let dep = MilestoneDependency {
            dependent_id: *dependent_id,
            prerequisite_id: *prerequisite_id,
            created_at: Utc::now(),
        };
        deps.push(dep.clone());
        Ok(dep)
    }

    async fn remove_dependency(
        &self,
        dependent_id: &MilestoneId,
        prerequisite_id: &MilestoneId,
    ) -> Result<(), DomainError> {
        let mut deps = self.dependencies.write().unwrap();
        let before = deps.len();
        deps.retain(|d| !(d.dependent_id == *dependent_id && d.prerequisite_id == *prerequisite_id));
        if deps.len() == before {
            return Err(DomainError::NotFound("Dependency not found".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// In-Memory Time Entry Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryTimeEntryRepository {
    entries: Arc<RwLock<HashMap<TimeEntryId, TimeEntry>>>,
}

impl InMemoryTimeEntryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with an entry for testing
    pub fn with_entry(self, entry: TimeEntry) -> Self {
        self.entries.write().unwrap().insert(entry.id, entry);
        self
    }

    pub fn get(&self, id: &TimeEntryId) -> Option<TimeEntry> {
        self.entries.read().unwrap().get(id).cloned()
    }

    fn matching(&self, filter: &TimeEntryFilter) -> Vec<TimeEntry> {
        let entries = self.entries.read().unwrap();
        let mut matched: Vec<TimeEntry> =
            entries.values().filter(|e| filter.matches(e)).cloned().collect();
        matched.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        matched
    }
}

#[async_trait]
impl TimeEntryRepository for InMemoryTimeEntryRepository {
    async fn find_by_id(&self, id: &TimeEntryId) -> Result<Option<TimeEntry>, DomainError> {
        Ok(self.get(id))
    }

    async fn list(
        &self,
        filter: &TimeEntryFilter,
        page: PageRequest,
    ) -> Result<Page<TimeEntry>, DomainError> {
        Ok(Page::from_vec(self.matching(filter), page))
    }

    async fn find_all(&self, filter: &TimeEntryFilter) -> Result<Vec<TimeEntry>, DomainError> {
        Ok(self.matching(filter))
    }

    async fn find_duplicate(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
        task_id: Option<&TaskId>,
        date: NaiveDate,
    ) -> Result<Option<TimeEntry>, DomainError> {
        let entries = self.entries.read().unwrap();
        Ok(entries
            .values()
            .find(|e| {
                e.user_id == *user_id
                    && e.project_id == *project_id
                    && e.task_id.as_ref() == task_id
                    && e.date == date
            })
            .cloned())
    }

    async fn create(&self, entry: &NewTimeEntry) -> Result<TimeEntry, DomainError> {
        let created = TimeEntry {
            id: TimeEntryId::new(),
            user_id: entry.user_id,
            project_id: entry.project_id,
            task_id: entry.task_id,
            hours: entry.hours,
            date: entry.date,
            category: entry.category,
            notes: entry.notes.clone(),
            is_approved: false,
            approved_by: None,
            approved_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.entries
            .write()
            .unwrap()
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn save(&self, entry: &TimeEntry) -> Result<TimeEntry, DomainError> {
        let mut entries = self.entries.write().unwrap();
        if !entries.contains_key(&entry.id) {
            return Err(DomainError::NotFound(format!("Time entry {} not found", entry.id)));
        }
        let mut saved = entry.clone();
        saved.updated_at = Utc::now();
        entries.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn delete(&self, id: &TimeEntryId) -> Result<(), DomainError> {
        self.entries
            .write()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| DomainError::NotFound(format!("Time entry {} not found", id)))
    }

    async fn total_hours_for_task(&self, task_id: &TaskId) -> Result<f64, DomainError> {
        Ok(self
            .entries
            .read()
            .unwrap()
            .values()
            .filter(|e| e.task_id == Some(*task_id))
            .map(|e| e.hours)
            .sum())
    }
}

// ============================================================================
// In-Memory File Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryFileRepository {
    files: Arc<RwLock<HashMap<FileId, StoredFile>>>,
    versions: Arc<RwLock<Vec<FileVersion>>>,
    permissions: Arc<RwLock<Vec<FilePermission>>>,
}

impl InMemoryFileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with a file and a matching current 1.0 version
    pub fn with_file(self, file: StoredFile) -> Self {
        self.versions.write().unwrap().push(FileVersion {
            id: FileVersionId::new(),
            file_id: file.id,
            version_number: "1.0".to_string(),
            storage_path: file.storage_path.clone(),
            file_size: file.file_size,
            mime_type: file.mime_type.clone(),
            change_description: None,
            created_by: file.uploaded_by,
            is_current: true,
            created_at: file.created_at,
        });
        self.files.write().unwrap().insert(file.id, file);
        self
    }

    pub fn get(&self, id: &FileId) -> Option<StoredFile> {
        self.files.read().unwrap().get(id).cloned()
    }

    fn push_version(&self, version: &NewFileVersion) -> FileVersion {
        let mut versions = self.versions.write().unwrap();
        for v in versions.iter_mut().filter(|v| v.file_id == version.file_id) {
            v.is_current = false;
        }
        let created = FileVersion {
            id: FileVersionId::new(),
            file_id: version.file_id,
            version_number: version.version_number.clone(),
            storage_path: version.storage_path.clone(),
            file_size: version.file_size,
            mime_type: version.mime_type.clone(),
            change_description: version.change_description.clone(),
            created_by: version.created_by,
            is_current: true,
            created_at: Utc::now(),
        };
        versions.push(created.clone());
        created
    }
}

#[async_trait]
impl FileRepository for InMemoryFileRepository {
    async fn find_by_id(&self, id: &FileId) -> Result<Option<StoredFile>, DomainError> {
        Ok(self.get(id))
    }

    async fn list(
        &self,
        filter: &FileFilter,
        page: PageRequest,
    ) -> Result<Page<StoredFile>, DomainError> {
        let files = self.files.read().unwrap();
        let mut matched: Vec<StoredFile> =
            files.values().filter(|f| filter.matches(f)).cloned().collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Page::from_vec(matched, page))
    }

    async fn create(
        &self,
        file: &NewStoredFile,
        version: &NewFileVersion,
    ) -> Result<StoredFile, DomainError> {
        let created = StoredFile {
            id: version.file_id,
            file_name: file.file_name.clone(),
            original_name: file.original_name.clone(),
            storage_path: file.storage_path.clone(),
            file_size: file.file_size,
            mime_type: file.mime_type.clone(),
            description: file.description.clone(),
            project_id: file.project_id,
            task_id: file.task_id,
            uploaded_by: file.uploaded_by,
            is_public: file.is_public,
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.files.write().unwrap().insert(created.id, created.clone());
        self.push_version(version);
        Ok(created)
    }

    async fn save(&self, file: &StoredFile) -> Result<StoredFile, DomainError> {
        let mut files = self.files.write().unwrap();
        if !files.contains_key(&file.id) {
            return Err(DomainError::NotFound(format!("File {} not found", file.id)));
        }
        let mut saved = file.clone();
        saved.updated_at = Utc::now();
        files.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn versions(&self, file_id: &FileId) -> Result<Vec<FileVersion>, DomainError> {
        let mut versions: Vec<FileVersion> = self
            .versions
            .read()
            .unwrap()
            .iter()
            .filter(|v| v.file_id == *file_id)
            .cloned()
            .collect();
        // insertion order breaks ties between versions created in the same instant
        versions.reverse();
        versions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(versions)
    }

    async fn add_version(&self, version: &NewFileVersion) -> Result<FileVersion, DomainError> {
        Ok(self.push_version(version))
    }

    async fn set_current_version(
        &self,
        file_id: &FileId,
        version_id: &FileVersionId,
    ) -> Result<(), DomainError> {
        let mut versions = self.versions.write().unwrap();
        if !versions
            .iter()
            .any(|v| v.file_id == *file_id && v.id == *version_id)
        {
            return Err(DomainError::NotFound(format!(
                "Version {} not found",
                version_id
            )));
        }
        for v in versions.iter_mut().filter(|v| v.file_id == *file_id) {
            v.is_current = v.id == *version_id;
        }
        Ok(())
    }

    async fn permissions(&self, file_id: &FileId) -> Result<Vec<FilePermission>, DomainError> {
        Ok(self
            .permissions
            .read()
            .unwrap()
            .iter()
            .filter(|p| p.file_id == *file_id)
            .cloned()
            .collect())
    }

    async fn permissions_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<FilePermission>, DomainError> {
        Ok(self
            .permissions
            .read()
            .unwrap()
            .iter()
            .filter(|p| p.user_id == *user_id && p.is_active)
            .cloned()
            .collect())
    }

    async fn upsert_permission(
        &self,
        permission: &NewFilePermission,
    ) -> Result<FilePermission, DomainError> {
        let mut permissions = self.permissions.write().unwrap();
        permissions
            .retain(|p| !(p.file_id == permission.file_id && p.user_id == permission.user_id));
        let created = FilePermission {
            file_id: permission.file_id,
            user_id: permission.user_id,
            level: permission.level,
            granted_by: permission.granted_by,
            expires_at: permission.expires_at,
            is_active: true,
            created_at: Utc::now(),
        };
        permissions.push(created.clone());
        Ok(created)
    }

    async fn revoke_permission(
        &self,
        file_id: &FileId,
        user_id: &UserId,
    ) -> Result<(), DomainError> {
        let mut permissions = self.permissions.write().unwrap();
        let grant = permissions
            .iter_mut()
            .find(|p| p.file_id == *file_id && p.user_id == *user_id && p.is_active)
            .ok_or_else(|| DomainError::NotFound("Permission not found".to_string()))?;
        grant.is_active = false;
        Ok(())
    }
}

// ============================================================================
// In-Memory Comment Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryCommentRepository {
    comments: Arc<RwLock<HashMap<CommentId, Comment>>>,
}

impl InMemoryCommentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with a comment for testing
    pub fn with_comment(self, comment: Comment) -> Self {
        self.comments.write().unwrap().insert(comment.id, comment);
        self
    }

    pub fn count(&self) -> usize {
        self.comments.read().unwrap().len()
    }
}

#[async_trait]
impl CommentRepository for InMemoryCommentRepository {
    async fn find_by_id(&self, id: &CommentId) -> Result<Option<Comment>, DomainError> {
        Ok(self.comments.read().unwrap().get(id).cloned())
    }

    async fn list_for_entity(
        &self,
        entity_type: CommentEntityType,
        entity_id: &Uuid,
    ) -> Result<Vec<Comment>, DomainError> {
        let comments = self.comments.read().unwrap();
        let mut matched: Vec<Comment> = comments
            .values()
            .filter(|c| c.entity_type == entity_type && c.entity_id == *entity_id)
            .cloned()
            .collect();
        matched.sort_by_key(|c| c.created_at);
        Ok(matched)
    }

    async fn create(&self, comment: &NewComment) -> Result<Comment, DomainError> {
        let created = Comment {
            id: CommentId::new(),
            content: comment.content.clone(),
            author_id: comment.author_id,
            entity_type: comment.entity_type,
            entity_id: comment.entity_id,
            parent_comment_id: comment.parent_comment_id,
            is_edited: false,
            mentions: comment.mentions.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.comments
            .write()
            .unwrap()
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_content(
        &self,
        id: &CommentId,
        content: &str,
    ) -> Result<Comment, DomainError> {
        let mut comments = self.comments.write().unwrap();
        let comment = comments
            .get_mut(id)
            .ok_or_else(|| DomainError::NotFound(format!("Comment {} not found", id)))?;
        comment.content = content.to_string();
        comment.is_edited = true;
        comment.updated_at = Utc::now();
        Ok(comment.clone())
    }

    async fn delete(&self, id: &CommentId) -> Result<(), DomainError> {
        let mut comments = self.comments.write().unwrap();
        if comments.remove(id).is_none() {
            return Err(DomainError::NotFound(format!("Comment {} not found", id)));
        }
        // cascade through every level of replies
        let mut removed = vec![*id];
        while let Some(parent) = removed.pop() {
            let children: Vec<CommentId> = comments
                .values()
                .filter(|c| c.parent_comment_id == Some(parent))
                .map(|c| c.id)
                .collect();
            for child in children {
                comments.remove(&child);
                removed.push(child);
            }
        }
        Ok(())
    }
}

// ============================================================================
// In-Memory Notification Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryNotificationRepository {
    notifications: Arc<RwLock<HashMap<NotificationId, Notification>>>,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with a notification for testing
    pub fn with_notification(self, notification: Notification) -> Self {
        self.notifications
            .write()
            .unwrap()
            .insert(notification.id, notification);
        self
    }

    pub fn all(&self) -> Vec<Notification> {
        self.notifications.read().unwrap().values().cloned().collect()
    }

    fn for_user(&self, user_id: &UserId, unread_only: bool) -> Vec<Notification> {
        let notifications = self.notifications.read().unwrap();
        let mut matched: Vec<Notification> = notifications
            .values()
            .filter(|n| n.user_id == *user_id && (!unread_only || !n.is_read))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn create(&self, notification: &NewNotification) -> Result<Notification, DomainError> {
        let created = Notification {
            id: NotificationId::new(),
            user_id: notification.user_id,
            notification_type: notification.notification_type,
            title: notification.title.clone(),
            message: notification.message.clone(),
            entity_type: notification.entity_type.clone(),
            entity_id: notification.entity_id,
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        };
        self.notifications
            .write()
            .unwrap()
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: &NotificationId) -> Result<Option<Notification>, DomainError> {
        Ok(self.notifications.read().unwrap().get(id).cloned())
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        unread_only: bool,
        page: PageRequest,
    ) -> Result<Page<Notification>, DomainError> {
        Ok(Page::from_vec(self.for_user(user_id, unread_only), page))
    }

    async fn find_all_for_user(&self, user_id: &UserId) -> Result<Vec<Notification>, DomainError> {
        Ok(self.for_user(user_id, false))
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<Notification, DomainError> {
        let mut notifications = self.notifications.write().unwrap();
        let notification = notifications
            .get_mut(id)
            .ok_or_else(|| DomainError::NotFound(format!("Notification {} not found", id)))?;
        notification.is_read = true;
        notification.read_at = Some(Utc::now());
        Ok(notification.clone())
    }

    async fn mark_all_read(&self, user_id: &UserId) -> Result<u64, DomainError> {
        let mut notifications = self.notifications.write().unwrap();
        let mut count = 0;
        for n in notifications
            .values_mut()
            .filter(|n| n.user_id == *user_id && !n.is_read)
        {
            n.is_read = true;
            n.read_at = Some(Utc::now());
            count += 1;
        }
        Ok(count)
    }

    async fn delete(&self, id: &NotificationId) -> Result<(), DomainError> {
        self.notifications
            .write()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| DomainError::NotFound(format!("Notification {} not found", id)))
    }

    async fn count_unread(&self, user_id: &UserId) -> Result<u64, DomainError> {
        Ok(self.for_user(user_id, true).len() as u64)
    }
}

// ============================================================================
// In-Memory Notification Preference Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryNotificationPreferenceRepository {
    preferences: Arc<RwLock<HashMap<(UserId, NotificationType), NotificationPreference>>>,
}

impl InMemoryNotificationPreferenceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with a preference for testing
    pub fn with_settings(self, user_id: UserId, settings: PreferenceSettings) -> Self {
        let preference = Self::build(user_id, &settings);
        self.preferences
            .write()
            .unwrap()
            .insert((user_id, settings.notification_type), preference);
        self
    }

    fn build(user_id: UserId, settings: &PreferenceSettings) -> NotificationPreference {
        NotificationPreference {
            id: Uuid::new_v4(),
            user_id,
            notification_type: settings.notification_type,
            email_enabled: settings.email_enabled,
            push_enabled: settings.push_enabled,
            in_app_enabled: settings.in_app_enabled,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

#[async_trait]
impl NotificationPreferenceRepository for InMemoryNotificationPreferenceRepository {
    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<NotificationPreference>, DomainError> {
        let preferences = self.preferences.read().unwrap();
        let mut matched: Vec<NotificationPreference> = preferences
            .values()
            .filter(|p| p.user_id == *user_id)
            .cloned()
            .collect();
        matched.sort_by_key(|p| p.notification_type.to_string());
        Ok(matched)
    }

    async fn find(
        &self,
        user_id: &UserId,
        notification_type: NotificationType,
    ) -> Result<Option<NotificationPreference>, DomainError> {
        Ok(self
            .preferences
            .read()
            .unwrap()
            .get(&(*user_id, notification_type))
            .cloned())
    }

    async fn create(
        &self,
        user_id: &UserId,
        settings: &PreferenceSettings,
    ) -> Result<NotificationPreference, DomainError> {
        let mut preferences = self.preferences.write().unwrap();
        let key = (*user_id, settings.notification_type);
        if preferences.contains_key(&key) {
            return Err(DomainError::AlreadyExists(
                "Notification preference already exists".to_string(),
            ));
        }
        let created = Self::build(*user_id, settings);
        preferences.insert(key, created.clone());
        Ok(created)
    }

    async fn upsert(
        &self,
        user_id: &UserId,
        settings: &PreferenceSettings,
    ) -> Result<NotificationPreference, DomainError> {
        let mut preferences = self.preferences.write().unwrap();
        let saved = preferences
            .entry((*user_id, settings.notification_type))
            .and_modify(|p| {
                p.email_enabled = settings.email_enabled;
                p.push_enabled = settings.push_enabled;
                p.in_app_enabled = settings.in_app_enabled;
                p.updated_at = Utc::now();
            })
            .or_insert_with(|| Self::build(*user_id, settings));
        Ok(saved.clone())
    }

    async fn delete(
        &self,
        user_id: &UserId,
        notification_type: NotificationType,
    ) -> Result<(), DomainError> {
        self.preferences
            .write()
            .unwrap()
            .remove(&(*user_id, notification_type))
            .map(|_| ())
            .ok_or_else(|| {
                DomainError::NotFound(format!(
                    "Notification preference for type '{}' not found",
                    notification_type
                ))
            })
    }
}

// ============================================================================
// In-Memory Audit Log Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryAuditLogRepository {
    logs: Arc<RwLock<Vec<AuditLog>>>,
}

impl InMemoryAuditLogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with an entry for testing
    pub fn with_log(self, log: AuditLog) -> Self {
        self.logs.write().unwrap().push(log);
        self
    }

    pub fn all(&self) -> Vec<AuditLog> {
        self.logs.read().unwrap().clone()
    }

    fn matching(&self, filter: &AuditFilter) -> Vec<AuditLog> {
        let mut matched: Vec<AuditLog> = self
            .logs
            .read()
            .unwrap()
            .iter()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryAuditLogRepository {
    async fn create(&self, log: &NewAuditLog) -> Result<AuditLog, DomainError> {
        let created = AuditLog {
            id: AuditLogId::new(),
            user_id: log.user_id,
            action: log.action,
            entity_type: log.entity_type.clone(),
            entity_id: log.entity_id,
            old_values: log.old_values.clone(),
            new_values: log.new_values.clone(),
            ip_address: log.ip_address.clone(),
            user_agent: log.user_agent.clone(),
            created_at: Utc::now(),
        };
        self.logs.write().unwrap().push(created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: &AuditLogId) -> Result<Option<AuditLog>, DomainError> {
        Ok(self
            .logs
            .read()
            .unwrap()
            .iter()
            .find(|l| l.id == *id)
            .cloned())
    }

    async fn list(
        &self,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<Page<AuditLog>, DomainError> {
        Ok(Page::from_vec(self.matching(filter), page))
    }

    async fn find_all(&self, filter: &AuditFilter) -> Result<Vec<AuditLog>, DomainError> {
        Ok(self.matching(filter))
    }
}

// ============================================================================
// In-Memory File Storage
// ============================================================================

#[derive(Default)]
pub struct InMemoryFileStorage {
    objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, key: &str, bytes: &[u8]) -> Self {
        self.objects
            .write()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
        self
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.read().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl FileStorage for InMemoryFileStorage {
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.objects
            .write()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn open(&self, key: &str) -> Result<ContentStream, StorageError> {
        let bytes = self
            .objects
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(futures_util::stream::iter([Ok::<_, std::io::Error>(bytes)]).boxed())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects.write().unwrap().remove(key);
        Ok(())
    }
}

// ============================================================================
// Recording realtime publisher and notifier
// ============================================================================

/// Captures pushes instead of delivering them
#[derive(Default)]
pub struct RecordingPublisher {
    pub notifications: Arc<RwLock<Vec<(UserId, Notification)>>>,
    pub events: Arc<RwLock<Vec<(ProjectId, String, serde_json::Value)>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events
            .read()
            .unwrap()
            .iter()
            .map(|(_, name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl RealtimePublisher for RecordingPublisher {
    async fn notify_user(&self, user_id: &UserId, notification: &Notification) -> usize {
        self.notifications
            .write()
            .unwrap()
            .push((*user_id, notification.clone()));
        1
    }

    async fn project_event(
        &self,
        project_id: &ProjectId,
        event: &str,
        data: serde_json::Value,
    ) -> usize {
        self.events
            .write()
            .unwrap()
            .push((*project_id, event.to_string(), data));
        1
    }
}

/// Captures notifications sent by services
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Arc<RwLock<Vec<NewNotification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recipients(&self) -> Vec<UserId> {
        self.sent.read().unwrap().iter().map(|n| n.user_id).collect()
    }

    pub fn sent(&self) -> Vec<NewNotification> {
        self.sent.read().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        notification: NewNotification,
    ) -> Result<Option<Notification>, DomainError> {
        self.sent.write().unwrap().push(notification.clone());
        Ok(Some(Notification {
            id: NotificationId::new(),
            user_id: notification.user_id,
            notification_type: notification.notification_type,
            title: notification.title,
            message: notification.message,
            entity_type: notification.entity_type,
            entity_id: notification.entity_id,
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        }))
    }
}

//! Task service
//!
//! Task CRUD, the status workflow, assignment and dependency management.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;

use super::access::{accessible_project_ids, can_manage, ensure_project_access};
use super::round2;
use crate::domain::entities::{
    creates_cycle, validate_task_fields, DependencyType, NewNotification, NewTask,
    NotificationType, Page, PageRequest, Project, ProjectId, Task, TaskDependency, TaskFilter,
    TaskId, TaskPriority, TaskStatus, TaskUpdate, User, UserId,
};
use crate::domain::ports::{
    Notifier, ProjectRepository, RealtimePublisher, TaskRepository, UserRepository,
};
use crate::error::{AppError, DomainError};

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub project_id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    pub assignee_id: Option<UserId>,
    pub priority: TaskPriority,
    pub estimated_hours: Option<f64>,
    pub due_date: Option<NaiveDate>,
    pub dependency_ids: Vec<TaskId>,
}

/// Counts and rates over a set of tasks
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskStatistics {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub review: usize,
    pub done: usize,
    pub overdue: usize,
    pub completion_rate: f64,
    pub average_completion_hours: Option<f64>,
}

pub fn task_statistics(tasks: &[Task], today: NaiveDate) -> TaskStatistics {
    let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();
    let done = count(TaskStatus::Done);

    let durations: Vec<f64> = tasks.iter().filter_map(|t| t.completion_hours()).collect();
    let average_completion_hours = if durations.is_empty() {
        None
    } else {
        Some(round2(durations.iter().sum::<f64>() / durations.len() as f64))
    };

    TaskStatistics {
        total: tasks.len(),
        todo: count(TaskStatus::Todo),
        in_progress: count(TaskStatus::InProgress),
        review: count(TaskStatus::Review),
        done,
        overdue: tasks.iter().filter(|t| t.is_overdue(today)).count(),
        completion_rate: if tasks.is_empty() {
            0.0
        } else {
            round2(done as f64 / tasks.len() as f64 * 100.0)
        },
        average_completion_hours,
    }
}

/// The assignee, the project manager or an admin may change a task
fn can_modify(user: &User, task: &Task, project: &Project) -> bool {
    can_manage(user, project) || task.assignee_id == Some(user.id)
}

pub struct TaskService<TR, PR, UR>
where
    TR: TaskRepository,
    PR: ProjectRepository,
    UR: UserRepository,
{
    tasks: Arc<TR>,
    projects: Arc<PR>,
    users: Arc<UR>,
    notifier: Arc<dyn Notifier>,
    publisher: Arc<dyn RealtimePublisher>,
}

impl<TR, PR, UR> TaskService<TR, PR, UR>
where
    TR: TaskRepository,
    PR: ProjectRepository,
    UR: UserRepository,
{
    pub fn new(
        tasks: Arc<TR>,
        projects: Arc<PR>,
        users: Arc<UR>,
        notifier: Arc<dyn Notifier>,
        publisher: Arc<dyn RealtimePublisher>,
    ) -> Self {
        Self {
            tasks,
            projects,
            users,
            notifier,
            publisher,
        }
    }

    pub async fn create(&self, caller: &User, input: CreateTask) -> Result<Task, AppError> {
        let project = ensure_project_access(self.projects.as_ref(), caller, &input.project_id).await?;
        validate_task_fields(&input.title, input.estimated_hours).map_err(AppError::BadRequest)?;

        if let Some(assignee) = &input.assignee_id {
            self.ensure_assignable(&project, assignee).await?;
        }

        let mut prerequisites = Vec::new();
        let mut seen = HashSet::new();
        for dep_id in input.dependency_ids.iter().filter(|id| seen.insert(**id)) {
            let dep = self.load(dep_id).await?;
            if dep.project_id != project.id {
                return Err(AppError::BadRequest(format!(
                    "Dependency {} belongs to another project",
                    dep_id
                )));
            }
            prerequisites.push(dep.id);
        }

        let task = self
            .tasks
            .create(&NewTask {
                project_id: project.id,
                title: input.title.trim().to_string(),
                description: input.description,
                assignee_id: input.assignee_id,
                priority: input.priority,
                estimated_hours: input.estimated_hours,
                due_date: input.due_date,
                created_by: caller.id,
            })
            .await?;

        for dep_id in &prerequisites {
            self.tasks
                .add_dependency(&task.id, dep_id, DependencyType::DependsOn)
                .await?;
        }

        if let Some(assignee) = task.assignee_id {
            self.notify_assignment(caller, &task, assignee).await;
        }
        self.publisher
            .project_event(&project.id, "task_created", json!(task))
            .await;

        tracing::info!(task_id = %task.id, project_id = %project.id, "Task created");
        Ok(task)
    }

    /// List tasks in projects the caller can see
    pub async fn list(
        &self,
        caller: &User,
        filter: &TaskFilter,
        page: PageRequest,
    ) -> Result<Page<Task>, AppError> {
        let filter = self.scoped(caller, filter).await?;
        Ok(self.tasks.list(&filter, page).await?)
    }

    pub async fn get(&self, caller: &User, id: &TaskId) -> Result<Task, AppError> {
        let (task, _) = self.load_visible(caller, id).await?;
        Ok(task)
    }

    pub async fn update(
        &self,
        caller: &User,
        id: &TaskId,
        update: TaskUpdate,
    ) -> Result<Task, AppError> {
        if update.is_empty() {
            return Err(AppError::BadRequest("No fields to update".to_string()));
        }
        let (mut task, project) = self.load_modifiable(caller, id).await?;

        update.apply_to(&mut task);
        validate_task_fields(&task.title, task.estimated_hours).map_err(AppError::BadRequest)?;

        let saved = self.tasks.save(&task).await?;
        self.publish_update(&saved, &project.id).await;
        Ok(saved)
    }

    /// Move a task through the workflow
    ///
    /// Starting or finishing a task requires every blocking prerequisite to be done.
    pub async fn update_status(
        &self,
        caller: &User,
        id: &TaskId,
        status: TaskStatus,
    ) -> Result<Task, AppError> {
        let (mut task, project) = self.load_modifiable(caller, id).await?;

        if matches!(status, TaskStatus::InProgress | TaskStatus::Done) {
            let blockers = self.unfinished_blockers(&task.id).await?;
            if !blockers.is_empty() {
                return Err(AppError::BadRequest(format!(
                    "Task is blocked by unfinished dependencies: {}",
                    blockers.join(", ")
                )));
            }
        }

        task.transition_to(status, Utc::now());
        let saved = self.tasks.save(&task).await?;
        self.publish_update(&saved, &project.id).await;
        Ok(saved)
    }

    /// Set or clear the assignee; a new assignee is notified
    pub async fn assign(
        &self,
        caller: &User,
        id: &TaskId,
        assignee_id: Option<UserId>,
    ) -> Result<Task, AppError> {
        let (mut task, project) = self.load_modifiable(caller, id).await?;
        if let Some(assignee) = &assignee_id {
            self.ensure_assignable(&project, assignee).await?;
        }

        let previous = task.assignee_id;
        task.assignee_id = assignee_id;
        let saved = self.tasks.save(&task).await?;

        if let Some(assignee) = assignee_id.filter(|a| Some(*a) != previous) {
            self.notify_assignment(caller, &saved, assignee).await;
        }
        self.publish_update(&saved, &project.id).await;
        Ok(saved)
    }

    /// Delete a task (project manager or admin)
    pub async fn delete(&self, caller: &User, id: &TaskId) -> Result<Task, AppError> {
        let (task, project) = self.load_visible(caller, id).await?;
        if !can_manage(caller, &project) {
            return Err(AppError::forbidden(
                "Only the project manager or an admin can delete tasks",
            ));
        }

        self.tasks.delete(id).await?;
        self.publisher
            .project_event(&project.id, "task_deleted", json!({ "task_id": task.id }))
            .await;
        Ok(task)
    }

    pub async fn dependencies(
        &self,
        caller: &User,
        id: &TaskId,
    ) -> Result<Vec<TaskDependency>, AppError> {
        self.load_visible(caller, id).await?;
        Ok(self.tasks.dependencies(id).await?)
    }

    pub async fn add_dependency(
        &self,
        caller: &User,
        id: &TaskId,
        depends_on_id: &TaskId,
        dependency_type: DependencyType,
    ) -> Result<TaskDependency, AppError> {
        if id == depends_on_id {
            return Err(AppError::BadRequest(
                "A task cannot depend on itself".to_string(),
            ));
        }
        let (task, project) = self.load_modifiable(caller, id).await?;
        let prerequisite = self.load(depends_on_id).await?;
        if prerequisite.project_id != task.project_id {
            return Err(AppError::BadRequest(
                "Dependencies must be within the same project".to_string(),
            ));
        }

        let edges = self.tasks.project_dependencies(&project.id).await?;
        if edges
            .iter()
            .any(|e| e.task_id == *id && e.depends_on_id == *depends_on_id)
        {
            return Err(DomainError::AlreadyExists("Dependency already exists".to_string()).into());
        }
        if creates_cycle(&edges, *id, *depends_on_id) {
            return Err(AppError::BadRequest(
                "Dependency would create a circular dependency".to_string(),
            ));
        }

        let dependency = self
            .tasks
            .add_dependency(id, depends_on_id, dependency_type)
            .await?;
        self.publish_update(&task, &project.id).await;
        Ok(dependency)
    }

    pub async fn remove_dependency(
        &self,
        caller: &User,
        id: &TaskId,
        depends_on_id: &TaskId,
    ) -> Result<(), AppError> {
        let (task, project) = self.load_modifiable(caller, id).await?;
        self.tasks.remove_dependency(id, depends_on_id).await?;
        self.publish_update(&task, &project.id).await;
        Ok(())
    }

    /// Statistics for one project, or for every project the caller can see
    pub async fn statistics(
        &self,
        caller: &User,
        project_id: Option<ProjectId>,
    ) -> Result<TaskStatistics, AppError> {
        let filter = TaskFilter {
            project_id,
            ..Default::default()
        };
        let filter = self.scoped(caller, &filter).await?;
        let tasks = self.tasks.find_all(&filter).await?;
        Ok(task_statistics(&tasks, Utc::now().date_naive()))
    }

    async fn scoped(&self, caller: &User, filter: &TaskFilter) -> Result<TaskFilter, AppError> {
        let mut filter = filter.clone();
        if let Some(project_id) = &filter.project_id {
            ensure_project_access(self.projects.as_ref(), caller, project_id).await?;
        } else {
            filter.project_ids = accessible_project_ids(self.projects.as_ref(), caller).await?;
        }
        Ok(filter)
    }

    async fn load(&self, id: &TaskId) -> Result<Task, AppError> {
        self.tasks
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Task {} not found", id)).into())
    }

    async fn load_visible(&self, caller: &User, id: &TaskId) -> Result<(Task, Project), AppError> {
        let task = self.load(id).await?;
        let project = ensure_project_access(self.projects.as_ref(), caller, &task.project_id).await?;
        Ok((task, project))
    }

    async fn load_modifiable(
        &self,
        caller: &User,
        id: &TaskId,
    ) -> Result<(Task, Project), AppError> {
        let (task, project) = self.load_visible(caller, id).await?;
        if !can_modify(caller, &task, &project) {
            return Err(AppError::forbidden(
                "Only the assignee, the project manager or an admin can change this task",
            ));
        }
        Ok((task, project))
    }

    /// The assignee must be an active user on the project's team
    async fn ensure_assignable(&self, project: &Project, user_id: &UserId) -> Result<(), AppError> {
        let user = self.users.find_by_id(user_id).await?;
        if !user.is_some_and(|u| u.is_active) {
            return Err(AppError::BadRequest(format!(
                "Assignee {} not found or inactive",
                user_id
            )));
        }
        if project.manager_id == *user_id {
            return Ok(());
        }
        match self.projects.find_member(&project.id, user_id).await? {
            Some(member) if member.is_active() => Ok(()),
            _ => Err(AppError::BadRequest(
                "Assignee must be an active member of the project".to_string(),
            )),
        }
    }

    async fn unfinished_blockers(&self, id: &TaskId) -> Result<Vec<String>, AppError> {
        let prerequisite_ids: Vec<TaskId> = self
            .tasks
            .dependencies(id)
            .await?
            .into_iter()
            .filter(|d| d.dependency_type.is_blocking())
            .map(|d| d.depends_on_id)
            .collect();
        if prerequisite_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .tasks
            .find_by_ids(&prerequisite_ids)
            .await?
            .into_iter()
            .filter(|t| t.status != TaskStatus::Done)
            .map(|t| t.title)
            .collect())
    }

    async fn notify_assignment(&self, caller: &User, task: &Task, assignee: UserId) {
        if assignee == caller.id {
            return;
        }
        let notification = NewNotification::new(
            assignee,
            NotificationType::TaskAssigned,
            "New task assigned",
            format!("{} assigned you to \"{}\"", caller.full_name(), task.title),
        )
        .about("task", task.id.0);
        if let Err(e) = self.notifier.notify(notification).await {
            tracing::warn!(error = %e, task_id = %task.id, "Failed to send assignment notification");
        }
    }

    async fn publish_update(&self, task: &Task, project_id: &ProjectId) {
        self.publisher
            .project_event(project_id, "task_updated", json!(task))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::UserRole;
    use crate::test_utils::{
        test_project, test_task, test_user, test_user_with_role, InMemoryProjectRepository,
        InMemoryTaskRepository, InMemoryUserRepository, RecordingNotifier, RecordingPublisher,
    };
    use chrono::Duration;

    type Service = TaskService<InMemoryTaskRepository, InMemoryProjectRepository, InMemoryUserRepository>;

    struct Harness {
        service: Service,
        tasks: Arc<InMemoryTaskRepository>,
        notifier: Arc<RecordingNotifier>,
        publisher: Arc<RecordingPublisher>,
    }

    fn harness(
        tasks: InMemoryTaskRepository,
        projects: InMemoryProjectRepository,
        users: InMemoryUserRepository,
    ) -> Harness {
        let tasks = Arc::new(tasks);
        let notifier = Arc::new(RecordingNotifier::new());
        let publisher = Arc::new(RecordingPublisher::new());
        Harness {
            service: TaskService::new(
                tasks.clone(),
                Arc::new(projects),
                Arc::new(users),
                notifier.clone(),
                publisher.clone(),
            ),
            tasks,
            notifier,
            publisher,
        }
    }

    fn create_input(project_id: ProjectId, assignee: Option<UserId>) -> CreateTask {
        CreateTask {
            project_id,
            title: "Build login page".to_string(),
            description: None,
            assignee_id: assignee,
            priority: TaskPriority::High,
            estimated_hours: Some(6.0),
            due_date: None,
            dependency_ids: vec![],
        }
    }

    #[tokio::test]
    async fn create_notifies_assignee_and_broadcasts() {
        let manager = test_user();
        let dev = test_user();
        let project = test_project(&manager.id);
        let h = harness(
            InMemoryTaskRepository::new(),
            InMemoryProjectRepository::new()
                .with_project(project.clone())
                .with_member(project.id, dev.id),
            InMemoryUserRepository::new()
                .with_user(manager.clone())
                .with_user(dev.clone()),
        );

        let task = h
            .service
            .create(&manager, create_input(project.id, Some(dev.id)))
            .await
            .unwrap();

        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(h.notifier.recipients(), vec![dev.id]);
        assert_eq!(
            h.notifier.sent()[0].notification_type,
            NotificationType::TaskAssigned
        );
        assert_eq!(h.publisher.event_names(), vec!["task_created"]);
    }

    #[tokio::test]
    async fn create_rejects_assignee_outside_team() {
        let manager = test_user();
        let outsider = test_user();
        let project = test_project(&manager.id);
        let h = harness(
            InMemoryTaskRepository::new(),
            InMemoryProjectRepository::new().with_project(project.clone()),
            InMemoryUserRepository::new()
                .with_user(manager.clone())
                .with_user(outsider.clone()),
        );

        let err = h
            .service
            .create(&manager, create_input(project.id, Some(outsider.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn create_requires_project_access() {
        let stranger = test_user();
        let project = test_project(&test_user().id);
        let h = harness(
            InMemoryTaskRepository::new(),
            InMemoryProjectRepository::new().with_project(project.clone()),
            InMemoryUserRepository::new(),
        );

        let err = h
            .service
            .create(&stranger, create_input(project.id, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn blocked_task_cannot_start() {
        let manager = test_user();
        let project = test_project(&manager.id);
        let prerequisite = test_task(&project.id, &manager.id);
        let h = harness(
            InMemoryTaskRepository::new().with_task(prerequisite.clone()),
            InMemoryProjectRepository::new().with_project(project.clone()),
            InMemoryUserRepository::new().with_user(manager.clone()),
        );

        let mut input = create_input(project.id, None);
        input.dependency_ids = vec![prerequisite.id];
        let task = h.service.create(&manager, input).await.unwrap();

        let err = h
            .service
            .update_status(&manager, &task.id, TaskStatus::InProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        h.service
            .update_status(&manager, &prerequisite.id, TaskStatus::Done)
            .await
            .unwrap();
        let started = h
            .service
            .update_status(&manager, &task.id, TaskStatus::InProgress)
            .await
            .unwrap();
        assert!(started.started_at.is_some());
    }

    #[tokio::test]
    async fn related_links_do_not_block() {
        let manager = test_user();
        let project = test_project(&manager.id);
        let a = test_task(&project.id, &manager.id);
        let b = test_task(&project.id, &manager.id);
        let h = harness(
            InMemoryTaskRepository::new().with_task(a.clone()).with_task(b.clone()),
            InMemoryProjectRepository::new().with_project(project.clone()),
            InMemoryUserRepository::new(),
        );

        h.service
            .add_dependency(&manager, &a.id, &b.id, DependencyType::RelatedTo)
            .await
            .unwrap();
        assert!(h
            .service
            .update_status(&manager, &a.id, TaskStatus::Done)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn dependency_rules() {
        let manager = test_user();
        let project = test_project(&manager.id);
        let other_project = test_project(&manager.id);
        let a = test_task(&project.id, &manager.id);
        let b = test_task(&project.id, &manager.id);
        let c = test_task(&project.id, &manager.id);
        let foreign = test_task(&other_project.id, &manager.id);
        let h = harness(
            InMemoryTaskRepository::new()
                .with_task(a.clone())
                .with_task(b.clone())
                .with_task(c.clone())
                .with_task(foreign.clone()),
            InMemoryProjectRepository::new()
                .with_project(project.clone())
                .with_project(other_project),
            InMemoryUserRepository::new(),
        );
        let add = |x: TaskId, y: TaskId| {
            let service = &h.service;
            let manager = &manager;
            async move {
                service
                    .add_dependency(manager, &x, &y, DependencyType::DependsOn)
                    .await
            }
        };

        assert!(matches!(add(a.id, a.id).await, Err(AppError::BadRequest(_))));
        assert!(matches!(add(a.id, foreign.id).await, Err(AppError::BadRequest(_))));

        add(a.id, b.id).await.unwrap();
        add(b.id, c.id).await.unwrap();
        assert!(matches!(
            add(a.id, b.id).await,
            Err(AppError::Domain(DomainError::AlreadyExists(_)))
        ));
        // c -> a would close a -> b -> c -> a
        assert!(matches!(add(c.id, a.id).await, Err(AppError::BadRequest(_))));

        h.service.remove_dependency(&manager, &a.id, &b.id).await.unwrap();
        assert!(h.tasks.dependencies(&a.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_assignee_or_manager_can_update() {
        let manager = test_user();
        let dev = test_user();
        let other = test_user();
        let project = test_project(&manager.id);
        let mut task = test_task(&project.id, &manager.id);
        task.assignee_id = Some(dev.id);
        let h = harness(
            InMemoryTaskRepository::new().with_task(task.clone()),
            InMemoryProjectRepository::new()
                .with_project(project.clone())
                .with_member(project.id, dev.id)
                .with_member(project.id, other.id),
            InMemoryUserRepository::new(),
        );
        let update = || TaskUpdate {
            title: Some("Renamed".to_string()),
            ..Default::default()
        };

        assert!(h.service.update(&dev, &task.id, update()).await.is_ok());
        assert!(matches!(
            h.service.update(&other, &task.id, update()).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            h.service.delete(&dev, &task.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(h.service.delete(&manager, &task.id).await.is_ok());
        assert!(h.publisher.event_names().contains(&"task_deleted".to_string()));
    }

    #[tokio::test]
    async fn reassignment_notifies_new_assignee_only() {
        let manager = test_user();
        let dev = test_user();
        let project = test_project(&manager.id);
        let task = test_task(&project.id, &manager.id);
        let h = harness(
            InMemoryTaskRepository::new().with_task(task.clone()),
            InMemoryProjectRepository::new()
                .with_project(project.clone())
                .with_member(project.id, dev.id),
            InMemoryUserRepository::new().with_user(dev.clone()),
        );

        h.service.assign(&manager, &task.id, Some(dev.id)).await.unwrap();
        h.service.assign(&manager, &task.id, Some(dev.id)).await.unwrap();
        assert_eq!(h.notifier.recipients(), vec![dev.id]);

        let cleared = h.service.assign(&manager, &task.id, None).await.unwrap();
        assert!(cleared.assignee_id.is_none());
    }

    #[tokio::test]
    async fn list_is_scoped_to_visible_projects() {
        let dev = test_user();
        let visible = test_project(&test_user().id);
        let hidden = test_project(&test_user().id);
        let h = harness(
            InMemoryTaskRepository::new()
                .with_task(test_task(&visible.id, &dev.id))
                .with_task(test_task(&hidden.id, &dev.id)),
            InMemoryProjectRepository::new()
                .with_project(visible.clone())
                .with_project(hidden)
                .with_member(visible.id, dev.id),
            InMemoryUserRepository::new(),
        );

        let page = h
            .service
            .list(&dev, &TaskFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);

        let admin = test_user_with_role(UserRole::Executive);
        let stats = h.service.statistics(&admin, None).await.unwrap();
        assert_eq!(stats.total, 2);
    }

    #[test]
    fn statistics_over_tasks() {
        let project = ProjectId::new();
        let user = UserId::new();
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let start = Utc::now();

        let mut done = test_task(&project, &user);
        done.transition_to(TaskStatus::InProgress, start);
        done.transition_to(TaskStatus::Done, start + Duration::hours(4));

        let mut late = test_task(&project, &user);
        late.due_date = NaiveDate::from_ymd_opt(2024, 6, 1);

        let open = test_task(&project, &user);

        let stats = task_statistics(&[done, late, open], today);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.done, 1);
        assert_eq!(stats.todo, 2);
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.completion_rate, 33.33);
        assert_eq!(stats.average_completion_hours, Some(4.0));
    }

    #[test]
    fn statistics_of_nothing() {
        let stats = task_statistics(&[], Utc::now().date_naive());
        assert_eq!(stats, TaskStatistics::default());
    }
}

//! PostgreSQL adapter for TaskRepository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set,
};

use crate::domain::entities::{
    DependencyType, NewTask, Page, PageRequest, ProjectId, Task, TaskDependency, TaskFilter,
    TaskId, TaskPriority, TaskStatus, UserId,
};
use crate::domain::ports::TaskRepository;
use crate::entity::{task_dependencies, tasks};
use crate::error::DomainError;

/// PostgreSQL implementation of TaskRepository
pub struct PostgresTaskRepository {
    db: DatabaseConnection,
}

impl PostgresTaskRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn filtered(filter: &TaskFilter) -> Select<tasks::Entity> {
    let mut query = tasks::Entity::find();

    if let Some(ids) = &filter.project_ids {
        query = query.filter(tasks::Column::ProjectId.is_in(ids.iter().map(|p| p.0)));
    }
    if let Some(project) = filter.project_id {
        query = query.filter(tasks::Column::ProjectId.eq(project.0));
    }
    if let Some(assignee) = filter.assignee_id {
        query = query.filter(tasks::Column::AssigneeId.eq(assignee.0));
    }
    if let Some(status) = filter.status {
        query = query.filter(tasks::Column::Status.eq(status.to_string()));
    }
    if let Some(priority) = filter.priority {
        query = query.filter(tasks::Column::Priority.eq(priority.to_string()));
    }
    if let Some(today) = filter.overdue_as_of {
        query = query
            .filter(tasks::Column::DueDate.lt(today))
            .filter(tasks::Column::Status.ne(TaskStatus::Done.to_string()));
    }
    if let Some(term) = &filter.search {
        let pattern = super::contains_pattern(term);
        query = query.filter(
            Condition::any()
                .add(Expr::col(tasks::Column::Title).ilike(pattern.clone()))
                .add(Expr::col(tasks::Column::Description).ilike(pattern)),
        );
    }
    query
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>, DomainError> {
        let result = tasks::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.map(|m| m.into()))
    }

    async fn find_by_ids(&self, ids: &[TaskId]) -> Result<Vec<Task>, DomainError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let results = tasks::Entity::find()
            .filter(tasks::Column::Id.is_in(ids.iter().map(|id| id.0)))
            .all(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn list(
        &self,
        filter: &TaskFilter,
        page: PageRequest,
    ) -> Result<Page<Task>, DomainError> {
        let query = filtered(filter);

        let total = query
            .clone()
            .count(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        let results = query
            .order_by_desc(tasks::Column::CreatedAt)
            .offset(page.offset())
            .limit(page.limit)
            .all(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(Page::new(
            results.into_iter().map(|m| m.into()).collect(),
            page,
            total,
        ))
    }

    async fn find_all(&self, filter: &TaskFilter) -> Result<Vec<Task>, DomainError> {
        let results = filtered(filter)
            .order_by_desc(tasks::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn create(&self, task: &NewTask) -> Result<Task, DomainError> {
        let id = TaskId::new();
        let now = Utc::now().fixed_offset();

        let model = tasks::ActiveModel {
            id: Set(id.0),
            project_id: Set(task.project_id.0),
            title: Set(task.title.clone()),
            description: Set(task.description.clone()),
            assignee_id: Set(task.assignee_id.map(|a| a.0)),
            status: Set(TaskStatus::Todo.to_string()),
            priority: Set(task.priority.to_string()),
            estimated_hours: Set(task.estimated_hours),
            actual_hours: Set(0.0),
            due_date: Set(task.due_date),
            started_at: Set(None),
            completed_at: Set(None),
            created_by: Set(task.created_by.0),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = model
            .insert(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.into())
    }

    async fn save(&self, task: &Task) -> Result<Task, DomainError> {
        let result = tasks::ActiveModel {
            id: Set(task.id.0),
            project_id: Set(task.project_id.0),
            title: Set(task.title.clone()),
            description: Set(task.description.clone()),
            assignee_id: Set(task.assignee_id.map(|a| a.0)),
            status: Set(task.status.to_string()),
            priority: Set(task.priority.to_string()),
            estimated_hours: Set(task.estimated_hours),
            actual_hours: Set(task.actual_hours),
            due_date: Set(task.due_date),
            started_at: Set(task.started_at.map(|t| t.fixed_offset())),
            completed_at: Set(task.completed_at.map(|t| t.fixed_offset())),
            created_by: Set(task.created_by.0),
            created_at: Set(task.created_at.fixed_offset()),
            updated_at: Set(Utc::now().fixed_offset()),
        }
        .update(&self.db)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.into())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), DomainError> {
        let result = tasks::Entity::delete_by_id(id.0)
            .exec(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound(format!("Task {} not found", id)));
        }
        Ok(())
    }

    async fn set_actual_hours(&self, id: &TaskId, hours: f64) -> Result<(), DomainError> {
        tasks::ActiveModel {
            id: Set(id.0),
            actual_hours: Set(hours),
            updated_at: Set(Utc::now().fixed_offset()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(())
    }

    async fn dependencies(&self, id: &TaskId) -> Result<Vec<TaskDependency>, DomainError> {
        let results = task_dependencies::Entity::find()
            .filter(task_dependencies::Column::TaskId.eq(id.0))
            .order_by_asc(task_dependencies::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn project_dependencies(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<TaskDependency>, DomainError> {
        let project_tasks = Query::select()
            .column(tasks::Column::Id)
            .from(tasks::Entity)
            .and_where(tasks::Column::ProjectId.eq(project_id.0))
            .to_owned();

        let results = task_dependencies::Entity::find()
            .filter(task_dependencies::Column::TaskId.in_subquery(project_tasks))
            .all(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn add_dependency(
        &self,
        task_id: &TaskId,
        depends_on_id: &TaskId,
        dependency_type: DependencyType,
    ) -> Result<TaskDependency, DomainError> {
        let model = task_dependencies::ActiveModel {
            task_id: Set(task_id.0),
            depends_on_id: Set(depends_on_id.0),
            dependency_type: Set(dependency_type.to_string()),
            created_at: Set(Utc::now().fixed_offset()),
        };

        let result = model.insert(&self.db).await.map_err(|e| {
            let msg = e.to_string();
            if msg.contains("duplicate key") {
                DomainError::AlreadyExists("Dependency already exists".to_string())
            } else {
                DomainError::Database(msg)
            }
        })?;

        Ok(result.into())
    }

    async fn remove_dependency(
        &self,
        task_id: &TaskId,
        depends_on_id: &TaskId,
    ) -> Result<(), DomainError> {
        let result = task_dependencies::Entity::delete_by_id((task_id.0, depends_on_id.0))
            .exec(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound("Dependency not found".to_string()));
        }
        Ok(())
    }
}

/// Convert SeaORM model to domain entity
impl From<tasks::Model> for Task {
    fn from(model: tasks::Model) -> Self {
        Task {
            id: TaskId(model.id),
            project_id: ProjectId(model.project_id),
            title: model.title,
            description: model.description,
            assignee_id: model.assignee_id.map(UserId),
            status: model.status.parse().unwrap_or(TaskStatus::Todo),
            priority: model.priority.parse().unwrap_or(TaskPriority::Medium),
            estimated_hours: model.estimated_hours,
            actual_hours: model.actual_hours,
            due_date: model.due_date,
            started_at: model.started_at.map(|dt| dt.with_timezone(&Utc)),
            completed_at: model.completed_at.map(|dt| dt.with_timezone(&Utc)),
            created_by: UserId(model.created_by),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<task_dependencies::Model> for TaskDependency {
    fn from(model: task_dependencies::Model) -> Self {
        TaskDependency {
            task_id: TaskId(model.task_id),
            depends_on_id: TaskId(model.depends_on_id),
            dependency_type: model
                .dependency_type
                .parse()
                .unwrap_or(DependencyType::Blocks),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

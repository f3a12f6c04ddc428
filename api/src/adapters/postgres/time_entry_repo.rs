//! PostgreSQL adapter for TimeEntryRepository

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, Set,
};

use crate::domain::entities::{
    NewTimeEntry, Page, PageRequest, ProjectId, TaskId, TimeCategory, TimeEntry, TimeEntryFilter,
    TimeEntryId, UserId,
};
use crate::domain::ports::TimeEntryRepository;
use crate::entity::time_entries;
use crate::error::DomainError;

/// PostgreSQL implementation of TimeEntryRepository
pub struct PostgresTimeEntryRepository {
    db: DatabaseConnection,
}

impl PostgresTimeEntryRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn filtered(filter: &TimeEntryFilter) -> Select<time_entries::Entity> {
    let mut query = time_entries::Entity::find();

    if let Some(user) = filter.user_id {
        query = query.filter(time_entries::Column::UserId.eq(user.0));
    }
    if let Some(project) = filter.project_id {
        query = query.filter(time_entries::Column::ProjectId.eq(project.0));
    }
    if let Some(task) = filter.task_id {
        query = query.filter(time_entries::Column::TaskId.eq(task.0));
    }
    if let Some(start) = filter.start_date {
        query = query.filter(time_entries::Column::Date.gte(start));
    }
    if let Some(end) = filter.end_date {
        query = query.filter(time_entries::Column::Date.lte(end));
    }
    if let Some(approved) = filter.is_approved {
        query = query.filter(time_entries::Column::IsApproved.eq(approved));
    }
    if let Some(category) = filter.category {
        query = query.filter(time_entries::Column::Category.eq(category.to_string()));
    }
    query
}

#[async_trait]
impl TimeEntryRepository for PostgresTimeEntryRepository {
    async fn find_by_id(&self, id: &TimeEntryId) -> Result<Option<TimeEntry>, DomainError> {
        let result = time_entries::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.map(|m| m.into()))
    }

    async fn list(
        &self,
        filter: &TimeEntryFilter,
        page: PageRequest,
    ) -> Result<Page<TimeEntry>, DomainError> {
        let query = filtered(filter);

        let total = query
            .clone()
            .count(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        let results = query
            .order_by_desc(time_entries::Column::Date)
            .order_by_desc(time_entries::Column::CreatedAt)
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

    async fn find_all(&self, filter: &TimeEntryFilter) -> Result<Vec<TimeEntry>, DomainError> {
        let results = filtered(filter)
            .order_by_desc(time_entries::Column::Date)
            .all(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn find_duplicate(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
        task_id: Option<&TaskId>,
        date: NaiveDate,
    ) -> Result<Option<TimeEntry>, DomainError> {
        let mut query = time_entries::Entity::find()
            .filter(time_entries::Column::UserId.eq(user_id.0))
            .filter(time_entries::Column::ProjectId.eq(project_id.0))
            .filter(time_entries::Column::Date.eq(date));

        query = match task_id {
            Some(task) => query.filter(time_entries::Column::TaskId.eq(task.0)),
            None => query.filter(time_entries::Column::TaskId.is_null()),
        };

        let result = query
            .one(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.map(|m| m.into()))
    }

    async fn create(&self, entry: &NewTimeEntry) -> Result<TimeEntry, DomainError> {
        let id = TimeEntryId::new();
        let now = Utc::now().fixed_offset();

        let model = time_entries::ActiveModel {
            id: Set(id.0),
            user_id: Set(entry.user_id.0),
            project_id: Set(entry.project_id.0),
            task_id: Set(entry.task_id.map(|t| t.0)),
            hours: Set(entry.hours),
            date: Set(entry.date),
            category: Set(entry.category.to_string()),
            notes: Set(entry.notes.clone()),
            is_approved: Set(false),
            approved_by: Set(None),
            approved_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = model
            .insert(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.into())
    }

    async fn save(&self, entry: &TimeEntry) -> Result<TimeEntry, DomainError> {
        let result = time_entries::ActiveModel {
            id: Set(entry.id.0),
            user_id: Set(entry.user_id.0),
            project_id: Set(entry.project_id.0),
            task_id: Set(entry.task_id.map(|t| t.0)),
            hours: Set(entry.hours),
            date: Set(entry.date),
            category: Set(entry.category.to_string()),
            notes: Set(entry.notes.clone()),
            is_approved: Set(entry.is_approved),
            approved_by: Set(entry.approved_by.map(|u| u.0)),
            approved_at: Set(entry.approved_at.map(|t| t.fixed_offset())),
            created_at: Set(entry.created_at.fixed_offset()),
            updated_at: Set(Utc::now().fixed_offset()),
        }
        .update(&self.db)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.into())
    }

    async fn delete(&self, id: &TimeEntryId) -> Result<(), DomainError> {
        let result = time_entries::Entity::delete_by_id(id.0)
            .exec(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound(format!("Time entry {} not found", id)));
        }
        Ok(())
    }

    async fn total_hours_for_task(&self, task_id: &TaskId) -> Result<f64, DomainError> {
        let total: Option<Option<f64>> = time_entries::Entity::find()
            .select_only()
            .column_as(time_entries::Column::Hours.sum(), "total")
            .filter(time_entries::Column::TaskId.eq(task_id.0))
            .into_tuple()
            .one(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(total.flatten().unwrap_or(0.0))
    }
}

/// Convert SeaORM model to domain entity
impl From<time_entries::Model> for TimeEntry {
    fn from(model: time_entries::Model) -> Self {
        TimeEntry {
            id: TimeEntryId(model.id),
            user_id: UserId(model.user_id),
            project_id: ProjectId(model.project_id),
            task_id: model.task_id.map(TaskId),
            hours: model.hours,
            date: model.date,
            category: model.category.parse().unwrap_or(TimeCategory::Other),
            notes: model.notes,
            is_approved: model.is_approved,
            approved_by: model.approved_by.map(UserId),
            approved_at: model.approved_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

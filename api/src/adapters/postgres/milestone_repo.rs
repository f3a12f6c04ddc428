//! PostgreSQL adapter for MilestoneRepository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::domain::entities::{
    Milestone, MilestoneDependency, MilestoneId, NewMilestone, ProjectId,
};
use crate::domain::ports::MilestoneRepository;
use crate::entity::{milestone_dependencies, milestones};
use crate::error::DomainError;

/// PostgreSQL implementation of MilestoneRepository
pub struct PostgresMilestoneRepository {
    db: DatabaseConnection,
}

impl PostgresMilestoneRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MilestoneRepository for PostgresMilestoneRepository {
    async fn find_by_id(&self, id: &MilestoneId) -> Result<Option<Milestone>, DomainError> {
        let result = milestones::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.map(|m| m.into()))
    }

    async fn list_for_project(
        &self,
        project_id: &ProjectId,
        is_completed: Option<bool>,
    ) -> Result<Vec<Milestone>, DomainError> {
        let mut query =
            milestones::Entity::find().filter(milestones::Column::ProjectId.eq(project_id.0));
        if let Some(completed) = is_completed {
            query = query.filter(milestones::Column::IsCompleted.eq(completed));
        }

        let results = query
            .order_by_asc(milestones::Column::DueDate)
            .all(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn create(&self, milestone: &NewMilestone) -> Result<Milestone, DomainError> {
        let now = Utc::now().fixed_offset();

        let model = milestones::ActiveModel {
            id: Set(MilestoneId::new().0),
            project_id: Set(milestone.project_id.0),
            name: Set(milestone.name.clone()),
            description: Set(milestone.description.clone()),
            due_date: Set(milestone.due_date),
            is_completed: Set(false),
            completed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = model
            .insert(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.into())
    }

    async fn save(&self, milestone: &Milestone) -> Result<Milestone, DomainError> {
        let result = milestones::ActiveModel {
            id: Set(milestone.id.0),
            project_id: Set(milestone.project_id.0),
            name: Set(milestone.name.clone()),
            description: Set(milestone.description.clone()),
            due_date: Set(milestone.due_date),
            is_completed: Set(milestone.is_completed),
            completed_at: Set(milestone.completed_at.map(|t| t.fixed_offset())),
            created_at: Set(milestone.created_at.fixed_offset()),
            updated_at: Set(Utc::now().fixed_offset()),
        }
        .update(&self.db)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.into())
    }

    async fn delete(&self, id: &MilestoneId) -> Result<(), DomainError> {
        // dependency rows go with it through ON DELETE CASCADE
        let result = milestones::Entity::delete_by_id(id.0)
            .exec(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound(format!("Milestone {} not found", id)));
        }
        Ok(())
    }

    async fn project_dependencies(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<MilestoneDependency>, DomainError> {
        let project_milestones = Query::select()
            .column(milestones::Column::Id)
            .from(milestones::Entity)
            .and_where(milestones::Column::ProjectId.eq(project_id.0))
            .to_owned();

        let results = milestone_dependencies::Entity::find()
            .filter(
                milestone_dependencies::Column::DependentMilestoneId.in_subquery(project_milestones),
            )
            .all(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn add_dependency(
        &self,
        dependent_id: &MilestoneId,
        prerequisite_id: &MilestoneId,
    ) -> Result<MilestoneDependency, DomainError> {
        let model = milestone_dependencies::ActiveModel {
            dependent_milestone_id: Set(dependent_id.0),
            prerequisite_milestone_id: Set(prerequisite_id.0),
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
        dependent_id: &MilestoneId,
        prerequisite_id: &MilestoneId,
    ) -> Result<(), DomainError> {
        let result =
            milestone_dependencies::Entity::delete_by_id((dependent_id.0, prerequisite_id.0))
                .exec(&self.db)
                .await
                .map_err(|e| DomainError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound("Dependency not found".to_string()));
        }
        Ok(())
    }
}

impl From<milestones::Model> for Milestone {
    fn from(model: milestones::Model) -> Self {
        Milestone {
            id: MilestoneId(model.id),
            project_id: ProjectId(model.project_id),
            name: model.name,
            description: model.description,
            due_date: model.due_date,
            is_completed: model.is_completed,
            completed_at: model.completed_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<milestone_dependencies::Model> for MilestoneDependency {
    fn from(model: milestone_dependencies::Model) -> Self {
        MilestoneDependency {
            dependent_id: MilestoneId(model.dependent_milestone_id),
            prerequisite_id: MilestoneId(model.prerequisite_milestone_id),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

//! PostgreSQL adapter for ProjectRepository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Select, Set,
};

use crate::domain::entities::{
    NewProject, Page, PageRequest, Project, ProjectFilter, ProjectId, ProjectStatus, TeamMember,
    UserId,
};
use crate::domain::ports::ProjectRepository;
use crate::entity::{project_team_members, projects};
use crate::error::DomainError;

/// PostgreSQL implementation of ProjectRepository
pub struct PostgresProjectRepository {
    db: DatabaseConnection,
}

impl PostgresProjectRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn filtered(filter: &ProjectFilter) -> Select<projects::Entity> {
    let mut query = projects::Entity::find();

    if let Some(member) = filter.member_id {
        query = query
            .join(
                JoinType::InnerJoin,
                projects::Relation::ProjectTeamMembers.def(),
            )
            .filter(project_team_members::Column::UserId.eq(member.0))
            .filter(project_team_members::Column::LeftAt.is_null());
    }
    if let Some(status) = filter.status {
        query = query.filter(projects::Column::Status.eq(status.to_string()));
    }
    if let Some(manager) = filter.manager_id {
        query = query.filter(projects::Column::ManagerId.eq(manager.0));
    }
    if let Some(term) = &filter.search {
        let pattern = super::contains_pattern(term);
        query = query.filter(
            Condition::any()
                .add(Expr::col((projects::Entity, projects::Column::Name)).ilike(pattern.clone()))
                .add(Expr::col((projects::Entity, projects::Column::Description)).ilike(pattern)),
        );
    }
    query
}

#[async_trait]
impl ProjectRepository for PostgresProjectRepository {
    async fn find_by_id(&self, id: &ProjectId) -> Result<Option<Project>, DomainError> {
        let result = projects::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.map(|m| m.into()))
    }

    async fn list(
        &self,
        filter: &ProjectFilter,
        page: PageRequest,
    ) -> Result<Page<Project>, DomainError> {
        let query = filtered(filter);

        let total = query
            .clone()
            .count(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        let results = query
            .order_by_desc(projects::Column::CreatedAt)
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

    async fn find_all(&self, filter: &ProjectFilter) -> Result<Vec<Project>, DomainError> {
        let results = filtered(filter)
            .order_by_desc(projects::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn create(&self, project: &NewProject) -> Result<Project, DomainError> {
        let id = ProjectId::new();
        let now = Utc::now().fixed_offset();

        let model = projects::ActiveModel {
            id: Set(id.0),
            name: Set(project.name.clone()),
            description: Set(project.description.clone()),
            start_date: Set(project.start_date),
            end_date: Set(project.end_date),
            budget: Set(project.budget),
            actual_cost: Set(0.0),
            status: Set(ProjectStatus::Draft.to_string()),
            manager_id: Set(project.manager_id.0),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = model
            .insert(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.into())
    }

    async fn save(&self, project: &Project) -> Result<Project, DomainError> {
        let result = projects::ActiveModel {
            id: Set(project.id.0),
            name: Set(project.name.clone()),
            description: Set(project.description.clone()),
            start_date: Set(project.start_date),
            end_date: Set(project.end_date),
            budget: Set(project.budget),
            actual_cost: Set(project.actual_cost),
            status: Set(project.status.to_string()),
            manager_id: Set(project.manager_id.0),
            created_at: Set(project.created_at.fixed_offset()),
            updated_at: Set(Utc::now().fixed_offset()),
        }
        .update(&self.db)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.into())
    }

    async fn delete(&self, id: &ProjectId) -> Result<(), DomainError> {
        // tasks, memberships and time entries cascade at the schema level
        let result = projects::Entity::delete_by_id(id.0)
            .exec(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound(format!("Project {} not found", id)));
        }
        Ok(())
    }

    async fn members(&self, id: &ProjectId) -> Result<Vec<TeamMember>, DomainError> {
        let results = project_team_members::Entity::find()
            .filter(project_team_members::Column::ProjectId.eq(id.0))
            .order_by_asc(project_team_members::Column::JoinedAt)
            .all(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn find_member(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
    ) -> Result<Option<TeamMember>, DomainError> {
        let result = project_team_members::Entity::find_by_id((project_id.0, user_id.0))
            .one(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.map(|m| m.into()))
    }

    async fn add_member(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
        role: &str,
    ) -> Result<TeamMember, DomainError> {
        let now = Utc::now().fixed_offset();

        let existing = project_team_members::Entity::find_by_id((project_id.0, user_id.0))
            .one(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        let result = match existing {
            Some(member) => {
                let mut active_model = member.into_active_model();
                active_model.role = Set(role.to_string());
                active_model.left_at = Set(None);
                active_model.joined_at = Set(now);
                active_model
                    .update(&self.db)
                    .await
                    .map_err(|e| DomainError::Database(e.to_string()))?
            }
            None => project_team_members::ActiveModel {
                project_id: Set(project_id.0),
                user_id: Set(user_id.0),
                role: Set(role.to_string()),
                joined_at: Set(now),
                left_at: Set(None),
            }
            .insert(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?,
        };

        Ok(result.into())
    }

    async fn remove_member(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
    ) -> Result<(), DomainError> {
        let result = project_team_members::Entity::update_many()
            .col_expr(
                project_team_members::Column::LeftAt,
                Expr::value(Utc::now().fixed_offset()),
            )
            .filter(project_team_members::Column::ProjectId.eq(project_id.0))
            .filter(project_team_members::Column::UserId.eq(user_id.0))
            .filter(project_team_members::Column::LeftAt.is_null())
            .exec(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            Err(DomainError::NotFound(format!(
                "Member not found in project {}",
                project_id
            )))
        } else {
            Ok(())
        }
    }

    async fn project_ids_for_member(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ProjectId>, DomainError> {
        let results = project_team_members::Entity::find()
            .filter(project_team_members::Column::UserId.eq(user_id.0))
            .filter(project_team_members::Column::LeftAt.is_null())
            .all(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(results.into_iter().map(|m| ProjectId(m.project_id)).collect())
    }
}

/// Convert SeaORM model to domain entity
impl From<projects::Model> for Project {
    fn from(model: projects::Model) -> Self {
        Project {
            id: ProjectId(model.id),
            name: model.name,
            description: model.description,
            start_date: model.start_date,
            end_date: model.end_date,
            budget: model.budget,
            actual_cost: model.actual_cost,
            status: model.status.parse().unwrap_or(ProjectStatus::Draft),
            manager_id: UserId(model.manager_id),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<project_team_members::Model> for TeamMember {
    fn from(model: project_team_members::Model) -> Self {
        TeamMember {
            project_id: ProjectId(model.project_id),
            user_id: UserId(model.user_id),
            role: model.role,
            joined_at: model.joined_at.with_timezone(&Utc),
            left_at: model.left_at.map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

//! PostgreSQL adapter for UserRepository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::domain::entities::{
    NewUser, Page, PageRequest, ProfileUpdate, User, UserFilter, UserId, UserRole,
};
use crate::domain::ports::UserRepository;
use crate::entity::users;
use crate::error::DomainError;

/// PostgreSQL implementation of UserRepository
pub struct PostgresUserRepository {
    db: DatabaseConnection,
}

impl PostgresUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn get(&self, id: &UserId) -> Result<users::Model, DomainError> {
        users::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?
            .ok_or_else(|| DomainError::NotFound(format!("User {} not found", id)))
    }
}

fn filter_condition(filter: &UserFilter) -> Condition {
    let mut cond = Condition::all();
    if let Some(role) = filter.role {
        cond = cond.add(users::Column::Role.eq(role.to_string()));
    }
    if let Some(active) = filter.is_active {
        cond = cond.add(users::Column::IsActive.eq(active));
    }
    if let Some(term) = &filter.search {
        let pattern = super::contains_pattern(term);
        cond = cond.add(
            Condition::any()
                .add(Expr::col(users::Column::Email).ilike(pattern.clone()))
                .add(Expr::col(users::Column::FirstName).ilike(pattern.clone()))
                .add(Expr::col(users::Column::LastName).ilike(pattern)),
        );
    }
    cond
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        let result = users::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.map(|m| m.into()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        let result = users::Entity::find()
            .filter(users::Column::Email.eq(email.to_lowercase()))
            .one(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.map(|m| m.into()))
    }

    async fn find_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, DomainError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let results = users::Entity::find()
            .filter(users::Column::Id.is_in(ids.iter().map(|id| id.0)))
            .all(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn list(
        &self,
        filter: &UserFilter,
        page: PageRequest,
    ) -> Result<Page<User>, DomainError> {
        let query = users::Entity::find().filter(filter_condition(filter));

        let total = query
            .clone()
            .count(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        let results = query
            .order_by_asc(users::Column::LastName)
            .order_by_asc(users::Column::FirstName)
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

    async fn create(&self, user: &NewUser) -> Result<User, DomainError> {
        let now = Utc::now().fixed_offset();

        let model = users::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(user.email.to_lowercase()),
            first_name: Set(user.first_name.clone()),
            last_name: Set(user.last_name.clone()),
            password_hash: Set(user.password_hash.clone()),
            role: Set(user.role.to_string()),
            hourly_rate: Set(user.hourly_rate),
            avatar_url: Set(None),
            is_active: Set(true),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = model.insert(&self.db).await.map_err(|e| {
            let msg = e.to_string();
            if msg.contains("duplicate key") {
                DomainError::AlreadyExists(format!("Email {} is already registered", user.email))
            } else {
                DomainError::Database(msg)
            }
        })?;

        Ok(result.into())
    }

    async fn update_profile(
        &self,
        id: &UserId,
        update: &ProfileUpdate,
    ) -> Result<User, DomainError> {
        let current = self.get(id).await?;

        let mut model: users::ActiveModel = current.into();
        if let Some(first) = &update.first_name {
            model.first_name = Set(first.clone());
        }
        if let Some(last) = &update.last_name {
            model.last_name = Set(last.clone());
        }
        if let Some(avatar) = &update.avatar_url {
            model.avatar_url = Set(Some(avatar.clone()));
        }
        model.updated_at = Set(Utc::now().fixed_offset());

        let result = model
            .update(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.into())
    }

    async fn update_role(&self, id: &UserId, role: UserRole) -> Result<User, DomainError> {
        self.get(id).await?;

        let result = users::ActiveModel {
            id: Set(id.0),
            role: Set(role.to_string()),
            updated_at: Set(Utc::now().fixed_offset()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.into())
    }

    async fn set_active(&self, id: &UserId, active: bool) -> Result<User, DomainError> {
        self.get(id).await?;

        let result = users::ActiveModel {
            id: Set(id.0),
            is_active: Set(active),
            updated_at: Set(Utc::now().fixed_offset()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.into())
    }

    async fn update_password(&self, id: &UserId, password_hash: &str) -> Result<(), DomainError> {
        users::ActiveModel {
            id: Set(id.0),
            password_hash: Set(password_hash.to_string()),
            updated_at: Set(Utc::now().fixed_offset()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(())
    }

    async fn touch_last_login(&self, id: &UserId) -> Result<(), DomainError> {
        users::ActiveModel {
            id: Set(id.0),
            last_login_at: Set(Some(Utc::now().fixed_offset())),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(())
    }
}

/// Convert SeaORM model to domain entity
impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        User {
            id: UserId(model.id),
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            password_hash: model.password_hash,
            role: model.role.parse().unwrap_or(UserRole::Developer),
            hourly_rate: model.hourly_rate,
            avatar_url: model.avatar_url,
            is_active: model.is_active,
            last_login_at: model.last_login_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

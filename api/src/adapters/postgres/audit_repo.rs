//! PostgreSQL adapter for AuditLogRepository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, Set,
};

use crate::domain::entities::{
    AuditAction, AuditFilter, AuditLog, AuditLogId, NewAuditLog, Page, PageRequest, UserId,
};
use crate::domain::ports::AuditLogRepository;
use crate::entity::audit_logs;
use crate::error::DomainError;

/// PostgreSQL implementation of AuditLogRepository
pub struct PostgresAuditLogRepository {
    db: DatabaseConnection,
}

impl PostgresAuditLogRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn filtered(filter: &AuditFilter) -> Select<audit_logs::Entity> {
    let mut query = audit_logs::Entity::find();

    if let Some(user) = filter.user_id {
        query = query.filter(audit_logs::Column::UserId.eq(user.0));
    }
    if let Some(action) = filter.action {
        query = query.filter(audit_logs::Column::Action.eq(action.to_string()));
    }
    if let Some(entity_type) = &filter.entity_type {
        query = query.filter(audit_logs::Column::EntityType.eq(entity_type.as_str()));
    }
    if let Some(entity_id) = filter.entity_id {
        query = query.filter(audit_logs::Column::EntityId.eq(entity_id));
    }
    if let Some(start) = filter.start {
        query = query.filter(audit_logs::Column::CreatedAt.gte(start.fixed_offset()));
    }
    if let Some(end) = filter.end {
        query = query.filter(audit_logs::Column::CreatedAt.lte(end.fixed_offset()));
    }
    query
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    async fn create(&self, log: &NewAuditLog) -> Result<AuditLog, DomainError> {
        let model = audit_logs::ActiveModel {
            id: Set(AuditLogId::new().0),
            user_id: Set(log.user_id.map(|u| u.0)),
            action: Set(log.action.to_string()),
            entity_type: Set(log.entity_type.clone()),
            entity_id: Set(log.entity_id),
            old_values: Set(log.old_values.clone()),
            new_values: Set(log.new_values.clone()),
            ip_address: Set(log.ip_address.clone()),
            user_agent: Set(log.user_agent.clone()),
            created_at: Set(Utc::now().fixed_offset()),
        };

        let result = model
            .insert(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.into())
    }

    async fn find_by_id(&self, id: &AuditLogId) -> Result<Option<AuditLog>, DomainError> {
        let result = audit_logs::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.map(|m| m.into()))
    }

    async fn list(
        &self,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<Page<AuditLog>, DomainError> {
        let query = filtered(filter);

        let total = query
            .clone()
            .count(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        let results = query
            .order_by_desc(audit_logs::Column::CreatedAt)
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

    async fn find_all(&self, filter: &AuditFilter) -> Result<Vec<AuditLog>, DomainError> {
        let results = filtered(filter)
            .order_by_desc(audit_logs::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(results.into_iter().map(|m| m.into()).collect())
    }
}

/// Convert SeaORM model to domain entity
impl From<audit_logs::Model> for AuditLog {
    fn from(model: audit_logs::Model) -> Self {
        AuditLog {
            id: AuditLogId(model.id),
            user_id: model.user_id.map(UserId),
            action: model.action.parse().unwrap_or(AuditAction::Update),
            entity_type: model.entity_type,
            entity_id: model.entity_id,
            old_values: model.old_values,
            new_values: model.new_values,
            ip_address: model.ip_address,
            user_agent: model.user_agent,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

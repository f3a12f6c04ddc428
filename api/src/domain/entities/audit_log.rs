//! Audit log domain entity
//!
//! Append-only record of security-relevant and data-changing actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserId;

/// Unique identifier for an audit log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditLogId(pub Uuid);

impl AuditLogId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AuditLogId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for AuditLogId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AuditLogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Login,
    Register,
    Create,
    Update,
    Delete,
    AddMember,
    RemoveMember,
    Approve,
    Reject,
    GrantPermission,
    RevokePermission,
    ChangeRole,
    Activate,
    Deactivate,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::Login => "login",
            AuditAction::Register => "register",
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::AddMember => "add_member",
            AuditAction::RemoveMember => "remove_member",
            AuditAction::Approve => "approve",
            AuditAction::Reject => "reject",
            AuditAction::GrantPermission => "grant_permission",
            AuditAction::RevokePermission => "revoke_permission",
            AuditAction::ChangeRole => "change_role",
            AuditAction::Activate => "activate",
            AuditAction::Deactivate => "deactivate",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "login" => Ok(AuditAction::Login),
            "register" => Ok(AuditAction::Register),
            "create" => Ok(AuditAction::Create),
            "update" => Ok(AuditAction::Update),
            "delete" => Ok(AuditAction::Delete),
            "add_member" => Ok(AuditAction::AddMember),
            "remove_member" => Ok(AuditAction::RemoveMember),
            "approve" => Ok(AuditAction::Approve),
            "reject" => Ok(AuditAction::Reject),
            "grant_permission" => Ok(AuditAction::GrantPermission),
            "revoke_permission" => Ok(AuditAction::RevokePermission),
            "change_role" => Ok(AuditAction::ChangeRole),
            "activate" => Ok(AuditAction::Activate),
            "deactivate" => Ok(AuditAction::Deactivate),
            _ => Err(format!("Unknown audit action: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditLog {
    pub id: AuditLogId,
    pub user_id: Option<UserId>,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub user_id: Option<UserId>,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewAuditLog {
    pub fn new(user_id: Option<UserId>, action: AuditAction, entity_type: &str) -> Self {
        Self {
            user_id,
            action,
            entity_type: entity_type.to_string(),
            entity_id: None,
            old_values: None,
            new_values: None,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn entity(mut self, id: Uuid) -> Self {
        self.entity_id = Some(id);
        self
    }

    pub fn old_values(mut self, values: serde_json::Value) -> Self {
        self.old_values = Some(values);
        self
    }

    pub fn new_values(mut self, values: serde_json::Value) -> Self {
        self.new_values = Some(values);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub user_id: Option<UserId>,
    pub action: Option<AuditAction>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn matches(&self, log: &AuditLog) -> bool {
        if self.user_id.is_some() && self.user_id != log.user_id {
            return false;
        }
        if self.action.is_some_and(|a| a != log.action) {
            return false;
        }
        if let Some(entity_type) = &self.entity_type {
            if entity_type != &log.entity_type {
                return false;
            }
        }
        if self.entity_id.is_some() && self.entity_id != log.entity_id {
            return false;
        }
        if self.start.is_some_and(|s| log.created_at < s) {
            return false;
        }
        if self.end.is_some_and(|e| log.created_at > e) {
            return false;
        }
        true
    }
}

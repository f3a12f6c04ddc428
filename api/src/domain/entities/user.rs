//! User domain entity
//!
//! Users authenticate with email and password and carry a single role that
//! drives permission checks across the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a user within the organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    ProjectManager,
    TeamLead,
    Developer,
    Qa,
    ProductOwner,
    Executive,
}

impl UserRole {
    /// Project managers and executives administer the system
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::ProjectManager | UserRole::Executive)
    }

    /// Roles that supervise other people's work (approvals, user listings)
    pub fn is_manager(&self) -> bool {
        matches!(
            self,
            UserRole::ProjectManager | UserRole::TeamLead | UserRole::Executive
        )
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::ProjectManager => write!(f, "project_manager"),
            UserRole::TeamLead => write!(f, "team_lead"),
            UserRole::Developer => write!(f, "developer"),
            UserRole::Qa => write!(f, "qa"),
            UserRole::ProductOwner => write!(f, "product_owner"),
            UserRole::Executive => write!(f, "executive"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', '-', ' '], "").as_str() {
            "projectmanager" => Ok(UserRole::ProjectManager),
            "teamlead" => Ok(UserRole::TeamLead),
            "developer" => Ok(UserRole::Developer),
            "qa" => Ok(UserRole::Qa),
            "productowner" => Ok(UserRole::ProductOwner),
            "executive" => Ok(UserRole::Executive),
            _ => Err(format!("Unknown user role: {}", s)),
        }
    }
}

/// A registered user
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub hourly_rate: Option<f64>,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn is_manager(&self) -> bool {
        self.role.is_manager()
    }
}

/// Data needed to create a new user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub hourly_rate: Option<f64>,
}

/// Self-service profile changes
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Filters for listing users
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        if self.role.is_some_and(|r| r != user.role) {
            return false;
        }
        if self.is_active.is_some_and(|a| a != user.is_active) {
            return false;
        }
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            let hit = user.email.to_lowercase().contains(&term)
                || user.first_name.to_lowercase().contains(&term)
                || user.last_name.to_lowercase().contains(&term);
            if !hit {
                return false;
            }
        }
        true
    }
}

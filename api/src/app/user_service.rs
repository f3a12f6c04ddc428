//! User service
//!
//! Profile management and the admin operations on accounts.

use std::sync::Arc;

use crate::domain::entities::{Page, PageRequest, ProfileUpdate, User, UserFilter, UserId, UserRole};
use crate::domain::ports::UserRepository;
use crate::error::{AppError, DomainError};

const MAX_NAME_LENGTH: usize = 100;

/// Names must be 1-100 characters after trimming
pub fn validate_name(field: &str, value: &str) -> Result<(), AppError> {
    let len = value.trim().chars().count();
    if len == 0 || len > MAX_NAME_LENGTH {
        return Err(AppError::BadRequest(format!(
            "{} must be between 1 and {} characters",
            field, MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

pub struct UserService<UR>
where
    UR: UserRepository,
{
    users: Arc<UR>,
}

impl<UR> UserService<UR>
where
    UR: UserRepository,
{
    pub fn new(users: Arc<UR>) -> Self {
        Self { users }
    }

    /// List users (managers only)
    pub async fn list(
        &self,
        caller: &User,
        filter: &UserFilter,
        page: PageRequest,
    ) -> Result<Page<User>, AppError> {
        if !caller.is_manager() {
            return Err(AppError::forbidden("Only managers can list users"));
        }
        Ok(self.users.list(filter, page).await?)
    }

    /// A user can read themselves; managers can read anyone
    pub async fn get(&self, caller: &User, id: &UserId) -> Result<User, AppError> {
        if caller.id != *id && !caller.is_manager() {
            return Err(AppError::forbidden("Not enough permissions to view this user"));
        }
        self.load(id).await
    }

    pub async fn update_me(&self, caller: &User, update: ProfileUpdate) -> Result<User, AppError> {
        if let Some(first) = &update.first_name {
            validate_name("First name", first)?;
        }
        if let Some(last) = &update.last_name {
            validate_name("Last name", last)?;
        }
        let update = ProfileUpdate {
            first_name: update.first_name.map(|n| n.trim().to_string()),
            last_name: update.last_name.map(|n| n.trim().to_string()),
            avatar_url: update.avatar_url,
        };
        Ok(self.users.update_profile(&caller.id, &update).await?)
    }

    /// Change a user's role (admins only). Returns the user before and after.
    pub async fn update_role(
        &self,
        caller: &User,
        id: &UserId,
        role: UserRole,
    ) -> Result<(User, User), AppError> {
        if !caller.is_admin() {
            return Err(AppError::forbidden("Only admins can change roles"));
        }
        let before = self.load(id).await?;
        let after = self.users.update_role(id, role).await?;
        tracing::info!(user_id = %id, from = %before.role, to = %role, "Role changed");
        Ok((before, after))
    }

    /// Activate or deactivate an account (admins only)
    pub async fn set_active(
        &self,
        caller: &User,
        id: &UserId,
        active: bool,
    ) -> Result<User, AppError> {
        if !caller.is_admin() {
            return Err(AppError::forbidden("Only admins can change account status"));
        }
        if caller.id == *id && !active {
            return Err(AppError::BadRequest(
                "You cannot deactivate your own account".to_string(),
            ));
        }
        self.load(id).await?;
        Ok(self.users.set_active(id, active).await?)
    }

    async fn load(&self, id: &UserId) -> Result<User, AppError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("User {} not found", id)).into())
    }
}

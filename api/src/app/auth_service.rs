//! Authentication service
//!
//! Handles registration, login, token refresh, logout and password changes.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use super::user_service::validate_name;
use crate::auth::{
    validate_email, validate_password_strength, AccessClaims, PasswordHasher, RevocationList,
    TokenPair, TokenService,
};
use crate::domain::entities::{NewUser, User, UserId, UserRole};
use crate::domain::ports::UserRepository;
use crate::error::{AppError, AuthError, DomainError};

/// Input for self-registration
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Option<UserRole>,
    pub hourly_rate: Option<f64>,
}

/// Result of a token refresh
#[derive(Debug, Clone, Serialize)]
pub struct RefreshedToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Service for credentials and tokens
pub struct AuthService<UR>
where
    UR: UserRepository,
{
    users: Arc<UR>,
    tokens: TokenService,
    hasher: PasswordHasher,
    revoked: Arc<RevocationList>,
    password_min_length: usize,
}

impl<UR> AuthService<UR>
where
    UR: UserRepository,
{
    pub fn new(
        users: Arc<UR>,
        tokens: TokenService,
        hasher: PasswordHasher,
        revoked: Arc<RevocationList>,
        password_min_length: usize,
    ) -> Self {
        Self {
            users,
            tokens,
            hasher,
            revoked,
            password_min_length,
        }
    }

    /// Create an account and log it in
    pub async fn register(&self, input: Registration) -> Result<(User, TokenPair), AppError> {
        let email = input.email.trim().to_lowercase();
        if !validate_email(&email) {
            return Err(AppError::BadRequest("Invalid email format".to_string()));
        }
        validate_name("First name", &input.first_name)?;
        validate_name("Last name", &input.last_name)?;
        self.check_strength(&input.password)?;
        if let Some(rate) = input.hourly_rate {
            if rate < 0.0 || !rate.is_finite() {
                return Err(AppError::BadRequest(
                    "Hourly rate must be a non-negative number".to_string(),
                ));
            }
        }

        // Elevated roles are granted by an admin through /users, never at sign-up
        if matches!(input.role, Some(role) if role != UserRole::Developer) {
            return Err(AppError::forbidden(
                "Self-registration can only create developer accounts",
            ));
        }

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(DomainError::AlreadyExists("Email already registered".to_string()).into());
        }

        let user = self
            .users
            .create(&NewUser {
                email,
                password_hash: self.hasher.hash(&input.password),
                first_name: input.first_name.trim().to_string(),
                last_name: input.last_name.trim().to_string(),
                role: UserRole::Developer,
                hourly_rate: input.hourly_rate,
            })
            .await?;

        let tokens = self.tokens.issue_pair(&user)?;
        tracing::info!(user_id = %user.id, "User registered");
        Ok((user, tokens))
    }

    /// Check credentials and issue a token pair
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, TokenPair), AppError> {
        let email = email.trim().to_lowercase();
        let mut user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.hasher.verify(password, &user.password_hash) {
            tracing::debug!(user_id = %user.id, "Rejected login with wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }
        if !user.is_active {
            return Err(AuthError::InactiveUser.into());
        }

        self.users.touch_last_login(&user.id).await?;
        user.last_login_at = Some(Utc::now());

        let tokens = self.tokens.issue_pair(&user)?;
        Ok((user, tokens))
    }

    /// Trade a refresh token for a new access token
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, AppError> {
        let claims = self
            .tokens
            .verify_refresh(refresh_token)
            .map_err(|_| AuthError::InvalidRefreshToken)?;
        if self.revoked.is_revoked(&claims.jti).await {
            return Err(AuthError::InvalidRefreshToken.into());
        }

        let user = self
            .users
            .find_by_id(&UserId(claims.sub))
            .await?
            .filter(|u| u.is_active)
            .ok_or(AuthError::InvalidRefreshToken)?;

        let (access_token, _) = self.tokens.issue_access(&user)?;
        Ok(RefreshedToken {
            access_token,
            token_type: "bearer",
            expires_in: self.tokens.access_ttl_seconds(),
        })
    }

    /// Revoke the current access token and, when given, a refresh token
    pub async fn logout(&self, claims: &AccessClaims, refresh_token: Option<&str>) {
        self.revoked.revoke(&claims.jti, claims.exp).await;

        if let Some(token) = refresh_token {
            match self.tokens.verify_refresh(token) {
                Ok(refresh) if refresh.sub == claims.sub => {
                    self.revoked.revoke(&refresh.jti, refresh.exp).await
                }
                Ok(_) => tracing::warn!(user_id = %claims.sub, "Refresh token belongs to another user"),
                Err(e) => tracing::debug!(error = %e, "Ignoring invalid refresh token on logout"),
            }
        }
        tracing::info!(user_id = %claims.sub, "User logged out");
    }

    pub async fn change_password(
        &self,
        user: &User,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        if !self.hasher.verify(current_password, &user.password_hash) {
            return Err(AppError::BadRequest(
                "Current password is incorrect".to_string(),
            ));
        }
        if current_password == new_password {
            return Err(AppError::BadRequest(
                "New password must be different from the current password".to_string(),
            ));
        }
        self.check_strength(new_password)?;

        self.users
            .update_password(&user.id, &self.hasher.hash(new_password))
            .await?;
        tracing::info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    /// Resolve an access token to an active user
    pub async fn authenticate(&self, token: &str) -> Result<(User, AccessClaims), AppError> {
        let claims = self.tokens.verify_access(token)?;
        if self.revoked.is_revoked(&claims.jti).await {
            return Err(AuthError::Revoked.into());
        }

        let user = self
            .users
            .find_by_id(&claims.user_id())
            .await?
            .ok_or(AppError::Unauthorized)?;
        if !user.is_active {
            return Err(AuthError::InactiveUser.into());
        }
        Ok((user, claims))
    }

    fn check_strength(&self, password: &str) -> Result<(), AppError> {
        validate_password_strength(password, self.password_min_length).map_err(|failures| {
            AppError::BadRequest(format!(
                "Password does not meet requirements: {}",
                failures.join("; ")
            ))
        })
    }
}

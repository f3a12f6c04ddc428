//! Authentication: tokens, passwords and the request middleware

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod revocation;

pub use jwt::{AccessClaims, JwtAlgorithm, RefreshClaims, TokenPair, TokenService};
pub use middleware::auth_middleware;
pub use password::{validate_email, validate_password_strength, PasswordHasher};
pub use revocation::RevocationList;

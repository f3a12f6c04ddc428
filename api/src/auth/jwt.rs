//! HMAC-signed JSON Web Tokens
//!
//! Compact serialization only: `base64url(header).base64url(claims).base64url(signature)`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha384, Sha512};
use uuid::Uuid;

use crate::domain::entities::{User, UserId, UserRole};
use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;
type HmacSha384 = Hmac<Sha384>;
type HmacSha512 = Hmac<Sha512>;

pub const ACCESS_TOKEN_TYPE: &str = "access";
pub const REFRESH_TOKEN_TYPE: &str = "refresh";

/// Supported signing algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JwtAlgorithm {
    HS256,
    HS384,
    HS512,
}

impl std::fmt::Display for JwtAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtAlgorithm::HS256 => write!(f, "HS256"),
            JwtAlgorithm::HS384 => write!(f, "HS384"),
            JwtAlgorithm::HS512 => write!(f, "HS512"),
        }
    }
}

impl std::str::FromStr for JwtAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "HS256" => Ok(JwtAlgorithm::HS256),
            "HS384" => Ok(JwtAlgorithm::HS384),
            "HS512" => Ok(JwtAlgorithm::HS512),
            _ => Err(format!("Unsupported JWT algorithm: {}", s)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub email: String,
    pub role: UserRole,
    #[serde(rename = "type")]
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl AccessClaims {
    pub fn user_id(&self) -> UserId {
        UserId(self.sub)
    }
}

/// Claims carried by a refresh token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub email: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Access and refresh token returned by login and register
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Issues and verifies tokens with a shared secret
#[derive(Clone)]
pub struct TokenService {
    secret: Vec<u8>,
    algorithm: JwtAlgorithm,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(
        secret: &str,
        algorithm: JwtAlgorithm,
        access_ttl_minutes: i64,
        refresh_ttl_days: i64,
    ) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            algorithm,
            access_ttl: Duration::minutes(access_ttl_minutes),
            refresh_ttl: Duration::days(refresh_ttl_days),
        }
    }

    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    pub fn issue_access(&self, user: &User) -> Result<(String, AccessClaims), AuthError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user.id.0,
            email: user.email.clone(),
            role: user.role,
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
            jti: Uuid::new_v4().simple().to_string(),
        };
        Ok((self.encode(&claims)?, claims))
    }

    pub fn issue_refresh(&self, user: &User) -> Result<(String, RefreshClaims), AuthError> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: user.id.0,
            email: user.email.clone(),
            token_type: REFRESH_TOKEN_TYPE.to_string(),
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
            jti: Uuid::new_v4().simple().to_string(),
        };
        Ok((self.encode(&claims)?, claims))
    }

    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, AuthError> {
        let (access_token, _) = self.issue_access(user)?;
        let (refresh_token, _) = self.issue_refresh(user)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "bearer",
            expires_in: self.access_ttl_seconds(),
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, AuthError> {
        self.decode(token, ACCESS_TOKEN_TYPE, Utc::now().timestamp())
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        self.decode(token, REFRESH_TOKEN_TYPE, Utc::now().timestamp())
    }

    fn encode<T: Serialize>(&self, claims: &T) -> Result<String, AuthError> {
        let header = Header {
            alg: self.algorithm.to_string(),
            typ: "JWT".to_string(),
        };
        let header = serde_json::to_vec(&header).map_err(|_| AuthError::Malformed)?;
        let payload = serde_json::to_vec(claims).map_err(|_| AuthError::Malformed)?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = self.sign(signing_input.as_bytes())?;

        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    fn decode<T: DeserializeOwned>(
        &self,
        token: &str,
        expected_type: &'static str,
        now: i64,
    ) -> Result<T, AuthError> {
        let parts: Vec<&str> = token.split('.').collect();
        let [header_b64, payload_b64, signature_b64] = parts.as_slice() else {
            return Err(AuthError::Malformed);
        };

        let header: Header = URL_SAFE_NO_PAD
            .decode(header_b64)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or(AuthError::Malformed)?;
        if header.alg != self.algorithm.to_string() {
            return Err(AuthError::UnsupportedAlgorithm(header.alg));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::Malformed)?;
        let signing_input = format!("{}.{}", header_b64, payload_b64);
        self.verify_signature(signing_input.as_bytes(), &signature)?;

        let payload: serde_json::Value = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or(AuthError::Malformed)?;

        if payload.get("type").and_then(|t| t.as_str()) != Some(expected_type) {
            return Err(AuthError::WrongType {
                expected: expected_type,
            });
        }
        let exp = payload
            .get("exp")
            .and_then(|e| e.as_i64())
            .ok_or(AuthError::Malformed)?;
        if exp <= now {
            return Err(AuthError::Expired);
        }

        serde_json::from_value(payload).map_err(|_| AuthError::Malformed)
    }

    fn sign(&self, input: &[u8]) -> Result<Vec<u8>, AuthError> {
        let bytes = match self.algorithm {
            JwtAlgorithm::HS256 => {
                let mut mac = HmacSha256::new_from_slice(&self.secret)
                    .map_err(|_| AuthError::InvalidSignature)?;
                mac.update(input);
                mac.finalize().into_bytes().to_vec()
            }
            JwtAlgorithm::HS384 => {
                let mut mac = HmacSha384::new_from_slice(&self.secret)
                    .map_err(|_| AuthError::InvalidSignature)?;
                mac.update(input);
                mac.finalize().into_bytes().to_vec()
            }
            JwtAlgorithm::HS512 => {
                let mut mac = HmacSha512::new_from_slice(&self.secret)
                    .map_err(|_| AuthError::InvalidSignature)?;
                mac.update(input);
                mac.finalize().into_bytes().to_vec()
            }
        };
        Ok(bytes)
    }

    /// Constant-time signature check
    fn verify_signature(&self, input: &[u8], signature: &[u8]) -> Result<(), AuthError> {
        let result = match self.algorithm {
            JwtAlgorithm::HS256 => {
                let mut mac = HmacSha256::new_from_slice(&self.secret)
                    .map_err(|_| AuthError::InvalidSignature)?;
                mac.update(input);
                mac.verify_slice(signature)
            }
            JwtAlgorithm::HS384 => {
                let mut mac = HmacSha384::new_from_slice(&self.secret)
                    .map_err(|_| AuthError::InvalidSignature)?;
                mac.update(input);
                mac.verify_slice(signature)
            }
            JwtAlgorithm::HS512 => {
                let mut mac = HmacSha512::new_from_slice(&self.secret)
                    .map_err(|_| AuthError::InvalidSignature)?;
                mac.update(input);
                mac.verify_slice(signature)
            }
        };
        result.map_err(|_| AuthError::InvalidSignature)
    }
}

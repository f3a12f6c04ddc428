//! Password hashing and credential validation

use std::sync::OnceLock;

use hmac::{Hmac, Mac};
use rand::RngCore;
use regex::Regex;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SCHEME: &str = "pbkdf2_sha256";
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;
const SPECIAL_CHARS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

/// PBKDF2-HMAC-SHA256 hasher.
///
/// Hashes are stored as `pbkdf2_sha256$<iterations>$<salt hex>$<hash hex>`,
/// so raising the iteration count does not invalidate existing hashes.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    iterations: u32,
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let key = pbkdf2_sha256(password.as_bytes(), &salt, self.iterations);
        format!(
            "{}${}${}${}",
            SCHEME,
            self.iterations,
            hex::encode(salt),
            hex::encode(key)
        )
    }

    /// Check a password against a stored hash. Unknown formats never verify.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        let parts: Vec<&str> = stored.split('$').collect();
        let [scheme, iterations, salt, expected] = parts.as_slice() else {
            return false;
        };
        if *scheme != SCHEME {
            return false;
        }
        let (Ok(iterations), Ok(salt), Ok(expected)) = (
            iterations.parse::<u32>(),
            hex::decode(salt),
            hex::decode(expected),
        ) else {
            return false;
        };
        if iterations == 0 {
            return false;
        }

        let key = pbkdf2_sha256(password.as_bytes(), &salt, iterations);
        constant_time_eq(&key, &expected)
    }
}

/// Single-block PBKDF2 (the derived key fits in one SHA-256 output)
fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> [u8; KEY_LEN] {
    let Ok(prf) = HmacSha256::new_from_slice(password) else {
        return [0u8; KEY_LEN];
    };

    let mut mac = prf.clone();
    mac.update(salt);
    mac.update(&1u32.to_be_bytes());
    let mut u = [0u8; KEY_LEN];
    u.copy_from_slice(&mac.finalize().into_bytes());
    let mut output = u;

    for _ in 1..iterations {
        let mut mac = prf.clone();
        mac.update(&u);
        u.copy_from_slice(&mac.finalize().into_bytes());
        for (out, byte) in output.iter_mut().zip(u.iter()) {
            *out ^= byte;
        }
    }
    output
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Check password strength; every failing rule is reported
pub fn validate_password_strength(password: &str, min_length: usize) -> Result<(), Vec<String>> {
    let mut failures = Vec::new();

    if password.chars().count() < min_length {
        failures.push(format!(
            "Password must be at least {} characters long",
            min_length
        ));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        failures.push("Password must contain at least one uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        failures.push("Password must contain at least one lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        failures.push("Password must contain at least one digit".to_string());
    }
    if !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        failures.push("Password must contain at least one special character".to_string());
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]+$").expect("valid email regex")
    })
}

pub fn validate_email(email: &str) -> bool {
    if !email_regex().is_match(email) || email.contains("..") {
        return false;
    }
    email
        .rsplit_once('@')
        .is_some_and(|(_, domain)| domain.contains('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = PasswordHasher::new(1000);
        let hash = hasher.hash("Secret#123");

        assert!(hash.starts_with("pbkdf2_sha256$1000$"));
        assert!(hasher.verify("Secret#123", &hash));
        assert!(!hasher.verify("secret#123", &hash));
    }

    #[test]
    fn test_salts_differ() {
        let hasher = PasswordHasher::new(10);
        assert_ne!(hasher.hash("Secret#123"), hasher.hash("Secret#123"));
    }

    #[test]
    fn test_verify_uses_stored_iterations() {
        let old = PasswordHasher::new(50).hash("Secret#123");
        assert!(PasswordHasher::new(5000).verify("Secret#123", &old));
    }

    #[test]
    fn test_known_vector() {
        // RFC 7914 section 11, first 32 bytes
        let key = pbkdf2_sha256(b"passwd", b"salt", 1);
        assert_eq!(
            hex::encode(key),
            "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc"
        );
    }

    #[test]
    fn test_garbage_hash_never_verifies() {
        let hasher = PasswordHasher::new(10);
        assert!(!hasher.verify("x", ""));
        assert!(!hasher.verify("x", "bcrypt$10$abc$def"));
        assert!(!hasher.verify("x", "pbkdf2_sha256$zz$00$00"));
    }

    #[test]
    fn test_password_strength() {
        assert!(validate_password_strength("Str0ng!pass", 8).is_ok());

        let failures = validate_password_strength("weak", 8).unwrap_err();
        assert_eq!(failures.len(), 4);
        assert!(failures[0].contains("at least 8"));
    }

    #[test]
    fn test_email_validation() {
        assert!(validate_email("jane.doe@example.com"));
        assert!(validate_email("a+b@sub.example.io"));
        assert!(!validate_email("jane..doe@example.com"));
        assert!(!validate_email("jane@localhost"));
        assert!(!validate_email("not-an-email"));
    }
}

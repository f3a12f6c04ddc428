//! In-process token revocation list

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

/// Revoked token ids, each kept until the token itself would expire
#[derive(Debug, Default)]
pub struct RevocationList {
    entries: RwLock<HashMap<String, i64>>,
}

impl RevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke `jti` until `expires_at` (unix seconds); prunes stale entries
    pub async fn revoke(&self, jti: &str, expires_at: i64) {
        let now = Utc::now().timestamp();
        let mut entries = self.entries.write().await;
        entries.retain(|_, exp| *exp > now);
        if expires_at > now {
            entries.insert(jti.to_string(), expires_at);
        }
    }

    pub async fn is_revoked(&self, jti: &str) -> bool {
        self.entries.read().await.contains_key(jti)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_revoke_and_check() {
        let list = RevocationList::new();
        let future = Utc::now().timestamp() + 600;

        list.revoke("abc", future).await;
        assert!(list.is_revoked("abc").await);
        assert!(!list.is_revoked("def").await);
    }

    #[tokio::test]
    async fn test_expired_entries_pruned() {
        let list = RevocationList::new();
        let now = Utc::now().timestamp();

        list.revoke("already-expired", now - 10).await;
        assert!(!list.is_revoked("already-expired").await);

        list.revoke("live", now + 600).await;
        assert_eq!(list.len().await, 1);
    }
}

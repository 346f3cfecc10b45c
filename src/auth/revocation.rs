use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

/// Set of tokens that must no longer authenticate, shared by all request handlers.
pub trait RevocationStore: Send + Sync {
    /// Revokes `token` until `expires_at` (seconds since the epoch). Past that
    /// point the token fails verification anyway and may be forgotten.
    fn revoke(&self, token: &str, expires_at: u64);
    fn is_revoked(&self, token: &str) -> bool;
}

/// Process-local revocation store.
///
/// Membership checks take the read lock only, so concurrent requests never
/// block each other unless a logout is being recorded. Entries whose token has
/// expired are dropped whenever a new revocation is recorded.
#[derive(Debug, Default)]
pub struct InMemoryRevocationStore {
    tokens: RwLock<HashMap<String, u64>>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        match self.tokens.read() {
            Ok(tokens) => tokens.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, token: &str, expires_at: u64, now: u64) {
        // A panic while holding the lock cannot leave the map half-written.
        let mut tokens = match self.tokens.write() {
            Ok(tokens) => tokens,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = tokens.len();
        tokens.retain(|_, exp| *exp > now);
        if tokens.len() < before {
            log::debug!("Pruned {} expired revocations", before - tokens.len());
        }
        if expires_at > now {
            tokens.insert(token.to_string(), expires_at);
        }
    }
}

fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}

impl RevocationStore for InMemoryRevocationStore {
    fn revoke(&self, token: &str, expires_at: u64) {
        self.record(token, expires_at, unix_now());
    }

    fn is_revoked(&self, token: &str) -> bool {
        match self.tokens.read() {
            Ok(tokens) => tokens.contains_key(token),
            Err(poisoned) => poisoned.into_inner().contains_key(token),
        }
    }
}

//! Retrieval of the identity provider's signing keys.
//!
//! Keys are published at `https://{issuer_domain}/.well-known/jwks.json`. By
//! default every verification fetches a fresh key set; `JwksClient::with_cache_ttl`
//! enables a time-bounded snapshot that is refreshed when a token names a key
//! the snapshot does not contain, at most once per `min_refresh_interval`.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::failure::AuthFailure;

/// Public parameters of a single signing key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Jwk {
    #[serde(default)]
    pub kid: Option<String>,
    pub kty: String,
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,
    /// RSA modulus, base64url.
    #[serde(default)]
    pub n: String,
    /// RSA public exponent, base64url.
    #[serde(default)]
    pub e: String,
}

impl Jwk {
    pub fn is_rsa(&self) -> bool {
        self.kty == "RSA" && !self.n.is_empty() && !self.e.is_empty()
    }
}

#[derive(Deserialize)]
struct JwksDocument {
    keys: Vec<Jwk>,
}

/// Immutable snapshot of a JWKS document, indexed by key ID.
///
/// Keys published without a `kid` can never be selected and are dropped.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "JwksDocument")]
pub struct KeySet {
    keys: HashMap<String, Jwk>,
}

impl From<JwksDocument> for KeySet {
    fn from(document: JwksDocument) -> Self {
        let keys = document
            .keys
            .into_iter()
            .filter_map(|key| key.kid.clone().map(|kid| (kid, key)))
            .collect();
        Self { keys }
    }
}

impl KeySet {
    pub fn get(&self, kid: &str) -> Option<&Jwk> {
        self.keys.get(kid)
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Well-known JWKS location for an issuer domain.
pub fn jwks_url(issuer_domain: &str) -> String {
    format!("https://{}/.well-known/jwks.json", issuer_domain)
}

/// Fetches and parses a key set. No retries; any transport, status or parse
/// problem is a `NetworkFailure`.
pub async fn fetch_key_set(client: &reqwest::Client, url: &str) -> Result<KeySet, AuthFailure> {
    log::debug!("Fetching JWKS from {}", url);

    let response = client.get(url).send().await.map_err(|e| {
        log::error!("Failed to fetch JWKS from {}: {}", url, e);
        AuthFailure::NetworkFailure(e.to_string())
    })?;

    if !response.status().is_success() {
        log::error!("JWKS endpoint {} returned {}", url, response.status());
        return Err(AuthFailure::NetworkFailure(format!(
            "JWKS endpoint returned HTTP {}",
            response.status()
        )));
    }

    let key_set: KeySet = response.json().await.map_err(|e| {
        log::error!("Failed to parse JWKS from {}: {}", url, e);
        AuthFailure::NetworkFailure(e.to_string())
    })?;

    log::debug!("Fetched {} signing keys", key_set.len());
    Ok(key_set)
}

/// Shortest gap between two refreshes triggered by an unknown `kid`.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

struct CachedKeySet {
    key_set: Arc<KeySet>,
    fetched_at: Instant,
}

/// Key-set source used by the authenticator.
pub struct JwksClient {
    url: String,
    http_client: reqwest::Client,
    cache_ttl: Option<Duration>,
    min_refresh_interval: Duration,
    cache: RwLock<Option<CachedKeySet>>,
}

impl JwksClient {
    /// Client for the well-known JWKS of `issuer_domain`.
    pub fn for_domain(issuer_domain: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_url(jwks_url(issuer_domain), timeout)
    }

    /// Every request made by the client is bounded by `timeout`; failing to
    /// build such a client is an error rather than a silent fallback.
    pub fn with_url(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            url: url.into(),
            http_client,
            cache_ttl: None,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            cache: RwLock::new(None),
        })
    }

    /// Keeps fetched key sets for `ttl`. A zero TTL leaves caching disabled.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = (!ttl.is_zero()).then_some(ttl);
        self
    }

    /// Limits how often tokens naming an unknown `kid` can force a refetch of
    /// a still-fresh snapshot.
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns a key set expected to contain `kid`.
    ///
    /// Without a cache this always fetches. With a cache, a fresh snapshot that
    /// contains `kid` is reused. A fresh snapshot missing `kid` is replaced only
    /// if it is older than `min_refresh_interval`; otherwise it is returned as is
    /// and verification fails with `KeyNotFound`.
    pub async fn key_set_for(&self, kid: Option<&str>) -> Result<Arc<KeySet>, AuthFailure> {
        let Some(ttl) = self.cache_ttl else {
            return fetch_key_set(&self.http_client, &self.url).await.map(Arc::new);
        };

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                let age = cached.fetched_at.elapsed();
                let has_key = kid.map_or(true, |kid| cached.key_set.contains(kid));
                if age < ttl && has_key {
                    log::debug!("JWKS cache hit");
                    return Ok(Arc::clone(&cached.key_set));
                }
                if age < ttl && age < self.min_refresh_interval {
                    log::debug!("Unknown kid {:?}, JWKS refreshed {:?} ago", kid, age);
                    return Ok(Arc::clone(&cached.key_set));
                }
            }
        }

        let key_set = Arc::new(fetch_key_set(&self.http_client, &self.url).await?);
        log::info!("JWKS cache refreshed with {} keys", key_set.len());

        let mut cache = self.cache.write().await;
        *cache = Some(CachedKeySet {
            key_set: Arc::clone(&key_set),
            fetched_at: Instant::now(),
        });
        Ok(key_set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::test_support::{JWKS_JSON, KID};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_jwks_url() {
        assert_eq!(
            jwks_url("tenant.eu.auth0.com"),
            "https://tenant.eu.auth0.com/.well-known/jwks.json"
        );
    }

    #[test]
    fn test_key_set_deserialization() {
        let key_set: KeySet = serde_json::from_str(JWKS_JSON).unwrap();
        assert_eq!(key_set.len(), 1);

        let key = key_set.get(KID).unwrap();
        assert_eq!(key.kty, "RSA");
        assert_eq!(key.key_use.as_deref(), Some("sig"));
        assert_eq!(key.e, "AQAB");
        assert!(key.is_rsa());
        assert!(key_set.get("other").is_none());
    }

    #[test]
    fn test_key_set_skips_keys_without_kid() {
        let json = r#"{
            "keys": [
                {"kty": "RSA", "n": "abc", "e": "AQAB"},
                {"kty": "EC", "kid": "ec-1", "crv": "P-256", "x": "x", "y": "y"}
            ]
        }"#;

        let key_set: KeySet = serde_json::from_str(json).unwrap();
        assert_eq!(key_set.len(), 1);
        assert!(!key_set.get("ec-1").unwrap().is_rsa());
    }

    async fn mock_jwks(expected_calls: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(JWKS_JSON))
            .expect(expected_calls)
            .mount(&server)
            .await;
        server
    }

    fn client_for(server: &MockServer) -> JwksClient {
        JwksClient::with_url(
            format!("{}/.well-known/jwks.json", server.uri()),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_key_set() {
        let server = mock_jwks(1).await;
        let key_set = fetch_key_set(&reqwest::Client::new(), &client_for(&server).url)
            .await
            .unwrap();
        assert!(key_set.contains(KID));
    }

    #[tokio::test]
    async fn test_fetch_key_set_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = client_for(&server).key_set_for(Some(KID)).await;
        assert!(matches!(result, Err(AuthFailure::NetworkFailure(_))));
    }

    #[tokio::test]
    async fn test_fetch_key_set_invalid_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let result = client_for(&server).key_set_for(Some(KID)).await;
        assert!(matches!(result, Err(AuthFailure::NetworkFailure(_))));
    }

    #[tokio::test]
    async fn test_fetch_key_set_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(JWKS_JSON)
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = JwksClient::with_url(
            format!("{}/.well-known/jwks.json", server.uri()),
            Duration::from_millis(200),
        )
        .unwrap();
        let result = client.key_set_for(Some(KID)).await;
        assert!(matches!(result, Err(AuthFailure::NetworkFailure(_))));
    }

    #[tokio::test]
    async fn test_without_cache_every_call_fetches() {
        let server = mock_jwks(3).await;
        let client = client_for(&server);

        for _ in 0..3 {
            client.key_set_for(Some(KID)).await.unwrap();
        }
        // `expect(3)` is verified when the server drops.
    }

    #[tokio::test]
    async fn test_cache_reuses_snapshot() {
        let server = mock_jwks(1).await;
        let client = client_for(&server).with_cache_ttl(Duration::from_secs(60));

        for _ in 0..3 {
            let key_set = client.key_set_for(Some(KID)).await.unwrap();
            assert!(key_set.contains(KID));
        }
    }

    #[tokio::test]
    async fn test_cache_refetches_for_unknown_kid() {
        let server = mock_jwks(2).await;
        let client = client_for(&server)
            .with_cache_ttl(Duration::from_secs(60))
            .with_min_refresh_interval(Duration::ZERO);

        client.key_set_for(Some(KID)).await.unwrap();
        let key_set = client.key_set_for(Some("rotated-in")).await.unwrap();
        assert!(!key_set.contains("rotated-in"));
    }

    #[tokio::test]
    async fn test_unknown_kids_cannot_force_refetches() {
        let server = mock_jwks(1).await;
        let client = client_for(&server).with_cache_ttl(Duration::from_secs(60));

        client.key_set_for(Some(KID)).await.unwrap();
        for i in 0..5 {
            let kid = format!("made-up-{}", i);
            let key_set = client.key_set_for(Some(&kid)).await.unwrap();
            assert!(!key_set.contains(&kid));
            assert!(key_set.contains(KID));
        }
    }

    #[tokio::test]
    async fn test_unknown_kid_refetches_after_interval() {
        let server = mock_jwks(2).await;
        let client = client_for(&server)
            .with_cache_ttl(Duration::from_secs(60))
            .with_min_refresh_interval(Duration::from_millis(50));

        client.key_set_for(Some(KID)).await.unwrap();
        client.key_set_for(Some("rotated-in")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        client.key_set_for(Some("rotated-in")).await.unwrap();
    }

    #[test]
    fn test_zero_ttl_disables_cache() {
        let client = JwksClient::for_domain("tenant.auth.test", Duration::from_secs(5))
            .unwrap()
            .with_cache_ttl(Duration::ZERO);
        assert!(client.cache_ttl.is_none());
        assert_eq!(client.min_refresh_interval, DEFAULT_MIN_REFRESH_INTERVAL);
        assert_eq!(client.url(), "https://tenant.auth.test/.well-known/jwks.json");
    }
}

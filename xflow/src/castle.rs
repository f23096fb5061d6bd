//! Castle security-token issuance and caching.
//!
//! Castle tokens are short-lived anti-automation proofs required by the
//! identity-submission step. Issuance is rate limited upstream (3 requests
//! per second and 100 per hour without an API key; authenticated callers get
//! a higher quota), so successful issuances are cached for 60 seconds.

use std::sync::Arc;

use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::json;

use crate::config::endpoints;
use crate::transport::{Transport, TransportError};

/// How long an issued token remains consumable.
const CACHE_TTL_MS: i64 = 60_000;

/// Errors from Castle token issuance.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CastleError {
    /// The issuance request failed at the transport layer.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The issuance endpoint answered with a non-success status.
    #[error("issuance rejected with status {0}")]
    Status(u16),

    /// The response carried no usable `token` field.
    #[error("issuance response carried no token")]
    NoToken,
}

/// Wall-clock source, injected so cache expiry is testable without sleeping.
pub trait Clock: Send + Sync {
    /// Current Unix time in milliseconds.
    fn now_ms(&self) -> i64;
}

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A successful issuance. Token and cuid are always replaced together; a
/// caller never observes a token paired with a stale cuid.
#[derive(Debug, Clone)]
struct CacheEntry {
    token: String,
    cuid: String,
    issued_at_ms: i64,
}

impl CacheEntry {
    fn is_valid(&self, now_ms: i64) -> bool {
        now_ms - self.issued_at_ms <= CACHE_TTL_MS
    }
}

/// Generates and time-caches Castle tokens.
///
/// Single-owner, single-writer state: one cache per login attempt, no
/// internal synchronization. Concurrent use from multiple tasks is not
/// supported and must be prevented by the caller.
pub struct CastleTokenCache {
    transport: Arc<dyn Transport>,
    clock: Box<dyn Clock>,
    user_agent: String,
    api_key: Option<String>,
    entry: Option<CacheEntry>,
}

impl CastleTokenCache {
    /// Create a cache issuing over the given transport.
    pub fn new(transport: Arc<dyn Transport>, user_agent: String, api_key: Option<String>) -> Self {
        Self::with_clock(transport, user_agent, api_key, Box::new(SystemClock))
    }

    /// Create a cache with an injected clock.
    pub fn with_clock(
        transport: Arc<dyn Transport>,
        user_agent: String,
        api_key: Option<String>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            transport,
            clock,
            user_agent,
            api_key,
            entry: None,
        }
    }

    /// Return the cached token while it is fresh, otherwise issue a new one.
    pub async fn get_token(&mut self) -> Result<String, CastleError> {
        if let Some(entry) = &self.entry {
            if entry.is_valid(self.clock.now_ms()) {
                return Ok(entry.token.clone());
            }
        }
        self.generate_token().await
    }

    /// Force a fresh issuance regardless of cache state.
    ///
    /// Generates a new 16-byte client identifier, binds it to the session via
    /// `__cuid` cookies on both service domains, then POSTs to the issuance
    /// endpoint. The cache entry is replaced only after a usable token comes
    /// back; a failed issuance leaves the previous entry untouched.
    pub async fn generate_token(&mut self) -> Result<String, CastleError> {
        let mut cuid_bytes = [0u8; 16];
        OsRng.fill_bytes(&mut cuid_bytes);
        let cuid = hex::encode(cuid_bytes);

        self.transport.set_cookie("__cuid", &cuid, ".x.com");
        self.transport.set_cookie("__cuid", &cuid, ".twitter.com");

        let mut headers = vec![
            ("content-type".to_string(), "application/json".to_string()),
            ("user-agent".to_string(), self.user_agent.clone()),
        ];
        if let Some(key) = &self.api_key {
            headers.push(("authorization".to_string(), format!("Bearer {key}")));
        }

        let payload = json!({ "userAgent": self.user_agent, "cuid": cuid }).to_string();
        let resp = self
            .transport
            .post(endpoints::CASTLE_TOKEN, &headers, &[], payload)
            .await?;

        if !(200..300).contains(&resp.status) {
            return Err(CastleError::Status(resp.status));
        }

        let body = resp.json()?;
        let token = body
            .get("token")
            .and_then(|t| t.as_str())
            .filter(|t| !t.is_empty())
            .ok_or(CastleError::NoToken)?
            .to_string();

        self.entry = Some(CacheEntry {
            token: token.clone(),
            cuid,
            issued_at_ms: self.clock.now_ms(),
        });
        Ok(token)
    }

    /// Client identifier from the last successful issuance.
    pub fn cuid(&self) -> Option<&str> {
        self.entry.as_ref().map(|e| e.cuid.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::WireResponse;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeClock(AtomicI64);

    impl FakeClock {
        fn advance_secs(&self, secs: i64) {
            self.0.fetch_add(secs * 1000, Ordering::SeqCst);
        }
    }

    impl Clock for &'static FakeClock {
        fn now_ms(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    /// Transport that answers every POST with the next scripted response and
    /// counts issuance calls.
    struct FakeIssuer {
        responses: Mutex<Vec<WireResponse>>,
        posts: AtomicUsize,
        cookies: Mutex<HashMap<(String, String), String>>,
    }

    impl FakeIssuer {
        fn new(responses: Vec<WireResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
                posts: AtomicUsize::new(0),
                cookies: Mutex::new(HashMap::new()),
            }
        }

        fn issuances(&self) -> usize {
            self.posts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for FakeIssuer {
        async fn get(
            &self,
            _url: &str,
            _headers: &[(String, String)],
        ) -> Result<WireResponse, TransportError> {
            unreachable!("castle cache never issues GETs")
        }

        async fn post(
            &self,
            _url: &str,
            _headers: &[(String, String)],
            _query: &[(String, String)],
            _body: String,
        ) -> Result<WireResponse, TransportError> {
            self.posts.fetch_add(1, Ordering::SeqCst);
            Ok(self.responses.lock().unwrap().remove(0))
        }

        fn cookie(&self, _name: &str) -> Option<String> {
            None
        }

        fn set_cookie(&self, name: &str, value: &str, domain: &str) {
            self.cookies
                .lock()
                .unwrap()
                .insert((domain.to_string(), name.to_string()), value.to_string());
        }
    }

    fn ok(token: &str) -> WireResponse {
        WireResponse {
            status: 200,
            body: format!(r#"{{"token":"{token}"}}"#),
        }
    }

    fn cache_with(
        issuer: &Arc<FakeIssuer>,
        clock: &'static FakeClock,
    ) -> CastleTokenCache {
        CastleTokenCache::with_clock(
            Arc::clone(issuer) as Arc<dyn Transport>,
            "test-agent".to_string(),
            None,
            Box::new(clock),
        )
    }

    fn leak_clock() -> &'static FakeClock {
        Box::leak(Box::new(FakeClock(AtomicI64::new(1_000_000))))
    }

    #[tokio::test]
    async fn cached_token_served_within_ttl() {
        let issuer = Arc::new(FakeIssuer::new(vec![ok("tok-1"), ok("tok-2")]));
        let clock = leak_clock();
        let mut cache = cache_with(&issuer, clock);

        assert_eq!(cache.get_token().await.unwrap(), "tok-1");
        clock.advance_secs(59);
        assert_eq!(cache.get_token().await.unwrap(), "tok-1");
        assert_eq!(issuer.issuances(), 1);
    }

    #[tokio::test]
    async fn expired_token_triggers_exactly_one_issuance() {
        let issuer = Arc::new(FakeIssuer::new(vec![ok("tok-1"), ok("tok-2")]));
        let clock = leak_clock();
        let mut cache = cache_with(&issuer, clock);

        assert_eq!(cache.get_token().await.unwrap(), "tok-1");
        clock.advance_secs(61);
        assert_eq!(cache.get_token().await.unwrap(), "tok-2");
        assert_eq!(issuer.issuances(), 2);
    }

    #[tokio::test]
    async fn generate_token_always_issues() {
        let issuer = Arc::new(FakeIssuer::new(vec![ok("tok-1"), ok("tok-2")]));
        let clock = leak_clock();
        let mut cache = cache_with(&issuer, clock);

        assert_eq!(cache.generate_token().await.unwrap(), "tok-1");
        assert_eq!(cache.generate_token().await.unwrap(), "tok-2");
        assert_eq!(issuer.issuances(), 2);
    }

    #[tokio::test]
    async fn empty_token_field_is_no_token() {
        let issuer = Arc::new(FakeIssuer::new(vec![WireResponse {
            status: 200,
            body: r#"{"token":""}"#.to_string(),
        }]));
        let clock = leak_clock();
        let mut cache = cache_with(&issuer, clock);

        assert!(matches!(
            cache.generate_token().await,
            Err(CastleError::NoToken)
        ));
    }

    #[tokio::test]
    async fn failed_issuance_keeps_previous_entry() {
        let issuer = Arc::new(FakeIssuer::new(vec![
            ok("tok-1"),
            WireResponse {
                status: 500,
                body: String::new(),
            },
        ]));
        let clock = leak_clock();
        let mut cache = cache_with(&issuer, clock);

        assert_eq!(cache.get_token().await.unwrap(), "tok-1");
        let cuid_before = cache.cuid().unwrap().to_string();

        assert!(matches!(
            cache.generate_token().await,
            Err(CastleError::Status(500))
        ));
        // Token and cuid only change together on success.
        assert_eq!(cache.cuid().unwrap(), cuid_before);
        assert_eq!(cache.get_token().await.unwrap(), "tok-1");
    }

    #[tokio::test]
    async fn cuid_cookie_bound_to_both_domains() {
        let issuer = Arc::new(FakeIssuer::new(vec![ok("tok-1")]));
        let clock = leak_clock();
        let mut cache = cache_with(&issuer, clock);

        cache.generate_token().await.unwrap();
        let cuid = cache.cuid().unwrap().to_string();
        assert_eq!(cuid.len(), 32);
        assert!(cuid.chars().all(|c| c.is_ascii_hexdigit()));

        let cookies = issuer.cookies.lock().unwrap();
        assert_eq!(
            cookies.get(&(".x.com".to_string(), "__cuid".to_string())),
            Some(&cuid)
        );
        assert_eq!(
            cookies.get(&(".twitter.com".to_string(), "__cuid".to_string())),
            Some(&cuid)
        );
    }
}

//! HTTP transport seam.
//!
//! All network IO in this crate goes through the [`Transport`] trait so the
//! orchestrator and token cache can be exercised against in-memory fakes.
//!
//! The service fingerprints TLS handshakes, so a production transport must
//! present a browser-like TLS ClientHello in addition to the browser headers
//! the flow already sends. [`HttpTransport`] does not impersonate TLS; it is
//! the reference implementation of the interface, and deployments that need
//! handshake mimicry substitute their own `Transport` behind the same seam.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;

/// Transport-level errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    /// Connection, TLS, timeout, or protocol failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A header pair could not be encoded.
    #[error("invalid header {0}")]
    InvalidHeader(String),

    /// Response body was expected to be JSON but did not parse.
    #[error("invalid json response: {0}")]
    Json(#[from] serde_json::Error),
}

/// A decoded HTTP response.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub body: String,
}

impl WireResponse {
    /// Parse the body as JSON.
    pub fn json(&self) -> Result<serde_json::Value, TransportError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// HTTP transport with per-domain cookie-jar semantics.
///
/// Implementations must enforce finite per-request timeouts; a non-responding
/// endpoint surfaces as [`TransportError::Http`], never an indefinite hang.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<WireResponse, TransportError>;

    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        query: &[(String, String)],
        body: String,
    ) -> Result<WireResponse, TransportError>;

    /// Look up a cookie by name across the service's domains.
    fn cookie(&self, name: &str) -> Option<String>;

    /// Set a cookie scoped to the given domain (e.g. `.x.com`).
    fn set_cookie(&self, name: &str, value: &str, domain: &str);
}

/// reqwest-backed [`Transport`] with a shared cookie jar, finite timeouts,
/// and optional proxying.
pub struct HttpTransport {
    client: reqwest::Client,
    jar: Arc<Jar>,
}

impl HttpTransport {
    /// Build a transport, optionally routed through a proxy URL.
    pub fn new(proxy: Option<&str>) -> Result<Self, TransportError> {
        let jar = Arc::new(Jar::default());
        let mut builder = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30));
        if let Some(url) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(url)?);
        }
        Ok(Self {
            client: builder.build()?,
            jar,
        })
    }
}

fn to_header_map(pairs: &[(String, String)]) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| TransportError::InvalidHeader(name.clone()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| TransportError::InvalidHeader(name.to_string()))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<WireResponse, TransportError> {
        let resp = self
            .client
            .get(url)
            .headers(to_header_map(headers)?)
            .send()
            .await?;
        Ok(WireResponse {
            status: resp.status().as_u16(),
            body: resp.text().await?,
        })
    }

    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        query: &[(String, String)],
        body: String,
    ) -> Result<WireResponse, TransportError> {
        let mut req = self.client.post(url).headers(to_header_map(headers)?);
        if !query.is_empty() {
            req = req.query(query);
        }
        let resp = req.body(body).send().await?;
        Ok(WireResponse {
            status: resp.status().as_u16(),
            body: resp.text().await?,
        })
    }

    fn cookie(&self, name: &str) -> Option<String> {
        for base in ["https://x.com/", "https://twitter.com/"] {
            let url = Url::parse(base).expect("static url");
            let Some(header) = self.jar.cookies(&url) else {
                continue;
            };
            let Ok(joined) = header.to_str() else {
                continue;
            };
            for pair in joined.split("; ") {
                if let Some((k, v)) = pair.split_once('=') {
                    if k == name {
                        return Some(v.to_string());
                    }
                }
            }
        }
        None
    }

    fn set_cookie(&self, name: &str, value: &str, domain: &str) {
        let url = Url::parse(&format!("https://{}/", domain.trim_start_matches('.')))
            .expect("domain forms a valid url");
        self.jar
            .add_cookie_str(&format!("{name}={value}; Domain={domain}; Path=/"), &url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_jar_set_and_lookup() {
        let transport = HttpTransport::new(None).unwrap();
        transport.set_cookie("__cuid", "169c90ba59a6f01cc46e69d2669e080b", ".x.com");
        assert_eq!(
            transport.cookie("__cuid").as_deref(),
            Some("169c90ba59a6f01cc46e69d2669e080b")
        );
        assert_eq!(transport.cookie("missing"), None);
    }

    #[test]
    fn cookie_visible_on_both_domains() {
        let transport = HttpTransport::new(None).unwrap();
        transport.set_cookie("__cuid", "aa", ".x.com");
        transport.set_cookie("__cuid", "aa", ".twitter.com");
        let url = Url::parse("https://twitter.com/").unwrap();
        assert!(transport.jar.cookies(&url).is_some());
    }

    #[test]
    fn invalid_header_name_is_rejected() {
        let pairs = vec![("bad header\n".to_string(), "v".to_string())];
        assert!(matches!(
            to_header_map(&pairs),
            Err(TransportError::InvalidHeader(_))
        ));
    }

    #[test]
    fn invalid_proxy_url_is_rejected() {
        assert!(HttpTransport::new(Some("not a proxy url")).is_err());
    }

    #[test]
    fn wire_response_json_parsing() {
        let resp = WireResponse {
            status: 200,
            body: r#"{"flow_token":"abc"}"#.to_string(),
        };
        assert_eq!(resp.json().unwrap()["flow_token"], "abc");

        let bad = WireResponse {
            status: 200,
            body: "<html>".to_string(),
        };
        assert!(bad.json().is_err());
    }
}

//! Configuration: credentials, encryption secret, proxy, endpoints, headers.

use serde_json::{json, Value};

/// Authentication configuration for the flow endpoints.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Public web-client bearer credential sent on every flow call.
    pub bearer_token: String,
    /// Optional API key for the Castle issuance endpoint (higher quota).
    pub castle_api_key: Option<String>,
    /// Browser user agent used for every request and inside the fingerprint.
    pub user_agent: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bearer_token: "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA".to_string(),
            castle_api_key: None,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36".to_string(),
        }
    }
}

/// Shared secret for the XPFF fingerprint header.
#[derive(Debug, Clone)]
pub struct EncryptionConfig {
    /// Base key material, combined with the session id to derive the AEAD key.
    pub base_key: String,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            base_key: "0e6be1f1e21ffc33590b888fd4dc81b19713e570e805d4e5df80a493c9571a05"
                .to_string(),
        }
    }
}

/// Proxy configuration.
#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    pub url: Option<String>,
}

impl ProxyConfig {
    /// Load proxy settings from environment variables.
    ///
    /// Checks `HTTPS_PROXY` then `HTTP_PROXY` (upper and lower case).
    pub fn from_env() -> Self {
        let url = ["HTTPS_PROXY", "https_proxy", "HTTP_PROXY", "http_proxy"]
            .iter()
            .find_map(|var| std::env::var(var).ok())
            .filter(|v| !v.is_empty());
        Self { url }
    }
}

/// Fixed service endpoints.
pub mod endpoints {
    /// Login entry page; sets the `guest_id` cookie and embeds the guest token.
    pub const LOGIN_PAGE: &str = "https://x.com/i/flow/login";
    /// Home page; references the ondemand script used for transaction ids.
    pub const HOME_PAGE: &str = "https://x.com";
    /// Onboarding flow endpoint.
    pub const ONBOARDING_TASK: &str = "https://api.x.com/1.1/onboarding/task.json";
    /// JS instrumentation challenge script.
    pub const UI_METRICS: &str = "https://twitter.com/i/js_inst?c_name=ui_metrics";
    /// Castle token issuance endpoint.
    pub const CASTLE_TOKEN: &str = "https://castle.botwitter.com/generate-token";
    /// Prefix for the ondemand script resolved from the home page.
    pub const ONDEMAND_BASE: &str = "https://abs.twimg.com/responsive-web/client-web/ondemand.s.";
}

/// Subtask version map required by the flow-initiation payload.
///
/// The service rejects flow initiation when this map is absent or stale, so
/// the full set is pinned here.
pub fn subtask_versions() -> Value {
    json!({
        "action_list": 2,
        "alert_dialog": 1,
        "app_download_cta": 1,
        "check_logged_in_account": 1,
        "choice_selection": 3,
        "contacts_live_sync_permission_prompt": 0,
        "cta": 7,
        "email_verification": 2,
        "end_flow": 1,
        "enter_date": 1,
        "enter_email": 2,
        "enter_password": 5,
        "enter_phone": 2,
        "enter_recaptcha": 1,
        "enter_text": 5,
        "enter_username": 2,
        "generic_urt": 3,
        "in_app_notification": 1,
        "interest_picker": 3,
        "js_instrumentation": 1,
        "menu_dialog": 1,
        "notifications_permission_prompt": 2,
        "open_account": 2,
        "open_home_timeline": 1,
        "open_link": 1,
        "phone_verification": 4,
        "privacy_options": 1,
        "security_key": 3,
        "select_avatar": 4,
        "select_banner": 2,
        "settings_list": 7,
        "show_code": 1,
        "sign_up": 2,
        "sign_up_review": 4,
        "tweet_selection_urt": 1,
        "update_users": 1,
        "upload_media": 1,
        "user_recommendations_list": 4,
        "user_recommendations_urt": 1,
        "wait_spinner": 3,
        "web_modal": 1,
    })
}

/// Request header sets.
pub mod headers {
    /// Headers for document navigation (login page, home page).
    pub fn navigation(user_agent: &str) -> Vec<(String, String)> {
        vec![
            ("accept".into(), "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7".into()),
            ("accept-language".into(), "en-US,en;q=0.9".into()),
            ("cache-control".into(), "no-cache".into()),
            ("pragma".into(), "no-cache".into()),
            ("priority".into(), "u=0, i".into()),
            ("sec-ch-ua".into(), r#""Chromium";v="142", "Google Chrome";v="142", "Not_A Brand";v="99""#.into()),
            ("sec-ch-ua-mobile".into(), "?0".into()),
            ("sec-ch-ua-platform".into(), r#""Windows""#.into()),
            ("sec-fetch-dest".into(), "document".into()),
            ("sec-fetch-mode".into(), "navigate".into()),
            ("sec-fetch-site".into(), "none".into()),
            ("sec-fetch-user".into(), "?1".into()),
            ("upgrade-insecure-requests".into(), "1".into()),
            ("user-agent".into(), user_agent.into()),
        ]
    }

    /// Headers for flow-endpoint API calls: browser impersonation plus the
    /// bearer credential, guest token, per-request transaction id, and the
    /// encrypted XPFF fingerprint.
    pub fn api(
        user_agent: &str,
        bearer_token: &str,
        guest_token: &str,
        xpff: &str,
        transaction_id: &str,
    ) -> Vec<(String, String)> {
        vec![
            ("accept".into(), "*/*".into()),
            ("accept-language".into(), "en-US,en;q=0.9".into()),
            ("authorization".into(), format!("Bearer {bearer_token}")),
            ("cache-control".into(), "no-cache".into()),
            ("content-type".into(), "application/json".into()),
            ("origin".into(), "https://x.com".into()),
            ("pragma".into(), "no-cache".into()),
            ("priority".into(), "u=1, i".into()),
            ("referer".into(), "https://x.com/".into()),
            ("sec-ch-ua".into(), r#""Chromium";v="142", "Google Chrome";v="142", "Not_A Brand";v="99""#.into()),
            ("sec-ch-ua-mobile".into(), "?0".into()),
            ("sec-ch-ua-platform".into(), r#""Windows""#.into()),
            ("sec-fetch-dest".into(), "empty".into()),
            ("sec-fetch-mode".into(), "cors".into()),
            ("sec-fetch-site".into(), "same-site".into()),
            ("user-agent".into(), user_agent.into()),
            ("x-client-transaction-id".into(), transaction_id.into()),
            ("x-guest-token".into(), guest_token.into()),
            ("x-twitter-active-user".into(), "yes".into()),
            ("x-twitter-client-language".into(), "en".into()),
            ("x-xp-forwarded-for".into(), xpff.into()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtask_versions_is_complete() {
        let map = subtask_versions();
        let obj = map.as_object().unwrap();
        assert_eq!(obj.len(), 41);
        assert_eq!(obj["js_instrumentation"], 1);
        assert_eq!(obj["settings_list"], 7);
    }

    #[test]
    fn api_headers_carry_auth_material() {
        let hs = headers::api("ua", "bearer", "guest", "xpffhex", "txid");
        let get = |name: &str| {
            hs.iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get("authorization"), "Bearer bearer");
        assert_eq!(get("x-guest-token"), "guest");
        assert_eq!(get("x-client-transaction-id"), "txid");
        assert_eq!(get("x-xp-forwarded-for"), "xpffhex");
    }
}

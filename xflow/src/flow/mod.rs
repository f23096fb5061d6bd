//! Login-flow orchestration.
//!
//! Four strictly ordered steps, each taking the context produced by its
//! predecessor and returning an updated context or a typed [`FlowError`]:
//!
//! 1. [`FlowOrchestrator::fetch_bootstrap`] - login page, home page, and
//!    ondemand script; yields session id, guest token, and an initialized
//!    transaction-id provider.
//! 2. [`FlowOrchestrator::initialize_flow`] - opens the onboarding flow and
//!    yields the first flow token.
//! 3. [`FlowOrchestrator::submit_js_instrumentation`] - solves and submits
//!    the JS instrumentation challenge.
//! 4. [`FlowOrchestrator::submit_user_identifier`] - submits the identifier
//!    under a 3-attempt budget, forcing a fresh Castle token on each retry.
//!
//! The first failing step aborts the rest; there is no rollback and no
//! cross-step recovery. One orchestrator drives one login attempt.

mod error;
pub mod retry;

pub use error::FlowError;

use std::sync::Arc;

use serde_json::json;

use crate::castle::{CastleTokenCache, Clock, SystemClock};
use crate::config::{endpoints, headers, subtask_versions, AuthConfig, EncryptionConfig};
use crate::extract::extract_between;
use crate::instrumentation::InstrumentationSolver;
use crate::transport::{Transport, WireResponse};
use crate::txid::{TransactionIdProvider, TransactionSigner};
use crate::xpff::XpffCodec;

const STEP_BOOTSTRAP: &str = "fetch_bootstrap";
const STEP_INIT: &str = "initialize_flow";
const STEP_INSTRUMENTATION: &str = "submit_js_instrumentation";

const FLOW_PATH: &str = "/1.1/onboarding/task.json";
const MAX_IDENTIFIER_ATTEMPTS: u32 = 3;

/// Output of step 1: everything later steps need from first contact.
pub struct Bootstrap {
    /// Anonymous session id from the `guest_id` cookie.
    pub session_id: String,
    /// Guest token scraped from the login page body.
    pub guest_token: String,
    /// Per-request transaction-id provider. Absence is tolerated but degrades
    /// requests to an empty transaction id.
    pub provider: Option<Box<dyn TransactionIdProvider>>,
}

/// Flow continuation state, overwritten after each successful exchange.
#[derive(Debug, Clone)]
pub struct FlowState {
    pub flow_token: String,
}

/// Drives one login attempt against the remote service.
pub struct FlowOrchestrator {
    transport: Arc<dyn Transport>,
    auth: AuthConfig,
    codec: XpffCodec,
    castle: CastleTokenCache,
    signer: Box<dyn TransactionSigner>,
    solver: Box<dyn InstrumentationSolver>,
    clock: Box<dyn Clock>,
}

impl FlowOrchestrator {
    pub fn new(
        transport: Arc<dyn Transport>,
        auth: AuthConfig,
        encryption: EncryptionConfig,
        signer: Box<dyn TransactionSigner>,
        solver: Box<dyn InstrumentationSolver>,
    ) -> Self {
        let castle = CastleTokenCache::new(
            Arc::clone(&transport),
            auth.user_agent.clone(),
            auth.castle_api_key.clone(),
        );
        Self {
            codec: XpffCodec::new(encryption.base_key),
            transport,
            auth,
            castle,
            signer,
            solver,
            clock: Box::new(SystemClock),
        }
    }

    /// Run the four steps strictly in order.
    ///
    /// The first failing step aborts the remaining ones; partial state is
    /// abandoned, not rolled back.
    pub async fn execute_login_flow(&mut self, identifier: &str) -> Result<(), FlowError> {
        tracing::info!(identifier, "starting login flow");
        let result = self.run(identifier).await;
        match &result {
            Ok(()) => tracing::info!("login flow completed successfully"),
            Err(e) => tracing::error!(error = %e, "login flow failed"),
        }
        result
    }

    async fn run(&mut self, identifier: &str) -> Result<(), FlowError> {
        let bootstrap = self.fetch_bootstrap().await?;
        let state = self.initialize_flow(&bootstrap).await?;
        let state = self.submit_js_instrumentation(&bootstrap, state).await?;
        self.submit_user_identifier(&bootstrap, &state, identifier)
            .await
    }

    /// Step 1: first contact.
    ///
    /// Fetches the login page (session id cookie + guest token), the home
    /// page, and the ondemand script it references, then initializes the
    /// transaction-id provider from the two documents. Every missing piece
    /// is a hard failure with no retry at this layer.
    pub async fn fetch_bootstrap(&self) -> Result<Bootstrap, FlowError> {
        tracing::info!("step 1: fetching login page");
        let nav = headers::navigation(&self.auth.user_agent);

        let login = self
            .transport
            .get(endpoints::LOGIN_PAGE, &nav)
            .await
            .map_err(|e| FlowError::transport(STEP_BOOTSTRAP, e))?;

        let session_id = self
            .transport
            .cookie("guest_id")
            .filter(|id| !id.is_empty())
            .ok_or(FlowError::MissingSessionId)?;

        let guest_token: String = extract_between(&login.body, "gt=", ";")
            .map(|raw| raw.chars().filter(|c| !c.is_whitespace()).collect())
            .filter(|t: &String| !t.is_empty())
            .ok_or(FlowError::MissingGuestToken)?;

        tracing::info!(session_id = %session_id, "bootstrap tokens acquired");

        let home = self
            .transport
            .get(endpoints::HOME_PAGE, &nav)
            .await
            .map_err(|e| FlowError::transport(STEP_BOOTSTRAP, e))?;

        let script_url = ondemand_script_url(&home.body).ok_or(FlowError::MissingOndemandUrl)?;
        tracing::debug!(url = %script_url, "fetching ondemand script");

        let script = self
            .transport
            .get(&script_url, &nav)
            .await
            .map_err(|e| FlowError::transport(STEP_BOOTSTRAP, e))?;

        let provider = self.signer.init(&home.body, &script.body)?;
        tracing::info!("transaction-id provider initialized");

        Ok(Bootstrap {
            session_id,
            guest_token,
            provider: Some(provider),
        })
    }

    /// Step 2: open the onboarding flow and obtain the first flow token.
    pub async fn initialize_flow(&self, ctx: &Bootstrap) -> Result<FlowState, FlowError> {
        tracing::info!("step 2: initializing login flow");
        let payload = json!({
            "input_flow_data": {
                "flow_context": {
                    "debug_overrides": {},
                    "start_location": { "location": "manual_link" },
                }
            },
            "subtask_versions": subtask_versions(),
        });

        // flow_name rides as a query parameter only on this first call.
        let query = vec![("flow_name".to_string(), "login".to_string())];
        let resp = self
            .transport
            .post(
                endpoints::ONBOARDING_TASK,
                &self.api_headers(ctx),
                &query,
                payload.to_string(),
            )
            .await
            .map_err(|e| FlowError::transport(STEP_INIT, e))?;

        let flow_token = flow_token_from(&resp, STEP_INIT)?;
        tracing::info!("flow initialized");
        Ok(FlowState { flow_token })
    }

    /// Step 3: solve and submit the JS instrumentation challenge.
    pub async fn submit_js_instrumentation(
        &self,
        ctx: &Bootstrap,
        state: FlowState,
    ) -> Result<FlowState, FlowError> {
        tracing::info!("step 3: submitting js instrumentation");
        let script = self
            .transport
            .get(
                endpoints::UI_METRICS,
                &headers::navigation(&self.auth.user_agent),
            )
            .await
            .map_err(|e| FlowError::transport(STEP_INSTRUMENTATION, e))?;

        let response = self.solver.solve(&script.body)?;

        let payload = json!({
            "flow_token": state.flow_token,
            "subtask_inputs": [{
                "subtask_id": "LoginJsInstrumentationSubtask",
                "js_instrumentation": {
                    "response": response,
                    "link": "next_link",
                },
            }],
        });

        let resp = self
            .transport
            .post(
                endpoints::ONBOARDING_TASK,
                &self.api_headers(ctx),
                &[],
                payload.to_string(),
            )
            .await
            .map_err(|e| FlowError::transport(STEP_INSTRUMENTATION, e))?;

        let flow_token = flow_token_from(&resp, STEP_INSTRUMENTATION)?;
        tracing::info!("js instrumentation submitted");
        Ok(FlowState { flow_token })
    }

    /// Step 4: submit the user identifier under the retry budget.
    ///
    /// Attempt 1 consumes the cached-or-fresh Castle token; every retry
    /// forces regeneration first. Success is strictly HTTP 200. Issuance and
    /// transport failures each consume an attempt and are logged rather than
    /// re-raised mid-loop.
    pub async fn submit_user_identifier(
        &mut self,
        ctx: &Bootstrap,
        state: &FlowState,
        identifier: &str,
    ) -> Result<(), FlowError> {
        tracing::info!(identifier, "step 4: submitting user identifier");

        for attempt in 0..MAX_IDENTIFIER_ATTEMPTS {
            let token = if retry::should_force_refresh(attempt) {
                tracing::info!(
                    attempt = attempt + 1,
                    max = MAX_IDENTIFIER_ATTEMPTS,
                    "retrying with a fresh castle token"
                );
                self.castle.generate_token().await
            } else {
                self.castle.get_token().await
            };

            let castle_token = match token {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(attempt = attempt + 1, error = %e, "castle issuance failed");
                    continue;
                }
            };

            let payload = json!({
                "flow_token": state.flow_token,
                "subtask_inputs": [{
                    "subtask_id": "LoginEnterUserIdentifierSSO",
                    "settings_list": {
                        "setting_responses": [{
                            "key": "user_identifier",
                            "response_data": {
                                "text_data": { "result": identifier }
                            },
                        }],
                        "link": "next_link",
                        "castle_token": castle_token,
                    },
                }],
            });

            let outcome = self
                .transport
                .post(
                    endpoints::ONBOARDING_TASK,
                    &self.api_headers(ctx),
                    &[],
                    payload.to_string(),
                )
                .await;

            match outcome {
                Ok(resp) if resp.status == 200 => {
                    tracing::info!("user identifier submitted");
                    return Ok(());
                }
                Ok(resp) => {
                    tracing::warn!(
                        status = resp.status,
                        attempt = attempt + 1,
                        max = MAX_IDENTIFIER_ATTEMPTS,
                        "identifier submission rejected"
                    );
                    tracing::debug!(body = %resp.body, "rejection body");
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %e,
                        "identifier submission transport failure"
                    );
                }
            }
        }

        Err(FlowError::RetriesExhausted {
            attempts: MAX_IDENTIFIER_ATTEMPTS,
        })
    }

    /// Headers for a flow-endpoint call: fresh XPFF fingerprint bound to the
    /// session id plus a freshly minted transaction id.
    fn api_headers(&self, ctx: &Bootstrap) -> Vec<(String, String)> {
        let fingerprint = json!({
            "navigator_properties": {
                "hasBeenActive": "true",
                "userAgent": self.auth.user_agent,
                "webdriver": "false",
            },
            "created_at": self.clock.now_ms(),
        });
        let xpff = self
            .codec
            .encrypt(&fingerprint.to_string(), &ctx.session_id);

        let transaction_id = match &ctx.provider {
            Some(provider) => provider.generate("POST", FLOW_PATH),
            None => {
                tracing::warn!("transaction-id provider absent, sending empty id");
                String::new()
            }
        };

        headers::api(
            &self.auth.user_agent,
            &self.auth.bearer_token,
            &ctx.guest_token,
            &xpff,
            &transaction_id,
        )
    }
}

/// Resolve the ondemand script URL referenced by the home page.
///
/// The page embeds a manifest entry of the form `"ondemand.s":"<hash>"`.
fn ondemand_script_url(home_html: &str) -> Option<String> {
    let hash = extract_between(home_html, "\"ondemand.s\":\"", "\"")?;
    if hash.is_empty() {
        return None;
    }
    Some(format!("{}{hash}a.js", endpoints::ONDEMAND_BASE))
}

/// Pull a non-empty `flow_token` out of a flow response, typed per step.
fn flow_token_from(resp: &WireResponse, step: &'static str) -> Result<String, FlowError> {
    resp.json()
        .ok()
        .and_then(|body| body.get("flow_token")?.as_str().map(str::to_string))
        .filter(|t| !t.is_empty())
        .ok_or(FlowError::MissingFlowToken { step })
}

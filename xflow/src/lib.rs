//! Multi-step X.com login-flow client.
//!
//! The library drives a four-step remote authentication protocol: it fetches
//! session bootstrap tokens, negotiates a stateful onboarding "flow" with the
//! service, and submits the user identifier guarded by an anti-automation
//! Castle token.
//!
//! Network IO goes only through the [`transport::Transport`] trait. External
//! collaborators are injected via traits:
//! - [`transport::Transport`] - HTTP with per-domain cookie-jar semantics
//! - [`txid::TransactionSigner`] - per-request transaction-id derivation
//! - [`instrumentation::InstrumentationSolver`] - JS instrumentation challenge
//! - [`castle::Clock`] - wall-clock source for token-cache expiry
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use xflow::{
//!     AuthConfig, EncryptionConfig, FlowOrchestrator, HttpTransport, Transport,
//! };
//!
//! let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(None)?);
//! let mut orchestrator = FlowOrchestrator::new(
//!     transport,
//!     AuthConfig::default(),
//!     EncryptionConfig::default(),
//!     signer,
//!     solver,
//! );
//! orchestrator.execute_login_flow("someuser").await?;
//! ```

pub mod castle;
pub mod config;
pub mod extract;
pub mod flow;
pub mod instrumentation;
pub mod transport;
pub mod txid;
pub mod xpff;

pub use castle::{CastleError, CastleTokenCache, Clock, SystemClock};
pub use config::{AuthConfig, EncryptionConfig, ProxyConfig};
pub use flow::{FlowError, FlowOrchestrator};
pub use instrumentation::{InstrumentationSolver, SolveError, StaticSolver};
pub use transport::{HttpTransport, Transport, TransportError, WireResponse};
pub use txid::{RandomTransactionSigner, TransactionIdProvider, TransactionSigner, TxIdError};
pub use xpff::{XpffCodec, XpffError};

//! Flow error types.

use crate::instrumentation::SolveError;
use crate::transport::TransportError;
use crate::txid::TxIdError;

/// Errors that abort a login flow.
///
/// Extraction failures (missing session id, guest token, ondemand url, flow
/// token) are always fatal to the attempt and never retried. Transport and
/// status failures are retried only inside the identity-submission loop;
/// everywhere else they are fatal too.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FlowError {
    /// The login response set no `guest_id` cookie.
    #[error("session id missing from login response cookies")]
    MissingSessionId,

    /// The login page body carried no `gt=...;` marker.
    #[error("guest token missing from login page body")]
    MissingGuestToken,

    /// The home page did not reference an ondemand script.
    #[error("ondemand script url missing from home page")]
    MissingOndemandUrl,

    /// The transaction signer rejected the bootstrap documents.
    #[error(transparent)]
    TxId(#[from] TxIdError),

    /// The instrumentation solver could not compute a response.
    #[error(transparent)]
    Solve(#[from] SolveError),

    /// A flow response carried no `flow_token`.
    #[error("no flow_token in {step} response")]
    MissingFlowToken { step: &'static str },

    /// A transport failure outside the retry loop.
    #[error("transport failure during {step}: {source}")]
    Transport {
        step: &'static str,
        source: TransportError,
    },

    /// Identity submission exhausted its attempt budget.
    #[error("identity submission failed after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

impl FlowError {
    pub(crate) fn transport(step: &'static str, source: TransportError) -> Self {
        Self::Transport { step, source }
    }
}

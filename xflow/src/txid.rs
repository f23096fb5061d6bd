//! Per-request transaction-id collaborators.
//!
//! Flow calls carry an `x-client-transaction-id` header derived from two
//! documents fetched during bootstrap: the home page and the `ondemand.s`
//! script it references. Deriving the id requires evaluating that script,
//! which this crate deliberately does not do; instead the derivation is an
//! injected collaborator. The orchestrator fetches the documents and hands
//! them to a [`TransactionSigner`], then stamps every flow request through
//! the resulting [`TransactionIdProvider`].

use rand::rngs::OsRng;
use rand::RngCore;

/// Errors initializing a transaction-id provider.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TxIdError {
    /// The fetched documents did not contain the material the signer needs.
    #[error("transaction signer rejected bootstrap material: {0}")]
    BadMaterial(String),
}

/// Stamps outgoing flow requests with a per-request transaction id.
pub trait TransactionIdProvider: Send + Sync {
    fn generate(&self, method: &str, path: &str) -> String;
}

/// Builds a [`TransactionIdProvider`] from the bootstrap documents.
pub trait TransactionSigner: Send + Sync {
    /// Initialize from the home-page HTML and the ondemand script source.
    fn init(
        &self,
        home_html: &str,
        ondemand_js: &str,
    ) -> Result<Box<dyn TransactionIdProvider>, TxIdError>;
}

/// Simplified stand-in signer producing random ids.
///
/// The ids it emits are well-formed but not derived from the fetched script,
/// so the service may reject them. Content-derived signing is the intended
/// production collaborator; this type exists for wiring and testing.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTransactionSigner;

impl TransactionSigner for RandomTransactionSigner {
    fn init(
        &self,
        _home_html: &str,
        _ondemand_js: &str,
    ) -> Result<Box<dyn TransactionIdProvider>, TxIdError> {
        Ok(Box::new(RandomIdProvider))
    }
}

struct RandomIdProvider;

impl TransactionIdProvider for RandomIdProvider {
    fn generate(&self, _method: &str, _path: &str) -> String {
        let mut bytes = [0u8; 42];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

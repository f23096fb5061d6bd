//! JS instrumentation challenge collaborator.
//!
//! Step 3 of the flow fetches a challenge script and submits a computed
//! response. Solving requires evaluating the script, which this crate does
//! not do; the computation is an injected [`InstrumentationSolver`].

/// Errors computing an instrumentation response.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SolveError {
    /// The script did not match the structure the solver understands.
    #[error("unsolvable instrumentation script: {0}")]
    Unsolvable(String),
}

/// Computes a challenge response from the fetched instrumentation script.
pub trait InstrumentationSolver: Send + Sync {
    fn solve(&self, script: &str) -> Result<String, SolveError>;
}

/// Stand-in solver returning a fixed response regardless of the script.
///
/// Real deployments inject a solver that evaluates the challenge; this type
/// exists for wiring and testing.
#[derive(Debug, Clone, Default)]
pub struct StaticSolver {
    response: String,
}

impl StaticSolver {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

impl InstrumentationSolver for StaticSolver {
    fn solve(&self, _script: &str) -> Result<String, SolveError> {
        Ok(self.response.clone())
    }
}

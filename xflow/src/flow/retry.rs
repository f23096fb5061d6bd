//! Token-refresh policy for the identity-submission retry loop.

/// Whether the given zero-based attempt must force a fresh Castle token.
///
/// The first attempt consumes the cached-or-fresh token; every retry presumes
/// the failure was token-related and forces regeneration before resubmitting.
pub fn should_force_refresh(attempt: u32) -> bool {
    attempt > 0
}

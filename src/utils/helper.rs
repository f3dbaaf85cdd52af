use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

/// `min(base * 2^attempt, max)`, saturating at `max` on overflow.
pub fn exponential_backoff(base: Duration, attempt: u32, max: Duration) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).map_or(max, |delay| delay.min(max))
}

/// Run a user callback, logging its error or panic instead of propagating it.
///
/// Returns `true` when the callback completed successfully.
pub fn run_isolated<F>(label: &str, callback: F) -> bool
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(callback = label, error = %e, "Callback failed");
            false
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            tracing::error!(callback = label, panic = %message, "Callback panicked");
            false
        }
    }
}

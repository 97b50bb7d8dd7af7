//! Retry policy for transient provider failures

use std::thread;
use std::time::Duration;

use tracing::warn;

use super::ProviderError;

/// Backoff schedule between attempts: 100 ms, 400 ms, 1.6 s.
const BACKOFF: [Duration; 3] = [
    Duration::from_millis(100),
    Duration::from_millis(400),
    Duration::from_millis(1600),
];

/// Run a provider call, retrying transient failures up to three times with
/// exponential backoff. Permanent failures are returned immediately.
pub fn with_retries<T>(
    what: &str,
    mut op: impl FnMut() -> Result<T, ProviderError>,
) -> Result<T, ProviderError> {
    let mut last_err = None;
    for (attempt, delay) in std::iter::once(None)
        .chain(BACKOFF.iter().map(Some))
        .enumerate()
    {
        if let Some(delay) = delay {
            thread::sleep(*delay);
        }
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                warn!(what, attempt, error = %err, "transient provider failure");
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    // BACKOFF is non-empty, so at least one error was recorded.
    Err(last_err.unwrap_or(ProviderError::Timeout))
}

//! Bounded retry with exponential backoff.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{SyncError, SyncResult};
use crate::logging::warn;

/// Run `op` up to `max_attempts` times.
///
/// Attempt 1 runs immediately; attempt k waits `base_delay * 2^(k-2)`
/// first, and the wait aborts with [`SyncError::Cancelled`] if the token
/// fires during it. Cancellation-class errors from the operation itself
/// propagate immediately and are never retried. The final failure wraps
/// the last observed error together with the operation name and attempt
/// count.
pub async fn with_retry<F, Fut>(
	name: &str,
	mut op: F,
	max_attempts: u32,
	base_delay: Duration,
	cancel: &CancellationToken,
) -> SyncResult<()>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = SyncResult<()>>,
{
	let max_attempts = max_attempts.max(1);
	let mut attempt = 1;
	loop {
		let err = match op().await {
			Ok(()) => return Ok(()),
			Err(err) => err,
		};
		if err.is_cancelled() {
			return Err(err);
		}
		warn!("{} failed (attempt {}/{}): {}", name, attempt, max_attempts, err);
		if attempt >= max_attempts {
			return Err(SyncError::Transfer {
				name: name.to_string(),
				attempts: max_attempts,
				source: Box::new(err),
			});
		}

		attempt += 1;
		let delay = base_delay * 2u32.pow(attempt - 2);
		warn!("retry {}/{} for {} after {:?}", attempt, max_attempts, name, delay);
		tokio::select! {
			_ = tokio::time::sleep(delay) => {}
			_ = cancel.cancelled() => return Err(SyncError::Cancelled),
		}
	}
}


// vim: ts=4

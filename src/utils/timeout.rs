//! Future racing with a timer.

use std::future::Future;
use std::pin::pin;

use futures::future::{Either, select};
use gloo_timers::future::TimeoutFuture;

/// Result of a future race with timeout.
#[derive(Debug)]
pub enum RaceResult<T> {
    /// The future completed before timeout.
    Completed(T),
    /// Timeout occurred before the future completed.
    TimedOut,
}

/// Race a future against a browser timer.
///
/// # Arguments
/// * `fut` - The future to race against timeout
/// * `timeout_ms` - Timeout duration in milliseconds
pub async fn race_with_timeout<F: Future>(fut: F, timeout_ms: u32) -> RaceResult<F::Output> {
    let fut = pin!(fut);
    match select(fut, TimeoutFuture::new(timeout_ms)).await {
        Either::Left((output, _)) => RaceResult::Completed(output),
        Either::Right(_) => RaceResult::TimedOut,
    }
}

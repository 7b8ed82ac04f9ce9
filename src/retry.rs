use crate::error::{Error, Result};
use crate::exchange::{CallOptions, Venue};
use crate::metrics;
use crate::types::Deadline;
use std::future::Future;
use std::sync::Arc;

/// recvWindow schedule in ms: three re-issues with increasingly wide windows.
pub const DEFAULT_RECV_WINDOW_SCHEDULE_MS: [u64; 3] = [5000, 7000, 10000];

enum State<T> {
    Attempt,
    Classify(Error),
    Resync(Error),
    RetryLoop(Error),
    Done(T),
    Failed(Error),
}

/// Recovers venue calls rejected for clock skew (-1021) or backend timeout
/// (-1007): resync server time once, then re-issue the call with each window
/// of the schedule until one succeeds. Every other failure propagates as is.
#[derive(Clone)]
pub struct RetryPolicy {
    venue: Arc<dyn Venue>,
    schedule: Arc<[u64]>,
}

impl RetryPolicy {
    pub fn new(venue: Arc<dyn Venue>, schedule: Vec<u64>) -> Self {
        Self { venue, schedule: schedule.into() }
    }

    /// Runs `call` under the retry state machine. `call` must re-issue the same
    /// request each time it is invoked; only the options change. Every attempt,
    /// and the resync, is bounded by `deadline`.
    pub async fn execute<T, F, Fut>(&self, op: &'static str, deadline: Deadline, mut call: F) -> Result<T>
    where
        F: FnMut(CallOptions) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut state = State::Attempt;
        loop {
            state = match state {
                State::Attempt => match deadline.run(op, call(CallOptions::default())).await {
                    Ok(v) => State::Done(v),
                    Err(e) => State::Classify(e),
                },
                State::Classify(e) => {
                    if e.is_retryable() {
                        tracing::warn!(op, error = %e, "retryable venue error; resyncing server time");
                        State::Resync(e)
                    } else {
                        State::Failed(e)
                    }
                }
                State::Resync(e) => match deadline.run("sync_server_time", self.venue.sync_server_time()).await {
                    Ok(offset_ms) => {
                        metrics::TIME_RESYNCS.inc();
                        tracing::info!(op, offset_ms, "server time resynced");
                        State::RetryLoop(e)
                    }
                    Err(resync_err) => {
                        tracing::error!(op, error = %resync_err, "server time resync failed");
                        State::Failed(resync_err)
                    }
                },
                State::RetryLoop(mut last) => {
                    let mut done = None;
                    for &window in self.schedule.iter() {
                        metrics::RETRY_ATTEMPTS.with_label_values(&[op]).inc();
                        tracing::info!(op, recv_window_ms = window, "retrying request");
                        match deadline.run(op, call(CallOptions::with_recv_window(window))).await {
                            Ok(v) => {
                                done = Some(v);
                                break;
                            }
                            Err(e @ Error::DeadlineExceeded { .. }) => {
                                last = e;
                                break;
                            }
                            Err(e) => {
                                tracing::warn!(op, recv_window_ms = window, error = %e, "retry attempt failed");
                                last = e;
                            }
                        }
                    }
                    match done {
                        Some(v) => State::Done(v),
                        None => State::Failed(last),
                    }
                }
                State::Done(v) => return Ok(v),
                State::Failed(e) => return Err(e),
            };
        }
    }
}

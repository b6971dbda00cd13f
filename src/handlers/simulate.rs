use axum::{extract::State, http::Uri};
use std::sync::Arc;

use crate::engine::Task;
use crate::metrics::LatencySample;
use crate::AppState;

use super::AppError;

/// Fixed body for every successful response.
pub const SUCCESS_BODY: &str = "success!\n";

// ─── ANY /* ──────────────────────────────────────────────────────

/// Front door: one customer per request. Queues for a service center, waits
/// for its own completion, then hands the latency sample to the log.
pub async fn simulate(
    State(state): State<Arc<AppState>>,
    uri: Uri,
) -> Result<&'static str, AppError> {
    let (task, pending) = Task::new(resource_key(&uri));
    let task_id = pending.task_id();

    state.dispatcher.submit(task).await?;
    tracing::trace!(task = %task_id, queued = state.dispatcher.queued(), "submitted");

    let served = pending.await_completion().await?;
    tracing::trace!(task = %served.task_id, worker = served.worker, "completed");

    // Queued on the log channel; the writer thread does the I/O.
    state
        .latency_log
        .record(LatencySample::from_served(&served, state.dispatcher.service_time()));

    Ok(SUCCESS_BODY)
}

/// The request path and query with the leading slash removed.
pub fn resource_key(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path())
        .trim_start_matches('/')
        .to_owned()
}

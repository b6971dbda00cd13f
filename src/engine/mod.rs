pub mod dispatcher;
pub mod service_center;

pub use dispatcher::{Dispatcher, Pending, ServicePool};

use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::oneshot;
use tokio::time::Instant;
use uuid::Uuid;

/// One request's unit of simulated work, tracked from admission to completion.
///
/// A task is owned by the dispatcher while queued and moved into exactly one
/// service center, which consumes it when it signals completion.
#[derive(Debug)]
pub struct Task {
    pub id: Uuid,
    /// Requested resource, e.g. `albert/the/alligator.html`
    pub key: String,
    /// Monotonic admission time, used for the latency measurement
    pub admitted_at: Instant,
    /// Wall-clock admission time, used for the log timestamp
    pub admitted_wall: DateTime<Local>,
    done: oneshot::Sender<Completion>,
}

impl Task {
    /// Stamps a new task with the current time. Returns the task together with
    /// the handle its request waits on; the two share a private one-shot channel.
    pub fn new(key: impl Into<String>) -> (Self, Pending) {
        let (done, rx) = oneshot::channel();
        let task = Self {
            id: Uuid::new_v4(),
            key: key.into(),
            admitted_at: Instant::now(),
            admitted_wall: Local::now(),
            done,
        };
        let pending = Pending {
            task_id: task.id,
            key: task.key.clone(),
            admitted_at: task.admitted_at,
            admitted_wall: task.admitted_wall,
            rx,
        };
        (task, pending)
    }

    /// Signals completion to the request that submitted this task.
    pub(crate) fn complete(self, worker: usize) {
        let completion = Completion {
            task_id: self.id,
            worker,
            finished_at: Instant::now(),
        };
        if self.done.send(completion).is_err() {
            // The request went away while queued; nothing is waiting for this.
            tracing::debug!(task = %self.id, "completion dropped, requester gone");
        }
    }
}

/// Completion signal delivered to exactly one waiting request.
#[derive(Debug, Clone, Copy)]
pub struct Completion {
    pub task_id: Uuid,
    /// Index of the service center that ran the task. Infinite-server
    /// workers report `usize::MAX`.
    pub worker: usize,
    pub finished_at: Instant,
}

/// What the front door gets back once its task is done.
#[derive(Debug, Clone)]
pub struct Served {
    pub task_id: Uuid,
    pub key: String,
    pub worker: usize,
    pub admitted_wall: DateTime<Local>,
    /// Wall time from admission to completion, queuing included
    pub elapsed: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("service centers have shut down")]
    Closed,
    #[error("task {0} was dropped before it was served")]
    Abandoned(Uuid),
}

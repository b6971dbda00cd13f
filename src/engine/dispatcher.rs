use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use super::service_center::{self, DEDICATED};
use super::{Completion, DispatchError, Served, Task};
use crate::config::{ServerModel, SimConfig};

/// Hands tasks to service centers and lets each request wait for its own.
///
/// In the finite-server model every task goes through one bounded queue that
/// all service centers pull from. In the infinite-server model each task gets
/// a freshly spawned worker and never queues.
///
/// Cheap to clone. The pool keeps serving until every clone is dropped.
#[derive(Clone)]
pub struct Dispatcher {
    queue: Option<flume::Sender<Task>>,
    service_time: Duration,
}

/// Join handles of the service centers behind a [`Dispatcher`].
pub struct ServicePool {
    workers: Vec<JoinHandle<()>>,
}

/// The waiting half of a submitted task.
#[derive(Debug)]
pub struct Pending {
    pub(super) task_id: Uuid,
    pub(super) key: String,
    pub(super) admitted_at: Instant,
    pub(super) admitted_wall: DateTime<Local>,
    pub(super) rx: oneshot::Receiver<Completion>,
}

impl Dispatcher {
    /// Builds the engine for `config` and starts its service centers.
    /// Must be called from within a tokio runtime.
    pub fn new(config: &SimConfig) -> (Self, ServicePool) {
        match config.model {
            ServerModel::Finite => {
                let (tx, rx) = flume::bounded(config.queue_capacity);
                let workers = service_center::spawn_pool(config.servers, config.service_time, rx);
                tracing::info!(
                    servers = config.servers,
                    queue_capacity = config.queue_capacity,
                    service_time_ms = config.service_time.as_secs_f64() * 1000.0,
                    "finite-server pool started"
                );
                let dispatcher = Self {
                    queue: Some(tx),
                    service_time: config.service_time,
                };
                (dispatcher, ServicePool { workers })
            }
            ServerModel::Infinite => {
                tracing::info!(
                    service_time_ms = config.service_time.as_secs_f64() * 1000.0,
                    "infinite-server model, one worker per request"
                );
                let dispatcher = Self {
                    queue: None,
                    service_time: config.service_time,
                };
                (dispatcher, ServicePool { workers: Vec::new() })
            }
        }
    }

    /// Places a task in front of the service centers.
    ///
    /// When the queue is full this waits until a slot frees up. There is no
    /// rejection and no timeout.
    pub async fn submit(&self, task: Task) -> Result<(), DispatchError> {
        match &self.queue {
            Some(tx) => tx.send_async(task).await.map_err(|_| DispatchError::Closed),
            None => {
                let service_time = self.service_time;
                tokio::spawn(service_center::serve(DEDICATED, task, service_time));
                Ok(())
            }
        }
    }

    /// A finite-server dispatcher whose pool is already gone.
    #[cfg(test)]
    pub(crate) fn closed(service_time: Duration) -> Self {
        let (tx, _) = flume::bounded(1);
        Self {
            queue: Some(tx),
            service_time,
        }
    }

    /// Tasks accepted but not yet picked up by a service center.
    pub fn queued(&self) -> usize {
        self.queue.as_ref().map_or(0, |tx| tx.len())
    }

    pub fn service_time(&self) -> Duration {
        self.service_time
    }
}

impl ServicePool {
    /// Waits until every `Dispatcher` clone is dropped and the service centers
    /// have finished what they already accepted.
    pub async fn join(self) {
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::warn!("service center ended abnormally: {e}");
            }
        }
    }
}

impl Pending {
    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    /// Waits until the service center holding this task signals it done.
    pub async fn await_completion(self) -> Result<Served, DispatchError> {
        let completion = self
            .rx
            .await
            .map_err(|_| DispatchError::Abandoned(self.task_id))?;
        debug_assert_eq!(completion.task_id, self.task_id);

        Ok(Served {
            task_id: self.task_id,
            key: self.key,
            worker: completion.worker,
            admitted_wall: self.admitted_wall,
            elapsed: completion.finished_at.duration_since(self.admitted_at),
        })
    }
}

use std::time::Duration;

use tokio::task::JoinHandle;

use super::Task;

/// Worker index reported by the per-request workers of the infinite-server model.
pub const DEDICATED: usize = usize::MAX;

/// Starts `count` service centers sharing one intake queue. Whichever center is
/// free first takes the next task.
pub fn spawn_pool(
    count: usize,
    service_time: Duration,
    queue: flume::Receiver<Task>,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|id| {
            let queue = queue.clone();
            tokio::spawn(async move {
                run(id, service_time, queue).await;
            })
        })
        .collect()
}

/// Serves tasks one at a time until every sender is gone and the queue is empty.
pub async fn run(id: usize, service_time: Duration, queue: flume::Receiver<Task>) {
    tracing::debug!(worker = id, "service center started");
    while let Ok(task) = queue.recv_async().await {
        serve(id, task, service_time).await;
    }
    tracing::debug!(worker = id, "service center stopped");
}

/// The synthetic work step: hold the task for the service time, then signal it.
pub async fn serve(worker: usize, task: Task, service_time: Duration) {
    tracing::trace!(worker, task = %task.id, key = %task.key, "serving");
    tokio::time::sleep(service_time).await;
    task.complete(worker);
}

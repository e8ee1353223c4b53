//! Bounded fan-out / fan-in over tokio tasks.
//!
//! [`WorkerPool::dispatch`] spawns one task per job; each task waits for a
//! permit from a semaphore shared by every clone of the pool, so the total
//! number of running jobs across all crawls and refreshes never exceeds the
//! configured concurrency. [`WorkerPool::join`] waits for every handle. A
//! failing or panicking task never cancels its siblings.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Shared concurrency bound for scrape tasks.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    concurrency: usize,
}

/// A dispatched job. `label` identifies it if the task dies.
#[derive(Debug)]
pub struct TaskHandle<T> {
    label: String,
    handle: JoinHandle<T>,
}

/// What a joined task produced.
#[derive(Debug)]
pub enum Joined<T> {
    Done(T),
    /// The task panicked or was aborted before producing a value.
    Lost { label: String, reason: String },
}

impl WorkerPool {
    #[must_use]
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            permits: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        }
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Spawns every job immediately; each runs once it holds a permit.
    #[must_use = "dropping the handles detaches the tasks and loses their results"]
    pub fn dispatch<T, Fut, I>(&self, jobs: I) -> Vec<TaskHandle<T>>
    where
        I: IntoIterator<Item = (String, Fut)>,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        jobs.into_iter()
            .map(|(label, job)| {
                let permits = Arc::clone(&self.permits);
                let handle = tokio::spawn(async move {
                    // The semaphore is never closed, so acquire only fails if
                    // that invariant is broken; run unbounded rather than drop
                    // the job.
                    let _permit = permits.acquire_owned().await.ok();
                    job.await
                });
                TaskHandle { label, handle }
            })
            .collect()
    }

    /// Waits for all handles, in dispatch order.
    pub async fn join<T>(handles: Vec<TaskHandle<T>>) -> Vec<Joined<T>> {
        let (labels, handles): (Vec<String>, Vec<JoinHandle<T>>) =
            handles.into_iter().map(|h| (h.label, h.handle)).unzip();

        futures::future::join_all(handles)
            .await
            .into_iter()
            .zip(labels)
            .map(|(result, label)| match result {
                Ok(value) => Joined::Done(value),
                Err(e) => {
                    tracing::error!(task = %label, error = %e, "worker task lost");
                    Joined::Lost {
                        label,
                        reason: format!("worker task failed: {e}"),
                    }
                }
            })
            .collect()
    }
}

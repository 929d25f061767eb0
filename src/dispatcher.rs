//! Serialized task execution
//!
//! All relay state lives behind a single worker task: jobs are closures
//! queued over an unbounded channel and run strictly in submission
//! order. State transitions therefore never race each other, and the
//! structures the worker owns need no locks at all.
//!
//! ```text
//!   connection tasks          ┌──────────────────────┐
//!   interval tasks   ── tx ──►│ worker: loop {       │
//!   game integration         │   job(&mut state)    │
//!                             │ }                    │
//!                             └──────────────────────┘
//! ```

use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

/// Handle to a serialized state worker
///
/// Cloneable; every clone feeds the same queue. The worker exits once
/// all handles are dropped and the queue has drained.
pub struct Dispatcher<S> {
    tx: mpsc::UnboundedSender<Job<S>>,
}

impl<S> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S: Send + 'static> Dispatcher<S> {
    /// Spawn the worker task owning `state`
    ///
    /// The returned join handle yields the final state after shutdown,
    /// which tests use to inspect it.
    pub fn spawn(state: S) -> (Self, tokio::task::JoinHandle<S>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job<S>>();

        let worker = tokio::spawn(async move {
            let mut state = state;
            while let Some(job) = rx.recv().await {
                job(&mut state);
            }
            state
        });

        (Self { tx }, worker)
    }

    /// Queue a job without waiting for it
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        if self.tx.send(Box::new(job)).is_err() {
            tracing::warn!("Dispatcher gone, job dropped");
        }
    }

    /// Queue a job and wait for its return value
    pub async fn call<F, R>(&self, job: F) -> Result<R>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(move |state| {
            let _ = tx.send(job(state));
        });
        rx.await.map_err(|_| Error::DispatcherGone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_jobs_run_in_submission_order() {
        let (dispatcher, worker) = Dispatcher::spawn(Vec::<u32>::new());

        for i in 0..100 {
            dispatcher.submit(move |log| log.push(i));
        }

        drop(dispatcher);
        let log = worker.await.unwrap();
        assert_eq!(log, (0..100).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_call_returns_value() {
        let (dispatcher, _worker) = Dispatcher::spawn(5u64);

        let doubled = dispatcher
            .call(|state| {
                *state *= 2;
                *state
            })
            .await
            .unwrap();
        assert_eq!(doubled, 10);
    }

    #[tokio::test]
    async fn test_call_sees_prior_submits() {
        let (dispatcher, _worker) = Dispatcher::spawn(0u64);

        for _ in 0..50 {
            dispatcher.submit(|count| *count += 1);
        }

        let count = dispatcher.call(|count| *count).await.unwrap();
        assert_eq!(count, 50);
    }

    #[tokio::test]
    async fn test_call_after_worker_gone() {
        let (dispatcher, worker) = Dispatcher::spawn(0u64);
        worker.abort();
        let _ = worker.await;

        let result = dispatcher.call(|count| *count).await;
        assert!(matches!(result, Err(Error::DispatcherGone)));
    }

    #[tokio::test]
    async fn test_clones_share_the_queue() {
        let (dispatcher, _worker) = Dispatcher::spawn(0u64);
        let other = dispatcher.clone();

        dispatcher.submit(|count| *count += 1);
        other.submit(|count| *count += 1);

        let count = dispatcher.call(|count| *count).await.unwrap();
        assert_eq!(count, 2);
    }
}

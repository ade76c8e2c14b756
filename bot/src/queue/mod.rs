//! Delayed job queue

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::errors::DispatchError;
use crate::models::job::Job;

/// Scheduling primitive for deferred work
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Deliver `job` to the executor after `delay`. Returns without waiting.
    async fn enqueue(&self, job: Job, delay: Duration) -> Result<(), DispatchError>;

    /// Delayed jobs still waiting for their delay to pass
    fn pending(&self) -> usize {
        0
    }
}

/// In-process queue delivering jobs through an mpsc channel
#[derive(Clone)]
pub struct TokioJobQueue {
    sender: mpsc::UnboundedSender<Job>,
    pending: Arc<AtomicUsize>,
}

impl TokioJobQueue {
    /// Create a queue and the receiver the executor worker drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Job>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue = Self {
            sender,
            pending: Arc::new(AtomicUsize::new(0)),
        };
        (queue, receiver)
    }
}

#[async_trait]
impl JobQueue for TokioJobQueue {
    async fn enqueue(&self, job: Job, delay: Duration) -> Result<(), DispatchError> {
        if self.sender.is_closed() {
            return Err(DispatchError::QueueError(format!(
                "queue closed, dropping {} job",
                job.kind()
            )));
        }

        debug!("Enqueueing {} job in {:?}", job.kind(), delay);

        if delay.is_zero() {
            return self
                .sender
                .send(job)
                .map_err(|e| DispatchError::QueueError(e.to_string()));
        }

        let sender = self.sender.clone();
        let pending = self.pending.clone();
        pending.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            pending.fetch_sub(1, Ordering::SeqCst);
            if let Err(e) = sender.send(job) {
                warn!("Dropping delayed {} job: queue closed", e.0.kind());
            }
        });

        Ok(())
    }

    fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

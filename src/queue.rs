//! Per-channel request queue: serializes provider calls within a channel or
//! thread while letting unrelated channels run fully in parallel.
//!
//! Grounded on the teacher's `agent::channel::Channel::run` — one lazily
//! spawned tokio task per channel draining an `mpsc::Receiver` in a loop —
//! generalized from "one LLM turn per channel" to "one provider job per
//! channel/thread", and dropping the coalescing/retrigger machinery the
//! spec doesn't call for.

use crate::error::{ProviderError, Result};
use crate::ids::{ChannelId, ThreadId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};

/// A unit of work submitted to a channel's queue: an async closure producing
/// a `BuiltContext`-driven provider call, plus the channel back to the
/// caller.
type JobFn = Box<dyn FnOnce() -> futures::future::BoxFuture<'static, Result<String>> + Send>;

struct Job {
    run: JobFn,
    reply: oneshot::Sender<Result<String>>,
    deadline: Duration,
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct QueueKey {
    channel: ChannelId,
    thread: Option<ThreadId>,
}

/// Owns one worker task per channel/thread, created on first use.
pub struct RequestQueue {
    workers: Mutex<HashMap<QueueKey, mpsc::Sender<Job>>>,
    default_deadline: Duration,
}

impl RequestQueue {
    pub fn new(default_deadline: Duration) -> Self {
        Self {
            workers: Mutex::new(HashMap::new()),
            default_deadline,
        }
    }

    /// Submit a job to the queue for `(channel, thread)`, spawning that
    /// channel's worker task if this is its first job. Jobs for the same
    /// key run strictly FIFO; jobs for different keys run concurrently.
    pub async fn submit<F>(&self, channel: &ChannelId, thread: Option<&ThreadId>, job: F) -> Result<String>
    where
        F: FnOnce() -> futures::future::BoxFuture<'static, Result<String>> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let sender = self.sender_for(channel, thread).await;

        sender
            .send(Job {
                run: Box::new(job),
                reply: reply_tx,
                deadline: self.default_deadline,
            })
            .await
            .map_err(|_| ProviderError::Failed("channel worker is gone".into()))?;

        reply_rx
            .await
            .map_err(|_| ProviderError::Failed("channel worker dropped the job".into()))?
    }

    async fn sender_for(&self, channel: &ChannelId, thread: Option<&ThreadId>) -> mpsc::Sender<Job> {
        let key = QueueKey {
            channel: channel.clone(),
            thread: thread.cloned(),
        };

        let mut workers = self.workers.lock().await;
        if let Some(sender) = workers.get(&key) {
            return sender.clone();
        }

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(run_worker(rx));
        workers.insert(key, tx.clone());
        tx
    }
}

/// FIFO drain loop for a single channel/thread's jobs. No retries: a failed
/// or cancelled job is reported to its caller and the worker moves on.
async fn run_worker(mut rx: mpsc::Receiver<Job>) {
    while let Some(job) = rx.recv().await {
        let outcome = match tokio::time::timeout(job.deadline, (job.run)()).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Cancelled.into()),
        };
        let _ = job.reply.send(outcome);
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

/// Shared handle type callers actually hold.
pub type SharedQueue = Arc<RequestQueue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn jobs_for_the_same_channel_run_in_submission_order() {
        let queue = RequestQueue::new(Duration::from_secs(5));
        let channel = ChannelId::from("c1");
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = order.clone();
            queue
                .submit(&channel, None, move || {
                    Box::pin(async move {
                        order.lock().await.push(i);
                        Ok(i.to_string())
                    })
                })
                .await
                .unwrap();
        }

        assert_eq!(*order.lock().await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn a_job_exceeding_its_deadline_is_cancelled() {
        let queue = RequestQueue::new(Duration::from_millis(10));
        let channel = ChannelId::from("c1");

        let result = queue
            .submit(&channel, None, || {
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok("too slow".to_string())
                })
            })
            .await;

        assert!(matches!(
            result,
            Err(crate::error::Error::Provider(ProviderError::Cancelled))
        ));
    }

    #[tokio::test]
    async fn different_channels_run_independently() {
        let queue = RequestQueue::new(Duration::from_secs(5));
        let a = ChannelId::from("a");
        let b = ChannelId::from("b");

        let ra = queue.submit(&a, None, || Box::pin(async { Ok("a".to_string()) }));
        let rb = queue.submit(&b, None, || Box::pin(async { Ok("b".to_string()) }));
        let (ra, rb) = tokio::join!(ra, rb);
        assert_eq!(ra.unwrap(), "a");
        assert_eq!(rb.unwrap(), "b");
    }
}

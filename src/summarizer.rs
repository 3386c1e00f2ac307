//! Background answer summarization.
//!
//! Answers are summarized off the request path: the streaming orchestrator
//! enqueues a [`SummaryJob`] on a bounded channel and a fixed pool of tokio
//! tasks drains it. Failures are logged and dropped; nothing flows back to the
//! request that produced the answer.

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::error_handling::types::TutorError;
use crate::storage::Storage;
use crate::upstream::{CompletionRequest, TextCompletion};

const SUMMARY_PROMPT: &str =
    "summarize the following text into a concise summary, without repeating the text";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryJob {
    pub question_id: i32,
    pub answer: String,
}

pub struct Summarizer {
    completion: Arc<dyn TextCompletion>,
    storage: Arc<dyn Storage>,
    model: Option<String>,
}

impl Summarizer {
    pub fn new(
        completion: Arc<dyn TextCompletion>,
        storage: Arc<dyn Storage>,
        model: Option<String>,
    ) -> Self {
        Self {
            completion,
            storage,
            model,
        }
    }

    /// Condenses the answer with one completion call and stores the result.
    pub async fn summarize(&self, job: &SummaryJob) -> Result<String, TutorError> {
        let mut request = CompletionRequest::new(SUMMARY_PROMPT, job.answer.clone());
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }
        let summary = self.completion.complete(&request).await?;
        self.storage.set_summary(job.question_id, &summary).await?;
        Ok(summary)
    }
}

/// Producer side of the summary channel.
#[derive(Clone)]
pub struct SummaryQueue {
    sender: mpsc::Sender<SummaryJob>,
}

impl SummaryQueue {
    pub fn new(sender: mpsc::Sender<SummaryJob>) -> Self {
        Self { sender }
    }

    /// Schedules a job without waiting. Returns false if it was dropped
    /// because the queue is full or closed.
    pub fn enqueue(&self, job: SummaryJob) -> bool {
        let question_id = job.question_id;
        match self.sender.try_send(job) {
            Ok(()) => {
                debug!("[q:{}] summary job queued", question_id);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("[q:{}] summary queue full, dropping job", question_id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!("[q:{}] summary workers are gone, dropping job", question_id);
                false
            }
        }
    }
}

/// Starts `workers` summary tasks sharing one bounded queue of `capacity` jobs.
///
/// Workers exit once every [`SummaryQueue`] clone has been dropped.
pub fn spawn_workers(
    summarizer: Arc<Summarizer>,
    workers: usize,
    capacity: usize,
) -> (SummaryQueue, Vec<JoinHandle<()>>) {
    let (sender, receiver) = mpsc::channel::<SummaryJob>(capacity);
    let receiver = Arc::new(Mutex::new(receiver));

    let handles = (0..workers)
        .map(|worker| {
            let receiver = receiver.clone();
            let summarizer = summarizer.clone();
            tokio::spawn(async move {
                loop {
                    // Only hold the lock while waiting for the next job
                    let next = receiver.lock().await.recv().await;
                    let Some(job) = next else {
                        debug!("Summary worker {} stopping", worker);
                        break;
                    };
                    match summarizer.summarize(&job).await {
                        Ok(summary) => info!(
                            "[q:{}] summary stored ({} chars)",
                            job.question_id,
                            summary.chars().count()
                        ),
                        Err(e) => error!("[q:{}] summarization failed: {}", job.question_id, e),
                    }
                }
            })
        })
        .collect();

    info!("Started {} summary workers (queue capacity {})", workers, capacity);
    (SummaryQueue::new(sender), handles)
}

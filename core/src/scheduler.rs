/// Deferred insight analysis
///
/// Each conversation gets one worker task fed through an unbounded FIFO
/// queue. Jobs carry their due instant (append time + fixed delay); the
/// worker handles them strictly in queue order, so insights for message N
/// become visible before those for message N+1. Cancelling stops the worker
/// and drops whatever is still queued; a job that already finished waiting
/// re-checks the conversation under its write lock before appending.
use crate::chat_types::{ConversationId, MessageId, WorkspaceEvent};
use crate::conversation::Conversation;
use crate::insight::InsightAnalyzer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct AnalysisJob {
    message_id: MessageId,
    text: String,
    due: Instant,
}

pub struct InsightScheduler {
    conversation_id: ConversationId,
    delay: Duration,
    queue: mpsc::UnboundedSender<AnalysisJob>,
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl InsightScheduler {
    /// Start the worker for one conversation. Must be called inside a tokio runtime.
    pub fn spawn(
        conversation: Arc<RwLock<Conversation>>,
        conversation_id: ConversationId,
        analyzer: Arc<dyn InsightAnalyzer>,
        delay: Duration,
        events: broadcast::Sender<WorkspaceEvent>,
    ) -> Self {
        let (queue, jobs) = mpsc::unbounded_channel();
        let (cancel, cancelled) = watch::channel(false);

        let worker = Worker {
            conversation,
            conversation_id: conversation_id.clone(),
            analyzer,
            events,
        };
        let handle = tokio::spawn(worker.run(jobs, cancelled));

        Self {
            conversation_id,
            delay,
            queue,
            cancel,
            handle,
        }
    }

    /// Queue analysis of a freshly appended message. Returns false once the
    /// scheduler has been cancelled.
    pub fn schedule(&self, message_id: MessageId, text: String) -> bool {
        if self.is_cancelled() {
            return false;
        }
        let job = AnalysisJob {
            message_id,
            text,
            due: Instant::now() + self.delay,
        };
        debug!(
            "Scheduled analysis of {} in {} (due in {:?})",
            job.message_id, self.conversation_id, self.delay
        );
        self.queue.send(job).is_ok()
    }

    pub fn cancel(&self) {
        if !self.cancel.send_replace(true) {
            info!("Cancelled pending analysis for {}", self.conversation_id);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Whether the worker task has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for InsightScheduler {
    fn drop(&mut self) {
        self.cancel.send_replace(true);
        self.handle.abort();
    }
}

struct Worker {
    conversation: Arc<RwLock<Conversation>>,
    conversation_id: ConversationId,
    analyzer: Arc<dyn InsightAnalyzer>,
    events: broadcast::Sender<WorkspaceEvent>,
}

impl Worker {
    async fn run(
        self,
        mut jobs: mpsc::UnboundedReceiver<AnalysisJob>,
        mut cancelled: watch::Receiver<bool>,
    ) {
        loop {
            let job = tokio::select! {
                biased;
                _ = cancelled.changed() => break,
                job = jobs.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            tokio::select! {
                biased;
                _ = cancelled.changed() => break,
                _ = tokio::time::sleep_until(job.due) => {}
            }

            if !self.resolve(job, &cancelled).await {
                break;
            }
        }
        debug!("Insight worker for {} stopped", self.conversation_id);
    }

    /// Analyze one message and append its insights. Returns false when the
    /// conversation is gone and the worker should stop.
    async fn resolve(&self, job: AnalysisJob, cancelled: &watch::Receiver<bool>) -> bool {
        let candidates = match self.analyzer.analyze(&job.text) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(
                    "Insight analysis failed for {} in {}: {}",
                    job.message_id, self.conversation_id, e
                );
                return true;
            }
        };

        let added = {
            let mut conversation = self.conversation.write().await;
            if conversation.is_archived() || *cancelled.borrow() {
                debug!(
                    "Dropping insights for {}: {} was torn down",
                    job.message_id, self.conversation_id
                );
                return false;
            }
            conversation.push_insights(&job.message_id, candidates)
        };

        for insight in added {
            info!(
                "Insight {} ({}) added to {}",
                insight.id, insight.insight_type, self.conversation_id
            );
            let _ = self.events.send(WorkspaceEvent::InsightAdded {
                conversation_id: self.conversation_id.clone(),
                insight,
            });
        }
        true
    }
}

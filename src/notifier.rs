//! Per-(sender, room) debounce of delayed chat notifications.
//!
//! Each qualifying message either opens a pending job with a delay timer or
//! folds into an existing job, appending its content and restarting the
//! countdown. A burst therefore produces exactly one notification, sent once
//! the sender has been quiet for the configured delay, with the burst's
//! bodies joined by newlines in arrival order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::error;

use crate::dispatch;
use crate::model::ChatMessage;
use crate::services::Services;

type JobKey = (i64, i64);

/// Buffer for the coalesced burst, shared between the job table and any
/// timer still holding it; only `content` grows.
type SharedMessage = Arc<Mutex<ChatMessage>>;

struct PendingJob {
    message: SharedMessage,
    timer: JoinHandle<()>,
}

/// Cloneable handle to the process-wide table of pending coalesced
/// notifications. Job state is never persisted; a restart drops at most one
/// delayed notification per (sender, room) pair.
#[derive(Clone)]
pub struct DebouncedNotifier {
    inner: Arc<Inner>,
}

struct Inner {
    services: Services,
    jobs: Mutex<HashMap<JobKey, PendingJob>>,
}

impl DebouncedNotifier {
    pub fn new(services: Services) -> Self {
        Self {
            inner: Arc::new(Inner {
                services,
                jobs: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Number of jobs currently waiting on a timer.
    pub async fn pending_jobs(&self) -> usize {
        self.inner.jobs.lock().await.len()
    }

    /// Record one private, non-system message for delayed notification.
    ///
    /// If a job is already pending for this (sender, room) pair, the message
    /// body is appended to its buffer and the old timer is cancelled before a
    /// fresh one is scheduled; otherwise a new job is opened. Either way the
    /// countdown restarts at the current `notification_send_delay`.
    pub async fn record_message(&self, from_uid: i64, room_id: i64, message: ChatMessage) {
        let delay = self.inner.services.settings.notification_send_delay();
        let key = (from_uid, room_id);

        let mut jobs = self.inner.jobs.lock().await;
        match jobs.get_mut(&key) {
            Some(job) => {
                {
                    let mut buffered = job.message.lock().await;
                    buffered.content.push('\n');
                    buffered.content.push_str(&message.content);
                }
                job.timer.abort();
                job.timer = self.spawn_timer(key, Arc::clone(&job.message), delay);
            }
            None => {
                let message = Arc::new(Mutex::new(message));
                let timer = self.spawn_timer(key, Arc::clone(&message), delay);
                jobs.insert(key, PendingJob { message, timer });
            }
        }
    }

    /// The handle this returns cancels only the pending sleep. Once the
    /// delay has lapsed the dispatch runs as its own detached task: a
    /// dispatch that has begun can no longer be cancelled.
    fn spawn_timer(&self, key: JobKey, buffer: SharedMessage, delay: Duration) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(async move {
                inner.fire(key, buffer).await;
            });
        })
    }
}

impl Inner {
    /// Timer callback: dispatch whatever the buffer holds at this instant,
    /// then drop the job entry. Dispatch errors are logged and swallowed
    /// here; the delayed notification is a lossy secondary channel next to
    /// the live broadcast. On failure the entry stays in the table and later
    /// messages keep extending it.
    ///
    /// The buffer travels with the timer rather than being looked up, so a
    /// job rescheduled while this dispatch is in flight still delivers its
    /// own, fuller copy when its timer lapses, even after the removal below.
    async fn fire(&self, key: JobKey, buffer: SharedMessage) {
        let (from_uid, room_id) = key;
        let message = buffer.lock().await.clone();

        match dispatch::send_notification(&self.services, from_uid, room_id, &message).await {
            Ok(()) => {
                self.jobs.lock().await.remove(&key);
            }
            Err(err) => {
                error!(?err, from_uid, room_id, "unable to send chat notification");
            }
        }
    }
}

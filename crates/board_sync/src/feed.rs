//! Cursor-based chat feed.
//!
//! The store is polled for messages at or after the cursor timestamp. The
//! cursor remembers which ids it already delivered at that exact timestamp,
//! so an inclusive query never re-delivers them and never skips a message
//! that shares the boundary timestamp.

use std::{collections::HashSet, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use shared::domain::{ChatMessage, MessageId};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::store::ChatFeed;

const BATCH_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedCursor {
    since: DateTime<Utc>,
    boundary_ids: HashSet<MessageId>,
}

impl FeedCursor {
    pub fn starting_at(since: DateTime<Utc>) -> Self {
        Self {
            since,
            boundary_ids: HashSet::new(),
        }
    }

    /// Cursor positioned right after an initial history load. Everything in
    /// `history` counts as delivered.
    pub fn after_history(history: &[ChatMessage]) -> Self {
        let mut cursor = Self::starting_at(DateTime::<Utc>::UNIX_EPOCH);
        cursor.accept(history.to_vec());
        cursor
    }

    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }

    /// Filters a batch down to messages not yet delivered and advances the
    /// cursor past them. Messages sharing a timestamp keep receipt order.
    pub fn accept(&mut self, mut batch: Vec<ChatMessage>) -> Vec<ChatMessage> {
        batch.sort_by_key(|m| m.sent_at);
        let mut fresh = Vec::with_capacity(batch.len());
        for message in batch {
            if message.sent_at < self.since {
                continue;
            }
            if message.sent_at > self.since {
                self.since = message.sent_at;
                self.boundary_ids.clear();
            }
            if self.boundary_ids.insert(message.message_id) {
                fresh.push(message);
            }
        }
        fresh
    }
}

/// Handle to a running polling loop. Dropping it stops renewals.
pub struct FeedSubscription {
    cancel: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl FeedSubscription {
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Cancels and waits for the polling task to exit.
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.cancel.send_replace(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Starts polling `thread` from `cursor`, forwarding each non-empty batch of
/// new messages in receipt order.
///
/// Transport errors are logged and the next tick retries with the same
/// cursor. The stream ends once the subscription is cancelled.
pub fn subscribe(
    feed: Arc<dyn ChatFeed>,
    thread: impl Into<String>,
    mut cursor: FeedCursor,
    poll_interval: Duration,
) -> (FeedSubscription, ReceiverStream<Vec<ChatMessage>>) {
    let thread = thread.into();
    let (batch_tx, batch_rx) = mpsc::channel(BATCH_BUFFER);
    let (cancel_tx, mut cancel_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel_rx.changed() => break,
                _ = ticker.tick() => {}
            }
            let fetched = tokio::select! {
                _ = cancel_rx.changed() => break,
                fetched = feed.messages_since(&thread, cursor.since()) => fetched,
            };
            if *cancel_rx.borrow() {
                break;
            }
            match fetched {
                Ok(batch) => {
                    let fresh = cursor.accept(batch);
                    if fresh.is_empty() {
                        continue;
                    }
                    debug!(thread = %thread, count = fresh.len(), "feed: delivering batch");
                    if batch_tx.send(fresh).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(thread = %thread, error = %err, "feed: poll failed, retrying next tick");
                }
            }
        }
        debug!(thread = %thread, "feed: subscription stopped");
    });

    (
        FeedSubscription {
            cancel: cancel_tx,
            task: Some(task),
        },
        ReceiverStream::new(batch_rx),
    )
}

#[cfg(test)]
#[path = "tests/feed_tests.rs"]
mod tests;

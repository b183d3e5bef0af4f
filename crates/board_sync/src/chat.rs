//! Visible state of one chat thread: history plus live batches.

use std::sync::Arc;

use shared::{
    domain::{ChatAuthor, ChatMessage},
    protocol::NewChatMessage,
};
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tracing::info;

use crate::{
    error::{SyncError, SyncResult},
    feed::{subscribe, FeedCursor, FeedSubscription},
    store::ChatFeed,
    SyncSettings,
};

const CLEAR_COMMAND: &str = "clear";

pub struct ChatRoom {
    feed: Arc<dyn ChatFeed>,
    thread: String,
    messages: Vec<ChatMessage>,
    subscription: FeedSubscription,
    batches: ReceiverStream<Vec<ChatMessage>>,
}

impl ChatRoom {
    /// Loads the thread history and subscribes for anything newer.
    pub async fn open(
        feed: Arc<dyn ChatFeed>,
        thread: impl Into<String>,
        settings: &SyncSettings,
    ) -> SyncResult<Self> {
        let thread = thread.into();
        let messages = feed.get_messages(&thread).await?;
        let cursor = FeedCursor::after_history(&messages);
        info!(
            thread = %thread,
            history = messages.len(),
            "chat: history loaded, subscribing"
        );
        let (subscription, batches) = subscribe(
            Arc::clone(&feed),
            thread.clone(),
            cursor,
            settings.poll_interval,
        );
        Ok(Self {
            feed,
            thread,
            messages,
            subscription,
            batches,
        })
    }

    pub fn thread(&self) -> &str {
        &self.thread
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Waits for the next batch, appends it and returns it. `None` once the
    /// room is closed.
    pub async fn next_batch(&mut self) -> Option<Vec<ChatMessage>> {
        if self.subscription.is_cancelled() {
            return None;
        }
        let batch = self.batches.next().await?;
        if self.subscription.is_cancelled() {
            return None;
        }
        self.messages.extend(batch.iter().cloned());
        Some(batch)
    }

    /// Posts `text`. The message itself shows up through the feed. Posting
    /// `clear` empties the local list once the store acknowledged it.
    pub async fn post(&mut self, author: &ChatAuthor, text: &str) -> SyncResult<ChatMessage> {
        if text.trim().is_empty() {
            return Err(SyncError::InvalidInput(
                "message text must not be empty".to_string(),
            ));
        }
        let is_clear = text.trim().eq_ignore_ascii_case(CLEAR_COMMAND);
        let posted = self
            .feed
            .post_message(&NewChatMessage::new(&self.thread, author, text))
            .await?;
        if is_clear {
            self.messages.clear();
        }
        Ok(posted)
    }

    pub async fn close(self) {
        self.subscription.shutdown().await;
    }
}

#[cfg(test)]
#[path = "tests/chat_tests.rs"]
mod tests;

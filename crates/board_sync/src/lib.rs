use std::time::Duration;

pub mod chat;
pub mod error;
pub mod feed;
pub mod http;
pub mod memory;
pub mod optimistic;
pub mod reorder;
pub mod session;
pub mod store;

pub use chat::ChatRoom;
pub use error::{SyncError, SyncResult};
pub use feed::{subscribe, FeedCursor, FeedSubscription};
pub use http::HttpStore;
pub use memory::MemoryStore;
pub use optimistic::{OptimisticSync, PendingMove, Settled};
pub use reorder::ReorderError;
pub use session::{BoardSession, BoardSessionHandle, BoardView, SessionEvent};
pub use store::{BoardStore, ChatFeed};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// How often a failed board write is attempted before the optimistic state
/// is reverted. `max_attempts` counts the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry: RetryPolicy::default(),
        }
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

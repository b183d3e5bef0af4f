use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use shared::{
    domain::{Board, BoardId, ChatMessage, Group, GroupId, Item, ItemId, MessageId, UserId},
    protocol::NewChatMessage,
};
use tokio::sync::{Mutex, Notify};

use crate::{
    error::{SyncError, SyncResult},
    memory::MemoryStore,
    store::{BoardStore, ChatFeed},
};

pub(crate) const BOARD: BoardId = BoardId(1);
pub(crate) const TODO: GroupId = GroupId(10);
pub(crate) const DONE: GroupId = GroupId(20);

pub(crate) fn ids(raw: &[i64]) -> Vec<ItemId> {
    raw.iter().copied().map(ItemId).collect()
}

/// `TODO:[1,2,3]`, `DONE:[4,5]`.
pub(crate) fn sample_board() -> Board {
    Board {
        board_id: BOARD,
        name: "Sprint".to_string(),
        groups: vec![
            Group::new(TODO, "Todo", ids(&[1, 2, 3])),
            Group::new(DONE, "Done", ids(&[4, 5])),
        ],
    }
}

pub(crate) fn sample_items() -> Vec<Item> {
    (1..=5)
        .map(|id| Item {
            item_id: ItemId(id),
            board_id: BOARD,
            title: format!("task {id}"),
            body: String::new(),
        })
        .collect()
}

pub(crate) async fn seeded_memory_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert_board(sample_board()).await;
    for item in sample_items() {
        store.insert_item(item).await;
    }
    store
}

pub(crate) fn group_ids(board: &Board, group_id: GroupId) -> Vec<i64> {
    board
        .group(group_id)
        .expect("group")
        .item_ids
        .iter()
        .map(|id| id.0)
        .collect()
}

pub(crate) fn message_at(id: i64, secs: i64) -> ChatMessage {
    ChatMessage {
        message_id: MessageId(id),
        thread: "all".to_string(),
        user_id: UserId(7),
        user_name: "alice".to_string(),
        avatar_url: None,
        text: format!("message {id}"),
        sent_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).single().expect("timestamp"),
    }
}

/// Wraps a [`MemoryStore`] with knobs for failing, diverging and stalling
/// board writes, and for failing item calls.
pub(crate) struct ScriptedStore {
    inner: MemoryStore,
    failures: Mutex<Vec<SyncError>>,
    item_failures: Mutex<Vec<SyncError>>,
    confirmed_override: Mutex<Option<Board>>,
    gate: Mutex<Option<Arc<Notify>>>,
    update_calls: AtomicUsize,
    updates: Mutex<Vec<Board>>,
}

impl ScriptedStore {
    pub(crate) async fn seeded() -> Arc<Self> {
        Arc::new(Self {
            inner: seeded_memory_store().await,
            failures: Mutex::new(Vec::new()),
            item_failures: Mutex::new(Vec::new()),
            confirmed_override: Mutex::new(None),
            gate: Mutex::new(None),
            update_calls: AtomicUsize::new(0),
            updates: Mutex::new(Vec::new()),
        })
    }

    /// The next `errors.len()` board writes fail, in order.
    pub(crate) async fn fail_next_updates(&self, errors: Vec<SyncError>) {
        let mut failures = self.failures.lock().await;
        failures.extend(errors.into_iter().rev());
    }

    /// The next `errors.len()` item calls (add, remove, update) fail, in
    /// order.
    pub(crate) async fn fail_next_item_calls(&self, errors: Vec<SyncError>) {
        let mut failures = self.item_failures.lock().await;
        failures.extend(errors.into_iter().rev());
    }

    /// The next successful write answers with `board` instead of the
    /// submitted one, as if another actor moved items concurrently.
    pub(crate) async fn confirm_with(&self, board: Board) {
        *self.confirmed_override.lock().await = Some(board);
    }

    /// Board writes block until the returned notify is signalled once per
    /// write.
    pub(crate) async fn hold_updates(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().await = Some(Arc::clone(&gate));
        gate
    }

    pub(crate) fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub(crate) async fn submitted_boards(&self) -> Vec<Board> {
        self.updates.lock().await.clone()
    }

    pub(crate) async fn stored_board(&self) -> Board {
        self.inner.board(BOARD).await.expect("board")
    }

    pub(crate) async fn wait_for_update_calls(&self, expected: usize) {
        for _ in 0..200 {
            if self.update_calls() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "expected {expected} board writes, saw {}",
            self.update_calls()
        );
    }
}

#[async_trait]
impl BoardStore for ScriptedStore {
    async fn get_board(&self, board_id: BoardId) -> SyncResult<Board> {
        self.inner.get_board(board_id).await
    }

    async fn get_items(&self, board_id: BoardId) -> SyncResult<Vec<Item>> {
        self.inner.get_items(board_id).await
    }

    async fn update_board(&self, board_id: BoardId, board: &Board) -> SyncResult<Board> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.updates.lock().await.push(board.clone());
        let gate = self.gate.lock().await.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(err) = self.failures.lock().await.pop() {
            return Err(err);
        }
        if let Some(confirmed) = self.confirmed_override.lock().await.take() {
            return Ok(confirmed);
        }
        self.inner.update_board(board_id, board).await
    }

    async fn add_item(&self, board_id: BoardId, group_id: GroupId) -> SyncResult<Item> {
        if let Some(err) = self.item_failures.lock().await.pop() {
            return Err(err);
        }
        self.inner.add_item(board_id, group_id).await
    }

    async fn remove_item(&self, item_id: ItemId) -> SyncResult<()> {
        if let Some(err) = self.item_failures.lock().await.pop() {
            return Err(err);
        }
        self.inner.remove_item(item_id).await
    }

    async fn update_item(&self, item_id: ItemId, item: &Item) -> SyncResult<Item> {
        if let Some(err) = self.item_failures.lock().await.pop() {
            return Err(err);
        }
        self.inner.update_item(item_id, item).await
    }
}

/// Chat feed over a [`MemoryStore`] that counts polls and can fail them.
pub(crate) struct ScriptedFeed {
    pub(crate) inner: MemoryStore,
    failing_polls: AtomicUsize,
    polls: AtomicUsize,
}

impl ScriptedFeed {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new(),
            failing_polls: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn fail_next_polls(&self, count: usize) {
        self.failing_polls.store(count, Ordering::SeqCst);
    }

    pub(crate) fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatFeed for ScriptedFeed {
    async fn get_messages(&self, thread: &str) -> SyncResult<Vec<ChatMessage>> {
        self.inner.get_messages(thread).await
    }

    async fn messages_since(
        &self,
        thread: &str,
        since: DateTime<Utc>,
    ) -> SyncResult<Vec<ChatMessage>> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(SyncError::transport("feed unavailable"));
        }
        self.inner.messages_since(thread, since).await
    }

    async fn post_message(&self, message: &NewChatMessage) -> SyncResult<ChatMessage> {
        self.inner.post_message(message).await
    }
}

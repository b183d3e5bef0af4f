//! In-process store used by the `planner demo` command and by tests.
//!
//! Behaves like the remote store: item creation/removal does not touch the
//! board layout, which the client persists separately with `update_board`.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicI64, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    domain::{Board, BoardId, ChatMessage, GroupId, Item, ItemId, MessageId},
    error::{ApiError, ErrorCode},
    protocol::NewChatMessage,
};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    error::{SyncError, SyncResult},
    reorder::check_membership,
    store::{BoardStore, ChatFeed},
};

#[derive(Default)]
struct MemoryState {
    boards: HashMap<BoardId, Board>,
    items: HashMap<ItemId, Item>,
    messages: Vec<ChatMessage>,
}

pub struct MemoryStore {
    state: RwLock<MemoryState>,
    next_id: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            next_id: AtomicI64::new(1000),
        }
    }

    pub async fn insert_board(&self, board: Board) {
        self.state.write().await.boards.insert(board.board_id, board);
    }

    pub async fn insert_item(&self, item: Item) {
        self.state.write().await.items.insert(item.item_id, item);
    }

    pub async fn board(&self, board_id: BoardId) -> Option<Board> {
        self.state.read().await.boards.get(&board_id).cloned()
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

fn not_found(what: impl std::fmt::Display) -> SyncError {
    SyncError::Remote(ApiError::new(ErrorCode::NotFound, format!("{what} not found")))
}

#[async_trait]
impl BoardStore for MemoryStore {
    async fn get_board(&self, board_id: BoardId) -> SyncResult<Board> {
        self.board(board_id)
            .await
            .ok_or_else(|| not_found(format_args!("board {board_id}")))
    }

    async fn get_items(&self, board_id: BoardId) -> SyncResult<Vec<Item>> {
        let state = self.state.read().await;
        if !state.boards.contains_key(&board_id) {
            return Err(not_found(format_args!("board {board_id}")));
        }
        let mut items: Vec<Item> = state
            .items
            .values()
            .filter(|item| item.board_id == board_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.item_id);
        Ok(items)
    }

    async fn update_board(&self, board_id: BoardId, board: &Board) -> SyncResult<Board> {
        check_membership(&board.groups).map_err(|err| {
            SyncError::Remote(ApiError::new(ErrorCode::Validation, err.to_string()))
        })?;
        let mut state = self.state.write().await;
        let stored = state
            .boards
            .get_mut(&board_id)
            .ok_or_else(|| not_found(format_args!("board {board_id}")))?;
        stored.groups = board.groups.clone();
        debug!(board_id = board_id.0, "memory store: board updated");
        Ok(stored.clone())
    }

    async fn add_item(&self, board_id: BoardId, group_id: GroupId) -> SyncResult<Item> {
        let mut state = self.state.write().await;
        let board = state
            .boards
            .get(&board_id)
            .ok_or_else(|| not_found(format_args!("board {board_id}")))?;
        if board.group(group_id).is_none() {
            return Err(not_found(format_args!("group {group_id}")));
        }
        let item = Item {
            item_id: ItemId(self.next_id()),
            board_id,
            title: String::new(),
            body: String::new(),
        };
        state.items.insert(item.item_id, item.clone());
        Ok(item)
    }

    async fn remove_item(&self, item_id: ItemId) -> SyncResult<()> {
        self.state
            .write()
            .await
            .items
            .remove(&item_id)
            .map(|_| ())
            .ok_or_else(|| not_found(format_args!("item {item_id}")))
    }

    async fn update_item(&self, item_id: ItemId, item: &Item) -> SyncResult<Item> {
        let mut state = self.state.write().await;
        let stored = state
            .items
            .get_mut(&item_id)
            .ok_or_else(|| not_found(format_args!("item {item_id}")))?;
        if item.item_id != item_id || item.board_id != stored.board_id {
            return Err(SyncError::Remote(ApiError::new(
                ErrorCode::Conflict,
                format!("item {item_id} cannot change its id or board"),
            )));
        }
        stored.title = item.title.clone();
        stored.body = item.body.clone();
        debug!(item_id = item_id.0, "memory store: item updated");
        Ok(stored.clone())
    }
}

#[async_trait]
impl ChatFeed for MemoryStore {
    async fn get_messages(&self, thread: &str) -> SyncResult<Vec<ChatMessage>> {
        Ok(self
            .state
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.thread == thread)
            .cloned()
            .collect())
    }

    async fn messages_since(
        &self,
        thread: &str,
        since: DateTime<Utc>,
    ) -> SyncResult<Vec<ChatMessage>> {
        Ok(self
            .state
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.thread == thread && m.sent_at >= since)
            .cloned()
            .collect())
    }

    async fn post_message(&self, message: &NewChatMessage) -> SyncResult<ChatMessage> {
        if message.text.trim().is_empty() {
            return Err(SyncError::Remote(ApiError::new(
                ErrorCode::Validation,
                "message text must not be empty",
            )));
        }
        let mut state = self.state.write().await;
        // Keep `sent_at` non-decreasing so cursors never move backwards.
        let sent_at = state
            .messages
            .last()
            .map(|last| last.sent_at.max(Utc::now()))
            .unwrap_or_else(Utc::now);
        let stored = ChatMessage {
            message_id: MessageId(self.next_id()),
            thread: message.thread.clone(),
            user_id: message.user_id,
            user_name: message.user_name.clone(),
            avatar_url: message.avatar_url.clone(),
            text: message.text.clone(),
            sent_at,
        };
        state.messages.push(stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
#[path = "tests/memory_tests.rs"]
mod tests;

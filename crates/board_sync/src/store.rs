//! Seams to the remote store. Everything the core persists or fetches goes
//! through these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    domain::{Board, BoardId, ChatMessage, GroupId, Item, ItemId},
    protocol::NewChatMessage,
};

use crate::error::SyncResult;

#[async_trait]
pub trait BoardStore: Send + Sync {
    async fn get_board(&self, board_id: BoardId) -> SyncResult<Board>;
    async fn get_items(&self, board_id: BoardId) -> SyncResult<Vec<Item>>;
    /// Persists the full grouping and answers with the store's confirmed
    /// board, which may differ if another actor moved items concurrently.
    async fn update_board(&self, board_id: BoardId, board: &Board) -> SyncResult<Board>;
    async fn add_item(&self, board_id: BoardId, group_id: GroupId) -> SyncResult<Item>;
    async fn remove_item(&self, item_id: ItemId) -> SyncResult<()>;
    /// Replaces title and body of an existing item. Layout is untouched.
    async fn update_item(&self, item_id: ItemId, item: &Item) -> SyncResult<Item>;
}

#[async_trait]
pub trait ChatFeed: Send + Sync {
    async fn get_messages(&self, thread: &str) -> SyncResult<Vec<ChatMessage>>;
    /// Messages of `thread` with `sent_at >= since`, oldest first.
    async fn messages_since(
        &self,
        thread: &str,
        since: DateTime<Utc>,
    ) -> SyncResult<Vec<ChatMessage>>;
    async fn post_message(&self, message: &NewChatMessage) -> SyncResult<ChatMessage>;
}

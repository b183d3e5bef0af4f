//! JSON-over-HTTP binding of the remote store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Board, BoardId, ChatMessage, GroupId, Item, ItemId},
    error::ApiError,
    protocol::{MessagesQuery, NewChatMessage},
};
use tracing::debug;
use url::Url;

use crate::{
    error::{SyncError, SyncResult},
    store::{BoardStore, ChatFeed},
};

#[derive(Clone)]
pub struct HttpStore {
    http: Client,
    base_url: Url,
}

impl HttpStore {
    pub fn new(server_url: &str) -> SyncResult<Self> {
        let base_url = Url::parse(server_url).map_err(|err| {
            SyncError::InvalidInput(format!("invalid server url {server_url}: {err}"))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(SyncError::InvalidInput(
                "server_url must start with http:// or https://".to_string(),
            ));
        }
        Ok(Self {
            http: Client::new(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends percent-encoded path segments to the base url.
    fn endpoint<I>(&self, segments: I) -> SyncResult<Url>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                SyncError::InvalidInput(format!("{} cannot be a base url", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn read_json<T: DeserializeOwned>(res: Response) -> SyncResult<T> {
        let res = Self::check_status(res).await?;
        res.json::<T>().await.map_err(SyncError::from)
    }

    async fn check_status(res: Response) -> SyncResult<Response> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let url = res.url().clone();
        let body = res.text().await.unwrap_or_default();
        debug!(%url, %status, "http store: request failed");
        match serde_json::from_str::<ApiError>(&body) {
            Ok(api_error) => Err(SyncError::Remote(api_error)),
            Err(_) => Err(SyncError::Transport(format!("{url} answered {status}: {body}"))),
        }
    }
}

#[async_trait]
impl BoardStore for HttpStore {
    async fn get_board(&self, board_id: BoardId) -> SyncResult<Board> {
        let url = self.endpoint(["boards", board_id.to_string().as_str()])?;
        Self::read_json(self.http.get(url).send().await?).await
    }

    async fn get_items(&self, board_id: BoardId) -> SyncResult<Vec<Item>> {
        let url = self.endpoint(["boards", board_id.to_string().as_str(), "items"])?;
        Self::read_json(self.http.get(url).send().await?).await
    }

    async fn update_board(&self, board_id: BoardId, board: &Board) -> SyncResult<Board> {
        let url = self.endpoint(["boards", board_id.to_string().as_str()])?;
        Self::read_json(self.http.put(url).json(board).send().await?).await
    }

    async fn add_item(&self, board_id: BoardId, group_id: GroupId) -> SyncResult<Item> {
        let url = self.endpoint([
            "boards",
            board_id.to_string().as_str(),
            "groups",
            group_id.to_string().as_str(),
            "items",
        ])?;
        Self::read_json(self.http.post(url).send().await?).await
    }

    async fn remove_item(&self, item_id: ItemId) -> SyncResult<()> {
        let url = self.endpoint(["items", item_id.to_string().as_str()])?;
        Self::check_status(self.http.delete(url).send().await?).await?;
        Ok(())
    }

    async fn update_item(&self, item_id: ItemId, item: &Item) -> SyncResult<Item> {
        let url = self.endpoint(["items", item_id.to_string().as_str()])?;
        Self::read_json(self.http.put(url).json(item).send().await?).await
    }
}

#[async_trait]
impl ChatFeed for HttpStore {
    async fn get_messages(&self, thread: &str) -> SyncResult<Vec<ChatMessage>> {
        let url = self.endpoint(["threads", thread, "messages"])?;
        Self::read_json(self.http.get(url).send().await?).await
    }

    async fn messages_since(
        &self,
        thread: &str,
        since: DateTime<Utc>,
    ) -> SyncResult<Vec<ChatMessage>> {
        let url = self.endpoint(["threads", thread, "messages"])?;
        let res = self
            .http
            .get(url)
            .query(&MessagesQuery { since: Some(since) })
            .send()
            .await?;
        Self::read_json(res).await
    }

    async fn post_message(&self, message: &NewChatMessage) -> SyncResult<ChatMessage> {
        let url = self.endpoint(["threads", message.thread.as_str(), "messages"])?;
        Self::read_json(self.http.post(url).json(message).send().await?).await
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;

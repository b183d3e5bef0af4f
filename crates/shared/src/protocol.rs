use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ChatAuthor, UserId};

/// Body of a chat post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChatMessage {
    pub thread: String,
    pub text: String,
    pub user_id: UserId,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl NewChatMessage {
    pub fn new(thread: impl Into<String>, author: &ChatAuthor, text: impl Into<String>) -> Self {
        Self {
            thread: thread.into(),
            text: text.into(),
            user_id: author.user_id,
            user_name: author.user_name.clone(),
            avatar_url: author.avatar_url.clone(),
        }
    }
}

/// Query string for `GET /threads/{name}/messages`. `since` is inclusive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagesQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
}

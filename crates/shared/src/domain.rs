use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(BoardId);
id_newtype!(GroupId);
id_newtype!(ItemId);
id_newtype!(MessageId);
id_newtype!(UserId);

/// A named, ordered column of item ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub group_id: GroupId,
    pub name: String,
    pub item_ids: Vec<ItemId>,
}

impl Group {
    pub fn new(group_id: GroupId, name: impl Into<String>, item_ids: Vec<ItemId>) -> Self {
        Self {
            group_id,
            name: name.into(),
            item_ids,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub board_id: BoardId,
    pub name: String,
    pub groups: Vec<Group>,
}

impl Board {
    pub fn group(&self, group_id: GroupId) -> Option<&Group> {
        self.groups.iter().find(|g| g.group_id == group_id)
    }

    pub fn item_count(&self) -> usize {
        self.groups.iter().map(|g| g.item_ids.len()).sum()
    }

    /// Same board with its groups replaced.
    pub fn with_groups(&self, groups: Vec<Group>) -> Self {
        Self {
            board_id: self.board_id,
            name: self.name.clone(),
            groups,
        }
    }
}

/// Card payload. Never inspected by the reorder logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub item_id: ItemId,
    pub board_id: BoardId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupPosition {
    pub group_id: GroupId,
    pub index: usize,
}

impl GroupPosition {
    pub fn new(group_id: GroupId, index: usize) -> Self {
        Self { group_id, index }
    }
}

/// Indices refer to the group sequences before the move is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub source: GroupPosition,
    pub destination: GroupPosition,
}

impl MoveRequest {
    pub fn new(source: GroupPosition, destination: GroupPosition) -> Self {
        Self {
            source,
            destination,
        }
    }

    pub fn is_same_group(&self) -> bool {
        self.source.group_id == self.destination.group_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: MessageId,
    pub thread: String,
    pub user_id: UserId,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatAuthor {
    pub user_id: UserId,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display reference for a message author, resolved upstream by the user store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRef {
    pub uid: i64,
    pub displayname: String,
}

/// A chat message as handed to the notification pipeline. Storing the
/// message itself happened before we see it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub content: String,
    /// System messages (joins, renames, ...) broadcast but never notify.
    pub system: bool,
    pub from_user: UserRef,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(from_user: UserRef, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            system: false,
            from_user,
            timestamp: Utc::now(),
        }
    }
}

/// Full event payload published on a room's realtime channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BroadcastPayload {
    pub room_id: i64,
    pub from_uid: i64,
    pub message: ChatMessage,
    pub public: bool,
}

/// Lightweight unread signal; carries no message body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnreadPayload {
    pub room_id: i64,
    pub from_uid: i64,
    pub public: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    NewChat,
    NewGroupChat,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewChat => "new-chat",
            NotificationKind::NewGroupChat => "new-group-chat",
        }
    }
}

/// Everything the notification store needs to create a record. Subject and
/// body-short are localization tokens, resolved by the delivery layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationSpec {
    pub kind: NotificationKind,
    pub subject: String,
    pub body_short: String,
    pub body_long: String,
    /// Dedup key; the store keeps one live notification per nid.
    pub nid: String,
    pub from_uid: i64,
    pub path: String,
}

/// Handle to a created notification, as returned by the notification store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub nid: String,
    pub path: String,
}

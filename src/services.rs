//! Collaborator contracts.
//!
//! The notification core does no storage, presence tracking or transport of
//! its own; everything it needs from the surrounding application comes in
//! through the traits below. Implementations are injected as a [`Services`]
//! bundle, which keeps the core testable with in-memory doubles (see the
//! `memory` module).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::model::{NotificationRecord, NotificationSpec, UnreadPayload};

/// Room metadata and classification.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Visibility flag of the room; unknown rooms read as private.
    async fn is_public(&self, room_id: i64) -> Result<bool>;

    /// True if the room has more than two historical members.
    async fn is_group_chat(&self, room_id: i64) -> Result<bool>;
}

/// Best-effort realtime transport. Publishes are fire-and-forget: not
/// acknowledged, not retried, and never surface an error to the caller.
#[async_trait]
pub trait Realtime: Send + Sync {
    async fn publish(&self, channel: &str, event: &str, payload: Value);

    /// Refresh the live unread counter on each listed user's own sessions.
    async fn push_unread_count(&self, uids: &[String], payload: UnreadPayload);
}

/// The room's currently-online member set, kept in insertion order by the
/// backing store.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// All members currently online in the room.
    async fn online_members(&self, room_id: i64) -> Result<Vec<String>>;

    /// One page of the online set, counted backward from the tail.
    /// `start` is a 0-based offset from the tail; at most `count` ids come
    /// back, newest-joined first.
    async fn online_members_from_tail(
        &self,
        room_id: i64,
        start: usize,
        count: usize,
    ) -> Result<Vec<String>>;
}

#[async_trait]
pub trait ReadStateStore: Send + Sync {
    /// Per-member read flags for `room_id`, aligned index-for-index with
    /// `uids`.
    async fn has_read(&self, uids: &[String], room_id: i64) -> Result<Vec<bool>>;
}

/// Notification creation and delivery. `create` dedups on the spec's nid;
/// `push` is idempotent per (record, recipient).
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create(&self, spec: NotificationSpec) -> Result<NotificationRecord>;

    async fn push(&self, record: &NotificationRecord, uids: &[String]) -> Result<()>;
}

/// Runtime-tunable settings, read on every scheduling decision so operators
/// can retune without a restart.
pub trait SettingsStore: Send + Sync {
    /// Debounce window for delayed chat notifications.
    fn notification_send_delay(&self) -> Duration;
}

/// Bundle of collaborator handles threaded through the pipeline.
#[derive(Clone)]
pub struct Services {
    pub rooms: Arc<dyn RoomStore>,
    pub realtime: Arc<dyn Realtime>,
    pub presence: Arc<dyn PresenceStore>,
    pub read_states: Arc<dyn ReadStateStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub settings: Arc<dyn SettingsStore>,
}

/// Channel every session viewing the room is subscribed to.
pub fn room_channel(room_id: i64) -> String {
    format!("chat_room_{room_id}")
}

/// Channel sessions on the public rooms page subscribe to for unread marks.
pub fn public_room_channel(room_id: i64) -> String {
    format!("chat_room_public_{room_id}")
}

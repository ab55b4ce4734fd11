//! Live fan-out of incoming chat messages.
//!
//! Every stored message passes through here exactly once: it is offered to
//! the filter chain, published to the room's realtime channel, and, for
//! private non-system traffic, queued with the debounced notifier for a
//! delayed notification.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::model::{BroadcastPayload, ChatMessage, UnreadPayload};
use crate::notifier::DebouncedNotifier;
use crate::services::{public_room_channel, room_channel, Services};

/// Pluggable hook run over each broadcast payload before publishing.
/// Returning `None` vetoes the broadcast entirely; returning a modified
/// payload rewrites what gets published and queued.
#[async_trait]
pub trait BroadcastFilter: Send + Sync {
    async fn filter(&self, payload: BroadcastPayload) -> Option<BroadcastPayload>;
}

/// Ordered set of [`BroadcastFilter`] handlers. The first veto wins.
#[derive(Clone, Default)]
pub struct FilterChain {
    handlers: Vec<Arc<dyn BroadcastFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handler: Arc<dyn BroadcastFilter>) {
        self.handlers.push(handler);
    }

    async fn run(&self, mut payload: BroadcastPayload) -> Option<BroadcastPayload> {
        for handler in &self.handlers {
            payload = handler.filter(payload).await?;
        }
        Some(payload)
    }
}

/// Broadcast one message to the room and, when it qualifies, queue the
/// delayed notification.
///
/// Realtime publishes are fire-and-forget; the only errors surfaced here come
/// from the metadata and presence stores.
#[instrument(skip_all, fields(from_uid, room_id))]
pub async fn notify_users_in_room(
    services: &Services,
    filters: &FilterChain,
    notifier: &DebouncedNotifier,
    from_uid: i64,
    room_id: i64,
    message: ChatMessage,
) -> Result<()> {
    let is_public = services.rooms.is_public(room_id).await?;
    // Gating below follows the flag the message arrived with; filters may
    // rewrite the payload but not reclassify it.
    let is_system = message.system;

    let payload = BroadcastPayload {
        room_id,
        from_uid,
        message,
        public: is_public,
    };
    let Some(payload) = filters.run(payload).await else {
        debug!(from_uid, room_id, "broadcast vetoed by filter");
        return Ok(());
    };

    // Full message to every session currently viewing the room, read or not.
    services
        .realtime
        .publish(
            &room_channel(room_id),
            "chats.receive",
            serde_json::to_value(&payload)?,
        )
        .await;

    let unread = UnreadPayload {
        room_id,
        from_uid,
        public: is_public,
    };
    if is_public && !is_system {
        // Unread mark for sessions on the public rooms page.
        services
            .realtime
            .publish(
                &public_room_channel(room_id),
                "chats.public.unread",
                serde_json::to_value(&unread)?,
            )
            .await;
    }
    if is_system || is_public {
        return Ok(());
    }

    // Private rooms only: live unread-count refresh for everyone online in
    // the room, then the delayed notification.
    let uids = services.presence.online_members(room_id).await?;
    services.realtime.push_unread_count(&uids, unread).await;

    notifier.record_message(from_uid, room_id, payload.message).await;
    Ok(())
}

//! Batched notification dispatch.
//!
//! Runs when a debounce timer fires: creates one deduplicated notification
//! for the coalesced burst, then walks the room's online member set in
//! bounded pages, dropping members who already read the room and the sender
//! themselves, and pushes the notification to the survivors.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::model::{ChatMessage, NotificationKind, NotificationSpec};
use crate::services::Services;

/// Online-set page size per dispatch round.
const PAGE_SIZE: usize = 500;
/// Minimum pause between pages, to keep large rooms from hammering the
/// read-state store.
const PAGE_INTERVAL: Duration = Duration::from_millis(1000);

/// Create and deliver the delayed notification for one coalesced burst.
///
/// Pages are processed strictly sequentially, tail of the online set first;
/// an error on any page aborts the remaining pages and propagates.
#[instrument(skip_all, fields(from_uid, room_id))]
pub async fn send_notification(
    services: &Services,
    from_uid: i64,
    room_id: i64,
    message: &ChatMessage,
) -> Result<()> {
    let displayname = &message.from_user.displayname;
    let is_group = services
        .rooms
        .is_group_chat(room_id)
        .await
        .context("failed to classify room")?;

    let notification = services
        .notifications
        .create(NotificationSpec {
            kind: if is_group {
                NotificationKind::NewGroupChat
            } else {
                NotificationKind::NewChat
            },
            subject: format!("[[email:notif.chat.subject, {displayname}]]"),
            body_short: format!("[[notifications:new_message_from, {displayname}]]"),
            body_long: message.content.clone(),
            nid: format!("chat_{from_uid}_{room_id}"),
            from_uid,
            path: format!("/chats/{room_id}"),
        })
        .await
        .context("failed to create notification")?;

    let mut start = 0;
    loop {
        let uids = services
            .presence
            .online_members_from_tail(room_id, start, PAGE_SIZE)
            .await
            .context("failed to page online members")?;
        if uids.is_empty() {
            break;
        }
        let page_len = uids.len();

        let has_read = services
            .read_states
            .has_read(&uids, room_id)
            .await
            .context("failed to fetch read states")?;
        let recipients: Vec<String> = uids
            .into_iter()
            .zip(has_read)
            .filter(|(uid, read)| !read && !is_same_user(uid, from_uid))
            .map(|(uid, _)| uid)
            .collect();

        debug!(start, page_len, recipients = recipients.len(), "dispatch page");
        if !recipients.is_empty() {
            services
                .notifications
                .push(&notification, &recipients)
                .await
                .context("failed to push notification")?;
        }

        if page_len < PAGE_SIZE {
            break;
        }
        start += page_len;
        tokio::time::sleep(PAGE_INTERVAL).await;
    }
    Ok(())
}

/// Identifiers reach us in mixed shapes (presence hands back strings, the
/// message carries an integer), so compare as integers. A uid that does not
/// parse can never be the sender.
fn is_same_user(uid: &str, from_uid: i64) -> bool {
    uid.trim().parse::<i64>().map_or(false, |n| n == from_uid)
}

use std::time::Duration;

use roomcast::broadcast::{self, FilterChain};
use roomcast::memory::MemoryStack;
use roomcast::model::{ChatMessage, NotificationKind, UserRef};
use roomcast::notifier::DebouncedNotifier;

fn sender(uid: i64, name: &str) -> UserRef {
    UserRef {
        uid,
        displayname: name.to_string(),
    }
}

fn msg(from: &UserRef, content: &str) -> ChatMessage {
    ChatMessage::new(from.clone(), content)
}

/// Poll `cond` under the paused clock, letting timers and spawned dispatch
/// tasks run in between.
async fn wait_for(mut cond: impl FnMut() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for condition");
}

#[tokio::test(start_paused = true)]
async fn burst_coalesces_into_single_notification() {
    let stack = MemoryStack::new(Duration::from_secs(5));
    stack.rooms.insert_room(1, false, false);
    stack
        .presence
        .set_online(1, vec!["1".into(), "2".into(), "3".into()]);
    stack.read_states.mark_read("3", 1);

    let services = stack.services();
    let notifier = DebouncedNotifier::new(services.clone());
    let filters = FilterChain::new();
    let alice = sender(1, "alice");

    // "hi" at t=0, "there" at t=3; the countdown restarts at t=3.
    broadcast::notify_users_in_room(&services, &filters, &notifier, 1, 1, msg(&alice, "hi"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(stack.notifications.created().is_empty());

    broadcast::notify_users_in_room(&services, &filters, &notifier, 1, 1, msg(&alice, "there"))
        .await
        .unwrap();
    assert_eq!(notifier.pending_jobs().await, 1);

    // t=7.9: still inside the restarted window, nothing sent yet.
    tokio::time::sleep(Duration::from_millis(4900)).await;
    assert!(stack.notifications.created().is_empty());

    let notifications = stack.notifications.clone();
    wait_for(move || notifications.created().len() == 1).await;

    let created = stack.notifications.created();
    assert_eq!(created[0].body_long, "hi\nthere");
    assert_eq!(created[0].kind, NotificationKind::NewChat);
    assert_eq!(created[0].nid, "chat_1_1");
    assert_eq!(created[0].path, "/chats/1");
    assert!(created[0].subject.contains("alice"));

    // Online set is walked tail-first; "3" has read, "1" is the sender.
    assert_eq!(
        stack.notifications.pushes(),
        vec![("chat_1_1".to_string(), vec!["2".to_string()])]
    );
    assert_eq!(notifier.pending_jobs().await, 0);
}

#[tokio::test(start_paused = true)]
async fn nothing_fires_before_the_delay() {
    let stack = MemoryStack::new(Duration::from_secs(5));
    stack.rooms.insert_room(1, false, false);
    stack.presence.set_online(1, vec!["2".into()]);

    let notifier = DebouncedNotifier::new(stack.services());
    notifier.record_message(1, 1, msg(&sender(1, "alice"), "hi")).await;

    tokio::time::sleep(Duration::from_millis(4900)).await;
    assert!(stack.notifications.created().is_empty());

    let notifications = stack.notifications.clone();
    wait_for(move || notifications.created().len() == 1).await;
    assert_eq!(stack.notifications.created()[0].body_long, "hi");
}

#[tokio::test(start_paused = true)]
async fn jobs_are_keyed_per_sender_and_room() {
    let stack = MemoryStack::new(Duration::from_secs(2));
    stack.rooms.insert_room(1, false, false);
    stack.rooms.insert_room(2, false, false);

    let notifier = DebouncedNotifier::new(stack.services());
    let alice = sender(1, "alice");
    let bob = sender(2, "bob");

    notifier.record_message(1, 1, msg(&alice, "a-room1")).await;
    notifier.record_message(2, 1, msg(&bob, "b-room1")).await;
    notifier.record_message(1, 2, msg(&alice, "a-room2")).await;
    assert_eq!(notifier.pending_jobs().await, 3);

    let notifications = stack.notifications.clone();
    wait_for(move || notifications.created().len() == 3).await;

    let mut nids: Vec<String> = stack
        .notifications
        .created()
        .into_iter()
        .map(|spec| spec.nid)
        .collect();
    nids.sort();
    assert_eq!(nids, vec!["chat_1_1", "chat_1_2", "chat_2_1"]);

    // No cross-key coalescing: each body is its own message.
    for spec in stack.notifications.created() {
        assert!(!spec.body_long.contains('\n'));
    }
    assert_eq!(notifier.pending_jobs().await, 0);
}

#[tokio::test(start_paused = true)]
async fn message_during_dispatch_never_cancels_it() {
    let stack = MemoryStack::new(Duration::from_secs(1));
    stack.rooms.insert_room(1, false, false);
    stack
        .presence
        .set_online(1, (1..=1200).map(|uid| uid.to_string()).collect());

    let notifier = DebouncedNotifier::new(stack.services());
    let alice = sender(1, "alice");
    notifier.record_message(1, 1, msg(&alice, "first")).await;

    // t=1.5: the timer fired at t=1 and the dispatch is parked in its first
    // inter-page pause with exactly one page delivered.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(stack.notifications.created().len(), 1);
    assert_eq!(stack.notifications.pushes().len(), 1);

    // Rescheduling must only cancel pending sleeps; the in-flight dispatch
    // keeps paging to completion.
    notifier.record_message(1, 1, msg(&alice, "second")).await;

    let notifications = stack.notifications.clone();
    wait_for(move || notifications.pushes().len() == 6).await;

    let created = stack.notifications.created();
    assert_eq!(created.len(), 2);
    assert_eq!(created[0].body_long, "first");
    assert_eq!(created[1].body_long, "first\nsecond");

    // Both dispatches covered all three pages (1199 recipients each; the
    // sender sits in the final page).
    let delivered: usize = stack
        .notifications
        .pushes()
        .iter()
        .map(|(_, uids)| uids.len())
        .sum();
    assert_eq!(delivered, 2 * 1199);
    assert_eq!(notifier.pending_jobs().await, 0);
}

#[tokio::test(start_paused = true)]
async fn failed_dispatch_keeps_the_job_buffering() {
    let stack = MemoryStack::new(Duration::from_secs(2));
    stack.rooms.insert_room(1, false, false);
    stack.presence.set_online(1, vec!["2".into()]);
    stack.notifications.fail_next_create("notification store down");

    let notifier = DebouncedNotifier::new(stack.services());
    let alice = sender(1, "alice");
    notifier.record_message(1, 1, msg(&alice, "hi")).await;

    // Let the timer fire into the armed failure; the entry must survive.
    tokio::time::sleep(Duration::from_secs(3)).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(stack.notifications.created().is_empty());
    assert_eq!(notifier.pending_jobs().await, 1);

    // The stuck job keeps coalescing and eventually flushes in full.
    notifier.record_message(1, 1, msg(&alice, "there")).await;
    let notifications = stack.notifications.clone();
    wait_for(move || notifications.created().len() == 1).await;
    assert_eq!(stack.notifications.created()[0].body_long, "hi\nthere");
    assert_eq!(notifier.pending_jobs().await, 0);
}

#[tokio::test(start_paused = true)]
async fn send_delay_is_read_at_schedule_time() {
    let stack = MemoryStack::new(Duration::from_secs(5));
    stack.rooms.insert_room(1, false, false);

    let notifier = DebouncedNotifier::new(stack.services());
    notifier.record_message(1, 1, msg(&sender(1, "alice"), "slow")).await;

    stack
        .settings
        .set_notification_send_delay(Duration::from_secs(1));
    notifier.record_message(2, 1, msg(&sender(2, "bob"), "fast")).await;

    // t=1.5: only the retuned job has fired.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let created = stack.notifications.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].nid, "chat_2_1");

    let notifications = stack.notifications.clone();
    wait_for(move || notifications.created().len() == 2).await;
}

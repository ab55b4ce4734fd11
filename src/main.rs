use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use roomcast::broadcast::{self, FilterChain};
use roomcast::memory::MemoryStack;
use roomcast::model::{ChatMessage, UserRef};
use roomcast::notifier::DebouncedNotifier;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

/// Smoke harness: wires the pipeline against the in-memory collaborators,
/// replays a short burst into a private room and logs the coalesced
/// notification that comes out the other end.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = roomcast::config::load(Some(&args.config))?;
    let delay = Duration::from_secs(cfg.notifications.send_delay_secs);

    let stack = MemoryStack::new(delay);
    stack.rooms.insert_room(1, false, false);
    stack.presence.set_online(
        1,
        vec!["1".to_string(), "2".to_string(), "3".to_string()],
    );
    stack.read_states.mark_read("3", 1);

    let services = stack.services();
    let notifier = DebouncedNotifier::new(services.clone());
    let filters = FilterChain::new();

    let alice = UserRef {
        uid: 1,
        displayname: "alice".to_string(),
    };
    for content in ["hi", "there"] {
        info!(content, "sending message");
        broadcast::notify_users_in_room(
            &services,
            &filters,
            &notifier,
            alice.uid,
            1,
            ChatMessage::new(alice.clone(), content),
        )
        .await?;
    }

    info!(
        delay_secs = cfg.notifications.send_delay_secs,
        "burst sent; waiting for the debounce window to lapse"
    );
    tokio::time::sleep(delay + Duration::from_millis(500)).await;

    for spec in stack.notifications.created() {
        info!(kind = spec.kind.as_str(), nid = %spec.nid, body = %spec.body_long, "notification created");
    }
    for (nid, uids) in stack.notifications.pushes() {
        info!(%nid, ?uids, "notification pushed");
    }
    Ok(())
}

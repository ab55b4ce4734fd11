//! Chat-room broadcast and debounced-notification core.
//!
//! Turns a burst of messages from one sender into one room into a single
//! delayed notification, and fans it out only to online members who have not
//! read the room, in bounded pages. Storage, presence, read receipts and the
//! realtime transport are external collaborators behind the traits in
//! [`services`].

pub mod broadcast;
pub mod config;
pub mod dispatch;
pub mod memory;
pub mod model;
pub mod notifier;
pub mod services;

//! In-memory collaborator implementations.
//!
//! Back the demo binary and the integration tests. Every outbound effect is
//! recorded so callers can assert on exactly what the pipeline did; the
//! notification store can also be armed to fail, to exercise the
//! fire-and-log error boundary.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::model::{NotificationRecord, NotificationSpec, UnreadPayload};
use crate::services::{
    NotificationStore, PresenceStore, ReadStateStore, Realtime, RoomStore, Services, SettingsStore,
};

#[derive(Debug, Clone, Copy, Default)]
struct RoomInfo {
    public: bool,
    group: bool,
}

#[derive(Default)]
pub struct MemoryRoomStore {
    rooms: Mutex<HashMap<i64, RoomInfo>>,
}

impl MemoryRoomStore {
    pub fn insert_room(&self, room_id: i64, public: bool, group: bool) {
        self.rooms
            .lock()
            .unwrap()
            .insert(room_id, RoomInfo { public, group });
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn is_public(&self, room_id: i64) -> Result<bool> {
        // Unknown rooms read as private, like a missing metadata field.
        Ok(self
            .rooms
            .lock()
            .unwrap()
            .get(&room_id)
            .map_or(false, |r| r.public))
    }

    async fn is_group_chat(&self, room_id: i64) -> Result<bool> {
        Ok(self
            .rooms
            .lock()
            .unwrap()
            .get(&room_id)
            .map_or(false, |r| r.group))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedEvent {
    pub channel: String,
    pub event: String,
    pub payload: Value,
}

#[derive(Default)]
pub struct MemoryRealtime {
    events: Mutex<Vec<PublishedEvent>>,
    unread_pushes: Mutex<Vec<(Vec<String>, UnreadPayload)>>,
}

impl MemoryRealtime {
    pub fn events(&self) -> Vec<PublishedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn unread_pushes(&self) -> Vec<(Vec<String>, UnreadPayload)> {
        self.unread_pushes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Realtime for MemoryRealtime {
    async fn publish(&self, channel: &str, event: &str, payload: Value) {
        self.events.lock().unwrap().push(PublishedEvent {
            channel: channel.to_string(),
            event: event.to_string(),
            payload,
        });
    }

    async fn push_unread_count(&self, uids: &[String], payload: UnreadPayload) {
        self.unread_pushes
            .lock()
            .unwrap()
            .push((uids.to_vec(), payload));
    }
}

#[derive(Default)]
pub struct MemoryPresence {
    online: Mutex<HashMap<i64, Vec<String>>>,
}

impl MemoryPresence {
    /// Replace the room's online set; order is the store's insertion order.
    pub fn set_online(&self, room_id: i64, uids: Vec<String>) {
        self.online.lock().unwrap().insert(room_id, uids);
    }
}

#[async_trait]
impl PresenceStore for MemoryPresence {
    async fn online_members(&self, room_id: i64) -> Result<Vec<String>> {
        Ok(self
            .online
            .lock()
            .unwrap()
            .get(&room_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn online_members_from_tail(
        &self,
        room_id: i64,
        start: usize,
        count: usize,
    ) -> Result<Vec<String>> {
        let online = self.online.lock().unwrap();
        let members = online.get(&room_id).map(Vec::as_slice).unwrap_or(&[]);
        Ok(members
            .iter()
            .rev()
            .skip(start)
            .take(count)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryReadStates {
    read: Mutex<HashSet<(i64, String)>>,
}

impl MemoryReadStates {
    pub fn mark_read(&self, uid: &str, room_id: i64) {
        self.read
            .lock()
            .unwrap()
            .insert((room_id, uid.to_string()));
    }
}

#[async_trait]
impl ReadStateStore for MemoryReadStates {
    async fn has_read(&self, uids: &[String], room_id: i64) -> Result<Vec<bool>> {
        let read = self.read.lock().unwrap();
        Ok(uids
            .iter()
            .map(|uid| read.contains(&(room_id, uid.clone())))
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryNotifications {
    created: Mutex<Vec<NotificationSpec>>,
    pushes: Mutex<Vec<(String, Vec<String>)>>,
    delivered: Mutex<HashSet<(String, String)>>,
    create_errors: Mutex<VecDeque<String>>,
    push_errors: Mutex<VecDeque<String>>,
}

impl MemoryNotifications {
    /// Every create call, in order.
    pub fn created(&self) -> Vec<NotificationSpec> {
        self.created.lock().unwrap().clone()
    }

    /// Every push call as (nid, recipients), in order.
    pub fn pushes(&self) -> Vec<(String, Vec<String>)> {
        self.pushes.lock().unwrap().clone()
    }

    /// Deduplicated (nid, uid) deliveries.
    pub fn delivered(&self) -> HashSet<(String, String)> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn fail_next_create(&self, msg: &str) {
        self.create_errors.lock().unwrap().push_back(msg.to_string());
    }

    pub fn fail_next_push(&self, msg: &str) {
        self.push_errors.lock().unwrap().push_back(msg.to_string());
    }
}

#[async_trait]
impl NotificationStore for MemoryNotifications {
    async fn create(&self, spec: NotificationSpec) -> Result<NotificationRecord> {
        if let Some(msg) = self.create_errors.lock().unwrap().pop_front() {
            return Err(anyhow!(msg));
        }
        let record = NotificationRecord {
            id: Uuid::new_v4(),
            kind: spec.kind,
            nid: spec.nid.clone(),
            path: spec.path.clone(),
        };
        self.created.lock().unwrap().push(spec);
        Ok(record)
    }

    async fn push(&self, record: &NotificationRecord, uids: &[String]) -> Result<()> {
        if let Some(msg) = self.push_errors.lock().unwrap().pop_front() {
            return Err(anyhow!(msg));
        }
        self.pushes
            .lock()
            .unwrap()
            .push((record.nid.clone(), uids.to_vec()));
        let mut delivered = self.delivered.lock().unwrap();
        for uid in uids {
            delivered.insert((record.nid.clone(), uid.clone()));
        }
        Ok(())
    }
}

pub struct MemorySettings {
    delay: RwLock<Duration>,
}

impl MemorySettings {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay: RwLock::new(delay),
        }
    }

    /// Retune the debounce window at runtime.
    pub fn set_notification_send_delay(&self, delay: Duration) {
        *self.delay.write().unwrap() = delay;
    }
}

impl SettingsStore for MemorySettings {
    fn notification_send_delay(&self) -> Duration {
        *self.delay.read().unwrap()
    }
}

/// Full in-memory collaborator set, with concrete handles kept around so
/// callers can seed state and inspect effects after the fact.
pub struct MemoryStack {
    pub rooms: Arc<MemoryRoomStore>,
    pub realtime: Arc<MemoryRealtime>,
    pub presence: Arc<MemoryPresence>,
    pub read_states: Arc<MemoryReadStates>,
    pub notifications: Arc<MemoryNotifications>,
    pub settings: Arc<MemorySettings>,
}

impl MemoryStack {
    pub fn new(send_delay: Duration) -> Self {
        Self {
            rooms: Arc::new(MemoryRoomStore::default()),
            realtime: Arc::new(MemoryRealtime::default()),
            presence: Arc::new(MemoryPresence::default()),
            read_states: Arc::new(MemoryReadStates::default()),
            notifications: Arc::new(MemoryNotifications::default()),
            settings: Arc::new(MemorySettings::new(send_delay)),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            rooms: self.rooms.clone(),
            realtime: self.realtime.clone(),
            presence: self.presence.clone(),
            read_states: self.read_states.clone(),
            notifications: self.notifications.clone(),
            settings: self.settings.clone(),
        }
    }
}

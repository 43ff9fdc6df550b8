//! Room-based event fan-out for WebSocket clients
//!
//! Each room (a session id, `conversation_<id>` or `admin`) is a
//! `tokio::sync::broadcast` channel created on first use.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Room every staff dashboard joins
pub const ADMIN_ROOM: &str = "admin";

const ROOM_CAPACITY: usize = 256;

pub fn conversation_room(conversation_id: &str) -> String {
    format!("conversation_{}", conversation_id)
}

/// Wire frame in both directions: `{"event": name, "data": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// A frame plus the connection that caused it
#[derive(Debug, Clone)]
pub struct Envelope {
    pub origin: Option<Uuid>,
    pub frame: Arc<EventFrame>,
}

/// Shared registry of rooms
#[derive(Clone, Default)]
pub struct RealtimeHub {
    rooms: Arc<DashMap<String, broadcast::Sender<Envelope>>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, room: &str) -> broadcast::Sender<Envelope> {
        self.rooms
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .clone()
    }

    pub fn subscribe(&self, room: &str) -> broadcast::Receiver<Envelope> {
        self.sender(room).subscribe()
    }

    /// Send to everyone in the room; returns how many connections received it
    pub fn publish(&self, room: &str, event: &str, data: Value) -> usize {
        self.publish_from(None, room, event, data)
    }

    /// Like `publish`, tagging the originating connection so it can skip its own event
    pub fn publish_from(&self, origin: Option<Uuid>, room: &str, event: &str, data: Value) -> usize {
        let Some(sender) = self.rooms.get(room).map(|s| s.clone()) else {
            tracing::trace!(room = room, event = event, "No listeners for event");
            return 0;
        };
        let envelope = Envelope {
            origin,
            frame: Arc::new(EventFrame::new(event, data)),
        };
        sender.send(envelope).unwrap_or(0)
    }

    /// Drop rooms nobody listens to any more
    pub fn prune(&self) {
        self.rooms.retain(|_, sender| sender.receiver_count() > 0);
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn listeners(&self, room: &str) -> usize {
        self.rooms.get(room).map(|s| s.receiver_count()).unwrap_or(0)
    }
}

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::limits::NOTIFY_CHANNEL_CAPACITY;

/// Record collections that emit change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Templates,
    Trainings,
    Games,
    HallEvents,
    Closures,
    Claims,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Templates,
        Collection::Trainings,
        Collection::Games,
        Collection::HallEvents,
        Collection::Closures,
        Collection::Claims,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Templates => "templates",
            Collection::Trainings => "trainings",
            Collection::Games => "games",
            Collection::HallEvents => "hall_events",
            Collection::Closures => "closures",
            Collection::Claims => "claims",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Created,
    Updated,
    Deleted,
}

/// Refresh trigger. The payload only names what changed; consumers refetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub action: ChangeAction,
    pub id: Ulid,
}

/// Broadcast hub, one channel per collection.
pub struct NotifyHub {
    channels: DashMap<Collection, broadcast::Sender<ChangeEvent>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a collection. Creates the channel if needed.
    pub fn subscribe(&self, collection: Collection) -> broadcast::Receiver<ChangeEvent> {
        let sender = self
            .channels
            .entry(collection)
            .or_insert_with(|| broadcast::channel(NOTIFY_CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, collection: Collection, action: ChangeAction, id: Ulid) {
        if let Some(sender) = self.channels.get(&collection) {
            let _ = sender.send(ChangeEvent { collection, action, id });
        }
    }
}

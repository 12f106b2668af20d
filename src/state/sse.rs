use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dto::sse::ServerEvent;

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    fn is_idle(&self) -> bool {
        self.sender.receiver_count() == 0
    }
}

/// One hub per relationship, created on first subscription.
pub struct CoupleHubs {
    hubs: DashMap<Uuid, Arc<SseHub>>,
    capacity: usize,
}

impl CoupleHubs {
    /// Hubs whose channels buffer `capacity` events each.
    pub fn new(capacity: usize) -> Self {
        Self {
            hubs: DashMap::new(),
            capacity,
        }
    }

    /// Subscribe to the events of `couple_id`, creating its hub when needed.
    pub fn subscribe(&self, couple_id: Uuid) -> broadcast::Receiver<ServerEvent> {
        self.hubs
            .entry(couple_id)
            .or_insert_with(|| Arc::new(SseHub::new(self.capacity)))
            .subscribe()
    }

    /// Deliver `event` to the current subscribers of `couple_id`, if any.
    pub fn broadcast(&self, couple_id: Uuid, event: ServerEvent) {
        let hub = self.hubs.get(&couple_id).map(|entry| Arc::clone(entry.value()));
        if let Some(hub) = hub {
            hub.broadcast(event);
        }
    }

    /// Drop the hub of `couple_id` once nobody listens anymore.
    pub fn release(&self, couple_id: Uuid) {
        self.hubs.remove_if(&couple_id, |_, hub| hub.is_idle());
    }

    /// Number of relationships with a live hub.
    pub fn len(&self) -> usize {
        self.hubs.len()
    }

    /// Whether no relationship has a live hub.
    pub fn is_empty(&self) -> bool {
        self.hubs.is_empty()
    }
}

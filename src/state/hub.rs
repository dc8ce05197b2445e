use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::state::session::StateSnapshot;

/// Capacity of each room's broadcast channel. A slow client that lags
/// behind simply skips to the newest snapshot.
const CHANNEL_CAPACITY: usize = 16;

/// Per-room fan-out of state snapshots to every bound connection.
///
/// Channels are created lazily so a room can be subscribed to before or
/// after its first snapshot; each room's subscriber set is private to
/// that room.
pub struct SnapshotHub {
    channels: DashMap<String, broadcast::Sender<StateSnapshot>>,
}

impl SnapshotHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    fn channel(&self, room_id: &str) -> broadcast::Sender<StateSnapshot> {
        self.channels
            .entry(room_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Register a new subscriber for one room's snapshot stream.
    pub fn subscribe(&self, room_id: &str) -> broadcast::Receiver<StateSnapshot> {
        self.channel(room_id).subscribe()
    }

    /// Publish a snapshot to all of a room's subscribers, ignoring
    /// delivery errors (a room with no clients has no receivers).
    pub fn broadcast(&self, room_id: &str, snapshot: StateSnapshot) {
        let _ = self.channel(room_id).send(snapshot);
    }
}

impl Default for SnapshotHub {
    fn default() -> Self {
        Self::new()
    }
}

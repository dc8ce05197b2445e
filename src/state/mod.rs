pub mod hub;
pub mod registry;
pub mod session;

use std::sync::Arc;

pub use self::hub::SnapshotHub;
pub use self::registry::{RoomAccess, RoomRegistry};
pub use self::session::{Card, DecisionPhase, Judge, JudgeMap, Session, StateSnapshot, Vote};

/// Shared handle to the application state, cloned into every handler.
pub type SharedState = Arc<AppState>;

/// Central application state: the room registry plus the snapshot hub
/// the registry publishes into.
pub struct AppState {
    registry: RoomRegistry,
    hub: Arc<SnapshotHub>,
}

impl AppState {
    /// Construct the shared state, wiring every room's snapshot stream
    /// into the per-room broadcast hub.
    pub fn new() -> SharedState {
        let hub = Arc::new(SnapshotHub::new());
        let sink_hub = Arc::clone(&hub);
        let registry = RoomRegistry::new(Arc::new(move |room_id: &str, snapshot| {
            sink_hub.broadcast(room_id, snapshot);
        }));
        Arc::new(Self { registry, hub })
    }

    /// Room lifecycle and admission control.
    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Per-room snapshot fan-out, subscribed to by gateway connections.
    pub fn hub(&self) -> &SnapshotHub {
        &self.hub
    }
}

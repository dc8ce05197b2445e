use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use rand::{Rng, distr::Alphanumeric};
use tracing::info;

use crate::state::session::{Judge, JudgeMap, Session, StateSnapshot};

/// Room identifiers avoid visually ambiguous characters (no `0/O/1/I`)
/// so codes survive being read out loud or typed from a printout.
const ROOM_ID_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ROOM_ID_LEN: usize = 4;
const REF_TOKEN_LEN: usize = 12;

/// Callback receiving every snapshot a room emits, keyed by room id.
pub type SnapshotSink = Arc<dyn Fn(&str, StateSnapshot) + Send + Sync>;

/// Credential bundle returned when a room is created or its access is
/// (re-)fetched by an administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomAccess {
    /// Short human-typeable room code.
    pub room_id: String,
    /// Numeric PIN authorizing the admin and display roles.
    pub admin_pin: String,
    /// Opaque per-position referee tokens, delivered via QR code.
    pub referee_tokens: JudgeMap<String>,
}

struct Room {
    admin_pin: String,
    referee_tokens: JudgeMap<String>,
    session: Session,
}

impl Room {
    fn access(&self, room_id: &str) -> RoomAccess {
        RoomAccess {
            room_id: room_id.to_string(),
            admin_pin: self.admin_pin.clone(),
            referee_tokens: self.referee_tokens.clone(),
        }
    }
}

/// Owns every live room and performs all admission checks. Holds the
/// only strong references to the session handles; everything else looks
/// rooms up by id per command.
pub struct RoomRegistry {
    rooms: DashMap<String, Room>,
    on_update: SnapshotSink,
}

impl RoomRegistry {
    /// Build a registry forwarding every room's snapshots into `on_update`.
    pub fn new(on_update: SnapshotSink) -> Self {
        Self {
            rooms: DashMap::new(),
            on_update,
        }
    }

    /// Create a room with a registry-unique id, a fresh admin PIN, and
    /// three fresh referee tokens, and wire its snapshots into the sink.
    pub fn create_room(&self) -> RoomAccess {
        loop {
            let candidate = generate_room_id();
            match self.rooms.entry(candidate.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    let session = Session::new();
                    let sink = Arc::clone(&self.on_update);
                    let sink_room_id = candidate.clone();
                    session.on_snapshot(move |snapshot| sink(&sink_room_id, snapshot));

                    let room = Room {
                        admin_pin: generate_admin_pin(),
                        referee_tokens: generate_referee_tokens(),
                        session,
                    };
                    let access = room.access(&candidate);
                    slot.insert(room);
                    info!(room_id = %candidate, "room created");
                    return access;
                }
            }
        }
    }

    /// Check an admin PIN. False for an unknown room or a mismatch,
    /// never an error.
    pub fn verify_admin_pin(&self, room_id: &str, pin: &str) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|room| room.admin_pin == pin)
    }

    /// Return the credential bundle when the PIN check passes.
    pub fn room_access(&self, room_id: &str, pin: &str) -> Option<RoomAccess> {
        let room = self.rooms.get(room_id)?;
        if room.admin_pin != pin {
            return None;
        }
        Some(room.access(room_id))
    }

    /// Regenerate all three referee tokens at once and clear referee
    /// presence. Old tokens stop working immediately; connected referee
    /// consoles must re-register with a fresh token.
    pub fn rotate_referee_tokens(&self, room_id: &str) -> Option<RoomAccess> {
        let access = {
            let mut room = self.rooms.get_mut(room_id)?;
            room.referee_tokens = generate_referee_tokens();
            room.access(room_id)
        };
        // Presence is cleared outside the map guard: the snapshot fan-out
        // runs arbitrary listeners.
        if let Some(session) = self.room_state(room_id) {
            session.set_all_connected(false);
        }
        info!(room_id = %room_id, "referee tokens rotated");
        Some(access)
    }

    /// Exact-match validation of one referee position's current token.
    pub fn is_valid_ref_token(&self, room_id: &str, judge: Judge, token: &str) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|room| room.referee_tokens.get(judge) == token)
    }

    /// Live session handle for command dispatch.
    pub fn room_state(&self, room_id: &str) -> Option<Session> {
        self.rooms.get(room_id).map(|room| room.session.clone())
    }

    /// Number of rooms currently held.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

fn generate_room_id() -> String {
    let mut rng = rand::rng();
    (0..ROOM_ID_LEN)
        .map(|_| ROOM_ID_ALPHABET[rng.random_range(0..ROOM_ID_ALPHABET.len())] as char)
        .collect()
}

fn generate_admin_pin() -> String {
    rand::rng().random_range(1000..10_000).to_string()
}

fn generate_referee_tokens() -> JudgeMap<String> {
    JudgeMap::from_fn(|_| generate_token())
}

fn generate_token() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(REF_TOKEN_LEN)
        .map(char::from)
        .collect()
}

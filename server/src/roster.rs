//! Connected users and their last reported positions
//!
//! The roster is the relay's whole world state. Every user gets a fresh id
//! and a random color on connect, starts at the spawn point, and moves only
//! when their own client reports a new position. A snapshot of the roster is
//! what the relay broadcasts each tick.

use log::{debug, info};
use rand::Rng;
use shared::{
    decode_position, encode_snapshot, fragment, unwrap_envelope, CodecError, Color, Position,
    Snapshot, SnapshotEntry, UserId, SPAWN_POSITION,
};
use std::collections::HashMap;

/// State the relay keeps per connected user
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Member {
    pub position: Position,
    pub color: Color,
}

pub struct Roster {
    users: HashMap<UserId, Member>,
    /// Counter behind the next assigned id; ids are never reused
    next_id: u32,
}

impl Roster {
    pub fn new() -> Self {
        Self {
            users: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Member> {
        self.users.get(id)
    }

    /// Registers a new user with a random color
    pub fn add_user(&mut self) -> UserId {
        let color = Color::new(rand::thread_rng().gen_range(0x20_20_20..=0xFF_FF_FF));
        self.add_user_with_color(color)
    }

    pub fn add_user_with_color(&mut self, color: Color) -> UserId {
        let id = UserId::new(format!("user-{}", self.next_id));
        self.next_id += 1;

        self.users.insert(
            id.clone(),
            Member {
                position: SPAWN_POSITION,
                color,
            },
        );
        info!("User {} joined with color #{:06x}", id, color.rgb());

        id
    }

    pub fn remove_user(&mut self, id: &str) -> bool {
        if self.users.remove(id).is_some() {
            info!("User {} left", id);
            true
        } else {
            false
        }
    }

    /// Applies a raw or envelope-framed position report from `id`
    ///
    /// Returns the stored position, or `None` when the user is no longer on
    /// the roster (a report racing the disconnect).
    pub fn apply_message(&mut self, id: &str, text: &str) -> Result<Option<Position>, CodecError> {
        let position = decode_position(&unwrap_envelope(text))?;

        match self.users.get_mut(id) {
            Some(member) => {
                member.position = position;
                Ok(Some(position))
            }
            None => {
                debug!("Dropping report for departed user {}", id);
                Ok(None)
            }
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for (id, member) in &self.users {
            snapshot.insert(
                id.clone(),
                SnapshotEntry {
                    position: member.position,
                    color: member.color,
                },
            );
        }
        snapshot
    }

    /// The out-of-band fragment broadcast to every client each tick
    pub fn render_snapshot(&self) -> Result<String, CodecError> {
        let json = encode_snapshot(&self.snapshot())?;
        Ok(fragment::render_snapshot(&json))
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self::new()
    }
}

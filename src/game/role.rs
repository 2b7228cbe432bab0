//! Player Roles and Slot Registry
//!
//! Maps the two active player slots to connection identities and decides
//! the role for each new connection. The registry never rejects anyone:
//! once both slots are taken, later connections become observers.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity of a transport connection.
///
/// Owned by the transport for the lifetime of the underlying channel;
/// everything else only references it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh connection identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form for logs.
        write!(f, "{}", &self.0.simple().to_string()[..8])
    }
}

/// One of the two mutually exclusive active-participant positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    /// The side that moves first.
    First,
    /// The side that moves second.
    Second,
}

impl Slot {
    /// The opposing slot.
    pub fn other(self) -> Slot {
        match self {
            Slot::First => Slot::Second,
            Slot::Second => Slot::First,
        }
    }
}

/// Role granted to a connection for the duration of its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "slot", rename_all = "snake_case")]
pub enum Role {
    /// Holds one of the two player slots.
    Player(Slot),
    /// Watches the game; holds no slot.
    Observer,
}

/// Tracks which connection holds each player slot.
///
/// Invariant: at most one connection holds `First` and at most one holds
/// `Second` at any time. Observers are not tracked here at all; they are
/// only broadcast subscribers.
#[derive(Debug, Default)]
pub struct RoleRegistry {
    first: Option<ConnectionId>,
    second: Option<ConnectionId>,
}

impl RoleRegistry {
    /// Create a registry with both slots vacant.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide the role for a new connection.
    ///
    /// Deterministic priority: fill `First` if vacant, else `Second`,
    /// else observer. A vacated slot goes to the next NEW connection;
    /// existing observers are never promoted.
    pub fn assign(&mut self, conn: ConnectionId) -> Role {
        if self.first.is_none() {
            self.first = Some(conn);
            Role::Player(Slot::First)
        } else if self.second.is_none() {
            self.second = Some(conn);
            Role::Player(Slot::Second)
        } else {
            Role::Observer
        }
    }

    /// Vacate the slot held by `conn`, if any, returning the vacated slot.
    pub fn release(&mut self, conn: ConnectionId) -> Option<Slot> {
        if self.first == Some(conn) {
            self.first = None;
            Some(Slot::First)
        } else if self.second == Some(conn) {
            self.second = None;
            Some(Slot::Second)
        } else {
            None
        }
    }

    /// The connection currently holding `slot`.
    pub fn holder(&self, slot: Slot) -> Option<ConnectionId> {
        match slot {
            Slot::First => self.first,
            Slot::Second => self.second,
        }
    }

    /// The slot held by `conn`, if any.
    pub fn slot_of(&self, conn: ConnectionId) -> Option<Slot> {
        if self.first == Some(conn) {
            Some(Slot::First)
        } else if self.second == Some(conn) {
            Some(Slot::Second)
        } else {
            None
        }
    }

    /// The connection holding the slot opposite to the one `conn` holds.
    ///
    /// Routing between peers always goes through this lookup rather than
    /// a literal side name, so the contract stays symmetric per pairing.
    pub fn counterpart_of(&self, conn: ConnectionId) -> Option<ConnectionId> {
        let slot = self.slot_of(conn)?;
        self.holder(slot.other())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_slots_in_priority_order() {
        let mut registry = RoleRegistry::new();
        let c1 = ConnectionId::new();
        let c2 = ConnectionId::new();
        let c3 = ConnectionId::new();

        assert_eq!(registry.assign(c1), Role::Player(Slot::First));
        assert_eq!(registry.assign(c2), Role::Player(Slot::Second));
        assert_eq!(registry.assign(c3), Role::Observer);
    }

    #[test]
    fn release_vacates_and_reports_slot() {
        let mut registry = RoleRegistry::new();
        let c1 = ConnectionId::new();
        let c2 = ConnectionId::new();
        registry.assign(c1);
        registry.assign(c2);

        assert_eq!(registry.release(c1), Some(Slot::First));
        assert_eq!(registry.holder(Slot::First), None);
        // Second still held.
        assert_eq!(registry.holder(Slot::Second), Some(c2));
        // Releasing twice is a no-op.
        assert_eq!(registry.release(c1), None);
    }

    #[test]
    fn observer_release_is_none() {
        let mut registry = RoleRegistry::new();
        let c1 = ConnectionId::new();
        let c2 = ConnectionId::new();
        let c3 = ConnectionId::new();
        registry.assign(c1);
        registry.assign(c2);
        registry.assign(c3);

        assert_eq!(registry.release(c3), None);
    }

    #[test]
    fn vacated_slot_goes_to_next_new_connection() {
        let mut registry = RoleRegistry::new();
        let c1 = ConnectionId::new();
        let c2 = ConnectionId::new();
        let observer = ConnectionId::new();
        registry.assign(c1);
        registry.assign(c2);
        registry.assign(observer);

        registry.release(c1);

        // The observer is not promoted; a new connection claims the slot.
        let c4 = ConnectionId::new();
        assert_eq!(registry.assign(c4), Role::Player(Slot::First));
        assert_eq!(registry.holder(Slot::First), Some(c4));
    }

    #[test]
    fn counterpart_lookup_is_symmetric() {
        let mut registry = RoleRegistry::new();
        let c1 = ConnectionId::new();
        let c2 = ConnectionId::new();
        registry.assign(c1);

        // No counterpart until the other slot fills.
        assert_eq!(registry.counterpart_of(c1), None);

        registry.assign(c2);
        assert_eq!(registry.counterpart_of(c1), Some(c2));
        assert_eq!(registry.counterpart_of(c2), Some(c1));

        // Observers have no counterpart.
        let c3 = ConnectionId::new();
        registry.assign(c3);
        assert_eq!(registry.counterpart_of(c3), None);
    }

    #[test]
    fn slot_exclusivity_over_arbitrary_sequences() {
        use rand::Rng;

        // Churn through connects and disconnects and check that no slot
        // is ever held by two connections.
        let mut rng = rand::thread_rng();
        let mut registry = RoleRegistry::new();
        let mut connected: Vec<ConnectionId> = Vec::new();

        for _ in 0..200 {
            if rng.gen_bool(0.4) && !connected.is_empty() {
                let gone = connected.remove(rng.gen_range(0..connected.len()));
                registry.release(gone);
            } else {
                let conn = ConnectionId::new();
                registry.assign(conn);
                connected.push(conn);
            }

            let first = registry.holder(Slot::First);
            let second = registry.holder(Slot::Second);
            if let (Some(a), Some(b)) = (first, second) {
                assert_ne!(a, b);
            }
            for holder in [first, second].into_iter().flatten() {
                assert!(connected.contains(&holder));
            }
        }
    }
}

//! Registry mapping logical port identifiers to groups and live handles.

use std::collections::HashMap;

use flexport_hal::{PortHandle, PortId};

/// One registered member port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryEntry {
    /// Controlling port of the group that owns this member.
    pub owner: PortId,
    /// The member's current hardware handle.
    pub handle: PortHandle,
}

/// Bidirectional view from a logical port identifier to its owning group
/// and its current hardware handle.
///
/// Hardware handles are destroyed and recreated with new underlying
/// identities during a flex reconfiguration, so external code must resolve
/// identifiers through this registry at the point of use instead of
/// caching handles. The group itself stores identifiers only.
#[derive(Debug, Clone, Default)]
pub struct PortGroupRegistry {
    entries: HashMap<PortId, RegistryEntry>,
}

impl PortGroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a member port under its owning group, replacing any
    /// previous entry (handle churn is an update, not an error).
    pub fn register_member(&mut self, owner: PortId, port: PortId, handle: PortHandle) {
        self.entries.insert(port, RegistryEntry { owner, handle });
    }

    /// Drops a member's entry, returning its last known handle.
    pub fn unregister(&mut self, port: PortId) -> Option<PortHandle> {
        self.entries.remove(&port).map(|e| e.handle)
    }

    /// Resolves a port identifier to its live hardware handle.
    pub fn resolve(&self, port: PortId) -> Option<PortHandle> {
        self.entries.get(&port).map(|e| e.handle)
    }

    /// Returns the controlling port of the group owning this member.
    pub fn owner_of(&self, port: PortId) -> Option<PortId> {
        self.entries.get(&port).map(|e| e.owner)
    }

    /// Returns true if the port is registered.
    pub fn contains(&self, port: PortId) -> bool {
        self.entries.contains_key(&port)
    }

    /// Number of registered member ports.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no ports are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

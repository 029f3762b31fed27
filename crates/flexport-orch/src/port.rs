//! Logical port model.
//!
//! Logical ports are owned by the external switch-state model; this engine
//! receives them as slices in ascending lane order and never keeps them.
//! The group and registry hold only [`flexport_hal::PortId`] values, so a
//! port object being destroyed and recreated under a new hardware identity
//! is a registry update, not a dangling reference.

use std::fmt;

use flexport_hal::{LogicalPortSpec, PortId, PortSpeed};

use crate::platform::ProfileId;

/// One logical port as the switch-state model presents it to this engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalPort {
    /// Stable logical identifier.
    pub id: PortId,
    /// Whether the port is administratively enabled.
    pub enabled: bool,
    /// Configured speed; the unspecified sentinel for unconfigured ports.
    pub speed: PortSpeed,
    /// Configured speed profile; defaults to the placeholder profile that
    /// no supported-profiles table contains.
    pub profile: ProfileId,
    /// Physical lane index within the owning group.
    pub lane: u8,
}

impl LogicalPort {
    /// Creates an enabled port at the given lane and speed.
    pub fn enabled(id: PortId, lane: u8, speed: PortSpeed) -> Self {
        Self {
            id,
            enabled: true,
            speed,
            profile: ProfileId::default(),
            lane,
        }
    }

    /// Creates a disabled port at the given lane.
    pub fn disabled(id: PortId, lane: u8) -> Self {
        Self {
            id,
            enabled: false,
            speed: PortSpeed::DEFAULT,
            profile: ProfileId::default(),
            lane,
        }
    }

    /// Replaces the port's speed profile.
    pub fn with_profile(mut self, profile: ProfileId) -> Self {
        self.profile = profile;
        self
    }

    /// Builds the hardware-facing spec for this port.
    pub fn as_spec(&self) -> LogicalPortSpec {
        LogicalPortSpec {
            id: self.id,
            speed: self.speed,
            enabled: self.enabled,
        }
    }
}

impl fmt::Display for LogicalPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Port({}, lane={}, speed={}, {})",
            self.id,
            self.lane,
            self.speed,
            if self.enabled { "enabled" } else { "disabled" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_constructors() {
        let port = LogicalPort::enabled(PortId::new(3), 2, PortSpeed::GE_25);
        assert!(port.enabled);
        assert_eq!(port.lane, 2);
        assert_eq!(port.speed, PortSpeed::GE_25);

        let port = LogicalPort::disabled(PortId::new(4), 3);
        assert!(!port.enabled);
        assert!(port.speed.is_default());
    }

    #[test]
    fn test_as_spec() {
        let port = LogicalPort::enabled(PortId::new(1), 0, PortSpeed::GE_40);
        let spec = port.as_spec();
        assert_eq!(spec.id, PortId::new(1));
        assert_eq!(spec.speed, PortSpeed::GE_40);
        assert!(spec.enabled);
    }
}

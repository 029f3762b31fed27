//! Identifier, handle, and speed types shared across the lane-control
//! engine.
//!
//! The distinction between [`PortId`] and [`PortHandle`] is load-bearing:
//! a `PortId` is the stable logical identifier assigned in physical lane
//! order, while a `PortHandle` names the live hardware object backing that
//! port. During a flex reconfiguration the hardware objects are destroyed
//! and recreated, so handles must never be stored across a reconfiguration
//! except inside the port-group registry.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable logical port identifier.
///
/// Port identifiers are assigned in physical lane order, so sorting a
/// group's members by identifier yields the lane order as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortId(u32);

impl PortId {
    /// Creates a new port identifier.
    pub const fn new(id: u32) -> Self {
        PortId(id)
    }

    /// Returns the raw identifier value.
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a live hardware port object.
///
/// Handles are minted by the hardware layer and become dangling when the
/// underlying object is destroyed, e.g. by a flex transition. Resolve a
/// [`PortId`] to a handle at the point of use rather than caching one.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortHandle(u64);

impl PortHandle {
    /// The null handle.
    pub const NULL: Self = PortHandle(0);

    /// Creates a handle from a raw value, rejecting the null value.
    pub fn from_raw(raw: u64) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(PortHandle(raw))
        }
    }

    /// Creates a handle from a raw value, allowing null.
    pub const fn from_raw_unchecked(raw: u64) -> Self {
        PortHandle(raw)
    }

    /// Returns the raw handle value.
    pub const fn as_raw(&self) -> u64 {
        self.0
    }

    /// Returns true if this is the null handle.
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for PortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PortHandle(0x{:012x})", self.0)
    }
}

impl fmt::Display for PortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:012x}", self.0)
    }
}

/// Port speed in Mbps.
///
/// The zero value is the "unspecified" sentinel carried by ports that have
/// no speed configured; it is never a valid operating speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortSpeed(u32);

impl PortSpeed {
    /// Unspecified/default speed sentinel.
    pub const DEFAULT: Self = PortSpeed(0);
    /// 10 Gigabit Ethernet
    pub const GE_10: Self = PortSpeed(10_000);
    /// 20 Gigabit Ethernet
    pub const GE_20: Self = PortSpeed(20_000);
    /// 25 Gigabit Ethernet
    pub const GE_25: Self = PortSpeed(25_000);
    /// 40 Gigabit Ethernet
    pub const GE_40: Self = PortSpeed(40_000);
    /// 50 Gigabit Ethernet
    pub const GE_50: Self = PortSpeed(50_000);
    /// 100 Gigabit Ethernet
    pub const GE_100: Self = PortSpeed(100_000);

    /// Creates a speed from Mbps.
    pub const fn from_mbps(mbps: u32) -> Self {
        PortSpeed(mbps)
    }

    /// Returns the speed in Mbps.
    pub const fn as_mbps(&self) -> u32 {
        self.0
    }

    /// Returns true if this is the unspecified sentinel.
    pub const fn is_default(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for PortSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1_000 && self.0 % 1_000 == 0 {
            write!(f, "{}G", self.0 / 1_000)
        } else {
            write!(f, "{}M", self.0)
        }
    }
}

/// The set of per-lane speeds the controlling port's SerDes supports.
pub type LaneSpeedSet = Vec<PortSpeed>;

/// How many physical lanes are bonded to form one logical port.
///
/// The discriminants are the lane counts themselves, and the derived
/// ordering follows lane count: `Single < Dual < Quad`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LaneMode {
    /// One lane per port (e.g. four 10G ports on a 4-lane group).
    Single = 1,
    /// Two lanes per port (e.g. two 20G or 50G ports).
    Dual = 2,
    /// All four lanes bonded into one port (e.g. one 40G or 100G port).
    Quad = 4,
}

impl LaneMode {
    /// Returns the number of lanes each port occupies in this mode.
    pub const fn lane_count(self) -> u8 {
        self as u8
    }

    /// Maps a lane count to a mode.
    ///
    /// Returns `None` for counts the hardware cannot express; this covers
    /// both profile-declared counts and counts read back from the lane
    /// register at startup.
    pub fn from_lane_count(lanes: u8) -> Option<Self> {
        match lanes {
            1 => Some(LaneMode::Single),
            2 => Some(LaneMode::Dual),
            4 => Some(LaneMode::Quad),
            _ => None,
        }
    }
}

impl fmt::Display for LaneMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneMode::Single => write!(f, "SINGLE"),
            LaneMode::Dual => write!(f, "DUAL"),
            LaneMode::Quad => write!(f, "QUAD"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lane_mode_ordering() {
        assert!(LaneMode::Single < LaneMode::Dual);
        assert!(LaneMode::Dual < LaneMode::Quad);
        assert_eq!(LaneMode::Quad.lane_count(), 4);
    }

    #[test]
    fn test_lane_mode_from_count() {
        assert_eq!(LaneMode::from_lane_count(1), Some(LaneMode::Single));
        assert_eq!(LaneMode::from_lane_count(2), Some(LaneMode::Dual));
        assert_eq!(LaneMode::from_lane_count(4), Some(LaneMode::Quad));
        assert_eq!(LaneMode::from_lane_count(3), None);
        assert_eq!(LaneMode::from_lane_count(0), None);
    }

    #[test]
    fn test_handle_null() {
        assert!(PortHandle::from_raw(0).is_none());
        assert!(PortHandle::NULL.is_null());
        let h = PortHandle::from_raw(0x42).unwrap();
        assert_eq!(h.as_raw(), 0x42);
        assert!(!h.is_null());
    }

    #[test]
    fn test_speed_display() {
        assert_eq!(PortSpeed::GE_40.to_string(), "40G");
        assert_eq!(PortSpeed::from_mbps(2_500).to_string(), "2500M");
        assert!(PortSpeed::DEFAULT.is_default());
        assert!(!PortSpeed::GE_10.is_default());
    }

    #[test]
    fn test_port_id_order_is_lane_order() {
        let mut ids = vec![PortId::new(3), PortId::new(1), PortId::new(2)];
        ids.sort_unstable();
        assert_eq!(ids, vec![PortId::new(1), PortId::new(2), PortId::new(3)]);
    }
}

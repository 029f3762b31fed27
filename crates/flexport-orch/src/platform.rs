//! Platform capability data for flexible port groups.
//!
//! Supplied by platform configuration at startup and immutable afterwards.
//! When a platform ships a speed-profile table, the table is the
//! authoritative source for lane counts; the speed-division calculation in
//! [`crate::lane_mode`] is the fallback for older platforms that only
//! publish per-lane SerDes speeds.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use flexport_hal::{LaneSpeedSet, PortSpeed};

/// Named speed-profile identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
    /// Creates a profile identifier.
    pub fn new(id: impl Into<String>) -> Self {
        ProfileId(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ProfileId {
    /// The placeholder profile carried by ports with no profile configured.
    ///
    /// Deliberately absent from every supported-profiles table, so a port
    /// that was never assigned a real profile fails the lookup instead of
    /// silently computing a lane count.
    fn default() -> Self {
        ProfileId("PROFILE_DEFAULT".to_string())
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lane requirement declared by one speed profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Number of SerDes lanes the profile occupies.
    pub num_lanes: u8,
    /// Aggregate speed the profile runs at.
    pub speed: PortSpeed,
}

/// Mapping from profile identifier to its lane requirement.
pub type SupportedProfiles = HashMap<ProfileId, ProfileConfig>;

/// Platform capabilities consulted by the reconfiguration engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Per-lane speeds the controlling port's SerDes supports.
    pub lane_speeds: LaneSpeedSet,
    /// Speeds ports may be configured at; empty means unrestricted.
    #[serde(default)]
    pub supported_port_speeds: Vec<PortSpeed>,
    /// Speed-profile table. When present it is the authoritative source
    /// for lane counts.
    #[serde(default)]
    pub supported_profiles: Option<SupportedProfiles>,
    /// Whether lane transitions must go through the dynamic add/remove
    /// resource API instead of the lane-count register.
    #[serde(default)]
    pub use_resource_api: bool,
    /// Whether the platform can dynamically add and remove port objects.
    #[serde(default)]
    pub supports_add_remove_port: bool,
}

impl PlatformConfig {
    /// Configuration for a platform using direct lane-register control.
    pub fn legacy(lane_speeds: LaneSpeedSet) -> Self {
        Self {
            lane_speeds,
            supported_port_speeds: Vec::new(),
            supported_profiles: None,
            use_resource_api: false,
            supports_add_remove_port: false,
        }
    }

    /// Configuration for a platform using the add/remove resource API.
    pub fn flex(lane_speeds: LaneSpeedSet) -> Self {
        Self {
            use_resource_api: true,
            supports_add_remove_port: true,
            ..Self::legacy(lane_speeds)
        }
    }

    /// Attaches a supported-profiles table.
    pub fn with_profiles(mut self, profiles: SupportedProfiles) -> Self {
        self.supported_profiles = Some(profiles);
        self
    }

    /// Restricts the speeds ports may be configured at.
    pub fn with_supported_port_speeds(mut self, speeds: Vec<PortSpeed>) -> Self {
        self.supported_port_speeds = speeds;
        self
    }

    /// Returns true if ports may be configured at the given speed.
    pub fn supports_speed(&self, speed: PortSpeed) -> bool {
        self.supported_port_speeds.is_empty() || self.supported_port_speeds.contains(&speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_profile_is_never_supported() {
        let mut profiles = SupportedProfiles::new();
        profiles.insert(
            ProfileId::new("PROFILE_40G_QUAD"),
            ProfileConfig {
                num_lanes: 4,
                speed: PortSpeed::GE_40,
            },
        );
        assert!(!profiles.contains_key(&ProfileId::default()));
    }

    #[test]
    fn test_supports_speed_unrestricted_by_default() {
        let platform = PlatformConfig::legacy(vec![PortSpeed::GE_10]);
        assert!(platform.supports_speed(PortSpeed::GE_100));

        let platform = platform.with_supported_port_speeds(vec![PortSpeed::GE_10, PortSpeed::GE_40]);
        assert!(platform.supports_speed(PortSpeed::GE_40));
        assert!(!platform.supports_speed(PortSpeed::GE_100));
    }

    #[test]
    fn test_platform_config_from_json() {
        let raw = r#"{
            "lane_speeds": [10000, 25000],
            "supported_profiles": {
                "PROFILE_100G_QUAD": { "num_lanes": 4, "speed": 100000 },
                "PROFILE_25G_SINGLE": { "num_lanes": 1, "speed": 25000 }
            },
            "use_resource_api": true,
            "supports_add_remove_port": true
        }"#;
        let platform: PlatformConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(platform.lane_speeds, vec![PortSpeed::GE_10, PortSpeed::GE_25]);
        assert!(platform.use_resource_api);
        let profiles = platform.supported_profiles.unwrap();
        assert_eq!(
            profiles[&ProfileId::new("PROFILE_100G_QUAD")].num_lanes,
            4
        );
    }
}

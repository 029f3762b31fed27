//! Lane-mode calculation and placement rules.
//!
//! Maps a port's configured speed (or speed profile) to the minimum number
//! of bonded SerDes lanes it needs, and aggregates per-member requirements
//! into the single lane mode a whole group must run in. Everything here is
//! pure computation; callers decide whether a failure aborts a
//! reconfiguration or merely rejects a candidate configuration.

use std::fmt;

use log::debug;

use flexport_hal::{LaneMode, PortSpeed};

use crate::platform::{ProfileId, SupportedProfiles};
use crate::port::LogicalPort;

/// Error type for lane-mode calculation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaneModeError {
    /// An enabled port carries the unspecified speed sentinel.
    InvalidConfig,
    /// No supported lane speed divides the requested speed evenly.
    UnsupportedSpeed { speed: PortSpeed },
    /// The port's speed profile is not in the supported-profiles table.
    UnknownProfile { profile: ProfileId },
    /// A lane count that is not 1, 2, or 4.
    InvalidLaneCount { lanes: u8 },
    /// An enabled port sits on a lane the computed mode cannot drive.
    InvalidPlacement { lane: u8, mode: LaneMode },
}

impl fmt::Display for LaneModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig => {
                write!(f, "speed cannot be unspecified when flexible lane modes are enabled")
            }
            Self::UnsupportedSpeed { speed } => {
                write!(f, "cannot support speed {} with the available lane speeds", speed)
            }
            Self::UnknownProfile { profile } => {
                write!(f, "unsupported speed profile: {}", profile)
            }
            Self::InvalidLaneCount { lanes } => {
                write!(f, "unexpected number of lanes: {}", lanes)
            }
            Self::InvalidPlacement { lane, mode } => {
                write!(f, "lane {} cannot be enabled in {} mode", lane, mode)
            }
        }
    }
}

impl std::error::Error for LaneModeError {}

/// Computes the lane mode needed to run a port at `speed`.
///
/// Each candidate lane speed that divides `speed` evenly proposes a lane
/// count; the first candidate proposing a representable count wins.
/// Candidates needing more than four lanes are skipped, not fatal: a later
/// candidate may still fit.
pub fn required_lane_mode(
    speed: PortSpeed,
    lane_speeds: &[PortSpeed],
) -> Result<LaneMode, LaneModeError> {
    if speed.is_default() {
        return Err(LaneModeError::InvalidConfig);
    }

    for lane_speed in lane_speeds {
        if lane_speed.as_mbps() == 0 || speed.as_mbps() % lane_speed.as_mbps() != 0 {
            // skip candidates that would require an unsupported lane speed
            continue;
        }
        match speed.as_mbps() / lane_speed.as_mbps() {
            1 => return Ok(LaneMode::Single),
            2 => return Ok(LaneMode::Dual),
            3 | 4 => return Ok(LaneMode::Quad),
            _ => {}
        }
    }

    Err(LaneModeError::UnsupportedSpeed { speed })
}

/// Looks up the lane mode a speed profile declares.
pub fn required_lane_mode_from_profile(
    profile: &ProfileId,
    profiles: &SupportedProfiles,
) -> Result<LaneMode, LaneModeError> {
    let config = profiles.get(profile).ok_or_else(|| LaneModeError::UnknownProfile {
        profile: profile.clone(),
    })?;
    LaneMode::from_lane_count(config.num_lanes).ok_or(LaneModeError::InvalidLaneCount {
        lanes: config.num_lanes,
    })
}

/// Checks that a lane may host an enabled port under the given mode.
///
/// In QUAD mode all four lanes feed the port on lane 0; in DUAL mode only
/// lanes 0 and 2 head a bonded pair. SINGLE mode places no restriction.
pub fn check_lane_placement(lane: u8, mode: LaneMode) -> Result<(), LaneModeError> {
    let legal = match mode {
        LaneMode::Quad => lane == 0,
        LaneMode::Dual => lane == 0 || lane == 2,
        LaneMode::Single => true,
    };
    if legal {
        Ok(())
    } else {
        Err(LaneModeError::InvalidPlacement { lane, mode })
    }
}

/// Aggregates per-member requirements into the group's desired lane mode.
///
/// `members` must be in ascending lane order. The running aggregate starts
/// at SINGLE and is raised to each enabled member's requirement (computed
/// by `required`); after each raise the member's lane is checked against
/// the placement rule for the aggregate so far. Disabled members impose no
/// requirement and are not placement-checked. The result is the minimal
/// lane mode that legally satisfies every enabled member.
pub fn aggregate_desired_lane_mode<F>(
    members: &[LogicalPort],
    mut required: F,
) -> Result<LaneMode, LaneModeError>
where
    F: FnMut(&LogicalPort) -> Result<LaneMode, LaneModeError>,
{
    let mut desired = LaneMode::Single;
    for port in members {
        if !port.enabled {
            continue;
        }
        let needed = required(port)?;
        if needed > desired {
            desired = needed;
        }
        check_lane_placement(port.lane, desired)?;
        debug!(
            "port {} enabled at speed {} needs {} mode",
            port.id, port.speed, needed
        );
    }
    Ok(desired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ProfileConfig;
    use flexport_hal::PortId;
    use pretty_assertions::assert_eq;

    fn lane_speeds() -> Vec<PortSpeed> {
        vec![PortSpeed::GE_10, PortSpeed::GE_25]
    }

    #[test]
    fn test_quotient_to_mode_mapping() {
        // 10G / 10G = 1 lane
        assert_eq!(
            required_lane_mode(PortSpeed::GE_10, &lane_speeds()).unwrap(),
            LaneMode::Single
        );
        // 20G / 10G = 2 lanes
        assert_eq!(
            required_lane_mode(PortSpeed::GE_20, &lane_speeds()).unwrap(),
            LaneMode::Dual
        );
        // 40G / 10G = 4 lanes
        assert_eq!(
            required_lane_mode(PortSpeed::GE_40, &lane_speeds()).unwrap(),
            LaneMode::Quad
        );
        // 30G / 10G = 3 lanes still fits in QUAD
        assert_eq!(
            required_lane_mode(PortSpeed::from_mbps(30_000), &lane_speeds()).unwrap(),
            LaneMode::Quad
        );
    }

    #[test]
    fn test_oversized_quotient_falls_through_to_next_candidate() {
        // 100G / 10G = 10 lanes is skipped; 100G / 25G = 4 lanes fits.
        assert_eq!(
            required_lane_mode(PortSpeed::GE_100, &lane_speeds()).unwrap(),
            LaneMode::Quad
        );
    }

    #[test]
    fn test_unsupported_speed() {
        let err = required_lane_mode(PortSpeed::GE_25, &[PortSpeed::GE_10]).unwrap_err();
        assert_eq!(
            err,
            LaneModeError::UnsupportedSpeed {
                speed: PortSpeed::GE_25
            }
        );
    }

    #[test]
    fn test_default_speed_is_invalid_regardless_of_lane_speeds() {
        assert_eq!(
            required_lane_mode(PortSpeed::DEFAULT, &lane_speeds()).unwrap_err(),
            LaneModeError::InvalidConfig
        );
        assert_eq!(
            required_lane_mode(PortSpeed::DEFAULT, &[]).unwrap_err(),
            LaneModeError::InvalidConfig
        );
    }

    #[test]
    fn test_profile_lookup() {
        let mut profiles = SupportedProfiles::new();
        profiles.insert(
            ProfileId::new("PROFILE_50G_DUAL"),
            ProfileConfig {
                num_lanes: 2,
                speed: PortSpeed::GE_50,
            },
        );
        profiles.insert(
            ProfileId::new("PROFILE_TRI"),
            ProfileConfig {
                num_lanes: 3,
                speed: PortSpeed::from_mbps(30_000),
            },
        );

        assert_eq!(
            required_lane_mode_from_profile(&ProfileId::new("PROFILE_50G_DUAL"), &profiles)
                .unwrap(),
            LaneMode::Dual
        );
        assert_eq!(
            required_lane_mode_from_profile(&ProfileId::new("PROFILE_NONE"), &profiles)
                .unwrap_err(),
            LaneModeError::UnknownProfile {
                profile: ProfileId::new("PROFILE_NONE")
            }
        );
        // a declared lane count of 3 is not representable
        assert_eq!(
            required_lane_mode_from_profile(&ProfileId::new("PROFILE_TRI"), &profiles)
                .unwrap_err(),
            LaneModeError::InvalidLaneCount { lanes: 3 }
        );
    }

    #[test]
    fn test_placement_rules() {
        // SINGLE never rejects
        for lane in 0..4 {
            assert!(check_lane_placement(lane, LaneMode::Single).is_ok());
        }
        // DUAL allows lanes 0 and 2 only
        assert!(check_lane_placement(0, LaneMode::Dual).is_ok());
        assert!(check_lane_placement(2, LaneMode::Dual).is_ok());
        assert!(check_lane_placement(1, LaneMode::Dual).is_err());
        assert!(check_lane_placement(3, LaneMode::Dual).is_err());
        // QUAD allows lane 0 only
        assert!(check_lane_placement(0, LaneMode::Quad).is_ok());
        for lane in 1..4 {
            assert_eq!(
                check_lane_placement(lane, LaneMode::Quad).unwrap_err(),
                LaneModeError::InvalidPlacement {
                    lane,
                    mode: LaneMode::Quad
                }
            );
        }
    }

    #[test]
    fn test_aggregate_is_max_of_enabled_members() {
        // lane 0 at 50G (2x25G => DUAL), lane 2 at 10G (SINGLE) => DUAL
        let members = vec![
            LogicalPort::enabled(PortId::new(1), 0, PortSpeed::GE_50),
            LogicalPort::disabled(PortId::new(2), 1),
            LogicalPort::enabled(PortId::new(3), 2, PortSpeed::GE_10),
            LogicalPort::disabled(PortId::new(4), 3),
        ];
        let mode =
            aggregate_desired_lane_mode(&members, |p| required_lane_mode(p.speed, &lane_speeds()))
                .unwrap();
        assert_eq!(mode, LaneMode::Dual);
    }

    #[test]
    fn test_aggregate_single_40g_port_needs_quad() {
        let members = vec![LogicalPort::enabled(PortId::new(1), 0, PortSpeed::GE_40)];
        let mode =
            aggregate_desired_lane_mode(&members, |p| required_lane_mode(p.speed, &lane_speeds()))
                .unwrap();
        assert_eq!(mode, LaneMode::Quad);
    }

    #[test]
    fn test_aggregate_rejects_enabled_lane_outside_mode() {
        // lane 0 forces QUAD, so an enabled port on lane 1 is illegal
        let members = vec![
            LogicalPort::enabled(PortId::new(1), 0, PortSpeed::GE_40),
            LogicalPort::enabled(PortId::new(2), 1, PortSpeed::GE_10),
        ];
        let err =
            aggregate_desired_lane_mode(&members, |p| required_lane_mode(p.speed, &lane_speeds()))
                .unwrap_err();
        assert_eq!(
            err,
            LaneModeError::InvalidPlacement {
                lane: 1,
                mode: LaneMode::Quad
            }
        );
    }

    #[test]
    fn test_aggregate_skips_disabled_members_entirely() {
        // disabled ports impose no requirement and no placement check,
        // even with an unspecified speed on an otherwise-illegal lane
        let members = vec![
            LogicalPort::enabled(PortId::new(1), 0, PortSpeed::GE_40),
            LogicalPort::disabled(PortId::new(2), 1),
            LogicalPort::disabled(PortId::new(3), 2),
            LogicalPort::disabled(PortId::new(4), 3),
        ];
        let mode =
            aggregate_desired_lane_mode(&members, |p| required_lane_mode(p.speed, &lane_speeds()))
                .unwrap();
        assert_eq!(mode, LaneMode::Quad);
    }

    #[test]
    fn test_aggregate_empty_group_is_single() {
        let mode = aggregate_desired_lane_mode(&[], |p| {
            required_lane_mode(p.speed, &lane_speeds())
        })
        .unwrap();
        assert_eq!(mode, LaneMode::Single);
    }
}

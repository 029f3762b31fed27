//! Lane-mode reconfiguration engine for flexible port groups.
//!
//! A port group is a fixed bundle of physical SerDes lanes addressed
//! through one controlling port. Depending on the configured speeds of the
//! logical ports in the group, the lanes are bonded as one 4-lane port, two
//! 2-lane ports, or four 1-lane ports. This crate decides which lane mode a
//! candidate configuration needs and safely transitions the hardware
//! between modes.
//!
//! # Architecture
//!
//! ```text
//! state-apply pipeline
//!        │  reconfigure_if_needed(old, new)
//!        ▼
//!  [PortGroupOrch] ──> [lane_mode] calculation + placement rules
//!        │
//!        ├──> [PortGroupRegistry]  port id ⇒ live hardware handle
//!        │
//!        └──> [HardwareLaneController]  (flexport-hal)
//!               ├─ legacy backend: lane-count register writes
//!               └─ flex backend:   transactional port add/remove
//! ```
//!
//! # Execution model
//!
//! Everything here is synchronous and single-threaded with respect to the
//! invoking pipeline: one configuration change is fully processed before
//! the next is considered, and every hardware call blocks until the driver
//! answers. The engine takes no locks and assumes the caller serializes
//! configuration-apply operations per device.

pub mod group;
pub mod lane_mode;
pub mod platform;
pub mod port;

pub use group::{PortGroup, PortGroupCallbacks, PortGroupError, PortGroupOrch, PortGroupRegistry};
pub use lane_mode::LaneModeError;
pub use platform::{PlatformConfig, ProfileConfig, ProfileId, SupportedProfiles};
pub use port::LogicalPort;

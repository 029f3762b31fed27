//! Port groups: registry, validation, and lane-mode reconfiguration.
//!
//! A [`PortGroup`] tracks the controlling port, the member ports sharing
//! its lanes, and the lane mode currently programmed in hardware. The
//! [`PortGroupOrch`] sequences transitions between lane modes through one
//! of two backend strategies (direct lane-register writes, or the dynamic
//! add/remove resource API), and the [`PortGroupRegistry`] is the single
//! place a stable port identifier resolves to a live hardware handle; the
//! handles themselves churn whenever the flex backend destroys and
//! recreates port objects.

mod orch;
mod registry;

pub use orch::{PortGroup, PortGroupCallbacks, PortGroupError, PortGroupOrch, Result};
pub use registry::PortGroupRegistry;

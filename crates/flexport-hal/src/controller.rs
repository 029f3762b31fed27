//! Capability traits the reconfiguration engine drives hardware through.
//!
//! All calls are blocking synchronous requests to the device driver layer.
//! Nothing here locks: the engine assumes exclusive access to the device
//! for the duration of a reconfiguration, and callers serialize
//! configuration-apply operations per device.

use crate::error::HwResult;
use crate::types::{LaneMode, PortHandle, PortId, PortSpeed};

/// Specification of a logical port submitted to the resource builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalPortSpec {
    /// Stable logical identifier for the port.
    pub id: PortId,
    /// Configured speed.
    pub speed: PortSpeed,
    /// Whether the port is administratively enabled.
    pub enabled: bool,
}

/// A port object created by the resource builder, with its new handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedPort {
    pub id: PortId,
    pub handle: PortHandle,
}

/// Hardware-side mapping from logical port identifiers to live handles.
///
/// Entries must be dropped before their underlying objects are destroyed
/// and re-added once replacements exist; [`PortTable::lookup`] is how the
/// engine re-resolves an identifier after its handle has churned.
pub trait PortTable {
    /// Adds an entry for a port that exists in hardware.
    fn add_entry(&mut self, port: PortId) -> HwResult<()>;

    /// Removes the entry for a port.
    fn remove_entry(&mut self, port: PortId) -> HwResult<()>;

    /// Resolves a port identifier to its current hardware handle.
    fn lookup(&self, port: PortId) -> HwResult<PortHandle>;
}

/// Transactional add/remove of logical port objects.
///
/// Queue removals and additions, then commit the whole batch with
/// [`ResourceBuilder::program`]. The commit is all-or-nothing from the
/// engine's perspective: a partially applied batch would leave an invalid
/// intermediate lane assignment, so implementations must not expose one.
pub trait ResourceBuilder {
    /// Queues existing port objects for removal.
    fn remove_ports(&mut self, handles: &[PortHandle]) -> HwResult<()>;

    /// Queues new port objects for creation and returns their handles.
    ///
    /// The returned handles become live only once [`ResourceBuilder::program`]
    /// commits the batch.
    fn add_ports(&mut self, specs: &[LogicalPortSpec]) -> HwResult<Vec<CreatedPort>>;

    /// Commits all queued removals and additions in one operation.
    fn program(&mut self) -> HwResult<()>;
}

/// Register-level lane control and the per-port controls surrounding it.
pub trait HardwareLaneController {
    /// Reads the number of active lanes on the controlling port.
    ///
    /// Queried once at startup to rebuild each group's current lane mode
    /// from hardware; there is no persisted lane-mode state.
    fn active_lane_count(&self, controlling: PortHandle) -> HwResult<u8>;

    /// Writes the active lane count register on the controlling port.
    ///
    /// Undefined behavior on enabled links; every member port must be
    /// disabled first.
    fn set_active_lane_count(&mut self, controlling: PortHandle, lanes: u8) -> HwResult<()>;

    /// Stops link-state polling for a port.
    fn disable_linkscan(&mut self, port: PortHandle) -> HwResult<()>;

    /// Resumes link-state polling for a port.
    fn enable_linkscan(&mut self, port: PortHandle) -> HwResult<()>;

    /// Administratively disables a port.
    fn disable_port(&mut self, port: PortHandle) -> HwResult<()>;

    /// Toggles the per-port trap controls as a group.
    ///
    /// Covers five categories: ARP request to CPU, ARP reply to CPU, DHCP
    /// drop, DHCP to CPU, and neighbor discovery to CPU. These controls are
    /// not managed by the resource builder and must be cleared explicitly
    /// before the underlying port object is destroyed.
    fn set_port_trap_controls(&mut self, port: PortHandle, enabled: bool) -> HwResult<()>;

    /// Purges forwarding (L2) entries associated with a port.
    ///
    /// `include_static` additionally covers statically-programmed entries;
    /// `include_pending` covers entries still in the pending-learn state.
    fn delete_forwarding_entries(
        &mut self,
        port: PortHandle,
        include_static: bool,
        include_pending: bool,
    ) -> HwResult<()>;

    /// Opens a resource builder for a lane transition on this group.
    fn resource_builder<'a>(
        &'a mut self,
        controlling: PortHandle,
        desired: LaneMode,
    ) -> Box<dyn ResourceBuilder + 'a>;

    /// Read access to the hardware port table.
    fn port_table(&self) -> &dyn PortTable;

    /// Write access to the hardware port table.
    fn port_table_mut(&mut self) -> &mut dyn PortTable;
}

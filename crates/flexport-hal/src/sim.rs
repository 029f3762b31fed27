//! In-memory lane controller for tests and bring-up.
//!
//! Simulates just enough of the device driver to exercise the
//! reconfiguration engine: port objects with linkscan/enable/trap state and
//! forwarding-entry counts, a per-controlling-port lane register, a port
//! table, and a transactional resource builder. Every mutating call is
//! appended to an ordered operation log so tests can assert call sequences,
//! and a single operation kind can be armed to fail to exercise abort
//! behavior.
//!
//! State lives behind `Arc<Mutex<..>>`; clones share it, so a test can hand
//! one clone to the engine and keep another for inspection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;

use crate::controller::{
    CreatedPort, HardwareLaneController, LogicalPortSpec, PortTable, ResourceBuilder,
};
use crate::error::{HwError, HwResult, HwStatus};
use crate::types::{LaneMode, PortHandle, PortId};

const HANDLE_BASE: u64 = 0x1000;

/// One recorded hardware operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimOp {
    SetActiveLaneCount { controlling: PortHandle, lanes: u8 },
    DisableLinkscan(PortHandle),
    EnableLinkscan(PortHandle),
    DisablePort(PortHandle),
    SetTrapControls { port: PortHandle, enabled: bool },
    DeleteForwardingEntries {
        port: PortHandle,
        include_static: bool,
        include_pending: bool,
    },
    RemovePorts(Vec<PortHandle>),
    AddPorts(Vec<PortId>),
    Program,
    TableAdd(PortId),
    TableRemove(PortId),
}

/// Operation kind, used to arm failure injection and filter the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimOpKind {
    SetActiveLaneCount,
    DisableLinkscan,
    EnableLinkscan,
    DisablePort,
    SetTrapControls,
    DeleteForwardingEntries,
    RemovePorts,
    AddPorts,
    Program,
    TableAdd,
    TableRemove,
}

impl SimOp {
    /// Returns the kind of this operation.
    pub fn kind(&self) -> SimOpKind {
        match self {
            SimOp::SetActiveLaneCount { .. } => SimOpKind::SetActiveLaneCount,
            SimOp::DisableLinkscan(_) => SimOpKind::DisableLinkscan,
            SimOp::EnableLinkscan(_) => SimOpKind::EnableLinkscan,
            SimOp::DisablePort(_) => SimOpKind::DisablePort,
            SimOp::SetTrapControls { .. } => SimOpKind::SetTrapControls,
            SimOp::DeleteForwardingEntries { .. } => SimOpKind::DeleteForwardingEntries,
            SimOp::RemovePorts(_) => SimOpKind::RemovePorts,
            SimOp::AddPorts(_) => SimOpKind::AddPorts,
            SimOp::Program => SimOpKind::Program,
            SimOp::TableAdd(_) => SimOpKind::TableAdd,
            SimOp::TableRemove(_) => SimOpKind::TableRemove,
        }
    }
}

/// Simulated state of one hardware port object.
#[derive(Debug, Clone)]
pub struct SimPort {
    pub handle: PortHandle,
    pub linkscan: bool,
    pub enabled: bool,
    pub traps_enabled: bool,
    pub static_entries: u32,
    pub pending_entries: u32,
}

#[derive(Debug, Default)]
struct SimState {
    ports: HashMap<PortId, SimPort>,
    table: HashMap<PortId, PortHandle>,
    lane_registers: HashMap<PortHandle, u8>,
    ops: Vec<SimOp>,
    fail_on: Option<SimOpKind>,
    handle_count: u64,
}

impl SimState {
    /// Records an operation, failing it if its kind is armed to fail.
    fn record(&mut self, op: SimOp) -> HwResult<()> {
        let kind = op.kind();
        self.ops.push(op);
        if self.fail_on == Some(kind) {
            self.fail_on = None;
            return Err(HwError::new(
                HwStatus::Failure,
                format!("simulated failure in {:?}", kind),
            ));
        }
        Ok(())
    }

    fn alloc_handle(&mut self) -> PortHandle {
        self.handle_count += 1;
        PortHandle::from_raw_unchecked(HANDLE_BASE + self.handle_count)
    }

    fn port_by_handle_mut(&mut self, handle: PortHandle) -> HwResult<&mut SimPort> {
        self.ports
            .values_mut()
            .find(|p| p.handle == handle)
            .ok_or_else(|| {
                HwError::new(
                    HwStatus::NotFound,
                    format!("no port object for handle {}", handle),
                )
            })
    }
}

/// Simulated [`HardwareLaneController`].
#[derive(Debug, Clone, Default)]
pub struct SimLaneController {
    state: Arc<Mutex<SimState>>,
}

impl SimLaneController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a port object plus its port-table entry, as hardware
    /// discovery would present it: linkscan running, port enabled, traps on.
    pub fn add_port(&self, id: PortId) -> PortHandle {
        let mut state = self.state.lock().unwrap();
        let handle = state.alloc_handle();
        state.ports.insert(
            id,
            SimPort {
                handle,
                linkscan: true,
                enabled: true,
                traps_enabled: true,
                static_entries: 0,
                pending_entries: 0,
            },
        );
        state.table.insert(id, handle);
        handle
    }

    /// Seeds the active-lane register for a controlling port.
    pub fn set_lane_register(&self, controlling: PortHandle, lanes: u8) {
        self.state
            .lock()
            .unwrap()
            .lane_registers
            .insert(controlling, lanes);
    }

    /// Seeds forwarding-entry counts on a port.
    pub fn seed_forwarding_entries(&self, id: PortId, static_entries: u32, pending_entries: u32) {
        let mut state = self.state.lock().unwrap();
        if let Some(port) = state.ports.get_mut(&id) {
            port.static_entries = static_entries;
            port.pending_entries = pending_entries;
        }
    }

    /// Arms the next operation of the given kind to fail.
    pub fn fail_on(&self, kind: SimOpKind) {
        self.state.lock().unwrap().fail_on = Some(kind);
    }

    /// Returns a copy of the operation log.
    pub fn ops(&self) -> Vec<SimOp> {
        self.state.lock().unwrap().ops.clone()
    }

    /// Clears the operation log, typically after test setup.
    pub fn clear_ops(&self) {
        self.state.lock().unwrap().ops.clear();
    }

    /// Returns the simulated state of a port, if it exists in hardware.
    pub fn port(&self, id: PortId) -> Option<SimPort> {
        self.state.lock().unwrap().ports.get(&id).cloned()
    }

    /// Returns the number of port objects that exist in hardware.
    pub fn port_count(&self) -> usize {
        self.state.lock().unwrap().ports.len()
    }
}

impl HardwareLaneController for SimLaneController {
    fn active_lane_count(&self, controlling: PortHandle) -> HwResult<u8> {
        self.state
            .lock()
            .unwrap()
            .lane_registers
            .get(&controlling)
            .copied()
            .ok_or_else(|| {
                HwError::new(
                    HwStatus::NotFound,
                    format!("no lane register for handle {}", controlling),
                )
            })
    }

    fn set_active_lane_count(&mut self, controlling: PortHandle, lanes: u8) -> HwResult<()> {
        let mut state = self.state.lock().unwrap();
        state.record(SimOp::SetActiveLaneCount { controlling, lanes })?;
        state.lane_registers.insert(controlling, lanes);
        Ok(())
    }

    fn disable_linkscan(&mut self, port: PortHandle) -> HwResult<()> {
        let mut state = self.state.lock().unwrap();
        state.record(SimOp::DisableLinkscan(port))?;
        state.port_by_handle_mut(port)?.linkscan = false;
        Ok(())
    }

    fn enable_linkscan(&mut self, port: PortHandle) -> HwResult<()> {
        let mut state = self.state.lock().unwrap();
        state.record(SimOp::EnableLinkscan(port))?;
        state.port_by_handle_mut(port)?.linkscan = true;
        Ok(())
    }

    fn disable_port(&mut self, port: PortHandle) -> HwResult<()> {
        let mut state = self.state.lock().unwrap();
        state.record(SimOp::DisablePort(port))?;
        state.port_by_handle_mut(port)?.enabled = false;
        Ok(())
    }

    fn set_port_trap_controls(&mut self, port: PortHandle, enabled: bool) -> HwResult<()> {
        let mut state = self.state.lock().unwrap();
        state.record(SimOp::SetTrapControls { port, enabled })?;
        state.port_by_handle_mut(port)?.traps_enabled = enabled;
        Ok(())
    }

    fn delete_forwarding_entries(
        &mut self,
        port: PortHandle,
        include_static: bool,
        include_pending: bool,
    ) -> HwResult<()> {
        let mut state = self.state.lock().unwrap();
        state.record(SimOp::DeleteForwardingEntries {
            port,
            include_static,
            include_pending,
        })?;
        let port = state.port_by_handle_mut(port)?;
        if include_static {
            port.static_entries = 0;
        }
        if include_pending {
            port.pending_entries = 0;
        }
        Ok(())
    }

    fn resource_builder<'a>(
        &'a mut self,
        controlling: PortHandle,
        desired: LaneMode,
    ) -> Box<dyn ResourceBuilder + 'a> {
        Box::new(SimResourceBuilder {
            state: Arc::clone(&self.state),
            controlling,
            desired,
            removals: Vec::new(),
            additions: Vec::new(),
        })
    }

    fn port_table(&self) -> &dyn PortTable {
        self
    }

    fn port_table_mut(&mut self) -> &mut dyn PortTable {
        self
    }
}

impl PortTable for SimLaneController {
    fn add_entry(&mut self, port: PortId) -> HwResult<()> {
        let mut state = self.state.lock().unwrap();
        state.record(SimOp::TableAdd(port))?;
        let handle = state.ports.get(&port).map(|p| p.handle).ok_or_else(|| {
            HwError::new(
                HwStatus::NotFound,
                format!("port {} does not exist in hardware", port),
            )
        })?;
        state.table.insert(port, handle);
        Ok(())
    }

    fn remove_entry(&mut self, port: PortId) -> HwResult<()> {
        let mut state = self.state.lock().unwrap();
        state.record(SimOp::TableRemove(port))?;
        state.table.remove(&port).map(|_| ()).ok_or_else(|| {
            HwError::new(HwStatus::NotFound, format!("port {} not in port table", port))
        })
    }

    fn lookup(&self, port: PortId) -> HwResult<PortHandle> {
        self.state
            .lock()
            .unwrap()
            .table
            .get(&port)
            .copied()
            .ok_or_else(|| {
                HwError::new(HwStatus::NotFound, format!("port {} not in port table", port))
            })
    }
}

/// Resource builder over the shared simulated state.
///
/// Removals and additions are queued; nothing changes hardware state until
/// `program()` applies the whole batch.
struct SimResourceBuilder {
    state: Arc<Mutex<SimState>>,
    controlling: PortHandle,
    desired: LaneMode,
    removals: Vec<PortHandle>,
    additions: Vec<(LogicalPortSpec, PortHandle)>,
}

impl ResourceBuilder for SimResourceBuilder {
    fn remove_ports(&mut self, handles: &[PortHandle]) -> HwResult<()> {
        let mut state = self.state.lock().unwrap();
        state.record(SimOp::RemovePorts(handles.to_vec()))?;
        self.removals.extend_from_slice(handles);
        Ok(())
    }

    fn add_ports(&mut self, specs: &[LogicalPortSpec]) -> HwResult<Vec<CreatedPort>> {
        let mut state = self.state.lock().unwrap();
        state.record(SimOp::AddPorts(specs.iter().map(|s| s.id).collect()))?;
        let mut created = Vec::with_capacity(specs.len());
        for spec in specs {
            let handle = state.alloc_handle();
            self.additions.push((spec.clone(), handle));
            created.push(CreatedPort {
                id: spec.id,
                handle,
            });
        }
        Ok(created)
    }

    fn program(&mut self) -> HwResult<()> {
        let mut state = self.state.lock().unwrap();
        state.record(SimOp::Program)?;
        let removals = &self.removals;
        state.ports.retain(|_, p| !removals.contains(&p.handle));
        for (spec, handle) in &self.additions {
            state.ports.insert(
                spec.id,
                SimPort {
                    handle: *handle,
                    linkscan: false,
                    enabled: false,
                    traps_enabled: false,
                    static_entries: 0,
                    pending_entries: 0,
                },
            );
        }
        debug!(
            "programmed {} removals, {} additions under controlling handle {} ({} mode)",
            self.removals.len(),
            self.additions.len(),
            self.controlling,
            self.desired
        );
        Ok(())
    }
}

//! Port-group state and the lane-mode reconfiguration orchestrator.
//!
//! The state-apply pipeline hands this module the old and new port lists
//! for one group whenever switch configuration changes. The orchestrator
//! computes the lane mode the new list needs and, when it differs from
//! what hardware currently runs, sequences the transition:
//!
//! ```text
//! Stable(current) ──> Disabling ──> {Legacy | Flex} ──> Stable(desired)
//! ```
//!
//! There is no partial-success state: any hardware failure aborts the
//! whole operation by propagating the error, and no rollback of
//! already-applied steps is attempted. Intermediate states (ports
//! disabled, traps cleared, forwarding entries purged) are not safely
//! reversible once later steps have begun, so a failure partway through a
//! flex transition can leave the group with some old ports removed and no
//! replacements yet. That is a known operational risk requiring external
//! intervention, not something this engine masks.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, info};

use flexport_hal::{
    HardwareLaneController, HwError, LaneMode, LogicalPortSpec, PortHandle, PortId, PortSpeed,
};

use super::registry::PortGroupRegistry;
use crate::lane_mode::{
    aggregate_desired_lane_mode, required_lane_mode, required_lane_mode_from_profile,
    LaneModeError,
};
use crate::platform::PlatformConfig;
use crate::port::LogicalPort;

/// Error type for port-group operations.
#[derive(Debug, Clone)]
pub enum PortGroupError {
    /// Lane-mode calculation failed; no hardware was touched.
    LaneMode(LaneModeError),
    /// The platform requires the resource API but cannot add/remove ports.
    UnsupportedPlatformOperation { controlling: PortId },
    /// A hardware call failed; the reconfiguration aborted where it stood.
    Hardware(HwError),
    /// No group is registered under this controlling port.
    UnknownGroup { controlling: PortId },
    /// A port expected to be present was not found.
    PortNotFound(PortId),
}

impl fmt::Display for PortGroupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LaneMode(e) => write!(f, "{}", e),
            Self::UnsupportedPlatformOperation { controlling } => write!(
                f,
                "port {} does not support adding or removing ports via the resource API",
                controlling
            ),
            Self::Hardware(e) => write!(f, "hardware call failed: {}", e),
            Self::UnknownGroup { controlling } => {
                write!(f, "no port group with controlling port {}", controlling)
            }
            Self::PortNotFound(port) => write!(f, "port not found: {}", port),
        }
    }
}

impl std::error::Error for PortGroupError {}

impl From<LaneModeError> for PortGroupError {
    fn from(e: LaneModeError) -> Self {
        Self::LaneMode(e)
    }
}

impl From<HwError> for PortGroupError {
    fn from(e: HwError) -> Self {
        Self::Hardware(e)
    }
}

/// Result type alias for port-group operations.
pub type Result<T> = std::result::Result<T, PortGroupError>;

/// Callbacks for notifying platform collaborators of port events.
#[derive(Clone, Default)]
pub struct PortGroupCallbacks {
    /// Called when a member port's configured speed changed, whether or
    /// not a lane transition was needed for it.
    pub on_link_speed_changed: Option<Arc<dyn Fn(PortId, PortSpeed) + Send + Sync>>,
}

impl fmt::Debug for PortGroupCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortGroupCallbacks")
            .field("on_link_speed_changed", &self.on_link_speed_changed.is_some())
            .finish()
    }
}

/// A controlling port plus the member ports sharing its physical lanes.
///
/// Members are kept sorted ascending by identifier; identifiers are
/// assigned in physical lane order, so this is also lane order. The group
/// holds identifiers only; handles live in the registry.
#[derive(Debug, Clone)]
pub struct PortGroup {
    controlling_port: PortId,
    members: Vec<PortId>,
    lane_mode: LaneMode,
}

impl PortGroup {
    /// The controlling port used to address lane-level hardware controls.
    pub fn controlling_port(&self) -> PortId {
        self.controlling_port
    }

    /// Member ports in lane order.
    pub fn members(&self) -> &[PortId] {
        &self.members
    }

    /// The lane mode currently programmed in hardware.
    pub fn lane_mode(&self) -> LaneMode {
        self.lane_mode
    }
}

/// Backend for applying a new lane mode to a quiesced group.
///
/// Selected once per controlling port from the platform capability flags;
/// the two backends are not interchangeable once a platform has opted into
/// resource-API semantics.
trait TransitionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Applies `desired` to the group. Every member port is already
    /// disabled with linkscan stopped when this runs.
    fn set_active_lanes(
        &self,
        ctx: &mut TransitionCtx<'_>,
        new_ports: &[LogicalPort],
        desired: LaneMode,
    ) -> Result<()>;
}

/// Mutable state a transition operates on.
struct TransitionCtx<'a> {
    hw: &'a mut dyn HardwareLaneController,
    registry: &'a mut PortGroupRegistry,
    group: &'a mut PortGroup,
}

impl TransitionCtx<'_> {
    fn resolve(&self, port: PortId) -> Result<PortHandle> {
        self.registry
            .resolve(port)
            .ok_or(PortGroupError::PortNotFound(port))
    }
}

/// Writes the lane-count register on the controlling port directly.
///
/// Port objects survive the transition; only the register and the group's
/// recorded mode change.
struct LegacyLaneControl;

impl TransitionStrategy for LegacyLaneControl {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn set_active_lanes(
        &self,
        ctx: &mut TransitionCtx<'_>,
        _new_ports: &[LogicalPort],
        desired: LaneMode,
    ) -> Result<()> {
        let current = ctx.group.lane_mode;
        let controlling = ctx.resolve(ctx.group.controlling_port)?;

        // The hardware cannot switch directly between SINGLE and DUAL;
        // route through QUAD first. Every member port is disabled at this
        // point, so the intermediate write cannot drop traffic.
        if (current == LaneMode::Single && desired == LaneMode::Dual)
            || (current == LaneMode::Dual && desired == LaneMode::Single)
        {
            ctx.hw
                .set_active_lane_count(controlling, LaneMode::Quad.lane_count())?;
        }
        ctx.hw
            .set_active_lane_count(controlling, desired.lane_count())?;

        ctx.group.lane_mode = desired;
        Ok(())
    }
}

/// Destroys and recreates the group's port objects via the resource API.
///
/// Required on platforms whose lane partitioning can only change by
/// removing the old logical ports and adding a new set. Handles churn: the
/// registry and the hardware port table are rebuilt from the created
/// ports.
struct FlexPortApi {
    supports_add_remove: bool,
}

impl TransitionStrategy for FlexPortApi {
    fn name(&self) -> &'static str {
        "flex"
    }

    fn set_active_lanes(
        &self,
        ctx: &mut TransitionCtx<'_>,
        new_ports: &[LogicalPort],
        desired: LaneMode,
    ) -> Result<()> {
        let controlling_id = ctx.group.controlling_port;
        if !self.supports_add_remove {
            return Err(PortGroupError::UnsupportedPlatformOperation {
                controlling: controlling_id,
            });
        }

        let old_members = ctx
            .group
            .members
            .iter()
            .map(|&id| ctx.resolve(id).map(|handle| (id, handle)))
            .collect::<Result<Vec<_>>>()?;

        // Stale forwarding entries must not outlive the port objects they
        // point at: purge learned+static, then pending, for every member.
        for &(_, handle) in &old_members {
            ctx.hw.delete_forwarding_entries(handle, true, false)?;
            ctx.hw.delete_forwarding_entries(handle, false, true)?;
        }

        // Per-port trap controls are not managed by the resource API;
        // clear them explicitly before the port objects go away.
        for &(_, handle) in &old_members {
            ctx.hw.set_port_trap_controls(handle, false)?;
        }

        let controlling_handle = ctx.resolve(controlling_id)?;
        let old_handles: Vec<PortHandle> = old_members.iter().map(|&(_, h)| h).collect();
        let specs: Vec<LogicalPortSpec> = new_ports.iter().map(LogicalPort::as_spec).collect();

        // Remove all existing ports, add the new set, then commit both in
        // one program(); the builder's contract is all-or-nothing.
        let created = {
            let mut builder = ctx.hw.resource_builder(controlling_handle, desired);
            builder.remove_ports(&old_handles)?;
            let created = builder.add_ports(&specs)?;
            builder.program()?;
            created
        };

        // The add/remove invalidated the old table entries and registry
        // state; rebuild both from the created ports.
        for &(id, _) in &old_members {
            ctx.hw.port_table_mut().remove_entry(id)?;
            ctx.registry.unregister(id);
        }
        let mut members = Vec::with_capacity(created.len());
        for port in &created {
            ctx.hw.port_table_mut().add_entry(port.id)?;
            ctx.registry
                .register_member(controlling_id, port.id, port.handle);
            members.push(port.id);
        }
        members.sort_unstable();

        // The controlling port's underlying identity may have changed.
        let controlling_handle = ctx.hw.port_table().lookup(controlling_id)?;
        debug!(
            "controlling port {} re-resolved to handle {}",
            controlling_id, controlling_handle
        );

        let members_before = ctx.group.members.len();
        ctx.group.members = members;

        // Restore the trap controls cleared above on the new port objects.
        for &id in &ctx.group.members {
            let handle = ctx.resolve(id)?;
            ctx.hw.set_port_trap_controls(handle, true)?;
        }

        info!(
            "finished reconfiguring group of controlling port {}: {} -> {} mode, {} -> {} members",
            controlling_id,
            ctx.group.lane_mode,
            desired,
            members_before,
            ctx.group.members.len()
        );
        ctx.group.lane_mode = desired;
        Ok(())
    }
}

fn select_strategy(platform: &PlatformConfig) -> Arc<dyn TransitionStrategy> {
    if platform.use_resource_api {
        Arc::new(FlexPortApi {
            supports_add_remove: platform.supports_add_remove_port,
        })
    } else {
        Arc::new(LegacyLaneControl)
    }
}

struct GroupState {
    group: PortGroup,
    strategy: Arc<dyn TransitionStrategy>,
}

/// Orchestrates lane-mode reconfiguration for the port groups of one
/// device.
///
/// Groups are discovered from hardware at startup and never destroyed
/// while the device runs; a successful reconfiguration mutates the group
/// in place. All hardware access goes through the injected
/// [`HardwareLaneController`].
pub struct PortGroupOrch {
    platform: PlatformConfig,
    hw: Box<dyn HardwareLaneController>,
    registry: PortGroupRegistry,
    groups: HashMap<PortId, GroupState>,
    callbacks: PortGroupCallbacks,
}

impl PortGroupOrch {
    /// Creates an orchestrator over the given platform and hardware.
    pub fn new(platform: PlatformConfig, hw: Box<dyn HardwareLaneController>) -> Self {
        Self {
            platform,
            hw,
            registry: PortGroupRegistry::new(),
            groups: HashMap::new(),
            callbacks: PortGroupCallbacks::default(),
        }
    }

    /// Sets the callbacks for port events.
    pub fn set_callbacks(&mut self, callbacks: PortGroupCallbacks) {
        self.callbacks = callbacks;
    }

    /// Discovers a port group from hardware topology at startup.
    ///
    /// Registers every member with its live handle and reads the current
    /// lane mode back from the controlling port's lane register; there is
    /// no persisted lane-mode state.
    pub fn discover_group(&mut self, controlling: PortId, members: Vec<PortId>) -> Result<()> {
        let mut members = members;
        // Identifiers are assigned in physical lane order, so sorting by
        // id also yields lane order.
        members.sort_unstable();

        for &id in &members {
            let handle = self.hw.port_table().lookup(id)?;
            self.registry.register_member(controlling, id, handle);
        }
        let controlling_handle = self
            .registry
            .resolve(controlling)
            .ok_or(PortGroupError::PortNotFound(controlling))?;

        let lanes = self.hw.active_lane_count(controlling_handle)?;
        let lane_mode =
            LaneMode::from_lane_count(lanes).ok_or(LaneModeError::InvalidLaneCount { lanes })?;

        info!(
            "created port group with controlling port {} ({} members, {} mode)",
            controlling,
            members.len(),
            lane_mode
        );
        self.groups.insert(
            controlling,
            GroupState {
                group: PortGroup {
                    controlling_port: controlling,
                    members,
                    lane_mode,
                },
                strategy: select_strategy(&self.platform),
            },
        );
        Ok(())
    }

    /// Returns the group owned by the given controlling port.
    pub fn group(&self, controlling: PortId) -> Option<&PortGroup> {
        self.groups.get(&controlling).map(|s| &s.group)
    }

    /// Read access to the registry, for resolving port handles.
    pub fn registry(&self) -> &PortGroupRegistry {
        &self.registry
    }

    /// Non-mutating check of whether a candidate port list is achievable.
    ///
    /// Converts any calculation failure into `false`; used by
    /// config-acceptance checks without touching hardware or registry
    /// state.
    pub fn validate_configuration(&self, candidate_ports: &[LogicalPort]) -> bool {
        match self.desired_lane_mode(candidate_ports) {
            Ok(_) => true,
            Err(e) => {
                debug!("rejecting candidate configuration: {}", e);
                false
            }
        }
    }

    /// Entry point for the state-apply pipeline.
    ///
    /// Computes the lane mode the new port list needs and transitions the
    /// group if it differs from the current mode. Afterwards, fires
    /// `on_link_speed_changed` for every member present in both lists
    /// whose speed changed. Calling this with identical old and new lists
    /// issues no hardware call.
    pub fn reconfigure_if_needed(
        &mut self,
        controlling: PortId,
        old_ports: &[LogicalPort],
        new_ports: &[LogicalPort],
    ) -> Result<()> {
        let desired = self.desired_lane_mode(new_ports)?;
        let current = self
            .groups
            .get(&controlling)
            .ok_or(PortGroupError::UnknownGroup { controlling })?
            .group
            .lane_mode;

        if desired != current {
            self.reconfigure_lane_mode(controlling, old_ports, new_ports, desired)?;
        }

        for old in old_ports {
            if let Some(new) = new_ports.iter().find(|p| p.id == old.id) {
                if old.speed != new.speed {
                    if let Some(cb) = &self.callbacks.on_link_speed_changed {
                        cb(new.id, new.speed);
                    }
                }
            }
        }
        Ok(())
    }

    /// Computes the lane mode a port list requires, profile table
    /// preferred over the speed-division fallback.
    fn desired_lane_mode(&self, ports: &[LogicalPort]) -> Result<LaneMode> {
        match &self.platform.supported_profiles {
            Some(profiles) => Ok(aggregate_desired_lane_mode(ports, |port| {
                required_lane_mode_from_profile(&port.profile, profiles)
            })?),
            None => {
                // Reject members configured at a speed the platform cannot
                // run. Checked even for disabled members.
                for port in ports {
                    if !port.speed.is_default() && !self.platform.supports_speed(port.speed) {
                        return Err(LaneModeError::UnsupportedSpeed { speed: port.speed }.into());
                    }
                }
                Ok(aggregate_desired_lane_mode(ports, |port| {
                    required_lane_mode(port.speed, &self.platform.lane_speeds)
                })?)
            }
        }
    }

    /// Runs the full transition sequence to `desired`.
    fn reconfigure_lane_mode(
        &mut self,
        controlling: PortId,
        old_ports: &[LogicalPort],
        new_ports: &[LogicalPort],
        desired: LaneMode,
    ) -> Result<()> {
        let state = self
            .groups
            .get_mut(&controlling)
            .ok_or(PortGroupError::UnknownGroup { controlling })?;
        let strategy = Arc::clone(&state.strategy);
        info!(
            "reconfiguring group of controlling port {} from {} to {} mode via {} backend",
            controlling,
            state.group.lane_mode,
            desired,
            strategy.name()
        );

        // Quiesce every current member before touching lane geometry:
        // linkscan first, then the port itself. Lane changes are undefined
        // behavior on enabled links.
        for &id in &state.group.members {
            if !old_ports.iter().any(|p| p.id == id) {
                return Err(PortGroupError::PortNotFound(id));
            }
            let handle = self
                .registry
                .resolve(id)
                .ok_or(PortGroupError::PortNotFound(id))?;
            self.hw.disable_linkscan(handle)?;
            self.hw.disable_port(handle)?;
        }

        let mut ctx = TransitionCtx {
            hw: self.hw.as_mut(),
            registry: &mut self.registry,
            group: &mut state.group,
        };
        strategy.set_active_lanes(&mut ctx, new_ports, desired)?;

        // Bring linkscan back for ports that exist and are enabled in the
        // new state. Enabling the ports themselves is deferred to the
        // caller: it depends on readiness of other switch state (VLAN
        // membership among it) that this engine does not own.
        for port in new_ports {
            if !port.enabled {
                continue;
            }
            let handle = self
                .registry
                .resolve(port.id)
                .ok_or(PortGroupError::PortNotFound(port.id))?;
            self.hw.enable_linkscan(handle)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flexport_hal::sim::SimLaneController;
    use flexport_hal::PortSpeed;

    fn legacy_platform() -> PlatformConfig {
        PlatformConfig::legacy(vec![PortSpeed::GE_10, PortSpeed::GE_25])
    }

    #[test]
    fn test_reconfigure_unknown_group() {
        let sim = SimLaneController::new();
        let mut orch = PortGroupOrch::new(legacy_platform(), Box::new(sim));
        let ports = vec![LogicalPort::enabled(PortId::new(1), 0, PortSpeed::GE_10)];
        let err = orch
            .reconfigure_if_needed(PortId::new(1), &ports, &ports)
            .unwrap_err();
        assert!(matches!(err, PortGroupError::UnknownGroup { .. }));
    }

    #[test]
    fn test_discover_rejects_unrepresentable_lane_count() {
        let sim = SimLaneController::new();
        let handle = sim.add_port(PortId::new(1));
        sim.set_lane_register(handle, 3);

        let mut orch = PortGroupOrch::new(legacy_platform(), Box::new(sim));
        let err = orch
            .discover_group(PortId::new(1), vec![PortId::new(1)])
            .unwrap_err();
        assert!(matches!(
            err,
            PortGroupError::LaneMode(LaneModeError::InvalidLaneCount { lanes: 3 })
        ));
    }

    #[test]
    fn test_validate_is_read_only() {
        let sim = SimLaneController::new();
        let inspect = sim.clone();
        let orch = PortGroupOrch::new(legacy_platform(), Box::new(sim));

        // placement violation: lane 1 enabled while lane 0 needs QUAD
        let bad = vec![
            LogicalPort::enabled(PortId::new(1), 0, PortSpeed::GE_40),
            LogicalPort::enabled(PortId::new(2), 1, PortSpeed::GE_10),
        ];
        assert!(!orch.validate_configuration(&bad));

        let good = vec![LogicalPort::enabled(PortId::new(1), 0, PortSpeed::GE_40)];
        assert!(orch.validate_configuration(&good));

        assert!(inspect.ops().is_empty());
    }

    #[test]
    fn test_validate_rejects_unsupported_member_speed() {
        let sim = SimLaneController::new();
        let platform = legacy_platform().with_supported_port_speeds(vec![PortSpeed::GE_10]);
        let orch = PortGroupOrch::new(platform, Box::new(sim));

        // disabled members are speed-checked too
        let ports = vec![
            LogicalPort::enabled(PortId::new(1), 0, PortSpeed::GE_10),
            LogicalPort {
                speed: PortSpeed::GE_40,
                ..LogicalPort::disabled(PortId::new(2), 1)
            },
        ];
        assert!(!orch.validate_configuration(&ports));
    }
}

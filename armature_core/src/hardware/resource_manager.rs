//! The downward contract to the hardware abstraction layer.
//!
//! The core never touches hardware. It consumes an interface registry that
//! owns the raw handles, tracks availability and claims, negotiates command
//! mode switches and performs the per-cycle `read`/`write`. Everything the
//! core needs from that layer is captured by [`ResourceManager`]; production
//! deployments hand in their hardware stack, tests hand in a fake.

use std::time::{Duration, Instant};

use crate::error::ArmatureResult;
use crate::hardware::{CommandLoan, InterfaceDescription, StateLoan};

/// Status of a hardware read/write cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    /// Cycle completed normally
    Ok,
    /// Soft failure: the listed components ask for their controllers to be
    /// deactivated, hardware itself keeps running
    Deactivate,
    /// Hard failure on the listed components
    Error,
}

/// Result of a hardware read or write cycle.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub status: CycleStatus,
    /// Names of the hardware components that failed, empty when `Ok`
    pub failed_components: Vec<String>,
}

impl CycleOutcome {
    /// A clean cycle.
    pub fn ok() -> Self {
        Self {
            status: CycleStatus::Ok,
            failed_components: Vec::new(),
        }
    }

    /// A failed cycle naming the components at fault.
    pub fn failed(status: CycleStatus, failed_components: Vec<String>) -> Self {
        Self {
            status,
            failed_components,
        }
    }
}

/// Interface registry and hardware cycle driver, owned by the hardware
/// abstraction layer.
///
/// Claim discipline: a command interface has at most one outstanding
/// [`CommandLoan`]; claiming a claimed interface fails. State interfaces are
/// shared and always claimable while available. Loans go back through the
/// release methods.
pub trait ResourceManager: Send + Sync {
    // ==================== Availability and claims ====================

    /// All currently available command interface names.
    fn available_command_interfaces(&self) -> Vec<String>;

    /// All currently available state interface names.
    fn available_state_interfaces(&self) -> Vec<String>;

    fn command_interface_is_available(&self, name: &str) -> bool;

    fn state_interface_is_available(&self, name: &str) -> bool;

    /// Whether some controller currently holds the loan of `name`.
    fn command_interface_is_claimed(&self, name: &str) -> bool;

    fn claim_command_interface(&self, name: &str) -> ArmatureResult<CommandLoan>;

    fn claim_state_interface(&self, name: &str) -> ArmatureResult<StateLoan>;

    fn release_command_interface(&self, loan: CommandLoan);

    fn release_state_interface(&self, loan: StateLoan);

    // ==================== Command mode switching ====================

    /// Ask the hardware whether the combined interface change is acceptable.
    /// `false` aborts the switch before anything is applied.
    fn prepare_command_mode_switch(&self, activate: &[String], deactivate: &[String]) -> bool;

    /// Apply a previously prepared interface change. Called from the
    /// real-time thread at a cycle boundary.
    fn perform_command_mode_switch(&self, activate: &[String], deactivate: &[String]) -> bool;

    // ==================== Hardware cycle ====================

    fn read(&self, time: Instant, period: Duration) -> CycleOutcome;

    fn write(&self, time: Instant, period: Duration) -> CycleOutcome;

    /// Clamp pending commands to the hardware limits before writing.
    fn enforce_command_limits(&self, period: Duration);

    // ==================== Chained controller exports ====================

    /// Import the reference interfaces a chainable controller exports on
    /// configure. They become claimable command interfaces under the
    /// controller's name prefix once made available.
    fn import_reference_interfaces(&self, controller: &str, interfaces: Vec<InterfaceDescription>);

    /// Import the state interfaces a chainable controller exports on
    /// configure.
    fn import_exported_state_interfaces(
        &self,
        controller: &str,
        interfaces: Vec<InterfaceDescription>,
    );

    /// Remove all interfaces previously imported for `controller` (cleanup
    /// and unload).
    fn remove_controller_interfaces(&self, controller: &str);

    fn make_reference_interfaces_available(&self, controller: &str);

    fn make_reference_interfaces_unavailable(&self, controller: &str);

    fn make_exported_state_interfaces_available(&self, controller: &str);

    fn make_exported_state_interfaces_unavailable(&self, controller: &str);

    // ==================== Hardware/controller association ====================

    /// Remember which interfaces `controller` uses, so hardware faults can
    /// be mapped back to the controllers they affect.
    fn cache_controller_to_hardware(&self, controller: &str, interfaces: &[String]);

    /// Controllers cached against the given hardware component.
    fn controllers_for_hardware(&self, component: &str) -> Vec<String>;
}

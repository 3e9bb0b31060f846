//! Switch request plumbing and shared helpers of the switch engine.
//!
//! A switch request is deposited by a control thread under the request
//! mutex, applied by the real-time loop at the next cycle boundary
//! (`do_switch` + try_lock), and completed back on the control thread via
//! the condition variable. The validation phases live on
//! [`ControllerManager`](crate::scheduling::ControllerManager); this module
//! holds the request state and the pure helpers both sides share.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::alog;
use crate::core::record::ControllerRecord;
use crate::error::{ArmatureError, ArmatureResult};
use crate::hardware::ResourceManager;
use crate::scheduling::chain::add_item;

/// Switch strictness policy.
///
/// `Strict` requests are atomic all-or-nothing; `BestEffort` drops the parts
/// that cannot be applied. `Auto` and `ForceAuto` exist for API
/// compatibility and currently collapse to `BestEffort`.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    /// Resolve to the manager's configured default
    Default = 0,
    Strict = 1,
    BestEffort = 2,
    Auto = 3,
    ForceAuto = 4,
}

impl Strictness {
    /// Map a raw wire value onto the enum. Unknown values become
    /// `BestEffort` with a warning.
    pub fn from_raw(value: i32) -> Self {
        match value {
            0 => Strictness::Default,
            1 => Strictness::Strict,
            2 => Strictness::BestEffort,
            3 => Strictness::Auto,
            4 => Strictness::ForceAuto,
            other => {
                alog!(
                    warn,
                    "Unknown switch strictness value {}, defaulting to BEST_EFFORT",
                    other
                );
                Strictness::BestEffort
            }
        }
    }

    /// Resolve the effective policy for one request.
    pub(crate) fn resolve(self, default: Strictness) -> Strictness {
        match self {
            Strictness::Default => {
                let resolved = match default {
                    Strictness::Strict => Strictness::Strict,
                    _ => Strictness::BestEffort,
                };
                alog!(
                    warn,
                    "Switch strictness unspecified, using configured default {:?}",
                    resolved
                );
                resolved
            }
            Strictness::Auto => {
                alog!(warn, "Strictness AUTO is not currently implemented. Defaulting to BEST_EFFORT");
                Strictness::BestEffort
            }
            Strictness::ForceAuto => {
                alog!(debug, "Strictness FORCE_AUTO is not currently implemented. Defaulting to BEST_EFFORT");
                Strictness::BestEffort
            }
            other => other,
        }
    }
}

/// The transient switch request, shared between the control thread that
/// deposits it and the real-time loop that applies it.
#[derive(Debug, Default)]
pub(crate) struct SwitchState {
    /// Armed flag: the RT loop applies the request when it sees this set
    pub do_switch: bool,
    pub activate_asap: bool,
    pub timeout: Duration,
    pub activate: Vec<String>,
    pub deactivate: Vec<String>,
    pub to_chained_mode: Vec<String>,
    pub from_chained_mode: Vec<String>,
    pub activate_command_interfaces: Vec<String>,
    pub deactivate_command_interfaces: Vec<String>,
}

impl SwitchState {
    pub fn clear(&mut self) {
        self.do_switch = false;
        self.activate_asap = false;
        self.timeout = Duration::ZERO;
        self.activate.clear();
        self.deactivate.clear();
        self.to_chained_mode.clear();
        self.from_chained_mode.clear();
        self.activate_command_interfaces.clear();
        self.deactivate_command_interfaces.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.activate.is_empty()
            && self.deactivate.is_empty()
            && self.to_chained_mode.is_empty()
            && self.from_chained_mode.is_empty()
            && self.activate_command_interfaces.is_empty()
            && self.deactivate_command_interfaces.is_empty()
    }
}

/// Mutex + condition variable pair around the switch request. The RT side
/// only ever tries the lock; failing just postpones the apply one cycle.
pub(crate) struct SwitchParams {
    pub state: Mutex<SwitchState>,
    pub cv: Condvar,
}

impl SwitchParams {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SwitchState::default()),
            cv: Condvar::new(),
        }
    }
}

/// Find a record by controller name.
pub(crate) fn find_record<'a>(
    records: &'a [Arc<ControllerRecord>],
    name: &str,
) -> Option<&'a Arc<ControllerRecord>> {
    records.iter().find(|record| record.name() == name)
}

/// Append the expansion of a controller's command interface configuration.
pub(crate) fn extract_command_interfaces(
    record: &ControllerRecord,
    resource_manager: &dyn ResourceManager,
    out: &mut Vec<String>,
) {
    let expanded = record
        .controller()
        .command_interface_configuration()
        .expand(|| resource_manager.available_command_interfaces());
    out.extend(expanded);
}

/// Every command and state interface a controller requires, expanded.
pub(crate) fn all_required_interfaces(
    record: &ControllerRecord,
    resource_manager: &dyn ResourceManager,
) -> Vec<String> {
    let controller = record.controller();
    let mut interfaces = controller
        .command_interface_configuration()
        .expand(|| resource_manager.available_command_interfaces());
    interfaces.extend(
        controller
            .state_interface_configuration()
            .expand(|| resource_manager.available_state_interfaces()),
    );
    interfaces
}

/// Collect the active controllers that hold any of `name`'s command
/// interfaces. Used to clear the way for fallback activation.
pub(crate) fn active_peers_using_command_interfaces(
    name: &str,
    records: &[Arc<ControllerRecord>],
    out: &mut Vec<String>,
) {
    let Some(record) = find_record(records, name) else {
        alog!(error, "Controller '{}' not found in the list of controllers", name);
        return;
    };
    let needed = record
        .controller()
        .command_interface_configuration()
        .names()
        .to_vec();
    for interface in &needed {
        for peer in records {
            if !peer.is_active() || peer.name() == name {
                continue;
            }
            let peer_interfaces = peer.controller().command_interface_configuration();
            if peer_interfaces.names().iter().any(|n| n == interface) {
                add_item(out, peer.name());
            }
        }
    }
}

/// Join names for log lines.
pub(crate) fn concat_names(names: &[String]) -> String {
    names.join(" ")
}

/// Phase E bookkeeping: rebuild every record's claimed-interface set from
/// its final lifecycle state and report whether the requested switch
/// actually happened.
pub(crate) fn evaluate_switch_result(
    records: &[Arc<ControllerRecord>],
    resource_manager: &dyn ResourceManager,
    activate: &[String],
    deactivate: &[String],
) -> ArmatureResult<()> {
    let mut unable_to_activate = Vec::new();
    let mut unable_to_deactivate = Vec::new();

    for record in records {
        if record.is_active() {
            let claimed = record
                .controller()
                .command_interface_configuration()
                .expand(|| resource_manager.available_command_interfaces());
            record.set_claimed_interfaces(claimed);
        } else {
            record.clear_claimed_interfaces();
        }

        let name = record.name();
        let in_activate = activate.iter().any(|n| n == name);
        let in_deactivate = deactivate.iter().any(|n| n == name);

        if in_activate && !record.is_active() {
            alog!(error, "Could not activate controller : '{}'", name);
            unable_to_activate.push(name.to_string());
        }
        // Real deactivations only; chained restarts appear in both lists
        if in_deactivate && !in_activate && record.is_active() {
            alog!(error, "Could not deactivate controller : '{}'", name);
            unable_to_deactivate.push(name.to_string());
        }
    }

    if unable_to_activate.is_empty() && unable_to_deactivate.is_empty() {
        alog!(info, "Successfully switched controllers!");
        Ok(())
    } else {
        let mut message = String::from("Failed switching controllers.");
        if !unable_to_activate.is_empty() {
            message.push_str(&format!(
                " Unable to activate: [ {} ]",
                concat_names(&unable_to_activate)
            ));
        }
        if !unable_to_deactivate.is_empty() {
            message.push_str(&format!(
                " Unable to deactivate: [ {} ]",
                concat_names(&unable_to_deactivate)
            ));
        }
        Err(ArmatureError::conflict(message))
    }
}

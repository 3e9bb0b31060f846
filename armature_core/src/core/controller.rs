//! The controller capability contract.
//!
//! A controller is any value implementing [`Controller`]. The manager only
//! ever talks to controllers through this trait: capability queries, the
//! lifecycle hooks driven by the lifecycle engine, interface hand-off during
//! activation, and the per-cycle update trigger.
//!
//! # Logging
//!
//! Use the `alog!()` macro inside any hook; the manager sets the controller
//! context around every call:
//!
//! ```ignore
//! use armature_core::alog;
//!
//! fn on_configure(&mut self) -> CallbackResult {
//!     alog!(info, "Configuring with {} joints", self.joints.len());
//!     CallbackResult::Success
//! }
//! ```

use std::time::{Duration, Instant};

use crate::hardware::{CommandLoan, InterfaceDescription, StateLoan};

/// Which command or state interfaces a controller requires.
///
/// Expanded at activation time: `All` resolves to every currently available
/// interface, `Individual` to the listed names, `None` to nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceConfig {
    /// Claim every interface the hardware currently exposes
    All,
    /// Claim exactly the listed interface names, in the listed order
    Individual(Vec<String>),
    /// No interfaces of this kind
    None,
}

impl InterfaceConfig {
    /// The explicitly named interfaces, if any.
    ///
    /// `All` and `None` have no inherent names; chain analysis only inspects
    /// `Individual` configurations.
    pub fn names(&self) -> &[String] {
        match self {
            InterfaceConfig::Individual(names) => names,
            _ => &[],
        }
    }

    /// Expand the configuration against the currently available interfaces.
    pub fn expand(&self, available: impl FnOnce() -> Vec<String>) -> Vec<String> {
        match self {
            InterfaceConfig::All => available(),
            InterfaceConfig::Individual(names) => names.clone(),
            InterfaceConfig::None => Vec::new(),
        }
    }
}

/// Result of a lifecycle hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackResult {
    /// Hook completed, transition proceeds
    Success,
    /// Hook refused, transition is rolled back
    Failure,
    /// Hook failed hard, controller goes through error handling
    Error,
}

/// Result code of a controller update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    Ok,
    Error,
}

/// Outcome of [`Controller::trigger_update`].
///
/// Synchronous controllers run inline and report the cycle just executed.
/// Asynchronous controllers may return immediately with the *previous*
/// cycle's result; `successful = false` means no cycle result is available
/// yet (for instance the very first trigger of an async controller).
#[derive(Debug, Clone, Copy)]
pub struct TriggerResult {
    pub successful: bool,
    pub result: UpdateResult,
    /// Measured execution time of the reported cycle, if known
    pub execution_time: Option<Duration>,
    /// Measured period of the reported cycle, if known
    pub period: Option<Duration>,
}

impl TriggerResult {
    /// A successful synchronous trigger with timing data.
    pub fn ok(execution_time: Duration, period: Duration) -> Self {
        Self {
            successful: true,
            result: UpdateResult::Ok,
            execution_time: Some(execution_time),
            period: Some(period),
        }
    }

    /// A failed trigger.
    pub fn error() -> Self {
        Self {
            successful: true,
            result: UpdateResult::Error,
            execution_time: None,
            period: None,
        }
    }
}

/// Capability contract between the manager and a controller.
///
/// Capability queries have conservative defaults: not chainable, not async,
/// no own rate, no fallbacks, no interfaces. A minimal controller implements
/// `on_activate`, `on_deactivate`, `trigger_update` and the two interface
/// configuration queries.
pub trait Controller: Send {
    // ==================== Capability queries ====================

    /// Command interfaces this controller claims while active.
    fn command_interface_configuration(&self) -> InterfaceConfig;

    /// State interfaces this controller reads while active.
    fn state_interface_configuration(&self) -> InterfaceConfig;

    /// Whether this controller exports reference/state interfaces that other
    /// controllers can consume.
    fn is_chainable(&self) -> bool {
        false
    }

    /// Whether `trigger_update` hands work to a worker and returns the
    /// previous cycle's result.
    fn is_async(&self) -> bool {
        false
    }

    /// The controller's own update rate in Hz.
    ///
    /// `None` means run at the manager rate. A rate above the manager rate
    /// is clamped to every-cycle triggering.
    fn update_rate(&self) -> Option<f64> {
        None
    }

    /// Controllers to activate automatically when this one fails at update
    /// time, in activation order.
    fn fallback_controllers(&self) -> Vec<String> {
        Vec::new()
    }

    // ==================== Lifecycle hooks ====================

    /// Called once right after loading.
    fn on_init(&mut self) -> CallbackResult {
        CallbackResult::Success
    }

    /// Called on configure; always entered from the unconfigured state.
    fn on_configure(&mut self) -> CallbackResult {
        CallbackResult::Success
    }

    /// Called on activation, after interfaces have been assigned.
    fn on_activate(&mut self) -> CallbackResult;

    /// Called on deactivation, before interfaces are released.
    fn on_deactivate(&mut self) -> CallbackResult;

    /// Called on cleanup (inactive back to unconfigured).
    fn on_cleanup(&mut self) -> CallbackResult {
        CallbackResult::Success
    }

    /// Called on shutdown (unload).
    fn on_shutdown(&mut self) -> CallbackResult {
        CallbackResult::Success
    }

    /// Called when any other hook fails or panics. `Success` returns the
    /// controller to unconfigured; anything else finalizes it.
    fn on_error(&mut self) -> CallbackResult {
        CallbackResult::Success
    }

    // ==================== Interface hand-off ====================

    /// Hand the claimed interface loans to the controller. Called during
    /// activation, before `on_activate`.
    fn assign_interfaces(&mut self, command: Vec<CommandLoan>, state: Vec<StateLoan>);

    /// Take all loans back from the controller. The manager returns them to
    /// the interface registry.
    fn release_interfaces(&mut self) -> (Vec<CommandLoan>, Vec<StateLoan>);

    // ==================== Execution ====================

    /// Run one control cycle. `period` is the elapsed time since this
    /// controller's previous trigger; it is never zero.
    fn trigger_update(&mut self, time: Instant, period: Duration) -> TriggerResult;

    // ==================== Chainable extensions ====================

    /// Reference interfaces this controller exports for preceding
    /// controllers to write into. Only meaningful when `is_chainable()`.
    fn export_reference_interfaces(&self) -> Vec<InterfaceDescription> {
        Vec::new()
    }

    /// State interfaces this controller exports for following controllers
    /// to read. Only meaningful when `is_chainable()`.
    fn export_state_interfaces(&self) -> Vec<InterfaceDescription> {
        Vec::new()
    }

    /// Switch the controller in or out of chained mode. Returns `false` if
    /// the controller refuses the switch. Only called while not active.
    fn set_chained_mode(&mut self, _chained: bool) -> bool {
        true
    }

    /// Whether the controller currently runs in chained mode.
    fn is_in_chained_mode(&self) -> bool {
        false
    }

    /// Asked of deactivating asynchronous controllers before the switch is
    /// armed, so they can finish the cycle in flight.
    fn prepare_for_deactivation(&mut self) {}
}

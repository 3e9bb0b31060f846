//! Per-controller lifecycle state machine.
//!
//! States: unconfigured → inactive → active → back, with finalized as the
//! terminal state. Transitions run the matching controller hook with the
//! log context set and every panic trapped; a hook that reports
//! [`CallbackResult::Error`] or panics sends the controller through the
//! error path (`on_error`), which lands in unconfigured on success and
//! finalized otherwise.
//!
//! The functions here only move state and invoke hooks. Interface claims,
//! exported-interface registration and roster membership are the manager's
//! business and happen around these calls.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;

use crate::alog;
use crate::core::alog::{clear_controller_context, set_controller_context};
use crate::core::controller::{CallbackResult, Controller};
use crate::core::record::ControllerRecord;
use crate::error::{ArmatureError, ArmatureResult};

/// Lifecycle state of a loaded controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifecycleState {
    Unconfigured,
    Inactive,
    Active,
    Finalized,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Unconfigured => write!(f, "unconfigured"),
            LifecycleState::Inactive => write!(f, "inactive"),
            LifecycleState::Active => write!(f, "active"),
            LifecycleState::Finalized => write!(f, "finalized"),
        }
    }
}

/// Outcome of one trapped hook invocation. `Panicked` means the controller
/// code unwound; the payload was already logged.
enum HookOutcome {
    Returned(CallbackResult),
    Panicked,
}

fn call_hook<F>(record: &ControllerRecord, hook_name: &str, hook: F) -> HookOutcome
where
    F: FnOnce(&mut Box<dyn Controller>) -> CallbackResult,
{
    set_controller_context(record.name(), 0);
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let mut controller = record.controller();
        hook(&mut controller)
    }));
    clear_controller_context();

    match outcome {
        Ok(result) => HookOutcome::Returned(result),
        Err(payload) => {
            let message = panic_message(&payload);
            alog!(
                error,
                "Controller '{}' panicked in {}: {}",
                record.name(),
                hook_name,
                message
            );
            HookOutcome::Panicked
        }
    }
}

pub(crate) fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run the error path: `on_error`, then unconfigured or finalized.
pub(crate) fn error_path(record: &ControllerRecord) {
    match call_hook(record, "on_error", |c| c.on_error()) {
        HookOutcome::Returned(CallbackResult::Success) => {
            record.set_state(LifecycleState::Unconfigured);
            alog!(
                warn,
                "Controller '{}' recovered through error handling, now unconfigured",
                record.name()
            );
        }
        _ => {
            record.set_state(LifecycleState::Finalized);
            alog!(
                error,
                "Controller '{}' failed error handling, finalized",
                record.name()
            );
        }
    }
}

fn run_transition<F>(
    record: &ControllerRecord,
    hook_name: &str,
    hook: F,
    success_state: LifecycleState,
) -> ArmatureResult<()>
where
    F: FnOnce(&mut Box<dyn Controller>) -> CallbackResult,
{
    match call_hook(record, hook_name, hook) {
        HookOutcome::Returned(CallbackResult::Success) => {
            record.set_state(success_state);
            Ok(())
        }
        HookOutcome::Returned(CallbackResult::Failure) => Err(ArmatureError::controller(
            record.name(),
            format!("{} refused", hook_name),
        )),
        HookOutcome::Returned(CallbackResult::Error) | HookOutcome::Panicked => {
            error_path(record);
            Err(ArmatureError::controller(
                record.name(),
                format!("{} failed", hook_name),
            ))
        }
    }
}

/// Configure a controller. The caller is responsible for cleaning up an
/// inactive controller first, so `on_configure` always starts from
/// unconfigured.
pub(crate) fn configure(record: &ControllerRecord) -> ArmatureResult<()> {
    let state = record.state();
    if state != LifecycleState::Unconfigured {
        return Err(ArmatureError::invalid_state(format!(
            "controller '{}' can not be configured from '{}' state",
            record.name(),
            state
        )));
    }
    run_transition(
        record,
        "on_configure",
        |c| c.on_configure(),
        LifecycleState::Inactive,
    )
}

/// Cleanup an inactive controller back to unconfigured.
pub(crate) fn cleanup(record: &ControllerRecord) -> ArmatureResult<()> {
    let state = record.state();
    if state != LifecycleState::Inactive {
        return Err(ArmatureError::invalid_state(format!(
            "controller '{}' can not be cleaned up from '{}' state",
            record.name(),
            state
        )));
    }
    run_transition(
        record,
        "on_cleanup",
        |c| c.on_cleanup(),
        LifecycleState::Unconfigured,
    )
}

/// Activate an inactive controller. Interfaces must already be assigned.
pub(crate) fn activate(record: &ControllerRecord) -> ArmatureResult<()> {
    let state = record.state();
    if state != LifecycleState::Inactive {
        return Err(ArmatureError::invalid_state(format!(
            "controller '{}' can not be activated from '{}' state",
            record.name(),
            state
        )));
    }
    run_transition(
        record,
        "on_activate",
        |c| c.on_activate(),
        LifecycleState::Active,
    )
}

/// Deactivate an active controller. The caller releases the interfaces
/// afterwards.
pub(crate) fn deactivate(record: &ControllerRecord) -> ArmatureResult<()> {
    let state = record.state();
    if state != LifecycleState::Active {
        return Err(ArmatureError::invalid_state(format!(
            "controller '{}' can not be deactivated from '{}' state",
            record.name(),
            state
        )));
    }
    run_transition(
        record,
        "on_deactivate",
        |c| c.on_deactivate(),
        LifecycleState::Inactive,
    )
}

/// Finalize a controller on unload.
pub(crate) fn shutdown(record: &ControllerRecord) -> ArmatureResult<()> {
    if record.state() == LifecycleState::Finalized {
        return Ok(());
    }
    run_transition(
        record,
        "on_shutdown",
        |c| c.on_shutdown(),
        LifecycleState::Finalized,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::controller::{InterfaceConfig, TriggerResult};
    use crate::hardware::{CommandLoan, StateLoan};
    use std::time::{Duration, Instant};

    /// Controller whose hooks can be told to refuse, error or panic.
    struct MoodyController {
        configure_result: CallbackResult,
        error_result: CallbackResult,
        panic_in_configure: bool,
    }

    impl MoodyController {
        fn well_behaved() -> Self {
            Self {
                configure_result: CallbackResult::Success,
                error_result: CallbackResult::Success,
                panic_in_configure: false,
            }
        }
    }

    impl Controller for MoodyController {
        fn command_interface_configuration(&self) -> InterfaceConfig {
            InterfaceConfig::None
        }

        fn state_interface_configuration(&self) -> InterfaceConfig {
            InterfaceConfig::None
        }

        fn on_configure(&mut self) -> CallbackResult {
            if self.panic_in_configure {
                panic!("intentional configure panic");
            }
            self.configure_result
        }

        fn on_activate(&mut self) -> CallbackResult {
            CallbackResult::Success
        }

        fn on_deactivate(&mut self) -> CallbackResult {
            CallbackResult::Success
        }

        fn on_error(&mut self) -> CallbackResult {
            self.error_result
        }

        fn assign_interfaces(&mut self, _command: Vec<CommandLoan>, _state: Vec<StateLoan>) {}

        fn release_interfaces(&mut self) -> (Vec<CommandLoan>, Vec<StateLoan>) {
            (Vec::new(), Vec::new())
        }

        fn trigger_update(&mut self, _time: Instant, period: Duration) -> TriggerResult {
            TriggerResult::ok(Duration::from_micros(10), period)
        }
    }

    fn record_with(controller: MoodyController) -> ControllerRecord {
        ControllerRecord::new("moody", "test/Moody", Box::new(controller))
    }

    #[test]
    fn test_full_lifecycle_round_trip() {
        let record = record_with(MoodyController::well_behaved());
        assert_eq!(record.state(), LifecycleState::Unconfigured);

        configure(&record).unwrap();
        assert_eq!(record.state(), LifecycleState::Inactive);

        activate(&record).unwrap();
        assert_eq!(record.state(), LifecycleState::Active);

        deactivate(&record).unwrap();
        assert_eq!(record.state(), LifecycleState::Inactive);

        cleanup(&record).unwrap();
        assert_eq!(record.state(), LifecycleState::Unconfigured);

        shutdown(&record).unwrap();
        assert_eq!(record.state(), LifecycleState::Finalized);
    }

    #[test]
    fn test_configure_rejected_from_active() {
        let record = record_with(MoodyController::well_behaved());
        configure(&record).unwrap();
        activate(&record).unwrap();

        let err = configure(&record).unwrap_err();
        assert!(matches!(err, ArmatureError::InvalidState(_)));
        assert_eq!(record.state(), LifecycleState::Active);
    }

    #[test]
    fn test_activate_rejected_from_unconfigured() {
        let record = record_with(MoodyController::well_behaved());
        let err = activate(&record).unwrap_err();
        assert!(matches!(err, ArmatureError::InvalidState(_)));
    }

    #[test]
    fn test_hook_refusal_keeps_state() {
        let mut controller = MoodyController::well_behaved();
        controller.configure_result = CallbackResult::Failure;
        let record = record_with(controller);

        let err = configure(&record).unwrap_err();
        assert!(matches!(err, ArmatureError::Controller { .. }));
        assert_eq!(record.state(), LifecycleState::Unconfigured);
    }

    #[test]
    fn test_hook_panic_runs_error_path_to_unconfigured() {
        let mut controller = MoodyController::well_behaved();
        controller.panic_in_configure = true;
        let record = record_with(controller);

        configure(&record).unwrap_err();
        // on_error returned Success, so the controller recovered
        assert_eq!(record.state(), LifecycleState::Unconfigured);
    }

    #[test]
    fn test_hook_error_with_failing_error_hook_finalizes() {
        let mut controller = MoodyController::well_behaved();
        controller.configure_result = CallbackResult::Error;
        controller.error_result = CallbackResult::Failure;
        let record = record_with(controller);

        configure(&record).unwrap_err();
        assert_eq!(record.state(), LifecycleState::Finalized);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let record = record_with(MoodyController::well_behaved());
        shutdown(&record).unwrap();
        shutdown(&record).unwrap();
        assert_eq!(record.state(), LifecycleState::Finalized);
    }
}

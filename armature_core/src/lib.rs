//! # ARMATURE Core
//!
//! The controller manager core of the ARMATURE robot-control middleware.
//!
//! This crate owns a set of dynamically loaded *controllers*, binds them to
//! the command and state interfaces exported by the hardware abstraction
//! layer, and drives them deterministically from a periodic real-time loop:
//!
//! - **Lifecycle**: per-controller state machine with guarded transitions
//! - **Switching**: atomic activate/deactivate of controller sets, chained
//!   controllers included, under strict single-writer interface ownership
//! - **Scheduling**: multi-rate triggering from one real-time loop
//! - **Fault handling**: cascaded deactivation and fallback activation when
//!   hardware or controllers fail mid-cycle
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use armature_core::{ControllerManager, ManagerConfig, Strictness};
//! use std::time::Duration;
//!
//! let manager = ControllerManager::new(hardware, ManagerConfig::standard());
//! manager.load_controller("pos", "demo/PositionController", Box::new(pos))?;
//! manager.configure_controller("pos")?;
//! manager.switch_controllers(&["pos"], &[], Strictness::Strict, false, Duration::ZERO)?;
//! manager.run()?;
//! ```
//!
//! The hardware side is injected as a [`ResourceManager`] trait object; the
//! crate performs no hardware I/O of its own.

pub mod core;
pub mod diagnostics;
pub mod error;
pub mod hardware;
pub mod scheduling;

// Re-export commonly used types for easy access
pub use crate::core::{
    CallbackResult, Controller, ControllerInfo, ControllerRecord, InterfaceConfig, LifecycleState,
    Statistics, StatisticsSnapshot, TriggerResult, UpdateResult,
};
pub use diagnostics::{ActivitySink, ControllerActivity, FileActivitySink, NullActivitySink};
pub use error::{ArmatureError, ArmatureResult};
pub use hardware::{
    CommandLoan, CycleOutcome, CycleStatus, InterfaceDescription, ResourceManager, StateLoan,
};
pub use scheduling::{
    ControllerManager, DegradationSeverity, ManagerConfig, RealTimeConfig, RtDegradation,
    RtFeature, Strictness,
};

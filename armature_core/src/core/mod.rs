//! # Core types and traits of the controller manager
//!
//! This module contains the fundamental building blocks:
//!
//! - **Controller**: the capability contract every controller satisfies
//! - **ControllerRecord**: per-controller bookkeeping shared with the RT loop
//! - **Lifecycle**: the guarded state machine driving controller hooks
//! - **alog**: thread-local, controller-attributed logging
//!
//! ## Controller lifecycle
//!
//! Every controller follows the same lifecycle:
//! 1. **Load**: the manager takes ownership, `on_init` runs
//! 2. **Configure**: `on_configure`, chained interfaces are exported
//! 3. **Activate / Deactivate**: driven by the switch engine
//! 4. **Cleanup / Shutdown**: back to unconfigured, or finalized on unload

pub mod alog;
pub mod controller;
pub mod lifecycle;
pub mod record;

pub use controller::{
    CallbackResult, Controller, InterfaceConfig, TriggerResult, UpdateResult,
};
pub use lifecycle::LifecycleState;
pub use record::{ControllerInfo, ControllerRecord, Statistics, StatisticsSnapshot};

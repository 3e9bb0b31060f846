//! Hardware-facing contracts.
//!
//! The core never owns hardware; it consumes the interface registry of the
//! hardware abstraction layer through [`ResourceManager`] and moves claimed
//! interfaces around as [`CommandLoan`]/[`StateLoan`] values.

pub mod interfaces;
pub mod resource_manager;

pub use interfaces::{
    interface_prefix, split_interface, CommandLoan, InterfaceDescription, StateLoan,
};
pub use resource_manager::{CycleOutcome, CycleStatus, ResourceManager};

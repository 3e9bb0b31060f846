//! Scheduling and reconfiguration.
//!
//! Everything that decides *when* controller code runs: the chain graph and
//! its update order, the double-buffered roster shared with the RT loop,
//! the switch engine, the fault buffers, RT thread setup, and the manager
//! itself.

pub mod chain;
pub mod config;
pub(crate) mod fault;
pub mod manager;
pub mod roster;
pub mod rt;
pub mod switch;

pub use chain::ChainGraph;
pub use config::{ManagerConfig, RealTimeConfig};
pub use manager::ControllerManager;
pub use roster::{DoubleBufferedRoster, RosterGuard, RtListGuard};
pub use rt::{DegradationSeverity, RtDegradation, RtFeature};
pub use switch::Strictness;

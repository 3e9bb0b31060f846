//! Per-controller bookkeeping.
//!
//! A [`ControllerRecord`] is the manager's cell for one loaded controller:
//! identity, lifecycle state, claimed interfaces, chained-mode flag, timing
//! statistics and the controller instance itself. Records are shared between
//! the two roster slots by `Arc`, so both slots always observe the same
//! state.
//!
//! Write discipline: lifecycle state, claims and the chained-mode flag are
//! mutated by the lifecycle engine and the switch apply step only. The
//! real-time scheduler writes `last_update` and the statistics, nothing
//! else. Non-real-time readers of the statistics accept stale values.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;

use crate::core::controller::Controller;
use crate::core::lifecycle::LifecycleState;

/// Immutable identity and capabilities of a loaded controller, captured once
/// at load time.
#[derive(Debug, Clone)]
pub struct ControllerInfo {
    pub name: String,
    pub type_name: String,
    /// Unique id of this load; a reloaded controller gets a fresh one
    pub instance_id: String,
    pub is_chainable: bool,
    pub is_async: bool,
    /// Own update rate in Hz; `None` means the manager rate
    pub update_rate: Option<f64>,
    /// Fallbacks in activation order
    pub fallback_controllers: Vec<String>,
}

/// Rolling statistics accumulator (count, mean, variance, min, max).
///
/// Reset on every activation so the numbers describe the current activation
/// span only.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

/// Snapshot of a [`Statistics`] accumulator for diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatisticsSnapshot {
    pub count: u64,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl Statistics {
    pub fn add(&mut self, sample: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = sample;
            self.max = sample;
        } else {
            self.min = self.min.min(sample);
            self.max = self.max.max(sample);
        }
        // Welford update
        let delta = sample - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (sample - self.mean);
    }

    pub fn reset(&mut self) {
        *self = Statistics::default();
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn std_dev(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).sqrt()
        }
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            count: self.count,
            mean: self.mean,
            std_dev: self.std_dev(),
            min: self.min,
            max: self.max,
        }
    }
}

/// Bookkeeping cell for one loaded controller.
pub struct ControllerRecord {
    info: ControllerInfo,
    controller: Mutex<Box<dyn Controller>>,
    state: Mutex<LifecycleState>,
    chained_mode: AtomicBool,
    claimed_interfaces: Mutex<Vec<String>>,
    /// Time of the last update trigger; `None` right after activation
    last_update: Mutex<Option<Instant>>,
    /// Achieved trigger rate in Hz
    periodicity: Mutex<Statistics>,
    /// Reported execution time per cycle in microseconds
    execution_time: Mutex<Statistics>,
    /// Names exported on configure, cached for chain checks
    exported_reference_names: Mutex<Vec<String>>,
    exported_state_names: Mutex<Vec<String>>,
}

impl ControllerRecord {
    /// Build a record around a freshly loaded controller, capturing its
    /// capabilities.
    pub fn new(name: &str, type_name: &str, controller: Box<dyn Controller>) -> Self {
        let info = ControllerInfo {
            name: name.to_string(),
            type_name: type_name.to_string(),
            instance_id: uuid::Uuid::new_v4().to_string(),
            is_chainable: controller.is_chainable(),
            is_async: controller.is_async(),
            // Nonsense rates fall back to the manager rate
            update_rate: controller.update_rate().filter(|rate| *rate > 0.0),
            fallback_controllers: controller.fallback_controllers(),
        };
        Self {
            info,
            controller: Mutex::new(controller),
            state: Mutex::new(LifecycleState::Unconfigured),
            chained_mode: AtomicBool::new(false),
            claimed_interfaces: Mutex::new(Vec::new()),
            last_update: Mutex::new(None),
            periodicity: Mutex::new(Statistics::default()),
            execution_time: Mutex::new(Statistics::default()),
            exported_reference_names: Mutex::new(Vec::new()),
            exported_state_names: Mutex::new(Vec::new()),
        }
    }

    pub fn info(&self) -> &ControllerInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Lock the controller instance for a hook or update call.
    pub fn controller(&self) -> MutexGuard<'_, Box<dyn Controller>> {
        self.controller.lock()
    }

    // ==================== Lifecycle state ====================

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: LifecycleState) {
        *self.state.lock() = state;
    }

    pub fn is_active(&self) -> bool {
        self.state() == LifecycleState::Active
    }

    pub fn is_inactive(&self) -> bool {
        self.state() == LifecycleState::Inactive
    }

    pub fn is_unconfigured(&self) -> bool {
        self.state() == LifecycleState::Unconfigured
    }

    // ==================== Chained mode ====================

    pub fn in_chained_mode(&self) -> bool {
        self.chained_mode.load(Ordering::Acquire)
    }

    pub(crate) fn set_chained_flag(&self, chained: bool) {
        self.chained_mode.store(chained, Ordering::Release);
    }

    // ==================== Claims ====================

    pub fn claimed_interfaces(&self) -> Vec<String> {
        self.claimed_interfaces.lock().clone()
    }

    pub(crate) fn set_claimed_interfaces(&self, interfaces: Vec<String>) {
        *self.claimed_interfaces.lock() = interfaces;
    }

    pub(crate) fn clear_claimed_interfaces(&self) {
        self.claimed_interfaces.lock().clear();
    }

    // ==================== Update timing ====================

    pub fn last_update(&self) -> Option<Instant> {
        *self.last_update.lock()
    }

    pub(crate) fn set_last_update(&self, time: Option<Instant>) {
        *self.last_update.lock() = time;
    }

    pub(crate) fn record_periodicity(&self, hz: f64) {
        self.periodicity.lock().add(hz);
    }

    pub(crate) fn record_execution_time_us(&self, us: f64) {
        self.execution_time.lock().add(us);
    }

    pub(crate) fn reset_statistics(&self) {
        self.periodicity.lock().reset();
        self.execution_time.lock().reset();
    }

    pub fn periodicity_snapshot(&self) -> StatisticsSnapshot {
        self.periodicity.lock().snapshot()
    }

    pub fn execution_time_snapshot(&self) -> StatisticsSnapshot {
        self.execution_time.lock().snapshot()
    }

    // ==================== Exported interface cache ====================

    pub(crate) fn set_exported_names(&self, reference: Vec<String>, state: Vec<String>) {
        *self.exported_reference_names.lock() = reference;
        *self.exported_state_names.lock() = state;
    }

    pub(crate) fn clear_exported_names(&self) {
        self.exported_reference_names.lock().clear();
        self.exported_state_names.lock().clear();
    }

    pub fn exported_reference_names(&self) -> Vec<String> {
        self.exported_reference_names.lock().clone()
    }

    pub fn exported_state_names(&self) -> Vec<String> {
        self.exported_state_names.lock().clone()
    }

    /// Whether `interface` is one of this controller's exported reference or
    /// state interfaces.
    pub fn exports_interface(&self, interface: &str) -> bool {
        self.exported_reference_names
            .lock()
            .iter()
            .any(|n| n == interface)
            || self
                .exported_state_names
                .lock()
                .iter()
                .any(|n| n == interface)
    }
}

impl std::fmt::Debug for ControllerRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerRecord")
            .field("name", &self.info.name)
            .field("type", &self.info.type_name)
            .field("state", &self.state())
            .field("chained", &self.in_chained_mode())
            .finish()
    }
}

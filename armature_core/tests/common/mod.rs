//! Shared fixtures for the acceptance tests: a scriptable in-memory
//! interface registry and configurable test controllers.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use armature_core::{
    ActivitySink, ArmatureError, ArmatureResult, CallbackResult, CommandLoan, Controller,
    ControllerActivity, ControllerManager, CycleOutcome, CycleStatus, InterfaceConfig,
    InterfaceDescription, ResourceManager, StateLoan, TriggerResult, UpdateResult,
};

// ========================================================================
// Fake interface registry
// ========================================================================

#[derive(Debug, Default, Clone)]
struct InterfaceEntry {
    available: bool,
    claimed: bool,
}

#[derive(Default)]
struct Registry {
    command: HashMap<String, InterfaceEntry>,
    state: HashMap<String, InterfaceEntry>,
    /// Exported interface names per chainable controller
    reference_exports: HashMap<String, Vec<String>>,
    state_exports: HashMap<String, Vec<String>>,
    /// Which hardware component an interface belongs to
    component_of: HashMap<String, String>,
    /// Cached controller → interface association
    hardware_cache: HashMap<String, Vec<String>>,
    prepare_calls: Vec<(Vec<String>, Vec<String>)>,
    perform_calls: Vec<(Vec<String>, Vec<String>)>,
}

/// In-memory stand-in for the hardware abstraction layer. Everything is
/// scriptable: interface sets, read/write outcomes, prepare acceptance.
pub struct FakeResourceManager {
    registry: Mutex<Registry>,
    accept_prepare: AtomicBool,
    read_outcome: Mutex<CycleOutcome>,
    write_outcome: Mutex<CycleOutcome>,
    read_calls: AtomicUsize,
    write_calls: AtomicUsize,
    limit_calls: AtomicUsize,
}

impl FakeResourceManager {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            accept_prepare: AtomicBool::new(true),
            read_outcome: Mutex::new(CycleOutcome::ok()),
            write_outcome: Mutex::new(CycleOutcome::ok()),
            read_calls: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
            limit_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_command_interfaces(self, names: &[&str]) -> Self {
        {
            let mut registry = self.registry.lock();
            for name in names {
                registry.command.insert(
                    name.to_string(),
                    InterfaceEntry {
                        available: true,
                        claimed: false,
                    },
                );
            }
        }
        self
    }

    pub fn with_state_interfaces(self, names: &[&str]) -> Self {
        {
            let mut registry = self.registry.lock();
            for name in names {
                registry.state.insert(
                    name.to_string(),
                    InterfaceEntry {
                        available: true,
                        claimed: false,
                    },
                );
            }
        }
        self
    }

    /// Map interfaces onto a hardware component for fault attribution.
    pub fn assign_component(&self, component: &str, interfaces: &[&str]) {
        let mut registry = self.registry.lock();
        for interface in interfaces {
            registry
                .component_of
                .insert(interface.to_string(), component.to_string());
        }
    }

    pub fn set_accept_prepare(&self, accept: bool) {
        self.accept_prepare.store(accept, Ordering::SeqCst);
    }

    pub fn set_read_outcome(&self, status: CycleStatus, failed: &[&str]) {
        *self.read_outcome.lock() =
            CycleOutcome::failed(status, failed.iter().map(|s| s.to_string()).collect());
    }

    pub fn set_write_outcome(&self, status: CycleStatus, failed: &[&str]) {
        *self.write_outcome.lock() =
            CycleOutcome::failed(status, failed.iter().map(|s| s.to_string()).collect());
    }

    pub fn clear_read_outcome(&self) {
        *self.read_outcome.lock() = CycleOutcome::ok();
    }

    pub fn clear_write_outcome(&self) {
        *self.write_outcome.lock() = CycleOutcome::ok();
    }

    pub fn is_claimed(&self, name: &str) -> bool {
        self.registry
            .lock()
            .command
            .get(name)
            .map(|entry| entry.claimed)
            .unwrap_or(false)
    }

    pub fn prepare_call_count(&self) -> usize {
        self.registry.lock().prepare_calls.len()
    }

    pub fn perform_call_count(&self) -> usize {
        self.registry.lock().perform_calls.len()
    }

    pub fn last_perform_call(&self) -> Option<(Vec<String>, Vec<String>)> {
        self.registry.lock().perform_calls.last().cloned()
    }

    pub fn read_call_count(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn write_call_count(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }
}

impl ResourceManager for FakeResourceManager {
    fn available_command_interfaces(&self) -> Vec<String> {
        self.registry
            .lock()
            .command
            .iter()
            .filter(|(_, entry)| entry.available)
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn available_state_interfaces(&self) -> Vec<String> {
        self.registry
            .lock()
            .state
            .iter()
            .filter(|(_, entry)| entry.available)
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn command_interface_is_available(&self, name: &str) -> bool {
        self.registry
            .lock()
            .command
            .get(name)
            .map(|entry| entry.available)
            .unwrap_or(false)
    }

    fn state_interface_is_available(&self, name: &str) -> bool {
        self.registry
            .lock()
            .state
            .get(name)
            .map(|entry| entry.available)
            .unwrap_or(false)
    }

    fn command_interface_is_claimed(&self, name: &str) -> bool {
        self.is_claimed(name)
    }

    fn claim_command_interface(&self, name: &str) -> ArmatureResult<CommandLoan> {
        let mut registry = self.registry.lock();
        let entry = registry
            .command
            .get_mut(name)
            .ok_or_else(|| ArmatureError::interface_unavailable(name))?;
        if !entry.available {
            return Err(ArmatureError::interface_unavailable(name));
        }
        if entry.claimed {
            return Err(ArmatureError::conflict(format!(
                "command interface '{}' is already claimed",
                name
            )));
        }
        entry.claimed = true;
        Ok(CommandLoan::new(name))
    }

    fn claim_state_interface(&self, name: &str) -> ArmatureResult<StateLoan> {
        let registry = self.registry.lock();
        let entry = registry
            .state
            .get(name)
            .ok_or_else(|| ArmatureError::interface_unavailable(name))?;
        if !entry.available {
            return Err(ArmatureError::interface_unavailable(name));
        }
        Ok(StateLoan::new(name))
    }

    fn release_command_interface(&self, loan: CommandLoan) {
        let mut registry = self.registry.lock();
        if let Some(entry) = registry.command.get_mut(loan.name()) {
            entry.claimed = false;
        }
    }

    fn release_state_interface(&self, _loan: StateLoan) {}

    fn prepare_command_mode_switch(&self, activate: &[String], deactivate: &[String]) -> bool {
        self.registry
            .lock()
            .prepare_calls
            .push((activate.to_vec(), deactivate.to_vec()));
        self.accept_prepare.load(Ordering::SeqCst)
    }

    fn perform_command_mode_switch(&self, activate: &[String], deactivate: &[String]) -> bool {
        self.registry
            .lock()
            .perform_calls
            .push((activate.to_vec(), deactivate.to_vec()));
        true
    }

    fn read(&self, _time: Instant, _period: Duration) -> CycleOutcome {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.read_outcome.lock().clone()
    }

    fn write(&self, _time: Instant, _period: Duration) -> CycleOutcome {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.write_outcome.lock().clone()
    }

    fn enforce_command_limits(&self, _period: Duration) {
        self.limit_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn import_reference_interfaces(&self, controller: &str, interfaces: Vec<InterfaceDescription>) {
        let mut registry = self.registry.lock();
        let names: Vec<String> = interfaces.iter().map(|i| i.name.clone()).collect();
        for name in &names {
            registry.command.insert(
                name.clone(),
                InterfaceEntry {
                    available: false,
                    claimed: false,
                },
            );
        }
        registry
            .reference_exports
            .insert(controller.to_string(), names);
    }

    fn import_exported_state_interfaces(
        &self,
        controller: &str,
        interfaces: Vec<InterfaceDescription>,
    ) {
        let mut registry = self.registry.lock();
        let names: Vec<String> = interfaces.iter().map(|i| i.name.clone()).collect();
        for name in &names {
            registry.state.insert(
                name.clone(),
                InterfaceEntry {
                    available: false,
                    claimed: false,
                },
            );
        }
        registry.state_exports.insert(controller.to_string(), names);
    }

    fn remove_controller_interfaces(&self, controller: &str) {
        let mut registry = self.registry.lock();
        let reference = registry
            .reference_exports
            .remove(controller)
            .unwrap_or_default();
        for name in reference {
            registry.command.remove(&name);
        }
        let state = registry.state_exports.remove(controller).unwrap_or_default();
        for name in state {
            registry.state.remove(&name);
        }
    }

    fn make_reference_interfaces_available(&self, controller: &str) {
        let mut registry = self.registry.lock();
        let names = registry
            .reference_exports
            .get(controller)
            .cloned()
            .unwrap_or_default();
        for name in names {
            if let Some(entry) = registry.command.get_mut(&name) {
                entry.available = true;
            }
        }
    }

    fn make_reference_interfaces_unavailable(&self, controller: &str) {
        let mut registry = self.registry.lock();
        let names = registry
            .reference_exports
            .get(controller)
            .cloned()
            .unwrap_or_default();
        for name in names {
            if let Some(entry) = registry.command.get_mut(&name) {
                entry.available = false;
            }
        }
    }

    fn make_exported_state_interfaces_available(&self, controller: &str) {
        let mut registry = self.registry.lock();
        let names = registry
            .state_exports
            .get(controller)
            .cloned()
            .unwrap_or_default();
        for name in names {
            if let Some(entry) = registry.state.get_mut(&name) {
                entry.available = true;
            }
        }
    }

    fn make_exported_state_interfaces_unavailable(&self, controller: &str) {
        let mut registry = self.registry.lock();
        let names = registry
            .state_exports
            .get(controller)
            .cloned()
            .unwrap_or_default();
        for name in names {
            if let Some(entry) = registry.state.get_mut(&name) {
                entry.available = false;
            }
        }
    }

    fn cache_controller_to_hardware(&self, controller: &str, interfaces: &[String]) {
        self.registry
            .lock()
            .hardware_cache
            .insert(controller.to_string(), interfaces.to_vec());
    }

    fn controllers_for_hardware(&self, component: &str) -> Vec<String> {
        let registry = self.registry.lock();
        let mut controllers = Vec::new();
        for (controller, interfaces) in &registry.hardware_cache {
            let touches = interfaces.iter().any(|interface| {
                registry
                    .component_of
                    .get(interface)
                    .map(|c| c == component)
                    .unwrap_or(false)
            });
            if touches && !controllers.contains(controller) {
                controllers.push(controller.clone());
            }
        }
        controllers
    }
}

// ========================================================================
// Scriptable test controller
// ========================================================================

/// Shared observation point for a [`TestController`].
#[derive(Default)]
pub struct ControllerProbe {
    pub update_calls: AtomicUsize,
    pub update_periods: Mutex<Vec<Duration>>,
    pub chained: AtomicBool,
}

impl ControllerProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn updates(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }
}

/// A controller whose capabilities and misbehavior are set per test.
pub struct TestController {
    command_config: InterfaceConfig,
    state_config: InterfaceConfig,
    chainable: bool,
    reference_exports: Vec<InterfaceDescription>,
    state_exports: Vec<InterfaceDescription>,
    rate: Option<f64>,
    fallbacks: Vec<String>,
    /// Return an error from update at this call number (1-based)
    fail_update_at: Option<usize>,
    /// Panic in update at this call number (1-based)
    panic_update_at: Option<usize>,
    probe: Arc<ControllerProbe>,
    /// Shared log of update invocations, for ordering assertions
    order_log: Option<(Arc<Mutex<Vec<String>>>, String)>,
    held_command: Vec<CommandLoan>,
    held_state: Vec<StateLoan>,
    in_chained_mode: bool,
}

impl TestController {
    pub fn new() -> Self {
        Self {
            command_config: InterfaceConfig::None,
            state_config: InterfaceConfig::None,
            chainable: false,
            reference_exports: Vec::new(),
            state_exports: Vec::new(),
            rate: None,
            fallbacks: Vec::new(),
            fail_update_at: None,
            panic_update_at: None,
            probe: ControllerProbe::new(),
            order_log: None,
            held_command: Vec::new(),
            held_state: Vec::new(),
            in_chained_mode: false,
        }
    }

    pub fn claims(mut self, interfaces: &[&str]) -> Self {
        self.command_config =
            InterfaceConfig::Individual(interfaces.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn reads(mut self, interfaces: &[&str]) -> Self {
        self.state_config =
            InterfaceConfig::Individual(interfaces.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn chainable_with_state_exports(mut self, interfaces: &[&str]) -> Self {
        self.chainable = true;
        self.state_exports = interfaces
            .iter()
            .map(|name| InterfaceDescription::new(*name, 0.0))
            .collect();
        self
    }

    pub fn chainable_with_reference_exports(mut self, interfaces: &[&str]) -> Self {
        self.chainable = true;
        self.reference_exports = interfaces
            .iter()
            .map(|name| InterfaceDescription::new(*name, 0.0))
            .collect();
        self
    }

    pub fn with_rate(mut self, hz: f64) -> Self {
        self.rate = Some(hz);
        self
    }

    pub fn with_fallbacks(mut self, names: &[&str]) -> Self {
        self.fallbacks = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn fail_update_at(mut self, call: usize) -> Self {
        self.fail_update_at = Some(call);
        self
    }

    pub fn panic_update_at(mut self, call: usize) -> Self {
        self.panic_update_at = Some(call);
        self
    }

    pub fn with_probe(mut self, probe: Arc<ControllerProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_order_log(mut self, log: Arc<Mutex<Vec<String>>>, name: &str) -> Self {
        self.order_log = Some((log, name.to_string()));
        self
    }
}

impl Controller for TestController {
    fn command_interface_configuration(&self) -> InterfaceConfig {
        self.command_config.clone()
    }

    fn state_interface_configuration(&self) -> InterfaceConfig {
        self.state_config.clone()
    }

    fn is_chainable(&self) -> bool {
        self.chainable
    }

    fn update_rate(&self) -> Option<f64> {
        self.rate
    }

    fn fallback_controllers(&self) -> Vec<String> {
        self.fallbacks.clone()
    }

    fn on_activate(&mut self) -> CallbackResult {
        CallbackResult::Success
    }

    fn on_deactivate(&mut self) -> CallbackResult {
        CallbackResult::Success
    }

    fn assign_interfaces(&mut self, command: Vec<CommandLoan>, state: Vec<StateLoan>) {
        self.held_command = command;
        self.held_state = state;
    }

    fn release_interfaces(&mut self) -> (Vec<CommandLoan>, Vec<StateLoan>) {
        (
            std::mem::take(&mut self.held_command),
            std::mem::take(&mut self.held_state),
        )
    }

    fn trigger_update(&mut self, _time: Instant, period: Duration) -> TriggerResult {
        let call = self.probe.update_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.update_periods.lock().push(period);
        if let Some((log, name)) = &self.order_log {
            log.lock().push(name.clone());
        }
        if self.panic_update_at == Some(call) {
            panic!("intentional update panic at call {}", call);
        }
        if self.fail_update_at == Some(call) {
            return TriggerResult {
                successful: true,
                result: UpdateResult::Error,
                execution_time: None,
                period: None,
            };
        }
        TriggerResult::ok(Duration::from_micros(20), period)
    }

    fn export_reference_interfaces(&self) -> Vec<InterfaceDescription> {
        self.reference_exports.clone()
    }

    fn export_state_interfaces(&self) -> Vec<InterfaceDescription> {
        self.state_exports.clone()
    }

    fn set_chained_mode(&mut self, chained: bool) -> bool {
        self.in_chained_mode = chained;
        self.probe.chained.store(chained, Ordering::SeqCst);
        true
    }

    fn is_in_chained_mode(&self) -> bool {
        self.in_chained_mode
    }
}

// ========================================================================
// Cycle driver and helpers
// ========================================================================

/// Background thread driving `read → update → write` like the manager's own
/// loop, so control-thread tests have a live RT side to handshake with.
pub struct CycleDriver {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CycleDriver {
    pub fn spawn(manager: Arc<ControllerManager>, period: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let handle = std::thread::spawn(move || {
            let mut last = Instant::now();
            while !stop_flag.load(Ordering::SeqCst) {
                let now = Instant::now();
                let mut elapsed = now.saturating_duration_since(last);
                if elapsed.is_zero() {
                    elapsed = period;
                }
                last = now;
                manager.read(now, elapsed);
                let _ = manager.update(now, elapsed);
                manager.write(now, elapsed);
                std::thread::sleep(period);
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }

    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CycleDriver {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Poll `condition` until it holds or `timeout` expires.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// Activity sink that records every snapshot it receives.
#[derive(Default)]
pub struct RecordingSink {
    pub snapshots: Mutex<Vec<Vec<ControllerActivity>>>,
}

impl ActivitySink for RecordingSink {
    fn publish_activity(&self, activity: &[ControllerActivity]) {
        self.snapshots.lock().push(activity.to_vec());
    }
}

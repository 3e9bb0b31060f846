//! The controller manager: ownership of loaded controllers, the switch
//! engine, and the real-time update scheduler.
//!
//! Two thread classes share a manager. Control threads call the non-RT API
//! (`load_controller`, `configure_controller`, `switch_controllers`, ...)
//! and serialize on the roster's reentrant lock. The real-time loop calls
//! `read` / `update` / `write` once per cycle, either directly or through
//! `run()` / `run_for()` which drive the loop at the configured rate. The
//! RT side never takes a control lock; the one shared point is the switch
//! request, which the RT loop only ever try-locks.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::alog;
use crate::core::alog::{clear_controller_context, set_controller_context};
use crate::core::controller::{Controller, UpdateResult};
use crate::core::lifecycle::{self, LifecycleState};
use crate::core::record::{ControllerRecord, Statistics, StatisticsSnapshot};
use crate::diagnostics::{self, ActivitySink, ControllerActivity, NullActivitySink};
use crate::error::{ArmatureError, ArmatureResult};
use crate::hardware::{interface_prefix, CycleStatus, ResourceManager};
use crate::scheduling::chain::{add_item, remove_item, ChainGraph};
use crate::scheduling::config::ManagerConfig;
use crate::scheduling::fault::{collect_controllers_for_failed_hardware, RtBuffers};
use crate::scheduling::roster::{DoubleBufferedRoster, RosterGuard};
use crate::scheduling::rt::{self, RtDegradation};
use crate::scheduling::switch::{
    active_peers_using_command_interfaces, all_required_interfaces, concat_names,
    evaluate_switch_result, extract_command_interfaces, find_record, Strictness, SwitchParams,
    SwitchState,
};

/// Central orchestrator: owns the controller roster and drives the
/// activate/deactivate machinery.
pub struct ControllerManager {
    resource_manager: Arc<dyn ResourceManager>,
    config: ManagerConfig,
    roster: DoubleBufferedRoster,
    chain: Mutex<ChainGraph>,
    switch_params: SwitchParams,
    rt_buffers: Mutex<RtBuffers>,
    activity_sink: Box<dyn ActivitySink>,
    running: Arc<AtomicBool>,
    cycle_count: AtomicU64,
    /// Achieved manager read-cycle rate in Hz
    read_periodicity: Mutex<Statistics>,
    degradations: Mutex<Vec<RtDegradation>>,
}

impl ControllerManager {
    pub fn new(resource_manager: Arc<dyn ResourceManager>, config: ManagerConfig) -> Self {
        Self {
            resource_manager,
            config,
            roster: DoubleBufferedRoster::new(),
            chain: Mutex::new(ChainGraph::new()),
            switch_params: SwitchParams::new(),
            rt_buffers: Mutex::new(RtBuffers::new()),
            activity_sink: Box::new(NullActivitySink),
            running: Arc::new(AtomicBool::new(false)),
            cycle_count: AtomicU64::new(0),
            read_periodicity: Mutex::new(Statistics::default()),
            degradations: Mutex::new(Vec::new()),
        }
    }

    /// Inject the diagnostics sink activity snapshots go to.
    pub fn with_activity_sink(mut self, sink: Box<dyn ActivitySink>) -> Self {
        self.activity_sink = sink;
        self
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    // ====================================================================
    // Loading and lifecycle (control threads)
    // ====================================================================

    /// Take ownership of a constructed controller under `name`.
    ///
    /// The plugin/discovery layer is outside the core; whoever resolves
    /// `type_name` to an instance hands the box over here.
    pub fn load_controller(
        &self,
        name: &str,
        type_name: &str,
        controller: Box<dyn Controller>,
    ) -> ArmatureResult<()> {
        let guard = self.roster.lock();
        {
            let updated = self.roster.updated_list(&guard);
            if find_record(&updated, name).is_some() {
                return Err(ArmatureError::conflict(format!(
                    "a controller named '{}' is already loaded",
                    name
                )));
            }
        }

        let record = Arc::new(ControllerRecord::new(name, type_name, controller));

        set_controller_context(name, 0);
        let init_outcome = catch_unwind(AssertUnwindSafe(|| record.controller().on_init()));
        clear_controller_context();
        match init_outcome {
            Ok(crate::core::controller::CallbackResult::Success) => {}
            Ok(_) => {
                return Err(ArmatureError::controller(name, "on_init failed"));
            }
            Err(payload) => {
                let message = lifecycle::panic_message(&payload);
                return Err(ArmatureError::controller(
                    name,
                    format!("on_init panicked: {}", message),
                ));
            }
        }

        self.chain.lock().add_controller(name);

        let snapshot = self.roster.updated_list(&guard).clone();
        {
            let mut unused = self.roster.unused_mut(&guard);
            *unused = snapshot;
            unused.push(record);
        }
        self.roster.switch_updated_list(&guard);
        self.roster.unused_mut(&guard).clear();

        alog!(info, "Loaded controller '{}' ({})", name, type_name);
        Ok(())
    }

    /// Unload a controller. Rejected while active; inactive controllers are
    /// cleaned up first, then finalized and dropped.
    pub fn unload_controller(&self, name: &str) -> ArmatureResult<()> {
        let guard = self.roster.lock();
        let record = {
            let updated = self.roster.updated_list(&guard);
            find_record(&updated, name)
                .cloned()
                .ok_or_else(|| ArmatureError::not_found(name))?
        };

        if record.is_active() {
            return Err(ArmatureError::invalid_state(format!(
                "controller '{}' can not be unloaded while active",
                name
            )));
        }
        if record.is_inactive() {
            self.cleanup_record(&record)?;
        }
        // Finalize; the error path already logged if the hook failed
        let _ = lifecycle::shutdown(&record);

        self.resource_manager.remove_controller_interfaces(name);
        self.chain.lock().remove_controller(name);

        let snapshot: Vec<Arc<ControllerRecord>> = self
            .roster
            .updated_list(&guard)
            .iter()
            .filter(|r| r.name() != name)
            .cloned()
            .collect();
        {
            let mut unused = self.roster.unused_mut(&guard);
            *unused = snapshot;
        }
        self.roster.switch_updated_list(&guard);
        self.roster.unused_mut(&guard).clear();

        alog!(info, "Unloaded controller '{}'", name);
        Ok(())
    }

    /// Configure a controller: run its configure hook, export chained
    /// interfaces, rebuild the chain graph and reorder the roster.
    pub fn configure_controller(&self, name: &str) -> ArmatureResult<()> {
        let guard = self.roster.lock();
        let record = {
            let updated = self.roster.updated_list(&guard);
            find_record(&updated, name)
                .cloned()
                .ok_or_else(|| ArmatureError::not_found(name))?
        };
        alog!(info, "Configuring controller: '{}'", name);

        match record.state() {
            LifecycleState::Active | LifecycleState::Finalized => {
                return Err(ArmatureError::invalid_state(format!(
                    "controller '{}' can not be configured from '{}' state",
                    name,
                    record.state()
                )));
            }
            LifecycleState::Inactive => {
                // Re-configure starts from scratch
                self.cleanup_record(&record)?;
            }
            LifecycleState::Unconfigured => {}
        }

        lifecycle::configure(&record)?;

        if let Some(rate) = record.info().update_rate {
            let manager_rate = self.config.update_rate_hz;
            if rate > manager_rate {
                alog!(
                    warn,
                    "Controller '{}' update rate {} Hz is above the manager rate {} Hz; it will be updated at the manager rate",
                    name, rate, manager_rate
                );
            } else if (manager_rate / rate).fract().abs() > 1e-9 {
                alog!(
                    warn,
                    "Controller '{}' rate {} Hz is not a divisor of the manager rate {} Hz; its update period will not be constant",
                    name, rate, manager_rate
                );
            }
        }

        if record.info().is_chainable {
            self.export_chained_interfaces(&record)?;
        }

        let command_names = record
            .controller()
            .command_interface_configuration()
            .names()
            .to_vec();
        let state_names = record
            .controller()
            .state_interface_configuration()
            .names()
            .to_vec();
        if let Some(duplicate) = first_duplicate(&command_names).or(first_duplicate(&state_names)) {
            self.cleanup_record(&record)?;
            return Err(ArmatureError::invalid_state(format!(
                "interfaces of controller '{}' are not unique: '{}' appears twice",
                name, duplicate
            )));
        }

        {
            let mut chain = self.chain.lock();
            chain.note_dependencies(name, &command_names, &state_names);
            if chain.has_cycles() {
                // Undo this controller's edges and restore everyone else's
                chain.remove_controller(name);
                chain.add_controller(name);
                let updated = self.roster.updated_list(&guard);
                for other in updated.iter() {
                    if other.name() == name || other.is_unconfigured() {
                        continue;
                    }
                    let cmd = other
                        .controller()
                        .command_interface_configuration()
                        .names()
                        .to_vec();
                    let state = other
                        .controller()
                        .state_interface_configuration()
                        .names()
                        .to_vec();
                    chain.note_dependencies(other.name(), &cmd, &state);
                }
                drop(chain);
                drop(updated);
                self.cleanup_record(&record)?;
                return Err(ArmatureError::conflict(format!(
                    "configuring controller '{}' would close a cycle in the controller chain",
                    name
                )));
            }
            chain.rebuild_order();
        }

        self.reorder_roster(&guard);
        Ok(())
    }

    /// Cleanup an inactive controller back to unconfigured, releasing its
    /// exported interfaces.
    pub fn cleanup_controller(&self, name: &str) -> ArmatureResult<()> {
        let guard = self.roster.lock();
        let record = {
            let updated = self.roster.updated_list(&guard);
            find_record(&updated, name)
                .cloned()
                .ok_or_else(|| ArmatureError::not_found(name))?
        };
        if record.is_unconfigured() {
            return Ok(());
        }
        self.cleanup_record(&record)
    }

    fn cleanup_record(&self, record: &Arc<ControllerRecord>) -> ArmatureResult<()> {
        lifecycle::cleanup(record)?;
        if record.info().is_chainable {
            let name = record.name();
            self.resource_manager
                .make_exported_state_interfaces_unavailable(name);
            self.resource_manager
                .make_reference_interfaces_unavailable(name);
            self.resource_manager.remove_controller_interfaces(name);
            record.clear_exported_names();
        }
        Ok(())
    }

    fn export_chained_interfaces(&self, record: &Arc<ControllerRecord>) -> ArmatureResult<()> {
        let name = record.name();
        let exported = catch_unwind(AssertUnwindSafe(|| {
            let controller = record.controller();
            (
                controller.export_reference_interfaces(),
                controller.export_state_interfaces(),
            )
        }));
        let (references, states) = match exported {
            Ok(interfaces) => interfaces,
            Err(payload) => {
                let message = lifecycle::panic_message(&payload);
                alog!(
                    error,
                    "Export of reference or state interfaces of '{}' panicked: {}",
                    name,
                    message
                );
                lifecycle::error_path(record);
                return Err(ArmatureError::controller(name, "interface export failed"));
            }
        };
        if references.is_empty() && states.is_empty() {
            return Err(ArmatureError::invalid_state(format!(
                "controller '{}' is chainable but does not export any reference or state interfaces",
                name
            )));
        }
        record.set_exported_names(
            references.iter().map(|i| i.name.clone()).collect(),
            states.iter().map(|i| i.name.clone()).collect(),
        );
        self.resource_manager
            .import_reference_interfaces(name, references);
        self.resource_manager
            .import_exported_state_interfaces(name, states);
        Ok(())
    }

    /// Rewrite the roster in the chain graph's order.
    fn reorder_roster(&self, guard: &RosterGuard) {
        let snapshot = self.roster.updated_list(guard).clone();
        let chain = self.chain.lock();
        let mut new_list = Vec::with_capacity(snapshot.len());
        for name in chain.ordered_names() {
            if let Some(record) = find_record(&snapshot, name) {
                new_list.push(record.clone());
            }
        }
        // Anything the chain graph does not know keeps its old position
        for record in &snapshot {
            if !new_list.iter().any(|r| r.name() == record.name()) {
                new_list.push(record.clone());
            }
        }
        drop(chain);
        {
            let mut unused = self.roster.unused_mut(guard);
            *unused = new_list;
        }
        self.roster.switch_updated_list(guard);
        self.roster.unused_mut(guard).clear();
    }

    // ====================================================================
    // Introspection (control threads)
    // ====================================================================

    pub fn controller_names(&self) -> Vec<String> {
        let guard = self.roster.lock();
        self.roster
            .updated_list(&guard)
            .iter()
            .map(|record| record.name().to_string())
            .collect()
    }

    pub fn controller_state(&self, name: &str) -> ArmatureResult<LifecycleState> {
        let guard = self.roster.lock();
        let updated = self.roster.updated_list(&guard);
        find_record(&updated, name)
            .map(|record| record.state())
            .ok_or_else(|| ArmatureError::not_found(name))
    }

    /// Chain connections of a controller: `(following, preceding)`.
    pub fn chain_connections(&self, name: &str) -> ArmatureResult<(Vec<String>, Vec<String>)> {
        {
            let guard = self.roster.lock();
            let updated = self.roster.updated_list(&guard);
            if find_record(&updated, name).is_none() {
                return Err(ArmatureError::not_found(name));
            }
        }
        let chain = self.chain.lock();
        Ok((chain.following_of(name), chain.preceding_of(name)))
    }

    pub fn activity_snapshot(&self) -> Vec<ControllerActivity> {
        let guard = self.roster.lock();
        diagnostics::snapshot_of(&self.roster.updated_list(&guard))
    }

    /// RT features that failed to apply at loop start.
    pub fn degradations(&self) -> Vec<RtDegradation> {
        self.degradations.lock().clone()
    }

    /// Achieved read-cycle rate statistics.
    pub fn read_periodicity(&self) -> StatisticsSnapshot {
        self.read_periodicity.lock().snapshot()
    }

    // ====================================================================
    // Switch engine (control threads)
    // ====================================================================

    /// Atomically activate and deactivate controllers.
    ///
    /// Validation and the hardware negotiation run on the calling thread;
    /// the apply step runs on the real-time loop at the next cycle
    /// boundary, and this call blocks until it completed or `timeout`
    /// expired. A `timeout` of zero uses the 1 s default.
    pub fn switch_controllers(
        &self,
        activate: &[&str],
        deactivate: &[&str],
        strictness: Strictness,
        activate_asap: bool,
        timeout: Duration,
    ) -> ArmatureResult<()> {
        let strictness = strictness.resolve(self.config.default_strictness);

        let guard = self.roster.lock();
        let mut st = self.switch_params.state.lock();
        if !st.is_empty() || st.do_switch {
            return Err(crate::armature_internal!(
                "switch request buffers are not empty at the beginning of a switch call"
            ));
        }

        if !activate.is_empty() {
            alog!(info, "Activating controllers: [ {} ]", activate.join(" "));
        }
        if !deactivate.is_empty() {
            alog!(info, "Deactivating controllers: [ {} ]", deactivate.join(" "));
        }

        let records = self.roster.updated_list(&guard).clone();

        // Phase A: resolve names
        if let Err(e) = self.resolve_request(&records, deactivate, strictness, true, &mut st) {
            st.clear();
            return Err(e);
        }
        if let Err(e) = self.resolve_request(&records, activate, strictness, false, &mut st) {
            st.clear();
            return Err(e);
        }

        // Phase A: chained-mode propagation and per-controller checks
        self.propagate_deactivation_of_chained_mode(&records, &mut st);

        let mut index = 0;
        while index < st.activate.len() {
            let name = st.activate[index].clone();
            let status = self.check_activate_candidate(&records, &name, &mut st);
            if let Err(e) = status {
                alog!(
                    warn,
                    "Could not activate controller with name '{}': {}",
                    name,
                    e
                );
                match strictness {
                    Strictness::Strict => {
                        alog!(error, "Aborting, no controller is switched! ('STRICT' switch)");
                        st.clear();
                        return Err(e);
                    }
                    _ => {
                        st.activate.remove(index);
                        continue;
                    }
                }
            }
            index += 1;
        }

        let mut index = 0;
        while index < st.deactivate.len() {
            let name = st.deactivate[index].clone();
            let status = self.check_deactivate_candidate(&records, &name, &st);
            if let Err(e) = status {
                alog!(
                    warn,
                    "Could not deactivate controller with name '{}': {}",
                    name,
                    e
                );
                match strictness {
                    Strictness::Strict => {
                        alog!(error, "Aborting, no controller is switched! ('STRICT' switch)");
                        st.clear();
                        return Err(e);
                    }
                    _ => {
                        st.deactivate.remove(index);
                        continue;
                    }
                }
            }
            index += 1;
        }

        if st.activate.is_empty() && st.deactivate.is_empty() {
            alog!(
                info,
                "After checking the controllers, no controllers need to be activated or deactivated"
            );
            st.clear();
            return Ok(());
        }

        // Phase B: chained restarts, conflicts, interface plan
        self.compile_interface_plan(&records, strictness, &mut st)?;

        if st.activate.is_empty() && st.deactivate.is_empty() {
            alog!(info, "Empty activate and deactivate list, not requesting switch");
            st.clear();
            return Ok(());
        }

        if let Err(e) = self.check_interface_availability(&records, &st) {
            st.clear();
            return Err(e);
        }

        // Cooperative drain for deactivating async controllers
        for name in &st.deactivate {
            if let Some(record) = find_record(&records, name) {
                let _ = catch_unwind(AssertUnwindSafe(|| {
                    record.controller().prepare_for_deactivation()
                }));
            }
        }

        if !st.activate_command_interfaces.is_empty()
            || !st.deactivate_command_interfaces.is_empty()
        {
            if !self.resource_manager.prepare_command_mode_switch(
                &st.activate_command_interfaces,
                &st.deactivate_command_interfaces,
            ) {
                st.clear();
                return Err(ArmatureError::HardwareRejected(
                    "prepare command mode switch was rejected".to_string(),
                ));
            }
        }

        // Phase C: arm the request
        st.activate_asap = activate_asap;
        st.timeout = if timeout.is_zero() {
            alog!(info, "Switch controller timeout is set to 0, using default 1s!");
            Duration::from_secs(1)
        } else {
            timeout
        };
        st.do_switch = true;

        // Wait for the RT loop to run the apply step (Phase D)
        alog!(debug, "Requested atomic controller switch from realtime loop");
        let deadline = Instant::now() + st.timeout;
        while st.do_switch {
            if self.switch_params.cv.wait_until(&mut st, deadline).timed_out() {
                break;
            }
        }
        if st.do_switch {
            let timeout = st.timeout;
            st.clear();
            return Err(ArmatureError::Timeout(format!(
                "switch controller timed out after {:.3} seconds",
                timeout.as_secs_f64()
            )));
        }

        // Phase E: bookkeeping and roster refresh
        let result = evaluate_switch_result(
            &records,
            self.resource_manager.as_ref(),
            &st.activate,
            &st.deactivate,
        );
        st.clear();
        drop(st);

        let snapshot = self.roster.updated_list(&guard).clone();
        {
            let mut unused = self.roster.unused_mut(&guard);
            *unused = snapshot;
        }
        self.roster.switch_updated_list(&guard);
        self.roster.unused_mut(&guard).clear();

        self.publish_activity(&records);
        result
    }

    /// Resolve requested names against the roster, honoring strictness.
    fn resolve_request(
        &self,
        records: &[Arc<ControllerRecord>],
        requested: &[&str],
        strictness: Strictness,
        deactivate: bool,
        st: &mut SwitchState,
    ) -> ArmatureResult<()> {
        let action = if deactivate { "deactivate" } else { "activate" };
        let mut result = Ok(());
        for name in requested {
            let out = if deactivate {
                &mut st.deactivate
            } else {
                &mut st.activate
            };
            if find_record(records, name).is_some() {
                out.push(name.to_string());
                result = Ok(());
            } else {
                alog!(
                    warn,
                    "Could not {} controller with name '{}' because no controller with this name exists",
                    action,
                    name
                );
                if strictness == Strictness::Strict {
                    alog!(error, "Aborting, no controller is switched! ('STRICT' switch)");
                    return Err(ArmatureError::not_found(*name));
                }
                // Best effort: only fatal when nothing resolved at all
                result = if out.is_empty() {
                    Err(ArmatureError::not_found(*name))
                } else {
                    Ok(())
                };
            }
        }
        result
    }

    /// Seed the from-chained-mode list: every exporter consumed by a
    /// deactivating active controller may leave chained mode.
    fn propagate_deactivation_of_chained_mode(
        &self,
        records: &[Arc<ControllerRecord>],
        st: &mut SwitchState,
    ) {
        for record in records {
            if !st.deactivate.iter().any(|n| n == record.name()) {
                continue;
            }
            if !record.is_active() {
                // Will be dropped from the request later
                continue;
            }
            let interfaces = consumed_interface_names(record);
            for interface in &interfaces {
                if let Some(exporter) = chained_exporter(records, record.name(), interface) {
                    add_item(&mut st.from_chained_mode, exporter.name());
                }
            }
        }
    }

    fn check_activate_candidate(
        &self,
        records: &[Arc<ControllerRecord>],
        name: &str,
        st: &mut SwitchState,
    ) -> ArmatureResult<()> {
        let record = find_record(records, name).ok_or_else(|| {
            crate::armature_internal!("controller '{}' vanished between switch phases", name)
        })?;

        if record.is_unconfigured() {
            return Err(ArmatureError::invalid_state(format!(
                "controller '{}' is unconfigured; it needs to be configured before activation",
                name
            )));
        }
        if record.is_active() {
            if !st.deactivate.iter().any(|n| n == name) {
                return Err(ArmatureError::invalid_state(format!(
                    "controller '{}' is already active",
                    name
                )));
            }
        } else if !record.is_inactive() {
            return Err(ArmatureError::invalid_state(format!(
                "controller '{}' is not inactive",
                name
            )));
        } else {
            let mut visited = Vec::new();
            self.check_following_controllers_for_activate(records, record, st, &mut visited)?;
        }

        self.check_fallback_controllers_pre_activation(records, record)
    }

    /// Walk the chained interfaces of an activation candidate: every
    /// exporter it consumes must be chainable and end up active, and its
    /// chained-mode flip is recorded.
    fn check_following_controllers_for_activate(
        &self,
        records: &[Arc<ControllerRecord>],
        record: &Arc<ControllerRecord>,
        st: &mut SwitchState,
        visited: &mut Vec<String>,
    ) -> ArmatureResult<()> {
        // Cycles between configured controllers are rejected at configure
        // time; this guards the walk against ones routed through
        // unconfigured controllers
        if visited.iter().any(|n| n == record.name()) {
            return Err(ArmatureError::conflict(format!(
                "circular controller chain involving '{}'",
                record.name()
            )));
        }
        visited.push(record.name().to_string());

        let command_names = record
            .controller()
            .command_interface_configuration()
            .names()
            .to_vec();
        let interfaces = consumed_interface_names(record);

        for interface in &interfaces {
            let Some(following) = chained_exporter(records, record.name(), interface) else {
                continue;
            };
            if !following.info().is_chainable {
                return Err(ArmatureError::conflict(format!(
                    "interface '{}' names controller '{}', which is not chainable",
                    interface,
                    following.name()
                )));
            }
            if following.is_active() {
                if st.deactivate.iter().any(|n| n == following.name()) {
                    return Err(ArmatureError::conflict(format!(
                        "following controller '{}' is active but requested to be deactivated",
                        following.name()
                    )));
                }
            } else if !st.activate.iter().any(|n| n == following.name()) {
                return Err(ArmatureError::conflict(format!(
                    "following controller '{}' is inactive and not requested to be activated",
                    following.name()
                )));
            }

            // The whole chain below must be consistent too
            self.check_following_controllers_for_activate(records, following, st, visited)?;

            if !following.in_chained_mode() {
                if !st.to_chained_mode.iter().any(|n| n == following.name()) {
                    // Make the exports claimable before the joint activation
                    self.resource_manager
                        .make_exported_state_interfaces_available(following.name());
                    if command_names.iter().any(|n| n == interface) {
                        self.resource_manager
                            .make_reference_interfaces_available(following.name());
                    }
                    st.to_chained_mode.push(following.name().to_string());
                    alog!(
                        debug,
                        "Adding controller '{}' in 'to chained mode' request",
                        following.name()
                    );
                }
            } else if remove_item(&mut st.from_chained_mode, following.name()) {
                alog!(
                    debug,
                    "Removing controller '{}' from 'from chained mode' request because it should stay in chained mode",
                    following.name()
                );
            }
        }
        visited.pop();
        Ok(())
    }

    /// Fallbacks of an activation candidate must be ready to take over:
    /// loaded, configured, and with every required interface either
    /// available now or exported by a peer in the same fallback list.
    fn check_fallback_controllers_pre_activation(
        &self,
        records: &[Arc<ControllerRecord>],
        record: &Arc<ControllerRecord>,
    ) -> ArmatureResult<()> {
        for fallback in &record.info().fallback_controllers {
            let fallback_record = find_record(records, fallback).ok_or_else(|| {
                ArmatureError::not_found(format!(
                    "fallback controller '{}' of controller '{}'",
                    fallback,
                    record.name()
                ))
            })?;
            if !fallback_record.is_inactive() && !fallback_record.is_active() {
                return Err(ArmatureError::invalid_state(format!(
                    "fallback controller '{}' of controller '{}' needs to be configured",
                    fallback,
                    record.name()
                )));
            }

            let command_names = fallback_record
                .controller()
                .command_interface_configuration()
                .names()
                .to_vec();
            for interface in &command_names {
                if self.resource_manager.command_interface_is_available(interface) {
                    continue;
                }
                self.check_fallback_interface_exported(records, record, fallback, interface)?;
            }
            let state_names = fallback_record
                .controller()
                .state_interface_configuration()
                .names()
                .to_vec();
            for interface in &state_names {
                if self.resource_manager.state_interface_is_available(interface) {
                    continue;
                }
                self.check_fallback_interface_exported(records, record, fallback, interface)?;
            }
        }
        Ok(())
    }

    /// A fallback's unavailable interface is acceptable only when a peer in
    /// the same fallback list (or an already-active exporter) provides it.
    fn check_fallback_interface_exported(
        &self,
        records: &[Arc<ControllerRecord>],
        record: &Arc<ControllerRecord>,
        fallback: &str,
        interface: &str,
    ) -> ArmatureResult<()> {
        if let Some(exporter) = interface_prefix(interface).and_then(|p| find_record(records, p)) {
            let in_fallback_list = record
                .info()
                .fallback_controllers
                .iter()
                .any(|n| n == exporter.name());
            if (exporter.is_active() || in_fallback_list) && exporter.exports_interface(interface) {
                return Ok(());
            }
        }
        Err(ArmatureError::interface_unavailable(format!(
            "interface '{}' required by fallback controller '{}' of controller '{}' is neither available nor exported within the fallback list",
            interface,
            fallback,
            record.name()
        )))
    }

    /// A deactivation candidate must be active, and no active consumer of
    /// its exports may stay behind.
    fn check_deactivate_candidate(
        &self,
        records: &[Arc<ControllerRecord>],
        name: &str,
        st: &SwitchState,
    ) -> ArmatureResult<()> {
        let record = find_record(records, name).ok_or_else(|| {
            crate::armature_internal!("controller '{}' vanished between switch phases", name)
        })?;
        if !record.is_active() {
            return Err(ArmatureError::invalid_state(format!(
                "controller '{}' can not be deactivated since it is not active",
                name
            )));
        }
        if !record.info().is_chainable {
            return Ok(());
        }

        let consumers = self.chain.lock().consumers_of(name);
        for consumer in &consumers {
            let Some(consumer_record) = find_record(records, consumer) else {
                continue;
            };
            if consumer_record.is_inactive() && st.activate.iter().any(|n| n == consumer) {
                return Err(ArmatureError::conflict(format!(
                    "unable to deactivate '{}' because preceding controller '{}' is inactive and will be activated",
                    name, consumer
                )));
            }
            if consumer_record.is_active() && !st.deactivate.iter().any(|n| n == consumer) {
                return Err(ArmatureError::conflict(format!(
                    "unable to deactivate '{}' because preceding controller '{}' is active and will not be deactivated",
                    name, consumer
                )));
            }
        }
        Ok(())
    }

    /// Restart chained-mode flippers, resolve double-stop/double-start
    /// conflicts, and compile the command interface plan.
    fn compile_interface_plan(
        &self,
        records: &[Arc<ControllerRecord>],
        strictness: Strictness,
        st: &mut SwitchState,
    ) -> ArmatureResult<()> {
        for record in records {
            let name = record.name().to_string();
            let is_active = record.is_active();
            let is_inactive = record.is_inactive();
            let in_to_chained = st.to_chained_mode.iter().any(|n| n == &name);
            let in_from_chained = st.from_chained_mode.iter().any(|n| n == &name);
            let mut in_deactivate = st.deactivate.iter().any(|n| n == &name);

            // A controller whose chained mode flips while active is
            // restarted through both lists
            if (in_to_chained || in_from_chained) && is_active && !in_deactivate {
                st.deactivate.push(name.clone());
                st.activate.push(name.clone());
            }

            in_deactivate = st.deactivate.iter().any(|n| n == &name);
            let mut in_activate = st.activate.iter().any(|n| n == &name);

            // Double stop
            if !is_active && in_deactivate {
                self.handle_switch_conflict(
                    strictness,
                    st,
                    &format!("could not deactivate controller '{}' since it is not active", name),
                )?;
                remove_item(&mut st.deactivate, &name);
                in_deactivate = false;
            }

            // Double activation
            if is_active && !in_deactivate && in_activate {
                self.handle_switch_conflict(
                    strictness,
                    st,
                    &format!(
                        "could not activate controller '{}' since it is already active",
                        name
                    ),
                )?;
                remove_item(&mut st.activate, &name);
                in_activate = false;
            }

            // Activation of an unconfigured or finalized controller
            if !is_inactive && !in_deactivate && in_activate {
                self.handle_switch_conflict(
                    strictness,
                    st,
                    &format!(
                        "could not activate controller '{}' since it is not in inactive state",
                        name
                    ),
                )?;
                remove_item(&mut st.activate, &name);
                in_activate = false;
            }

            if in_activate {
                extract_command_interfaces(
                    record,
                    self.resource_manager.as_ref(),
                    &mut st.activate_command_interfaces,
                );
                self.resource_manager.cache_controller_to_hardware(
                    &name,
                    &all_required_interfaces(record, self.resource_manager.as_ref()),
                );
            }
            if in_deactivate {
                extract_command_interfaces(
                    record,
                    self.resource_manager.as_ref(),
                    &mut st.deactivate_command_interfaces,
                );
            }
        }
        Ok(())
    }

    fn handle_switch_conflict(
        &self,
        strictness: Strictness,
        st: &mut SwitchState,
        message: &str,
    ) -> ArmatureResult<()> {
        if strictness == Strictness::Strict {
            alog!(error, "{}", message);
            st.clear();
            Err(ArmatureError::conflict(message))
        } else {
            alog!(warn, "{}", message);
            Ok(())
        }
    }

    /// Every named interface of every activation candidate must be present.
    fn check_interface_availability(
        &self,
        records: &[Arc<ControllerRecord>],
        st: &SwitchState,
    ) -> ArmatureResult<()> {
        for name in &st.activate {
            let Some(record) = find_record(records, name) else {
                continue;
            };
            let command_names = record
                .controller()
                .command_interface_configuration()
                .names()
                .to_vec();
            for interface in &command_names {
                if !self.resource_manager.command_interface_is_available(interface) {
                    return Err(ArmatureError::interface_unavailable(format!(
                        "command interface '{}' required by controller '{}' is not available",
                        interface, name
                    )));
                }
            }
            let state_names = record
                .controller()
                .state_interface_configuration()
                .names()
                .to_vec();
            for interface in &state_names {
                if !self.resource_manager.state_interface_is_available(interface) {
                    return Err(ArmatureError::interface_unavailable(format!(
                        "state interface '{}' required by controller '{}' is not available",
                        interface, name
                    )));
                }
            }
        }
        Ok(())
    }

    // ====================================================================
    // Real-time side
    // ====================================================================

    /// Hardware read step. On error, every controller cached against a
    /// failed component is deactivated; no fallbacks, the hardware itself is
    /// the fault domain.
    pub fn read(&self, time: Instant, period: Duration) {
        if !period.is_zero() {
            self.read_periodicity
                .lock()
                .add(1.0 / period.as_secs_f64());
        }
        let outcome = self.resource_manager.read(time, period);
        if outcome.status == CycleStatus::Ok {
            return;
        }

        let rt_list = self.roster.rt_list();
        let mut buffers = self.rt_buffers.lock();
        buffers.deactivate.clear();
        collect_controllers_for_failed_hardware(
            self.resource_manager.as_ref(),
            &outcome.failed_components,
            &mut buffers.deactivate,
        );
        alog!(
            error,
            "Deactivating following hardware components as their read cycle resulted in an error: [ {} ]",
            concat_names(&outcome.failed_components)
        );
        if !buffers.deactivate.is_empty() {
            alog!(
                error,
                "Deactivating following controllers as their hardware components read cycle resulted in an error: [ {} ]",
                concat_names(&buffers.deactivate)
            );
        }
        // Hardware is already out of its running state; no mode switch
        self.deactivate_controllers(&rt_list, &buffers.deactivate);
        if !buffers.deactivate.is_empty() {
            self.publish_activity(&rt_list);
        }
    }

    /// Trigger every due controller once. Returns an error when any
    /// controller failed this cycle; the fallback handling has already run
    /// by then.
    pub fn update(&self, time: Instant, period: Duration) -> ArmatureResult<()> {
        let rt_list = self.roster.rt_list();
        let cycle = self.cycle_count.fetch_add(1, Ordering::Relaxed);
        let manager_rate = self.config.update_rate_hz;

        let mut buffers = self.rt_buffers.lock();
        buffers.deactivate.clear();

        {
            // Racing the request mutex only to skip draining async
            // controllers; failure to lock means no armed switch
            let pending = self.switch_params.state.try_lock();

            for record in rt_list.iter() {
                if !record.is_active() {
                    continue;
                }
                if let Some(state) = &pending {
                    if state.do_switch
                        && record.info().is_async
                        && state.deactivate.iter().any(|n| n == record.name())
                    {
                        alog!(
                            debug,
                            "Skipping update for async controller '{}' as it is being deactivated",
                            record.name()
                        );
                        continue;
                    }
                }

                let rate = record.info().update_rate;
                let run_at_manager_rate = rate.map_or(true, |r| r >= manager_rate);
                let nominal_period = match rate {
                    Some(r) if !run_at_manager_rate => Duration::from_secs_f64(1.0 / r),
                    _ => period,
                };

                let mut first_update_cycle = false;
                let actual_period = match record.last_update() {
                    None => {
                        // Cleared on activation; seed it and fire regardless
                        // of the rate gate
                        first_update_cycle = true;
                        record.set_last_update(Some(time));
                        Duration::ZERO
                    }
                    Some(previous) => time.saturating_duration_since(previous),
                };

                // The 0.99 factor absorbs scheduler jitter: a 50 Hz
                // controller on a 100 Hz manager fires every other cycle
                // even when the sleep comes back a hair early.
                let due = run_at_manager_rate
                    || first_update_cycle
                    || rate.map_or(true, |r| actual_period.as_secs_f64() * r >= 0.99);
                if !due {
                    continue;
                }

                let trigger_period = if first_update_cycle {
                    nominal_period
                } else {
                    actual_period
                };

                set_controller_context(record.name(), cycle);
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    record.controller().trigger_update(time, trigger_period)
                }));
                clear_controller_context();
                record.set_last_update(Some(time));

                match outcome {
                    Ok(trigger) => {
                        if trigger.successful {
                            if let Some(execution) = trigger.execution_time {
                                record.record_execution_time_us(execution.as_secs_f64() * 1e6);
                            }
                            if !first_update_cycle {
                                if let Some(reported) = trigger.period {
                                    if !reported.is_zero() {
                                        record.record_periodicity(1.0 / reported.as_secs_f64());
                                    }
                                }
                            }
                        }
                        if trigger.result == UpdateResult::Error {
                            alog!(
                                error,
                                "Controller '{}' returned an error from update",
                                record.name()
                            );
                            buffers.deactivate.push(record.name().to_string());
                        }
                    }
                    Err(payload) => {
                        let message = lifecycle::panic_message(&payload);
                        alog!(
                            error,
                            "Caught panic while updating controller '{}': {}",
                            record.name(),
                            message
                        );
                        buffers.deactivate.push(record.name().to_string());
                    }
                }
            }
        }

        let had_failures = !buffers.deactivate.is_empty();
        if had_failures {
            self.handle_update_failures(&rt_list, &mut buffers);
        }
        drop(buffers);

        self.resource_manager.enforce_command_limits(period);

        // Pending switch request: run the apply phase at this cycle boundary
        self.manage_switch(&rt_list);

        if had_failures {
            Err(ArmatureError::internal(
                "one or more controllers failed during update",
            ))
        } else {
            Ok(())
        }
    }

    /// Deactivate the failed controllers, activate their fallbacks, and
    /// clear conflicting peers, all within the current cycle.
    fn handle_update_failures(&self, rt_list: &[Arc<ControllerRecord>], buffers: &mut RtBuffers) {
        buffers.fallback.clear();
        buffers.conflicting.clear();

        for index in 0..buffers.deactivate.len() {
            let failed = buffers.deactivate[index].clone();
            if let Some(record) = find_record(rt_list, &failed) {
                for fallback in &record.info().fallback_controllers {
                    add_item(&mut buffers.fallback, fallback);
                    active_peers_using_command_interfaces(
                        fallback,
                        rt_list,
                        &mut buffers.conflicting,
                    );
                }
            }
        }

        alog!(
            error,
            "Deactivating controllers : [ {} ] as their update resulted in an error!",
            concat_names(&buffers.deactivate)
        );
        if !buffers.conflicting.is_empty() {
            alog!(
                error,
                "Deactivating controllers : [ {} ] using the command interfaces needed for the fallback controllers to activate",
                concat_names(&buffers.conflicting)
            );
        }
        if !buffers.fallback.is_empty() {
            alog!(
                error,
                "Activating fallback controllers : [ {} ]",
                concat_names(&buffers.fallback)
            );
        }

        for index in 0..buffers.conflicting.len() {
            let name = buffers.conflicting[index].clone();
            add_item(&mut buffers.deactivate, &name);
        }

        self.perform_hardware_command_mode_change(rt_list, buffers, "update");
        self.deactivate_controllers(rt_list, &buffers.deactivate);
        if !buffers.fallback.is_empty() {
            self.activate_controllers(rt_list, &buffers.fallback);
        }
        self.publish_activity(rt_list);
    }

    /// Prepare+perform for a fault-driven reconfiguration, using the
    /// buffers' fallback (activate) and deactivate lists.
    fn perform_hardware_command_mode_change(
        &self,
        rt_list: &[Arc<ControllerRecord>],
        buffers: &mut RtBuffers,
        cycle_name: &str,
    ) {
        buffers.interfaces_to_start.clear();
        buffers.interfaces_to_stop.clear();
        for name in &buffers.deactivate {
            if let Some(record) = find_record(rt_list, name) {
                extract_command_interfaces(
                    record,
                    self.resource_manager.as_ref(),
                    &mut buffers.interfaces_to_stop,
                );
            }
        }
        for name in &buffers.fallback {
            if let Some(record) = find_record(rt_list, name) {
                extract_command_interfaces(
                    record,
                    self.resource_manager.as_ref(),
                    &mut buffers.interfaces_to_start,
                );
            }
        }
        if buffers.interfaces_to_start.is_empty() && buffers.interfaces_to_stop.is_empty() {
            return;
        }
        let accepted = self
            .resource_manager
            .prepare_command_mode_switch(&buffers.interfaces_to_start, &buffers.interfaces_to_stop)
            && self.resource_manager.perform_command_mode_switch(
                &buffers.interfaces_to_start,
                &buffers.interfaces_to_stop,
            );
        if !accepted {
            alog!(
                error,
                "Error while attempting mode switch when deactivating controllers in {} cycle!",
                cycle_name
            );
        }
    }

    /// Hardware write step. `Error` follows the read-error policy;
    /// `Deactivate` stops only the controllers whose command interfaces
    /// touch the failing components.
    pub fn write(&self, time: Instant, period: Duration) {
        let outcome = self.resource_manager.write(time, period);
        match outcome.status {
            CycleStatus::Ok => {}
            CycleStatus::Error => {
                let rt_list = self.roster.rt_list();
                let mut buffers = self.rt_buffers.lock();
                buffers.deactivate.clear();
                collect_controllers_for_failed_hardware(
                    self.resource_manager.as_ref(),
                    &outcome.failed_components,
                    &mut buffers.deactivate,
                );
                alog!(
                    error,
                    "Deactivating following hardware components as their write cycle resulted in an error: [ {} ]",
                    concat_names(&outcome.failed_components)
                );
                if !buffers.deactivate.is_empty() {
                    alog!(
                        error,
                        "Deactivating following controllers as their hardware components write cycle resulted in an error: [ {} ]",
                        concat_names(&buffers.deactivate)
                    );
                }
                self.deactivate_controllers(&rt_list, &buffers.deactivate);
                if !buffers.deactivate.is_empty() {
                    self.publish_activity(&rt_list);
                }
            }
            CycleStatus::Deactivate => {
                let rt_list = self.roster.rt_list();
                let mut buffers = self.rt_buffers.lock();
                buffers.deactivate.clear();
                buffers.fallback.clear();
                for component in &outcome.failed_components {
                    for name in self.resource_manager.controllers_for_hardware(component) {
                        let Some(record) = find_record(&rt_list, &name) else {
                            alog!(
                                warn,
                                "Deactivate failed to find controller '{}' in loaded controllers; this can happen on repeated DEACTIVATE returns from '{}'",
                                name,
                                component
                            );
                            continue;
                        };
                        // Read-only controllers are left alone
                        let mut command_interfaces = Vec::new();
                        extract_command_interfaces(
                            record,
                            self.resource_manager.as_ref(),
                            &mut command_interfaces,
                        );
                        if !command_interfaces.is_empty() {
                            add_item(&mut buffers.deactivate, &name);
                        }
                    }
                }
                if !buffers.deactivate.is_empty() {
                    alog!(
                        error,
                        "Deactivating controllers [ {} ] as their command interfaces are tied to DEACTIVATE-ing hardware components",
                        concat_names(&buffers.deactivate)
                    );
                }
                self.perform_hardware_command_mode_change(&rt_list, &mut buffers, "write");
                self.deactivate_controllers(&rt_list, &buffers.deactivate);
                if !buffers.deactivate.is_empty() {
                    self.publish_activity(&rt_list);
                }
            }
        }
    }

    /// Switch phase D: apply a pending request at the cycle boundary. Only
    /// ever tries the request lock; a miss postpones to the next cycle.
    fn manage_switch(&self, rt_list: &[Arc<ControllerRecord>]) {
        let Some(mut st) = self.switch_params.state.try_lock() else {
            alog!(debug, "Unable to lock switch mutex. Retrying in next cycle.");
            return;
        };
        if !st.do_switch {
            return;
        }

        if !self.resource_manager.perform_command_mode_switch(
            &st.activate_command_interfaces,
            &st.deactivate_command_interfaces,
        ) {
            alog!(error, "Error while performing mode switch.");
        }

        self.deactivate_controllers(rt_list, &st.deactivate);
        self.switch_chained_mode(rt_list, &st.to_chained_mode, true);
        self.switch_chained_mode(rt_list, &st.from_chained_mode, false);

        // activate_asap currently rides the same path; gradual multi-cycle
        // activation would hook in here
        self.activate_controllers(rt_list, &st.activate);

        st.do_switch = false;
        self.switch_params.cv.notify_all();
    }

    fn deactivate_controllers(&self, rt_list: &[Arc<ControllerRecord>], names: &[String]) {
        for name in names {
            let Some(record) = find_record(rt_list, name) else {
                alog!(
                    error,
                    "Got request to deactivate controller '{}' but it is not in the realtime controller list",
                    name
                );
                continue;
            };
            if !record.is_active() {
                continue;
            }

            let _ = lifecycle::deactivate(record);

            // Take the loans back no matter how the hook went; a leaked
            // claim would block every later activation of these interfaces
            let released = catch_unwind(AssertUnwindSafe(|| {
                record.controller().release_interfaces()
            }));
            if let Ok((command_loans, state_loans)) = released {
                for loan in command_loans {
                    self.resource_manager.release_command_interface(loan);
                }
                for loan in state_loans {
                    self.resource_manager.release_state_interface(loan);
                }
            }
            record.clear_claimed_interfaces();

            if record.info().is_chainable {
                self.resource_manager
                    .make_exported_state_interfaces_unavailable(name);
                self.resource_manager
                    .make_reference_interfaces_unavailable(name);
            }
        }
    }

    fn switch_chained_mode(
        &self,
        rt_list: &[Arc<ControllerRecord>],
        names: &[String],
        chained: bool,
    ) {
        for name in names {
            let Some(record) = find_record(rt_list, name) else {
                alog!(
                    error,
                    "Got request to turn {} chained mode for controller '{}', but it is not in the realtime controller list",
                    if chained { "ON" } else { "OFF" },
                    name
                );
                continue;
            };
            if record.is_active() {
                alog!(
                    error,
                    "Got request to turn {} chained mode for controller '{}', but this can not happen while it is active",
                    if chained { "ON" } else { "OFF" },
                    name
                );
                continue;
            }
            let accepted = catch_unwind(AssertUnwindSafe(|| {
                record.controller().set_chained_mode(chained)
            }))
            .unwrap_or(false);
            if accepted {
                record.set_chained_flag(chained);
            } else {
                alog!(
                    error,
                    "Got request to turn {} chained mode for controller '{}', but the controller refused",
                    if chained { "ON" } else { "OFF" },
                    name
                );
            }
        }
    }

    fn activate_controllers(&self, rt_list: &[Arc<ControllerRecord>], names: &[String]) {
        for name in names {
            let Some(record) = find_record(rt_list, name) else {
                alog!(
                    error,
                    "Got request to activate controller '{}' but it is not in the realtime controller list",
                    name
                );
                continue;
            };

            // Rate gating restarts from scratch for this activation
            record.set_last_update(None);

            let command_names = record
                .controller()
                .command_interface_configuration()
                .expand(|| self.resource_manager.available_command_interfaces());

            let mut command_loans = Vec::with_capacity(command_names.len());
            let mut assignment_successful = true;
            for interface in &command_names {
                if self.resource_manager.command_interface_is_claimed(interface) {
                    alog!(
                        error,
                        "Resource conflict for controller '{}'. Command interface '{}' is already claimed.",
                        name,
                        interface
                    );
                    assignment_successful = false;
                    break;
                }
                match self.resource_manager.claim_command_interface(interface) {
                    Ok(loan) => command_loans.push(loan),
                    Err(e) => {
                        alog!(
                            error,
                            "Failed claiming command interface '{}', can't activate controller '{}': {}",
                            interface,
                            name,
                            e
                        );
                        assignment_successful = false;
                        break;
                    }
                }
            }
            if !assignment_successful {
                for loan in command_loans {
                    self.resource_manager.release_command_interface(loan);
                }
                continue;
            }

            let state_names = record
                .controller()
                .state_interface_configuration()
                .expand(|| self.resource_manager.available_state_interfaces());
            let mut state_loans = Vec::with_capacity(state_names.len());
            for interface in &state_names {
                match self.resource_manager.claim_state_interface(interface) {
                    Ok(loan) => state_loans.push(loan),
                    Err(e) => {
                        alog!(
                            error,
                            "Failed claiming state interface '{}', can't activate controller '{}': {}",
                            interface,
                            name,
                            e
                        );
                        assignment_successful = false;
                        break;
                    }
                }
            }
            if !assignment_successful {
                for loan in command_loans {
                    self.resource_manager.release_command_interface(loan);
                }
                for loan in state_loans {
                    self.resource_manager.release_state_interface(loan);
                }
                continue;
            }

            let assigned = catch_unwind(AssertUnwindSafe(|| {
                record
                    .controller()
                    .assign_interfaces(command_loans, state_loans)
            }));
            if assigned.is_err() {
                alog!(
                    error,
                    "Controller '{}' panicked in assign_interfaces",
                    name
                );
                lifecycle::error_path(record);
                self.recover_loans(record);
                continue;
            }

            record.reset_statistics();
            match lifecycle::activate(record) {
                Ok(()) => {
                    record.set_claimed_interfaces(command_names);
                    if record.info().is_chainable {
                        self.resource_manager
                            .make_exported_state_interfaces_available(name);
                        self.resource_manager
                            .make_reference_interfaces_available(name);
                    }
                }
                Err(_) => {
                    // The lifecycle engine logged and handled the state;
                    // only the loans need to come back
                    self.recover_loans(record);
                }
            }
        }
    }

    /// Best-effort recovery of loans stuck inside a failed controller.
    fn recover_loans(&self, record: &ControllerRecord) {
        let released = catch_unwind(AssertUnwindSafe(|| {
            record.controller().release_interfaces()
        }));
        if let Ok((command_loans, state_loans)) = released {
            for loan in command_loans {
                self.resource_manager.release_command_interface(loan);
            }
            for loan in state_loans {
                self.resource_manager.release_state_interface(loan);
            }
        }
        record.clear_claimed_interfaces();
    }

    fn publish_activity(&self, records: &[Arc<ControllerRecord>]) {
        let snapshot = diagnostics::snapshot_of(records);
        self.activity_sink.publish_activity(&snapshot);
    }

    // ====================================================================
    // Run loop
    // ====================================================================

    /// Stop a running loop after the current cycle.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Drive read → update → write at the configured rate until stopped.
    pub fn run(&self) -> ArmatureResult<()> {
        self.run_loop(None)
    }

    /// Drive the loop for `duration`, then return.
    pub fn run_for(&self, duration: Duration) -> ArmatureResult<()> {
        self.run_loop(Some(duration))
    }

    fn run_loop(&self, duration: Option<Duration>) -> ArmatureResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ArmatureError::invalid_state(
                "manager loop is already running",
            ));
        }

        let degradations = rt::apply_realtime_config(&self.config.realtime);
        for degradation in &degradations {
            alog!(
                warn,
                "{}: {}",
                degradation.feature,
                degradation.reason
            );
        }
        *self.degradations.lock() = degradations;

        let running = self.running.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        }) {
            alog!(warn, "Failed to set signal handler: {}", e);
        }

        let period = self.config.period();
        let start = Instant::now();
        let mut last_cycle = start;
        let mut last_snapshot = start;

        while self.running.load(Ordering::SeqCst) {
            if let Some(limit) = duration {
                if start.elapsed() >= limit {
                    break;
                }
            }

            let now = Instant::now();
            let mut elapsed = now.saturating_duration_since(last_cycle);
            if elapsed.is_zero() {
                elapsed = period;
            }
            last_cycle = now;

            self.read(now, elapsed);
            // Faults were already translated into deactivations inside
            let _ = self.update(now, elapsed);
            self.write(now, elapsed);

            if last_snapshot.elapsed() >= self.config.diagnostics_interval {
                let rt_list = self.roster.rt_list();
                self.publish_activity(&rt_list);
                last_snapshot = now;
            }

            let cycle_time = now.elapsed();
            if cycle_time < period {
                std::thread::sleep(period - cycle_time);
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// The interface names a controller consumes, command first then state.
/// Only explicitly named interfaces can form chains.
fn consumed_interface_names(record: &ControllerRecord) -> Vec<String> {
    let controller = record.controller();
    let mut names = controller
        .command_interface_configuration()
        .names()
        .to_vec();
    names.extend_from_slice(controller.state_interface_configuration().names());
    names
}

/// Resolve an interface name to the loaded controller exporting it, if any.
fn chained_exporter<'a>(
    records: &'a [Arc<ControllerRecord>],
    own_name: &str,
    interface: &str,
) -> Option<&'a Arc<ControllerRecord>> {
    let prefix = interface_prefix(interface)?;
    if prefix == own_name {
        return None;
    }
    find_record(records, prefix)
}

fn first_duplicate(names: &[String]) -> Option<String> {
    for (index, name) in names.iter().enumerate() {
        if names[index + 1..].iter().any(|other| other == name) {
            return Some(name.clone());
        }
    }
    None
}

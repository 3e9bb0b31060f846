//! Double-buffered controller roster.
//!
//! Two list slots and an atomic `updated` index let the real-time loop
//! iterate a stable snapshot while a control thread prepares the next list.
//! The handshake:
//!
//! - the RT loop takes `rt_list()` once per cycle, which publishes
//!   `used_by_rt = updated` for the duration of the guard;
//! - mutation goes through `unused_mut()`, which spin-waits until the RT
//!   loop is provably not holding the free slot;
//! - `switch_updated_list()` flips `updated` (release) and waits until the
//!   RT loop has let go of the former slot.
//!
//! Control-side callers serialize on the reentrant `lock()`; re-entry is
//! allowed so error paths can mutate the roster while a switch is already
//! holding the lock. Records themselves are shared `Arc`s, so both slots
//! always agree on per-controller state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::core::record::ControllerRecord;

/// Sentinel: the RT loop is not holding any slot.
const RT_PARKED: usize = usize::MAX;

/// Control-side roster lock guard.
pub type RosterGuard<'a> = ReentrantMutexGuard<'a, ()>;

/// Read guard over the RT snapshot. Dropping it parks the RT marker so
/// control-side waits can proceed between cycles.
pub struct RtListGuard<'a> {
    guard: RwLockReadGuard<'a, Vec<Arc<ControllerRecord>>>,
    used_by_rt: &'a AtomicUsize,
}

impl std::ops::Deref for RtListGuard<'_> {
    type Target = [Arc<ControllerRecord>];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl Drop for RtListGuard<'_> {
    fn drop(&mut self) {
        self.used_by_rt.store(RT_PARKED, Ordering::Release);
    }
}

/// Two controller-list slots with an atomic active index.
pub struct DoubleBufferedRoster {
    lists: [RwLock<Vec<Arc<ControllerRecord>>>; 2],
    updated: AtomicUsize,
    used_by_rt: AtomicUsize,
    control_lock: ReentrantMutex<()>,
}

impl Default for DoubleBufferedRoster {
    fn default() -> Self {
        Self::new()
    }
}

impl DoubleBufferedRoster {
    pub fn new() -> Self {
        Self {
            lists: [RwLock::new(Vec::new()), RwLock::new(Vec::new())],
            updated: AtomicUsize::new(0),
            used_by_rt: AtomicUsize::new(RT_PARKED),
            control_lock: ReentrantMutex::new(()),
        }
    }

    /// Serialize control-side roster access. Reentrant, so fault handling
    /// may re-enter while a switch holds the lock.
    pub fn lock(&self) -> RosterGuard<'_> {
        self.control_lock.lock()
    }

    /// RT side: publish which slot the loop is using and return it.
    /// Called once per cycle; the guard must be dropped before the next
    /// cycle's call.
    pub fn rt_list(&self) -> RtListGuard<'_> {
        let index = self.updated.load(Ordering::Acquire);
        self.used_by_rt.store(index, Ordering::Release);
        RtListGuard {
            guard: self.lists[index].read(),
            used_by_rt: &self.used_by_rt,
        }
    }

    /// Control side: read the list the RT loop currently sees.
    pub fn updated_list(&self, _guard: &RosterGuard) -> RwLockReadGuard<'_, Vec<Arc<ControllerRecord>>> {
        self.lists[self.updated.load(Ordering::Acquire)].read()
    }

    /// Control side: the free slot, for mutation. Waits until the RT loop
    /// is not using it.
    pub fn unused_mut(&self, _guard: &RosterGuard) -> RwLockWriteGuard<'_, Vec<Arc<ControllerRecord>>> {
        let free = 1 - self.updated.load(Ordering::Acquire);
        self.wait_until_rt_not_using(free);
        self.lists[free].write()
    }

    /// Flip the active index, then wait until the RT loop has observed the
    /// flip (it is no longer holding the former slot).
    pub fn switch_updated_list(&self, _guard: &RosterGuard) {
        let former = self.updated.load(Ordering::Acquire);
        self.updated.store(1 - former, Ordering::Release);
        self.wait_until_rt_not_using(former);
    }

    fn wait_until_rt_not_using(&self, index: usize) {
        while self.used_by_rt.load(Ordering::Acquire) == index {
            std::thread::sleep(Duration::from_micros(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::controller::{
        CallbackResult, Controller, InterfaceConfig, TriggerResult,
    };
    use crate::hardware::{CommandLoan, StateLoan};
    use std::sync::atomic::AtomicBool;
    use std::time::Instant;

    struct NopController;

    impl Controller for NopController {
        fn command_interface_configuration(&self) -> InterfaceConfig {
            InterfaceConfig::None
        }

        fn state_interface_configuration(&self) -> InterfaceConfig {
            InterfaceConfig::None
        }

        fn on_activate(&mut self) -> CallbackResult {
            CallbackResult::Success
        }

        fn on_deactivate(&mut self) -> CallbackResult {
            CallbackResult::Success
        }

        fn assign_interfaces(&mut self, _command: Vec<CommandLoan>, _state: Vec<StateLoan>) {}

        fn release_interfaces(&mut self) -> (Vec<CommandLoan>, Vec<StateLoan>) {
            (Vec::new(), Vec::new())
        }

        fn trigger_update(&mut self, _time: Instant, period: std::time::Duration) -> TriggerResult {
            TriggerResult::ok(std::time::Duration::from_micros(1), period)
        }
    }

    fn record(name: &str) -> Arc<ControllerRecord> {
        Arc::new(ControllerRecord::new(name, "test/Nop", Box::new(NopController)))
    }

    #[test]
    fn test_mutation_then_swap_is_visible_to_rt() {
        let roster = DoubleBufferedRoster::new();
        let guard = roster.lock();

        {
            let mut unused = roster.unused_mut(&guard);
            unused.push(record("a"));
        }
        roster.switch_updated_list(&guard);

        let rt = roster.rt_list();
        assert_eq!(rt.len(), 1);
        assert_eq!(rt[0].name(), "a");
    }

    #[test]
    fn test_swap_waits_for_rt_release() {
        let roster = Arc::new(DoubleBufferedRoster::new());

        {
            let guard = roster.lock();
            roster.unused_mut(&guard).push(record("a"));
            roster.switch_updated_list(&guard);
        }

        let release_flag = Arc::new(AtomicBool::new(false));

        // RT thread holds the snapshot for a while, then drops it
        let rt_roster = roster.clone();
        let rt_flag = release_flag.clone();
        let rt_thread = std::thread::spawn(move || {
            let snapshot = rt_roster.rt_list();
            assert_eq!(snapshot.len(), 1);
            std::thread::sleep(Duration::from_millis(50));
            rt_flag.store(true, Ordering::Release);
            drop(snapshot);
            // Next cycle picks up the new list
            let snapshot = rt_roster.rt_list();
            assert_eq!(snapshot.len(), 2);
        });

        // Give the RT thread time to take its snapshot
        std::thread::sleep(Duration::from_millis(10));

        let guard = roster.lock();
        {
            let updated = roster.updated_list(&guard);
            let mut unused = roster.unused_mut(&guard);
            *unused = updated.clone();
            unused.push(record("b"));
        }
        roster.switch_updated_list(&guard);

        // The swap must not have completed before the RT thread let go
        assert!(
            release_flag.load(Ordering::Acquire),
            "switch_updated_list returned while the RT loop still held the snapshot"
        );
        drop(guard);

        rt_thread.join().unwrap();
    }

    #[test]
    fn test_control_reads_concurrent_with_rt() {
        let roster = DoubleBufferedRoster::new();
        {
            let guard = roster.lock();
            roster.unused_mut(&guard).push(record("a"));
            roster.switch_updated_list(&guard);
        }

        let rt = roster.rt_list();
        let guard = roster.lock();
        // Both sides read the same slot at the same time
        let control_view = roster.updated_list(&guard);
        assert_eq!(rt.len(), control_view.len());
    }

    #[test]
    fn test_reentrant_control_lock() {
        let roster = DoubleBufferedRoster::new();
        let outer = roster.lock();
        let inner = roster.lock();
        drop(inner);
        drop(outer);
    }
}

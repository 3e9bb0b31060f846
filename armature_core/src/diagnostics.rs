//! Activity snapshots and the injected diagnostics sink.
//!
//! The core does not publish telemetry itself; it produces
//! [`ControllerActivity`] snapshots after every switch and fault-driven
//! reconfiguration and hands them to whatever [`ActivitySink`] was injected
//! at construction. The same data backs the read-only introspection queries.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::core::lifecycle::LifecycleState;
use crate::core::record::{ControllerRecord, StatisticsSnapshot};

/// Point-in-time view of one controller for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerActivity {
    pub name: String,
    pub type_name: String,
    pub state: LifecycleState,
    pub is_chainable: bool,
    pub in_chained_mode: bool,
    pub claimed_interfaces: Vec<String>,
    /// Own rate in Hz, `None` when running at the manager rate
    pub update_rate: Option<f64>,
    /// Achieved trigger rate statistics in Hz
    pub periodicity: StatisticsSnapshot,
    /// Reported execution time statistics in microseconds
    pub execution_time_us: StatisticsSnapshot,
}

/// Build the activity view of a record.
pub fn activity_of(record: &ControllerRecord) -> ControllerActivity {
    let info = record.info();
    ControllerActivity {
        name: info.name.clone(),
        type_name: info.type_name.clone(),
        state: record.state(),
        is_chainable: info.is_chainable,
        in_chained_mode: record.in_chained_mode(),
        claimed_interfaces: record.claimed_interfaces(),
        update_rate: info.update_rate,
        periodicity: record.periodicity_snapshot(),
        execution_time_us: record.execution_time_snapshot(),
    }
}

/// Build the activity snapshot of a whole roster.
pub fn snapshot_of(records: &[Arc<ControllerRecord>]) -> Vec<ControllerActivity> {
    records.iter().map(|record| activity_of(record)).collect()
}

/// Consumer of activity snapshots, injected into the manager.
pub trait ActivitySink: Send + Sync {
    fn publish_activity(&self, activity: &[ControllerActivity]);
}

impl<T: ActivitySink> ActivitySink for Arc<T> {
    fn publish_activity(&self, activity: &[ControllerActivity]) {
        (**self).publish_activity(activity);
    }
}

/// Default sink: discards everything.
pub struct NullActivitySink;

impl ActivitySink for NullActivitySink {
    fn publish_activity(&self, _activity: &[ControllerActivity]) {}
}

/// File payload written by [`FileActivitySink`].
#[derive(Serialize)]
struct ActivityFile<'a> {
    timestamp: String,
    controllers: &'a [ControllerActivity],
}

/// Sink that mirrors the latest snapshot into a JSON file.
///
/// Writes go to a temp file first and are renamed into place, so readers
/// never observe a half-written snapshot.
pub struct FileActivitySink {
    path: PathBuf,
}

impl FileActivitySink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl ActivitySink for FileActivitySink {
    fn publish_activity(&self, activity: &[ControllerActivity]) {
        let payload = ActivityFile {
            timestamp: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
            controllers: activity,
        };
        let Ok(json) = serde_json::to_string_pretty(&payload) else {
            return;
        };

        let temp_path = self.path.with_extension("json.tmp");
        let write_result = std::fs::File::create(&temp_path).and_then(|mut file| {
            file.write_all(json.as_bytes())?;
            file.flush()
        });
        if write_result.is_ok() {
            let _ = std::fs::rename(&temp_path, &self.path);
        }
    }
}

// Manager configuration - preset factories and data structs

use std::time::Duration;

use crate::scheduling::switch::Strictness;

/// Real-time configuration applied once when the manager loop starts.
#[derive(Debug, Clone)]
pub struct RealTimeConfig {
    /// Use the real-time scheduling class (SCHED_FIFO)
    pub rt_scheduling_class: bool,
    /// Priority within the real-time class
    pub rt_priority: i32,
    /// Memory locking (mlockall)
    pub memory_locking: bool,
    /// Pin the loop thread to this CPU core
    pub cpu_core: Option<usize>,
}

/// Controller manager configuration
///
/// Use preset factories (`standard()`, `deploy()`, `hard_realtime()`) then
/// mutate fields directly for customization:
///
/// ```rust,ignore
/// let mut config = ManagerConfig::standard();
/// config.update_rate_hz = 250.0;
/// config.realtime.memory_locking = true;
/// ```
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Manager update rate in Hz; controllers without an own rate run here
    pub update_rate_hz: f64,
    /// Strictness used when a switch request passes `Strictness::Default`
    pub default_strictness: Strictness,
    /// How long a switch request may wait for the real-time apply step.
    /// A zero duration is replaced by the 1 s default at request time.
    pub switch_timeout: Duration,
    /// Cadence of periodic activity snapshots to the diagnostics sink
    pub diagnostics_interval: Duration,
    /// Real-time features to apply at loop start
    pub realtime: RealTimeConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl ManagerConfig {
    /// Standard configuration for development and most robots.
    ///
    /// 100 Hz, best-effort switches by default, no RT features so it runs
    /// unprivileged.
    pub fn standard() -> Self {
        Self {
            update_rate_hz: 100.0,
            default_strictness: Strictness::BestEffort,
            switch_timeout: Duration::from_secs(1),
            diagnostics_interval: Duration::from_secs(5),
            realtime: RealTimeConfig {
                rt_scheduling_class: false,
                rt_priority: 0,
                memory_locking: false,
                cpu_core: None,
            },
        }
    }

    /// Deploy configuration for production robots.
    ///
    /// Standard rate with best-effort RT features: SCHED_FIFO and memory
    /// locking are attempted and reported as degradations when unavailable.
    pub fn deploy() -> Self {
        Self {
            update_rate_hz: 100.0,
            default_strictness: Strictness::BestEffort,
            switch_timeout: Duration::from_secs(1),
            diagnostics_interval: Duration::from_secs(5),
            realtime: RealTimeConfig {
                rt_scheduling_class: true,
                rt_priority: 50,
                memory_locking: true,
                cpu_core: None,
            },
        }
    }

    /// Hard real-time configuration for machines where a late cycle is a
    /// fault: 1 kHz, strict switches, full RT feature set.
    pub fn hard_realtime() -> Self {
        Self {
            update_rate_hz: 1000.0,
            default_strictness: Strictness::Strict,
            switch_timeout: Duration::from_secs(1),
            diagnostics_interval: Duration::from_secs(1),
            realtime: RealTimeConfig {
                rt_scheduling_class: true,
                rt_priority: 80,
                memory_locking: true,
                cpu_core: Some(0),
            },
        }
    }

    /// The nominal cycle period.
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.update_rate_hz)
    }
}

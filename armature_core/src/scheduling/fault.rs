//! Real-time fault handling scratch space.
//!
//! The update scheduler reacts to hardware and controller faults mid-cycle:
//! gathering controllers to deactivate, their fallbacks, and the interface
//! lists for the hardware mode change. The vectors live here, preallocated
//! and reused, so the fault paths stay off the allocator in the common case.

use crate::hardware::ResourceManager;
use crate::scheduling::chain::add_item;

/// Reusable buffers for the RT loop's fault paths.
#[derive(Debug)]
pub(crate) struct RtBuffers {
    /// Controllers queued for deactivation this cycle
    pub deactivate: Vec<String>,
    /// Fallbacks queued for activation this cycle
    pub fallback: Vec<String>,
    /// Active peers holding command interfaces the fallbacks need
    pub conflicting: Vec<String>,
    /// Interface scratch for prepare/perform
    pub interfaces_to_start: Vec<String>,
    pub interfaces_to_stop: Vec<String>,
}

impl RtBuffers {
    pub fn new() -> Self {
        const RESERVE: usize = 32;
        Self {
            deactivate: Vec::with_capacity(RESERVE),
            fallback: Vec::with_capacity(RESERVE),
            conflicting: Vec::with_capacity(RESERVE),
            interfaces_to_start: Vec::with_capacity(RESERVE),
            interfaces_to_stop: Vec::with_capacity(RESERVE),
        }
    }
}

/// Map failed hardware components back to the controllers cached against
/// them, deduplicated into `out`.
pub(crate) fn collect_controllers_for_failed_hardware(
    resource_manager: &dyn ResourceManager,
    failed_components: &[String],
    out: &mut Vec<String>,
) {
    for component in failed_components {
        for controller in resource_manager.controllers_for_hardware(component) {
            add_item(out, &controller);
        }
    }
}

//! Discovery of running target-application instances.

use std::sync::Arc;

use tracing::debug;

use crate::locator::WindowLocator;
use crate::process::{OpLockTable, ProcessHandle, TargetProcess};
use crate::synth::{PollPolicy, SynthesisController};
use crate::variant::Variant;
use crate::Result;

/// Discovers running instances and hands out controllers for them.
pub struct ProcessFactory<L> {
    locator: Arc<L>,
    policy: PollPolicy,
    locks: OpLockTable,
}

impl<L: WindowLocator> ProcessFactory<L> {
    /// Creates a factory over the given locator with default timing.
    pub fn new(locator: L) -> Self {
        Self::with_policy(locator, PollPolicy::default())
    }

    /// Creates a factory with explicit timing configuration.
    pub fn with_policy(locator: L, policy: PollPolicy) -> Self {
        Self {
            locator: Arc::new(locator),
            policy,
            locks: OpLockTable::default(),
        }
    }

    /// Scans the desktop once and returns a controller for every live
    /// instance whose window signature matches a known variant.
    ///
    /// Every call re-enumerates from scratch and returns fresh values;
    /// results from different calls are independent snapshots and must not
    /// be mixed. The per-process operation locks, however, are shared across
    /// calls, so controllers from different snapshots still serialize
    /// against the same external process.
    pub fn discover(&self) -> Result<Vec<SynthesisController<L>>> {
        let mut found = Vec::new();
        for info in self.locator.top_level_windows()? {
            let variant = match Variant::detect(&info.title, &info.class_name) {
                Some(variant) => variant,
                None => continue,
            };
            if !self.locator.process_exists(info.pid) {
                continue;
            }
            debug!(
                pid = info.pid,
                variant = variant.name(),
                title = %info.title,
                "discovered instance"
            );
            let target = TargetProcess::new(info.pid, info.handle, variant, info.title.clone());
            let handle = ProcessHandle::new(target, self.locator.clone());
            found.push(SynthesisController::new(
                handle,
                self.policy.clone(),
                self.locks.lock_for(info.pid),
            ));
        }
        Ok(found)
    }
}

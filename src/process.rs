//! Discovered target processes and the checks shared by every operation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::locator::{WindowHandle, WindowLocator};
use crate::variant::Variant;
use crate::{AutomationError, Result};

/// Identifies one externally running application instance.
///
/// Values are created by a discovery pass and become stale the instant the
/// underlying process exits. They are never refreshed in place; a new
/// discovery pass produces new values.
#[derive(Debug, Clone)]
pub struct TargetProcess {
    pid: u32,
    window: WindowHandle,
    variant: Variant,
    title: String,
}

impl TargetProcess {
    pub(crate) fn new(pid: u32, window: WindowHandle, variant: Variant, title: String) -> Self {
        Self {
            pid,
            window,
            variant,
            title,
        }
    }

    /// Operating-system identifier of the process.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Main window handle captured at discovery time.
    pub fn window(&self) -> WindowHandle {
        self.window
    }

    /// The product variant this instance was recognized as.
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Main window title as it read at discovery time.
    pub fn title(&self) -> &str {
        &self.title
    }
}

/// Operations against one discovered process.
pub struct ProcessHandle<L> {
    target: TargetProcess,
    locator: Arc<L>,
}

impl<L: WindowLocator> ProcessHandle<L> {
    pub(crate) fn new(target: TargetProcess, locator: Arc<L>) -> Self {
        Self { target, locator }
    }

    /// The identity captured at discovery time.
    pub fn target(&self) -> &TargetProcess {
        &self.target
    }

    /// Re-checks the operating-system process table. The answer is never
    /// cached and never inferred from a previous successful operation.
    pub fn is_running(&self) -> bool {
        self.locator.process_exists(self.target.pid)
    }

    /// Reads the current main-window title, which may have changed since
    /// discovery.
    pub fn window_title(&self) -> Result<String> {
        self.ensure_alive()?;
        self.locator.read_text(self.target.window)
    }

    /// The main window handle. Do not retain the returned value across a
    /// liveness re-check; ask again instead.
    pub fn window(&self) -> WindowHandle {
        self.target.window
    }

    pub(crate) fn locator(&self) -> &Arc<L> {
        &self.locator
    }

    /// Confirms the process is still alive and the captured window handle
    /// still belongs to it. An exited process's handle value can be recycled
    /// for an unrelated window; the owning-pid match catches that.
    pub(crate) fn ensure_alive(&self) -> Result<()> {
        if !self.is_running() || !self.locator.is_window(self.target.window) {
            return Err(AutomationError::ProcessNotRunning {
                pid: self.target.pid,
            });
        }
        match self.locator.window_process(self.target.window) {
            Ok(owner) if owner == self.target.pid => Ok(()),
            _ => Err(AutomationError::ProcessNotRunning {
                pid: self.target.pid,
            }),
        }
    }
}

/// Hands out the mutual-exclusion lock for a given process identifier.
///
/// The target application has no concept of concurrent requests, so all
/// controllers driving the same process share one lock, even when they come
/// from different discovery passes.
#[derive(Clone, Default)]
pub(crate) struct OpLockTable {
    locks: Arc<Mutex<HashMap<u32, Arc<Mutex<()>>>>>,
}

impl OpLockTable {
    pub fn lock_for(&self, pid: u32) -> Arc<Mutex<()>> {
        self.locks.lock().entry(pid).or_default().clone()
    }
}

//! The per-process synthesis state machine.
//!
//! UI automation is inherently racy: controls may not have been rendered
//! yet, dialogs appear asynchronously, and file writes are not
//! instantaneous. The controller makes every wait point an explicit, bounded
//! sleep-and-recheck loop, so no operation can hang indefinitely and every
//! transition corresponds to an observable, re-checkable condition rather
//! than a fixed sleep.

use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;
use strum_macros::Display;
use tracing::{debug, trace};

use crate::locator::{ControlQuery, WindowHandle, WindowLocator};
use crate::process::ProcessHandle;
use crate::variant::DialogMap;
use crate::{AutomationError, Result};

/// Timing configuration for the controller's bounded waits.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Delay between consecutive poll iterations.
    pub poll_interval: Duration,
    /// How long a control lookup keeps retrying before giving up.
    pub control_retry: Duration,
    /// Overall bound on a save operation, from invocation to confirmed
    /// export.
    pub save_timeout: Duration,
    /// Consecutive polls the destination file size must hold steady before
    /// the export counts as confirmed.
    pub stable_samples: u32,
    /// How long to watch for an overwrite prompt after confirming the save
    /// dialog.
    pub dialog_grace: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            control_retry: Duration::from_secs(2),
            save_timeout: Duration::from_secs(30),
            stable_samples: 3,
            dialog_grace: Duration::from_millis(200),
        }
    }
}

/// A destination file plus overwrite policy.
///
/// Validated before any window manipulation begins; an invalid request never
/// causes UI side effects.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    /// Where the exported audio should land.
    pub path: PathBuf,
    /// Whether an existing file at the destination may be replaced.
    pub overwrite: bool,
}

impl SaveRequest {
    /// Creates a request that refuses to replace an existing file.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            overwrite: false,
        }
    }

    /// Creates a request that replaces an existing file.
    pub fn overwriting<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            overwrite: true,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.path.file_name().is_none() {
            return self.reject("missing file name");
        }
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let meta = match fs::metadata(dir) {
            Ok(meta) => meta,
            Err(err) => return self.reject(&err.to_string()),
        };
        if !meta.is_dir() {
            return self.reject("parent is not a directory");
        }
        if meta.permissions().readonly() {
            return self.reject("parent directory is not writable");
        }
        if !self.overwrite && self.path.exists() {
            return Err(AutomationError::DestinationConflict(self.path.clone()));
        }
        Ok(())
    }

    fn reject(&self, reason: &str) -> Result<()> {
        Err(AutomationError::InvalidDestination {
            path: self.path.clone(),
            reason: reason.to_owned(),
        })
    }
}

/// Outcome of a save operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisResult {
    /// The exported file was confirmed at the given path.
    Success(PathBuf),
    /// The operation failed; the error says why.
    Failed(AutomationError),
    /// Neither a dialog nor the exported file appeared within the configured
    /// bound.
    TimedOut,
}

impl SynthesisResult {
    /// Whether this outcome is [`Success`](Self::Success).
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Observable state of a controller.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No talk text has been set for the current cycle.
    Idle,
    /// Talk text is in place; a save may begin.
    TextSet,
    /// The save command was issued; waiting for a dialog or the file.
    Synthesizing,
    /// A save dialog is on screen and being driven.
    AwaitingSaveDialog,
    /// Terminal: the exported file was confirmed.
    ExportConfirmed,
    /// Terminal: the operation failed.
    Failed,
    /// Terminal: the operation timed out.
    TimedOut,
}

/// Cooperative cancellation flag for an in-flight save.
///
/// Cloning shares the flag. Cancellation is checked between poll iterations;
/// UI actions already sent are not undone, so the target application's state
/// after a cancelled save is unspecified.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that has not been tripped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trips the token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether the token has been tripped.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Drives one target process through text entry, synthesis and export.
///
/// Dereferences to its [`ProcessHandle`], exposing the liveness and title
/// accessors. Operations against the same external process are serialized
/// through a lock shared by every controller for that pid; distinct
/// processes are driven independently.
pub struct SynthesisController<L> {
    handle: ProcessHandle<L>,
    policy: PollPolicy,
    state: Mutex<State>,
    op_lock: Arc<Mutex<()>>,
}

impl<L: WindowLocator> SynthesisController<L> {
    pub(crate) fn new(handle: ProcessHandle<L>, policy: PollPolicy, op_lock: Arc<Mutex<()>>) -> Self {
        Self {
            handle,
            policy,
            state: Mutex::new(State::Idle),
            op_lock,
        }
    }

    /// Current state of the controller. A terminal state persists until the
    /// next [`set_talk_text`](Self::set_talk_text) starts a fresh cycle.
    pub fn state(&self) -> State {
        *self.state.lock()
    }

    /// Writes the text the next save will synthesize into the target's
    /// talk-text control.
    pub fn set_talk_text(&self, text: &str) -> Result<()> {
        let _op = self.op_lock.lock();
        self.handle.ensure_alive()?;
        let map = self.handle.target().variant().control_map();
        let control = self.await_control(self.handle.window(), &map.talk_text)?;
        self.handle.locator().set_text(control, text)?;
        self.transition(State::TextSet);
        Ok(())
    }

    /// Triggers synthesis and export, returning once the exported file is
    /// confirmed written, the operation fails, or the timeout elapses.
    pub fn save(&self, request: &SaveRequest) -> SynthesisResult {
        self.save_with_cancel(request, &CancelToken::new())
    }

    /// Like [`save`](Self::save), but checks `cancel` between poll
    /// iterations and reports `Failed(Cancelled)` once it trips.
    pub fn save_with_cancel(&self, request: &SaveRequest, cancel: &CancelToken) -> SynthesisResult {
        // Request validation precedes every side effect, including taking
        // the operation lock.
        if let Err(err) = request.validate() {
            return SynthesisResult::Failed(err);
        }
        let _op = self.op_lock.lock();
        match self.run_save(request, cancel) {
            Ok(path) => {
                self.transition(State::ExportConfirmed);
                SynthesisResult::Success(path)
            }
            Err(AutomationError::TimedOut) => {
                self.transition(State::TimedOut);
                SynthesisResult::TimedOut
            }
            Err(err) => {
                self.transition(State::Failed);
                SynthesisResult::Failed(err)
            }
        }
    }

    fn run_save(&self, request: &SaveRequest, cancel: &CancelToken) -> Result<PathBuf> {
        if self.state() != State::TextSet {
            return Err(AutomationError::NoTextSet);
        }
        self.handle.ensure_alive()?;
        let map = self.handle.target().variant().control_map();
        let button = self.await_control(self.handle.window(), &map.save_button)?;
        // Fingerprint the destination before the button press so an
        // already-present file can never pass for the export.
        let mut stability = FileStability::new(self.policy.stable_samples, &request.path);
        self.handle.locator().invoke(button)?;
        self.transition(State::Synthesizing);
        debug!(
            pid = self.handle.target().pid(),
            path = %request.path.display(),
            "save invoked"
        );

        let deadline = Instant::now() + self.policy.save_timeout;
        let mut pending_dialog = map.save_dialog.as_ref();

        loop {
            if cancel.is_cancelled() {
                return Err(AutomationError::Cancelled);
            }
            self.handle.ensure_alive()?;

            if let Some(dialog_map) = pending_dialog {
                if let Some(dialog) = self.find_dialog(dialog_map)? {
                    self.transition(State::AwaitingSaveDialog);
                    self.drive_dialog(dialog, dialog_map, request)?;
                    pending_dialog = None;
                    self.transition(State::Synthesizing);
                }
            }

            if stability.observe(&request.path) {
                return Ok(request.path.clone());
            }

            if Instant::now() >= deadline {
                return Err(AutomationError::TimedOut);
            }
            trace!(state = %self.state(), "waiting for export");
            thread::sleep(self.policy.poll_interval);
        }
    }

    /// Scans the current top-level windows for the variant's save dialog.
    fn find_dialog(&self, map: &DialogMap) -> Result<Option<WindowHandle>> {
        let pid = self.handle.target().pid();
        for info in self.handle.locator().top_level_windows()? {
            if info.pid == pid
                && info.class_name == map.class
                && info.title.contains(map.title_pattern)
            {
                return Ok(Some(info.handle));
            }
        }
        Ok(None)
    }

    /// Fills the destination path into the dialog and confirms it, answering
    /// the overwrite prompt according to the request's policy.
    fn drive_dialog(
        &self,
        dialog: WindowHandle,
        map: &DialogMap,
        request: &SaveRequest,
    ) -> Result<()> {
        let locator = self.handle.locator();
        let edit = self.await_control(dialog, &map.file_name_edit)?;
        locator.set_text(edit, &request.path.to_string_lossy())?;
        let confirm = self.await_control(dialog, &map.confirm)?;
        locator.invoke(confirm)?;

        if let Some(prompt) = self.find_overwrite_prompt(map)? {
            if !request.overwrite {
                return Err(AutomationError::DestinationConflict(request.path.clone()));
            }
            let accept = self.await_control(prompt, &map.overwrite_accept)?;
            locator.invoke(accept)?;
        }
        Ok(())
    }

    /// Watches briefly for the overwrite prompt some variants raise after
    /// the dialog is confirmed.
    fn find_overwrite_prompt(&self, map: &DialogMap) -> Result<Option<WindowHandle>> {
        let pid = self.handle.target().pid();
        let deadline = Instant::now() + self.policy.dialog_grace;
        loop {
            for info in self.handle.locator().top_level_windows()? {
                if info.pid == pid
                    && info.class_name == map.class
                    && info.title.contains(map.overwrite_prompt)
                {
                    return Ok(Some(info.handle));
                }
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(self.policy.poll_interval);
        }
    }

    /// Looks up a control, retrying within the configured window for
    /// controls the UI has not rendered yet.
    fn await_control(&self, parent: WindowHandle, query: &ControlQuery) -> Result<WindowHandle> {
        let deadline = Instant::now() + self.policy.control_retry;
        loop {
            if let Some(control) = self.handle.locator().find_child(parent, query)? {
                return Ok(control);
            }
            if Instant::now() >= deadline {
                return Err(AutomationError::ControlNotFound {
                    pid: self.handle.target().pid(),
                    query: query.to_string(),
                });
            }
            trace!(%query, "control not rendered yet, retrying");
            thread::sleep(self.policy.poll_interval);
        }
    }

    fn transition(&self, next: State) {
        let mut state = self.state.lock();
        if *state != next {
            debug!(
                pid = self.handle.target().pid(),
                from = %*state,
                to = %next,
                "state transition"
            );
            *state = next;
        }
    }
}

impl<L: WindowLocator> Deref for SynthesisController<L> {
    type Target = ProcessHandle<L>;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

/// Tracks whether the destination file has settled.
///
/// When overwriting is allowed the destination may exist before the save
/// even starts; that file is fingerprinted up front and never counted, so
/// only a file the application actually wrote can confirm the export.
struct FileStability {
    required: u32,
    baseline: Option<(u64, Option<SystemTime>)>,
    last_size: u64,
    streak: u32,
}

impl FileStability {
    fn new(required: u32, path: &Path) -> Self {
        Self {
            required: required.max(1),
            baseline: fingerprint(path),
            last_size: 0,
            streak: 0,
        }
    }

    /// True once the file exists with a non-zero size, no longer matches the
    /// pre-save fingerprint, and held its size steady for the required
    /// number of consecutive observations.
    fn observe(&mut self, path: &Path) -> bool {
        let current = match fingerprint(path) {
            Some(current) => current,
            None => {
                self.streak = 0;
                self.last_size = 0;
                return false;
            }
        };
        if self.baseline == Some(current) {
            self.streak = 0;
            self.last_size = 0;
            return false;
        }
        let (size, _) = current;
        if size > 0 && size == self.last_size {
            self.streak += 1;
        } else if size > 0 {
            self.streak = 1;
        } else {
            self.streak = 0;
        }
        self.last_size = size;
        self.streak >= self.required
    }
}

fn fingerprint(path: &Path) -> Option<(u64, Option<SystemTime>)> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Some((meta.len(), meta.modified().ok())),
        _ => None,
    }
}

//! An in-memory desktop used to exercise the engine without real target
//! applications. Implements the locator seam over a scriptable window tree.

// Each test binary compiles its own copy and uses a different subset.
#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Once};
use std::time::Duration;

use parking_lot::Mutex;

use voxdrive::locator::{ControlQuery, WindowHandle, WindowInfo, WindowLocator};
use voxdrive::synth::PollPolicy;
use voxdrive::variant::Variant;
use voxdrive::{AutomationError, Result};

static LOG_INIT: Once = Once::new();

/// Timing tuned so the bounded waits resolve in milliseconds. Also installs
/// the log subscriber, once per test binary, so the engine's poll traces
/// show up under `--nocapture`.
pub fn fast_policy() -> PollPolicy {
    LOG_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing_subscriber::filter::LevelFilter::TRACE)
            .with_test_writer()
            .try_init();
    });
    PollPolicy {
        poll_interval: Duration::from_millis(5),
        control_retry: Duration::from_millis(100),
        save_timeout: Duration::from_millis(500),
        stable_samples: 2,
        dialog_grace: Duration::from_millis(25),
    }
}

/// What a fake application does when its save button is pressed.
#[derive(Debug, Clone)]
pub enum Script {
    /// Write the payload to the given path right away, dialog-free.
    DirectExport { path: PathBuf, payload: Vec<u8> },
    /// Raise the save dialog after the desktop has been enumerated
    /// `delay_polls` more times, then write the payload to whatever path the
    /// dialog was given. An overwrite prompt is raised when the chosen path
    /// already exists.
    DialogExport { delay_polls: u32, payload: Vec<u8> },
    /// Ignore the button entirely.
    Silent,
}

/// A UI action the engine performed against the fake desktop, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SetText {
        pid: u32,
        control: &'static str,
        text: String,
    },
    Invoke {
        pid: u32,
        control: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Main,
    TalkText,
    SaveButton,
    FileNameEdit,
    Confirm,
    OverwriteAccept,
    Plain,
}

impl Role {
    fn name(self) -> &'static str {
        match self {
            Role::Main => "main",
            Role::TalkText => "talk_text",
            Role::SaveButton => "save_button",
            Role::FileNameEdit => "file_name_edit",
            Role::Confirm => "confirm",
            Role::OverwriteAccept => "overwrite_accept",
            Role::Plain => "plain",
        }
    }
}

struct FakeWindow {
    handle: WindowHandle,
    parent: Option<WindowHandle>,
    pid: u32,
    title: String,
    class: String,
    item_id: Option<i32>,
    text: String,
    role: Role,
}

struct FakeApp {
    variant: Variant,
    main: WindowHandle,
    script: Script,
    dialog_countdown: Option<u32>,
    dialog: Option<WindowHandle>,
    prompt: Option<WindowHandle>,
    chosen_path: Option<PathBuf>,
}

#[derive(Default)]
struct DesktopState {
    next_handle: isize,
    windows: Vec<FakeWindow>,
    apps: HashMap<u32, FakeApp>,
    actions: Vec<Action>,
}

/// The fake desktop. Cloning shares the underlying state, so a clone can be
/// handed to a factory or agent while the test keeps scripting through the
/// original.
#[derive(Clone, Default)]
pub struct FakeDesktop {
    state: Arc<Mutex<DesktopState>>,
}

impl FakeDesktop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a fake instance of the given variant, building the window tree
    /// its control map expects.
    pub fn launch(&self, variant: Variant, pid: u32, script: Script) -> WindowHandle {
        let map = variant.control_map();
        let title = format!("{} - untitled", map.title_pattern);
        let mut state = self.state.lock();
        let main = state.add_window(None, pid, &title, "FakeAppWindow", None, Role::Main);
        state.add_for_query(main, pid, &map.talk_text, Role::TalkText);
        state.add_for_query(main, pid, &map.save_button, Role::SaveButton);
        state.apps.insert(
            pid,
            FakeApp {
                variant,
                main,
                script,
                dialog_countdown: None,
                dialog: None,
                prompt: None,
                chosen_path: None,
            },
        );
        main
    }

    /// Starts an instance whose talk-text control never renders.
    pub fn launch_without_talk_text(&self, variant: Variant, pid: u32) -> WindowHandle {
        let main = self.launch(variant, pid, Script::Silent);
        let mut state = self.state.lock();
        state
            .windows
            .retain(|window| !(window.pid == pid && window.role == Role::TalkText));
        main
    }

    /// Opens a window no variant signature matches.
    pub fn open_unrelated_window(&self, pid: u32, title: &str) {
        let mut state = self.state.lock();
        state.add_window(None, pid, title, "Notepad", None, Role::Plain);
    }

    /// Terminates a fake process: its windows vanish and the process table
    /// no longer lists it.
    pub fn kill(&self, pid: u32) {
        let mut state = self.state.lock();
        state.apps.remove(&pid);
        state.windows.retain(|window| window.pid != pid);
    }

    /// Changes the main window title, as the real applications do when their
    /// document state changes.
    pub fn set_title(&self, pid: u32, title: &str) {
        let mut state = self.state.lock();
        for window in &mut state.windows {
            if window.pid == pid && window.role == Role::Main {
                window.title = title.to_owned();
                window.text = title.to_owned();
            }
        }
    }

    /// Every UI action the engine has performed, in order.
    pub fn actions(&self) -> Vec<Action> {
        self.state.lock().actions.clone()
    }
}

impl DesktopState {
    fn alloc_handle(&mut self) -> WindowHandle {
        self.next_handle += 1;
        WindowHandle::from_raw(self.next_handle)
    }

    fn add_window(
        &mut self,
        parent: Option<WindowHandle>,
        pid: u32,
        title: &str,
        class: &str,
        item_id: Option<i32>,
        role: Role,
    ) -> WindowHandle {
        let handle = self.alloc_handle();
        self.windows.push(FakeWindow {
            handle,
            parent,
            pid,
            title: title.to_owned(),
            class: class.to_owned(),
            item_id,
            text: title.to_owned(),
            role,
        });
        handle
    }

    /// Creates a child window that the given query will resolve to.
    fn add_for_query(
        &mut self,
        parent: WindowHandle,
        pid: u32,
        query: &ControlQuery,
        role: Role,
    ) -> WindowHandle {
        match query {
            ControlQuery::Item(id) => {
                self.add_window(Some(parent), pid, "", "FakeControl", Some(*id), role)
            }
            ControlQuery::Class { name, .. } => {
                self.add_window(Some(parent), pid, "", name, None, role)
            }
            ControlQuery::Titled { class, title } => {
                self.add_window(Some(parent), pid, title, class, None, role)
            }
        }
    }

    fn window(&self, handle: WindowHandle) -> Option<&FakeWindow> {
        self.windows.iter().find(|window| window.handle == handle)
    }

    fn window_mut(&mut self, handle: WindowHandle) -> Option<&mut FakeWindow> {
        self.windows.iter_mut().find(|window| window.handle == handle)
    }

    /// Raises pending save dialogs whose countdown has elapsed. Driven by
    /// desktop enumeration, which is how the engine polls.
    fn tick_dialogs(&mut self) {
        let due: Vec<u32> = self
            .apps
            .iter_mut()
            .filter_map(|(pid, app)| match app.dialog_countdown {
                Some(0) => {
                    app.dialog_countdown = None;
                    Some(*pid)
                }
                Some(ref mut n) => {
                    *n -= 1;
                    None
                }
                None => None,
            })
            .collect();
        for pid in due {
            self.raise_dialog(pid);
        }
    }

    fn raise_dialog(&mut self, pid: u32) {
        let variant = match self.apps.get(&pid) {
            Some(app) => app.variant,
            None => return,
        };
        let map = match variant.control_map().save_dialog.as_ref() {
            Some(map) => map,
            None => return,
        };
        let dialog = self.add_window(None, pid, "Save Audio File", map.class, None, Role::Plain);
        self.add_for_query(dialog, pid, &map.file_name_edit, Role::FileNameEdit);
        self.add_for_query(dialog, pid, &map.confirm, Role::Confirm);
        if let Some(app) = self.apps.get_mut(&pid) {
            app.dialog = Some(dialog);
        }
    }

    fn press_save(&mut self, pid: u32) {
        let script = match self.apps.get(&pid) {
            Some(app) => app.script.clone(),
            None => return,
        };
        match script {
            Script::DirectExport { path, payload } => {
                fs::write(path, payload).unwrap();
            }
            Script::DialogExport { delay_polls, .. } => {
                if let Some(app) = self.apps.get_mut(&pid) {
                    app.dialog_countdown = Some(delay_polls);
                }
            }
            Script::Silent => {}
        }
    }

    fn press_confirm(&mut self, pid: u32) {
        let chosen = match self.apps.get(&pid) {
            Some(app) => app.chosen_path.clone(),
            None => return,
        };
        let chosen = match chosen {
            Some(path) => path,
            None => return,
        };
        if chosen.exists() {
            self.raise_prompt(pid);
        } else {
            self.finish_export(pid);
        }
    }

    fn raise_prompt(&mut self, pid: u32) {
        let variant = match self.apps.get(&pid) {
            Some(app) => app.variant,
            None => return,
        };
        let map = match variant.control_map().save_dialog.as_ref() {
            Some(map) => map,
            None => return,
        };
        let title = format!("{} As", map.overwrite_prompt);
        let prompt = self.add_window(None, pid, &title, map.class, None, Role::Plain);
        self.add_for_query(prompt, pid, &map.overwrite_accept, Role::OverwriteAccept);
        if let Some(app) = self.apps.get_mut(&pid) {
            app.prompt = Some(prompt);
        }
    }

    fn finish_export(&mut self, pid: u32) {
        let (chosen, payload, dialog, prompt) = match self.apps.get(&pid) {
            Some(app) => {
                let payload = match &app.script {
                    Script::DialogExport { payload, .. } => payload.clone(),
                    _ => return,
                };
                (app.chosen_path.clone(), payload, app.dialog, app.prompt)
            }
            None => return,
        };
        if let Some(path) = chosen {
            fs::write(path, payload).unwrap();
        }
        for closed in [dialog, prompt].into_iter().flatten() {
            self.windows
                .retain(|window| window.handle != closed && window.parent != Some(closed));
        }
        if let Some(app) = self.apps.get_mut(&pid) {
            app.dialog = None;
            app.prompt = None;
        }
    }
}

impl WindowLocator for FakeDesktop {
    fn top_level_windows(&self) -> Result<Vec<WindowInfo>> {
        let mut state = self.state.lock();
        state.tick_dialogs();
        Ok(state
            .windows
            .iter()
            .filter(|window| window.parent.is_none())
            .map(|window| WindowInfo {
                handle: window.handle,
                title: window.title.clone(),
                class_name: window.class.clone(),
                pid: window.pid,
            })
            .collect())
    }

    fn find_child(
        &self,
        parent: WindowHandle,
        query: &ControlQuery,
    ) -> Result<Option<WindowHandle>> {
        let state = self.state.lock();
        if state.window(parent).is_none() {
            return Err(AutomationError::ControlUnavailable);
        }
        let children = state
            .windows
            .iter()
            .filter(|window| window.parent == Some(parent));
        let found = match query {
            ControlQuery::Item(id) => children
                .filter(|window| window.item_id == Some(*id))
                .map(|window| window.handle)
                .next(),
            ControlQuery::Class { name, index } => children
                .filter(|window| window.class == *name)
                .map(|window| window.handle)
                .nth(*index),
            ControlQuery::Titled { class, title } => children
                .filter(|window| window.class == *class && window.title == *title)
                .map(|window| window.handle)
                .next(),
        };
        Ok(found)
    }

    fn read_text(&self, control: WindowHandle) -> Result<String> {
        let state = self.state.lock();
        state
            .window(control)
            .map(|window| window.text.clone())
            .ok_or(AutomationError::ControlUnavailable)
    }

    fn set_text(&self, control: WindowHandle, text: &str) -> Result<()> {
        let mut state = self.state.lock();
        let (pid, role) = {
            let window = state
                .window_mut(control)
                .ok_or(AutomationError::ControlUnavailable)?;
            window.text = text.to_owned();
            (window.pid, window.role)
        };
        if role == Role::FileNameEdit {
            if let Some(app) = state.apps.get_mut(&pid) {
                app.chosen_path = Some(PathBuf::from(text));
            }
        }
        state.actions.push(Action::SetText {
            pid,
            control: role.name(),
            text: text.to_owned(),
        });
        Ok(())
    }

    fn invoke(&self, control: WindowHandle) -> Result<()> {
        let mut state = self.state.lock();
        let (pid, role) = {
            let window = state
                .window(control)
                .ok_or(AutomationError::ControlUnavailable)?;
            (window.pid, window.role)
        };
        state.actions.push(Action::Invoke {
            pid,
            control: role.name(),
        });
        match role {
            Role::SaveButton => state.press_save(pid),
            Role::Confirm => state.press_confirm(pid),
            Role::OverwriteAccept => state.finish_export(pid),
            _ => {}
        }
        Ok(())
    }

    fn is_window(&self, handle: WindowHandle) -> bool {
        self.state.lock().window(handle).is_some()
    }

    fn window_process(&self, handle: WindowHandle) -> Result<u32> {
        self.state
            .lock()
            .window(handle)
            .map(|window| window.pid)
            .ok_or(AutomationError::ControlUnavailable)
    }

    fn process_exists(&self, pid: u32) -> bool {
        self.state.lock().apps.contains_key(&pid)
    }
}

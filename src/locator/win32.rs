//! The Win32 implementation of the locator primitives.
//!
//! Controls are addressed through the classic window-message API
//! (`WM_SETTEXT`, `WM_GETTEXT`, `BM_CLICK`) rather than UI Automation
//! patterns, because the supported application variants all expose their
//! interesting controls as real child windows.

use std::ffi::OsStr;
use std::os::windows::prelude::OsStrExt;

use parking_lot::Mutex;
use sysinfo::{Pid, PidExt, System, SystemExt};
use windows as Windows;
use Windows::core::{IntoParam, Param};
use Windows::Win32::Foundation::{BOOL, HWND, LPARAM, PWSTR, WPARAM};
use Windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, FindWindowExW, GetClassNameW, GetDlgItem, GetWindowTextW,
    GetWindowThreadProcessId, IsWindow, IsWindowVisible, SendMessageW, BM_CLICK, WM_GETTEXT,
    WM_GETTEXTLENGTH, WM_SETTEXT,
};

use crate::{AutomationError, Result};

use super::{ControlQuery, WindowHandle, WindowInfo, WindowLocator};

/// Drives real windows through the Win32 message API.
///
/// All methods re-query the operating system on every call. Like every Win32
/// windowing object, instances are thread-affine in practice: keep each
/// locator on the thread that uses it (see the crate-level notes on the
/// automation thread).
pub struct Win32Locator {
    procs: Mutex<System>,
}

impl Win32Locator {
    /// Creates a locator with an empty process-table cache.
    pub fn new() -> Self {
        Self {
            procs: Mutex::new(System::new()),
        }
    }

    fn live_control(&self, control: WindowHandle) -> Result<HWND> {
        let hwnd = HWND(control.as_raw());
        if unsafe { IsWindow(hwnd) }.as_bool() {
            Ok(hwnd)
        } else {
            Err(AutomationError::ControlUnavailable)
        }
    }
}

impl Default for Win32Locator {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowLocator for Win32Locator {
    fn top_level_windows(&self) -> Result<Vec<WindowInfo>> {
        let mut rows: Vec<WindowInfo> = Vec::new();
        unsafe {
            EnumWindows(Some(collect_window), LPARAM(&mut rows as *mut _ as isize));
        }
        Ok(rows)
    }

    fn find_child(&self, parent: WindowHandle, query: &ControlQuery) -> Result<Option<WindowHandle>> {
        let parent = self.live_control(parent)?;
        let found = match query {
            ControlQuery::Item(id) => {
                let hwnd = unsafe { GetDlgItem(parent, *id) };
                (hwnd.0 != 0).then(|| hwnd)
            }
            ControlQuery::Class { name, index } => find_nth_by_class(parent, name, *index),
            ControlQuery::Titled { class, title } => {
                let hwnd = unsafe { FindWindowExW(parent, HWND::default(), *class, *title) };
                (hwnd.0 != 0).then(|| hwnd)
            }
        };
        Ok(found.map(|hwnd| WindowHandle::from_raw(hwnd.0)))
    }

    fn read_text(&self, control: WindowHandle) -> Result<String> {
        let hwnd = self.live_control(control)?;
        let len = unsafe { SendMessageW(hwnd, WM_GETTEXTLENGTH, WPARAM(0), LPARAM(0)) }.0;
        let mut buf = vec![0u16; len.max(0) as usize + 1];
        let copied = unsafe {
            SendMessageW(
                hwnd,
                WM_GETTEXT,
                WPARAM(buf.len()),
                LPARAM(buf.as_mut_ptr() as isize),
            )
        }
        .0;
        Ok(String::from_utf16_lossy(&buf[..copied.max(0) as usize]))
    }

    fn set_text(&self, control: WindowHandle, text: &str) -> Result<()> {
        let hwnd = self.live_control(control)?;
        let wide = to_wide(text);
        let accepted =
            unsafe { SendMessageW(hwnd, WM_SETTEXT, WPARAM(0), LPARAM(wide.as_ptr() as isize)) };
        if accepted.0 == 0 {
            return Err(AutomationError::ControlUnavailable);
        }
        Ok(())
    }

    fn invoke(&self, control: WindowHandle) -> Result<()> {
        let hwnd = self.live_control(control)?;
        unsafe {
            SendMessageW(hwnd, BM_CLICK, WPARAM(0), LPARAM(0));
        }
        Ok(())
    }

    fn is_window(&self, handle: WindowHandle) -> bool {
        unsafe { IsWindow(HWND(handle.as_raw())) }.as_bool()
    }

    fn window_process(&self, handle: WindowHandle) -> Result<u32> {
        let hwnd = self.live_control(handle)?;
        let mut pid = 0u32;
        let thread = unsafe { GetWindowThreadProcessId(hwnd, &mut pid) };
        if thread == 0 {
            return Err(AutomationError::ControlUnavailable);
        }
        Ok(pid)
    }

    fn process_exists(&self, pid: u32) -> bool {
        self.procs.lock().refresh_process(Pid::from_u32(pid))
    }
}

unsafe extern "system" fn collect_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let rows = &mut *(lparam.0 as *mut Vec<WindowInfo>);
    if IsWindowVisible(hwnd).as_bool() {
        let mut pid = 0u32;
        GetWindowThreadProcessId(hwnd, &mut pid);
        rows.push(WindowInfo {
            handle: WindowHandle::from_raw(hwnd.0),
            title: read_window_text(hwnd),
            class_name: read_class_name(hwnd),
            pid,
        });
    }
    BOOL::from(true)
}

fn read_window_text(hwnd: HWND) -> String {
    let mut buf = [0u16; 512];
    let len = unsafe { GetWindowTextW(hwnd, PWSTR(buf.as_mut_ptr()), buf.len() as i32) };
    String::from_utf16_lossy(&buf[..len.max(0) as usize])
}

fn read_class_name(hwnd: HWND) -> String {
    let mut buf = [0u16; 256];
    let len = unsafe { GetClassNameW(hwnd, PWSTR(buf.as_mut_ptr()), buf.len() as i32) };
    String::from_utf16_lossy(&buf[..len.max(0) as usize])
}

fn find_nth_by_class(parent: HWND, class: &str, index: usize) -> Option<HWND> {
    let mut child = HWND::default();
    for _ in 0..=index {
        child = unsafe { FindWindowExW(parent, child, class, opt_str_param::<&str>(None)) };
        if child.0 == 0 {
            return None;
        }
    }
    Some(child)
}

fn to_wide(s: &str) -> Vec<u16> {
    OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
}

fn opt_str_param<'p, S: AsRef<str>>(opt: Option<S>) -> Param<'p, PWSTR> {
    match opt {
        Some(s) => s.as_ref().into_param(),
        None => Param::None,
    }
}

//! Low-level primitives for finding windows and driving their controls.
//!
//! Everything above this module talks to the desktop exclusively through the
//! [`WindowLocator`] trait. The production implementation
//! ([`win32::Win32Locator`], Windows only) drives real windows through the
//! Win32 message API; tests substitute an in-memory implementation.

use std::fmt;

use crate::Result;

#[cfg(windows)]
#[cfg_attr(docsrs, doc(cfg(windows)))]
pub mod win32;

/// An opaque handle to a top-level window or a child control.
///
/// A handle is only meaningful for as long as the window behind it exists.
/// The operating system recycles handle values after a window is destroyed,
/// so holders must re-validate before reuse rather than trust an old value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(isize);

impl WindowHandle {
    /// Wraps a raw platform window handle value.
    pub fn from_raw(raw: isize) -> Self {
        Self(raw)
    }

    /// Returns the raw platform value of this handle.
    pub fn as_raw(self) -> isize {
        self.0
    }
}

/// One row of a top-level window enumeration snapshot.
#[derive(Debug, Clone)]
pub struct WindowInfo {
    /// Handle of the enumerated window.
    pub handle: WindowHandle,
    /// Window title at enumeration time.
    pub title: String,
    /// Window class name.
    pub class_name: String,
    /// Identifier of the process that owns the window.
    pub pid: u32,
}

/// Addresses a child control within a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlQuery {
    /// A control with the given dialog-item identifier.
    Item(i32),
    /// The `index`-th child, in enumeration order, with the given window
    /// class.
    Class {
        /// Window class name of the control.
        name: &'static str,
        /// Zero-based position among siblings of that class.
        index: usize,
    },
    /// A child with the given window class and exact title.
    Titled {
        /// Window class name of the control.
        class: &'static str,
        /// Exact title of the control.
        title: &'static str,
    },
}

impl fmt::Display for ControlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item(id) => write!(f, "item #{}", id),
            Self::Class { name, index } => write!(f, "{}[{}]", name, index),
            Self::Titled { class, title } => write!(f, "{} \"{}\"", class, title),
        }
    }
}

/// The seam between the automation engine and the desktop it drives.
///
/// Implementations are expected to re-query the operating system on every
/// call; none of these operations may serve cached answers. A control that
/// has not been rendered yet is reported as `Ok(None)` by [`find_child`]
/// rather than as an error, since callers retry such lookups within a
/// bounded window.
///
/// [`find_child`]: WindowLocator::find_child
pub trait WindowLocator {
    /// Produces a finite, restartable snapshot of the currently open
    /// top-level windows. No ordering guarantee beyond platform enumeration
    /// order.
    fn top_level_windows(&self) -> Result<Vec<WindowInfo>>;

    /// Locates a child control under `parent`, returning `None` when no such
    /// control currently exists.
    fn find_child(&self, parent: WindowHandle, query: &ControlQuery) -> Result<Option<WindowHandle>>;

    /// Reads the current text of a control.
    fn read_text(&self, control: WindowHandle) -> Result<String>;

    /// Replaces the text of a control.
    fn set_text(&self, control: WindowHandle, text: &str) -> Result<()>;

    /// Presses a button control.
    fn invoke(&self, control: WindowHandle) -> Result<()>;

    /// Whether the handle still refers to a live window.
    fn is_window(&self, handle: WindowHandle) -> bool;

    /// Identifier of the process owning the window behind `handle`.
    fn window_process(&self, handle: WindowHandle) -> Result<u32>;

    /// Re-checks the operating-system process table for `pid`.
    fn process_exists(&self, pid: u32) -> bool;
}

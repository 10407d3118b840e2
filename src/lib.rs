#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A window-automation driver for voice-synthesis desktop applications.
//!
//! # Features
//!
//! This crate treats an externally running, UI-driven voice-synthesis
//! application as a controllable black box. It discovers running instances
//! of the supported application variants, writes talk text into them,
//! triggers synthesis, drives the save/export sequence, and confirms the
//! exported audio file through the file system. It performs no speech
//! synthesis of its own.
//!
//! Discovery starts at [`factory::ProcessFactory`]: each call to
//! [`discover`](factory::ProcessFactory::discover) takes a fresh snapshot of
//! the desktop and returns a [`synth::SynthesisController`] per recognized
//! instance. A controller exposes the full caller API for one instance:
//! liveness, window title, talk text, and save.
//!
//! Driving a save is an explicit state machine. Every wait point, from "the
//! control has not been rendered yet" to "the exported file is still
//! growing", is a bounded sleep-and-recheck loop, so no operation can hang
//! indefinitely and every failure is reported as a typed
//! [`AutomationError`]. Operations against the same external process are
//! serialized; distinct processes can be driven independently.
//!
//! # Thread Affinity
//!
//! Window handles are thread-affine: all automation calls that touch a given
//! window must come from one thread. The [`agent`] module packages that rule
//! up as a dedicated automation thread with a command queue; callers on any
//! thread talk to an [`agent::AgentHandle`] (or, with the `tokio-agent`
//! feature, an `AsyncAgentHandle` from the `tokio` module) and never touch
//! a window handle themselves. Code that opts out of the agent and drives controllers
//! directly takes on the affinity obligation itself.
//!
//! On Windows the automation subsystem also needs per-thread initialization.
//! [`AutomationScope`] ties that to a value's lifetime: acquire one at the
//! start of a thread that performs automation, keep it alive while working,
//! and the subsystem is released when it drops.

pub mod agent;
mod error;
pub mod factory;
pub mod locator;
pub mod process;
pub mod synth;
pub mod variant;

#[cfg(feature = "tokio-agent")]
#[cfg_attr(docsrs, doc(cfg(feature = "tokio-agent")))]
pub mod tokio;

pub use error::AutomationError;

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, AutomationError>;

/// Scoped acquisition of the platform automation subsystem.
///
/// On Windows this initializes a COM apartment on the current thread and
/// releases it when the scope drops. On other platforms it is a no-op kept
/// for API symmetry. Acquire one scope per automation thread, before any
/// other call from this crate, and keep it alive for the thread's lifetime.
pub struct AutomationScope(());

impl AutomationScope {
    /// Initializes the automation subsystem on the current thread.
    pub fn acquire() -> Result<AutomationScope> {
        platform_init()?;
        Ok(AutomationScope(()))
    }
}

impl Drop for AutomationScope {
    fn drop(&mut self) {
        platform_release();
    }
}

#[cfg(windows)]
pub(crate) fn platform_init() -> Result<()> {
    use std::ptr::null;

    use windows::Win32::System::Com::CoInitialize;

    unsafe { CoInitialize(null()) }.map_err(|err| AutomationError::Platform(err.to_string()))
}

#[cfg(windows)]
pub(crate) fn platform_release() {
    use windows::Win32::System::Com::CoUninitialize;

    unsafe { CoUninitialize() }
}

#[cfg(not(windows))]
pub(crate) fn platform_init() -> Result<()> {
    Ok(())
}

#[cfg(not(windows))]
pub(crate) fn platform_release() {}

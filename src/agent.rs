//! The single-owner automation thread.
//!
//! Window automation is thread-affine on every platform this crate targets:
//! all calls that touch a given external window must be issued from one
//! thread. The agent enforces that by moving the locator, the factory and
//! every controller onto one spawned thread; callers on any thread submit
//! commands through a queue and block on a bounded reply channel.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::factory::ProcessFactory;
use crate::locator::WindowLocator;
use crate::synth::{CancelToken, PollPolicy, SaveRequest, SynthesisController, SynthesisResult};
use crate::variant::Variant;
use crate::{AutomationError, Result};

/// Identity of a discovered instance, as reported across the agent boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredProcess {
    /// Operating-system process identifier.
    pub pid: u32,
    /// Detected product variant.
    pub variant: Variant,
    /// Main window title at discovery time.
    pub title: String,
}

enum Command {
    Discover(SyncSender<Result<Vec<DiscoveredProcess>>>),
    IsRunning(u32, SyncSender<bool>),
    WindowTitle(u32, SyncSender<Result<String>>),
    SetTalkText(u32, String, SyncSender<Result<()>>),
    Save(u32, SaveRequest, CancelToken, SyncSender<SynthesisResult>),
    Shutdown,
}

/// Owns the automation thread. Dropping the agent shuts the thread down and
/// waits for it to finish.
pub struct Agent {
    tx: Sender<Command>,
    thread: Option<JoinHandle<()>>,
}

impl Agent {
    /// Spawns the automation thread. The locator moves onto that thread and
    /// never leaves it.
    pub fn spawn<L>(locator: L, policy: PollPolicy) -> (Agent, AgentHandle)
    where
        L: WindowLocator + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let thread = thread::spawn(move || run(ProcessFactory::with_policy(locator, policy), rx));
        let handle = AgentHandle { tx: tx.clone() };
        (
            Agent {
                tx,
                thread: Some(thread),
            },
            handle,
        )
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Cloneable handle for submitting commands to an [`Agent`].
///
/// Every method blocks the calling thread until the automation thread has
/// processed the command. Commands from all handles are served in arrival
/// order, one at a time.
#[derive(Clone)]
pub struct AgentHandle {
    tx: Sender<Command>,
}

impl AgentHandle {
    /// Re-scans for running instances, replacing the agent's routing table
    /// with the fresh snapshot.
    pub fn discover(&self) -> Result<Vec<DiscoveredProcess>> {
        self.request(Command::Discover)?
    }

    /// Re-checks whether the instance is still alive. Unknown pids report
    /// `false`.
    pub fn is_running(&self, pid: u32) -> Result<bool> {
        self.request(|reply| Command::IsRunning(pid, reply))
    }

    /// Reads the instance's current main-window title.
    pub fn window_title(&self, pid: u32) -> Result<String> {
        self.request(|reply| Command::WindowTitle(pid, reply))?
    }

    /// Sets the talk text on the instance.
    pub fn set_talk_text(&self, pid: u32, text: &str) -> Result<()> {
        self.request(|reply| Command::SetTalkText(pid, text.to_owned(), reply))?
    }

    /// Triggers synthesis and export on the instance.
    pub fn save(&self, pid: u32, request: SaveRequest) -> Result<SynthesisResult> {
        self.save_with_cancel(pid, request, CancelToken::new())
    }

    /// Like [`save`](Self::save); trip the token from any thread to cancel
    /// the in-flight operation.
    pub fn save_with_cancel(
        &self,
        pid: u32,
        request: SaveRequest,
        cancel: CancelToken,
    ) -> Result<SynthesisResult> {
        self.request(|reply| Command::Save(pid, request, cancel, reply))
    }

    fn request<T, F: FnOnce(SyncSender<T>) -> Command>(&self, make: F) -> Result<T> {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        self.tx
            .send(make(reply_tx))
            .map_err(|_| AutomationError::AgentGone)?;
        reply_rx.recv().map_err(|_| AutomationError::AgentGone)
    }
}

fn run<L: WindowLocator>(factory: ProcessFactory<L>, rx: Receiver<Command>) {
    let mut controllers: HashMap<u32, SynthesisController<L>> = HashMap::new();
    while let Ok(command) = rx.recv() {
        match command {
            Command::Discover(reply) => {
                let outcome = factory.discover().map(|found| {
                    controllers = found
                        .into_iter()
                        .map(|controller| (controller.target().pid(), controller))
                        .collect();
                    controllers.values().map(describe).collect()
                });
                let _ = reply.send(outcome);
            }
            Command::IsRunning(pid, reply) => {
                let alive = controllers
                    .get(&pid)
                    .map_or(false, |controller| controller.is_running());
                let _ = reply.send(alive);
            }
            Command::WindowTitle(pid, reply) => {
                let outcome =
                    routed(&controllers, pid).and_then(|controller| controller.window_title());
                let _ = reply.send(outcome);
            }
            Command::SetTalkText(pid, text, reply) => {
                let outcome =
                    routed(&controllers, pid).and_then(|controller| controller.set_talk_text(&text));
                let _ = reply.send(outcome);
            }
            Command::Save(pid, request, cancel, reply) => {
                let outcome = match routed(&controllers, pid) {
                    Ok(controller) => controller.save_with_cancel(&request, &cancel),
                    Err(err) => SynthesisResult::Failed(err),
                };
                let _ = reply.send(outcome);
            }
            Command::Shutdown => break,
        }
    }
    debug!("automation thread stopped");
}

fn routed<L: WindowLocator>(
    controllers: &HashMap<u32, SynthesisController<L>>,
    pid: u32,
) -> Result<&SynthesisController<L>> {
    controllers
        .get(&pid)
        .ok_or(AutomationError::ProcessNotRunning { pid })
}

fn describe<L: WindowLocator>(controller: &SynthesisController<L>) -> DiscoveredProcess {
    let target = controller.target();
    DiscoveredProcess {
        pid: target.pid(),
        variant: target.variant(),
        title: target.title().to_owned(),
    }
}

use tokio::task::spawn_blocking;

use crate::agent::{AgentHandle, DiscoveredProcess};
use crate::synth::{CancelToken, SaveRequest, SynthesisResult};
use crate::{AutomationError, Result};

#[cfg_attr(docsrs, doc(cfg(feature = "tokio-agent")))]
/// An async wrapper around [`AgentHandle`].
///
/// Each method submits the command from a blocking task, so the calling
/// async runtime is never stalled by a long poll loop on the automation
/// thread.
#[derive(Clone)]
pub struct AsyncAgentHandle {
    inner: AgentHandle,
}

impl AsyncAgentHandle {
    /// Wraps a blocking agent handle.
    pub fn new(inner: AgentHandle) -> Self {
        Self { inner }
    }

    /// See [`AgentHandle::discover`].
    pub async fn discover(&self) -> Result<Vec<DiscoveredProcess>> {
        let inner = self.inner.clone();
        Self::run(spawn_blocking(move || inner.discover())).await
    }

    /// See [`AgentHandle::is_running`].
    pub async fn is_running(&self, pid: u32) -> Result<bool> {
        let inner = self.inner.clone();
        Self::run(spawn_blocking(move || inner.is_running(pid))).await
    }

    /// See [`AgentHandle::window_title`].
    pub async fn window_title(&self, pid: u32) -> Result<String> {
        let inner = self.inner.clone();
        Self::run(spawn_blocking(move || inner.window_title(pid))).await
    }

    /// See [`AgentHandle::set_talk_text`].
    pub async fn set_talk_text(&self, pid: u32, text: String) -> Result<()> {
        let inner = self.inner.clone();
        Self::run(spawn_blocking(move || inner.set_talk_text(pid, &text))).await
    }

    /// See [`AgentHandle::save`].
    pub async fn save(&self, pid: u32, request: SaveRequest) -> Result<SynthesisResult> {
        self.save_with_cancel(pid, request, CancelToken::new()).await
    }

    /// See [`AgentHandle::save_with_cancel`].
    pub async fn save_with_cancel(
        &self,
        pid: u32,
        request: SaveRequest,
        cancel: CancelToken,
    ) -> Result<SynthesisResult> {
        let inner = self.inner.clone();
        Self::run(spawn_blocking(move || {
            inner.save_with_cancel(pid, request, cancel)
        }))
        .await
    }

    async fn run<T>(task: tokio::task::JoinHandle<Result<T>>) -> Result<T> {
        task.await.map_err(|_| AutomationError::AgentGone)?
    }
}

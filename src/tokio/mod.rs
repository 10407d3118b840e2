//! Asynchronous access to the automation agent for tokio-based callers.

mod agent;
mod rt;

pub use agent::AsyncAgentHandle;
pub use rt::BuilderExt;

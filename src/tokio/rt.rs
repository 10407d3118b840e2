#[cfg_attr(docsrs, doc(cfg(feature = "tokio-agent")))]
/// Runtime-builder hooks for the platform automation subsystem.
///
/// Useful when automation calls run on the runtime's own blocking threads
/// rather than through an agent: each worker then needs the same per-thread
/// setup that [`AutomationScope`](crate::AutomationScope) provides, tied to
/// the thread's lifetime instead of a value's.
///
/// This trait is [sealed](https://rust-lang.github.io/api-guidelines/future-proofing.html).
pub trait BuilderExt: private::Sealed {
    /// Registers thread start/stop hooks on the builder so every thread the
    /// runtime spawns acquires the automation subsystem before running tasks
    /// and releases it on the way out.
    fn enable_automation(&mut self) -> &mut Self;
}

impl BuilderExt for tokio::runtime::Builder {
    fn enable_automation(&mut self) -> &mut Self {
        self.on_thread_start(|| {
            let _ = crate::platform_init();
        })
        .on_thread_stop(crate::platform_release)
    }
}

mod private {
    pub trait Sealed {}
    impl Sealed for tokio::runtime::Builder {}
}

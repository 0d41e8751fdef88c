//! Optional UI feedback hooks.
//!
//! The manager takes an `Option<Arc<dyn Presenter>>`; with `None` it runs
//! silently apart from tracing output.

pub trait Presenter: Send + Sync {
    /// Long-running step, e.g. "Sending reminder 2 of 5...".
    fn progress(&self, _message: &str) {}
    fn success(&self, _message: &str) {}
    fn warning(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

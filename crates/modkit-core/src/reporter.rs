//! Progress reporting for dependency injection
//!
//! Transfers and extraction report through a [`ProgressSink`] passed in by
//! the caller instead of a process-wide global. The CLI renders events to
//! the terminal, tests record them.

use modkit_schema::ProgressEvent;

/// Receiver of `(fraction, label)` updates.
///
/// Implementations only need to keep the latest event; calls are fire and
/// forget and must not fail.
pub trait ProgressSink: Send + Sync {
    /// Deliver a progress update.
    fn update(&self, event: ProgressEvent);

    /// Shorthand for building and delivering an event.
    fn report(&self, fraction: f64, label: &str) {
        self.update(ProgressEvent::new(fraction, label));
    }
}

impl<T: ProgressSink + ?Sized> ProgressSink for std::sync::Arc<T> {
    fn update(&self, event: ProgressEvent) {
        (**self).update(event);
    }
}

impl<T: ProgressSink + ?Sized> ProgressSink for &T {
    fn update(&self, event: ProgressEvent) {
        (**self).update(event);
    }
}

/// A no-op sink for silent operations (e.g., probing, testing).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn update(&self, _: ProgressEvent) {}
}

/// Maps a sub-step's `[0, 1]` progress into a slice of the parent's range.
///
/// The install pipeline gives the download `[0, 0.97]` and keeps the rest
/// for verification and extraction.
#[derive(Debug)]
pub struct Scaled<'a, S: ProgressSink + ?Sized> {
    inner: &'a S,
    start: f64,
    span: f64,
}

impl<'a, S: ProgressSink + ?Sized> Scaled<'a, S> {
    /// Report into `[start, start + span]` of `inner`.
    pub fn new(inner: &'a S, start: f64, span: f64) -> Self {
        Self { inner, start, span }
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for Scaled<'_, S> {
    fn update(&self, event: ProgressEvent) {
        self.inner.update(ProgressEvent::new(
            self.start + event.fraction * self.span,
            event.label,
        ));
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingProgress;
    use super::*;

    #[test]
    fn test_scaled_maps_into_range() {
        let rec = RecordingProgress::default();
        let scaled = Scaled::new(&rec, 0.0, 0.5);
        scaled.report(1.0, "half");
        scaled.report(0.5, "quarter");

        assert_eq!(rec.fractions(), vec![0.5, 0.25]);
        assert_eq!(rec.events()[0].label, "half");
    }

    #[test]
    fn test_null_progress_is_silent() {
        NullProgress.report(0.3, "ignored");
    }
}

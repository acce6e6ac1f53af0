//! Progress events emitted during a run.
//!
//! Percentages are non-decreasing and reach 100 only once the stitched
//! artifact exists.

use crossbeam_channel::Sender;

/// What the pipeline is doing when a progress event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    /// A chunk request is in flight.
    Generating { chunk: usize, total: usize },
    /// A chunk finished generating.
    Generated { chunk: usize, total: usize },
    Stitching,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub percent: u8,
    pub stage: ProgressStage,
}

/// Consumer of progress events.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

impl<F> ProgressReporter for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        self(event)
    }
}

impl ProgressReporter for Sender<ProgressEvent> {
    fn report(&self, event: ProgressEvent) {
        // A dropped receiver only means nobody is listening anymore.
        if self.send(event).is_err() {
            tracing::trace!(percent = event.percent, "Progress receiver dropped");
        }
    }
}

/// Clamps reported values so the sequence never goes backwards.
pub(crate) struct ProgressTracker<'a> {
    reporter: Option<&'a dyn ProgressReporter>,
    last: u8,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(reporter: Option<&'a dyn ProgressReporter>) -> Self {
        Self { reporter, last: 0 }
    }

    pub(crate) fn emit(&mut self, percent: u8, stage: ProgressStage) {
        let percent = percent.min(100).max(self.last);
        self.last = percent;
        if let Some(reporter) = self.reporter {
            reporter.report(ProgressEvent { percent, stage });
        }
    }
}

/// Early tick while chunk `index` (zero-based) of `total` is in flight.
pub fn early_tick(index: usize, total: usize, cap: u8) -> u8 {
    scaled(index + 1, total, cap).min(cap)
}

/// Cumulative tick once `done` of `total` chunks are generated.
pub fn completion_tick(done: usize, total: usize, ceiling: u8) -> u8 {
    scaled(done, total, ceiling)
}

fn scaled(part: usize, total: usize, scale: u8) -> u8 {
    if total == 0 {
        return scale;
    }
    let value = (part as f64 / total as f64 * f64::from(scale)).round();
    value.clamp(0.0, f64::from(scale)) as u8
}

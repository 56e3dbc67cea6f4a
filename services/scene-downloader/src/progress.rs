//! Throttled progress reporting for download phases.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

/// Snapshot handed to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub phase: &'static str,
}

pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Counts completions and calls back every `report_every` items and on the last one.
pub struct ProgressReporter {
    completed: AtomicUsize,
    total: usize,
    report_every: usize,
    phase: &'static str,
    /// Highest count handed to the callback so far
    reported: Mutex<usize>,
    callback: ProgressCallback,
}

impl ProgressReporter {
    pub fn new(
        phase: &'static str,
        total: usize,
        report_every: usize,
        callback: ProgressCallback,
    ) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            total,
            report_every: report_every.max(1),
            phase,
            reported: Mutex::new(0),
            callback,
        }
    }

    /// Reporter that logs through `tracing`.
    pub fn logging(phase: &'static str, total: usize, report_every: usize) -> Self {
        Self::new(
            phase,
            total,
            report_every,
            Arc::new(|p: Progress| {
                tracing::info!(
                    phase = p.phase,
                    completed = p.completed,
                    total = p.total,
                    "Progress"
                );
            }),
        )
    }

    /// Record one finished item.
    pub fn item_done(&self) {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        if completed % self.report_every != 0 && completed != self.total {
            return;
        }

        // Completions can race past each other; never report a smaller count.
        let mut reported = match self.reported.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if completed <= *reported {
            return;
        }
        *reported = completed;

        (self.callback)(Progress {
            completed,
            total: self.total,
            phase: self.phase,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(total: usize, every: usize) -> (ProgressReporter, Arc<Mutex<Vec<usize>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = ProgressReporter::new(
            "mask",
            total,
            every,
            Arc::new(move |p: Progress| sink.lock().unwrap().push(p.completed)),
        );
        (reporter, seen)
    }

    #[test]
    fn test_reports_every_n_and_last() {
        let (reporter, seen) = recording(12, 5);
        for _ in 0..12 {
            reporter.item_done();
        }
        assert_eq!(*seen.lock().unwrap(), vec![5, 10, 12]);
    }

    #[test]
    fn test_zero_interval_reports_every_item() {
        let (reporter, seen) = recording(3, 0);
        for _ in 0..3 {
            reporter.item_done();
        }
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_monotonic_across_threads() {
        let (reporter, seen) = recording(400, 3);
        let reporter = Arc::new(reporter);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reporter = reporter.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        reporter.item_done();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.last(), Some(&400));
    }
}

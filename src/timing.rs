//! Call-timing collaborator: per-label wall-time aggregation.
//!
//! This is the external collaborator the registry composes with but never
//! depends on: a wrapped callable records its duration under a string
//! label, and the report aggregates per-label statistics sorted by total
//! elapsed time, heaviest first. Wrapping is explicit: callers decorate
//! the callables they care about; nothing is rewritten at runtime.

use fnv::FnvHashMap;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Aggregated timing statistics for one label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerStats {
    /// Number of recorded invocations
    pub count: u64,
    /// Total wall time across all invocations
    pub total: Duration,
    /// Shortest single invocation
    pub min: Duration,
    /// Longest single invocation
    pub max: Duration,
}

impl TimerStats {
    fn record(&mut self, elapsed: Duration) {
        self.min = if self.count == 0 {
            elapsed
        } else {
            self.min.min(elapsed)
        };
        self.max = self.max.max(elapsed);
        self.count += 1;
        self.total += elapsed;
    }

    /// Mean wall time per invocation
    pub fn mean(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total / self.count as u32
        }
    }
}

/// One row of a timing report
#[derive(Debug, Clone)]
pub struct TimerReport {
    pub label: String,
    pub stats: TimerStats,
}

/// Thread-safe collection of per-label call timers.
///
/// # Example
///
/// ```
/// use multiton::CallTimers;
/// use std::sync::Arc;
///
/// let timers = Arc::new(CallTimers::new());
/// let tick = timers.wrap("tick", || 42);
/// assert_eq!(tick(), 42);
/// assert_eq!(tick(), 42);
///
/// let report = timers.report();
/// assert_eq!(report[0].label, "tick");
/// assert_eq!(report[0].stats.count, 2);
/// ```
#[derive(Debug, Default)]
pub struct CallTimers {
    timers: Mutex<FnvHashMap<String, TimerStats>>,
}

impl CallTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` once, recording its wall time under `label`
    pub fn measure<R>(&self, label: &str, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let result = f();
        self.record(label, start.elapsed());
        result
    }

    /// Record one invocation of `label` with a known duration
    pub fn record(&self, label: &str, elapsed: Duration) {
        let mut timers = self.lock_timers();
        match timers.get_mut(label) {
            Some(stats) => stats.record(elapsed),
            None => {
                let mut stats = TimerStats::default();
                stats.record(elapsed);
                timers.insert(label.to_string(), stats);
            }
        }
    }

    /// Wrap a callable so every invocation is recorded under `label`.
    ///
    /// The wrapper borrows this timer set; it is `Send + Sync` when the
    /// wrapped callable is, so wrapped constructors may race across
    /// threads that share the set.
    pub fn wrap<'a, R>(
        &'a self,
        label: impl Into<String>,
        f: impl Fn() -> R + 'a,
    ) -> impl Fn() -> R + 'a {
        let label = label.into();
        move || self.measure(&label, &f)
    }

    /// Per-label statistics, sorted by total elapsed time descending.
    ///
    /// Ties break on the label so the ordering is deterministic.
    pub fn report(&self) -> Vec<TimerReport> {
        let timers = self.lock_timers();
        let mut rows: Vec<TimerReport> = timers
            .iter()
            .map(|(label, stats)| TimerReport {
                label: label.clone(),
                stats: stats.clone(),
            })
            .collect();
        rows.sort_by(|a, b| {
            b.stats
                .total
                .cmp(&a.stats.total)
                .then_with(|| a.label.cmp(&b.label))
        });
        rows
    }

    /// Write the report as an aligned table, heaviest label first
    pub fn render(&self, out: &mut impl Write) -> io::Result<()> {
        let rows = self.report();
        if rows.is_empty() {
            writeln!(out, "no timers recorded")?;
            return Ok(());
        }

        writeln!(out, "{:>12} {:>9} {:>12} {}", "seconds", "calls", "usecs/call", "label")?;
        writeln!(out, "{:->12} {:->9} {:->12} {:-<24}", "", "", "", "")?;
        for row in &rows {
            writeln!(
                out,
                "{:>12.6} {:>9} {:>12} {}",
                row.stats.total.as_secs_f64(),
                row.stats.count,
                row.stats.mean().as_micros(),
                row.label
            )?;
        }
        Ok(())
    }

    /// Forget all recorded timings
    pub fn reset(&self) {
        self.lock_timers().clear();
    }

    fn lock_timers(&self) -> MutexGuard<'_, FnvHashMap<String, TimerStats>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

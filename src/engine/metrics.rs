//! Evaluation run metrics.
//!
//! Every snapshot carries the timings of the run that built it. They are cheap
//! to collect (a handful of `Instant::now` calls and counters) and the CLI
//! prints them at the end of its report.

use std::time::Duration;

#[derive(Debug, Default, Clone)]
pub struct EvaluationMetrics {
    /// Total elapsed time for the run.
    pub total: Duration,
    /// Property pass, including import resolution.
    pub properties: PassMetrics,
    pub items: PassMetrics,
    pub targets: PassMetrics,
    /// Import sites resolved, duplicates included.
    pub imports: usize,
    /// Distinct documents fetched through the loader.
    pub documents_loaded: usize,
    /// Include/Exclude/Remove/Update lists that needed a directory walk.
    pub glob_expansions: usize,
}

/// Timing and output count for a single pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassMetrics {
    pub duration: Duration,
    /// Properties, items or targets in the pass result.
    pub produced: usize,
}

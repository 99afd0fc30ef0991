/// How a NULL-sentinel loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The pending query came back empty.
    Completed,
    /// Pending rows remain but recent batches made no progress.
    Stalled,
}

/// Stall detection for the resumable NULL-sentinel loops.
///
/// Tracks the run's processed-row counter (never decreasing) and counts how
/// many completed iterations in a row left it unchanged. Any progress resets
/// the count.
#[derive(Debug, Clone)]
pub struct ProgressGuard {
    max_stalled: u32,
    processed: u64,
    stalled: u32,
}

impl ProgressGuard {
    pub fn new(max_stalled: u32) -> Self {
        Self {
            max_stalled: max_stalled.max(1),
            processed: 0,
            stalled: 0,
        }
    }

    /// Record the counter at the end of an iteration.
    pub fn record(&mut self, processed_total: u64) {
        if processed_total > self.processed {
            self.processed = processed_total;
            self.stalled = 0;
        } else {
            self.stalled += 1;
        }
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled >= self.max_stalled
    }

    pub fn stalled_iterations(&self) -> u32 {
        self.stalled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_idle_iteration_stalls_by_default() {
        let mut g = ProgressGuard::new(1);
        assert!(!g.is_stalled());
        g.record(0);
        assert!(g.is_stalled());
    }

    #[test]
    fn progress_resets_the_count() {
        let mut g = ProgressGuard::new(3);
        g.record(10);
        g.record(10);
        g.record(10);
        assert_eq!(g.stalled_iterations(), 2);
        assert!(!g.is_stalled());
        g.record(11);
        assert_eq!(g.stalled_iterations(), 0);
        g.record(11);
        g.record(11);
        g.record(11);
        assert!(g.is_stalled());
        // a lower total never counts as progress
        g.record(12);
        g.record(5);
        assert_eq!(g.stalled_iterations(), 1);
    }

    #[test]
    fn zero_budget_is_treated_as_one() {
        let mut g = ProgressGuard::new(0);
        assert!(!g.is_stalled());
        g.record(0);
        assert!(g.is_stalled());
    }
}

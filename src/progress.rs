//! Progress observation for long-running loads and stores
//!
//! The readers and writers never print. They report to a [`Progress`]
//! observer at fixed checkpoints and the caller decides what to do with it.

/// Operation being observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Load,
    Store,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::Load => "Loading",
            Operation::Store => "Storing",
        }
    }
}

/// Number of checkpoints reported over one operation
pub const CHECKPOINTS: usize = 1000;

/// Observer invoked by the bulk loader and the streaming writer
pub trait Progress {
    fn begin(&mut self, _op: Operation, _total: usize) {}

    /// Called every `total / CHECKPOINTS` records (only when `total > CHECKPOINTS`)
    fn advance(&mut self, _op: Operation, _done: usize, _total: usize) {}

    fn finish(&mut self, _op: Operation, _done: usize) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {}

/// Observer that forwards checkpoints to `tracing`
#[derive(Debug, Clone)]
pub struct LogProgress {
    label: String,
}

impl LogProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl Progress for LogProgress {
    fn begin(&mut self, op: Operation, total: usize) {
        tracing::info!("[{}] {} {} records", self.label, op.name(), total);
    }

    fn advance(&mut self, op: Operation, done: usize, total: usize) {
        tracing::debug!(
            "[{}] {}... ({:4.2} %)",
            self.label,
            op.name(),
            done as f64 * 100.0 / total as f64
        );
    }

    fn finish(&mut self, op: Operation, done: usize) {
        tracing::info!("[{}] {} completed ({} records)", self.label, op.name(), done);
    }
}

/// Checkpoint schedule for one operation
#[derive(Debug, Clone, Copy)]
pub(crate) struct Ticker {
    interval: usize,
}

impl Ticker {
    pub(crate) fn new(total: usize) -> Self {
        let interval = if total > CHECKPOINTS { total / CHECKPOINTS } else { 0 };
        Self { interval }
    }

    /// True when record `i` is a checkpoint
    #[inline]
    pub(crate) fn hit(&self, i: usize) -> bool {
        self.interval != 0 && i % self.interval == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counting {
        advances: usize,
    }

    impl Progress for Counting {
        fn advance(&mut self, _op: Operation, _done: usize, _total: usize) {
            self.advances += 1;
        }
    }

    #[test]
    fn test_ticker_small_total_is_silent() {
        let ticker = Ticker::new(CHECKPOINTS);
        assert!((0..CHECKPOINTS).all(|i| !ticker.hit(i)));
    }

    #[test]
    fn test_ticker_hits_every_interval() {
        let total = 10_000;
        let ticker = Ticker::new(total);
        let mut observer = Counting::default();
        for i in 0..total {
            if ticker.hit(i) {
                observer.advance(Operation::Load, i, total);
            }
        }
        assert_eq!(observer.advances, CHECKPOINTS);
    }
}

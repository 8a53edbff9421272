use std::fmt;
use std::time::Duration;

/// The strategies the driver times, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Offload,
    RowTasks,
    Sequential,
}

impl Strategy {
    /// Fixed report label.
    pub fn label(self) -> &'static str {
        match self {
            Strategy::Offload => "GPU (TornadoVM)",
            Strategy::RowTasks => "CPU Virtual Threads",
            Strategy::Sequential => "CPU sequencial",
        }
    }
}

/// Wall-clock time of one strategy run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub strategy: Strategy,
    pub elapsed: Duration,
}

impl Timing {
    /// Elapsed time in milliseconds with sub-millisecond precision.
    pub fn millis(&self) -> f64 {
        self.elapsed.as_nanos() as f64 / 1_000_000.0
    }
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ms", self.strategy.label(), self.millis())
    }
}

/// Result of a complete benchmark run.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// One entry per strategy, in run order.
    pub timings: Vec<Timing>,
    /// Total offload plan executions, warm-up included.
    pub plan_executions: u64,
}

impl Report {
    pub fn timing(&self, strategy: Strategy) -> Option<&Timing> {
        self.timings.iter().find(|t| t.strategy == strategy)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for timing in &self.timings {
            writeln!(f, "{timing}")?;
        }
        Ok(())
    }
}

//! `mb-bench` - Benchmark driver for matbench.
//!
//! Times one run of each multiply strategy (GPU offload after warm-up, CPU
//! row tasks, CPU sequential) over shared N×N operands and reports the
//! elapsed milliseconds.

pub mod config;
pub mod driver;
pub mod error;
pub mod report;

pub use config::BenchConfig;
pub use driver::{Driver, Stage};
pub use error::{BenchError, Result};
pub use report::{Report, Strategy, Timing};

use std::fmt::Debug;

use crate::error::{MatrixError, Result};
use crate::matrix::Matrix;

/// Trait for pluggable multiply strategies (sequential, row tasks, GPU, etc.).
///
/// Every implementation computes C = A @ B for square row-major matrices,
/// accumulating each cell in f32 with `k` ascending, and fully overwrites `c`.
pub trait Multiplier: Send + Sync + Debug {
    /// Returns the name of this strategy (e.g., "sequential", "row-tasks").
    fn name(&self) -> &str;

    /// Matrix multiplication: c = a @ b.
    ///
    /// All three matrices must share the same side length.
    fn multiply(&self, a: &Matrix, b: &Matrix, c: &mut Matrix) -> Result<()>;
}

/// A compiled, reusable device plan bound to a fixed pair of inputs.
///
/// Executions leave the result on the device; the host copy of C only
/// changes when `copy_to_host` is called.
pub trait OffloadPlan {
    /// Run the kernel once over the bound inputs, blocking until it completes.
    fn execute(&mut self) -> Result<()>;

    /// Copy the device-side result into `c`.
    fn copy_to_host(&self, c: &mut Matrix) -> Result<()>;

    /// Number of completed executions since the plan was built.
    fn executions(&self) -> u64;
}

/// Checks that `a`, `b` and `c` share one side length and returns it.
pub(crate) fn check_operands(a: &Matrix, b: &Matrix, c: &Matrix) -> Result<usize> {
    let n = a.n();
    for other in [b, c] {
        if other.n() != n {
            return Err(MatrixError::DimensionMismatch {
                expected: n,
                got: other.n(),
            });
        }
    }
    Ok(n)
}

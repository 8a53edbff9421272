pub mod matmul;
pub mod rows;

pub use rows::RowTaskMultiplier;

use crate::backend::{check_operands, Multiplier};
use crate::error::Result;
use crate::matrix::Matrix;

/// Single-threaded CPU multiplier.
///
/// Textbook triple loop on the calling thread, no parallelism. Serves as the
/// reference result the other strategies are compared against.
#[derive(Debug, Clone)]
pub struct SequentialMultiplier;

impl SequentialMultiplier {
    pub fn new() -> Self {
        SequentialMultiplier
    }
}

impl Default for SequentialMultiplier {
    fn default() -> Self {
        Self::new()
    }
}

impl Multiplier for SequentialMultiplier {
    fn name(&self) -> &str {
        "sequential"
    }

    fn multiply(&self, a: &Matrix, b: &Matrix, c: &mut Matrix) -> Result<()> {
        let n = check_operands(a, b, c)?;
        let (a, b) = (a.as_slice(), b.as_slice());
        for (row, out) in c.rows_mut().enumerate() {
            matmul::row_into(a, b, n, row, out);
        }
        Ok(())
    }
}

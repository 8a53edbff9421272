use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use rayon::ThreadPoolBuilder;

use super::matmul;
use crate::backend::{check_operands, Multiplier};
use crate::error::{MatrixError, Result};
use crate::matrix::Matrix;

/// CPU multiplier that fans out one task per output row.
///
/// Each call builds its own rayon pool, spawns exactly N row tasks into a
/// scope and returns once the scope has joined all of them. Tasks own
/// disjoint rows of C, so no locking is needed. The pool is dropped when the
/// call returns, on success and on every error path.
#[derive(Debug, Clone, Default)]
pub struct RowTaskMultiplier {
    threads: Option<usize>,
}

impl RowTaskMultiplier {
    /// Use rayon's default worker count (one per logical CPU).
    pub fn new() -> Self {
        RowTaskMultiplier { threads: None }
    }

    /// Use a fixed number of workers. The number of tasks is still N.
    pub fn with_threads(threads: usize) -> Self {
        RowTaskMultiplier {
            threads: Some(threads),
        }
    }
}

impl Multiplier for RowTaskMultiplier {
    fn name(&self) -> &str {
        "row-tasks"
    }

    fn multiply(&self, a: &Matrix, b: &Matrix, c: &mut Matrix) -> Result<()> {
        let n = check_operands(a, b, c)?;

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.threads.unwrap_or(0))
            .thread_name(|i| format!("mb-row-{i}"))
            .build()
            .map_err(|e| MatrixError::SchedulerUnavailable(e.to_string()))?;

        let (a, b) = (a.as_slice(), b.as_slice());
        let rows = c.rows_mut();

        // The scope is the barrier: it returns only after every row task has
        // finished, and re-raises the first task panic once all are done.
        let joined = panic::catch_unwind(AssertUnwindSafe(|| {
            pool.scope(|scope| {
                for (row, out) in rows.enumerate() {
                    scope.spawn(move |_| matmul::row_into(a, b, n, row, out));
                }
            })
        }));

        joined.map_err(|payload| {
            let reason = panic_reason(payload.as_ref());
            log::error!("row task barrier interrupted: {reason}");
            MatrixError::WaitInterrupted(reason)
        })
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "row task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::SequentialMultiplier;
    use crate::matrix::Operands;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_matrix(n: usize, rng: &mut StdRng) -> Matrix {
        let data = (0..n * n).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
        Matrix::from_vec(n, data).unwrap()
    }

    #[test]
    fn test_matmul_basic() {
        let a = Matrix::from_vec(2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let b = Matrix::from_vec(2, vec![5.0, 6.0, 7.0, 8.0]).unwrap();
        let mut c = Matrix::zeros(2).unwrap();
        RowTaskMultiplier::new().multiply(&a, &b, &mut c).unwrap();
        assert_eq!(c.as_slice(), &[19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_single_element() {
        let a = Matrix::from_vec(1, vec![0.5]).unwrap();
        let b = Matrix::from_vec(1, vec![8.0]).unwrap();
        let mut c = Matrix::zeros(1).unwrap();
        RowTaskMultiplier::new().multiply(&a, &b, &mut c).unwrap();
        assert_eq!(c.as_slice(), &[4.0]);
    }

    #[test]
    fn test_constant_closed_form() {
        let mut ops = Operands::constant(64, 1.0, 2.0).unwrap();
        RowTaskMultiplier::with_threads(3)
            .multiply(&ops.a, &ops.b, &mut ops.c)
            .unwrap();
        assert!(ops.c.as_slice().iter().all(|&v| v == 128.0));
    }

    #[test]
    fn test_matches_sequential_bit_for_bit() {
        let mut rng = StdRng::seed_from_u64(42);
        for n in [1, 5, 31, 70] {
            let a = random_matrix(n, &mut rng);
            let b = random_matrix(n, &mut rng);

            let mut expected = Matrix::zeros(n).unwrap();
            SequentialMultiplier::new()
                .multiply(&a, &b, &mut expected)
                .unwrap();

            let mut got = Matrix::zeros(n).unwrap();
            RowTaskMultiplier::new().multiply(&a, &b, &mut got).unwrap();

            assert_eq!(got, expected, "n={n}");
        }
    }

    #[test]
    fn test_more_rows_than_workers() {
        let mut ops = Operands::constant(200, 1.0, 1.0).unwrap();
        RowTaskMultiplier::with_threads(2)
            .multiply(&ops.a, &ops.b, &mut ops.c)
            .unwrap();
        assert!(ops.c.as_slice().iter().all(|&v| v == 200.0));
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = Matrix::zeros(3).unwrap();
        let b = Matrix::zeros(3).unwrap();
        let mut c = Matrix::zeros(4).unwrap();
        let err = RowTaskMultiplier::new().multiply(&a, &b, &mut c).unwrap_err();
        assert!(matches!(err, MatrixError::DimensionMismatch { expected: 3, got: 4 }));
    }

    #[test]
    fn test_panic_reason() {
        let payload: Box<dyn Any + Send> = Box::new("row 3 exploded");
        assert_eq!(panic_reason(payload.as_ref()), "row 3 exploded");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_reason(payload.as_ref()), "owned message");

        let payload: Box<dyn Any + Send> = Box::new(7u32);
        assert_eq!(panic_reason(payload.as_ref()), "row task panicked");
    }
}

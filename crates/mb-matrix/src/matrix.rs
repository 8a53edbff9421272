use crate::error::{MatrixError, Result};

/// Fill value for the left-hand operand in the reference benchmark.
pub const A_FILL: f32 = 1.0;
/// Fill value for the right-hand operand in the reference benchmark.
pub const B_FILL: f32 = 2.0;

/// A square N×N matrix of f32 values stored contiguously in row-major order.
///
/// Element (r, c) lives at index `r * n + c`. The buffer length is always
/// exactly `n * n` and never changes after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    n: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// Create an N×N matrix with every element set to `value`.
    ///
    /// # Errors
    /// Returns `EmptyMatrix` for `n == 0` and `AllocationFailure` if the
    /// buffer cannot be reserved.
    pub fn filled(n: usize, value: f32) -> Result<Self> {
        let elements = element_count(n)?;
        let mut data = Vec::new();
        data.try_reserve_exact(elements)
            .map_err(|_| MatrixError::AllocationFailure { elements })?;
        data.resize(elements, value);
        Ok(Matrix { n, data })
    }

    /// Create a zero-filled N×N matrix.
    pub fn zeros(n: usize) -> Result<Self> {
        Self::filled(n, 0.0)
    }

    /// Wrap existing row-major data as an N×N matrix.
    ///
    /// # Errors
    /// Returns `LengthMismatch` if `data.len() != n * n`.
    pub fn from_vec(n: usize, data: Vec<f32>) -> Result<Self> {
        let expected = element_count(n)?;
        if data.len() != expected {
            return Err(MatrixError::LengthMismatch {
                expected,
                got: data.len(),
            });
        }
        Ok(Matrix { n, data })
    }

    /// The side length N.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of elements (N²).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false; empty matrices cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Returns element (r, c).
    ///
    /// # Panics
    /// Panics if `r` or `c` is out of range.
    pub fn get(&self, r: usize, c: usize) -> f32 {
        assert!(r < self.n && c < self.n, "index ({r}, {c}) out of range for n={}", self.n);
        self.data[r * self.n + c]
    }

    /// Iterate over rows as slices of length N.
    pub fn rows(&self) -> std::slice::ChunksExact<'_, f32> {
        self.data.chunks_exact(self.n)
    }

    /// Iterate over rows as disjoint mutable slices of length N.
    pub fn rows_mut(&mut self) -> std::slice::ChunksExactMut<'_, f32> {
        self.data.chunks_exact_mut(self.n)
    }
}

fn element_count(n: usize) -> Result<usize> {
    if n == 0 {
        return Err(MatrixError::EmptyMatrix);
    }
    n.checked_mul(n)
        .ok_or(MatrixError::AllocationFailure { elements: usize::MAX })
}

/// The A, B and C buffers shared by every strategy in a benchmark run.
///
/// A and B are inputs; C is fully overwritten by each strategy.
#[derive(Debug, Clone)]
pub struct Operands {
    pub a: Matrix,
    pub b: Matrix,
    pub c: Matrix,
}

impl Operands {
    /// Allocate all three buffers, filling A with `a_fill`, B with `b_fill`
    /// and C with zeros.
    pub fn constant(n: usize, a_fill: f32, b_fill: f32) -> Result<Self> {
        Ok(Operands {
            a: Matrix::filled(n, a_fill)?,
            b: Matrix::filled(n, b_fill)?,
            c: Matrix::zeros(n)?,
        })
    }

    /// Build operands from explicit inputs, allocating a zeroed C.
    ///
    /// # Errors
    /// Returns `DimensionMismatch` if A and B differ in size.
    pub fn new(a: Matrix, b: Matrix) -> Result<Self> {
        if a.n() != b.n() {
            return Err(MatrixError::DimensionMismatch {
                expected: a.n(),
                got: b.n(),
            });
        }
        let c = Matrix::zeros(a.n())?;
        Ok(Operands { a, b, c })
    }

    pub fn n(&self) -> usize {
        self.a.n()
    }
}

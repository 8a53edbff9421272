// Row kernel shared by the CPU strategies.
//
// Both strategies go through `row_into`, so their results match bit for bit.

/// Computes row `row` of C = A @ B into `out`.
///
/// `a` and `b` are N×N row-major buffers and `out.len() == n`. Each cell is
/// accumulated in f32 with `k` ascending.
pub fn row_into(a: &[f32], b: &[f32], n: usize, row: usize, out: &mut [f32]) {
    debug_assert_eq!(out.len(), n);
    let a_row = &a[row * n..(row + 1) * n];
    for (j, cell) in out.iter_mut().enumerate() {
        let mut sum = 0.0f32;
        for k in 0..n {
            sum += a_row[k] * b[k * n + j];
        }
        *cell = sum;
    }
}

//! `mb-matrix` - Square matrix buffers and pluggable multiply strategies for matbench.
//!
//! This crate provides:
//! - A `Matrix` type holding an N×N row-major f32 buffer
//! - `Operands`, the A/B/C triple shared by every strategy
//! - A `Multiplier` trait for pluggable strategies and an `OffloadPlan` trait
//!   for build-once, execute-many device plans
//! - `SequentialMultiplier` and `RowTaskMultiplier` CPU implementations
//! - A wgpu-backed offload runtime behind the `gpu` feature

pub mod backend;
pub mod cpu;
pub mod error;
#[cfg(feature = "gpu")]
pub mod gpu;
pub mod matrix;

// Re-export primary types at the crate root for convenience.
pub use backend::{Multiplier, OffloadPlan};
pub use cpu::{RowTaskMultiplier, SequentialMultiplier};
pub use error::{MatrixError, Result};
#[cfg(feature = "gpu")]
pub use gpu::{ExecutionPlan, GpuContext, GpuMultiplier, InputTransfer, TransferPolicy};
pub use matrix::{Matrix, Operands, A_FILL, B_FILL};

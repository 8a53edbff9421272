// wgpu offload backend.
//
// A `GpuContext` owns the device; an `ExecutionPlan` binds the compiled
// matmul kernel to a pair of inputs and is executed many times.

mod context;
mod plan;

pub use context::GpuContext;
pub use plan::{ExecutionPlan, InputTransfer, TransferPolicy};

use crate::backend::{check_operands, Multiplier, OffloadPlan};
use crate::error::Result;
use crate::matrix::Matrix;

/// One-shot GPU multiplier: builds a plan, runs it once and copies the
/// result back on every call.
///
/// Compilation cost is paid on each call; use `ExecutionPlan` directly to
/// amortize it across runs.
#[derive(Debug)]
pub struct GpuMultiplier {
    ctx: GpuContext,
    policy: TransferPolicy,
}

impl GpuMultiplier {
    pub fn new(ctx: GpuContext) -> Self {
        GpuMultiplier {
            ctx,
            policy: TransferPolicy::default(),
        }
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }
}

impl Multiplier for GpuMultiplier {
    fn name(&self) -> &str {
        "gpu"
    }

    fn multiply(&self, a: &Matrix, b: &Matrix, c: &mut Matrix) -> Result<()> {
        check_operands(a, b, c)?;
        let mut plan = ExecutionPlan::build(&self.ctx, a, b, self.policy)?;
        plan.execute()?;
        plan.copy_to_host(c)
    }
}

use std::mem::size_of;

use bytemuck::{Pod, Zeroable};
use wgpu::util::{BufferInitDescriptor, DeviceExt};
use wgpu::BufferUsages;

use super::context::{ErrorScope, GpuContext};
use crate::backend::OffloadPlan;
use crate::error::{MatrixError, Result};
use crate::matrix::Matrix;

// Must match @workgroup_size in matmul.wgsl.
const WORKGROUP_SIZE: u32 = 16;

/// When the input matrices are staged from host to device memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputTransfer {
    /// Upload A and B on the first execution only.
    #[default]
    FirstExecution,
    /// Upload A and B before every execution.
    EveryExecution,
}

/// Host/device transfer rules for an [`ExecutionPlan`].
///
/// The result matrix is only ever copied back on demand, through
/// [`OffloadPlan::copy_to_host`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferPolicy {
    pub inputs: InputTransfer,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Params {
    n: u32,
    _pad: [u32; 3],
}

/// A compiled matmul kernel bound to a pair of host inputs and to its own
/// device buffers.
///
/// Built once, executed many times. Each execution recomputes C on the
/// device from the resident inputs; C reaches the host only through
/// `copy_to_host`.
#[derive(Debug)]
pub struct ExecutionPlan<'a> {
    ctx: &'a GpuContext,
    a: &'a Matrix,
    b: &'a Matrix,
    n: usize,
    policy: TransferPolicy,
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    a_buf: wgpu::Buffer,
    b_buf: wgpu::Buffer,
    c_buf: wgpu::Buffer,
    staging: wgpu::Buffer,
    // Kept alive for the bind group.
    _params: wgpu::Buffer,
    workgroups: u32,
    inputs_resident: bool,
    executions: u64,
}

impl<'a> ExecutionPlan<'a> {
    /// Compile the kernel and allocate device buffers for `a @ b`.
    ///
    /// No data moves to the device until the first execution.
    ///
    /// # Errors
    /// - `DimensionMismatch` if `a` and `b` differ in size
    /// - `DeviceOutOfMemory` if a matrix exceeds the device's buffer limits
    ///   or an allocation fails
    /// - `DeviceUnavailable` if the device cannot dispatch the grid
    /// - `CompilationFailure` if the pipeline fails validation
    pub fn build(
        ctx: &'a GpuContext,
        a: &'a Matrix,
        b: &'a Matrix,
        policy: TransferPolicy,
    ) -> Result<Self> {
        if a.n() != b.n() {
            return Err(MatrixError::DimensionMismatch {
                expected: a.n(),
                got: b.n(),
            });
        }
        let n = a.n();
        let n_u32 = u32::try_from(n).map_err(|_| {
            MatrixError::DeviceOutOfMemory(format!("n={n} does not fit the kernel's u32 indexing"))
        })?;

        let bytes = (a.len() * size_of::<f32>()) as u64;
        let limits = ctx.limits();
        let max_binding = u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size);
        if bytes > max_binding {
            return Err(MatrixError::DeviceOutOfMemory(format!(
                "{bytes} byte matrix exceeds the device's {max_binding} byte storage binding limit"
            )));
        }

        let workgroups = n_u32.div_ceil(WORKGROUP_SIZE);
        if workgroups > limits.max_compute_workgroups_per_dimension {
            return Err(MatrixError::DeviceUnavailable(format!(
                "device cannot dispatch {workgroups} workgroups per dimension (limit {})",
                limits.max_compute_workgroups_per_dimension
            )));
        }

        let device = ctx.device();
        let scope = ErrorScope::push(device);

        let module = device.create_shader_module(wgpu::include_wgsl!("matmul.wgsl"));
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("matmul"),
            layout: None,
            module: &module,
            entry_point: "main",
            compilation_options: Default::default(),
        });

        let buffer = |label: &str, usage: BufferUsages| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: bytes,
                usage,
                mapped_at_creation: false,
            })
        };
        let a_buf = buffer("matmul a", BufferUsages::STORAGE | BufferUsages::COPY_DST);
        let b_buf = buffer("matmul b", BufferUsages::STORAGE | BufferUsages::COPY_DST);
        let c_buf = buffer("matmul c", BufferUsages::STORAGE | BufferUsages::COPY_SRC);
        let staging = buffer("matmul c staging", BufferUsages::MAP_READ | BufferUsages::COPY_DST);

        let params = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("matmul params"),
            contents: bytemuck::bytes_of(&Params {
                n: n_u32,
                _pad: [0; 3],
            }),
            usage: BufferUsages::UNIFORM,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("matmul bindings"),
            layout: &pipeline.get_bind_group_layout(0),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: a_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: b_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: c_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: params.as_entire_binding(),
                },
            ],
        });

        scope.finish(MatrixError::CompilationFailure)?;

        log::debug!(
            "Built matmul plan: n={n}, {workgroups}x{workgroups} workgroups, inputs {:?}",
            policy.inputs
        );

        Ok(ExecutionPlan {
            ctx,
            a,
            b,
            n,
            policy,
            pipeline,
            bind_group,
            a_buf,
            b_buf,
            c_buf,
            staging,
            _params: params,
            workgroups,
            inputs_resident: false,
            executions: 0,
        })
    }

    pub fn policy(&self) -> TransferPolicy {
        self.policy
    }

    fn needs_upload(&self) -> bool {
        !self.inputs_resident || self.policy.inputs == InputTransfer::EveryExecution
    }

    fn read_back(&self, c: &mut Matrix) -> Result<()> {
        let device = self.ctx.device();
        let queue = self.ctx.queue();

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("matmul read back"),
        });
        encoder.copy_buffer_to_buffer(&self.c_buf, 0, &self.staging, 0, self.staging.size());
        queue.submit(Some(encoder.finish()));

        let slice = self.staging.slice(..);
        let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = device.poll(wgpu::Maintain::Wait);

        match pollster::block_on(receiver.receive()) {
            Some(Ok(())) => {}
            Some(Err(err)) => return Err(MatrixError::TransferFailed(err.to_string())),
            None => {
                return Err(MatrixError::TransferFailed(
                    "map callback dropped before completion".to_string(),
                ))
            }
        }

        {
            let view = slice.get_mapped_range();
            c.as_mut_slice().copy_from_slice(bytemuck::cast_slice(&view));
        }
        self.staging.unmap();
        Ok(())
    }
}

impl OffloadPlan for ExecutionPlan<'_> {
    fn execute(&mut self) -> Result<()> {
        let device = self.ctx.device();
        let queue = self.ctx.queue();
        let scope = ErrorScope::push(device);

        let upload = self.needs_upload();
        if upload {
            queue.write_buffer(&self.a_buf, 0, bytemuck::cast_slice(self.a.as_slice()));
            queue.write_buffer(&self.b_buf, 0, bytemuck::cast_slice(self.b.as_slice()));
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("matmul execute"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("matmul"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.dispatch_workgroups(self.workgroups, self.workgroups, 1);
        }
        let index = queue.submit(Some(encoder.finish()));
        let _ = device.poll(wgpu::Maintain::WaitForSubmissionIndex(index));

        scope.finish(MatrixError::KernelLaunch)?;

        if upload {
            log::trace!("Staged inputs to device ({} bytes each)", self.a_buf.size());
        }
        self.inputs_resident = true;
        self.executions += 1;
        Ok(())
    }

    fn copy_to_host(&self, c: &mut Matrix) -> Result<()> {
        if c.n() != self.n {
            return Err(MatrixError::DimensionMismatch {
                expected: self.n,
                got: c.n(),
            });
        }

        let scope = ErrorScope::push(self.ctx.device());
        let copied = self.read_back(c);
        scope.finish(MatrixError::TransferFailed)?;
        copied
    }

    fn executions(&self) -> u64 {
        self.executions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::SequentialMultiplier;
    use crate::Multiplier;
    use approx::relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn context() -> Option<GpuContext> {
        match GpuContext::new() {
            Ok(ctx) => Some(ctx),
            Err(err) => {
                eprintln!("skipping GPU test: {err}");
                None
            }
        }
    }

    fn run_once(ctx: &GpuContext, a: &Matrix, b: &Matrix, policy: TransferPolicy) -> Matrix {
        let mut plan = ExecutionPlan::build(ctx, a, b, policy).unwrap();
        plan.execute().unwrap();
        let mut c = Matrix::zeros(a.n()).unwrap();
        plan.copy_to_host(&mut c).unwrap();
        c
    }

    #[test]
    fn test_matmul_basic() {
        let Some(ctx) = context() else { return };
        let a = Matrix::from_vec(2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let b = Matrix::from_vec(2, vec![5.0, 6.0, 7.0, 8.0]).unwrap();
        let c = run_once(&ctx, &a, &b, TransferPolicy::default());
        assert_eq!(c.as_slice(), &[19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_constant_closed_form() {
        let Some(ctx) = context() else { return };
        // 40 is not a multiple of the workgroup size.
        let a = Matrix::filled(40, 1.0).unwrap();
        let b = Matrix::filled(40, 2.0).unwrap();
        let c = run_once(&ctx, &a, &b, TransferPolicy::default());
        assert!(c.as_slice().iter().all(|&v| v == 80.0));
    }

    #[test]
    fn test_host_result_untouched_until_copied() {
        let Some(ctx) = context() else { return };
        let a = Matrix::filled(8, 1.0).unwrap();
        let b = Matrix::filled(8, 1.0).unwrap();
        let mut plan = ExecutionPlan::build(&ctx, &a, &b, TransferPolicy::default()).unwrap();

        let mut c = Matrix::filled(8, -1.0).unwrap();
        plan.execute().unwrap();
        assert!(c.as_slice().iter().all(|&v| v == -1.0));

        plan.copy_to_host(&mut c).unwrap();
        assert!(c.as_slice().iter().all(|&v| v == 8.0));
    }

    #[test]
    fn test_execute_is_idempotent() {
        let Some(ctx) = context() else { return };
        let mut rng = StdRng::seed_from_u64(7);
        let data = |rng: &mut StdRng| -> Vec<f32> {
            (0..24 * 24).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
        };
        let a = Matrix::from_vec(24, data(&mut rng)).unwrap();
        let b = Matrix::from_vec(24, data(&mut rng)).unwrap();

        let mut plan = ExecutionPlan::build(&ctx, &a, &b, TransferPolicy::default()).unwrap();
        let mut first = Matrix::zeros(24).unwrap();
        let mut second = Matrix::zeros(24).unwrap();

        plan.execute().unwrap();
        plan.copy_to_host(&mut first).unwrap();
        plan.execute().unwrap();
        plan.copy_to_host(&mut second).unwrap();

        assert_eq!(first, second);
        assert_eq!(plan.executions(), 2);
    }

    #[test]
    fn test_matches_sequential() {
        let Some(ctx) = context() else { return };
        let mut rng = StdRng::seed_from_u64(1234);
        let n = 37;
        let a: Vec<f32> = (0..n * n).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
        let b: Vec<f32> = (0..n * n).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
        let a = Matrix::from_vec(n, a).unwrap();
        let b = Matrix::from_vec(n, b).unwrap();

        let mut expected = Matrix::zeros(n).unwrap();
        SequentialMultiplier::new()
            .multiply(&a, &b, &mut expected)
            .unwrap();

        for inputs in [InputTransfer::FirstExecution, InputTransfer::EveryExecution] {
            let got = run_once(&ctx, &a, &b, TransferPolicy { inputs });
            for (g, e) in got.as_slice().iter().zip(expected.as_slice()) {
                assert!(
                    relative_eq!(*g, *e, epsilon = 1e-4, max_relative = 1e-3),
                    "gpu {g} vs cpu {e} with {inputs:?}"
                );
            }
        }
    }

    #[test]
    fn test_every_execution_policy_reuploads() {
        let Some(ctx) = context() else { return };
        let a = Matrix::filled(4, 3.0).unwrap();
        let b = Matrix::filled(4, 0.5).unwrap();
        let policy = TransferPolicy {
            inputs: InputTransfer::EveryExecution,
        };
        let mut plan = ExecutionPlan::build(&ctx, &a, &b, policy).unwrap();
        assert_eq!(plan.policy(), policy);
        for _ in 0..3 {
            plan.execute().unwrap();
            assert!(plan.needs_upload());
        }
        let mut c = Matrix::zeros(4).unwrap();
        plan.copy_to_host(&mut c).unwrap();
        assert!(c.as_slice().iter().all(|&v| v == 6.0));
    }

    #[test]
    fn test_first_execution_policy_uploads_once() {
        let Some(ctx) = context() else { return };
        let a = Matrix::filled(4, 1.0).unwrap();
        let b = Matrix::filled(4, 1.0).unwrap();
        let mut plan = ExecutionPlan::build(&ctx, &a, &b, TransferPolicy::default()).unwrap();
        assert!(plan.needs_upload());
        plan.execute().unwrap();
        assert!(!plan.needs_upload());
    }

    #[test]
    fn test_copy_to_host_dimension_mismatch() {
        let Some(ctx) = context() else { return };
        let a = Matrix::filled(4, 1.0).unwrap();
        let b = Matrix::filled(4, 1.0).unwrap();
        let plan = ExecutionPlan::build(&ctx, &a, &b, TransferPolicy::default()).unwrap();
        let mut c = Matrix::zeros(5).unwrap();
        assert!(matches!(
            plan.copy_to_host(&mut c),
            Err(MatrixError::DimensionMismatch { expected: 4, got: 5 })
        ));
    }

    #[test]
    fn test_build_dimension_mismatch() {
        let Some(ctx) = context() else { return };
        let a = Matrix::filled(4, 1.0).unwrap();
        let b = Matrix::filled(3, 1.0).unwrap();
        assert!(matches!(
            ExecutionPlan::build(&ctx, &a, &b, TransferPolicy::default()),
            Err(MatrixError::DimensionMismatch { .. })
        ));
    }
}

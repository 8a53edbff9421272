use wgpu::{AdapterInfo, DeviceDescriptor, PowerPreference, RequestAdapterOptions};

use crate::error::{MatrixError, Result};

/// A wgpu device and queue used to build and run offload plans.
#[derive(Debug)]
pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    info: AdapterInfo,
    limits: wgpu::Limits,
}

impl GpuContext {
    /// Select a high-performance adapter and open a device on it, blocking
    /// the current thread.
    ///
    /// # Errors
    /// Returns `DeviceUnavailable` if no adapter is found or the device
    /// request is refused.
    pub fn new() -> Result<Self> {
        pollster::block_on(Self::new_async())
    }

    pub async fn new_async() -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or_else(|| {
                MatrixError::DeviceUnavailable("no compatible wgpu adapter found".to_string())
            })?;

        let info = adapter.get_info();
        let limits = adapter.limits();

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: Some("matbench device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.clone(),
                },
                None,
            )
            .await
            .map_err(|err| {
                MatrixError::DeviceUnavailable(format!(
                    "unable to request a device from adapter {:?}: {err}",
                    info.name
                ))
            })?;

        // Errors outside an error scope would otherwise panic.
        device.on_uncaptured_error(Box::new(|err| {
            log::error!("uncaptured wgpu error: {err}");
        }));

        log::info!(
            "Created wgpu compute device {:?} => {:?} ({:?})",
            info.name,
            info.backend,
            info.device_type
        );

        Ok(GpuContext {
            device,
            queue,
            info,
            limits,
        })
    }

    /// Information about the selected adapter.
    pub fn adapter_info(&self) -> &AdapterInfo {
        &self.info
    }

    pub(crate) fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub(crate) fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub(crate) fn limits(&self) -> &wgpu::Limits {
        &self.limits
    }
}

/// Captures validation and out-of-memory errors raised between `push` and
/// `finish`.
pub(crate) struct ErrorScope<'d> {
    device: &'d wgpu::Device,
}

impl<'d> ErrorScope<'d> {
    pub(crate) fn push(device: &'d wgpu::Device) -> Self {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        ErrorScope { device }
    }

    /// Pops both scopes. Out-of-memory wins over validation; validation
    /// errors are mapped with `on_validation`.
    pub(crate) fn finish(self, on_validation: impl FnOnce(String) -> MatrixError) -> Result<()> {
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        let validation = pollster::block_on(self.device.pop_error_scope());

        if let Some(err) = out_of_memory {
            return Err(MatrixError::DeviceOutOfMemory(err.to_string()));
        }
        if let Some(err) = validation {
            return Err(on_validation(err.to_string()));
        }
        Ok(())
    }
}

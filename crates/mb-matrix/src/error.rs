use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatrixError {
    #[error("matrix dimension must be positive")]
    EmptyMatrix,
    #[error("dimension mismatch: expected {expected}x{expected}, got {got}x{got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("buffer length mismatch: expected {expected} elements, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("failed to allocate {elements} f32 elements")]
    AllocationFailure { elements: usize },
    #[error("row task scheduler unavailable: {0}")]
    SchedulerUnavailable(String),
    #[error("row task barrier interrupted: {0}")]
    WaitInterrupted(String),
    #[error("compute device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("kernel compilation failed: {0}")]
    CompilationFailure(String),
    #[error("device out of memory: {0}")]
    DeviceOutOfMemory(String),
    #[error("kernel launch failed: {0}")]
    KernelLaunch(String),
    #[error("device transfer failed: {0}")]
    TransferFailed(String),
}

pub type Result<T> = std::result::Result<T, MatrixError>;

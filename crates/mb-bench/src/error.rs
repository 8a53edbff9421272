use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidConfig {
        key: String,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    Matrix(#[from] mb_matrix::MatrixError),
}

pub type Result<T> = std::result::Result<T, BenchError>;

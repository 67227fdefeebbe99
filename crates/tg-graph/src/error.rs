use thiserror::Error;
use tg_tensor::TensorError;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

pub type Result<T> = std::result::Result<T, ExecError>;

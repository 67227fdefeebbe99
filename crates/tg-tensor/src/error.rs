use thiserror::Error;

#[derive(Error, Debug)]
pub enum TensorError {
    #[error("arena capacity must be non-zero")]
    ZeroCapacity,
    #[error("arena out of memory: requested {requested} bytes, {available} of {capacity} available")]
    OutOfMemory {
        requested: usize,
        available: usize,
        capacity: usize,
    },
    #[error("failed to create tensor with shape {shape:?}: {source}")]
    TensorCreation {
        shape: Vec<usize>,
        #[source]
        source: Box<TensorError>,
    },
    #[error("view out of bounds: offset {offset} + {required} bytes exceeds source extent of {available} bytes")]
    ViewOutOfBounds {
        offset: usize,
        required: usize,
        available: usize,
    },
    #[error("{op}: incompatible shapes {lhs:?} and {rhs:?}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Vec<usize>,
        rhs: Vec<usize>,
    },
    #[error("dtype mismatch: expected {expected}, got {got}")]
    DTypeMismatch { expected: String, got: String },
    #[error("unknown tensor id {id} (stale handle after reset?)")]
    UnknownTensor { id: usize },
    #[error("wrong element count: expected {expected}, got {got}")]
    WrongElementCount { expected: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, TensorError>;

//! `tg-tensor` - Arena-backed tensor data model for tensor-graph.
//!
//! This crate provides:
//! - An `Arena` bump allocator that backs all tensor storage
//! - A `Context` owning the arena and every tensor descriptor carved from it
//! - Strided, view-capable `Tensor` descriptors addressed by `TensorId`
//! - Data type definitions (F32, F16)
//!
//! Tensors created here are inert byte ranges plus metadata. The operation
//! constructors and the executor that turn them into a computation graph
//! live in the companion `tg-graph` crate.

pub mod arena;
pub mod context;
pub mod dtype;
pub mod error;
pub mod shape;
pub mod tensor;

// Re-export primary types at the crate root for convenience.
pub use arena::{Arena, TENSOR_ALIGN};
pub use context::Context;
pub use dtype::DType;
pub use error::{Result, TensorError};
pub use shape::{Shape, MAX_DIMS};
pub use tensor::{Node, OpKind, Tensor, TensorId};

//! `tg-graph` - Deferred operation graph and threaded executor for
//! tensor-graph.
//!
//! Operations over `tg-tensor` tensors are recorded as graph nodes at
//! construction time and computed only when a terminal tensor is evaluated.
//! The graph itself is implicit in the operand links on each computed
//! tensor; evaluation discovers it with a memoized backward walk and runs
//! each node's kernel across a fixed pool of worker threads.
//!
//! ```
//! use tg_tensor::{Context, DType, Shape};
//! use tg_graph::{add, evaluate, mul};
//!
//! # fn main() -> Result<(), tg_graph::ExecError> {
//! let mut ctx = Context::new(1024 * 1024)?;
//! let a = ctx.new_tensor(DType::F32, Shape::matrix(2, 2))?;
//! let b = ctx.new_tensor(DType::F32, Shape::matrix(2, 2))?;
//! ctx.fill(a, 2.0)?;
//! ctx.fill(b, 1.0)?;
//!
//! // Nothing is computed here, only recorded.
//! let x = mul(&mut ctx, a, b)?;
//! let ax = mul(&mut ctx, a, x)?;
//! let f = add(&mut ctx, ax, b)?;
//!
//! let report = evaluate(&mut ctx, f, 2)?;
//! assert_eq!(report.nodes_executed, 3);
//! assert_eq!(ctx.to_vec_f32(f)?, vec![5.0; 4]);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod exec;
mod kernels;
pub mod ops;
pub mod plan;

// Re-export primary types at the crate root for convenience.
pub use error::{ExecError, Result};
pub use exec::{evaluate, EvalReport, Executor};
pub use ops::{add, matmul, mul, relu};
pub use plan::ExecPlan;

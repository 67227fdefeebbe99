//! Deferred operation constructors.
//!
//! Each constructor validates operand shapes and dtypes, computes the
//! result shape, allocates the result tensor, and records the producing
//! operation on it. No values are computed until a terminal tensor is
//! evaluated.

use tg_tensor::{Context, DType, OpKind, Result, Shape, TensorError, TensorId};

fn same_dtype(ctx: &Context, a: TensorId, b: TensorId) -> Result<DType> {
    let da = ctx.tensor(a)?.dtype();
    let db = ctx.tensor(b)?.dtype();
    if da != db {
        return Err(TensorError::DTypeMismatch {
            expected: da.to_string(),
            got: db.to_string(),
        });
    }
    Ok(da)
}

fn elementwise(ctx: &mut Context, kind: OpKind, a: TensorId, b: TensorId) -> Result<TensorId> {
    let dtype = same_dtype(ctx, a, b)?;
    let sa = *ctx.tensor(a)?.shape();
    let sb = *ctx.tensor(b)?.shape();
    if !sb.broadcasts_to(&sa) {
        return Err(TensorError::ShapeMismatch {
            op: kind.name(),
            lhs: sa.to_vec(),
            rhs: sb.to_vec(),
        });
    }
    ctx.new_node(dtype, sa, kind, &[a, b])
}

/// Elementwise addition `a + b`.
///
/// Shapes must be identical, or every axis of `b` must match `a`'s or be 1
/// (`b` is broadcast). The result takes `a`'s shape and dtype.
pub fn add(ctx: &mut Context, a: TensorId, b: TensorId) -> Result<TensorId> {
    elementwise(ctx, OpKind::Add, a, b)
}

/// Elementwise multiplication `a * b`, with the same broadcast rule as
/// [`add`].
pub fn mul(ctx: &mut Context, a: TensorId, b: TensorId) -> Result<TensorId> {
    elementwise(ctx, OpKind::Mul, a, b)
}

/// Matrix multiplication over the shared dimension 0.
///
/// `a` has dims `[k, m]` (m rows of k elements), `b` has dims `[k, n]`;
/// the result has dims `[m, n]` with
/// `out[j][i] = Σ_p a[i][p] * b[j][p]`. The shared dimension must match
/// exactly, with no broadcasting. The result dtype is always F32: the kernel
/// accumulates in f32 even for f16 operands.
pub fn matmul(ctx: &mut Context, a: TensorId, b: TensorId) -> Result<TensorId> {
    same_dtype(ctx, a, b)?;
    let sa = *ctx.tensor(a)?.shape();
    let sb = *ctx.tensor(b)?.shape();
    if sa.ndim() > 2 || sb.ndim() > 2 || sa.dim(0) != sb.dim(0) {
        return Err(TensorError::ShapeMismatch {
            op: OpKind::MatMul.name(),
            lhs: sa.to_vec(),
            rhs: sb.to_vec(),
        });
    }
    let out = Shape::matrix(sa.dim(1), sb.dim(1));
    ctx.new_node(DType::F32, out, OpKind::MatMul, &[a, b])
}

/// Rectified linear activation, `max(0, x)`. Shape and dtype unchanged.
pub fn relu(ctx: &mut Context, a: TensorId) -> Result<TensorId> {
    let t = ctx.tensor(a)?;
    let (dtype, shape) = (t.dtype(), *t.shape());
    ctx.new_node(dtype, shape, OpKind::Relu, &[a])
}

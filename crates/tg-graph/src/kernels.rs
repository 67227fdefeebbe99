//! Reference compute kernels.
//!
//! Correctness-first implementations: elements are loaded as f32 (f16
//! widened), combined, and stored back in the output dtype. Each kernel
//! partitions the output into contiguous chunks and writes nothing outside
//! its own chunk, so results are independent of how the worker pool
//! interleaves chunk execution. All element addressing goes through
//! `Tensor::element_offset`.

use rayon::prelude::*;
use tg_tensor::{OpKind, Tensor, MAX_DIMS};

/// Run one node's kernel, writing into `dst` (the node's byte extent).
///
/// `srcs` are the operand descriptors and `src_bytes` their byte extents,
/// in operand order. Shape compatibility was validated when the node was
/// constructed.
pub(crate) fn run(
    kind: OpKind,
    dst: &mut [u8],
    out: &Tensor,
    src_bytes: &[&[u8]],
    srcs: &[Tensor],
    n_chunks: usize,
) {
    match kind {
        OpKind::Add => binary(dst, out, src_bytes, srcs, n_chunks, |x, y| x + y),
        OpKind::Mul => binary(dst, out, src_bytes, srcs, n_chunks, |x, y| x * y),
        OpKind::Relu => unary(dst, out, src_bytes[0], &srcs[0], n_chunks, |x| x.max(0.0)),
        OpKind::MatMul => matmul(dst, out, src_bytes, srcs, n_chunks),
    }
}

/// Map an output element index onto a broadcast operand: axes of size 1
/// stay pinned at index 0.
fn broadcast_index(idx: &[usize; MAX_DIMS], t: &Tensor) -> [usize; MAX_DIMS] {
    let mut mapped = [0usize; MAX_DIMS];
    for i in 0..MAX_DIMS {
        mapped[i] = idx[i] % t.shape().dim(i);
    }
    mapped
}

fn binary(
    dst: &mut [u8],
    out: &Tensor,
    src_bytes: &[&[u8]],
    srcs: &[Tensor],
    n_chunks: usize,
    f: impl Fn(f32, f32) -> f32 + Sync,
) {
    let (a, b) = (src_bytes[0], src_bytes[1]);
    let (ta, tb) = (&srcs[0], &srcs[1]);
    let esize = out.dtype().size_in_bytes();
    let chunk_elems = out.shape().numel().div_ceil(n_chunks.max(1));

    dst.par_chunks_mut(chunk_elems * esize)
        .enumerate()
        .for_each(|(chunk_i, chunk)| {
            let base = chunk_i * chunk_elems;
            for i in 0..chunk.len() / esize {
                let idx = out.shape().unflatten(base + i);
                let x = ta.dtype().load(a, ta.element_offset(&idx));
                let y = tb
                    .dtype()
                    .load(b, tb.element_offset(&broadcast_index(&idx, tb)));
                out.dtype().store(chunk, i * esize, f(x, y));
            }
        });
}

fn unary(
    dst: &mut [u8],
    out: &Tensor,
    a: &[u8],
    ta: &Tensor,
    n_chunks: usize,
    f: impl Fn(f32) -> f32 + Sync,
) {
    let esize = out.dtype().size_in_bytes();
    let chunk_elems = out.shape().numel().div_ceil(n_chunks.max(1));

    dst.par_chunks_mut(chunk_elems * esize)
        .enumerate()
        .for_each(|(chunk_i, chunk)| {
            let base = chunk_i * chunk_elems;
            for i in 0..chunk.len() / esize {
                let idx = out.shape().unflatten(base + i);
                let x = ta.dtype().load(a, ta.element_offset(&idx));
                out.dtype().store(chunk, i * esize, f(x));
            }
        });
}

/// `a` dims `[k, m]`, `b` dims `[k, n]`, `out` dims `[m, n]`:
/// `out[j][i] = Σ_p a[i][p] * b[j][p]`, accumulated in f32. Chunked by
/// output rows.
fn matmul(dst: &mut [u8], out: &Tensor, src_bytes: &[&[u8]], srcs: &[Tensor], n_chunks: usize) {
    let (a, b) = (src_bytes[0], src_bytes[1]);
    let (ta, tb) = (&srcs[0], &srcs[1]);
    let k = ta.shape().dim(0);
    let m = ta.shape().dim(1);
    let n = tb.shape().dim(1);
    let esize = out.dtype().size_in_bytes();
    let row_bytes = m * esize;
    let rows_per_chunk = n.div_ceil(n_chunks.max(1));

    dst.par_chunks_mut(rows_per_chunk * row_bytes)
        .enumerate()
        .for_each(|(chunk_i, chunk)| {
            let row_base = chunk_i * rows_per_chunk;
            for r in 0..chunk.len() / row_bytes {
                let j = row_base + r;
                for i in 0..m {
                    let mut acc = 0.0f32;
                    for p in 0..k {
                        let x = ta.dtype().load(a, ta.element_offset(&[p, i, 0, 0]));
                        let y = tb.dtype().load(b, tb.element_offset(&[p, j, 0, 0]));
                        acc += x * y;
                    }
                    out.dtype().store(chunk, (r * m + i) * esize, acc);
                }
            }
        });
}

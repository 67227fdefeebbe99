//! Graph evaluation across a fixed pool of worker threads.
//!
//! Nodes run one at a time in dependency order. Within a node, the output
//! elements are partitioned into contiguous chunks dispatched across the
//! pool, and the parallel-iterator join is the barrier: all chunks of a
//! node complete before the next node starts. Parallelism lives inside a
//! single operation's element range, never across graph branches.

use crate::error::{ExecError, Result};
use crate::kernels;
use crate::plan::ExecPlan;
use rayon::ThreadPool;
use std::fmt;
use std::time::{Duration, Instant};
use tg_tensor::{Context, Tensor, TensorId};

/// Summary of one evaluation run.
#[derive(Debug, Clone)]
pub struct EvalReport {
    /// Computed nodes executed: each distinct node exactly once, however
    /// many consumers it feeds.
    pub nodes_executed: usize,
    /// Worker threads available for kernel dispatch.
    pub threads: usize,
    /// Wall-clock time spent planning and executing.
    pub elapsed: Duration,
}

/// Graph executor with a persistent worker pool.
///
/// Build one to reuse the pool across evaluations, or call the free
/// [`evaluate`] function to spin up a pool per call.
pub struct Executor {
    pool: ThreadPool,
    threads: usize,
}

impl Executor {
    /// Create an executor with a fixed pool of `thread_count` workers.
    /// A count of zero is treated as one.
    pub fn new(thread_count: usize) -> Result<Executor> {
        let threads = thread_count.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| ExecError::ThreadPool(e.to_string()))?;
        Ok(Executor { pool, threads })
    }

    /// Worker thread count.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Evaluate every computed tensor `terminal` depends on, leaving the
    /// results readable through the context's accessors.
    ///
    /// Leaf tensors are not touched; their bytes must have been populated
    /// by the caller beforehand. Any tensor error encountered mid-walk or
    /// mid-dispatch aborts the run; no partial result is reported as
    /// success.
    pub fn evaluate(&self, ctx: &mut Context, terminal: TensorId) -> Result<EvalReport> {
        let start = Instant::now();
        let plan = ExecPlan::build(ctx, terminal)?;
        tracing::debug!(
            "evaluating {}: {} nodes on {} threads",
            terminal,
            plan.len(),
            self.threads
        );

        for &id in plan.nodes() {
            self.run_node(ctx, id)?;
        }

        Ok(EvalReport {
            nodes_executed: plan.len(),
            threads: self.threads,
            elapsed: start.elapsed(),
        })
    }

    fn run_node(&self, ctx: &mut Context, id: TensorId) -> Result<()> {
        let out = ctx.tensor(id)?.clone();
        let node = out.op().cloned().expect("plan schedules only computed nodes");
        let srcs = node
            .srcs
            .iter()
            .map(|&s| ctx.tensor(s).cloned())
            .collect::<tg_tensor::Result<Vec<Tensor>>>()?;
        tracing::trace!("node {id}: {}", node.kind);

        // Operands were created before this node, and the arena cursor only
        // moves forward, so every operand extent sits below the node's own
        // storage. Splitting there gives shared reads plus one disjoint
        // write region.
        let (inputs, output) = ctx.split_storage(out.data_offset());
        debug_assert!(srcs
            .iter()
            .all(|s| s.data_offset() + s.size_bytes() <= out.data_offset()));
        let src_bytes: Vec<&[u8]> = srcs
            .iter()
            .map(|s| &inputs[s.data_offset()..s.data_offset() + s.size_bytes()])
            .collect();
        let dst = &mut output[..out.size_bytes()];

        self.pool
            .install(|| kernels::run(node.kind, dst, &out, &src_bytes, &srcs, self.threads));
        Ok(())
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("threads", &self.threads)
            .finish()
    }
}

/// One-shot evaluation with a worker pool built for this call.
pub fn evaluate(ctx: &mut Context, terminal: TensorId, thread_count: usize) -> Result<EvalReport> {
    Executor::new(thread_count)?.evaluate(ctx, terminal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{add, matmul, mul, relu};
    use approx::assert_relative_eq;
    use half::f16;
    use tg_tensor::{DType, Shape, TensorError};

    fn ctx() -> Context {
        Context::new(1024 * 1024).unwrap()
    }

    #[test]
    fn test_mul_add_expression() {
        // x = a * b, f = a * x + b with a = 2, b = 1 everywhere.
        let mut ctx = ctx();
        let a = ctx.new_tensor(DType::F32, Shape::matrix(2, 2)).unwrap();
        let b = ctx.new_tensor(DType::F32, Shape::matrix(2, 2)).unwrap();
        ctx.fill(a, 2.0).unwrap();
        ctx.fill(b, 1.0).unwrap();

        let x = mul(&mut ctx, a, b).unwrap();
        let ax = mul(&mut ctx, a, x).unwrap();
        let f = add(&mut ctx, ax, b).unwrap();

        let report = evaluate(&mut ctx, f, 2).unwrap();
        assert_eq!(report.nodes_executed, 3);
        assert_eq!(report.threads, 2);
        assert_eq!(ctx.to_vec_f32(x).unwrap(), vec![2.0; 4]);
        assert_eq!(ctx.to_vec_f32(f).unwrap(), vec![5.0; 4]);
    }

    #[test]
    fn test_multiply_by_ones_is_identity() {
        for dtype in [DType::F32, DType::F16] {
            let mut ctx = ctx();
            let a = ctx.new_tensor(dtype, Shape::matrix(3, 5)).unwrap();
            let values: Vec<f32> = (0..15).map(|i| i as f32 - 7.5).collect();
            ctx.set_elements(a, &values).unwrap();
            let ones = ctx.new_tensor(dtype, Shape::matrix(3, 5)).unwrap();
            ctx.fill(ones, 1.0).unwrap();

            let out = mul(&mut ctx, a, ones).unwrap();
            evaluate(&mut ctx, out, 2).unwrap();
            assert_eq!(
                ctx.to_vec_f32(out).unwrap(),
                ctx.to_vec_f32(a).unwrap(),
                "identity failed for {dtype}"
            );
        }
    }

    #[test]
    fn test_matmul_values() {
        let mut ctx = ctx();
        // a: 2 rows of length 3; b: 2 rows of length 3.
        let a = ctx.new_tensor(DType::F32, Shape::matrix(3, 2)).unwrap();
        let b = ctx.new_tensor(DType::F32, Shape::matrix(3, 2)).unwrap();
        ctx.set_elements(a, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        ctx.set_elements(b, &[0.5, 1.5, 2.5, -1.0, 0.25, 0.75]).unwrap();

        let c = matmul(&mut ctx, a, b).unwrap();
        evaluate(&mut ctx, c, 1).unwrap();

        // out[j][i] = dot(a row i, b row j).
        let out = ctx.to_vec_f32(c).unwrap();
        assert_relative_eq!(out[0], 1.0 * 0.5 + 2.0 * 1.5 + 3.0 * 2.5);
        assert_relative_eq!(out[1], 4.0 * 0.5 + 5.0 * 1.5 + 6.0 * 2.5);
        assert_relative_eq!(out[2], 1.0 * -1.0 + 2.0 * 0.25 + 3.0 * 0.75);
        assert_relative_eq!(out[3], 4.0 * -1.0 + 5.0 * 0.25 + 6.0 * 0.75);
    }

    #[test]
    fn test_matmul_f16_accumulates_to_f32() {
        let mut ctx = ctx();
        let a = ctx.new_tensor(DType::F16, Shape::matrix(2, 2)).unwrap();
        let b = ctx.new_tensor(DType::F16, Shape::matrix(2, 1)).unwrap();
        ctx.set_elements(a, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        ctx.set_elements(b, &[0.5, 0.5]).unwrap();

        let c = matmul(&mut ctx, a, b).unwrap();
        evaluate(&mut ctx, c, 1).unwrap();
        assert_eq!(ctx.tensor(c).unwrap().dtype(), DType::F32);
        assert_eq!(ctx.to_vec_f32(c).unwrap(), vec![1.5, 3.5]);
    }

    #[test]
    fn test_add_f16_rounds_at_storage() {
        let mut ctx = ctx();
        let a = ctx.new_tensor(DType::F16, Shape::vector(2)).unwrap();
        let b = ctx.new_tensor(DType::F16, Shape::vector(2)).unwrap();
        ctx.fill(a, 0.1).unwrap();
        ctx.fill(b, 0.2).unwrap();

        let c = add(&mut ctx, a, b).unwrap();
        evaluate(&mut ctx, c, 1).unwrap();

        // The kernel combines in f32 and rounds back to f16 on store.
        let expected =
            f16::from_f32(f16::from_f32(0.1).to_f32() + f16::from_f32(0.2).to_f32()).to_f32();
        assert_eq!(ctx.to_vec_f32(c).unwrap(), vec![expected; 2]);
    }

    #[test]
    fn test_relu() {
        let mut ctx = ctx();
        let a = ctx.new_tensor(DType::F32, Shape::vector(5)).unwrap();
        ctx.set_elements(a, &[-2.0, -0.5, 0.0, 0.5, 2.0]).unwrap();
        let r = relu(&mut ctx, a).unwrap();
        evaluate(&mut ctx, r, 3).unwrap();
        assert_eq!(ctx.to_vec_f32(r).unwrap(), vec![0.0, 0.0, 0.0, 0.5, 2.0]);
    }

    #[test]
    fn test_broadcast_add_per_row_bias() {
        let mut ctx = ctx();
        let h = ctx.new_tensor(DType::F32, Shape::matrix(4, 4)).unwrap();
        ctx.fill(h, 1.0).unwrap();
        let bias = ctx.new_tensor(DType::F32, Shape::matrix(4, 1)).unwrap();
        ctx.set_elements(bias, &[10.0, 20.0, 30.0, 40.0]).unwrap();

        let out = add(&mut ctx, h, bias).unwrap();
        evaluate(&mut ctx, out, 2).unwrap();
        // The bias row repeats across dimension 1.
        assert_eq!(
            ctx.to_vec_f32(out).unwrap(),
            vec![
                11.0, 21.0, 31.0, 41.0, //
                11.0, 21.0, 31.0, 41.0, //
                11.0, 21.0, 31.0, 41.0, //
                11.0, 21.0, 31.0, 41.0,
            ]
        );
    }

    fn build_two_layer(ctx: &mut Context) -> TensorId {
        // input(2) → hidden(4, relu) → output(1), batch of four pairs.
        let w1 = ctx.new_tensor(DType::F32, Shape::matrix(2, 4)).unwrap();
        let b1 = ctx.new_tensor(DType::F32, Shape::matrix(4, 1)).unwrap();
        let w2 = ctx.new_tensor(DType::F32, Shape::matrix(4, 1)).unwrap();
        let b2 = ctx.new_tensor(DType::F32, Shape::matrix(1, 1)).unwrap();
        let input = ctx.new_tensor(DType::F32, Shape::matrix(2, 4)).unwrap();

        ctx.set_elements(w1, &[0.4, -0.3, 0.1, 0.2, -0.5, 0.6, 0.7, -0.1])
            .unwrap();
        ctx.set_elements(b1, &[0.1, -0.2, 0.0, 0.3]).unwrap();
        ctx.set_elements(w2, &[0.5, -0.4, 0.3, 0.2]).unwrap();
        ctx.fill(b2, 0.05).unwrap();
        ctx.set_elements(input, &[0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0])
            .unwrap();

        let z1 = matmul(ctx, w1, input).unwrap();
        let z1b = add(ctx, z1, b1).unwrap();
        let h = relu(ctx, z1b).unwrap();
        let z2 = matmul(ctx, w2, h).unwrap();
        add(ctx, z2, b2).unwrap()
    }

    #[test]
    fn test_two_layer_network_shapes() {
        let mut ctx = ctx();
        let out = build_two_layer(&mut ctx);
        let report = evaluate(&mut ctx, out, 2).unwrap();
        assert_eq!(report.nodes_executed, 5);
        // One output per batch item.
        assert_eq!(ctx.tensor(out).unwrap().shape().to_vec(), vec![1, 4]);
        assert_eq!(ctx.to_vec_f32(out).unwrap().len(), 4);
    }

    #[test]
    fn test_determinism_across_thread_counts() {
        let reference: Vec<u8> = {
            let mut ctx = ctx();
            let out = build_two_layer(&mut ctx);
            evaluate(&mut ctx, out, 1).unwrap();
            ctx.raw_bytes(out).unwrap().to_vec()
        };
        for threads in [2, 8] {
            let mut ctx = ctx();
            let out = build_two_layer(&mut ctx);
            evaluate(&mut ctx, out, threads).unwrap();
            assert_eq!(
                ctx.raw_bytes(out).unwrap(),
                &reference[..],
                "output differs with {threads} threads"
            );
        }
    }

    #[test]
    fn test_shared_node_computed_once() {
        let mut ctx = ctx();
        let a = ctx.new_tensor(DType::F32, Shape::matrix(2, 2)).unwrap();
        let b = ctx.new_tensor(DType::F32, Shape::matrix(2, 2)).unwrap();
        ctx.fill(a, 3.0).unwrap();
        ctx.fill(b, 2.0).unwrap();

        let x = mul(&mut ctx, a, b).unwrap();
        let left = mul(&mut ctx, a, x).unwrap();
        let right = add(&mut ctx, x, b).unwrap();
        let out = add(&mut ctx, left, right).unwrap();

        let report = evaluate(&mut ctx, out, 2).unwrap();
        // x, left, right, out; x only once even though two nodes consume it.
        assert_eq!(report.nodes_executed, 4);
        assert_eq!(ctx.to_vec_f32(out).unwrap(), vec![26.0; 4]);
    }

    #[test]
    fn test_executor_reuse() {
        let exec = Executor::new(2).unwrap();
        let mut ctx = ctx();
        let a = ctx.new_tensor(DType::F32, Shape::matrix(2, 2)).unwrap();
        let b = ctx.new_tensor(DType::F32, Shape::matrix(2, 2)).unwrap();
        ctx.fill(a, 2.0).unwrap();
        ctx.fill(b, 3.0).unwrap();

        let x = mul(&mut ctx, a, b).unwrap();
        exec.evaluate(&mut ctx, x).unwrap();
        assert_eq!(ctx.to_vec_f32(x).unwrap(), vec![6.0; 4]);

        let y = add(&mut ctx, x, a).unwrap();
        let report = exec.evaluate(&mut ctx, y).unwrap();
        // x is already part of the graph below y and runs again; the pool
        // is the same one both times.
        assert_eq!(report.nodes_executed, 2);
        assert_eq!(ctx.to_vec_f32(y).unwrap(), vec![8.0; 4]);
    }

    #[test]
    fn test_zero_threads_clamps_to_one() {
        let mut ctx = ctx();
        let a = ctx.new_tensor(DType::F32, Shape::vector(4)).unwrap();
        ctx.fill(a, -1.0).unwrap();
        let r = relu(&mut ctx, a).unwrap();
        let report = evaluate(&mut ctx, r, 0).unwrap();
        assert_eq!(report.threads, 1);
        assert_eq!(ctx.to_vec_f32(r).unwrap(), vec![0.0; 4]);
    }

    #[test]
    fn test_stale_terminal_fails() {
        let mut ctx = ctx();
        let a = ctx.new_tensor(DType::F32, Shape::vector(4)).unwrap();
        let r = relu(&mut ctx, a).unwrap();
        ctx.reset();
        let err = evaluate(&mut ctx, r, 1).unwrap_err();
        assert!(matches!(
            err,
            ExecError::Tensor(TensorError::UnknownTensor { .. })
        ));
    }

    #[test]
    fn test_leaf_terminal_executes_nothing() {
        let mut ctx = ctx();
        let a = ctx.new_tensor(DType::F32, Shape::vector(4)).unwrap();
        ctx.fill(a, 7.0).unwrap();
        let report = evaluate(&mut ctx, a, 4).unwrap();
        assert_eq!(report.nodes_executed, 0);
        assert_eq!(ctx.to_vec_f32(a).unwrap(), vec![7.0; 4]);
    }

    #[test]
    fn test_eval_through_view_of_computed() {
        let mut ctx = ctx();
        let a = ctx.new_tensor(DType::F32, Shape::matrix(2, 2)).unwrap();
        let b = ctx.new_tensor(DType::F32, Shape::matrix(2, 2)).unwrap();
        ctx.set_elements(a, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        ctx.fill(b, 10.0).unwrap();

        let x = mul(&mut ctx, a, b).unwrap();
        // First row of x, consumed by a further op.
        let row = ctx.new_view(x, Shape::vector(2), 0).unwrap();
        let out = add(&mut ctx, row, row).unwrap();

        evaluate(&mut ctx, out, 2).unwrap();
        assert_eq!(ctx.to_vec_f32(out).unwrap(), vec![20.0, 40.0]);
    }
}

//! Execution planning: lazy discovery of the dependency DAG.
//!
//! No explicit graph object exists: the graph is implicit in the operand
//! links recorded on each computed tensor. [`ExecPlan::build`] walks those
//! links backward from the terminal tensor in post order, memoized by
//! tensor id, and emits a linear order in which every operand precedes its
//! consumer. Operand ids always reference earlier-created tensors, so the
//! walk is over a DAG by construction and always terminates.

use crate::error::Result;
use std::collections::HashSet;
use tg_tensor::{Context, TensorId};

/// A linearized execution order for the subgraph below one terminal tensor.
#[derive(Debug)]
pub struct ExecPlan {
    nodes: Vec<TensorId>,
}

impl ExecPlan {
    /// Build the plan for `terminal`.
    ///
    /// Each distinct tensor id is visited at most once, so a tensor feeding
    /// several downstream nodes is scheduled exactly once. Leaf tensors are
    /// walked but never scheduled; their bytes are the caller's to
    /// populate before evaluation. A view contributes its source as a
    /// dependency: reading the view means the source must be computed
    /// first.
    ///
    /// Any id that fails to resolve (stale handle after a reset) aborts
    /// planning with `UnknownTensor`.
    pub fn build(ctx: &Context, terminal: TensorId) -> Result<ExecPlan> {
        let mut nodes = Vec::new();
        let mut visited: HashSet<TensorId> = HashSet::new();
        // Iterative post-order; the bool marks "dependencies already pushed".
        let mut stack = vec![(terminal, false)];

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                if ctx.tensor(id)?.op().is_some() {
                    nodes.push(id);
                }
                continue;
            }
            if !visited.insert(id) {
                continue;
            }
            let t = ctx.tensor(id)?;
            stack.push((id, true));
            if let Some(node) = t.op() {
                for &src in &node.srcs {
                    stack.push((src, false));
                }
            }
            if let Some(src) = t.view_of() {
                stack.push((src, false));
            }
        }

        Ok(ExecPlan { nodes })
    }

    /// Scheduled (computed) nodes in execution order.
    pub fn nodes(&self) -> &[TensorId] {
        &self.nodes
    }

    /// Number of scheduled nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if nothing needs computing (the terminal is a leaf or a view
    /// of leaves).
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{add, mul};
    use tg_tensor::{DType, Shape, TensorError};

    fn ctx() -> Context {
        Context::new(1024 * 1024).unwrap()
    }

    fn leaf(ctx: &mut Context) -> TensorId {
        ctx.new_tensor(DType::F32, Shape::matrix(2, 2)).unwrap()
    }

    #[test]
    fn test_leaf_terminal_is_empty_plan() {
        let mut ctx = ctx();
        let a = leaf(&mut ctx);
        let plan = ExecPlan::build(&ctx, a).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_operands_precede_consumers() {
        let mut ctx = ctx();
        let a = leaf(&mut ctx);
        let b = leaf(&mut ctx);
        let x = mul(&mut ctx, a, b).unwrap();
        let y = add(&mut ctx, x, b).unwrap();
        let z = mul(&mut ctx, x, y).unwrap();

        let plan = ExecPlan::build(&ctx, z).unwrap();
        let pos = |id: TensorId| plan.nodes().iter().position(|&n| n == id).unwrap();
        assert_eq!(plan.len(), 3);
        assert!(pos(x) < pos(y));
        assert!(pos(y) < pos(z));
    }

    #[test]
    fn test_shared_subexpression_scheduled_once() {
        let mut ctx = ctx();
        let a = leaf(&mut ctx);
        let b = leaf(&mut ctx);
        let x = mul(&mut ctx, a, b).unwrap();
        // x feeds both sides of the final add.
        let left = mul(&mut ctx, a, x).unwrap();
        let right = add(&mut ctx, x, b).unwrap();
        let out = add(&mut ctx, left, right).unwrap();

        let plan = ExecPlan::build(&ctx, out).unwrap();
        assert_eq!(plan.len(), 4);
        assert_eq!(
            plan.nodes().iter().filter(|&&n| n == x).count(),
            1,
            "shared node must be scheduled exactly once"
        );
    }

    #[test]
    fn test_view_pulls_in_its_source() {
        let mut ctx = ctx();
        let a = leaf(&mut ctx);
        let b = leaf(&mut ctx);
        let x = mul(&mut ctx, a, b).unwrap();
        // A window into the computed tensor; reading it requires x.
        let v = ctx.new_view(x, Shape::vector(2), 0).unwrap();
        let out = add(&mut ctx, v, v).unwrap();

        let plan = ExecPlan::build(&ctx, out).unwrap();
        let pos = |id: TensorId| plan.nodes().iter().position(|&n| n == id).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(pos(x) < pos(out));
    }

    #[test]
    fn test_stale_terminal_is_unknown() {
        let mut ctx = ctx();
        let a = leaf(&mut ctx);
        ctx.reset();
        let err = ExecPlan::build(&ctx, a).unwrap_err();
        assert!(matches!(
            err,
            crate::ExecError::Tensor(TensorError::UnknownTensor { .. })
        ));
    }
}

//! Deferred-execution smoke test: builds `f = a * (a * b) + b` over two
//! f16 4x4 tensors in a 16 MiB context, evaluates it, and dumps the
//! result tensor.

use tg_graph::{add, evaluate, mul};
use tg_tensor::{Context, DType, Shape};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = Context::new(16 * 1024 * 1024)?;

    let a = ctx.new_tensor(DType::F16, Shape::matrix(4, 4))?;
    let b = ctx.new_tensor(DType::F16, Shape::matrix(4, 4))?;
    ctx.set_name(a, "a")?;
    ctx.set_name(b, "b")?;
    ctx.fill(a, 1.5)?;
    ctx.fill(b, 0.25)?;

    let x = mul(&mut ctx, a, b)?;
    ctx.set_name(x, "x")?;
    let ax = mul(&mut ctx, a, x)?;
    let f = add(&mut ctx, ax, b)?;
    ctx.set_name(f, "f")?;

    let report = evaluate(&mut ctx, f, 4)?;
    println!(
        "evaluated {} nodes on {} threads in {:?}",
        report.nodes_executed, report.threads, report.elapsed
    );
    println!("{}", ctx.describe(x)?);
    println!("{}", ctx.describe(f)?);

    Ok(())
}

//! Forward pass of an XOR-shaped network: input(2) → hidden(4, relu) →
//! output(1), run over the four boolean input pairs as one batch.
//!
//! Weights are He-initialized here, outside the engine: the samples are
//! written in through `set_elements`, and the engine never sees the RNG.

use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tg_graph::{add, evaluate, matmul, relu};
use tg_tensor::{Context, DType, Shape, TensorId};

/// He initialization: samples N(0, sqrt(2 / fan_in)) for every element.
fn he_init(
    ctx: &mut Context,
    id: TensorId,
    fan_in: usize,
    rng: &mut impl rand::Rng,
) -> Result<(), Box<dyn std::error::Error>> {
    let numel = ctx.tensor(id)?.shape().numel();
    let dist = Normal::new(0.0f32, (2.0 / fan_in as f32).sqrt())?;
    let samples: Vec<f32> = (0..numel).map(|_| dist.sample(rng)).collect();
    ctx.set_elements(id, &samples)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let mut ctx = Context::new(16 * 1024 * 1024)?;

    // Weights are stored dimension-0-contiguous: w1 holds 4 hidden rows of
    // 2 input weights each.
    let w1 = ctx.new_tensor(DType::F32, Shape::matrix(2, 4))?;
    let b1 = ctx.new_tensor(DType::F32, Shape::matrix(4, 1))?;
    let w2 = ctx.new_tensor(DType::F32, Shape::matrix(4, 1))?;
    let b2 = ctx.new_tensor(DType::F32, Shape::matrix(1, 1))?;
    ctx.set_name(w1, "layers.0.weight")?;
    ctx.set_name(b1, "layers.0.bias")?;
    ctx.set_name(w2, "layers.1.weight")?;
    ctx.set_name(b2, "layers.1.bias")?;

    he_init(&mut ctx, w1, 2, &mut rng)?;
    he_init(&mut ctx, w2, 4, &mut rng)?;
    ctx.fill(b1, 0.0)?;
    ctx.fill(b2, 0.0)?;

    // The four boolean pairs, one per batch column.
    let input = ctx.new_tensor(DType::F32, Shape::matrix(2, 4))?;
    ctx.set_elements(input, &[0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0])?;
    ctx.set_name(input, "input")?;

    let z1 = matmul(&mut ctx, w1, input)?;
    let z1b = add(&mut ctx, z1, b1)?;
    let h = relu(&mut ctx, z1b)?;
    let z2 = matmul(&mut ctx, w2, h)?;
    let output = add(&mut ctx, z2, b2)?;
    ctx.set_name(output, "output")?;

    let report = evaluate(&mut ctx, output, 2)?;
    println!(
        "forward pass: {} nodes on {} threads in {:?}",
        report.nodes_executed, report.threads, report.elapsed
    );

    let values = ctx.to_vec_f32(output)?;
    for (pair, y) in [(0, 0), (0, 1), (1, 0), (1, 1)].iter().zip(&values) {
        println!("{pair:?} -> {y:.4}");
    }

    Ok(())
}

//! Diamond-shaped graph: fetch feeds two transforms, both feed a report.
//!
//! Run with: cargo run --example diamond

use flowgraph_core::Status;
use flowgraph_runtime::{Graph, GraphConfig, PoolConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = GraphConfig::new()
        .with_pool(PoolConfig::new().with_thread_count(4))
        .with_tracing(true);
    let mut graph = Graph::with_config(config);

    let fetch = graph.create_function(
        |ctx| {
            ctx.params().set("payload", vec![3i64, 1, 4, 1, 5]);
            Status::ok()
        },
        &[],
        "fetch",
        1,
        0,
    )?;

    let sum = graph.create_function(
        |ctx| {
            let Some(payload) = ctx.params().get::<Vec<i64>>("payload") else {
                return Status::error("payload missing");
            };
            ctx.params().set("sum", payload.iter().sum::<i64>());
            Status::ok()
        },
        &[fetch],
        "sum",
        1,
        0,
    )?;

    let max = graph.create_function(
        |ctx| {
            let Some(payload) = ctx.params().get::<Vec<i64>>("payload") else {
                return Status::error("payload missing");
            };
            ctx.params().set("max", payload.iter().copied().max().unwrap_or(0));
            Status::ok()
        },
        &[fetch],
        "max",
        1,
        0,
    )?;

    let _report = graph.create_function(
        |ctx| {
            let sum = ctx.params().get::<i64>("sum");
            let max = ctx.params().get::<i64>("max");
            println!("sum = {sum:?}, max = {max:?}");
            Status::ok()
        },
        &[sum, max],
        "report",
        1,
        0,
    )?;

    let status = graph.run();
    println!("graph finished: {status}");
    graph.destroy();
    Ok(())
}

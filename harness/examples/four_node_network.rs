//! Bring up a four-validator network, verify the committee, tear it down.
//!
//! Run with:
//!
//! ```bash
//! RUST_LOG=debug cargo run --example four_node_network
//! ```

use anyhow::Result;
use mesa_harness::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut harness = NetworkHarness::create("four_node_demo", 4, None).await?;
    println!("bootstrap record: {}", harness.bootstrap().record());

    harness.apply_base_snapshots().await?;
    let active = harness.chain().active_validators().await?;
    println!("active committee ({} members):", active.len());
    for address in &active {
        println!("  {address}");
    }

    let nodes = harness.setup().await?;
    println!("{} validator node(s) running", nodes.len());

    harness.stop_nodes(&nodes).await?;
    let report = harness.teardown().await;
    println!("{report}");
    Ok(())
}

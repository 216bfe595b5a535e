// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Plan Emitter
//!
//! Compiles the bastion and production reference topology and prints the
//! create plan as JSON on stdout. Logs go to stderr.
//!
//! Run with: cargo run --bin topology-plan
//!
//! Environment:
//! - `TOPOLOGY_PROVIDER`, `TOPOLOGY_REGION`, `TOPOLOGY_DEFAULT_TAGS`
//! - `TOPOLOGY_DRY_RUN=1` also drives the plan through a logging engine
//! - `RUST_LOG` for log filtering

use anyhow::{Context, Result};
use cim_network_topology::{
    apply_plan, compile, topology::reference, BindingTable, LoggingEngine, PlanConfig,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = PlanConfig::from_env();
    info!("Configuration loaded:");
    info!("  - Provider: {}", config.provider);
    info!("  - Region: {}", config.region);
    info!("  - Default tags: {}", config.default_tags.len());

    let model = reference::bastion_production().context("Failed to declare reference topology")?;
    let plan = compile(&model, &config).context("Failed to compile reference topology")?;
    info!("{}", plan.summary());

    let json = serde_json::to_string_pretty(&plan).context("Failed to serialize plan")?;
    println!("{}", json);

    let dry_run = std::env::var("TOPOLOGY_DRY_RUN")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if dry_run {
        let mut bindings = BindingTable::from_plan(&plan);
        let report = apply_plan(&plan, &LoggingEngine::new(), &mut bindings).await;
        info!(
            "Dry run dispatched {} operation(s); {} deferred key(s) left pending",
            report.succeeded.len(),
            bindings.pending().len()
        );
        for name in bindings.output_names() {
            if let Err(e) = bindings.read_output(name) {
                warn!("Output {}: {}", name, e);
            }
        }
    }

    Ok(())
}

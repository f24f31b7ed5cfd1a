mod aggregate;
mod cli;
mod config;
mod k8s;
mod model;
mod quantity;
mod render;
mod report;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use cli::CliArgs;
use config::Settings;
use k8s::KubeGateway;
use std::io::{self, IsTerminal, Write};
use tokio::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter)?;

    let settings = Settings::resolve(&args)?;
    if let Some(source) = &settings.source {
        debug!(%source, "loaded config file");
    }

    let gateway = KubeGateway::new(
        settings.context.clone(),
        Duration::from_secs(settings.request_timeout_secs),
    )
    .await?;
    let snapshot = gateway.fetch_snapshot().await?;
    info!(
        context = gateway.context(),
        cluster = gateway.cluster(),
        pods = snapshot.pods.len(),
        nodes = snapshot.nodes.len(),
        "fetched cluster snapshot"
    );

    let totals = aggregate::summarize_pods(&snapshot.pods)?;
    let usage = aggregate::summarize_metrics(&snapshot.metrics)?;
    let capacity = aggregate::cluster_capacity(&snapshot.nodes)?;

    let rows = report::build_rows(&totals, &usage, &capacity);
    let sort_key = report::resolve_sort_key(settings.sort_by.as_deref());
    if let Some(key) = sort_key {
        debug!(%key, "sorting namespaces");
    }
    let table = report::assemble_table(rows, sort_key, &capacity);

    let output = if settings.csv {
        render::render_csv(&table)?
    } else {
        let color = settings.color && io::stdout().is_terminal();
        let mut rendered = render::render_table(&table, color, Local::now());
        rendered.push('\n');
        rendered
    };

    let mut stdout = io::stdout().lock();
    stdout
        .write_all(output.as_bytes())
        .and_then(|()| stdout.flush())
        .context("failed to write report")?;
    Ok(())
}

fn init_tracing(level_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("warn"))
        .context("failed to initialize tracing filter")?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(io::stderr)
        .try_init();

    Ok(())
}

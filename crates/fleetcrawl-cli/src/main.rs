// fleetcrawl is an open source distributed web scraping and crawling service.
// Copyright (C) 2026 fleetcrawl contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

mod engine;
mod tenant;
mod wiring;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fleetcrawl_config::Config;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Args {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP surface (scrape, crawl, map routes) plus the
    /// in-process background workers that drain crawl jobs as they're
    /// promoted.
    Serve { config_path: String },

    /// Run only the background worker loop, with no HTTP surface: sweeps
    /// every tenant with a pending queue and retries promotion. Useful as
    /// a horizontally-scaled recovery worker alongside one or more
    /// `serve` instances sharing the same coordination store.
    Worker { config_path: String },
}

fn load_config(path: &str) -> Result<Config> {
    Config::from_file(path).with_context(|| format!("failed to load config from '{path}'"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Serve { config_path } => {
            let config = load_config(&config_path)?;
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(config.server.num_worker_tasks)
                .enable_all()
                .build()?
                .block_on(serve(config))
        }
        Commands::Worker { config_path } => {
            let config = load_config(&config_path)?;
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(config.server.num_worker_tasks)
                .enable_all()
                .build()?
                .block_on(worker(config))
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    PrometheusBuilder::new().install().context("failed to install prometheus metrics exporter")?;

    let bind_addr = config.server.bind_addr;
    let services = wiring::build(&config).await?;
    let app = fleetcrawl_coordinator::router(services.into_app_state());

    let listener = TcpListener::bind(bind_addr).await.with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(%bind_addr, "fleetcrawl coordinator listening");
    axum::serve(listener, app).await.context("http server stopped")?;
    Ok(())
}

/// Drain-only loop: no HTTP surface, just a periodic sweep for jobs that
/// didn't get promoted in-process (e.g. a `serve` instance crashed after
/// enqueueing but before its promotion loop ran).
async fn worker(config: Config) -> Result<()> {
    PrometheusBuilder::new().install().context("failed to install prometheus metrics exporter")?;

    let services = wiring::build(&config).await?;
    tracing::info!("fleetcrawl worker started, draining pending queues");

    loop {
        let swept = services.crawl.drain_pending().await;
        if swept > 0 {
            tracing::debug!(swept, "drain sweep promoted pending tenants");
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

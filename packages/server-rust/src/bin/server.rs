//! `cumulus` binary: parse configuration, build the registry, serve.

use anyhow::Context as _;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

use cumulus_server::cli::Cli;
use cumulus_server::network::{on_signal, NetworkModule};
use cumulus_server::service::build_gateway;
use cumulus_server::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init(&cli.log_level, cli.log_format)?;

    if let Some(addr) = cli.metrics_addr() {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install Prometheus exporter")?;
        info!(%addr, "Prometheus exporter listening");
    }

    let server_config = cli.server_config();
    let gateway = build_gateway(&server_config).context("service registration failed")?;
    info!(
        services = gateway.registry().len(),
        region = %server_config.region,
        "registry ready"
    );

    let mut network = NetworkModule::new(cli.network_config(), gateway);
    let port = network.start().await?;
    info!(port, "cumulus listening");

    network
        .serve(on_signal(tokio::signal::ctrl_c()))
        .await
}

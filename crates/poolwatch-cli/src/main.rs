//! poolwatch binary entrypoint.
//!
//! Follows an access log (or standard input) and raises failover and
//! error-rate alerts.

use std::io::{self, IsTerminal};

use anyhow::Context;
use clap::Parser;
use poolwatch_cli::{Cli, LogFormat, Runner, watch};
use poolwatch_core::StreamProcessor;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = cli.watcher_config();
    let processor = StreamProcessor::new(config.clone())
        .context("invalid configuration")?
        .with_parser(cli.record_parser());
    let dispatcher = cli
        .build_dispatcher()
        .context("failed to set up alert delivery")?;

    let source = if cli.stdin {
        "stdin".to_string()
    } else {
        cli.log_file.display().to_string()
    };
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %serde_json::to_string(&config)?,
        source = %source,
        text_only = cli.text_only,
        sinks = ?dispatcher.sink_names(),
        "starting poolwatch"
    );

    let mut runner = Runner::new(processor, dispatcher);
    watch(&mut runner, cli.line_source(), cli.channel_capacity, shutdown_signal()).await;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("poolwatch=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    match format {
        LogFormat::Text => builder.with_ansi(io::stderr().is_terminal()).init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT, initiating shutdown"),
        () = terminate => info!("received SIGTERM, initiating shutdown"),
    }
}

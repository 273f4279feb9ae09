//! HiPath CDR logger
//!
//! Reads call-detail records from a Siemens HiPath switch's CDR port,
//! decodes them and hands them to the record forwarder. Runs until SIGINT or
//! SIGTERM.

use anyhow::Context;
use hipath_collector::Forwarder;
use hipath_core::config::{LoggingConfig, TransportKind};
use hipath_core::AppConfig;
use hipath_serial::{DeviceTransport, LineDecoder, ReadLoop, ReadLoopConfig, TcpTransport};
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Longest wait for stray tasks once the read loop and forwarder are done
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Initialize tracing/logging
fn init_tracing(logging: &LoggingConfig) {
    let log_level = &logging.level;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "hipath_logger={},hipath_serial={},hipath_collector={}",
            log_level, log_level, log_level
        ))
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    if logging.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init();
    }
}

/// Cancel `cancel` on SIGINT or SIGTERM
async fn watch_signals(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
        _ = cancel.cancelled() => return,
    }

    cancel.cancel();
}

fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;

    let result = runtime.block_on(run());
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn run() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.logging);

    info!("Starting HiPath CDR logger v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = config.validate_all() {
        error!(code = e.error_code(), error = %e, "Invalid configuration");
        return Err(anyhow::Error::new(e).context("Invalid configuration"));
    }

    let decoder = LineDecoder::new(config.decoder.layout.clone(), config.decoder.policy)?;
    info!(
        endpoint = %config.endpoint(),
        policy = ?config.decoder.policy,
        "Configuration loaded"
    );

    let cancel = CancellationToken::new();
    tokio::spawn(watch_signals(cancel.clone()));

    let (queue, rx) = hipath_collector::channel(config.collector.queue_capacity);
    let forwarder = Forwarder::from_config(rx, &config.collector, cancel.clone())
        .context("Failed to create record forwarder")?;
    let forwarder = tokio::spawn(forwarder.run());

    let reader = ReadLoopConfig::from(&config.reader);
    let transport = &config.transport;
    let result = match transport.kind {
        TransportKind::Device => {
            let link = DeviceTransport::new(
                transport.device.clone(),
                transport.baud_rate,
                transport.max_line_length,
            );
            ReadLoop::new(link, decoder, queue, reader, cancel.clone())
                .run()
                .await
        }
        TransportKind::Tcp => {
            let link = TcpTransport::new(
                transport.host.clone(),
                transport.port,
                transport.max_line_length,
            );
            ReadLoop::new(link, decoder, queue, reader, cancel.clone())
                .run()
                .await
        }
    };

    // The forwarder stops once the reader is gone
    cancel.cancel();
    let delivered = forwarder.await.context("Record forwarder task failed")?;

    let stats = result?;
    info!(
        lines = stats.lines_read,
        records = stats.records_pushed,
        rejected = stats.decode_failures,
        reconnects = stats.reconnects,
        delivered = delivered.delivered,
        dropped = delivered.dropped,
        "HiPath CDR logger stopped"
    );

    Ok(())
}

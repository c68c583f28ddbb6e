//! Stage orchestration -- assembly, queue wiring, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `logwire-daemon`.
//! It loads configuration, compiles the framing and dialect patterns once,
//! binds the collectors, builds the dispatcher set, and wires everything
//! together with bounded queues.
//!
//! # Topology
//!
//! ```text
//! TcpCollector ─┐                          ┌─> mpsc<Batch> ─> Dispatcher "nap-0"
//!               ├─> mpsc<Event> ─> Batcher ─┤
//! UdpCollector ─┘                          └─> mpsc<Batch> ─> Dispatcher "nap-1"
//! ```
//!
//! # Shutdown Order (producers first)
//!
//! Every task observes one `CancellationToken`.
//!
//! 1. Collectors stop reading, flush each connection's pending message, and
//!    release their intake senders.
//! 2. The batcher drains the intake queue, flushes its last batch, and drops
//!    the dispatcher queues.
//! 3. Dispatchers publish what is left in their queue and close their broker
//!    connection.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use logwire_core::config::LogwireConfig;
use logwire_core::metrics::{MetricsSink, RecorderSink};
use logwire_dispatch::{Registry, Timeouts};
use logwire_input::{
    Batcher, InputError, Ingest, InputPatterns, Parser, TcpCollector, TcpCollectorConfig,
    UdpCollector, UdpCollectorConfig,
};

use crate::metrics_server;

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: LogwireConfig,
    /// Patterns compiled once and shared by every connection.
    patterns: Arc<InputPatterns>,
    /// Sink every component records counters through.
    metrics: Arc<dyn MetricsSink>,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read, parsed or validated.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = LogwireConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    ///
    /// Installs the Prometheus recorder when `[metrics]` is enabled.
    pub fn build_from_config(config: LogwireConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let patterns = InputPatterns::compile()
            .map_err(|e| anyhow::anyhow!("failed to compile input patterns: {}", e))?;

        tracing::info!(format = %config.input.format, "orchestrator initialized");

        Ok(Self {
            config,
            patterns: Arc::new(patterns),
            metrics: Arc::new(RecorderSink),
        })
    }

    /// Replace the metrics sink (used by tests to observe counters).
    pub fn with_metrics_sink(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &LogwireConfig {
        &self.config
    }

    /// Start all stages, block until SIGTERM/SIGINT, then shut down.
    pub async fn run(self) -> Result<()> {
        let running = self.start().await?;

        tracing::info!("entering main loop");
        let signal = wait_for_shutdown_signal().await?;
        tracing::info!(signal = signal, "shutdown signal received");

        let summary = running.shutdown().await;
        tracing::info!(
            batches = summary.batches,
            published = summary.published,
            "logwire-daemon shut down"
        );
        Ok(())
    }

    /// Bind the collectors and spawn every stage.
    ///
    /// Collectors are running before broker setup begins, and broker setup is
    /// bounded by `dispatch.connect_timeout_secs`. A dispatcher config error or
    /// a broker failure disables dispatch only; collector bind failures are fatal.
    pub async fn start(self) -> Result<RunningDaemon> {
        let Self {
            config,
            patterns,
            metrics,
        } = self;
        let cancel = CancellationToken::new();

        let (intake_tx, intake_rx) = mpsc::channel(config.input.intake_capacity);
        let parser = Parser::from_name(&config.input.format, patterns, Arc::clone(&metrics));
        let ingest = Ingest::new(parser, config.input.max_message_size, intake_tx);

        // Bind before spawning anything so a bind failure leaves nothing running.
        let tcp = if config.input.tcp_bind.is_empty() {
            None
        } else {
            let collector_config = TcpCollectorConfig {
                bind_addr: config.input.tcp_bind.clone(),
                max_connections: config.input.max_connections,
                connection_timeout_secs: config.input.connection_timeout_secs,
            };
            Some(TcpCollector::bind(collector_config, ingest.clone()).await?)
        };
        let udp = if config.input.udp_bind.is_empty() {
            None
        } else {
            let collector_config = UdpCollectorConfig {
                bind_addr: config.input.udp_bind.clone(),
                ..Default::default()
            };
            Some(UdpCollector::bind(collector_config, ingest.clone()).await?)
        };
        drop(ingest);

        // Collectors start reading before broker setup; the bounded intake
        // queue holds events until the batcher is spawned.
        let tcp_addr = tcp.as_ref().map(TcpCollector::local_addr);
        let udp_addr = udp.as_ref().map(UdpCollector::local_addr);
        let mut collectors = Vec::new();
        if let Some(collector) = tcp {
            collectors.push(("tcp", tokio::spawn(collector.run(cancel.clone()))));
        }
        if let Some(collector) = udp {
            collectors.push(("udp", tokio::spawn(collector.run(cancel.clone()))));
        }

        let mut batcher = Batcher::new(
            config.batch.size,
            Duration::from_secs(config.batch.flush_interval_secs),
            Arc::clone(&metrics),
        );

        let mut dispatchers = Vec::new();
        if config.dispatch.enabled {
            let timeouts = Timeouts {
                connect: Duration::from_secs(config.dispatch.connect_timeout_secs),
                publish: Duration::from_secs(config.dispatch.publish_timeout_secs),
            };
            match Registry::load(&config.dispatch.config_path, timeouts, Arc::clone(&metrics))
                .await
            {
                Ok(registry) => {
                    for failure in registry.failures() {
                        tracing::warn!(
                            dispatcher = failure.name.as_str(),
                            error = %failure.error,
                            "dispatcher not started"
                        );
                    }
                    for dispatcher in registry.into_dispatchers() {
                        let name = dispatcher.name().to_owned();
                        let rx = batcher.subscribe(name.clone(), config.batch.queue_capacity);
                        let handle = tokio::spawn(dispatcher.run(rx, cancel.clone()));
                        dispatchers.push((name, handle));
                    }
                }
                Err(e) => {
                    tracing::error!(
                        path = config.dispatch.config_path.as_str(),
                        error = %e,
                        "dispatcher config rejected, dispatch disabled"
                    );
                }
            }
        }
        if dispatchers.is_empty() {
            tracing::info!("no dispatchers running, batches are not published");
        }

        let batcher_task = tokio::spawn(batcher.run(intake_rx, cancel.clone()));

        tracing::info!(
            tcp = ?tcp_addr,
            udp = ?udp_addr,
            dispatchers = dispatchers.len(),
            "logwire-daemon running"
        );

        Ok(RunningDaemon {
            cancel,
            tcp_addr,
            udp_addr,
            collectors,
            batcher: batcher_task,
            dispatchers,
        })
    }
}

/// Handles of a started daemon.
pub struct RunningDaemon {
    cancel: CancellationToken,
    tcp_addr: Option<SocketAddr>,
    udp_addr: Option<SocketAddr>,
    collectors: Vec<(&'static str, JoinHandle<Result<(), InputError>>)>,
    batcher: JoinHandle<u64>,
    dispatchers: Vec<(String, JoinHandle<u64>)>,
}

/// Totals reported after shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownSummary {
    /// Batches flushed by the batcher.
    pub batches: u64,
    /// Events published by all dispatchers.
    pub published: u64,
}

impl RunningDaemon {
    /// Bound TCP address, if the TCP collector is enabled.
    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        self.tcp_addr
    }

    /// Bound UDP address, if the UDP collector is enabled.
    pub fn udp_addr(&self) -> Option<SocketAddr> {
        self.udp_addr
    }

    /// Names of the running dispatchers.
    pub fn dispatcher_names(&self) -> Vec<&str> {
        self.dispatchers.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Cancel every stage and wait for them in producer-first order.
    pub async fn shutdown(self) -> ShutdownSummary {
        self.cancel.cancel();
        let mut summary = ShutdownSummary::default();

        for (name, handle) in self.collectors {
            match handle.await {
                Ok(Ok(())) => tracing::debug!(collector = name, "collector stopped"),
                Ok(Err(e)) => tracing::error!(collector = name, error = %e, "collector failed"),
                Err(e) => tracing::error!(collector = name, error = %e, "collector task panicked"),
            }
        }

        match self.batcher.await {
            Ok(batches) => summary.batches = batches,
            Err(e) => tracing::error!(error = %e, "batcher task panicked"),
        }

        for (name, handle) in self.dispatchers {
            match handle.await {
                Ok(published) => summary.published += published,
                Err(e) => {
                    tracing::error!(dispatcher = name.as_str(), error = %e, "dispatcher task panicked");
                }
            }
        }

        summary
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

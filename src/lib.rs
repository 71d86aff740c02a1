// Module declarations for the application's core components
pub mod channels;    // Inter-component communication channels
pub mod config;      // Configuration management
pub mod coordinator; // Owns the session multiplexer, main receive loop
pub mod device;      // Device keys, sessions and typed device data
pub mod discovery;   // Serial interface discovery
pub mod error;       // Error handling and types
pub mod events;      // Lifecycle events
pub mod multiplexer; // Per-stream accumulators feeding the session store
pub mod options;     // Command line options parsing
pub mod prelude;     // Common imports and types
pub mod reporter;    // Periodic device data reports
pub mod stream;      // Serial device streams
pub mod vedirect;    // VE.Direct text protocol framing

// Get the package version from Cargo.toml
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::prelude::*;
use crate::reporter::Reporter;
use crate::stream::DeviceStream;
use tokio::task::JoinHandle;

/// Sets up env_logger. `RUST_LOG` wins over the configured level.
pub fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    if let Err(e) = env_logger::Builder::from_env(env)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .try_init()
    {
        eprintln!("Failed to initialise logging: {}", e);
    }
}

/// Manages all application components and their lifecycle
///
/// Every task subscribes to its channels before it is spawned, so a stop
/// or close sent right after startup is never missed.
pub struct Components {
    config: ConfigWrapper,
    pub channels: Channels,
    pub coordinator: Coordinator,
    coordinator_task: Option<JoinHandle<()>>,
    streams: Vec<JoinHandle<()>>,
    reporter: Option<JoinHandle<()>>,
}

impl Components {
    /// Starts the coordinator, one stream per discovered interface and the
    /// reporter if configured.
    pub fn start(config: ConfigWrapper, channels: Channels) -> Result<Self> {
        info!("  Creating Coordinator...");
        let coordinator = Coordinator::new(config.clone(), channels.clone());
        let receiver = channels.from_stream.subscribe();
        let coordinator_task = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                if let Err(e) = coordinator.run(receiver).await {
                    error!("Coordinator task failed: {}", e);
                }
            })
        };

        let reporter = config.report_interval().map(|interval| {
            info!("  Creating Reporter (every {}s)...", interval.as_secs());
            let reporter = Reporter::new(coordinator.clone(), interval);
            let to_stream_rx = channels.to_stream.subscribe();
            tokio::spawn(async move {
                if let Err(e) = reporter.start(to_stream_rx).await {
                    error!("Reporter task failed: {}", e);
                }
            })
        });

        let mut components = Self {
            config,
            channels,
            coordinator,
            coordinator_task: Some(coordinator_task),
            streams: Vec::new(),
            reporter,
        };

        if let Err(err) = components.start_streams() {
            components.coordinator.stop_streams();
            components.coordinator.stop();
            return Err(err);
        }

        Ok(components)
    }

    /// Number of stream tasks started and not yet joined.
    pub fn stream_tasks(&self) -> usize {
        self.streams.len()
    }

    fn start_streams(&mut self) -> Result<()> {
        let paths = discovery::device_paths(&self.config, &self.channels)?;
        if paths.is_empty() {
            warn!("No VE.Direct interfaces found");
        }

        info!("  Creating {} device streams...", paths.len());
        for (index, path) in paths.into_iter().enumerate() {
            let handle = self.coordinator.register_stream(&path, index);
            let stream =
                DeviceStream::new(self.config.clone(), self.channels.clone(), handle, path);
            let to_stream_rx = self.channels.to_stream.subscribe();
            self.streams.push(tokio::spawn(async move {
                // errors are reported as events by the stream itself
                let _ = stream.start(to_stream_rx).await;
            }));
        }

        Ok(())
    }

    async fn join_streams(&mut self) {
        for handle in self.streams.drain(..) {
            if let Err(e) = handle.await {
                error!("Error waiting for stream task: {}", e);
            }
        }
    }

    /// Closes every stream, forgets all sessions, then discovers and opens
    /// the interfaces again. `StreamDestroy` is emitted once the old
    /// streams are gone and `StreamInit` again once the new ones deliver.
    pub async fn reset(&mut self) -> Result<()> {
        info!("Resetting device streams...");
        self.coordinator.close_all_streams();
        self.join_streams().await;
        self.channels.emit(Event::StreamDestroy);

        self.coordinator.reset();
        self.start_streams()
    }

    /// Stops streams and waits for them, so their `Disconnected` notices
    /// reach the coordinator before it is stopped. The reporter listens on
    /// `to_stream` and stops with the streams.
    pub async fn stop(&mut self) {
        info!("Stopping all components...");
        self.coordinator.stop_streams();
        self.join_streams().await;

        if let Some(handle) = self.reporter.take() {
            if let Err(e) = handle.await {
                error!("Error waiting for reporter task: {}", e);
            }
        }

        self.coordinator.stop();
        if let Some(handle) = self.coordinator_task.take() {
            if let Err(e) = handle.await {
                error!("Error waiting for coordinator task: {}", e);
            }
        }

        self.coordinator.print_stats();
        self.channels.emit(Event::StreamDestroy);
    }
}

#[cfg(unix)]
async fn reset_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    signal(SignalKind::hangup())?.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn reset_signal() -> Result<()> {
    std::future::pending().await
}

/// Main application entry point
///
/// Runs until `shutdown_rx` fires. On unix a SIGHUP resets the streams and
/// sessions.
pub async fn app(mut shutdown_rx: broadcast::Receiver<()>, config: ConfigWrapper) -> Result<()> {
    info!("vedirect-bridge {} starting", CARGO_PKG_VERSION);
    config.log_summary();

    let mut components = Components::start(config, Channels::new())?;

    info!("Waiting for shutdown signal...");
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            result = reset_signal() => {
                match result {
                    Ok(()) => {
                        if let Err(e) = components.reset().await {
                            error!("Reset failed: {}", e);
                        }
                    }
                    Err(e) => {
                        error!("Failed to listen for SIGHUP: {}", e);
                        let _ = shutdown_rx.recv().await;
                        break;
                    }
                }
            }
        }
    }

    info!("Shutdown signal received, stopping components...");
    components.stop().await;

    info!("Application shutdown complete");
    Ok(())
}

use crate::prelude::*;
use crate::stream::ChannelData;

pub mod stats;

pub use stats::FrameStats;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

type StreamPaths = Arc<Mutex<HashMap<StreamHandle, String>>>;

/// Owns the session multiplexer and feeds it every line the device streams
/// deliver. Observer callbacks are turned into `Event`s on `Channels::events`.
#[derive(Clone)]
pub struct Coordinator {
    channels: Channels,
    multiplexer: Arc<Mutex<SessionMultiplexer>>,
    stream_paths: StreamPaths,
    stream_init_sent: Arc<AtomicBool>,
    pub stats: Arc<Mutex<FrameStats>>,
}

impl Coordinator {
    pub fn new(config: ConfigWrapper, channels: Channels) -> Self {
        let key_policy = config.key_policy();
        info!("Session key policy: {}", key_policy);

        let stats = Arc::new(Mutex::new(FrameStats::default()));
        let stream_paths: StreamPaths = Arc::new(Mutex::new(HashMap::new()));
        let mut multiplexer = SessionMultiplexer::new(key_policy);

        {
            let channels = channels.clone();
            let stats = stats.clone();
            multiplexer.on_merged(move |key: &DeviceKey, snapshot: &SessionSnapshot| {
                if let Ok(mut stats) = stats.lock() {
                    stats.record_merge(key);
                }
                channels.emit(Event::DeviceUpdated {
                    key: key.clone(),
                    snapshot: snapshot.clone(),
                });
            });
        }

        {
            let channels = channels.clone();
            let paths = stream_paths.clone();
            multiplexer.on_ready(move |handle: StreamHandle| {
                let path = path_of(&paths, handle);
                info!("{} ({}) is streaming", handle, path);
                channels.emit(Event::DeviceReady { handle, path });
            });
        }

        {
            let channels = channels.clone();
            let paths = stream_paths.clone();
            let stats = stats.clone();
            multiplexer.on_invalid_frame(move |handle: StreamHandle, reason: &VeDirectError| {
                if let Ok(mut stats) = stats.lock() {
                    stats.record_invalid(reason);
                }
                let path = path_of(&paths, handle);
                warn!("{} ({}): {}", handle, path, reason);
                channels.emit(Event::InvalidFrame {
                    handle,
                    path,
                    reason: reason.to_string(),
                });
            });
        }

        Self {
            channels,
            multiplexer: Arc::new(Mutex::new(multiplexer)),
            stream_paths,
            stream_init_sent: Arc::new(AtomicBool::new(false)),
            stats,
        }
    }

    fn multiplexer(&self) -> MutexGuard<'_, SessionMultiplexer> {
        self.multiplexer.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register_stream(&self, path: &str, index: usize) -> StreamHandle {
        let handle = self.multiplexer().register_stream(path, index);
        if let Ok(mut paths) = self.stream_paths.lock() {
            paths.insert(handle, path.to_string());
        }
        debug!("registered {} for {} (index {})", handle, path, index);
        handle
    }

    /// Asks one stream to stop reading. Its `Disconnected` notice unregisters
    /// it once it has gone.
    pub fn close_stream(&self, handle: StreamHandle) -> Result<()> {
        if self.channels.to_stream.send(ChannelData::Close(handle)).is_err() {
            bail!("send(to_stream) failed - channel closed?");
        }
        Ok(())
    }

    /// Asks every registered stream to stop. Streams that have already
    /// gone are not an error.
    pub fn close_all_streams(&self) {
        for handle in self.multiplexer().stream_handles() {
            let _ = self.channels.to_stream.send(ChannelData::Close(handle));
        }
    }

    /// Forgets every stream and session and re-arms `StreamInit`, so the
    /// next set of registered streams starts from scratch. Late lines or
    /// `Disconnected` notices from the old streams are ignored.
    pub fn reset(&self) {
        let mut multiplexer = self.multiplexer();
        for handle in multiplexer.stream_handles() {
            multiplexer.unregister_stream(handle);
        }
        multiplexer.clear();

        if let Ok(mut paths) = self.stream_paths.lock() {
            paths.clear();
        }
        self.stream_init_sent.store(false, Ordering::SeqCst);
        info!("Coordinator reset");
    }

    /// Processes stream traffic until `stop` is called or every sender has
    /// gone. Takes an existing receiver so callers can subscribe before any
    /// stream starts.
    pub async fn run(&self, mut receiver: broadcast::Receiver<ChannelData>) -> Result<()> {
        use broadcast::error::RecvError;

        loop {
            match receiver.recv().await {
                Ok(ChannelData::Line(handle, line)) => self.process_line(handle, &line),
                Ok(ChannelData::Connected(handle)) => debug!("{} connected", handle),
                Ok(ChannelData::Disconnected(handle)) => self.stream_disconnected(handle),
                Ok(ChannelData::Close(_)) => {}
                Ok(ChannelData::Shutdown) => {
                    info!("Coordinator received shutdown signal");
                    break;
                }
                Err(RecvError::Lagged(count)) => {
                    // any partial frame now has a hole in it
                    warn!("Coordinator lagged, {} lines dropped, discarding partial frames", count);
                    self.multiplexer().reset_accumulators();
                    if let Ok(mut stats) = self.stats.lock() {
                        stats.lines_dropped += count;
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }

        Ok(())
    }

    pub fn process_line(&self, handle: StreamHandle, line: &ProtocolLine) {
        if let Ok(mut stats) = self.stats.lock() {
            stats.lines_received += 1;
        }

        let mut multiplexer = self.multiplexer();
        if let Err(err) = multiplexer.accept_line(handle, line) {
            debug!("{}", err);
            if let Ok(mut stats) = self.stats.lock() {
                stats.unknown_stream_lines += 1;
            }
            return;
        }

        self.maybe_stream_init(&multiplexer);
    }

    fn stream_disconnected(&self, handle: StreamHandle) {
        let mut multiplexer = self.multiplexer();
        if !multiplexer.unregister_stream(handle) {
            return;
        }

        let path = self
            .stream_paths
            .lock()
            .ok()
            .and_then(|mut paths| paths.remove(&handle))
            .unwrap_or_default();
        info!(
            "{} ({}) disconnected, {} streams remain",
            handle,
            path,
            multiplexer.stream_count()
        );

        if let Ok(mut stats) = self.stats.lock() {
            stats.stream_disconnections += 1;
        }

        self.maybe_stream_init(&multiplexer);
    }

    fn maybe_stream_init(&self, multiplexer: &SessionMultiplexer) {
        if multiplexer.all_streams_ready() && !self.stream_init_sent.swap(true, Ordering::SeqCst) {
            info!("All {} streams are delivering data", multiplexer.stream_count());
            self.channels.emit(Event::StreamInit);
        }
    }

    pub fn stop(&self) {
        let _ = self.channels.from_stream.send(ChannelData::Shutdown);
    }

    pub fn stop_streams(&self) {
        let _ = self.channels.to_stream.send(ChannelData::Shutdown);
    }

    pub fn stream_count(&self) -> usize {
        self.multiplexer().stream_count()
    }

    pub fn snapshot_all(&self) -> HashMap<DeviceKey, SessionSnapshot> {
        self.multiplexer().snapshot_all()
    }

    /// Current sessions interpreted per device shape, ordered by key.
    pub fn devices_data(&self) -> BTreeMap<DeviceKey, DeviceData> {
        self.snapshot_all()
            .into_iter()
            .map(|(key, snapshot)| {
                let data = DeviceData::from_snapshot(&snapshot);
                (key, data)
            })
            .collect()
    }

    pub fn clear(&self) {
        self.multiplexer().clear();
    }

    pub fn print_stats(&self) {
        if let Ok(stats) = self.stats.lock() {
            stats.print_summary();
        }
    }
}

fn path_of(paths: &StreamPaths, handle: StreamHandle) -> String {
    paths
        .lock()
        .ok()
        .and_then(|paths| paths.get(&handle).cloned())
        .unwrap_or_default()
}

use crate::config::KeyPolicy;
use crate::device::{self, DeviceKey, SessionSnapshot, SessionStore};
use crate::error::VeDirectError;
use crate::vedirect::{AccumulatorResult, FrameAccumulator, ProtocolLine};

use chrono::{DateTime, Utc};
use std::collections::HashMap;

// StreamHandle {{{
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamHandle(u64);

impl std::fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream#{}", self.0)
    }
} // }}}

// Observers {{{
pub trait ReadyObserver: Send {
    fn on_ready(&mut self, handle: StreamHandle);
}

pub trait InvalidFrameObserver: Send {
    fn on_invalid_frame(&mut self, handle: StreamHandle, reason: &VeDirectError);
}

pub trait MergedObserver: Send {
    fn on_merged(&mut self, key: &DeviceKey, snapshot: &SessionSnapshot);
}

impl<F: FnMut(StreamHandle) + Send> ReadyObserver for F {
    fn on_ready(&mut self, handle: StreamHandle) {
        self(handle)
    }
}

impl<F: FnMut(StreamHandle, &VeDirectError) + Send> InvalidFrameObserver for F {
    fn on_invalid_frame(&mut self, handle: StreamHandle, reason: &VeDirectError) {
        self(handle, reason)
    }
}

impl<F: FnMut(&DeviceKey, &SessionSnapshot) + Send> MergedObserver for F {
    fn on_merged(&mut self, key: &DeviceKey, snapshot: &SessionSnapshot) {
        self(key, snapshot)
    }
} // }}}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamPhase {
    AwaitingFirstFrame,
    Streaming,
}

#[derive(Debug)]
struct StreamState {
    path: String,
    index: usize,
    accumulator: FrameAccumulator,
    phase: StreamPhase,
    key: Option<DeviceKey>,
}

/// Routes lines from every registered stream into the shared session store.
///
/// Each stream gets its own accumulator. Observers run synchronously, in
/// registration order, while the line that triggered them is processed.
pub struct SessionMultiplexer {
    key_policy: KeyPolicy,
    next_handle: u64,
    streams: HashMap<StreamHandle, StreamState>,
    store: SessionStore,
    ready_observers: Vec<Box<dyn ReadyObserver>>,
    invalid_observers: Vec<Box<dyn InvalidFrameObserver>>,
    merged_observers: Vec<Box<dyn MergedObserver>>,
}

impl Default for SessionMultiplexer {
    fn default() -> Self {
        Self::new(KeyPolicy::default())
    }
}

impl SessionMultiplexer {
    pub fn new(key_policy: KeyPolicy) -> Self {
        Self::with_store(key_policy, SessionStore::new())
    }

    pub fn with_store(key_policy: KeyPolicy, store: SessionStore) -> Self {
        Self {
            key_policy,
            next_handle: 0,
            streams: HashMap::new(),
            store,
            ready_observers: Vec::new(),
            invalid_observers: Vec::new(),
            merged_observers: Vec::new(),
        }
    }

    pub fn key_policy(&self) -> KeyPolicy {
        self.key_policy
    }

    pub fn on_ready(&mut self, observer: impl ReadyObserver + 'static) {
        self.ready_observers.push(Box::new(observer));
    }

    pub fn on_invalid_frame(&mut self, observer: impl InvalidFrameObserver + 'static) {
        self.invalid_observers.push(Box::new(observer));
    }

    pub fn on_merged(&mut self, observer: impl MergedObserver + 'static) {
        self.merged_observers.push(Box::new(observer));
    }

    pub fn register_stream(&mut self, path: impl Into<String>, index: usize) -> StreamHandle {
        let handle = StreamHandle(self.next_handle);
        self.next_handle += 1;

        self.streams.insert(
            handle,
            StreamState {
                path: path.into(),
                index,
                accumulator: FrameAccumulator::new(),
                phase: StreamPhase::AwaitingFirstFrame,
                key: None,
            },
        );

        handle
    }

    /// Drops the stream and its partial frame. Sessions it produced stay.
    pub fn unregister_stream(&mut self, handle: StreamHandle) -> bool {
        self.streams.remove(&handle).is_some()
    }

    pub fn stream_path(&self, handle: StreamHandle) -> Option<&str> {
        self.streams.get(&handle).map(|s| s.path.as_str())
    }

    pub fn stream_phase(&self, handle: StreamHandle) -> Option<StreamPhase> {
        self.streams.get(&handle).map(|s| s.phase)
    }

    /// Key currently locked to the stream, if any frame has completed.
    pub fn stream_key(&self, handle: StreamHandle) -> Option<&DeviceKey> {
        self.streams.get(&handle).and_then(|s| s.key.as_ref())
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn stream_handles(&self) -> Vec<StreamHandle> {
        let mut handles: Vec<_> = self.streams.keys().copied().collect();
        handles.sort();
        handles
    }

    /// Drops every stream's partial frame. Call this when lines may have
    /// been lost, so the next frame cannot be spliced onto an older one.
    pub fn reset_accumulators(&mut self) {
        for stream in self.streams.values_mut() {
            stream.accumulator.reset();
        }
    }

    /// True once every registered stream has merged at least one frame.
    pub fn all_streams_ready(&self) -> bool {
        !self.streams.is_empty() && self.streams.values().all(|s| s.phase == StreamPhase::Streaming)
    }

    pub fn accept_line(
        &mut self,
        handle: StreamHandle,
        line: &ProtocolLine,
    ) -> Result<Option<SessionSnapshot>, VeDirectError> {
        self.accept_line_at(handle, line, Utc::now())
    }

    /// As `accept_line`, with the merge timestamp supplied by the caller.
    pub fn accept_line_at(
        &mut self,
        handle: StreamHandle,
        line: &ProtocolLine,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionSnapshot>, VeDirectError> {
        let stream = self
            .streams
            .get_mut(&handle)
            .ok_or(VeDirectError::UnknownStream(handle))?;

        let frame = match stream.accumulator.accept(line) {
            AccumulatorResult::Incomplete => return Ok(None),
            AccumulatorResult::Invalid(reason) => {
                for observer in &mut self.invalid_observers {
                    observer.on_invalid_frame(handle, &reason);
                }
                return Ok(None);
            }
            AccumulatorResult::Complete(frame) => frame,
        };

        let key = match (&stream.key, self.key_policy) {
            (Some(key), KeyPolicy::Locked) => key.clone(),
            _ => device::resolve(&frame, &stream.path, stream.index),
        };
        stream.key = Some(key.clone());

        let first = stream.phase == StreamPhase::AwaitingFirstFrame;
        stream.phase = StreamPhase::Streaming;

        let snapshot = self.store.merge(&key, &frame, now);

        for observer in &mut self.merged_observers {
            observer.on_merged(&key, &snapshot);
        }
        if first {
            for observer in &mut self.ready_observers {
                observer.on_ready(handle);
            }
        }

        Ok(Some(snapshot))
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn snapshot_all(&self) -> HashMap<DeviceKey, SessionSnapshot> {
        self.store.snapshot_all()
    }

    pub fn clear(&mut self) {
        self.store.clear();
    }
}

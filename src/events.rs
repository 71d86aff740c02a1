use crate::device::{DeviceKey, SessionSnapshot};
use crate::multiplexer::StreamHandle;

/// Lifecycle and diagnostic notifications broadcast on `Channels::events`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    InterfaceFound(String),
    ConnectionOpen(String),
    ConnectionError { path: String, message: String },
    /// Every registered stream has delivered its first valid frame.
    StreamInit,
    StreamDestroy,
    DeviceReady { handle: StreamHandle, path: String },
    InvalidFrame { handle: StreamHandle, path: String, reason: String },
    DeviceUpdated { key: DeviceKey, snapshot: SessionSnapshot },
    Error(String),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::InterfaceFound(_) => "interface-found",
            Event::ConnectionOpen(_) => "device-connection-open",
            Event::ConnectionError { .. } => "device-connection-error",
            Event::StreamInit => "stream-init",
            Event::StreamDestroy => "stream-destroy",
            Event::DeviceReady { .. } => "device-ready",
            Event::InvalidFrame { .. } => "invalid-frame",
            Event::DeviceUpdated { .. } => "device-updated",
            Event::Error(_) => "error",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Event::InterfaceFound(path) => {
                format!("Found VE.Direct serial port interface {}", path)
            }
            Event::ConnectionOpen(path) => {
                format!("VE.Direct device connected through serial port {}", path)
            }
            Event::ConnectionError { path, message } => {
                format!("VE.Direct device connection error on {}: {}", path, message)
            }
            Event::StreamInit => "VE.Direct devices data stream init".to_string(),
            Event::StreamDestroy => "VE.Direct devices data stream has been destroyed".to_string(),
            Event::DeviceReady { handle, path } => {
                format!("{} ({}) delivered its first frame", handle, path)
            }
            Event::InvalidFrame { handle, path, reason } => {
                format!("{} ({}) discarded frame: {}", handle, path, reason)
            }
            Event::DeviceUpdated { key, .. } => format!("device {} updated", key),
            Event::Error(message) => message.clone(),
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.name(), self.message())
    }
}

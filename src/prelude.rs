pub use anyhow::{anyhow, bail, Error, Result};
pub use log::{debug, error, info, trace, warn};
pub use std::io::Write;
pub use std::str::FromStr;
pub use tokio::sync::broadcast;

pub use crate::channels::Channels;
pub use crate::config::{self, Config, ConfigWrapper, KeyPolicy};
pub use crate::coordinator::{self, Coordinator};
pub use crate::device::{DeviceData, DeviceKey, SessionSnapshot, SessionStore};
pub use crate::error::VeDirectError;
pub use crate::events::{self, Event};
pub use crate::multiplexer::{SessionMultiplexer, StreamHandle};
pub use crate::options::Options;
pub use crate::vedirect::{self, Frame, ProtocolLine};
pub use crate::{file_error, file_error_with_source};

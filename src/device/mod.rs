pub mod data;
pub mod identity;
pub mod session;

pub use data::{BatteryMonitorData, DeviceData, DeviceShape, MpptData, UnsupportedData};
pub use identity::{resolve, DeviceKey};
pub use session::{SessionSnapshot, SessionStore};

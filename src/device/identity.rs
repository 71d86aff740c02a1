use crate::error::VeDirectError;
use crate::vedirect::{Frame, SERIAL_NUMBER_LABEL};

use serde::{Serialize, Serializer};

const CABLE_ID_MARKER: &str = "Direct_cable_";
const UNKNOWN_DEVICE_PREFIX: &str = "unknown_id_victron_device-";

// DeviceKey {{{
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceKey(String);

impl DeviceKey {
    pub fn new(key: impl Into<String>) -> Result<Self, VeDirectError> {
        let key = key.into();
        if key.is_empty() {
            return Err(VeDirectError::UnresolvableStream);
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for DeviceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DeviceKey {
    type Err = VeDirectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for DeviceKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
} // }}}

/// Picks the key a frame's data is stored under.
///
/// In order: the frame's own `SER#` field, the id embedded in a
/// `...Direct_cable_<ID>-...` device path, then a key synthesized from the
/// stream index. Always yields a non-empty key.
pub fn resolve(frame: &Frame, stream_path: &str, stream_index: usize) -> DeviceKey {
    if let Some(serial) = frame.get(SERIAL_NUMBER_LABEL).filter(|s| !s.is_empty()) {
        return DeviceKey(serial.to_string());
    }

    if let Some(cable_id) = cable_id(stream_path) {
        return DeviceKey(cable_id.to_string());
    }

    DeviceKey(format!("{}{}", UNKNOWN_DEVICE_PREFIX, stream_index))
}

fn cable_id(path: &str) -> Option<&str> {
    let start = path.find(CABLE_ID_MARKER)? + CABLE_ID_MARKER.len();
    let rest = &path[start..];
    let id = rest.split('-').next().unwrap_or_default();
    (!id.is_empty()).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CABLE_PATH: &str =
        "/dev/serial/by-id/usb-VictronEnergy_BV_VE_Direct_cable_ABC123-if00-port0";

    #[test]
    fn serial_number_wins_over_cable_path() {
        let frame = Frame::from_fields([("SER#", "HQ1234"), ("SOC", "87")]);
        assert_eq!(resolve(&frame, CABLE_PATH, 0).as_str(), "HQ1234");
    }

    #[test]
    fn falls_back_to_cable_id() {
        let frame = Frame::from_fields([("SOC", "87")]);
        assert_eq!(resolve(&frame, ".../Direct_cable_ABC123-if00", 0).as_str(), "ABC123");
        assert_eq!(resolve(&frame, CABLE_PATH, 5).as_str(), "ABC123");
    }

    #[test]
    fn empty_serial_number_is_ignored() {
        let frame = Frame::from_fields([("SER#", ""), ("SOC", "87")]);
        assert_eq!(resolve(&frame, CABLE_PATH, 0).as_str(), "ABC123");
    }

    #[test]
    fn cable_id_runs_to_end_of_path() {
        let frame = Frame::default();
        assert_eq!(resolve(&frame, "/dev/Direct_cable_XYZ", 1).as_str(), "XYZ");
    }

    #[test]
    fn synthesizes_key_from_index() {
        let frame = Frame::from_fields([("SOC", "87")]);
        assert_eq!(resolve(&frame, "/dev/ttyUSB0", 2).as_str(), "unknown_id_victron_device-2");
        // marker present but the id is empty
        assert_eq!(
            resolve(&frame, "/dev/Direct_cable_-if00", 3).as_str(),
            "unknown_id_victron_device-3"
        );
    }

    #[test]
    fn resolve_never_yields_unresolvable() {
        let frames = [Frame::default(), Frame::from_fields([("SER#", "")])];
        for frame in &frames {
            for path in ["", "Direct_cable_", "Direct_cable_-", "/dev/ttyUSB0"] {
                let key = resolve(frame, path, 0);
                assert!(!key.as_str().is_empty());
                assert!(DeviceKey::new(key.as_str()).is_ok());
            }
        }
    }

    #[test]
    fn empty_key_is_unresolvable() {
        assert_eq!(DeviceKey::new(""), Err(VeDirectError::UnresolvableStream));
        assert_eq!("HQ1234".parse::<DeviceKey>().unwrap().as_str(), "HQ1234");
    }
}

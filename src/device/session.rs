use crate::device::DeviceKey;
use crate::vedirect::Frame;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Point-in-time copy of a device's merged state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub fields: BTreeMap<String, String>,
    pub last_update: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn get(&self, label: &str) -> Option<&str> {
        self.fields.get(label).map(String::as_str)
    }
}

#[derive(Debug)]
struct DeviceSession {
    fields: BTreeMap<String, String>,
    last_update: DateTime<Utc>,
}

impl DeviceSession {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            fields: self.fields.clone(),
            last_update: self.last_update,
        }
    }
}

/// Merged state of every device seen since start (or the last `clear`).
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<DeviceKey, DeviceSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a frame into the session for `key`, creating it if needed.
    ///
    /// Fields missing from `frame` keep their previous values. The session
    /// timestamp is refreshed even if nothing changed, and never moves
    /// backwards.
    pub fn merge(&mut self, key: &DeviceKey, frame: &Frame, now: DateTime<Utc>) -> SessionSnapshot {
        let session = self
            .sessions
            .entry(key.clone())
            .or_insert_with(|| DeviceSession {
                fields: BTreeMap::new(),
                last_update: now,
            });

        for field in frame.fields() {
            session.fields.insert(field.label.clone(), field.value.clone());
        }
        session.last_update = session.last_update.max(now);

        session.snapshot()
    }

    pub fn get(&self, key: &DeviceKey) -> Option<SessionSnapshot> {
        self.sessions.get(key).map(DeviceSession::snapshot)
    }

    pub fn contains(&self, key: &DeviceKey) -> bool {
        self.sessions.contains_key(key)
    }

    pub fn snapshot_all(&self) -> HashMap<DeviceKey, SessionSnapshot> {
        self.sessions
            .iter()
            .map(|(key, session)| (key.clone(), session.snapshot()))
            .collect()
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

use std::time::{SystemTime, UNIX_EPOCH};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all="lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reminder {
    pub item: String,
    pub timestamp: u64,
    pub priority: Priority,
}

impl Reminder {
    pub fn now(item: impl Into<String>, priority: Priority) -> Self {
        Reminder {
            item: item.into(),
            timestamp: unix_time(),
            priority,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all="lowercase")]
pub enum Presence {
    Online,
    Offline
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceStatus {
    pub device_id: String,
    pub status: Presence,
}

impl DeviceStatus {
    pub fn new(device_id: impl Into<String>, status: Presence) -> Self {
        DeviceStatus {
            device_id: device_id.into(),
            status,
        }
    }
}

/// Anything published on the command topic. Parsing never fails.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Json(serde_json::Value),
    Text(String),
    Binary(Vec<u8>),
}

impl Command {
    pub fn parse(payload: &[u8]) -> Command {
        if let Ok(value) = serde_json::from_slice::<serde_json::Value>(payload) {
            return Command::Json(value);
        }
        match std::str::from_utf8(payload) {
            Ok(text) => Command::Text(text.to_string()),
            Err(_) => Command::Binary(payload.to_vec()),
        }
    }
}

pub fn to_json<T: Serialize>(value: &T) -> Vec<u8> {
    // plain structs of strings and unit enums always serialize
    serde_json::to_vec(value).unwrap_or_default()
}

fn unix_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

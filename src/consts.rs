//! Broker connection table for the item reminder device.

pub const MQTT_BROKER: &str = "85e1b192f896482fa682320d8d591396.s1.eu.hivemq.cloud";
pub const MQTT_PORT: u16 = 8883_u16;
pub const MQTT_WEBSOCKET_PORT: u16 = 8884_u16;
pub const MQTT_USE_TLS: bool = true;

/// Injected at build time, e.g. `MQTT_USERNAME=... cargo build`. Unset means anonymous.
pub const MQTT_USERNAME: Option<&str> = option_env!("MQTT_USERNAME");
pub const MQTT_PASSWORD: Option<&str> = option_env!("MQTT_PASSWORD");

pub const MQTT_TOPIC_REMINDER: &str = "itemreminder/notification";
pub const MQTT_TOPIC_STATUS: &str = "itemreminder/status";
pub const MQTT_TOPIC_COMMAND: &str = "itemreminder/command";

pub const MQTT_WEBSOCKET_PATH: &str = "/mqtt";
pub const DEFAULT_DEVICE_ID: &str = "ESP32_001";
pub const CLIENT_ID_PREFIX: &str = "itemreminder_";

pub const MQTT_KEEPALIVE_TIME: u64 = 60_u64;
pub const MQTT_THREAD_CHANNEL_CAPACITY: usize = 32_usize;
pub const MQTT_POLL_INTERVAL_MILLIS: u64 = 250_u64;
pub const MQTT_RECONNECT_DELAY_MILLIS: u64 = 1000_u64;
pub const MQTT_PUBLISH_TIMEOUT_SECS: u64 = 3_u64;

pub const REMINDER_INTERVAL_SECS: u64 = 30_u64;

pub const MPSC_BUFFER_SIZE: usize = 512_usize;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_table_matches_device_header() {
        assert_eq!(MQTT_BROKER, "85e1b192f896482fa682320d8d591396.s1.eu.hivemq.cloud");
        assert_eq!(MQTT_PORT, 8883);
        assert_eq!(MQTT_WEBSOCKET_PORT, 8884);
        assert!(MQTT_USE_TLS);
        assert_eq!(MQTT_TOPIC_REMINDER, "itemreminder/notification");
        assert_eq!(MQTT_TOPIC_STATUS, "itemreminder/status");
        assert_eq!(MQTT_TOPIC_COMMAND, "itemreminder/command");
    }

    #[test]
    fn ports_are_usable() {
        for port in [MQTT_PORT, MQTT_WEBSOCKET_PORT] {
            assert!(port >= 1);
        }
        assert_ne!(MQTT_PORT, MQTT_WEBSOCKET_PORT);
    }

    #[test]
    fn topics_are_hierarchical() {
        for topic in [MQTT_TOPIC_REMINDER, MQTT_TOPIC_STATUS, MQTT_TOPIC_COMMAND] {
            assert!(!topic.is_empty());
            assert!(!topic.chars().any(char::is_whitespace));
            assert!(topic.split('/').count() > 1);
            assert!(topic.split('/').all(|s| !s.is_empty()));
        }
    }

    #[test]
    fn websocket_path_is_absolute() {
        assert!(MQTT_WEBSOCKET_PATH.starts_with('/'));
    }
}

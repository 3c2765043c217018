use std::fs;
use std::path::Path;
use serde::Deserialize;
use crate::consts::{
    CLIENT_ID_PREFIX, DEFAULT_DEVICE_ID, MQTT_BROKER, MQTT_PASSWORD, MQTT_PORT,
    MQTT_TOPIC_COMMAND, MQTT_TOPIC_REMINDER, MQTT_TOPIC_STATUS, MQTT_USERNAME, MQTT_USE_TLS,
    MQTT_WEBSOCKET_PATH, MQTT_WEBSOCKET_PORT, REMINDER_INTERVAL_SECS,
};
use crate::errors::ConfigError;
use crate::payload::Priority;

pub const CONFIG_FILE_ENV: &str = "CONFIG_FILE_PATH";
pub const DEFAULT_CONFIG_FILE: &str = "./config.yaml";

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all="lowercase")]
pub enum Transport {
    #[default]
    Tcp,
    Websocket
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: Option<String>,
    pub device_id: String,
    pub broker: BrokerSettings,
    pub topics: Topics,
    pub reminders: ReminderSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrokerSettings {
    pub address: String,
    pub port: u16,
    pub websocket_port: u16,
    pub use_tls: bool,
    pub transport: Transport,
    pub client_name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Topics {
    pub reminder: String,
    pub status: String,
    pub command: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReminderSettings {
    pub interval_secs: u64,
    pub priority: Priority,
    pub items: Vec<String>,
}

/// What the broker session authenticates with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Anonymous,
    Login {
        username: String,
        password: Option<String>,
    },
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            log_level: None,
            device_id: DEFAULT_DEVICE_ID.to_string(),
            broker: BrokerSettings::default(),
            topics: Topics::default(),
            reminders: ReminderSettings::default(),
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        BrokerSettings {
            address: MQTT_BROKER.to_string(),
            port: MQTT_PORT,
            websocket_port: MQTT_WEBSOCKET_PORT,
            use_tls: MQTT_USE_TLS,
            transport: Transport::Tcp,
            client_name: None,
            username: MQTT_USERNAME.map(String::from),
            password: MQTT_PASSWORD.map(String::from),
        }
    }
}

impl Default for Topics {
    fn default() -> Self {
        Topics {
            reminder: MQTT_TOPIC_REMINDER.to_string(),
            status: MQTT_TOPIC_STATUS.to_string(),
            command: MQTT_TOPIC_COMMAND.to_string(),
        }
    }
}

impl Default for ReminderSettings {
    fn default() -> Self {
        ReminderSettings {
            interval_secs: REMINDER_INTERVAL_SECS,
            priority: Priority::Medium,
            items: vec![],
        }
    }
}

impl AppConfig {
    /// Resolves the running configuration: file (if any), then environment, then validation.
    pub fn load() -> Result<Self, ConfigError> {
        AppConfig::load_from(std::env::var(CONFIG_FILE_ENV).ok(), |var| std::env::var(var).ok())
    }

    pub fn load_from<F>(cfg_file: Option<String>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = match cfg_file {
            Some(path) => AppConfig::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => AppConfig::from_file(DEFAULT_CONFIG_FILE)?,
            None => AppConfig::default(),
        };
        cfg.apply_env(lookup)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file<P: AsRef<Path>>(cfg_file: P) -> Result<Self, ConfigError> {
        let path = cfg_file.as_ref();
        let yaml = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        AppConfig::from_yaml(&yaml)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // an empty document deserializes to unit, not to a mapping
        if yaml.trim().is_empty() {
            return Ok(AppConfig::default());
        }
        let cfg: AppConfig = serde_yaml::from_str(yaml)?;
        Ok(cfg)
    }

    /// Runtime environment wins over both the file and build-time secrets.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(address) = lookup("MQTT_BROKER") {
            self.broker.address = address;
        }
        if let Some(port) = lookup("MQTT_PORT") {
            self.broker.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "MQTT_PORT",
                value: port.clone(),
            })?;
        }
        if let Some(username) = lookup("MQTT_USERNAME").or_else(|| lookup("MQTT_USER")) {
            self.broker.username = Some(username);
        }
        if let Some(password) = lookup("MQTT_PASSWORD") {
            self.broker.password = Some(password);
        }
        if let Some(device_id) = lookup("DEVICE_ID") {
            self.device_id = device_id;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let address = &self.broker.address;
        if address.is_empty() || address.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidHost(address.clone()));
        }
        let device_id = &self.device_id;
        if device_id.is_empty() || device_id.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidDeviceId(device_id.clone()));
        }
        if self.broker.port == 0 {
            return Err(ConfigError::InvalidPort { name: "port" });
        }
        if self.broker.websocket_port == 0 {
            return Err(ConfigError::InvalidPort { name: "websocket_port" });
        }
        for (name, topic) in [
            ("reminder", &self.topics.reminder),
            ("status", &self.topics.status),
            ("command", &self.topics.command),
        ] {
            validate_topic(topic).map_err(|reason| ConfigError::InvalidTopic {
                name,
                topic: topic.clone(),
                reason,
            })?;
        }
        if self.reminders.interval_secs == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        if let Credentials::Anonymous = self.credentials() {
            if non_empty(&self.broker.password).is_some() {
                return Err(ConfigError::PasswordWithoutUsername);
            }
        }
        Ok(())
    }

    /// Empty strings count as unset.
    pub fn credentials(&self) -> Credentials {
        match non_empty(&self.broker.username) {
            None => Credentials::Anonymous,
            Some(username) => Credentials::Login {
                username: username.to_string(),
                password: non_empty(&self.broker.password).map(String::from),
            },
        }
    }

    pub fn client_id(&self) -> String {
        match non_empty(&self.broker.client_name) {
            Some(name) => name.to_string(),
            None => format!("{}{}", CLIENT_ID_PREFIX, self.device_id),
        }
    }

    pub fn active_port(&self) -> u16 {
        match self.broker.transport {
            Transport::Tcp => self.broker.port,
            Transport::Websocket => self.broker.websocket_port,
        }
    }

    pub fn connection_url(&self) -> String {
        let b = &self.broker;
        match b.transport {
            Transport::Tcp => format!("{}:{}", b.address, b.port),
            Transport::Websocket => {
                let scheme = if b.use_tls { "wss" } else { "ws" };
                format!("{}://{}:{}{}", scheme, b.address, b.websocket_port, MQTT_WEBSOCKET_PATH)
            }
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Checks a concrete (non-wildcard) topic name.
pub fn validate_topic(topic: &str) -> Result<(), &'static str> {
    if topic.is_empty() {
        return Err("topic is empty");
    }
    if topic.chars().any(char::is_whitespace) {
        return Err("topic contains whitespace");
    }
    if topic.contains('\0') {
        return Err("topic contains a NUL character");
    }
    if topic.contains(['+', '#']) {
        return Err("topic contains a wildcard");
    }
    if topic.split('/').any(str::is_empty) {
        return Err("topic has an empty segment");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    fn anonymous() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.broker.username = None;
        cfg.broker.password = None;
        cfg
    }

    #[test]
    fn defaults_follow_constant_table() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.broker.address, MQTT_BROKER);
        assert_eq!(cfg.broker.port, 8883);
        assert_eq!(cfg.broker.websocket_port, 8884);
        assert!(cfg.broker.use_tls);
        assert_eq!(cfg.broker.transport, Transport::Tcp);
        assert_eq!(cfg.topics.reminder, "itemreminder/notification");
        assert_eq!(cfg.topics.status, "itemreminder/status");
        assert_eq!(cfg.topics.command, "itemreminder/command");
        assert_eq!(cfg.reminders.interval_secs, 30);
    }

    #[test]
    fn missing_credentials_load_as_anonymous() {
        let cfg = anonymous();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.credentials(), Credentials::Anonymous);
    }

    #[test]
    fn empty_credentials_count_as_unset() {
        let mut cfg = anonymous();
        cfg.broker.username = Some("".into());
        cfg.broker.password = Some("".into());
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.credentials(), Credentials::Anonymous);
    }

    #[test]
    fn password_without_username_is_rejected() {
        let mut cfg = anonymous();
        cfg.broker.password = Some("hunter2".into());
        assert!(matches!(cfg.validate(), Err(ConfigError::PasswordWithoutUsername)));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = r#"
log_level: debug
broker:
  username: device
  password: secret
topics:
  command: itemreminder/command/esp32
"#;
        let cfg = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(cfg.log_level.as_deref(), Some("debug"));
        assert_eq!(cfg.broker.address, MQTT_BROKER);
        assert_eq!(cfg.broker.port, MQTT_PORT);
        assert_eq!(cfg.topics.status, MQTT_TOPIC_STATUS);
        assert_eq!(cfg.topics.command, "itemreminder/command/esp32");
        assert_eq!(
            cfg.credentials(),
            Credentials::Login {
                username: "device".into(),
                password: Some("secret".into())
            }
        );
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(AppConfig::from_yaml("").unwrap(), AppConfig::default());
    }

    #[test]
    fn yaml_rejects_out_of_range_port() {
        assert!(AppConfig::from_yaml("broker:\n  port: 70000\n").is_err());
    }

    #[test]
    fn yaml_parses_transport_and_priority() {
        let yaml = "broker:\n  transport: websocket\nreminders:\n  priority: high\n  items: [Keys]\n";
        let cfg = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(cfg.broker.transport, Transport::Websocket);
        assert_eq!(cfg.reminders.priority, Priority::High);
        assert_eq!(cfg.reminders.items, vec!["Keys".to_string()]);
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut cfg = anonymous();
        cfg.broker.port = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidPort { name: "port" })));
        let mut cfg = anonymous();
        cfg.broker.websocket_port = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidPort { name: "websocket_port" })
        ));
    }

    #[test]
    fn bad_topics_are_rejected() {
        for bad in ["", "item reminder/status", "itemreminder/#", "itemreminder/+/x", "itemreminder//status"] {
            let mut cfg = anonymous();
            cfg.topics.status = bad.to_string();
            assert!(
                matches!(cfg.validate(), Err(ConfigError::InvalidTopic { name: "status", .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn bad_host_is_rejected() {
        let mut cfg = anonymous();
        cfg.broker.address = "".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidHost(_))));
    }

    #[test]
    fn bad_device_id_is_rejected() {
        for bad in ["", "ESP32 001", "ESP32_001\n"] {
            let mut cfg = anonymous();
            cfg.device_id = bad.to_string();
            assert!(
                matches!(cfg.validate(), Err(ConfigError::InvalidDeviceId(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn loading_without_credentials_is_anonymous() {
        let path = std::env::temp_dir().join(format!("itemreminder-anon-{}.yaml", std::process::id()));
        std::fs::write(&path, "log_level: info\nbroker:\n  username: ~\n  password: ~\n").unwrap();
        let cfg = AppConfig::load_from(Some(path.display().to_string()), env(&[])).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(cfg.credentials(), Credentials::Anonymous);
        assert_eq!(cfg.broker.address, MQTT_BROKER);
    }

    #[test]
    fn loading_defaults_follows_build_time_credentials() {
        let mut cfg = AppConfig::from_yaml("").unwrap();
        cfg.apply_env(env(&[])).unwrap();
        assert!(cfg.validate().is_ok());
        let expected = match MQTT_USERNAME.filter(|u| !u.is_empty()) {
            None => Credentials::Anonymous,
            Some(username) => Credentials::Login {
                username: username.to_string(),
                password: MQTT_PASSWORD.filter(|p| !p.is_empty()).map(String::from),
            },
        };
        assert_eq!(cfg.credentials(), expected);
    }

    #[test]
    fn loading_a_missing_file_fails_cleanly() {
        let err = AppConfig::load_from(Some("/nonexistent/itemreminder.yaml".into()), env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut cfg = AppConfig::from_yaml("broker:\n  username: from_file\n").unwrap();
        cfg.apply_env(env(&[
            ("MQTT_BROKER", "localhost"),
            ("MQTT_PORT", "1883"),
            ("MQTT_USER", "from_env"),
            ("MQTT_PASSWORD", "pw"),
            ("DEVICE_ID", "ESP32_002"),
        ]))
        .unwrap();
        assert_eq!(cfg.broker.address, "localhost");
        assert_eq!(cfg.broker.port, 1883);
        assert_eq!(cfg.device_id, "ESP32_002");
        assert_eq!(
            cfg.credentials(),
            Credentials::Login {
                username: "from_env".into(),
                password: Some("pw".into())
            }
        );
    }

    #[test]
    fn mqtt_username_takes_precedence_over_alias() {
        let mut cfg = anonymous();
        cfg.apply_env(env(&[("MQTT_USERNAME", "primary"), ("MQTT_USER", "alias")]))
            .unwrap();
        assert_eq!(cfg.broker.username.as_deref(), Some("primary"));
    }

    #[test]
    fn bad_port_env_is_an_error() {
        let mut cfg = anonymous();
        let err = cfg.apply_env(env(&[("MQTT_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: "MQTT_PORT", .. }));
    }

    #[test]
    fn connection_urls() {
        let mut cfg = anonymous();
        assert_eq!(cfg.connection_url(), format!("{MQTT_BROKER}:8883"));
        assert_eq!(cfg.active_port(), 8883);
        cfg.broker.transport = Transport::Websocket;
        assert_eq!(cfg.connection_url(), format!("wss://{MQTT_BROKER}:8884/mqtt"));
        assert_eq!(cfg.active_port(), 8884);
        cfg.broker.use_tls = false;
        assert_eq!(cfg.connection_url(), format!("ws://{MQTT_BROKER}:8884/mqtt"));
    }

    #[test]
    fn client_id_derives_from_device() {
        let mut cfg = anonymous();
        assert_eq!(cfg.client_id(), "itemreminder_ESP32_001");
        cfg.broker.client_name = Some("ItemReminder_Python_001".into());
        assert_eq!(cfg.client_id(), "ItemReminder_Python_001");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = AppConfig::from_file("/nonexistent/itemreminder.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

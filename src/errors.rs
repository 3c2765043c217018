use thiserror::Error;

#[derive(Error,Clone,Debug)]
pub enum MQTTError {
    #[error("MQTT Error: {0}")]
    Misc(String),
    #[error("Subscription rejected for topic {0}")]
    Subscribe(String),
    #[error("Received request for thread exit")]
    ExitingThread
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("{name} must be a port between 1 and 65535")]
    InvalidPort { name: &'static str },
    #[error("invalid broker address {0:?}")]
    InvalidHost(String),
    #[error("invalid device id {0:?}")]
    InvalidDeviceId(String),
    #[error("invalid {name} topic {topic:?}: {reason}")]
    InvalidTopic {
        name: &'static str,
        topic: String,
        reason: &'static str,
    },
    #[error("a password was configured without a username")]
    PasswordWithoutUsername,
    #[error("invalid value {value:?} for environment variable {var}")]
    InvalidEnv { var: &'static str, value: String },
    #[error("reminder interval must be greater than zero")]
    InvalidInterval,
}

use std::time::Duration;
use rumqttc::{AsyncClient, EventLoop, LastWill, MqttOptions, QoS};
use crate::config_file::{AppConfig, Credentials, Transport};
use crate::consts::{MQTT_KEEPALIVE_TIME, MQTT_THREAD_CHANNEL_CAPACITY};
use crate::payload::{to_json, DeviceStatus, Presence};

pub struct MqttConnection {
    pub client: AsyncClient,
    pub event_loop: EventLoop,
}

impl MqttConnection {
    pub fn create(cfg: &AppConfig) -> Self {
        let options = mqtt_options(cfg);
        let (client, event_loop) = AsyncClient::new(options, MQTT_THREAD_CHANNEL_CAPACITY);
        MqttConnection { client, event_loop }
    }
}

pub fn mqtt_options(cfg: &AppConfig) -> MqttOptions {
    let host = match cfg.broker.transport {
        Transport::Tcp => cfg.broker.address.clone(),
        // rumqttc takes the whole url as the host for websockets
        Transport::Websocket => cfg.connection_url(),
    };
    let mut options = MqttOptions::new(cfg.client_id(), host, cfg.active_port());
    options.set_keep_alive(Duration::from_secs(MQTT_KEEPALIVE_TIME));
    options.set_clean_session(true);

    match cfg.credentials() {
        Credentials::Anonymous => {
            warn!("No MQTT credentials configured, connecting to {} anonymously", cfg.connection_url());
        }
        Credentials::Login { username, password } => {
            debug!("Authenticating to MQTT broker as {}", username);
            options.set_credentials(username, password.unwrap_or_default());
        }
    }

    let will = DeviceStatus::new(cfg.device_id.clone(), Presence::Offline);
    options.set_last_will(LastWill::new(
        cfg.topics.status.clone(),
        to_json(&will),
        QoS::AtLeastOnce,
        true,
    ));

    options.set_transport(transport(cfg));
    options
}

fn transport(cfg: &AppConfig) -> rumqttc::Transport {
    match (cfg.broker.transport, cfg.broker.use_tls) {
        (Transport::Tcp, false) => rumqttc::Transport::Tcp,
        (Transport::Tcp, true) => rumqttc::Transport::tls_with_default_config(),
        (Transport::Websocket, false) => rumqttc::Transport::Ws,
        (Transport::Websocket, true) => rumqttc::Transport::wss_with_default_config(),
    }
}

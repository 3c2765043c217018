use crate::config_file::AppConfig;
use crate::consts::{MQTT_POLL_INTERVAL_MILLIS, MQTT_PUBLISH_TIMEOUT_SECS, MQTT_RECONNECT_DELAY_MILLIS};
use crate::errors::MQTTError;
use crate::ipc::{IPCMessage, LeafCommunication, MqttMessage};
use crate::mqtt_connection::MqttConnection;
use crate::payload::{to_json, DeviceStatus, Presence};
use crate::SHUTDOWN;
use rumqttc::{AsyncClient, ClientError, Event, Incoming, Outgoing, QoS, SubscribeReasonCode};
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

/// What the session task must do after an event.
#[derive(Debug, PartialEq)]
pub enum SessionAction {
    Nothing,
    Connected,
    Forward(MqttMessage),
    Disconnected,
    Closed,
}

pub fn handle_event(cfg: &AppConfig, event: Event) -> Result<SessionAction, MQTTError> {
    match event {
        Event::Incoming(i) => match i {
            Incoming::Disconnect => {
                error!("mqtt disconnect packet received.");
                Ok(SessionAction::Disconnected)
            }
            Incoming::ConnAck(_ca) => {
                info!("{}: MQTT connection established.", cfg.connection_url());
                Ok(SessionAction::Connected)
            }
            Incoming::PubAck(pa) => {
                debug!("Incoming PubAck for {}", pa.pkid);
                Ok(SessionAction::Nothing)
            }
            Incoming::PingResp => {
                trace!("Recv MQTT PONG");
                Ok(SessionAction::Nothing)
            }
            Incoming::SubAck(sa) => {
                for code in sa.return_codes.iter() {
                    if let SubscribeReasonCode::Failure = code {
                        return Err(MQTTError::Subscribe(cfg.topics.command.clone()));
                    }
                }
                info!("Subscribed to {}", cfg.topics.command);
                Ok(SessionAction::Nothing)
            }
            Incoming::Publish(pr) => {
                debug!("Incoming publish: {:#?}", pr);
                if pr.topic != cfg.topics.command {
                    debug!("Ignoring publish on unexpected topic {}", pr.topic);
                    return Ok(SessionAction::Nothing);
                }
                Ok(SessionAction::Forward(MqttMessage::new(pr.topic, pr.payload.to_vec())))
            }
            _ => {
                debug!("mqtt incoming packet: {:?}", i);
                Ok(SessionAction::Nothing)
            }
        },
        Event::Outgoing(o) => {
            match o {
                Outgoing::PingReq => {
                    trace!("Sent MQTT PING");
                }
                Outgoing::Publish(pkid) => {
                    trace!("Sent MQTT publish {}", pkid);
                }
                Outgoing::Disconnect => {
                    info!("Sent MQTT disconnect");
                    return Ok(SessionAction::Closed);
                }
                _ => {
                    trace!("outgoing mqtt packet: {:?}", o);
                }
            }
            Ok(SessionAction::Nothing)
        }
    }
}

fn status_message(cfg: &AppConfig, presence: Presence) -> MqttMessage {
    let status = DeviceStatus::new(cfg.device_id.clone(), presence);
    MqttMessage::new(cfg.topics.status.clone(), to_json(&status)).retained()
}

/// Subscribe and online announcement still owed to the broker after a ConnAck.
///
/// The event loop task cannot await its own request channel, so these go out
/// with `try_*` and stay pending while earlier publishes fill the channel.
#[derive(Debug, Default, PartialEq)]
pub struct SessionSetup {
    subscribe: bool,
    announce: bool,
}

impl SessionSetup {
    pub fn reset(&mut self) {
        self.subscribe = true;
        self.announce = true;
    }

    pub fn is_pending(&self) -> bool {
        self.subscribe || self.announce
    }

    pub fn resume(&mut self, client: &AsyncClient, cfg: &AppConfig) -> Result<(), MQTTError> {
        if self.subscribe {
            match client.try_subscribe(cfg.topics.command.clone(), QoS::AtLeastOnce) {
                Ok(_) => self.subscribe = false,
                Err(ClientError::TryRequest(_)) => {
                    debug!("Request queue full, deferring subscribe to {}", cfg.topics.command);
                    return Ok(());
                }
                Err(e) => {
                    return Err(MQTTError::Misc(format!("couldn't subscribe to {}: {e}", cfg.topics.command)));
                }
            }
        }
        if self.announce {
            let online = status_message(cfg, Presence::Online);
            match client.try_publish(online.topic, QoS::AtLeastOnce, online.retain, online.payload) {
                Ok(_) => self.announce = false,
                Err(ClientError::TryRequest(_)) => {
                    debug!("Request queue full, deferring online status");
                }
                Err(e) => {
                    return Err(MQTTError::Misc(format!("couldn't announce online status: {e}")));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
pub enum ShutdownStep {
    Publish(MqttMessage),
    Disconnect,
}

/// Offline status goes out before the disconnect, since a clean disconnect suppresses the last-will.
pub fn shutdown_steps(cfg: &AppConfig) -> Vec<ShutdownStep> {
    vec![
        ShutdownStep::Publish(status_message(cfg, Presence::Offline)),
        ShutdownStep::Disconnect,
    ]
}

/// Runs until shutdown or a fatal session error.
pub async fn mqtt_poll_loop(
    cfg: AppConfig,
    mqtt: MqttConnection,
    comms: LeafCommunication,
) -> Result<(), MQTTError> {
    let LeafCommunication { from_leaf_tx, mut to_leaf_rx } = comms;
    let client = mqtt.client;
    let session_client = client.clone();
    let session_cfg = cfg.clone();

    let task: JoinHandle<Result<(), MQTTError>> = tokio::spawn(async move {
        let mut conn = mqtt.event_loop;
        let mut setup = SessionSetup::default();

        loop {
            let notification = match conn.poll().await {
                Ok(event) => event,
                Err(e) => {
                    if SHUTDOWN.initialized() {
                        return Err(MQTTError::ExitingThread);
                    }
                    warn!("{}: Unable to poll mqtt, retrying: {e}", session_cfg.connection_url());
                    sleep(Duration::from_millis(MQTT_RECONNECT_DELAY_MILLIS)).await;
                    continue;
                }
            };
            match handle_event(&session_cfg, notification)? {
                SessionAction::Nothing => {}
                SessionAction::Connected => {
                    // clean sessions drop subscriptions, so resubscribe on every connack
                    setup.reset();
                }
                SessionAction::Forward(msg) => {
                    if let Err(e) = from_leaf_tx.send(IPCMessage::Inbound(msg)).await {
                        return Err(MQTTError::Misc(format!("tx channel error: {e}")));
                    }
                    debug!("Announced inbound command");
                }
                SessionAction::Disconnected => {
                    if let Err(e) = from_leaf_tx.send(IPCMessage::Error(MQTTError::ExitingThread)).await {
                        error!("Couldn't report broker disconnect: {e}");
                    }
                    return Err(MQTTError::ExitingThread);
                }
                SessionAction::Closed => return Ok(()),
            }
            if setup.is_pending() {
                setup.resume(&session_client, &session_cfg)?;
            }
        }
    });

    loop {
        if task.is_finished() {
            return match task.await {
                Ok(Ok(_)) => Err(MQTTError::ExitingThread),
                Ok(Err(e)) => Err(e),
                Err(e) => Err(MQTTError::Misc(format!("mqtt task failed: {e}"))),
            };
        }

        if SHUTDOWN.initialized() {
            for step in shutdown_steps(&cfg) {
                match step {
                    ShutdownStep::Publish(msg) => publish(&client, msg).await,
                    ShutdownStep::Disconnect => {
                        if let Err(e) = client.disconnect().await {
                            warn!("Couldn't send disconnect: {e}");
                        }
                    }
                }
            }
            if timeout(Duration::from_secs(MQTT_PUBLISH_TIMEOUT_SECS), task).await.is_err() {
                warn!("MQTT task did not stop in time");
            }
            return Ok(());
        }

        match to_leaf_rx.try_recv() {
            Ok(IPCMessage::Outbound(msg)) => publish(&client, msg).await,
            Ok(other) => {
                debug!("Ignoring {:?} sent to the mqtt session", other);
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                error!("Cannot poll: disconnected mpsc channel!");
                return Err(MQTTError::ExitingThread);
            }
        }

        sleep(Duration::from_millis(MQTT_POLL_INTERVAL_MILLIS)).await;
    }
}

async fn publish(client: &AsyncClient, msg: MqttMessage) {
    let topic = msg.topic.clone();
    match timeout(
        Duration::from_secs(MQTT_PUBLISH_TIMEOUT_SECS),
        client.publish(msg.topic, QoS::AtLeastOnce, msg.retain, msg.payload),
    )
    .await
    {
        Ok(Ok(_)) => {
            info!("Published to {}", topic);
        }
        Ok(Err(e)) => {
            error!("Couldn't send message to {}: {e}", topic);
        }
        Err(_e) => {
            error!("Timeout trying to mqtt publish to {}!", topic)
        }
    }
}

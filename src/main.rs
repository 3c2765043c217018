mod config_file;
mod mqtt_connection;
mod consts;
mod mqtt_poll;
mod ipc;
mod errors;
mod payload;
mod reminder;

#[macro_use]
extern crate tracing;

use std::time::Duration;
use anyhow::Context;
use tracing_subscriber::filter::EnvFilter;
use lazy_static::lazy_static;
use tokio::sync::OnceCell;
use tokio::time::{interval, sleep, MissedTickBehavior};
use crate::config_file::AppConfig;
use crate::consts::{MPSC_BUFFER_SIZE, MQTT_POLL_INTERVAL_MILLIS};
use crate::ipc::{channel_pair, IPCMessage, MqttMessage};
use crate::mqtt_connection::MqttConnection;
use crate::mqtt_poll::mqtt_poll_loop;
use crate::payload::{to_json, Command};
use crate::reminder::ReminderSchedule;

lazy_static! {
    static ref SHUTDOWN: OnceCell<bool> = OnceCell::new();
    static ref SETTINGS: OnceCell<AppConfig> = OnceCell::new();
}

fn init_logging(log_level: Option<&str>) -> anyhow::Result<()> {
    let mut filter = EnvFilter::from_default_env();
    if let Some(level) = log_level {
        filter = filter.add_directive(level.parse().context("invalid value for log_level")?);
    }
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    // rumqttc reports through the log crate
    tracing_log::LogTracer::init()?;
    Ok(())
}

fn log_command(msg: &MqttMessage) {
    match Command::parse(&msg.payload) {
        Command::Json(value) => info!("Command received on {}: {}", msg.topic, value),
        Command::Text(text) => info!("Command received on {}: {}", msg.topic, text),
        Command::Binary(bytes) => warn!("Binary command of {} bytes on {}", bytes.len(), msg.topic),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {

    {
        let config = AppConfig::load().context("Could not load configuration")?;
        SETTINGS.set(config).context("Couldn't force config into oncecell")?;
    }

    let cfg = SETTINGS.get().context("settings not initialised")?.clone();

    init_logging(cfg.log_level.as_deref())?;
    info!("starting up as {} against {}", cfg.client_id(), cfg.connection_url());

    ctrlc::set_handler(|| {
        let _ = SHUTDOWN.set(true);
    })
    .context("Couldn't install termination handler")?;

    let conn = MqttConnection::create(&cfg);
    let (mut comms, leaf) = channel_pair(MPSC_BUFFER_SIZE);
    let mut session = tokio::spawn(mqtt_poll_loop(cfg.clone(), conn, leaf));
    let mut session_done = false;

    let mut schedule = ReminderSchedule::new(&cfg.reminders);
    let mut ticker = interval(Duration::from_secs(cfg.reminders.interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    while !SHUTDOWN.initialized() {
        tokio::select! {
            _ = ticker.tick() => {
                let reminder = schedule.next_reminder();
                info!("Publishing reminder for {}", reminder.item);
                let msg = MqttMessage::new(cfg.topics.reminder.clone(), to_json(&reminder));
                if comms.to_leaf_tx.send(IPCMessage::Outbound(msg)).await.is_err() {
                    error!("Couldn't hand reminder to the mqtt session");
                    let _ = SHUTDOWN.set(true);
                }
            }
            inbound = comms.from_leaf_rx.recv() => {
                match inbound {
                    Some(IPCMessage::Inbound(msg)) => log_command(&msg),
                    Some(IPCMessage::Error(e)) => error!("MQTT session reported: {e}"),
                    Some(IPCMessage::Outbound(_)) => {}
                    None => {
                        error!("Can't read from the mqtt session");
                        let _ = SHUTDOWN.set(true);
                    }
                }
            }
            result = &mut session => {
                session_done = true;
                match result {
                    Ok(Ok(_)) => error!("MQTT Thread exited normally, shutting down app"),
                    Ok(Err(e)) => error!("Error in MQTT Thread: {e}"),
                    Err(e) => error!("Error in mqtt comms: {e}"),
                }
                let _ = SHUTDOWN.set(true);
            }
            _ = sleep(Duration::from_millis(MQTT_POLL_INTERVAL_MILLIS)) => {}
        }
    }

    if !session_done {
        match session.await {
            Ok(Ok(_)) => info!("MQTT session closed"),
            Ok(Err(e)) => warn!("MQTT session ended with: {e}"),
            Err(e) => error!("Error in mqtt comms: {e}"),
        }
    }
    info!("shut down");
    Ok(())
}

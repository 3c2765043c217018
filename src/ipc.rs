use tokio::sync::mpsc;
use crate::errors::MQTTError;

#[derive(Clone, Debug, PartialEq)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool
}

impl MqttMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        MqttMessage {
            topic: topic.into(),
            payload: payload.into(),
            retain: false
        }
    }

    pub fn retained(mut self) -> Self {
        self.retain = true;
        self
    }
}

#[derive(Clone, Debug)]
pub enum IPCMessage {
    Inbound(MqttMessage),
    Outbound(MqttMessage),
    Error(MQTTError)
}

/// Main-loop side and session side of the two channels.
pub struct ThreadCommunication {
    pub from_leaf_rx: mpsc::Receiver<IPCMessage>,
    pub to_leaf_tx: mpsc::Sender<IPCMessage>,
}

pub struct LeafCommunication {
    pub from_leaf_tx: mpsc::Sender<IPCMessage>,
    pub to_leaf_rx: mpsc::Receiver<IPCMessage>,
}

pub fn channel_pair(capacity: usize) -> (ThreadCommunication, LeafCommunication) {
    let (from_leaf_tx, from_leaf_rx) = mpsc::channel::<IPCMessage>(capacity);
    let (to_leaf_tx, to_leaf_rx) = mpsc::channel::<IPCMessage>(capacity);
    (
        ThreadCommunication { from_leaf_rx, to_leaf_tx },
        LeafCommunication { from_leaf_tx, to_leaf_rx },
    )
}

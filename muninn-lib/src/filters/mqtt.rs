//! Per-connection MQTT progression, gated on the TCP handshake.

use std::sync::Mutex;

use ahash::AHashMap;

use super::tcp::FiveTuple;
use crate::config::tunables::MqttTunables;
use crate::events::EventDescription;
use crate::proto::app::mqtt::{MqttBody, MqttHdr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MqttState {
    None,
    ConnectReq,
    ConnectAckOk,
    ConnectAckFail,
    SubscribeReq,
    SubscribeAckOk,
    Publish,
}

pub struct MqttFlowFilter {
    max_topic_len: usize,
    flows: Mutex<AHashMap<FiveTuple, MqttState>>,
}

impl MqttFlowFilter {
    pub fn new(tunables: &MqttTunables) -> Self {
        Self {
            max_topic_len: tunables.max_topic_name_len_allowed as usize,
            flows: Mutex::new(AHashMap::new()),
        }
    }

    /// Advance the per-connection state for one MQTT packet. The state only
    /// moves once the carrying TCP flow finished its handshake; `Some(..)`
    /// is an anomaly worth an event.
    pub fn observe(
        &self,
        key: FiveTuple,
        mqtt: &MqttHdr,
        tcp_established: bool,
    ) -> Option<EventDescription> {
        if let MqttBody::Publish(p) = &mqtt.body {
            if p.topic.len() > self.max_topic_len {
                return Some(EventDescription::MqttTopicNameTooLong);
            }
        }
        if let MqttBody::SubscribeReq(s) = &mqtt.body {
            if s.topic.len() > self.max_topic_len {
                return Some(EventDescription::MqttTopicNameTooLong);
            }
        }

        if !tcp_established {
            return None;
        }

        let mut flows = self.flows.lock().unwrap_or_else(|e| e.into_inner());
        let state = flows.entry(key).or_insert(MqttState::None);

        *state = match (&mqtt.body, *state) {
            (MqttBody::Connect(_), _) => MqttState::ConnectReq,
            (MqttBody::ConnectAck { return_code: 0 }, MqttState::ConnectReq) => {
                MqttState::ConnectAckOk
            }
            (MqttBody::ConnectAck { .. }, MqttState::ConnectReq) => MqttState::ConnectAckFail,
            (MqttBody::SubscribeReq(_), MqttState::ConnectAckOk)
            | (MqttBody::SubscribeReq(_), MqttState::SubscribeAckOk)
            | (MqttBody::SubscribeReq(_), MqttState::Publish) => MqttState::SubscribeReq,
            (MqttBody::SubscribeAck { .. }, MqttState::SubscribeReq) => MqttState::SubscribeAckOk,
            (MqttBody::Publish(_), MqttState::ConnectAckOk)
            | (MqttBody::Publish(_), MqttState::SubscribeAckOk)
            | (MqttBody::Publish(_), MqttState::Publish) => MqttState::Publish,
            // pings do not move the session
            (MqttBody::PingReq, s) | (MqttBody::PingResp, s) => s,
            (_, s) => s,
        };

        None
    }

    pub fn state(&self, key: &FiveTuple) -> Option<MqttState> {
        self.flows.lock().unwrap_or_else(|e| e.into_inner()).get(key).copied()
    }
}

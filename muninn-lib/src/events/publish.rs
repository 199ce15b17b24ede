//! Publish sinks: one enveloped datagram (or MQTT message) per event.

use std::time::Duration;

use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use tokio::net::{UdpSocket, UnixDatagram};
use tracing::{debug, warn};

use crate::config::{LocalUnixSinkConfig, MqttSinkConfig, UdpSinkConfig};
use crate::error::{MuninnError, Result};

const MQTT_CLIENT_ID: &str = "nids_mqtt_event_messenger";
const MQTT_KEEP_ALIVE: Duration = Duration::from_secs(20);
const MQTT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

pub enum PublishSink {
    Mqtt(MqttSink),
    Udp(UdpSink),
    LocalUnix(UnixSink),
}

impl PublishSink {
    /// Deliver one enveloped event. Errors are the caller's to log; the
    /// drain loop skips the sink for that event and carries on.
    pub async fn publish(&self, record: &[u8]) -> Result<()> {
        match self {
            PublishSink::Mqtt(s) => s.publish(record).await,
            PublishSink::Udp(s) => s.publish(record).await,
            PublishSink::LocalUnix(s) => s.publish(record).await,
        }
    }
}

pub struct MqttSink {
    client: AsyncClient,
    topic: String,
}

impl MqttSink {
    pub fn new(cfg: &MqttSinkConfig) -> Self {
        let mut opts = MqttOptions::new(MQTT_CLIENT_ID, cfg.ip.clone(), cfg.port);
        opts.set_keep_alive(MQTT_KEEP_ALIVE);
        opts.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(opts, 16);
        tokio::spawn(drive_mqtt(eventloop));

        Self { client, topic: cfg.topic_name.clone() }
    }

    async fn publish(&self, record: &[u8]) -> Result<()> {
        tokio::time::timeout(
            MQTT_PUBLISH_TIMEOUT,
            self.client.publish(&self.topic, QoS::AtLeastOnce, false, record),
        )
        .await
        .map_err(|_| MuninnError::Io(std::io::ErrorKind::TimedOut.into()))?
        .map_err(|e| MuninnError::Control(format!("mqtt publish failed: {e}")))
    }
}

/// The rumqttc event loop must be polled for the client to make progress;
/// connection errors are logged and retried with a short pause.
async fn drive_mqtt(mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(event) => debug!(?event, "mqtt event"),
            Err(e) => {
                warn!(error = %e, "mqtt connection error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

pub struct UdpSink {
    sock: UdpSocket,
}

impl UdpSink {
    pub async fn new(cfg: &UdpSinkConfig) -> Result<Self> {
        let sock = UdpSocket::bind("0.0.0.0:0").await?;
        sock.connect((cfg.ip.as_str(), cfg.port)).await?;
        Ok(Self { sock })
    }

    async fn publish(&self, record: &[u8]) -> Result<()> {
        self.sock.send(record).await?;
        Ok(())
    }
}

pub struct UnixSink {
    sock: UnixDatagram,
    path: String,
}

impl UnixSink {
    pub fn new(cfg: &LocalUnixSinkConfig) -> Result<Self> {
        let sock = UnixDatagram::unbound()?;
        Ok(Self { sock, path: cfg.path.clone() })
    }

    async fn publish(&self, record: &[u8]) -> Result<()> {
        self.sock.send_to(record, &self.path).await?;
        Ok(())
    }
}

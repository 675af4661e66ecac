//! MQTT ingress: connects to the broker with `rumqttc`, routes inbound
//! messages by topic, and implements the self-sync shutdown barrier.
//!
//! Topic tokenization/routing is split out per instantiation in
//! [`at`]/[`wpa`] since the two bridges use disjoint topic trees; this
//! module owns the client itself and the handful of things both share
//! (connect, publish, the self-sync token).

pub mod at;
pub mod wpa;

use std::time::Duration;

use log::warn;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS};
use uuid::Uuid;

use crate::error::{BridgeError, Result};
use crate::publish::{Publisher, Qos as BridgeQos};

/// Topic used for the shutdown self-sync barrier.
pub const SELFSYNC_TOPIC: &str = "tmp/selfsync";

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

fn to_rumqttc_qos(qos: BridgeQos) -> QoS {
    match qos {
        BridgeQos::AtMostOnce => QoS::AtMostOnce,
        BridgeQos::AtLeastOnce => QoS::AtLeastOnce,
    }
}

/// A blip the event loop can retry (TCP reset, timeout, DNS hiccup) never
/// reaches here as the kind of thing worth tearing the bridge down over;
/// only an outright rejection by the broker — bad credentials, protocol
/// mismatch, refused connection — is fatal. `rumqttc` doesn't expose a
/// clean enum match across versions for this split, so the classification
/// goes by the error's own message.
fn is_fatal(e: &ConnectionError) -> bool {
    let msg = e.to_string().to_lowercase();
    msg.contains("refused") || msg.contains("not authoriz") || msg.contains("bad user")
}

/// Thin wrapper around `rumqttc`'s split client/event-loop pair.
pub struct Mqtt {
    client: AsyncClient,
    eventloop: EventLoop,
    backoff: Duration,
}

impl Mqtt {
    /// Connect to `host:port` under `client_id`, with a sensible keepalive
    /// matching the rest of the bridge's cooperative-timer discipline.
    pub fn connect(host: &str, port: u16, client_id: &str) -> Self {
        let mut opts = MqttOptions::new(client_id, host, port);
        opts.set_keep_alive(std::time::Duration::from_secs(30));
        let (client, eventloop) = AsyncClient::new(opts, 64);
        Self {
            client,
            eventloop,
            backoff: INITIAL_BACKOFF,
        }
    }

    /// Subscribe to a topic filter.
    pub async fn subscribe(&self, filter: &str, qos: BridgeQos) -> Result<()> {
        self.client
            .subscribe(filter, to_rumqttc_qos(qos))
            .await
            .map_err(|e| BridgeError::BrokerLost(e.to_string()))
    }

    /// A cheap, cloneable publish handle sharing this client's connection.
    /// Lets callers hold publish capability separately from the event
    /// loop this struct drives, so it can be swapped out under test.
    pub fn publisher_handle(&self) -> MqttPublisher {
        MqttPublisher {
            client: self.client.clone(),
        }
    }

    /// Pump the event loop once, returning the next inbound publish, if
    /// any. Connection/ack bookkeeping events are swallowed here; only
    /// application-visible inbound messages are surfaced to the core loop.
    ///
    /// A transient connection error (I/O blip, timeout) is retried here
    /// with growing backoff rather than bubbled up — `rumqttc` reconnects
    /// automatically on the next `poll`. Only a fatal rejection from the
    /// broker itself is returned as an error.
    pub async fn poll(&mut self) -> Result<Option<(String, Vec<u8>)>> {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(p))) => {
                    self.backoff = INITIAL_BACKOFF;
                    return Ok(Some((p.topic, p.payload.to_vec())));
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    self.backoff = INITIAL_BACKOFF;
                    continue;
                }
                Ok(_) => continue,
                Err(e) if is_fatal(&e) => return Err(BridgeError::BrokerLost(e.to_string())),
                Err(e) => {
                    warn!("mqtt connection blipped ({e}), retrying in {:?}", self.backoff);
                    tokio::time::sleep(self.backoff).await;
                    self.backoff = (self.backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    /// Publish a unique token to [`SELFSYNC_TOPIC`] and return it, so the
    /// caller can wait for the same token to echo back through `poll`.
    pub async fn publish_selfsync_token(&self, qos: BridgeQos) -> Result<String> {
        let token = format!(
            "{}-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp(),
            Uuid::new_v4()
        );
        self.client
            .publish(SELFSYNC_TOPIC, to_rumqttc_qos(qos), false, token.as_bytes())
            .await
            .map_err(|e| BridgeError::BrokerLost(e.to_string()))?;
        Ok(token)
    }
}

impl Publisher for Mqtt {
    fn publish(&mut self, topic: &str, payload: &str, retain: bool, qos: BridgeQos) -> Result<()> {
        // `rumqttc`'s publish is async; the synchronous `Publisher` trait is
        // satisfied via `try_publish`, which queues onto the client's
        // internal request channel without awaiting the network round trip —
        // the event loop drains it on the next `poll`.
        self.client
            .try_publish(topic, to_rumqttc_qos(qos), retain, payload.as_bytes())
            .map_err(|e| BridgeError::BrokerLost(e.to_string()))
    }
}

/// A cloned `AsyncClient` handle, usable as a [`Publisher`] independent of
/// the event loop — what production binaries pass to [`crate::core::Core`]
/// so outbound publishes don't need a `&mut Mqtt` borrow shared with the
/// inbound poll loop, and so tests can substitute their own `Publisher`.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl Publisher for MqttPublisher {
    fn publish(&mut self, topic: &str, payload: &str, retain: bool, qos: BridgeQos) -> Result<()> {
        self.client
            .try_publish(topic, to_rumqttc_qos(qos), retain, payload.as_bytes())
            .map_err(|e| BridgeError::BrokerLost(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qos_maps_to_rumqttc_levels() {
        assert_eq!(to_rumqttc_qos(BridgeQos::AtMostOnce), QoS::AtMostOnce);
        assert_eq!(to_rumqttc_qos(BridgeQos::AtLeastOnce), QoS::AtLeastOnce);
    }
}

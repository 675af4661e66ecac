//! The core event loop: a single `tokio::select!` over transport
//! readiness, the MQTT event loop, and the shutdown signal, exactly the
//! "one poll call demultiplexing three descriptors" the spec describes.
//!
//! [`Core`] owns every collection — the command queue, the scheduler, and
//! the domain-model sets — so there is no module-level mutable state and
//! no locking: everything is reached from this one struct, driven from
//! this one loop. Outbound publishes go through a generic [`Publisher`]
//! (`P`) rather than straight through [`Mqtt`], so production wires a
//! cloned [`crate::mqtt::MqttPublisher`] handle while tests can substitute
//! an in-memory recorder without touching the inbound ingress path.

use std::time::Duration;

use log::{info, warn};
use tokio::signal::unix::{signal, SignalKind};

use crate::config::Quirks;
use crate::dispatch::{self, Effect};
use crate::domain::{BssSet, NetworkSet, OperatorTable, Source};
use crate::error::{BridgeError, Result};
use crate::mqtt::Mqtt;
use crate::parser::at::AtClassifier;
use crate::parser::wpa::SupplicantClassifier;
use crate::parser::{Argv, Classification, LineParser};
use crate::publish::{PublishCache, Publisher, Qos};
use crate::queue::CommandQueue;
use crate::scheduler::{Scheduler, TimerKey};
use crate::transport::{Transport, WriteOutcome};

/// Which protocol this `Core` instance is speaking. The queue, parser,
/// and scheduler are shared; only record classification and URC/response
/// handling differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeKind {
    At,
    Supplicant,
}

/// Overall bridge lifecycle, per `spec.md`'s state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Init,
    Connected,
    Running,
    Lost,
    Draining,
    Done,
}

const EAGAIN_LIMIT: u32 = 10;
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);
const WIFI_SCAN_INTERVAL: Duration = Duration::from_secs(30);

/// Owns every piece of mutable state for one bridge instance and runs
/// its event loop.
pub struct Core<T: Transport, P: Publisher> {
    kind: BridgeKind,
    transport: T,
    queue: CommandQueue,
    parser: LineParser,
    scheduler: Scheduler,
    operators: OperatorTable,
    networks: NetworkSet,
    bsses: BssSet,
    publish: PublishCache,
    mqtt: Mqtt,
    publisher: P,
    quirks: Quirks,
    state: State,
    eagain_streak: u32,
    write_queue: std::collections::VecDeque<(String, Duration)>,
    argv: Argv,
    topic_prefix: String,
    qos: Qos,
}

impl<T: Transport, P: Publisher> Core<T, P> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: BridgeKind,
        transport: T,
        mqtt: Mqtt,
        publisher: P,
        topic_prefix: impl Into<String>,
        quirks: Quirks,
        qos: Qos,
    ) -> Self {
        Self {
            kind,
            transport,
            queue: CommandQueue::new(),
            parser: LineParser::new(crate::parser::MIN_BUFFER_CAPACITY * 4),
            scheduler: Scheduler::new(),
            operators: OperatorTable::new(),
            networks: NetworkSet::new(),
            bsses: BssSet::new(),
            publish: PublishCache::new(qos),
            mqtt,
            publisher,
            quirks,
            state: State::Init,
            eagain_streak: 0,
            write_queue: std::collections::VecDeque::new(),
            argv: Argv::default(),
            topic_prefix: topic_prefix.into(),
            qos,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Read access to the outbound publisher, for callers (tests) that
    /// need to inspect what a concrete `Publisher` recorded.
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Mutable access to the transport, for callers (tests) driving a
    /// fake transport's scripted input after construction.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn bsses(&self) -> &BssSet {
        &self.bsses
    }

    pub fn networks(&self) -> &NetworkSet {
        &self.networks
    }

    pub fn queue_contains(&self, line: &str) -> bool {
        self.queue.contains(line)
    }

    /// Seed a pending station network, for tests driving the
    /// `ADD_NETWORK` reply path without going through inbound MQTT.
    pub fn networks_begin_create_station(&mut self, ssid: &str) {
        self.networks
            .begin_create(ssid, crate::domain::NetworkMode::Station);
    }

    /// Queue a PSK `SET_NETWORK` mutation against a still-pending network.
    pub fn networks_queue_pending_psk(&mut self, ssid: &str, value: String) {
        self.networks
            .queue_pending_op(ssid, crate::domain::PendingOp::Set { key: "psk".to_string(), value });
    }

    /// Seed a BSS entry directly, for tests exercising scan-eviction
    /// without a prior `SCAN_RESULTS` round.
    pub fn bsses_observe(&mut self, bssid: &str, ssid: &str, freq: i64, level: i64) {
        self.bsses.observe(bssid, ssid.to_string(), freq, level);
    }

    /// Drain whatever the transport has buffered, splitting it into
    /// records and dispatching each one.
    pub fn drain_transport(&mut self) -> Result<()> {
        match self.kind {
            BridgeKind::At => self.drain_stream(),
            BridgeKind::Supplicant => self.drain_datagrams(),
        }
    }

    /// Re-publish every retained topic with an empty payload, the way a
    /// graceful shutdown clears state before the self-sync handshake.
    pub fn clear_all_retained(&mut self) -> Result<()> {
        self.publish.clear_all_retained(&mut self.publisher)
    }

    /// Render a bare property name as this instance's full outbound
    /// topic: `<prefix>/<name>` for the AT bridge, `net/<iface>/<name>`
    /// for the supplicant bridge.
    fn topic(&self, name: &str) -> String {
        match self.kind {
            BridgeKind::At => format!("{}/{name}", self.topic_prefix),
            BridgeKind::Supplicant => format!("net/{}/{name}", self.topic_prefix),
        }
    }

    /// Enqueue a command. Mirrors `CommandQueue::enqueue`'s contract: if
    /// the queue was empty, attempt the write immediately.
    pub fn enqueue(&mut self, line: impl Into<String>, timeout: Duration) -> Result<()> {
        let line = line.into();
        if self.queue.contains(&line) {
            return Ok(());
        }
        let was_empty = self.queue.enqueue(line.clone(), timeout);
        if was_empty {
            self.write_head(&line, timeout)?;
        }
        Ok(())
    }

    /// Write whatever is now at the queue's head, if anything — called
    /// after a response is dequeued so the next command isn't left
    /// waiting for an unrelated event to nudge the loop.
    fn write_next_head(&mut self) -> Result<()> {
        if let Some(next) = self.queue.head().cloned() {
            self.write_head(&next.line, next.timeout)?;
        }
        Ok(())
    }

    fn write_head(&mut self, line: &str, timeout: Duration) -> Result<()> {
        match self.transport.try_write(line.as_bytes())? {
            WriteOutcome::Complete => {
                self.eagain_streak = 0;
                self.scheduler.arm(TimerKey::CommandTimeout, timeout);
                Ok(())
            }
            WriteOutcome::WouldBlock => {
                self.eagain_streak += 1;
                if self.eagain_streak >= EAGAIN_LIMIT {
                    return Err(BridgeError::TransportLost(
                        "10 consecutive EAGAIN writes, transport considered dead".to_string(),
                    ));
                }
                self.write_queue.push_back((line.to_string(), timeout));
                self.scheduler.arm(TimerKey::CommandTimeout, Duration::from_secs(1));
                Ok(())
            }
        }
    }

    /// Apply one record's classification, producing and immediately
    /// executing any resulting effects (queue advances, publishes).
    fn apply_effects(&mut self, effects: Vec<Effect>) -> Result<()> {
        for effect in effects {
            match effect {
                Effect::Enqueue { line, timeout_ms } => {
                    self.enqueue(line, Duration::from_millis(timeout_ms))?;
                }
                Effect::PublishRetained { topic, value } => {
                    let full = self.topic(&topic);
                    self.publish.publish_retained(&mut self.publisher, &full, value)?;
                }
                Effect::PublishRetainedPriority { topic, value, source } => {
                    let full = self.topic(&topic);
                    self.publish
                        .publish_retained_with_priority(&mut self.publisher, &full, value, source)?;
                }
                Effect::PublishTransient { topic, payload } => {
                    let full = self.topic(&topic);
                    self.publish.publish_transient(&mut self.publisher, &full, &payload)?;
                }
                Effect::ClearBss { bssid } => {
                    for suffix in ["ssid", "freq", "level", "flags"] {
                        let full = self.topic(&format!("bss/{bssid}/{suffix}"));
                        self.publish.publish_retained(&mut self.publisher, &full, "")?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Process one fully-parsed record against the AT classifier and
    /// dispatch tables.
    fn handle_at_record(&mut self, line: String) -> Result<()> {
        let classifier = AtClassifier;
        let in_flight = !self.queue.is_empty();
        match classifier.classify(&line, in_flight) {
            Classification::Urc(text) => {
                let effects = self.at_urc_effects(&text);
                self.apply_effects(effects)
            }
            Classification::Terminator(outcome) => {
                let head = self.queue.on_response_complete();
                let argv = std::mem::take(&mut self.argv);
                match outcome {
                    Ok(()) => {
                        if let Some(entry) = &head {
                            let effects = self.at_response_effects(&entry.line, argv.as_slice());
                            self.apply_effects(effects)?;
                        }
                    }
                    Err(reason) => {
                        let topic = self.topic("fail");
                        let payload = match &head {
                            Some(entry) => format!("{} {reason}", entry.line),
                            None => reason,
                        };
                        self.publish.publish_transient(&mut self.publisher, &topic, &payload)?;
                    }
                }
                self.write_next_head()
            }
            Classification::Body(text) => {
                self.argv.push(text);
                Ok(())
            }
        }
    }

    fn at_urc_effects(&mut self, text: &str) -> Vec<Effect> {
        if text == "+CPIN: READY" {
            return dispatch::at::handle_cpin_ready();
        }
        if text == "+SIMCARD: NOT AVAILABLE" {
            return dispatch::at::handle_sim_removed(&mut self.operators);
        }
        if text == "NO CARRIER" {
            return dispatch::at::handle_no_carrier();
        }
        if let Some(body) = text.strip_prefix("+CSQ:") {
            return dispatch::at::handle_csq(body.trim());
        }
        if let Some(body) = text.strip_prefix("+CGREG:") {
            return dispatch::at::handle_reg(Source::Cgreg, body.trim());
        }
        if let Some(body) = text.strip_prefix("+CREG:") {
            return dispatch::at::handle_reg(Source::Creg, body.trim());
        }
        if let Some(body) = text.strip_prefix("+COPS:") {
            return dispatch::at::handle_cops(body.trim());
        }
        if let Some(body) = text.strip_prefix("+COPN:") {
            dispatch::at::handle_copn(body.trim(), &mut self.operators);
            return Vec::new();
        }
        Vec::new()
    }

    /// Map a completed command's own text to the handler for its bare,
    /// unprefixed response body (the SIM-identity batch: `AT+CIMI`,
    /// `AT+CCID`, `AT+CGSN`, `AT+CGMI`, `AT+CGMM`, `AT+CGMR`, `AT+CNUM`).
    fn at_response_effects(&mut self, command: &str, argv: &[String]) -> Vec<Effect> {
        if command.starts_with("AT+CIMI") {
            return dispatch::at::handle_imsi_response(argv, &self.operators);
        }
        if command.starts_with("AT+CNUM") {
            return dispatch::at::handle_cnum_response(argv);
        }
        dispatch::at::handle_identity_response(command, argv)
    }

    /// Process one fully-parsed record against the supplicant classifier.
    fn handle_wpa_record(&mut self, line: String) -> Result<()> {
        let classifier = SupplicantClassifier;
        match classifier.classify(&line) {
            Classification::Urc(text) => {
                let body = text.splitn(2, '>').nth(1).unwrap_or(&text);
                let effects = dispatch::wpa::handle_urc(body);
                self.apply_effects(effects)
            }
            Classification::Terminator(outcome) => {
                let head = self.queue.on_response_complete();
                let argv = std::mem::take(&mut self.argv);
                match outcome {
                    Ok(()) => {
                        if let Some(entry) = &head {
                            let effects =
                                self.wpa_response_effects(&entry.line, argv.as_slice());
                            self.apply_effects(effects)?;
                        }
                    }
                    Err(reason) => {
                        let topic = self.topic("fail");
                        let payload = match &head {
                            Some(entry) => format!("{} {reason}", entry.line),
                            None => reason,
                        };
                        self.publish.publish_transient(&mut self.publisher, &topic, &payload)?;
                    }
                }
                self.write_next_head()
            }
            Classification::Body(text) => {
                self.argv.push(text);
                Ok(())
            }
        }
    }

    /// Map a completed command's own text to the reconciliation algorithm
    /// that handles its reply body.
    fn wpa_response_effects(&mut self, command: &str, argv: &[String]) -> Vec<Effect> {
        if command == "SCAN_RESULTS" {
            let rows: Vec<&str> = argv.iter().map(String::as_str).collect();
            return dispatch::wpa::reconcile_scan(&mut self.bsses, &rows);
        }
        if command == "ADD_NETWORK" {
            let id: i64 = argv
                .first()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(-1);
            let mut effects = dispatch::wpa::apply_add_network_reply(&mut self.networks, id);
            effects.extend(dispatch::wpa::last_ap_and_mesh(&self.networks));
            return effects;
        }
        if command == "STATUS" {
            return dispatch::wpa::parse_status(argv);
        }
        if command.starts_with("BSS ") {
            return dispatch::wpa::apply_bss_detail(&mut self.bsses, argv);
        }
        if command == "LIST_NETWORKS" {
            return dispatch::wpa::handle_list_networks(argv);
        }
        if let Some(ssid) = command.strip_prefix("REMOVE_NETWORK ") {
            self.networks.remove_by_ssid(ssid.trim());
            return dispatch::wpa::last_ap_and_mesh(&self.networks);
        }
        Vec::new()
    }

    /// tty-style stream: read until `EAGAIN`, then dispatch every record
    /// an explicit `OK`/`ERROR` always shows up for.
    fn drain_stream(&mut self) -> Result<()> {
        let mut buf = [0u8; 4096];
        loop {
            let n = self.transport.try_read(&mut buf)?;
            if n == 0 {
                break;
            }
            self.parser.feed(&buf[..n])?;
        }
        while let Some(record) = self.parser.next_record() {
            self.handle_at_record(record)?;
        }
        Ok(())
    }

    /// `wpa_supplicant` control socket: each `try_read` returns exactly one
    /// datagram. Simple command replies end with an explicit `OK`/`FAIL`
    /// line, but multi-row replies (`SCAN_RESULTS`, `LIST_NETWORKS`) never
    /// do — once a datagram is fully drained into body lines with no
    /// terminator of its own and a command still in flight, synthesize
    /// the `OK` that reply shape never sends.
    fn drain_datagrams(&mut self) -> Result<()> {
        let mut buf = [0u8; 4096];
        loop {
            let n = self.transport.try_read(&mut buf)?;
            if n == 0 {
                break;
            }
            self.parser.feed(&buf[..n])?;

            let mut saw_terminator = false;
            let mut saw_body = false;
            while let Some(record) = self.parser.next_record() {
                match SupplicantClassifier.classify(&record) {
                    Classification::Terminator(_) => saw_terminator = true,
                    Classification::Body(_) => saw_body = true,
                    Classification::Urc(_) => {}
                }
                self.handle_wpa_record(record)?;
            }
            if !saw_terminator && saw_body && !self.queue.is_empty() {
                self.handle_wpa_record("OK".to_string())?;
            }
        }
        Ok(())
    }

    /// Clean-shutdown path: clear every retained topic, then block on the
    /// self-sync barrier before returning.
    async fn drain_and_exit(&mut self) -> Result<()> {
        self.state = State::Draining;
        info!("draining: clearing retained state");
        self.publish.clear_all_retained(&mut self.publisher)?;

        let qos = self.publish_qos();
        let token = self.mqtt.publish_selfsync_token(qos).await?;
        self.mqtt.subscribe(crate::mqtt::SELFSYNC_TOPIC, qos).await?;
        loop {
            if let Some((topic, payload)) = self.mqtt.poll().await? {
                if topic == crate::mqtt::SELFSYNC_TOPIC && payload == token.as_bytes() {
                    break;
                }
            }
        }
        self.state = State::Done;
        info!("shutdown complete");
        Ok(())
    }

    fn publish_qos(&self) -> Qos {
        self.qos
    }

    /// Run the bridge until a fatal error, a broker loss, or a clean
    /// shutdown signal.
    pub async fn run(&mut self) -> Result<()> {
        self.state = State::Connected;
        info!("transport open, entering running state");
        self.state = State::Running;

        match self.kind {
            BridgeKind::At => self.scheduler.arm(TimerKey::SignalPoll, KEEPALIVE_INTERVAL),
            BridgeKind::Supplicant => self.scheduler.arm(TimerKey::WifiScan, WIFI_SCAN_INTERVAL),
        }

        let mut sigterm = signal(SignalKind::terminate()).map_err(BridgeError::Io)?;
        let mut sigint = signal(SignalKind::interrupt()).map_err(BridgeError::Io)?;

        loop {
            let wait = self.scheduler.wait_duration().unwrap_or(Duration::from_secs(3600));
            tokio::select! {
                biased;

                _ = sigterm.recv() => {
                    info!("SIGTERM received");
                    return self.drain_and_exit().await;
                }
                _ = sigint.recv() => {
                    info!("SIGINT received");
                    return self.drain_and_exit().await;
                }
                res = self.transport.readable() => {
                    res?;
                    if let Err(e) = self.drain_transport() {
                        match e {
                            BridgeError::TransportLost(reason) => {
                                warn!("transport lost: {reason}");
                                self.state = State::Lost;
                                return self.drain_and_exit().await;
                            }
                            other => return Err(other),
                        }
                    }
                }
                msg = self.mqtt.poll() => {
                    match msg {
                        Ok(Some((topic, payload))) => self.handle_inbound_mqtt(&topic, &payload)?,
                        Ok(None) => {}
                        Err(e) => return Err(e),
                    }
                }
                _ = tokio::time::sleep(wait) => {
                    for key in self.scheduler.pop_due() {
                        self.handle_timer(key)?;
                    }
                }
            }
        }
    }

    fn handle_timer(&mut self, key: TimerKey) -> Result<()> {
        match key {
            TimerKey::CommandTimeout => {
                if let Some((retry, timeout)) = self.write_queue.pop_front() {
                    // A short-write-blocked head gets one more attempt
                    // before counting as a timeout.
                    self.write_head(&retry, timeout)?;
                    return Ok(());
                }
                let (_, dead) = self.queue.on_timeout();
                if dead {
                    return Err(BridgeError::TransportLost(
                        "last 5 commands got timeout, transport considered dead".to_string(),
                    ));
                }
                if let Some(next) = self.queue.head().cloned() {
                    self.write_head(&next.line, next.timeout)?;
                }
            }
            TimerKey::SignalPoll => {
                self.enqueue("AT+CSQ", crate::queue::DEFAULT_TIMEOUT)?;
                self.scheduler.arm(TimerKey::SignalPoll, KEEPALIVE_INTERVAL);
            }
            TimerKey::WifiScan => {
                self.enqueue("SCAN_RESULTS", crate::queue::SUPPLICANT_TIMEOUT)?;
                self.scheduler.arm(TimerKey::WifiScan, WIFI_SCAN_INTERVAL);
            }
            TimerKey::SelfSyncTimeout => {}
        }
        Ok(())
    }

    fn handle_inbound_mqtt(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
        match self.kind {
            BridgeKind::At => {
                if let Some(suffix) = topic.split_once('/').map(|(_, rest)| rest) {
                    if let Some(cmd) = crate::mqtt::at::route(suffix, payload) {
                        match cmd {
                            crate::mqtt::at::AtInbound::SendRaw(line) => {
                                self.enqueue(line, crate::queue::DEFAULT_TIMEOUT)?;
                            }
                            crate::mqtt::at::AtInbound::OpsScan => {
                                if self.quirks.detached_scan || self.quirks.simcom {
                                    self.enqueue("AT+COPS=2", crate::queue::DEFAULT_TIMEOUT)?;
                                }
                                self.apply_effects(dispatch::at::operator_scan())?;
                            }
                        }
                    }
                }
            }
            BridgeKind::Supplicant => {
                // `net/<iface>/…` — the first two tokens are consumed by
                // the caller's subscription filter; strip them here.
                let suffix = topic
                    .splitn(3, '/')
                    .nth(2)
                    .unwrap_or_default()
                    .to_string();
                if let Some(cmd) = crate::mqtt::wpa::route(&suffix, payload) {
                    self.handle_wpa_inbound(cmd)?;
                }
            }
        }
        Ok(())
    }

    fn handle_wpa_inbound(&mut self, cmd: crate::mqtt::wpa::WpaInbound) -> Result<()> {
        use crate::mqtt::wpa::WpaInbound;
        match cmd {
            WpaInbound::SsidSet(ssid) => {
                self.enqueue(format!("SELECT_NETWORK {ssid}"), crate::queue::SUPPLICANT_TIMEOUT)
            }
            WpaInbound::SsidEnable(ssid) => {
                self.enqueue(format!("ENABLE_NETWORK {ssid}"), crate::queue::SUPPLICANT_TIMEOUT)
            }
            WpaInbound::SsidDisable(ssid) => {
                self.enqueue(format!("DISABLE_NETWORK {ssid}"), crate::queue::SUPPLICANT_TIMEOUT)
            }
            WpaInbound::SsidRemove(ssid) => {
                self.enqueue(format!("REMOVE_NETWORK {ssid}"), crate::queue::SUPPLICANT_TIMEOUT)
            }
            WpaInbound::SsidCreate(ssid) => {
                self.networks
                    .begin_create(ssid.clone(), crate::domain::NetworkMode::Station);
                self.enqueue("ADD_NETWORK", crate::queue::SUPPLICANT_TIMEOUT)
            }
            WpaInbound::SsidAp(ssid) => {
                self.networks
                    .begin_create(ssid.clone(), crate::domain::NetworkMode::Ap);
                self.enqueue("ADD_NETWORK", crate::queue::SUPPLICANT_TIMEOUT)
            }
            WpaInbound::SsidMesh(ssid) => {
                self.networks
                    .begin_create(ssid.clone(), crate::domain::NetworkMode::Mesh);
                self.enqueue("ADD_NETWORK", crate::queue::SUPPLICANT_TIMEOUT)
            }
            WpaInbound::SsidPsk { ssid, psk } => {
                if self.networks.by_ssid(&ssid).is_none() {
                    self.networks
                        .begin_create(ssid.clone(), crate::domain::NetworkMode::Station);
                    self.networks.queue_pending_op(
                        &ssid,
                        crate::domain::PendingOp::Set {
                            key: "psk".to_string(),
                            value: dispatch::wpa::psk_set_network_value(
                                &psk,
                                &ssid,
                                self.quirks.no_plain_psk,
                            ),
                        },
                    );
                    self.enqueue("ADD_NETWORK", crate::queue::SUPPLICANT_TIMEOUT)
                } else {
                    let value =
                        dispatch::wpa::psk_set_network_value(&psk, &ssid, self.quirks.no_plain_psk);
                    self.enqueue(
                        format!("SET_NETWORK {ssid} psk {value}"),
                        crate::queue::SUPPLICANT_TIMEOUT,
                    )
                }
            }
            WpaInbound::SsidConfig { ssid, key, value } => self.enqueue(
                format!("SET_NETWORK {ssid} {key} {value}"),
                crate::queue::SUPPLICANT_TIMEOUT,
            ),
            WpaInbound::WifiConfig { key, value } => {
                self.enqueue(format!("SET {key} {value}"), crate::queue::SUPPLICANT_TIMEOUT)
            }
            WpaInbound::WifiStateSet(state) => match state.as_str() {
                "off" => self.enqueue("DISABLE_ALL_NETWORKS", crate::queue::SUPPLICANT_TIMEOUT),
                "any" => self.enqueue("ENABLE_ALL_NETWORKS", crate::queue::SUPPLICANT_TIMEOUT),
                other => self.enqueue(format!("SET_MODE {other}"), crate::queue::SUPPLICANT_TIMEOUT),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt::Mqtt;
    use crate::publish::Qos;
    use std::collections::VecDeque;

    struct FakeTransport {
        to_read: VecDeque<u8>,
        written: Vec<String>,
    }

    impl FakeTransport {
        fn with_script(bytes: &[u8]) -> Self {
            Self {
                to_read: bytes.iter().copied().collect(),
                written: Vec::new(),
            }
        }

        fn push_bytes(&mut self, bytes: &[u8]) {
            self.to_read.extend(bytes.iter().copied());
        }
    }

    impl Transport for FakeTransport {
        fn try_read(&mut self, buf: &mut [u8]) -> Result<usize> {
            let n = buf.len().min(self.to_read.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.to_read.pop_front().unwrap();
            }
            Ok(n)
        }

        fn try_write(&mut self, data: &[u8]) -> Result<WriteOutcome> {
            self.written.push(String::from_utf8_lossy(data).into_owned());
            Ok(WriteOutcome::Complete)
        }

        async fn readable(&self) -> Result<()> {
            Ok(())
        }

        async fn writable(&self) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        published: Vec<(String, String, bool)>,
    }

    impl Publisher for RecordingPublisher {
        fn publish(&mut self, topic: &str, payload: &str, retain: bool, _qos: Qos) -> Result<()> {
            self.published
                .push((topic.to_string(), payload.to_string(), retain));
            Ok(())
        }
    }

    impl RecordingPublisher {
        fn value_of(&self, topic: &str) -> Option<&str> {
            self.published
                .iter()
                .rev()
                .find(|(t, ..)| t == topic)
                .map(|(_, v, _)| v.as_str())
        }
    }

    fn test_core(kind: BridgeKind, prefix: &str) -> Core<FakeTransport, RecordingPublisher> {
        Core::new(
            kind,
            FakeTransport::with_script(b""),
            Mqtt::connect("127.0.0.1", 1883, "test"),
            RecordingPublisher::default(),
            prefix,
            Quirks::default(),
            Qos::AtMostOnce,
        )
    }

    #[test]
    fn at_csq_response_publishes_rssi_and_ber_then_empties_queue() {
        let classifier = AtClassifier;
        let mut parser = LineParser::new(crate::parser::MIN_BUFFER_CAPACITY);
        parser.feed(b"+CSQ: 17,2\r\n\r\nOK\r\n").unwrap();

        let mut queue = CommandQueue::new();
        queue.enqueue("AT+CSQ", crate::queue::DEFAULT_TIMEOUT);

        let mut rssi = None;
        let mut ber = None;
        while let Some(record) = parser.next_record() {
            match classifier.classify(&record, !queue.is_empty()) {
                Classification::Urc(text) => {
                    if let Some(body) = text.strip_prefix("+CSQ:") {
                        let (r, b) = dispatch::at::parse_csq(body.trim()).unwrap();
                        rssi = Some(r);
                        ber = Some(b);
                    }
                }
                Classification::Terminator(Ok(())) => {
                    queue.on_response_complete();
                }
                _ => {}
            }
        }

        assert_eq!(rssi.as_deref(), Some("-79"));
        assert_eq!(ber.as_deref(), Some("0.1% -- 0.5%"));
        assert!(queue.is_empty());
    }

    #[test]
    fn fake_transport_records_every_write() {
        let mut t = FakeTransport::with_script(b"");
        t.try_write(b"AT+CSQ\r").unwrap();
        assert_eq!(t.written, vec!["AT+CSQ\r".to_string()]);
    }

    #[test]
    fn csq_urc_through_core_publishes_prefixed_rssi_topic() {
        let mut core = test_core(BridgeKind::At, "modem");
        core.enqueue("AT+CSQ", crate::queue::DEFAULT_TIMEOUT).unwrap();
        core.transport.push_bytes(b"+CSQ: 17,2\r\nOK\r\n");
        core.drain_transport().unwrap();

        assert_eq!(core.publisher.value_of("modem/rssi"), Some("-79"));
        assert!(core.queue.is_empty());
    }

    #[test]
    fn scan_results_reply_through_core_publishes_bss_topics() {
        let mut core = test_core(BridgeKind::Supplicant, "wlan0");
        core.enqueue("SCAN_RESULTS", crate::queue::SUPPLICANT_TIMEOUT).unwrap();
        core.transport.push_bytes(
            b"aa:bb:cc:dd:ee:ff\t2412\t-55\t[WPA2-PSK-CCMP][ESS]\tMyAP\r\nOK\r\n",
        );
        core.drain_transport().unwrap();

        assert_eq!(core.bsses.by_bssid("aa:bb:cc:dd:ee:ff").unwrap().ssid, "MyAP");
        assert!(core.queue.contains("BSS aa:bb:cc:dd:ee:ff"));
    }

    #[test]
    fn add_network_reply_through_core_assigns_id_and_publishes_last_ap() {
        let mut core = test_core(BridgeKind::Supplicant, "wlan0");
        core.networks.begin_create("Office", crate::domain::NetworkMode::Ap);
        core.enqueue("ADD_NETWORK", crate::queue::SUPPLICANT_TIMEOUT).unwrap();
        core.transport.push_bytes(b"5\r\nOK\r\n");
        core.drain_transport().unwrap();

        assert_eq!(core.networks.by_ssid("Office").unwrap().id(), 5);
        assert_eq!(core.publisher.value_of("net/wlan0/lastAP"), Some("Office"));
    }
}

//! End-to-end scenarios driven against a real [`Core`] instance, wired to
//! an in-memory transport and an in-memory recording publisher instead of
//! a live tty/socket and MQTT broker. Unlike the dispatch module's own
//! unit tests (which exercise `reconcile_scan`, `apply_add_network_reply`,
//! etc. as pure functions), these scenarios go through `Core::drain_transport`
//! so they also prove the core loop actually reaches those functions.

use std::collections::VecDeque;

use linebridge::config::Quirks;
use linebridge::core::{BridgeKind, Core};
use linebridge::error::Result;
use linebridge::mqtt::Mqtt;
use linebridge::publish::{Publisher, Qos};
use linebridge::queue::{CommandQueue, DEFAULT_TIMEOUT};
use linebridge::transport::{Transport, WriteOutcome};

/// In-memory transport: a scripted byte feed to read from, and a record
/// of everything written to it.
struct FakeTransport {
    to_read: VecDeque<u8>,
    written: Vec<String>,
}

impl FakeTransport {
    fn new() -> Self {
        Self {
            to_read: VecDeque::new(),
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

fn at_core(prefix: &str) -> Core<FakeTransport, RecordingPublisher> {
    Core::new(
        BridgeKind::At,
        FakeTransport::new(),
        Mqtt::connect("127.0.0.1", 1883, "test"),
        RecordingPublisher::default(),
        prefix,
        Quirks::default(),
        Qos::AtMostOnce,
    )
}

fn wpa_core(iface: &str) -> Core<FakeTransport, RecordingPublisher> {
    Core::new(
        BridgeKind::Supplicant,
        FakeTransport::new(),
        Mqtt::connect("127.0.0.1", 1883, "test"),
        RecordingPublisher::default(),
        iface,
        Quirks::default(),
        Qos::AtMostOnce,
    )
}

#[test]
fn scenario_signal_poll() {
    let mut core = at_core("modem");
    core.enqueue("AT+CSQ", DEFAULT_TIMEOUT).unwrap();
    core.transport_mut().push_bytes(b"+CSQ: 17,2\r\n\r\nOK\r\n");
    core.drain_transport().unwrap();

    assert_eq!(core.publisher().value_of("modem/rssi"), Some("-79"));
    assert_eq!(core.publisher().value_of("modem/ber"), Some("0.1% -- 0.5%"));
    assert!(!core.queue_contains("AT+CSQ"));
}

#[test]
fn scenario_scan_add_requests_bss_detail_and_publishes_on_response() {
    let mut core = wpa_core("wlan0");
    core.enqueue("SCAN_RESULTS", linebridge::queue::SUPPLICANT_TIMEOUT)
        .unwrap();
    core.transport_mut()
        .push_bytes(b"aa:bb:cc:dd:ee:ff\t2412\t-55\t[WPA2-PSK-CCMP][ESS]\tMyAP\r\nOK\r\n");
    core.drain_transport().unwrap();

    let bss = core.bsses().by_bssid("aa:bb:cc:dd:ee:ff").unwrap();
    assert_eq!(bss.ssid, "MyAP");
    assert_eq!(bss.freq, 2412);
    assert_eq!(bss.level, -55);
    assert!(core.queue_contains("BSS aa:bb:cc:dd:ee:ff"));
}

#[test]
fn scenario_network_creation_and_psk_derivation() {
    let mut core = wpa_core("wlan0");
    core.networks_begin_create_station("Home");
    let psk_value = linebridge::dispatch::wpa::psk_set_network_value("\"secret\"", "Home", false);
    core.networks_queue_pending_psk("Home", psk_value);
    core.enqueue("ADD_NETWORK", linebridge::queue::SUPPLICANT_TIMEOUT)
        .unwrap();
    core.transport_mut().push_bytes(b"5\r\nOK\r\n");
    core.drain_transport().unwrap();

    assert_eq!(core.networks().by_ssid("Home").unwrap().id(), 5);
    // The ssid SET_NETWORK is written immediately; psk and save_config
    // queue behind it in order.
    assert!(core.queue_contains("SET_NETWORK 5 ssid \"Home\""));
    assert!(core.queue_contains("SET_NETWORK 5 psk \"secret\""));
}

#[test]
fn scenario_stale_bss_is_cleared_on_next_scan() {
    let mut core = wpa_core("wlan0");
    core.bsses_observe("11:22:33:44:55:66", "Gone", 2437, -70);
    core.enqueue("SCAN_RESULTS", linebridge::queue::SUPPLICANT_TIMEOUT)
        .unwrap();
    core.transport_mut().push_bytes(b"OK\r\n");
    core.drain_transport().unwrap();

    assert!(core.bsses().is_empty());
    assert_eq!(core.publisher().value_of("net/wlan0/bss/11:22:33:44:55:66/ssid"), Some(""));
}

#[test]
fn scenario_graceful_shutdown_clears_every_retained_topic() {
    let mut core = at_core("modem");
    core.enqueue("AT+CSQ", DEFAULT_TIMEOUT).unwrap();
    core.transport_mut().push_bytes(b"+CSQ: 17,2\r\nOK\r\n");
    core.drain_transport().unwrap();
    assert_eq!(core.publisher().value_of("modem/rssi"), Some("-79"));

    core.clear_all_retained().unwrap();
    assert_eq!(core.publisher().value_of("modem/rssi"), Some(""));
}

#[test]
fn scenario_timeout_budget_exhaustion_reports_dead_after_five() {
    let mut queue = CommandQueue::new();
    for _ in 0..5 {
        queue.enqueue("AT+CSQ", DEFAULT_TIMEOUT);
    }
    let mut dead = false;
    for _ in 0..5 {
        let (_, d) = queue.on_timeout();
        dead = d;
    }
    assert!(dead);
}

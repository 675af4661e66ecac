//! `wpa_supplicant` URC handling and reconciliation algorithms.

use std::time::Duration;

use crate::domain::{BssSet, Network, NetworkMode, NetworkSet, PendingOp};
use crate::queue::SUPPLICANT_TIMEOUT;

use super::Effect;

/// Handle one `<N>EVENT …` URC line (sigil already stripped by the
/// caller, which also knows the interface prefix to attach to topics).
pub fn handle_urc(body: &str) -> Vec<Effect> {
    let mut tokens = body.split_whitespace();
    let Some(event) = tokens.next() else {
        return Vec::new();
    };
    let rest: Vec<&str> = tokens.collect();

    match event {
        "CTRL-EVENT-CONNECTED" | "CTRL-EVENT-DISCONNECTED" => vec![
            Effect::enqueue("STATUS", SUPPLICANT_TIMEOUT),
            Effect::retained(
                "wifistate",
                if event == "CTRL-EVENT-CONNECTED" {
                    "connected"
                } else {
                    "disconnected"
                },
            ),
        ],
        "AP-ENABLED" => vec![Effect::retained("wifistate", "ap")],
        "AP-DISABLED" => vec![Effect::retained("wifistate", "disabled")],
        "MESH-GROUP-STARTED" => vec![Effect::retained("wifistate", "mesh")],
        "MESH-GROUP-REMOVED" => vec![Effect::retained("wifistate", "disabled")],
        "AP-STA-CONNECTED" | "MESH-PEER-CONNECTED" => {
            vec![Effect::enqueue("STATUS", SUPPLICANT_TIMEOUT)]
        }
        "AP-STA-DISCONNECTED" | "MESH-PEER-DISCONNECTED" => {
            vec![Effect::enqueue("STATUS", SUPPLICANT_TIMEOUT)]
        }
        "CTRL-EVENT-BSS-ADDED" => {
            if let Some(bssid) = rest.get(1) {
                vec![Effect::enqueue(format!("BSS {bssid}"), SUPPLICANT_TIMEOUT)]
            } else {
                Vec::new()
            }
        }
        "CTRL-EVENT-BSS-REMOVED" => {
            if let Some(bssid) = rest.get(1) {
                vec![Effect::ClearBss {
                    bssid: bssid.to_string(),
                }]
            } else {
                Vec::new()
            }
        }
        "CTRL-EVENT-SCAN-RESULTS" => vec![Effect::enqueue("SCAN_RESULTS", SUPPLICANT_TIMEOUT)],
        _ => Vec::new(),
    }
}

/// One row of a `SCAN_RESULTS` reply: `bssid\tfreq\tlevel\tflags\tssid`.
pub struct ScanRow<'a> {
    pub bssid: &'a str,
    pub freq: i64,
    pub level: i64,
    pub ssid: &'a str,
}

pub fn parse_scan_row(row: &str) -> Option<ScanRow<'_>> {
    let mut f = row.split('\t');
    let bssid = f.next()?;
    let freq: i64 = f.next()?.parse().ok()?;
    let level: i64 = f.next()?.parse().ok()?;
    let _flags = f.next()?;
    let ssid = f.next().unwrap_or_default();
    Some(ScanRow {
        bssid,
        freq,
        level,
        ssid,
    })
}

/// Full scan reconciliation: clear PRESENT, observe every row (marking
/// PRESENT and requesting per-BSS detail), then evict anything left
/// stale and clear its topics.
pub fn reconcile_scan(bss_set: &mut BssSet, rows: &[&str]) -> Vec<Effect> {
    bss_set.clear_present();
    let mut effects = Vec::new();
    for row in rows {
        if let Some(parsed) = parse_scan_row(row) {
            bss_set.observe(parsed.bssid, parsed.ssid.to_string(), parsed.freq, parsed.level);
            effects.push(Effect::enqueue(
                format!("BSS {}", parsed.bssid),
                SUPPLICANT_TIMEOUT,
            ));
        }
    }
    for stale_bssid in bss_set.evict_stale() {
        effects.push(Effect::ClearBss { bssid: stale_bssid });
    }
    effects
}

/// Apply an `ADD_NETWORK <id>` reply: transform the oldest pending
/// network into a born one, draining its pending ops into the commands
/// that actually carry them out.
pub fn apply_add_network_reply(network_set: &mut NetworkSet, id: i64) -> Vec<Effect> {
    let Some((ssid, pending_ops)) = network_set.assign_id(id) else {
        return Vec::new();
    };
    let mut effects = vec![Effect::enqueue(
        format!("SET_NETWORK {id} ssid \"{ssid}\""),
        SUPPLICANT_TIMEOUT,
    )];
    for op in pending_ops {
        match op {
            PendingOp::Set { key, value } => effects.push(Effect::enqueue(
                format!("SET_NETWORK {id} {key} {value}"),
                SUPPLICANT_TIMEOUT,
            )),
            PendingOp::Enable => {
                effects.push(Effect::enqueue(format!("ENABLE_NETWORK {id}"), SUPPLICANT_TIMEOUT))
            }
            PendingOp::Select => {
                effects.push(Effect::enqueue(format!("SELECT_NETWORK {id}"), SUPPLICANT_TIMEOUT))
            }
            PendingOp::Remove => {
                effects.push(Effect::enqueue(format!("REMOVE_NETWORK {id}"), SUPPLICANT_TIMEOUT))
            }
        }
    }
    effects.push(Effect::enqueue("SAVE_CONFIG", SUPPLICANT_TIMEOUT));
    effects
}

/// Parse a `STATUS` reply's `key=value` lines into the handful of topics
/// the bridge tracks (`bssid`, `freq`, `ssid`, `wifistate`).
pub fn parse_status(argv: &[String]) -> Vec<Effect> {
    let mut effects = Vec::new();
    for line in argv {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key {
            "bssid" => effects.push(Effect::retained("bssid", value)),
            "freq" => effects.push(Effect::retained("freq", value)),
            "ssid" => effects.push(Effect::retained("ssid", value)),
            "wpa_state" => effects.push(Effect::retained(
                "wifistate",
                if value == "COMPLETED" {
                    "connected".to_string()
                } else {
                    value.to_lowercase()
                },
            )),
            _ => {}
        }
    }
    effects
}

/// One `BSS <bssid>` detail reply's `key=value` lines, the fields the
/// bridge republishes per-BSS after a scan row already created the entry.
pub fn parse_bss_detail(argv: &[String]) -> Option<(String, String, i64, i64)> {
    let mut bssid = None;
    let mut ssid = String::new();
    let mut freq = 0i64;
    let mut level = 0i64;
    for line in argv {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key {
            "bssid" => bssid = Some(value.to_string()),
            "ssid" => ssid = value.to_string(),
            "freq" => freq = value.parse().unwrap_or(0),
            "level" => level = value.parse().unwrap_or(0),
            _ => {}
        }
    }
    bssid.map(|bssid| (bssid, ssid, freq, level))
}

/// Apply a `BSS <bssid>` detail reply: update the matching entry (scan
/// reconciliation already created it) and republish its topics.
pub fn apply_bss_detail(bss_set: &mut BssSet, argv: &[String]) -> Vec<Effect> {
    let Some((bssid, ssid, freq, level)) = parse_bss_detail(argv) else {
        return Vec::new();
    };
    bss_set.observe(&bssid, ssid.clone(), freq, level);
    vec![
        Effect::retained(format!("bss/{bssid}/ssid"), ssid),
        Effect::retained(format!("bss/{bssid}/freq"), freq.to_string()),
        Effect::retained(format!("bss/{bssid}/level"), level.to_string()),
    ]
}

/// `LIST_NETWORKS` has no retained counterpart (the network set is
/// already tracked from `ADD_NETWORK`/`REMOVE_NETWORK` traffic); forward
/// it verbatim as a non-retained diagnostic passthrough.
pub fn handle_list_networks(argv: &[String]) -> Vec<Effect> {
    vec![Effect::transient("networks", argv.join("\n"))]
}

/// Recompute `lastAP`/`lastmesh` after any network-set mutation.
pub fn last_ap_and_mesh(network_set: &NetworkSet) -> Vec<Effect> {
    let ap_ssid = network_set
        .highest_id_of_mode(NetworkMode::Ap)
        .map(Network::ssid)
        .unwrap_or_default();
    let mesh_ssid = network_set
        .highest_id_of_mode(NetworkMode::Mesh)
        .map(Network::ssid)
        .unwrap_or_default();
    vec![
        Effect::retained("lastAP", ap_ssid),
        Effect::retained("lastmesh", mesh_ssid),
    ]
}

/// PBKDF2-HMAC-SHA1(psk, ssid, 4096, 32) hex-encoded, used when the
/// "no-plain-PSK" quirk is active. `psk` is expected with surrounding
/// quotes stripped by the caller.
pub fn derive_psk_hex(psk: &str, ssid: &str) -> String {
    let mut out = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<sha1::Sha1>(psk.as_bytes(), ssid.as_bytes(), 4096, &mut out);
    hex::encode(out)
}

/// Turn a raw `ssid/psk` payload's PSK line into the literal or derived
/// form to send in `SET_NETWORK <id> psk <value>`, per the quirk flag.
pub fn psk_set_network_value(psk_line: &str, ssid: &str, no_plain_psk: bool) -> String {
    let quoted = psk_line.starts_with('"') && psk_line.ends_with('"') && psk_line.len() >= 2;
    if no_plain_psk && quoted {
        let bare = &psk_line[1..psk_line.len() - 1];
        derive_psk_hex(bare, ssid)
    } else {
        psk_line.to_string()
    }
}

#[allow(dead_code)]
const ENQUEUE_RETRY: Duration = Duration::from_secs(1);

//! AT-modem URC and response handling.
//!
//! Functions here are pure: given a record (and whatever domain state
//! they need read access to) they return the [`Effect`]s the core loop
//! should apply. Mutations to [`OperatorTable`] happen in place since the
//! table itself has no useful "effect" representation (it's additive
//! bookkeeping, not a publish).

use std::time::Duration;

use crate::domain::{OperatorTable, Source};
use crate::queue::{DEFAULT_TIMEOUT, OPERATOR_SCAN_TIMEOUT};

use super::Effect;

/// BER bucket table, 3GPP-style, index 0..=7; 99 means "no value".
const BER_BUCKETS: [&str; 8] = [
    "<0.01%",
    "0.01% -- 0.1%",
    "0.1% -- 0.5%",
    "0.5% -- 1%",
    "1% -- 2%",
    "2% -- 4%",
    "4% -- 8%",
    ">8%",
];

/// Decode a `+CSQ: <rssi>,<ber>` body into the RSSI (dBm) and BER bucket
/// strings to publish. `99` in either field is the "no value" sentinel
/// and publishes an empty string.
pub fn parse_csq(body: &str) -> Option<(String, String)> {
    let (rssi_raw, ber_raw) = body.split_once(',')?;
    let rssi_raw: i32 = rssi_raw.trim().parse().ok()?;
    let ber_raw: usize = ber_raw.trim().parse().ok()?;

    let rssi = if rssi_raw == 99 {
        String::new()
    } else {
        (-113 + 2 * rssi_raw).to_string()
    };
    let ber = BER_BUCKETS
        .get(ber_raw)
        .map(|s| s.to_string())
        .unwrap_or_default();
    Some((rssi, ber))
}

/// Parsed `+CREG:`/`+CGREG:` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegInfo {
    pub reg: &'static str,
    pub lac: Option<u32>,
    pub cellid: Option<u32>,
    pub nt: Option<&'static str>,
}

fn reg_status_str(stat: u8) -> &'static str {
    match stat {
        0 => "not-registered",
        1 => "registered",
        2 => "searching",
        3 => "denied",
        5 => "roaming",
        _ => "unknown",
    }
}

fn act_to_nt(act: u8) -> Option<&'static str> {
    match act {
        0 | 1 => Some("2g"),
        2 | 4 | 5 | 6 => Some("3g"),
        7 | 8 | 9 => Some("4g"),
        _ => None,
    }
}

/// Parse a `+CREG:`/`+CGREG:` notification body (the part after the
/// colon). Tolerates the short `n,stat` URC-subscribe-ack form as well as
/// the full `n,stat,"lac","ci"[,AcT]` form.
pub fn parse_reg(body: &str) -> Option<RegInfo> {
    let fields: Vec<&str> = body.split(',').map(str::trim).collect();
    if fields.len() < 2 {
        return None;
    }
    let stat: u8 = fields[1].parse().ok()?;
    let lac = fields
        .get(2)
        .map(|f| f.trim_matches('"'))
        .and_then(|f| u32::from_str_radix(f, 16).ok());
    let cellid = fields
        .get(3)
        .map(|f| f.trim_matches('"'))
        .and_then(|f| u32::from_str_radix(f, 16).ok());
    let nt = fields.get(4).and_then(|f| f.parse::<u8>().ok()).and_then(act_to_nt);

    Some(RegInfo {
        reg: reg_status_str(stat),
        lac,
        cellid,
        nt,
    })
}

/// Should a `+COPS?` poll follow this registration state? (registered,
/// roaming, or denied — per the spec.)
fn reg_triggers_cops_scan(reg: &str) -> bool {
    matches!(reg, "registered" | "roaming" | "denied")
}

/// Handle a registration URC/response body (`+CREG:` or `+CGREG:`),
/// producing the priority-arbitrated publishes and the follow-up scan.
pub fn handle_reg(source: Source, body: &str) -> Vec<Effect> {
    let Some(info) = parse_reg(body) else {
        return Vec::new();
    };
    let mut effects = vec![Effect::PublishRetained {
        topic: "reg".to_string(),
        value: info.reg.to_string(),
    }];
    if let Some(lac) = info.lac {
        effects.push(Effect::PublishRetainedPriority {
            topic: "lac".to_string(),
            value: lac.to_string(),
            source,
        });
    }
    if let Some(cellid) = info.cellid {
        effects.push(Effect::PublishRetainedPriority {
            topic: "cellid".to_string(),
            value: cellid.to_string(),
            source,
        });
    }
    if let Some(nt) = info.nt {
        effects.push(Effect::PublishRetainedPriority {
            topic: "nt".to_string(),
            value: nt.to_string(),
            source,
        });
    }
    if reg_triggers_cops_scan(info.reg) {
        effects.push(Effect::enqueue("AT+COPS?", DEFAULT_TIMEOUT));
    }
    effects
}

/// Handle `+CSQ:` — always unconditional (no priority arbitration).
pub fn handle_csq(body: &str) -> Vec<Effect> {
    match parse_csq(body) {
        Some((rssi, ber)) => vec![
            Effect::retained("rssi", rssi),
            Effect::retained("ber", ber),
        ],
        None => Vec::new(),
    }
}

/// Handle a `+COPN:` operator-name notification: `"<id>","<name>"`.
pub fn handle_copn(body: &str, operators: &mut OperatorTable) {
    let mut parts = body.splitn(2, ',');
    let Some(id) = parts.next().map(|s| s.trim().trim_matches('"').to_string()) else {
        return;
    };
    let Some(name) = parts.next().map(|s| s.trim().trim_matches('"').to_string()) else {
        return;
    };
    operators.insert(id, name);
}

/// Handle a non-parenthesised `+COPS:` (current operator) or
/// parenthesised (scan-result list) body.
pub fn handle_cops(body: &str) -> Vec<Effect> {
    if body.trim_start().starts_with('(') {
        // Scan result: forward verbatim, non-retained.
        return vec![Effect::transient("ops", body.to_string())];
    }
    let fields: Vec<&str> = body.split(',').collect();
    let name = fields
        .get(2)
        .map(|f| f.trim().trim_matches('"').to_string())
        .unwrap_or_default();
    vec![Effect::retained("op", name)]
}

/// `+CPIN: READY` kicks off the SIM-identification batch.
pub fn handle_cpin_ready() -> Vec<Effect> {
    [
        "AT+CGMI", "AT+CGMM", "AT+CGMR", "AT+CGSN", "AT+CSPN?", "AT+CCID", "AT+CIMI", "AT+CNUM",
        "AT+COPN",
    ]
    .into_iter()
    .map(|cmd| Effect::enqueue(cmd, DEFAULT_TIMEOUT))
    .collect()
}

/// `+SIMCARD: NOT AVAILABLE` clears every SIM-derived topic and the
/// operator table.
pub fn handle_sim_removed(operators: &mut OperatorTable) -> Vec<Effect> {
    operators.clear();
    [
        "imsi", "iccid", "op", "opid", "simop", "simopid", "number", "imei", "brand", "model",
        "rev",
    ]
    .into_iter()
    .map(|topic| Effect::retained(topic, ""))
    .collect()
}

/// `NO CARRIER` optionally triggers `AT+CEER` for an extended error report.
pub fn handle_no_carrier() -> Vec<Effect> {
    vec![Effect::enqueue("AT+CEER", Duration::from_secs(5))]
}

/// Trigger an operator scan (e.g. from the `ops/scan` inbound topic).
pub fn operator_scan() -> Vec<Effect> {
    vec![Effect::enqueue("AT+COPS=?", OPERATOR_SCAN_TIMEOUT)]
}

/// Handle the bare-value body of an identity-query response — `AT+CCID`,
/// `AT+CGSN`, `AT+CGMI`, `AT+CGMM`, `AT+CGMR` all reply with a single
/// unprefixed line rather than an intermediate-response prefix, so the
/// command just sent (not the body itself) picks the topic.
pub fn handle_identity_response(command: &str, argv: &[String]) -> Vec<Effect> {
    let topic = if command.starts_with("AT+CCID") {
        "iccid"
    } else if command.starts_with("AT+CGSN") {
        "imei"
    } else if command.starts_with("AT+CGMI") {
        "brand"
    } else if command.starts_with("AT+CGMM") {
        "model"
    } else if command.starts_with("AT+CGMR") {
        "rev"
    } else {
        return Vec::new();
    };
    let value = argv.first().map(|s| s.trim().to_string()).unwrap_or_default();
    vec![Effect::retained(topic, value)]
}

/// Handle `AT+CIMI`'s bare-IMSI body: publish `imsi` and, if the operator
/// table already resolves a match, `simop`/`simopid` from the IMSI prefix.
pub fn handle_imsi_response(argv: &[String], operators: &OperatorTable) -> Vec<Effect> {
    let imsi = argv.first().map(|s| s.trim().to_string()).unwrap_or_default();
    let mut effects = vec![Effect::retained("imsi", imsi.clone())];
    if let Some(entry) = operators.by_imsi_prefix(&imsi) {
        effects.push(Effect::retained("simopid", entry.id.clone()));
        effects.push(Effect::retained("simop", entry.name.clone()));
    }
    effects
}

/// Handle `AT+CNUM`'s `+CNUM: "<name>","<number>",<type>` body.
pub fn handle_cnum_response(argv: &[String]) -> Vec<Effect> {
    let Some(line) = argv.first() else {
        return Vec::new();
    };
    let body = line.strip_prefix("+CNUM:").unwrap_or(line);
    let fields: Vec<&str> = body.split(',').collect();
    let number = fields
        .get(1)
        .map(|f| f.trim().trim_matches('"').to_string())
        .unwrap_or_default();
    vec![Effect::retained("number", number)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csq_99_99_is_the_no_value_sentinel() {
        let (rssi, ber) = parse_csq("99,99").unwrap();
        assert_eq!(rssi, "");
        assert_eq!(ber, "");
    }

    #[test]
    fn csq_17_2_matches_the_signal_poll_scenario() {
        let (rssi, ber) = parse_csq("17,2").unwrap();
        assert_eq!(rssi, "-79");
        assert_eq!(ber, "0.1% -- 0.5%");
    }

    #[test]
    fn creg_decodes_hex_lac_and_cellid_at_creg_priority() {
        let info = parse_reg(r#"0,1,"001F","ABCD1234",7"#).unwrap();
        assert_eq!(info.reg, "registered");
        assert_eq!(info.lac, Some(31));
        assert_eq!(info.cellid, Some(0xABCD1234));
        assert_eq!(info.nt, Some("4g"));
    }

    #[test]
    fn registered_reg_state_enqueues_cops_poll() {
        let effects = handle_reg(Source::Creg, r#"0,1,"001F","ABCD1234",7"#);
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::Enqueue { line, .. } if line == "AT+COPS?")));
    }

    #[test]
    fn copn_adds_to_operator_table() {
        let mut ops = OperatorTable::new();
        handle_copn(r#""26201","T-Mobile DE""#, &mut ops);
        assert_eq!(ops.by_id("26201").unwrap().name, "T-Mobile DE");
    }

    #[test]
    fn cpin_ready_enqueues_full_sim_batch() {
        let effects = handle_cpin_ready();
        assert_eq!(effects.len(), 9);
    }

    #[test]
    fn identity_response_maps_command_to_topic() {
        let argv = vec!["123456789012345".to_string()];
        let effects = handle_identity_response("AT+CGSN", &argv);
        assert_eq!(effects, vec![Effect::retained("imei", "123456789012345")]);
    }

    #[test]
    fn imsi_response_resolves_operator_from_table() {
        let mut ops = OperatorTable::new();
        ops.insert("26201", "T-Mobile DE");
        let argv = vec!["262011234567890".to_string()];
        let effects = handle_imsi_response(&argv, &ops);
        assert!(effects.contains(&Effect::retained("imsi", "262011234567890")));
        assert!(effects.contains(&Effect::retained("simop", "T-Mobile DE")));
    }

    #[test]
    fn cnum_response_extracts_number_field() {
        let argv = vec![r#"+CNUM: "Line 1","+491701234567",145"#.to_string()];
        let effects = handle_cnum_response(&argv);
        assert_eq!(effects, vec![Effect::retained("number", "+491701234567")]);
    }
}

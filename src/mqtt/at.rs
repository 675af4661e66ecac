//! Inbound topic routing for the AT-modem bridge.
//!
//! Tokens are `<prefix>/…`; only `raw/send`, `at/set`, and `ops/scan` are
//! recognized inbound suffixes (per `spec.md` §4.7) — anything else is
//! logged and dropped by the caller.

/// A routed inbound command, ready for the dispatcher to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtInbound {
    /// Enqueue the payload verbatim as an AT command line.
    SendRaw(String),
    /// Optional `AT+COPS=2` detach (quirk-gated) then `AT+COPS=?` scan.
    OpsScan,
}

/// Route a topic (with the `<prefix>/` already stripped) and payload to
/// an [`AtInbound`] command, or `None` if the suffix isn't recognized.
pub fn route(suffix: &str, payload: &[u8]) -> Option<AtInbound> {
    match suffix {
        "raw/send" | "at/set" => {
            let line = String::from_utf8_lossy(payload).trim().to_string();
            Some(AtInbound::SendRaw(line))
        }
        "ops/scan" => Some(AtInbound::OpsScan),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_send_and_at_set_both_enqueue_verbatim() {
        assert_eq!(
            route("raw/send", b"AT+CSQ"),
            Some(AtInbound::SendRaw("AT+CSQ".into()))
        );
        assert_eq!(
            route("at/set", b"AT+CSQ\n"),
            Some(AtInbound::SendRaw("AT+CSQ".into()))
        );
    }

    #[test]
    fn ops_scan_ignores_payload() {
        assert_eq!(route("ops/scan", b"anything"), Some(AtInbound::OpsScan));
    }

    #[test]
    fn unknown_suffix_is_unrouted() {
        assert_eq!(route("unknown/thing", b""), None);
    }
}

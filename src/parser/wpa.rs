//! `wpa_supplicant` control-interface record classifier.
//!
//! Unsolicited events carry a priority sigil `<N>` (`wpa_supplicant`'s own
//! syslog-style levels); `<2>`, `<3>`, and `<4>` lines are always URCs
//! (e.g. `<2>CTRL-EVENT-SCAN-RESULTS`). A literal `OK` or `FAIL` line is
//! the terminator for the in-flight command. Everything else is body —
//! multi-row replies like `SCAN_RESULTS` or `LIST_NETWORKS` have no
//! explicit terminator line of their own; the core event loop synthesizes
//! command completion once a full datagram has been drained with a
//! command in flight and no explicit terminator appeared.

use super::Classification;

/// Classifies `wpa_supplicant` control-socket records.
#[derive(Debug, Default)]
pub struct SupplicantClassifier;

impl SupplicantClassifier {
    pub fn classify(&self, line: &str) -> Classification {
        if is_urc_sigil(line) {
            return Classification::Urc(line.to_string());
        }
        match line {
            "OK" => Classification::Terminator(Ok(())),
            "FAIL" => Classification::Terminator(Err("FAIL".to_string())),
            _ => Classification::Body(line.to_string()),
        }
    }
}

fn is_urc_sigil(line: &str) -> bool {
    matches!(line.as_bytes(), [b'<', n, b'>', ..] if matches!(n, b'2' | b'3' | b'4'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_sigils_are_urc() {
        let c = SupplicantClassifier;
        assert_eq!(
            c.classify("<2>CTRL-EVENT-SCAN-RESULTS"),
            Classification::Urc("<2>CTRL-EVENT-SCAN-RESULTS".into())
        );
        assert_eq!(
            c.classify("<3>CTRL-EVENT-CONNECTED"),
            Classification::Urc("<3>CTRL-EVENT-CONNECTED".into())
        );
    }

    #[test]
    fn ok_and_fail_are_terminators() {
        let c = SupplicantClassifier;
        assert_eq!(c.classify("OK"), Classification::Terminator(Ok(())));
        assert_eq!(
            c.classify("FAIL"),
            Classification::Terminator(Err("FAIL".into()))
        );
    }

    #[test]
    fn scan_result_rows_are_body() {
        let c = SupplicantClassifier;
        assert_eq!(
            c.classify("00:11:22:33:44:55\t2412\t-40\t[WPA2-PSK-CCMP]\thome"),
            Classification::Body("00:11:22:33:44:55\t2412\t-40\t[WPA2-PSK-CCMP]\thome".into())
        );
    }
}

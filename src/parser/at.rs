//! AT-command record classifier.
//!
//! `PB DONE`, `SMS DONE`, and `RING` are vendor quirks that never
//! terminate a command, even when one happens to be in flight. `OK`,
//! `ERROR`, `ABORT`, `NO CARRIER`, and `+CME ERROR:` are ambiguous on
//! their own — the spec resolves them by command-in-flight state: with a
//! command outstanding they terminate it, otherwise they're unsolicited.
//! Every other `+`/`*`-prefixed line is always a URC.

use super::Classification;

const ALWAYS_URC: &[&str] = &["PB DONE", "SMS DONE", "RING"];

/// Classifies AT records, given whether a command is currently in flight.
#[derive(Debug, Default)]
pub struct AtClassifier;

impl AtClassifier {
    pub fn classify(&self, line: &str, command_in_flight: bool) -> Classification {
        if ALWAYS_URC.iter().any(|&u| line == u) {
            return Classification::Urc(line.to_string());
        }

        if let Some(outcome) = terminator_outcome(line) {
            return if command_in_flight {
                Classification::Terminator(outcome)
            } else {
                Classification::Urc(line.to_string())
            };
        }

        if line.starts_with('+') || line.starts_with('*') {
            return Classification::Urc(line.to_string());
        }

        Classification::Body(line.to_string())
    }
}

fn terminator_outcome(line: &str) -> Option<std::result::Result<(), String>> {
    match line {
        "OK" => Some(Ok(())),
        "ERROR" | "ABORT" | "NO CARRIER" => Some(Err(line.to_string())),
        _ if line.starts_with("+CME ERROR") => Some(Err(line.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pb_done_is_always_urc_even_with_command_in_flight() {
        let c = AtClassifier;
        assert_eq!(
            c.classify("PB DONE", true),
            Classification::Urc("PB DONE".into())
        );
        assert_eq!(
            c.classify("PB DONE", false),
            Classification::Urc("PB DONE".into())
        );
    }

    #[test]
    fn ok_terminates_only_when_in_flight() {
        let c = AtClassifier;
        assert_eq!(
            c.classify("OK", true),
            Classification::Terminator(Ok(()))
        );
        assert_eq!(c.classify("OK", false), Classification::Urc("OK".into()));
    }

    #[test]
    fn no_carrier_terminates_in_flight_command() {
        let c = AtClassifier;
        assert_eq!(
            c.classify("NO CARRIER", true),
            Classification::Terminator(Err("NO CARRIER".into()))
        );
        assert_eq!(
            c.classify("NO CARRIER", false),
            Classification::Urc("NO CARRIER".into())
        );
    }

    #[test]
    fn cme_error_terminates_with_reason() {
        let c = AtClassifier;
        assert_eq!(
            c.classify("+CME ERROR: 10", true),
            Classification::Terminator(Err("+CME ERROR: 10".into()))
        );
    }

    #[test]
    fn unprefixed_line_is_body() {
        let c = AtClassifier;
        assert_eq!(
            c.classify("+493012345678", true),
            Classification::Urc("+493012345678".into())
        );
        assert_eq!(
            c.classify("some vendor banner", true),
            Classification::Body("some vendor banner".into())
        );
    }
}

//! Inbound topic routing for the `wpa_supplicant` bridge.
//!
//! Tokens are `net/<iface>/…`; the caller strips `net/<iface>/` before
//! calling [`route`], since the interface is already known from the
//! subscription the bridge made at startup.

/// A routed inbound command, ready for the dispatcher to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WpaInbound {
    /// Select named network (`"all"`/`"none"` are handled by the caller
    /// as enable-all/disable-all before reaching this far).
    SsidSet(String),
    SsidEnable(String),
    SsidDisable(String),
    SsidRemove(String),
    /// `SSID\nPSK` payload.
    SsidPsk { ssid: String, psk: String },
    SsidAp(String),
    SsidMesh(String),
    SsidConfig { ssid: String, key: String, value: String },
    SsidCreate(String),
    WifiConfig { key: String, value: String },
    WifiStateSet(String),
}

/// Route a topic suffix (with `net/<iface>/` stripped) and payload.
pub fn route(suffix: &str, payload: &[u8]) -> Option<WpaInbound> {
    let payload_str = || String::from_utf8_lossy(payload).to_string();
    let two_lines = || -> Option<(String, String)> {
        let text = String::from_utf8_lossy(payload);
        let mut lines = text.lines();
        let a = lines.next()?.to_string();
        let b = lines.next()?.to_string();
        Some((a, b))
    };

    match suffix {
        "ssid/set" => Some(WpaInbound::SsidSet(payload_str())),
        "ssid/enable" => Some(WpaInbound::SsidEnable(payload_str())),
        "ssid/disable" => Some(WpaInbound::SsidDisable(payload_str())),
        "ssid/remove" => Some(WpaInbound::SsidRemove(payload_str())),
        "ssid/psk" => {
            let (ssid, psk) = two_lines()?;
            Some(WpaInbound::SsidPsk { ssid, psk })
        }
        "ssid/ap" => Some(WpaInbound::SsidAp(payload_str())),
        "ssid/mesh" => Some(WpaInbound::SsidMesh(payload_str())),
        "ssid/create" => Some(WpaInbound::SsidCreate(payload_str())),
        "wifistate/set" => Some(WpaInbound::WifiStateSet(payload_str())),
        _ if suffix.starts_with("ssid/config/") => {
            let key = suffix.strip_prefix("ssid/config/")?.to_string();
            let (ssid, value) = two_lines()?;
            Some(WpaInbound::SsidConfig { ssid, key, value })
        }
        _ if suffix.starts_with("wifi/config/") => {
            let key = suffix.strip_prefix("wifi/config/")?.to_string();
            Some(WpaInbound::WifiConfig {
                key,
                value: payload_str(),
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssid_psk_splits_two_line_payload() {
        let got = route("ssid/psk", b"Home\n\"secret\"\n").unwrap();
        assert_eq!(
            got,
            WpaInbound::SsidPsk {
                ssid: "Home".into(),
                psk: "\"secret\"".into(),
            }
        );
    }

    #[test]
    fn ssid_config_key_is_extracted_from_suffix() {
        let got = route("ssid/config/priority", b"Home\n5\n").unwrap();
        assert_eq!(
            got,
            WpaInbound::SsidConfig {
                ssid: "Home".into(),
                key: "priority".into(),
                value: "5".into(),
            }
        );
    }

    #[test]
    fn wifi_config_key_is_extracted_from_suffix() {
        let got = route("wifi/config/country", b"DE").unwrap();
        assert_eq!(
            got,
            WpaInbound::WifiConfig {
                key: "country".into(),
                value: "DE".into(),
            }
        );
    }

    #[test]
    fn unknown_suffix_is_unrouted() {
        assert_eq!(route("bogus", b""), None);
    }
}

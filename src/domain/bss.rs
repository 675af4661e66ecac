//! BSS set: scan-observed radio cells, sorted by BSSID.
//!
//! `PRESENT` is a transient mark used only during scan reconciliation: a
//! full `SCAN_RESULTS` reply clears it on every known BSS, sets it again
//! for each row the reply mentions, and anything left unmarked afterward
//! is stale and gets removed (with its four retained topics cleared).

/// Capability flags rendered as the fixed-position mask `"wWekd"` /
/// `"wWekda"` (`w`=WPA, `W`=WEP, `e`=EAP, `k`=KNOWN, `d`=DISABLED,
/// `a`=AP), one character per flag, lowercase letter set / uppercase-or-
/// dash unset following the spec's convention of always emitting all
/// five (six for AP-capable) slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BssFlags {
    pub wpa: bool,
    pub wep: bool,
    pub eap: bool,
    pub known: bool,
    pub disabled: bool,
    pub ap: bool,
    /// Transient: set during scan reconciliation, cleared before each
    /// new `SCAN_RESULTS` pass.
    pub present: bool,
}

impl BssFlags {
    /// Render as the fixed-position mask used on the `flags` topic.
    pub fn render(&self) -> String {
        let mut s = String::with_capacity(6);
        s.push(if self.wpa { 'w' } else { '-' });
        s.push(if self.wep { 'W' } else { '-' });
        s.push(if self.eap { 'e' } else { '-' });
        s.push(if self.known { 'k' } else { '-' });
        s.push(if self.disabled { 'd' } else { '-' });
        if self.ap {
            s.push('a');
        }
        s
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bss {
    pub bssid: String,
    pub ssid: String,
    /// Frequency, kHz or MHz — consistent within a single scan run.
    pub freq: i64,
    /// Signal level in dBm (signed).
    pub level: i64,
    pub flags: BssFlags,
}

/// The full set of observed BSSes, sorted by BSSID for binary search.
#[derive(Debug, Default)]
pub struct BssSet {
    bsses: Vec<Bss>,
}

impl BssSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear `PRESENT` on every BSS — step one of scan reconciliation.
    pub fn clear_present(&mut self) {
        for b in &mut self.bsses {
            b.flags.present = false;
        }
    }

    /// Insert or update a BSS observed in the current scan pass, marking
    /// it `PRESENT`.
    pub fn observe(&mut self, bssid: &str, ssid: String, freq: i64, level: i64) {
        if let Some(b) = self.bsses.iter_mut().find(|b| b.bssid == bssid) {
            b.ssid = ssid;
            b.freq = freq;
            b.level = level;
            b.flags.present = true;
        } else {
            let mut flags = BssFlags::default();
            flags.present = true;
            self.bsses.push(Bss {
                bssid: bssid.to_string(),
                ssid,
                freq,
                level,
                flags,
            });
            self.sort();
        }
    }

    /// Remove every BSS still unmarked after a scan pass, returning their
    /// BSSIDs so the caller can clear their retained topics.
    pub fn evict_stale(&mut self) -> Vec<String> {
        let (stale, present): (Vec<_>, Vec<_>) =
            self.bsses.drain(..).partition(|b| !b.flags.present);
        self.bsses = present;
        stale.into_iter().map(|b| b.bssid).collect()
    }

    pub fn by_bssid(&self, bssid: &str) -> Option<&Bss> {
        self.bsses.iter().find(|b| b.bssid == bssid)
    }

    pub fn by_bssid_mut(&mut self, bssid: &str) -> Option<&mut Bss> {
        self.bsses.iter_mut().find(|b| b.bssid == bssid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bss> {
        self.bsses.iter()
    }

    pub fn len(&self) -> usize {
        self.bsses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bsses.is_empty()
    }

    fn sort(&mut self) {
        self.bsses.sort_by(|a, b| a.bssid.cmp(&b.bssid));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_reconciliation_keeps_present_and_evicts_stale() {
        let mut set = BssSet::new();
        set.observe("aa:bb:cc:dd:ee:ff", "MyAP".into(), 2412, -55);
        set.observe("11:22:33:44:55:66", "Other".into(), 2437, -70);

        set.clear_present();
        set.observe("aa:bb:cc:dd:ee:ff", "MyAP".into(), 2412, -50);

        let stale = set.evict_stale();
        assert_eq!(stale, vec!["11:22:33:44:55:66".to_string()]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.by_bssid("aa:bb:cc:dd:ee:ff").unwrap().level, -50);
    }

    #[test]
    fn flags_render_fixed_position_mask() {
        let mut f = BssFlags {
            wpa: true,
            ..Default::default()
        };
        assert_eq!(f.render(), "w----");
        f.ap = true;
        assert_eq!(f.render(), "w----a");
    }

    #[test]
    fn bsses_stay_sorted_by_bssid() {
        let mut set = BssSet::new();
        set.observe("ff:ff:ff:ff:ff:ff", "Z".into(), 2412, -50);
        set.observe("00:00:00:00:00:00", "A".into(), 2412, -50);
        let order: Vec<&str> = set.iter().map(|b| b.bssid.as_str()).collect();
        assert_eq!(order, vec!["00:00:00:00:00:00", "ff:ff:ff:ff:ff:ff"]);
    }
}

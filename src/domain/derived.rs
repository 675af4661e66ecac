//! Derived-property cache: the last-published string value of every
//! externally observable scalar (`rssi`, `ber`, `op`, `nt`, `lac`,
//! `cellid`, …), plus source-priority arbitration for the handful of
//! properties (`nt`, `lac`, `cellid`) that more than one AT reply can set.
//!
//! The cache itself is publish-on-change bookkeeping only — actual MQTT
//! I/O lives in [`crate::publish`]. This module answers "did the value
//! change" and "is this source allowed to overwrite the current value".

use std::collections::HashMap;

/// Sources that can set a priority-arbitrated property. Ordered by
/// ascending priority in source code only — comparison uses
/// [`Source::priority`], not derive order, so the ordering stays
/// explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Cops,
    Creg,
    Cgreg,
}

impl Source {
    /// Higher wins. CGREG > CREG > COPS, per the spec.
    fn priority(self) -> u8 {
        match self {
            Source::Cops => 0,
            Source::Creg => 1,
            Source::Cgreg => 2,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedValue {
    value: String,
    set_by: Option<Source>,
}

/// Publish-on-change cache for every derived scalar property, keyed by
/// topic name (e.g. `"rssi"`, `"nt"`, `"lac"`).
#[derive(Debug, Default)]
pub struct PropertyCache {
    values: HashMap<String, CachedValue>,
}

impl PropertyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditional set (no source arbitration), for properties only one
    /// handler ever writes. Returns `true` if the value actually changed.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> bool {
        let value = value.into();
        match self.values.get_mut(key) {
            Some(cached) if cached.value == value => false,
            Some(cached) => {
                cached.value = value;
                cached.set_by = None;
                true
            }
            None => {
                self.values.insert(
                    key.to_string(),
                    CachedValue {
                        value,
                        set_by: None,
                    },
                );
                true
            }
        }
    }

    /// Source-arbitrated set for `nt`/`lac`/`cellid`-style properties. A
    /// lower-priority source may not overwrite a value set by a
    /// higher-priority one. Returns `true` if the value was actually
    /// written (and therefore should be published).
    pub fn set_with_priority(&mut self, key: &str, value: impl Into<String>, source: Source) -> bool {
        let value = value.into();
        match self.values.get_mut(key) {
            Some(cached) => {
                if let Some(current_source) = cached.set_by {
                    if source.priority() < current_source.priority() {
                        return false;
                    }
                }
                if cached.value == value && cached.set_by == Some(source) {
                    return false;
                }
                cached.value = value;
                cached.set_by = Some(source);
                true
            }
            None => {
                self.values.insert(
                    key.to_string(),
                    CachedValue {
                        value,
                        set_by: Some(source),
                    },
                );
                true
            }
        }
    }

    /// Clear a property. Arbitrated properties may only be cleared by the
    /// source that last set them (or if unset).
    pub fn clear(&mut self, key: &str, source: Option<Source>) -> bool {
        match self.values.get(key) {
            None => false,
            Some(cached) => {
                if let (Some(owner), Some(requested)) = (cached.set_by, source) {
                    if owner != requested {
                        return false;
                    }
                }
                if cached.value.is_empty() {
                    return false;
                }
                self.values.remove(key);
                true
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|c| c.value.as_str())
    }

    /// All non-empty cached topics, for clean-shutdown clearing.
    pub fn non_empty_keys(&self) -> Vec<String> {
        self.values
            .iter()
            .filter(|(_, v)| !v.value.is_empty())
            .map(|(k, _)| k.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_value_suppresses_republish() {
        let mut c = PropertyCache::new();
        assert!(c.set("rssi", "-79"));
        assert!(!c.set("rssi", "-79"));
        assert!(c.set("rssi", "-80"));
    }

    #[test]
    fn cgreg_outranks_creg_which_outranks_cops() {
        let mut c = PropertyCache::new();
        assert!(c.set_with_priority("nt", "3g", Source::Cops));
        assert!(c.set_with_priority("nt", "4g", Source::Creg));
        // COPS may not overwrite a CREG-set value.
        assert!(!c.set_with_priority("nt", "2g", Source::Cops));
        assert_eq!(c.get("nt"), Some("4g"));
        // CGREG outranks CREG.
        assert!(c.set_with_priority("nt", "5g", Source::Cgreg));
        assert_eq!(c.get("nt"), Some("5g"));
    }

    #[test]
    fn clear_requires_owning_source() {
        let mut c = PropertyCache::new();
        c.set_with_priority("lac", "31", Source::Creg);
        assert!(!c.clear("lac", Some(Source::Cops)));
        assert!(c.clear("lac", Some(Source::Creg)));
        assert_eq!(c.get("lac"), None);
    }
}

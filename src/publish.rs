//! MQTT publish discipline: publish-on-change for retained state topics,
//! always-publish for non-retained passthroughs, and clean-shutdown
//! clearing.
//!
//! This module owns the *policy* (retained vs. not, QoS selection,
//! change-detection) and delegates the actual broker write to whatever
//! implements [`Publisher`] — in production that's [`crate::mqtt::Mqtt`],
//! in tests an in-memory recorder.

use crate::domain::PropertyCache;
use crate::error::Result;

/// QoS level used for a publish. Configurable: 0 against a localhost
/// broker, 1 otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
}

/// Minimal capability the publish cache needs from an MQTT client.
pub trait Publisher {
    fn publish(&mut self, topic: &str, payload: &str, retain: bool, qos: Qos) -> Result<()>;
}

/// Publish-on-change cache over retained state topics, plus helpers for
/// the always-published non-retained passthroughs (`raw/at`, `fail`,
/// `warn`, scan results, `tmp/<iface>/wpa`).
pub struct PublishCache {
    cache: PropertyCache,
    qos: Qos,
}

impl PublishCache {
    pub fn new(qos: Qos) -> Self {
        Self {
            cache: PropertyCache::new(),
            qos,
        }
    }

    /// Publish a retained state topic only if the value differs from the
    /// cache.
    pub fn publish_retained(
        &mut self,
        publisher: &mut impl Publisher,
        topic: &str,
        value: impl Into<String>,
    ) -> Result<()> {
        let value = value.into();
        if self.cache.set(topic, value.clone()) {
            publisher.publish(topic, &value, true, self.qos)?;
        }
        Ok(())
    }

    /// Publish a retained, source-arbitrated topic (`nt`/`lac`/`cellid`)
    /// only if the arbitration rules in [`PropertyCache::set_with_priority`]
    /// allow the write.
    pub fn publish_retained_with_priority(
        &mut self,
        publisher: &mut impl Publisher,
        topic: &str,
        value: impl Into<String>,
        source: crate::domain::Source,
    ) -> Result<()> {
        let value = value.into();
        if self.cache.set_with_priority(topic, value.clone(), source) {
            publisher.publish(topic, &value, true, self.qos)?;
        }
        Ok(())
    }

    /// Always publish, non-retained — raw passthroughs, `fail`, `warn`,
    /// scan result rows.
    pub fn publish_transient(
        &mut self,
        publisher: &mut impl Publisher,
        topic: &str,
        payload: &str,
    ) -> Result<()> {
        publisher.publish(topic, payload, false, self.qos)
    }

    /// Clean-shutdown clearing: publish an empty payload to every
    /// currently non-empty retained topic.
    pub fn clear_all_retained(&mut self, publisher: &mut impl Publisher) -> Result<()> {
        for topic in self.cache.non_empty_keys() {
            publisher.publish(&topic, "", true, self.qos)?;
            self.cache.set(&topic, "");
        }
        Ok(())
    }

    pub fn cached(&self, topic: &str) -> Option<&str> {
        self.cache.get(topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingPublisher {
        published: Vec<(String, String, bool, Qos)>,
    }

    impl Publisher for RecordingPublisher {
        fn publish(&mut self, topic: &str, payload: &str, retain: bool, qos: Qos) -> Result<()> {
            self.published
                .push((topic.to_string(), payload.to_string(), retain, qos));
            Ok(())
        }
    }

    #[test]
    fn identical_retained_value_publishes_once() {
        let mut cache = PublishCache::new(Qos::AtMostOnce);
        let mut pub_ = RecordingPublisher::default();
        cache
            .publish_retained(&mut pub_, "rssi", "-79")
            .unwrap();
        cache
            .publish_retained(&mut pub_, "rssi", "-79")
            .unwrap();
        assert_eq!(pub_.published.len(), 1);
    }

    #[test]
    fn transient_topics_always_publish_non_retained() {
        let mut cache = PublishCache::new(Qos::AtLeastOnce);
        let mut pub_ = RecordingPublisher::default();
        cache.publish_transient(&mut pub_, "fail", "LIST_NETWORKS").unwrap();
        cache.publish_transient(&mut pub_, "fail", "LIST_NETWORKS").unwrap();
        assert_eq!(pub_.published.len(), 2);
        assert!(!pub_.published[0].2);
    }

    #[test]
    fn shutdown_clears_every_nonempty_retained_topic() {
        let mut cache = PublishCache::new(Qos::AtMostOnce);
        let mut pub_ = RecordingPublisher::default();
        cache.publish_retained(&mut pub_, "rssi", "-79").unwrap();
        cache.publish_retained(&mut pub_, "op", "T-Mobile").unwrap();
        pub_.published.clear();

        cache.clear_all_retained(&mut pub_).unwrap();
        assert_eq!(pub_.published.len(), 2);
        assert!(pub_.published.iter().all(|(_, payload, retain, _)| payload.is_empty() && *retain));
    }
}

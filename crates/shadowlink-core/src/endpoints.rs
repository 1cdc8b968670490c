//! Registry of discovered device endpoints
//!
//! Devices are keyed by their identifier and recorded the first time they are
//! seen. An entry is never replaced or evicted for the life of the process, so
//! a device's endpoint list is whatever the first discovery reported.

use crate::device::{DiscoveredEndpoint, Endpoint, Udn};
use tracing::debug;

#[derive(Debug, Default)]
pub struct EndpointRegistry {
    entries: Vec<DiscoveredEndpoint>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the endpoints recorded for a device
    pub fn lookup(&self, udn: &Udn) -> Option<&DiscoveredEndpoint> {
        // Udn is always exactly UDN_LEN bytes, so whole-string equality is bounded
        self.entries.iter().find(|e| e.udn == *udn)
    }

    /// Record a device's endpoints unless the device is already known.
    ///
    /// Returns `true` when a new entry was added.
    pub fn record(&mut self, udn: Udn, endpoints: Vec<Endpoint>) -> bool {
        if self.lookup(&udn).is_some() {
            debug!(udn = %udn, "Device already recorded, keeping first-seen endpoints");
            return false;
        }
        debug!(udn = %udn, endpoints = endpoints.len(), "Recording new device");
        self.entries.push(DiscoveredEndpoint::new(udn, endpoints));
        true
    }

    /// Recorded devices, in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &DiscoveredEndpoint> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn udn(s: &str) -> Udn {
        Udn::parse(s).unwrap()
    }

    fn ep(s: &str) -> Endpoint {
        Endpoint::new(s.parse().unwrap())
    }

    #[test]
    fn test_lookup_unknown() {
        let registry = EndpointRegistry::new();
        assert!(registry.lookup(&udn("11111111-1111-1111-1111-111111111111")).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_first_write_wins() {
        let mut registry = EndpointRegistry::new();
        let id = udn("11111111-1111-1111-1111-111111111111");

        assert!(registry.record(id.clone(), vec![ep("[fe80::1]:5683")]));
        assert!(!registry.record(id.clone(), vec![ep("[fe80::2]:5683")]));

        let entry = registry.lookup(&id).unwrap();
        assert_eq!(entry.endpoints, vec![ep("[fe80::1]:5683")]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_distinct_devices() {
        let mut registry = EndpointRegistry::new();
        registry.record(udn("11111111-1111-1111-1111-111111111111"), vec![ep("10.0.0.1:5683")]);
        registry.record(udn("22222222-2222-2222-2222-222222222222"), vec![ep("10.0.0.2:5683")]);

        let found = registry.lookup(&udn("22222222-2222-2222-2222-222222222222")).unwrap();
        assert_eq!(found.primary(), Some(&ep("10.0.0.2:5683")));
        let order: Vec<_> = registry.iter().map(|e| e.udn.as_str().to_string()).collect();
        assert_eq!(order[0], "11111111-1111-1111-1111-111111111111");
        assert_eq!(registry.len(), 2);
    }
}

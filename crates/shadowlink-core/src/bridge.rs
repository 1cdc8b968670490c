//! D2D server list: the bounded set of devices admitted for bridging
//!
//! Entries occupy fixed slots. Adding appends at the high-water mark and
//! removing blanks the slot in place; slots are never compacted, so the
//! number of slots only grows until the capacity is reached.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Default number of slots
pub const DEFAULT_CAPACITY: usize = 10;

/// Maximum length in bytes of the `di` and `href` fields
pub const MAX_FIELD_LEN: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Device {0} is already listed")]
    DuplicateId(String),
    #[error("Server list is full ({0} slots)")]
    RegistryFull(usize),
    #[error("Device {0} is not listed")]
    NotFound(String),
    #[error("Required property 'di' is missing")]
    MissingId,
    #[error("Invalid property '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("Property '{0}' is read-only")]
    ReadOnlyProperty(String),
}

/// One admitted device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeEntry {
    /// Device identifier
    pub di: String,
    /// Endpoints recorded for the device when it was admitted, space separated
    #[serde(default)]
    pub eps: String,
    /// Target path on the device
    pub href: String,
}

impl BridgeEntry {
    pub fn is_cleared(&self) -> bool {
        self.di.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct BridgeRegistry {
    slots: Vec<BridgeEntry>,
    capacity: usize,
}

impl Default for BridgeRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BridgeRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// High-water mark: slots ever used, including cleared ones
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    /// Whether a non-cleared slot holds `di`
    pub fn contains(&self, di: &str) -> bool {
        !di.is_empty() && self.slots.iter().any(|s| s.di == di)
    }

    /// Admitted devices, in slot order
    pub fn list(&self) -> Vec<&BridgeEntry> {
        self.slots.iter().filter(|s| !s.is_cleared()).collect()
    }

    /// Every slot up to the high-water mark; cleared slots have a blank `di`
    pub fn slots(&self) -> &[BridgeEntry] {
        &self.slots
    }

    /// Check that an entry could be added, without adding it
    pub fn validate(&self, di: &str, href: &str) -> Result<(), BridgeError> {
        if di.is_empty() {
            return Err(BridgeError::MissingId);
        }
        check_len("di", di)?;
        check_len("href", href)?;
        if self.contains(di) {
            return Err(BridgeError::DuplicateId(di.to_string()));
        }
        if self.is_full() {
            return Err(BridgeError::RegistryFull(self.capacity));
        }
        Ok(())
    }

    /// Admit a device at the next free slot
    pub fn add(&mut self, di: &str, eps: &str, href: &str) -> Result<(), BridgeError> {
        self.validate(di, href)?;
        self.slots.push(BridgeEntry {
            di: di.to_string(),
            eps: eps.to_string(),
            href: href.to_string(),
        });
        info!(di = %di, slot = self.slots.len() - 1, "Added device to server list");
        Ok(())
    }

    /// Blank the slot holding `di`
    pub fn remove(&mut self, di: &str) -> Result<(), BridgeError> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| !s.is_cleared() && s.di == di)
            .ok_or_else(|| BridgeError::NotFound(di.to_string()))?;
        slot.di.clear();
        debug!(di = %di, "Cleared server list slot");
        Ok(())
    }
}

fn check_len(field: &'static str, value: &str) -> Result<(), BridgeError> {
    if value.len() > MAX_FIELD_LEN {
        return Err(BridgeError::InvalidField {
            field,
            reason: format!("{} bytes exceeds {MAX_FIELD_LEN}", value.len()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_list() {
        let mut registry = BridgeRegistry::default();
        registry.add("abc", "coap://10.0.0.7:5683", "").unwrap();
        let listed = registry.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].di, "abc");
        assert_eq!(listed[0].eps, "coap://10.0.0.7:5683");
        assert_eq!(listed[0].href, "");
    }

    #[test]
    fn test_capacity() {
        let mut registry = BridgeRegistry::new(DEFAULT_CAPACITY);
        for i in 0..DEFAULT_CAPACITY {
            registry.add(&format!("device-{i}"), "", "").unwrap();
        }
        assert_eq!(
            registry.add("one-too-many", "", ""),
            Err(BridgeError::RegistryFull(DEFAULT_CAPACITY))
        );
        assert_eq!(registry.len(), DEFAULT_CAPACITY);
    }

    #[test]
    fn test_duplicate() {
        let mut registry = BridgeRegistry::default();
        registry.add("X", "", "").unwrap();
        assert_eq!(registry.add("X", "", "/other"), Err(BridgeError::DuplicateId("X".into())));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_then_readd() {
        let mut registry = BridgeRegistry::default();
        registry.add("X", "", "").unwrap();
        registry.remove("X").unwrap();
        assert!(!registry.contains("X"));
        registry.add("X", "", "").unwrap();
        assert_eq!(registry.list().len(), 1);
        // the cleared slot is kept
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove_keeps_blank_slot() {
        let mut registry = BridgeRegistry::default();
        registry.add("abc", "", "").unwrap();
        registry.remove("abc").unwrap();
        assert!(registry.list().is_empty());
        assert_eq!(registry.slots().len(), 1);
        assert_eq!(registry.slots()[0].di, "");
    }

    #[test]
    fn test_remove_unknown() {
        let mut registry = BridgeRegistry::default();
        assert_eq!(registry.remove("nope"), Err(BridgeError::NotFound("nope".into())));
        // an empty id never matches a cleared slot
        registry.add("abc", "", "").unwrap();
        registry.remove("abc").unwrap();
        assert_eq!(registry.remove(""), Err(BridgeError::NotFound(String::new())));
    }

    #[test]
    fn test_field_limits() {
        let mut registry = BridgeRegistry::default();
        let long = "x".repeat(MAX_FIELD_LEN + 1);
        assert!(matches!(
            registry.add(&long, "", ""),
            Err(BridgeError::InvalidField { field: "di", .. })
        ));
        assert!(matches!(
            registry.add("ok", "", &long),
            Err(BridgeError::InvalidField { field: "href", .. })
        ));
        assert_eq!(registry.add("", "", ""), Err(BridgeError::MissingId));
        registry.add(&"y".repeat(MAX_FIELD_LEN), "", "").unwrap();
        assert!(!registry.is_empty());
    }
}

//! Resource interfaces and interface masks

use serde::{Deserialize, Serialize};

/// A single resource interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interface {
    Baseline,
    LinkList,
    Batch,
    ReadOnly,
    ReadWrite,
    Actuator,
    Sensor,
    Create,
}

impl Interface {
    pub const ALL: [Interface; 8] = [
        Interface::Baseline,
        Interface::LinkList,
        Interface::Batch,
        Interface::ReadOnly,
        Interface::ReadWrite,
        Interface::Actuator,
        Interface::Sensor,
        Interface::Create,
    ];

    /// Bit of this interface in an [`InterfaceMask`]
    pub fn bit(self) -> u16 {
        match self {
            Interface::Baseline => 1 << 1,
            Interface::LinkList => 1 << 2,
            Interface::Batch => 1 << 3,
            Interface::ReadOnly => 1 << 4,
            Interface::ReadWrite => 1 << 5,
            Interface::Actuator => 1 << 6,
            Interface::Sensor => 1 << 7,
            Interface::Create => 1 << 8,
        }
    }

    /// Wire name, e.g. `oic.if.rw`
    pub fn name(self) -> &'static str {
        match self {
            Interface::Baseline => "oic.if.baseline",
            Interface::LinkList => "oic.if.ll",
            Interface::Batch => "oic.if.b",
            Interface::ReadOnly => "oic.if.r",
            Interface::ReadWrite => "oic.if.rw",
            Interface::Actuator => "oic.if.a",
            Interface::Sensor => "oic.if.s",
            Interface::Create => "oic.if.create",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.name() == name)
    }
}

impl std::fmt::Display for Interface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of interfaces, as carried by a discovery response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceMask(pub u16);

impl InterfaceMask {
    pub const EMPTY: InterfaceMask = InterfaceMask(0);

    pub fn contains(self, iface: Interface) -> bool {
        self.0 & iface.bit() != 0
    }

    pub fn with(self, iface: Interface) -> Self {
        Self(self.0 | iface.bit())
    }

    /// Build a mask from wire names, ignoring names that are not interfaces
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        names
            .into_iter()
            .filter_map(Interface::from_name)
            .fold(Self::EMPTY, Self::with)
    }

    /// Interfaces in the mask, in bit order
    pub fn iter(self) -> impl Iterator<Item = Interface> {
        Interface::ALL.into_iter().filter(move |i| self.contains(*i))
    }
}

impl FromIterator<Interface> for InterfaceMask {
    fn from_iter<T: IntoIterator<Item = Interface>>(iter: T) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_from_names() {
        let mask = InterfaceMask::from_names(["oic.if.baseline", "oic.if.a", "bogus"]);
        assert!(mask.contains(Interface::Baseline));
        assert!(mask.contains(Interface::Actuator));
        assert!(!mask.contains(Interface::ReadWrite));
        assert_eq!(mask.0, 0x42);
    }

    #[test]
    fn test_mask_iter_is_bit_ordered() {
        let mask: InterfaceMask = [Interface::Sensor, Interface::ReadOnly].into_iter().collect();
        let ifaces: Vec<_> = mask.iter().collect();
        assert_eq!(ifaces, vec![Interface::ReadOnly, Interface::Sensor]);
    }

    #[test]
    fn test_name_round_trip() {
        for iface in Interface::ALL {
            assert_eq!(Interface::from_name(iface.name()), Some(iface));
        }
    }
}

//! Classification of discovered resource types
//!
//! Only "vertical" (application) resource types are shadowed. Device
//! metadata types and the infrastructure/security types a device exposes for
//! discovery, onboarding, and access control are never bridged.

/// Prefix shared by all device-type identifiers
pub const DEVICE_TYPE_PREFIX: &str = "oic.d.";

/// Resource types that are never bridged
pub const DENIED_TYPES: &[&str] = &[
    // discovery and platform/device metadata
    "oic.wk.res",
    "oic.wk.p",
    "oic.wk.d",
    "oic.wk.introspection",
    // security
    "oic.r.roles",
    "oic.r.cred",
    "oic.r.pstat",
    "oic.r.doxm",
    "oic.r.sdi",
    "oic.r.ael",
    "oic.r.csr",
    "oic.r.acl2",
    "oic.r.sp",
    // the proxy's own configuration
    "oic.r.d2dserverlist",
    "oic.r.coapcloudconf",
];

/// Whether a resource of this type may be shadowed
pub fn is_bridgeable(resource_type: &str) -> bool {
    if resource_type.starts_with(DEVICE_TYPE_PREFIX) {
        return false;
    }
    !DENIED_TYPES.contains(&resource_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denied_types() {
        for rt in DENIED_TYPES {
            assert!(!is_bridgeable(rt), "{rt} should not be bridgeable");
        }
    }

    #[test]
    fn test_device_types() {
        assert!(!is_bridgeable("oic.d.light"));
        assert!(!is_bridgeable("oic.d.cloudproxy"));
    }

    #[test]
    fn test_vertical_types() {
        assert!(is_bridgeable("oic.r.switch.binary"));
        assert!(is_bridgeable("oic.r.temperature"));
        assert!(is_bridgeable("x.com.example.widget"));
    }

    #[test]
    fn test_exact_match_only() {
        // a longer type that merely starts with a denied one is still vertical
        assert!(is_bridgeable("oic.r.credential.store"));
        assert!(is_bridgeable("oic.wk.resx"));
        assert!(is_bridgeable("oic.d"));
    }
}

//! Mapping between remote resources and local shadow paths
//!
//! A shadow resource lives at `"/" + udn + remote_path`. Since the device
//! identifier has a fixed width, both halves can be recovered from the local
//! path without a separator.

use thiserror::Error;

use crate::device::{Udn, UDN_LEN};

/// Scheme prefix of a discovery anchor (`ocf://<udn>`)
pub const ANCHOR_SCHEME: &str = "ocf://";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    #[error("Not a shadow resource path: {0}")]
    MalformedShadowPath(String),
    #[error("Malformed discovery anchor: {0}")]
    MalformedAnchor(String),
}

/// Local path of the shadow for `remote_path` on device `udn`
pub fn encode(udn: &Udn, remote_path: &str) -> String {
    let mut path = String::with_capacity(1 + UDN_LEN + remote_path.len());
    path.push('/');
    path.push_str(udn.as_str());
    path.push_str(remote_path);
    path
}

fn split(local_path: &str) -> Result<(&str, &str), NamingError> {
    let malformed = || NamingError::MalformedShadowPath(local_path.to_string());
    let rest = local_path.strip_prefix('/').ok_or_else(malformed)?;
    if rest.len() < UDN_LEN || !rest.is_char_boundary(UDN_LEN) {
        return Err(malformed());
    }
    Ok(rest.split_at(UDN_LEN))
}

/// Device identifier of a shadow path
pub fn decode_udn(local_path: &str) -> Result<Udn, NamingError> {
    let (udn, _) = split(local_path)?;
    Udn::parse(udn).map_err(|_| NamingError::MalformedShadowPath(local_path.to_string()))
}

/// Remote path of a shadow path
pub fn decode_remote_path(local_path: &str) -> Result<&str, NamingError> {
    // validate the identifier segment too, so both decoders agree on shape
    decode_udn(local_path)?;
    let (_, remote) = split(local_path)?;
    Ok(remote)
}

/// Both halves of a shadow path
pub fn decode(local_path: &str) -> Result<(Udn, &str), NamingError> {
    let udn = decode_udn(local_path)?;
    let (_, remote) = split(local_path)?;
    Ok((udn, remote))
}

/// Device identifier carried by a discovery anchor
pub fn udn_from_anchor(anchor: &str) -> Result<Udn, NamingError> {
    let malformed = || NamingError::MalformedAnchor(anchor.to_string());
    if anchor.len() < ANCHOR_SCHEME.len() || !anchor.is_char_boundary(ANCHOR_SCHEME.len()) {
        return Err(malformed());
    }
    // the scheme has a fixed width; only the identifier after it matters
    Udn::parse(&anchor[ANCHOR_SCHEME.len()..]).map_err(|_| malformed())
}

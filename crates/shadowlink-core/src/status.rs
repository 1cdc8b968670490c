//! Response status codes
//!
//! Codes use the CoAP layout: the top three bits are the class and the low
//! five bits the detail, so `2.05` is `0x45`. Codes received from a remote
//! device are carried verbatim, including ones not named here.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(pub u8);

impl Status {
    pub const CREATED: Status = Status::new(2, 1);
    pub const DELETED: Status = Status::new(2, 2);
    pub const CHANGED: Status = Status::new(2, 4);
    pub const CONTENT: Status = Status::new(2, 5);
    pub const BAD_REQUEST: Status = Status::new(4, 0);
    pub const BAD_OPTION: Status = Status::new(4, 2);
    pub const NOT_FOUND: Status = Status::new(4, 4);
    pub const METHOD_NOT_ALLOWED: Status = Status::new(4, 5);
    pub const REQUEST_ENTITY_TOO_LARGE: Status = Status::new(4, 13);
    pub const INTERNAL_SERVER_ERROR: Status = Status::new(5, 0);
    pub const SERVICE_UNAVAILABLE: Status = Status::new(5, 3);
    pub const GATEWAY_TIMEOUT: Status = Status::new(5, 4);

    pub const fn new(class: u8, detail: u8) -> Self {
        Self((class << 5) | (detail & 0x1f))
    }

    pub fn class(self) -> u8 {
        self.0 >> 5
    }

    pub fn detail(self) -> u8 {
        self.0 & 0x1f
    }

    /// Closest HTTP status for the front-end
    pub fn to_http(self) -> u16 {
        match (self.class(), self.detail()) {
            (2, 1) => 201,
            (2, _) => 200,
            (4, d) => 400 + d as u16,
            (5, d) => 500 + d as u16,
            _ => 502,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.class(), self.detail())
    }
}

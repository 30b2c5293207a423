//! Error types for profile validation, inventory access and connection attempts.
//!
//! Two layers are kept apart here. [`ConnectError`] is a hard failure that
//! terminates a `connect` call before any network activity (bad protocol
//! list, unknown device, broken inventory). [`ConnectionFailure`] is the
//! classified outcome of a single protocol attempt; the orchestrator records
//! it and moves on to the next protocol instead of propagating it.

use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use thiserror::Error;

/// Errors that abort a connection request or an inventory operation.
#[derive(Error, Debug)]
pub enum ConnectError {
    /// The profile did not declare any protocol to try.
    #[error("protocol list is empty")]
    EmptyProtocolList,

    /// A protocol token is not one of `ssh`, `ssh-modern`, `ssh-legacy`, `telnet`.
    #[error("unknown protocol '{0}', valid options are: ssh, ssh-modern, ssh-legacy, telnet")]
    UnknownProtocol(String),

    /// The hostname has no entry in the inventory.
    #[error("device '{0}' not found in inventory")]
    DeviceNotFound(String),

    /// The caller passed a profile or options that violate the connect contract.
    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    /// The inventory document parsed but failed validation.
    #[error("invalid inventory: {0}")]
    InvalidInventory(String),

    /// The inventory file could not be read or written.
    #[error("inventory io error on {path}: {source}")]
    InventoryIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The inventory file is not valid JSON for the expected layout.
    #[error("inventory parse error: {0}")]
    InventoryParse(#[from] serde_json::Error),

    /// Byte pumping between a session and its consumer failed.
    #[error("session io error: {0}")]
    SessionIo(#[from] std::io::Error),

    /// An error occurred in the russh library after the session was handed off.
    #[error("russh error: {0}")]
    RusshError(#[from] russh::Error),
}

/// Classification of a failed protocol attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection refused, no route to host, or name resolution failed.
    Unreachable,
    /// Nothing useful arrived before the per-attempt deadline.
    Timeout,
    /// The handshake completed but the credentials were rejected.
    AuthenticationFailed,
    /// Negotiation failed: no common algorithm, host key mismatch, broken stream.
    ProtocolError,
    /// The endpoint does not speak the attempted protocol at all.
    Unsupported,
}

impl FailureKind {
    /// Rank used to pick the headline failure of an exhausted run.
    ///
    /// `ProtocolError > AuthenticationFailed > Unreachable = Timeout > Unsupported`.
    pub fn severity(self) -> u8 {
        match self {
            FailureKind::ProtocolError => 3,
            FailureKind::AuthenticationFailed => 2,
            FailureKind::Unreachable | FailureKind::Timeout => 1,
            FailureKind::Unsupported => 0,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::Unreachable => "unreachable",
            FailureKind::Timeout => "timeout",
            FailureKind::AuthenticationFailed => "authentication failed",
            FailureKind::ProtocolError => "protocol error",
            FailureKind::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// A classified, non-fatal failure of one protocol attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {detail}")]
pub struct ConnectionFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl ConnectionFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn unreachable(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Unreachable, detail)
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, detail)
    }

    pub fn auth_failed(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::AuthenticationFailed, detail)
    }

    pub fn protocol(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::ProtocolError, detail)
    }

    pub fn unsupported(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Unsupported, detail)
    }
}

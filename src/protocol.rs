//! Protocol tokens and the fallback policy that turns them into attempts.
//!
//! A device declares its protocols as tokens. `ssh` is an alias and never
//! reaches a handler: [`expand`] rewrites it in place to `ssh-modern`
//! followed by `ssh-legacy`. Redundant entries are kept as configured, so
//! `["ssh-modern", "ssh"]` really does try `ssh-modern` twice.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::error::ConnectError;

/// A protocol token as written in the inventory or passed as an override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ProtocolToken {
    /// Alias for `ssh-modern` then `ssh-legacy`.
    Ssh,
    SshModern,
    SshLegacy,
    Telnet,
}

/// A concrete protocol, one per handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    /// SSH with host key verification and current algorithms only.
    SshModern,
    /// SSH without host key verification and with deprecated algorithms enabled.
    SshLegacy,
    /// Plain Telnet with a prompt-driven login.
    Telnet,
}

impl ProtocolToken {
    pub const VALID: [&'static str; 4] = ["ssh", "ssh-modern", "ssh-legacy", "telnet"];

    /// Concrete protocols this token stands for, in attempt order.
    pub fn expansion(self) -> &'static [Protocol] {
        match self {
            ProtocolToken::Ssh => &[Protocol::SshModern, Protocol::SshLegacy],
            ProtocolToken::SshModern => &[Protocol::SshModern],
            ProtocolToken::SshLegacy => &[Protocol::SshLegacy],
            ProtocolToken::Telnet => &[Protocol::Telnet],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProtocolToken::Ssh => "ssh",
            ProtocolToken::SshModern => "ssh-modern",
            ProtocolToken::SshLegacy => "ssh-legacy",
            ProtocolToken::Telnet => "telnet",
        }
    }
}

impl FromStr for ProtocolToken {
    type Err = ConnectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ssh" => Ok(ProtocolToken::Ssh),
            "ssh-modern" => Ok(ProtocolToken::SshModern),
            "ssh-legacy" => Ok(ProtocolToken::SshLegacy),
            "telnet" => Ok(ProtocolToken::Telnet),
            other => Err(ConnectError::UnknownProtocol(other.to_string())),
        }
    }
}

impl fmt::Display for ProtocolToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Protocol> for ProtocolToken {
    fn from(protocol: Protocol) -> Self {
        match protocol {
            Protocol::SshModern => ProtocolToken::SshModern,
            Protocol::SshLegacy => ProtocolToken::SshLegacy,
            Protocol::Telnet => ProtocolToken::Telnet,
        }
    }
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        ProtocolToken::from(self).as_str()
    }

    pub fn is_ssh(self) -> bool {
        matches!(self, Protocol::SshModern | Protocol::SshLegacy)
    }

    /// Port used when neither the options nor the profile name one.
    pub fn default_port(self) -> u16 {
        if self.is_ssh() {
            config::DEFAULT_SSH_PORT
        } else {
            config::DEFAULT_TELNET_PORT
        }
    }

    /// Per-attempt timeout used when the caller does not set one.
    pub fn default_timeout(self) -> Duration {
        if self.is_ssh() {
            config::DEFAULT_SSH_TIMEOUT
        } else {
            config::DEFAULT_TELNET_TIMEOUT
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses and expands a declared protocol list into concrete attempts.
///
/// Fails on an empty list or on the first unrecognized token, before
/// anything touches the network.
pub fn expand<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<Protocol>, ConnectError> {
    let parsed = tokens
        .iter()
        .map(|token| token.as_ref().parse::<ProtocolToken>())
        .collect::<Result<Vec<_>, _>>()?;
    expand_tokens(&parsed)
}

/// Expands already-parsed tokens, keeping duplicates.
pub fn expand_tokens(tokens: &[ProtocolToken]) -> Result<Vec<Protocol>, ConnectError> {
    if tokens.is_empty() {
        return Err(ConnectError::EmptyProtocolList);
    }
    Ok(tokens
        .iter()
        .flat_map(|token| token.expansion().iter().copied())
        .collect())
}

/// Moves the preferred protocol(s) to the front of an expanded sequence.
///
/// Each protocol the preferred token stands for takes the place of its
/// first occurrence in `sequence`; if it is not configured at all it is
/// prepended as an extra attempt. Everything else keeps its relative order.
pub fn prioritize(sequence: Vec<Protocol>, preferred: Option<ProtocolToken>) -> Vec<Protocol> {
    let Some(preferred) = preferred else {
        return sequence;
    };

    let mut rest = sequence;
    let mut front = Vec::with_capacity(rest.len() + 2);
    for protocol in preferred.expansion() {
        match rest.iter().position(|p| p == protocol) {
            Some(idx) => {
                rest.remove(idx);
            }
            None => debug!("preferred protocol {protocol} not configured, adding extra attempt"),
        }
        front.push(*protocol);
    }
    front.extend(rest);
    front
}

#[cfg(test)]
mod tests {
    use super::{Protocol, ProtocolToken, expand, prioritize};
    use crate::error::ConnectError;

    use Protocol::{SshLegacy, SshModern, Telnet};

    #[test]
    fn ssh_alias_expands_modern_then_legacy() {
        assert_eq!(expand(&["ssh"]).unwrap(), vec![SshModern, SshLegacy]);
    }

    #[test]
    fn redundant_entries_are_not_collapsed() {
        assert_eq!(
            expand(&["ssh-modern", "ssh"]).unwrap(),
            vec![SshModern, SshModern, SshLegacy]
        );
    }

    #[test]
    fn alias_expands_in_place() {
        assert_eq!(
            expand(&["telnet", "ssh", "telnet"]).unwrap(),
            vec![Telnet, SshModern, SshLegacy, Telnet]
        );
    }

    #[test]
    fn empty_list_is_rejected() {
        let empty: [&str; 0] = [];
        assert!(matches!(expand(&empty), Err(ConnectError::EmptyProtocolList)));
    }

    #[test]
    fn unknown_token_is_reported_by_name() {
        match expand(&["ssh", "rlogin"]) {
            Err(ConnectError::UnknownProtocol(token)) => assert_eq!(token, "rlogin"),
            other => panic!("expected unknown protocol error, got {other:?}"),
        }
    }

    #[test]
    fn token_parsing_is_exact() {
        assert!("SSH".parse::<ProtocolToken>().is_err());
        assert_eq!("telnet".parse::<ProtocolToken>().unwrap(), ProtocolToken::Telnet);
    }

    #[test]
    fn preferred_configured_protocol_moves_to_front() {
        let seq = vec![SshModern, SshLegacy, Telnet];
        assert_eq!(
            prioritize(seq, Some(ProtocolToken::Telnet)),
            vec![Telnet, SshModern, SshLegacy]
        );
    }

    #[test]
    fn preferred_missing_protocol_is_prepended() {
        let seq = vec![SshModern, Telnet];
        assert_eq!(
            prioritize(seq, Some(ProtocolToken::SshLegacy)),
            vec![SshLegacy, SshModern, Telnet]
        );
    }

    #[test]
    fn preferred_alias_moves_both_postures() {
        let seq = vec![Telnet, SshLegacy];
        assert_eq!(
            prioritize(seq, Some(ProtocolToken::Ssh)),
            vec![SshModern, SshLegacy, Telnet]
        );
    }

    #[test]
    fn preferred_only_moves_first_duplicate() {
        let seq = vec![SshModern, SshLegacy, SshModern];
        assert_eq!(
            prioritize(seq, Some(ProtocolToken::SshLegacy)),
            vec![SshLegacy, SshModern, SshModern]
        );
    }

    #[test]
    fn token_serde_uses_kebab_case() {
        let json = serde_json::to_string(&ProtocolToken::SshLegacy).unwrap();
        assert_eq!(json, "\"ssh-legacy\"");
        let parsed: Protocol = serde_json::from_str("\"ssh-modern\"").unwrap();
        assert_eq!(parsed, SshModern);
    }
}

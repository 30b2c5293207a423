//! Connection profiles and per-call options.

use std::fmt;
use std::time::Duration;

use crate::error::ConnectError;
use crate::protocol::{Protocol, ProtocolToken};

/// Everything needed to reach one device. Immutable once loaded.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    /// Inventory name of the device, used in logs only.
    pub hostname: String,
    /// IP address or DNS name to connect to.
    pub address: String,
    /// Port for every protocol, unless a protocol specific port is set.
    pub port: Option<u16>,
    pub ssh_port: Option<u16>,
    pub telnet_port: Option<u16>,
    pub username: String,
    pub password: String,
    /// Declared protocol tokens in priority order, validated at connect time.
    pub protocols: Vec<String>,
}

impl ConnectionProfile {
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        protocols: Vec<String>,
    ) -> Self {
        let address = address.into();
        Self {
            hostname: address.clone(),
            address,
            port: None,
            ssh_port: None,
            telnet_port: None,
            username: username.into(),
            password: password.into(),
            protocols,
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Port for `protocol`: override, then protocol specific, then generic, then default.
    pub fn resolve_port(&self, protocol: Protocol, port_override: Option<u16>) -> u16 {
        let specific = if protocol.is_ssh() {
            self.ssh_port
        } else {
            self.telnet_port
        };
        port_override
            .or(specific)
            .or(self.port)
            .unwrap_or_else(|| protocol.default_port())
    }

    pub(crate) fn validate(&self) -> Result<(), ConnectError> {
        if self.address.trim().is_empty() {
            return Err(ConnectError::InvalidProfile(format!(
                "missing address for device '{}'",
                self.hostname
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("hostname", &self.hostname)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("ssh_port", &self.ssh_port)
            .field("telnet_port", &self.telnet_port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("protocols", &self.protocols)
            .finish()
    }
}

/// Caller-supplied knobs for one `connect` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Protocol to try first; not a filter, the rest stay as fallbacks.
    pub preferred_protocol: Option<ProtocolToken>,
    /// Deadline for each attempt. `None` uses the protocol default.
    pub per_attempt_timeout: Option<Duration>,
    /// Port that beats both the profile and the protocol default.
    pub port_override: Option<u16>,
}

impl ConnectOptions {
    pub fn prefer(mut self, token: ProtocolToken) -> Self {
        self.preferred_protocol = Some(token);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.per_attempt_timeout = Some(timeout);
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port_override = Some(port);
        self
    }

    pub fn resolve_timeout(&self, protocol: Protocol) -> Duration {
        self.per_attempt_timeout
            .unwrap_or_else(|| protocol.default_timeout())
    }

    pub(crate) fn validate(&self) -> Result<(), ConnectError> {
        if self.per_attempt_timeout == Some(Duration::ZERO) {
            return Err(ConnectError::InvalidProfile(
                "per-attempt timeout must be positive".to_string(),
            ));
        }
        if self.port_override == Some(0) {
            return Err(ConnectError::InvalidProfile(
                "port override must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolved input for exactly one handler invocation.
#[derive(Clone)]
pub struct ConnectTarget {
    pub protocol: Protocol,
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl ConnectTarget {
    pub fn resolve(profile: &ConnectionProfile, protocol: Protocol, options: &ConnectOptions) -> Self {
        Self {
            protocol,
            address: profile.address.clone(),
            port: profile.resolve_port(protocol, options.port_override),
            username: profile.username.clone(),
            password: profile.password.clone(),
            timeout: options.resolve_timeout(protocol),
        }
    }

    /// `user@addr:port`, the key used in log lines.
    pub fn device_addr(&self) -> String {
        format!("{}@{}:{}", self.username, self.address, self.port)
    }
}

impl fmt::Debug for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectTarget")
            .field("protocol", &self.protocol)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{ConnectOptions, ConnectTarget, ConnectionProfile};
    use crate::protocol::Protocol;
    use std::time::Duration;

    fn profile() -> ConnectionProfile {
        ConnectionProfile::new("10.0.0.1", "admin", "s3cret", vec!["ssh".to_string()])
    }

    #[test]
    fn defaults_follow_protocol() {
        let p = profile();
        assert_eq!(p.resolve_port(Protocol::SshModern, None), 22);
        assert_eq!(p.resolve_port(Protocol::Telnet, None), 23);
    }

    #[test]
    fn specific_port_beats_generic_port() {
        let mut p = profile().with_port(2000);
        p.telnet_port = Some(8023);
        assert_eq!(p.resolve_port(Protocol::Telnet, None), 8023);
        assert_eq!(p.resolve_port(Protocol::SshLegacy, None), 2000);
    }

    #[test]
    fn override_beats_everything() {
        let mut p = profile().with_port(2000);
        p.ssh_port = Some(2222);
        assert_eq!(p.resolve_port(Protocol::SshModern, Some(22022)), 22022);
    }

    #[test]
    fn timeout_defaults_per_protocol() {
        let options = ConnectOptions::default();
        assert_eq!(options.resolve_timeout(Protocol::SshModern), Duration::from_secs(10));
        assert_eq!(options.resolve_timeout(Protocol::Telnet), Duration::from_secs(5));
        let options = options.timeout(Duration::from_secs(3));
        assert_eq!(options.resolve_timeout(Protocol::SshLegacy), Duration::from_secs(3));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(ConnectOptions::default().timeout(Duration::ZERO).validate().is_err());
    }

    #[test]
    fn debug_output_masks_password() {
        let p = profile();
        let target = ConnectTarget::resolve(&p, Protocol::Telnet, &ConnectOptions::default());
        assert!(!format!("{p:?}").contains("s3cret"));
        assert!(!format!("{target:?}").contains("s3cret"));
        assert_eq!(target.device_addr(), "admin@10.0.0.1:23");
    }

    #[test]
    fn blank_address_fails_validation() {
        let p = ConnectionProfile::new("  ", "admin", "pw", vec!["telnet".to_string()]);
        assert!(p.validate().is_err());
    }
}

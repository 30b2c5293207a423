use super::*;

use russh::keys::PublicKey;
use russh::keys::known_hosts::{check_known_hosts_path, learn_known_hosts_path};
use russh::{ChannelMsg, Disconnect};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors raised by the host key check during the handshake.
#[derive(Error, Debug)]
pub(crate) enum HandshakeError {
    #[error(transparent)]
    Russh(#[from] russh::Error),

    #[error("host key {fingerprint} does not match known_hosts line {line}")]
    HostKeyChanged { line: usize, fingerprint: String },

    #[error("known_hosts error: {0}")]
    KnownHosts(russh::keys::Error),

    #[error("no known_hosts file location: home directory unknown")]
    NoKnownHostsPath,

    #[error("cannot create known_hosts directory: {0}")]
    KnownHostsDir(std::io::Error),
}

impl HandshakeError {
    fn classify(&self, target: &ConnectTarget) -> ConnectionFailure {
        match self {
            HandshakeError::Russh(err) => classify::russh_failure(err, target),
            _ => {
                ConnectionFailure::protocol(format!(
                    "host key verification failed for {}:{}: {self}",
                    target.address, target.port
                ))
            }
        }
    }
}

/// russh client callbacks: host key verification per [`HostKeyPolicy`].
pub(crate) struct HostKeyCheck {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl client::Handler for HostKeyCheck {
    type Error = HandshakeError;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        let Some(path) = self.policy.known_hosts_path() else {
            if matches!(self.policy, HostKeyPolicy::NoCheck) {
                warn!(
                    "{}:{} host key accepted without verification ({})",
                    self.host,
                    self.port,
                    fingerprint(server_public_key)
                );
                return Ok(true);
            }
            return Err(HandshakeError::NoKnownHostsPath);
        };

        match check_known_hosts_path(&self.host, self.port, server_public_key, &path) {
            Ok(true) => {
                debug!("{}:{} host key verified", self.host, self.port);
                Ok(true)
            }
            Ok(false) => {
                info!(
                    "{}:{} unknown host, recording {} in {}",
                    self.host,
                    self.port,
                    fingerprint(server_public_key),
                    path.display()
                );
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(HandshakeError::KnownHostsDir)?;
                }
                learn_known_hosts_path(&self.host, self.port, server_public_key, &path)
                    .map_err(HandshakeError::KnownHosts)?;
                Ok(true)
            }
            Err(russh::keys::Error::KeyChanged { line }) => Err(HandshakeError::HostKeyChanged {
                line,
                fingerprint: fingerprint(server_public_key),
            }),
            Err(err) => Err(HandshakeError::KnownHosts(err)),
        }
    }
}

/// SHA-256 over the wire encoding of `key`, hex encoded.
pub(crate) fn fingerprint(key: &PublicKey) -> String {
    match key.to_bytes() {
        Ok(bytes) => {
            let digest = Sha256::digest(&bytes);
            let hex = digest.iter().map(|b| format!("{b:02x}")).collect::<String>();
            format!("SHA256:{hex}")
        }
        Err(_) => "SHA256:unavailable".to_string(),
    }
}

/// SSH handler bound to one security posture.
#[derive(Debug, Clone)]
pub struct SshHandler {
    protocol: Protocol,
    security: ConnectionSecurityOptions,
}

impl SshHandler {
    /// Strict host key checking and current algorithms.
    pub fn modern() -> Self {
        Self {
            protocol: Protocol::SshModern,
            security: ConnectionSecurityOptions::modern(),
        }
    }

    /// No host key checking and the widened legacy algorithm set.
    pub fn legacy() -> Self {
        Self {
            protocol: Protocol::SshLegacy,
            security: ConnectionSecurityOptions::legacy(),
        }
    }

    pub fn with_security(mut self, security: ConnectionSecurityOptions) -> Self {
        self.security = security;
        self
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn security(&self) -> &ConnectionSecurityOptions {
        &self.security
    }

    /// Client configuration shared by the handshake and the handed-off session.
    ///
    /// No inactivity timeout: an operator may sit idle at the shell. Keepalives
    /// detect a dead peer instead.
    pub(crate) fn client_config(&self) -> client::Config {
        client::Config {
            preferred: self.security.preferred(),
            inactivity_timeout: None,
            keepalive_interval: Some(config::SSH_KEEPALIVE_INTERVAL),
            keepalive_max: config::SSH_KEEPALIVE_MAX,
            ..Default::default()
        }
    }

    /// Performs the handshake and password authentication.
    ///
    /// The returned session is authenticated but has no channel open yet;
    /// the interactive consumer opens the shell.
    pub async fn establish(&self, target: &ConnectTarget) -> Result<SshSession, ConnectionFailure> {
        let device_addr = target.device_addr();
        if self.security.host_key_policy == HostKeyPolicy::NoCheck {
            warn!("{device_addr} {} skips host key verification", self.protocol);
        }

        let config = self.client_config();
        let check = HostKeyCheck {
            host: target.address.clone(),
            port: target.port,
            policy: self.security.host_key_policy.clone(),
        };

        let mut handle = client::connect(
            Arc::new(config),
            (target.address.as_str(), target.port),
            check,
        )
        .await
        .map_err(|e| e.classify(target))?;
        debug!("{device_addr} {} handshake successful", self.protocol);

        let auth = handle
            .authenticate_password(target.username.as_str(), target.password.as_str())
            .await
            .map_err(|e| HandshakeError::from(e).classify(target))?;

        if !auth.success() {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "authentication failed", "en")
                .await;
            return Err(ConnectionFailure::auth_failed(format!(
                "authentication failed for {device_addr}"
            )));
        }
        debug!("{device_addr} {} authentication successful", self.protocol);

        Ok(SshSession {
            handle,
            protocol: self.protocol,
            device_addr,
        })
    }
}

/// An authenticated SSH connection.
pub struct SshSession {
    handle: client::Handle<HostKeyCheck>,
    protocol: Protocol,
    device_addr: String,
}

impl SshSession {
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn device_addr(&self) -> &str {
        &self.device_addr
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    /// Opens a session channel with a PTY and an interactive shell.
    pub async fn open_shell(
        &self,
        pty: &PtyOptions,
    ) -> Result<russh::Channel<client::Msg>, ConnectError> {
        let channel = self.handle.channel_open_session().await?;
        channel
            .request_pty(false, &pty.term, pty.cols, pty.rows, 0, 0, &[])
            .await?;
        channel.request_shell(false).await?;
        debug!("{} Shell request successful", self.device_addr);
        Ok(channel)
    }

    /// Runs a single command on a fresh channel and returns its stdout.
    ///
    /// Useful for a quick liveness probe before handing the session off.
    pub async fn exec(&self, command: &str) -> Result<(String, Option<u32>), ConnectError> {
        let mut channel = self.handle.channel_open_session().await?;
        channel.exec(true, command).await?;

        let mut output = Vec::new();
        let mut exit_status = None;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => output.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
                ChannelMsg::Eof | ChannelMsg::Close => break,
                _ => {}
            }
        }
        trace!("{} exec {:?} -> {:?}", self.device_addr, command, exit_status);
        Ok((String::from_utf8_lossy(&output).into_owned(), exit_status))
    }

    /// Disconnects the SSH connection.
    pub async fn close(self) -> Result<(), ConnectError> {
        debug!("Closing SSH connection {}", self.device_addr);
        if !self.handle.is_closed() {
            self.handle
                .disconnect(Disconnect::ByApplication, "", "en")
                .await?;
        }
        Ok(())
    }
}

impl fmt::Debug for SshSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshSession")
            .field("protocol", &self.protocol)
            .field("device_addr", &self.device_addr)
            .field("closed", &self.handle.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{HandshakeError, HostKeyCheck, SshHandler, fingerprint};
    use crate::error::FailureKind;
    use crate::profile::{ConnectOptions, ConnectTarget, ConnectionProfile};
    use crate::protocol::Protocol;
    use crate::session::HostKeyPolicy;
    use russh::client::Handler;
    use russh::keys::PublicKey;
    use std::path::Path;

    const FIRST_KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAILrUkKs93ILUeDG7flPHinA61FB0MCGx3be/rvOtDaSw";
    const SECOND_KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIBUyZVkirxYNl45ebl57rzG3NhuHFqCdJmgLuYLkUuNp";

    fn key(openssh: &str) -> PublicKey {
        PublicKey::from_openssh(openssh).unwrap()
    }

    fn trusting(path: &Path) -> HostKeyCheck {
        HostKeyCheck {
            host: "10.0.0.1".to_string(),
            port: 22,
            policy: HostKeyPolicy::TrustOnFirstUse {
                known_hosts: Some(path.to_path_buf()),
            },
        }
    }

    #[tokio::test]
    async fn unknown_host_is_learned_then_verified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ssh").join("known_hosts");

        let first = key(FIRST_KEY);
        assert!(trusting(&path).check_server_key(&first).await.unwrap());
        let learned = std::fs::read_to_string(&path).unwrap();
        assert!(learned.contains("10.0.0.1"));
        assert_eq!(learned.lines().filter(|l| !l.trim().is_empty()).count(), 1);

        assert!(trusting(&path).check_server_key(&first).await.unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), learned);
    }

    #[tokio::test]
    async fn changed_host_key_is_a_protocol_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_hosts");
        trusting(&path).check_server_key(&key(FIRST_KEY)).await.unwrap();

        let presented = key(SECOND_KEY);
        let err = trusting(&path)
            .check_server_key(&presented)
            .await
            .unwrap_err();
        match &err {
            HandshakeError::HostKeyChanged { fingerprint: fp, .. } => {
                assert_eq!(*fp, fingerprint(&presented));
            }
            other => panic!("expected HostKeyChanged, got {other:?}"),
        }

        let profile = ConnectionProfile::new("10.0.0.1", "admin", "pw", vec!["ssh-modern".into()]);
        let target = ConnectTarget::resolve(&profile, Protocol::SshModern, &ConnectOptions::default());
        let failure = err.classify(&target);
        assert_eq!(failure.kind, FailureKind::ProtocolError);
        assert!(failure.detail.contains("SHA256:"));
    }

    #[tokio::test]
    async fn no_check_accepts_any_key() {
        let mut check = HostKeyCheck {
            host: "10.0.0.1".to_string(),
            port: 22,
            policy: HostKeyPolicy::NoCheck,
        };
        assert!(check.check_server_key(&key(SECOND_KEY)).await.unwrap());
    }

    #[test]
    fn fingerprints_differ_per_key() {
        let first = fingerprint(&key(FIRST_KEY));
        assert!(first.starts_with("SHA256:"));
        assert_eq!(first.len(), "SHA256:".len() + 64);
        assert_ne!(first, fingerprint(&key(SECOND_KEY)));
    }

    #[test]
    fn idle_sessions_are_kept_alive_not_timed_out() {
        for handler in [SshHandler::modern(), SshHandler::legacy()] {
            let config = handler.client_config();
            assert!(config.inactivity_timeout.is_none());
            assert!(config.keepalive_interval.is_some());
            assert!(config.keepalive_max > 0);
        }
    }
}

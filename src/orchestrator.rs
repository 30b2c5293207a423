//! Connection fallback orchestration.
//!
//! [`ConnectionOrchestrator::connect`] expands the profile's protocol list,
//! applies the preferred-protocol override, then invokes one handler per
//! concrete protocol, strictly one after another. Each attempt races the
//! per-attempt timeout; a timed out attempt is dropped, which closes its
//! socket, and recorded as [`FailureKind::Timeout`]. The first success
//! ends the loop. Handler failures never escape as errors: they are
//! recorded in [`AttemptRecord`]s and only surface as
//! [`ConnectionOutcome::Exhausted`].

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant, SystemTime};

use log::{debug, info, warn};
use serde::Serialize;

use crate::error::{ConnectError, ConnectionFailure, FailureKind};
use crate::inventory::DeviceLookup;
use crate::profile::{ConnectOptions, ConnectTarget, ConnectionProfile};
use crate::protocol::{self, Protocol};
use crate::session::{ConnectionSecurityOptions, Session, SshHandler, TelnetHandler};

/// Future returned by a handler for one attempt.
pub type AttemptFuture<'a, S> = Pin<Box<dyn Future<Output = Result<S, ConnectionFailure>> + Send + 'a>>;

/// One connection handshake for one concrete protocol.
///
/// Implementations must release their socket on every failure path, and
/// must tolerate being dropped mid-flight when the attempt times out.
pub trait ProtocolHandler<S>: Send + Sync {
    fn connect<'a>(&'a self, target: &'a ConnectTarget) -> AttemptFuture<'a, S>;
}

impl ProtocolHandler<Session> for SshHandler {
    fn connect<'a>(&'a self, target: &'a ConnectTarget) -> AttemptFuture<'a, Session> {
        Box::pin(async move { self.establish(target).await.map(Session::Ssh) })
    }
}

impl ProtocolHandler<Session> for TelnetHandler {
    fn connect<'a>(&'a self, target: &'a ConnectTarget) -> AttemptFuture<'a, Session> {
        Box::pin(async move { self.establish(target).await.map(Session::Telnet) })
    }
}

/// Dispatch table from concrete protocol to handler.
pub struct HandlerTable<S> {
    ssh_modern: Box<dyn ProtocolHandler<S>>,
    ssh_legacy: Box<dyn ProtocolHandler<S>>,
    telnet: Box<dyn ProtocolHandler<S>>,
}

impl<S: 'static> HandlerTable<S> {
    pub fn new(
        ssh_modern: impl ProtocolHandler<S> + 'static,
        ssh_legacy: impl ProtocolHandler<S> + 'static,
        telnet: impl ProtocolHandler<S> + 'static,
    ) -> Self {
        Self {
            ssh_modern: Box::new(ssh_modern),
            ssh_legacy: Box::new(ssh_legacy),
            telnet: Box::new(telnet),
        }
    }

    pub fn handler(&self, protocol: Protocol) -> &dyn ProtocolHandler<S> {
        match protocol {
            Protocol::SshModern => self.ssh_modern.as_ref(),
            Protocol::SshLegacy => self.ssh_legacy.as_ref(),
            Protocol::Telnet => self.telnet.as_ref(),
        }
    }
}

impl HandlerTable<Session> {
    /// Real network handlers with the default security postures.
    pub fn network() -> Self {
        Self::new(SshHandler::modern(), SshHandler::legacy(), TelnetHandler::new())
    }

    /// Real network handlers, `ssh-modern` checking against `known_hosts`.
    pub fn network_with_known_hosts(known_hosts: impl Into<std::path::PathBuf>) -> Self {
        Self::new(
            SshHandler::modern()
                .with_security(ConnectionSecurityOptions::modern().with_known_hosts(known_hosts)),
            SshHandler::legacy(),
            TelnetHandler::new(),
        )
    }
}

/// Result of one attempt, without the session itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failure(ConnectionFailure),
}

/// Diagnostics for one handler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    /// Concrete protocol, never the `ssh` alias.
    pub protocol: Protocol,
    pub outcome: AttemptOutcome,
    pub started_at: SystemTime,
    pub duration: Duration,
}

impl AttemptRecord {
    pub fn failure(&self) -> Option<&ConnectionFailure> {
        match &self.outcome {
            AttemptOutcome::Failure(failure) => Some(failure),
            AttemptOutcome::Success => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == AttemptOutcome::Success
    }
}

/// Terminal result of a `connect` call.
#[derive(Debug)]
pub enum ConnectionOutcome<S = Session> {
    /// A handler succeeded; the session belongs to the caller now.
    Connected {
        session: S,
        protocol: Protocol,
        attempts: Vec<AttemptRecord>,
    },
    /// Every planned attempt failed, one record per attempt.
    Exhausted { attempts: Vec<AttemptRecord> },
}

impl<S> ConnectionOutcome<S> {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionOutcome::Connected { .. })
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            ConnectionOutcome::Connected { attempts, .. } => attempts,
            ConnectionOutcome::Exhausted { attempts } => attempts,
        }
    }

    pub fn protocol(&self) -> Option<Protocol> {
        match self {
            ConnectionOutcome::Connected { protocol, .. } => Some(*protocol),
            ConnectionOutcome::Exhausted { .. } => None,
        }
    }

    /// The most severe failure kind of an exhausted run, for a one-line summary.
    ///
    /// Ties go to the earliest attempt. `None` when connected.
    pub fn dominant_failure(&self) -> Option<FailureKind> {
        let ConnectionOutcome::Exhausted { attempts } = self else {
            return None;
        };
        attempts
            .iter()
            .filter_map(|attempt| attempt.failure().map(|f| f.kind))
            .fold(None, |best: Option<FailureKind>, kind| match best {
                Some(b) if b.severity() >= kind.severity() => Some(b),
                _ => Some(kind),
            })
    }

    pub fn into_session(self) -> Option<S> {
        match self {
            ConnectionOutcome::Connected { session, .. } => Some(session),
            ConnectionOutcome::Exhausted { .. } => None,
        }
    }
}

/// Tries a device's protocols in order until one connects.
///
/// Holds no state between calls; every `connect` starts a fresh sequence.
pub struct ConnectionOrchestrator<S = Session> {
    handlers: HandlerTable<S>,
}

impl ConnectionOrchestrator<Session> {
    pub fn new() -> Self {
        Self::with_handlers(HandlerTable::network())
    }
}

impl Default for ConnectionOrchestrator<Session> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Send + 'static> ConnectionOrchestrator<S> {
    pub fn with_handlers(handlers: HandlerTable<S>) -> Self {
        Self { handlers }
    }

    /// The concrete attempt order for `profile` under `options`.
    pub fn plan(
        &self,
        profile: &ConnectionProfile,
        options: &ConnectOptions,
    ) -> Result<Vec<Protocol>, ConnectError> {
        options.validate()?;
        profile.validate()?;
        let expanded = protocol::expand(&profile.protocols)?;
        Ok(protocol::prioritize(expanded, options.preferred_protocol))
    }

    /// Connects to the device described by `profile`.
    ///
    /// Errors only for configuration problems, before any attempt is made.
    pub async fn connect(
        &self,
        profile: &ConnectionProfile,
        options: &ConnectOptions,
    ) -> Result<ConnectionOutcome<S>, ConnectError> {
        let sequence = self.plan(profile, options)?;
        debug!(
            "Connecting to {} ({}), plan: {:?}",
            profile.hostname, profile.address, sequence
        );

        let mut attempts = Vec::with_capacity(sequence.len());
        for protocol in sequence {
            let target = ConnectTarget::resolve(profile, protocol, options);
            let device_addr = target.device_addr();
            debug!("Trying {protocol} connection to {device_addr}");

            let started_at = SystemTime::now();
            let clock = Instant::now();
            let result = match tokio::time::timeout(
                target.timeout,
                self.handlers.handler(protocol).connect(&target),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ConnectionFailure::timeout(format!(
                    "no {protocol} session with {}:{} within {:?}",
                    target.address, target.port, target.timeout
                ))),
            };
            let duration = clock.elapsed();

            match result {
                Ok(session) => {
                    info!("{device_addr} connected via {protocol} in {duration:?}");
                    attempts.push(AttemptRecord {
                        protocol,
                        outcome: AttemptOutcome::Success,
                        started_at,
                        duration,
                    });
                    return Ok(ConnectionOutcome::Connected {
                        session,
                        protocol,
                        attempts,
                    });
                }
                Err(failure) => {
                    warn!("{device_addr} {protocol} connection failed: {failure}");
                    attempts.push(AttemptRecord {
                        protocol,
                        outcome: AttemptOutcome::Failure(failure),
                        started_at,
                        duration,
                    });
                }
            }
        }

        warn!(
            "All connection attempts to {} ({}) failed",
            profile.hostname, profile.address
        );
        Ok(ConnectionOutcome::Exhausted { attempts })
    }

    /// Looks `hostname` up and connects to it.
    ///
    /// An unknown hostname is reported before any network activity.
    pub async fn connect_host<L: DeviceLookup + ?Sized>(
        &self,
        inventory: &L,
        hostname: &str,
        options: &ConnectOptions,
    ) -> Result<ConnectionOutcome<S>, ConnectError> {
        let profile = inventory.lookup(hostname)?;
        self.connect(&profile, options).await
    }
}

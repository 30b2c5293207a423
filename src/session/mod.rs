//! Protocol handlers and the sessions they produce.
//!
//! Each handler performs exactly one handshake (plus the login sequence for
//! Telnet) and either returns a live, authenticated [`Session`] or a
//! classified [`ConnectionFailure`]. On every failure path the handler drops
//! its socket before returning.
//!
//! # Main Components
//!
//! - [`SshHandler`] - SSH in the modern (verified, strict) or legacy (unverified, wide) posture
//! - [`TelnetHandler`] - Telnet with prompt-driven login
//! - [`Session`] - The established channel, owned by the caller after a successful connect
//! - [`SessionHandoff`] / [`PassThrough`] - Transfer of a session to an interactive consumer

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, trace, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use russh::{Preferred, client};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config;
use crate::error::{ConnectError, ConnectionFailure, FailureKind};
use crate::profile::ConnectTarget;
use crate::protocol::Protocol;

pub use handoff::{PassThrough, PtyOptions, SessionHandoff};
pub use security::{ConnectionSecurityOptions, HostKeyPolicy, SecurityLevel};
pub use ssh::{SshHandler, SshSession};
pub use telnet::{TelnetHandler, TelnetSession};

/// An established, authenticated interactive channel.
///
/// Ownership moves exactly once, from the handler that created it to the
/// caller of `connect`. Whoever holds it is responsible for closing it.
pub enum Session {
    Ssh(SshSession),
    Telnet(TelnetSession),
}

impl Session {
    /// Concrete protocol the session was established with.
    pub fn protocol(&self) -> Protocol {
        match self {
            Session::Ssh(ssh) => ssh.protocol(),
            Session::Telnet(_) => Protocol::Telnet,
        }
    }

    /// `user@addr:port` of the remote end.
    pub fn device_addr(&self) -> &str {
        match self {
            Session::Ssh(ssh) => ssh.device_addr(),
            Session::Telnet(telnet) => telnet.device_addr(),
        }
    }

    /// Closes the session without handing it to an interactive consumer.
    pub async fn close(self) -> Result<(), ConnectError> {
        match self {
            Session::Ssh(ssh) => ssh.close().await,
            Session::Telnet(telnet) => telnet.close().await,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("protocol", &self.protocol())
            .field("device_addr", &self.device_addr())
            .finish()
    }
}

mod classify;
mod handoff;
mod security;
mod ssh;
mod telnet;

//! Mapping of transport errors onto [`FailureKind`].

use super::*;

use std::io;

/// Classifies an I/O error raised while reaching or talking to a device.
pub(super) fn io_failure(err: &io::Error, target: &ConnectTarget) -> ConnectionFailure {
    let kind = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => FailureKind::Timeout,
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::InvalidData => FailureKind::ProtocolError,
        // refused, unreachable networks and failed name resolution all land here
        _ => FailureKind::Unreachable,
    };
    ConnectionFailure::new(
        kind,
        format!("{}:{}: {}", target.address, target.port, err),
    )
}

/// Classifies a russh error from the handshake or authentication phase.
pub(super) fn russh_failure(err: &russh::Error, target: &ConnectTarget) -> ConnectionFailure {
    match err {
        russh::Error::IO(io_err) => io_failure(io_err, target),
        russh::Error::Version => ConnectionFailure::unsupported(format!(
            "{}:{} did not present an SSH identification string",
            target.address, target.port
        )),
        russh::Error::Elapsed(_) => ConnectionFailure::timeout(format!(
            "SSH handshake with {}:{} timed out",
            target.address, target.port
        )),
        russh::Error::NotAuthenticated => ConnectionFailure::auth_failed(format!(
            "authentication failed for {}",
            target.device_addr()
        )),
        other => ConnectionFailure::protocol(format!(
            "SSH error with {}:{}: {other}",
            target.address, target.port
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::{io_failure, russh_failure};
    use crate::error::FailureKind;
    use crate::profile::{ConnectOptions, ConnectTarget, ConnectionProfile};
    use crate::protocol::Protocol;
    use std::io;

    fn target() -> ConnectTarget {
        let profile = ConnectionProfile::new("10.1.1.1", "admin", "pw", vec!["ssh".into()]);
        ConnectTarget::resolve(&profile, Protocol::SshModern, &ConnectOptions::default())
    }

    #[test]
    fn refused_is_unreachable() {
        let err = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(io_failure(&err, &target()).kind, FailureKind::Unreachable);
    }

    #[test]
    fn timed_out_is_timeout() {
        let err = io::Error::from(io::ErrorKind::TimedOut);
        assert_eq!(io_failure(&err, &target()).kind, FailureKind::Timeout);
    }

    #[test]
    fn reset_is_protocol_error() {
        let err = io::Error::from(io::ErrorKind::ConnectionReset);
        assert_eq!(io_failure(&err, &target()).kind, FailureKind::ProtocolError);
    }

    #[test]
    fn russh_errors_are_classified() {
        let t = target();
        let io_err = russh::Error::IO(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert_eq!(russh_failure(&io_err, &t).kind, FailureKind::Unreachable);
        assert_eq!(
            russh_failure(&russh::Error::Version, &t).kind,
            FailureKind::Unsupported
        );
        assert_eq!(
            russh_failure(&russh::Error::NotAuthenticated, &t).kind,
            FailureKind::AuthenticationFailed
        );
        assert_eq!(
            russh_failure(&russh::Error::Disconnect, &t).kind,
            FailureKind::ProtocolError
        );
    }
}

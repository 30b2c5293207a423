//! Transfer of an established session to an interactive consumer.
//!
//! Local terminal raw mode, signal forwarding and resize propagation belong
//! to the consumer; this module only moves bytes.

use super::*;

/// PTY parameters requested for SSH shells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyOptions {
    pub term: String,
    pub cols: u32,
    pub rows: u32,
}

impl Default for PtyOptions {
    fn default() -> Self {
        Self {
            term: config::DEFAULT_TERM.to_string(),
            cols: config::DEFAULT_COLS,
            rows: config::DEFAULT_ROWS,
        }
    }
}

/// Consumer side of a successful connect: takes ownership of the session.
///
/// The consumer closes the session when it is done with it.
pub trait SessionHandoff {
    fn take(self, session: Session) -> impl Future<Output = Result<(), ConnectError>> + Send;
}

/// Transparent pipe between a session and a duplex byte stream, e.g. a
/// terminal adapter or an in-memory `tokio::io::duplex` pair.
///
/// The pipe ends when either side reaches EOF; the session is then closed.
pub struct PassThrough<T> {
    io: T,
    pty: PtyOptions,
}

impl<T> PassThrough<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(io: T) -> Self {
        Self {
            io,
            pty: PtyOptions::default(),
        }
    }

    pub fn with_pty(mut self, pty: PtyOptions) -> Self {
        self.pty = pty;
        self
    }
}

impl<T> SessionHandoff for PassThrough<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn take(self, session: Session) -> Result<(), ConnectError> {
        let PassThrough { mut io, pty } = self;
        match session {
            Session::Ssh(ssh) => {
                let channel = ssh.open_shell(&pty).await?;
                pump(&mut io, Box::pin(channel.into_stream()), ssh.device_addr()).await?;
                ssh.close().await
            }
            Session::Telnet(mut telnet) => {
                let device_addr = telnet.device_addr().to_string();
                if !telnet.banner().is_empty() {
                    io.write_all(telnet.banner().as_bytes()).await?;
                    io.flush().await?;
                }
                telnet.relay(&mut io).await?;
                if let Err(err) = telnet.close().await {
                    debug!("{device_addr} telnet shutdown after relay failed: {err}");
                }
                Ok(())
            }
        }
    }
}

/// Copies bytes both ways between an SSH channel and the operator until one
/// direction hits EOF.
async fn pump<A, B>(operator: A, device: B, device_addr: &str) -> Result<(), ConnectError>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut operator_rx, mut operator_tx) = tokio::io::split(operator);
    let (mut device_rx, mut device_tx) = tokio::io::split(device);

    {
        let upstream = tokio::io::copy(&mut operator_rx, &mut device_tx);
        let downstream = tokio::io::copy(&mut device_rx, &mut operator_tx);
        tokio::pin!(upstream, downstream);

        tokio::select! {
            sent = &mut upstream => {
                debug!("{device_addr} operator input closed after {} bytes", sent?);
            }
            received = &mut downstream => {
                debug!("{device_addr} device output closed after {} bytes", received?);
            }
        }
    }
    operator_tx.flush().await?;
    Ok(())
}

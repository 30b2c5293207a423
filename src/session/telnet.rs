use super::*;

use tokio::time::Instant;

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

/// Line terminator written after each credential.
const LINE_END: &str = "\n";

static LOGIN_PROMPT: Lazy<Regex> = Lazy::new(|| match Regex::new(r"(?i)username|login") {
    Ok(re) => re,
    Err(err) => panic!("invalid LOGIN_PROMPT regex: {err}"),
});

static PASSWORD_PROMPT: Lazy<Regex> = Lazy::new(|| match Regex::new(r"(?i)password") {
    Ok(re) => re,
    Err(err) => panic!("invalid PASSWORD_PROMPT regex: {err}"),
});

/// A login prompt at the very end of the output: the device is asking again.
static RETRY_PROMPT: Lazy<Regex> =
    Lazy::new(|| match Regex::new(r"(?i)(username|login)\s*:\s*$") {
        Ok(re) => re,
        Err(err) => panic!("invalid RETRY_PROMPT regex: {err}"),
    });

/// A password prompt at the very end of the output after the password was sent.
static PASSWORD_RETRY: Lazy<Regex> = Lazy::new(|| match Regex::new(r"(?i)password\s*:\s*$") {
    Ok(re) => re,
    Err(err) => panic!("invalid PASSWORD_RETRY regex: {err}"),
});

static SHELL_PROMPT: Lazy<Regex> = Lazy::new(|| match Regex::new(r"[>#$%\]]\s*$") {
    Ok(re) => re,
    Err(err) => panic!("invalid SHELL_PROMPT regex: {err}"),
});

static FAILURE_MARKER: Lazy<Regex> =
    Lazy::new(|| match Regex::new(r"(?i)\b(incorrect|failed|denied|invalid)\b") {
        Ok(re) => re,
        Err(err) => panic!("invalid FAILURE_MARKER regex: {err}"),
    });

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NegotiationState {
    Data,
    Iac,
    Option(u8),
    Sub,
    SubIac,
}

/// Telnet option negotiation: refuses every option and strips commands from the data stream.
#[derive(Debug)]
pub(crate) struct Negotiator {
    state: NegotiationState,
}

impl Negotiator {
    pub(crate) fn new() -> Self {
        Self {
            state: NegotiationState::Data,
        }
    }

    /// Feeds raw bytes; payload goes to `data`, negotiation answers to `replies`.
    ///
    /// State carries over between calls, so commands split across reads are handled.
    pub(crate) fn feed(&mut self, input: &[u8], data: &mut Vec<u8>, replies: &mut Vec<u8>) {
        for &byte in input {
            self.state = match (self.state, byte) {
                (NegotiationState::Data, IAC) => NegotiationState::Iac,
                (NegotiationState::Data, b) => {
                    data.push(b);
                    NegotiationState::Data
                }
                (NegotiationState::Iac, IAC) => {
                    data.push(IAC);
                    NegotiationState::Data
                }
                (NegotiationState::Iac, verb @ (DO | DONT | WILL | WONT)) => {
                    NegotiationState::Option(verb)
                }
                (NegotiationState::Iac, SB) => NegotiationState::Sub,
                // NOP, GA and friends carry no payload
                (NegotiationState::Iac, _) => NegotiationState::Data,
                (NegotiationState::Option(verb), option) => {
                    match verb {
                        DO => replies.extend_from_slice(&[IAC, WONT, option]),
                        WILL => replies.extend_from_slice(&[IAC, DONT, option]),
                        _ => {}
                    }
                    NegotiationState::Data
                }
                (NegotiationState::Sub, IAC) => NegotiationState::SubIac,
                (NegotiationState::Sub, _) => NegotiationState::Sub,
                (NegotiationState::SubIac, SE) => NegotiationState::Data,
                (NegotiationState::SubIac, _) => NegotiationState::Sub,
            };
        }
    }
}

/// Doubles every IAC byte so operator input reaches the device as data.
pub(crate) fn escape_iac(input: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(input.len());
    for &byte in input {
        escaped.push(byte);
        if byte == IAC {
            escaped.push(IAC);
        }
    }
    escaped
}

enum Wait {
    Matched(usize),
    Expired,
    Closed,
}

/// Reads device output during login, answering negotiation as it goes.
struct LoginReader<'a> {
    stream: &'a mut TcpStream,
    target: &'a ConnectTarget,
    negotiator: Negotiator,
    text: String,
}

impl<'a> LoginReader<'a> {
    fn new(stream: &'a mut TcpStream, target: &'a ConnectTarget) -> Self {
        Self {
            stream,
            target,
            negotiator: Negotiator::new(),
            text: String::new(),
        }
    }

    /// Reads one chunk. Returns `false` on EOF.
    async fn fill(&mut self) -> Result<bool, ConnectionFailure> {
        let mut buf = [0u8; 4096];
        let n = self
            .stream
            .read(&mut buf)
            .await
            .map_err(|e| classify::io_failure(&e, self.target))?;
        if n == 0 {
            return Ok(false);
        }

        let mut data = Vec::with_capacity(n);
        let mut replies = Vec::new();
        self.negotiator.feed(&buf[..n], &mut data, &mut replies);
        let chunk = String::from_utf8_lossy(&data);
        trace!("{:?}", chunk);
        self.text.push_str(&chunk);

        if !replies.is_empty() {
            self.stream
                .write_all(&replies)
                .await
                .map_err(|e| classify::io_failure(&e, self.target))?;
        }
        Ok(true)
    }

    fn foreign_banner(&self) -> Option<ConnectionFailure> {
        let head = self.text.trim_start();
        let speaks = if head.starts_with("HTTP/")
            || head.to_ascii_lowercase().starts_with("<!doctype html")
        {
            "HTTP"
        } else if head.starts_with("SSH-") {
            "SSH"
        } else {
            return None;
        };
        Some(ConnectionFailure::unsupported(format!(
            "{}:{} answered with a {speaks} banner, not telnet",
            self.target.address, self.target.port
        )))
    }

    /// Reads until one of `patterns` matches the collected text or `wait` passes.
    async fn wait_for(&mut self, patterns: &[&Regex], wait: Duration) -> Result<Wait, ConnectionFailure> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(failure) = self.foreign_banner() {
                return Err(failure);
            }
            if let Some(idx) = patterns.iter().position(|re| re.is_match(&self.text)) {
                return Ok(Wait::Matched(idx));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Wait::Expired);
            }
            match tokio::time::timeout(remaining, self.fill()).await {
                Err(_) => return Ok(Wait::Expired),
                Ok(Ok(true)) => {}
                Ok(Ok(false)) => return Ok(Wait::Closed),
                Ok(Err(failure)) => return Err(failure),
            }
        }
    }

    async fn send_line(&mut self, line: &str) -> Result<(), ConnectionFailure> {
        self.stream
            .write_all(format!("{line}{LINE_END}").as_bytes())
            .await
            .map_err(|e| classify::io_failure(&e, self.target))
    }

    fn take_text(&mut self) -> String {
        std::mem::take(&mut self.text)
    }

    /// Ends the login, keeping the negotiation state for the interactive phase.
    fn finish(self) -> (Negotiator, String) {
        (self.negotiator, self.text)
    }

    fn closed(&self, phase: &str) -> ConnectionFailure {
        ConnectionFailure::protocol(format!(
            "{}:{} closed the connection {phase}",
            self.target.address, self.target.port
        ))
    }

    /// Watches the output after the password was sent.
    ///
    /// A shell prompt means success, a fresh login or password prompt or EOF
    /// means the credentials were rejected. If neither shows up in time the login is
    /// assumed good unless the output carries a failure marker.
    async fn settle(&mut self, wait: Duration) -> Result<(), ConnectionFailure> {
        let deadline = Instant::now() + wait;
        loop {
            if RETRY_PROMPT.is_match(&self.text) || PASSWORD_RETRY.is_match(&self.text) {
                return Err(self.rejected());
            }
            if SHELL_PROMPT.is_match(&self.text) {
                return Ok(());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, self.fill()).await {
                Err(_) => break,
                Ok(Ok(true)) => {}
                Ok(Ok(false)) => return Err(self.rejected()),
                Ok(Err(failure)) => return Err(failure),
            }
        }
        if FAILURE_MARKER.is_match(&self.text) {
            return Err(self.rejected());
        }
        Ok(())
    }

    fn rejected(&self) -> ConnectionFailure {
        let reason = self
            .text
            .lines()
            .map(str::trim)
            .find(|line| FAILURE_MARKER.is_match(line))
            .unwrap_or("prompt repeated or connection closed");
        ConnectionFailure::auth_failed(format!(
            "telnet login rejected for {}: {reason}",
            self.target.device_addr()
        ))
    }
}

/// Telnet handler with best-effort, prompt-driven login.
#[derive(Debug, Clone)]
pub struct TelnetHandler {
    prompt_wait: Duration,
    settle_wait: Duration,
}

impl Default for TelnetHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl TelnetHandler {
    pub fn new() -> Self {
        Self {
            prompt_wait: config::TELNET_PROMPT_WAIT,
            settle_wait: config::TELNET_SETTLE_WAIT,
        }
    }

    /// Overrides how long to wait for each prompt and for the post-login output.
    pub fn with_waits(mut self, prompt_wait: Duration, settle_wait: Duration) -> Self {
        self.prompt_wait = prompt_wait;
        self.settle_wait = settle_wait;
        self
    }

    /// Connects and logs in.
    ///
    /// All waits share one deadline derived from the attempt timeout, so the
    /// best-effort path finishes before the attempt is cut off.
    pub async fn establish(&self, target: &ConnectTarget) -> Result<TelnetSession, ConnectionFailure> {
        let device_addr = target.device_addr();
        warn!("{device_addr} telnet is unencrypted, use SSH when possible");
        let deadline =
            Instant::now() + target.timeout.saturating_sub(config::TELNET_DEADLINE_MARGIN);
        let budget = |wait: Duration| wait.min(deadline.saturating_duration_since(Instant::now()));

        let mut stream = TcpStream::connect((target.address.as_str(), target.port))
            .await
            .map_err(|e| classify::io_failure(&e, target))?;
        debug!("{device_addr} TCP connection successful");

        let mut reader = LoginReader::new(&mut stream, target);
        let first = reader
            .wait_for(&[&*LOGIN_PROMPT, &*PASSWORD_PROMPT], budget(self.prompt_wait))
            .await?;
        let password_first = match first {
            Wait::Matched(idx) => idx == 1,
            Wait::Expired => {
                warn!("{device_addr} no standard login prompt detected, sending username anyway");
                false
            }
            Wait::Closed => return Err(reader.closed("before the login prompt")),
        };
        reader.take_text();

        if !password_first {
            reader.send_line(&target.username).await?;
            match reader
                .wait_for(&[&*PASSWORD_PROMPT], budget(self.prompt_wait))
                .await?
            {
                Wait::Matched(_) => {}
                Wait::Expired => {
                    warn!("{device_addr} no standard password prompt detected, sending password anyway")
                }
                Wait::Closed => return Err(reader.closed("after the username was sent")),
            }
            reader.take_text();
        }

        reader.send_line(&target.password).await?;
        reader.settle(budget(self.settle_wait)).await?;
        let (negotiator, banner) = reader.finish();

        info!("{device_addr} telnet login successful");
        Ok(TelnetSession {
            stream,
            negotiator,
            device_addr,
            banner,
        })
    }
}

/// A logged-in Telnet connection.
pub struct TelnetSession {
    stream: TcpStream,
    negotiator: Negotiator,
    device_addr: String,
    banner: String,
}

impl TelnetSession {
    pub fn device_addr(&self) -> &str {
        &self.device_addr
    }

    /// Output received after the password, typically the MOTD and first prompt.
    pub fn banner(&self) -> &str {
        &self.banner
    }

    /// Relays bytes between `operator` and the device until either side
    /// reaches EOF.
    ///
    /// Device output keeps going through option negotiation, so only payload
    /// reaches the operator. Operator input has IAC bytes escaped.
    pub(super) async fn relay<A>(&mut self, operator: A) -> Result<(), ConnectError>
    where
        A: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut operator_rx, mut operator_tx) = tokio::io::split(operator);
        let (mut device_rx, mut device_tx) = self.stream.split();
        let mut from_device = [0u8; 4096];
        let mut from_operator = [0u8; 4096];

        loop {
            tokio::select! {
                received = device_rx.read(&mut from_device) => {
                    let n = received?;
                    if n == 0 {
                        debug!("{} device output closed", self.device_addr);
                        break;
                    }
                    let mut data = Vec::with_capacity(n);
                    let mut replies = Vec::new();
                    self.negotiator.feed(&from_device[..n], &mut data, &mut replies);
                    if !replies.is_empty() {
                        device_tx.write_all(&replies).await?;
                    }
                    if !data.is_empty() {
                        operator_tx.write_all(&data).await?;
                        operator_tx.flush().await?;
                    }
                }
                sent = operator_rx.read(&mut from_operator) => {
                    let n = sent?;
                    if n == 0 {
                        debug!("{} operator input closed", self.device_addr);
                        break;
                    }
                    device_tx.write_all(&escape_iac(&from_operator[..n])).await?;
                }
            }
        }
        operator_tx.flush().await?;
        Ok(())
    }

    pub async fn close(mut self) -> Result<(), ConnectError> {
        debug!("Closing telnet connection {}", self.device_addr);
        self.stream.shutdown().await?;
        Ok(())
    }
}

impl fmt::Debug for TelnetSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelnetSession")
            .field("device_addr", &self.device_addr)
            .field("banner", &self.banner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{DO, DONT, IAC, Negotiator, SB, SE, WILL, WONT, escape_iac};

    fn run(input: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut negotiator = Negotiator::new();
        let mut data = Vec::new();
        let mut replies = Vec::new();
        negotiator.feed(input, &mut data, &mut replies);
        (data, replies)
    }

    #[test]
    fn plain_text_passes_through() {
        let (data, replies) = run(b"Username: ");
        assert_eq!(data, b"Username: ");
        assert!(replies.is_empty());
    }

    #[test]
    fn do_and_will_are_refused() {
        let (data, replies) = run(&[IAC, DO, 1, b'a', IAC, WILL, 3, b'b']);
        assert_eq!(data, b"ab");
        assert_eq!(replies, vec![IAC, WONT, 1, IAC, DONT, 3]);
    }

    #[test]
    fn dont_and_wont_need_no_answer() {
        let (data, replies) = run(&[IAC, DONT, 1, IAC, WONT, 3]);
        assert!(data.is_empty());
        assert!(replies.is_empty());
    }

    #[test]
    fn escaped_iac_is_data() {
        let (data, _) = run(&[b'x', IAC, IAC, b'y']);
        assert_eq!(data, vec![b'x', IAC, b'y']);
    }

    #[test]
    fn subnegotiation_is_stripped() {
        let (data, replies) = run(&[IAC, SB, 24, 1, IAC, SE, b'o', b'k']);
        assert_eq!(data, b"ok");
        assert!(replies.is_empty());
    }

    #[test]
    fn command_split_across_reads() {
        let mut negotiator = Negotiator::new();
        let mut data = Vec::new();
        let mut replies = Vec::new();
        negotiator.feed(&[b'a', IAC], &mut data, &mut replies);
        negotiator.feed(&[DO], &mut data, &mut replies);
        negotiator.feed(&[31, b'b'], &mut data, &mut replies);
        assert_eq!(data, b"ab");
        assert_eq!(replies, vec![IAC, WONT, 31]);
    }

    #[test]
    fn operator_iac_is_doubled() {
        assert_eq!(escape_iac(&[b'a', IAC, b'b']), vec![b'a', IAC, IAC, b'b']);
        assert_eq!(escape_iac(b"plain"), b"plain");
    }
}

//! Connection defaults and SSH algorithm tables.
//!
//! The `SECURE_*` tables are what the `ssh-modern` handler negotiates with.
//! The `LEGACY_*` tables widen negotiation to the deprecated key exchanges,
//! CBC/3DES ciphers, SHA-1 MACs and DSA/RSA-SHA1 host keys that old network
//! gear still ships with, so that `ssh-legacy` can complete a handshake
//! where the modern posture cannot.

use std::time::Duration;

use russh::keys::{Algorithm, EcdsaCurve, HashAlg};
use russh::{cipher, compression, kex, mac};

/// Default SSH port for both SSH postures.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default Telnet port.
pub const DEFAULT_TELNET_PORT: u16 = 23;

/// Per-attempt timeout for SSH when the caller does not set one.
pub const DEFAULT_SSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-attempt timeout for Telnet when the caller does not set one.
pub const DEFAULT_TELNET_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest time to wait for a single Telnet login prompt before sending anyway.
pub const TELNET_PROMPT_WAIT: Duration = Duration::from_secs(2);

/// How long to collect output after the Telnet password was sent.
pub const TELNET_SETTLE_WAIT: Duration = Duration::from_secs(2);

/// Slack kept between the end of the Telnet login and the attempt timeout.
pub const TELNET_DEADLINE_MARGIN: Duration = Duration::from_millis(250);

/// Interval between SSH keepalive requests on an idle connection.
pub const SSH_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Unanswered keepalives after which the SSH connection is dropped.
pub const SSH_KEEPALIVE_MAX: usize = 3;

/// Terminal type requested for interactive SSH shells.
pub const DEFAULT_TERM: &str = "xterm";

/// Default PTY width in columns.
pub const DEFAULT_COLS: u32 = 80;

/// Default PTY height in rows.
pub const DEFAULT_ROWS: u32 = 24;

/// Key exchange algorithms accepted by the modern posture.
pub const SECURE_KEX_ORDER: &[kex::Name] = &[
    kex::CURVE25519,
    kex::CURVE25519_PRE_RFC_8731,
    kex::DH_G16_SHA512,
    kex::DH_G14_SHA256,
    kex::ECDH_SHA2_NISTP256,
    kex::ECDH_SHA2_NISTP384,
    kex::ECDH_SHA2_NISTP521,
    kex::EXTENSION_SUPPORT_AS_CLIENT,
    kex::EXTENSION_OPENSSH_STRICT_KEX_AS_CLIENT,
];

/// Ciphers accepted by the modern posture (AEAD and CTR only).
pub const SECURE_CIPHERS: &[cipher::Name] = &[
    cipher::CHACHA20_POLY1305,
    cipher::AES_256_GCM,
    cipher::AES_256_CTR,
    cipher::AES_192_CTR,
    cipher::AES_128_CTR,
];

/// MAC algorithms accepted by the modern posture.
pub const SECURE_MAC_ALGORITHMS: &[mac::Name] = &[
    mac::HMAC_SHA512_ETM,
    mac::HMAC_SHA256_ETM,
    mac::HMAC_SHA512,
    mac::HMAC_SHA256,
];

/// Host key algorithms accepted by the modern posture.
pub const SECURE_KEY_TYPES: &[Algorithm] = &[
    Algorithm::Ed25519,
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP256,
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP384,
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP521,
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha512),
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha256),
    },
];

/// Key exchange algorithms offered by the legacy posture, modern ones first.
pub const LEGACY_KEX_ORDER: &[kex::Name] = &[
    kex::CURVE25519,
    kex::CURVE25519_PRE_RFC_8731,
    kex::DH_G16_SHA512,
    kex::DH_G14_SHA256,
    kex::ECDH_SHA2_NISTP256,
    kex::ECDH_SHA2_NISTP384,
    kex::ECDH_SHA2_NISTP521,
    kex::DH_GEX_SHA256,
    kex::DH_GEX_SHA1,
    kex::DH_G14_SHA1,
    kex::DH_G1_SHA1,
    kex::EXTENSION_SUPPORT_AS_CLIENT,
];

/// Ciphers offered by the legacy posture, including CBC and 3DES.
pub const LEGACY_CIPHERS: &[cipher::Name] = &[
    cipher::CHACHA20_POLY1305,
    cipher::AES_256_GCM,
    cipher::AES_256_CTR,
    cipher::AES_192_CTR,
    cipher::AES_128_CTR,
    cipher::AES_256_CBC,
    cipher::AES_192_CBC,
    cipher::AES_128_CBC,
    cipher::TRIPLE_DES_CBC,
];

/// MAC algorithms offered by the legacy posture, including plain SHA-1.
pub const LEGACY_MAC_ALGORITHMS: &[mac::Name] = &[
    mac::HMAC_SHA512_ETM,
    mac::HMAC_SHA256_ETM,
    mac::HMAC_SHA512,
    mac::HMAC_SHA256,
    mac::HMAC_SHA1_ETM,
    mac::HMAC_SHA1,
];

/// Host key algorithms offered by the legacy posture, including DSA and RSA/SHA-1.
pub const LEGACY_KEY_TYPES: &[Algorithm] = &[
    Algorithm::Ed25519,
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP256,
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP384,
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP521,
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha512),
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha256),
    },
    Algorithm::Rsa { hash: None },
    Algorithm::Dsa,
];

/// Compression methods for both postures.
pub const DEFAULT_COMPRESSION_ALGORITHMS: &[compression::Name] = &[
    compression::NONE,
    compression::ZLIB,
    compression::ZLIB_LEGACY,
];

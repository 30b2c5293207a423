use super::*;

use std::borrow::Cow;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Security level used for SSH algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum SecurityLevel {
    /// Current algorithms only.
    Secure,
    /// Deprecated key exchanges, CBC/3DES ciphers and SHA-1 MACs allowed.
    LegacyCompatible,
}

/// How the remote host key is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Known keys must match; unknown hosts are recorded on first contact.
    ///
    /// `known_hosts` of `None` means `~/.ssh/known_hosts`.
    TrustOnFirstUse { known_hosts: Option<PathBuf> },
    /// Any host key is accepted.
    NoCheck,
}

impl HostKeyPolicy {
    /// The known_hosts file this policy reads and writes, if any.
    pub fn known_hosts_path(&self) -> Option<PathBuf> {
        match self {
            HostKeyPolicy::TrustOnFirstUse {
                known_hosts: Some(path),
            } => Some(path.clone()),
            HostKeyPolicy::TrustOnFirstUse { known_hosts: None } => {
                dirs::home_dir().map(|home| home.join(".ssh").join("known_hosts"))
            }
            HostKeyPolicy::NoCheck => None,
        }
    }
}

/// Connection security options for SSH establishment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSecurityOptions {
    /// SSH algorithm policy.
    pub level: SecurityLevel,
    /// Server host key verification.
    pub host_key_policy: HostKeyPolicy,
}

impl Default for ConnectionSecurityOptions {
    fn default() -> Self {
        Self::modern()
    }
}

impl ConnectionSecurityOptions {
    /// Posture of the `ssh-modern` handler.
    pub fn modern() -> Self {
        Self {
            level: SecurityLevel::Secure,
            host_key_policy: HostKeyPolicy::TrustOnFirstUse { known_hosts: None },
        }
    }

    /// Posture of the `ssh-legacy` handler.
    pub fn legacy() -> Self {
        Self {
            level: SecurityLevel::LegacyCompatible,
            host_key_policy: HostKeyPolicy::NoCheck,
        }
    }

    /// Uses `path` instead of `~/.ssh/known_hosts` when host keys are checked.
    pub fn with_known_hosts(mut self, path: impl Into<PathBuf>) -> Self {
        if let HostKeyPolicy::TrustOnFirstUse { known_hosts } = &mut self.host_key_policy {
            *known_hosts = Some(path.into());
        }
        self
    }

    pub(super) fn preferred(&self) -> Preferred {
        match self.level {
            SecurityLevel::Secure => Preferred {
                kex: Cow::Borrowed(config::SECURE_KEX_ORDER),
                key: Cow::Borrowed(config::SECURE_KEY_TYPES),
                cipher: Cow::Borrowed(config::SECURE_CIPHERS),
                mac: Cow::Borrowed(config::SECURE_MAC_ALGORITHMS),
                compression: Cow::Borrowed(config::DEFAULT_COMPRESSION_ALGORITHMS),
            },
            SecurityLevel::LegacyCompatible => Preferred {
                kex: Cow::Borrowed(config::LEGACY_KEX_ORDER),
                key: Cow::Borrowed(config::LEGACY_KEY_TYPES),
                cipher: Cow::Borrowed(config::LEGACY_CIPHERS),
                mac: Cow::Borrowed(config::LEGACY_MAC_ALGORITHMS),
                compression: Cow::Borrowed(config::DEFAULT_COMPRESSION_ALGORITHMS),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConnectionSecurityOptions, HostKeyPolicy, SecurityLevel};
    use russh::keys::Algorithm;
    use russh::{cipher, kex, mac};
    use std::path::PathBuf;

    #[test]
    fn default_security_options_are_modern() {
        let options = ConnectionSecurityOptions::default();
        assert_eq!(options.level, SecurityLevel::Secure);
        assert!(matches!(
            options.host_key_policy,
            HostKeyPolicy::TrustOnFirstUse { .. }
        ));
    }

    #[test]
    fn legacy_profile_uses_no_host_check() {
        let options = ConnectionSecurityOptions::legacy();
        assert_eq!(options.level, SecurityLevel::LegacyCompatible);
        assert_eq!(options.host_key_policy, HostKeyPolicy::NoCheck);
        assert_eq!(options.host_key_policy.known_hosts_path(), None);
    }

    #[test]
    fn known_hosts_override_only_applies_when_checking() {
        let modern = ConnectionSecurityOptions::modern().with_known_hosts("/tmp/kh");
        assert_eq!(
            modern.host_key_policy.known_hosts_path(),
            Some(PathBuf::from("/tmp/kh"))
        );
        let legacy = ConnectionSecurityOptions::legacy().with_known_hosts("/tmp/kh");
        assert_eq!(legacy.host_key_policy, HostKeyPolicy::NoCheck);
    }

    #[test]
    fn modern_profile_excludes_weak_algorithms() {
        let preferred = ConnectionSecurityOptions::modern().preferred();

        assert!(!preferred.kex.contains(&kex::DH_G1_SHA1));
        assert!(!preferred.kex.contains(&kex::DH_G14_SHA1));
        assert!(!preferred.kex.contains(&kex::NONE));
        assert!(!preferred.cipher.contains(&cipher::AES_128_CBC));
        assert!(!preferred.cipher.contains(&cipher::NONE));
        assert!(!preferred.mac.contains(&mac::HMAC_SHA1));
        assert!(!preferred.key.contains(&Algorithm::Dsa));
    }

    #[test]
    fn legacy_profile_widens_negotiation() {
        let preferred = ConnectionSecurityOptions::legacy().preferred();

        assert!(preferred.kex.contains(&kex::DH_G1_SHA1));
        assert!(preferred.cipher.contains(&cipher::AES_128_CBC));
        assert!(preferred.mac.contains(&mac::HMAC_SHA1));
        assert!(preferred.key.contains(&Algorithm::Dsa));
        // deprecated is not the same as plaintext
        assert!(!preferred.cipher.contains(&cipher::NONE));
    }
}

//! Device inventory: hostname to connection profile lookup.
//!
//! The inventory is a JSON document persisted on disk:
//!
//! ```json
//! {
//!   "devices": [
//!     {
//!       "hostname": "core-sw1",
//!       "ip": "192.168.1.2",
//!       "protocols": ["ssh", "telnet"],
//!       "username": "admin",
//!       "password": "secret",
//!       "ssh_port": 2222
//!     }
//!   ]
//! }
//! ```
//!
//! `port`, `ssh_port` and `telnet_port` are optional; everything else is
//! required. Protocol tokens are validated on load so that a bad entry is
//! reported here rather than when someone tries to connect.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ConnectError;
use crate::profile::ConnectionProfile;
use crate::protocol::ProtocolToken;

/// Source of connection profiles keyed by hostname.
pub trait DeviceLookup {
    fn lookup(&self, hostname: &str) -> Result<ConnectionProfile, ConnectError>;
}

/// One device as stored in the inventory file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeviceEntry {
    /// Name the operator connects by.
    pub hostname: String,
    /// IP address or DNS name.
    pub ip: String,
    /// Protocols to try, in order: `ssh`, `ssh-modern`, `ssh-legacy`, `telnet`.
    pub protocols: Vec<String>,
    pub username: String,
    pub password: String,
    /// Port for every protocol unless a protocol specific one is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telnet_port: Option<u16>,
}

impl DeviceEntry {
    /// First three characters of the password, the rest replaced by `*`.
    pub fn masked_password(&self) -> String {
        self.password
            .chars()
            .enumerate()
            .map(|(idx, c)| if idx < 3 { c } else { '*' })
            .collect()
    }

    pub fn to_profile(&self) -> ConnectionProfile {
        ConnectionProfile {
            hostname: self.hostname.clone(),
            address: self.ip.clone(),
            port: self.port,
            ssh_port: self.ssh_port,
            telnet_port: self.telnet_port,
            username: self.username.clone(),
            password: self.password.clone(),
            protocols: self.protocols.clone(),
        }
    }

    fn validate(&self, index: usize) -> Result<(), ConnectError> {
        let name = if self.hostname.is_empty() {
            format!("at index {index}")
        } else {
            self.hostname.clone()
        };
        for (field, value) in [
            ("hostname", &self.hostname),
            ("ip", &self.ip),
            ("username", &self.username),
        ] {
            if value.trim().is_empty() {
                return Err(ConnectError::InvalidInventory(format!(
                    "device '{name}' is missing required field: {field}"
                )));
            }
        }
        if self.protocols.is_empty() {
            return Err(ConnectError::InvalidInventory(format!(
                "device '{name}' is missing required field: protocols"
            )));
        }
        for token in &self.protocols {
            if token.parse::<ProtocolToken>().is_err() {
                return Err(ConnectError::InvalidInventory(format!(
                    "invalid protocol '{token}' for device '{name}'. Valid options are: {}",
                    ProtocolToken::VALID.join(", ")
                )));
            }
        }
        for (field, value) in [
            ("port", self.port),
            ("ssh_port", self.ssh_port),
            ("telnet_port", self.telnet_port),
        ] {
            if value == Some(0) {
                return Err(ConnectError::InvalidInventory(format!(
                    "{field} for device '{name}' must be non-zero"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for DeviceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceEntry")
            .field("hostname", &self.hostname)
            .field("ip", &self.ip)
            .field("protocols", &self.protocols)
            .field("username", &self.username)
            .field("password", &self.masked_password())
            .field("port", &self.port)
            .field("ssh_port", &self.ssh_port)
            .field("telnet_port", &self.telnet_port)
            .finish()
    }
}

/// The whole inventory document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Inventory {
    pub devices: Vec<DeviceEntry>,
}

impl Inventory {
    /// `~/.rnetconn/inventory.json`, if a home directory is known.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".rnetconn").join("inventory.json"))
    }

    /// Template written when no inventory exists yet.
    pub fn template() -> Self {
        Self {
            devices: vec![
                DeviceEntry {
                    hostname: "example-router".to_string(),
                    ip: "192.168.1.1".to_string(),
                    protocols: vec!["ssh".to_string(), "telnet".to_string()],
                    username: "admin".to_string(),
                    password: "password123".to_string(),
                    port: None,
                    ssh_port: None,
                    telnet_port: None,
                },
                DeviceEntry {
                    hostname: "example-switch".to_string(),
                    ip: "192.168.1.2".to_string(),
                    protocols: vec!["ssh-modern".to_string()],
                    username: "admin".to_string(),
                    password: "securepass".to_string(),
                    port: None,
                    ssh_port: Some(2222),
                    telnet_port: None,
                },
                DeviceEntry {
                    hostname: "legacy-device".to_string(),
                    ip: "10.0.0.5".to_string(),
                    protocols: vec!["ssh-legacy".to_string(), "telnet".to_string()],
                    username: "admin".to_string(),
                    password: "legacy_pass".to_string(),
                    port: None,
                    ssh_port: None,
                    telnet_port: Some(8023),
                },
            ],
        }
    }

    /// Parses and validates an inventory document.
    pub fn from_json_str(json: &str) -> Result<Self, ConnectError> {
        let inventory: Inventory = serde_json::from_str(json)?;
        inventory.validate()?;
        Ok(inventory)
    }

    pub fn to_json_string(&self) -> Result<String, ConnectError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// JSON schema of the inventory document, for editors and validators.
    pub fn json_schema() -> Result<serde_json::Value, ConnectError> {
        Ok(serde_json::to_value(schemars::schema_for!(Inventory))?)
    }

    /// Checks required fields, protocol tokens, ports and hostname uniqueness.
    pub fn validate(&self) -> Result<(), ConnectError> {
        let mut seen = HashSet::new();
        for (index, device) in self.devices.iter().enumerate() {
            device.validate(index)?;
            if !seen.insert(device.hostname.as_str()) {
                return Err(ConnectError::InvalidInventory(format!(
                    "duplicate hostname '{}'",
                    device.hostname
                )));
            }
        }
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConnectError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| io_error(path, source))?;
        let inventory = Self::from_json_str(&json)?;
        debug!(
            "Loaded {} devices from {}",
            inventory.devices.len(),
            path.display()
        );
        Ok(inventory)
    }

    /// Loads `path`, writing the template there first if it does not exist.
    pub fn load_or_init(path: impl AsRef<Path>) -> Result<Self, ConnectError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No inventory at {}, writing template", path.display());
            Self::template().save(path)?;
        }
        Self::load(path)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConnectError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
        }
        fs::write(path, self.to_json_string()?).map_err(|source| io_error(path, source))
    }

    /// Validates `source` and copies it over the inventory at `dest`.
    ///
    /// Nothing is written when `source` is invalid.
    pub fn import(source: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<Self, ConnectError> {
        let inventory = Self::load(source.as_ref())?;
        inventory.save(dest)?;
        Ok(inventory)
    }

    pub fn get(&self, hostname: &str) -> Option<&DeviceEntry> {
        self.devices.iter().find(|d| d.hostname == hostname)
    }

    /// Devices sorted by hostname.
    pub fn devices(&self) -> Vec<&DeviceEntry> {
        let mut devices = self.devices.iter().collect::<Vec<_>>();
        devices.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        devices
    }
}

impl DeviceLookup for Inventory {
    fn lookup(&self, hostname: &str) -> Result<ConnectionProfile, ConnectError> {
        self.get(hostname)
            .map(DeviceEntry::to_profile)
            .ok_or_else(|| ConnectError::DeviceNotFound(hostname.to_string()))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ConnectError {
    ConnectError::InventoryIo {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::{DeviceLookup, Inventory};
    use crate::error::ConnectError;

    const SAMPLE: &str = r#"{
        "devices": [
            {"hostname": "r2", "ip": "10.0.0.2", "protocols": ["telnet"], "username": "u", "password": "p"},
            {"hostname": "r1", "ip": "10.0.0.1", "protocols": ["ssh", "telnet"],
             "username": "admin", "password": "password123", "ssh_port": 2222}
        ]
    }"#;

    #[test]
    fn lookup_builds_profile() {
        let inventory = Inventory::from_json_str(SAMPLE).unwrap();
        let profile = inventory.lookup("r1").unwrap();
        assert_eq!(profile.address, "10.0.0.1");
        assert_eq!(profile.ssh_port, Some(2222));
        assert_eq!(profile.protocols, vec!["ssh", "telnet"]);
        assert_eq!(profile.hostname, "r1");
    }

    #[test]
    fn lookup_missing_host_is_not_found() {
        let inventory = Inventory::from_json_str(SAMPLE).unwrap();
        assert!(matches!(
            inventory.lookup("nope"),
            Err(ConnectError::DeviceNotFound(name)) if name == "nope"
        ));
    }

    #[test]
    fn devices_are_sorted() {
        let inventory = Inventory::from_json_str(SAMPLE).unwrap();
        let names = inventory
            .devices()
            .iter()
            .map(|d| d.hostname.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["r1", "r2"]);
    }

    #[test]
    fn invalid_protocol_is_rejected() {
        let json = r#"{"devices":[{"hostname":"x","ip":"1.1.1.1","protocols":["rsh"],"username":"u","password":"p"}]}"#;
        match Inventory::from_json_str(json) {
            Err(ConnectError::InvalidInventory(msg)) => {
                assert!(msg.contains("invalid protocol 'rsh' for device 'x'"));
            }
            other => panic!("expected invalid inventory, got {other:?}"),
        }
    }

    #[test]
    fn missing_field_is_a_parse_error() {
        let json = r#"{"devices":[{"hostname":"x","protocols":["ssh"],"username":"u","password":"p"}]}"#;
        assert!(matches!(
            Inventory::from_json_str(json),
            Err(ConnectError::InventoryParse(_))
        ));
    }

    #[test]
    fn duplicate_hostnames_are_rejected() {
        let json = r#"{"devices":[
            {"hostname":"x","ip":"1.1.1.1","protocols":["ssh"],"username":"u","password":"p"},
            {"hostname":"x","ip":"1.1.1.2","protocols":["ssh"],"username":"u","password":"p"}]}"#;
        assert!(matches!(
            Inventory::from_json_str(json),
            Err(ConnectError::InvalidInventory(_))
        ));
    }

    #[test]
    fn password_is_masked_after_three_chars() {
        let inventory = Inventory::from_json_str(SAMPLE).unwrap();
        let device = inventory.get("r1").unwrap();
        assert_eq!(device.masked_password(), "pas********");
        assert!(!format!("{device:?}").contains("password123"));
    }

    #[test]
    fn template_is_valid_and_round_trips() {
        let template = Inventory::template();
        template.validate().unwrap();
        let parsed = Inventory::from_json_str(&template.to_json_string().unwrap()).unwrap();
        assert_eq!(parsed, template);
    }

    #[test]
    fn load_or_init_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("inventory.json");
        let inventory = Inventory::load_or_init(&path).unwrap();
        assert!(path.exists());
        assert_eq!(inventory.devices.len(), 3);
    }

    #[test]
    fn import_refuses_invalid_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("bad.json");
        let dest = dir.path().join("inventory.json");
        std::fs::write(&source, r#"{"devices": [{"hostname": "x"}]}"#).unwrap();
        assert!(Inventory::import(&source, &dest).is_err());
        assert!(!dest.exists());
    }

    #[test]
    fn import_copies_valid_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("new.json");
        let dest = dir.path().join("inventory.json");
        std::fs::write(&source, SAMPLE).unwrap();
        Inventory::import(&source, &dest).unwrap();
        assert_eq!(Inventory::load(&dest).unwrap().devices.len(), 2);
    }

    #[test]
    fn schema_mentions_devices() {
        let schema = Inventory::json_schema().unwrap();
        assert!(schema.to_string().contains("devices"));
    }
}

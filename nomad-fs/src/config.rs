//! Options shared by every folder opened through a repository.

use crate::error::NomadResult;
use nomad_sync::ReplicaConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

const DEFAULT_KEY_NAME_PREFIX: &str = "Nomad.Storage";

/// Publishing, resolution and naming options.
///
/// Durations are written in whole seconds:
///
/// ```toml
/// ipns_lifetime = 86400
/// should_pin = true
/// key_name_prefix = "Nomad.Storage"
/// update_check_interval = 60
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NomadOptions {
    /// Lifetime of published records.
    #[serde(with = "seconds")]
    pub ipns_lifetime: Duration,
    /// Pin content added to the store.
    pub should_pin: bool,
    /// Allow cached name resolution.
    pub use_cache: bool,
    /// Prefix of every key name created for a folder.
    pub key_name_prefix: String,
    /// How often a watcher polls for remote changes.
    #[serde(with = "seconds")]
    pub update_check_interval: Duration,
}

impl Default for NomadOptions {
    fn default() -> Self {
        Self {
            ipns_lifetime: Duration::from_secs(24 * 60 * 60),
            should_pin: false,
            use_cache: false,
            key_name_prefix: DEFAULT_KEY_NAME_PREFIX.to_string(),
            update_check_interval: Duration::from_secs(60),
        }
    }
}

impl NomadOptions {
    /// Parses options from TOML. Missing fields keep their defaults.
    pub fn from_toml_str(contents: &str) -> NomadResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Loads options from a TOML file.
    pub fn load_from(path: impl AsRef<Path>) -> NomadResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let options = Self::from_toml_str(&contents)?;
        info!("Loaded Nomad options from {:?}", path);
        Ok(options)
    }

    /// The subset of options the replication layer needs.
    pub fn replica_config(&self) -> ReplicaConfig {
        ReplicaConfig {
            ipns_lifetime: self.ipns_lifetime,
            should_pin: self.should_pin,
            use_cache: self.use_cache,
        }
    }

    /// Name of this peer's local stream key for `folder_name`.
    pub fn local_key_name(&self, folder_name: &str) -> String {
        format!("{}.Local.{}", self.key_name_prefix, folder_name)
    }

    /// Name of the shared roaming key for `folder_name`.
    pub fn roaming_key_name(&self, folder_name: &str) -> String {
        format!("{}.Roaming.{}", self.key_name_prefix, folder_name)
    }

    /// Local key name paired with an existing roaming key name.
    pub fn local_key_name_for(&self, roaming_key_name: &str) -> String {
        roaming_key_name.replacen(".Roaming.", ".Local.", 1)
    }

    /// Folder name encoded in a roaming key name, if it carries this prefix.
    pub fn folder_name_of<'a>(&self, roaming_key_name: &'a str) -> Option<&'a str> {
        roaming_key_name
            .strip_prefix(self.key_name_prefix.as_str())
            .and_then(|rest| rest.strip_prefix(".Roaming."))
    }
}

mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

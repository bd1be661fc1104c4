//! Algorithm configuration
//!
//! Optional YAML file restricting or reordering the ciphers, key exchanges,
//! MACs and host key algorithms offered during the SSH handshake. Mostly
//! useful for reaching servers that only speak legacy algorithms.
//!
//! ```yaml
//! Ciphers: [aes128-cbc, aes128-ctr]
//! KexAlgos: [diffie-hellman-group1-sha1]
//! ```
//!
//! Lists left out of the file keep the library defaults.

use std::borrow::Cow;
use std::path::Path;

use russh::keys::Algorithm;
use russh::{cipher, kex, mac, Preferred};
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::{JmsToolError, Result};

/// Algorithm name lists read from the config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AlgorithmConfig {
    /// Symmetric ciphers, most preferred first
    #[serde(rename = "Ciphers", default, deserialize_with = "null_as_empty")]
    pub ciphers: Vec<String>,

    /// Key exchange algorithms
    #[serde(rename = "KexAlgos", default, deserialize_with = "null_as_empty")]
    pub kex_algos: Vec<String>,

    /// Message authentication codes
    #[serde(rename = "MACs", default, deserialize_with = "null_as_empty")]
    pub macs: Vec<String>,

    /// Host key algorithms
    #[serde(rename = "HostKeyAlgos", default, deserialize_with = "null_as_empty")]
    pub host_key_algos: Vec<String>,
}

impl AlgorithmConfig {
    /// Read and parse a config file
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            JmsToolError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml(&raw)?;
        debug!("from config {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Parse the YAML document
    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
            .map_err(|e| JmsToolError::config(format!("invalid algorithm config: {e}")))
    }

    /// Build the handshake preferences
    ///
    /// Each empty list falls back to the library default; non-empty lists
    /// replace it in the given order. Unknown names are rejected.
    pub fn to_preferred(&self) -> Result<Preferred> {
        let defaults = Preferred::default();

        let kex = resolve("KexAlgos", &self.kex_algos, &defaults.kex, |name| {
            kex::Name::try_from(name)
                .ok()
                .or_else(|| CLIENT_KEX_MARKERS.iter().copied().find(|m| m.as_ref() == name))
        })?;
        let kex = with_client_markers(kex);
        let key = resolve("HostKeyAlgos", &self.host_key_algos, &defaults.key, |name| {
            name.parse::<Algorithm>().ok()
        })?;
        let cipher = resolve("Ciphers", &self.ciphers, &defaults.cipher, |name| {
            cipher::Name::try_from(name).ok()
        })?;
        let mac = resolve("MACs", &self.macs, &defaults.mac, |name| {
            mac::Name::try_from(name).ok()
        })?;

        Ok(Preferred {
            kex,
            key,
            cipher,
            mac,
            ..defaults
        })
    }
}

/// Pseudo-algorithms announcing client extensions; they must stay in the kex
/// list or the server omits `server-sig-algs` and strict key exchange
const CLIENT_KEX_MARKERS: [kex::Name; 2] = [
    kex::EXTENSION_SUPPORT_AS_CLIENT,
    kex::EXTENSION_OPENSSH_STRICT_KEX_AS_CLIENT,
];

fn with_client_markers(kex: Cow<'static, [kex::Name]>) -> Cow<'static, [kex::Name]> {
    if CLIENT_KEX_MARKERS.iter().all(|m| kex.contains(m)) {
        return kex;
    }

    let mut names = kex.into_owned();
    for marker in CLIENT_KEX_MARKERS {
        if !names.contains(&marker) {
            names.push(marker);
        }
    }
    Cow::Owned(names)
}

fn resolve<T, F>(
    field: &str,
    names: &[String],
    default: &Cow<'static, [T]>,
    lookup: F,
) -> Result<Cow<'static, [T]>>
where
    T: Clone,
    F: Fn(&str) -> Option<T>,
{
    if names.is_empty() {
        return Ok(default.clone());
    }

    names
        .iter()
        .map(|name| {
            lookup(name.trim()).ok_or_else(|| {
                JmsToolError::config(format!("unsupported algorithm in {field}: {name}"))
            })
        })
        .collect::<Result<Vec<T>>>()
        .map(Cow::Owned)
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

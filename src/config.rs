//! Configuration management for proofchain

use crate::miner::{DEFAULT_DIFFICULTY, MAX_DIFFICULTY};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub miner: MinerConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Peers registered at startup, one `url,ip,location` triple each.
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            bootstrap_peers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinerConfig {
    /// Reward recipient; a fresh node id is generated when unset.
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,
    /// Cap on proof candidates per mined block. Unbounded when unset.
    #[serde(default)]
    pub max_iterations: Option<u64>,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            address: None,
            difficulty: default_difficulty(),
            max_iterations: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsensusConfig {
    #[serde(default = "default_peer_timeout_secs")]
    pub peer_timeout_secs: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            peer_timeout_secs: default_peer_timeout_secs(),
        }
    }
}

fn default_api_port() -> u16 {
    5000
}

fn default_difficulty() -> usize {
    DEFAULT_DIFFICULTY
}

fn default_peer_timeout_secs() -> u64 {
    5
}

impl Config {
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.miner.difficulty == 0 || self.miner.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Invalid(format!(
                "miner.difficulty must be between 1 and {}",
                MAX_DIFFICULTY
            )));
        }
        if self.miner.max_iterations == Some(0) {
            return Err(ConfigError::Invalid("miner.max_iterations must be positive".to_string()));
        }
        if matches!(&self.miner.address, Some(a) if a.trim().is_empty()) {
            return Err(ConfigError::Invalid("miner.address must not be blank".to_string()));
        }
        if self.consensus.peer_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "consensus.peer_timeout_secs must be positive".to_string(),
            ));
        }
        for peer in &self.network.bootstrap_peers {
            parse_peer(peer)?;
        }
        Ok(())
    }
}

/// Split a `url,ip,location` peer entry.
pub fn parse_peer(entry: &str) -> Result<(String, String, String), ConfigError> {
    let parts: Vec<&str> = entry.split(',').map(str::trim).collect();
    match parts.as_slice() {
        [url, ip, location] if !url.is_empty() && !ip.is_empty() => {
            Ok((url.to_string(), ip.to_string(), location.to_string()))
        }
        _ => Err(ConfigError::Invalid(format!(
            "peer `{}` must be written as url,ip,location",
            entry
        ))),
    }
}

/// Load `path`, falling back to defaults when the file does not exist.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let config_str = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Config::from_toml(&config_str)
}

pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.network.api_port, 5000);
        assert_eq!(config.miner.difficulty, DEFAULT_DIFFICULTY);
        assert!(config.miner.address.is_none());
        assert_eq!(config.consensus.peer_timeout_secs, 5);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[network]
api_port = 5001
bootstrap_peers = ["http://127.0.0.1:5002,127.0.0.1,Cardiff"]

[miner]
address = "miner-a"
difficulty = 4
max_iterations = 1000000
"#
        )
        .unwrap();

        let config = load_config_from(file.path()).unwrap();
        assert_eq!(config.network.api_port, 5001);
        assert_eq!(config.network.bootstrap_peers.len(), 1);
        assert_eq!(config.miner.address.as_deref(), Some("miner-a"));
        assert_eq!(config.miner.difficulty, 4);
        assert_eq!(config.miner.max_iterations, Some(1_000_000));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            Config::from_toml("[miner]\ndifficulty = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_toml("[miner]\ndifficulty = 65"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_toml("[network]\nbootstrap_peers = [\"nope\"]"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(Config::from_toml("[network"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_parse_peer() {
        let (url, ip, location) = parse_peer("http://a:1, 10.0.0.1 ,Leeds").unwrap();
        assert_eq!(url, "http://a:1");
        assert_eq!(ip, "10.0.0.1");
        assert_eq!(location, "Leeds");
        assert!(parse_peer("http://a:1,10.0.0.1").is_err());
    }
}

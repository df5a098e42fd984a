use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use config::{Config, ConfigError, Environment, File};

use crate::consensus::pow::MAX_DIFFICULTY;
use crate::core::block::{GENESIS_PREVIOUS_HASH, GENESIS_PROOF};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerConfig {
    pub ledger: ChainConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainConfig {
    /// Leading zero hex digits required of each proof
    pub difficulty: u32,
    pub genesis_proof: u64,
    /// Sentinel stored as the genesis block's previous_hash
    pub genesis_previous_hash: String,
    /// Upper bound on proof candidates per seal; unbounded when absent
    #[serde(default)]
    pub max_pow_iterations: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    pub db_path: String,
    /// Keep the chain in memory only when false
    pub persist: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            ledger: ChainConfig {
                difficulty: 4,
                genesis_proof: GENESIS_PROOF,
                genesis_previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
                max_pow_iterations: None,
            },
            storage: StorageConfig {
                db_path: "./sealchain_data".to_string(),
                persist: true,
            },
        }
    }
}

impl LedgerConfig {
    /// In-memory ledger with the given difficulty (tests, demos)
    pub fn in_memory(difficulty: u32) -> Self {
        let mut config = Self::default();
        config.ledger.difficulty = difficulty;
        config.storage.persist = false;
        config
    }

    /// Load configuration from file (with optional environment variable overrides)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::build(Some(path.as_ref()), Self::environment())
    }

    /// `SEALCHAIN_*` variables, nested keys split on `__`
    /// (e.g. SEALCHAIN_LEDGER__DIFFICULTY=2)
    fn environment() -> Environment {
        Environment::with_prefix("SEALCHAIN")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// Layer defaults, then the file when given, then the environment
    fn build(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder.add_source(env).build()?.try_deserialize()
    }

    /// Load configuration with CLI overrides
    pub fn load_with_overrides(
        config_file: Option<String>,
        db_path: Option<String>,
        difficulty: Option<u32>,
        in_memory: bool,
    ) -> Result<Self, ConfigError> {
        let path = config_file
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("sealchain.toml")).filter(|p| p.exists()));
        let mut config = Self::build(path.as_deref(), Self::environment())?;

        if let Some(path) = db_path {
            config.storage.db_path = path;
        }
        if let Some(difficulty) = difficulty {
            config.ledger.difficulty = difficulty;
        }
        if in_memory {
            config.storage.persist = false;
        }

        config.validate().map_err(ConfigError::Message)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, toml_string)
    }

    /// Validate configuration for sanity
    pub fn validate(&self) -> Result<(), String> {
        if self.ledger.difficulty > MAX_DIFFICULTY {
            return Err(format!(
                "Difficulty must be <= {} (digest has {} hex chars)",
                MAX_DIFFICULTY, MAX_DIFFICULTY
            ));
        }
        if self.ledger.genesis_previous_hash.is_empty() {
            return Err("Genesis previous_hash sentinel must not be empty".into());
        }
        if self.ledger.max_pow_iterations == Some(0) {
            return Err("max_pow_iterations must be > 0 when set".into());
        }
        if self.storage.persist && self.storage.db_path.trim().is_empty() {
            return Err("db_path must be set when persistence is enabled".into());
        }
        Ok(())
    }

    pub fn print_effective_config(&self) {
        tracing::info!("Ledger configuration:");
        tracing::info!("  Difficulty: {}", self.ledger.difficulty);
        tracing::info!("  Genesis proof: {}", self.ledger.genesis_proof);
        tracing::info!("  Genesis sentinel: {:?}", self.ledger.genesis_previous_hash);
        tracing::info!("  PoW iteration cap: {:?}", self.ledger.max_pow_iterations);
        if self.storage.persist {
            tracing::info!("  DB Path: {}", self.storage.db_path);
        } else {
            tracing::info!("  Storage: in-memory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ledger.difficulty, 4);
        assert_eq!(config.ledger.genesis_proof, 100);
        assert_eq!(config.ledger.genesis_previous_hash, "1");
    }

    #[test]
    fn test_rejects_unsatisfiable_difficulty() {
        let mut config = LedgerConfig::default();
        config.ledger.difficulty = 65;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sealchain.toml");
        let mut config = LedgerConfig::in_memory(2);
        config.ledger.max_pow_iterations = Some(50_000);
        config.save(&path).unwrap();

        let loaded = LedgerConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_cli_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        LedgerConfig::default().save(&path).unwrap();

        let config = LedgerConfig::load_with_overrides(
            Some(path.to_string_lossy().into_owned()),
            Some("/tmp/elsewhere".into()),
            Some(1),
            true,
        )
        .unwrap();
        assert_eq!(config.storage.db_path, "/tmp/elsewhere");
        assert_eq!(config.ledger.difficulty, 1);
        assert!(!config.storage.persist);
    }

    #[test]
    fn test_environment_overrides_without_file() {
        let vars = config::Map::from([
            ("SEALCHAIN_LEDGER__DIFFICULTY".to_string(), "2".to_string()),
            ("SEALCHAIN_STORAGE__DB_PATH".to_string(), "/var/lib/sealchain".to_string()),
        ]);
        let env = LedgerConfig::environment().source(Some(vars));

        let config = LedgerConfig::build(None, env).unwrap();
        assert_eq!(config.ledger.difficulty, 2);
        assert_eq!(config.storage.db_path, "/var/lib/sealchain");
        assert_eq!(config.ledger.genesis_proof, 100);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[ledger]\ndifficulty = 2\n").unwrap();

        let env = LedgerConfig::environment().source(Some(config::Map::new()));
        let config = LedgerConfig::build(Some(&path), env).unwrap();
        assert_eq!(config.ledger.difficulty, 2);
        assert_eq!(config.ledger.genesis_proof, 100);
        assert_eq!(config.ledger.genesis_previous_hash, "1");
        assert_eq!(config.ledger.max_pow_iterations, None);
        assert_eq!(config.storage, LedgerConfig::default().storage);
    }
}

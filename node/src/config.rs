use anyhow::{bail, Result};
use config::{Config, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use vnc_consensus::ConsensusConfig;

/// Node configuration: devnet layout, observability and the embedded
/// consensus parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Number of in-process validators to run.
    pub validators: usize,
    pub data_dir: PathBuf,
    /// Keep all state in memory instead of one sled database per validator.
    pub ephemeral: bool,

    pub log_level: String,
    pub log_format: String,

    pub prometheus_enabled: bool,
    pub metrics_addr: String,

    /// Submit faucet transfers every block interval.
    pub demo_load: bool,
    pub demo_recipients: usize,
    pub faucet_balance_tokens: u64,
    pub status_interval_secs: u64,

    pub consensus: ConsensusConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            validators: 4,
            data_dir: PathBuf::from("./data/devnet"),
            ephemeral: false,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            prometheus_enabled: true,
            metrics_addr: "127.0.0.1:9898".to_string(),
            demo_load: false,
            demo_recipients: 8,
            faucet_balance_tokens: 1_000_000,
            status_interval_secs: 10,
            consensus: ConsensusConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Defaults, then the optional TOML file, then `VNC_*` variables
    /// (`VNC_CONSENSUS__CHAIN_ID` reaches nested keys).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, Environment::with_prefix("VNC"))
    }

    fn load_with(path: Option<&Path>, environment: Environment) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                bail!(
                    "Configuration file {} not found (specified via --config)",
                    path.display()
                );
            }
            builder = builder.add_source(ConfigFile::from(path));
        }

        builder = builder.add_source(environment.prefix_separator("_").separator("__"));

        let config: NodeConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, matches: &clap::ArgMatches) {
        if let Some(validators) = matches.get_one::<usize>("validators") {
            self.validators = *validators;
        }

        if let Some(data_dir) = matches.get_one::<String>("data-dir") {
            self.data_dir = PathBuf::from(data_dir);
        }

        if let Some(log_level) = matches.get_one::<String>("log-level") {
            self.log_level = log_level.clone();
        }

        if let Some(log_format) = matches.get_one::<String>("log-format") {
            self.log_format = log_format.clone();
        }

        if matches.get_flag("ephemeral") {
            self.ephemeral = true;
        }

        if matches.get_flag("demo-load") {
            self.demo_load = true;
        }

        if matches.get_flag("disable-metrics") {
            self.prometheus_enabled = false;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.consensus.validate()?;

        if self.validators == 0 {
            bail!("at least one validator is required");
        }
        if self.validators > self.consensus.max_validators {
            bail!(
                "{} validators exceed the configured maximum of {}",
                self.validators,
                self.consensus.max_validators
            );
        }
        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            bail!("unknown log format '{}'; expected pretty or json", self.log_format);
        }
        if self.demo_load && self.demo_recipients == 0 {
            bail!("demo load needs at least one recipient");
        }
        if self.prometheus_enabled {
            self.metrics_addr.parse::<SocketAddr>()?;
        }
        Ok(())
    }

    pub fn validator_dir(&self, index: usize) -> PathBuf {
        self.data_dir.join(format!("validator-{index}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use vnc_consensus::ProposerPolicy;
    use vnc_types::Amount;

    fn no_env() -> Environment {
        Environment::with_prefix("VNC").source(Some(config::Map::new()))
    }

    #[test]
    fn defaults_without_file_or_environment() {
        let config = NodeConfig::load_with(None, no_env()).unwrap();
        assert_eq!(config.validators, 4);
        assert_eq!(config.consensus, ConsensusConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn toml_file_overrides_nested_consensus_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("node.toml");
        fs::write(
            &path,
            r#"
validators = 7
demo_load = true

[consensus]
chain_id = 99
block_interval_ms = 500
min_validator_stake = "2500"
proposer_policy = "stake_weighted"
"#,
        )
        .unwrap();

        let config = NodeConfig::load_with(Some(&path), no_env()).unwrap();
        assert_eq!(config.validators, 7);
        assert!(config.demo_load);
        assert_eq!(config.consensus.chain_id, 99);
        assert_eq!(config.consensus.block_interval_ms, 500);
        assert_eq!(config.consensus.min_validator_stake, Amount::from(2500));
        assert_eq!(config.consensus.proposer_policy, ProposerPolicy::StakeWeighted);
        assert_eq!(config.consensus.max_validators, ConsensusConfig::default().max_validators);
    }

    #[test]
    fn environment_wins_over_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("node.toml");
        fs::write(&path, "validators = 7\n").unwrap();

        let mut vars = config::Map::new();
        vars.insert("VNC_VALIDATORS".to_string(), "2".to_string());
        vars.insert("VNC_CONSENSUS__CHAIN_ID".to_string(), "5".to_string());
        let environment = Environment::with_prefix("VNC").source(Some(vars));

        let config = NodeConfig::load_with(Some(&path), environment).unwrap();
        assert_eq!(config.validators, 2);
        assert_eq!(config.consensus.chain_id, 5);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(NodeConfig::load_with(Some(&path), no_env()).is_err());
    }

    #[test]
    fn validation_rejects_bad_layouts() {
        let mut config = NodeConfig {
            validators: 0,
            ..NodeConfig::default()
        };
        assert!(config.validate().is_err());

        config.validators = config.consensus.max_validators + 1;
        assert!(config.validate().is_err());

        config.validators = 3;
        config.log_format = "xml".to_string();
        assert!(config.validate().is_err());

        config.log_format = "json".to_string();
        config.consensus.block_interval_ms = 0;
        assert!(config.validate().is_err());
    }
}

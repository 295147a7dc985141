use std::path::{Path, PathBuf};
use std::time::Duration;

use cardlink_apdu_core::ExecutorConfig;
use cardlink_apdu_core::executor::DEFAULT_MAX_GET_RESPONSE_CHAIN;
use cardlink_transport_pcsc::{DEFAULT_POLL_TIMEOUT, PcscConfig, Scope, ShareMode};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

/// Prefix of environment variables overriding the config file
const ENV_PREFIX: &str = "CARDLINK_";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScopeSetting {
    #[default]
    User,
    Terminal,
    System,
}

impl From<ScopeSetting> for Scope {
    fn from(scope: ScopeSetting) -> Self {
        match scope {
            ScopeSetting::User => Self::User,
            ScopeSetting::Terminal => Self::Terminal,
            ScopeSetting::System => Self::System,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShareModeSetting {
    Exclusive,
    #[default]
    Shared,
    Direct,
}

impl From<ShareModeSetting> for ShareMode {
    fn from(mode: ShareModeSetting) -> Self {
        match mode {
            ShareModeSetting::Exclusive => Self::Exclusive,
            ShareModeSetting::Shared => Self::Shared,
            ShareModeSetting::Direct => Self::Direct,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    /// Reader used when `--reader` is not given
    pub reader: Option<String>,
    pub scope: ScopeSetting,
    pub share_mode: ShareModeSetting,
    pub poll_timeout_ms: u64,
    pub max_get_response_chain: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            reader: None,
            scope: ScopeSetting::default(),
            share_mode: ShareModeSetting::default(),
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT.as_millis() as u64,
            max_get_response_chain: DEFAULT_MAX_GET_RESPONSE_CHAIN,
        }
    }
}

impl CliConfig {
    pub fn pcsc_config(&self) -> PcscConfig {
        PcscConfig::new()
            .with_scope(self.scope.into())
            .with_share_mode(self.share_mode.into())
            .with_poll_timeout(Duration::from_millis(self.poll_timeout_ms))
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig::default().with_max_get_response_chain(self.max_get_response_chain)
    }
}

/// Default location of the config file, `~/.cardlink/cardlink.toml`
pub fn default_config_path() -> Option<PathBuf> {
    std::env::home_dir().map(|home| home.join(".cardlink").join("cardlink.toml"))
}

fn figment(path: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(CliConfig::default()));
    if let Some(path) = path.map(Path::to_path_buf).or_else(default_config_path) {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(Env::prefixed(ENV_PREFIX))
}

/// Load the configuration: defaults, then the TOML file, then environment
pub fn load_config(path: Option<&Path>) -> eyre::Result<CliConfig> {
    if let Some(path) = path {
        eyre::ensure!(path.exists(), "config file {} not found", path.display());
    }
    Ok(figment(path).extract()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: CliConfig = Figment::from(Serialized::defaults(CliConfig::default()))
            .extract()
            .unwrap();
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.pcsc_config().poll_timeout, DEFAULT_POLL_TIMEOUT);
        assert_eq!(
            config.executor_config().max_get_response_chain,
            DEFAULT_MAX_GET_RESPONSE_CHAIN
        );
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config: CliConfig = Figment::from(Serialized::defaults(CliConfig::default()))
            .merge(Toml::string(
                r#"
                reader = "ACS ACR1252 1S CL Reader PICC 0"
                scope = "system"
                share_mode = "exclusive"
                poll_timeout_ms = 250
                "#,
            ))
            .extract()
            .unwrap();

        assert_eq!(config.reader.as_deref(), Some("ACS ACR1252 1S CL Reader PICC 0"));
        assert_eq!(config.max_get_response_chain, DEFAULT_MAX_GET_RESPONSE_CHAIN);

        let pcsc = config.pcsc_config();
        assert_eq!(pcsc.scope, Scope::System);
        assert_eq!(pcsc.share_mode, ShareMode::Exclusive);
        assert_eq!(pcsc.poll_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/cardlink.toml"))).is_err());
    }
}

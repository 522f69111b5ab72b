use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::infrastructure::ethereum::{ProviderConfig, WalletSettings};

pub const DEFAULT_RPC: &str = "http://localhost:8545";
pub const DEFAULT_CONTRACT: &str = "0x5E03BF9F6cD680C45A6f07Fde7EDd394cb573c03";

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub name: Option<String>,
    pub rpc: Option<String>,
    pub ws: Option<String>,
    pub ipc: Option<String>,
}

impl EndpointConfig {
    /// First transport set on this entry, in rpc / ws / ipc order
    pub fn provider_config(&self) -> Option<ProviderConfig> {
        if let Some(rpc) = non_empty(&self.rpc) {
            return Some(ProviderConfig::Http(rpc));
        }
        if let Some(ws) = non_empty(&self.ws) {
            return Some(ProviderConfig::WebSocket(ws));
        }
        non_empty(&self.ipc).and_then(ipc_config)
    }
}

#[cfg(unix)]
fn ipc_config(path: String) -> Option<ProviderConfig> {
    Some(ProviderConfig::Ipc(PathBuf::from(path)))
}

#[cfg(not(unix))]
fn ipc_config(_path: String) -> Option<ProviderConfig> {
    None
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub contract: Option<String>,

    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,

    #[serde(default = "default_account_poll_ms")]
    pub account_poll_ms: u64,

    #[serde(default = "default_confirmations")]
    pub confirmations: u64,

    pub confirmation_timeout_secs: Option<u64>,

    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            contract: None,
            endpoints: Vec::new(),
            account_poll_ms: default_account_poll_ms(),
            confirmations: default_confirmations(),
            confirmation_timeout_secs: None,
            log_filter: None,
        }
    }
}

fn default_account_poll_ms() -> u64 {
    1000
}

fn default_confirmations() -> u64 {
    1
}

impl Config {
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn endpoints(&self) -> Vec<ProviderConfig> {
        self.endpoints
            .iter()
            .filter_map(EndpointConfig::provider_config)
            .collect()
    }

    pub fn contract_or_default(&self) -> String {
        non_empty(&self.contract).unwrap_or_else(|| DEFAULT_CONTRACT.to_string())
    }

    pub fn wallet_settings(&self) -> WalletSettings {
        WalletSettings {
            poll_interval: Duration::from_millis(self.account_poll_ms.max(50)),
            confirmations: self.confirmations.max(1),
            timeout: self.confirmation_timeout_secs.map(Duration::from_secs),
        }
    }
}

pub fn load() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => return Config::default(),
    };
    Config::parse(&content).unwrap_or_default()
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("ROLLCALL_CONFIG").map(PathBuf::from) {
        return Some(path);
    }
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from) {
        return Some(xdg.join("rollcall").join("config.toml"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        return Some(home.join(".config").join("rollcall").join("config.toml"));
    }

    directories::ProjectDirs::from("io", "rollcall", "rollcall")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

pub fn data_dir() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").map(PathBuf::from) {
        return Some(xdg.join("rollcall"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        return Some(home.join(".local").join("share").join("rollcall"));
    }
    directories::ProjectDirs::from("io", "rollcall", "rollcall")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

pub fn log_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("rollcall.log"))
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(
            r#"
            contract = "0x0000000000000000000000000000000000000001"
            account_poll_ms = 250
            confirmations = 2
            confirmation_timeout_secs = 90
            log_filter = "rollcall=debug"

            [[endpoints]]
            name = "anvil"
            rpc = "http://127.0.0.1:8545"

            [[endpoints]]
            name = "sepolia-ws"
            ws = "wss://example.invalid/ws"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.contract_or_default(),
            "0x0000000000000000000000000000000000000001"
        );
        assert_eq!(
            config.endpoints(),
            vec![
                ProviderConfig::Http("http://127.0.0.1:8545".into()),
                ProviderConfig::WebSocket("wss://example.invalid/ws".into()),
            ]
        );
        let wallet = config.wallet_settings();
        assert_eq!(wallet.poll_interval, Duration::from_millis(250));
        assert_eq!(wallet.confirmations, 2);
        assert_eq!(wallet.timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.log_filter.as_deref(), Some("rollcall=debug"));
    }

    #[test]
    fn test_defaults_when_keys_missing() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.contract_or_default(), DEFAULT_CONTRACT);
        assert!(config.endpoints().is_empty());
        assert_eq!(config.account_poll_ms, 1000);
        assert_eq!(config.confirmations, 1);
        assert!(config.wallet_settings().timeout.is_none());
    }

    #[test]
    fn test_endpoint_without_transport_is_skipped() {
        let config = Config::parse(
            r#"
            [[endpoints]]
            name = "empty"
            rpc = "  "
            "#,
        )
        .unwrap();
        assert!(config.endpoints().is_empty());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        assert!(Config::parse("endpoints = 3").is_err());
    }
}

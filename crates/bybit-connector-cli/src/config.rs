/*
[INPUT]:  YAML configuration file, BYBIT_API_KEY / BYBIT_API_SECRET
[OUTPUT]: Client and stream configurations for the connector
[POS]:    Configuration layer - CLI setup
[UPDATE]: When adding new configuration options
*/

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use bybit_connector::{
    ClientConfig, Credentials, Market, PositionMode, StreamConfig, Subscription,
};
use serde::{Deserialize, Serialize};

/// Top-level CLI configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CliConfig {
    #[serde(default)]
    pub market: Market,
    #[serde(default)]
    pub testnet: bool,
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub stream: StreamSection,
}

/// REST client settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientSection {
    /// Overrides the market's REST host
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_recv_window")]
    pub recv_window: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub force_retry: bool,
    #[serde(default)]
    pub ignore_codes: Vec<i64>,
    #[serde(default)]
    pub log_requests: bool,
    #[serde(default)]
    pub referral_id: Option<String>,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout_secs(),
            recv_window: default_recv_window(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            force_retry: false,
            ignore_codes: Vec::new(),
            log_requests: false,
            referral_id: None,
        }
    }
}

/// Streaming session settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamSection {
    /// Overrides the market's stream URL
    #[serde(default)]
    pub url: Option<String>,
    /// Connect to the private endpoint and authenticate
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_ping_timeout_secs")]
    pub ping_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub restart_on_error: bool,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_max_data_length")]
    pub max_data_length: usize,
    #[serde(default)]
    pub position_mode: PositionMode,
    #[serde(default)]
    pub consume_on_read: HashMap<String, bool>,
    /// How often `stream` prints fetched topic data
    #[serde(default = "default_print_interval_secs")]
    pub print_interval_secs: u64,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            url: None,
            private: false,
            subscriptions: Vec::new(),
            ping_interval_secs: default_ping_interval_secs(),
            ping_timeout_secs: default_ping_timeout_secs(),
            restart_on_error: true,
            max_reconnect_attempts: default_max_reconnect_attempts(),
            max_data_length: default_max_data_length(),
            position_mode: PositionMode::default(),
            consume_on_read: HashMap::new(),
            print_interval_secs: default_print_interval_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_recv_window() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    3000
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_ping_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_max_data_length() -> usize {
    200
}

fn default_print_interval_secs() -> u64 {
    5
}

impl CliConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("parse config yaml")
    }

    pub fn client_config(&self) -> ClientConfig {
        let client = &self.client;
        ClientConfig {
            timeout: Duration::from_secs(client.timeout_secs),
            recv_window: client.recv_window,
            max_retries: client.max_retries,
            retry_delay: Duration::from_millis(client.retry_delay_ms),
            force_retry: client.force_retry,
            ignore_codes: client.ignore_codes.iter().copied().collect::<HashSet<_>>(),
            log_requests: client.log_requests,
            referral_id: client.referral_id.clone(),
            ..ClientConfig::default()
        }
    }

    /// Stream configuration; private streams require `credentials`.
    pub fn stream_config(&self, credentials: Option<Credentials>) -> Result<StreamConfig> {
        let stream = &self.stream;
        let mut config = StreamConfig::for_market(self.market, stream.private, self.testnet);
        if let Some(url) = &stream.url {
            config.url = url.clone();
        }
        config = config
            .subscriptions(stream.subscriptions.iter().cloned())
            .ping_interval(Duration::from_secs(stream.ping_interval_secs))
            .ping_timeout(Duration::from_secs(stream.ping_timeout_secs))
            .restart_on_error(stream.restart_on_error)
            .max_reconnect_attempts(stream.max_reconnect_attempts)
            .max_data_length(stream.max_data_length)
            .position_mode(stream.position_mode);

        for (topic, consume) in &stream.consume_on_read {
            config = config.consume_on_read(topic.clone(), *consume);
        }

        if stream.private {
            let credentials = credentials
                .context("private stream requires BYBIT_API_KEY and BYBIT_API_SECRET")?;
            config = config.credentials(credentials);
        }
        Ok(config)
    }
}

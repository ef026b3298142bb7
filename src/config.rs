use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::enums::{ Network, SubscriptionDuration };

pub const DEFAULT_RECEIVER_ADDRESS: &str = "0x30B0D5758c79645Eb925825E1Ee8A2c448812F37";

/// Per-network configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub network: Network,
    pub rpc_urls: Vec<String>,
    pub explorer_url: String,
    pub chain_id: u64,
    pub native_symbol: String,
}

impl NetworkConfig {
    pub fn new(network: Network, rpc_urls: Vec<String>) -> Self {
        Self {
            network,
            rpc_urls,
            explorer_url: network.explorer_url().to_string(),
            chain_id: network.chain_id(),
            native_symbol: network.native_symbol().to_string(),
        }
    }

    pub fn tx_explorer_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url, tx_hash)
    }
}

/// Static table of the networks payments are accepted on, keyed by chain id.
#[derive(Debug, Clone, Default)]
pub struct NetworkTable {
    by_chain_id: HashMap<u64, NetworkConfig>,
}

impl NetworkTable {
    pub fn new(configs: impl IntoIterator<Item = NetworkConfig>) -> Self {
        Self {
            by_chain_id: configs
                .into_iter()
                .map(|c| (c.chain_id, c))
                .collect(),
        }
    }

    pub fn lookup(&self, chain_id: u64) -> Option<&NetworkConfig> {
        self.by_chain_id.get(&chain_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkConfig> {
        self.by_chain_id.values()
    }

    pub fn is_empty(&self) -> bool {
        self.by_chain_id.is_empty()
    }
}

/// Where and how much a subscription costs.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub receiver_address: String,
    /// Native-unit decimal strings. Independent of each other.
    pub month_price: String,
    pub year_price: String,
}

impl PaymentConfig {
    pub fn price(&self, duration: SubscriptionDuration) -> &str {
        match duration {
            SubscriptionDuration::Month => &self.month_price,
            SubscriptionDuration::Year => &self.year_price,
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            receiver_address: DEFAULT_RECEIVER_ADDRESS.to_string(),
            month_price: "0.01".to_string(),
            year_price: "0.10".to_string(),
        }
    }
}

/// Intervals of the background jobs and the client-side watcher.
#[derive(Debug, Clone)]
pub struct JobIntervals {
    pub pending_sweep: Duration,
    pub expiry_sweep: Duration,
    pub cleanup_sweep: Duration,
    pub retention: chrono::Duration,
    pub watch_interval: Duration,
    pub watch_lifetime: Duration,
    pub cache_ttl: Duration,
}

impl Default for JobIntervals {
    fn default() -> Self {
        Self {
            pending_sweep: Duration::from_secs(5 * 60),
            expiry_sweep: Duration::from_secs(24 * 60 * 60),
            cleanup_sweep: Duration::from_secs(24 * 60 * 60),
            retention: chrono::Duration::days(7),
            watch_interval: Duration::from_secs(30),
            watch_lifetime: Duration::from_secs(30 * 60),
            cache_ttl: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// Admin endpoints are disabled when unset
    pub admin_address: Option<String>,
    pub payment: PaymentConfig,
    pub networks: NetworkTable,
    pub intervals: JobIntervals,
    pub telegram_bot_token: Option<String>,
    pub payer_private_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv::dotenv().ok();

        let database_url = env::var("DATABASE_URL")?;

        let defaults = PaymentConfig::default();
        let receiver_address = env
            ::var("RECEIVER_ADDRESS")
            .unwrap_or_else(|_| defaults.receiver_address.clone());
        if receiver_address.parse::<ethers::types::Address>().is_err() {
            return Err("RECEIVER_ADDRESS must be a valid EVM address".into());
        }

        let month_price = env::var("MONTH_PRICE").unwrap_or(defaults.month_price);
        let year_price = env::var("YEAR_PRICE").unwrap_or(defaults.year_price);
        for (key, price) in [("MONTH_PRICE", &month_price), ("YEAR_PRICE", &year_price)] {
            ethers::utils
                ::parse_ether(price)
                .map_err(|_| format!("{} must be a decimal ETH amount", key))?;
        }

        let admin_address = env
            ::var("ADMIN_ADDRESS")
            .ok()
            .filter(|a| !a.trim().is_empty());
        if let Some(admin) = &admin_address {
            if admin.trim().parse::<ethers::types::Address>().is_err() {
                return Err("ADMIN_ADDRESS must be a valid EVM address".into());
            }
        }

        // Only networks with RPC URLs set are accepted for payment
        let mut network_configs = Vec::new();
        for &network in Network::all() {
            let rpc_key = format!("{}_RPC_URLS", network.as_str());
            let explorer_key = format!("{}_EXPLORER_URL", network.as_str());

            if let Ok(rpc_val) = env::var(&rpc_key) {
                let mut config = NetworkConfig::new(network, Self::parse_rpc_urls(&rpc_val)?);
                if let Ok(explorer_url) = env::var(&explorer_key) {
                    config.explorer_url = explorer_url;
                }
                network_configs.push(config);
            }
        }

        let networks = NetworkTable::new(network_configs);
        if networks.is_empty() {
            return Err("No network RPC URLs configured. Set at least one *_RPC_URLS env var.".into());
        }

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()?;

        let mut intervals = JobIntervals::default();
        intervals.pending_sweep = Self::secs_var("PENDING_SWEEP_SECS", intervals.pending_sweep)?;
        intervals.expiry_sweep = Self::secs_var("EXPIRY_SWEEP_SECS", intervals.expiry_sweep)?;
        intervals.cleanup_sweep = Self::secs_var("CLEANUP_SWEEP_SECS", intervals.cleanup_sweep)?;
        intervals.watch_interval = Self::secs_var("WATCH_INTERVAL_SECS", intervals.watch_interval)?;
        intervals.watch_lifetime = Self::secs_var("WATCH_LIFETIME_SECS", intervals.watch_lifetime)?;
        intervals.cache_ttl = Self::secs_var("CACHE_TTL_SECS", intervals.cache_ttl)?;

        let telegram_bot_token = env
            ::var("TELEGRAM_BOT_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());
        let payer_private_key = env
            ::var("PAYER_PRIVATE_KEY")
            .ok()
            .filter(|k| !k.is_empty());

        Ok(Config {
            database_url,
            server_host,
            server_port,
            admin_address,
            payment: PaymentConfig {
                receiver_address,
                month_price,
                year_price,
            },
            networks,
            intervals,
            telegram_bot_token,
            payer_private_key,
        })
    }

    fn parse_rpc_urls(urls_str: &str) -> Result<Vec<String>, Box<dyn std::error::Error>> {
        let urls: Vec<String> = urls_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if urls.is_empty() {
            return Err("RPC URLs list cannot be empty".into());
        }

        Ok(urls)
    }

    fn secs_var(key: &str, default: Duration) -> Result<Duration, Box<dyn std::error::Error>> {
        match env::var(key) {
            Ok(val) => Ok(Duration::from_secs(val.parse()?)),
            Err(_) => Ok(default),
        }
    }
}

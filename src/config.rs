use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use chrono::NaiveDate;
use ethers::types::Address;
use eyre::{Result, WrapErr, bail};

use crate::constants::*;

/// Outbound proxy captured once at startup and handed to every client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub url: String,
}

impl ProxyConfig {
    /// First non-empty of GLOBAL_AGENT_HTTPS_PROXY, HTTPS_PROXY, HTTP_PROXY.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        ["GLOBAL_AGENT_HTTPS_PROXY", "HTTPS_PROXY", "HTTP_PROXY"]
            .iter()
            .filter_map(|name| lookup(name))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
            .map(|url| ProxyConfig { url })
    }
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub retries: u32,
    pub initial_backoff: Duration,
    pub requests_per_second: u32,
    pub user_agent: String,
    pub proxy: Option<ProxyConfig>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_HTTP_TIMEOUT_MS),
            retries: DEFAULT_HTTP_RETRIES,
            initial_backoff: Duration::from_millis(DEFAULT_HTTP_BACKOFF_MS),
            requests_per_second: DEFAULT_HTTP_REQUESTS_PER_SECOND,
            user_agent: USER_AGENT.to_string(),
            proxy: None,
        }
    }
}

/// Identifiers of the reference asset on each price feed.
#[derive(Debug, Clone)]
pub struct ReferenceAssetIds {
    pub coingecko_coin_id: String,
    pub cryptocompare_symbol: String,
    pub binance_symbol: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_urls: Vec<String>,
    pub pool_logic_address: Address,
    pub chainlink_btc_usd_feed: Address,
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub token_price_start_date: NaiveDate,
    pub price_series_start_date: NaiveDate,
    pub http: HttpSettings,
    pub reference_ids: ReferenceAssetIds,
    pub published_nav_wbtc_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // A missing .env file is fine, everything has a default or comes from the environment
        dotenv().ok();

        let primary_rpc = env_or("ARBITRUM_RPC", DEFAULT_ARBITRUM_RPC);
        let fallbacks = env::var("ARBITRUM_RPC_FALLBACKS")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ARBITRUM_FALLBACKS.join(","));
        let rpc_urls = rpc_sequence(&primary_rpc, &fallbacks);
        if rpc_urls.is_empty() {
            bail!("No RPC endpoints configured (ARBITRUM_RPC / ARBITRUM_RPC_FALLBACKS)");
        }

        let pool_logic_address = parse_address("POOL_LOGIC_ADDRESS", DEFAULT_POOL_LOGIC_ADDRESS)?;
        let chainlink_btc_usd_feed = parse_address("CHAINLINK_BTC_USD_FEED", DEFAULT_CHAINLINK_BTC_USD_FEED)?;

        let token_price_start_date = parse_date("TOKEN_PRICE_START_DATE")?;
        let price_series_start_date = parse_date("PRICE_SERIES_START_DATE")?;

        let http = HttpSettings {
            timeout: Duration::from_millis(parse_number("HTTP_TIMEOUT_MS", DEFAULT_HTTP_TIMEOUT_MS)?),
            retries: parse_number("HTTP_RETRIES", DEFAULT_HTTP_RETRIES)?,
            initial_backoff: Duration::from_millis(parse_number("HTTP_BACKOFF_MS", DEFAULT_HTTP_BACKOFF_MS)?),
            requests_per_second: parse_number("HTTP_REQUESTS_PER_SECOND", DEFAULT_HTTP_REQUESTS_PER_SECOND)?,
            user_agent: USER_AGENT.to_string(),
            proxy: ProxyConfig::from_env(),
        };

        Ok(Config {
            rpc_urls,
            pool_logic_address,
            chainlink_btc_usd_feed,
            data_dir: PathBuf::from(env_or("DATA_DIR", DEFAULT_DATA_DIR)),
            cache_dir: PathBuf::from(env_or("CACHE_DIR", DEFAULT_CACHE_DIR)),
            token_price_start_date,
            price_series_start_date,
            http,
            reference_ids: ReferenceAssetIds {
                coingecko_coin_id: env_or("COINGECKO_COIN_ID", DEFAULT_COINGECKO_COIN_ID),
                cryptocompare_symbol: env_or("CRYPTOCOMPARE_SYMBOL", DEFAULT_CRYPTOCOMPARE_SYMBOL),
                binance_symbol: env_or("BINANCE_SYMBOL", DEFAULT_BINANCE_SYMBOL),
            },
            published_nav_wbtc_url: env_or("PUBLISHED_NAV_WBTC_URL", DEFAULT_PUBLISHED_NAV_WBTC_URL),
        })
    }

    pub fn data_file(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }
}

/// Primary endpoint followed by the comma-separated fallbacks, blanks and repeats removed.
pub fn rpc_sequence(primary: &str, fallbacks: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for url in std::iter::once(primary).chain(fallbacks.split(',')) {
        let url = url.trim();
        if !url.is_empty() && !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    }
    urls
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_address(name: &str, default: &str) -> Result<Address> {
    let raw = env_or(name, default);
    Address::from_str(&raw).wrap_err_with(|| format!("Invalid address in {name}: {raw}"))
}

fn parse_date(name: &str) -> Result<NaiveDate> {
    let raw = env_or(name, DEFAULT_START_DATE);
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .wrap_err_with(|| format!("Invalid date in {name} (expected YYYY-MM-DD): {raw}"))
}

fn parse_number<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr + ToString,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = env_or(name, &default.to_string());
    raw.parse::<T>().wrap_err_with(|| format!("Invalid number in {name}: {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn rpc_sequence_keeps_order_and_drops_blanks_and_repeats() {
        let urls = rpc_sequence("https://a", " https://b , ,https://a,https://c ");
        assert_eq!(urls, vec!["https://a", "https://b", "https://c"]);
    }

    #[test]
    fn proxy_prefers_global_agent_then_https_then_http() {
        let vars: HashMap<&str, &str> = [("HTTPS_PROXY", "http://https-proxy:8080"), ("HTTP_PROXY", "http://http-proxy:8080")]
            .into_iter()
            .collect();
        let proxy = ProxyConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(proxy, Some(ProxyConfig { url: "http://https-proxy:8080".to_string() }));

        let blank: HashMap<&str, &str> = [("GLOBAL_AGENT_HTTPS_PROXY", "  ")].into_iter().collect();
        assert_eq!(ProxyConfig::from_lookup(|name| blank.get(name).map(|v| v.to_string())), None);
    }
}

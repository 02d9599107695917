use rust_decimal::Decimal;
use rust_decimal::dec;

// --- Chain ---
pub const DEFAULT_ARBITRUM_RPC: &str = "https://arb1.arbitrum.io/rpc";
pub const DEFAULT_ARBITRUM_FALLBACKS: [&str; 2] = [
    "https://arbitrum.rpc.subquery.network/public",
    "https://1rpc.io/arb",
];
pub const DEFAULT_POOL_LOGIC_ADDRESS: &str = "0xf8fba992f763d8b9a8f47a4c130c1a352c24c6a9";
pub const DEFAULT_CHAINLINK_BTC_USD_FEED: &str = "0x6ce185860a4963106506C203335A2910413708e9";
pub const NAV_DECIMALS: u32 = 18;

// --- Sanity check ---
pub const SANITY_TOLERANCE: Decimal = dec!(0.10);
pub const DAILY_SANITY_WINDOW: usize = 7;
pub const DAILY_SANITY_MIN_SAMPLES: usize = 3;
pub const HOURLY_SANITY_WINDOW: usize = 24;
pub const HOURLY_SANITY_MIN_SAMPLES: usize = 6;

// --- Backfill caps per run ---
pub const MAX_BACKFILL_DAYS: usize = 365;
pub const MAX_BACKFILL_HOURS: usize = 720;

// --- Persistence ---
pub const DEFAULT_DATA_DIR: &str = "public/data";
pub const DEFAULT_CACHE_DIR: &str = ".cache";
pub const DEFAULT_START_DATE: &str = "2025-07-23";
pub const DAILY_NAV_CSV: &str = "nav_tokenprice_usd_daily.csv";
pub const HOURLY_NAV_CSV: &str = "nav_tokenprice_usd_hourly.csv";
pub const DAILY_BTC_CSV: &str = "btc_usd_daily.csv";
pub const HOURLY_BTC_CSV: &str = "btc_usd_hourly.csv";
pub const DAILY_WBTC_CSV: &str = "wbtc_usd_daily.csv";
pub const DAILY_NAV_BTC_CSV: &str = "nav_btc_daily.csv";
pub const HOURLY_NAV_BTC_CSV: &str = "nav_btc_hourly.csv";
pub const DAILY_NAV_WBTC_CSV: &str = "nav_wbtc_daily.csv";
pub const NAV_COLUMN: &str = "token_price_usd";
pub const BTC_COLUMN: &str = "btc_usd";
pub const WBTC_COLUMN: &str = "wbtc_usd";
pub const NAV_PRECISION: u32 = 8;
pub const REFERENCE_PRECISION: usize = 2;

// --- HTTP ---
pub const USER_AGENT: &str = "fund-nav-pipeline/0.1 (+https://github.com)";
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_HTTP_RETRIES: u32 = 5;
pub const DEFAULT_HTTP_BACKOFF_MS: u64 = 250;
pub const DEFAULT_HTTP_REQUESTS_PER_SECOND: u32 = 2;
pub const FALLBACK_TRANSPORT_TIMEOUT_SECS: u64 = 20;

// --- Reference feeds ---
pub const COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";
pub const CRYPTOCOMPARE_API_BASE: &str = "https://min-api.cryptocompare.com/data/v2";
pub const BINANCE_API_BASE: &str = "https://api.binance.com/api/v3";
pub const DEFAULT_COINGECKO_COIN_ID: &str = "bitcoin";
pub const DEFAULT_CRYPTOCOMPARE_SYMBOL: &str = "BTC";
pub const DEFAULT_BINANCE_SYMBOL: &str = "BTCUSDT";
pub const DEFAULT_PUBLISHED_NAV_WBTC_URL: &str =
    "https://denissilantev64.github.io/VLHXBTC-dashboard/data/nav_wbtc_daily.csv";

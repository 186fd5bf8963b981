use crate::error::AnalyzerError;
use crate::models::InstrumentKind;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

// -----------------------------------------------
// NSE API ENDPOINTS
// -----------------------------------------------
pub const NSE_BASE_URL: &str = "https://www.nseindia.com";
pub const NSE_API_MARKET_STATUS: &str = "https://www.nseindia.com/api/marketStatus";

pub fn nse_quote_url(symbol: &str) -> String {
    format!(
        "{}/api/quote-equity?symbol={}",
        NSE_BASE_URL,
        urlencoding::encode(symbol)
    )
}

// -----------------------------------------------
// HTTP CLIENT CONFIG
// -----------------------------------------------
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                               AppleWebKit/537.36 (KHTML, like Gecko) \
                               Chrome/131.0.0.0 Safari/537.36";

pub const ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.8",
    "en-IN,en;q=0.9",
];

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

// -----------------------------------------------
// SESSION WARMUP
// -----------------------------------------------
pub const WARMUP_DELAY_MS: u64 = 200;

// -----------------------------------------------
// RETRY CONFIG
// -----------------------------------------------
pub const RETRY_BASE_DELAY_MS: u64 = 200;
pub const RETRY_FACTOR: u64 = 3;
pub const RETRY_MAX_DELAY_SECS: u64 = 5;
pub const RETRY_MAX_ATTEMPTS: usize = 3;

// -----------------------------------------------
// HTTP HEADERS
// -----------------------------------------------
pub const HEADER_REFERER: &str = "https://www.nseindia.com/";
pub const HEADER_X_REQUESTED_WITH: &str = "XMLHttpRequest";
pub const HEADER_ACCEPT_HTML: &str = "text/html";

// -----------------------------------------------
// RUNTIME CONFIGURATION
// -----------------------------------------------

/// Application config file path, overridable via FNO_CONFIG.
pub fn config_path() -> String {
    std::env::var("FNO_CONFIG").unwrap_or_else(|_| "config.json".to_string())
}

/// Single-pass mode for CI/cron runs: process once and exit instead of looping.
pub fn is_single_run() -> bool {
    std::env::var("FNO_SINGLE_RUN").is_ok()
        || std::env::var("CI").is_ok()
        || std::env::var("GITHUB_ACTIONS").is_ok()
}

// -----------------------------------------------
// APPLICATION CONFIG DOCUMENT
// -----------------------------------------------

/// Where the tradable symbol list and expiry dates are discovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolSource {
    Options,
    Futures,
}

/// One compound column to split into named parts.
#[derive(Debug, Clone, Deserialize)]
pub struct SplitSpec {
    pub column: String,
    pub into: Vec<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

fn default_delimiter() -> String {
    " ".to_string()
}

/// Per-table scrape/normalize settings for one instrument kind.
#[derive(Debug, Clone, Deserialize)]
pub struct TableConfig {
    pub url: String,
    #[serde(default)]
    pub rename: BTreeMap<String, String>,
    #[serde(default)]
    pub split: Vec<SplitSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentConfig {
    pub symbols_from: SymbolSource,
    #[serde(default)]
    pub include: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
    pub options: TableConfig,
    pub futures: TableConfig,
    #[serde(default = "default_band_percent")]
    pub band_percent: f64,
    #[serde(default = "default_price_multiple")]
    pub price_multiple: f64,
    #[serde(default = "default_true")]
    pub keep_only_central_strikes: bool,
    #[serde(default)]
    pub opening_prices_snapshot: Option<String>,
}

impl InstrumentConfig {
    pub fn table(&self, kind: InstrumentKind) -> &TableConfig {
        match kind {
            InstrumentKind::Options => &self.options,
            InstrumentKind::Futures => &self.futures,
        }
    }
}

fn default_band_percent() -> f64 {
    100.0
}

fn default_price_multiple() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

/// One threshold pair valid during a wall-clock window, as configured.
/// Times are "HH:MM:SS"; parsing happens in the classifier.
#[derive(Debug, Clone, Deserialize)]
pub struct CriterionSpec {
    pub price_change_percent: f64,
    pub oi_change_percent: f64,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CriteriaConfig {
    pub writing: Vec<CriterionSpec>,
    pub unwinding: Vec<CriterionSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_run_interval_mins")]
    pub run_interval_mins: u64,
    #[serde(default = "default_max_error_count")]
    pub max_error_count: u32,
    /// NSE holidays as "%d-%b-%Y", e.g. "26-Jan-2026".
    #[serde(default)]
    pub holidays: Vec<String>,
    pub instruments: InstrumentConfig,
    pub criteria: CriteriaConfig,
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_run_interval_mins() -> u64 {
    3
}

fn default_max_error_count() -> u32 {
    5
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self, AnalyzerError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AnalyzerError::Config(format!("cannot read '{}': {}", path, e)))?;
        serde_json::from_str(&text)
            .map_err(|e| AnalyzerError::Config(format!("cannot parse '{}': {}", path, e)))
    }
}

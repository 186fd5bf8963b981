use crate::config;
use crate::config::TableConfig;
use crate::error::AnalyzerError;
use crate::models::RawTable;
use anyhow::{anyhow, Context, Result};
use rand::{seq::SliceRandom, thread_rng};
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;
use tracing::{debug, warn};

/// Capital-market segment status as reported by the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStatus {
    pub market: String,

    #[serde(rename = "marketStatusMessage")]
    pub market_status_message: String,

    #[serde(rename = "tradeDate")]
    pub trade_date: String,
}

impl MarketStatus {
    pub fn is_closed(&self) -> bool {
        self.market_status_message == "Market is Closed"
    }
}

// -----------------------------------------------
// CLIENT WRAPPER WITH SESSION STATE
// -----------------------------------------------
pub struct MarketDataClient {
    client: Client,
    warmed_up: Arc<RwLock<bool>>,
}

impl MarketDataClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            warmed_up: Arc::new(RwLock::new(false)),
        })
    }

    /// Warmup the exchange session (only once per client).
    async fn warmup_if_needed(&self) -> Result<()> {
        if *self.warmed_up.read().await {
            return Ok(());
        }

        let mut warmed = self.warmed_up.write().await;
        if !*warmed {
            let _ = self
                .client
                .get(config::NSE_BASE_URL)
                .header("Accept", config::HEADER_ACCEPT_HTML)
                .send()
                .await
                .context("Failed to warm up session")?;

            tokio::time::sleep(Duration::from_millis(config::WARMUP_DELAY_MS)).await;
            *warmed = true;
        }

        Ok(())
    }

    /// Generic retry fetch with backoff and non-JSON detection.
    async fn fetch_json(&self, url: &str) -> Result<String> {
        self.warmup_if_needed().await?;

        let backoff = ExponentialBackoff::from_millis(config::RETRY_BASE_DELAY_MS)
            .factor(config::RETRY_FACTOR)
            .max_delay(Duration::from_secs(config::RETRY_MAX_DELAY_SECS))
            .take(config::RETRY_MAX_ATTEMPTS);

        Retry::spawn(backoff, || async {
            let res = self
                .client
                .get(url)
                .header("Referer", config::HEADER_REFERER)
                .header("X-Requested-With", config::HEADER_X_REQUESTED_WITH)
                .send()
                .await
                .context("Request send failed")?;

            let status = res.status();
            debug!(url, status = status.as_u16(), "fetch");

            if status.is_success() {
                let text = res.text().await.context("Failed to read body")?;

                let trimmed = text.trim();
                if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
                    let preview: String = text.chars().take(200).collect();
                    anyhow::bail!(AnalyzerError::NonJsonResponse(preview));
                }

                Ok(text)
            } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                anyhow::bail!("Retryable error: {}", status)
            } else {
                let body = res.text().await.unwrap_or_default();
                let preview: String = body.chars().take(200).collect();
                anyhow::bail!("Client error {}: {}", status, preview)
            }
        })
        .await
    }

    /// Fetch the tabular payload for one instrument kind. The scraping
    /// collaborator has already reduced the page to columns + string rows.
    pub async fn fetch_raw_table(&self, table_cfg: &TableConfig) -> Result<RawTable> {
        let text = self.fetch_json(&table_cfg.url).await?;
        let table: RawTable = serde_json::from_str(&text)
            .context("Failed to parse raw table payload")?;
        Ok(table)
    }

    /// Current capital-market status.
    pub async fn fetch_market_status(&self) -> Result<MarketStatus> {
        let text = self.fetch_json(config::NSE_API_MARKET_STATUS).await?;
        let value: Value = serde_json::from_str(&text).context("Failed to parse market status")?;

        let states = value["marketState"]
            .as_array()
            .ok_or_else(|| anyhow!("marketState missing from market status payload"))?;

        let capital = states
            .iter()
            .find(|state| state["market"] == "Capital Market")
            .ok_or_else(|| anyhow!("Capital Market not found in market status"))?;

        Ok(serde_json::from_value(capital.clone())
            .context("Failed to parse Capital Market status entry")?)
    }

    /// Opening price per symbol from the quote endpoint, sequentially.
    /// A symbol without a quote is omitted from the mapping; downstream
    /// merging surfaces it as missing reference data.
    pub async fn fetch_opening_prices(&self, symbols: &[String]) -> Result<BTreeMap<String, f64>> {
        let mut prices = BTreeMap::new();

        for symbol in symbols {
            let url = config::nse_quote_url(symbol);
            let text = match self.fetch_json(&url).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(symbol = %symbol, "quote fetch failed: {:#}", e);
                    continue;
                }
            };

            let value: Value = match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(e) => {
                    warn!(symbol = %symbol, "quote parse failed: {}", e);
                    continue;
                }
            };

            match value["priceInfo"]["open"].as_f64() {
                Some(open) => {
                    prices.insert(symbol.clone(), open);
                }
                None => warn!(symbol = %symbol, "quote payload has no opening price"),
            }
        }

        Ok(prices)
    }
}

// -----------------------------------------------
// HTTP CLIENT BUILDER
// -----------------------------------------------
fn build_client() -> Result<Client> {
    let mut headers = header::HeaderMap::new();

    let lang = config::ACCEPT_LANGUAGES.choose(&mut thread_rng()).unwrap();
    headers.insert(
        header::ACCEPT_LANGUAGE,
        header::HeaderValue::from_str(lang)?,
    );
    headers.insert(header::ACCEPT, header::HeaderValue::from_static("*/*"));

    Ok(Client::builder()
        .default_headers(headers)
        .cookie_store(true)
        .user_agent(config::USER_AGENT)
        .timeout(config::HTTP_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?)
}

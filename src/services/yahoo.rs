// src/services/yahoo.rs
//
// Thin client for the Yahoo Finance quote-summary API. The five module
// groups it returns (price, summaryDetail, financialData,
// defaultKeyStatistics, assetProfile) are modeled as optional-field records;
// any of them can be absent and normalization degrades to defaults instead
// of failing the whole record.

use reqwest::Client;
use serde::Deserialize;
use log::{info, warn};
use tokio::time::{sleep_until, Duration, Instant};

use crate::models::{ScreenedStock, StockMetrics};
use crate::services::blacklist::BlacklistCache;
use crate::services::screening;
use crate::BoxError;

const QUOTE_SUMMARY_URL: &str = "https://query1.finance.yahoo.com/v10/finance/quoteSummary";
const QUOTE_URL: &str = "https://query1.finance.yahoo.com/v7/finance/quote";
const MODULES: &str = "price,summaryDetail,financialData,defaultKeyStatistics,assetProfile";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Default pause between successive per-symbol fetches on the batch path.
pub const BATCH_FETCH_DELAY_MS: u64 = 500;

/// The fixed universe refreshed by the batch path.
pub const TRACKED_SYMBOLS: &[&str] = &[
    // Technology
    "AAPL", "NVDA", "AMD", "TSM", "ADBE", "CRM", "SHOP", "SNOW", "AVGO", "ASML",
    "AMAT", "LRCX", "KLAC", "SNPS", "CDNS", "MRVL", "NXPI", "MCHP", "ON",
    "PANW", "CRWD", "FTNT", "NET", "DDOG", "ZS", "WDAY", "TEAM", "SPOT", "SQ", "RBLX",
    // Healthcare
    "JNJ", "UNH", "PFE", "ABBV", "TMO", "LLY", "MRK", "AMGN", "GILD", "REGN",
    "VRTX", "BIIB", "ISRG", "DXCM", "IDXX", "ILMN", "ALGN", "MRNA", "BNTX", "EXAS",
    // Consumer
    "PG", "COST", "NKE", "HD", "TGT", "WMT", "LOW", "BKNG", "ABNB", "LULU",
    "ULTA", "ROST", "DG", "DLTR", "TSLA", "F", "GM", "RIVN", "LCID",
    // Industrial
    "HON", "UPS", "DE", "EMR", "ETN", "ITW", "PH", "ROK", "FDX", "WM",
    // Energy
    "NEE", "ENPH", "SEDG", "FSLR", "RUN", "PLUG", "BE", "CHPT", "BLNK", "NOVA",
];

/// Yahoo wraps most numeric fields as `{"raw": 123.4, "fmt": "123.40"}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawValue {
    pub raw: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    pub long_name: Option<String>,
    pub currency: Option<String>,
    pub regular_market_price: Option<RawValue>,
    pub regular_market_change_percent: Option<RawValue>,
    pub market_cap: Option<RawValue>,
}

impl Price {
    pub fn regular_market_price(&self) -> Option<f64> {
        self.regular_market_price.as_ref().and_then(|v| v.raw)
    }

    pub fn regular_market_change_percent(&self) -> Option<f64> {
        self.regular_market_change_percent.as_ref().and_then(|v| v.raw)
    }

    pub fn market_cap(&self) -> Option<f64> {
        self.market_cap.as_ref().and_then(|v| v.raw)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDetail {
    pub volume: Option<RawValue>,
}

impl SummaryDetail {
    pub fn volume(&self) -> Option<f64> {
        self.volume.as_ref().and_then(|v| v.raw)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialData {
    pub financial_currency: Option<String>,
    pub total_debt: Option<RawValue>,
    pub total_cash: Option<RawValue>,
    pub total_revenue: Option<RawValue>,
}

impl FinancialData {
    pub fn total_debt(&self) -> Option<f64> {
        self.total_debt.as_ref().and_then(|v| v.raw)
    }

    pub fn total_cash(&self) -> Option<f64> {
        self.total_cash.as_ref().and_then(|v| v.raw)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultKeyStatistics {
    pub enterprise_value: Option<RawValue>,
}

impl DefaultKeyStatistics {
    pub fn enterprise_value(&self) -> Option<f64> {
        self.enterprise_value.as_ref().and_then(|v| v.raw)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetProfile {
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub long_business_summary: Option<String>,
}

/// One quote-summary result: the five optional module groups.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSummary {
    pub price: Option<Price>,
    pub summary_detail: Option<SummaryDetail>,
    pub financial_data: Option<FinancialData>,
    pub default_key_statistics: Option<DefaultKeyStatistics>,
    pub asset_profile: Option<AssetProfile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryEnvelope {
    quote_summary: QuoteSummaryBody,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryBody {
    result: Option<Vec<QuoteSummary>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteEnvelope {
    quote_response: QuoteBody,
}

#[derive(Debug, Deserialize)]
struct QuoteBody {
    result: Option<Vec<Quote>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Quote {
    regular_market_price: Option<f64>,
}

/// Inserts a fixed delay between successive operations on the batch path,
/// so upstream quota is respected without coupling the delay policy to the
/// fetch logic. The first call never waits.
pub struct FetchPacer {
    delay: Duration,
    next_ready: Option<Instant>,
}

impl FetchPacer {
    pub fn new(delay: Duration) -> Self {
        FetchPacer { delay, next_ready: None }
    }

    pub async fn wait(&mut self) {
        if let Some(deadline) = self.next_ready {
            sleep_until(deadline).await;
        }
        self.next_ready = Some(Instant::now() + self.delay);
    }
}

pub struct YahooClient {
    client: Client,
}

impl YahooClient {
    pub fn new() -> Result<Self, BoxError> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(YahooClient { client })
    }

    async fn quote_summary(&self, symbol: &str) -> Result<Option<QuoteSummary>, BoxError> {
        let url = format!("{}/{}", QUOTE_SUMMARY_URL, symbol);
        let envelope: QuoteSummaryEnvelope = self
            .client
            .get(&url)
            .query(&[("modules", MODULES)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(envelope
            .quote_summary
            .result
            .and_then(|mut results| if results.is_empty() { None } else { Some(results.remove(0)) }))
    }

    /// Spot rate for converting `from`-denominated figures into `to`,
    /// via Yahoo's currency pair quotes (e.g. TWDUSD=X). Best effort: any
    /// failure logs and returns None so the caller can default to 1.
    async fn exchange_rate(&self, from: &str, to: &str) -> Option<f64> {
        let pair = format!("{}{}=X", from, to);
        let result: Result<QuoteEnvelope, _> = async {
            self.client
                .get(QUOTE_URL)
                .query(&[("symbols", pair.as_str())])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
        }
        .await;

        match result {
            Ok(envelope) => {
                let rate = envelope
                    .quote_response
                    .result
                    .and_then(|r| r.into_iter().next())
                    .and_then(|q| q.regular_market_price);
                if let Some(rate) = rate {
                    info!("Converting {} to {} at rate {}", from, to, rate);
                }
                rate
            }
            Err(e) => {
                warn!("Could not fetch exchange rate for {}/{}: {}", from, to, e);
                None
            }
        }
    }

    /// Fetch and normalize one symbol. `Ok(None)` means Yahoo does not know
    /// the symbol; transport errors bubble up.
    pub async fn get_stock_data(&self, symbol: &str) -> Result<Option<StockMetrics>, BoxError> {
        let summary = match self.quote_summary(symbol).await? {
            Some(summary) => summary,
            None => {
                warn!("Symbol {} not found in Yahoo Finance", symbol);
                return Ok(None);
            }
        };

        // ADRs often report financials in their home currency while the
        // quote is in USD; convert debt and cash before computing ratios.
        let financial_currency = summary
            .financial_data
            .as_ref()
            .and_then(|f| f.financial_currency.clone());
        let price_currency = summary.price.as_ref().and_then(|p| p.currency.clone());

        let exchange_rate = match (financial_currency, price_currency) {
            (Some(from), Some(to)) if from != to => {
                self.exchange_rate(&from, &to).await.unwrap_or(1.0)
            }
            _ => 1.0,
        };

        Ok(Some(screening::normalize(symbol, &summary, exchange_rate)))
    }

    /// Fetch, normalize and screen a batch of symbols with a fixed delay
    /// between requests. Individual failures are logged and skipped; the
    /// batch never aborts early.
    pub async fn get_multiple_stocks(
        &self,
        symbols: &[&str],
        blacklist: &BlacklistCache,
        delay: Duration,
    ) -> Vec<ScreenedStock> {
        let mut pacer = FetchPacer::new(delay);
        let mut results = Vec::new();

        for symbol in symbols {
            pacer.wait().await;

            match self.get_stock_data(symbol).await {
                Ok(Some(metrics)) => {
                    results.push(screening::screen_stock(&metrics, blacklist));
                }
                Ok(None) => {
                    warn!("Skipping {}: no data returned", symbol);
                }
                Err(e) => {
                    warn!("Skipping {}: fetch failed: {}", symbol, e);
                }
            }
        }

        results
    }
}

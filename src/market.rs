//! Live market data: spot prices and the fear/greed sentiment index.
//!
//! Each fetch is a single stateless round trip with no cache, retry or
//! request deduplication. Failures never surface placeholder numbers:
//! the caller receives a typed `MarketFetch` and decides how to render
//! absence versus error.

use std::collections::BTreeMap;
use std::env;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

/// Hardcoded ticker -> price-API identifier list. Tickers outside this
/// list simply have no live quote.
const PRICE_API_IDS: [(&str, &str); 12] = [
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("SOL", "solana"),
    ("XRP", "ripple"),
    ("ADA", "cardano"),
    ("DOGE", "dogecoin"),
    ("DOT", "polkadot"),
    ("LINK", "chainlink"),
    ("LTC", "litecoin"),
    ("AVAX", "avalanche-2"),
    ("BNB", "binancecoin"),
    ("MATIC", "matic-network"),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: f64,
    pub change_24h_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentReading {
    /// 0-100 market mood score.
    pub score: u8,
    pub label: String,
}

/// Typed fetch result: success, nothing-to-report and failure are
/// distinct, so "empty" is never conflated with "zero" downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketFetch<T> {
    Fetched(T),
    Empty,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketDataConfig {
    pub price_api_base_url: String,
    pub sentiment_api_url: String,
    pub vs_currency: String,
    pub http_timeout_ms: u64,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            price_api_base_url: "https://api.coingecko.com/api/v3".to_string(),
            sentiment_api_url: "https://api.alternative.me/fng/".to_string(),
            vs_currency: "usd".to_string(),
            http_timeout_ms: 10_000,
        }
    }
}

pub fn market_data_config_from_env() -> MarketDataConfig {
    let mut config = MarketDataConfig::default();

    if let Ok(base_url) = env::var("REAPER_PRICE_API_URL") {
        let trimmed = base_url.trim();
        if !trimmed.is_empty() {
            config.price_api_base_url = trimmed.to_string();
        }
    }

    if let Ok(url) = env::var("REAPER_SENTIMENT_API_URL") {
        let trimmed = url.trim();
        if !trimmed.is_empty() {
            config.sentiment_api_url = trimmed.to_string();
        }
    }

    if let Ok(timeout) = env::var("REAPER_HTTP_TIMEOUT_MS") {
        if let Ok(parsed) = timeout.trim().parse::<u64>() {
            if parsed > 0 {
                config.http_timeout_ms = parsed;
            }
        }
    }

    config
}

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("HTTP client build error: {0}")]
    HttpClientBuild(String),
}

pub trait PriceFeedFetcher: Send + Sync {
    fn get_text(&self, url: &str) -> Result<String, String>;
}

struct ReqwestBlockingFetcher {
    client: reqwest::blocking::Client,
}

impl ReqwestBlockingFetcher {
    fn new(timeout_ms: u64) -> Result<Self, MarketError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(|err| MarketError::HttpClientBuild(err.to_string()))?;
        Ok(Self { client })
    }
}

impl PriceFeedFetcher for ReqwestBlockingFetcher {
    fn get_text(&self, url: &str) -> Result<String, String> {
        let response = self.client.get(url).send().map_err(|err| err.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("unexpected HTTP status {status}"));
        }

        response.text().map_err(|err| err.to_string())
    }
}

pub fn price_api_id(ticker: &str) -> Option<&'static str> {
    let ticker = ticker.trim().to_ascii_uppercase();
    PRICE_API_IDS
        .iter()
        .find(|(known, _)| *known == ticker)
        .map(|(_, id)| *id)
}

pub struct MarketDataClient {
    cfg: MarketDataConfig,
    fetcher: Box<dyn PriceFeedFetcher>,
}

impl MarketDataClient {
    pub fn new(cfg: MarketDataConfig) -> Result<Self, MarketError> {
        let fetcher = ReqwestBlockingFetcher::new(cfg.http_timeout_ms)?;
        Ok(Self {
            cfg,
            fetcher: Box::new(fetcher),
        })
    }

    pub fn with_fetcher(cfg: MarketDataConfig, fetcher: Box<dyn PriceFeedFetcher>) -> Self {
        Self { cfg, fetcher }
    }

    /// Spot price and 24h change for every ticker that resolves to a
    /// known price-API identifier. Unknown tickers never appear in the
    /// result; an all-unknown request is `Empty` without a round trip.
    pub fn get_prices(&self, tickers: &[String]) -> MarketFetch<BTreeMap<String, PriceQuote>> {
        let resolved = resolve_unique_ids(tickers);
        if resolved.is_empty() {
            return MarketFetch::Empty;
        }

        let ids: Vec<&str> = resolved.iter().map(|(_, id)| *id).collect();
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies={}&include_24hr_change=true",
            self.cfg.price_api_base_url.trim_end_matches('/'),
            ids.join(","),
            self.cfg.vs_currency
        );

        let body = match self.fetcher.get_text(&url) {
            Ok(body) => body,
            Err(reason) => {
                warn!(
                    component = "market_data",
                    event = "market.prices.failed",
                    reason = %reason
                );
                return MarketFetch::Failed { reason };
            }
        };

        let payload: Value = match serde_json::from_str(&body) {
            Ok(payload) => payload,
            Err(err) => {
                let reason = format!("price payload is not valid JSON: {err}");
                warn!(
                    component = "market_data",
                    event = "market.prices.failed",
                    reason = %reason
                );
                return MarketFetch::Failed { reason };
            }
        };

        let Some(map) = payload.as_object() else {
            let reason = "price payload is not a JSON object".to_string();
            warn!(
                component = "market_data",
                event = "market.prices.failed",
                reason = %reason
            );
            return MarketFetch::Failed { reason };
        };

        let change_key = format!("{}_24h_change", self.cfg.vs_currency);
        let mut quotes = BTreeMap::new();
        for (ticker, id) in &resolved {
            let Some(entry) = map.get(*id).and_then(Value::as_object) else {
                continue;
            };
            let Some(price) = entry.get(&self.cfg.vs_currency).and_then(Value::as_f64) else {
                continue;
            };
            let change_24h_pct = entry.get(&change_key).and_then(Value::as_f64);
            quotes.insert(
                ticker.clone(),
                PriceQuote {
                    price,
                    change_24h_pct,
                },
            );
        }

        if quotes.is_empty() {
            return MarketFetch::Empty;
        }

        info!(
            component = "market_data",
            event = "market.prices.fetched",
            requested = tickers.len(),
            quoted = quotes.len()
        );
        MarketFetch::Fetched(quotes)
    }

    /// Current fear/greed reading. Failure is reported as-is; no
    /// neutral placeholder is fabricated.
    pub fn get_sentiment(&self) -> MarketFetch<SentimentReading> {
        let body = match self.fetcher.get_text(&self.cfg.sentiment_api_url) {
            Ok(body) => body,
            Err(reason) => {
                warn!(
                    component = "market_data",
                    event = "market.sentiment.failed",
                    reason = %reason
                );
                return MarketFetch::Failed { reason };
            }
        };

        match parse_sentiment_payload(&body) {
            Ok(reading) => {
                info!(
                    component = "market_data",
                    event = "market.sentiment.fetched",
                    score = reading.score,
                    label = %reading.label
                );
                MarketFetch::Fetched(reading)
            }
            Err(reason) => {
                warn!(
                    component = "market_data",
                    event = "market.sentiment.failed",
                    reason = %reason
                );
                MarketFetch::Failed { reason }
            }
        }
    }
}

fn resolve_unique_ids(tickers: &[String]) -> Vec<(String, &'static str)> {
    let mut resolved: Vec<(String, &'static str)> = Vec::with_capacity(tickers.len());
    for ticker in tickers {
        let ticker = ticker.trim().to_ascii_uppercase();
        if resolved.iter().any(|(seen, _)| *seen == ticker) {
            continue;
        }
        if let Some(id) = price_api_id(&ticker) {
            resolved.push((ticker, id));
        }
    }
    resolved
}

fn parse_sentiment_payload(body: &str) -> Result<SentimentReading, String> {
    let payload: Value = serde_json::from_str(body)
        .map_err(|err| format!("sentiment payload is not valid JSON: {err}"))?;

    let entry = payload
        .get("data")
        .and_then(Value::as_array)
        .and_then(|data| data.first())
        .and_then(Value::as_object)
        .ok_or_else(|| "sentiment payload has no data[0] entry".to_string())?;

    let raw_score = entry
        .get("value")
        .ok_or_else(|| "sentiment payload has no value field".to_string())?;
    let score = match raw_score {
        Value::Number(number) => number.as_u64(),
        Value::String(raw) => raw.trim().parse::<u64>().ok(),
        _ => None,
    }
    .ok_or_else(|| format!("sentiment score '{raw_score}' is not a number"))?;

    if score > 100 {
        return Err(format!("sentiment score {score} is out of the 0-100 range"));
    }
    let score = score as u8;

    let label = entry
        .get("value_classification")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| score_label(score).to_string());

    Ok(SentimentReading { score, label })
}

fn score_label(score: u8) -> &'static str {
    match score {
        0..=24 => "Extreme Fear",
        25..=44 => "Fear",
        45..=55 => "Neutral",
        56..=75 => "Greed",
        _ => "Extreme Greed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StaticFetcher {
        body: Result<String, String>,
    }

    impl StaticFetcher {
        fn ok(body: &str) -> Box<Self> {
            Box::new(Self {
                body: Ok(body.to_string()),
            })
        }

        fn err(reason: &str) -> Box<Self> {
            Box::new(Self {
                body: Err(reason.to_string()),
            })
        }
    }

    impl PriceFeedFetcher for StaticFetcher {
        fn get_text(&self, _url: &str) -> Result<String, String> {
            self.body.clone()
        }
    }

    struct RecordingFetcher {
        urls: std::sync::Arc<Mutex<Vec<String>>>,
        body: String,
    }

    impl PriceFeedFetcher for RecordingFetcher {
        fn get_text(&self, url: &str) -> Result<String, String> {
            self.urls
                .lock()
                .expect("url lock should not be poisoned")
                .push(url.to_string());
            Ok(self.body.clone())
        }
    }

    struct PanicFetcher;

    impl PriceFeedFetcher for PanicFetcher {
        fn get_text(&self, _url: &str) -> Result<String, String> {
            panic!("no round trip expected");
        }
    }

    fn client(fetcher: Box<dyn PriceFeedFetcher>) -> MarketDataClient {
        MarketDataClient::with_fetcher(MarketDataConfig::default(), fetcher)
    }

    fn tickers(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn known_tickers_resolve_to_quotes_and_unknown_ones_are_absent() {
        let fetcher = StaticFetcher::ok(
            r#"{"bitcoin": {"usd": 40000.0, "usd_24h_change": -2.5},
                "ethereum": {"usd": 2000.0}}"#,
        );

        let fetched = client(fetcher).get_prices(&tickers(&["BTC", "ETH", "WAT"]));
        let MarketFetch::Fetched(quotes) = fetched else {
            panic!("expected fetched quotes");
        };

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes["BTC"].price, 40_000.0);
        assert_eq!(quotes["BTC"].change_24h_pct, Some(-2.5));
        assert_eq!(quotes["ETH"].price, 2_000.0);
        assert_eq!(quotes["ETH"].change_24h_pct, None);
        assert!(!quotes.contains_key("WAT"));
    }

    #[test]
    fn all_unknown_tickers_short_circuit_to_empty() {
        let outcome = client(Box::new(PanicFetcher)).get_prices(&tickers(&["WAT", "NOPE"]));
        assert_eq!(outcome, MarketFetch::Empty);
    }

    #[test]
    fn no_tickers_short_circuit_to_empty() {
        let outcome = client(Box::new(PanicFetcher)).get_prices(&[]);
        assert_eq!(outcome, MarketFetch::Empty);
    }

    #[test]
    fn payload_without_requested_ids_is_empty_not_fabricated() {
        let fetcher = StaticFetcher::ok(r#"{"dogecoin": {"usd": 0.1}}"#);
        let outcome = client(fetcher).get_prices(&tickers(&["BTC"]));
        assert_eq!(outcome, MarketFetch::Empty);
    }

    #[test]
    fn transport_error_is_failed() {
        let outcome = client(StaticFetcher::err("connection refused")).get_prices(&tickers(&["BTC"]));
        assert!(
            matches!(outcome, MarketFetch::Failed { reason } if reason == "connection refused")
        );
    }

    #[test]
    fn malformed_price_payload_is_failed() {
        let outcome = client(StaticFetcher::ok("<html>rate limited</html>"))
            .get_prices(&tickers(&["BTC"]));
        assert!(matches!(outcome, MarketFetch::Failed { .. }));
    }

    #[test]
    fn duplicate_tickers_are_requested_once() {
        let urls = std::sync::Arc::new(Mutex::new(Vec::new()));
        let fetcher = Box::new(RecordingFetcher {
            urls: urls.clone(),
            body: r#"{"bitcoin": {"usd": 40000.0}}"#.to_string(),
        });

        let outcome = client(fetcher).get_prices(&tickers(&["btc", "BTC", "Btc"]));
        let MarketFetch::Fetched(quotes) = outcome else {
            panic!("expected fetched quotes");
        };
        assert_eq!(quotes.len(), 1);

        let recorded = urls.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].matches("bitcoin").count(), 1);
    }

    #[test]
    fn price_url_is_built_from_config() {
        let urls = std::sync::Arc::new(Mutex::new(Vec::new()));
        let cfg = MarketDataConfig {
            price_api_base_url: "http://localhost:9999/api/".to_string(),
            ..MarketDataConfig::default()
        };
        let fetcher = Box::new(RecordingFetcher {
            urls: urls.clone(),
            body: r#"{"bitcoin": {"usd": 1.0}}"#.to_string(),
        });

        let _ = MarketDataClient::with_fetcher(cfg, fetcher).get_prices(&tickers(&["BTC", "ETH"]));

        let recorded = urls.lock().unwrap();
        assert_eq!(
            recorded[0],
            "http://localhost:9999/api/simple/price?ids=bitcoin,ethereum&vs_currencies=usd&include_24hr_change=true"
        );
    }

    #[test]
    fn sentiment_parses_score_and_label() {
        let fetcher =
            StaticFetcher::ok(r#"{"data": [{"value": "54", "value_classification": "Neutral"}]}"#);
        let outcome = client(fetcher).get_sentiment();
        assert_eq!(
            outcome,
            MarketFetch::Fetched(SentimentReading {
                score: 54,
                label: "Neutral".to_string(),
            })
        );
    }

    #[test]
    fn sentiment_without_classification_derives_a_label() {
        let fetcher = StaticFetcher::ok(r#"{"data": [{"value": 12}]}"#);
        let outcome = client(fetcher).get_sentiment();
        assert_eq!(
            outcome,
            MarketFetch::Fetched(SentimentReading {
                score: 12,
                label: "Extreme Fear".to_string(),
            })
        );
    }

    #[test]
    fn sentiment_out_of_range_or_missing_is_failed() {
        let outcome = client(StaticFetcher::ok(r#"{"data": [{"value": "250"}]}"#)).get_sentiment();
        assert!(matches!(outcome, MarketFetch::Failed { .. }));

        let outcome = client(StaticFetcher::ok(r#"{"data": []}"#)).get_sentiment();
        assert!(matches!(outcome, MarketFetch::Failed { .. }));
    }

    #[test]
    fn sentiment_transport_error_is_failed_not_neutral() {
        let outcome = client(StaticFetcher::err("timeout")).get_sentiment();
        assert!(matches!(outcome, MarketFetch::Failed { reason } if reason == "timeout"));
    }

    #[test]
    fn score_labels_cover_the_full_scale() {
        assert_eq!(score_label(0), "Extreme Fear");
        assert_eq!(score_label(30), "Fear");
        assert_eq!(score_label(50), "Neutral");
        assert_eq!(score_label(60), "Greed");
        assert_eq!(score_label(100), "Extreme Greed");
    }

    #[test]
    fn price_api_id_lookup_is_case_insensitive_and_closed() {
        assert_eq!(price_api_id("btc"), Some("bitcoin"));
        assert_eq!(price_api_id(" XRP "), Some("ripple"));
        assert_eq!(price_api_id("SHIB"), None);
    }
}

//! Portfolio snapshot composition and the dashboard HTTP surface.
//!
//! Every snapshot request re-runs the full cycle: list holdings, fetch
//! live prices for the held tickers, fetch the sentiment index, then
//! compose one typed snapshot. Absent market data renders as "-",
//! never as zero.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::calc::{position_size, spread, CalcError, PositionSize, PositionSizeInput, Spread, SpreadInput};
use crate::holding::{Holding, HoldingError};
use crate::market::{
    MarketDataClient, MarketDataConfig, MarketFetch, PriceFeedFetcher, PriceQuote,
    SentimentReading,
};
use crate::store::{HoldingStore, InMemoryHoldingStore, StoreError, StoreHandle};

pub const DASHBOARD_HEADERS: [&str; 8] = [
    "Ticker",
    "Quantity",
    "Cost Basis",
    "Price",
    "24h %",
    "Market Value",
    "Unrealized P&L",
    "Updated",
];

/// Availability of one snapshot ingredient. `Empty` is "nothing to
/// report", `Unavailable` is "the source failed"; the page renders the
/// two differently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DataState {
    Ready,
    Empty,
    Unavailable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingRow {
    pub ticker: String,
    pub quantity: f64,
    pub cost_basis: Option<f64>,
    pub price: Option<f64>,
    pub change_24h_pct: Option<f64>,
    pub market_value: Option<f64>,
    pub unrealized_pnl: Option<f64>,
    pub last_updated_ts_utc: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    pub holding_count: usize,
    pub total_market_value: Option<f64>,
    pub total_cost: Option<f64>,
    pub total_unrealized_pnl: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub owner: String,
    pub generated_ts_utc: i64,
    pub rows: Vec<HoldingRow>,
    pub metrics: PortfolioMetrics,
    pub sentiment: Option<SentimentReading>,
    pub store_state: DataState,
    pub prices_state: DataState,
    pub sentiment_state: DataState,
}

/// Everything a snapshot needs, constructed once at startup and passed
/// in explicitly. There is no process-global store handle.
pub struct DashboardDeps {
    pub owner: String,
    pub store: StoreHandle,
    pub market: MarketDataClient,
}

pub fn build_portfolio_snapshot(deps: &DashboardDeps) -> PortfolioSnapshot {
    let generated_ts_utc = Utc::now().timestamp();

    let (holdings, store_state) = match &deps.store {
        StoreHandle::Disabled(reason) => (
            Vec::new(),
            DataState::Unavailable {
                reason: reason.clone(),
            },
        ),
        StoreHandle::Ready(store) => match store.list(&deps.owner) {
            Ok(holdings) if holdings.is_empty() => (holdings, DataState::Empty),
            Ok(holdings) => (holdings, DataState::Ready),
            Err(err) => {
                warn!(
                    component = "dashboard",
                    event = "snapshot.store_list_failed",
                    owner = %deps.owner,
                    error = %err
                );
                (
                    Vec::new(),
                    DataState::Unavailable {
                        reason: err.to_string(),
                    },
                )
            }
        },
    };

    let tickers: Vec<String> = holdings.iter().map(|h| h.ticker.clone()).collect();
    let (quotes, prices_state) = if tickers.is_empty() {
        (BTreeMap::new(), DataState::Empty)
    } else {
        match deps.market.get_prices(&tickers) {
            MarketFetch::Fetched(quotes) => (quotes, DataState::Ready),
            MarketFetch::Empty => (BTreeMap::new(), DataState::Empty),
            MarketFetch::Failed { reason } => (BTreeMap::new(), DataState::Unavailable { reason }),
        }
    };

    let (sentiment, sentiment_state) = match deps.market.get_sentiment() {
        MarketFetch::Fetched(reading) => (Some(reading), DataState::Ready),
        MarketFetch::Empty => (None, DataState::Empty),
        MarketFetch::Failed { reason } => (None, DataState::Unavailable { reason }),
    };

    let rows: Vec<HoldingRow> = holdings
        .iter()
        .map(|holding| holding_row(holding, quotes.get(&holding.ticker)))
        .collect();
    let metrics = compute_metrics(&rows);

    PortfolioSnapshot {
        owner: deps.owner.clone(),
        generated_ts_utc,
        rows,
        metrics,
        sentiment,
        store_state,
        prices_state,
        sentiment_state,
    }
}

fn holding_row(holding: &Holding, quote: Option<&PriceQuote>) -> HoldingRow {
    let price = quote.map(|q| q.price);
    let market_value = price.map(|p| p * holding.quantity);
    let unrealized_pnl = match (price, holding.cost_basis) {
        (Some(price), Some(cost)) => Some((price - cost) * holding.quantity),
        _ => None,
    };

    HoldingRow {
        ticker: holding.ticker.clone(),
        quantity: holding.quantity,
        cost_basis: holding.cost_basis,
        price,
        change_24h_pct: quote.and_then(|q| q.change_24h_pct),
        market_value,
        unrealized_pnl,
        last_updated_ts_utc: holding.last_updated_ts_utc,
    }
}

fn compute_metrics(rows: &[HoldingRow]) -> PortfolioMetrics {
    PortfolioMetrics {
        holding_count: rows.len(),
        total_market_value: sum_present(rows.iter().map(|row| row.market_value)),
        total_cost: sum_present(
            rows.iter()
                .map(|row| row.cost_basis.map(|cost| cost * row.quantity)),
        ),
        total_unrealized_pnl: sum_present(rows.iter().map(|row| row.unrealized_pnl)),
    }
}

/// Sums the present values; `None` when every input is absent, so a
/// portfolio without prices reports "unavailable" rather than 0.
fn sum_present(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let mut total = None;
    for value in values.flatten() {
        *total.get_or_insert(0.0) += value;
    }
    total
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpsertHoldingRequest {
    pub ticker: String,
    pub quantity: f64,
    pub cost_basis: Option<f64>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PositionSizeQuery {
    pub capital: f64,
    pub risk_pct: f64,
    pub entry: f64,
    pub stop: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SpreadQuery {
    pub bid: f64,
    pub ask: f64,
}

#[derive(Debug)]
enum ApiError {
    Validation(String),
    StoreDisabled(String),
    Store(String),
    Internal(String),
}

impl From<HoldingError> for ApiError {
    fn from(err: HoldingError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) => Self::StoreDisabled(reason),
            StoreError::Holding(inner) => Self::Validation(inner.to_string()),
            other => Self::Store(other.to_string()),
        }
    }
}

impl From<CalcError> for ApiError {
    fn from(err: CalcError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Validation(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            Self::StoreDisabled(message) => (StatusCode::SERVICE_UNAVAILABLE, message),
            Self::Store(message) | Self::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Clone)]
struct DashboardAppState {
    deps: Arc<DashboardDeps>,
}

pub fn dashboard_router(deps: Arc<DashboardDeps>) -> Router {
    Router::new()
        .route("/dashboard", get(get_dashboard_html))
        .route("/dashboard/snapshot", get(get_dashboard_snapshot))
        .route("/holdings", post(post_upsert_holding))
        .route("/holdings/clear", post(post_clear_holdings))
        .route("/holdings/{ticker}", delete(delete_holding))
        .route("/calc/position-size", get(get_position_size))
        .route("/calc/spread", get(get_spread))
        .with_state(DashboardAppState { deps })
}

async fn snapshot_blocking(deps: Arc<DashboardDeps>) -> Result<PortfolioSnapshot, ApiError> {
    tokio::task::spawn_blocking(move || build_portfolio_snapshot(&deps))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))
}

async fn get_dashboard_html(
    State(state): State<DashboardAppState>,
) -> Result<Html<String>, ApiError> {
    let snapshot = snapshot_blocking(state.deps.clone()).await?;
    Ok(Html(render_dashboard_html(&snapshot)))
}

async fn get_dashboard_snapshot(
    State(state): State<DashboardAppState>,
) -> Result<Json<PortfolioSnapshot>, ApiError> {
    let snapshot = snapshot_blocking(state.deps.clone()).await?;
    info!(
        component = "dashboard",
        event = "http.snapshot.request",
        owner = %snapshot.owner,
        row_count = snapshot.rows.len()
    );
    Ok(Json(snapshot))
}

async fn post_upsert_holding(
    State(state): State<DashboardAppState>,
    Json(request): Json<UpsertHoldingRequest>,
) -> Result<StatusCode, ApiError> {
    let deps = state.deps.clone();
    tokio::task::spawn_blocking(move || {
        let store = deps.store.get()?;
        let holding = Holding::new(
            &deps.owner,
            &request.ticker,
            request.quantity,
            request.cost_basis,
            Utc::now().timestamp(),
        )?;
        store.upsert(&holding)?;
        Ok::<_, ApiError>(())
    })
    .await
    .map_err(|err| ApiError::Internal(err.to_string()))??;

    Ok(StatusCode::NO_CONTENT)
}

async fn delete_holding(
    State(state): State<DashboardAppState>,
    Path(ticker): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deps = state.deps.clone();
    tokio::task::spawn_blocking(move || {
        let store = deps.store.get()?;
        store.delete(&deps.owner, &ticker)?;
        Ok::<_, ApiError>(())
    })
    .await
    .map_err(|err| ApiError::Internal(err.to_string()))??;

    Ok(StatusCode::NO_CONTENT)
}

async fn post_clear_holdings(
    State(state): State<DashboardAppState>,
) -> Result<StatusCode, ApiError> {
    let deps = state.deps.clone();
    tokio::task::spawn_blocking(move || {
        let store = deps.store.get()?;
        store.clear(&deps.owner)?;
        Ok::<_, ApiError>(())
    })
    .await
    .map_err(|err| ApiError::Internal(err.to_string()))??;

    Ok(StatusCode::NO_CONTENT)
}

async fn get_position_size(
    Query(query): Query<PositionSizeQuery>,
) -> Result<Json<PositionSize>, ApiError> {
    let sized = position_size(&PositionSizeInput {
        capital: query.capital,
        risk_pct: query.risk_pct,
        entry: query.entry,
        stop: query.stop,
    })?;
    Ok(Json(sized))
}

async fn get_spread(Query(query): Query<SpreadQuery>) -> Result<Json<Spread>, ApiError> {
    let computed = spread(&SpreadInput {
        bid: query.bid,
        ask: query.ask,
    })?;
    Ok(Json(computed))
}

pub fn render_dashboard_html(snapshot: &PortfolioSnapshot) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    out.push_str("<title>Reaper Dashboard</title>\n");
    out.push_str("<style>:root{--bg:#f5f1e7;--card:#ffffff;--ink:#182026;--muted:#5f6a73;--line:#d7dce1;--head:#14343f;--up:#0c7a43;--down:#b3261e}*{box-sizing:border-box}body{margin:0;color:var(--ink);font-family:\"Space Grotesk\",\"Avenir Next\",\"Segoe UI\",sans-serif;background:linear-gradient(160deg,var(--bg),#e9f0f2);min-height:100vh}.shell{max-width:1100px;margin:0 auto;padding:24px 18px 28px}.hero{background:linear-gradient(135deg,#102f3a 0%,#24576b 100%);color:#f7fbfc;border-radius:16px;padding:18px 20px}.hero h1{margin:0 0 8px;font-size:1.6rem}.hero-meta{display:flex;gap:16px;flex-wrap:wrap;font-size:.92rem;color:#dcebf0}.metrics{display:flex;gap:12px;flex-wrap:wrap;margin-top:16px}.metric{background:var(--card);border:1px solid #cbd4db;border-radius:12px;padding:12px 16px;min-width:170px}.metric .label{font-size:.76rem;text-transform:uppercase;letter-spacing:.04em;color:var(--muted)}.metric .value{font-size:1.2rem;font-weight:700;margin-top:4px}.card{margin-top:16px;background:var(--card);border:1px solid #cbd4db;border-radius:16px;overflow:hidden}.table-wrap{overflow:auto}table{width:100%;border-collapse:collapse;min-width:720px}thead th{background:var(--head);color:#f2f7f9;font-size:.8rem;text-transform:uppercase;letter-spacing:.04em;padding:10px;border-bottom:1px solid #0e2730;text-align:left}tbody td{font-size:.86rem;padding:9px 10px;border-bottom:1px solid var(--line);white-space:nowrap}tbody tr:nth-child(even){background:#fafcfd}.notice{padding:14px;font-size:.9rem;color:var(--muted)}.state-line{padding:10px 14px;border-top:1px solid var(--line);font-size:.8rem;color:var(--muted);background:#f8fbfc}</style>\n");
    out.push_str("</head><body><main class=\"shell\">\n");

    out.push_str("<section class=\"hero\"><h1>Reaper Dashboard</h1>");
    out.push_str("<div class=\"hero-meta\">\n");
    out.push_str(&format!(
        "<span>Owner: {}</span>",
        escape_html(&snapshot.owner)
    ));
    out.push_str(&format!("<span>Holdings: {}</span>", snapshot.rows.len()));
    out.push_str(&format!(
        "<span>Sentiment: {}</span>",
        escape_html(&sentiment_text(snapshot))
    ));
    out.push_str(&format!(
        "<span>Generated: {}</span>",
        escape_html(&fmt_ts(snapshot.generated_ts_utc))
    ));
    out.push_str("</div></section>\n");

    out.push_str("<section class=\"metrics\">");
    push_metric(&mut out, "Total Value", &snapshot.metrics.total_market_value);
    push_metric(&mut out, "Total Cost", &snapshot.metrics.total_cost);
    push_metric(
        &mut out,
        "Unrealized P&amp;L",
        &snapshot.metrics.total_unrealized_pnl,
    );
    out.push_str("</section>\n");

    out.push_str("<section class=\"card\">");
    match &snapshot.store_state {
        DataState::Unavailable { reason } => {
            out.push_str(&format!(
                "<div class=\"notice\">Portfolio storage is unavailable for this session: {}</div>",
                escape_html(reason)
            ));
        }
        DataState::Empty => {
            out.push_str("<div class=\"notice\">No holdings yet. Add one to get started.</div>");
        }
        DataState::Ready => {
            out.push_str("<div class=\"table-wrap\"><table id=\"holdings-table\">\n<thead><tr>");
            for header in DASHBOARD_HEADERS {
                out.push_str("<th>");
                out.push_str(&escape_html(header));
                out.push_str("</th>");
            }
            out.push_str("</tr></thead><tbody>\n");

            for row in &snapshot.rows {
                out.push_str("<tr>");
                push_cell(&mut out, &row.ticker);
                push_cell(&mut out, &format!("{}", row.quantity));
                push_cell(&mut out, &fmt_opt_money(&row.cost_basis));
                push_cell(&mut out, &fmt_opt_money(&row.price));
                push_cell(&mut out, &fmt_opt_pct(&row.change_24h_pct));
                push_cell(&mut out, &fmt_opt_money(&row.market_value));
                push_cell(&mut out, &fmt_opt_money(&row.unrealized_pnl));
                push_cell(&mut out, &fmt_ts(row.last_updated_ts_utc));
                out.push_str("</tr>\n");
            }

            out.push_str("</tbody></table></div>");
        }
    }
    out.push_str(&format!(
        "<div class=\"state-line\">Prices: {} &middot; Sentiment: {}</div>",
        escape_html(&state_text(&snapshot.prices_state)),
        escape_html(&state_text(&snapshot.sentiment_state))
    ));
    out.push_str("</section>");

    out.push_str("</main></body></html>\n");
    out
}

fn push_metric(out: &mut String, label: &str, value: &Option<f64>) {
    out.push_str(&format!(
        "<div class=\"metric\"><div class=\"label\">{}</div><div class=\"value\">{}</div></div>",
        label,
        escape_html(&fmt_opt_money(value))
    ));
}

fn push_cell(out: &mut String, value: &str) {
    out.push_str("<td>");
    out.push_str(&escape_html(value));
    out.push_str("</td>");
}

fn sentiment_text(snapshot: &PortfolioSnapshot) -> String {
    match &snapshot.sentiment {
        Some(reading) => format!("{} ({})", reading.score, reading.label),
        None => "-".to_string(),
    }
}

fn state_text(state: &DataState) -> String {
    match state {
        DataState::Ready => "live".to_string(),
        DataState::Empty => "no data".to_string(),
        DataState::Unavailable { reason } => format!("unavailable ({reason})"),
    }
}

fn fmt_opt_money(value: &Option<f64>) -> String {
    value
        .map(|v| format!("{v:.2}"))
        .unwrap_or_else(|| "-".to_string())
}

fn fmt_opt_pct(value: &Option<f64>) -> String {
    value
        .map(|v| format!("{v:+.2}%"))
        .unwrap_or_else(|| "-".to_string())
}

fn fmt_ts(ts_utc: i64) -> String {
    Utc.timestamp_opt(ts_utc, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

struct DemoMarketFetcher;

impl PriceFeedFetcher for DemoMarketFetcher {
    fn get_text(&self, url: &str) -> Result<String, String> {
        if url.contains("/simple/price") {
            Ok(r#"{"bitcoin": {"usd": 43250.0, "usd_24h_change": 1.8},
                   "ethereum": {"usd": 2210.0, "usd_24h_change": -0.6},
                   "solana": {"usd": 104.5, "usd_24h_change": 3.2}}"#
                .to_string())
        } else {
            Ok(r#"{"data": [{"value": "54", "value_classification": "Neutral"}]}"#.to_string())
        }
    }
}

/// Self-contained dependencies for demo mode: a seeded in-memory store
/// and canned market payloads, no network or disk.
pub fn demo_deps() -> DashboardDeps {
    let now_ts_utc = Utc::now().timestamp();
    let store = InMemoryHoldingStore::new();
    let seeds = [
        ("BTC", 0.5, Some(30_000.0)),
        ("ETH", 4.0, Some(1_850.0)),
        ("SOL", 30.0, None),
    ];
    for (ticker, quantity, cost_basis) in seeds {
        let holding = Holding::new("demo", ticker, quantity, cost_basis, now_ts_utc)
            .expect("demo holdings are valid");
        store.upsert(&holding).expect("in-memory upsert cannot fail");
    }

    DashboardDeps {
        owner: "demo".to_string(),
        store: StoreHandle::ready(store),
        market: MarketDataClient::with_fetcher(
            MarketDataConfig::default(),
            Box::new(DemoMarketFetcher),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedMarket;

    impl PriceFeedFetcher for CannedMarket {
        fn get_text(&self, url: &str) -> Result<String, String> {
            if url.contains("/simple/price") {
                Ok(r#"{"bitcoin": {"usd": 40000.0, "usd_24h_change": -2.5},
                       "ethereum": {"usd": 2000.0, "usd_24h_change": 1.25}}"#
                    .to_string())
            } else {
                Ok(r#"{"data": [{"value": "54", "value_classification": "Neutral"}]}"#.to_string())
            }
        }
    }

    struct FailingMarket;

    impl PriceFeedFetcher for FailingMarket {
        fn get_text(&self, _url: &str) -> Result<String, String> {
            Err("connection refused".to_string())
        }
    }

    fn seeded_store() -> InMemoryHoldingStore {
        let store = InMemoryHoldingStore::new();
        store
            .upsert(&Holding::new("alice", "BTC", 0.5, Some(30_000.0), 100).unwrap())
            .unwrap();
        store
            .upsert(&Holding::new("alice", "ETH", 4.0, None, 200).unwrap())
            .unwrap();
        store
            .upsert(&Holding::new("alice", "WAT", 7.0, Some(1.0), 300).unwrap())
            .unwrap();
        store
    }

    fn deps(store: StoreHandle, fetcher: Box<dyn PriceFeedFetcher>) -> DashboardDeps {
        DashboardDeps {
            owner: "alice".to_string(),
            store,
            market: MarketDataClient::with_fetcher(MarketDataConfig::default(), fetcher),
        }
    }

    #[test]
    fn snapshot_composes_rows_metrics_and_sentiment() {
        let deps = deps(StoreHandle::ready(seeded_store()), Box::new(CannedMarket));
        let snapshot = build_portfolio_snapshot(&deps);

        assert_eq!(snapshot.store_state, DataState::Ready);
        assert_eq!(snapshot.prices_state, DataState::Ready);
        assert_eq!(snapshot.rows.len(), 3);

        let btc = &snapshot.rows[0];
        assert_eq!(btc.ticker, "BTC");
        assert_eq!(btc.price, Some(40_000.0));
        assert_eq!(btc.market_value, Some(20_000.0));
        assert_eq!(btc.unrealized_pnl, Some(5_000.0));

        // WAT has no price-API identifier: present, but without a quote.
        let wat = &snapshot.rows[2];
        assert_eq!(wat.ticker, "WAT");
        assert_eq!(wat.price, None);
        assert_eq!(wat.market_value, None);
        assert_eq!(wat.unrealized_pnl, None);

        assert_eq!(snapshot.metrics.holding_count, 3);
        assert_eq!(snapshot.metrics.total_market_value, Some(28_000.0));
        assert_eq!(snapshot.metrics.total_cost, Some(15_007.0));
        assert_eq!(snapshot.metrics.total_unrealized_pnl, Some(5_000.0));
        assert_eq!(
            snapshot.sentiment,
            Some(SentimentReading {
                score: 54,
                label: "Neutral".to_string(),
            })
        );
    }

    #[test]
    fn market_failure_leaves_rows_without_prices_not_zeroes() {
        let deps = deps(StoreHandle::ready(seeded_store()), Box::new(FailingMarket));
        let snapshot = build_portfolio_snapshot(&deps);

        assert!(matches!(
            snapshot.prices_state,
            DataState::Unavailable { .. }
        ));
        assert!(matches!(
            snapshot.sentiment_state,
            DataState::Unavailable { .. }
        ));
        assert_eq!(snapshot.rows.len(), 3);
        assert!(snapshot.rows.iter().all(|row| row.price.is_none()));
        assert_eq!(snapshot.metrics.total_market_value, None);
        assert_eq!(snapshot.sentiment, None);
    }

    #[test]
    fn disabled_store_is_an_empty_snapshot_with_a_reason() {
        let deps = deps(
            StoreHandle::Disabled("could not open store".to_string()),
            Box::new(CannedMarket),
        );
        let snapshot = build_portfolio_snapshot(&deps);

        assert!(snapshot.rows.is_empty());
        assert_eq!(
            snapshot.store_state,
            DataState::Unavailable {
                reason: "could not open store".to_string(),
            }
        );
        // With nothing held there is nothing to price.
        assert_eq!(snapshot.prices_state, DataState::Empty);
    }

    #[test]
    fn empty_portfolio_metrics_are_absent_not_zero() {
        let deps = deps(
            StoreHandle::ready(InMemoryHoldingStore::new()),
            Box::new(CannedMarket),
        );
        let snapshot = build_portfolio_snapshot(&deps);

        assert_eq!(snapshot.store_state, DataState::Empty);
        assert_eq!(snapshot.metrics.holding_count, 0);
        assert_eq!(snapshot.metrics.total_market_value, None);
        assert_eq!(snapshot.metrics.total_cost, None);
    }

    #[test]
    fn rendered_html_has_title_table_and_sentiment() {
        let deps = deps(StoreHandle::ready(seeded_store()), Box::new(CannedMarket));
        let snapshot = build_portfolio_snapshot(&deps);
        let html = render_dashboard_html(&snapshot);

        assert!(html.contains("Reaper Dashboard"));
        assert!(html.contains("<table"));
        assert!(html.contains("BTC"));
        assert!(html.contains("54 (Neutral)"));
        assert!(html.contains("Prices: live"));
    }

    #[test]
    fn rendered_html_escapes_failure_reasons() {
        let deps = deps(
            StoreHandle::Disabled("<boom> & crash".to_string()),
            Box::new(CannedMarket),
        );
        let snapshot = build_portfolio_snapshot(&deps);
        let html = render_dashboard_html(&snapshot);

        assert!(html.contains("&lt;boom&gt; &amp; crash"));
        assert!(!html.contains("<boom>"));
    }

    #[test]
    fn absent_market_data_renders_as_dashes() {
        let deps = deps(StoreHandle::ready(seeded_store()), Box::new(FailingMarket));
        let snapshot = build_portfolio_snapshot(&deps);
        let html = render_dashboard_html(&snapshot);

        assert!(html.contains("<td>-</td>"));
        assert!(html.contains("unavailable (connection refused)"));
    }

    #[test]
    fn demo_deps_produce_a_fully_priced_snapshot() {
        let snapshot = build_portfolio_snapshot(&demo_deps());

        assert_eq!(snapshot.owner, "demo");
        assert_eq!(snapshot.rows.len(), 3);
        assert!(snapshot
            .rows
            .iter()
            .all(|row| row.price.is_some() && row.market_value.is_some()));
        assert_eq!(snapshot.store_state, DataState::Ready);
    }
}

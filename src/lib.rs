//! Reaper portfolio dashboard core crate.
//!
//! Implemented scope:
//! - canonical holding model with legacy-document normalization
//! - owner-scoped holding store (SQLite-backed and in-memory)
//! - live price and sentiment refresh with typed availability
//! - position-sizing and spread calculators
//! - dashboard snapshot composition and HTTP routes

mod calc;
mod dashboard;
mod holding;
mod market;
mod observability;
mod store;

pub use calc::{
    position_size, spread, CalcError, PositionSize, PositionSizeInput, Spread, SpreadInput,
};
pub use dashboard::{
    build_portfolio_snapshot, dashboard_router, demo_deps, render_dashboard_html, DashboardDeps,
    DataState, HoldingRow, PortfolioMetrics, PortfolioSnapshot, UpsertHoldingRequest,
    DASHBOARD_HEADERS,
};
pub use holding::{decode_document, normalize_ticker, Holding, HoldingError};
pub use market::{
    market_data_config_from_env, price_api_id, MarketDataClient, MarketDataConfig, MarketError,
    MarketFetch, PriceFeedFetcher, PriceQuote, SentimentReading,
};
pub use observability::{
    init_logging, log_app_bind, log_app_start, log_store_selected, logging_config_from_env,
    LogFormat, LoggingConfig, LoggingInitError,
};
pub use store::{HoldingStore, InMemoryHoldingStore, SqliteHoldingStore, StoreError, StoreHandle};

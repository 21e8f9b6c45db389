use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use reaper::{
    dashboard_router, demo_deps, init_logging, log_app_bind, log_app_start, log_store_selected,
    logging_config_from_env, market_data_config_from_env, DashboardDeps, MarketDataClient,
    SqliteHoldingStore, StoreHandle,
};
use tracing::warn;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start(&logging_cfg);

    let addr: SocketAddr = std::env::var("REAPER_DASHBOARD_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        .parse()?;

    // The market client's blocking HTTP transport must be built before
    // the async runtime starts.
    let deps = Arc::new(deps_from_env()?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(addr, deps))
}

async fn serve(
    addr: SocketAddr,
    deps: Arc<DashboardDeps>,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = dashboard_router(deps);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    log_app_bind(bound_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn deps_from_env() -> Result<DashboardDeps, Box<dyn std::error::Error>> {
    let force_demo = std::env::var("REAPER_DASHBOARD_USE_DEMO")
        .map(|raw| raw == "1" || raw.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    if force_demo {
        log_store_selected("demo", Some("REAPER_DASHBOARD_USE_DEMO"), None);
        return Ok(demo_deps());
    }

    let owner = std::env::var("REAPER_OWNER").unwrap_or_else(|_| "default".to_string());
    let store_path = std::env::var("REAPER_STORE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/holdings.sqlite"));

    // A store that cannot be opened disables persistence for the whole
    // session; the dashboard still serves with an empty-state message.
    let store = match SqliteHoldingStore::open(&store_path) {
        Ok(store) => {
            log_store_selected("sqlite", None, Some(&store_path.display().to_string()));
            StoreHandle::ready(store)
        }
        Err(err) => {
            warn!(
                component = "dashboard_server",
                event = "store.disabled",
                path = %store_path.display(),
                error = %err
            );
            StoreHandle::Disabled(err.to_string())
        }
    };

    let market = MarketDataClient::new(market_data_config_from_env())?;

    Ok(DashboardDeps {
        owner,
        store,
        market,
    })
}

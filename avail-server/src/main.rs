use std::net::SocketAddr;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use avail_server::cache::{CacheConfig, CourseIndex, DEFAULT_TERMS};
use avail_server::domain::TermCode;
use avail_server::feed::{FeedClient, FeedConfig, FeedFetcher, MockFeedFetcher};
use avail_server::web::{AppState, create_router};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_STATIC_DIR: &str = "static";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("avail_server=info")),
        )
        .init();

    let addr: SocketAddr = std::env::var("AVAIL_BIND_ADDR")
        .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
        .parse()
        .expect("AVAIL_BIND_ADDR is not a socket address");
    let static_dir =
        std::env::var("AVAIL_STATIC_DIR").unwrap_or_else(|_| DEFAULT_STATIC_DIR.to_string());
    let cache_config = CacheConfig::new(terms_from_env());
    info!(terms = ?cache_config.terms, "configured terms");

    match std::env::var("AVAIL_MOCK_FEED") {
        Ok(path) => {
            info!(%path, "serving course data from a local feed file");
            let fetcher = MockFeedFetcher::from_file(&path).expect("Failed to read mock feed");
            serve(fetcher, cache_config, addr, &static_dir).await;
        }
        Err(_) => {
            let client =
                FeedClient::new(FeedConfig::default()).expect("Failed to create feed client");
            serve(client, cache_config, addr, &static_dir).await;
        }
    }
}

/// Terms from `AVAIL_TERMS`, or the built-in list.
fn terms_from_env() -> Vec<TermCode> {
    match std::env::var("AVAIL_TERMS") {
        Ok(list) => list
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(TermCode::normalized)
            .collect(),
        Err(_) => DEFAULT_TERMS.iter().map(|t| TermCode::new(*t)).collect(),
    }
}

async fn serve<F: FeedFetcher>(
    fetcher: F,
    cache_config: CacheConfig,
    addr: SocketAddr,
    static_dir: &str,
) {
    let index = CourseIndex::new(fetcher, cache_config);

    // Warm the cache; lookups retry on their own if this fails.
    match index.refresh().await {
        Ok(snapshot) => info!(
            rows = snapshot.row_count(),
            terms = snapshot.terms().count(),
            "initial course data loaded"
        ),
        Err(e) => warn!(error = %e, "initial course data load failed"),
    }

    let app = create_router(AppState::new(index), static_dir);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listen address");
    info!(%addr, static_dir, "course availability server listening");
    info!("  GET /api/availability?term=&dpt=&code=");
    info!("  GET /health");

    axum::serve(listener, app).await.expect("Server error");
}

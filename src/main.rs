mod certificate;
mod config;
mod error;
mod issue;
mod layout;
mod ledger;
mod pdf;
mod routes;
mod state;
mod storage;
mod templates;

use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "certmint=info,tower_http=info".into()),
        )
        .init();

    let config = config::Config::from_env()?;
    let config = Arc::new(config);

    let fonts = pdf::FontLibrary::discover(&config.font_dirs);
    if fonts.is_empty() {
        tracing::warn!("No fonts could be loaded; certificates cannot be rendered");
    }

    let ledger = if config.ledger_enabled {
        crate::storage::ensure_parent_dir(&config.ledger_path)?;
        let ledger = ledger::Ledger::open(&config.ledger_path);
        match ledger.load_all() {
            Ok(records) => tracing::info!(
                "Ledger {} holds {} certificates",
                ledger.path().display(),
                records.len()
            ),
            Err(e) => tracing::error!("Ledger {} is unreadable: {}", ledger.path().display(), e),
        }
        Some(Arc::new(ledger))
    } else {
        tracing::info!("Ledger disabled; issuing unregistered certificates");
        None
    };

    let state = Arc::new(state::AppState {
        config: config.clone(),
        fonts: Arc::new(fonts),
        ledger,
    });

    let app = routes::build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("certmint listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

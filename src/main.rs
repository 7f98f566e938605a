use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};

use ecommerce_api as api;
use ecommerce_api::notifications::{notifier_from_config, LogNotifier, OrderNotifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    let db_pool = api::db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to the database")?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db = Arc::new(db_pool);

    let cache = api::cache::CacheService::from_config(&cfg).await;
    let notifier: Arc<dyn OrderNotifier> = match notifier_from_config(&cfg) {
        Ok(notifier) => notifier,
        Err(e) => {
            warn!("SMTP notifier unavailable, confirmations will only be logged: {}", e);
            Arc::new(LogNotifier)
        }
    };

    let services = api::handlers::AppServices::new(db.clone(), &cfg, cache, notifier);
    let state = api::AppState {
        db,
        config: cfg.clone(),
        services,
    };

    let access_logger = api::logging::setup_logger(api::logging::LoggerConfig {
        use_color: !cfg.is_production(),
        ..Default::default()
    });
    let app = api::app_router(state, access_logger);

    let addr = cfg.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("ecommerce-api listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

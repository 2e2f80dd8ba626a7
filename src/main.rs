//! Opportunity matcher service.
//!
//! Wires configuration, tracing, storage adapters and the recommendation
//! engine behind the HTTP API, and shuts everything down on SIGINT/SIGTERM.

use std::error::Error;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{fmt, EnvFilter};

use opportunity_matcher::adapters::http::{recommendation_router, RecommendationAppState};
use opportunity_matcher::adapters::memory::{
    InMemoryApplicationLedger, InMemoryBehaviorEventStore, InMemoryProfileRepository,
    InMemorySnapshotStore,
};
use opportunity_matcher::adapters::postgres::{
    PostgresApplicationLedger, PostgresBehaviorEventStore, PostgresProfileRepository,
};
use opportunity_matcher::adapters::redis::RedisSnapshotStore;
use opportunity_matcher::application::recommendation::{EnginePorts, RecommendationEngine};
use opportunity_matcher::config::{AppConfig, DatabaseConfig, RedisConfig, ServerConfig};
use opportunity_matcher::domain::foundation::ErrorCode;
use opportunity_matcher::ports::RecommendationSnapshotStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    let weights = config.recommendation.load_weights().map_err(|e| {
        tracing::error!(
            code = %ErrorCode::InvalidWeightConfiguration,
            error = %e,
            "Refusing to start with invalid weights"
        );
        e
    })?;

    let ports = build_ports(&config).await?;
    let engine = Arc::new(RecommendationEngine::new(
        config.recommendation.engine_settings(),
        weights,
        ports,
    )?);
    engine.start().await;

    let app = recommendation_router()
        .with_state(RecommendationAppState::new(Arc::clone(&engine)))
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    let address = config.server.socket_addr()?;
    let listener = TcpListener::bind(address).await?;
    tracing::info!(%address, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine.shutdown().await;
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    if server.is_production() {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}

async fn build_ports(config: &AppConfig) -> Result<EnginePorts, Box<dyn Error>> {
    let snapshots = match &config.redis {
        Some(redis) => snapshot_store(redis).await?,
        None => {
            tracing::warn!("No Redis configured, snapshots are kept in process");
            Arc::new(InMemorySnapshotStore::new()) as Arc<dyn RecommendationSnapshotStore>
        }
    };

    match &config.database {
        Some(database) => {
            let pool = connect(database).await?;
            Ok(EnginePorts {
                profiles: Arc::new(PostgresProfileRepository::new(pool.clone())),
                ledger: Arc::new(PostgresApplicationLedger::new(pool.clone())),
                events: Arc::new(PostgresBehaviorEventStore::new(pool)),
                snapshots,
            })
        }
        None => {
            tracing::warn!("No database configured, using empty in-memory stores");
            Ok(EnginePorts {
                profiles: Arc::new(InMemoryProfileRepository::new()),
                ledger: Arc::new(InMemoryApplicationLedger::new()),
                events: Arc::new(InMemoryBehaviorEventStore::new()),
                snapshots,
            })
        }
    }
}

async fn connect(database: &DatabaseConfig) -> Result<sqlx::PgPool, Box<dyn Error>> {
    let pool = database.pool_options().connect(&database.url).await?;
    if database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }
    Ok(pool)
}

async fn snapshot_store(
    redis: &RedisConfig,
) -> Result<Arc<dyn RecommendationSnapshotStore>, Box<dyn Error>> {
    let client = redis::Client::open(redis.url.as_str())?;
    let conn =
        tokio::time::timeout(redis.timeout(), client.get_multiplexed_tokio_connection()).await??;
    Ok(Arc::new(
        RedisSnapshotStore::new(conn, redis.snapshot_retention_secs)
            .with_prefix(redis.key_prefix.clone()),
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
}

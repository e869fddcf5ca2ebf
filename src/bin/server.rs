//! Bakery console server: reads settings from the environment, prepares the backend, mounts
//! probes, console pages and the entity API.

use bakery_console::{
    app, apply_migrations, ensure_database_exists, AppState, BackendKind, Catalog, JwtIdentity, MemoryBackend,
    PgBackend, Settings, TableBackend,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bakery_console=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let catalog = Arc::new(Catalog::bakery()?);

    let backend: Arc<dyn TableBackend> = match settings.backend {
        BackendKind::Memory => {
            tracing::warn!("using in-memory backend; data is not persisted");
            Arc::new(MemoryBackend::new())
        }
        BackendKind::Postgres => {
            let database_url = settings.database_url.as_deref().unwrap_or_default();
            ensure_database_exists(database_url).await?;
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(settings.db_max_connections)
                .connect(database_url)
                .await?;
            if settings.run_migrations {
                apply_migrations(&pool, &settings.schema, &catalog).await?;
            }
            Arc::new(PgBackend::new(pool, settings.schema.clone()))
        }
    };

    let state = AppState {
        backend,
        catalog,
        identity: Arc::new(JwtIdentity::hs256(
            settings.jwt_secret.as_bytes(),
            settings.jwt_audience.as_deref(),
        )),
        login_providers: Arc::new(settings.login_providers.clone()),
    };

    let router = app(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(RequestBodyLimitLayer::new(settings.body_limit_bytes)),
    );

    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}

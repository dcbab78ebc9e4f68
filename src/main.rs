use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};
use clinic_core::constants::{DEFAULT_BASE_URL, DEFAULT_CURRENCY, DEFAULT_DATA_DIR};
use clinic_core::payments::{
    PaymentGateway, StripeGateway, UnconfiguredGateway, DEFAULT_API_BASE,
};
use clinic_core::store::{FileStore, MemoryStore, RecordStore};
use clinic_core::CoreConfig;

/// Main entry point for the clinic service
///
/// Resolves configuration from the environment once, builds the record store and payment gateway,
/// and serves the REST API (with Swagger UI at `/swagger-ui`).
///
/// # Environment Variables
/// - `CLINIC_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CLINIC_DATA_DIR`: Record store directory (default: "clinic_data")
/// - `CLINIC_STORE`: `file` or `memory` (default: "file")
/// - `CLINIC_BASE_URL`: Public base URL used in checkout redirects (default: "http://localhost:3000")
/// - `CLINIC_CURRENCY`: Checkout currency (default: "usd")
/// - `STRIPE_SECRET_KEY`: Payment provider key; without it checkout requests fail with 502
/// - `STRIPE_WEBHOOK_SECRET`: Webhook signing secret; without it webhooks are accepted unsigned
/// - `STRIPE_API_BASE`: Payment provider API base (default: "https://api.stripe.com")
///
/// # Errors
/// Returns an error if the configuration is invalid, the store cannot be opened, or the server
/// cannot bind or fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = env_or("CLINIC_REST_ADDR", "0.0.0.0:3000");
    let data_dir = PathBuf::from(env_or("CLINIC_DATA_DIR", DEFAULT_DATA_DIR));

    let cfg = Arc::new(CoreConfig::new(
        data_dir,
        &env_or("CLINIC_BASE_URL", DEFAULT_BASE_URL),
        &env_or("CLINIC_CURRENCY", DEFAULT_CURRENCY),
        std::env::var("STRIPE_WEBHOOK_SECRET").ok(),
    )?);

    let store: Arc<dyn RecordStore> = match env_or("CLINIC_STORE", "file").as_str() {
        "file" => {
            tracing::info!("++ Using file store at {}", cfg.data_dir().display());
            Arc::new(FileStore::new(cfg.data_dir())?)
        }
        "memory" => {
            tracing::warn!("++ Using in-memory store; records are lost on exit");
            Arc::new(MemoryStore::new())
        }
        other => anyhow::bail!("CLINIC_STORE must be 'file' or 'memory', got '{}'", other),
    };

    let gateway: Arc<dyn PaymentGateway> = match std::env::var("STRIPE_SECRET_KEY") {
        Ok(key) if !key.trim().is_empty() => Arc::new(StripeGateway::new(
            key.trim(),
            &env_or("STRIPE_API_BASE", DEFAULT_API_BASE),
        )),
        _ => {
            tracing::warn!("++ STRIPE_SECRET_KEY not set; checkout requests will fail");
            Arc::new(UnconfiguredGateway)
        }
    };

    if cfg.webhook_secret().is_none() {
        tracing::warn!("++ STRIPE_WEBHOOK_SECRET not set; webhooks are accepted unsigned");
    }

    let app = router(AppState::new(store, gateway, cfg));

    tracing::info!("++ Starting clinic REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use saus_scene_service::{AppConfig, ModelRegistry, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!(
        model_path = %config.model_path.display(),
        classes = config.class_labels.len(),
        layout = %config.input_layout,
        "starting scene classifier"
    );

    let registry = ModelRegistry::from_config(config.as_ref());
    if config.preload_model {
        match registry.load().await {
            Ok(()) => tracing::info!("model loaded on startup"),
            Err(err) if config.require_model => return Err(err.into()),
            Err(err) => {
                tracing::warn!(error = %err, "startup load failed, retrying on first request")
            }
        }
    }

    let router = build_router(config.clone(), registry);

    let listener = TcpListener::bind(config.listen_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "REST server ready");

    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,hyper=warn,axum::rejection=trace".into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

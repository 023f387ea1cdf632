use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;

use clinic_infra::AuthConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    clinic_observability::init();

    let config = AuthConfig::from_env().context("invalid configuration")?;
    let port = config.port;

    let services = clinic_api::app::build_services(config)
        .await
        .context("failed to wire services")?;
    let app = clinic_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind 0.0.0.0:{port}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}

use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookswap::{services::auth as auth_service, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    tokio::fs::create_dir_all(&config.file_upload_path).await?;

    let state = AppState::new(&config).await?;
    tracing::info!("✅ AppState initialized");

    if let Err(e) = auth_service::promote_admins(&state, &config.admin_emails).await {
        tracing::error!("❌ Failed to promote admin accounts: {}", e);
        return Err(e.into());
    }

    let app = bookswap::router(state)?;

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🚀 Server listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

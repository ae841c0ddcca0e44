use std::sync::{Arc, Weak};
use std::time::Duration;

use axum::Router;
use tokio::task::JoinHandle;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};

use crate::{
    config::Config,
    error::{AppError, Result},
    state::AppState,
};

/// How often idle per-IP buckets are dropped.
const RETAIN_INTERVAL: Duration = Duration::from_secs(60);

/// Throttles credential endpoints per client IP.
///
/// Each client starts with `auth_rate_burst` attempts and regains one every
/// `auth_rate_per_second` seconds. The server must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()` for the peer address
/// to be known.
///
/// # Arguments
///
/// * `routes` - The routes to throttle.
/// * `config` - The application's configuration.
///
/// # Returns
///
/// A `Result` containing the throttled `Router`.
pub fn limit_auth_attempts(
    routes: Router<AppState>,
    config: &Config,
) -> Result<Router<AppState>> {
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.auth_rate_per_second)
            .burst_size(config.auth_rate_burst)
            .use_headers()
            .finish()
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Invalid auth rate limit (per_second={}, burst={})",
                    config.auth_rate_per_second, config.auth_rate_burst
                ))
            })?,
    );

    spawn_sweeper(
        Arc::downgrade(governor_conf.limiter()),
        RETAIN_INTERVAL,
        |limiter| {
            tracing::debug!("🧹 Rate limiting storage size: {}", limiter.len());
            limiter.retain_recent();
        },
    );

    tracing::info!(
        "✅ Auth rate limit: burst {} then 1 per {}s",
        config.auth_rate_burst,
        config.auth_rate_per_second
    );

    Ok(routes.layer(GovernorLayer::new(governor_conf)))
}

/// Runs `sweep` every `every` for as long as `target` is alive. The task
/// holds only a weak reference, so it ends once the router owning the
/// limiter is dropped.
fn spawn_sweeper<T, F>(target: Weak<T>, every: Duration, sweep: F) -> JoinHandle<()>
where
    T: Send + Sync + 'static,
    F: Fn(&T) + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(every).await;
            let Some(target) = target.upgrade() else {
                tracing::debug!("Rate limiter dropped, stopping sweeper");
                return;
            };
            sweep(target.as_ref());
        }
    })
}

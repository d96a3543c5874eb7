use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

mod error;
mod http;
mod middleware;
mod state;

use goatway_core::config::GoatwayConfig;
use goatway_storage::Storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GoatwayConfig::load().unwrap_or_else(|e| {
        tracing::warn!("config load failed ({}), using defaults", e);
        GoatwayConfig::default()
    });

    init_tracing(&config.log_level, &config.log_format);

    let storage = Arc::new(Storage::open(&config.db_path())?);
    bootstrap_admin_password(&storage, config.admin_password.as_deref())?;

    let app_state = Arc::new(state::AppState::new(config.clone(), storage));
    let _sweeper = goatway_sessions::spawn_sweeper(app_state.sessions.clone());

    let router = state::build_router(app_state);

    let addr = resolve_bind_addr(&config.server_addr)?;
    info!(%addr, "goatway listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing(log_level: &str, log_format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("goatway={log_level},tower_http=info").into());

    if log_format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// `:8080`-style addrs (the config default) bind every interface; anything
/// with an explicit host is passed through untouched.
fn resolve_bind_addr(configured: &str) -> anyhow::Result<SocketAddr> {
    let full = if let Some(port) = configured.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else {
        configured.to_string()
    };
    Ok(full.parse()?)
}

/// Seeds the admin password hash on first boot if one was configured but
/// no hash has ever been stored. Subsequent boots never overwrite a hash
/// set via the admin API.
fn bootstrap_admin_password(storage: &Storage, configured: Option<&str>) -> anyhow::Result<()> {
    if storage.get_setting("admin_password_hash")?.is_some() {
        return Ok(());
    }
    if let Some(password) = configured {
        let hash = goatway_crypto::hash_password(password)?;
        storage.set_setting("admin_password_hash", &hash)?;
    }
    Ok(())
}

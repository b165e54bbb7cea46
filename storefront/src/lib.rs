//! Jewelry storefront service.
//!
//! Serves the catalog, resolves postal codes, quotes shipping and places
//! orders against a hosted backend, plus the admin back office. Domain rules
//! (cart, package aggregation, quote normalization, the checkout wizard) live
//! in `pratas-common`; this crate adds the I/O around them.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tracing::info;

pub mod adapters;
pub mod admin;
pub mod api;
pub mod checkout;
pub mod config;
pub mod error;
pub mod melhor_envio;
pub mod memory;
pub mod orders;
pub mod supabase;
pub mod tracking;
pub mod viacep;

use adapters::{Catalog, OrderStore, SettingsStore};
use api::AppState;
use config::Cli;
use melhor_envio::MelhorEnvioClient;
use memory::MemoryStore;
use supabase::SupabaseStore;
use viacep::ViaCepClient;

/// Build clients from configuration and serve until a shutdown signal.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let http = reqwest::Client::builder()
        .timeout(cli.http_timeout())
        .build()
        .context("building HTTP client")?;

    let lookup = ViaCepClient::new(http.clone(), cli.viacep_url.clone());
    let quotes = MelhorEnvioClient::new(
        http.clone(),
        cli.melhor_envio_url.clone(),
        cli.melhor_envio_token.clone(),
        cli.melhor_envio_user_agent.clone(),
    );
    if !quotes.is_configured() {
        info!("no carrier token configured; shipping quotes will report unavailable");
    }
    if cli.admin_token.is_none() {
        info!("no admin token configured; admin routes are disabled");
    }

    match cli.supabase() {
        Some((url, key)) => {
            info!(backend = url, "using hosted backend");
            let store = SupabaseStore::new(http, url, key);
            serve(&cli, store, lookup, quotes).await
        }
        None => {
            info!("no backend configured; running in demo mode with an in-memory catalog");
            serve(&cli, MemoryStore::demo(), lookup, quotes).await
        }
    }
}

async fn serve<S>(cli: &Cli, store: S, lookup: ViaCepClient, quotes: MelhorEnvioClient) -> anyhow::Result<()>
where
    S: Catalog + OrderStore + SettingsStore + 'static,
{
    let state = Arc::new(AppState {
        store,
        lookup,
        quotes,
        origin: cli.origin_postal_code.clone(),
        admin_token: cli.admin_token.clone().filter(|t| !t.trim().is_empty()),
    });
    let app = api::router(state);

    let address = format!("0.0.0.0:{}", cli.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!(%address, origin = %cli.origin_postal_code, "storefront listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    info!("storefront stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("received Ctrl+C, shutting down"),
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

//! HTTP front end for a [`dog_vault::BlobVault`].

use std::sync::Arc;

use axum::Router;
use dog_vault::BlobVault;
use tokio::net::{TcpListener, ToSocketAddrs};

pub mod config;
mod error;
mod middleware;
mod routes;

pub use config::{AuthConfig, ServerConfig};
pub use error::{ApiError, ApiResult};
pub use middleware::API_KEY_HEADER;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub vault: BlobVault,
    pub auth: Arc<AuthConfig>,
}

impl AppState {
    pub fn new(vault: BlobVault, auth: AuthConfig) -> Self {
        Self {
            vault,
            auth: Arc::new(auth),
        }
    }
}

/// A vault plus the router serving it
#[derive(Clone)]
pub struct VaultApp {
    pub vault: BlobVault,
    pub router: Router,
}

impl VaultApp {
    pub fn new(vault: BlobVault, auth: AuthConfig) -> Self {
        let router = routes::router(AppState::new(vault.clone(), auth));
        Self { vault, router }
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}

/// Open the configured vault and build the app around it
pub async fn build(config: &ServerConfig) -> anyhow::Result<VaultApp> {
    let vault = BlobVault::connect(config.vault.clone()).await?;
    Ok(VaultApp::new(vault, config.auth.clone()))
}

//! Aggregation proxy for the real-time sports and news APIs.
//!
//! Each public resource is served through a fallback chain (primary upstream,
//! optionally a public news API, then the manual document) so that polling
//! clients get data, or an empty list, rather than an error whenever a fallback
//! exists. See `resolvers` for the chains.

pub mod api;
pub mod config;
pub mod env;
pub mod errors;
pub mod manual_store;
pub mod metrics_defs;
pub mod resolvers;
pub mod types;
pub mod upstream;

#[cfg(test)]
mod testutils;

use crate::api::AppState;
use crate::config::{Config, ManualStoreConfig};
use crate::env::ConfigSource;
use crate::errors::ServiceError;
use crate::manual_store::{
    FilesystemManualProvider, ManualDataProvider, ManualStore, MemoryManualProvider,
};
use crate::resolvers::Resolvers;
use crate::upstream::UpstreamClient;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;
use std::time::Duration;

pub fn manual_provider(config: &ManualStoreConfig) -> Arc<dyn ManualDataProvider> {
    match config {
        ManualStoreConfig::Filesystem { path } => Arc::new(FilesystemManualProvider::new(path)),
        ManualStoreConfig::Memory => Arc::new(MemoryManualProvider::default()),
    }
}

/// Serves the API and the admin probes until either listener fails.
pub async fn run(config: Config, env: Arc<dyn ConfigSource>) -> Result<(), ServiceError> {
    config.validate()?;

    let store = Arc::new(ManualStore::new(manual_provider(&config.manual_store)));
    if let Err(err) = store.refresh().await {
        // Not fatal: fallback reads serve empty lists until the file is fixed.
        tracing::error!(error = %err, "manual document unreadable at startup");
    }

    let upstream = UpstreamClient::new(Duration::from_secs(config.upstream.timeout_secs))?;
    let resolvers = Resolvers::new(upstream, store.clone(), env);

    let api_task = api::serve(
        &config.listener,
        AppState {
            resolvers,
            store: store.clone(),
        },
    );

    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::<_, ServiceError>::new(move || store.is_ready()),
    );

    tokio::try_join!(api_task, admin_task)?;
    Ok(())
}

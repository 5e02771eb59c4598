use crate::config::Listener as ListenerConfig;
use crate::errors::{ApiError, ServiceError};
use crate::manual_store::ManualStore;
use crate::resolvers::Resolvers;
use crate::types::ResourceType;
use crate::upstream::QueryParams;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{MethodRouter, get},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
    pub resolvers: Resolvers,
    pub store: Arc<ManualStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/matches", public_route(ResourceType::Matches))
        .route("/api/trending", public_route(ResourceType::Trending))
        .route("/api/breaking-news", public_route(ResourceType::BreakingNews))
        .route("/api/articles", public_route(ResourceType::Articles))
        .route("/api/videos", public_route(ResourceType::Videos))
        .route("/api/manual/{resource}", get(get_manual).post(put_manual))
        // Polling pages are usually served from another origin
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(listener: &ListenerConfig, state: AppState) -> Result<(), ServiceError> {
    let addr = format!("{}:{}", listener.host, listener.port);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "api listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Read-only endpoint answering with whatever the resolver for `resource`
/// decides, status included.
fn public_route(resource: ResourceType) -> MethodRouter<AppState> {
    get(
        move |State(state): State<AppState>, Query(params): Query<QueryParams>| async move {
            state.resolvers.resolve(resource, &params).await
        },
    )
}

async fn get_manual(
    State(state): State<AppState>,
    Path(resource): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let resource: ResourceType = resource.parse()?;

    let records = state.store.read_entry(resource).await.map_err(|err| {
        tracing::error!(%resource, error = %err, "manual read failed");
        ApiError::ReadFailed(err)
    })?;

    Ok(Json(records))
}

/// Replaces the records for one resource with the request body, unchecked.
async fn put_manual(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Json(records): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let resource: ResourceType = resource.parse()?;

    state.store.write(resource, records).await.map_err(|err| {
        tracing::error!(%resource, error = %err, "manual write failed");
        ApiError::WriteFailed(err)
    })?;

    tracing::info!(%resource, "manual data updated");
    Ok(Json(json!({ "success": true })))
}

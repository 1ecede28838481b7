//! Job handlers

use super::{parse_selector, require_selector, ListQuery, SelectorQuery};
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use jobflow_types::{Job, ObjectKey};

/// List jobs across namespaces
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Job>>> {
    let selector = parse_selector(query.label_selector.as_deref())?;
    Ok(Json(
        state
            .cluster
            .list_jobs(query.namespace.as_deref(), selector.as_ref()),
    ))
}

/// List jobs in one namespace
pub async fn list_namespaced_jobs(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Query(query): Query<SelectorQuery>,
) -> ApiResult<Json<Vec<Job>>> {
    let selector = parse_selector(query.label_selector.as_deref())?;
    Ok(Json(state.cluster.list_jobs(Some(&namespace), selector.as_ref())))
}

/// Get a specific job
pub async fn get_job(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<Job>> {
    Ok(Json(state.cluster.get_job(&ObjectKey::new(namespace, name))?))
}

/// Delete a job
pub async fn delete_job(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<Job>> {
    let job = state
        .cluster
        .delete_job(&ObjectKey::new(namespace, name))
        .await?;
    Ok(Json(job))
}

/// Delete every job in a namespace matching `labelSelector`
pub async fn delete_jobs(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Query(query): Query<SelectorQuery>,
) -> ApiResult<Json<Vec<Job>>> {
    let selector = require_selector(query.label_selector.as_deref())?;
    Ok(Json(state.cluster.delete_jobs(&namespace, &selector).await))
}

//! Workflow handlers

use super::{parse_selector, require_selector, ListQuery, SelectorQuery};
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use jobflow_types::{Manifest, ObjectKey, Workflow};
use serde::Serialize;

/// List workflows across namespaces
pub async fn list_workflows(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Workflow>>> {
    let selector = parse_selector(query.label_selector.as_deref())?;
    Ok(Json(
        state
            .cluster
            .list_workflows(query.namespace.as_deref(), selector.as_ref()),
    ))
}

/// List workflows in one namespace
pub async fn list_namespaced_workflows(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Query(query): Query<SelectorQuery>,
) -> ApiResult<Json<Vec<Workflow>>> {
    let selector = parse_selector(query.label_selector.as_deref())?;
    Ok(Json(
        state.cluster.list_workflows(Some(&namespace), selector.as_ref()),
    ))
}

/// Create or replace a workflow
pub async fn apply_workflow(
    State(state): State<AppState>,
    Json(workflow): Json<Workflow>,
) -> ApiResult<(StatusCode, Json<Workflow>)> {
    let applied = state.cluster.apply_workflow(workflow).await?;
    let status = if applied.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(applied.object)))
}

/// Get a specific workflow
pub async fn get_workflow(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<Workflow>> {
    let workflow = state
        .cluster
        .get_workflow(&ObjectKey::new(namespace, name))?;
    Ok(Json(workflow))
}

/// Delete a workflow and the jobs it controls
pub async fn delete_workflow(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<Workflow>> {
    let workflow = state
        .cluster
        .delete_workflow(&ObjectKey::new(namespace, name))
        .await?;
    Ok(Json(workflow))
}

/// Delete every workflow in a namespace matching `labelSelector`
pub async fn delete_workflows(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Query(query): Query<SelectorQuery>,
) -> ApiResult<Json<Vec<Workflow>>> {
    let selector = require_selector(query.label_selector.as_deref())?;
    Ok(Json(state.cluster.delete_workflows(&namespace, &selector).await))
}

/// Per-object result of a manifest apply
#[derive(Debug, Serialize)]
pub struct AppliedObject {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub created: bool,
}

/// Apply a batch of manifests of any kind
pub async fn apply_manifests(
    State(state): State<AppState>,
    Json(manifests): Json<Vec<Manifest>>,
) -> ApiResult<Json<Vec<AppliedObject>>> {
    let mut results = Vec::with_capacity(manifests.len());
    for manifest in manifests {
        let (kind, meta, created) = match manifest {
            Manifest::Workflow(w) => {
                let applied = state.cluster.apply_workflow(w).await?;
                ("Workflow", applied.object.metadata, applied.created)
            }
            Manifest::Job(j) => {
                let applied = state.cluster.apply_job(j).await?;
                ("Job", applied.object.metadata, applied.created)
            }
        };
        results.push(AppliedObject {
            kind: kind.to_string(),
            namespace: meta.namespace,
            name: meta.name,
            created,
        });
    }
    Ok(Json(results))
}

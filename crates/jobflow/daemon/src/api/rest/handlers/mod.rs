//! API request handlers

mod events;
mod health;
mod jobs;
mod workflows;

pub use events::*;
pub use health::*;
pub use jobs::*;
pub use workflows::*;

use crate::error::{ApiError, ApiResult};
use jobflow_types::LabelSelector;
use serde::Deserialize;

/// Query for cluster-wide listings
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub namespace: Option<String>,
    pub label_selector: Option<String>,
}

/// Query carrying only a label selector
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorQuery {
    pub label_selector: Option<String>,
}

/// Parse an optional `labelSelector`; blank counts as absent
fn parse_selector(raw: Option<&str>) -> ApiResult<Option<LabelSelector>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Ok(Some(raw.parse()?)),
        None => Ok(None),
    }
}

/// Bulk deletes refuse to run without a selector
fn require_selector(raw: Option<&str>) -> ApiResult<LabelSelector> {
    parse_selector(raw)?
        .ok_or_else(|| ApiError::BadRequest("labelSelector is required".to_string()))
}

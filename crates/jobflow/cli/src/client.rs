//! HTTP client for the jobflow daemon

use crate::error::{CliError, CliResult};
use jobflow_types::{Manifest, ObjectKey, Resource};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

const API_PREFIX: &str = "/api/v1";

/// HTTP client for communicating with the jobflow daemon
pub struct JobflowClient {
    client: Client,
    base_url: String,
}

/// Daemon health response
#[derive(Debug, Deserialize)]
pub struct DaemonStatus {
    pub status: String,
    pub version: String,
    pub uptime: String,
    pub queue_depth: usize,
    pub pending_expectations: usize,
}

/// Per-object result of a manifest apply
#[derive(Debug, Deserialize, Serialize)]
pub struct AppliedObject {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub created: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl JobflowClient {
    /// Create a new client
    pub fn new(endpoint: &str) -> CliResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Check daemon health
    pub async fn health_check(&self) -> CliResult<DaemonStatus> {
        self.send(self.client.get(self.url("/health"))).await
    }

    /// Create or replace every resource in `manifests`
    pub async fn apply(&self, manifests: &[Manifest]) -> CliResult<Vec<AppliedObject>> {
        self.send(self.client.post(self.url("/apply")).json(manifests))
            .await
    }

    /// List resources of kind `T`, across namespaces when `namespace` is `None`
    pub async fn list<T>(&self, namespace: Option<&str>, selector: Option<&str>) -> CliResult<Vec<T>>
    where
        T: Resource + DeserializeOwned,
    {
        let mut request = self.client.get(self.url(&collection_path::<T>(namespace)));
        if let Some(selector) = selector {
            request = request.query(&[("labelSelector", selector)]);
        }
        self.send(request).await
    }

    /// Fetch one resource
    pub async fn get<T>(&self, key: &ObjectKey) -> CliResult<T>
    where
        T: Resource + DeserializeOwned,
    {
        self.send(self.client.get(self.url(&object_path::<T>(key))))
            .await
    }

    /// Delete one resource, returning it as it was
    pub async fn delete<T>(&self, key: &ObjectKey) -> CliResult<T>
    where
        T: Resource + DeserializeOwned,
    {
        self.send(self.client.delete(self.url(&object_path::<T>(key))))
            .await
    }

    /// Delete every resource in `namespace` matching `selector`
    pub async fn delete_matching<T>(&self, namespace: &str, selector: &str) -> CliResult<Vec<T>>
    where
        T: Resource + DeserializeOwned,
    {
        let request = self
            .client
            .delete(self.url(&collection_path::<T>(Some(namespace))))
            .query(&[("labelSelector", selector)]);
        self.send(request).await
    }

    // ========== Internal HTTP helpers ==========

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> CliResult<T> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);

        if status == StatusCode::NOT_FOUND {
            Err(CliError::NotFound(message))
        } else {
            Err(CliError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// Lowercase plural used in resource paths, e.g. `workflows`
fn resource_segment<T: Resource>() -> String {
    format!("{}s", T::KIND.to_ascii_lowercase())
}

fn collection_path<T: Resource>(namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) => format!("/namespaces/{}/{}", ns, resource_segment::<T>()),
        None => format!("/{}", resource_segment::<T>()),
    }
}

fn object_path<T: Resource>(key: &ObjectKey) -> String {
    format!(
        "/namespaces/{}/{}/{}",
        key.namespace,
        resource_segment::<T>(),
        key.name
    )
}

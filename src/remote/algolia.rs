//! HTTP client for an Algolia-hosted index.

use super::credentials::{ElevatedSession, ReadCredential, WriteCredential};
use super::trait_def::{ConnectOutcome, RemoteError, RemoteIndex, RemoteResult, SearchOptions};
use crate::catalog::CatalogRecord;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connection settings for [`AlgoliaIndexClient`].
#[derive(Debug, Clone)]
pub struct AlgoliaConfig {
    pub app_id: String,
    pub index_name: String,
    /// Overrides `https://{app_id}-dsn.algolia.net`.
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl AlgoliaConfig {
    pub fn resolved_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}-dsn.algolia.net", self.app_id.to_lowercase()),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    hits_per_page: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filters: Option<&'static str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    hits: Vec<CatalogRecord>,
}

#[derive(Serialize)]
struct BatchOperation<'a> {
    action: &'static str,
    body: &'a CatalogRecord,
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    requests: Vec<BatchOperation<'a>>,
}

/// Remote index speaking the Algolia REST API.
pub struct AlgoliaIndexClient {
    client: Client,
    base_url: String,
    app_id: String,
    index_name: String,
    read_credential: RwLock<Option<ReadCredential>>,
}

fn transport_error(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Unavailable("request timed out".to_string())
    } else {
        RemoteError::Unavailable(e.to_string())
    }
}

/// Map a non-success status to the error taxonomy.
async fn status_error(response: Response, what: &str) -> RemoteError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RemoteError::PermissionDenied(format!("{} rejected with status {}: {}", what, status, body))
        }
        StatusCode::NOT_FOUND => RemoteError::NotFound(what.to_string()),
        _ => RemoteError::Unavailable(format!("{} failed with status {}: {}", what, status, body)),
    }
}

impl AlgoliaIndexClient {
    pub fn new(config: AlgoliaConfig) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RemoteError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.resolved_base_url(),
            app_id: config.app_id,
            index_name: config.index_name,
            read_credential: RwLock::new(None),
        })
    }

    fn index_url(&self, suffix: &str) -> String {
        format!(
            "{}/1/indexes/{}/{}",
            self.base_url,
            urlencoding::encode(&self.index_name),
            suffix
        )
    }

    fn object_url(&self, id: &str) -> String {
        self.index_url(&urlencoding::encode(id))
    }

    fn read_key(&self) -> RemoteResult<String> {
        let guard = self
            .read_credential
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match guard.as_ref() {
            Some(credential) => Ok(credential.expose().to_string()),
            None => Err(RemoteError::Unavailable(
                "not connected to the remote index".to_string(),
            )),
        }
    }

    /// Build a request authenticated with the session key, or the read key
    /// when there is no session.
    fn request(
        &self,
        method: Method,
        url: &str,
        session: Option<&ElevatedSession>,
    ) -> RemoteResult<RequestBuilder> {
        let api_key = match session {
            Some(session) => session.credential().expose().to_string(),
            None => self.read_key()?,
        };
        Ok(self
            .client
            .request(method, url)
            .header("X-Algolia-Application-Id", &self.app_id)
            .header("X-Algolia-API-Key", api_key))
    }

    async fn query(&self, query: &str, hits_per_page: usize, include_hidden: bool) -> RemoteResult<Vec<CatalogRecord>> {
        let body = QueryRequest {
            query,
            hits_per_page,
            filters: if include_hidden { None } else { Some("hidden:false") },
        };
        let response = self
            .request(Method::POST, &self.index_url("query"), None)?
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(response, "search").await);
        }
        let parsed: QueryResponse = response.json().await.map_err(|e| {
            RemoteError::Unavailable(format!("Failed to parse search response: {}", e))
        })?;
        Ok(parsed.hits)
    }
}

#[async_trait]
impl RemoteIndex for AlgoliaIndexClient {
    async fn connect(&self, credential: ReadCredential) -> ConnectOutcome {
        if self.app_id.trim().is_empty() {
            return ConnectOutcome::Unreachable("application id is not configured".to_string());
        }
        if credential.is_empty() {
            return ConnectOutcome::Unreachable("search key is not configured".to_string());
        }
        *self
            .read_credential
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(credential);

        match self.query("", 1, true).await {
            Ok(_) => {
                info!(index = %self.index_name, "Connected to remote index");
                ConnectOutcome::Connected
            }
            Err(e) => {
                warn!(index = %self.index_name, error = %e, "Remote index unreachable");
                ConnectOutcome::Unreachable(e.to_string())
            }
        }
    }

    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> RemoteResult<Vec<CatalogRecord>> {
        let hits_per_page = options.effective_hits_per_page(query);
        debug!(query, hits_per_page, "Searching remote index");
        self.query(query.trim(), hits_per_page, options.include_hidden)
            .await
    }

    async fn get_by_id(&self, id: &str) -> RemoteResult<Option<CatalogRecord>> {
        let response = self
            .request(Method::GET, &self.object_url(id), None)?
            .send()
            .await
            .map_err(transport_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(response, id).await);
        }
        let record = response.json().await.map_err(|e| {
            RemoteError::Unavailable(format!("Failed to parse record {}: {}", id, e))
        })?;
        Ok(Some(record))
    }

    async fn elevate(&self, credential: WriteCredential) -> RemoteResult<ElevatedSession> {
        if credential.expose().trim().is_empty() {
            return Err(RemoteError::PermissionDenied(
                "write credential is empty".to_string(),
            ));
        }
        let session = ElevatedSession::new(credential);
        debug!(session = %session.id(), "Elevated remote session");
        Ok(session)
    }

    async fn write(
        &self,
        record: &CatalogRecord,
        session: Option<&ElevatedSession>,
    ) -> RemoteResult<CatalogRecord> {
        let response = self
            .request(Method::PUT, &self.object_url(&record.id), session)?
            .json(record)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(response, &record.id).await);
        }
        Ok(record.clone())
    }

    async fn delete(&self, id: &str, session: Option<&ElevatedSession>) -> RemoteResult<()> {
        let response = self
            .request(Method::DELETE, &self.object_url(id), session)?
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(response, id).await);
        }
        Ok(())
    }

    async fn batch_write(
        &self,
        records: &[CatalogRecord],
        session: &ElevatedSession,
    ) -> RemoteResult<Vec<CatalogRecord>> {
        let body = BatchRequest {
            requests: records
                .iter()
                .map(|record| BatchOperation {
                    action: "updateObject",
                    body: record,
                })
                .collect(),
        };
        let response = self
            .request(Method::POST, &self.index_url("batch"), Some(session))?
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(response, "batch").await);
        }
        info!(count = records.len(), "Batch written to remote index");
        Ok(records.to_vec())
    }

    fn release(&self, session: ElevatedSession) {
        debug!(session = %session.id(), "Released remote session");
    }
}

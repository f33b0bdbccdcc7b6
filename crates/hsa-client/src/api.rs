use hsa_core::{
    ApifyJobStatus, HistoryEntry, HousingRequest, SearchCriteria, SearchResults,
    StartSearchResponse,
};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Failed to {operation}: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to {operation}: {status} {reason}")]
    Status {
        operation: &'static str,
        status: u16,
        reason: String,
    },
    #[error("Failed to {operation}: unreadable response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
    #[error("invalid backend url: {0}")]
    Url(String),
    #[error("invalid request: {0} is required")]
    MissingField(&'static str),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Thin client over the backend REST surface. Every call is single-shot:
/// no retries and no client-side timeout.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    pub fn parse(base_url: &str) -> Result<Self, ApiError> {
        let url = Url::parse(base_url.trim()).map_err(|err| ApiError::Url(err.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(ApiError::Url(format!("{base_url} cannot be a base url")));
        }
        Ok(Self::new(url))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn start_search(
        &self,
        request: &HousingRequest,
    ) -> Result<StartSearchResponse, ApiError> {
        const OP: &str = "start search";
        if let Some(field) = request.missing_field() {
            return Err(ApiError::MissingField(field));
        }
        let url = self.endpoint(&["api", "search", "start"])?;
        let response = self.http.post(url).json(request).send().await;
        decode_json(OP, ensure_success(OP, response)?).await
    }

    pub async fn get_search_status(&self, search_id: &str) -> Result<Value, ApiError> {
        const OP: &str = "get search status";
        let url = self.endpoint(&["api", "search", search_id, "status"])?;
        let response = self.http.get(url).send().await;
        decode_json(OP, ensure_success(OP, response)?).await
    }

    pub async fn get_search_results(&self, search_id: &str) -> Result<SearchResults, ApiError> {
        const OP: &str = "get search results";
        let url = self.endpoint(&["api", "search", search_id, "results"])?;
        let response = self.http.get(url).send().await;
        decode_json(OP, ensure_success(OP, response)?).await
    }

    pub async fn update_search_criteria(
        &self,
        search_id: &str,
        criteria: &SearchCriteria,
    ) -> Result<(), ApiError> {
        const OP: &str = "update criteria";
        let url = self.endpoint(&["api", "search", search_id, "criteria"])?;
        let response = self.http.put(url).json(criteria).send().await;
        ensure_success(OP, response)?;
        Ok(())
    }

    pub async fn get_search_history(&self) -> Result<Vec<HistoryEntry>, ApiError> {
        const OP: &str = "get search history";
        let url = self.endpoint(&["api", "search", "history"])?;
        let response = self.http.get(url).send().await;
        decode_json(OP, ensure_success(OP, response)?).await
    }

    pub async fn get_job_status(&self, job_id: &str) -> Result<ApifyJobStatus, ApiError> {
        const OP: &str = "get scrape job status";
        let url = self.endpoint(&["api", "apify", "job", job_id, "status"])?;
        let response = self.http.get(url).send().await;
        decode_json(OP, ensure_success(OP, response)?).await
    }

    /// Update stream endpoint for a search: same host, `ws`/`wss` scheme,
    /// path `/ws/search/{id}`.
    pub fn update_stream_url(&self, search_id: &str) -> Result<Url, ApiError> {
        let mut url = self.endpoint(&["ws", "search", search_id])?;
        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            "ws" | "wss" => return Ok(url),
            other => return Err(ApiError::Url(format!("unsupported scheme: {other}"))),
        };
        url.set_scheme(scheme)
            .map_err(|_| ApiError::Url(format!("cannot switch {} to {scheme}", url.scheme())))?;
        Ok(url)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|_| ApiError::Url(format!("{} cannot be a base url", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn ensure_success(
    operation: &'static str,
    response: Result<Response, reqwest::Error>,
) -> Result<Response, ApiError> {
    let response = response.map_err(|source| ApiError::Transport { operation, source })?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(ApiError::Status {
        operation,
        status: status.as_u16(),
        reason: status
            .canonical_reason()
            .unwrap_or("Unknown Status")
            .to_string(),
    })
}

async fn decode_json<T: DeserializeOwned>(
    operation: &'static str,
    response: Response,
) -> Result<T, ApiError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|source| ApiError::Transport { operation, source })?;
    serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode {
        operation,
        message: err.to_string(),
    })
}

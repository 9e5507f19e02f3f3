use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Identity of one remote counter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CounterPath {
    pub namespace: String,
    pub key: String,
}

impl CounterPath {
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for CounterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.key)
    }
}

/// Body returned by every counter route. The remote API is allowed to omit
/// any of these fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_value: Option<i64>,
}

impl CounterResponse {
    /// `"namespace/key"` when both halves are present.
    pub fn title(&self) -> Option<String> {
        match (&self.namespace, &self.key) {
            (Some(ns), Some(key)) => Some(format!("{ns}/{key}")),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("counter not found")]
    NotFound,
    #[error("request cancelled")]
    Cancelled,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("counter API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed counter response: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }
}

/// Remote counter service. Implementations are expected to be cheap to share
/// behind an `Arc`.
#[async_trait::async_trait]
pub trait CounterApi: Send + Sync + 'static {
    async fn get_counter(&self, path: &CounterPath) -> Result<CounterResponse, ApiError>;

    /// Create a counter. `None` leaves the starting value to the service.
    async fn create_counter(
        &self,
        path: &CounterPath,
        starting: Option<i64>,
    ) -> Result<CounterResponse, ApiError>;

    async fn increment_counter(&self, path: &CounterPath) -> Result<CounterResponse, ApiError>;

    async fn decrement_counter(&self, path: &CounterPath) -> Result<CounterResponse, ApiError>;
}

/// Handle bound to one (namespace, key) pair.
#[derive(Clone)]
pub struct CounterSession {
    path: CounterPath,
    api: Arc<dyn CounterApi>,
}

impl CounterSession {
    pub fn new(api: Arc<dyn CounterApi>, path: CounterPath) -> Self {
        Self { path, api }
    }

    pub fn path(&self) -> &CounterPath {
        &self.path
    }

    pub async fn value(&self) -> Result<CounterResponse, ApiError> {
        self.api.get_counter(&self.path).await
    }

    pub async fn create(&self, starting: Option<i64>) -> Result<CounterResponse, ApiError> {
        self.api.create_counter(&self.path, starting).await
    }

    pub async fn increment(&self) -> Result<CounterResponse, ApiError> {
        self.api.increment_counter(&self.path).await
    }

    pub async fn decrement(&self) -> Result<CounterResponse, ApiError> {
        self.api.decrement_counter(&self.path).await
    }
}

impl fmt::Debug for CounterSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterSession")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

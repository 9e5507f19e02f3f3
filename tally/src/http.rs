use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde_json::json;

use crate::api::{ApiError, CounterApi, CounterPath, CounterResponse};
use crate::config::{ConfigError, TallyConfig};

/// `CounterApi` over the counter service's JSON REST routes:
///
/// - `GET  {base}/{namespace}/{key}`
/// - `POST {base}/{namespace}/{key}` with `{"current_value": n}`
/// - `POST {base}/{namespace}/{key}/increment`
/// - `POST {base}/{namespace}/{key}/decrement`
#[derive(Clone)]
pub struct HttpCounterApi {
    base: Url,
    client: Client,
}

impl HttpCounterApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let base = Url::parse(base_url.trim())
            .map_err(|e| ConfigError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::InvalidBaseUrl(format!(
                "{base_url}: not a hierarchical URL"
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ConfigError::Client)?;
        Ok(Self { base, client })
    }

    pub fn from_config(config: &TallyConfig) -> Result<Self, ConfigError> {
        Self::new(
            &config.base_url,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &CounterPath, action: Option<&str>) -> Url {
        let mut url = self.base.clone();
        // `new` rejects cannot-be-a-base URLs, so this always succeeds.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&path.namespace).push(&path.key);
            if let Some(action) = action {
                segments.push(action);
            }
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<CounterResponse, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait::async_trait]
impl CounterApi for HttpCounterApi {
    async fn get_counter(&self, path: &CounterPath) -> Result<CounterResponse, ApiError> {
        tracing::debug!("GET counter {path}");
        self.send(self.client.get(self.endpoint(path, None))).await
    }

    async fn create_counter(
        &self,
        path: &CounterPath,
        starting: Option<i64>,
    ) -> Result<CounterResponse, ApiError> {
        tracing::debug!("create counter {path} starting={starting:?}");
        let body = match starting {
            Some(value) => json!({ "current_value": value }),
            None => json!({}),
        };
        self.send(self.client.post(self.endpoint(path, None)).json(&body))
            .await
    }

    async fn increment_counter(&self, path: &CounterPath) -> Result<CounterResponse, ApiError> {
        self.send(self.client.post(self.endpoint(path, Some("increment"))))
            .await
    }

    async fn decrement_counter(&self, path: &CounterPath) -> Result<CounterResponse, ApiError> {
        self.send(self.client.post(self.endpoint(path, Some("decrement"))))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::Json;
    use axum::Router;
    use axum::extract::Path;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use serde_json::Value;

    fn api(base: &str) -> HttpCounterApi {
        HttpCounterApi::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn endpoint_joins_segments() {
        let api = api("https://letscountapi.com");
        let p = CounterPath::new("INFO6350", "dan.magnusson");
        assert_eq!(
            api.endpoint(&p, None).as_str(),
            "https://letscountapi.com/INFO6350/dan.magnusson"
        );
        assert_eq!(
            api.endpoint(&p, Some("increment")).as_str(),
            "https://letscountapi.com/INFO6350/dan.magnusson/increment"
        );
    }

    #[test]
    fn endpoint_keeps_base_path_and_escapes() {
        let api = api("http://localhost:8080/api/");
        let p = CounterPath::new("a b", "c/d");
        assert_eq!(
            api.endpoint(&p, Some("decrement")).as_str(),
            "http://localhost:8080/api/a%20b/c%2Fd/decrement"
        );
    }

    #[test]
    fn rejects_bad_base_url() {
        assert!(matches!(
            HttpCounterApi::new("not a url", Duration::from_secs(1)),
            Err(ConfigError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            HttpCounterApi::new("mailto:someone@example.com", Duration::from_secs(1)),
            Err(ConfigError::InvalidBaseUrl(_))
        ));
    }

    async fn lookup(Path((ns, key)): Path<(String, String)>) -> Result<Json<Value>, AxumStatus> {
        if ns == "INFO6350" && key == "dan.magnusson" {
            Ok(Json(json!({ "namespace": ns, "key": key, "current_value": 5 })))
        } else if ns == "broken" {
            Err(AxumStatus::INTERNAL_SERVER_ERROR)
        } else {
            Err(AxumStatus::NOT_FOUND)
        }
    }

    async fn create(Path((ns, key)): Path<(String, String)>, Json(body): Json<Value>) -> Json<Value> {
        let start = body.get("current_value").and_then(Value::as_i64).unwrap_or(0);
        Json(json!({ "namespace": ns, "key": key, "current_value": start }))
    }

    async fn increment(Path((ns, key)): Path<(String, String)>) -> Json<Value> {
        Json(json!({ "namespace": ns, "key": key, "current_value": 6 }))
    }

    async fn decrement(Path((ns, key)): Path<(String, String)>) -> Json<Value> {
        Json(json!({ "namespace": ns, "key": key, "current_value": 4 }))
    }

    async fn serve() -> String {
        let app = Router::new()
            .route("/{ns}/{key}", get(lookup).post(create))
            .route("/{ns}/{key}/increment", post(increment))
            .route("/{ns}/{key}/decrement", post(decrement));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn get_existing_counter() {
        let api = api(&serve().await);
        let r = api
            .get_counter(&CounterPath::new("INFO6350", "dan.magnusson"))
            .await
            .unwrap();
        assert_eq!(r.current_value, Some(5));
        assert_eq!(r.title().as_deref(), Some("INFO6350/dan.magnusson"));
    }

    #[tokio::test]
    async fn missing_counter_maps_to_not_found() {
        let api = api(&serve().await);
        let err = api
            .get_counter(&CounterPath::new("INFO6350", "newkey"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn server_error_keeps_status() {
        let api = api(&serve().await);
        let err = api
            .get_counter(&CounterPath::new("broken", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn create_with_and_without_starting_value() {
        let api = api(&serve().await);
        let p = CounterPath::new("INFO6350", "newkey");
        assert_eq!(api.create_counter(&p, Some(10)).await.unwrap().current_value, Some(10));
        assert_eq!(api.create_counter(&p, None).await.unwrap().current_value, Some(0));
    }

    #[tokio::test]
    async fn increment_and_decrement_routes() {
        let api = api(&serve().await);
        let p = CounterPath::new("INFO6350", "dan.magnusson");
        assert_eq!(api.increment_counter(&p).await.unwrap().current_value, Some(6));
        assert_eq!(api.decrement_counter(&p).await.unwrap().current_value, Some(4));
    }
}

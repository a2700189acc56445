use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use reqwest::multipart::{Form, Part};

use super::response::RawServiceResponse;
use super::AnalysisError;
use crate::config::{ClientConfig, ConfigError, ANALYZE_PATH, UPLOAD_FIELD};
use crate::intake::ImageFile;

/// Anything that can turn an image into a service response.
pub trait AnalysisBackend: Send + Sync {
    fn analyze(
        &self,
        image: &ImageFile,
    ) -> impl Future<Output = Result<RawServiceResponse, AnalysisError>> + Send;
}

/// HTTP client for the remote classification service.
///
/// Endpoints are tried strictly in order. Only a missing response (connection
/// refused, DNS failure, reset) moves on to the next endpoint; the first HTTP
/// response of any status ends the attempt.
pub struct AnalysisClient {
    endpoints: Vec<String>,
    client: reqwest::Client,
}

impl AnalysisClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let mut builder = reqwest::Client::builder();
        if !config.uses_system_proxy() {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            endpoints: config.endpoints().to_vec(),
            client,
        })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    fn analyze_url(endpoint: &str) -> String {
        format!("{endpoint}{ANALYZE_PATH}")
    }

    /// Multipart body with the image under the `image` field.
    /// Built per attempt: a sent form cannot be reused.
    fn build_form(image: &ImageFile) -> Form {
        let part = Part::bytes(image.bytes().to_vec()).file_name(image.name().to_string());
        let part = match part.mime_str(image.mime_type()) {
            Ok(part) => part,
            Err(e) => {
                tracing::debug!(mime_type = %image.mime_type(), error = %e, "Unparseable MIME type, sending without content type");
                Part::bytes(image.bytes().to_vec()).file_name(image.name().to_string())
            }
        };
        Form::new().part(UPLOAD_FIELD, part)
    }

    async fn read_response(
        url: &str,
        response: reqwest::Response,
    ) -> Result<RawServiceResponse, AnalysisError> {
        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!(url = %url, error = %e, "Could not read error response body");
                    String::new()
                }
            };
            tracing::warn!(url = %url, status = status.as_u16(), "Analysis service returned error");
            return Err(AnalysisError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;
        let raw = RawServiceResponse::from_slice(&bytes)?;
        tracing::debug!(url = %url, shape = raw.shape().name(), "Analysis response received");
        Ok(raw)
    }
}

impl AnalysisBackend for AnalysisClient {
    async fn analyze(&self, image: &ImageFile) -> Result<RawServiceResponse, AnalysisError> {
        let mut last_failure: Option<(String, String)> = None;

        for endpoint in &self.endpoints {
            let url = Self::analyze_url(endpoint);
            tracing::debug!(url = %url, file = %image.name(), "Submitting image for analysis");

            match self
                .client
                .post(&url)
                .multipart(Self::build_form(image))
                .send()
                .await
            {
                Ok(response) => return Self::read_response(&url, response).await,
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Analysis endpoint unreachable");
                    last_failure = Some((url, e.to_string()));
                }
            }
        }

        let (endpoint, reason) = last_failure
            .unwrap_or_else(|| ("<none>".to_string(), "no endpoints configured".to_string()));
        Err(AnalysisError::Network { endpoint, reason })
    }
}

/// Scripted backend for tests. Replays queued outcomes in call order,
/// each after an optional delay.
pub struct MockAnalysisBackend {
    script: Mutex<VecDeque<(Duration, Result<RawServiceResponse, AnalysisError>)>>,
    submitted: Mutex<Vec<String>>,
}

impl MockAnalysisBackend {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn responding(body: serde_json::Value) -> Self {
        Self::new().then(Duration::ZERO, Ok(RawServiceResponse::from_value(body)))
    }

    pub fn failing(error: AnalysisError) -> Self {
        Self::new().then(Duration::ZERO, Err(error))
    }

    /// Queue one more outcome.
    pub fn then(
        self,
        delay: Duration,
        outcome: Result<RawServiceResponse, AnalysisError>,
    ) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back((delay, outcome));
        self
    }

    /// Names of submitted files, in call order.
    pub fn submitted(&self) -> Vec<String> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn calls(&self) -> usize {
        self.submitted().len()
    }
}

impl Default for MockAnalysisBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisBackend for MockAnalysisBackend {
    async fn analyze(&self, image: &ImageFile) -> Result<RawServiceResponse, AnalysisError> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(image.name().to_string());

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let Some((delay, outcome)) = next else {
            return Err(AnalysisError::Network {
                endpoint: "mock".to_string(),
                reason: "script exhausted".to_string(),
            });
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::{truncated_body_endpoint, unreachable_endpoint, MockService};

    fn jpeg() -> ImageFile {
        ImageFile::new("chest.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0])
    }

    fn client_for(endpoints: &[String]) -> AnalysisClient {
        let config = ClientConfig::new(endpoints).unwrap().without_system_proxy();
        AnalysisClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn posts_image_field_to_analyze_path() {
        let service = MockService::json(200, json!({"examType": "Raio-X", "confidence": 94})).await;
        let client = client_for(&[service.base_url()]);

        let raw = client.analyze(&jpeg()).await.unwrap();
        assert_eq!(raw.body()["examType"], "Raio-X");

        let uploads = service.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].field, "image");
        assert_eq!(uploads[0].file_name.as_deref(), Some("chest.jpg"));
        assert_eq!(uploads[0].content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(uploads[0].bytes, vec![0xFF, 0xD8, 0xFF, 0xE0]);
    }

    #[tokio::test]
    async fn unreachable_endpoint_falls_through_to_next() {
        let dead = unreachable_endpoint().await;
        let service = MockService::json(200, json!({"diagnosis": "Normal"})).await;
        let client = client_for(&[dead, service.base_url()]);

        let raw = client.analyze(&jpeg()).await.unwrap();
        assert_eq!(raw.body()["diagnosis"], "Normal");
        assert_eq!(service.hits(), 1);
    }

    #[tokio::test]
    async fn error_status_is_terminal() {
        let failing = MockService::text(500, "model crashed").await;
        let healthy = MockService::json(200, json!({"diagnosis": "Normal"})).await;
        let client = client_for(&[failing.base_url(), healthy.base_url()]);

        let err = client.analyze(&jpeg()).await.unwrap_err();
        match err {
            AnalysisError::Service { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "model crashed");
            }
            other => panic!("expected service error, got {other:?}"),
        }
        assert_eq!(failing.hits(), 1);
        assert_eq!(healthy.hits(), 0);
    }

    #[tokio::test]
    async fn unreadable_error_body_still_reports_status() {
        let endpoint = truncated_body_endpoint(503).await;
        let client = client_for(&[endpoint]);

        let err = client.analyze(&jpeg()).await.unwrap_err();
        match err {
            AnalysisError::Service { status, body } => {
                assert_eq!(status, 503);
                assert!(body.is_empty());
            }
            other => panic!("expected service error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn first_success_stops_iteration() {
        let first = MockService::json(200, json!({"diagnosis": "A"})).await;
        let second = MockService::json(200, json!({"diagnosis": "B"})).await;
        let client = client_for(&[first.base_url(), second.base_url()]);

        let raw = client.analyze(&jpeg()).await.unwrap();
        assert_eq!(raw.body()["diagnosis"], "A");
        assert_eq!(second.hits(), 0);
    }

    #[tokio::test]
    async fn all_unreachable_reports_last_endpoint() {
        let first = unreachable_endpoint().await;
        let last = unreachable_endpoint().await;
        let client = client_for(&[first, last.clone()]);

        let err = client.analyze(&jpeg()).await.unwrap_err();
        match err {
            AnalysisError::Network { endpoint, .. } => {
                assert_eq!(endpoint, format!("{last}/analyze"));
            }
            other => panic!("expected network error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_body_is_malformed() {
        let service = MockService::text(200, "<html>ok</html>").await;
        let client = client_for(&[service.base_url()]);

        let err = client.analyze(&jpeg()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));
    }

    #[test]
    fn analyze_url_appends_path() {
        assert_eq!(
            AnalysisClient::analyze_url("http://localhost:5000"),
            "http://localhost:5000/analyze"
        );
    }

    #[tokio::test]
    async fn mock_backend_replays_script_in_order() {
        let backend = MockAnalysisBackend::responding(json!({"diagnosis": "A"})).then(
            Duration::ZERO,
            Err(AnalysisError::MalformedResponse("bad".into())),
        );

        assert!(backend.analyze(&jpeg()).await.is_ok());
        assert!(backend.analyze(&jpeg()).await.is_err());
        assert!(matches!(
            backend.analyze(&jpeg()).await,
            Err(AnalysisError::Network { .. })
        ));
        assert_eq!(backend.calls(), 3);
    }
}

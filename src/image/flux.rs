//! FLUX.2 [PRO] client for the Black Forest Labs API.
//!
//! Generation is asynchronous on the server side: the request is submitted,
//! the returned task is polled until it settles, and the finished image is
//! downloaded from the signed sample URL.

use crate::error::{FluxError, Result};
use crate::image::types::{GeneratedImage, GenerationMetadata, GenerationRequest, ImageFormat};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.bfl.ai";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "BFL_API_KEY";

const MODEL: &str = "flux-2-pro";
const GENERATE_PATH: &str = "/v1/flux-2-pro";
const RESULT_PATH: &str = "/v1/get_result";

/// Builder for [`FluxClient`].
#[derive(Debug, Clone)]
pub struct FluxClientBuilder {
    api_key: Option<String>,
    http_client: Option<reqwest::Client>,
    base_url: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl Default for FluxClientBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            http_client: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(2),
            max_poll_attempts: 120,
        }
    }
}

impl FluxClientBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Defaults to the `BFL_API_KEY` environment variable.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Uses a preconfigured HTTP client (proxies, timeouts, TLS).
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Overrides the API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the delay between result polls.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets how many times the result is polled before giving up.
    pub fn max_poll_attempts(mut self, attempts: u32) -> Self {
        self.max_poll_attempts = attempts.max(1);
        self
    }

    /// Builds the client, failing if no API key is available.
    pub fn build(self) -> Result<FluxClient> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                FluxError::Auth(format!("{API_KEY_ENV} not set and no API key provided"))
            })?;

        Ok(FluxClient {
            client: self.http_client.unwrap_or_default(),
            api_key,
            base_url: self.base_url,
            poll_interval: self.poll_interval,
            max_poll_attempts: self.max_poll_attempts,
        })
    }
}

/// Client for FLUX.2 [PRO] generation and editing.
pub struct FluxClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl FluxClient {
    /// Returns a builder.
    pub fn builder() -> FluxClientBuilder {
        FluxClientBuilder::new()
    }

    /// Name of the model endpoint this client calls.
    pub fn model(&self) -> &'static str {
        MODEL
    }

    /// Submits a request, waits for it to finish and downloads the image.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let start = Instant::now();

        let submitted = self.submit(request).await?;
        tracing::info!(
            task_id = %submitted.id,
            cost = ?submitted.cost,
            output_mp = ?submitted.output_mp,
            "submitted generation request"
        );

        let poll_url = submitted
            .polling_url
            .clone()
            .unwrap_or_else(|| self.result_url(&submitted.id));
        let result = self.poll_until_ready(&poll_url).await?;

        let sample = result.sample.ok_or_else(|| FluxError::Api {
            status: 500,
            message: "Ready status but no sample URL".into(),
        })?;
        tracing::debug!(url = %sample, "generation complete");

        let data = self.download(&sample).await?;
        let format = ImageFormat::from_magic_bytes(&data).unwrap_or(request.format);

        Ok(GeneratedImage::new(
            data,
            format,
            GenerationMetadata {
                model: Some(MODEL.to_string()),
                task_id: Some(submitted.id),
                seed: result.seed.or(request.seed),
                cost: submitted.cost,
                output_mp: submitted.output_mp,
                duration_ms: Some(start.elapsed().as_millis() as u64),
            },
        ))
    }

    /// Checks that the API key is accepted.
    pub async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(self.result_url("health-check"))
            .header("x-key", &self.api_key)
            .send()
            .await?;

        match response.status().as_u16() {
            401 | 403 => Err(FluxError::Auth("Invalid API key".into())),
            _ => Ok(()),
        }
    }

    fn result_url(&self, task_id: &str) -> String {
        format!("{}{}?id={}", self.base_url, RESULT_PATH, task_id)
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<FluxSubmitResponse> {
        let url = format!("{}{}", self.base_url, GENERATE_PATH);
        let body = FluxRequest::from_generation_request(request);
        tracing::debug!(
            url = %url,
            resolution = %request.resolution,
            edit = request.is_edit(),
            "submitting task"
        );

        let response = self
            .client
            .post(&url)
            .header("x-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => FluxError::Auth(text),
                code => FluxError::Api {
                    status: code,
                    message: text,
                },
            });
        }

        Ok(response.json().await?)
    }

    async fn poll_until_ready(&self, url: &str) -> Result<FluxResult> {
        for attempt in 1..=self.max_poll_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.poll_interval).await;
            }

            let response = self
                .client
                .get(url)
                .header("x-key", &self.api_key)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                tracing::warn!(attempt, status = status.as_u16(), "poll request failed");
                continue;
            }

            let result: FluxResultResponse = response.json().await?;
            match TaskStatus::parse(&result.status) {
                TaskStatus::Ready => {
                    return result.result.ok_or_else(|| FluxError::Api {
                        status: 500,
                        message: "Ready status but no result".into(),
                    });
                }
                TaskStatus::InProgress => {
                    tracing::debug!(
                        attempt,
                        max = self.max_poll_attempts,
                        status = %result.status,
                        "task not ready"
                    );
                }
                TaskStatus::Failed => {
                    let message = result
                        .error
                        .or_else(|| result.result.and_then(|r| r.error))
                        .unwrap_or_else(|| "Unknown error".into());
                    return Err(FluxError::Api {
                        status: 500,
                        message,
                    });
                }
                TaskStatus::Moderated => {
                    return Err(FluxError::ContentBlocked(result.status));
                }
                TaskStatus::NotFound => {
                    return Err(FluxError::Api {
                        status: 404,
                        message: result.status,
                    });
                }
                TaskStatus::Unknown => {
                    tracing::warn!(attempt, status = %result.status, "unknown task status");
                }
            }
        }

        Err(FluxError::Timeout(self.poll_budget()))
    }

    /// Total time polling may take, saturating at `Duration::MAX`.
    fn poll_budget(&self) -> Duration {
        self.poll_interval
            .checked_mul(self.max_poll_attempts)
            .unwrap_or(Duration::MAX)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            if response.status().as_u16() == 403 || response.status().as_u16() == 410 {
                return Err(FluxError::UrlExpired);
            }
            return Err(FluxError::Api {
                status: response.status().as_u16(),
                message: "Failed to download image".into(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Task states reported by the result endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskStatus {
    Ready,
    InProgress,
    Failed,
    Moderated,
    NotFound,
    Unknown,
}

impl TaskStatus {
    fn parse(status: &str) -> Self {
        match status {
            "Ready" => Self::Ready,
            "Pending" | "Processing" | "Queued" => Self::InProgress,
            "Error" | "Failed" => Self::Failed,
            "Content Moderated" | "Request Moderated" => Self::Moderated,
            "Task not found" => Self::NotFound,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Serialize)]
struct FluxRequest {
    prompt: String,
    width: u32,
    height: u32,
    output_format: ImageFormat,
    safety_tolerance: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    /// Input image for editing, as a data URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    input_image: Option<String>,
}

impl FluxRequest {
    fn from_generation_request(req: &GenerationRequest) -> Self {
        Self {
            prompt: req.prompt.clone(),
            width: req.resolution.width(),
            height: req.resolution.height(),
            output_format: req.format,
            safety_tolerance: req.safety_tolerance,
            seed: req.seed,
            input_image: req.input_image.as_ref().map(|img| img.to_data_url()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FluxSubmitResponse {
    id: String,
    #[serde(default)]
    polling_url: Option<String>,
    #[serde(default)]
    cost: Option<f64>,
    #[serde(default)]
    output_mp: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FluxResultResponse {
    status: String,
    #[serde(default)]
    result: Option<FluxResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FluxResult {
    #[serde(default)]
    sample: Option<String>,
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::types::InputImage;
    use crate::resolution::{resolve, ResolutionRequest};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const PNG_BYTES: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    fn request(preset: &str) -> GenerationRequest {
        let resolution = resolve(&ResolutionRequest::preset(preset)).unwrap();
        GenerationRequest::new("A lighthouse at dusk", resolution)
    }

    struct Canned {
        status: u16,
        body: Vec<u8>,
    }

    impl Canned {
        fn json(status: u16, body: &str) -> Self {
            Self {
                status,
                body: body.as_bytes().to_vec(),
            }
        }
    }

    /// Serves one canned response per connection, in order, and returns the
    /// raw requests it received.
    async fn serve(
        listener: TcpListener,
        responses: Vec<Canned>,
    ) -> tokio::task::JoinHandle<Vec<String>> {
        tokio::spawn(async move {
            let mut seen = Vec::new();
            for canned in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    let text = String::from_utf8_lossy(&buf);
                    if let Some(end) = text.find("\r\n\r\n") {
                        let length = text[..end]
                            .lines()
                            .find_map(|l| {
                                l.to_ascii_lowercase()
                                    .strip_prefix("content-length:")
                                    .map(|v| v.trim().parse::<usize>().unwrap())
                            })
                            .unwrap_or(0);
                        if buf.len() >= end + 4 + length {
                            break;
                        }
                    }
                }
                seen.push(String::from_utf8_lossy(&buf).into_owned());

                let head = format!(
                    "HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                    canned.status,
                    canned.body.len()
                );
                socket.write_all(head.as_bytes()).await.unwrap();
                socket.write_all(&canned.body).await.unwrap();
                socket.shutdown().await.unwrap();
            }
            seen
        })
    }

    async fn listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        (listener, base)
    }

    fn client(base: &str, attempts: u32) -> FluxClient {
        FluxClient::builder()
            .api_key("bfl-test")
            .http_client(reqwest::Client::builder().no_proxy().build().unwrap())
            .base_url(base)
            .poll_interval(Duration::from_millis(1))
            .max_poll_attempts(attempts)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let client = FluxClientBuilder::new().api_key("bfl-test").build().unwrap();
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
        assert_eq!(client.max_poll_attempts, 120);
        assert_eq!(client.model(), "flux-2-pro");
    }

    #[test]
    fn test_builder_trims_base_url() {
        let client = FluxClientBuilder::new()
            .api_key("bfl-test")
            .base_url("http://localhost:9000/")
            .build()
            .unwrap();
        assert_eq!(
            client.result_url("abc"),
            "http://localhost:9000/v1/get_result?id=abc"
        );
    }

    #[test]
    fn test_task_status_parse() {
        assert_eq!(TaskStatus::parse("Ready"), TaskStatus::Ready);
        assert_eq!(TaskStatus::parse("Pending"), TaskStatus::InProgress);
        assert_eq!(TaskStatus::parse("Queued"), TaskStatus::InProgress);
        assert_eq!(TaskStatus::parse("Error"), TaskStatus::Failed);
        assert_eq!(TaskStatus::parse("Request Moderated"), TaskStatus::Moderated);
        assert_eq!(TaskStatus::parse("Task not found"), TaskStatus::NotFound);
        assert_eq!(TaskStatus::parse("Sleeping"), TaskStatus::Unknown);
    }

    #[test]
    fn test_request_construction() {
        let req = request("16:9").with_seed(42).with_format(ImageFormat::Jpeg);
        let body = serde_json::to_value(FluxRequest::from_generation_request(&req)).unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "prompt": "A lighthouse at dusk",
                "width": 1920,
                "height": 1088,
                "output_format": "jpeg",
                "safety_tolerance": 5,
                "seed": 42
            })
        );
    }

    #[test]
    fn test_request_serialization_skips_none() {
        let req = request("1:1");
        let body = serde_json::to_value(FluxRequest::from_generation_request(&req)).unwrap();
        assert!(body.get("seed").is_none());
        assert!(body.get("input_image").is_none());
        assert_eq!(body["output_format"], "png");
    }

    #[test]
    fn test_edit_request_construction() {
        let req = request("1:1").with_input_image(InputImage {
            data: PNG_BYTES.to_vec(),
            mime_type: "image/png".into(),
        });
        let flux_req = FluxRequest::from_generation_request(&req);
        assert!(flux_req
            .input_image
            .unwrap()
            .starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_response_deserialization() {
        let submit: FluxSubmitResponse = serde_json::from_str(
            r#"{"id": "task-1", "polling_url": "https://api.bfl.ai/v1/get_result?id=task-1", "cost": 4.5, "output_mp": 1.77}"#,
        )
        .unwrap();
        assert_eq!(submit.id, "task-1");
        assert_eq!(submit.cost, Some(4.5));

        let minimal: FluxSubmitResponse = serde_json::from_str(r#"{"id": "task-2"}"#).unwrap();
        assert!(minimal.polling_url.is_none());

        let ready: FluxResultResponse = serde_json::from_str(
            r#"{"status": "Ready", "result": {"sample": "https://cdn/x.png", "seed": 7}}"#,
        )
        .unwrap();
        let result = ready.result.unwrap();
        assert_eq!(result.sample.as_deref(), Some("https://cdn/x.png"));
        assert_eq!(result.seed, Some(7));

        let pending: FluxResultResponse =
            serde_json::from_str(r#"{"status": "Pending", "result": null}"#).unwrap();
        assert!(pending.result.is_none());
    }

    #[tokio::test]
    async fn test_generate_end_to_end() {
        let (listener, base) = listener().await;
        let sample = format!("{base}/sample.png");
        let server = serve(
            listener,
            vec![
                Canned::json(200, r#"{"id": "task-1", "cost": 3.0}"#),
                Canned::json(200, r#"{"status": "Pending"}"#),
                Canned::json(502, "bad gateway"),
                Canned::json(
                    200,
                    &format!(r#"{{"status": "Ready", "result": {{"sample": "{sample}", "seed": 99}}}}"#),
                ),
                Canned {
                    status: 200,
                    body: PNG_BYTES.to_vec(),
                },
            ],
        )
        .await;

        let image = client(&base, 5)
            .generate(&request("4:3").with_format(ImageFormat::Jpeg))
            .await
            .unwrap();

        assert_eq!(image.data, PNG_BYTES);
        assert_eq!(image.format, ImageFormat::Png);
        assert_eq!(image.metadata.task_id.as_deref(), Some("task-1"));
        assert_eq!(image.metadata.seed, Some(99));
        assert_eq!(image.metadata.cost, Some(3.0));

        let seen = server.await.unwrap();
        assert_eq!(seen.len(), 5);
        assert!(seen[0].starts_with("POST /v1/flux-2-pro "));
        assert!(seen[0].to_ascii_lowercase().contains("x-key: bfl-test"));
        assert!(seen[0].contains(r#""width":1536"#));
        assert!(seen[0].contains(r#""height":1152"#));
        assert!(seen[1].starts_with("GET /v1/get_result?id=task-1 "));
        assert!(seen[4].starts_with("GET /sample.png "));
    }

    #[tokio::test]
    async fn test_generate_moderated() {
        let (listener, base) = listener().await;
        let server = serve(
            listener,
            vec![
                Canned::json(200, r#"{"id": "task-1"}"#),
                Canned::json(200, r#"{"status": "Content Moderated"}"#),
            ],
        )
        .await;

        let err = client(&base, 5).generate(&request("1:1")).await.unwrap_err();
        assert!(matches!(err, FluxError::ContentBlocked(ref s) if s == "Content Moderated"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_generate_task_error() {
        let (listener, base) = listener().await;
        let server = serve(
            listener,
            vec![
                Canned::json(200, r#"{"id": "task-1"}"#),
                Canned::json(200, r#"{"status": "Error", "error": "GPU on fire"}"#),
            ],
        )
        .await;

        let err = client(&base, 5).generate(&request("1:1")).await.unwrap_err();
        assert!(matches!(err, FluxError::Api { ref message, .. } if message == "GPU on fire"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_generate_times_out() {
        let (listener, base) = listener().await;
        let server = serve(
            listener,
            vec![
                Canned::json(200, r#"{"id": "task-1"}"#),
                Canned::json(200, r#"{"status": "Processing"}"#),
                Canned::json(200, r#"{"status": "Processing"}"#),
            ],
        )
        .await;

        let err = client(&base, 2).generate(&request("1:1")).await.unwrap_err();
        assert!(matches!(err, FluxError::Timeout(d) if d == Duration::from_millis(2)));
        server.await.unwrap();
    }

    #[test]
    fn test_poll_budget_saturates() {
        let client = FluxClientBuilder::new()
            .api_key("bfl-test")
            .poll_interval(Duration::MAX)
            .max_poll_attempts(3)
            .build()
            .unwrap();
        assert_eq!(client.poll_budget(), Duration::MAX);

        let client = FluxClientBuilder::new().api_key("bfl-test").build().unwrap();
        assert_eq!(client.poll_budget(), Duration::from_secs(240));
    }

    #[tokio::test]
    async fn test_submit_rejected_key() {
        let (listener, base) = listener().await;
        let server = serve(listener, vec![Canned::json(401, r#"{"detail": "bad key"}"#)]).await;

        let err = client(&base, 1).generate(&request("1:1")).await.unwrap_err();
        assert!(matches!(err, FluxError::Auth(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_download_expired() {
        let (listener, base) = listener().await;
        let sample = format!("{base}/gone.png");
        let server = serve(
            listener,
            vec![
                Canned::json(200, &format!(r#"{{"id": "t", "polling_url": "{base}/poll/t"}}"#)),
                Canned::json(
                    200,
                    &format!(r#"{{"status": "Ready", "result": {{"sample": "{sample}"}}}}"#),
                ),
                Canned::json(410, ""),
            ],
        )
        .await;

        let err = client(&base, 1).generate(&request("1:1")).await.unwrap_err();
        assert!(matches!(err, FluxError::UrlExpired));
        let seen = server.await.unwrap();
        assert!(seen[1].starts_with("GET /poll/t "));
    }

    #[tokio::test]
    async fn test_health_check() {
        let (listener, base) = listener().await;
        let server = serve(
            listener,
            vec![
                Canned::json(404, r#"{"status": "Task not found"}"#),
                Canned::json(403, ""),
            ],
        )
        .await;

        let client = client(&base, 1);
        assert!(client.health_check().await.is_ok());
        assert!(matches!(
            client.health_check().await,
            Err(FluxError::Auth(_))
        ));
        server.await.unwrap();
    }
}

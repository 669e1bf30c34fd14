//! Remote image-generation service boundary.
//!
//! All backends implement [`ImageGenerationClient`], so the session is
//! decoupled from where variants actually come from.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use campaign_core::GenerationServiceConfig;
use image::{ImageFormat, Rgb, RgbImage};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use url::Url;

use crate::error::ClientError;
use crate::intake::data_uri;
use crate::types::{BatchRequest, Intake, RemoteId, RemoteVariant};

/// Request/response contract of the generation service.
#[async_trait]
pub trait ImageGenerationClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Convert the intake into the payload sent with the batch request.
    /// Defaults to the intake's base64 data-URI.
    async fn upload_image(&self, intake: &Intake) -> Result<String, ClientError> {
        Ok(intake.encoded_payload().to_string())
    }

    /// One request, one batched reply. No partial delivery.
    async fn generate_batch(&self, request: &BatchRequest)
        -> Result<Vec<RemoteVariant>, ClientError>;
}

// ─── HTTP ─────────────────────────────────────────────────────────────

/// JSON-over-HTTP client for the generation service.
pub struct HttpGenerationClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpGenerationClient {
    pub fn new(config: &GenerationServiceConfig) -> Result<Self, ClientError> {
        let endpoint = format!(
            "{}/{}",
            config.base_url.trim_end_matches('/'),
            config.batch_path.trim_start_matches('/')
        );
        let endpoint =
            Url::parse(&endpoint).map_err(|e| ClientError::Endpoint(format!("{endpoint}: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        info!(endpoint = %endpoint, "generation service client configured");
        Ok(Self {
            http,
            endpoint,
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ImageGenerationClient for HttpGenerationClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate_batch(
        &self,
        request: &BatchRequest,
    ) -> Result<Vec<RemoteVariant>, ClientError> {
        let mut builder = self.http.post(self.endpoint.clone()).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        debug!(
            endpoint = %self.endpoint,
            variations = request.num_variations,
            "sending generation batch"
        );
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = error_message(&body)
                .unwrap_or_else(|| truncate_text(body.trim(), 512));
            let message = if message.is_empty() {
                format!("generation failed with status {status}")
            } else {
                message
            };
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }

        parse_batch_body(&body)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BatchBody {
    List(Vec<RemoteVariant>),
    Wrapped {
        #[serde(alias = "variations")]
        images: Vec<RemoteVariant>,
    },
}

/// Parse a batch reply: either a bare array or `{ "images": [...] }`.
pub fn parse_batch_body(body: &str) -> Result<Vec<RemoteVariant>, ClientError> {
    let parsed: BatchBody = serde_json::from_str(body)
        .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
    Ok(match parsed {
        BatchBody::List(images) | BatchBody::Wrapped { images } => images,
    })
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .error
        .or(parsed.message)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

// ─── Dry run ──────────────────────────────────────────────────────────

const DRYRUN_SIZE: u32 = 64;
const DRYRUN_KINDS: [&str; 3] = ["Lifestyle", "Studio", "Social"];

/// Offline backend: returns solid-color PNG variants tinted from the prompt.
pub struct DryRunClient {
    latency: Duration,
}

impl DryRunClient {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for DryRunClient {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

#[async_trait]
impl ImageGenerationClient for DryRunClient {
    fn name(&self) -> &str {
        "dryrun"
    }

    async fn generate_batch(
        &self,
        request: &BatchRequest,
    ) -> Result<Vec<RemoteVariant>, ClientError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        (0..request.num_variations)
            .map(|idx| {
                let image = dryrun_png(&request.prompt, idx)?;
                Ok(RemoteVariant {
                    id: Some(RemoteId::Number(u64::from(idx) + 1)),
                    image: data_uri("image/png", &image),
                    prompt: Some(request.prompt.clone()),
                    score: Some(f64::from(92u32.saturating_sub(idx * 7).max(50))),
                    kind: Some(DRYRUN_KINDS[idx as usize % DRYRUN_KINDS.len()].to_string()),
                })
            })
            .collect()
    }
}

fn dryrun_png(prompt: &str, idx: u32) -> Result<Vec<u8>, ClientError> {
    let (r, g, b) = color_from_prompt(prompt, idx);
    let image = RgbImage::from_pixel(DRYRUN_SIZE, DRYRUN_SIZE, Rgb([r, g, b]));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| ClientError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

fn color_from_prompt(prompt: &str, idx: u32) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(idx.to_be_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::decode_image;

    #[test]
    fn test_parse_batch_body_shapes() {
        let bare = parse_batch_body(r#"[{"id": 1, "image": "AA==", "score": 91}]"#).unwrap();
        assert_eq!(bare.len(), 1);

        let wrapped =
            parse_batch_body(r#"{"images": [{"image": "AA=="}, {"image": "AQ=="}]}"#).unwrap();
        assert_eq!(wrapped.len(), 2);

        let aliased = parse_batch_body(r#"{"variations": [{"image": "AA=="}]}"#).unwrap();
        assert_eq!(aliased.len(), 1);

        assert!(matches!(
            parse_batch_body(r#"{"status": "queued"}"#),
            Err(ClientError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"error": "model overloaded"}"#).as_deref(),
            Some("model overloaded")
        );
        assert_eq!(
            error_message(r#"{"message": " bad image "}"#).as_deref(),
            Some("bad image")
        );
        assert!(error_message("<html>502</html>").is_none());
        assert_eq!(truncate_text("abcdef", 3), "abc…");
    }

    #[test]
    fn test_http_client_endpoint() {
        let config = GenerationServiceConfig {
            base_url: "http://localhost:5000/".to_string(),
            ..Default::default()
        };
        let client = HttpGenerationClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint().as_str(),
            "http://localhost:5000/api/generate-batch"
        );

        let broken = GenerationServiceConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            HttpGenerationClient::new(&broken),
            Err(ClientError::Endpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_dryrun_generates_requested_count() {
        let client = DryRunClient::default();
        let request = BatchRequest {
            image: "data:image/png;base64,AA==".to_string(),
            prompt: "Product in use".to_string(),
            num_variations: 3,
            strength: 0.7,
        };
        let variants = client.generate_batch(&request).await.unwrap();
        assert_eq!(variants.len(), 3);

        let scores: Vec<f64> = variants.iter().filter_map(|v| v.score).collect();
        assert_eq!(scores, vec![92.0, 85.0, 78.0]);

        let (bytes, mime) = decode_image(&variants[0].image).unwrap();
        assert_eq!(mime.as_deref(), Some("image/png"));
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
    }
}

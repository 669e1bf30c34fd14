use serde::Deserialize;

use crate::error::{CampaignError, CampaignResult};

/// Root application configuration. Loaded from environment variables
/// with the prefix `CAMPAIGN_STUDIO__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_studio_id")]
    pub studio_id: String,
    #[serde(default)]
    pub generation: GenerationServiceConfig,
    #[serde(default)]
    pub creative: CreativeConfig,
}

/// Remote image-generation service endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_batch_path")]
    pub batch_path: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// How a regeneration treats the previous result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegenerationPolicy {
    /// The new result set fully replaces the old one.
    #[default]
    Replace,
    /// New variants are appended after the old ones. Variant ids are
    /// namespaced by job, so nothing collides.
    Append,
}

/// Creative asset generation defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct CreativeConfig {
    #[serde(default = "default_variant_count")]
    pub variant_count: u32,
    #[serde(default = "default_strength")]
    pub strength: f32,
    #[serde(default = "default_expected_duration_secs")]
    pub expected_duration_secs: u64,
    #[serde(default = "default_progress_tick_ms")]
    pub progress_tick_ms: u64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default)]
    pub regeneration: RegenerationPolicy,
    #[serde(default = "default_download_dir")]
    pub download_dir: String,
}

// Default functions
fn default_studio_id() -> String {
    "studio-01".to_string()
}
fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}
fn default_batch_path() -> String {
    "/api/generate-batch".to_string()
}
fn default_request_timeout_secs() -> u64 {
    120
}
fn default_variant_count() -> u32 {
    3
}
fn default_strength() -> f32 {
    0.7
}
fn default_expected_duration_secs() -> u64 {
    45
}
fn default_progress_tick_ms() -> u64 {
    500
}
fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}
fn default_download_dir() -> String {
    "downloads".to_string()
}

impl Default for GenerationServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            batch_path: default_batch_path(),
            request_timeout_secs: default_request_timeout_secs(),
            api_key: None,
        }
    }
}

impl Default for CreativeConfig {
    fn default() -> Self {
        Self {
            variant_count: default_variant_count(),
            strength: default_strength(),
            expected_duration_secs: default_expected_duration_secs(),
            progress_tick_ms: default_progress_tick_ms(),
            max_upload_bytes: default_max_upload_bytes(),
            regeneration: RegenerationPolicy::default(),
            download_dir: default_download_dir(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            studio_id: default_studio_id(),
            generation: GenerationServiceConfig::default(),
            creative: CreativeConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> CampaignResult<Self> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("CAMPAIGN_STUDIO")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no generation request could be built from.
    pub fn validate(&self) -> CampaignResult<()> {
        if self.generation.base_url.trim().is_empty() {
            return Err(CampaignError::Validation(
                "generation.base_url must not be empty".to_string(),
            ));
        }
        if self.creative.variant_count == 0 {
            return Err(CampaignError::Validation(
                "creative.variant_count must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.creative.strength) {
            return Err(CampaignError::Validation(format!(
                "creative.strength {} is outside [0, 1]",
                self.creative.strength
            )));
        }
        Ok(())
    }
}

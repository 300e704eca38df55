//! Configuration types for asset-tagger

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Default instruction text sent to the metadata service when neither the
/// configuration nor the request supplies one.
///
/// The two-line output contract here is what [`crate::parse`] expects.
pub const DEFAULT_INSTRUCTIONS: &str = "\
You are generating search-optimized metadata for a visual asset in a \
professional presentation asset library. Output must be bilingual: English \
AND Arabic.

Output exactly TWO lines:
Line 1: Asset Name: <English name> / <Arabic name>
Line 2: Tags: <30-40 unique comma-separated bilingual tags>

Asset names use sentence case, 3-4 words per language, and describe what the \
asset depicts, not how it is drawn. Tags must be concise searchable nouns \
covering subject, style, and usage. Do not mention countries, organizations, \
or identities unless explicitly visible. No explanations, no extra lines.";

/// Appendix attached to every instruction text, including per-batch overrides.
pub const ENFORCEMENT_APPENDIX: &str = "\
NON-NEGOTIABLE FORMAT ENFORCEMENT:
- Output exactly TWO lines only.
- Line 1 must be: Asset Name: <English name> / <Arabic name>.
- Line 2 must be: Tags: <comma-separated tags>.
- Generate 30 to 40 unique tags only.
- Include both English and Arabic tags for each concept.
- Keep tags concise, search-friendly, and visually grounded.";

/// Orchestration behavior (concurrency, batch limits, retry policy)
///
/// Groups settings for how task batches are dispatched against the metadata
/// service. Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PipelineConfig {
    /// Maximum tasks in flight against the metadata service (default: 6)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_tasks: usize,

    /// Maximum files accepted in one batch upload (default: 100)
    #[serde(default = "default_max_files")]
    pub max_files_per_batch: usize,

    /// Retry policy for transient task failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent(),
            max_files_per_batch: default_max_files(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry policy for transient task failures (transport errors, rate limits)
///
/// The pipeline is correct with `max_attempts = 0`; retries only reduce the
/// failure rate against a flaky service.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Maximum retry attempts after the initial call (default: 1)
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds on the wire (default: 0 — immediate)
    #[serde(default = "default_initial_delay", with = "duration_ms_serde")]
    #[schema(value_type = u64)]
    pub initial_delay: Duration,

    /// Upper bound on any single retry delay, in milliseconds on the wire (default: 2s)
    #[serde(default = "default_max_delay", with = "duration_ms_serde")]
    #[schema(value_type = u64)]
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each attempt (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to retry delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Image preparation bounds (resize and re-encode before transport)
///
/// These tune cost/latency/quality trade-offs; they do not change pipeline
/// correctness. Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ImageConfig {
    /// Maximum side length in pixels; larger images are downscaled (default: 768)
    #[serde(default = "default_image_max_side")]
    pub max_side: u32,

    /// JPEG re-encode quality, clamped to 40..=95 at use (default: 70)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_side: default_image_max_side(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

/// Document conversion collaborator configuration (LibreOffice)
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ConverterConfig {
    /// Path to the soffice executable (auto-detected if None)
    #[serde(default)]
    pub soffice_path: Option<PathBuf>,

    /// Whether to search PATH for soffice if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            soffice_path: None,
            search_path: true,
        }
    }
}

/// Metadata-generation service configuration (OpenAI-compatible)
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct VisionConfig {
    /// API key for the metadata service
    #[serde(default)]
    pub api_key: String,

    /// Base URL of the OpenAI-compatible API (default: "https://api.openai.com/v1")
    #[serde(default = "default_vision_base_url")]
    pub base_url: String,

    /// Model identifier (default: "gpt-4o-mini")
    #[serde(default = "default_vision_model")]
    pub model: String,

    /// Maximum tokens the service may generate per response (default: 2000)
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Per-request timeout, in milliseconds on the wire (default: 60s)
    #[serde(default = "default_request_timeout", with = "duration_ms_serde")]
    #[schema(value_type = u64)]
    pub request_timeout: Duration,

    /// Instruction text override; falls back to [`DEFAULT_INSTRUCTIONS`]
    #[serde(default)]
    pub default_instructions: Option<String>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_vision_base_url(),
            model: default_vision_model(),
            max_output_tokens: default_max_output_tokens(),
            request_timeout: default_request_timeout(),
            default_instructions: None,
        }
    }
}

impl VisionConfig {
    /// Resolve the instruction text for a batch.
    ///
    /// Priority: per-batch override, then the configured default, then
    /// [`DEFAULT_INSTRUCTIONS`]. The enforcement appendix is always attached.
    pub fn instructions(&self, override_text: Option<&str>) -> String {
        let base = override_text
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or(self.default_instructions.as_deref())
            .unwrap_or(DEFAULT_INSTRUCTIONS);
        format!("{}\n\n{}", base, ENFORCEMENT_APPENDIX)
    }
}

/// API and external server integration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API server settings
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API server configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Bind address for the API server (default: 127.0.0.1:7890)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS middleware (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins; "*" allows any (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Serve interactive Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration for AssetPipeline
///
/// Fields are organized into logical sub-configs:
/// - [`pipeline`](PipelineConfig) — concurrency, batch limits, retry
/// - [`image`](ImageConfig) — resize/re-encode bounds
/// - [`converter`](ConverterConfig) — LibreOffice discovery
/// - [`vision`](VisionConfig) — metadata service endpoint and instructions
/// - [`server`](ServerIntegrationConfig) — REST API integration
///
/// All sub-config fields are flattened for serialization, so the JSON/TOML
/// format stays un-nested except where a sub-config is itself structured.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Orchestration settings (concurrency, limits, retry)
    #[serde(flatten)]
    pub pipeline: PipelineConfig,

    /// Image preparation bounds
    #[serde(flatten)]
    pub image: ImageConfig,

    /// Document conversion collaborator settings
    #[serde(flatten)]
    pub converter: ConverterConfig,

    /// Metadata-generation service settings
    #[serde(default)]
    pub vision: VisionConfig,

    /// API and external server integration
    #[serde(flatten)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Validate configuration values that would break the pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.max_concurrent_tasks == 0 {
            return Err(Error::Config {
                message: "max_concurrent_tasks must be at least 1".to_string(),
                key: Some("pipeline.max_concurrent_tasks".to_string()),
            });
        }
        if self.pipeline.max_files_per_batch == 0 {
            return Err(Error::Config {
                message: "max_files_per_batch must be at least 1".to_string(),
                key: Some("pipeline.max_files_per_batch".to_string()),
            });
        }
        if self.pipeline.retry.backoff_multiplier < 1.0 {
            return Err(Error::Config {
                message: "backoff_multiplier must be >= 1.0".to_string(),
                key: Some("pipeline.retry.backoff_multiplier".to_string()),
            });
        }
        if self.image.max_side == 0 {
            return Err(Error::Config {
                message: "max_side must be at least 1 pixel".to_string(),
                key: Some("image.max_side".to_string()),
            });
        }
        Ok(())
    }
}

fn default_max_concurrent() -> usize {
    6
}

fn default_max_files() -> usize {
    100
}

fn default_retry_attempts() -> u32 {
    1
}

fn default_initial_delay() -> Duration {
    Duration::ZERO
}

fn default_max_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_image_max_side() -> u32 {
    768
}

fn default_jpeg_quality() -> u8 {
    70
}

fn default_vision_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_vision_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_output_tokens() -> u32 {
    2000
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_bind_address() -> SocketAddr {
    ([127, 0, 0, 1], 7890).into()
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_true() -> bool {
    true
}

// Durations cross the wire as plain millisecond counts
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

use serde::{Deserialize, Serialize};
use std::env;

use crate::error::AnalysisError;
use crate::fingerprint::DEFAULT_SAMPLE_SIZE;
use crate::scoring::ScoreWeights;

/// Retry/timeout policy for a single logical outbound request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Per-attempt timeout window; retries are additive, not shared
    pub timeout_ms: u64,
    /// Up to `max_retries + 1` attempts total
    pub max_retries: u32,
    /// Base backoff; delay before retry n is `retry_delay_ms * 2^(n-1)`
    pub retry_delay_ms: u64,
    pub headers: Vec<(String, String)>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            max_retries: 2,
            retry_delay_ms: 1_000,
            headers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    pub endpoint: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerativeConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
}

/// Product-tuned constants. These are stability knobs, not derived values;
/// keep them overridable instead of hard-coding them at call sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Byte positions sampled when fingerprinting an image
    pub fingerprint_sample_size: usize,
    /// Allowed drift from the synthesized baseline for a known fingerprint
    pub known_variance: i32,
    /// Wider drift band the first time a fingerprint is scored
    pub first_seen_variance: i32,
    /// In-flight entries older than this are presumed stuck and replaced
    pub dedup_expiry_ms: u64,
    /// Result cache TTL
    pub cache_ttl_ms: u64,
    /// Bump to invalidate all previously cached results
    pub cache_version: String,
    /// Interval of the background cache/dedup sweep
    pub sweep_interval_ms: u64,
    pub weights: ScoreWeights,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            fingerprint_sample_size: DEFAULT_SAMPLE_SIZE,
            known_variance: 3,
            first_seen_variance: 8,
            dedup_expiry_ms: 30_000,
            cache_ttl_ms: 24 * 60 * 60 * 1000,
            cache_version: "v1".to_string(),
            sweep_interval_ms: 5 * 60 * 1000,
            weights: ScoreWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub vision: VisionConfig,
    pub generative: GenerativeConfig,
    pub request: RequestConfig,
    pub tuning: TuningConfig,
}

impl EngineConfig {
    /// Load from the environment. Missing credentials are fatal and surface
    /// immediately; tuning values fall back to defaults.
    pub fn load() -> Result<Self, AnalysisError> {
        let vision_api_key = require_env("VISION_API_KEY")?;
        let generative_api_key = require_env("GENERATIVE_API_KEY")?;

        let vision_endpoint = env::var("VISION_ENDPOINT")
            .unwrap_or_else(|_| "https://vision.googleapis.com/v1/images:annotate".to_string());
        let generative_endpoint = env::var("GENERATIVE_ENDPOINT")
            .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string());
        let generative_model =
            env::var("GENERATIVE_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let request = RequestConfig {
            timeout_ms: env_u64("REQUEST_TIMEOUT_MS", 15_000),
            max_retries: env_u32("REQUEST_MAX_RETRIES", 2),
            retry_delay_ms: env_u64("REQUEST_RETRY_DELAY_MS", 1_000),
            headers: Vec::new(),
        };

        let defaults = TuningConfig::default();
        let tuning = TuningConfig {
            fingerprint_sample_size: env_u64(
                "FINGERPRINT_SAMPLE_SIZE",
                defaults.fingerprint_sample_size as u64,
            ) as usize,
            dedup_expiry_ms: env_u64("DEDUP_EXPIRY_MS", defaults.dedup_expiry_ms),
            cache_ttl_ms: env_u64("CACHE_TTL_MS", defaults.cache_ttl_ms),
            cache_version: env::var("CACHE_VERSION").unwrap_or_else(|_| defaults.cache_version.clone()),
            ..defaults
        };

        Ok(Self {
            vision: VisionConfig {
                endpoint: vision_endpoint,
                api_key: vision_api_key,
            },
            generative: GenerativeConfig {
                endpoint: generative_endpoint,
                api_key: generative_api_key,
                model: generative_model,
            },
            request,
            tuning,
        })
    }
}

fn require_env(name: &str) -> Result<String, AnalysisError> {
    env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AnalysisError::Config(format!("{} must be set", name)))
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

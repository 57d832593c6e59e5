pub mod annotation;
pub mod cache;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod generative;
pub mod metrics;
pub mod scoring;
pub mod synthesis;
pub mod transport;

// Re-export commonly used types for easier testing
pub use crate::cache::{CacheEntry, ResultCache};
pub use crate::config::{EngineConfig, RequestConfig, TuningConfig};
pub use crate::dedup::RequestDeduplicator;
pub use crate::engine::{AnalysisEngine, OperationKind};
pub use crate::error::{AnalysisError, NetworkError, NetworkErrorKind};
pub use crate::fingerprint::{fingerprint, Fingerprint};
pub use crate::scoring::{ResultSource, ScoreResult, ScoreWeights};
pub use crate::transport::{HttpClient, HttpRequest, HttpResponse, Transport};

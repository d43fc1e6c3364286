//! Diff worker request and response types

use serde::{Deserialize, Serialize};

use super::types::DiffToken;
use crate::error::ErrorCode;

/// Unique identifier for diff requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Caller-supplied wording for warnings and errors
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerWarnings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complex_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub too_large_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_text_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub too_dissimilar_message: Option<String>,
}

/// Optional overrides of the diff tuning
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiffSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complex_threshold: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_word_threshold: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub early_stop_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_jaccard_unigram: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_jaccard_bigram: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_tokens_for_early_stop: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_max_processed_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_min_unchanged_ratio: Option<f64>,
}

/// Fully resolved diff tuning
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiffConfig {
    pub batch_size: usize,
    pub complex_threshold: usize,
    pub max_word_threshold: usize,
    pub early_stop_enabled: bool,
    pub min_jaccard_unigram: f64,
    pub min_jaccard_bigram: f64,
    pub min_tokens_for_early_stop: usize,
    pub sample_limit: usize,
    pub runtime_max_processed_tokens: usize,
    pub runtime_min_unchanged_ratio: f64,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            batch_size: 5000,
            complex_threshold: 25_000,
            max_word_threshold: 60_000,
            early_stop_enabled: true,
            min_jaccard_unigram: 0.005,
            min_jaccard_bigram: 0.003,
            min_tokens_for_early_stop: 20_000,
            sample_limit: 50_000,
            runtime_max_processed_tokens: 150_000,
            runtime_min_unchanged_ratio: 0.001,
        }
    }
}

impl DiffSettings {
    /// Fill unset fields from `defaults`
    #[must_use]
    pub fn resolve(&self, defaults: &DiffConfig) -> DiffConfig {
        DiffConfig {
            batch_size: self.batch_size.unwrap_or(defaults.batch_size).max(1),
            complex_threshold: self.complex_threshold.unwrap_or(defaults.complex_threshold),
            max_word_threshold: self.max_word_threshold.unwrap_or(defaults.max_word_threshold),
            early_stop_enabled: self.early_stop_enabled.unwrap_or(defaults.early_stop_enabled),
            min_jaccard_unigram: self.min_jaccard_unigram.unwrap_or(defaults.min_jaccard_unigram),
            min_jaccard_bigram: self.min_jaccard_bigram.unwrap_or(defaults.min_jaccard_bigram),
            min_tokens_for_early_stop: self
                .min_tokens_for_early_stop
                .unwrap_or(defaults.min_tokens_for_early_stop),
            sample_limit: self.sample_limit.unwrap_or(defaults.sample_limit).max(1),
            runtime_max_processed_tokens: self
                .runtime_max_processed_tokens
                .unwrap_or(defaults.runtime_max_processed_tokens),
            runtime_min_unchanged_ratio: self
                .runtime_min_unchanged_ratio
                .unwrap_or(defaults.runtime_min_unchanged_ratio),
        }
    }
}

impl From<&DiffConfig> for DiffSettings {
    fn from(config: &DiffConfig) -> Self {
        Self {
            batch_size: Some(config.batch_size),
            complex_threshold: Some(config.complex_threshold),
            max_word_threshold: Some(config.max_word_threshold),
            early_stop_enabled: Some(config.early_stop_enabled),
            min_jaccard_unigram: Some(config.min_jaccard_unigram),
            min_jaccard_bigram: Some(config.min_jaccard_bigram),
            min_tokens_for_early_stop: Some(config.min_tokens_for_early_stop),
            sample_limit: Some(config.sample_limit),
            runtime_max_processed_tokens: Some(config.runtime_max_processed_tokens),
            runtime_min_unchanged_ratio: Some(config.runtime_min_unchanged_ratio),
        }
    }
}

/// Body of a compare request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparePayload {
    pub base_tokens: Vec<String>,
    pub comparison_tokens: Vec<String>,
    #[serde(default)]
    pub warnings: WorkerWarnings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<DiffSettings>,
}

/// Request sent to the diff worker
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DiffRequest {
    /// Diff two token streams
    Compare { id: RequestId, payload: ComparePayload },

    /// Stop the worker loop
    Shutdown,
}

/// Summary of a finished diff
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStats {
    pub base_word_count: usize,
    pub comparison_word_count: usize,
    pub duration_ms: f64,
}

/// Response from the diff worker.
///
/// A run produces any number of `Warning`/`Chunk` messages followed by
/// exactly one `Success` or `Error`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DiffResponse {
    Warning {
        id: RequestId,
        message: String,
    },

    /// Committed tokens, in order
    Chunk {
        id: RequestId,
        tokens: Vec<DiffToken>,
    },

    Success {
        id: RequestId,
        stats: WorkerStats,
    },

    Error {
        id: RequestId,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<ErrorCode>,
    },
}

impl DiffResponse {
    #[must_use]
    pub const fn id(&self) -> RequestId {
        match self {
            Self::Warning { id, .. }
            | Self::Chunk { id, .. }
            | Self::Success { id, .. }
            | Self::Error { id, .. } => *id,
        }
    }

    /// True for the message that ends a run
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wire_format() {
        let request = DiffRequest::Compare {
            id: RequestId::new(7),
            payload: ComparePayload {
                base_tokens: vec!["a".into()],
                comparison_tokens: vec!["b".into()],
                warnings: WorkerWarnings::default(),
                settings: Some(DiffSettings {
                    batch_size: Some(100),
                    ..DiffSettings::default()
                }),
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "compare");
        assert_eq!(json["id"], 7);
        assert_eq!(json["payload"]["baseTokens"][0], "a");
        assert_eq!(json["payload"]["settings"]["batchSize"], 100);

        let shutdown = serde_json::to_string(&DiffRequest::Shutdown).unwrap();
        assert_eq!(shutdown, r#"{"type":"shutdown"}"#);
    }

    #[test]
    fn error_response_carries_code() {
        let json = r#"{"type":"error","id":3,"message":"empty","code":"EMPTY_TEXT"}"#;
        let response: DiffResponse = serde_json::from_str(json).unwrap();
        assert!(response.is_terminal());
        assert_eq!(response.id(), RequestId::new(3));
        assert_eq!(
            response,
            DiffResponse::Error {
                id: RequestId::new(3),
                message: "empty".into(),
                code: Some(ErrorCode::EmptyText),
            }
        );
    }

    #[test]
    fn success_stats_are_camel_case() {
        let response = DiffResponse::Success {
            id: RequestId::new(1),
            stats: WorkerStats {
                base_word_count: 2,
                comparison_word_count: 3,
                duration_ms: 1.5,
            },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["stats"]["comparisonWordCount"], 3);
        assert_eq!(json["stats"]["durationMs"], 1.5);
    }

    #[test]
    fn settings_resolve_against_defaults() {
        let settings = DiffSettings {
            complex_threshold: Some(120_000),
            batch_size: Some(0),
            ..DiffSettings::default()
        };
        let config = settings.resolve(&DiffConfig::default());
        assert_eq!(config.complex_threshold, 120_000);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.max_word_threshold, 60_000);
    }
}

//! Error types for the phonemization pipeline.

use thiserror::Error;

/// Result type for phonemizer operations.
pub type Result<T> = std::result::Result<T, PhonemizeError>;

/// Errors raised by the phonemization pipeline.
///
/// Only configuration problems and cancellation are expected to reach
/// callers of [`Phonemizer::phonemize`](crate::Phonemizer::phonemize) as
/// errors. Backend failures are folded into a [`PhonemeResult`](crate::PhonemeResult)
/// with `success == false` so batch and mixed-language processing can go on.
#[derive(Error, Debug)]
pub enum PhonemizeError {
    /// No backend is registered for the requested or detected language.
    #[error("unsupported language {language:?} for text {text:?}")]
    UnsupportedLanguage { text: String, language: String },

    /// A backend could not produce phonemes.
    #[error("backend {backend} failed: {message}")]
    BackendFailure { backend: String, message: String },

    /// Invalid construction parameters.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The request was cancelled before it completed.
    #[error("cancelled")]
    Cancelled,

    /// JSON configuration could not be parsed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration could not be parsed.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PhonemizeError {
    /// Creates a backend failure error.
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendFailure {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns true if the request was cancelled.
    ///
    /// Cancelled requests may be retried; backend failures usually may not.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

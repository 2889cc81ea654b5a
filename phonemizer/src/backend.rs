//! Backend contract for language-specific phonemizers.

use crate::error::Result;
use crate::result::PhonemeResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

/// Default backend priority. Lower values are preferred.
pub const DEFAULT_PRIORITY: i32 = 100;

/// Output notation requested from a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhonemeFormat {
    #[default]
    Ipa,
    Arpabet,
    XSampa,
    /// The token inventory of the synthesis model.
    Piper,
    /// Whatever the backend produces natively.
    Native,
}

/// Per-request options. The dispatcher reads `normalize_text`; everything
/// else is passed to the backend untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhonemeOptions {
    pub format: PhonemeFormat,
    pub include_stress: bool,
    pub include_syllables: bool,
    pub include_tones: bool,
    /// Run the text normalizer before the backend sees the text.
    pub normalize_text: bool,
    /// Allow rule-based guessing for out-of-dictionary words.
    pub use_g2p_fallback: bool,
    pub custom: BTreeMap<String, serde_json::Value>,
}

impl Default for PhonemeOptions {
    fn default() -> Self {
        Self {
            format: PhonemeFormat::Ipa,
            include_stress: false,
            include_syllables: false,
            include_tones: false,
            normalize_text: true,
            use_g2p_fallback: true,
            custom: BTreeMap::new(),
        }
    }
}

impl PhonemeOptions {
    /// Stable fingerprint of every option a backend can observe. Results
    /// produced under different fingerprints are cached apart.
    pub fn fingerprint(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Options passed to [`Backend::initialize`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendOptions {
    /// Location of dictionaries or models.
    pub data_path: Option<PathBuf>,
    pub enable_debug_logging: bool,
    pub custom: BTreeMap<String, serde_json::Value>,
}

/// Static feature flags of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendCapabilities {
    pub supports_ipa: bool,
    pub supports_stress: bool,
    pub supports_syllables: bool,
    pub supports_tones: bool,
    pub supports_duration: bool,
    pub supports_batch: bool,
    /// When false the dispatcher never runs two requests on this backend
    /// at the same time.
    pub is_thread_safe: bool,
    pub requires_network: bool,
}

impl Default for BackendCapabilities {
    fn default() -> Self {
        Self {
            supports_ipa: false,
            supports_stress: false,
            supports_syllables: false,
            supports_tones: false,
            supports_duration: false,
            supports_batch: false,
            is_thread_safe: true,
            requires_network: false,
        }
    }
}

impl BackendCapabilities {
    /// Combines two capability sets: feature flags are OR-ed,
    /// `is_thread_safe` is AND-ed.
    pub fn merge(self, other: Self) -> Self {
        Self {
            supports_ipa: self.supports_ipa || other.supports_ipa,
            supports_stress: self.supports_stress || other.supports_stress,
            supports_syllables: self.supports_syllables || other.supports_syllables,
            supports_tones: self.supports_tones || other.supports_tones,
            supports_duration: self.supports_duration || other.supports_duration,
            supports_batch: self.supports_batch || other.supports_batch,
            is_thread_safe: self.is_thread_safe && other.is_thread_safe,
            requires_network: self.requires_network || other.requires_network,
        }
    }
}

/// A language-specific text-to-phoneme converter.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Unique backend name.
    fn name(&self) -> &str;

    /// Language codes this backend handles.
    fn languages(&self) -> Vec<String>;

    /// Selection priority among backends of the same language. Lower wins.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Prepares the backend. Returns `Ok(false)` if it is not usable.
    async fn initialize(&self, _options: &BackendOptions) -> Result<bool> {
        Ok(true)
    }

    /// Converts `text` to phonemes.
    async fn phonemize(
        &self,
        text: &str,
        language: &str,
        options: &PhonemeOptions,
    ) -> Result<PhonemeResult>;

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::default()
    }

    fn supports_language(&self, code: &str) -> bool {
        self.languages()
            .iter()
            .any(|l| l.eq_ignore_ascii_case(code))
    }

    /// Releases resources. Called once at shutdown.
    async fn dispose(&self) {}
}

/// Function type behind [`FnBackend`].
pub type PhonemizeFunc = Box<
    dyn Fn(String, String, PhonemeOptions) -> Pin<Box<dyn Future<Output = Result<PhonemeResult>> + Send>>
        + Send
        + Sync,
>;

/// A [`Backend`] backed by a closure.
pub struct FnBackend {
    name: String,
    languages: Vec<String>,
    priority: i32,
    capabilities: BackendCapabilities,
    func: PhonemizeFunc,
}

impl FnBackend {
    /// Creates a backend from an async closure taking
    /// `(text, language, options)`.
    pub fn new<F, Fut>(name: impl Into<String>, languages: &[&str], func: F) -> Self
    where
        F: Fn(String, String, PhonemeOptions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PhonemeResult>> + Send + 'static,
    {
        Self {
            name: name.into(),
            languages: languages.iter().map(|l| l.to_string()).collect(),
            priority: DEFAULT_PRIORITY,
            capabilities: BackendCapabilities::default(),
            func: Box::new(move |text: String, lang: String, opts: PhonemeOptions| {
                let fut: Pin<Box<dyn Future<Output = Result<PhonemeResult>> + Send>> =
                    Box::pin(func(text, lang, opts));
                fut
            }),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_capabilities(mut self, capabilities: BackendCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

impl std::fmt::Debug for FnBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnBackend")
            .field("name", &self.name)
            .field("languages", &self.languages)
            .field("priority", &self.priority)
            .finish()
    }
}

#[async_trait]
impl Backend for FnBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn languages(&self) -> Vec<String> {
        self.languages.clone()
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn phonemize(
        &self,
        text: &str,
        language: &str,
        options: &PhonemeOptions,
    ) -> Result<PhonemeResult> {
        (self.func)(text.to_string(), language.to_string(), options.clone()).await
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }
}

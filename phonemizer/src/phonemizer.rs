//! Backend dispatch and mixed-language stitching.

use crate::backend::{Backend, BackendCapabilities, BackendOptions, PhonemeOptions};
use crate::cache::{CacheStats, PhonemeCache};
use crate::config::PhonemizerConfig;
use crate::detect::{LanguageDetector, LanguageSegment};
use crate::encoder::{ModelInput, PhonemeEncoder};
use crate::error::{PhonemizeError, Result};
use crate::normalize::{TextNormalizer, primary_subtag};
use crate::result::PhonemeResult;
use futures::future::join_all;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Language code that asks for detection.
pub const AUTO: &str = "auto";
/// Language code that forces segmentation.
pub const MIXED: &str = "mixed";
/// Backend name reported on stitched results.
pub const MIXED_BACKEND: &str = "mixed";

#[derive(Clone)]
struct Slot {
    backend: Arc<dyn Backend>,
    priority: i32,
    /// Held for one call when the backend is not thread-safe.
    gate: Option<Arc<Mutex<()>>>,
}

#[derive(Default)]
struct Registry {
    by_language: HashMap<String, Vec<Slot>>,
    fallback_chains: HashMap<String, Vec<String>>,
}

impl Registry {
    fn first(&self, language: &str) -> Option<&Slot> {
        self.by_language.get(language).and_then(|slots| slots.first())
    }

    /// Exact code, then its fallback chain, then the primary subtag.
    fn resolve(&self, language: &str) -> Option<(String, Slot)> {
        if let Some(slot) = self.first(language) {
            return Some((language.to_string(), slot.clone()));
        }
        if let Some(chain) = self.fallback_chains.get(language) {
            for fallback in chain {
                if let Some(slot) = self.first(fallback) {
                    return Some((fallback.clone(), slot.clone()));
                }
            }
        }
        let primary = primary_subtag(language);
        if primary != language {
            if let Some(slot) = self.first(&primary) {
                return Some((primary, slot.clone()));
            }
        }
        None
    }

    /// The serialization gate of the backend registered under `name`.
    fn gate_of(&self, name: &str) -> Option<Arc<Mutex<()>>> {
        self.by_language
            .values()
            .flatten()
            .filter(|slot| slot.backend.name() == name)
            .find_map(|slot| slot.gate.clone())
    }

    /// Each registered backend once, in no particular order.
    fn distinct_backends(&self) -> Vec<Arc<dyn Backend>> {
        let mut seen: Vec<Arc<dyn Backend>> = Vec::new();
        for slot in self.by_language.values().flatten() {
            if !seen.iter().any(|b| Arc::ptr_eq(b, &slot.backend)) {
                seen.push(Arc::clone(&slot.backend));
            }
        }
        seen
    }
}

fn language_key(language: &str) -> String {
    language.trim().to_lowercase()
}

enum Route {
    Single(String),
    Mixed,
}

/// Converts text to phonemes by dispatching to registered backends.
///
/// A `Phonemizer` is shared by reference; every operation takes `&self` and
/// may run concurrently with others.
pub struct Phonemizer {
    registry: RwLock<Registry>,
    normalizer: TextNormalizer,
    detector: LanguageDetector,
    cache: Option<PhonemeCache>,
    encoder: Option<PhonemeEncoder>,
    options: PhonemeOptions,
    split_mixed_scripts: bool,
}

impl Phonemizer {
    /// Creates a phonemizer with no backends.
    pub fn new(config: PhonemizerConfig) -> Result<Self> {
        config.validate()?;

        let cache = if config.cache_enabled {
            Some(PhonemeCache::new(config.cache_capacity)?)
        } else {
            None
        };
        let encoder = match &config.encoder {
            Some(encoder) => Some(encoder.build()?),
            None => None,
        };
        let fallback_chains = config
            .fallback_chains
            .iter()
            .map(|(lang, chain)| {
                (
                    language_key(lang),
                    chain.iter().map(|l| language_key(l)).collect(),
                )
            })
            .collect();

        debug!(
            cache = cache.as_ref().map(|c| c.capacity()),
            encoder = encoder.is_some(),
            "phonemizer: created"
        );

        Ok(Self {
            registry: RwLock::new(Registry {
                by_language: HashMap::new(),
                fallback_chains,
            }),
            normalizer: TextNormalizer::new(config.normalizer)?,
            detector: LanguageDetector::new(config.detector)?,
            cache,
            encoder,
            options: config.options,
            split_mixed_scripts: config.split_mixed_scripts,
        })
    }

    pub fn normalizer(&self) -> &TextNormalizer {
        &self.normalizer
    }

    pub fn detector(&self) -> &LanguageDetector {
        &self.detector
    }

    pub fn encoder(&self) -> Option<&PhonemeEncoder> {
        self.encoder.as_ref()
    }

    /// Initializes a backend and registers it for each of its languages.
    ///
    /// Returns `Ok(false)` without registering when the backend reports it
    /// is not usable. A backend with the same name already registered for a
    /// language is replaced.
    pub async fn register(&self, backend: Arc<dyn Backend>, options: &BackendOptions) -> Result<bool> {
        let name = backend.name().to_string();
        if !backend.initialize(options).await? {
            warn!(backend = %name, "phonemizer: backend initialization failed");
            return Ok(false);
        }

        let capabilities = backend.capabilities();
        let languages: Vec<String> = backend
            .languages()
            .iter()
            .map(|l| language_key(l))
            .filter(|l| !l.is_empty())
            .collect();

        let mut registry = self.registry.write().await;
        // A replacement keeps the gate that in-flight calls are holding.
        let gate = if capabilities.is_thread_safe {
            None
        } else {
            Some(
                registry
                    .gate_of(&name)
                    .unwrap_or_else(|| Arc::new(Mutex::new(()))),
            )
        };
        let slot = Slot {
            priority: backend.priority(),
            gate,
            backend: Arc::clone(&backend),
        };
        for language in &languages {
            let slots = registry.by_language.entry(language.clone()).or_default();
            if let Some(pos) = slots.iter().position(|s| s.backend.name() == name) {
                warn!(backend = %name, language = %language, "phonemizer: backend already registered, replacing");
                slots.remove(pos);
            }
            slots.push(slot.clone());
            // Stable: equal priorities keep registration order.
            slots.sort_by_key(|s| s.priority);
        }

        info!(
            backend = %name,
            languages = ?languages,
            priority = slot.priority,
            thread_safe = capabilities.is_thread_safe,
            "phonemizer: backend registered"
        );
        Ok(true)
    }

    /// Sets the languages tried, in order, when no backend serves `language`.
    pub async fn set_fallback_chain(&self, language: &str, fallbacks: &[&str]) {
        let chain: Vec<String> = fallbacks
            .iter()
            .map(|l| language_key(l))
            .filter(|l| !l.is_empty())
            .collect();
        let mut registry = self.registry.write().await;
        registry.fallback_chains.insert(language_key(language), chain);
    }

    /// Phonemizes with the configured default options.
    pub async fn phonemize(&self, text: &str, language: &str) -> Result<PhonemeResult> {
        self.phonemize_with(text, language, &self.options, &CancellationToken::new())
            .await
    }

    /// Phonemizes `text`.
    ///
    /// `language` may be a language code, [`AUTO`] or [`MIXED`]. Backend
    /// failures come back as results with `success == false`; the error
    /// cases are an unresolvable language and cancellation.
    pub async fn phonemize_with(
        &self,
        text: &str,
        language: &str,
        options: &PhonemeOptions,
        cancel: &CancellationToken,
    ) -> Result<PhonemeResult> {
        let requested = language_key(language);
        let is_auto = requested == AUTO;
        let is_mixed = requested == MIXED;

        if text.trim().is_empty() {
            let language = if is_auto || is_mixed {
                self.detector.config().default_language.clone()
            } else {
                requested
            };
            return Ok(PhonemeResult::empty(text, language));
        }
        if cancel.is_cancelled() {
            return Err(PhonemizeError::Cancelled);
        }

        let route = if is_auto {
            let detection = self.detector.detect(text);
            if detection.is_mixed() {
                Route::Mixed
            } else {
                Route::Single(detection.primary)
            }
        } else if is_mixed || (self.split_mixed_scripts && self.detector.detect(text).is_mixed()) {
            Route::Mixed
        } else {
            Route::Single(requested)
        };

        match route {
            Route::Single(language) => self.phonemize_single(text, &language, options, cancel).await,
            Route::Mixed => self.phonemize_mixed(text, options, cancel).await,
        }
    }

    async fn phonemize_single(
        &self,
        text: &str,
        language: &str,
        options: &PhonemeOptions,
        cancel: &CancellationToken,
    ) -> Result<PhonemeResult> {
        let started = Instant::now();

        let resolved = self.registry.read().await.resolve(language);
        let Some((resolved_language, slot)) = resolved else {
            return Err(PhonemizeError::UnsupportedLanguage {
                text: text.to_string(),
                language: language.to_string(),
            });
        };
        let backend_name = slot.backend.name().to_string();

        let normalized = if options.normalize_text {
            self.normalizer.normalize(text, language)
        } else {
            text.to_string()
        };
        if normalized.trim().is_empty() {
            return Ok(PhonemeResult::empty(text, language).with_backend(backend_name));
        }

        if let Some(mut hit) = self
            .cache
            .as_ref()
            .and_then(|cache| cache.lookup_with(&normalized, language, options))
        {
            debug!(language = %language, backend = %hit.backend, "phonemizer: cache hit");
            hit.original_text = text.to_string();
            return Ok(hit);
        }

        let call = async {
            let _guard = match &slot.gate {
                Some(gate) => Some(gate.lock().await),
                None => None,
            };
            slot.backend
                .phonemize(&normalized, &resolved_language, options)
                .await
        };
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PhonemizeError::Cancelled),
            outcome = call => outcome,
        };

        let mut result = match outcome {
            Ok(result) => result,
            Err(PhonemizeError::Cancelled) => return Err(PhonemizeError::Cancelled),
            Err(err) => {
                warn!(backend = %backend_name, language = %language, error = %err, "phonemizer: backend failed");
                PhonemeResult::failure(text, &resolved_language, err.to_string())
            }
        };

        result.original_text = text.to_string();
        if result.language.is_empty() {
            result.language = resolved_language;
        }
        result.backend = backend_name;
        result.from_cache = false;
        result.processing_time = started.elapsed();

        if !result.success {
            return Ok(result);
        }
        if result.phoneme_ids.len() != result.phonemes.len() {
            if !result.phoneme_ids.is_empty() {
                warn!(
                    backend = %result.backend,
                    phonemes = result.phonemes.len(),
                    ids = result.phoneme_ids.len(),
                    "phonemizer: dropping misaligned phoneme ids"
                );
            }
            result.phoneme_ids = match &self.encoder {
                Some(encoder) => encoder.map_tokens(&result.phonemes),
                None => Vec::new(),
            };
        }
        if let Some(cache) = &self.cache {
            cache.store_with(&normalized, language, options, &result);
        }
        debug!(
            language = %language,
            backend = %result.backend,
            phonemes = result.phonemes.len(),
            elapsed_ms = result.processing_time.as_millis() as u64,
            "phonemizer: phonemized"
        );
        Ok(result)
    }

    async fn phonemize_mixed(
        &self,
        text: &str,
        options: &PhonemeOptions,
        cancel: &CancellationToken,
    ) -> Result<PhonemeResult> {
        let started = Instant::now();
        let segments: Vec<LanguageSegment> = self
            .detector
            .segment(text)
            .into_iter()
            .filter(|s| !s.is_blank())
            .collect();
        debug!(segments = segments.len(), "phonemizer: segmented mixed text");

        let outcomes = join_all(
            segments
                .iter()
                .map(|seg| self.phonemize_single(&seg.text, &seg.language, options, cancel)),
        )
        .await;

        if cancel.is_cancelled()
            || outcomes
                .iter()
                .any(|o| o.as_ref().is_err_and(PhonemizeError::is_cancelled))
        {
            return Err(PhonemizeError::Cancelled);
        }

        let mut stitched = self.stitch(text, &segments, outcomes);
        stitched.processing_time = started.elapsed();
        Ok(stitched)
    }

    fn stitch(
        &self,
        text: &str,
        segments: &[LanguageSegment],
        outcomes: Vec<Result<PhonemeResult>>,
    ) -> PhonemeResult {
        let mut stitched = PhonemeResult::empty(text, self.detector.detect_primary(text))
            .with_backend(MIXED_BACKEND);
        let mut ids_aligned = true;
        let mut durations_aligned = true;
        let mut pitches_aligned = true;
        let mut backends_used: Vec<String> = Vec::new();
        let mut segment_errors = Vec::new();
        let mut included = 0;

        for (index, (segment, outcome)) in segments.iter().zip(outcomes).enumerate() {
            let result = match outcome {
                Ok(result) if result.success => result,
                Ok(result) => {
                    let error = result.error.unwrap_or_else(|| "backend failed".to_string());
                    segment_errors.push((index, segment, error));
                    continue;
                }
                Err(err) => {
                    segment_errors.push((index, segment, err.to_string()));
                    continue;
                }
            };

            let offset = stitched.phonemes.len();
            let n = result.phonemes.len();
            ids_aligned &= result.phoneme_ids.len() == n;
            durations_aligned &= result.durations.len() == n;
            pitches_aligned &= result.pitches.len() == n;

            stitched
                .marks
                .extend(result.marks.iter().map(|m| m.rebased(offset)));
            stitched.phonemes.extend(result.phonemes);
            stitched.phoneme_ids.extend(result.phoneme_ids);
            stitched.durations.extend(result.durations);
            stitched.pitches.extend(result.pitches);
            if !backends_used.contains(&result.backend) {
                backends_used.push(result.backend);
            }
            included += 1;
        }

        if !ids_aligned {
            stitched.phoneme_ids.clear();
        }
        if !durations_aligned {
            stitched.durations.clear();
        }
        if !pitches_aligned {
            stitched.pitches.clear();
        }
        if let Some(encoder) = &self.encoder {
            if stitched.phoneme_ids.is_empty() {
                stitched.phoneme_ids = encoder.map_tokens(&stitched.phonemes);
            }
        }

        for (index, segment, error) in &segment_errors {
            warn!(
                index,
                language = %segment.language,
                error = %error,
                "phonemizer: segment failed"
            );
        }
        if included == 0 && !segment_errors.is_empty() {
            stitched.success = false;
            stitched.error = Some(format!("all {} segments failed", segment_errors.len()));
        }

        stitched = stitched
            .with_metadata("segments", segments.len())
            .with_metadata("backends_used", backends_used);
        if !segment_errors.is_empty() {
            let errors: Vec<serde_json::Value> = segment_errors
                .iter()
                .map(|(index, segment, error)| {
                    json!({
                        "index": index,
                        "language": segment.language,
                        "text": segment.text,
                        "error": error,
                    })
                })
                .collect();
            stitched = stitched.with_metadata("segment_errors", errors);
        }
        stitched
    }

    /// Phonemizes several texts concurrently. Output order matches input.
    pub async fn phonemize_batch<S: AsRef<str>>(
        &self,
        texts: &[S],
        language: &str,
    ) -> Vec<Result<PhonemeResult>> {
        join_all(texts.iter().map(|t| self.phonemize(t.as_ref(), language))).await
    }

    /// Encodes a result for the model, if an encoder is configured.
    pub fn encode(&self, result: &PhonemeResult) -> Option<ModelInput> {
        self.encoder.as_ref().map(|e| e.encode_result(result))
    }

    /// Registered language codes, sorted.
    pub async fn supported_languages(&self) -> Vec<String> {
        let registry = self.registry.read().await;
        let mut languages: Vec<String> = registry
            .by_language
            .iter()
            .filter(|(_, slots)| !slots.is_empty())
            .map(|(l, _)| l.clone())
            .collect();
        languages.sort();
        languages
    }

    /// True for [`AUTO`], [`MIXED`] and any language a backend can serve
    /// directly or through a fallback.
    pub async fn supports_language(&self, code: &str) -> bool {
        let key = language_key(code);
        key == AUTO || key == MIXED || self.registry.read().await.resolve(&key).is_some()
    }

    /// Capabilities of all registered backends combined.
    pub async fn capabilities(&self) -> BackendCapabilities {
        self.registry
            .read()
            .await
            .distinct_backends()
            .iter()
            .map(|b| b.capabilities())
            .reduce(BackendCapabilities::merge)
            .unwrap_or_default()
    }

    /// Backend names per language, in selection order.
    pub async fn available_backends(&self) -> BTreeMap<String, Vec<String>> {
        let registry = self.registry.read().await;
        registry
            .by_language
            .iter()
            .map(|(lang, slots)| {
                (
                    lang.clone(),
                    slots.iter().map(|s| s.backend.name().to_string()).collect(),
                )
            })
            .collect()
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(PhonemeCache::stats)
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
            debug!("phonemizer: cache cleared");
        }
    }

    /// Disposes every backend once and empties the registry.
    pub async fn shutdown(&self) {
        let backends = {
            let mut registry = self.registry.write().await;
            let backends = registry.distinct_backends();
            registry.by_language.clear();
            backends
        };
        for backend in &backends {
            backend.dispose().await;
        }
        info!(backends = backends.len(), "phonemizer: shut down");
    }
}

//! Phonemization result types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Silence / pause phoneme emitted by backends.
pub const SILENCE: &str = "_";

/// Kind of a positional phoneme annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum MarkKind {
    /// A word starts at this phoneme.
    WordBoundary,
    /// Lexical stress on this phoneme (1 = primary, 2 = secondary).
    Stress(u8),
    /// Tone number of the syllable nucleus at this phoneme.
    Tone(u8),
    /// A prosodic pause follows this phoneme.
    Pause,
}

/// A structured annotation pointing at one phoneme of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhonemeMark {
    /// Index into [`PhonemeResult::phonemes`].
    pub position: usize,
    pub kind: MarkKind,
}

impl PhonemeMark {
    pub fn new(position: usize, kind: MarkKind) -> Self {
        Self { position, kind }
    }

    /// Returns the same mark shifted by `offset` positions.
    pub fn rebased(self, offset: usize) -> Self {
        Self {
            position: self.position + offset,
            kind: self.kind,
        }
    }
}

/// The result of converting text to phonemes.
///
/// Arrays are always present (empty when unset). `Clone` copies every array,
/// so a result handed out from the cache never shares storage with the
/// cached entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhonemeResult {
    /// Text as given by the caller.
    pub original_text: String,

    /// Phoneme tokens in utterance order.
    #[serde(default)]
    pub phonemes: Vec<String>,

    /// Model vocabulary IDs, one per phoneme.
    #[serde(default)]
    pub phoneme_ids: Vec<u32>,

    /// Duration of each phoneme in seconds.
    #[serde(default)]
    pub durations: Vec<f32>,

    /// Pitch of each phoneme.
    #[serde(default)]
    pub pitches: Vec<f32>,

    /// Positional annotations (word boundaries, stress, tones).
    #[serde(default)]
    pub marks: Vec<PhonemeMark>,

    /// Language code the phonemes were produced for.
    pub language: String,

    /// Wall time spent producing this result.
    #[serde(default)]
    pub processing_time: Duration,

    /// Whether this result was served from the cache.
    #[serde(default)]
    pub from_cache: bool,

    /// False when the backend reported a failure.
    pub success: bool,

    /// Failure description when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Name of the backend that produced the phonemes.
    #[serde(default)]
    pub backend: String,

    /// Free-form diagnostics.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl PhonemeResult {
    /// Creates a successful result.
    pub fn new(
        original_text: impl Into<String>,
        language: impl Into<String>,
        phonemes: Vec<String>,
    ) -> Self {
        Self {
            original_text: original_text.into(),
            phonemes,
            language: language.into(),
            success: true,
            ..Default::default()
        }
    }

    /// Creates a successful result with no phonemes.
    pub fn empty(original_text: impl Into<String>, language: impl Into<String>) -> Self {
        Self::new(original_text, language, Vec::new())
    }

    /// Creates a failed result.
    pub fn failure(
        original_text: impl Into<String>,
        language: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            original_text: original_text.into(),
            language: language.into(),
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_marks(mut self, marks: Vec<PhonemeMark>) -> Self {
        self.marks = marks;
        self
    }

    pub fn with_ids(mut self, phoneme_ids: Vec<u32>) -> Self {
        self.phoneme_ids = phoneme_ids;
        self
    }

    pub fn with_durations(mut self, durations: Vec<f32>) -> Self {
        self.durations = durations;
        self
    }

    pub fn with_pitches(mut self, pitches: Vec<f32>) -> Self {
        self.pitches = pitches;
        self
    }

    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    /// Inserts a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Number of phoneme tokens.
    pub fn len(&self) -> usize {
        self.phonemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phonemes.is_empty()
    }

    /// Returns true if durations are present and aligned with the phonemes.
    pub fn has_durations(&self) -> bool {
        !self.durations.is_empty() && self.durations.len() == self.phonemes.len()
    }

    /// Returns true if pitches are present and aligned with the phonemes.
    pub fn has_pitches(&self) -> bool {
        !self.pitches.is_empty() && self.pitches.len() == self.phonemes.len()
    }

    /// Returns true if IDs are present and aligned with the phonemes.
    pub fn has_ids(&self) -> bool {
        !self.phoneme_ids.is_empty() && self.phoneme_ids.len() == self.phonemes.len()
    }

    /// Returns true if `phoneme_ids` is empty or matches the phonemes.
    pub fn ids_aligned(&self) -> bool {
        self.phoneme_ids.is_empty() || self.phoneme_ids.len() == self.phonemes.len()
    }
}

impl fmt::Display for PhonemeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} -> [{}] ({}, {:.1}ms{})",
            self.original_text,
            self.phonemes.join(" "),
            self.language,
            self.processing_time.as_secs_f64() * 1000.0,
            if self.from_cache { ", cached" } else { "" }
        )?;
        if let Some(ref err) = self.error {
            write!(f, " error: {}", err)?;
        }
        Ok(())
    }
}

//! Phonemizer configuration.

use crate::backend::PhonemeOptions;
use crate::detect::DetectorConfig;
use crate::encoder::{ClusterTable, EncoderLayout, PhonemeEncoder, PhonemeIdMap};
use crate::error::{PhonemizeError, Result};
use crate::normalize::NormalizerConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default number of cached results.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Top-level configuration of a [`Phonemizer`](crate::Phonemizer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhonemizerConfig {
    pub cache_capacity: usize,
    pub cache_enabled: bool,
    /// Route text that mixes scripts through segmentation even when an
    /// explicit language is requested. Disable to trust the caller's code.
    pub split_mixed_scripts: bool,
    pub normalizer: NormalizerConfig,
    pub detector: DetectorConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoder: Option<EncoderConfig>,
    /// Languages tried, in order, when no backend serves a language.
    pub fallback_chains: BTreeMap<String, Vec<String>>,
    /// Options used by [`Phonemizer::phonemize`](crate::Phonemizer::phonemize).
    pub options: PhonemeOptions,
}

impl Default for PhonemizerConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_enabled: true,
            split_mixed_scripts: true,
            normalizer: NormalizerConfig::default(),
            detector: DetectorConfig::default(),
            encoder: None,
            fallback_chains: BTreeMap::new(),
            options: PhonemeOptions::default(),
        }
    }
}

impl PhonemizerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Checks every section without building anything long-lived.
    pub fn validate(&self) -> Result<()> {
        if self.cache_enabled && self.cache_capacity == 0 {
            return Err(PhonemizeError::config("cache capacity must be at least 1"));
        }
        self.normalizer.validate()?;
        self.detector.validate()?;
        for (language, chain) in &self.fallback_chains {
            if language.trim().is_empty() || chain.iter().any(|l| l.trim().is_empty()) {
                return Err(PhonemizeError::config(format!(
                    "fallback chain for {:?} contains an empty language code",
                    language
                )));
            }
        }
        if let Some(encoder) = &self.encoder {
            encoder.build()?;
        }
        Ok(())
    }
}

/// Encoder section of [`PhonemizerConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    #[serde(default)]
    pub layout: EncoderLayout,
    /// Either `{"a": 7}` or the Piper `{"a": [7]}` form. A full Piper voice
    /// config with a `phoneme_id_map` key is accepted too.
    pub phoneme_id_map: serde_json::Value,
    /// Cluster spelling to codepoint (`"ch": "U+E00E"`). Absent means the
    /// default Japanese table; an empty map disables collapsing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clusters: Option<BTreeMap<String, String>>,
    /// ID for unknown phonemes. Defaults to the pad ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_id: Option<u32>,
}

impl EncoderConfig {
    pub fn build(&self) -> Result<PhonemeEncoder> {
        let map = PhonemeIdMap::from_value(&self.phoneme_id_map)?;
        let clusters = match &self.clusters {
            Some(table) => ClusterTable::from_map(table)?,
            None => ClusterTable::default(),
        };
        PhonemeEncoder::new(map, self.layout, clusters, self.fallback_id)
    }
}

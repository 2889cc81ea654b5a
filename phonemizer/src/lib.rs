//! Multilingual text-to-phoneme pipeline for neural speech synthesis.
//!
//! This crate provides:
//! - [`TextNormalizer`]: per-language text cleanup
//! - [`LanguageDetector`]: script-based detection and segmentation
//! - [`Backend`] and [`Phonemizer`]: per-language dispatch with mixed-text stitching
//! - [`LruCache`] and [`PhonemeCache`]: bounded result caching
//! - [`PhonemeEncoder`]: phoneme tokens to model input IDs
//!
//! # Example
//!
//! ```rust,ignore
//! use polyphon_phonemizer::{BackendOptions, Phonemizer, PhonemizerConfig};
//!
//! let phonemizer = Phonemizer::new(PhonemizerConfig::default())?;
//! phonemizer.register(my_japanese_backend, &BackendOptions::default()).await?;
//! phonemizer.register(my_english_backend, &BackendOptions::default()).await?;
//!
//! let result = phonemizer.phonemize("今日はmeeting at 3pmです", "auto").await?;
//! let input = phonemizer.encode(&result);
//! ```

mod error;
mod result;
mod normalize;
mod detect;
mod backend;
mod cache;
mod encoder;
mod config;
mod phonemizer;

pub use error::*;
pub use result::*;
pub use normalize::*;
pub use detect::*;
pub use backend::*;
pub use cache::*;
pub use encoder::*;
pub use config::*;
pub use phonemizer::*;

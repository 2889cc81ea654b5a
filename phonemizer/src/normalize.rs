//! Per-language text normalization.
//!
//! Every language gets the common rules: control characters are stripped,
//! line breaks become spaces, whitespace runs collapse to one space and the
//! result is trimmed. Language rules are layered on top and the whitespace
//! pass runs again afterwards, so the output is always a fixed point:
//! `normalize(normalize(t, l), l) == normalize(t, l)`.

use crate::error::{PhonemizeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::trace;

const FULLWIDTH_FIRST: u32 = 0xFF01;
const FULLWIDTH_LAST: u32 = 0xFF5E;
const FULLWIDTH_OFFSET: u32 = 0xFEE0;
const IDEOGRAPHIC_SPACE: char = '\u{3000}';

/// A contraction rewrite applied to lower-cased text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contraction {
    pub from: String,
    pub to: String,
}

impl Contraction {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Normalization tables. Languages are matched on their primary subtag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Languages that fold full-width ASCII forms and the ideographic space.
    pub fullwidth_languages: Vec<String>,

    /// Languages that lower-case and expand contractions.
    pub contraction_languages: Vec<String>,

    /// Languages that fold full-width sentence punctuation to ASCII.
    pub punctuation_languages: Vec<String>,

    /// Contraction table, applied in order. Each `from` must contain `'`.
    pub contractions: Vec<Contraction>,

    /// Punctuation fold table (single character to single character).
    pub punctuation_fold: BTreeMap<String, String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        let contractions = [
            ("it's", "it is"),
            ("can't", "can not"),
            ("won't", "will not"),
            ("n't", " not"),
            ("'re", " are"),
            ("'ll", " will"),
            ("'ve", " have"),
            ("'d", " would"),
            ("'m", " am"),
            ("'s", " is"),
        ]
        .iter()
        .map(|(from, to)| Contraction::new(from, to))
        .collect();

        let punctuation_fold = [
            ("。", "."),
            ("，", ","),
            ("、", ","),
            ("？", "?"),
            ("！", "!"),
            ("：", ":"),
            ("；", ";"),
        ]
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();

        Self {
            fullwidth_languages: vec!["ja".to_string()],
            contraction_languages: vec!["en".to_string()],
            punctuation_languages: vec!["zh".to_string()],
            contractions,
            punctuation_fold,
        }
    }
}

impl NormalizerConfig {
    /// Checks the tables for entries that would break idempotence.
    pub fn validate(&self) -> Result<()> {
        for c in &self.contractions {
            if !c.from.contains('\'') {
                return Err(PhonemizeError::config(format!(
                    "contraction {:?} must contain an apostrophe",
                    c.from
                )));
            }
            if c.to.contains('\'') {
                return Err(PhonemizeError::config(format!(
                    "contraction expansion {:?} must not contain an apostrophe",
                    c.to
                )));
            }
        }
        for (from, to) in &self.punctuation_fold {
            if single_char(from).is_none() || single_char(to).is_none() {
                return Err(PhonemizeError::config(format!(
                    "punctuation fold {:?} -> {:?} must map one character to one character",
                    from, to
                )));
            }
            if self.punctuation_fold.contains_key(to) {
                return Err(PhonemizeError::config(format!(
                    "punctuation fold target {:?} is itself folded",
                    to
                )));
            }
        }
        Ok(())
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// Returns the lower-cased primary subtag of a language code
/// (`en-US` -> `en`, `ja_JP` -> `ja`).
pub fn primary_subtag(language: &str) -> String {
    language
        .trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Text normalizer with per-language rules.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    fullwidth: HashSet<String>,
    contraction_langs: HashSet<String>,
    punctuation_langs: HashSet<String>,
    contractions: Vec<(String, String)>,
    punctuation: HashMap<char, char>,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::build(NormalizerConfig::default())
    }
}

impl TextNormalizer {
    /// Creates a normalizer from validated tables.
    pub fn new(config: NormalizerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: NormalizerConfig) -> Self {
        let lower = |langs: Vec<String>| -> HashSet<String> {
            langs.iter().map(|l| primary_subtag(l)).collect()
        };
        let punctuation = config
            .punctuation_fold
            .iter()
            .filter_map(|(from, to)| Some((single_char(from)?, single_char(to)?)))
            .collect();
        Self {
            fullwidth: lower(config.fullwidth_languages),
            contraction_langs: lower(config.contraction_languages),
            punctuation_langs: lower(config.punctuation_languages),
            contractions: config
                .contractions
                .into_iter()
                .map(|c| (c.from.to_lowercase(), c.to.to_lowercase()))
                .collect(),
            punctuation,
        }
    }

    /// Normalizes `text` for phonemization in `language`.
    pub fn normalize(&self, text: &str, language: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let mut normalized = normalize_common(text);
        if normalized.is_empty() {
            return normalized;
        }

        let lang = primary_subtag(language);
        if self.fullwidth.contains(&lang) {
            normalized = fold_fullwidth(&normalized);
        }
        if self.contraction_langs.contains(&lang) {
            normalized = self.expand_contractions(&normalized);
        }
        if self.punctuation_langs.contains(&lang) {
            normalized = self.fold_punctuation(&normalized);
        }
        let normalized = normalize_common(&normalized);

        trace!(from = %text, to = %normalized, language, "normalizer: normalized");
        normalized
    }

    /// Reports whether [`normalize`](Self::normalize) would change `text`.
    ///
    /// Scans once without allocating.
    pub fn needs_normalization(&self, text: &str, language: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        if needs_common(text) {
            return true;
        }

        let lang = primary_subtag(language);
        let fullwidth = self.fullwidth.contains(&lang);
        let contractions = self.contraction_langs.contains(&lang);
        let punctuation = self.punctuation_langs.contains(&lang);

        text.chars().any(|c| {
            (fullwidth && is_fullwidth_form(c))
                || (contractions && (is_apostrophe(c) || !c.to_lowercase().eq(std::iter::once(c))))
                || (punctuation && self.punctuation.contains_key(&c))
        })
    }

    fn expand_contractions(&self, text: &str) -> String {
        let mut out: String = text
            .chars()
            .map(|c| if is_apostrophe(c) { '\'' } else { c })
            .collect::<String>()
            .to_lowercase();
        if !out.contains('\'') {
            return out;
        }
        for (from, to) in &self.contractions {
            if out.contains(from.as_str()) {
                out = out.replace(from.as_str(), to);
            }
        }
        out.retain(|c| c != '\'');
        out
    }

    fn fold_punctuation(&self, text: &str) -> String {
        text.chars()
            .map(|c| self.punctuation.get(&c).copied().unwrap_or(c))
            .collect()
    }
}

fn is_apostrophe(c: char) -> bool {
    matches!(c, '\'' | '\u{2019}' | '\u{2018}')
}

fn is_fullwidth_form(c: char) -> bool {
    (FULLWIDTH_FIRST..=FULLWIDTH_LAST).contains(&(c as u32)) || c == IDEOGRAPHIC_SPACE
}

fn fold_fullwidth(text: &str) -> String {
    text.chars()
        .map(|c| {
            let code = c as u32;
            if (FULLWIDTH_FIRST..=FULLWIDTH_LAST).contains(&code) {
                char::from_u32(code - FULLWIDTH_OFFSET).unwrap_or(c)
            } else if c == IDEOGRAPHIC_SPACE {
                ' '
            } else {
                c
            }
        })
        .collect()
}

/// Strips controls, turns line breaks and other whitespace into single
/// spaces and trims.
fn normalize_common(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if c.is_control() {
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }
    out
}

fn needs_common(text: &str) -> bool {
    if text.starts_with(' ') || text.ends_with(' ') {
        return true;
    }
    let mut prev_space = false;
    for c in text.chars() {
        if c == ' ' {
            if prev_space {
                return true;
            }
            prev_space = true;
            continue;
        }
        if c.is_whitespace() || c.is_control() {
            return true;
        }
        prev_space = false;
    }
    false
}

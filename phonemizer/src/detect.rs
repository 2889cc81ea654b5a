//! Script-based language detection and segmentation.

use crate::error::{PhonemizeError, Result};
use serde::{Deserialize, Serialize};

/// Scripts recognized by the detector, in classification priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    /// Hiragana and katakana.
    Kana,
    /// CJK ideographs.
    Logographic,
    /// Hangul.
    Syllabary,
    /// Latin letters.
    Latin,
}

impl Script {
    pub const PRIORITY: [Script; 4] = [
        Script::Kana,
        Script::Logographic,
        Script::Syllabary,
        Script::Latin,
    ];
}

/// Classification of a single character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Script(Script),
    /// ASCII digits: they open a default-language segment but do not count
    /// towards detection.
    Digit,
    /// Punctuation, whitespace and anything else; keeps the current language.
    Inherit,
}

/// Maps scripts to language codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub kana_language: String,
    pub logographic_language: String,
    pub syllabary_language: String,
    /// Language of Latin letters and digits, and the fallback when nothing
    /// is recognized.
    pub default_language: String,
    /// Minimum letter count for a language to be considered present.
    pub mixed_threshold: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            kana_language: "ja".to_string(),
            logographic_language: "ja".to_string(),
            syllabary_language: "ko".to_string(),
            default_language: "en".to_string(),
            mixed_threshold: 1,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        let codes = [
            &self.kana_language,
            &self.logographic_language,
            &self.syllabary_language,
            &self.default_language,
        ];
        if codes.iter().any(|c| c.trim().is_empty()) {
            return Err(PhonemizeError::config("detector language codes must not be empty"));
        }
        if self.mixed_threshold == 0 {
            return Err(PhonemizeError::config("mixed_threshold must be at least 1"));
        }
        Ok(())
    }
}

/// A contiguous run of text in one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageSegment {
    pub text: String,
    pub language: String,
    /// Byte offset of `text` in the segmented string.
    pub start_offset: usize,
}

impl LanguageSegment {
    /// Byte offset one past the end of the segment.
    pub fn end_offset(&self) -> usize {
        self.start_offset + self.text.len()
    }

    /// True if the segment holds nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Outcome of [`LanguageDetector::detect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// Dominant language.
    pub primary: String,
    /// Letter counts per language, in script priority order.
    pub counts: Vec<(String, usize)>,
    mixed: bool,
}

impl Detection {
    /// True if more than one language reaches the detection threshold.
    pub fn is_mixed(&self) -> bool {
        self.mixed
    }

    /// Letter count for `language`.
    pub fn count(&self, language: &str) -> usize {
        self.counts
            .iter()
            .find(|(l, _)| l == language)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

/// Classifies characters by Unicode script and splits text into
/// same-language runs.
#[derive(Debug, Clone, Default)]
pub struct LanguageDetector {
    config: DetectorConfig,
}

impl LanguageDetector {
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Classifies one character. Kana wins over overlapping ideograph ranges.
    pub fn classify(&self, c: char) -> CharClass {
        if is_kana(c) {
            CharClass::Script(Script::Kana)
        } else if is_logographic(c) {
            CharClass::Script(Script::Logographic)
        } else if is_hangul(c) {
            CharClass::Script(Script::Syllabary)
        } else if is_latin_letter(c) {
            CharClass::Script(Script::Latin)
        } else if c.is_ascii_digit() {
            CharClass::Digit
        } else {
            CharClass::Inherit
        }
    }

    /// Language code for a script.
    pub fn language_of(&self, script: Script) -> &str {
        match script {
            Script::Kana => &self.config.kana_language,
            Script::Logographic => &self.config.logographic_language,
            Script::Syllabary => &self.config.syllabary_language,
            Script::Latin => &self.config.default_language,
        }
    }

    fn class_language(&self, class: CharClass) -> Option<&str> {
        match class {
            CharClass::Script(script) => Some(self.language_of(script)),
            CharClass::Digit => Some(self.config.default_language.as_str()),
            CharClass::Inherit => None,
        }
    }

    /// Counts letters per language and picks the dominant one.
    pub fn detect(&self, text: &str) -> Detection {
        let mut counts: Vec<(String, usize)> = Vec::with_capacity(Script::PRIORITY.len());
        for script in Script::PRIORITY {
            let lang = self.language_of(script);
            if !counts.iter().any(|(l, _)| l == lang) {
                counts.push((lang.to_string(), 0));
            }
        }

        for c in text.chars() {
            if let CharClass::Script(script) = self.classify(c) {
                let lang = self.language_of(script);
                if let Some(entry) = counts.iter_mut().find(|(l, _)| l == lang) {
                    entry.1 += 1;
                }
            }
        }

        let present = counts
            .iter()
            .filter(|(_, n)| *n >= self.config.mixed_threshold)
            .count();

        // Strictly greater keeps the earlier (higher priority) language on ties.
        let mut primary: Option<&(String, usize)> = None;
        for entry in counts.iter().filter(|(_, n)| *n > 0) {
            if primary.is_none_or(|best| entry.1 > best.1) {
                primary = Some(entry);
            }
        }
        let primary = primary
            .map(|(l, _)| l.clone())
            .unwrap_or_else(|| self.config.default_language.clone());

        Detection {
            primary,
            counts,
            mixed: present > 1,
        }
    }

    /// Returns the dominant language of `text`.
    pub fn detect_primary(&self, text: &str) -> String {
        self.detect(text).primary
    }

    /// Splits `text` into contiguous same-language segments.
    ///
    /// Concatenating the segments' text reproduces the input exactly.
    pub fn segment(&self, text: &str) -> Vec<LanguageSegment> {
        let mut segments = Vec::new();
        if text.is_empty() {
            return segments;
        }

        let mut current: Option<&str> = None;
        let mut start = 0;
        for (idx, c) in text.char_indices() {
            let Some(lang) = self.class_language(self.classify(c)) else {
                continue;
            };
            match current.take() {
                Some(cur) if cur != lang => {
                    segments.push(LanguageSegment {
                        text: text[start..idx].to_string(),
                        language: cur.to_string(),
                        start_offset: start,
                    });
                    start = idx;
                    current = Some(lang);
                }
                Some(cur) => current = Some(cur),
                None => current = Some(lang),
            }
        }

        segments.push(LanguageSegment {
            text: text[start..].to_string(),
            language: current.unwrap_or(&self.config.default_language).to_string(),
            start_offset: start,
        });
        segments
    }
}

fn in_ranges(c: char, ranges: &[(u32, u32)]) -> bool {
    let code = c as u32;
    ranges.iter().any(|&(lo, hi)| (lo..=hi).contains(&code))
}

fn is_kana(c: char) -> bool {
    in_ranges(
        c,
        &[
            (0x3040, 0x309F), // hiragana
            (0x30A0, 0x30FF), // katakana
            (0x31F0, 0x31FF), // katakana phonetic extensions
            (0xFF66, 0xFF9F), // half-width katakana
        ],
    )
}

fn is_logographic(c: char) -> bool {
    in_ranges(
        c,
        &[
            (0x2E80, 0x2FDF),   // radicals
            (0x3005, 0x3007),   // 々 〆 〇
            (0x3021, 0x3029),   // Hangzhou numerals
            (0x3400, 0x4DBF),   // extension A
            (0x4E00, 0x9FFF),   // unified ideographs
            (0xF900, 0xFAFF),   // compatibility ideographs
            (0x20000, 0x2FA1F), // supplementary planes
        ],
    )
}

fn is_hangul(c: char) -> bool {
    in_ranges(c, &[(0x1100, 0x11FF), (0x3130, 0x318F), (0xAC00, 0xD7AF)])
}

fn is_latin_letter(c: char) -> bool {
    c.is_ascii_alphabetic()
        || (c.is_alphabetic() && in_ranges(c, &[(0x00C0, 0x024F), (0x1E00, 0x1EFF)]))
}

#[cfg(test)]
mod detect_tests {
    use super::*;

    fn zh_detector() -> LanguageDetector {
        LanguageDetector::new(DetectorConfig {
            logographic_language: "zh".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    fn assert_round_trip(detector: &LanguageDetector, text: &str) {
        let segments = detector.segment(text);
        let joined: String = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(joined, text);

        let mut last = 0;
        for seg in &segments {
            assert!(seg.start_offset >= last, "offsets must not decrease in {:?}", text);
            assert_eq!(&text[seg.start_offset..seg.end_offset()], seg.text);
            last = seg.start_offset;
        }
        if let Some(tail) = segments.last() {
            assert_eq!(tail.end_offset(), text.len());
        }
    }

    #[test]
    fn test_classify() {
        let d = LanguageDetector::default();
        assert_eq!(d.classify('あ'), CharClass::Script(Script::Kana));
        assert_eq!(d.classify('ア'), CharClass::Script(Script::Kana));
        assert_eq!(d.classify('ー'), CharClass::Script(Script::Kana));
        assert_eq!(d.classify('ｱ'), CharClass::Script(Script::Kana));
        assert_eq!(d.classify('漢'), CharClass::Script(Script::Logographic));
        assert_eq!(d.classify('々'), CharClass::Script(Script::Logographic));
        assert_eq!(d.classify('한'), CharClass::Script(Script::Syllabary));
        assert_eq!(d.classify('a'), CharClass::Script(Script::Latin));
        assert_eq!(d.classify('é'), CharClass::Script(Script::Latin));
        assert_eq!(d.classify('7'), CharClass::Digit);
        assert_eq!(d.classify('、'), CharClass::Inherit);
        assert_eq!(d.classify(' '), CharClass::Inherit);
        assert_eq!(d.classify('×'), CharClass::Inherit);
    }

    #[test]
    fn test_detect_primary() {
        let d = LanguageDetector::default();
        assert_eq!(d.detect_primary("こんにちは"), "ja");
        assert_eq!(d.detect_primary("Hello world"), "en");
        assert_eq!(d.detect_primary("안녕하세요"), "ko");
        assert_eq!(d.detect_primary("123456"), "en");
        assert_eq!(d.detect_primary("！？。、"), "en");
        assert_eq!(d.detect_primary(""), "en");

        let zh = zh_detector();
        assert_eq!(zh.detect_primary("你好世界"), "zh");
    }

    #[test]
    fn test_detect_mixed() {
        let d = LanguageDetector::default();
        assert!(d.detect("今日はmeeting at 3pmです").is_mixed());
        assert!(d.detect("Unity エンジンで開発").is_mixed());
        assert!(!d.detect("こんにちは世界").is_mixed());
        assert!(!d.detect("Hello, world!").is_mixed());
        assert!(!d.detect("3時です").is_mixed());

        // kana and ideographs map to different languages here
        let zh = zh_detector();
        let detection = zh.detect("今日は");
        assert!(detection.is_mixed());
        assert_eq!(detection.count("zh"), 2);
        assert_eq!(detection.count("ja"), 1);
    }

    #[test]
    fn test_tie_breaks_by_priority() {
        let d = LanguageDetector::default();
        let detection = d.detect("abあい");
        assert!(detection.is_mixed());
        assert_eq!(detection.primary, "ja");

        let detection = d.detect("abcあい");
        assert_eq!(detection.primary, "en");
    }

    #[test]
    fn test_mixed_threshold() {
        let d = LanguageDetector::new(DetectorConfig {
            mixed_threshold: 3,
            ..Default::default()
        })
        .unwrap();
        assert!(!d.detect("今日はA").is_mixed());
        assert!(d.detect("今日はABC").is_mixed());
    }

    #[test]
    fn test_invalid_config() {
        let cfg = DetectorConfig {
            mixed_threshold: 0,
            ..Default::default()
        };
        assert!(LanguageDetector::new(cfg).is_err());

        let cfg = DetectorConfig {
            default_language: " ".to_string(),
            ..Default::default()
        };
        assert!(LanguageDetector::new(cfg).is_err());
    }

    #[test]
    fn test_segment_alternating_scripts() {
        let d = LanguageDetector::default();
        let text = "todayきょうenglishえいごmoreもっと";
        let segments = d.segment(text);
        let langs: Vec<&str> = segments.iter().map(|s| s.language.as_str()).collect();
        assert_eq!(langs, vec!["en", "ja", "en", "ja", "en", "ja"]);
        assert_eq!(segments[1].text, "きょう");
        assert_eq!(segments[1].start_offset, 5);
        assert_round_trip(&d, text);
    }

    #[test]
    fn test_segment_punctuation_inherits() {
        let d = LanguageDetector::default();
        let segments = d.segment("「こんにちは」Hello, world!");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "「こんにちは」");
        assert_eq!(segments[0].language, "ja");
        assert_eq!(segments[1].text, "Hello, world!");
        assert_eq!(segments[1].language, "en");
    }

    #[test]
    fn test_segment_digits_open_default_language() {
        let d = LanguageDetector::default();
        let segments = d.segment("午後3時");
        let langs: Vec<&str> = segments.iter().map(|s| s.language.as_str()).collect();
        assert_eq!(langs, vec!["ja", "en", "ja"]);
    }

    #[test]
    fn test_segment_without_letters() {
        let d = LanguageDetector::default();
        let segments = d.segment("!!! ...");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].language, "en");
        assert_eq!(segments[0].start_offset, 0);
        assert!(d.segment("").is_empty());
    }

    #[test]
    fn test_segment_round_trip() {
        let d = LanguageDetector::default();
        let zh = zh_detector();
        for text in [
            "今日はmeeting at 3pmです。Tomorrow is 明日。",
            "uPiperは、Unity環境でPiper TTSを使用するための\nhigh-qualityな音声合成pluginです。",
            "안녕 hello こんにちは 你好",
            " leading and trailing ",
            "ｱｲｳ half width",
            "𠮷野家",
            "a",
        ] {
            assert_round_trip(&d, text);
            assert_round_trip(&zh, text);
        }
    }

    #[test]
    fn test_blank_segment() {
        let seg = LanguageSegment {
            text: "  ".to_string(),
            language: "en".to_string(),
            start_offset: 3,
        };
        assert!(seg.is_blank());
        assert_eq!(seg.end_offset(), 5);
    }
}

//! Phoneme to model ID encoding.
//!
//! Multi-character phonemes such as `ch` or `ky` are first collapsed into
//! single private-use codepoints, which is how the model vocabulary spells
//! them. The collapsed tokens are then looked up in a [`PhonemeIdMap`] and
//! framed with BOS/EOS according to the [`EncoderLayout`].

use crate::error::{PhonemizeError, Result};
use crate::result::PhonemeResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// First codepoint of the Unicode private use area.
pub const PUA_START: u32 = 0xE000;
/// Last codepoint of the Unicode private use area.
pub const PUA_END: u32 = 0xF8FF;

pub const PAD: &str = "_";
pub const BOS: &str = "^";
pub const EOS: &str = "$";
pub const SPACE: &str = " ";

const DEFAULT_PAD_ID: u32 = 0;
const DEFAULT_BOS_ID: u32 = 1;
const DEFAULT_EOS_ID: u32 = 2;
const DEFAULT_SPACE_ID: u32 = 3;

const DEFAULT_CLUSTERS: [(&str, u32); 22] = [
    ("a:", 0xE000),
    ("i:", 0xE001),
    ("u:", 0xE002),
    ("e:", 0xE003),
    ("o:", 0xE004),
    ("cl", 0xE005),
    ("ky", 0xE006),
    ("kw", 0xE007),
    ("gy", 0xE008),
    ("gw", 0xE009),
    ("ty", 0xE00A),
    ("dy", 0xE00B),
    ("py", 0xE00C),
    ("by", 0xE00D),
    ("ch", 0xE00E),
    ("ts", 0xE00F),
    ("sh", 0xE010),
    ("zy", 0xE011),
    ("hy", 0xE012),
    ("ny", 0xE013),
    ("my", 0xE014),
    ("ry", 0xE015),
];

fn is_pua(c: char) -> bool {
    (PUA_START..=PUA_END).contains(&(c as u32))
}

/// Bijection between multi-character phoneme spellings and private-use
/// codepoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterTable {
    to_code: HashMap<String, char>,
    to_cluster: HashMap<char, String>,
}

impl Default for ClusterTable {
    /// The Japanese table used by Piper voices.
    fn default() -> Self {
        let mut table = Self::empty();
        for (cluster, code) in DEFAULT_CLUSTERS {
            if let Some(c) = char::from_u32(code) {
                table.to_code.insert(cluster.to_string(), c);
                table.to_cluster.insert(c, cluster.to_string());
            }
        }
        table
    }
}

impl ClusterTable {
    /// A table that collapses nothing.
    pub fn empty() -> Self {
        Self {
            to_code: HashMap::new(),
            to_cluster: HashMap::new(),
        }
    }

    /// Builds a table, rejecting duplicates in either direction and
    /// codepoints outside the private use area.
    pub fn new<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, char)>,
        S: Into<String>,
    {
        let mut table = Self::empty();
        for (cluster, code) in pairs {
            let cluster = cluster.into();
            if cluster.chars().count() < 2 {
                return Err(PhonemizeError::config(format!(
                    "cluster {:?} must span at least two characters",
                    cluster
                )));
            }
            if !is_pua(code) {
                return Err(PhonemizeError::config(format!(
                    "cluster {:?} maps to U+{:04X} outside the private use area",
                    cluster, code as u32
                )));
            }
            if table.to_code.contains_key(&cluster) {
                return Err(PhonemizeError::config(format!("duplicate cluster {:?}", cluster)));
            }
            if let Some(other) = table.to_cluster.get(&code) {
                return Err(PhonemizeError::config(format!(
                    "U+{:04X} assigned to both {:?} and {:?}",
                    code as u32, other, cluster
                )));
            }
            table.to_code.insert(cluster.clone(), code);
            table.to_cluster.insert(code, cluster);
        }
        Ok(table)
    }

    /// Builds a table from configuration, where each codepoint is written
    /// either as the character itself or as `U+XXXX`.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self> {
        let mut pairs = Vec::with_capacity(map.len());
        for (cluster, spelled) in map {
            pairs.push((cluster.clone(), parse_codepoint(spelled)?));
        }
        Self::new(pairs)
    }

    /// Returns the codepoint for a cluster spelling.
    pub fn code_for(&self, cluster: &str) -> Option<char> {
        self.to_code.get(cluster).copied()
    }

    /// Collapses a cluster spelling to its codepoint; other tokens pass
    /// through unchanged.
    pub fn collapse(&self, token: &str) -> String {
        match self.to_code.get(token) {
            Some(c) => c.to_string(),
            None => token.to_string(),
        }
    }

    pub fn collapse_all<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<String> {
        tokens.iter().map(|t| self.collapse(t.as_ref())).collect()
    }

    /// Returns the cluster spelling of a codepoint.
    pub fn expand(&self, code: char) -> Option<&str> {
        self.to_cluster.get(&code).map(String::as_str)
    }

    /// Expands a single-codepoint token back to its cluster spelling.
    pub fn expand_token(&self, token: &str) -> String {
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => self.expand(c).unwrap_or(token).to_string(),
            _ => token.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.to_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_code.is_empty()
    }
}

fn parse_codepoint(spelled: &str) -> Result<char> {
    let mut chars = spelled.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Ok(c);
    }
    let hex = spelled
        .strip_prefix("U+")
        .or_else(|| spelled.strip_prefix("u+"))
        .unwrap_or(spelled);
    u32::from_str_radix(hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| PhonemizeError::config(format!("invalid codepoint {:?}", spelled)))
}

/// Token to model ID vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhonemeIdMap {
    ids: HashMap<String, u32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdValue {
    One(u32),
    Many(Vec<u32>),
}

impl PhonemeIdMap {
    pub fn new(ids: HashMap<String, u32>) -> Self {
        Self { ids }
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        Self {
            ids: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Parses a Piper voice config (`{"phoneme_id_map": {"a": [7]}}`) or a
    /// plain `{"a": 7}` object.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let table = value
            .get("phoneme_id_map")
            .unwrap_or(value)
            .as_object()
            .ok_or_else(|| PhonemizeError::config("phoneme id map must be a JSON object"))?;

        let mut ids = HashMap::with_capacity(table.len());
        for (token, raw) in table {
            let id = match IdValue::deserialize(raw)? {
                IdValue::One(id) => id,
                IdValue::Many(list) => *list.first().ok_or_else(|| {
                    PhonemizeError::config(format!("phoneme {:?} has no id", token))
                })?,
            };
            ids.insert(token.clone(), id);
        }
        Ok(Self { ids })
    }

    pub fn get(&self, token: &str) -> Option<u32> {
        self.ids.get(token).copied()
    }

    pub fn insert(&mut self, token: impl Into<String>, id: u32) {
        self.ids.insert(token.into(), id);
    }

    pub fn pad_id(&self) -> u32 {
        self.get(PAD).unwrap_or(DEFAULT_PAD_ID)
    }

    pub fn bos_id(&self) -> u32 {
        self.get(BOS).unwrap_or(DEFAULT_BOS_ID)
    }

    pub fn eos_id(&self) -> u32 {
        self.get(EOS).unwrap_or(DEFAULT_EOS_ID)
    }

    pub fn space_id(&self) -> u32 {
        self.get(SPACE).unwrap_or(DEFAULT_SPACE_ID)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.ids.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// How token IDs are framed for the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderLayout {
    /// `[BOS] ids [EOS]`
    Direct,
    /// `[BOS] (id PAD)* [EOS]`, the Piper convention.
    #[default]
    InterleavedPad,
}

/// Model input with prosody arrays aligned to `phoneme_ids`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelInput {
    pub phoneme_ids: Vec<u32>,
    /// Per-ID durations, zero on framing and padding slots. Empty when the
    /// result carried no durations.
    pub durations: Vec<f32>,
    pub pitches: Vec<f32>,
}

impl ModelInput {
    pub fn len(&self) -> usize {
        self.phoneme_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phoneme_ids.is_empty()
    }
}

/// Converts phoneme tokens into model input IDs.
#[derive(Debug, Clone)]
pub struct PhonemeEncoder {
    map: PhonemeIdMap,
    layout: EncoderLayout,
    clusters: ClusterTable,
    fallback_id: u32,
    pad_id: u32,
    bos_id: u32,
    eos_id: u32,
    space_id: u32,
    reverse: HashMap<u32, String>,
}

impl PhonemeEncoder {
    /// Creates an encoder. Unknown tokens encode as `fallback_id`, or as the
    /// pad ID when none is given.
    pub fn new(
        map: PhonemeIdMap,
        layout: EncoderLayout,
        clusters: ClusterTable,
        fallback_id: Option<u32>,
    ) -> Result<Self> {
        if map.is_empty() {
            return Err(PhonemizeError::config("phoneme id map is empty"));
        }

        let pad_id = map.pad_id();
        let bos_id = map.bos_id();
        let eos_id = map.eos_id();
        let space_id = map.space_id();
        if bos_id == eos_id {
            return Err(PhonemizeError::config(format!(
                "BOS and EOS share id {}",
                bos_id
            )));
        }

        // Lowest token wins when several share an ID.
        let mut sorted: Vec<(&str, u32)> = map.iter().collect();
        sorted.sort_unstable();
        let mut reverse = HashMap::with_capacity(sorted.len());
        for (token, id) in sorted {
            reverse.entry(id).or_insert_with(|| token.to_string());
        }
        reverse.entry(space_id).or_insert_with(|| SPACE.to_string());

        Ok(Self {
            fallback_id: fallback_id.unwrap_or(pad_id),
            map,
            layout,
            clusters,
            pad_id,
            bos_id,
            eos_id,
            space_id,
            reverse,
        })
    }

    pub fn layout(&self) -> EncoderLayout {
        self.layout
    }

    pub fn clusters(&self) -> &ClusterTable {
        &self.clusters
    }

    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }

    pub fn bos_id(&self) -> u32 {
        self.bos_id
    }

    pub fn eos_id(&self) -> u32 {
        self.eos_id
    }

    /// Returns the ID of a token after cluster collapsing.
    pub fn lookup(&self, token: &str) -> Option<u32> {
        let collapsed = self.clusters.collapse(token);
        self.map.get(&collapsed).or(match collapsed.as_str() {
            PAD => Some(self.pad_id),
            BOS => Some(self.bos_id),
            EOS => Some(self.eos_id),
            SPACE => Some(self.space_id),
            _ => None,
        })
    }

    pub fn contains(&self, token: &str) -> bool {
        self.lookup(token).is_some()
    }

    /// Maps each token to its ID without framing. Unknown tokens map to the
    /// fallback ID.
    pub fn map_tokens<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<u32> {
        tokens
            .iter()
            .map(|t| {
                let token = t.as_ref();
                self.lookup(token).unwrap_or_else(|| {
                    warn!(phoneme = %token, fallback = self.fallback_id, "encoder: unknown phoneme");
                    self.fallback_id
                })
            })
            .collect()
    }

    /// Encodes tokens into a framed ID sequence. Never fails; empty input
    /// yields `[BOS, EOS]`.
    pub fn encode<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<u32> {
        let ids = self.map_tokens(tokens);
        self.frame_with(&ids, self.bos_id, self.eos_id, self.pad_id)
    }

    fn frame<T: Copy>(&self, values: &[T], pad: T) -> Vec<T> {
        self.frame_with(values, pad, pad, pad)
    }

    fn frame_with<T: Copy>(&self, values: &[T], bos: T, eos: T, pad: T) -> Vec<T> {
        let mut out = match self.layout {
            EncoderLayout::Direct => Vec::with_capacity(values.len() + 2),
            EncoderLayout::InterleavedPad => Vec::with_capacity(values.len() * 2 + 2),
        };
        out.push(bos);
        for &v in values {
            out.push(v);
            if self.layout == EncoderLayout::InterleavedPad {
                out.push(pad);
            }
        }
        out.push(eos);
        out
    }

    /// Encodes a result's phonemes together with its prosody arrays.
    ///
    /// IDs the backend already supplied are framed as-is when they line up
    /// with the phonemes; otherwise the phonemes are mapped.
    pub fn encode_result(&self, result: &PhonemeResult) -> ModelInput {
        let ids = if result.has_ids() {
            result.phoneme_ids.clone()
        } else {
            self.map_tokens(&result.phonemes)
        };
        let phoneme_ids = self.frame_with(&ids, self.bos_id, self.eos_id, self.pad_id);
        let durations = if result.has_durations() {
            self.frame(&result.durations, 0.0)
        } else {
            Vec::new()
        };
        let pitches = if result.has_pitches() {
            self.frame(&result.pitches, 0.0)
        } else {
            Vec::new()
        };
        ModelInput {
            phoneme_ids,
            durations,
            pitches,
        }
    }

    /// Converts IDs back to tokens, dropping padding and framing and
    /// expanding private-use codepoints to cluster spellings.
    pub fn decode(&self, ids: &[u32]) -> Vec<String> {
        let mut tokens = Vec::with_capacity(ids.len());
        for &id in ids {
            if id == self.pad_id || id == self.bos_id || id == self.eos_id {
                continue;
            }
            match self.reverse.get(&id) {
                Some(token) => tokens.push(self.clusters.expand_token(token)),
                None => warn!(id, "encoder: unknown phoneme id"),
            }
        }
        tokens
    }
}

#[cfg(test)]
mod encoder_tests {
    use super::*;

    fn pua(code: u32) -> String {
        char::from_u32(code).unwrap().to_string()
    }

    fn piper_map() -> PhonemeIdMap {
        let mut pairs: Vec<(String, u32)> = [
            ("_", 0),
            ("^", 1),
            ("$", 2),
            ("?", 3),
            ("#", 4),
            ("[", 5),
            ("]", 6),
            ("a", 7),
            ("i", 8),
            ("u", 9),
            ("e", 10),
            ("o", 11),
            ("A", 12),
            ("I", 13),
            ("U", 14),
            ("E", 15),
            ("O", 16),
            ("N", 22),
            ("q", 24),
            ("k", 25),
            ("g", 28),
            ("t", 31),
            ("d", 33),
            ("p", 35),
            ("b", 37),
            ("s", 41),
            ("z", 43),
            ("j", 44),
            ("f", 46),
            ("h", 47),
            ("v", 49),
            ("n", 50),
            ("m", 52),
            ("r", 54),
            ("w", 56),
            ("y", 57),
        ]
        .into_iter()
        .map(|(t, id)| (t.to_string(), id))
        .collect();
        let pua_ids = [
            (0xE000, 17),
            (0xE001, 18),
            (0xE002, 19),
            (0xE003, 20),
            (0xE004, 21),
            (0xE005, 23),
            (0xE006, 26),
            (0xE007, 27),
            (0xE008, 29),
            (0xE009, 30),
            (0xE00A, 32),
            (0xE00B, 34),
            (0xE00C, 36),
            (0xE00D, 38),
            (0xE00E, 39),
            (0xE00F, 40),
            (0xE010, 42),
            (0xE011, 45),
            (0xE012, 48),
            (0xE013, 51),
            (0xE014, 53),
            (0xE015, 55),
        ];
        pairs.extend(pua_ids.into_iter().map(|(code, id)| (pua(code), id)));
        PhonemeIdMap::from_pairs(pairs)
    }

    fn encoder(layout: EncoderLayout) -> PhonemeEncoder {
        PhonemeEncoder::new(piper_map(), layout, ClusterTable::default(), None).unwrap()
    }

    fn tokens(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_konnichiwa_interleaved() {
        let enc = encoder(EncoderLayout::InterleavedPad);
        let ids = enc.encode(&tokens("k o N n i ch i w a"));
        assert_eq!(ids.len(), 20);
        assert_eq!(
            ids,
            vec![1, 25, 0, 11, 0, 22, 0, 50, 0, 8, 0, 39, 0, 8, 0, 56, 0, 7, 0, 2]
        );
    }

    #[test]
    fn test_length_laws() {
        let direct = encoder(EncoderLayout::Direct);
        let interleaved = encoder(EncoderLayout::InterleavedPad);
        for input in ["", "a", "k o N n i ch i w a", "sh i zz xx"] {
            let toks = tokens(input);
            let n = toks.len();
            let d = direct.encode(&toks);
            let p = interleaved.encode(&toks);
            assert_eq!(d.len(), n + 2);
            assert_eq!(p.len(), 2 * n + 2);
            assert_eq!(d.first(), Some(&1));
            assert_eq!(d.last(), Some(&2));
            assert_eq!(p.first(), Some(&1));
            assert_eq!(p.last(), Some(&2));
        }
        assert_eq!(direct.encode::<String>(&[]), vec![1, 2]);
    }

    #[test]
    fn test_unknown_tokens_use_fallback() {
        let enc = encoder(EncoderLayout::Direct);
        assert_eq!(enc.encode(&tokens("a xx")), vec![1, 7, 0, 2]);

        let enc = PhonemeEncoder::new(
            piper_map(),
            EncoderLayout::Direct,
            ClusterTable::default(),
            Some(3),
        )
        .unwrap();
        assert_eq!(enc.map_tokens(&tokens("xx a")), vec![3, 7]);
    }

    #[test]
    fn test_collapse_commutes_with_lookup() {
        let enc = encoder(EncoderLayout::Direct);
        let table = ClusterTable::default();
        for t in ["ch", "ky", "a:", "cl", "a", "N", "zz"] {
            assert_eq!(enc.lookup(t), enc.lookup(&table.collapse(t)), "token {}", t);
        }
        assert_eq!(enc.lookup("ch"), Some(39));
        assert!(enc.contains("ry"));
        assert!(!enc.contains("zz"));
    }

    #[test]
    fn test_cluster_round_trip() {
        let table = ClusterTable::default();
        assert_eq!(table.len(), 22);
        for (cluster, code) in DEFAULT_CLUSTERS {
            let c = char::from_u32(code).unwrap();
            assert_eq!(table.code_for(cluster), Some(c));
            assert_eq!(table.expand(c), Some(cluster));
            assert_eq!(table.expand_token(&table.collapse(cluster)), cluster);
        }
        assert_eq!(table.collapse("k"), "k");
        assert_eq!(table.expand_token("k"), "k");
        assert_eq!(table.collapse_all(&tokens("ch a")), vec![pua(0xE00E), "a".to_string()]);
    }

    #[test]
    fn test_cluster_table_validation() {
        assert!(ClusterTable::new([("ch", '\u{E000}'), ("ts", '\u{E001}')]).is_ok());
        assert!(ClusterTable::new([("ch", '\u{E000}'), ("ts", '\u{E000}')]).is_err());
        assert!(ClusterTable::new([("ch", '\u{E000}'), ("ch", '\u{E001}')]).is_err());
        assert!(ClusterTable::new([("ch", 'x')]).is_err());
        assert!(ClusterTable::new([("c", '\u{E000}')]).is_err());
        assert!(ClusterTable::empty().is_empty());
    }

    #[test]
    fn test_cluster_table_from_map() {
        let mut map = BTreeMap::new();
        map.insert("ch".to_string(), "U+E00E".to_string());
        map.insert("ts".to_string(), "\u{E00F}".to_string());
        let table = ClusterTable::from_map(&map).unwrap();
        assert_eq!(table.code_for("ch"), Some('\u{E00E}'));
        assert_eq!(table.code_for("ts"), Some('\u{E00F}'));

        map.insert("sh".to_string(), "nope".to_string());
        assert!(ClusterTable::from_map(&map).is_err());
    }

    #[test]
    fn test_decode() {
        let enc = encoder(EncoderLayout::InterleavedPad);
        let toks = tokens("k o N n i ch i w a");
        assert_eq!(enc.decode(&enc.encode(&toks)), toks);
        assert_eq!(enc.decode(&[1, 7, 999, 2]), vec!["a"]);
    }

    #[test]
    fn test_map_from_piper_json() {
        let json = r#"{"audio":{"sample_rate":22050},"phoneme_id_map":{"_":[0],"^":[1],"$":[2],"a":[7],"k":[25]}}"#;
        let map = PhonemeIdMap::from_json(json).unwrap();
        assert_eq!(map.len(), 5);
        assert_eq!(map.get("k"), Some(25));

        let map = PhonemeIdMap::from_json(r#"{"a": 7, "k": 25}"#).unwrap();
        assert_eq!(map.get("a"), Some(7));

        assert!(PhonemeIdMap::from_json(r#"{"a": []}"#).is_err());
        assert!(PhonemeIdMap::from_json(r#"[1, 2]"#).is_err());
        assert!(PhonemeIdMap::from_json("{").is_err());
    }

    #[test]
    fn test_reserved_defaults() {
        let map = PhonemeIdMap::from_pairs([("a", 10)]);
        assert_eq!(map.pad_id(), 0);
        assert_eq!(map.bos_id(), 1);
        assert_eq!(map.eos_id(), 2);
        assert_eq!(map.space_id(), 3);

        let enc = PhonemeEncoder::new(map, EncoderLayout::Direct, ClusterTable::empty(), None).unwrap();
        assert_eq!(enc.encode(&tokens("a")), vec![1, 10, 2]);
        assert_eq!(enc.lookup(" "), Some(3));
    }

    #[test]
    fn test_invalid_encoder() {
        let err = PhonemeEncoder::new(
            PhonemeIdMap::default(),
            EncoderLayout::Direct,
            ClusterTable::empty(),
            None,
        );
        assert!(err.is_err());

        let map = PhonemeIdMap::from_pairs([("^", 1), ("$", 1)]);
        assert!(PhonemeEncoder::new(map, EncoderLayout::Direct, ClusterTable::empty(), None).is_err());
    }

    #[test]
    fn test_encode_result_aligns_prosody() {
        let enc = encoder(EncoderLayout::InterleavedPad);
        let result = PhonemeResult::new("ka", "ja", tokens("k a"))
            .with_durations(vec![0.05, 0.1])
            .with_pitches(vec![1.0, 2.0]);
        let input = enc.encode_result(&result);
        assert_eq!(input.phoneme_ids, vec![1, 25, 0, 7, 0, 2]);
        assert_eq!(input.durations, vec![0.0, 0.05, 0.0, 0.1, 0.0, 0.0]);
        assert_eq!(input.pitches.len(), input.len());

        let bare = PhonemeResult::new("ka", "ja", tokens("k a"));
        let input = enc.encode_result(&bare);
        assert!(input.durations.is_empty());
        assert!(input.pitches.is_empty());
    }

    #[test]
    fn test_encode_result_keeps_backend_ids() {
        let enc = encoder(EncoderLayout::Direct);
        let supplied = PhonemeResult::new("ka", "ja", tokens("k a")).with_ids(vec![90, 91]);
        assert_eq!(enc.encode_result(&supplied).phoneme_ids, vec![1, 90, 91, 2]);

        let misaligned = PhonemeResult::new("ka", "ja", tokens("k a")).with_ids(vec![90]);
        assert_eq!(enc.encode_result(&misaligned).phoneme_ids, vec![1, 25, 7, 2]);
    }
}

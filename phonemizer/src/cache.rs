//! Bounded LRU cache for phonemization results.

use crate::backend::PhonemeOptions;
use crate::error::{PhonemizeError, Result};
use crate::result::PhonemeResult;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use tracing::trace;

const NIL: usize = usize::MAX;

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub count: usize,
    pub capacity: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub eviction_count: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, or 0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

struct Entry<K, V> {
    key: K,
    value: V,
    prev: usize,
    next: usize,
}

/// Entries live in a dense vector linked by index. `head` is the most
/// recently used entry, `tail` the least.
struct Inner<K, V> {
    index: HashMap<K, usize>,
    entries: Vec<Entry<K, V>>,
    head: usize,
    tail: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn new(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
            head: NIL,
            tail: NIL,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    fn unlink(&mut self, i: usize) {
        let (prev, next) = (self.entries[i].prev, self.entries[i].next);
        if prev != NIL {
            self.entries[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.entries[next].prev = prev;
        } else {
            self.tail = prev;
        }
        self.entries[i].prev = NIL;
        self.entries[i].next = NIL;
    }

    fn push_front(&mut self, i: usize) {
        self.entries[i].prev = NIL;
        self.entries[i].next = self.head;
        if self.head != NIL {
            self.entries[self.head].prev = i;
        } else {
            self.tail = i;
        }
        self.head = i;
    }

    fn touch(&mut self, i: usize) {
        if self.head != i {
            self.unlink(i);
            self.push_front(i);
        }
    }

    /// Removes the entry at `i`, moving the last entry into its slot.
    fn remove_at(&mut self, i: usize) -> Entry<K, V> {
        self.unlink(i);
        let entry = self.entries.swap_remove(i);
        self.index.remove(&entry.key);

        if i < self.entries.len() {
            let (prev, next) = (self.entries[i].prev, self.entries[i].next);
            if prev != NIL {
                self.entries[prev].next = i;
            } else {
                self.head = i;
            }
            if next != NIL {
                self.entries[next].prev = i;
            } else {
                self.tail = i;
            }
            if let Some(slot) = self.index.get_mut(&self.entries[i].key) {
                *slot = i;
            }
        }
        entry
    }

    fn evict_lru(&mut self) -> bool {
        if self.tail == NIL {
            return false;
        }
        self.remove_at(self.tail);
        self.evictions += 1;
        true
    }

    fn clear(&mut self) {
        self.index.clear();
        self.entries.clear();
        self.head = NIL;
        self.tail = NIL;
        self.hits = 0;
        self.misses = 0;
        self.evictions = 0;
    }
}

/// A thread-safe least-recently-used cache with a fixed capacity.
///
/// All operations are O(1) and take one lock.
pub struct LruCache<K, V> {
    capacity: usize,
    inner: Mutex<Inner<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    /// Creates a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PhonemizeError::config("cache capacity must be at least 1"));
        }
        Ok(Self {
            capacity,
            inner: Mutex::new(Inner::new(capacity)),
        })
    }

    /// Returns a copy of the value and marks it most recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        match inner.index.get(key).copied() {
            Some(i) => {
                inner.hits += 1;
                inner.touch(i);
                Some(inner.entries[i].value.clone())
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Inserts or replaces a value. A new key on a full cache evicts the
    /// least recently used entry.
    pub fn put(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        if let Some(i) = inner.index.get(&key).copied() {
            inner.entries[i].value = value;
            inner.touch(i);
            return;
        }

        if inner.entries.len() >= self.capacity && inner.evict_lru() {
            trace!(capacity = self.capacity, "cache: evicted least recently used entry");
        }

        let i = inner.entries.len();
        inner.entries.push(Entry {
            key: key.clone(),
            value,
            prev: NIL,
            next: NIL,
        });
        inner.index.insert(key, i);
        inner.push_front(i);
    }

    /// Removes a key. Returns true if it was present.
    pub fn remove(&self, key: &K) -> bool {
        let mut inner = self.inner.lock();
        match inner.index.get(key).copied() {
            Some(i) => {
                inner.remove_at(i);
                true
            }
            None => false,
        }
    }

    /// Checks for a key without touching recency or counters.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().index.contains_key(key)
    }

    /// Drops every entry and resets the counters.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Evicts least recently used entries until at most `target` remain.
    /// Returns the number of evicted entries.
    pub fn trim(&self, target: usize) -> usize {
        let mut inner = self.inner.lock();
        let mut evicted = 0;
        while inner.entries.len() > target && inner.evict_lru() {
            evicted += 1;
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            count: inner.entries.len(),
            capacity: self.capacity,
            hit_count: inner.hits,
            miss_count: inner.misses,
            eviction_count: inner.evictions,
        }
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Vec<K> {
        let inner = self.inner.lock();
        let mut keys = Vec::with_capacity(inner.entries.len());
        let mut i = inner.head;
        while i != NIL {
            keys.push(inner.entries[i].key.clone());
            i = inner.entries[i].next;
        }
        keys
    }
}

/// Cache key: text and language with case folded and whitespace collapsed,
/// plus the fingerprint of the options the result was produced under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    text: String,
    language: String,
    variant: String,
}

impl CacheKey {
    /// Builds a key, or `None` if text or language is blank.
    pub fn new(text: &str, language: &str) -> Option<Self> {
        let text = fold(text);
        let language = fold(language);
        if text.is_empty() || language.is_empty() {
            return None;
        }
        Some(Self {
            text,
            language,
            variant: String::new(),
        })
    }

    /// Scopes the key to one set of phonemization options.
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = variant.into();
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }
}

fn fold(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// LRU cache of successful [`PhonemeResult`]s keyed by text and language.
pub struct PhonemeCache {
    lru: LruCache<CacheKey, PhonemeResult>,
}

impl PhonemeCache {
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            lru: LruCache::new(capacity)?,
        })
    }

    fn key(text: &str, language: &str, options: &PhonemeOptions) -> Option<CacheKey> {
        CacheKey::new(text, language).map(|key| key.with_variant(options.fingerprint()))
    }

    /// Returns a copy of the result cached under default options, with
    /// `from_cache` set.
    pub fn lookup(&self, text: &str, language: &str) -> Option<PhonemeResult> {
        self.lookup_with(text, language, &PhonemeOptions::default())
    }

    /// Returns a copy of the result cached under `options`, with
    /// `from_cache` set.
    pub fn lookup_with(
        &self,
        text: &str,
        language: &str,
        options: &PhonemeOptions,
    ) -> Option<PhonemeResult> {
        let key = Self::key(text, language, options)?;
        let mut result = self.lru.get(&key)?;
        result.from_cache = true;
        Some(result)
    }

    /// Stores a result produced under default options.
    pub fn store(&self, text: &str, language: &str, result: &PhonemeResult) -> bool {
        self.store_with(text, language, &PhonemeOptions::default(), result)
    }

    /// Stores a result produced under `options`. Failed results and blank
    /// keys are ignored.
    pub fn store_with(
        &self,
        text: &str,
        language: &str,
        options: &PhonemeOptions,
        result: &PhonemeResult,
    ) -> bool {
        if !result.success {
            return false;
        }
        let Some(key) = Self::key(text, language, options) else {
            return false;
        };
        let mut entry = result.clone();
        entry.from_cache = false;
        self.lru.put(key, entry);
        true
    }

    pub fn remove(&self, text: &str, language: &str, options: &PhonemeOptions) -> bool {
        Self::key(text, language, options).is_some_and(|key| self.lru.remove(&key))
    }

    pub fn contains(&self, text: &str, language: &str, options: &PhonemeOptions) -> bool {
        Self::key(text, language, options).is_some_and(|key| self.lru.contains(&key))
    }

    pub fn clear(&self) {
        self.lru.clear();
    }

    pub fn trim(&self, target: usize) -> usize {
        self.lru.trim(target)
    }

    pub fn len(&self) -> usize {
        self.lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lru.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lru.capacity()
    }

    pub fn stats(&self) -> CacheStats {
        self.lru.stats()
    }
}

#[cfg(test)]
mod cache_tests {
    use super::*;
    use std::sync::Arc;

    fn cache(capacity: usize) -> LruCache<String, i32> {
        LruCache::new(capacity).unwrap()
    }

    fn key(s: &str) -> String {
        s.to_string()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            LruCache::<String, i32>::new(0),
            Err(PhonemizeError::Configuration(_))
        ));
        assert!(PhonemeCache::new(0).is_err());
    }

    #[test]
    fn test_get_after_put() {
        let c = cache(2);
        c.put(key("a"), 1);
        assert_eq!(c.get(&key("a")), Some(1));
        assert_eq!(c.get(&key("b")), None);
        let stats = c.stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_touched_entry_survives_eviction() {
        let c = cache(3);
        c.put(key("a"), 1);
        c.put(key("b"), 2);
        c.put(key("c"), 3);
        assert_eq!(c.get(&key("a")), Some(1));
        c.put(key("d"), 4);

        assert!(!c.contains(&key("b")));
        for k in ["a", "c", "d"] {
            assert!(c.contains(&key(k)), "{} should remain", k);
        }
        assert_eq!(c.len(), 3);
        assert_eq!(c.stats().eviction_count, 1);
    }

    #[test]
    fn test_capacity_plus_one_evicts_first() {
        let c = cache(4);
        for i in 0..5 {
            c.put(i.to_string(), i);
        }
        assert!(!c.contains(&key("0")));
        assert_eq!(c.len(), 4);
        assert_eq!(c.keys(), vec![key("4"), key("3"), key("2"), key("1")]);
    }

    #[test]
    fn test_update_promotes_without_growing() {
        let c = cache(2);
        c.put(key("a"), 1);
        c.put(key("b"), 2);
        c.put(key("a"), 10);
        assert_eq!(c.len(), 2);
        c.put(key("c"), 3);
        assert!(!c.contains(&key("b")));
        assert_eq!(c.get(&key("a")), Some(10));
    }

    #[test]
    fn test_contains_has_no_side_effects() {
        let c = cache(2);
        c.put(key("a"), 1);
        c.put(key("b"), 2);
        assert!(c.contains(&key("a")));
        c.put(key("c"), 3);
        // "a" was not promoted by contains
        assert!(!c.contains(&key("a")));
        let stats = c.stats();
        assert_eq!(stats.hit_count + stats.miss_count, 0);
    }

    #[test]
    fn test_remove_keeps_list_consistent() {
        let c = cache(4);
        for k in ["a", "b", "c", "d"] {
            c.put(key(k), 0);
        }
        assert!(c.remove(&key("b")));
        assert!(!c.remove(&key("b")));
        assert!(c.remove(&key("d")));
        assert_eq!(c.keys(), vec![key("c"), key("a")]);

        c.put(key("e"), 0);
        c.put(key("f"), 0);
        c.put(key("g"), 0);
        assert_eq!(c.keys(), vec![key("g"), key("f"), key("e"), key("c")]);
    }

    #[test]
    fn test_clear_resets_counters() {
        let c = cache(1);
        c.put(key("a"), 1);
        c.put(key("b"), 2);
        c.get(&key("b"));
        c.get(&key("a"));
        c.clear();
        assert_eq!(
            c.stats(),
            CacheStats {
                count: 0,
                capacity: 1,
                ..Default::default()
            }
        );
        assert!(c.is_empty());
        assert!(c.keys().is_empty());
    }

    #[test]
    fn test_trim() {
        let c = cache(5);
        for i in 0..5 {
            c.put(i.to_string(), i);
        }
        assert_eq!(c.trim(2), 3);
        assert_eq!(c.keys(), vec![key("4"), key("3")]);
        assert_eq!(c.trim(10), 0);
        assert_eq!(c.stats().eviction_count, 3);
    }

    #[test]
    fn test_matches_reference_model() {
        let c = cache(3);
        let mut model: Vec<(u32, i32)> = Vec::new();
        let mut seed = 7u32;
        for step in 0..500u32 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let k = (seed >> 16) % 6;
            match step % 3 {
                0 | 1 => {
                    let v = step as i32;
                    c.put(k.to_string(), v);
                    if let Some(pos) = model.iter().position(|(mk, _)| *mk == k) {
                        model.remove(pos);
                    } else if model.len() == 3 {
                        model.pop();
                    }
                    model.insert(0, (k, v));
                }
                _ => {
                    let got = c.get(&k.to_string());
                    let want = model.iter().position(|(mk, _)| *mk == k).map(|pos| {
                        let e = model.remove(pos);
                        model.insert(0, e);
                        e.1
                    });
                    assert_eq!(got, want);
                }
            }
            let keys: Vec<String> = model.iter().map(|(k, _)| k.to_string()).collect();
            assert_eq!(c.keys(), keys);
        }
    }

    #[test]
    fn test_cache_key_folding() {
        let a = CacheKey::new("  Hello   World ", "EN").unwrap();
        let b = CacheKey::new("hello world", "en").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.text(), "hello world");
        assert_eq!(a.language(), "en");

        assert!(CacheKey::new("", "en").is_none());
        assert!(CacheKey::new("   ", "en").is_none());
        assert!(CacheKey::new("hi", " ").is_none());
    }

    #[test]
    fn test_phoneme_cache_lookup_marks_from_cache() {
        let c = PhonemeCache::new(8).unwrap();
        let r = PhonemeResult::new("Hello", "en", vec!["h".into(), "ə".into()]);
        assert!(c.store("Hello", "en", &r));
        assert!(c.contains("hello", "EN", &PhonemeOptions::default()));

        let hit = c.lookup("HELLO", "en").unwrap();
        assert!(hit.from_cache);
        assert_eq!(hit.phonemes, r.phonemes);
        assert!(c.lookup("bye", "en").is_none());
        assert!(c.lookup("", "en").is_none());
    }

    #[test]
    fn test_phoneme_cache_separates_options() {
        use crate::backend::PhonemeFormat;

        let c = PhonemeCache::new(8).unwrap();
        let arpabet = PhonemeOptions {
            format: PhonemeFormat::Arpabet,
            ..Default::default()
        };
        let r = PhonemeResult::new("hi", "en", vec!["HH".into(), "AY1".into()]);
        assert!(c.store_with("hi", "en", &arpabet, &r));

        assert!(c.lookup("hi", "en").is_none());
        assert!(!c.contains("hi", "en", &PhonemeOptions::default()));
        let hit = c.lookup_with("hi", "en", &arpabet).unwrap();
        assert_eq!(hit.phonemes, vec!["HH", "AY1"]);

        assert!(c.remove("hi", "en", &arpabet));
        assert!(c.is_empty());
    }

    #[test]
    fn test_phoneme_cache_rejects_failures_and_blank_keys() {
        let c = PhonemeCache::new(8).unwrap();
        let failed = PhonemeResult::failure("x", "en", "boom");
        assert!(!c.store("x", "en", &failed));
        let ok = PhonemeResult::new("x", "en", vec!["x".into()]);
        assert!(!c.store("  ", "en", &ok));
        assert!(c.is_empty());
        // rejected keys never touch the counters
        c.lookup(" ", "en");
        assert_eq!(c.stats().miss_count, 0);
    }

    #[test]
    fn test_phoneme_cache_returns_independent_copies() {
        let c = PhonemeCache::new(2).unwrap();
        let r = PhonemeResult::new("ka", "ja", vec!["k".into(), "a".into()]);
        c.store("ka", "ja", &r);
        let mut first = c.lookup("ka", "ja").unwrap();
        first.phonemes.clear();
        let second = c.lookup("ka", "ja").unwrap();
        assert_eq!(second.phonemes.len(), 2);
    }

    #[test]
    fn test_concurrent_access_respects_capacity() {
        let c = Arc::new(PhonemeCache::new(16).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let c = Arc::clone(&c);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let text = format!("word{}", (i * 7 + t) % 40);
                        let r = PhonemeResult::new(text.clone(), "en", vec!["w".into()]);
                        c.store(&text, "en", &r);
                        c.lookup(&text, "en");
                        assert!(c.len() <= 16);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let stats = c.stats();
        assert!(stats.count <= 16);
        assert_eq!(stats.hit_count + stats.miss_count, 8 * 200);
    }
}

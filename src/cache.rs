use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

use crate::decode::FrameSequence;
use crate::lock;
use crate::source::SourceKey;

static GLOBAL: Lazy<Arc<FrameCache>> = Lazy::new(|| Arc::new(FrameCache::new()));

/// Process-wide memoization store mapping a [`SourceKey`] to its decoded
/// [`FrameSequence`].
///
/// There is no capacity bound, TTL, or LRU: entries live until [`evict`] or
/// [`clear`]. Callers needing bounded memory evict manually. Lookups and
/// writes hold the lock only across non-suspending critical sections, so
/// [`insert_if_absent`] is atomic with respect to concurrent loads.
///
/// [`evict`]: FrameCache::evict
/// [`clear`]: FrameCache::clear
/// [`insert_if_absent`]: FrameCache::insert_if_absent
#[derive(Debug, Default)]
pub struct FrameCache {
    entries: Mutex<HashMap<SourceKey, Arc<FrameSequence>>>,
}

impl FrameCache {
    /// Construct an empty cache. Prefer injecting a cache over reaching for
    /// [`FrameCache::global`] anywhere testability matters.
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared process-wide cache instance.
    pub fn global() -> Arc<FrameCache> {
        GLOBAL.clone()
    }

    /// Return the cached sequence for `key`, if present. No side effects.
    pub fn lookup(&self, key: &SourceKey) -> Option<Arc<FrameSequence>> {
        lock(&self.entries).get(key).cloned()
    }

    /// Store `sequence` only if `key` is not already present, and return the
    /// canonical entry for `key`.
    ///
    /// When two loads race on the same key, the first write wins and the
    /// loser's sequence is discarded, so the cache holds exactly one
    /// sequence per key for its lifetime.
    pub fn insert_if_absent(
        &self,
        key: SourceKey,
        sequence: Arc<FrameSequence>,
    ) -> Arc<FrameSequence> {
        lock(&self.entries).entry(key).or_insert(sequence).clone()
    }

    /// Remove one entry; returns whether it was present.
    pub fn evict(&self, key: &SourceKey) -> bool {
        lock(&self.entries).remove(key).is_some()
    }

    /// Remove all entries.
    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    /// Number of cached sequences.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use image::RgbaImage;

    use super::*;
    use crate::decode::DecodedFrame;
    use crate::source::Source;

    fn sequence(tag: u8) -> Arc<FrameSequence> {
        let frame = DecodedFrame {
            rgba: RgbaImage::from_pixel(1, 1, image::Rgba([tag, 0, 0, 255])),
            delay: Duration::from_millis(100),
        };
        Arc::new(FrameSequence {
            frames: vec![frame],
            natural_duration: Duration::from_millis(100),
            width: 1,
            height: 1,
        })
    }

    #[test]
    fn insert_if_absent_keeps_first_write() {
        let cache = FrameCache::new();
        let key = Source::asset("a.gif").cache_key();

        let first = cache.insert_if_absent(key.clone(), sequence(1));
        let second = cache.insert_if_absent(key.clone(), sequence(2));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.frames[0].rgba.get_pixel(0, 0).0[0], 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn lookup_returns_shared_reference() {
        let cache = FrameCache::new();
        let key = Source::asset("a.gif").cache_key();
        assert!(cache.lookup(&key).is_none());

        let inserted = cache.insert_if_absent(key.clone(), sequence(1));
        let looked_up = cache.lookup(&key).unwrap();
        assert!(Arc::ptr_eq(&inserted, &looked_up));
    }

    #[test]
    fn evict_reports_presence() {
        let cache = FrameCache::new();
        let key = Source::asset("a.gif").cache_key();

        assert!(!cache.evict(&key));
        cache.insert_if_absent(key.clone(), sequence(1));
        assert!(cache.evict(&key));
        assert!(!cache.evict(&key));
        assert!(cache.lookup(&key).is_none());
    }

    #[test]
    fn clear_empties_every_key() {
        let cache = FrameCache::new();
        cache.insert_if_absent(Source::asset("a.gif").cache_key(), sequence(1));
        cache.insert_if_absent(Source::asset("b.gif").cache_key(), sequence(2));
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.lookup(&Source::asset("a.gif").cache_key()).is_none());
        assert!(cache.lookup(&Source::asset("b.gif").cache_key()).is_none());
    }
}

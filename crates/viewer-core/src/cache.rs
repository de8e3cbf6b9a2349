//! Rendered-page cache.
//!
//! A bitmap is only reusable while everything drawn into it is unchanged,
//! so the key carries the scale, the debug flag and the overlay generation
//! next to the page.

use crate::editor::RenderedPage;
use lru::LruCache;
use std::num::NonZeroUsize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RenderKey {
    pub page_index: u32,
    pub scale_bits: u32,
    pub debug: bool,
    pub overlay_generation: u64,
}

impl RenderKey {
    /// Same render settings, another page.
    pub fn for_page(self, page_index: u32) -> Self {
        Self { page_index, ..self }
    }
}

pub(crate) struct RenderCache {
    pages: LruCache<RenderKey, RenderedPage>,
}

impl RenderCache {
    /// A capacity of zero still keeps the page on screen.
    pub fn new(capacity: usize) -> Self {
        Self { pages: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)) }
    }

    pub fn get(&mut self, key: &RenderKey) -> Option<RenderedPage> {
        self.pages.get(key).cloned()
    }

    pub fn insert(&mut self, key: RenderKey, page: RenderedPage) {
        self.pages.put(key, page);
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }

    /// Pages within `radius` of `current` that are not rendered yet with
    /// the same settings: following pages before preceding ones, nearest
    /// first. Never yields more pages than the cache holds besides
    /// `current`, so warming cannot evict the page being shown.
    pub fn pages_to_warm(&self, current: &RenderKey, page_count: u32, radius: u32) -> Vec<u32> {
        let room = self.pages.cap().get().saturating_sub(1);
        let page = current.page_index;

        let following = (1..=radius).filter_map(|offset| page.checked_add(offset));
        let preceding = (1..=radius).filter_map(|offset| page.checked_sub(offset));

        following
            .filter(|&index| index < page_count)
            .chain(preceding)
            .filter(|&index| !self.pages.contains(&current.for_page(index)))
            .take(room)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::ViewTransform;
    use pdf_engine::RgbaImage;
    use std::sync::Arc;

    fn key(page_index: u32) -> RenderKey {
        RenderKey { page_index, scale_bits: 1.0_f32.to_bits(), debug: false, overlay_generation: 0 }
    }

    fn page(page_index: u32) -> RenderedPage {
        RenderedPage {
            page_index,
            image: Arc::new(RgbaImage::new(1, 1)),
            transform: ViewTransform::from_zoom(1.0),
        }
    }

    #[test]
    fn least_recently_viewed_page_is_dropped() {
        let mut cache = RenderCache::new(2);
        cache.insert(key(0), page(0));
        cache.insert(key(1), page(1));
        assert!(cache.get(&key(0)).is_some());
        cache.insert(key(2), page(2));

        assert!(cache.get(&key(1)).is_none());
        assert_eq!(cache.get(&key(0)).map(|page| page.page_index), Some(0));
        assert_eq!(cache.get(&key(2)).map(|page| page.page_index), Some(2));
    }

    #[test]
    fn other_settings_miss_the_cache() {
        let mut cache = RenderCache::new(4);
        cache.insert(key(0), page(0));

        let debug = RenderKey { debug: true, ..key(0) };
        let newer = RenderKey { overlay_generation: 1, ..key(0) };
        assert!(cache.get(&debug).is_none());
        assert!(cache.get(&newer).is_none());

        cache.clear();
        assert!(cache.get(&key(0)).is_none());
    }

    #[test]
    fn warming_prefers_following_pages_and_skips_cached_ones() {
        let mut cache = RenderCache::new(8);
        assert_eq!(cache.pages_to_warm(&key(5), 10, 2), vec![6, 7, 4, 3]);

        cache.insert(key(6), page(6));
        assert_eq!(cache.pages_to_warm(&key(5), 10, 2), vec![7, 4, 3]);

        // Cached at another scale does not count.
        let zoomed = RenderKey { scale_bits: 2.0_f32.to_bits(), ..key(5) };
        assert_eq!(cache.pages_to_warm(&zoomed, 10, 1), vec![6, 4]);
    }

    #[test]
    fn warming_stays_in_range_and_within_capacity() {
        let cache = RenderCache::new(8);
        assert_eq!(cache.pages_to_warm(&key(0), 3, 3), vec![1, 2]);
        assert!(cache.pages_to_warm(&key(0), 1, 2).is_empty());

        let small = RenderCache::new(2);
        assert_eq!(small.pages_to_warm(&key(5), 10, 3), vec![6]);
        assert!(RenderCache::new(0).pages_to_warm(&key(5), 10, 3).is_empty());
    }
}

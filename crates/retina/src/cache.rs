use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::anchor::{Anchors, ImageSize};
use crate::error::Result;

/// Anchors per image size, computed once and shared afterwards.
#[derive(Debug, Default)]
pub struct AnchorCache {
    anchors: RwLock<HashMap<ImageSize, Arc<Anchors>>>,
}

impl AnchorCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached anchors for `image_size`, if any.
    #[must_use]
    pub fn get(&self, image_size: ImageSize) -> Option<Arc<Anchors>> {
        self.anchors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&image_size)
            .cloned()
    }

    /// The cached anchors for `image_size`, computing them with `make` on a miss.
    ///
    /// `make` runs without holding the lock. If another thread inserts anchors for the same size
    /// in the meantime, its anchors are kept and returned.
    pub fn get_or_try_insert_with<F>(&self, image_size: ImageSize, make: F) -> Result<Arc<Anchors>>
    where
        F: FnOnce() -> Result<Anchors>,
    {
        if let Some(anchors) = self.get(image_size) {
            return Ok(anchors);
        }

        let anchors = Arc::new(make()?);
        tracing::debug!(?image_size, num_anchors = anchors.len(), "anchor cache miss");

        let mut cache = self.anchors.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(cache.entry(image_size).or_insert(anchors)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.anchors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.anchors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn anchors(size: f32) -> Anchors {
        Anchors::from_rows(&[[1.0, 1.0, size, size]])
    }

    #[test]
    fn computes_once_per_size() {
        let cache = AnchorCache::new();
        let calls = AtomicUsize::new(0);
        let make = || {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok(anchors(2.0))
        };

        let first = cache.get_or_try_insert_with(ImageSize::new(4, 4), make).unwrap();
        let second = cache.get_or_try_insert_with(ImageSize::new(4, 4), make).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::Relaxed), 1);

        cache
            .get_or_try_insert_with(ImageSize::new(8, 4), make)
            .unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn errors_are_not_cached() {
        let cache = AnchorCache::new();
        let size = ImageSize::new(0, 4);

        let result = cache.get_or_try_insert_with(size, || {
            Err(Error::InvalidImageSize {
                width: 0,
                height: 4,
            })
        });

        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_callers_share_one_entry() {
        let cache = AnchorCache::new();
        let size = ImageSize::new(16, 16);

        let results = std::thread::scope(|scope| {
            let handles = (0..8)
                .map(|_| scope.spawn(|| cache.get_or_try_insert_with(size, || Ok(anchors(3.0)))))
                .collect::<Vec<_>>();

            handles
                .into_iter()
                .map(|handle| handle.join().unwrap().unwrap())
                .collect::<Vec<_>>()
        });

        assert_eq!(cache.len(), 1);
        let cached = cache.get(size).unwrap();
        assert!(results.iter().all(|anchors| Arc::ptr_eq(anchors, &cached)));
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = AnchorCache::new();
        cache
            .get_or_try_insert_with(ImageSize::new(4, 4), || Ok(anchors(1.0)))
            .unwrap();

        cache.clear();
        assert!(cache.get(ImageSize::new(4, 4)).is_none());
    }
}

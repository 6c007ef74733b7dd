#[cfg(test)]
mod tests {
    use shared::cache::ThumbnailCache;
    use shared::hash::hash_bytes;
    use std::sync::Arc;

    #[test]
    fn test_cache_insert_and_retrieve() {
        let cache = ThumbnailCache::new(8);
        let key = hash_bytes(b"test_image_1");
        let value = Arc::new(vec![1u8, 2, 3, 4, 5]);

        assert!(cache.get(&key).is_none());

        cache.put(key.clone(), Arc::clone(&value));

        let retrieved = cache.get(&key).unwrap();
        assert!(Arc::ptr_eq(&retrieved, &value));
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = ThumbnailCache::new(8);
        let other = cache.clone();
        let key = hash_bytes(b"shared");

        cache.put(key.clone(), 7u32);

        assert_eq!(other.get(&key), Some(7));
        other.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_get_protects_from_eviction() {
        let cache = ThumbnailCache::new(2);
        let a = hash_bytes(b"a");
        let b = hash_bytes(b"b");
        let c = hash_bytes(b"c");

        cache.put(a.clone(), 1u8);
        cache.put(b.clone(), 2u8);
        cache.get(&a);
        cache.put(c.clone(), 3u8);

        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));
    }

    #[test]
    fn test_resize_shrinks() {
        let cache = ThumbnailCache::new(4);
        for i in 0u8..4 {
            cache.put(hash_bytes(&[i]), i);
        }

        cache.resize(2);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.capacity(), 2);
    }
}

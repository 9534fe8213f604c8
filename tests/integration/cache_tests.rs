//! Tile cache tests: byte-bounded eviction and recency order.

use tileview::tile::{cache_capacity_kb, Tile, TileCache, TileKey};

/// A tile of `kb` kilobytes (one row of `kb * 256` RGBA pixels).
fn tile_kb(kb: u32) -> Tile {
    let width = kb * 256;
    Tile::new(vec![1u8; (width * 4) as usize], width, 1)
}

fn key(i: u32) -> TileKey {
    TileKey::new(i * 512, 0, 1)
}

#[test]
fn test_recently_read_tile_survives_eviction() {
    let mut cache = TileCache::with_capacity_kb(1000);
    let (t1, t2, t3) = (key(1), key(2), key(3));

    assert!(cache.put(t1, tile_kb(400)));
    assert!(cache.put(t2, tile_kb(400)));
    assert!(cache.get(&t1).is_some());
    assert!(cache.put(t3, tile_kb(400)));

    assert!(cache.contains(&t1));
    assert!(!cache.contains(&t2));
    assert!(cache.contains(&t3));
    assert_eq!(cache.size(), 800 * 1024);
}

#[test]
fn test_scripted_access_pattern_evicts_in_recency_order() {
    // Room for exactly four 100 KB tiles
    let mut cache = TileCache::with_capacity_kb(400);
    for i in 0..4 {
        cache.put(key(i), tile_kb(100));
    }

    // Recency, oldest first: 1, 3, 0, 2
    cache.get(&key(1));
    cache.get(&key(3));
    cache.get(&key(0));
    cache.get(&key(2));

    let mut evicted = Vec::new();
    for i in 10..14 {
        let before: Vec<_> = (0..4).filter(|j| cache.contains(&key(*j))).collect();
        cache.put(key(i), tile_kb(100));
        let after: Vec<_> = (0..4).filter(|j| cache.contains(&key(*j))).collect();
        evicted.extend(before.into_iter().filter(|j| !after.contains(j)));
    }

    assert_eq!(evicted, vec![1, 3, 0, 2]);
}

#[test]
fn test_occupied_never_exceeds_capacity() {
    let capacity = 1000 * 1024;
    let mut cache = TileCache::with_capacity_kb(1000);

    // Deterministic pseudo-random mix of puts and gets
    let mut state: u32 = 0x2545_f491;
    for _ in 0..2000 {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;

        let k = key(state % 37);
        if state % 3 == 0 {
            cache.get(&k);
        } else {
            cache.put(k, tile_kb(1 + state % 300));
        }
        assert!(cache.size() <= capacity, "occupied {} > {}", cache.size(), capacity);
    }
}

#[test]
fn test_large_insert_evicts_several() {
    let mut cache = TileCache::with_capacity_kb(1000);
    for i in 0..5 {
        cache.put(key(i), tile_kb(200));
    }

    cache.put(key(9), tile_kb(700));

    assert_eq!(cache.len(), 2);
    assert!(cache.contains(&key(4)));
    assert!(cache.contains(&key(9)));
}

#[test]
fn test_oversized_tile_rejected_without_eviction() {
    let mut cache = TileCache::with_capacity_kb(1000);
    cache.put(key(0), tile_kb(500));

    assert!(!cache.put(key(1), tile_kb(1001)));

    assert!(cache.contains(&key(0)));
    assert!(!cache.contains(&key(1)));
    assert_eq!(cache.size(), 500 * 1024);
}

#[test]
fn test_empty_tile_ignored() {
    let mut cache = TileCache::with_capacity_kb(1000);
    assert!(!cache.put(key(0), Tile::new(Vec::new(), 0, 0)));
    assert!(cache.is_empty());
}

#[test]
fn test_capacity_from_memory_ceiling() {
    // 4 GB ceiling, a quarter of it in KB
    let capacity = cache_capacity_kb(4 * 1024 * 1024 * 1024, 4);
    assert_eq!(capacity, 1024 * 1024);
    assert_eq!(TileCache::with_capacity_kb(capacity).capacity(), 1024 * 1024 * 1024);
}

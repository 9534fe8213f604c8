//! Tile loader tests: in-flight deduplication, backpressure, failures and
//! decoder handle reuse.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use tileview::source::{DecoderPool, ImageSource};
use tileview::tile::{TileKey, TileLoader, TileLoaderOptions, TileRequestOutcome};

use super::test_utils::{gradient_image, origin_color, Fault, Gate, MockSource, TempPng};

fn loader(source: MockSource, max_tasks: usize) -> TileLoader<MockSource> {
    TileLoader::new(
        DecoderPool::open(source).unwrap(),
        TileLoaderOptions::new(64 * 1024, max_tasks),
        Handle::current(),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn test_request_before_completion_is_in_flight() {
    let gate = Gate::new();
    let source = MockSource::new(2048, 2048).gated(gate.clone());
    let stats = source.stats();
    let loader = loader(source, 4);
    let key = TileKey::new(0, 0, 1);

    assert_eq!(loader.request_tile(key), TileRequestOutcome::DecodeStarted);
    for _ in 0..10 {
        assert_eq!(loader.request_tile(key), TileRequestOutcome::AlreadyInFlight);
    }

    gate.open();
    loader.wait_idle().await;

    assert_eq!(stats.regions().len(), 1);
    match loader.request_tile(key) {
        TileRequestOutcome::AlreadyCached(tile) => {
            assert_eq!((tile.width(), tile.height()), (512, 512));
            assert_eq!(&tile.pixels()[..4], &origin_color(0, 0).0);
        }
        other => panic!("expected cached tile, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_saturated_pool_creates_no_task() {
    let gate = Gate::new();
    let source = MockSource::new(4096, 4096).gated(gate.clone());
    let stats = source.stats();
    let loader = loader(source, 2);

    let keys: Vec<_> = (0..4).map(|i| TileKey::new(i * 512, 0, 1)).collect();
    let outcomes: Vec<_> = keys.iter().map(|key| loader.request_tile(*key)).collect();

    assert_eq!(
        outcomes,
        vec![
            TileRequestOutcome::DecodeStarted,
            TileRequestOutcome::DecodeStarted,
            TileRequestOutcome::WorkerPoolSaturated,
            TileRequestOutcome::WorkerPoolSaturated,
        ]
    );

    gate.open();
    loader.wait_idle().await;
    assert_eq!(stats.regions().len(), 2);
    assert!(!loader.is_in_flight(&keys[2]));
    assert!(loader.get_cached(&keys[2]).is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_decode_can_retry() {
    let source = MockSource::new(1024, 1024).with_faults(&[Fault::Error]);
    let stats = source.stats();
    let loader = loader(source, 2);
    let key = TileKey::new(512, 512, 1);

    assert_eq!(loader.request_tile(key), TileRequestOutcome::DecodeStarted);
    loader.wait_idle().await;

    assert_eq!(stats.failures(), 1);
    assert!(!loader.is_in_flight(&key));
    assert!(loader.get_cached(&key).is_none());

    assert_eq!(loader.request_tile(key), TileRequestOutcome::DecodeStarted);
    loader.wait_idle().await;
    assert!(loader.get_cached(&key).is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_panicking_decoder_does_not_poison_loader() {
    let source = MockSource::new(1024, 1024)
        .single_handle()
        .with_faults(&[Fault::Panic]);
    let loader = loader(source, 2);
    let key = TileKey::new(0, 0, 1);

    loader.request_tile(key);
    loader.wait_idle().await;

    assert!(loader.get_cached(&key).is_none());
    assert_eq!(loader.in_flight_count(), 0);

    // The shared handle is still usable afterwards
    loader.request_tile(key);
    loader.wait_idle().await;
    assert!(loader.get_cached(&key).is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_panic_while_opening_handle_clears_in_flight() {
    let source = MockSource::new(1024, 1024).panicking_reopen();
    let stats = source.stats();
    let loader = loader(source, 1);
    let key = TileKey::new(0, 0, 1);

    assert_eq!(loader.request_tile(key), TileRequestOutcome::DecodeStarted);
    tokio::time::timeout(Duration::from_secs(2), loader.wait_idle())
        .await
        .expect("task should finish after a panicking open");

    assert_eq!(stats.opens(), 2);
    assert_eq!(loader.in_flight_count(), 0);
    assert!(loader.get_cached(&key).is_none());

    // The task slot and the key are free again
    assert_eq!(loader.request_tile(key), TileRequestOutcome::DecodeStarted);
    tokio::time::timeout(Duration::from_secs(2), loader.wait_idle())
        .await
        .expect("retry should finish too");
    assert_eq!(loader.in_flight_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_path_source_handles_share_pixels() {
    let png = TempPng::new(&gradient_image(600, 400));
    let pool = DecoderPool::open(ImageSource::from_path(png.path())).unwrap();

    let first = pool.acquire();
    let second = pool.acquire();
    assert!(first.is_per_worker());
    assert!(second.is_per_worker());
    assert!(Arc::ptr_eq(first.image(), second.image()));

    pool.release(first);
    pool.release(second);
    assert_eq!(pool.spare_count(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_persistent_failure_leaves_gap() {
    let source = MockSource::new(1024, 1024).failing_at(512, 0);
    let loader = loader(source, 4);

    for x in [0, 512] {
        loader.request_tile(TileKey::new(x, 0, 1));
    }
    loader.wait_idle().await;

    assert!(loader.get_cached(&TileKey::new(0, 0, 1)).is_some());
    assert!(loader.get_cached(&TileKey::new(512, 0, 1)).is_none());
    assert_eq!(loader.cache_stats().entries, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_tile_outside_image_is_not_cached() {
    let source = MockSource::new(1000, 700);
    let stats = source.stats();
    let loader = loader(source, 2);

    for key in [TileKey::new(1024, 0, 1), TileKey::new(0, 1024, 2)] {
        loader.request_tile(key);
        loader.wait_idle().await;
        assert!(loader.get_cached(&key).is_none());
    }
    assert!(stats.regions().is_empty());
    assert_eq!(loader.cache_stats().entries, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_edge_tiles_are_clipped() {
    let source = MockSource::new(1000, 700);
    let stats = source.stats();
    let loader = loader(source, 2);

    loader.request_tile(TileKey::new(512, 0, 1));
    loader.request_tile(TileKey::new(0, 0, 2));
    loader.wait_idle().await;

    let edge = loader.get_cached(&TileKey::new(512, 0, 1)).unwrap();
    assert_eq!((edge.width(), edge.height()), (488, 512));

    // At sample size 2 the whole image fits one tile
    let sampled = loader.get_cached(&TileKey::new(0, 0, 2)).unwrap();
    assert_eq!((sampled.width(), sampled.height()), (500, 350));

    let mut regions = stats.regions();
    regions.sort_by_key(|(region, _)| region.left);
    assert_eq!(regions[0].0.right, 1000);
    assert_eq!(regions[0].0.bottom, 700);
    assert_eq!(regions[0].1, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_per_worker_handles_are_reused() {
    let source = MockSource::new(8192, 512);
    let stats = source.stats();
    let loader = loader(source, 2);

    for x in 0..16 {
        loader.request_tile(TileKey::new(x * 512, 0, 1));
        loader.wait_idle().await;
    }

    assert_eq!(loader.cache_stats().entries, 16);
    // The shared handle plus one per-worker handle, reused for every decode
    assert_eq!(stats.opens(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_single_handle_serializes_decodes() {
    let gate = Gate::new();
    let source = MockSource::new(4096, 512).single_handle().gated(gate.clone());
    let stats = source.stats();
    let loader = loader(source, 4);

    for x in 0..4 {
        loader.request_tile(TileKey::new(x * 512, 0, 1));
    }
    gate.open();
    loader.wait_idle().await;

    assert_eq!(stats.opens(), 1);
    assert_eq!(stats.decodes(), 4);
    assert_eq!(stats.max_active(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dropped_loader_discards_results() {
    let gate = Gate::new();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();

    let source = MockSource::new(2048, 2048).gated(gate.clone());
    let stats = source.stats();
    let loader = loader(source, 2).with_tile_available(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    loader.request_tile(TileKey::new(0, 0, 1));
    drop(loader);
    gate.open();

    // The worker finishes on its own; nothing is left to notify
    for _ in 0..50 {
        if stats.decodes() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

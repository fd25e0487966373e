//! Cache reads racing division writes never re-cache stale groups.

use std::sync::Arc;
use wodsmith_core::{GroupId, ScalingConfig};
use wodsmith_storage::{
    CacheKey, InMemoryEdgeStore, LevelUpdate, ScalingRepository, TieredCache,
};
use wodsmith_test_utils::fixtures::Fixture;
use wodsmith_test_utils::CountingRepository;

fn group_key(group_id: GroupId) -> String {
    CacheKey::group(&ScalingConfig::default().edge_namespace, group_id).encode()
}

#[tokio::test]
async fn test_invalidation_during_load_is_not_overwritten() {
    let fixture = Fixture::new();
    let group = fixture.system_group("Standard", &["Rx", "Scaled"]).await;
    let group_id = group.group_id;
    let counting = Arc::new(CountingRepository::new(fixture.repository()));
    let edge = Arc::new(InMemoryEdgeStore::new());
    let cache = Arc::new(TieredCache::new(
        counting.clone(),
        edge.clone(),
        ScalingConfig::default(),
    ));

    let pause = counting.pause_next_level_list();
    let reader = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.read_group(group_id).await })
    };
    pause.entered().await;

    // The reader already holds the old rows when the write lands.
    let rx = fixture.levels(group_id).await[0].clone();
    fixture
        .mock()
        .level_update(
            rx.level_id,
            LevelUpdate {
                label: Some("Elite".to_string()),
                ..LevelUpdate::default()
            },
        )
        .await
        .unwrap();
    cache.invalidate_group(group_id).await;
    pause.release();

    let raced = reader.await.unwrap().unwrap().unwrap();
    assert!(raced.was_miss());
    assert_eq!(raced.value().levels[0].label, "Rx");
    assert!(!edge.contains_key(&group_key(group_id)));
    assert_eq!(cache.stats().memory_entries, 0);

    let fresh = cache.read_group(group_id).await.unwrap().unwrap();
    assert!(fresh.was_miss());
    assert_eq!(fresh.value().levels[0].label, "Elite");
    assert!(edge.contains_key(&group_key(group_id)));
}

#[tokio::test]
async fn test_invalidate_all_during_load_is_not_overwritten() {
    let fixture = Fixture::new();
    let group = fixture.system_group("Standard", &["Rx"]).await;
    let group_id = group.group_id;
    let counting = Arc::new(CountingRepository::new(fixture.repository()));
    let edge = Arc::new(InMemoryEdgeStore::new());
    let cache = Arc::new(TieredCache::new(
        counting.clone(),
        edge.clone(),
        ScalingConfig::default(),
    ));

    let pause = counting.pause_next_level_list();
    let reader = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.read_group(group_id).await })
    };
    pause.entered().await;
    cache.invalidate_all().await;
    pause.release();

    reader.await.unwrap().unwrap().unwrap();
    assert!(!edge.contains_key(&group_key(group_id)));

    // Without a racing invalidation the next miss is cached as usual.
    cache.read_group(group_id).await.unwrap().unwrap();
    let again = cache.read_group(group_id).await.unwrap().unwrap();
    assert!(!again.was_miss());
}

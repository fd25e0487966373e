//! Parameter-bounded lookups split large id lists into chunks.

use std::sync::Arc;
use wodsmith_core::{LevelId, PermissionService, ScalingConfig, StorageError, WodsmithError};
use wodsmith_scaling::{DivisionManager, OwnershipGate, ScalingResolver};
use wodsmith_storage::{InMemoryEdgeStore, LevelStore, ScalingRepository, TieredCache};
use wodsmith_test_utils::fixtures::Fixture;
use wodsmith_test_utils::{AllowAllPermissions, CountingRepository};

const LEVELS: usize = 150;

async fn big_group(fixture: &Fixture) -> (wodsmith_core::ScalingGroup, Vec<LevelId>) {
    let group = fixture.system_group("Huge", &[]).await;
    let mut ids = Vec::with_capacity(LEVELS);
    for position in 0..LEVELS {
        let level = fixture
            .level(group.group_id, &format!("Level {}", position), position as i32)
            .await;
        ids.push(level.level_id);
    }
    (group, ids)
}

#[tokio::test]
async fn test_unchunked_lookup_is_rejected() {
    let fixture = Fixture::new();
    let (_, ids) = big_group(&fixture).await;

    let result = fixture.repository().level_list_by_ids(&ids).await;
    assert!(matches!(
        result,
        Err(WodsmithError::Storage(StorageError::TooManyParameters { count: 150, limit: 100 }))
    ));
}

#[tokio::test]
async fn test_levels_by_ids_uses_two_queries() {
    let fixture = Fixture::new();
    let (_, ids) = big_group(&fixture).await;
    let counting = Arc::new(CountingRepository::new(fixture.repository()));
    let permissions: Arc<dyn PermissionService> = Arc::new(AllowAllPermissions);
    let store = LevelStore::new(counting.clone(), permissions);

    // Duplicates are dropped before chunking.
    let mut requested = ids.clone();
    requested.extend_from_slice(&ids[..10]);
    let levels = store.levels_by_ids(&requested).await.unwrap();

    assert_eq!(levels.len(), LEVELS);
    assert_eq!(counting.calls("level_list_by_ids"), 2);
}

#[tokio::test]
async fn test_descriptions_for_large_group_use_two_queries() {
    let fixture = Fixture::new();
    let (group, ids) = big_group(&fixture).await;
    let team = fixture.team("Box", None);
    let workout = fixture.workout("Murph", Some(group.group_id));
    for id in &ids {
        fixture.describe(workout.workout_id, *id, "Partition as needed");
    }

    let counting = Arc::new(CountingRepository::new(fixture.repository()));
    let cache = Arc::new(TieredCache::new(
        counting.clone(),
        Arc::new(InMemoryEdgeStore::new()),
        ScalingConfig::default(),
    ));
    let resolver = ScalingResolver::new(counting.clone(), cache);

    let resolved = resolver
        .resolve_with_descriptions(workout.workout_id, team.team_id, None)
        .await
        .unwrap();
    assert_eq!(resolved.resolution.levels.len(), LEVELS);
    assert_eq!(resolved.descriptions.len(), LEVELS);
    assert_eq!(counting.calls("descriptions_for_levels"), 2);
}

#[tokio::test]
async fn test_division_counts_for_large_competition_use_two_queries() {
    let fixture = Fixture::new();
    let team = fixture.team("Box", None);
    let comp = fixture.competition("Open", team.team_id, None);
    let counting = Arc::new(CountingRepository::new(fixture.repository()));
    let permissions: Arc<dyn PermissionService> = Arc::new(AllowAllPermissions);
    let config = ScalingConfig::default();
    let store = Arc::new(LevelStore::new(counting.clone(), permissions));
    let cache = Arc::new(TieredCache::new(
        counting.clone(),
        Arc::new(InMemoryEdgeStore::new()),
        config.clone(),
    ));
    let gate = Arc::new(OwnershipGate::new(store.clone(), &config));
    let manager = DivisionManager::new(gate.clone(), store, cache);

    let owned = gate
        .ensure_owned(comp.competition_id, team.team_id)
        .await
        .unwrap();
    for position in 2..LEVELS {
        fixture
            .level(owned.scaling_group_id, &format!("Heat {}", position), position as i32)
            .await;
    }
    let levels = fixture.levels(owned.scaling_group_id).await;
    fixture.register(comp.competition_id, levels[120].level_id, "Ana");

    let divisions = manager.list_divisions(comp.competition_id).await.unwrap();
    assert_eq!(divisions.len(), LEVELS);
    assert_eq!(divisions[120].registration_count, 1);
    assert_eq!(
        divisions.iter().map(|d| d.registration_count).sum::<usize>(),
        1
    );
    assert_eq!(counting.calls("registration_counts"), 2);
}

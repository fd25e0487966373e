//! Ownership gate behaviour under races and lost repoints.

use std::sync::Arc;
use wodsmith_core::{ErrorKind, PermissionService, ScalingConfig};
use wodsmith_scaling::OwnershipGate;
use wodsmith_storage::{LevelStore, ScalingRepository};
use wodsmith_test_utils::assertions::assert_kind;
use wodsmith_test_utils::fixtures::Fixture;
use wodsmith_test_utils::{AllowAllPermissions, CountingRepository};

fn gate_over(repo: Arc<dyn ScalingRepository>, config: &ScalingConfig) -> OwnershipGate {
    let permissions: Arc<dyn PermissionService> = Arc::new(AllowAllPermissions);
    OwnershipGate::new(Arc::new(LevelStore::new(repo, permissions)), config)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_in_one_process_clone_once() {
    let fixture = Fixture::new();
    let team = fixture.team("Box", None);
    let template = fixture.system_group("Standard", &["Rx", "Scaled"]).await;
    let comp = fixture.competition("Throwdown", team.team_id, Some(template.group_id));
    let gate = Arc::new(gate_over(fixture.repository(), &ScalingConfig::default()));
    let (competition_id, team_id) = (comp.competition_id, team.team_id);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let gate = gate.clone();
        handles.push(tokio::spawn(async move {
            gate.ensure_owned(competition_id, team_id).await
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(results.iter().filter(|r| r.was_cloned).count(), 1);
    let owned = results[0].scaling_group_id;
    assert!(results.iter().all(|r| r.scaling_group_id == owned));
    // Template plus exactly one copy.
    assert_eq!(fixture.mock().group_count().unwrap(), 2);
    assert_eq!(fixture.competition_group(comp.competition_id).await, Some(owned));
    // Every waiter released its lock.
    assert!(gate.locks().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_claims_from_separate_processes_converge() {
    let fixture = Fixture::new();
    let team = fixture.team("Box", None);
    let template = fixture.system_group("Standard", &["Rx", "Scaled"]).await;
    let comp = fixture.competition("Throwdown", team.team_id, Some(template.group_id));

    // Separate gates share the repository but not their locks.
    let config = ScalingConfig::default();
    let (competition_id, team_id) = (comp.competition_id, team.team_id);
    let mut handles = Vec::new();
    for _ in 0..4 {
        let gate = gate_over(fixture.repository(), &config);
        handles.push(tokio::spawn(async move {
            gate.ensure_owned(competition_id, team_id).await
        }));
    }

    let mut owned = Vec::new();
    for handle in handles {
        owned.push(handle.await.unwrap().unwrap().scaling_group_id);
    }

    let winner = fixture.competition_group(comp.competition_id).await.unwrap();
    assert!(owned.iter().all(|id| *id == winner));
    // Losing copies are discarded.
    assert_eq!(fixture.mock().group_count().unwrap(), 2);
}

#[tokio::test]
async fn test_lost_repoint_discards_copy_and_retries() {
    let fixture = Fixture::new();
    let team = fixture.team("Box", None);
    let template = fixture.system_group("Standard", &["Rx", "Scaled"]).await;
    let comp = fixture.competition("Throwdown", team.team_id, Some(template.group_id));

    let counting = Arc::new(CountingRepository::new(fixture.repository()));
    counting.lose_swaps(2);
    let gate = gate_over(counting.clone(), &ScalingConfig::default());

    let owned = gate
        .ensure_owned(comp.competition_id, team.team_id)
        .await
        .unwrap();

    assert!(owned.was_cloned);
    assert_eq!(counting.calls("competition_swap_scaling_group"), 3);
    assert_eq!(counting.calls("group_delete"), 2);
    assert_eq!(fixture.mock().group_count().unwrap(), 2);
    assert_eq!(
        fixture.competition_group(comp.competition_id).await,
        Some(owned.scaling_group_id)
    );
}

#[tokio::test]
async fn test_exhausted_retries_are_internal_and_leave_no_orphans() {
    let fixture = Fixture::new();
    let team = fixture.team("Box", None);
    let template = fixture.system_group("Standard", &["Rx", "Scaled"]).await;
    let comp = fixture.competition("Throwdown", team.team_id, Some(template.group_id));

    let counting = Arc::new(CountingRepository::new(fixture.repository()));
    counting.lose_swaps(10);
    let config = ScalingConfig::default().with_clone_retry_limit(3);
    let gate = gate_over(counting.clone(), &config);

    let result = gate.ensure_owned(comp.competition_id, team.team_id).await;
    assert_kind(&result, ErrorKind::Internal);
    assert!(gate.locks().is_empty());
    assert_eq!(counting.calls("competition_swap_scaling_group"), 3);
    assert_eq!(fixture.mock().group_count().unwrap(), 1);
    assert_eq!(fixture.mock().level_count().unwrap(), 2);
    assert_eq!(
        fixture.competition_group(comp.competition_id).await,
        Some(template.group_id)
    );
}

#[tokio::test]
async fn test_owned_group_is_returned_without_writes() {
    let fixture = Fixture::new();
    let team = fixture.team("Box", None);
    let comp = fixture.competition("Throwdown", team.team_id, None);
    let counting = Arc::new(CountingRepository::new(fixture.repository()));
    let gate = gate_over(counting.clone(), &ScalingConfig::default());

    gate.ensure_owned(comp.competition_id, team.team_id)
        .await
        .unwrap();
    counting.reset();

    let again = gate
        .ensure_owned(comp.competition_id, team.team_id)
        .await
        .unwrap();
    assert!(!again.was_cloned);
    for write in [
        "group_insert",
        "level_insert",
        "group_delete",
        "competition_swap_scaling_group",
    ] {
        assert_eq!(counting.calls(write), 0, "{} should not be called", write);
    }
}

//! Property-Based Tests for Scaling Resolution
//!
//! **Property: Fallback Order**
//!
//! For any combination of set links in the chain (workout, track, team
//! default, global default), resolution SHALL return the group of the
//! highest-priority set link, with that group's levels only. With no link
//! set it SHALL return no group and no levels.

use proptest::prelude::*;
use std::sync::Arc;
use wodsmith_core::{ResolutionSource, ScalingConfig};
use wodsmith_scaling::ScalingResolver;
use wodsmith_storage::{InMemoryEdgeStore, TieredCache};
use wodsmith_test_utils::fixtures::Fixture;
use wodsmith_test_utils::generators::arb_chain_links;
use wodsmith_test_utils::{FailingEdgeStore, GroupId};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_first_set_link_wins(
        (on_workout, on_track, on_team, on_global) in arb_chain_links(),
        pass_track in any::<bool>(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let fixture = Fixture::new();
            let workout_group = fixture.system_group("Workout", &["W"]).await;
            let track_group = fixture.system_group("Track", &["T1", "T2"]).await;
            let team_group = fixture.system_group("Team", &["A", "B", "C"]).await;
            let global_group = if on_global {
                Some(fixture.global_default("Global", &["G1", "G2", "G3", "G4"]).await)
            } else {
                None
            };

            let workout = fixture.workout("Fran", on_workout.then_some(workout_group.group_id));
            let track = fixture.track("Prep", on_track.then_some(track_group.group_id));
            let team = fixture.team("Box", on_team.then_some(team_group.group_id));

            let cache = Arc::new(TieredCache::new(
                fixture.repository(),
                Arc::new(InMemoryEdgeStore::new()),
                ScalingConfig::default(),
            ));
            let resolver = ScalingResolver::new(fixture.repository(), cache);
            let resolution = resolver
                .resolve(workout.workout_id, team.team_id, pass_track.then_some(track.track_id))
                .await
                .unwrap();

            let expected: Option<(GroupId, ResolutionSource, usize)> = if on_workout {
                Some((workout_group.group_id, ResolutionSource::Workout, 1))
            } else if on_track && pass_track {
                Some((track_group.group_id, ResolutionSource::Track, 2))
            } else if on_team {
                Some((team_group.group_id, ResolutionSource::TeamDefault, 3))
            } else {
                global_group.map(|g| (g.group_id, ResolutionSource::GlobalDefault, 4))
            };

            match expected {
                Some((group_id, source, level_count)) => {
                    prop_assert_eq!(resolution.scaling_group_id, Some(group_id));
                    prop_assert_eq!(resolution.source, source);
                    prop_assert_eq!(resolution.levels.len(), level_count);
                    prop_assert!(resolution.levels.iter().all(|l| l.group_id == group_id));
                    prop_assert!(resolution
                        .levels
                        .windows(2)
                        .all(|w| w[0].position <= w[1].position));
                }
                None => {
                    prop_assert_eq!(resolution.scaling_group_id, None);
                    prop_assert_eq!(resolution.source, ResolutionSource::Unresolved);
                    prop_assert!(resolution.levels.is_empty());
                }
            }
            Ok(())
        })?;
    }
}

/// Resolution keeps working when every edge operation fails.
#[tokio::test]
async fn test_resolution_survives_edge_outage() {
    wodsmith_test_utils::init_test_tracing();
    let fixture = Fixture::new();
    let group = fixture.system_group("Standard", &["Rx", "Scaled"]).await;
    let team = fixture.team("Box", Some(group.group_id));
    let workout = fixture.workout("Fran", None);

    let edge = Arc::new(FailingEdgeStore::new());
    let cache = Arc::new(TieredCache::new(
        fixture.repository(),
        edge.clone(),
        ScalingConfig::default(),
    ));
    let resolver = ScalingResolver::new(fixture.repository(), cache.clone());

    for _ in 0..3 {
        let resolution = resolver
            .resolve(workout.workout_id, team.team_id, None)
            .await
            .unwrap();
        assert_eq!(resolution.scaling_group_id, Some(group.group_id));
        assert_eq!(resolution.levels.len(), 2);
    }

    let stats = cache.stats();
    assert!(edge.calls() >= 2);
    assert!(stats.edge_errors >= 2);
    assert_eq!(stats.memory_hits, 2);
}

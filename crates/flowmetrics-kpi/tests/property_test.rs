//! Property tests for bucketing, ranking and the synthetic content mix.

use chrono::Duration;
use flowmetrics_common::test_utils::property_testing::{any_id_strategy, tracked_seconds_strategy};
use flowmetrics_common::test_utils::{mock_timestamp, row_fixtures};
use flowmetrics_common::UserId;
use flowmetrics_i18n::Localizer;
use flowmetrics_kpi::{
    rank_users, KpiPipeline, KpiSettings, MemorySource, PeriodId, ProfileRow, SyntheticContentMix,
    Table, TrackingRow,
};
use proptest::prelude::*;
use std::sync::Arc;

fn period_strategy() -> impl Strategy<Value = PeriodId> {
    prop::sample::select(PeriodId::ALL.to_vec())
}

proptest! {
    #[test]
    fn content_mix_sums_to_hundred(id in any_id_strategy()) {
        let mix = SyntheticContentMix::from_user_id(&UserId::new(id));
        prop_assert_eq!(mix.video_percentage + mix.reading_percentage, 100);
        prop_assert!((40..80).contains(&mix.video_percentage));
    }

    #[test]
    fn ranking_is_sorted_and_bounded(
        rows in prop::collection::vec((0usize..12, tracked_seconds_strategy()), 0..40),
        profile_count in 0usize..10,
    ) {
        let profiles: Vec<ProfileRow> = (0..profile_count)
            .map(|i| ProfileRow {
                id: UserId::new(format!("u{i}")),
                full_name: None,
                created_at: None,
            })
            .collect();
        let tracking: Vec<TrackingRow> = rows
            .into_iter()
            .map(|(user, seconds)| TrackingRow {
                user_id: UserId::new(format!("u{user}")),
                total_seconds: seconds,
                date: "2024-05-01".to_string(),
            })
            .collect();

        let localizer = Localizer::new("pt-BR").unwrap();
        let ranked = rank_users(&profiles, &tracking, 5, &localizer);

        prop_assert!(ranked.len() <= 5);
        prop_assert!(ranked.windows(2).all(|w| w[0].study_seconds >= w[1].study_seconds));
    }

    #[test]
    fn acquisition_buckets_sum_to_period_users(
        period in period_strategy(),
        offsets in prop::collection::vec(-120i64..600 * 24 * 60, 0..30),
    ) {
        let now = mock_timestamp(2024, 3, 10, 4, 30, 0);
        let profiles = offsets
            .iter()
            .enumerate()
            .map(|(i, minutes)| {
                row_fixtures::profile(&format!("u{i}"), None, now - Duration::minutes(*minutes))
            })
            .collect();
        let settings = KpiSettings {
            timezone: chrono_tz::America::Sao_Paulo,
            ..KpiSettings::default()
        };
        let pipeline = KpiPipeline::new(
            Arc::new(MemorySource::new().with_rows(Table::UserProfiles, profiles)),
            settings,
        )
        .unwrap();

        let snapshot = tokio_test::block_on(pipeline.run_at(period, now));

        let bucketed: u64 = snapshot.user_acquisition_trend.iter().map(|p| p.new_users).sum();
        prop_assert_eq!(bucketed, snapshot.period_users);
        prop_assert!(!snapshot.degraded);
    }
}

//! Top-N user ranking by accumulated study time.

use crate::rows::{ProfileRow, TrackingRow};
use crate::snapshot::{SyntheticContentMix, UserRanking};
use flowmetrics_common::{char_code_seed, format_study_time, DataOrigin, UserId};
use flowmetrics_i18n::Localizer;
use std::collections::{HashMap, HashSet};
use tracing::warn;
use url::Url;

const AVATAR_ENDPOINT: &str = "https://ui-avatars.com/api/";
const AVATAR_FALLBACK_NAME: &str = "U";

impl SyntheticContentMix {
    /// Deterministic split from the character codes of `user_id`:
    /// `video = 40 + seed % 40`, `reading = 100 - video`.
    pub fn from_user_id(user_id: &UserId) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let video = 40 + (char_code_seed(user_id.as_str()) % 40) as u32;
        Self {
            video_percentage: video,
            reading_percentage: 100 - video,
            origin: DataOrigin::Heuristic,
        }
    }
}

/// Avatar URL for a display name, with the name query-encoded.
pub fn avatar_url(full_name: Option<&str>) -> String {
    let name = full_name.unwrap_or(AVATAR_FALLBACK_NAME);
    Url::parse_with_params(
        AVATAR_ENDPOINT,
        &[("name", name), ("background", "random"), ("color", "fff")],
    )
    .map_or_else(
        |e| {
            warn!(error = %e, "Cannot build avatar URL");
            String::new()
        },
        String::from,
    )
}

/// Ranks users by total tracked seconds, highest first, keeping `limit`.
///
/// Every profile takes part, plus any tracked user without a profile.
/// Ties keep profile order, then first appearance in `tracking`.
pub fn rank_users(
    profiles: &[ProfileRow],
    tracking: &[TrackingRow],
    limit: usize,
    localizer: &Localizer,
) -> Vec<UserRanking> {
    let mut totals: HashMap<&UserId, u64> = HashMap::new();
    for row in tracking {
        *totals.entry(&row.user_id).or_default() += row.total_seconds;
    }

    let mut candidates: Vec<(&UserId, Option<&str>)> = Vec::new();
    let mut seen: HashSet<&UserId> = HashSet::new();
    for profile in profiles {
        if seen.insert(&profile.id) {
            candidates.push((&profile.id, profile.full_name.as_deref()));
        }
    }
    for row in tracking {
        if seen.insert(&row.user_id) {
            candidates.push((&row.user_id, None));
        }
    }

    let mut ranked: Vec<(&UserId, Option<&str>, u64)> = candidates
        .into_iter()
        .map(|(id, name)| (id, name, totals.get(id).copied().unwrap_or(0)))
        .collect();
    // sort_by is stable, so ties keep candidate order
    ranked.sort_by(|a, b| b.2.cmp(&a.2));
    ranked.truncate(limit);

    ranked
        .into_iter()
        .map(|(id, name, seconds)| {
            let name = name.filter(|n| !n.trim().is_empty());
            UserRanking {
                id: id.clone(),
                name: name.map_or_else(|| localizer.anonymous_user(), ToString::to_string),
                avatar: avatar_url(name),
                study_time: format_study_time(seconds),
                study_seconds: seconds,
                content_mix: SyntheticContentMix::from_user_id(id),
            }
        })
        .collect()
}

//! Standings derived from season win/loss rows.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

use crate::db::models::StandingsRow;

use super::error::DataWarning;
use super::identity::EffectiveIdentity;
use super::lookup::{push_unique, LeagueIndex};
use super::percentage;

/// One team's line in the standings table, in final rank order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedStanding {
    /// 1-based position
    pub rank: usize,
    pub season_id: i64,
    pub team_season_id: i64,
    pub identity: EffectiveIdentity,
    pub wins: i64,
    pub losses: i64,
    pub ties: i64,
    pub games_played: i64,
    pub points_for: i64,
    pub points_against: i64,
    pub point_diff: i64,
    /// Percentage of games won, 0–100 with one decimal
    pub win_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandingsReport {
    pub standings: Vec<RankedStanding>,
    pub warnings: Vec<DataWarning>,
}

/// Wins desc, point differential desc, display name asc, then id for a total order.
fn compare_standings(a: &RankedStanding, b: &RankedStanding) -> Ordering {
    b.wins
        .cmp(&a.wins)
        .then_with(|| b.point_diff.cmp(&a.point_diff))
        .then_with(|| a.identity.name.cmp(&b.identity.name))
        .then_with(|| a.team_season_id.cmp(&b.team_season_id))
}

/// Compute the ranked standings for a set of season rows.
///
/// Teams resolving to the same display name within one season are reported
/// in `warnings`; the ranking itself is unaffected.
pub fn compute_standings(rows: &[StandingsRow], index: &LeagueIndex) -> StandingsReport {
    let mut warnings = Vec::new();

    let mut standings: Vec<RankedStanding> = rows
        .iter()
        .map(|row| {
            let games_played = row.wins + row.losses + row.ties;
            RankedStanding {
                rank: 0,
                season_id: row.season_id,
                team_season_id: row.team_season_id,
                identity: index.identity(row.team_season_id, &mut warnings),
                wins: row.wins,
                losses: row.losses,
                ties: row.ties,
                games_played,
                points_for: row.points_for,
                points_against: row.points_against,
                point_diff: row.points_for - row.points_against,
                win_percentage: percentage(row.wins, games_played),
            }
        })
        .collect();

    standings.sort_by(compare_standings);
    for (i, s) in standings.iter_mut().enumerate() {
        s.rank = i + 1;
    }

    let mut by_name: BTreeMap<(i64, &str), Vec<i64>> = BTreeMap::new();
    for s in &standings {
        by_name
            .entry((s.season_id, s.identity.name.as_str()))
            .or_default()
            .push(s.team_season_id);
    }
    let duplicates: Vec<DataWarning> = by_name
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|((_, name), mut ids)| {
            ids.sort_unstable();
            DataWarning::DuplicateDisplayName {
                name: name.to_string(),
                team_season_ids: ids,
            }
        })
        .collect();
    for w in duplicates {
        push_unique(&mut warnings, w);
    }

    debug!(
        "Computed standings for {} team(s), {} warning(s)",
        standings.len(),
        warnings.len()
    );

    StandingsReport {
        standings,
        warnings,
    }
}

//! Season identity resolution.
//!
//! A team keeps its permanent identity across seasons, but each season may
//! override the name, colours, logo and ranking. Resolution prefers the
//! season override, then the team baseline, then a fixed fallback, so the
//! presentation layer never sees an absent name or colour.

use serde::Serialize;
use std::cmp::Ordering;

use crate::db::models::{Team, TeamSeason};

use super::error::DataWarning;
use super::lookup::LeagueIndex;

/// Neutral mid-gray used when neither the season nor the team has a colour.
pub const NEUTRAL_COLOR: &str = "#808080";

/// Name shown when a team-season or its team cannot be found.
pub const UNKNOWN_TEAM_NAME: &str = "Unknown Team";

/// Season ranking. `Unranked` orders after every `Ranked` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum Ranking {
    Ranked(i64),
    Unranked,
}

impl From<Option<i64>> for Ranking {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Ranking::Unranked, Ranking::Ranked)
    }
}

/// Fully-defaulted display identity for one team in one season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveIdentity {
    pub name: String,
    pub primary_color: String,
    pub secondary_color: String,
    pub logo_url: Option<String>,
    pub ranking: Ranking,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Resolve the effective identity of a team-season. Both inputs are optional
/// so a dangling reference still produces a usable identity.
pub fn resolve(team: Option<&Team>, team_season: Option<&TeamSeason>) -> EffectiveIdentity {
    let season_name = team_season.and_then(|ts| non_empty(ts.display_name.as_ref()));
    let name = season_name
        .or_else(|| team.and_then(|t| non_empty(Some(&t.name))))
        .unwrap_or(UNKNOWN_TEAM_NAME)
        .to_string();

    let season_primary = team_season.and_then(|ts| non_empty(ts.primary_color.as_ref()));
    let primary_color = season_primary
        .or_else(|| team.and_then(|t| non_empty(t.primary_color.as_ref())))
        .unwrap_or(NEUTRAL_COLOR)
        .to_string();

    // A season that overrides only the primary colour gets a single-colour
    // strip; the team baseline secondary only applies when the season sets
    // no colours at all.
    let secondary_color = match team_season.and_then(|ts| non_empty(ts.secondary_color.as_ref())) {
        Some(c) => c.to_string(),
        None if season_primary.is_some() => primary_color.clone(),
        None => team
            .and_then(|t| non_empty(t.secondary_color.as_ref()))
            .map(str::to_string)
            .unwrap_or_else(|| primary_color.clone()),
    };

    let logo_url = team_season
        .and_then(|ts| non_empty(ts.alt_logo_url.as_ref()))
        .or_else(|| team.and_then(|t| non_empty(t.logo_url.as_ref())))
        .map(str::to_string);

    let ranking = Ranking::from(team_season.and_then(|ts| ts.ranking));

    EffectiveIdentity {
        name,
        primary_color,
        secondary_color,
        logo_url,
        ranking,
    }
}

/// One row of the ranking-ordered team list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTeam {
    pub team_season_id: i64,
    pub team_id: i64,
    #[serde(flatten)]
    pub identity: EffectiveIdentity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingsReport {
    pub season_id: i64,
    pub teams: Vec<RankedTeam>,
    pub warnings: Vec<DataWarning>,
}

/// Order ranked teams ascending, unranked after all of them, then by name and id.
pub fn compare_ranked(a: &RankedTeam, b: &RankedTeam) -> Ordering {
    a.identity
        .ranking
        .cmp(&b.identity.ranking)
        .then_with(|| a.identity.name.cmp(&b.identity.name))
        .then_with(|| a.team_season_id.cmp(&b.team_season_id))
}

/// All team-seasons of a season in ranking order.
pub fn season_rankings(index: &LeagueIndex, season_id: i64) -> RankingsReport {
    let mut warnings = Vec::new();
    let mut teams: Vec<RankedTeam> = index
        .team_seasons_in(season_id)
        .into_iter()
        .map(|ts| RankedTeam {
            team_season_id: ts.id,
            team_id: ts.team_id,
            identity: index.identity(ts.id, &mut warnings),
        })
        .collect();
    teams.sort_by(compare_ranked);

    RankingsReport {
        season_id,
        teams,
        warnings,
    }
}

//! Read-only lookup tables built once per snapshot.
//!
//! Every calculator takes `&LeagueIndex` instead of building its own maps
//! while iterating, so concurrent calls never share mutable state.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::db::models::{Game, LeagueSnapshot, Player, Season, Team, TeamSeason};

use super::error::DataWarning;
use super::identity::{resolve, EffectiveIdentity};

#[derive(Debug, Clone, Default)]
pub struct LeagueIndex {
    teams: HashMap<i64, Team>,
    seasons: HashMap<i64, Season>,
    team_seasons: HashMap<i64, TeamSeason>,
    players: HashMap<i64, Player>,
    games: HashMap<i64, Game>,
    /// (player_id, season_id) → team_season_id
    roster: HashMap<(i64, i64), i64>,
}

impl LeagueIndex {
    pub fn build(snapshot: &LeagueSnapshot) -> Self {
        let team_seasons: HashMap<i64, TeamSeason> = snapshot
            .team_seasons
            .iter()
            .map(|ts| (ts.id, ts.clone()))
            .collect();

        // Memberships pointing at unknown team-seasons can't be placed in a season.
        let roster = snapshot
            .roster
            .iter()
            .filter_map(|m| {
                let ts = team_seasons.get(&m.team_season_id)?;
                Some(((m.player_id, ts.season_id), ts.id))
            })
            .collect();

        LeagueIndex {
            teams: snapshot.teams.iter().map(|t| (t.id, t.clone())).collect(),
            seasons: snapshot.seasons.iter().map(|s| (s.id, s.clone())).collect(),
            team_seasons,
            players: snapshot.players.iter().map(|p| (p.id, p.clone())).collect(),
            games: snapshot.games.iter().map(|g| (g.id, g.clone())).collect(),
            roster,
        }
    }

    pub fn team(&self, id: i64) -> Option<&Team> {
        self.teams.get(&id)
    }

    pub fn season(&self, id: i64) -> Option<&Season> {
        self.seasons.get(&id)
    }

    pub fn team_season(&self, id: i64) -> Option<&TeamSeason> {
        self.team_seasons.get(&id)
    }

    pub fn player(&self, id: i64) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn game(&self, id: i64) -> Option<&Game> {
        self.games.get(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Team-seasons registered for `season_id`, in id order.
    pub fn team_seasons_in(&self, season_id: i64) -> Vec<&TeamSeason> {
        let mut out: Vec<&TeamSeason> = self
            .team_seasons
            .values()
            .filter(|ts| ts.season_id == season_id)
            .collect();
        out.sort_by_key(|ts| ts.id);
        out
    }

    /// Players on a roster in `season_id`, with the team-season they belong to.
    pub fn roster_for_season(&self, season_id: i64) -> Vec<(i64, i64)> {
        let mut out: Vec<(i64, i64)> = self
            .roster
            .iter()
            .filter(|((_, s), _)| *s == season_id)
            .map(|((player_id, _), ts)| (*player_id, *ts))
            .collect();
        out.sort_unstable();
        out
    }

    /// Team-season a player is rostered on for a season. `None` means free agent.
    pub fn roster_team_season(&self, player_id: i64, season_id: i64) -> Option<i64> {
        self.roster.get(&(player_id, season_id)).copied()
    }

    /// Ordering key for "later season". Start date wins when known; undated or
    /// unknown seasons sort before dated ones, then by id.
    pub fn season_recency(&self, season_id: i64) -> (Option<NaiveDate>, i64) {
        let start = self.season(season_id).and_then(|s| s.start_date);
        (start, season_id)
    }

    /// Roster team-season from the player's most recent season, if any.
    pub fn latest_roster_team_season(&self, player_id: i64) -> Option<i64> {
        self.roster
            .iter()
            .filter(|((p, _), _)| *p == player_id)
            .max_by_key(|((_, season_id), _)| self.season_recency(*season_id))
            .map(|(_, ts)| *ts)
    }

    /// Resolve the display identity for a team-season id, pushing a warning
    /// when the team-season or its parent team is missing.
    pub fn identity(&self, team_season_id: i64, warnings: &mut Vec<DataWarning>) -> EffectiveIdentity {
        let team_season = self.team_season(team_season_id);
        let team = match team_season {
            Some(ts) => {
                let team = self.team(ts.team_id);
                if team.is_none() {
                    push_unique(
                        warnings,
                        DataWarning::MissingTeam {
                            team_id: ts.team_id,
                            team_season_id,
                        },
                    );
                }
                team
            }
            None => {
                push_unique(warnings, DataWarning::MissingTeamSeason { team_season_id });
                None
            }
        };
        resolve(team, team_season)
    }
}

/// Append a warning unless an identical one is already recorded.
pub(crate) fn push_unique(warnings: &mut Vec<DataWarning>, warning: DataWarning) {
    if !warnings.contains(&warning) {
        warnings.push(warning);
    }
}

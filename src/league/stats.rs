//! Player stat aggregation: single-season, career and playoff leaderboards.

use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::db::models::{Game, PlayerGameStat};

use super::error::{DataWarning, LeagueError};
use super::lookup::{push_unique, LeagueIndex};
use super::{per_game, percentage};

/// Team label for players with no resolvable team-season.
pub const FREE_AGENT: &str = "Free Agent";

/// Which season a request is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonSelector {
    /// Every season, ignoring season boundaries
    Career,
    /// Whatever season the caller considers active
    Active,
    BySeasonId(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid season selector {0:?}: expected \"career\", \"current\" or a season id")]
pub struct ParseSeasonSelectorError(pub String);

impl FromStr for SeasonSelector {
    type Err = ParseSeasonSelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "career" => Ok(SeasonSelector::Career),
            "current" | "active" => Ok(SeasonSelector::Active),
            other => other
                .parse::<i64>()
                .map(SeasonSelector::BySeasonId)
                .map_err(|_| ParseSeasonSelectorError(trimmed.to_string())),
        }
    }
}

impl fmt::Display for SeasonSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeasonSelector::Career => write!(f, "career"),
            SeasonSelector::Active => write!(f, "current"),
            SeasonSelector::BySeasonId(id) => write!(f, "{}", id),
        }
    }
}

impl SeasonSelector {
    /// Resolve to an aggregation scope. `active_season_id` is supplied by the
    /// caller; the engine never looks it up itself.
    pub fn resolve(self, active_season_id: Option<i64>) -> Result<StatScope, LeagueError> {
        match self {
            SeasonSelector::Career => Ok(StatScope::Career),
            SeasonSelector::Active => active_season_id
                .map(StatScope::Season)
                .ok_or(LeagueError::NoActiveSeason),
            SeasonSelector::BySeasonId(id) => Ok(StatScope::Season(id)),
        }
    }

    /// Resolve to a concrete season id for views that only exist per season.
    pub fn season_id(self, active_season_id: Option<i64>) -> Result<i64, LeagueError> {
        match self.resolve(active_season_id)? {
            StatScope::Season(id) => Ok(id),
            StatScope::Career => Err(LeagueError::CareerNotSupported),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", content = "season_id", rename_all = "snake_case")]
pub enum StatScope {
    Career,
    Season(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatFilter {
    pub scope: StatScope,
    /// Only count games flagged as playoffs
    pub playoffs_only: bool,
}

impl StatFilter {
    pub fn season(season_id: i64) -> Self {
        StatFilter {
            scope: StatScope::Season(season_id),
            playoffs_only: false,
        }
    }

    pub fn career() -> Self {
        StatFilter {
            scope: StatScope::Career,
            playoffs_only: false,
        }
    }

    pub fn playoffs(season_id: i64) -> Self {
        StatFilter {
            scope: StatScope::Season(season_id),
            playoffs_only: true,
        }
    }

    fn admits(&self, game: &Game) -> bool {
        let in_scope = match self.scope {
            StatScope::Career => true,
            StatScope::Season(id) => game.season_id == id,
        };
        in_scope && (!self.playoffs_only || game.is_playoffs)
    }
}

/// Summed counting stats and derived rates for one player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerAggregate {
    pub player_id: i64,
    pub name: String,
    pub gamertag: Option<String>,
    /// Most recent team-season the player appeared for
    pub team_season_id: Option<i64>,
    pub team_name: String,
    pub games_played: i64,
    pub points: i64,
    pub goals: i64,
    pub assists: i64,
    pub saves: i64,
    pub shots: i64,
    pub mvps: i64,
    pub demos: i64,
    pub epic_saves: i64,
    pub otg: i64,
    pub avg_points_per_game: f64,
    pub avg_goals_per_game: f64,
    pub avg_assists_per_game: f64,
    pub avg_saves_per_game: f64,
    pub shot_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateReport {
    pub filter: StatFilter,
    /// Every player in scope, including those without points
    pub all: Vec<PlayerAggregate>,
    /// Players with at least one point, in leaderboard order
    pub leaderboard: Vec<PlayerAggregate>,
    pub warnings: Vec<DataWarning>,
}

impl AggregateReport {
    pub fn player(&self, player_id: i64) -> Option<&PlayerAggregate> {
        self.all.iter().find(|p| p.player_id == player_id)
    }
}

/// Ordering key of a game for "most recent team" purposes: season (by start
/// date, then id), week, series ordinal, game id.
type Recency = ((Option<NaiveDate>, i64), i64, i64, i64);

fn recency(game: &Game, index: &LeagueIndex) -> Recency {
    (
        index.season_recency(game.season_id),
        game.week,
        game.series_game.unwrap_or(0),
        game.id,
    )
}

#[derive(Debug, Default)]
struct Totals {
    points: i64,
    goals: i64,
    assists: i64,
    saves: i64,
    shots: i64,
    mvps: i64,
    demos: i64,
    epic_saves: i64,
    otg: i64,
    games: BTreeSet<i64>,
    latest: Option<(Recency, i64)>,
}

impl Totals {
    fn add(&mut self, row: &PlayerGameStat, game: &Game, key: Recency) {
        self.points += row.points;
        self.goals += row.goals;
        self.assists += row.assists;
        self.saves += row.saves;
        self.shots += row.shots;
        self.mvps += row.mvps;
        self.demos += row.demos;
        self.epic_saves += row.epic_saves;
        self.otg += row.otg;
        self.games.insert(game.id);

        if let Some(ts) = row.team_season_id {
            if self.latest.map_or(true, |(k, _)| key > k) {
                self.latest = Some((key, ts));
            }
        }
    }
}

/// Points desc, goals desc, name asc, then id.
fn compare_leaderboard(a: &PlayerAggregate, b: &PlayerAggregate) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| b.goals.cmp(&a.goals))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.player_id.cmp(&b.player_id))
}

/// Aggregate per-game stat rows into one row per player.
///
/// Rows whose player or game no longer exists are skipped with a warning, as
/// are repeat rows for a (player, game) pair already counted. A row with no
/// game reference at all fails the whole aggregation.
pub fn aggregate(
    stats: &[PlayerGameStat],
    index: &LeagueIndex,
    filter: StatFilter,
) -> Result<AggregateReport, LeagueError> {
    let mut warnings = Vec::new();
    let mut totals: BTreeMap<i64, Totals> = BTreeMap::new();
    let mut seen: HashSet<(i64, i64)> = HashSet::new();

    for row in stats {
        let game_id = row
            .game_id
            .ok_or(LeagueError::MissingGameReference { stat_id: row.id })?;
        let Some(game) = index.game(game_id) else {
            push_unique(
                &mut warnings,
                DataWarning::MissingGame {
                    game_id,
                    stat_id: row.id,
                },
            );
            continue;
        };
        if !filter.admits(game) {
            continue;
        }
        if index.player(row.player_id).is_none() {
            push_unique(
                &mut warnings,
                DataWarning::MissingPlayer {
                    player_id: row.player_id,
                    stat_id: row.id,
                },
            );
            continue;
        }
        if !seen.insert((row.player_id, game_id)) {
            push_unique(
                &mut warnings,
                DataWarning::DuplicateStatRow {
                    player_id: row.player_id,
                    game_id,
                    stat_id: row.id,
                },
            );
            continue;
        }
        totals
            .entry(row.player_id)
            .or_default()
            .add(row, game, recency(game, index));
    }

    // Roster members without stat lines still belong in the unfiltered view.
    match filter.scope {
        StatScope::Season(season_id) => {
            for (player_id, _) in index.roster_for_season(season_id) {
                if index.player(player_id).is_some() {
                    totals.entry(player_id).or_default();
                }
            }
        }
        StatScope::Career => {
            for player in index.players() {
                totals.entry(player.id).or_default();
            }
        }
    }

    let mut all = Vec::with_capacity(totals.len());
    for (player_id, t) in totals {
        let Some(player) = index.player(player_id) else {
            continue;
        };

        let team_season_id = t.latest.map(|(_, ts)| ts).or(match filter.scope {
            StatScope::Season(season_id) => index.roster_team_season(player_id, season_id),
            StatScope::Career => index.latest_roster_team_season(player_id),
        });
        let team_name = match team_season_id {
            Some(ts) if index.team_season(ts).is_some() => index.identity(ts, &mut warnings).name,
            Some(ts) => {
                push_unique(
                    &mut warnings,
                    DataWarning::MissingTeamSeason { team_season_id: ts },
                );
                FREE_AGENT.to_string()
            }
            None => FREE_AGENT.to_string(),
        };

        let games_played = t.games.len() as i64;
        all.push(PlayerAggregate {
            player_id,
            name: player.name.clone(),
            gamertag: player.gamertag.clone(),
            team_season_id,
            team_name,
            games_played,
            points: t.points,
            goals: t.goals,
            assists: t.assists,
            saves: t.saves,
            shots: t.shots,
            mvps: t.mvps,
            demos: t.demos,
            epic_saves: t.epic_saves,
            otg: t.otg,
            avg_points_per_game: per_game(t.points, games_played),
            avg_goals_per_game: per_game(t.goals, games_played),
            avg_assists_per_game: per_game(t.assists, games_played),
            avg_saves_per_game: per_game(t.saves, games_played),
            shot_percentage: percentage(t.goals, t.shots),
        });
    }

    all.sort_by(compare_leaderboard);
    let leaderboard: Vec<PlayerAggregate> = all.iter().filter(|p| p.points > 0).cloned().collect();

    debug!(
        "Aggregated {} stat row(s) into {} player(s) ({} on leaderboard)",
        stats.len(),
        all.len(),
        leaderboard.len()
    );

    Ok(AggregateReport {
        filter,
        all,
        leaderboard,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{LeagueSnapshot, Player, RosterMembership, Season, Team, TeamSeason};
    use approx::assert_relative_eq;

    fn make_game(id: i64, season_id: i64, week: i64, playoffs: bool) -> Game {
        Game {
            id,
            season_id,
            home_team_season_id: if season_id == 1 { 10 } else { 20 },
            away_team_season_id: if season_id == 1 { 11 } else { 21 },
            week,
            scheduled_date: None,
            home_score: Some(3),
            away_score: Some(2),
            is_playoffs: playoffs,
            series_game: None,
            home_forfeit: false,
            away_forfeit: false,
        }
    }

    fn make_stat(id: i64, game_id: i64, player_id: i64, ts: i64, points: i64, goals: i64) -> PlayerGameStat {
        PlayerGameStat {
            id,
            game_id: Some(game_id),
            player_id,
            team_season_id: Some(ts),
            points,
            goals,
            assists: 1,
            saves: 2,
            shots: goals * 2,
            mvps: 0,
            demos: 0,
            epic_saves: 0,
            otg: 0,
        }
    }

    fn make_team_season(id: i64, team_id: i64, season_id: i64, name: &str) -> TeamSeason {
        TeamSeason {
            id,
            team_id,
            season_id,
            display_name: Some(name.into()),
            primary_color: None,
            secondary_color: None,
            alt_logo_url: None,
            ranking: None,
        }
    }

    fn make_player(id: i64, name: &str) -> Player {
        Player {
            id,
            name: name.into(),
            gamertag: None,
        }
    }

    fn make_index() -> LeagueIndex {
        LeagueIndex::build(&make_snapshot())
    }

    fn make_snapshot() -> LeagueSnapshot {
        LeagueSnapshot {
            teams: vec![
                Team {
                    id: 1,
                    name: "Alpha".into(),
                    primary_color: None,
                    secondary_color: None,
                    logo_url: None,
                },
                Team {
                    id: 2,
                    name: "Bravo".into(),
                    primary_color: None,
                    secondary_color: None,
                    logo_url: None,
                },
            ],
            seasons: vec![
                Season {
                    id: 1,
                    name: "Spring".into(),
                    start_date: None,
                    end_date: None,
                    is_active: false,
                },
                Season {
                    id: 2,
                    name: "Fall".into(),
                    start_date: None,
                    end_date: None,
                    is_active: true,
                },
            ],
            team_seasons: vec![
                make_team_season(10, 1, 1, "Alpha S1"),
                make_team_season(11, 2, 1, "Bravo S1"),
                make_team_season(20, 1, 2, "Alpha S2"),
                make_team_season(21, 2, 2, "Bravo S2"),
            ],
            players: vec![
                make_player(100, "Casey"),
                make_player(101, "Drew"),
                make_player(102, "Emery"),
            ],
            roster: vec![RosterMembership {
                id: 1,
                player_id: 102,
                team_season_id: 21,
            }],
            games: vec![
                make_game(1, 1, 1, false),
                make_game(2, 1, 2, false),
                make_game(3, 2, 1, false),
                make_game(4, 2, 5, true),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_career_spans_seasons_and_team_seasons() {
        let index = make_index();
        let stats = vec![
            make_stat(1, 1, 100, 10, 300, 2),
            make_stat(2, 2, 100, 10, 250, 1),
            make_stat(3, 3, 100, 21, 400, 3),
        ];
        let report = aggregate(&stats, &index, StatFilter::career()).unwrap();
        let casey = report.player(100).unwrap();
        assert_eq!(casey.games_played, 3);
        assert_eq!(casey.points, 950);
        assert_eq!(casey.goals, 6);
        assert_eq!(casey.team_season_id, Some(21));
        assert_eq!(casey.team_name, "Bravo S2");
        assert_relative_eq!(casey.avg_points_per_game, 316.7, epsilon = 1e-9);
        assert_relative_eq!(casey.shot_percentage, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_season_scope_excludes_other_seasons() {
        let index = make_index();
        let stats = vec![make_stat(1, 1, 100, 10, 300, 2), make_stat(2, 3, 100, 20, 400, 3)];
        let report = aggregate(&stats, &index, StatFilter::season(1)).unwrap();
        let casey = report.player(100).unwrap();
        assert_eq!(casey.games_played, 1);
        assert_eq!(casey.points, 300);
        assert_eq!(casey.team_name, "Alpha S1");
    }

    #[test]
    fn test_playoffs_filter() {
        let index = make_index();
        let stats = vec![make_stat(1, 3, 101, 20, 200, 1), make_stat(2, 4, 101, 20, 500, 4)];
        let report = aggregate(&stats, &index, StatFilter::playoffs(2)).unwrap();
        let drew = report.player(101).unwrap();
        assert_eq!(drew.games_played, 1);
        assert_eq!(drew.points, 500);
    }

    #[test]
    fn test_repeat_row_for_same_game_is_ignored() {
        let index = make_index();
        let stats = vec![make_stat(1, 1, 100, 10, 300, 1), make_stat(2, 1, 100, 10, 300, 1)];
        let report = aggregate(&stats, &index, StatFilter::season(1)).unwrap();
        let casey = report.player(100).unwrap();
        assert_eq!(casey.games_played, 1);
        assert_eq!(casey.points, 300);
        assert_relative_eq!(casey.avg_points_per_game, 300.0, epsilon = 1e-9);
        assert_eq!(
            report.warnings,
            vec![DataWarning::DuplicateStatRow {
                player_id: 100,
                game_id: 1,
                stat_id: 2
            }]
        );
    }

    #[test]
    fn test_zero_point_players_only_in_unfiltered() {
        let index = make_index();
        let stats = vec![make_stat(1, 3, 100, 20, 120, 1), make_stat(2, 3, 101, 21, 0, 0)];
        let report = aggregate(&stats, &index, StatFilter::season(2)).unwrap();

        let leaders: Vec<i64> = report.leaderboard.iter().map(|p| p.player_id).collect();
        assert_eq!(leaders, vec![100]);
        // Drew has a zero line, Emery is rostered without any line
        assert!(report.player(101).is_some());
        let emery = report.player(102).unwrap();
        assert_eq!(emery.games_played, 0);
        assert_eq!(emery.avg_points_per_game, 0.0);
        assert_eq!(emery.team_name, "Bravo S2");
    }

    #[test]
    fn test_free_agent_without_team() {
        let index = make_index();
        let report = aggregate(&[], &index, StatFilter::career()).unwrap();
        assert_eq!(report.all.len(), 3);
        assert_eq!(report.player(100).unwrap().team_name, FREE_AGENT);
        assert_eq!(report.player(101).unwrap().team_name, FREE_AGENT);
        assert!(report.leaderboard.is_empty());
    }

    #[test]
    fn test_career_team_falls_back_to_latest_roster() {
        let index = make_index();
        let career = aggregate(&[], &index, StatFilter::career()).unwrap();
        let season = aggregate(&[], &index, StatFilter::season(2)).unwrap();
        let emery = career.player(102).unwrap();
        assert_eq!(emery.team_season_id, Some(21));
        assert_eq!(emery.team_name, "Bravo S2");
        assert_eq!(emery.team_name, season.player(102).unwrap().team_name);
    }

    #[test]
    fn test_latest_team_follows_season_start_date() {
        let mut snapshot = make_snapshot();
        // "Spring" (id 1) is the later season despite the lower id
        snapshot.seasons[0].start_date = NaiveDate::from_ymd_opt(2026, 3, 1);
        snapshot.seasons[1].start_date = NaiveDate::from_ymd_opt(2025, 9, 1);
        let index = LeagueIndex::build(&snapshot);
        let stats = vec![make_stat(1, 1, 100, 10, 300, 2), make_stat(2, 3, 100, 21, 400, 3)];
        let report = aggregate(&stats, &index, StatFilter::career()).unwrap();
        let casey = report.player(100).unwrap();
        assert_eq!(casey.team_season_id, Some(10));
        assert_eq!(casey.team_name, "Alpha S1");
    }

    #[test]
    fn test_leaderboard_ordering() {
        let index = make_index();
        let stats = vec![
            make_stat(1, 1, 100, 10, 300, 1),
            make_stat(2, 1, 101, 11, 300, 3),
            make_stat(3, 1, 102, 11, 300, 1),
        ];
        let report = aggregate(&stats, &index, StatFilter::season(1)).unwrap();
        let order: Vec<&str> = report.leaderboard.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(order, vec!["Drew", "Casey", "Emery"]);
    }

    #[test]
    fn test_missing_player_and_game_are_skipped() {
        let index = make_index();
        let stats = vec![
            make_stat(1, 1, 999, 10, 100, 1),
            make_stat(2, 77, 100, 10, 100, 1),
            make_stat(3, 1, 100, 10, 40, 0),
        ];
        let report = aggregate(&stats, &index, StatFilter::season(1)).unwrap();
        assert_eq!(report.player(100).unwrap().points, 40);
        assert_eq!(
            report.warnings,
            vec![
                DataWarning::MissingPlayer {
                    player_id: 999,
                    stat_id: 1
                },
                DataWarning::MissingGame {
                    game_id: 77,
                    stat_id: 2
                },
            ]
        );
    }

    #[test]
    fn test_missing_game_reference_is_fatal() {
        let index = make_index();
        let mut row = make_stat(9, 1, 100, 10, 100, 1);
        row.game_id = None;
        let err = aggregate(&[row], &index, StatFilter::career()).unwrap_err();
        assert_eq!(err, LeagueError::MissingGameReference { stat_id: 9 });
    }

    #[test]
    fn test_selector_parsing_and_resolution() {
        assert_eq!("career".parse::<SeasonSelector>().unwrap(), SeasonSelector::Career);
        assert_eq!("Current".parse::<SeasonSelector>().unwrap(), SeasonSelector::Active);
        assert_eq!("7".parse::<SeasonSelector>().unwrap(), SeasonSelector::BySeasonId(7));
        assert!("last".parse::<SeasonSelector>().is_err());

        assert_eq!(SeasonSelector::Active.resolve(Some(2)), Ok(StatScope::Season(2)));
        assert_eq!(SeasonSelector::Active.resolve(None), Err(LeagueError::NoActiveSeason));
        assert_eq!(
            SeasonSelector::Career.season_id(Some(2)),
            Err(LeagueError::CareerNotSupported)
        );
    }

    #[test]
    fn test_aggregate_idempotent() {
        let index = make_index();
        let stats = vec![
            make_stat(1, 1, 100, 10, 300, 2),
            make_stat(2, 3, 101, 21, 300, 2),
            make_stat(3, 4, 102, 21, 150, 1),
        ];
        let first = serde_json::to_string(&aggregate(&stats, &index, StatFilter::career()).unwrap()).unwrap();
        let second = serde_json::to_string(&aggregate(&stats, &index, StatFilter::career()).unwrap()).unwrap();
        assert_eq!(first, second);
    }
}

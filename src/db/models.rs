use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Permanent team identity; persists across seasons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    /// Baseline name, used when a season carries no display-name override
    pub name: String,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Season {
    pub id: i64,
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_active: bool,
}

/// A team's identity within one season. Games, standings and rosters all
/// point here rather than at the bare `Team`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSeason {
    pub id: i64,
    pub team_id: i64,
    pub season_id: i64,
    pub display_name: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub alt_logo_url: Option<String>,
    pub ranking: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub gamertag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterMembership {
    pub id: i64,
    pub player_id: i64,
    pub team_season_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: i64,
    pub season_id: i64,
    pub home_team_season_id: i64,
    pub away_team_season_id: i64,
    /// Must be >= 1; anything else cannot be placed in the schedule
    pub week: i64,
    pub scheduled_date: Option<NaiveDate>,
    /// `None` or `0-0` both mean "not yet played"
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    #[serde(default)]
    pub is_playoffs: bool,
    /// Ordinal of a repeat meeting within the same week
    pub series_game: Option<i64>,
    #[serde(default)]
    pub home_forfeit: bool,
    #[serde(default)]
    pub away_forfeit: bool,
}

/// One player's line for one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerGameStat {
    pub id: i64,
    pub game_id: Option<i64>,
    pub player_id: i64,
    pub team_season_id: Option<i64>,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub goals: i64,
    #[serde(default)]
    pub assists: i64,
    #[serde(default)]
    pub saves: i64,
    #[serde(default)]
    pub shots: i64,
    #[serde(default)]
    pub mvps: i64,
    #[serde(default)]
    pub demos: i64,
    #[serde(default)]
    pub epic_saves: i64,
    /// Overtime goals
    #[serde(default)]
    pub otg: i64,
}

/// Season-scoped win/loss record for one team-season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingsRow {
    pub id: i64,
    pub season_id: i64,
    pub team_season_id: i64,
    pub wins: i64,
    pub losses: i64,
    pub ties: i64,
    pub points_for: i64,
    pub points_against: i64,
}

/// Every row set the engine consumes, as loaded from storage or a seed file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LeagueSnapshot {
    pub teams: Vec<Team>,
    pub seasons: Vec<Season>,
    pub team_seasons: Vec<TeamSeason>,
    pub players: Vec<Player>,
    pub roster: Vec<RosterMembership>,
    pub games: Vec<Game>,
    pub stats: Vec<PlayerGameStat>,
    pub standings: Vec<StandingsRow>,
}

/// Score entry submitted for a single game
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    pub home_score: i64,
    pub away_score: i64,
    #[serde(default)]
    pub home_forfeit: bool,
    #[serde(default)]
    pub away_forfeit: bool,
}

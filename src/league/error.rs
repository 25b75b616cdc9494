use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Structural problems no fallback can repair. Any of these aborts the
/// derivation that hit it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeagueError {
    #[error("game {game_id} has week {week}; weeks must be positive")]
    InvalidWeek { game_id: i64, week: i64 },

    #[error("player stat row {stat_id} has no game reference")]
    MissingGameReference { stat_id: i64 },

    #[error("no active season is configured")]
    NoActiveSeason,

    #[error("career selection is not valid for a season-scoped view")]
    CareerNotSupported,
}

/// Non-fatal data-quality findings collected alongside a derived view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataWarning {
    MissingTeamSeason { team_season_id: i64 },
    MissingTeam { team_id: i64, team_season_id: i64 },
    MissingPlayer { player_id: i64, stat_id: i64 },
    MissingGame { game_id: i64, stat_id: i64 },
    /// A second stat row for the same player and game; only the first counts
    DuplicateStatRow { player_id: i64, game_id: i64, stat_id: i64 },
    DuplicateDisplayName { name: String, team_season_ids: Vec<i64> },
}

impl fmt::Display for DataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataWarning::MissingTeamSeason { team_season_id } => {
                write!(f, "team-season {} not found", team_season_id)
            }
            DataWarning::MissingTeam {
                team_id,
                team_season_id,
            } => write!(
                f,
                "team {} referenced by team-season {} not found",
                team_id, team_season_id
            ),
            DataWarning::MissingPlayer { player_id, stat_id } => {
                write!(f, "stat row {} references missing player {}", stat_id, player_id)
            }
            DataWarning::MissingGame { game_id, stat_id } => {
                write!(f, "stat row {} references missing game {}", stat_id, game_id)
            }
            DataWarning::DuplicateStatRow {
                player_id,
                game_id,
                stat_id,
            } => write!(
                f,
                "stat row {} repeats player {} in game {}; ignored",
                stat_id, player_id, game_id
            ),
            DataWarning::DuplicateDisplayName {
                name,
                team_season_ids,
            } => write!(
                f,
                "display name {:?} is shared by team-seasons {:?}",
                name, team_season_ids
            ),
        }
    }
}

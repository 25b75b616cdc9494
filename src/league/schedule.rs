//! Weekly schedule view: weeks → series (repeat matchups) → games.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::db::models::Game;

use super::error::{DataWarning, LeagueError};
use super::identity::EffectiveIdentity;
use super::lookup::LeagueIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Home,
    Away,
}

/// How a single game resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOutcome {
    HomeWin,
    AwayWin,
    /// Home side forfeited; away wins
    HomeForfeit,
    /// Away side forfeited; home wins
    AwayForfeit,
    /// Both sides forfeited; nobody wins
    DoubleForfeit,
    Tie,
    /// 0-0 with no forfeit: treated as not yet played, never as a tie
    Unplayed,
}

impl GameOutcome {
    pub fn winner(self) -> Option<Side> {
        match self {
            GameOutcome::HomeWin | GameOutcome::AwayForfeit => Some(Side::Home),
            GameOutcome::AwayWin | GameOutcome::HomeForfeit => Some(Side::Away),
            GameOutcome::DoubleForfeit | GameOutcome::Tie | GameOutcome::Unplayed => None,
        }
    }

    pub fn is_forfeit(self) -> bool {
        matches!(
            self,
            GameOutcome::HomeForfeit | GameOutcome::AwayForfeit | GameOutcome::DoubleForfeit
        )
    }
}

/// Classify a result. Forfeits take precedence over the score, then 0-0 is
/// unplayed, then equal scores tie, then the higher score wins.
pub fn classify_scores(home: i64, away: i64, home_forfeit: bool, away_forfeit: bool) -> GameOutcome {
    match (home_forfeit, away_forfeit) {
        (true, true) => GameOutcome::DoubleForfeit,
        (true, false) => GameOutcome::HomeForfeit,
        (false, true) => GameOutcome::AwayForfeit,
        (false, false) if home == away && home == 0 => GameOutcome::Unplayed,
        (false, false) if home == away => GameOutcome::Tie,
        (false, false) if home > away => GameOutcome::HomeWin,
        (false, false) => GameOutcome::AwayWin,
    }
}

pub fn classify(game: &Game) -> GameOutcome {
    classify_scores(
        game.home_score.unwrap_or(0),
        game.away_score.unwrap_or(0),
        game.home_forfeit,
        game.away_forfeit,
    )
}

/// Unordered pair of team-season ids; identical for A-vs-B and B-vs-A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MatchupKey {
    pub low: i64,
    pub high: i64,
}

impl MatchupKey {
    pub fn new(a: i64, b: i64) -> Self {
        MatchupKey {
            low: a.min(b),
            high: a.max(b),
        }
    }

    pub fn of(game: &Game) -> Self {
        Self::new(game.home_team_season_id, game.away_team_season_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideView {
    pub team_season_id: i64,
    pub identity: EffectiveIdentity,
    pub score: i64,
    pub forfeit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameView {
    pub game_id: i64,
    pub week: i64,
    /// 1-based position within the series after ordering by `series_game`,
    /// then encounter order
    pub series_game: i64,
    pub scheduled_date: Option<NaiveDate>,
    pub is_playoffs: bool,
    pub home: SideView,
    pub away: SideView,
    pub outcome: GameOutcome,
    pub winner_team_season_id: Option<i64>,
}

/// Wins within a series, oriented to the series' home side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeriesScore {
    pub home: u32,
    pub away: u32,
}

impl fmt::Display for SeriesScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.home, self.away)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesGroup {
    pub matchup_key: MatchupKey,
    /// Home side of the series' first game; `series_score.home` counts its wins
    pub home_team_season_id: i64,
    pub away_team_season_id: i64,
    pub games: Vec<GameView>,
    pub series_score: SeriesScore,
    /// `series_score` as "home-away"
    pub score_line: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekGroup {
    pub week: i64,
    pub series_groups: Vec<SeriesGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleReport {
    pub weeks: Vec<WeekGroup>,
    pub warnings: Vec<DataWarning>,
}

impl ScheduleReport {
    pub fn week(&self, week: i64) -> Option<&WeekGroup> {
        self.weeks.iter().find(|w| w.week == week)
    }
}

fn game_view(game: &Game, ordinal: i64, index: &LeagueIndex, warnings: &mut Vec<DataWarning>) -> GameView {
    let outcome = classify(game);
    let winner_team_season_id = outcome.winner().map(|side| match side {
        Side::Home => game.home_team_season_id,
        Side::Away => game.away_team_season_id,
    });
    GameView {
        game_id: game.id,
        week: game.week,
        series_game: ordinal,
        scheduled_date: game.scheduled_date,
        is_playoffs: game.is_playoffs,
        home: SideView {
            team_season_id: game.home_team_season_id,
            identity: index.identity(game.home_team_season_id, warnings),
            score: game.home_score.unwrap_or(0),
            forfeit: game.home_forfeit,
        },
        away: SideView {
            team_season_id: game.away_team_season_id,
            identity: index.identity(game.away_team_season_id, warnings),
            score: game.away_score.unwrap_or(0),
            forfeit: game.away_forfeit,
        },
        outcome,
        winner_team_season_id,
    }
}

fn build_series(key: MatchupKey, mut games: Vec<(usize, &Game)>, index: &LeagueIndex, warnings: &mut Vec<DataWarning>) -> SeriesGroup {
    // encounter position is 0-based; ordinals are 1-based
    games.sort_by_key(|(pos, g)| (g.series_game.unwrap_or(*pos as i64 + 1), *pos));

    let (home_id, away_id) = games
        .first()
        .map(|(_, g)| (g.home_team_season_id, g.away_team_season_id))
        .unwrap_or((key.low, key.high));

    let mut score = SeriesScore::default();
    let views: Vec<GameView> = games
        .iter()
        .enumerate()
        .map(|(i, (_, g))| {
            let view = game_view(g, i as i64 + 1, index, warnings);
            match view.winner_team_season_id {
                Some(w) if w == home_id => score.home += 1,
                Some(w) if w == away_id => score.away += 1,
                _ => {}
            }
            view
        })
        .collect();

    SeriesGroup {
        matchup_key: key,
        home_team_season_id: home_id,
        away_team_season_id: away_id,
        games: views,
        series_score: score,
        score_line: score.to_string(),
    }
}

/// Group a flat game list into weeks and series.
///
/// Weeks sort numerically; series keep the order in which their first game
/// appears. Fails if any game carries a non-positive week.
pub fn group_schedule(games: &[Game], index: &LeagueIndex) -> Result<ScheduleReport, LeagueError> {
    if let Some(bad) = games.iter().find(|g| g.week < 1) {
        return Err(LeagueError::InvalidWeek {
            game_id: bad.id,
            week: bad.week,
        });
    }

    let mut weeks: BTreeMap<i64, Vec<(MatchupKey, Vec<(usize, &Game)>)>> = BTreeMap::new();
    for game in games {
        let key = MatchupKey::of(game);
        let series = weeks.entry(game.week).or_default();
        match series.iter_mut().find(|(k, _)| *k == key) {
            Some((_, list)) => {
                let pos = list.len();
                list.push((pos, game));
            }
            None => series.push((key, vec![(0, game)])),
        }
    }

    let mut warnings = Vec::new();
    let weeks: Vec<WeekGroup> = weeks
        .into_iter()
        .map(|(week, series)| WeekGroup {
            week,
            series_groups: series
                .into_iter()
                .map(|(key, list)| build_series(key, list, index, &mut warnings))
                .collect(),
        })
        .collect();

    debug!("Grouped {} game(s) into {} week(s)", games.len(), weeks.len());

    Ok(ScheduleReport { weeks, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{LeagueSnapshot, Team, TeamSeason};

    fn make_game(id: i64, home: i64, away: i64, week: i64, scores: (i64, i64)) -> Game {
        Game {
            id,
            season_id: 1,
            home_team_season_id: home,
            away_team_season_id: away,
            week,
            scheduled_date: None,
            home_score: Some(scores.0),
            away_score: Some(scores.1),
            is_playoffs: false,
            series_game: None,
            home_forfeit: false,
            away_forfeit: false,
        }
    }

    fn make_index() -> LeagueIndex {
        let team_season = |id: i64, team_id: i64| TeamSeason {
            id,
            team_id,
            season_id: 1,
            display_name: None,
            primary_color: None,
            secondary_color: None,
            alt_logo_url: None,
            ranking: None,
        };
        LeagueIndex::build(&LeagueSnapshot {
            teams: vec![
                Team {
                    id: 1,
                    name: "Aces".into(),
                    primary_color: Some("#ff0000".into()),
                    secondary_color: None,
                    logo_url: None,
                },
                Team {
                    id: 2,
                    name: "Blitz".into(),
                    primary_color: None,
                    secondary_color: None,
                    logo_url: None,
                },
                Team {
                    id: 3,
                    name: "Cyclones".into(),
                    primary_color: None,
                    secondary_color: None,
                    logo_url: None,
                },
            ],
            team_seasons: vec![team_season(1, 1), team_season(2, 2), team_season(3, 3)],
            ..Default::default()
        })
    }

    #[test]
    fn test_unordered_pairing() {
        let index = make_index();
        let mut rematch = make_game(2, 2, 1, 1, (1, 4));
        rematch.series_game = Some(2);
        let games = vec![make_game(1, 1, 2, 1, (3, 2)), rematch];

        let report = group_schedule(&games, &index).unwrap();
        assert_eq!(report.weeks.len(), 1);
        let series = &report.weeks[0].series_groups;
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].matchup_key, MatchupKey { low: 1, high: 2 });
        assert_eq!(series[0].games.len(), 2);
        assert_eq!(MatchupKey::new(2, 1), MatchupKey::new(1, 2));
    }

    #[test]
    fn test_series_score_follows_series_home_side() {
        let index = make_index();
        let mut g2 = make_game(2, 2, 1, 1, (1, 4));
        g2.series_game = Some(2);
        let mut g3 = make_game(3, 1, 2, 1, (0, 2));
        g3.series_game = Some(3);
        let games = vec![g3, make_game(1, 1, 2, 1, (3, 2)), g2];

        let report = group_schedule(&games, &index).unwrap();
        let series = &report.weeks[0].series_groups[0];
        let order: Vec<i64> = series.games.iter().map(|g| g.game_id).collect();
        // game 1 has no ordinal; its encounter position gives it 2 and it was seen before game 2
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(series.home_team_season_id, 1);
        // team 1 won games 1 and 2 (once as the away side), team 2 won game 3
        assert_eq!(series.series_score, SeriesScore { home: 2, away: 1 });
        assert_eq!(series.score_line, "2-1");
    }

    #[test]
    fn test_series_ordinals_stay_distinct_with_mixed_numbering() {
        let index = make_index();
        let mut g7 = make_game(7, 1, 2, 1, (1, 0));
        g7.series_game = Some(3);
        let mut g2 = make_game(2, 2, 1, 1, (1, 0));
        g2.series_game = Some(2);
        let games = vec![g7, make_game(1, 1, 2, 1, (0, 1)), g2];

        let report = group_schedule(&games, &index).unwrap();
        let series = &report.weeks[0].series_groups[0];
        let numbered: Vec<(i64, i64)> = series
            .games
            .iter()
            .map(|g| (g.game_id, g.series_game))
            .collect();
        assert_eq!(numbered, vec![(1, 1), (2, 2), (7, 3)]);
    }

    #[test]
    fn test_forfeit_beats_score() {
        let mut game = make_game(1, 1, 2, 1, (10, 0));
        game.away_forfeit = true;
        assert_eq!(classify(&game), GameOutcome::AwayForfeit);
        assert_eq!(classify(&game).winner(), Some(Side::Home));

        let mut upset = make_game(2, 1, 2, 1, (10, 0));
        upset.home_forfeit = true;
        assert_eq!(classify(&upset).winner(), Some(Side::Away));
    }

    #[test]
    fn test_unplayed_vs_tie() {
        assert_eq!(classify_scores(0, 0, false, false), GameOutcome::Unplayed);
        assert_eq!(classify_scores(3, 3, false, false), GameOutcome::Tie);
        let mut pending = make_game(1, 1, 2, 1, (0, 0));
        pending.home_score = None;
        pending.away_score = None;
        assert_eq!(classify(&pending), GameOutcome::Unplayed);
    }

    #[test]
    fn test_unplayed_and_tied_games_do_not_count() {
        let index = make_index();
        let mut g2 = make_game(2, 1, 2, 1, (2, 2));
        g2.series_game = Some(2);
        let mut g3 = make_game(3, 1, 2, 1, (0, 0));
        g3.series_game = Some(3);
        let mut g4 = make_game(4, 1, 2, 1, (0, 5));
        g4.series_game = Some(4);
        g4.home_forfeit = true;
        g4.away_forfeit = true;
        let games = vec![make_game(1, 1, 2, 1, (1, 0)), g2, g3, g4];

        let report = group_schedule(&games, &index).unwrap();
        let series = &report.weeks[0].series_groups[0];
        assert_eq!(series.series_score, SeriesScore { home: 1, away: 0 });
        assert_eq!(series.games[3].outcome, GameOutcome::DoubleForfeit);
        assert_eq!(series.games[3].winner_team_season_id, None);
    }

    #[test]
    fn test_weeks_sort_numerically() {
        let index = make_index();
        let games = vec![
            make_game(1, 1, 2, 10, (1, 0)),
            make_game(2, 1, 3, 9, (1, 0)),
            make_game(3, 2, 3, 2, (1, 0)),
        ];
        let report = group_schedule(&games, &index).unwrap();
        let weeks: Vec<i64> = report.weeks.iter().map(|w| w.week).collect();
        assert_eq!(weeks, vec![2, 9, 10]);
        assert!(report.week(9).is_some());
    }

    #[test]
    fn test_distinct_matchups_split_within_week() {
        let index = make_index();
        let games = vec![
            make_game(1, 1, 2, 1, (1, 0)),
            make_game(2, 3, 1, 1, (1, 0)),
            make_game(3, 2, 1, 1, (0, 1)),
        ];
        let report = group_schedule(&games, &index).unwrap();
        let series = &report.weeks[0].series_groups;
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].matchup_key, MatchupKey::new(1, 2));
        assert_eq!(series[0].series_score, SeriesScore { home: 2, away: 0 });
        assert_eq!(series[1].matchup_key, MatchupKey::new(1, 3));
    }

    #[test]
    fn test_invalid_week_is_fatal() {
        let index = make_index();
        let games = vec![make_game(1, 1, 2, 1, (1, 0)), make_game(8, 1, 2, 0, (1, 0))];
        let err = group_schedule(&games, &index).unwrap_err();
        assert_eq!(err, LeagueError::InvalidWeek { game_id: 8, week: 0 });
    }

    #[test]
    fn test_missing_team_season_gets_fallback_identity() {
        let index = make_index();
        let report = group_schedule(&[make_game(1, 1, 42, 1, (2, 1))], &index).unwrap();
        let game = &report.weeks[0].series_groups[0].games[0];
        assert_eq!(game.home.identity.name, "Aces");
        assert_eq!(game.away.identity.name, "Unknown Team");
        assert_eq!(
            report.warnings,
            vec![DataWarning::MissingTeamSeason { team_season_id: 42 }]
        );
    }

    #[test]
    fn test_grouping_is_pure_and_repeatable() {
        let index = make_index();
        let games = vec![make_game(1, 1, 2, 3, (1, 0)), make_game(2, 2, 1, 3, (0, 0))];
        let before = games.clone();
        let first = serde_json::to_string(&group_schedule(&games, &index).unwrap()).unwrap();
        let second = serde_json::to_string(&group_schedule(&games, &index).unwrap()).unwrap();
        assert_eq!(first, second);
        assert_eq!(games, before);
    }
}

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info};

pub mod models;
use models::*;

use crate::league::schedule::{classify_scores, GameOutcome};

/// Why a game result could not be recorded.
#[derive(Debug, Error)]
pub enum RecordResultError {
    #[error("game {0} not found")]
    GameNotFound(i64),

    #[error("game {0} already has a recorded result")]
    AlreadyRecorded(i64),

    #[error("scores must be non-negative")]
    NegativeScore,

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Thread-safe SQLite connection pool (single connection with mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path.
    /// `:memory:` gives a throwaway database.
    pub fn open(path: &str) -> Result<Self> {
        if path == ":memory:" {
            return Self::open_in_memory();
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::from_connection(conn)
    }

    /// Fresh in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection mutex poisoned"))
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    // ── Seasons ───────────────────────────────────────────────────────────────

    pub fn list_seasons(&self) -> Result<Vec<Season>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, start_date, end_date, is_active FROM seasons ORDER BY id",
        )?;
        let seasons = stmt
            .query_map([], map_season)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(seasons)
    }

    /// Id of the active season, if one is flagged
    pub fn active_season_id(&self) -> Result<Option<i64>> {
        let conn = self.lock()?;
        let id = conn
            .query_row(
                "SELECT id FROM seasons WHERE is_active = 1 ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    pub fn count_teams(&self) -> Result<i64> {
        let conn = self.lock()?;
        let n = conn.query_row("SELECT COUNT(*) FROM teams", [], |r| r.get(0))?;
        Ok(n)
    }

    // ── Games & standings ─────────────────────────────────────────────────────

    pub fn list_games(&self, season_id: i64) -> Result<Vec<Game>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE season_id = ?1 ORDER BY week, id",
            SELECT_GAMES
        ))?;
        let games = stmt
            .query_map(params![season_id], map_game)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(games)
    }

    pub fn list_standings(&self, season_id: i64) -> Result<Vec<StandingsRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE season_id = ?1 ORDER BY id",
            SELECT_STANDINGS
        ))?;
        let rows = stmt
            .query_map(params![season_id], map_standings)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Record a final score and fold it into the season standings.
    ///
    /// Refuses games that already carry a result so standings are never
    /// counted twice.
    pub fn record_game_result(
        &self,
        game_id: i64,
        result: &GameResult,
    ) -> std::result::Result<GameOutcome, RecordResultError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let game = tx
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_GAMES),
                params![game_id],
                map_game,
            )
            .optional()?
            .ok_or(RecordResultError::GameNotFound(game_id))?;

        let existing = classify_scores(
            game.home_score.unwrap_or(0),
            game.away_score.unwrap_or(0),
            game.home_forfeit,
            game.away_forfeit,
        );
        if existing != GameOutcome::Unplayed {
            return Err(RecordResultError::AlreadyRecorded(game_id));
        }
        if result.home_score < 0 || result.away_score < 0 {
            return Err(RecordResultError::NegativeScore);
        }

        let outcome = classify_scores(
            result.home_score,
            result.away_score,
            result.home_forfeit,
            result.away_forfeit,
        );

        tx.execute(
            "UPDATE games SET home_score=?1, away_score=?2, home_forfeit=?3, away_forfeit=?4
             WHERE id=?5",
            params![
                result.home_score,
                result.away_score,
                result.home_forfeit,
                result.away_forfeit,
                game_id
            ],
        )?;

        if outcome != GameOutcome::Unplayed {
            // Forfeits decide the result but contribute no points.
            let (home_pts, away_pts) = if outcome.is_forfeit() {
                (0, 0)
            } else {
                (result.home_score, result.away_score)
            };
            let (home_delta, away_delta) = match outcome {
                GameOutcome::HomeWin | GameOutcome::AwayForfeit => ((1, 0, 0), (0, 1, 0)),
                GameOutcome::AwayWin | GameOutcome::HomeForfeit => ((0, 1, 0), (1, 0, 0)),
                GameOutcome::DoubleForfeit => ((0, 1, 0), (0, 1, 0)),
                GameOutcome::Tie => ((0, 0, 1), (0, 0, 1)),
                GameOutcome::Unplayed => ((0, 0, 0), (0, 0, 0)),
            };
            apply_standings_delta(&tx, game.season_id, game.home_team_season_id, home_delta, home_pts, away_pts)?;
            apply_standings_delta(&tx, game.season_id, game.away_team_season_id, away_delta, away_pts, home_pts)?;
        }

        tx.commit()?;
        info!("Recorded game {} as {:?}", game_id, outcome);
        Ok(outcome)
    }

    // ── Snapshot ──────────────────────────────────────────────────────────────

    /// Load every row set the engine works from
    pub fn load_snapshot(&self) -> Result<LeagueSnapshot> {
        let conn = self.lock()?;

        let teams = conn
            .prepare("SELECT id, name, primary_color, secondary_color, logo_url FROM teams ORDER BY id")?
            .query_map([], map_team)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let seasons = conn
            .prepare("SELECT id, name, start_date, end_date, is_active FROM seasons ORDER BY id")?
            .query_map([], map_season)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let team_seasons = conn
            .prepare(
                "SELECT id, team_id, season_id, display_name, primary_color,
                        secondary_color, alt_logo_url, ranking
                 FROM team_seasons ORDER BY id",
            )?
            .query_map([], map_team_season)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let players = conn
            .prepare("SELECT id, name, gamertag FROM players ORDER BY id")?
            .query_map([], map_player)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let roster = conn
            .prepare("SELECT id, player_id, team_season_id FROM roster_memberships ORDER BY id")?
            .query_map([], |row| {
                Ok(RosterMembership {
                    id: row.get(0)?,
                    player_id: row.get(1)?,
                    team_season_id: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let games = conn
            .prepare(&format!("{} ORDER BY id", SELECT_GAMES))?
            .query_map([], map_game)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let stats = conn
            .prepare(
                "SELECT id, game_id, player_id, team_season_id, points, goals, assists,
                        saves, shots, mvps, demos, epic_saves, otg
                 FROM player_game_stats ORDER BY id",
            )?
            .query_map([], map_stat)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let standings = conn
            .prepare(&format!("{} ORDER BY id", SELECT_STANDINGS))?
            .query_map([], map_standings)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!(
            "Loaded snapshot: {} teams, {} games, {} stat rows",
            teams.len(),
            games.len(),
            stats.len()
        );

        Ok(LeagueSnapshot {
            teams,
            seasons,
            team_seasons,
            players,
            roster,
            games,
            stats,
            standings,
        })
    }

    /// Insert every row of a snapshot in one transaction
    pub fn import_snapshot(&self, snapshot: &LeagueSnapshot) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        for t in &snapshot.teams {
            tx.execute(
                "INSERT INTO teams (id, name, primary_color, secondary_color, logo_url)
                 VALUES (?1,?2,?3,?4,?5)",
                params![t.id, t.name, t.primary_color, t.secondary_color, t.logo_url],
            )
            .with_context(|| format!("inserting team {}", t.id))?;
        }
        for s in &snapshot.seasons {
            tx.execute(
                "INSERT INTO seasons (id, name, start_date, end_date, is_active)
                 VALUES (?1,?2,?3,?4,?5)",
                params![s.id, s.name, s.start_date, s.end_date, s.is_active],
            )
            .with_context(|| format!("inserting season {}", s.id))?;
        }
        for ts in &snapshot.team_seasons {
            tx.execute(
                "INSERT INTO team_seasons (id, team_id, season_id, display_name, primary_color,
                                           secondary_color, alt_logo_url, ranking)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
                params![
                    ts.id,
                    ts.team_id,
                    ts.season_id,
                    ts.display_name,
                    ts.primary_color,
                    ts.secondary_color,
                    ts.alt_logo_url,
                    ts.ranking,
                ],
            )
            .with_context(|| format!("inserting team-season {}", ts.id))?;
        }
        for p in &snapshot.players {
            tx.execute(
                "INSERT INTO players (id, name, gamertag) VALUES (?1,?2,?3)",
                params![p.id, p.name, p.gamertag],
            )
            .with_context(|| format!("inserting player {}", p.id))?;
        }
        for m in &snapshot.roster {
            tx.execute(
                "INSERT INTO roster_memberships (id, player_id, team_season_id) VALUES (?1,?2,?3)",
                params![m.id, m.player_id, m.team_season_id],
            )
            .with_context(|| format!("inserting roster membership {}", m.id))?;
        }
        for g in &snapshot.games {
            tx.execute(
                "INSERT INTO games (id, season_id, home_team_season_id, away_team_season_id, week,
                                    scheduled_date, home_score, away_score, is_playoffs,
                                    series_game, home_forfeit, away_forfeit)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
                params![
                    g.id,
                    g.season_id,
                    g.home_team_season_id,
                    g.away_team_season_id,
                    g.week,
                    g.scheduled_date,
                    g.home_score,
                    g.away_score,
                    g.is_playoffs,
                    g.series_game,
                    g.home_forfeit,
                    g.away_forfeit,
                ],
            )
            .with_context(|| format!("inserting game {}", g.id))?;
        }
        for s in &snapshot.stats {
            tx.execute(
                "INSERT INTO player_game_stats (id, game_id, player_id, team_season_id, points,
                                                goals, assists, saves, shots, mvps, demos,
                                                epic_saves, otg)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
                params![
                    s.id,
                    s.game_id,
                    s.player_id,
                    s.team_season_id,
                    s.points,
                    s.goals,
                    s.assists,
                    s.saves,
                    s.shots,
                    s.mvps,
                    s.demos,
                    s.epic_saves,
                    s.otg,
                ],
            )
            .with_context(|| format!("inserting stat row {}", s.id))?;
        }
        for r in &snapshot.standings {
            tx.execute(
                "INSERT INTO standings (id, season_id, team_season_id, wins, losses, ties,
                                        points_for, points_against)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
                params![
                    r.id,
                    r.season_id,
                    r.team_season_id,
                    r.wins,
                    r.losses,
                    r.ties,
                    r.points_for,
                    r.points_against,
                ],
            )
            .with_context(|| format!("inserting standings row {}", r.id))?;
        }
        // Every team-season gets a row, even before its first result.
        let padded = tx
            .execute(
                "INSERT INTO standings (season_id, team_season_id)
                 SELECT season_id, id FROM team_seasons
                 WHERE id NOT IN (SELECT team_season_id FROM standings)",
                [],
            )
            .context("creating empty standings rows")?;
        if padded > 0 {
            debug!("Created {} empty standings row(s)", padded);
        }

        tx.commit()?;
        info!(
            "Imported {} teams, {} seasons, {} games, {} stat rows",
            snapshot.teams.len(),
            snapshot.seasons.len(),
            snapshot.games.len(),
            snapshot.stats.len()
        );
        Ok(())
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

const SELECT_GAMES: &str = "SELECT id, season_id, home_team_season_id, away_team_season_id, week,
        scheduled_date, home_score, away_score, is_playoffs, series_game,
        home_forfeit, away_forfeit
 FROM games";

const SELECT_STANDINGS: &str = "SELECT id, season_id, team_season_id, wins, losses, ties,
        points_for, points_against
 FROM standings";

/// Add (wins, losses, ties) and points to a team-season's row, creating it if absent.
fn apply_standings_delta(
    conn: &Connection,
    season_id: i64,
    team_season_id: i64,
    (wins, losses, ties): (i64, i64, i64),
    points_for: i64,
    points_against: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO standings (season_id, team_season_id, wins, losses, ties,
                                points_for, points_against)
         VALUES (?1,?2,?3,?4,?5,?6,?7)
         ON CONFLICT(team_season_id) DO UPDATE SET
            wins = wins + excluded.wins,
            losses = losses + excluded.losses,
            ties = ties + excluded.ties,
            points_for = points_for + excluded.points_for,
            points_against = points_against + excluded.points_against",
        params![season_id, team_season_id, wins, losses, ties, points_for, points_against],
    )?;
    Ok(())
}

fn map_team(row: &rusqlite::Row) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        name: row.get(1)?,
        primary_color: row.get(2)?,
        secondary_color: row.get(3)?,
        logo_url: row.get(4)?,
    })
}

fn map_season(row: &rusqlite::Row) -> rusqlite::Result<Season> {
    Ok(Season {
        id: row.get(0)?,
        name: row.get(1)?,
        start_date: row.get(2)?,
        end_date: row.get(3)?,
        is_active: row.get(4)?,
    })
}

fn map_team_season(row: &rusqlite::Row) -> rusqlite::Result<TeamSeason> {
    Ok(TeamSeason {
        id: row.get(0)?,
        team_id: row.get(1)?,
        season_id: row.get(2)?,
        display_name: row.get(3)?,
        primary_color: row.get(4)?,
        secondary_color: row.get(5)?,
        alt_logo_url: row.get(6)?,
        ranking: row.get(7)?,
    })
}

fn map_player(row: &rusqlite::Row) -> rusqlite::Result<Player> {
    Ok(Player {
        id: row.get(0)?,
        name: row.get(1)?,
        gamertag: row.get(2)?,
    })
}

fn map_game(row: &rusqlite::Row) -> rusqlite::Result<Game> {
    Ok(Game {
        id: row.get(0)?,
        season_id: row.get(1)?,
        home_team_season_id: row.get(2)?,
        away_team_season_id: row.get(3)?,
        week: row.get(4)?,
        scheduled_date: row.get(5)?,
        home_score: row.get(6)?,
        away_score: row.get(7)?,
        is_playoffs: row.get(8)?,
        series_game: row.get(9)?,
        home_forfeit: row.get(10)?,
        away_forfeit: row.get(11)?,
    })
}

fn map_stat(row: &rusqlite::Row) -> rusqlite::Result<PlayerGameStat> {
    Ok(PlayerGameStat {
        id: row.get(0)?,
        game_id: row.get(1)?,
        player_id: row.get(2)?,
        team_season_id: row.get(3)?,
        points: row.get(4)?,
        goals: row.get(5)?,
        assists: row.get(6)?,
        saves: row.get(7)?,
        shots: row.get(8)?,
        mvps: row.get(9)?,
        demos: row.get(10)?,
        epic_saves: row.get(11)?,
        otg: row.get(12)?,
    })
}

fn map_standings(row: &rusqlite::Row) -> rusqlite::Result<StandingsRow> {
    Ok(StandingsRow {
        id: row.get(0)?,
        season_id: row.get(1)?,
        team_season_id: row.get(2)?,
        wins: row.get(3)?,
        losses: row.get(4)?,
        ties: row.get(5)?,
        points_for: row.get(6)?,
        points_against: row.get(7)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS teams (
    id              INTEGER PRIMARY KEY,
    name            TEXT    NOT NULL,
    primary_color   TEXT,
    secondary_color TEXT,
    logo_url        TEXT
);

CREATE TABLE IF NOT EXISTS seasons (
    id          INTEGER PRIMARY KEY,
    name        TEXT    NOT NULL,
    start_date  TEXT,
    end_date    TEXT,
    is_active   INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS team_seasons (
    id              INTEGER PRIMARY KEY,
    team_id         INTEGER NOT NULL,
    season_id       INTEGER NOT NULL,
    display_name    TEXT,
    primary_color   TEXT,
    secondary_color TEXT,
    alt_logo_url    TEXT,
    ranking         INTEGER,
    UNIQUE (team_id, season_id),
    FOREIGN KEY (team_id) REFERENCES teams(id),
    FOREIGN KEY (season_id) REFERENCES seasons(id)
);

CREATE TABLE IF NOT EXISTS players (
    id          INTEGER PRIMARY KEY,
    name        TEXT    NOT NULL,
    gamertag    TEXT
);

CREATE TABLE IF NOT EXISTS roster_memberships (
    id              INTEGER PRIMARY KEY,
    player_id       INTEGER NOT NULL,
    team_season_id  INTEGER NOT NULL,
    UNIQUE (player_id, team_season_id),
    FOREIGN KEY (player_id) REFERENCES players(id),
    FOREIGN KEY (team_season_id) REFERENCES team_seasons(id)
);

CREATE TABLE IF NOT EXISTS games (
    id                  INTEGER PRIMARY KEY,
    season_id           INTEGER NOT NULL,
    home_team_season_id INTEGER NOT NULL,
    away_team_season_id INTEGER NOT NULL,
    week                INTEGER NOT NULL,
    scheduled_date      TEXT,
    home_score          INTEGER,
    away_score          INTEGER,
    is_playoffs         INTEGER NOT NULL DEFAULT 0,
    series_game         INTEGER,
    home_forfeit        INTEGER NOT NULL DEFAULT 0,
    away_forfeit        INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (season_id) REFERENCES seasons(id),
    FOREIGN KEY (home_team_season_id) REFERENCES team_seasons(id),
    FOREIGN KEY (away_team_season_id) REFERENCES team_seasons(id)
);

CREATE TABLE IF NOT EXISTS player_game_stats (
    id              INTEGER PRIMARY KEY,
    game_id         INTEGER,
    player_id       INTEGER NOT NULL,
    team_season_id  INTEGER,
    points          INTEGER NOT NULL DEFAULT 0,
    goals           INTEGER NOT NULL DEFAULT 0,
    assists         INTEGER NOT NULL DEFAULT 0,
    saves           INTEGER NOT NULL DEFAULT 0,
    shots           INTEGER NOT NULL DEFAULT 0,
    mvps            INTEGER NOT NULL DEFAULT 0,
    demos           INTEGER NOT NULL DEFAULT 0,
    epic_saves      INTEGER NOT NULL DEFAULT 0,
    otg             INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (game_id) REFERENCES games(id),
    FOREIGN KEY (player_id) REFERENCES players(id),
    FOREIGN KEY (team_season_id) REFERENCES team_seasons(id)
);

CREATE TABLE IF NOT EXISTS standings (
    id              INTEGER PRIMARY KEY,
    season_id       INTEGER NOT NULL,
    team_season_id  INTEGER NOT NULL UNIQUE,
    wins            INTEGER NOT NULL DEFAULT 0,
    losses          INTEGER NOT NULL DEFAULT 0,
    ties            INTEGER NOT NULL DEFAULT 0,
    points_for      INTEGER NOT NULL DEFAULT 0,
    points_against  INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (season_id) REFERENCES seasons(id),
    FOREIGN KEY (team_season_id) REFERENCES team_seasons(id)
);

CREATE INDEX IF NOT EXISTS idx_games_season_week ON games(season_id, week);
CREATE INDEX IF NOT EXISTS idx_stats_player ON player_game_stats(player_id);
CREATE INDEX IF NOT EXISTS idx_stats_game ON player_game_stats(game_id);
CREATE INDEX IF NOT EXISTS idx_standings_season ON standings(season_id);
"#;

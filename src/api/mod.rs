use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::db::models::{GameResult, LeagueSnapshot};
use crate::db::{Database, RecordResultError};
use crate::league::identity::season_rankings;
use crate::league::schedule::group_schedule;
use crate::league::standings::compute_standings;
use crate::league::stats::{aggregate, AggregateReport, PlayerAggregate, StatFilter, StatScope};
use crate::league::{DataWarning, LeagueIndex, SeasonSelector};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub leaderboard_limit: usize,
}

type ApiError = (StatusCode, String);

/// Build the Axum router for the league API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/seasons", get(seasons_handler))
        .route("/api/standings", get(standings_handler))
        .route("/api/rankings", get(rankings_handler))
        .route("/api/leaderboard", get(leaderboard_handler))
        .route("/api/players/:id", get(player_handler))
        .route("/api/schedule", get(schedule_handler))
        .route("/api/games/:id/result", post(record_result_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewParams {
    /// "career", "current" or a season id; defaults to "current"
    pub season: Option<String>,
    #[serde(default)]
    pub playoffs: bool,
    /// Include zero-point players in the leaderboard
    #[serde(default)]
    pub all: bool,
    pub week: Option<i64>,
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn bad_request(e: impl std::fmt::Display) -> ApiError {
    (StatusCode::BAD_REQUEST, e.to_string())
}

fn log_warnings(view: &str, warnings: &[DataWarning]) {
    for w in warnings {
        warn!("{}: {}", view, w);
    }
}

fn selector(params: &ViewParams) -> Result<SeasonSelector, ApiError> {
    params
        .season
        .as_deref()
        .unwrap_or("current")
        .parse::<SeasonSelector>()
        .map_err(bad_request)
}

/// Resolve the request's season to an id. "current" is looked up here, at the
/// boundary, and handed to the engine explicitly.
fn resolve_season_id(db: &Database, params: &ViewParams) -> Result<i64, ApiError> {
    let selector = selector(params)?;
    let active = db.active_season_id().map_err(internal)?;
    selector.season_id(active).map_err(bad_request)
}

fn require_season(index: &LeagueIndex, season_id: i64) -> Result<(), ApiError> {
    match index.season(season_id) {
        Some(_) => Ok(()),
        None => Err((StatusCode::NOT_FOUND, format!("season {} not found", season_id))),
    }
}

fn load(db: &Database) -> Result<(LeagueSnapshot, LeagueIndex), ApiError> {
    let snapshot = db.load_snapshot().map_err(internal)?;
    let index = LeagueIndex::build(&snapshot);
    Ok((snapshot, index))
}

/// GET /api/seasons
async fn seasons_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.list_seasons().map(Json).map_err(internal)
}

/// GET /api/standings?season=current
async fn standings_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ViewParams>,
) -> Result<impl IntoResponse, ApiError> {
    let season_id = resolve_season_id(&state.db, &params)?;
    let (_, index) = load(&state.db)?;
    require_season(&index, season_id)?;
    let rows = state.db.list_standings(season_id).map_err(internal)?;
    let report = compute_standings(&rows, &index);
    log_warnings("standings", &report.warnings);
    Ok(Json(report))
}

/// GET /api/rankings?season=current
async fn rankings_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ViewParams>,
) -> Result<impl IntoResponse, ApiError> {
    let season_id = resolve_season_id(&state.db, &params)?;
    let (_, index) = load(&state.db)?;
    require_season(&index, season_id)?;
    let report = season_rankings(&index, season_id);
    log_warnings("rankings", &report.warnings);
    Ok(Json(report))
}

fn stat_filter(db: &Database, params: &ViewParams) -> Result<StatFilter, ApiError> {
    let active = db.active_season_id().map_err(internal)?;
    let scope = selector(params)?.resolve(active).map_err(bad_request)?;
    Ok(match (scope, params.playoffs) {
        (StatScope::Season(id), true) => StatFilter::playoffs(id),
        (StatScope::Season(id), false) => StatFilter::season(id),
        (StatScope::Career, playoffs_only) => StatFilter {
            playoffs_only,
            ..StatFilter::career()
        },
    })
}

/// GET /api/leaderboard?season=career&playoffs=false&all=false
async fn leaderboard_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ViewParams>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = stat_filter(&state.db, &params)?;
    let (snapshot, index) = load(&state.db)?;
    let mut report = aggregate(&snapshot.stats, &index, filter).map_err(bad_request)?;
    log_warnings("leaderboard", &report.warnings);

    Ok(Json(leaderboard_rows(&mut report, params.all, state.leaderboard_limit)))
}

/// The limit caps the filtered leaderboard only; `all` returns every player in scope.
fn leaderboard_rows(report: &mut AggregateReport, all: bool, limit: usize) -> Vec<PlayerAggregate> {
    if all {
        std::mem::take(&mut report.all)
    } else {
        let mut rows = std::mem::take(&mut report.leaderboard);
        rows.truncate(limit);
        rows
    }
}

fn find_player(
    report: &AggregateReport,
    index: &LeagueIndex,
    player_id: i64,
) -> Result<PlayerAggregate, ApiError> {
    if index.player(player_id).is_none() {
        return Err((StatusCode::NOT_FOUND, format!("player {} not found", player_id)));
    }
    report.player(player_id).cloned().ok_or((
        StatusCode::NOT_FOUND,
        format!("player {} has no games in the selected scope", player_id),
    ))
}

/// GET /api/players/:id?season=career
async fn player_handler(
    State(state): State<Arc<AppState>>,
    Path(player_id): Path<i64>,
    Query(params): Query<ViewParams>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = stat_filter(&state.db, &params)?;
    let (snapshot, index) = load(&state.db)?;
    let report = aggregate(&snapshot.stats, &index, filter).map_err(bad_request)?;
    log_warnings("player", &report.warnings);
    find_player(&report, &index, player_id).map(Json)
}

/// GET /api/schedule?season=current&week=3
async fn schedule_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ViewParams>,
) -> Result<impl IntoResponse, ApiError> {
    let season_id = resolve_season_id(&state.db, &params)?;
    let (_, index) = load(&state.db)?;
    require_season(&index, season_id)?;
    let games = state.db.list_games(season_id).map_err(internal)?;
    let mut report = group_schedule(&games, &index).map_err(bad_request)?;
    log_warnings("schedule", &report.warnings);

    if let Some(week) = params.week {
        report.weeks = report.week(week).cloned().into_iter().collect();
    }
    Ok(Json(report))
}

/// POST /api/games/:id/result
async fn record_result_handler(
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    Json(result): Json<GameResult>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .record_game_result(game_id, &result)
        .map(|outcome| Json(serde_json::json!({ "game_id": game_id, "outcome": outcome })))
        .map_err(record_error)
}

fn record_error(e: RecordResultError) -> ApiError {
    let status = match &e {
        RecordResultError::GameNotFound(_) => StatusCode::NOT_FOUND,
        RecordResultError::AlreadyRecorded(_) => StatusCode::CONFLICT,
        RecordResultError::NegativeScore => StatusCode::BAD_REQUEST,
        RecordResultError::Storage(_) | RecordResultError::Other(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}

//! Season-scoped aggregation engine.
//!
//! Pure functions over an in-memory snapshot: identity resolution, standings,
//! player aggregates and the weekly schedule. Nothing here does I/O or looks
//! up "the active season" on its own; callers pass season ids explicitly.

pub mod error;
pub mod identity;
pub mod lookup;
pub mod schedule;
pub mod standings;
pub mod stats;

pub use error::DataWarning;
pub use lookup::LeagueIndex;
pub use stats::SeasonSelector;

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `total / games`, rounded to one decimal. Zero games yields 0.
pub fn per_game(total: i64, games: i64) -> f64 {
    if games > 0 {
        round1(total as f64 / games as f64)
    } else {
        0.0
    }
}

/// `100 * part / whole`, rounded to one decimal. A zero denominator yields 0.
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole > 0 {
        round1(100.0 * part as f64 / whole as f64)
    } else {
        0.0
    }
}

//! Quote-of-the-day pool loaded from a bundled JSON file.

use std::path::Path;
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::constants::FALLBACK_IMAGES;

/// One entry in the bundled quote pool.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct DailyQuote {
    /// The quote text.
    pub quote: String,
    /// Attributed author.
    pub author: String,
}

/// Errors returned when loading or consulting the pool.
#[derive(Debug)]
pub enum DailyQuotesError {
    /// The JSON payload could not be parsed.
    Parse(serde_json::Error),
    /// The bundled pool has no entries.
    Empty,
    /// The pool has not been initialized.
    NotInitialized,
}

impl std::fmt::Display for DailyQuotesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "Failed to parse daily quote JSON: {err}"),
            Self::Empty => write!(f, "Daily quote pool is empty"),
            Self::NotInitialized => write!(f, "Daily quote pool has not been initialized"),
        }
    }
}

impl std::error::Error for DailyQuotesError {}

static DAILY_QUOTES: OnceLock<Vec<DailyQuote>> = OnceLock::new();

/// Parse the bundled quote pool; called during startup.
pub fn init() -> Result<(), DailyQuotesError> {
    let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/daily_quotes.json"));
    let parsed: Vec<DailyQuote> = serde_json::from_str(raw).map_err(DailyQuotesError::Parse)?;
    if parsed.is_empty() {
        return Err(DailyQuotesError::Empty);
    }
    let _ = DAILY_QUOTES.set(parsed);
    Ok(())
}

/// Returns the pool entry for `date`. Every view on the same date sees the
/// same quote.
pub fn quote_for(date: NaiveDate) -> Result<&'static DailyQuote, DailyQuotesError> {
    let pool = DAILY_QUOTES.get().ok_or(DailyQuotesError::NotInitialized)?;
    let index = date.num_days_from_ce().rem_euclid(pool.len() as i32) as usize;
    pool.get(index).ok_or(DailyQuotesError::Empty)
}

/// Deterministic per-date backdrop for the daily card, so page loads never
/// spend image-model quota.
pub fn backdrop_for(date: NaiveDate) -> &'static str {
    let index = date.num_days_from_ce().rem_euclid(FALLBACK_IMAGES.len() as i32) as usize;
    FALLBACK_IMAGES.get(index).copied().unwrap_or(FALLBACK_IMAGES[0])
}

/// Serializes `entries` to `path`; used by the regeneration tool.
pub fn write_daily_quotes(path: &Path, entries: &[DailyQuote]) -> std::io::Result<()> {
    let json = serde_json::to_vec_pretty(entries).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}

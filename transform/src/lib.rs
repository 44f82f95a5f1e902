//! Turns the raw scoreboard payloads into normalized records.
//!
//! Nothing in here touches the database. The `ingest` crate consumes the
//! batches produced by [`matches::MatchListing`] and [`players::PlayerPayloads`]
//! and decides what to persist.

pub mod derived;
pub mod matches;
pub mod players;
pub mod weapons;

pub use derived::{duration_seconds, parse_timestamp, winning_team, WinningTeam};
pub use matches::{extract_match, MatchBatches, MatchListing, MatchRecord};
pub use players::{
    extract_player_stat, OpponentRecord, PlayerBatches, PlayerMatchStat, PlayerPayloads,
    TypeBreakdown,
};
pub use weapons::{WeaponRegistry, WeaponTally};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("reading {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Json {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("expected `result.maps` to be a list in {0}")]
    MalformedListing(std::path::PathBuf),
    #[error("weapon schema: {0}")]
    Csv(#[from] csv::Error),
    #[error("weapon schema is missing the {0:?} column")]
    MissingColumn(&'static str),
    #[error("weapon category {0:?} is not a valid column name")]
    InvalidCategory(String),
}

impl Error {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn json(path: &std::path::Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Counters kept while walking a source. Skips are not errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TransformStats {
    /// Records handed out in batches.
    pub processed: usize,
    /// Records dropped for missing or malformed required fields.
    pub skipped: usize,
    /// Payload files that could not be read or parsed.
    pub skipped_files: usize,
    /// Payload files left out because their match was already known.
    pub skipped_existing: usize,
}

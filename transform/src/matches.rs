use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde_json::Value;

use crate::{derived, Error, TransformStats, WinningTeam};

const PROGRESS_INTERVAL: usize = 5000;

#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub match_id: i64,
    pub map_id: String,
    pub map_name: String,
    pub map_short_name: String,
    pub game_mode: String,
    pub environment: String,
    pub allies_score: i32,
    pub axis_score: i32,
    pub winning_team: WinningTeam,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub match_duration: i64,
}

/// Builds a [`MatchRecord`] from one entry of `result.maps`.
///
/// Returns `None` when the match id, map id, map names, game mode,
/// environment or either timestamp is missing or unusable.
pub fn extract_match(entry: &Value) -> Option<MatchRecord> {
    let match_id = entry.get("id").and_then(as_i64)?;

    let map_info = entry.get("map")?;
    let map_id = map_info.get("id").and_then(as_id_string)?;

    let inner_map = map_info.get("map");
    let map_name = inner_map.and_then(|m| non_empty_str(m.get("pretty_name")));
    let map_short_name = inner_map.and_then(|m| non_empty_str(m.get("shortname")));
    let game_mode = non_empty_str(map_info.get("game_mode"));
    let environment = non_empty_str(map_info.get("environment"));
    let start = non_empty_str(entry.get("start"));
    let end = non_empty_str(entry.get("end"));

    let (
        Some(map_name),
        Some(map_short_name),
        Some(game_mode),
        Some(environment),
        Some(start),
        Some(end),
    ) = (map_name, map_short_name, game_mode, environment, start, end)
    else {
        tracing::trace!(match_id, "Match entry is missing required fields");
        return None;
    };

    let start_time = derived::parse_timestamp(start)?;
    let end_time = derived::parse_timestamp(end)?;

    let result = entry.get("result");
    let allies_score = score(result, "allied");
    let axis_score = score(result, "axis");

    Some(MatchRecord {
        match_id,
        map_id,
        map_name: map_name.to_owned(),
        map_short_name: map_short_name.to_owned(),
        game_mode: game_mode.to_owned(),
        environment: environment.to_owned(),
        allies_score,
        axis_score,
        winning_team: derived::winning_team(allies_score, axis_score),
        start_time,
        end_time,
        match_duration: derived::duration_seconds(start_time, end_time),
    })
}

/// The `all_matches.json` document listing every finished match.
#[derive(Debug, Clone)]
pub struct MatchListing {
    path: PathBuf,
}

#[derive(Debug, serde::Deserialize)]
struct ListingDocument {
    #[serde(default)]
    result: Option<ListingResult>,
}

#[derive(Debug, serde::Deserialize)]
struct ListingResult {
    #[serde(default)]
    maps: Option<Value>,
}

impl MatchListing {
    pub fn open<P>(path: P) -> Result<Self, Error>
    where
        P: Into<PathBuf>,
    {
        let path = path.into();
        if !path.is_file() {
            return Err(Error::io(
                &path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "match listing not found"),
            ));
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the listing from the start and hands out records `batch_size` at a time.
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    pub fn batches(&self, batch_size: usize) -> Result<MatchBatches, Error> {
        let file = std::fs::File::open(&self.path).map_err(|e| Error::io(&self.path, e))?;
        let document: ListingDocument = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| Error::json(&self.path, e))?;

        let entries = match document.result.and_then(|r| r.maps) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(entries)) => entries,
            Some(_) => return Err(Error::MalformedListing(self.path.clone())),
        };

        tracing::info!("Found {} match entries to process", entries.len());

        Ok(MatchBatches {
            total: entries.len(),
            entries: entries.into_iter(),
            batch_size: batch_size.max(1),
            seen: 0,
            stats: TransformStats::default(),
        })
    }
}

/// Lazy batches over a parsed listing. Entries are dropped once consumed.
#[derive(Debug)]
pub struct MatchBatches {
    entries: std::vec::IntoIter<Value>,
    batch_size: usize,
    total: usize,
    seen: usize,
    stats: TransformStats,
}

impl MatchBatches {
    pub fn stats(&self) -> TransformStats {
        self.stats
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

impl Iterator for MatchBatches {
    type Item = Vec<MatchRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut batch = Vec::with_capacity(self.batch_size);

        for entry in self.entries.by_ref() {
            self.seen += 1;

            match extract_match(&entry) {
                Some(record) => {
                    self.stats.processed += 1;
                    batch.push(record);
                }
                None => self.stats.skipped += 1,
            };

            if self.seen % PROGRESS_INTERVAL == 0 {
                tracing::debug!(
                    "Processed {}/{} entries ({} transformed, {} skipped)",
                    self.seen,
                    self.total,
                    self.stats.processed,
                    self.stats.skipped
                );
            }

            if batch.len() >= self.batch_size {
                return Some(batch);
            }
        }

        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }
}

pub(crate) fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn score(result: Option<&Value>, side: &str) -> i32 {
    result
        .and_then(|r| r.get(side))
        .and_then(Value::as_i64)
        .and_then(|s| i32::try_from(s).ok())
        .unwrap_or(0)
}

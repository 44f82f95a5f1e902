use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::matches::{as_i64, non_empty_str};
use crate::{Error, TransformStats};

const PROGRESS_INTERVAL: usize = 100;

/// Kill or death counts split by the scoreboard's coarse damage types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TypeBreakdown {
    pub infantry: i32,
    pub grenade: i32,
    pub machine_gun: i32,
    pub sniper: i32,
    pub artillery: i32,
    pub bazooka: i32,
    pub mine: i32,
    pub satchel: i32,
    pub commander: i32,
    pub armor: i32,
    pub pak: i32,
    pub spa: i32,
}

impl TypeBreakdown {
    fn from_value(value: Option<&Value>) -> Self {
        let field = |name: &str| value.and_then(|v| v.get(name)).map(as_count).unwrap_or(0);

        Self {
            infantry: field("infantry"),
            grenade: field("grenade"),
            machine_gun: field("machine_gun"),
            sniper: field("sniper"),
            artillery: field("artillery"),
            bazooka: field("bazooka"),
            mine: field("mine"),
            satchel: field("satchel"),
            commander: field("commander"),
            armor: field("armor"),
            pak: field("pak"),
            spa: field("self_propelled_artillery"),
        }
    }

    pub fn total(&self) -> i64 {
        [
            self.infantry,
            self.grenade,
            self.machine_gun,
            self.sniper,
            self.artillery,
            self.bazooka,
            self.mine,
            self.satchel,
            self.commander,
            self.armor,
            self.pak,
            self.spa,
        ]
        .into_iter()
        .map(i64::from)
        .sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerMatchStat {
    pub player_id: String,
    pub match_id: i64,
    pub player_name: String,
    pub team: Option<String>,
    pub total_kills: i32,
    pub total_deaths: i32,
    pub kill_streak: i32,
    pub death_streak: i32,
    pub kills_per_minute: f64,
    pub deaths_per_minute: f64,
    pub kill_death_ratio: f64,
    pub combat_score: i32,
    pub offense_score: i32,
    pub defense_score: i32,
    pub support_score: i32,
    pub shortest_life: i32,
    pub longest_life: i32,
    pub time_played: i32,
    pub teamkills: i32,
    pub kills_by_type: TypeBreakdown,
    pub deaths_by_type: TypeBreakdown,
    /// Kills per raw weapon name.
    pub weapons: BTreeMap<String, i32>,
    /// Deaths per raw weapon name.
    pub death_by_weapons: BTreeMap<String, i32>,
    /// Kills per victim name.
    pub most_killed: BTreeMap<String, i32>,
    /// Deaths per killer name.
    pub death_by: BTreeMap<String, i32>,
    /// The untouched scoreboard entry.
    pub raw_info: Value,
}

/// One row of `player_victim` or `player_nemesis`, borrowed from its player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpponentRecord<'a> {
    pub player_id: &'a str,
    pub match_id: i64,
    pub player_name: &'a str,
    pub team: Option<&'a str>,
    pub opponent_name: &'a str,
    pub count: i32,
}

impl PlayerMatchStat {
    /// One record per player this player killed.
    pub fn victims(&self) -> impl Iterator<Item = OpponentRecord<'_>> + '_ {
        self.opponents(&self.most_killed)
    }

    /// One record per player that killed this player.
    pub fn nemeses(&self) -> impl Iterator<Item = OpponentRecord<'_>> + '_ {
        self.opponents(&self.death_by)
    }

    fn opponents<'a>(
        &'a self,
        counts: &'a BTreeMap<String, i32>,
    ) -> impl Iterator<Item = OpponentRecord<'a>> + 'a {
        counts
            .iter()
            .filter(|(name, _)| !name.is_empty())
            .map(move |(name, count)| OpponentRecord {
                player_id: &self.player_id,
                match_id: self.match_id,
                player_name: &self.player_name,
                team: self.team.as_deref(),
                opponent_name: name,
                count: *count,
            })
    }
}

/// Builds a [`PlayerMatchStat`] from one entry of `result.player_stats`.
///
/// `None` if the player id or name is missing or empty.
pub fn extract_player_stat(entry: &Value, match_id: i64) -> Option<PlayerMatchStat> {
    let player_id = non_empty_str(entry.get("player_id"))?;
    let player_name = non_empty_str(entry.get("player"))?;

    let team = entry
        .get("team")
        .and_then(|t| t.get("side"))
        .and_then(Value::as_str)
        .filter(|side| *side != "unknown")
        .map(str::to_owned);

    let int = |name: &str| entry.get(name).map(as_count).unwrap_or(0);
    let float = |name: &str| entry.get(name).and_then(Value::as_f64).unwrap_or(0.0);

    Some(PlayerMatchStat {
        player_id: player_id.to_owned(),
        match_id,
        player_name: player_name.to_owned(),
        team,
        total_kills: int("kills"),
        total_deaths: int("deaths"),
        kill_streak: int("kills_streak"),
        death_streak: int("deaths_without_kill_streak"),
        kills_per_minute: float("kills_per_minute"),
        deaths_per_minute: float("deaths_per_minute"),
        kill_death_ratio: float("kill_death_ratio"),
        combat_score: int("combat"),
        offense_score: int("offense"),
        defense_score: int("defense"),
        support_score: int("support"),
        shortest_life: int("shortest_life_secs"),
        longest_life: int("longest_life_secs"),
        time_played: int("time_seconds"),
        teamkills: int("teamkills"),
        kills_by_type: TypeBreakdown::from_value(entry.get("kills_by_type")),
        deaths_by_type: TypeBreakdown::from_value(entry.get("deaths_by_type")),
        weapons: count_map(entry.get("weapons")),
        death_by_weapons: count_map(entry.get("death_by_weapons")),
        most_killed: count_map(entry.get("most_killed")),
        death_by: count_map(entry.get("death_by")),
        raw_info: entry.clone(),
    })
}

/// The `match_results/` directory, one JSON document per match.
#[derive(Debug, Clone)]
pub struct PlayerPayloads {
    dir: PathBuf,
    skip: HashSet<i64>,
}

impl PlayerPayloads {
    pub fn open<P>(dir: P) -> Result<Self, Error>
    where
        P: Into<PathBuf>,
    {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(Error::io(
                &dir,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "match results directory not found",
                ),
            ));
        }

        Ok(Self {
            dir,
            skip: HashSet::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Leaves out payloads whose match id is in `match_ids`.
    pub fn skip_matches<I>(mut self, match_ids: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        self.skip.extend(match_ids);
        self
    }

    /// Lists the payload files again and hands out players `batch_size` at a time.
    #[tracing::instrument(skip(self), fields(dir = %self.dir.display()))]
    pub fn batches(&self, batch_size: usize) -> Result<PlayerBatches<'_>, Error> {
        let mut files = std::fs::read_dir(&self.dir)
            .map_err(|e| Error::io(&self.dir, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
            .collect::<Vec<_>>();
        files.sort();

        tracing::info!("Found {} match result files to process", files.len());
        if !self.skip.is_empty() {
            tracing::info!("Skipping {} matches already in the database", self.skip.len());
        }

        Ok(PlayerBatches {
            total_files: files.len(),
            files: files.into_iter(),
            pending: VecDeque::new(),
            skip: &self.skip,
            batch_size: batch_size.max(1),
            files_seen: 0,
            stats: TransformStats::default(),
        })
    }
}

#[derive(Debug)]
pub struct PlayerBatches<'s> {
    files: std::vec::IntoIter<PathBuf>,
    pending: VecDeque<PlayerMatchStat>,
    skip: &'s HashSet<i64>,
    batch_size: usize,
    total_files: usize,
    files_seen: usize,
    stats: TransformStats,
}

impl PlayerBatches<'_> {
    pub fn stats(&self) -> TransformStats {
        self.stats
    }

    pub fn total_files(&self) -> usize {
        self.total_files
    }

    /// Parses the next payload file into `pending`. `false` once no files are left.
    fn load_next_file(&mut self) -> bool {
        let Some(path) = self.files.next() else {
            return false;
        };
        self.files_seen += 1;

        if self.files_seen % PROGRESS_INTERVAL == 0 {
            tracing::debug!(
                "Processed {}/{} files ({} player stats extracted, {} already in DB)",
                self.files_seen,
                self.total_files,
                self.stats.processed,
                self.stats.skipped_existing
            );
        }

        let document = match read_payload(&path) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("Skipping payload: {}", e);
                self.stats.skipped_files += 1;
                return true;
            }
        };

        let Some(result) = document.get("result").filter(|r| !r.is_null()) else {
            self.stats.skipped_files += 1;
            return true;
        };
        let Some(match_id) = result.get("id").and_then(as_i64) else {
            tracing::warn!("Payload {} has no match id", path.display());
            self.stats.skipped_files += 1;
            return true;
        };

        if self.skip.contains(&match_id) {
            self.stats.skipped_existing += 1;
            return true;
        }

        let entries = result
            .get("player_stats")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for entry in entries {
            match extract_player_stat(entry, match_id) {
                Some(stat) => self.pending.push_back(stat),
                None => self.stats.skipped += 1,
            }
        }

        true
    }
}

impl Iterator for PlayerBatches<'_> {
    type Item = Vec<PlayerMatchStat>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut batch = Vec::with_capacity(self.batch_size);

        while batch.len() < self.batch_size {
            match self.pending.pop_front() {
                Some(stat) => {
                    self.stats.processed += 1;
                    batch.push(stat);
                }
                None => {
                    if !self.load_next_file() {
                        break;
                    }
                }
            }
        }

        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }
}

fn read_payload(path: &Path) -> Result<Value, Error> {
    let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_reader(std::io::BufReader::new(file)).map_err(|e| Error::json(path, e))
}

/// Integer value of a count. Fractions are truncated, anything else is 0.
fn as_count(value: &Value) -> i32 {
    numeric_count(value).unwrap_or(0)
}

fn numeric_count(value: &Value) -> Option<i32> {
    let Value::Number(n) = value else {
        return None;
    };
    let whole = match n.as_i64() {
        Some(i) => i,
        None => n.as_f64()?.trunc() as i64,
    };
    Some(whole.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
}

/// Name to count maps. Entries with non-numeric counts are left out.
fn count_map(value: Option<&Value>) -> BTreeMap<String, i32> {
    let Some(Value::Object(entries)) = value else {
        return BTreeMap::new();
    };

    entries
        .iter()
        .filter_map(|(name, count)| numeric_count(count).map(|c| (name.clone(), c)))
        .collect()
}

//! Report types shared between the ingestion engine and whatever prints its results.

pub mod integrity;
pub mod repair;

pub use integrity::{CheckMode, IntegrityIssue, IntegrityReport, IssueKind};
pub use repair::{RepairSummary, TableRows};

/// The six tables of the `pathfinder_stats` schema.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    MatchHistory,
    PlayerMatchStats,
    PlayerKillStats,
    PlayerDeathStats,
    PlayerVictim,
    PlayerNemesis,
}

impl Table {
    /// Write order. Deletes walk it backwards.
    pub const ALL: [Table; 6] = [
        Table::MatchHistory,
        Table::PlayerMatchStats,
        Table::PlayerKillStats,
        Table::PlayerDeathStats,
        Table::PlayerVictim,
        Table::PlayerNemesis,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::MatchHistory => "match_history",
            Self::PlayerMatchStats => "player_match_stats",
            Self::PlayerKillStats => "player_kill_stats",
            Self::PlayerDeathStats => "player_death_stats",
            Self::PlayerVictim => "player_victim",
            Self::PlayerNemesis => "player_nemesis",
        }
    }

    /// Schema qualified name.
    pub fn qualified_name(&self) -> String {
        format!("pathfinder_stats.{}", self.name())
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What happened to the records handed to one table writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WriteOutcome {
    pub inserted: usize,
    /// Already present, either filtered before the insert or absorbed by the conflict clause.
    pub skipped: usize,
    /// Records in batches that failed.
    pub failed: usize,
    pub failed_batches: usize,
}

impl WriteOutcome {
    pub fn total(&self) -> usize {
        self.inserted + self.skipped + self.failed
    }
}

impl std::ops::AddAssign for WriteOutcome {
    fn add_assign(&mut self, rhs: Self) {
        self.inserted += rhs.inserted;
        self.skipped += rhs.skipped;
        self.failed += rhs.failed;
        self.failed_batches += rhs.failed_batches;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TableSummary {
    pub table: Table,
    #[serde(flatten)]
    pub outcome: WriteOutcome,
}

use std::collections::{BTreeMap, BTreeSet};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MatchMissingPlayerStats,
    MatchZeroPlayerCount,
    PlayerMissingKillStats,
    PlayerMissingDeathStats,
    PlayerMissingVictimStats,
    PlayerMissingNemesisStats,
}

impl IssueKind {
    pub const ALL: [IssueKind; 6] = [
        IssueKind::MatchMissingPlayerStats,
        IssueKind::MatchZeroPlayerCount,
        IssueKind::PlayerMissingKillStats,
        IssueKind::PlayerMissingDeathStats,
        IssueKind::PlayerMissingVictimStats,
        IssueKind::PlayerMissingNemesisStats,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MatchMissingPlayerStats => "match_missing_player_stats",
            Self::MatchZeroPlayerCount => "match_zero_player_count",
            Self::PlayerMissingKillStats => "player_missing_kill_stats",
            Self::PlayerMissingDeathStats => "player_missing_death_stats",
            Self::PlayerMissingVictimStats => "player_missing_victim_stats",
            Self::PlayerMissingNemesisStats => "player_missing_nemesis_stats",
        }
    }

    /// Match level kinds are counted per match, the rest per affected player.
    pub fn is_match_level(&self) -> bool {
        matches!(
            self,
            Self::MatchMissingPlayerStats | Self::MatchZeroPlayerCount
        )
    }
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckMode {
    /// Victim and nemesis rows are only reported when a whole match lacks them.
    #[default]
    Standard,
    /// Every player lacking victim or nemesis rows is reported.
    Thorough,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IntegrityIssue {
    pub kind: IssueKind,
    pub match_id: i64,
    pub description: String,
    /// Sorted. Empty for match level kinds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub player_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IntegrityReport {
    pub mode: CheckMode,
    pub issues: Vec<IntegrityIssue>,
    pub counts: BTreeMap<IssueKind, usize>,
    pub affected_match_ids: BTreeSet<i64>,
}

impl IntegrityReport {
    pub fn new(mode: CheckMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Adds the result of one check. Every kind that was checked shows up in `counts`.
    pub fn record(&mut self, kind: IssueKind, issues: Vec<IntegrityIssue>) {
        let count = if kind.is_match_level() {
            issues.len()
        } else {
            issues.iter().map(|i| i.player_ids.len()).sum()
        };

        *self.counts.entry(kind).or_default() += count;
        self.affected_match_ids
            .extend(issues.iter().map(|i| i.match_id));
        self.issues.extend(issues);
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_issues(&self) -> usize {
        self.issues.len()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &IntegrityIssue> + '_ {
        self.issues.iter().filter(move |i| i.kind == kind)
    }
}

use common::{
    CheckMode, IntegrityIssue, IntegrityReport, IssueKind, RepairSummary, Table, TableSummary,
    WriteOutcome,
};
use pretty_assertions::assert_eq;

fn issue(kind: IssueKind, match_id: i64, players: &[&str]) -> IntegrityIssue {
    IntegrityIssue {
        kind,
        match_id,
        description: format!("match {match_id}"),
        player_ids: players.iter().map(|p| p.to_string()).collect(),
    }
}

#[test]
fn counts_by_unit() {
    let mut report = IntegrityReport::new(CheckMode::Standard);

    report.record(
        IssueKind::MatchMissingPlayerStats,
        vec![
            issue(IssueKind::MatchMissingPlayerStats, 10, &[]),
            issue(IssueKind::MatchMissingPlayerStats, 11, &[]),
        ],
    );
    report.record(
        IssueKind::PlayerMissingKillStats,
        vec![
            issue(IssueKind::PlayerMissingKillStats, 11, &["a", "b", "c"]),
            issue(IssueKind::PlayerMissingKillStats, 12, &["d"]),
        ],
    );
    report.record(IssueKind::PlayerMissingVictimStats, Vec::new());

    assert_eq!(2, report.count(IssueKind::MatchMissingPlayerStats));
    assert_eq!(4, report.count(IssueKind::PlayerMissingKillStats));
    assert_eq!(0, report.count(IssueKind::PlayerMissingVictimStats));
    assert_eq!(0, report.count(IssueKind::MatchZeroPlayerCount));
    assert_eq!(4, report.total_issues());
    assert!(report.has_issues());
    assert_eq!(
        vec![10, 11, 12],
        report.affected_match_ids.iter().copied().collect::<Vec<_>>()
    );
    assert_eq!(2, report.issues_of(IssueKind::PlayerMissingKillStats).count());
}

#[test]
fn empty_report() {
    let mut report = IntegrityReport::new(CheckMode::Thorough);
    for kind in IssueKind::ALL {
        report.record(kind, Vec::new());
    }

    assert!(!report.has_issues());
    assert_eq!(6, report.counts.len());
    assert!(report.affected_match_ids.is_empty());
}

#[test]
fn report_json() {
    let mut report = IntegrityReport::new(CheckMode::Thorough);
    report.record(
        IssueKind::PlayerMissingNemesisStats,
        vec![issue(IssueKind::PlayerMissingNemesisStats, 5, &["p1"])],
    );

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!("thorough", value["mode"]);
    assert_eq!("player_missing_nemesis_stats", value["issues"][0]["kind"]);
    assert_eq!(1, value["counts"]["player_missing_nemesis_stats"]);
    assert_eq!(serde_json::json!([5]), value["affected_match_ids"]);

    let back: IntegrityReport = serde_json::from_value(value).unwrap();
    assert_eq!(report, back);
}

#[test]
fn match_level_issue_omits_players() {
    let value = serde_json::to_value(issue(IssueKind::MatchZeroPlayerCount, 3, &[])).unwrap();
    assert_eq!(None, value.get("player_ids"));
}

#[test]
fn repair_totals() {
    let mut summary = RepairSummary::new(true, 2);
    for table in Table::ALL.iter().rev() {
        summary.record(*table, 3);
    }
    summary.record(Table::PlayerVictim, 2);

    assert_eq!(20, summary.total);
    assert_eq!(5, summary.rows(Table::PlayerVictim));
    assert_eq!(Table::PlayerNemesis, summary.tables[0].table);
    assert_eq!(Table::MatchHistory, summary.tables[5].table);
}

#[test]
fn outcomes_add_up() {
    let mut outcome = WriteOutcome {
        inserted: 5,
        skipped: 1,
        ..Default::default()
    };
    outcome += WriteOutcome {
        inserted: 2,
        skipped: 0,
        failed: 50,
        failed_batches: 1,
    };

    assert_eq!(
        WriteOutcome {
            inserted: 7,
            skipped: 1,
            failed: 50,
            failed_batches: 1,
        },
        outcome
    );
    assert_eq!(58, outcome.total());

    let value = serde_json::to_value(TableSummary {
        table: Table::PlayerKillStats,
        outcome,
    })
    .unwrap();
    assert_eq!("player_kill_stats", value["table"]);
    assert_eq!(7, value["inserted"]);
}

#[test]
fn table_names() {
    assert_eq!(
        "pathfinder_stats.player_match_stats",
        Table::PlayerMatchStats.qualified_name()
    );
    assert_eq!("player_nemesis", Table::PlayerNemesis.to_string());
}

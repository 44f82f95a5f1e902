//! Read only checks for matches that were only partly ingested.
//!
//! A complete match has a `match_history` row, one `player_match_stats` row per
//! player, a kill and a death row per player, victim and nemesis rows, and a
//! `player_count` that matches the player rows. None of the checks write.

use std::collections::BTreeMap;

use diesel::QueryResult;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use common::{CheckMode, IntegrityIssue, IntegrityReport, IssueKind, Table};

use crate::writer::WeaponKind;

/// Default page size for the thorough victim and nemesis checks.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Victim or nemesis rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpponentKind {
    Victims,
    Nemeses,
}

impl OpponentKind {
    fn table(&self) -> Table {
        match self {
            Self::Victims => Table::PlayerVictim,
            Self::Nemeses => Table::PlayerNemesis,
        }
    }

    fn issue_kind(&self) -> IssueKind {
        match self {
            Self::Victims => IssueKind::PlayerMissingVictimStats,
            Self::Nemeses => IssueKind::PlayerMissingNemesisStats,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Victims => "victim",
            Self::Nemeses => "nemesis",
        }
    }
}

fn weapon_table(kind: WeaponKind) -> Table {
    match kind {
        WeaponKind::Kills => Table::PlayerKillStats,
        WeaponKind::Deaths => Table::PlayerDeathStats,
    }
}

fn weapon_issue(kind: WeaponKind) -> (IssueKind, &'static str) {
    match kind {
        WeaponKind::Kills => (IssueKind::PlayerMissingKillStats, "kill"),
        WeaponKind::Deaths => (IssueKind::PlayerMissingDeathStats, "death"),
    }
}

#[derive(diesel::QueryableByName, Debug)]
struct MatchRow {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    match_id: i64,
}

#[derive(diesel::QueryableByName, Debug)]
struct MatchCountRow {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    match_id: i64,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    actual_count: i64,
}

#[derive(diesel::QueryableByName, Debug)]
struct MatchPlayersRow {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    match_id: i64,
    #[diesel(sql_type = diesel::sql_types::Array<diesel::sql_types::Text>)]
    player_ids: Vec<String>,
}

#[derive(diesel::QueryableByName, Debug)]
struct PlayerRow {
    #[diesel(sql_type = diesel::sql_types::Text)]
    player_id: String,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    match_id: i64,
}

/// Matches with a `match_history` row but no player rows.
#[tracing::instrument(skip(conn))]
pub async fn check_matches_missing_player_stats(
    conn: &mut AsyncPgConnection,
) -> QueryResult<Vec<IntegrityIssue>> {
    let rows: Vec<MatchRow> = diesel::sql_query(
        "SELECT mh.match_id \
         FROM pathfinder_stats.match_history mh \
         WHERE NOT EXISTS ( \
           SELECT 1 FROM pathfinder_stats.player_match_stats pms \
           WHERE pms.match_id = mh.match_id \
         ) \
         ORDER BY mh.match_id",
    )
    .load(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| IntegrityIssue {
            kind: IssueKind::MatchMissingPlayerStats,
            match_id: row.match_id,
            description: format!(
                "Match {} exists in match_history but has no player_match_stats records",
                row.match_id
            ),
            player_ids: Vec::new(),
        })
        .collect())
}

/// Matches whose `player_count` is NULL or 0 although player rows exist.
#[tracing::instrument(skip(conn))]
pub async fn check_matches_zero_player_count(
    conn: &mut AsyncPgConnection,
) -> QueryResult<Vec<IntegrityIssue>> {
    let rows: Vec<MatchCountRow> = diesel::sql_query(
        "SELECT mh.match_id, COUNT(pms.player_id) AS actual_count \
         FROM pathfinder_stats.match_history mh \
         JOIN pathfinder_stats.player_match_stats pms ON pms.match_id = mh.match_id \
         WHERE mh.player_count IS NULL OR mh.player_count = 0 \
         GROUP BY mh.match_id \
         ORDER BY mh.match_id",
    )
    .load(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| IntegrityIssue {
            kind: IssueKind::MatchZeroPlayerCount,
            match_id: row.match_id,
            description: format!(
                "Match {} has player_count=0/NULL but {} players in player_match_stats",
                row.match_id, row.actual_count
            ),
            player_ids: Vec::new(),
        })
        .collect())
}

/// Every player without a kill (or death) row, grouped per match.
#[tracing::instrument(skip(conn))]
pub async fn check_players_missing_weapon_stats(
    conn: &mut AsyncPgConnection,
    kind: WeaponKind,
) -> QueryResult<Vec<IntegrityIssue>> {
    let rows: Vec<MatchPlayersRow> = diesel::sql_query(format!(
        "SELECT pms.match_id, array_agg(pms.player_id ORDER BY pms.player_id) AS player_ids \
         FROM pathfinder_stats.player_match_stats pms \
         WHERE NOT EXISTS ( \
           SELECT 1 FROM {} t \
           WHERE t.player_id = pms.player_id AND t.match_id = pms.match_id \
         ) \
         GROUP BY pms.match_id \
         ORDER BY pms.match_id",
        weapon_table(kind).qualified_name()
    ))
    .load(conn)
    .await?;

    let (issue_kind, label) = weapon_issue(kind);
    Ok(rows
        .into_iter()
        .map(|row| IntegrityIssue {
            kind: issue_kind,
            match_id: row.match_id,
            description: format!(
                "Match {}: {} players missing {} stats",
                row.match_id,
                row.player_ids.len(),
                label
            ),
            player_ids: row.player_ids,
        })
        .collect())
}

/// Matches where every player lacks victim (or nemesis) rows.
///
/// A single player without rows is normal, they may simply have no kills or
/// no deaths. Only the whole match missing them points at an interrupted run.
#[tracing::instrument(skip(conn))]
pub async fn check_players_missing_opponent_stats(
    conn: &mut AsyncPgConnection,
    kind: OpponentKind,
) -> QueryResult<Vec<IntegrityIssue>> {
    let rows: Vec<MatchPlayersRow> = diesel::sql_query(format!(
        "SELECT pms.match_id, array_agg(pms.player_id ORDER BY pms.player_id) AS player_ids \
         FROM pathfinder_stats.player_match_stats pms \
         WHERE NOT EXISTS ( \
           SELECT 1 FROM {} t \
           WHERE t.player_id = pms.player_id AND t.match_id = pms.match_id \
         ) \
         GROUP BY pms.match_id \
         HAVING COUNT(*) = ( \
           SELECT COUNT(*) FROM pathfinder_stats.player_match_stats pms2 \
           WHERE pms2.match_id = pms.match_id \
         ) \
         ORDER BY pms.match_id",
        kind.table().qualified_name()
    ))
    .load(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| IntegrityIssue {
            kind: kind.issue_kind(),
            match_id: row.match_id,
            description: format!(
                "Match {}: all {} players missing {} stats (likely partial insertion)",
                row.match_id,
                row.player_ids.len(),
                kind.label()
            ),
            player_ids: row.player_ids,
        })
        .collect())
}

/// Every player lacking victim (or nemesis) rows, grouped per match.
///
/// Walks the anti join `page_size` rows at a time, ordered by
/// `(match_id, player_id)` and continuing after the last key seen.
#[tracing::instrument(skip(conn))]
pub async fn check_all_players_missing_opponent_stats(
    conn: &mut AsyncPgConnection,
    kind: OpponentKind,
    page_size: usize,
) -> QueryResult<Vec<IntegrityIssue>> {
    let query = format!(
        "SELECT pms.player_id, pms.match_id \
         FROM pathfinder_stats.player_match_stats pms \
         WHERE NOT EXISTS ( \
           SELECT 1 FROM {} t \
           WHERE t.player_id = pms.player_id AND t.match_id = pms.match_id \
         ) \
         AND (pms.match_id, pms.player_id) > ($1, $2) \
         ORDER BY pms.match_id, pms.player_id \
         LIMIT $3",
        kind.table().qualified_name()
    );
    let page_size = page_size.max(1);
    let limit = i64::try_from(page_size).unwrap_or(i64::MAX);

    let mut by_match: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    let mut cursor: (i64, String) = (i64::MIN, String::new());
    let mut pages = 0usize;

    loop {
        let rows: Vec<PlayerRow> = diesel::sql_query(&query)
            .bind::<diesel::sql_types::BigInt, _>(cursor.0)
            .bind::<diesel::sql_types::Text, _>(cursor.1.clone())
            .bind::<diesel::sql_types::BigInt, _>(limit)
            .load(conn)
            .await?;
        pages += 1;

        let full_page = rows.len() == page_size;
        let Some(last) = rows.last() else {
            break;
        };
        cursor = (last.match_id, last.player_id.clone());

        for row in rows {
            by_match.entry(row.match_id).or_default().push(row.player_id);
        }

        if !full_page {
            break;
        }
    }

    tracing::debug!(
        "Scanned {} pages, {} matches with players missing {} stats",
        pages,
        by_match.len(),
        kind.label()
    );

    Ok(by_match
        .into_iter()
        .map(|(match_id, player_ids)| IntegrityIssue {
            kind: kind.issue_kind(),
            match_id,
            description: format!(
                "Match {}: {} players missing {} stats",
                match_id,
                player_ids.len(),
                kind.label()
            ),
            player_ids,
        })
        .collect())
}

/// Runs every check and collects the results.
#[tracing::instrument(skip(conn))]
pub async fn check_all(
    conn: &mut AsyncPgConnection,
    mode: CheckMode,
    page_size: usize,
) -> QueryResult<IntegrityReport> {
    let mut report = IntegrityReport::new(mode);

    tracing::info!("Checking for matches missing player stats");
    let issues = check_matches_missing_player_stats(conn).await?;
    report.record(IssueKind::MatchMissingPlayerStats, issues);

    tracing::info!("Checking for matches with zero or null player count");
    let issues = check_matches_zero_player_count(conn).await?;
    report.record(IssueKind::MatchZeroPlayerCount, issues);

    for kind in [WeaponKind::Kills, WeaponKind::Deaths] {
        let (issue_kind, label) = weapon_issue(kind);
        tracing::info!("Checking for players missing {} stats", label);
        let issues = check_players_missing_weapon_stats(conn, kind).await?;
        report.record(issue_kind, issues);
    }

    for kind in [OpponentKind::Victims, OpponentKind::Nemeses] {
        let issues = match mode {
            CheckMode::Standard => {
                tracing::info!("Checking for matches missing {} stats", kind.label());
                check_players_missing_opponent_stats(conn, kind).await?
            }
            CheckMode::Thorough => {
                tracing::info!("Checking for every player missing {} stats", kind.label());
                check_all_players_missing_opponent_stats(conn, kind, page_size).await?
            }
        };
        report.record(kind.issue_kind(), issues);
    }

    if report.has_issues() {
        tracing::warn!(
            "Found {} issues across {} matches",
            report.total_issues(),
            report.affected_match_ids.len()
        );
    } else {
        tracing::info!("No data integrity issues found");
    }

    Ok(report)
}

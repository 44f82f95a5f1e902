//! Removes every row of a set of matches so they can be ingested again.

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use common::{RepairSummary, Table};

use crate::PROBE_CHUNK_SIZE;

/// Dependents first, `match_history` last.
pub const DELETE_ORDER: [Table; 6] = [
    Table::PlayerNemesis,
    Table::PlayerVictim,
    Table::PlayerDeathStats,
    Table::PlayerKillStats,
    Table::PlayerMatchStats,
    Table::MatchHistory,
];

/// Deletes all rows of `match_ids` from every table, or only counts them when
/// `dry_run` is set. Each statement commits on its own.
#[tracing::instrument(skip(conn, match_ids), fields(matches = match_ids.len()))]
pub async fn repair(
    conn: &mut AsyncPgConnection,
    match_ids: &[i64],
    dry_run: bool,
) -> QueryResult<RepairSummary> {
    let mut summary = RepairSummary::new(dry_run, match_ids.len());
    if match_ids.is_empty() {
        return Ok(summary);
    }

    for table in DELETE_ORDER {
        let mut rows = 0;
        for chunk in match_ids.chunks(PROBE_CHUNK_SIZE) {
            rows += if dry_run {
                count_rows(conn, table, chunk).await?
            } else {
                delete_rows(conn, table, chunk).await?
            };
        }

        if rows > 0 {
            if dry_run {
                tracing::info!("[dry run] Would delete {} rows from {}", rows, table);
            } else {
                tracing::info!("Deleted {} rows from {}", rows, table);
            }
        }
        summary.record(table, rows);
    }

    Ok(summary)
}

async fn count_rows(conn: &mut AsyncPgConnection, table: Table, ids: &[i64]) -> QueryResult<usize> {
    use crate::schema::pathfinder_stats as s;

    let count: i64 = match table {
        Table::MatchHistory => {
            s::match_history::table
                .filter(s::match_history::match_id.eq_any(ids))
                .count()
                .get_result(conn)
                .await?
        }
        Table::PlayerMatchStats => {
            s::player_match_stats::table
                .filter(s::player_match_stats::match_id.eq_any(ids))
                .count()
                .get_result(conn)
                .await?
        }
        Table::PlayerKillStats => {
            s::player_kill_stats::table
                .filter(s::player_kill_stats::match_id.eq_any(ids))
                .count()
                .get_result(conn)
                .await?
        }
        Table::PlayerDeathStats => {
            s::player_death_stats::table
                .filter(s::player_death_stats::match_id.eq_any(ids))
                .count()
                .get_result(conn)
                .await?
        }
        Table::PlayerVictim => {
            s::player_victim::table
                .filter(s::player_victim::match_id.eq_any(ids))
                .count()
                .get_result(conn)
                .await?
        }
        Table::PlayerNemesis => {
            s::player_nemesis::table
                .filter(s::player_nemesis::match_id.eq_any(ids))
                .count()
                .get_result(conn)
                .await?
        }
    };

    Ok(usize::try_from(count).unwrap_or_default())
}

async fn delete_rows(conn: &mut AsyncPgConnection, table: Table, ids: &[i64]) -> QueryResult<usize> {
    use crate::schema::pathfinder_stats as s;

    match table {
        Table::MatchHistory => {
            diesel::delete(s::match_history::table.filter(s::match_history::match_id.eq_any(ids)))
                .execute(conn)
                .await
        }
        Table::PlayerMatchStats => {
            diesel::delete(
                s::player_match_stats::table.filter(s::player_match_stats::match_id.eq_any(ids)),
            )
            .execute(conn)
            .await
        }
        Table::PlayerKillStats => {
            diesel::delete(
                s::player_kill_stats::table.filter(s::player_kill_stats::match_id.eq_any(ids)),
            )
            .execute(conn)
            .await
        }
        Table::PlayerDeathStats => {
            diesel::delete(
                s::player_death_stats::table.filter(s::player_death_stats::match_id.eq_any(ids)),
            )
            .execute(conn)
            .await
        }
        Table::PlayerVictim => {
            diesel::delete(s::player_victim::table.filter(s::player_victim::match_id.eq_any(ids)))
                .execute(conn)
                .await
        }
        Table::PlayerNemesis => {
            diesel::delete(
                s::player_nemesis::table.filter(s::player_nemesis::match_id.eq_any(ids)),
            )
            .execute(conn)
            .await
        }
    }
}

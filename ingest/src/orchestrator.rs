//! One ingestion run: match history first, then the player tables batch by batch,
//! then the player count backfill.

use std::collections::{BTreeMap, HashSet};

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use common::{Table, TableSummary, WriteOutcome};
use transform::{MatchListing, OpponentRecord, PlayerMatchStat, PlayerPayloads, TransformStats};

use crate::writer::{self, WriteOptions};
use crate::{Context, Error, Shutdown};

/// Transform batches hold this many write batches.
const TRANSFORM_BATCH_FACTOR: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TableSelection {
    #[default]
    All,
    OnlyMatchHistory,
    OnlyPlayerStats,
}

impl TableSelection {
    fn match_history(&self) -> bool {
        !matches!(self, Self::OnlyPlayerStats)
    }

    fn player_tables(&self) -> bool {
        !matches!(self, Self::OnlyMatchHistory)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub skip_duplicates: bool,
    pub selection: TableSelection,
    /// Leave out payload files whose match already has player stats.
    pub skip_ingested_matches: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            skip_duplicates: true,
            selection: TableSelection::All,
            skip_ingested_matches: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunSummary {
    /// Only the tables the run wrote to, in write order.
    pub tables: Vec<TableSummary>,
    pub match_transform: TransformStats,
    pub player_transform: TransformStats,
    /// `None` when the backfill did not run.
    pub player_counts_updated: Option<usize>,
    pub interrupted: bool,
}

impl RunSummary {
    pub fn outcome(&self, table: Table) -> Option<WriteOutcome> {
        self.tables
            .iter()
            .find(|t| t.table == table)
            .map(|t| t.outcome)
    }

    pub fn failed_batches(&self) -> usize {
        self.tables.iter().map(|t| t.outcome.failed_batches).sum()
    }
}

#[derive(Debug, Default)]
struct Totals(BTreeMap<Table, WriteOutcome>);

impl Totals {
    fn add(&mut self, table: Table, outcome: WriteOutcome) {
        *self.0.entry(table).or_default() += outcome;
    }

    fn into_summaries(self) -> Vec<TableSummary> {
        self.0
            .into_iter()
            .map(|(table, outcome)| TableSummary { table, outcome })
            .collect()
    }
}

#[tracing::instrument(skip_all, fields(selection = ?options.selection))]
pub async fn run(
    conn: &mut AsyncPgConnection,
    ctx: &Context,
    shutdown: &Shutdown,
    options: RunOptions,
) -> Result<RunSummary, Error> {
    // Both sources are opened up front so a missing one aborts before any write.
    let listing = if options.selection.match_history() {
        Some(MatchListing::open(ctx.config.listing_path())?)
    } else {
        None
    };
    let payloads = if options.selection.player_tables() {
        Some(PlayerPayloads::open(ctx.config.match_results_dir())?)
    } else {
        None
    };

    let mut summary = RunSummary::default();
    let mut totals = Totals::default();

    if let Some(listing) = listing {
        let options = WriteOptions {
            batch_size: ctx.config.match_history_batch_size,
            skip_duplicates: options.skip_duplicates,
        };

        let mut batches =
            listing.batches(ctx.config.match_history_batch_size * TRANSFORM_BATCH_FACTOR)?;
        for batch in batches.by_ref() {
            if shutdown.is_triggered() {
                summary.interrupted = true;
                break;
            }

            let outcome = writer::write(conn, &writer::MatchHistory, &batch, options).await;
            totals.add(Table::MatchHistory, outcome);
        }
        summary.match_transform = batches.stats();

        tracing::info!(
            "Match history: {} transformed, {} skipped",
            summary.match_transform.processed,
            summary.match_transform.skipped
        );
    }

    if summary.interrupted || shutdown.is_triggered() {
        tracing::warn!("Stopping after the match history phase");
        summary.interrupted = true;
        summary.tables = totals.into_summaries();
        return Ok(summary);
    }

    if let Some(mut payloads) = payloads {
        if options.skip_ingested_matches {
            match ingested_match_ids(conn).await {
                Ok(ids) => {
                    tracing::info!("Found {} matches already in the database", ids.len());
                    payloads = payloads.skip_matches(ids);
                }
                Err(e) => {
                    tracing::warn!("Could not load ingested match ids, processing every file: {:?}", e);
                }
            };
        }

        if ctx.weapons.is_none() {
            tracing::warn!("No weapon schema loaded, skipping kill and death stats");
        }

        let write_options = WriteOptions {
            batch_size: ctx.config.player_stats_batch_size,
            skip_duplicates: options.skip_duplicates,
        };

        let mut batches =
            payloads.batches(ctx.config.player_stats_batch_size * TRANSFORM_BATCH_FACTOR)?;
        for batch in batches.by_ref() {
            if shutdown.is_triggered() {
                summary.interrupted = true;
                break;
            }

            write_player_batch(conn, ctx, &batch, write_options, &mut totals).await;
        }
        summary.player_transform = batches.stats();

        tracing::info!(
            "Player stats: {} transformed, {} skipped, {} files skipped, {} matches already ingested",
            summary.player_transform.processed,
            summary.player_transform.skipped,
            summary.player_transform.skipped_files,
            summary.player_transform.skipped_existing
        );

        if summary.interrupted || shutdown.is_triggered() {
            tracing::warn!("Stopping after the player stats phase, player counts are not updated");
            summary.interrupted = true;
            summary.tables = totals.into_summaries();
            return Ok(summary);
        }

        summary.player_counts_updated = Some(backfill_player_counts(conn).await?);
    }

    summary.tables = totals.into_summaries();
    Ok(summary)
}

/// Writes one transform batch to every player table, each table on its own.
async fn write_player_batch(
    conn: &mut AsyncPgConnection,
    ctx: &Context,
    batch: &[PlayerMatchStat],
    options: WriteOptions,
    totals: &mut Totals,
) {
    let outcome = writer::write(conn, &writer::PlayerMatchStats, batch, options).await;
    totals.add(Table::PlayerMatchStats, outcome);

    if let Some(registry) = ctx.weapons.as_ref() {
        let kills = writer::WeaponStats::kills(registry);
        let outcome = writer::write(conn, &kills, batch, options).await;
        totals.add(Table::PlayerKillStats, outcome);

        let deaths = writer::WeaponStats::deaths(registry);
        let outcome = writer::write(conn, &deaths, batch, options).await;
        totals.add(Table::PlayerDeathStats, outcome);
    }

    let victims: Vec<OpponentRecord<'_>> = batch.iter().flat_map(|s| s.victims()).collect();
    let outcome = writer::write(conn, &writer::Victims, &victims, options).await;
    totals.add(Table::PlayerVictim, outcome);

    let nemeses: Vec<OpponentRecord<'_>> = batch.iter().flat_map(|s| s.nemeses()).collect();
    let outcome = writer::write(conn, &writer::Nemeses, &nemeses, options).await;
    totals.add(Table::PlayerNemesis, outcome);
}

async fn ingested_match_ids(conn: &mut AsyncPgConnection) -> QueryResult<HashSet<i64>> {
    let ids: Vec<i64> = crate::schema::pathfinder_stats::player_match_stats::dsl::player_match_stats
        .select(crate::schema::pathfinder_stats::player_match_stats::dsl::match_id)
        .distinct()
        .load(conn)
        .await?;

    Ok(ids.into_iter().collect())
}

/// Sets `match_history.player_count` wherever it is NULL or disagrees with
/// `player_match_stats`. Returns the number of matches updated.
#[tracing::instrument(skip(conn))]
pub async fn backfill_player_counts(conn: &mut AsyncPgConnection) -> QueryResult<usize> {
    let updated = diesel::sql_query(
        "UPDATE pathfinder_stats.match_history mh \
         SET player_count = counts.players \
         FROM ( \
           SELECT match_id, COUNT(*)::int4 AS players \
           FROM pathfinder_stats.player_match_stats \
           GROUP BY match_id \
         ) counts \
         WHERE mh.match_id = counts.match_id \
           AND (mh.player_count IS NULL OR mh.player_count <> counts.players)",
    )
    .execute(conn)
    .await?;

    if updated > 0 {
        tracing::info!("Updated player_count for {} matches", updated);
    } else {
        tracing::info!("All player counts are already up to date");
    }

    Ok(updated)
}

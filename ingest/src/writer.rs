//! Batched inserts with optional duplicate skipping.
//!
//! Every table gets a target implementing [`UpsertTable`]. [`write`] drives a
//! target over a slice of records: probe for existing keys, then insert in
//! batches, each inside its own transaction. A failing batch is logged and
//! counted but never stops the remaining batches.

use std::collections::HashSet;

use diesel::QueryResult;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use futures::future::BoxFuture;

use common::{Table, WriteOutcome};

mod matches;
mod opponents;
mod players;
mod weapons;

pub use matches::MatchHistory;
pub use opponents::{Nemeses, Victims};
pub use players::PlayerMatchStats;
pub use weapons::{sync_weapon_columns, WeaponKind, WeaponStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub batch_size: usize,
    /// Probe for existing keys first and add `ON CONFLICT DO NOTHING` to the insert.
    pub skip_duplicates: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            batch_size: 50,
            skip_duplicates: true,
        }
    }
}

pub trait UpsertTable<R>: Sync {
    type Key: Eq + std::hash::Hash + Send + Sync;

    fn table(&self) -> Table;

    fn key(&self, record: &R) -> Self::Key;

    fn probe<'c>(
        &'c self,
        conn: &'c mut AsyncPgConnection,
        keys: &'c [Self::Key],
    ) -> BoxFuture<'c, QueryResult<HashSet<Self::Key>>>;

    /// Inserts `batch` and returns the number of rows actually written.
    fn insert<'c>(
        &'c self,
        conn: &'c mut AsyncPgConnection,
        batch: &'c [&'c R],
        skip_duplicates: bool,
    ) -> BoxFuture<'c, QueryResult<usize>>;
}

#[tracing::instrument(skip_all, fields(table = %target.table(), records = records.len()))]
pub async fn write<R, T>(
    conn: &mut AsyncPgConnection,
    target: &T,
    records: &[R],
    options: WriteOptions,
) -> WriteOutcome
where
    R: Sync,
    T: UpsertTable<R>,
{
    let mut outcome = WriteOutcome::default();
    let batch_size = options.batch_size.max(1);

    for probe_chunk in records.chunks(crate::PROBE_CHUNK_SIZE) {
        let pending: Vec<&R> = if options.skip_duplicates {
            let keys = probe_chunk.iter().map(|r| target.key(r)).collect::<Vec<_>>();

            let existing = match target.probe(conn, &keys).await {
                Ok(e) => e,
                Err(e) => {
                    tracing::error!(
                        "Probing {} existing keys in {}: {:?}",
                        keys.len(),
                        target.table(),
                        e
                    );
                    outcome.failed += probe_chunk.len();
                    outcome.failed_batches += probe_chunk.len().div_ceil(batch_size);
                    continue;
                }
            };

            probe_chunk
                .iter()
                .zip(keys.iter())
                .filter(|(_, key)| !existing.contains(*key))
                .map(|(record, _)| record)
                .collect()
        } else {
            probe_chunk.iter().collect()
        };

        outcome.skipped += probe_chunk.len() - pending.len();

        for (idx, batch) in pending.chunks(batch_size).enumerate() {
            let skip_duplicates = options.skip_duplicates;
            let result = conn
                .transaction::<usize, diesel::result::Error, _>(|conn| {
                    async move { target.insert(conn, batch, skip_duplicates).await }.scope_boxed()
                })
                .await;

            match result {
                Ok(affected) => {
                    outcome.inserted += affected;
                    outcome.skipped += batch.len().saturating_sub(affected);
                }
                Err(e) => {
                    tracing::error!(
                        "Inserting batch {} ({} records) into {}: {:?}",
                        idx + 1,
                        batch.len(),
                        target.table(),
                        e
                    );
                    outcome.failed += batch.len();
                    outcome.failed_batches += 1;
                }
            }
        }
    }

    if outcome.skipped > 0 {
        tracing::info!("Skipped {} existing records", outcome.skipped);
    }
    tracing::info!(
        "Inserted {} records into {} ({} failed)",
        outcome.inserted,
        target.table(),
        outcome.failed
    );

    outcome
}

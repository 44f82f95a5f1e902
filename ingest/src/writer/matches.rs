use std::collections::HashSet;

use diesel::QueryResult;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use futures::future::BoxFuture;

use common::Table;
use transform::MatchRecord;

use super::UpsertTable;

pub struct MatchHistory;

impl UpsertTable<MatchRecord> for MatchHistory {
    type Key = i64;

    fn table(&self) -> Table {
        Table::MatchHistory
    }

    fn key(&self, record: &MatchRecord) -> i64 {
        record.match_id
    }

    fn probe<'c>(
        &'c self,
        conn: &'c mut AsyncPgConnection,
        keys: &'c [i64],
    ) -> BoxFuture<'c, QueryResult<HashSet<i64>>> {
        Box::pin(crate::probe::existing_match_ids(conn, keys))
    }

    fn insert<'c>(
        &'c self,
        conn: &'c mut AsyncPgConnection,
        batch: &'c [&'c MatchRecord],
        skip_duplicates: bool,
    ) -> BoxFuture<'c, QueryResult<usize>> {
        let rows = batch
            .iter()
            .map(|r| crate::models::NewMatch::from(*r))
            .collect::<Vec<_>>();

        Box::pin(async move {
            let query = diesel::dsl::insert_into(
                crate::schema::pathfinder_stats::match_history::dsl::match_history,
            )
            .values(rows);

            if skip_duplicates {
                query.on_conflict_do_nothing().execute(conn).await
            } else {
                query.execute(conn).await
            }
        })
    }
}

use std::collections::HashSet;

use diesel::QueryResult;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use futures::future::BoxFuture;

use common::Table;
use transform::PlayerMatchStat;

use super::UpsertTable;
use crate::probe::{PlayerKey, PlayerTable};

pub struct PlayerMatchStats;

impl UpsertTable<PlayerMatchStat> for PlayerMatchStats {
    type Key = PlayerKey;

    fn table(&self) -> Table {
        Table::PlayerMatchStats
    }

    fn key(&self, record: &PlayerMatchStat) -> PlayerKey {
        (record.player_id.clone(), record.match_id)
    }

    fn probe<'c>(
        &'c self,
        conn: &'c mut AsyncPgConnection,
        keys: &'c [PlayerKey],
    ) -> BoxFuture<'c, QueryResult<HashSet<PlayerKey>>> {
        Box::pin(crate::probe::existing_player_keys(
            conn,
            PlayerTable::PlayerMatchStats,
            keys,
        ))
    }

    fn insert<'c>(
        &'c self,
        conn: &'c mut AsyncPgConnection,
        batch: &'c [&'c PlayerMatchStat],
        skip_duplicates: bool,
    ) -> BoxFuture<'c, QueryResult<usize>> {
        let rows = batch
            .iter()
            .map(|s| crate::models::NewPlayerMatchStats::from(*s))
            .collect::<Vec<_>>();

        Box::pin(async move {
            let query = diesel::dsl::insert_into(
                crate::schema::pathfinder_stats::player_match_stats::dsl::player_match_stats,
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

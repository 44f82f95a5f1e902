use std::collections::HashSet;

use diesel::QueryResult;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use futures::future::BoxFuture;

use common::Table;
use transform::OpponentRecord;

use super::UpsertTable;
use crate::probe::{OpponentKey, OpponentTable};

fn opponent_key(record: &OpponentRecord<'_>) -> OpponentKey {
    (
        record.player_id.to_owned(),
        record.match_id,
        record.opponent_name.to_owned(),
    )
}

/// `player_victim`, fed from [`transform::PlayerMatchStat::victims`].
pub struct Victims;

impl<'a> UpsertTable<OpponentRecord<'a>> for Victims {
    type Key = OpponentKey;

    fn table(&self) -> Table {
        Table::PlayerVictim
    }

    fn key(&self, record: &OpponentRecord<'a>) -> OpponentKey {
        opponent_key(record)
    }

    fn probe<'c>(
        &'c self,
        conn: &'c mut AsyncPgConnection,
        keys: &'c [OpponentKey],
    ) -> BoxFuture<'c, QueryResult<HashSet<OpponentKey>>> {
        Box::pin(crate::probe::existing_opponent_keys(
            conn,
            OpponentTable::PlayerVictim,
            keys,
        ))
    }

    fn insert<'c>(
        &'c self,
        conn: &'c mut AsyncPgConnection,
        batch: &'c [&'c OpponentRecord<'a>],
        skip_duplicates: bool,
    ) -> BoxFuture<'c, QueryResult<usize>> {
        let rows = batch
            .iter()
            .map(|r| crate::models::NewPlayerVictim::from(*r))
            .collect::<Vec<_>>();

        Box::pin(async move {
            let query = diesel::dsl::insert_into(
                crate::schema::pathfinder_stats::player_victim::dsl::player_victim,
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

/// `player_nemesis`, fed from [`transform::PlayerMatchStat::nemeses`].
pub struct Nemeses;

impl<'a> UpsertTable<OpponentRecord<'a>> for Nemeses {
    type Key = OpponentKey;

    fn table(&self) -> Table {
        Table::PlayerNemesis
    }

    fn key(&self, record: &OpponentRecord<'a>) -> OpponentKey {
        opponent_key(record)
    }

    fn probe<'c>(
        &'c self,
        conn: &'c mut AsyncPgConnection,
        keys: &'c [OpponentKey],
    ) -> BoxFuture<'c, QueryResult<HashSet<OpponentKey>>> {
        Box::pin(crate::probe::existing_opponent_keys(
            conn,
            OpponentTable::PlayerNemesis,
            keys,
        ))
    }

    fn insert<'c>(
        &'c self,
        conn: &'c mut AsyncPgConnection,
        batch: &'c [&'c OpponentRecord<'a>],
        skip_duplicates: bool,
    ) -> BoxFuture<'c, QueryResult<usize>> {
        let rows = batch
            .iter()
            .map(|r| crate::models::NewPlayerNemesis::from(*r))
            .collect::<Vec<_>>();

        Box::pin(async move {
            let query = diesel::dsl::insert_into(
                crate::schema::pathfinder_stats::player_nemesis::dsl::player_nemesis,
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

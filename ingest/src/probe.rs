//! Which of a set of candidate keys are already stored.
//!
//! Every function is read only and returns exactly the subset of its input
//! that exists, one query per [`PROBE_CHUNK_SIZE`] keys.

use std::collections::HashSet;

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use common::Table;

use crate::PROBE_CHUNK_SIZE;

pub type PlayerKey = (String, i64);
pub type OpponentKey = (String, i64, String);

/// Tables keyed by `(player_id, match_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerTable {
    PlayerMatchStats,
    PlayerKillStats,
    PlayerDeathStats,
}

impl From<PlayerTable> for Table {
    fn from(value: PlayerTable) -> Self {
        match value {
            PlayerTable::PlayerMatchStats => Table::PlayerMatchStats,
            PlayerTable::PlayerKillStats => Table::PlayerKillStats,
            PlayerTable::PlayerDeathStats => Table::PlayerDeathStats,
        }
    }
}

/// Tables keyed by `(player_id, match_id, <opponent>)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpponentTable {
    PlayerVictim,
    PlayerNemesis,
}

impl OpponentTable {
    pub fn name_column(&self) -> &'static str {
        match self {
            Self::PlayerVictim => "victim_name",
            Self::PlayerNemesis => "nemesis_name",
        }
    }
}

impl From<OpponentTable> for Table {
    fn from(value: OpponentTable) -> Self {
        match value {
            OpponentTable::PlayerVictim => Table::PlayerVictim,
            OpponentTable::PlayerNemesis => Table::PlayerNemesis,
        }
    }
}

#[derive(QueryableByName, Debug)]
struct PlayerKeyRow {
    #[diesel(sql_type = diesel::sql_types::Text)]
    player_id: String,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    match_id: i64,
}

#[derive(QueryableByName, Debug)]
struct OpponentKeyRow {
    #[diesel(sql_type = diesel::sql_types::Text)]
    player_id: String,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    match_id: i64,
    #[diesel(sql_type = diesel::sql_types::Text)]
    opponent_name: String,
}

#[tracing::instrument(skip(conn, ids), fields(candidates = ids.len()))]
pub async fn existing_match_ids(
    conn: &mut AsyncPgConnection,
    ids: &[i64],
) -> QueryResult<HashSet<i64>> {
    let mut existing = HashSet::new();

    for chunk in ids.chunks(PROBE_CHUNK_SIZE) {
        let query = crate::schema::pathfinder_stats::match_history::dsl::match_history
            .select(crate::schema::pathfinder_stats::match_history::dsl::match_id)
            .filter(crate::schema::pathfinder_stats::match_history::dsl::match_id.eq_any(chunk));

        let found: Vec<i64> = query.load(conn).await?;
        existing.extend(found);
    }

    tracing::debug!("{} of {} match ids already stored", existing.len(), ids.len());

    Ok(existing)
}

#[tracing::instrument(skip(conn, keys), fields(candidates = keys.len()))]
pub async fn existing_player_keys(
    conn: &mut AsyncPgConnection,
    table: PlayerTable,
    keys: &[PlayerKey],
) -> QueryResult<HashSet<PlayerKey>> {
    let query = format!(
        "SELECT t.player_id, t.match_id \
         FROM {} t \
         JOIN unnest($1::text[], $2::int8[]) AS k(player_id, match_id) \
           ON t.player_id = k.player_id AND t.match_id = k.match_id",
        Table::from(table).qualified_name()
    );

    let mut existing = HashSet::new();
    for chunk in keys.chunks(PROBE_CHUNK_SIZE) {
        let player_ids = chunk.iter().map(|k| k.0.as_str()).collect::<Vec<_>>();
        let match_ids = chunk.iter().map(|k| k.1).collect::<Vec<_>>();

        let rows: Vec<PlayerKeyRow> = diesel::sql_query(&query)
            .bind::<diesel::sql_types::Array<diesel::sql_types::Text>, _>(player_ids)
            .bind::<diesel::sql_types::Array<diesel::sql_types::BigInt>, _>(match_ids)
            .load(conn)
            .await?;

        existing.extend(rows.into_iter().map(|r| (r.player_id, r.match_id)));
    }

    Ok(existing)
}

#[tracing::instrument(skip(conn, keys), fields(candidates = keys.len()))]
pub async fn existing_opponent_keys(
    conn: &mut AsyncPgConnection,
    table: OpponentTable,
    keys: &[OpponentKey],
) -> QueryResult<HashSet<OpponentKey>> {
    let query = format!(
        "SELECT t.player_id, t.match_id, t.{name} AS opponent_name \
         FROM {table} t \
         JOIN unnest($1::text[], $2::int8[], $3::text[]) AS k(player_id, match_id, opponent_name) \
           ON t.player_id = k.player_id AND t.match_id = k.match_id AND t.{name} = k.opponent_name",
        name = table.name_column(),
        table = Table::from(table).qualified_name()
    );

    let mut existing = HashSet::new();
    for chunk in keys.chunks(PROBE_CHUNK_SIZE) {
        let player_ids = chunk.iter().map(|k| k.0.as_str()).collect::<Vec<_>>();
        let match_ids = chunk.iter().map(|k| k.1).collect::<Vec<_>>();
        let names = chunk.iter().map(|k| k.2.as_str()).collect::<Vec<_>>();

        let rows: Vec<OpponentKeyRow> = diesel::sql_query(&query)
            .bind::<diesel::sql_types::Array<diesel::sql_types::Text>, _>(player_ids)
            .bind::<diesel::sql_types::Array<diesel::sql_types::BigInt>, _>(match_ids)
            .bind::<diesel::sql_types::Array<diesel::sql_types::Text>, _>(names)
            .load(conn)
            .await?;

        existing.extend(
            rows.into_iter()
                .map(|r| (r.player_id, r.match_id, r.opponent_name)),
        );
    }

    Ok(existing)
}

use std::collections::HashSet;

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use futures::future::BoxFuture;

use common::Table;
use transform::{PlayerMatchStat, WeaponRegistry};

use super::UpsertTable;
use crate::probe::{PlayerKey, PlayerTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeaponKind {
    Kills,
    Deaths,
}

impl WeaponKind {
    fn player_table(&self) -> PlayerTable {
        match self {
            Self::Kills => PlayerTable::PlayerKillStats,
            Self::Deaths => PlayerTable::PlayerDeathStats,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Kills => "kill",
            Self::Deaths => "death",
        }
    }
}

/// `player_kill_stats` or `player_death_stats`, one column per registry category.
///
/// The column list is taken from the registry on every insert. Rows travel as a
/// single jsonb array that `jsonb_to_recordset` turns back into a relation.
/// Category names are always quoted, they may be keywords like `order`.
pub struct WeaponStats<'r> {
    kind: WeaponKind,
    registry: &'r WeaponRegistry,
}

impl<'r> WeaponStats<'r> {
    pub fn kills(registry: &'r WeaponRegistry) -> Self {
        Self {
            kind: WeaponKind::Kills,
            registry,
        }
    }

    pub fn deaths(registry: &'r WeaponRegistry) -> Self {
        Self {
            kind: WeaponKind::Deaths,
            registry,
        }
    }

    /// One jsonb object per player. Unmapped weapons are logged and left out.
    fn row(&self, stat: &PlayerMatchStat) -> serde_json::Value {
        let weapons = match self.kind {
            WeaponKind::Kills => &stat.weapons,
            WeaponKind::Deaths => &stat.death_by_weapons,
        };
        let tally = self.registry.tally(weapons);

        for weapon in &tally.unmapped {
            tracing::error!(
                player = %stat.player_name,
                player_id = %stat.player_id,
                match_id = stat.match_id,
                "Unmapped weapon in {} stats: {:?}",
                self.kind.label(),
                weapon
            );
        }

        let mut row = serde_json::Map::with_capacity(4 + tally.counts.len());
        row.insert("player_id".to_owned(), stat.player_id.as_str().into());
        row.insert("match_id".to_owned(), stat.match_id.into());
        row.insert("player_name".to_owned(), stat.player_name.as_str().into());
        row.insert(
            "team".to_owned(),
            stat.team
                .as_deref()
                .map(serde_json::Value::from)
                .unwrap_or(serde_json::Value::Null),
        );
        for (category, count) in self.registry.categories().iter().zip(tally.counts) {
            row.insert(category.clone(), count.into());
        }

        serde_json::Value::Object(row)
    }

    fn insert_sql(&self, skip_duplicates: bool) -> String {
        let categories = self.registry.categories();

        let columns = categories
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let selected = categories
            .iter()
            .map(|c| format!("r.\"{c}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let record_type = categories
            .iter()
            .map(|c| format!("\"{c}\" integer"))
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!(
            "INSERT INTO {table} (player_id, match_id, player_name, team, {columns}) \
             SELECT r.player_id, r.match_id, r.player_name, r.team, {selected} \
             FROM jsonb_to_recordset($1) \
               AS r(player_id text, match_id bigint, player_name text, team text, {record_type})",
            table = self.table().qualified_name()
        );
        if skip_duplicates {
            sql.push_str(" ON CONFLICT (player_id, match_id) DO NOTHING");
        }
        sql
    }
}

impl UpsertTable<PlayerMatchStat> for WeaponStats<'_> {
    type Key = PlayerKey;

    fn table(&self) -> Table {
        self.kind.player_table().into()
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
            self.kind.player_table(),
            keys,
        ))
    }

    fn insert<'c>(
        &'c self,
        conn: &'c mut AsyncPgConnection,
        batch: &'c [&'c PlayerMatchStat],
        skip_duplicates: bool,
    ) -> BoxFuture<'c, QueryResult<usize>> {
        let rows = serde_json::Value::Array(batch.iter().map(|s| self.row(s)).collect());
        let sql = self.insert_sql(skip_duplicates);

        Box::pin(async move {
            diesel::sql_query(sql)
                .bind::<diesel::sql_types::Jsonb, _>(rows)
                .execute(conn)
                .await
        })
    }
}

#[derive(QueryableByName, Debug)]
struct ColumnName {
    #[diesel(sql_type = diesel::sql_types::Text)]
    column_name: String,
}

/// Adds every registry category missing from the kill and death tables.
///
/// Returns the number of columns added, so `0` means the schema already matched.
#[tracing::instrument(skip_all, fields(categories = registry.categories().len()))]
pub async fn sync_weapon_columns(
    conn: &mut AsyncPgConnection,
    registry: &WeaponRegistry,
) -> QueryResult<usize> {
    let mut added = 0;

    for table in [Table::PlayerKillStats, Table::PlayerDeathStats] {
        let existing: Vec<ColumnName> = diesel::sql_query(
            "SELECT column_name::text AS column_name \
             FROM information_schema.columns \
             WHERE table_schema = 'pathfinder_stats' AND table_name = $1",
        )
        .bind::<diesel::sql_types::Text, _>(table.name())
        .load(conn)
        .await?;
        let existing = existing
            .into_iter()
            .map(|c| c.column_name)
            .collect::<HashSet<_>>();

        for category in registry.categories() {
            if existing.contains(category) {
                continue;
            }

            tracing::info!("Adding weapon column {} to {}", category, table);
            diesel::sql_query(format!(
                "ALTER TABLE {} ADD COLUMN IF NOT EXISTS \"{}\" INTEGER NOT NULL DEFAULT 0",
                table.qualified_name(),
                category
            ))
            .execute(conn)
            .await?;
            added += 1;
        }
    }

    Ok(added)
}

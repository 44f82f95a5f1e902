#![allow(dead_code)]

use std::path::{Path, PathBuf};

use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use common::Table;
use ingest::{Config, Context};
use transform::WeaponRegistry;

static MIGRATED: OnceCell<()> = OnceCell::const_new();

/// A connection inside a test transaction.
///
/// Database tests are `#[ignore]`d and run with `cargo test -- --ignored`,
/// so a missing `TEST_DATABASE_URL` is a failure here.
pub async fn connection() -> AsyncPgConnection {
    let url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must point at a scratch database");

    MIGRATED
        .get_or_init(|| async {
            let mut conn = AsyncPgConnection::establish(&url).await.unwrap();
            ingest::run_migrations(&mut conn).await.unwrap();
        })
        .await;

    let mut conn = AsyncPgConnection::establish(&url).await.unwrap();
    conn.begin_test_transaction().await.unwrap();
    conn
}

pub const WEAPON_SCHEMA: &str = "WeaponType,ValidNames,FriendlyName
KARABINER_98K,KARABINER 98K,Kar98k
MP40,MP40,MP 40
M1_GARAND,M1 GARAND,Garand
";

pub fn registry() -> WeaponRegistry {
    WeaponRegistry::from_reader(WEAPON_SCHEMA.as_bytes()).unwrap()
}

pub fn config(data_dir: &Path) -> Config {
    Config {
        database_url: None,
        postgres_host: None,
        postgres_port: 5432,
        postgres_db: None,
        postgres_user: None,
        postgres_password: None,
        match_history_batch_size: 2,
        player_stats_batch_size: 2,
        data_dir: data_dir.to_path_buf(),
        weapon_schemas_path: PathBuf::from("unused.csv"),
    }
}

pub fn context(data_dir: &Path) -> Context {
    Context::with_weapons(config(data_dir), registry())
}

pub fn listing_entry(match_id: i64, allied: i64, axis: i64) -> Value {
    json!({
        "id": match_id,
        "map": {
            "id": "stmariedumont_warfare",
            "map": { "pretty_name": "St. Marie Du Mont", "shortname": "SMDM" },
            "game_mode": "warfare",
            "environment": "day",
        },
        "start": "2025-01-04T19:00:00",
        "end": "2025-01-04T20:30:00",
        "result": { "allied": allied, "axis": axis },
    })
}

/// A scoreboard entry. `opponent` becomes both victim and nemesis when set.
pub fn player(player_id: &str, name: &str, opponent: Option<&str>) -> Value {
    let mut opponents = serde_json::Map::new();
    if let Some(o) = opponent {
        opponents.insert(o.to_owned(), json!(2));
    }

    json!({
        "player_id": player_id,
        "player": name,
        "team": { "side": "allies" },
        "kills": 3,
        "deaths": 2,
        "kills_per_minute": 0.5,
        "combat": 40,
        "kills_by_type": { "infantry": 3 },
        "deaths_by_type": { "machine_gun": 2 },
        "weapons": { "KARABINER 98K": 3 },
        "death_by_weapons": { "MP40": 2 },
        "most_killed": opponents,
        "death_by": opponents,
    })
}

/// Writes `all_matches.json` and one payload per match into a fresh directory.
pub fn fixture(matches: &[(i64, Vec<Value>)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_sources(dir.path(), matches);
    dir
}

pub fn write_sources(dir: &Path, matches: &[(i64, Vec<Value>)]) {
    let maps = matches
        .iter()
        .map(|(id, _)| listing_entry(*id, 3, 1))
        .collect::<Vec<_>>();
    std::fs::write(
        dir.join("all_matches.json"),
        json!({ "result": { "maps": maps } }).to_string(),
    )
    .unwrap();

    let results = dir.join("match_results");
    std::fs::create_dir_all(&results).unwrap();
    for (id, players) in matches {
        std::fs::write(
            results.join(format!("{id}.json")),
            json!({ "result": { "id": id, "player_stats": players } }).to_string(),
        )
        .unwrap();
    }
}

#[derive(diesel::QueryableByName)]
struct Count {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    n: i64,
}

pub async fn count_rows(conn: &mut AsyncPgConnection, table: Table, match_ids: &[i64]) -> i64 {
    let row: Count = diesel::sql_query(format!(
        "SELECT COUNT(*) AS n FROM {} WHERE match_id = ANY($1)",
        table.qualified_name()
    ))
    .bind::<diesel::sql_types::Array<diesel::sql_types::BigInt>, _>(match_ids.to_vec())
    .get_result(conn)
    .await
    .unwrap();
    row.n
}

/// Row counts of every table, in write order.
pub async fn table_counts(conn: &mut AsyncPgConnection, match_ids: &[i64]) -> Vec<(Table, i64)> {
    let mut counts = Vec::new();
    for table in Table::ALL {
        counts.push((table, count_rows(conn, table, match_ids).await));
    }
    counts
}

pub async fn execute(conn: &mut AsyncPgConnection, sql: &str) -> usize {
    diesel::sql_query(sql).execute(conn).await.unwrap()
}

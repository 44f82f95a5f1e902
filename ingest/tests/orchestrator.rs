mod support;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use pretty_assertions::assert_eq;

use common::{CheckMode, IssueKind, Table, WriteOutcome};
use ingest::models::StoredMatch;
use ingest::orchestrator::{backfill_player_counts, run, RunOptions, TableSelection};
use ingest::Shutdown;
use support::player;

fn clean(inserted: usize) -> WriteOutcome {
    WriteOutcome {
        inserted,
        ..Default::default()
    }
}

async fn stored_matches(
    conn: &mut diesel_async::AsyncPgConnection,
    ids: &[i64],
) -> Vec<StoredMatch> {
    use ingest::schema::pathfinder_stats::match_history::dsl;

    dsl::match_history
        .filter(dsl::match_id.eq_any(ids))
        .order(dsl::match_id)
        .select(StoredMatch::as_select())
        .load(conn)
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "needs TEST_DATABASE_URL"]
async fn second_run_changes_nothing() {
    let mut conn = support::connection().await;

    let ids = [910_001, 910_002];
    let dir = support::fixture(&[
        (
            910_001,
            vec![
                player("p910001-a", "Able", Some("Baker")),
                player("p910001-b", "Baker", Some("Able")),
            ],
        ),
        (910_002, vec![player("p910002-a", "Charlie", None)]),
    ]);
    let ctx = support::context(dir.path());

    let first = run(&mut conn, &ctx, &Shutdown::new(), RunOptions::default())
        .await
        .unwrap();
    assert!(!first.interrupted);
    assert_eq!(Some(clean(2)), first.outcome(Table::MatchHistory));
    assert_eq!(Some(clean(3)), first.outcome(Table::PlayerMatchStats));
    assert_eq!(Some(clean(3)), first.outcome(Table::PlayerKillStats));
    assert_eq!(Some(clean(3)), first.outcome(Table::PlayerDeathStats));
    assert_eq!(Some(clean(2)), first.outcome(Table::PlayerVictim));
    assert_eq!(Some(clean(2)), first.outcome(Table::PlayerNemesis));
    assert_eq!(2, first.match_transform.processed);
    assert_eq!(3, first.player_transform.processed);

    let after_first = support::table_counts(&mut conn, &ids).await;
    assert_eq!(
        vec![
            (Table::MatchHistory, 2),
            (Table::PlayerMatchStats, 3),
            (Table::PlayerKillStats, 3),
            (Table::PlayerDeathStats, 3),
            (Table::PlayerVictim, 2),
            (Table::PlayerNemesis, 2),
        ],
        after_first
    );

    let second = run(&mut conn, &ctx, &Shutdown::new(), RunOptions::default())
        .await
        .unwrap();
    for table in &second.tables {
        assert_eq!(0, table.outcome.inserted, "{}", table.table);
        assert_eq!(0, table.outcome.failed, "{}", table.table);
        assert_eq!(table.outcome.total(), table.outcome.skipped, "{}", table.table);
    }
    assert_eq!(Some(0), second.player_counts_updated);
    assert_eq!(after_first, support::table_counts(&mut conn, &ids).await);
}

#[tokio::test]
#[ignore = "needs TEST_DATABASE_URL"]
async fn stores_derived_match_fields() {
    let mut conn = support::connection().await;

    let dir = support::fixture(&[(
        910_101,
        vec![
            player("p910101-a", "Able", None),
            player("p910101-b", "Baker", None),
        ],
    )]);
    let ctx = support::context(dir.path());

    run(&mut conn, &ctx, &Shutdown::new(), RunOptions::default())
        .await
        .unwrap();

    assert_eq!(
        vec![StoredMatch {
            match_id: 910_101,
            map_name: "St. Marie Du Mont".to_owned(),
            winning_team: "Allies".to_owned(),
            match_duration: 5400,
            player_count: Some(2),
        }],
        stored_matches(&mut conn, &[910_101]).await
    );
}

#[tokio::test]
#[ignore = "needs TEST_DATABASE_URL"]
async fn stops_before_writing_when_shut_down() {
    let mut conn = support::connection().await;

    let ids = [910_201];
    let dir = support::fixture(&[(910_201, vec![player("p910201-a", "Able", None)])]);
    let ctx = support::context(dir.path());

    let shutdown = Shutdown::new();
    shutdown.trigger();

    let summary = run(&mut conn, &ctx, &shutdown, RunOptions::default())
        .await
        .unwrap();
    assert!(summary.interrupted);
    assert_eq!(None, summary.player_counts_updated);
    assert!(summary.tables.is_empty());

    for (table, rows) in support::table_counts(&mut conn, &ids).await {
        assert_eq!(0, rows, "{}", table);
    }
}

/// Trips `shutdown` once a writer reports its inserts into `table`.
struct StopAfterWrite {
    table: Table,
    shutdown: Shutdown,
}

struct Message<'a>(&'a mut String);

impl tracing::field::Visit for Message<'_> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.0 = format!("{:?}", value);
        }
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for StopAfterWrite {
    fn on_event(&self, event: &tracing::Event<'_>, _: tracing_subscriber::layer::Context<'_, S>) {
        let mut message = String::new();
        event.record(&mut Message(&mut message));

        if message.starts_with("Inserted") && message.contains(&format!(" into {} ", self.table)) {
            self.shutdown.trigger();
        }
    }
}

#[tokio::test]
#[ignore = "needs TEST_DATABASE_URL"]
async fn interrupted_run_is_repaired_and_resumed() {
    use tracing_subscriber::layer::SubscriberExt;

    let mut conn = support::connection().await;

    let ids = [910_701, 910_702];
    let first = (0..10)
        .map(|i| player(&format!("p910701-{i}"), &format!("Able {i}"), Some("Baker")))
        .collect();
    let dir = support::fixture(&[
        (910_701, first),
        (
            910_702,
            vec![
                player("p910702-a", "Charlie", Some("Dog")),
                player("p910702-b", "Dog", Some("Charlie")),
            ],
        ),
    ]);
    // Ten players per transform batch, so the first batch is exactly match 910701.
    let mut ctx = support::context(dir.path());
    ctx.config.player_stats_batch_size = 1;

    let shutdown = Shutdown::new();
    let subscriber = tracing_subscriber::registry().with(StopAfterWrite {
        table: Table::PlayerNemesis,
        shutdown: shutdown.clone(),
    });
    let summary = {
        let _guard = tracing::subscriber::set_default(subscriber);
        run(&mut conn, &ctx, &shutdown, RunOptions::default())
            .await
            .unwrap()
    };

    assert!(summary.interrupted);
    assert_eq!(None, summary.player_counts_updated);
    assert_eq!(10, summary.player_transform.processed);
    assert_eq!(Some(clean(10)), summary.outcome(Table::PlayerNemesis));
    assert_eq!(10, support::count_rows(&mut conn, Table::PlayerMatchStats, &ids).await);

    let report = ingest::integrity::check_all(&mut conn, CheckMode::Standard, 100)
        .await
        .unwrap();
    let found = report
        .issues
        .iter()
        .filter(|i| ids.contains(&i.match_id))
        .map(|i| (i.kind, i.match_id))
        .collect::<Vec<_>>();
    assert_eq!(
        vec![
            (IssueKind::MatchMissingPlayerStats, 910_702),
            (IssueKind::MatchZeroPlayerCount, 910_701),
        ],
        found
    );

    let repaired = ingest::repair::repair(&mut conn, &ids, false).await.unwrap();
    assert_eq!(2, repaired.rows(Table::MatchHistory));
    assert_eq!(10, repaired.rows(Table::PlayerMatchStats));

    let resumed = run(&mut conn, &ctx, &Shutdown::new(), RunOptions::default())
        .await
        .unwrap();
    assert!(!resumed.interrupted);
    assert_eq!(
        vec![
            (Table::MatchHistory, 2),
            (Table::PlayerMatchStats, 12),
            (Table::PlayerKillStats, 12),
            (Table::PlayerDeathStats, 12),
            (Table::PlayerVictim, 12),
            (Table::PlayerNemesis, 12),
        ],
        support::table_counts(&mut conn, &ids).await
    );

    let report = ingest::integrity::check_all(&mut conn, CheckMode::Thorough, 100)
        .await
        .unwrap();
    assert!(report.issues.iter().all(|i| !ids.contains(&i.match_id)));
    assert_eq!(
        vec![Some(10), Some(2)],
        stored_matches(&mut conn, &ids)
            .await
            .into_iter()
            .map(|m| m.player_count)
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
#[ignore = "needs TEST_DATABASE_URL"]
async fn only_match_history() {
    let mut conn = support::connection().await;

    let ids = [910_301];
    let dir = support::fixture(&[(910_301, vec![player("p910301-a", "Able", Some("Baker"))])]);
    let ctx = support::context(dir.path());

    let options = RunOptions {
        selection: TableSelection::OnlyMatchHistory,
        ..Default::default()
    };
    let summary = run(&mut conn, &ctx, &Shutdown::new(), options).await.unwrap();

    assert_eq!(vec![Table::MatchHistory], summary.tables.iter().map(|t| t.table).collect::<Vec<_>>());
    assert_eq!(None, summary.player_counts_updated);
    assert_eq!(1, support::count_rows(&mut conn, Table::MatchHistory, &ids).await);
    assert_eq!(0, support::count_rows(&mut conn, Table::PlayerMatchStats, &ids).await);
}

#[tokio::test]
#[ignore = "needs TEST_DATABASE_URL"]
async fn missing_sources_abort_before_writing() {
    let mut conn = support::connection().await;

    let dir = tempfile::tempdir().unwrap();
    let ctx = support::context(dir.path());

    let result = run(&mut conn, &ctx, &Shutdown::new(), RunOptions::default()).await;
    assert!(matches!(result, Err(ingest::Error::Transform(_))), "{:?}", result);
}

#[tokio::test]
#[ignore = "needs TEST_DATABASE_URL"]
async fn skips_payloads_of_ingested_matches() {
    let mut conn = support::connection().await;

    let dir = support::fixture(&[(910_401, vec![player("p910401-a", "Able", None)])]);
    let ctx = support::context(dir.path());
    run(&mut conn, &ctx, &Shutdown::new(), RunOptions::default())
        .await
        .unwrap();

    support::write_sources(
        dir.path(),
        &[
            (910_401, vec![player("p910401-a", "Able", None)]),
            (910_402, vec![player("p910402-a", "Baker", None)]),
        ],
    );

    let options = RunOptions {
        skip_ingested_matches: true,
        ..Default::default()
    };
    let summary = run(&mut conn, &ctx, &Shutdown::new(), options).await.unwrap();

    assert_eq!(1, summary.player_transform.skipped_existing);
    assert_eq!(1, summary.player_transform.processed);
    assert_eq!(
        Some(clean(1)),
        summary.outcome(Table::PlayerMatchStats)
    );
}

#[tokio::test]
#[ignore = "needs TEST_DATABASE_URL"]
async fn weapon_tables_are_skipped_without_registry() {
    let mut conn = support::connection().await;

    let ids = [910_501];
    let dir = support::fixture(&[(910_501, vec![player("p910501-a", "Able", Some("Baker"))])]);
    let ctx = ingest::Context {
        config: support::config(dir.path()),
        weapons: None,
    };

    let summary = run(&mut conn, &ctx, &Shutdown::new(), RunOptions::default())
        .await
        .unwrap();

    assert_eq!(None, summary.outcome(Table::PlayerKillStats));
    assert_eq!(None, summary.outcome(Table::PlayerDeathStats));
    assert_eq!(1, support::count_rows(&mut conn, Table::PlayerMatchStats, &ids).await);
    assert_eq!(0, support::count_rows(&mut conn, Table::PlayerKillStats, &ids).await);
    assert_eq!(1, support::count_rows(&mut conn, Table::PlayerVictim, &ids).await);
}

#[tokio::test]
#[ignore = "needs TEST_DATABASE_URL"]
async fn backfill_fixes_stale_counts() {
    let mut conn = support::connection().await;

    let ids = [910_601, 910_602];
    let dir = support::fixture(&[
        (
            910_601,
            vec![
                player("p910601-a", "Able", None),
                player("p910601-b", "Baker", None),
            ],
        ),
        (910_602, vec![player("p910602-a", "Charlie", None)]),
    ]);
    let ctx = support::context(dir.path());
    run(&mut conn, &ctx, &Shutdown::new(), RunOptions::default())
        .await
        .unwrap();

    support::execute(
        &mut conn,
        "UPDATE pathfinder_stats.match_history SET player_count = 7 WHERE match_id = 910601",
    )
    .await;
    support::execute(
        &mut conn,
        "UPDATE pathfinder_stats.match_history SET player_count = NULL WHERE match_id = 910602",
    )
    .await;

    assert_eq!(2, backfill_player_counts(&mut conn).await.unwrap());
    assert_eq!(0, backfill_player_counts(&mut conn).await.unwrap());

    let counts = stored_matches(&mut conn, &ids)
        .await
        .into_iter()
        .map(|m| (m.match_id, m.player_count))
        .collect::<Vec<_>>();
    assert_eq!(vec![(910_601, Some(2)), (910_602, Some(1))], counts);
}

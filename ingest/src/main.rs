use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;

use common::{CheckMode, IntegrityReport, RepairSummary};
use ingest::orchestrator::{RunOptions, RunSummary, TableSelection};
use ingest::{Config, Context, Shutdown};

#[derive(Parser, Debug)]
#[command(
    name = "pathfinder-ingest",
    version,
    about = "Load scoreboard dumps into the pathfinder_stats schema and check what got there"
)]
struct Cli {
    #[command(flatten)]
    config: Config,

    /// Include debug output in the logs
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transform the source files and insert them
    Ingest(IngestArgs),
    /// Look for partly ingested matches and optionally remove them
    Validate(ValidateArgs),
    /// Apply pending migrations and add missing weapon columns
    Migrate,
}

#[derive(Args, Debug)]
struct IngestArgs {
    /// Fail a batch on duplicate keys instead of skipping them
    #[arg(long)]
    no_skip_duplicates: bool,
    /// Only write match_history
    #[arg(long)]
    only_match_history: bool,
    /// Only write the player tables
    #[arg(long)]
    only_player_stats: bool,
    /// Skip payload files whose match already has player stats
    #[arg(long)]
    skip_ingested_matches: bool,
}

impl IngestArgs {
    fn run_options(&self) -> RunOptions {
        // Both flags together mean everything.
        let selection = match (self.only_match_history, self.only_player_stats) {
            (true, false) => TableSelection::OnlyMatchHistory,
            (false, true) => TableSelection::OnlyPlayerStats,
            _ => TableSelection::All,
        };

        RunOptions {
            skip_duplicates: !self.no_skip_duplicates,
            selection,
            skip_ingested_matches: self.skip_ingested_matches,
        }
    }
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// List every issue, not only the summary
    #[arg(short, long)]
    verbose: bool,
    /// Report every player missing victim or nemesis rows
    #[arg(long)]
    thorough: bool,
    /// Rows per page for the thorough checks
    #[arg(long, default_value_t = ingest::integrity::DEFAULT_PAGE_SIZE)]
    page_size: usize,
    /// Delete every match with an issue so it can be ingested again
    #[arg(long)]
    repair: bool,
    /// Only count what --repair or --delete-matches would delete
    #[arg(long)]
    dry_run: bool,
    /// Delete these matches instead of the detected ones
    #[arg(long, num_args = 1.., value_name = "MATCH_ID")]
    delete_matches: Vec<i64>,
    /// Only bring match_history.player_count up to date
    #[arg(long)]
    fix_player_counts: bool,
    /// Do not ask before deleting
    #[arg(short, long)]
    yes: bool,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let max_level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let registry = tracing_subscriber::Registry::default()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::filter::filter_fn(move |meta| {
            *meta.level() <= max_level
                && (meta.target().contains("ingest")
                    || meta.target().contains("transform")
                    || meta.target().contains("pathfinder"))
        }));
    tracing::subscriber::set_global_default(registry)
        .context("installing the tracing subscriber")?;

    if let Err(e) = cli.config.validate() {
        tracing::error!("{}", e);
        return Ok(ExitCode::from(2));
    }

    match cli.command {
        Command::Ingest(args) => ingest_command(cli.config, args).await,
        Command::Validate(args) => validate_command(cli.config, args).await,
        Command::Migrate => migrate_command(cli.config).await,
    }
}

async fn connect(config: &Config) -> anyhow::Result<diesel_async::AsyncPgConnection> {
    let url = config.database_url()?;
    let conn = ingest::db_connection(&url).await?;
    Ok(conn)
}

async fn migrate_command(config: Config) -> anyhow::Result<ExitCode> {
    let ctx = Context::load(config);
    let registry = ctx.require_weapons()?;

    let mut conn = connect(&ctx.config).await?;

    tracing::info!("Applying Migrations");
    ingest::run_migrations(&mut conn).await?;
    let added = ingest::writer::sync_weapon_columns(&mut conn, registry)
        .await
        .context("adding weapon columns")?;
    tracing::info!("Completed Migrations ({} weapon columns added)", added);

    Ok(ExitCode::SUCCESS)
}

async fn ingest_command(config: Config, args: IngestArgs) -> anyhow::Result<ExitCode> {
    let ctx = Context::load(config);
    let options = args.run_options();

    let mut conn = connect(&ctx.config).await?;

    tracing::info!("Applying Migrations");
    ingest::run_migrations(&mut conn).await?;
    if let Some(registry) = ctx.weapons.as_ref() {
        ingest::writer::sync_weapon_columns(&mut conn, registry)
            .await
            .context("adding weapon columns")?;
    }

    let shutdown = Shutdown::listen();
    let summary = ingest::orchestrator::run(&mut conn, &ctx, &shutdown, options).await?;
    log_run_summary(&summary);

    Ok(ExitCode::SUCCESS)
}

fn log_run_summary(summary: &RunSummary) {
    for table in &summary.tables {
        tracing::info!(
            "{}: {} inserted, {} skipped, {} failed in {} batches",
            table.table,
            table.outcome.inserted,
            table.outcome.skipped,
            table.outcome.failed,
            table.outcome.failed_batches
        );
    }

    if let Some(updated) = summary.player_counts_updated {
        tracing::info!("Player counts updated for {} matches", updated);
    }

    let failed_batches = summary.failed_batches();
    if failed_batches > 0 {
        tracing::warn!(
            "{} batches failed, run `validate` to find incomplete matches",
            failed_batches
        );
    }

    if summary.interrupted {
        tracing::warn!("Run was interrupted, remaining files were not processed");
    } else {
        tracing::info!("Ingestion complete");
    }
}

async fn validate_command(config: Config, args: ValidateArgs) -> anyhow::Result<ExitCode> {
    let mut conn = connect(&config).await?;

    if args.fix_player_counts {
        let updated = ingest::orchestrator::backfill_player_counts(&mut conn)
            .await
            .context("updating player counts")?;
        println!("Updated player_count for {} matches", updated);
        return Ok(ExitCode::SUCCESS);
    }

    let mode = if args.thorough {
        CheckMode::Thorough
    } else {
        CheckMode::Standard
    };
    let report = ingest::integrity::check_all(&mut conn, mode, args.page_size)
        .await
        .context("running integrity checks")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, args.verbose);
    }

    let targets: Vec<i64> = if !args.delete_matches.is_empty() {
        args.delete_matches.clone()
    } else if args.repair {
        report.affected_match_ids.iter().copied().collect()
    } else {
        Vec::new()
    };

    if !targets.is_empty() {
        eprintln!("Matches to delete: {:?}", targets);

        if !args.dry_run && !args.yes {
            let question = format!(
                "Delete all data for {} matches to allow re-ingestion? (yes/no): ",
                targets.len()
            );
            if !confirm(&question).await? {
                eprintln!("Deletion cancelled.");
                return Ok(exit_code(&report, &args));
            }
        }

        let summary = ingest::repair::repair(&mut conn, &targets, args.dry_run)
            .await
            .context("deleting match data")?;
        print_repair(&summary);
    }

    Ok(exit_code(&report, &args))
}

fn exit_code(report: &IntegrityReport, args: &ValidateArgs) -> ExitCode {
    if report.has_issues() && !args.repair && args.delete_matches.is_empty() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn confirm(question: &str) -> anyhow::Result<bool> {
    eprint!("{}", question);

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let answer = lines.next_line().await.context("reading confirmation")?;

    Ok(answer
        .map(|a| a.trim().eq_ignore_ascii_case("yes"))
        .unwrap_or(false))
}

fn print_report(report: &IntegrityReport, verbose: bool) {
    if !report.has_issues() {
        println!("No data integrity issues found.");
        return;
    }

    println!(
        "Found {} issues across {} matches:",
        report.total_issues(),
        report.affected_match_ids.len()
    );
    for (kind, count) in report.counts.iter().filter(|(_, c)| **c > 0) {
        println!("  {}: {}", kind, count);
    }
    println!(
        "Affected match IDs: {:?}",
        report.affected_match_ids.iter().collect::<Vec<_>>()
    );

    if !verbose {
        return;
    }

    for issue in &report.issues {
        println!();
        println!("  [{}]", issue.kind);
        println!("    {}", issue.description);
        match issue.player_ids.len() {
            0 => {}
            n if n <= 10 => println!("    Players: {:?}", issue.player_ids),
            n => println!(
                "    Players: {:?} ... and {} more",
                &issue.player_ids[..5],
                n - 5
            ),
        }
    }
}

fn print_repair(summary: &RepairSummary) {
    let verb = if summary.dry_run {
        "Would delete"
    } else {
        "Deleted"
    };

    for table in summary.tables.iter().filter(|t| t.rows > 0) {
        println!("  {} {} rows from {}", verb, table.rows, table.table);
    }
    println!(
        "{} {} rows for {} matches",
        verb, summary.total, summary.match_count
    );

    if !summary.dry_run {
        println!("Run `pathfinder-ingest ingest` to load these matches again.");
    }
}

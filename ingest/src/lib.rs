//! Batched ingestion of match statistics into the `pathfinder_stats` schema,
//! plus the integrity checks and repairs that go with it.

pub mod config;
pub mod integrity;
pub mod models;
pub mod orchestrator;
pub mod probe;
pub mod repair;
pub mod schema;
pub mod shutdown;
pub mod writer;

pub use config::{Config, Context};
pub use shutdown::Shutdown;

/// Upper bound on the keys bound into one probe or delete statement.
pub const PROBE_CHUNK_SIZE: usize = 10_000;

pub const MIGRATIONS: diesel_async_migrations::EmbeddedMigrations =
    diesel_async_migrations::embed_migrations!("../migrations/");

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration: {0}")]
    Config(String),
    #[error("connecting to the database: {0}")]
    Connection(#[from] diesel::ConnectionError),
    #[error("query failed: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("applying migrations: {0}")]
    Migration(String),
    #[error(transparent)]
    Transform(#[from] transform::Error),
}

pub async fn db_connection(database_url: &str) -> Result<diesel_async::AsyncPgConnection, Error> {
    use diesel_async::AsyncConnection;

    diesel_async::AsyncPgConnection::establish(database_url)
        .await
        .map_err(|e| {
            tracing::error!("Error connecting to the database: {:?}", e);
            Error::Connection(e)
        })
}

#[tracing::instrument(skip(connection))]
pub async fn run_migrations(connection: &mut diesel_async::AsyncPgConnection) -> Result<(), Error> {
    MIGRATIONS
        .run_pending_migrations(connection)
        .await
        .map_err(|e| Error::Migration(e.to_string()))
}

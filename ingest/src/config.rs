use std::path::PathBuf;

use transform::WeaponRegistry;

use crate::Error;

/// Connection and source settings. Every flag falls back to its environment variable.
#[derive(Debug, Clone, clap::Args)]
pub struct Config {
    /// Full connection string. Takes precedence over the POSTGRES_* parts.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,
    #[arg(long, env = "POSTGRES_HOST")]
    pub postgres_host: Option<String>,
    #[arg(long, env = "POSTGRES_PORT", default_value_t = 5432)]
    pub postgres_port: u16,
    #[arg(long, env = "POSTGRES_DB")]
    pub postgres_db: Option<String>,
    #[arg(long, env = "POSTGRES_USER")]
    pub postgres_user: Option<String>,
    #[arg(long, env = "POSTGRES_PASSWORD", hide_env_values = true)]
    pub postgres_password: Option<String>,

    #[arg(long, env = "MATCH_HISTORY_BATCH_SIZE", default_value_t = 50)]
    pub match_history_batch_size: usize,
    #[arg(long, env = "PLAYER_STATS_BATCH_SIZE", default_value_t = 50)]
    pub player_stats_batch_size: usize,

    /// Directory holding `all_matches.json` and `match_results/`.
    #[arg(long, env = "API_INGESTION_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,
    #[arg(long, env = "WEAPON_SCHEMAS_PATH", default_value = "data/weapon_schemas.csv")]
    pub weapon_schemas_path: PathBuf,
}

impl Config {
    /// `DATABASE_URL`, or one assembled from the POSTGRES_* settings.
    pub fn database_url(&self) -> Result<String, Error> {
        if let Some(url) = self.database_url.as_deref().filter(|u| !u.is_empty()) {
            return Ok(url.to_owned());
        }

        let missing = [
            ("POSTGRES_HOST", &self.postgres_host),
            ("POSTGRES_DB", &self.postgres_db),
            ("POSTGRES_USER", &self.postgres_user),
            ("POSTGRES_PASSWORD", &self.postgres_password),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map(str::is_empty).unwrap_or(true))
        .map(|(name, _)| name)
        .collect::<Vec<_>>();

        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "DATABASE_URL is not set and {} missing",
                missing.join(", ")
            )));
        }

        let part = |value: &Option<String>| value.as_deref().unwrap_or_default().to_owned();
        let invalid = |what: &str| Error::Config(format!("POSTGRES_{} is not usable in a URL", what));

        let mut url = url::Url::parse("postgres://localhost")
            .map_err(|e| Error::Config(format!("base URL: {}", e)))?;
        url.set_username(&part(&self.postgres_user))
            .map_err(|_| invalid("USER"))?;
        url.set_password(Some(&part(&self.postgres_password)))
            .map_err(|_| invalid("PASSWORD"))?;

        let host = part(&self.postgres_host);
        let host = host.trim().trim_matches(|c| c == '[' || c == ']');
        let set = if host.contains(':') {
            url.set_host(Some(&format!("[{}]", host)))
        } else {
            url.set_host(Some(host))
        };
        set.map_err(|e| Error::Config(format!("POSTGRES_HOST {:?}: {}", host, e)))?;

        url.set_port(Some(self.postgres_port))
            .map_err(|_| invalid("PORT"))?;
        url.set_path(&format!("/{}", part(&self.postgres_db)));

        Ok(url.to_string())
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.match_history_batch_size == 0 {
            return Err(Error::Config(
                "MATCH_HISTORY_BATCH_SIZE must be at least 1".to_owned(),
            ));
        }
        if self.player_stats_batch_size == 0 {
            return Err(Error::Config(
                "PLAYER_STATS_BATCH_SIZE must be at least 1".to_owned(),
            ));
        }

        self.database_url().map(|_| ())
    }

    pub fn listing_path(&self) -> PathBuf {
        self.data_dir.join("all_matches.json")
    }

    pub fn match_results_dir(&self) -> PathBuf {
        self.data_dir.join("match_results")
    }
}

/// Everything a run needs besides the connection. Built once in `main`.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
    /// `None` when the weapon schema could not be loaded. Weapon tables are skipped then.
    pub weapons: Option<WeaponRegistry>,
}

impl Context {
    /// Loads the weapon registry. A missing or broken schema only disables the weapon tables.
    pub fn load(config: Config) -> Self {
        let weapons = match WeaponRegistry::from_path(&config.weapon_schemas_path) {
            Ok(registry) if registry.is_empty() => {
                tracing::warn!(
                    "Weapon schema {} has no categories, kill and death stats are disabled",
                    config.weapon_schemas_path.display()
                );
                None
            }
            Ok(registry) => Some(registry),
            Err(e) => {
                tracing::warn!(
                    "Could not load weapon schema, kill and death stats are disabled: {}",
                    e
                );
                None
            }
        };

        Self { config, weapons }
    }

    pub fn with_weapons(config: Config, weapons: WeaponRegistry) -> Self {
        Self {
            config,
            weapons: Some(weapons),
        }
    }

    pub fn require_weapons(&self) -> Result<&WeaponRegistry, Error> {
        self.weapons.as_ref().ok_or_else(|| {
            Error::Config(format!(
                "weapon schema {} could not be loaded",
                self.config.weapon_schemas_path.display()
            ))
        })
    }
}

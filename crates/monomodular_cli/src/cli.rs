use clap::{Parser, Subcommand};
use monomodular_core::config::{DATABASE_ENV, LOG_DIR_ENV, LOG_LEVEL_ENV};
use monomodular_core::{AppConfig, ConfigError, EnvironmentId};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Manage MonoModular environment records",
    long_about = "Reads and writes environment records through the generic entity repository. \
                  Every command runs in its own unit of work and commits before exiting."
)]
pub struct Cli {
    #[arg(
        long,
        env = DATABASE_ENV,
        value_name = "PATH",
        help = "SQLite database file; `:memory:` or unset uses a throwaway in-memory store"
    )]
    pub db: Option<String>,

    #[arg(
        long,
        env = LOG_LEVEL_ENV,
        value_name = "LEVEL",
        help = "Log level: trace|debug|info|warn|error"
    )]
    pub log_level: Option<String>,

    #[arg(
        long,
        env = LOG_DIR_ENV,
        value_name = "DIR",
        help = "Absolute directory for rolling log files; logging is off when unset"
    )]
    pub log_dir: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Resolves configuration from flags, which already fall back to env vars.
    pub fn app_config(&self) -> Result<AppConfig, ConfigError> {
        AppConfig::from_lookup(|name| match name {
            DATABASE_ENV => self.db.clone(),
            LOG_LEVEL_ENV => self.log_level.clone(),
            LOG_DIR_ENV => self.log_dir.clone(),
            _ => None,
        })
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    #[command(about = "Environment record commands")]
    Env {
        #[command(subcommand)]
        cmd: EnvCmd,
    },
    #[command(about = "Print the service registration table")]
    Services,
}

#[derive(Subcommand, Debug, Clone)]
pub enum EnvCmd {
    #[command(about = "Insert or update a record")]
    Set {
        id: EnvironmentId,
        key: String,
        #[arg(help = "JSON value; text that is not valid JSON is stored as a string")]
        value: Option<String>,
    },
    #[command(about = "Show one record by id")]
    Get { id: EnvironmentId },
    #[command(about = "Show one record by key")]
    Find { key: String },
    #[command(about = "List all records")]
    List,
    #[command(about = "Remove a record by id; missing ids are ignored")]
    Remove { id: EnvironmentId },
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, EnvCmd};
    use clap::Parser;
    use monomodular_core::DatabaseTarget;
    use std::path::PathBuf;

    #[test]
    fn parses_env_set_with_value() {
        let cli = Cli::try_parse_from([
            "monomodular",
            "--db",
            "/tmp/app.sqlite3",
            "env",
            "set",
            "7",
            "region",
            "\"eu\"",
        ])
        .unwrap();

        match cli.command {
            Command::Env {
                cmd: EnvCmd::Set { id, ref key, ref value },
            } => {
                assert_eq!(id, 7);
                assert_eq!(key, "region");
                assert_eq!(value.as_deref(), Some("\"eu\""));
            }
            ref other => panic!("unexpected command: {other:?}"),
        }

        let config = cli.app_config().unwrap();
        assert_eq!(
            config.database,
            DatabaseTarget::File(PathBuf::from("/tmp/app.sqlite3"))
        );
    }

    #[test]
    fn rejects_invalid_log_level() {
        let cli =
            Cli::try_parse_from(["monomodular", "--log-level", "chatty", "services"]).unwrap();
        assert!(cli.app_config().is_err());
    }
}

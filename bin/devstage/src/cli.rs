use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

/// Output format of the `inspect` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser)]
#[command(name = "devstage")]
#[command(
    author,
    version,
    about = "Deploy contracts to a local ledger and execution cluster"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "DEVSTAGE_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to a DevStage.toml configuration file, or to the directory holding it.
    ///
    /// Defaults to the current directory. Values can be overridden with `DEVSTAGE_*`
    /// environment variables, using `__` to separate nested keys.
    #[arg(long, alias = "conf", env = "DEVSTAGE_CONFIG", default_value = ".")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write a default configuration file.
    Init {
        /// Overwrite an existing configuration file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// List the development accounts and their account ids.
    Accounts,

    /// List the configured networks and their endpoints.
    Networks,

    /// Show the code hash, kind and entry points of a contract artifact.
    Inspect {
        /// Path to the contract artifact (JSON).
        artifact: PathBuf,

        /// Output format.
        #[arg(long, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Render an instantiation salt literal.
    ///
    /// Without a value, a random salt is drawn.
    Salt {
        #[arg(long)]
        value: Option<u64>,
    },
}

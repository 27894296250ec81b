//! devstage is a CLI tool to prepare contract deployments on a local development stack.

mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::Table;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use cli::{Cli, Command, OutputFormat};
use devstage_deploy::{CONFIG_FILENAME, ContractArtifact, DevStageConfig, Keyring, Salt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match cli.command {
        Command::Init { force } => init(&cli.config, force),
        Command::Accounts => {
            let config = load_config(&cli.config)?;
            println!("{}", accounts_table(&config)?);
            Ok(())
        }
        Command::Networks => {
            let config = load_config(&cli.config)?;
            println!("{}", networks_table(&config));
            Ok(())
        }
        Command::Inspect { artifact, format } => inspect(&artifact, format),
        Command::Salt { value } => {
            let salt = value.map(Salt::from).unwrap_or_else(Salt::random);
            println!("{}", salt.to_literal());
            Ok(())
        }
    }
}

/// Path of the configuration file designated by `path`.
fn config_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(CONFIG_FILENAME)
    } else {
        path.to_path_buf()
    }
}

/// Layer the configuration file (if any) and `DEVSTAGE_*` variables over the defaults.
fn load_config(path: &Path) -> Result<DevStageConfig> {
    let file = config_file(path);
    if !file.exists() {
        tracing::debug!(path = %file.display(), "No configuration file, using defaults");
    }

    let config: DevStageConfig = Figment::from(Serialized::defaults(DevStageConfig::default()))
        .merge(Toml::file(&file))
        .merge(
            Env::prefixed("DEVSTAGE_")
                .ignore(&["VERBOSITY", "CONFIG"])
                .split("__"),
        )
        .extract()
        .with_context(|| format!("Failed to load configuration from {}", file.display()))?;

    tracing::debug!(
        path = %file.display(),
        block_time_ms = config.block_time_ms,
        networks = config.networks.len(),
        "Configuration resolved"
    );

    Ok(config)
}

fn init(path: &Path, force: bool) -> Result<()> {
    let file = config_file(path);
    if file.exists() && !force {
        anyhow::bail!(
            "Configuration already exists at {} (use --force to overwrite)",
            file.display()
        );
    }

    DevStageConfig::default().save_to_file(&file)
}

fn accounts_table(config: &DevStageConfig) -> Result<Table> {
    let keyring = Keyring::from_config(&config.accounts)?;

    let mut table = Table::new();
    table.set_header(vec!["Name", "Dev URI", "Account ID", "Default"]);
    for (name, signer) in keyring.iter() {
        let uri = config
            .accounts
            .keyrings
            .get(name)
            .map(String::as_str)
            .unwrap_or_default();
        let is_default = name == keyring.default_account();
        table.add_row(vec![
            name.to_string(),
            uri.to_string(),
            signer.account_id().to_string(),
            if is_default { "*".to_string() } else { String::new() },
        ]);
    }

    Ok(table)
}

fn networks_table(config: &DevStageConfig) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Network", "Node URL", "Worker URL"]);
    for (name, network) in &config.networks {
        table.add_row(vec![
            name.clone(),
            network.node_url.to_string(),
            network.worker_url.to_string(),
        ]);
    }
    table
}

fn inspect(path: &Path, format: OutputFormat) -> Result<()> {
    let artifact = ContractArtifact::load(path)?;

    match format {
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "codeHash": artifact.code_hash(),
                "kind": artifact.kind(),
                "codeType": artifact.kind().code_type().map(|t| t.to_string()),
                "size": artifact.source.wasm.len(),
                "constructors": artifact.spec.constructors,
                "messages": artifact.spec.messages,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_header(vec!["Field", "Value"]);
            table.add_row(vec!["Code hash".to_string(), artifact.code_hash().to_string()]);
            table.add_row(vec!["Kind".to_string(), artifact.kind().to_string()]);
            table.add_row(vec![
                "Code type".to_string(),
                artifact
                    .kind()
                    .code_type()
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "unsupported".to_string()),
            ]);
            table.add_row(vec![
                "Size".to_string(),
                format!("{} bytes", artifact.source.wasm.len()),
            ]);
            for constructor in &artifact.spec.constructors {
                table.add_row(vec![
                    format!("Constructor {}", constructor.label),
                    constructor.selector.clone(),
                ]);
            }
            for message in &artifact.spec.messages {
                table.add_row(vec![format!("Message {}", message.label), message.selector.clone()]);
            }
            println!("{}", table);
        }
    }

    Ok(())
}

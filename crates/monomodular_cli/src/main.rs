//! Command-line host for the MonoModular data-access core.
//!
//! # Responsibility
//! - Load configuration (`.env`, environment, flags) and bootstrap modules.
//! - Run each command inside one storage scope and dispose it afterwards.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, EnvCmd};
use log::info;
use monomodular_core::{
    core_version, init_from_config, AppHost, EnvironmentRecord, EnvironmentService,
    SqliteEntityRepository, StorageContext,
};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = cli.app_config().context("invalid configuration")?;
    init_from_config(&config).context("failed to initialize logging")?;
    let host = AppHost::build(config).context("failed to bootstrap modules")?;
    info!(
        "event=cli_start module=cli status=ok core_version={} services={}",
        core_version(),
        host.services().len()
    );

    match cli.command {
        Command::Services => print_services(&host),
        Command::Env { cmd } => run_env(&host, cmd),
    }
}

fn print_services(host: &AppHost) -> Result<()> {
    for descriptor in host.services().descriptors() {
        println!(
            "{:<10} {:<52} -> {} ({})",
            descriptor.lifetime.as_str(),
            descriptor.service,
            descriptor.implementation,
            descriptor.module
        );
    }
    Ok(())
}

fn run_env(host: &AppHost, cmd: EnvCmd) -> Result<()> {
    let ctx = host.begin_scope().context("failed to open storage scope")?;
    let result = run_env_in_scope(&ctx, cmd);
    let disposed = ctx.dispose().context("failed to close storage scope");
    result.and(disposed)
}

fn run_env_in_scope(ctx: &StorageContext, cmd: EnvCmd) -> Result<()> {
    let service = EnvironmentService::new(SqliteEntityRepository::new(ctx));
    match cmd {
        EnvCmd::Set { id, key, value } => {
            let record = service.set_variable(id, key, value.as_deref().map(parse_value))?;
            print_record(&record)?;
        }
        EnvCmd::Get { id } => match service.get_variable(id)? {
            Some(record) => print_record(&record)?,
            None => println!("environment {id} not found"),
        },
        EnvCmd::Find { key } => match service.find_by_key(&key)? {
            Some(record) => print_record(&record)?,
            None => println!("environment `{key}` not found"),
        },
        EnvCmd::List => {
            let records = service.list_variables()?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        EnvCmd::Remove { id } => {
            if service.remove_variable(id)? {
                println!("environment {id} removed");
            } else {
                println!("environment {id} not found; nothing removed");
            }
        }
    }
    Ok(())
}

fn parse_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

fn print_record(record: &EnvironmentRecord) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}

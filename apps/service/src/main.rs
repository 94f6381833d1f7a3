use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use healthbeat_service::config::Config;
use healthbeat_service::database::{Database, initialize_database, open_database};
use healthbeat_service::orchestrator::CheckOrchestrator;
use healthbeat_service::pool::open_pool;
use healthbeat_service::validation::validate_new_monitor;

#[derive(Parser, Debug)]
#[command(author, version, about = "HTTP health checks with transition-based alerting")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one check cycle and print its summary as JSON
    Run,
    /// Create or upgrade the database schema
    Migrate,
    /// Register a monitor
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
        /// Check interval in minutes
        #[arg(long, default_value_t = 5)]
        interval: u32,
    },
    /// List monitors in registration order
    Monitors,
    /// Delete a monitor together with its metrics and alerts
    Delete { id: i64 },
    /// Show a monitor's most recent samples, newest first
    Metrics {
        #[arg(long)]
        monitor: i64,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// List alerts, newest first
    Alerts {
        #[arg(long)]
        monitor: Option<i64>,
    },
    /// Acknowledge an active alert
    Acknowledge { id: i64 },
}

#[tokio::main]
async fn main() -> ExitCode {
    logger::init_tracing();
    let cli = Cli::parse();

    match execute(cli).await {
        Ok(code) => code,
        Err(error) => {
            error!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<ExitCode> {
    let config = Config::from_config(cli.config.as_ref())?;

    if let Command::Migrate = cli.command {
        return migrate(&config).await;
    }

    let database = open_database(&config.database)
        .await
        .with_context(|| format!("opening {}", config.database.path.display()))?;

    match cli.command {
        Command::Run => {
            let orchestrator = CheckOrchestrator::from_config(database, &config.checks)
                .context("building HTTP client")?;

            match orchestrator.run_cycle().await {
                Ok(summary) => {
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(error) => {
                    error!(%error, "Check cycle aborted");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Migrate => migrate(&config).await,
        Command::Register { name, url, interval } => {
            let new_monitor = validate_new_monitor(&name, &url, interval)?;
            let monitor = database.register_monitor(&new_monitor).await?;
            info!(monitor_id = monitor.id, name = %monitor.name, "Monitor registered");
            println!("{}", serde_json::to_string_pretty(&monitor)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Monitors => {
            let monitors = database.list_monitors().await?;
            println!("{}", serde_json::to_string_pretty(&monitors)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Delete { id } => {
            if !database.delete_monitor(id).await? {
                bail!("monitor {id} not found");
            }
            info!(monitor_id = id, "Monitor deleted");
            Ok(ExitCode::SUCCESS)
        }
        Command::Metrics { monitor, limit } => {
            if database.get_monitor(monitor).await?.is_none() {
                bail!("monitor {monitor} not found");
            }
            let metrics = database.recent_metrics(monitor, limit).await?;
            println!("{}", serde_json::to_string_pretty(&metrics)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Alerts { monitor } => {
            let alerts = database.list_alerts(monitor).await?;
            println!("{}", serde_json::to_string_pretty(&alerts)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Acknowledge { id } => {
            let alert = database.acknowledge_alert(id).await?;
            info!(alert_id = alert.id, monitor_id = alert.monitor_id, "Alert acknowledged");
            println!("{}", serde_json::to_string_pretty(&alert)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn migrate(config: &Config) -> Result<ExitCode> {
    let pool = open_pool(&config.database.path, 1)
        .await
        .with_context(|| format!("opening {}", config.database.path.display()))?;
    let conn = pool.get().await.context("acquiring a connection")?;

    let report = initialize_database(&conn).await.context("running migrations")?;
    if report.applied_any() {
        info!(from = report.from_version, to = report.to_version, "Database schema migrated");
    }
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_operator_subcommands_parse() {
        let cli = Cli::try_parse_from(["healthbeat-service", "metrics", "--monitor", "7"]).unwrap();
        assert!(matches!(cli.command, Command::Metrics { monitor: 7, limit: 20 }));

        let cli = Cli::try_parse_from(["healthbeat-service", "delete", "3", "--config", "hb.toml"]).unwrap();
        assert!(matches!(cli.command, Command::Delete { id: 3 }));
        assert_eq!(cli.config, Some(PathBuf::from("hb.toml")));

        let cli = Cli::try_parse_from(["healthbeat-service", "monitors"]).unwrap();
        assert!(matches!(cli.command, Command::Monitors));

        assert!(Cli::try_parse_from(["healthbeat-service", "metrics"]).is_err());
    }
}

//! `automation-runner` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate`: check an automation definition JSON file.
//! - `simulate`: run an automation end to end against the simulated browser.
//! - `show-run`: print a persisted run record.
//! - `migrate`: run pending database migrations.

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use actions::mock::{MockDriver, MockDriverProvider};
use actions::{ActionRegistry, LocalStorage};
use db::{DbConfig, DbPool};
use engine::{
    validate_automation, Automation, AutomationRun, AutomationRunner, MemoryRunStore, PgRunStore,
    RunStore, TracingNotifier,
};

use crate::config::Config;

#[derive(Parser)]
#[command(
    name = "automation-runner",
    about = "Browser-automation execution engine",
    version
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(
        long,
        global = true,
        env = "AUTOMATION_RUNNER_CONFIG",
        default_value = "automation-runner.toml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate an automation definition JSON file.
    Validate {
        /// Path to the automation JSON file.
        path: PathBuf,
    },
    /// Run an automation against the simulated browser and print the run record.
    Simulate {
        /// Path to the automation JSON file.
        path: PathBuf,
        /// Override the multi-run count.
        #[arg(long)]
        loops: Option<usize>,
        /// Run the loop indices concurrently.
        #[arg(long)]
        parallel: bool,
        /// Persist the run to Postgres instead of memory.
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
    },
    /// Print a run record stored in Postgres.
    ShowRun {
        run_id: Uuid,
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
    },
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    match cli.command {
        Command::Validate { path } => {
            let automation = read_automation(&path)?;
            match validate_automation(&automation, &ActionRegistry::with_builtins()) {
                Ok(()) => {
                    let actions: usize = automation.steps.iter().map(|s| s.actions.len()).sum();
                    println!(
                        "✅ Automation '{}' is valid: {} step(s), {actions} top-level action(s).",
                        automation.name,
                        automation.steps.len()
                    );
                }
                Err(e) => {
                    eprintln!("❌ Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Simulate {
            path,
            loops,
            parallel,
            database_url,
        } => {
            let mut automation = read_automation(&path)?;
            override_multirun(&mut automation, loops, parallel)?;
            validate_automation(&automation, &ActionRegistry::with_builtins())
                .context("automation is invalid")?;

            let database_url = database_url.or_else(|| config.database_url().map(str::to_owned));
            let store: Arc<dyn RunStore> = match database_url {
                Some(url) => Arc::new(PgRunStore::new(connect(&config, &url).await?)),
                None => Arc::new(MemoryRunStore::new()),
            };

            let runner = AutomationRunner::new(
                Arc::new(ActionRegistry::with_builtins()),
                Arc::new(MockDriverProvider::new(MockDriver::new())),
                Arc::new(LocalStorage::new(config.storage.output_dir.clone())),
                store,
                Arc::new(TracingNotifier),
                config.runner_config(),
            );

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, cancelling run");
                    on_ctrl_c.cancel();
                }
            });

            let mut run = AutomationRun::new(automation.id);
            let result = runner.run_automation(&automation, &mut run, cancel).await;
            println!("{}", serde_json::to_string_pretty(&run)?);
            result.context("automation run did not complete")?;
        }
        Command::ShowRun {
            run_id,
            database_url,
        } => {
            let url = require_database_url(database_url, &config)?;
            let store = PgRunStore::new(connect(&config, &url).await?);
            let run = store.load_run(run_id).await?;
            println!("{}", serde_json::to_string_pretty(&run)?);
        }
        Command::Migrate { database_url } => {
            let url = require_database_url(database_url, &config)?;
            let pool = connect(&config, &url).await?;
            db::run_migrations(&pool).await.context("migration failed")?;
            info!("Migrations applied successfully");
        }
    }
    Ok(())
}

fn read_automation(path: &Path) -> anyhow::Result<Automation> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid automation JSON in {}", path.display()))
}

/// Apply `--loops` / `--parallel` on top of the automation's own config.
fn override_multirun(
    automation: &mut Automation,
    loops: Option<usize>,
    parallel: bool,
) -> anyhow::Result<()> {
    if loops.is_none() && !parallel {
        return Ok(());
    }
    let mut config: Value = match automation.config.as_deref().map(str::trim) {
        None | Some("") => json!({}),
        Some(raw) => serde_json::from_str(raw).context("automation config is not valid JSON")?,
    };
    let Some(root) = config.as_object_mut() else {
        bail!("automation config must be a JSON object");
    };
    let multirun = root.entry("multirun").or_insert_with(|| json!({}));
    let Some(multirun) = multirun.as_object_mut() else {
        bail!("automation config field 'multirun' must be an object");
    };
    if let Some(count) = loops {
        multirun.insert("enabled".into(), json!(true));
        multirun.insert("count".into(), json!(count));
    }
    if parallel {
        multirun.insert("mode".into(), json!("parallel"));
    }
    automation.config = Some(config.to_string());
    Ok(())
}

fn require_database_url(flag: Option<String>, config: &Config) -> anyhow::Result<String> {
    match flag.or_else(|| config.database_url().map(str::to_owned)) {
        Some(url) => Ok(url),
        None => bail!("no database configured: pass --database-url or set DATABASE_URL"),
    }
}

async fn connect(config: &Config, url: &str) -> anyhow::Result<DbPool> {
    let db_config = DbConfig {
        max_connections: config.database.max_connections,
        ..DbConfig::new(url)
    };
    db::create_pool(&db_config)
        .await
        .context("failed to connect to database")
}

#[cfg(test)]
mod tests {
    use super::*;
    use actions::config::{AutomationConfig, RunMode};

    fn parsed(automation: &Automation) -> AutomationConfig {
        AutomationConfig::parse(automation.config.as_deref()).unwrap()
    }

    #[test]
    fn loops_flag_enables_multirun() {
        let mut automation = Automation::new("cli", None, vec![]);
        override_multirun(&mut automation, Some(3), false).unwrap();
        let config = parsed(&automation);
        assert_eq!(config.run_count(), 3);
        assert_eq!(config.run_mode(), RunMode::Sequential);
    }

    #[test]
    fn parallel_flag_keeps_other_settings() {
        let mut automation = Automation::new(
            "cli",
            Some(r#"{"timeout": 60, "multirun": {"enabled": true, "count": 4, "delay": 100}}"#.into()),
            vec![],
        );
        override_multirun(&mut automation, None, true).unwrap();
        let config = parsed(&automation);
        assert_eq!(config.run_mode(), RunMode::Parallel);
        assert_eq!(config.run_count(), 4);
        assert_eq!(config.multirun.delay, 100);
        assert_eq!(config.timeout, 60);
    }

    #[test]
    fn no_flags_leave_config_untouched() {
        let mut automation = Automation::new("cli", Some("  ".into()), vec![]);
        override_multirun(&mut automation, None, false).unwrap();
        assert_eq!(automation.config.as_deref(), Some("  "));
    }

    #[test]
    fn non_object_config_is_rejected() {
        let mut automation = Automation::new("cli", Some("[1, 2]".into()), vec![]);
        assert!(override_multirun(&mut automation, Some(2), false).is_err());
    }
}

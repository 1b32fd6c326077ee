//! carectl - inspect the care action catalog and dispatch care actions.

mod commands;
mod output;

use anyhow::Result;
use care_config_and_utils::{init_logging, Config, ExecutionMode, Paths};
use clap::{Parser, Subcommand};
use commands::{DemoSeed, DispatchArgs};
use tracing::debug;

/// carectl - care session and emergency actions from the command line.
#[derive(Parser)]
#[command(name = "carectl")]
#[command(about = "Inspect valid care actions and dispatch them against the backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error). Defaults to the config value.
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the actions offered for a care and/or emergency state
    Actions {
        /// Care state wire name, e.g. IN_PROGRESS
        #[arg(long, required_unless_present = "emergency")]
        care: Option<String>,
        /// Emergency state wire name, e.g. ACTIVE
        #[arg(long, required_unless_present = "care")]
        emergency: Option<String>,
    },

    /// Show a resident's current care record
    Snapshot {
        /// Resident ID
        #[arg(short, long)]
        resident: String,
        #[command(flatten)]
        demo: DemoOptions,
    },

    /// Dispatch one action for a resident
    Dispatch {
        /// Action wire name, e.g. START_PREPARATION
        action: String,
        /// Resident ID
        #[arg(short, long)]
        resident: String,
        /// Acting caregiver ID
        #[arg(long, env = "CARELINK_ACTOR_ID")]
        actor: String,
        /// Agency ID (defaults to the configured agency)
        #[arg(long)]
        agency: Option<String>,
        #[command(flatten)]
        demo: DemoOptions,
    },
}

#[derive(clap::Args)]
struct DemoOptions {
    /// Run against an in-memory demo authority instead of the backend
    #[arg(long)]
    demo: bool,
    /// Demo starting care state
    #[arg(long, default_value = "NOT_STARTED")]
    care_state: String,
    /// Demo starting emergency state
    #[arg(long, default_value = "NONE")]
    emergency_state: String,
    /// Demo starting version for both lifecycles
    #[arg(long, default_value_t = 0)]
    start_version: u64,
}

impl DemoOptions {
    fn mode(&self, config: &Config) -> ExecutionMode {
        if self.demo {
            ExecutionMode::Demo
        } else {
            config.execution_mode
        }
    }

    fn seed(&self) -> Result<DemoSeed> {
        DemoSeed::parse(&self.care_state, &self.emergency_state, self.start_version)
    }
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Actions { care, emergency } => {
            commands::actions(care.as_deref(), emergency.as_deref(), &cli.format)
        }
        Commands::Snapshot { resident, demo } => match demo.mode(&config) {
            ExecutionMode::Demo => {
                let authority = commands::demo_authority(&resident, demo.seed()?).await;
                commands::snapshot(authority.as_ref(), &resident, &cli.format).await
            }
            ExecutionMode::Live => {
                let dispatcher = commands::live_dispatcher(&config)?;
                commands::snapshot(dispatcher.as_ref(), &resident, &cli.format).await
            }
        },
        Commands::Dispatch {
            action,
            resident,
            actor,
            agency,
            demo,
        } => {
            let mode = demo.mode(&config);
            let agency_id = commands::resolve_agency(agency, &config)?;
            let args = DispatchArgs {
                action,
                resident_id: resident.clone(),
                actor_id: actor,
                agency_id,
                mode,
            };

            match mode {
                ExecutionMode::Demo => {
                    let authority = commands::demo_authority(&resident, demo.seed()?).await;
                    commands::dispatch(authority, args, &cli.format).await
                }
                ExecutionMode::Live => {
                    let dispatcher = commands::live_dispatcher(&config)?;
                    commands::dispatch(dispatcher, args, &cli.format).await
                }
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    let loaded = Paths::new().and_then(|paths| Config::load(&paths).map(|config| (paths, config)));
    let (paths, config) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            output::print_error(&e.to_string(), &format);
            std::process::exit(1);
        }
    };

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.log_level.clone());
    init_logging("carectl", &level, &paths);
    debug!(mode = %config.execution_mode, "Configuration loaded");

    if let Err(e) = run(cli, config).await {
        output::print_error(&format!("{:#}", e), &format);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actions_requires_a_state() {
        assert!(Cli::try_parse_from(["carectl", "actions"]).is_err());
        assert!(Cli::try_parse_from(["carectl", "actions", "--care", "PAUSED"]).is_ok());
        assert!(Cli::try_parse_from(["carectl", "actions", "--emergency", "ACTIVE"]).is_ok());
    }

    #[test]
    fn test_dispatch_agency_is_optional() {
        let cli = Cli::try_parse_from([
            "carectl",
            "dispatch",
            "START_PREPARATION",
            "--resident",
            "res-1",
            "--actor",
            "caregiver-1",
            "--demo",
        ])
        .unwrap();
        let Commands::Dispatch { agency, demo, .. } = cli.command else {
            panic!("expected the dispatch command");
        };
        assert_eq!(agency, None);
        assert!(demo.demo);
    }
}

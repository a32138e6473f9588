use std::path::Path;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use launchpad_types::{parse_address, FeeTier, LaunchRequest, Phase};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use launchpad_orchestrator::{
    create_example_config, InMemoryChain, JsonRpcProvider, LaunchOrchestrator, LaunchSnapshot, OrchestratorConfig,
};

#[derive(Parser, Debug)]
#[command(name = "launchpad")]
#[command(about = "Create a Uniswap V3 pool and seed it with a liquidity position")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "launchpad.toml")]
    config: String,

    /// Override log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write an example configuration file
    InitConfig {
        /// Where to write the file
        path: String,
    },
    /// Run a launch against the configured node
    Launch(LaunchArgs),
    /// Run a launch against an in-memory chain
    Simulate {
        #[command(flatten)]
        launch: LaunchArgs,

        /// Token decimals used for both simulated tokens
        #[arg(long, default_value_t = 18)]
        decimals: u8,

        /// Start with token A already approved
        #[arg(long)]
        pre_approve_a: bool,

        /// Start with token B already approved
        #[arg(long)]
        pre_approve_b: bool,

        /// Mint without emitting position events
        #[arg(long)]
        missing_event: bool,
    },
}

#[derive(Args, Debug)]
struct LaunchArgs {
    /// Address of token A
    #[arg(long)]
    token_a: String,

    /// Address of token B
    #[arg(long)]
    token_b: String,

    /// Amount of token A to deposit
    #[arg(long, default_value = "10")]
    amount_a: String,

    /// Amount of token B to deposit
    #[arg(long, default_value = "10")]
    amount_b: String,

    /// Fee tier in hundredths of a basis point
    #[arg(long, default_value_t = 3000)]
    fee: u32,

    /// Lower tick; defaults to -(tick spacing * 100)
    #[arg(long, allow_hyphen_values = true)]
    tick_lower: Option<i32>,

    /// Upper tick; defaults to tick spacing * 100
    #[arg(long, allow_hyphen_values = true)]
    tick_upper: Option<i32>,
}

impl LaunchArgs {
    fn request(&self) -> LaunchRequest {
        let fee_tier = FeeTier::from(self.fee);
        let (default_lower, default_upper) = fee_tier.default_tick_range();
        LaunchRequest::new(self.token_a.clone(), self.token_b.clone(), fee_tier)
            .with_amounts(self.amount_a.clone(), self.amount_b.clone())
            .with_ticks(
                self.tick_lower.unwrap_or(default_lower),
                self.tick_upper.unwrap_or(default_upper),
            )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match &cli.command {
        Command::InitConfig { path } => {
            create_example_config(path).with_context(|| format!("Failed to write {}", path))?;
            info!("Wrote example configuration to {}", path);
            Ok(())
        }
        Command::Launch(args) => {
            let config = OrchestratorConfig::load(&cli.config)?;
            info!(rpc_url = %config.rpc_url, position_manager = %config.position_manager, "Loaded configuration");

            let provider = Arc::new(JsonRpcProvider::connect(&config).await?);
            let mut orchestrator = LaunchOrchestrator::new(provider.clone(), provider, &config);
            report(orchestrator.run(args.request()).await)
        }
        Command::Simulate { launch, decimals, pre_approve_a, pre_approve_b, missing_event } => {
            let config = if Path::new(&cli.config).exists() {
                OrchestratorConfig::load(&cli.config)?
            } else {
                OrchestratorConfig::default()
            };

            let owner = config.from.unwrap_or(Address::repeat_byte(0x01));
            let token_a = parse_address(&launch.token_a)?;
            let token_b = parse_address(&launch.token_b)?;
            let spender = config.position_manager;

            let mut chain = InMemoryChain::new(owner)
                .with_position_manager(spender)
                .with_token(token_a, *decimals, "TKA")
                .with_token(token_b, *decimals, "TKB")
                .with_balance(token_a, owner, U256::MAX)
                .with_balance(token_b, owner, U256::MAX);
            if *pre_approve_a {
                chain = chain.with_allowance(token_a, owner, spender, U256::MAX);
            }
            if *pre_approve_b {
                chain = chain.with_allowance(token_b, owner, spender, U256::MAX);
            }
            if *missing_event {
                chain = chain.omit_position_events();
            }

            let chain = Arc::new(chain);
            let mut orchestrator = LaunchOrchestrator::new(chain.clone(), chain.clone(), &config);
            let snapshot = orchestrator.run(launch.request()).await;
            info!(transactions = ?chain.submitted_kinds(), "Simulation finished");
            report(snapshot)
        }
    }
}

fn init_logging(log_level: Option<&str>) {
    let log_level = log_level.unwrap_or("info");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("launchpad_orchestrator={},launchpad_types={}", log_level, log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Print the final snapshot as JSON; a failed run exits non-zero
fn report(snapshot: LaunchSnapshot) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    if let Some(warning) = &snapshot.warning {
        warn!("{}", warning);
    }
    if snapshot.phase == Phase::Failed {
        bail!(
            "launch failed while {}: {}",
            snapshot.failed_at.unwrap_or(Phase::Failed),
            snapshot.error.unwrap_or_default()
        );
    }
    Ok(())
}

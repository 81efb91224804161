// Sibyl Oracle - Main Entry Point
// Resolves one prediction market: fetch → research → judge → submit

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, Level};

use sibyl_oracle::{
    JudgmentOrchestrator, MarketOverrides, OracleConfig, PipelineContext, ResolutionPipeline,
    SignerSource, SolanaRpcClient,
};

#[derive(Parser)]
#[command(author, version, about = "Sibyl Oracle - AI Prediction Market Resolver", long_about = None)]
struct Cli {
    /// On-chain market ID to resolve
    #[arg(long)]
    market_id: u64,
    /// Run judgment without submitting a transaction
    #[arg(long)]
    dry_run: bool,
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let config = OracleConfig::from_env().context("Invalid oracle configuration")?;
    info!("🔮 Sibyl Oracle | RPC {} | program {}", config.rpc_url, config.program_id);

    let pipeline = ResolutionPipeline::new(
        SolanaRpcClient::new(config.rpc_config()),
        config.researcher(),
        JudgmentOrchestrator::new(config.judges()),
        config.program_id,
        SignerSource::from_path(config.keypair_path.clone()),
    )
    .with_overrides(MarketOverrides::load(&config.markets_config))
    .with_retry_delay(config.retry_delay);

    let ctx = PipelineContext::new(cli.market_id, cli.dry_run);
    let report = pipeline
        .resolve(&ctx)
        .await
        .with_context(|| format!("Failed to resolve market {}", cli.market_id))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.render());
    }

    if report.is_failure() {
        error!("Resolution failed: {}", report.error.as_deref().unwrap_or_default());
        std::process::exit(1);
    }
    if let Some(sig) = &report.tx_signature {
        info!("🔗 Transaction: {}", sig);
    }
    Ok(())
}

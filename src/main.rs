use anyhow::Context;
use clap::{Parser, Subcommand};
use coinbot::config::Settings;
use coinbot::execution::Pipeline;
use coinbot::{Error, OrderSide};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "coinbot", version, about = "Coinbase signal-to-order bot")]
struct Cli {
    /// Settings file (defaults to ./coinbot.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Trading pair override, e.g. ETH-USD
    #[arg(long, global = true)]
    pair: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one decision cycle and place an order on a Buy/Sell signal
    Cycle,
    /// Run cycles on a fixed interval until interrupted
    Watch {
        /// Seconds between cycles (overrides scheduler.interval_secs)
        #[arg(long)]
        interval_secs: Option<u64>,
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Compute indicators and the signal without trading
    Signal,
    /// List account balances
    Accounts,
    /// Market order for the whole base-currency balance
    TradeAll {
        /// buy or sell
        side: OrderSide,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    setup_logging();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let classified = err.chain().find_map(|e| e.downcast_ref::<Error>());
            match classified {
                Some(e) => {
                    eprintln!("error [{}]: {:#}", e.kind(), err);
                    if e.is_fatal() {
                        ExitCode::from(2)
                    } else {
                        ExitCode::FAILURE
                    }
                }
                None => {
                    eprintln!("error: {:#}", err);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("coinbot=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolves on ctrl-c. If the handler cannot be installed it never resolves.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("🛑 Interrupted, finishing the current cycle"),
        Err(e) => {
            tracing::warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings =
        Settings::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(pair) = cli.pair {
        settings.trading.pair = pair;
        settings.validate().context("invalid --pair")?;
    }

    tracing::info!("🚀 coinbot starting for {}", settings.trading.pair);

    match cli.command {
        Command::Cycle => {
            let pipeline = Pipeline::from_settings(&settings)?;
            let outcome = pipeline.run_cycle().await.context("cycle failed")?;
            println!("{}", outcome);
        }
        Command::Watch {
            interval_secs,
            cycles,
        } => {
            let pipeline = Pipeline::from_settings(&settings)?;
            let interval = interval_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| settings.scheduler_interval());
            if interval.is_zero() {
                anyhow::bail!("--interval-secs must be at least 1");
            }

            pipeline
                .watch(interval, cycles, shutdown_signal())
                .await
                .context("watch stopped")?;
        }
        Command::Signal => {
            let pipeline = Pipeline::read_only(&settings)?;
            let evaluation = pipeline.evaluate().await.context("evaluation failed")?;
            println!(
                "{} {:?}: rsi {:.2}, fast ma {}, slow ma {}, last close {} ({} candles)",
                pipeline.pair(),
                evaluation.signal,
                evaluation.indicators.rsi,
                evaluation.indicators.fast_ma,
                evaluation.indicators.slow_ma,
                evaluation
                    .last_close
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                evaluation.candles,
            );
        }
        Command::Accounts => {
            let pipeline = Pipeline::from_settings(&settings)?;
            let accounts = pipeline.executor().accounts().list_accounts().await?;
            for account in accounts {
                println!(
                    "{:<6} balance {:>24} available {:>24} hold {:>24}",
                    account.currency, account.balance, account.available, account.hold
                );
            }
        }
        Command::TradeAll { side } => {
            let pipeline = Pipeline::from_settings(&settings)?;
            let order = pipeline
                .executor()
                .trade_all(pipeline.pair(), side)
                .await
                .with_context(|| format!("trade-all {} failed", side))?;
            println!(
                "✅ order {} {}",
                order.id,
                order.status.as_deref().unwrap_or("unknown")
            );
        }
    }

    Ok(())
}

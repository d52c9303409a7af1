use std::{
    env,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use drvn_ledger::{
    format_units, load_deployment, parse_units, Address, Amount, CycleOutcome, DeploymentConfig,
    EngineStore, ExchangeRouter, FeeEngine, SimulatedPool, TransferReceipt,
};

type Engine = FeeEngine<SimulatedPool>;

const DEFAULT_DATA_DIR: &str = "drvn-data";

#[derive(Parser, Debug)]
#[command(name = "drvn-ledger", version, about = "Fee-on-transfer ledger engine")]
struct Cli {
    /// Data directory for the sled database (falls back to DRVN_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Decimals used to parse settlement-asset amounts
    #[arg(long, global = true, default_value_t = 18)]
    settlement_decimals: u32,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deploy a fresh engine from a TOML deployment file
    Init {
        #[arg(long)]
        config: PathBuf,

        /// Replace an engine that is already stored
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Print balances, threshold progress and configuration
    Status {
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Transfer tokens through the gate (amount in whole tokens, e.g. "12.5")
    Transfer {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: String,
    },

    /// Credit settlement asset brought in from outside the ledger
    DepositSettlement {
        #[arg(long)]
        account: String,
        #[arg(long)]
        amount: String,
    },

    /// Buy tokens from the pool with the trader's settlement balance
    Buy {
        #[arg(long)]
        trader: String,
        /// Settlement asset paid in
        #[arg(long)]
        settlement: String,
        /// Minimum tokens received after tax
        #[arg(long, default_value = "0")]
        min_out: String,
    },

    /// Sell tokens into the pool
    Sell {
        #[arg(long)]
        trader: String,
        #[arg(long)]
        amount: String,
        /// Minimum settlement asset received
        #[arg(long, default_value = "0")]
        min_out: String,
    },

    /// Deposit tokens and settlement asset into the pool
    AddLiquidity {
        #[arg(long)]
        provider: String,
        #[arg(long)]
        tokens: String,
        #[arg(long)]
        settlement: String,
    },

    /// Convert accrued fees now and pay the collectors (owner only)
    ProcessFees {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        amount: String,
        #[arg(long, default_value = "0")]
        min_out: String,
    },

    /// Pay accrued fees to the collectors, as tokens or converted (owner only)
    DistributeFees {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        amount: String,
        #[arg(long, default_value_t = false)]
        in_token: bool,
    },

    /// Pay out settlement proceeds retained while no collector was set
    DistributeRetained {
        #[arg(long)]
        caller: String,
    },

    SetFees {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        buy_bps: u32,
        #[arg(long)]
        sell_bps: u32,
    },

    SetExempt {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        address: String,
        #[arg(long, action = clap::ArgAction::Set)]
        exempt: bool,
    },

    SetPool {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        address: String,
        #[arg(long, action = clap::ArgAction::Set)]
        pool: bool,
    },

    SetAutoProcess {
        #[arg(long)]
        caller: String,
        #[arg(long, action = clap::ArgAction::Set)]
        enabled: bool,
    },

    /// Fix the threshold at an amount, or clear it to use supply / divisor
    SetSwapThreshold {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        amount: Option<String>,
    },

    SetThresholdDivisor {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        divisor: u128,
    },

    /// Replace the collector list; pass --collector ADDRESS:WEIGHT per entry
    SetCollectors {
        #[arg(long)]
        caller: String,
        #[arg(long = "collector")]
        collectors: Vec<String>,
    },

    /// Point the engine at a new router; its pool starts unfunded
    MigrateRouter {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        router: String,
    },

    SetLiquidityOwner {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        address: String,
    },

    TransferOwnership {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        new_owner: String,
    },

    /// Show the most recent engine events
    Events {
        #[arg(long, default_value_t = 20)]
        last: usize,
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Run a seeded random market against an in-memory engine
    Simulate {
        #[arg(long)]
        config: PathBuf,
        #[arg(long, default_value_t = 200)]
        trades: usize,
        #[arg(long, default_value_t = 8)]
        traders: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    // init tracing from env DRVN_LOG or RUST_LOG
    let filter = env::var("DRVN_LOG")
        .unwrap_or_else(|_| env::var("RUST_LOG").unwrap_or_else(|_| "info".into()));
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let data_dir = cli
        .data_dir
        .clone()
        .or_else(|| env::var("DRVN_DATA_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let sd = cli.settlement_decimals;

    match cli.cmd {
        Commands::Init { config, force } => {
            let store = EngineStore::open(&data_dir)?;
            if store.is_initialized()? && !force {
                bail!("{} already holds an engine; pass --force to replace it", data_dir.display());
            }
            let cfg = load_deployment(&config)?;
            let engine = deploy_from_config(&cfg)?;
            store.save(&engine)?;
            info!(data_dir = %data_dir.display(), "engine initialized");
            print!("{}", engine.status().render());
        }

        Commands::Status { json } => {
            let engine = load(&data_dir)?.1;
            let status = engine.status();
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print!("{}", status.render());
            }
        }

        Commands::Transfer { from, to, amount } => {
            with_engine(&data_dir, |engine| {
                let amount = token_units(engine, &amount)?;
                let receipt = engine.transfer(&Address::new(&from), &Address::new(&to), amount)?;
                print_receipt(engine, &receipt);
                Ok(())
            })?;
        }

        Commands::DepositSettlement { account, amount } => {
            with_engine(&data_dir, |engine| {
                let account = Address::new(&account);
                engine.deposit_settlement(&account, units(&amount, sd)?)?;
                println!(
                    "{} holds {} settlement",
                    account,
                    format_units(engine.settlement_balance_of(&account), sd)
                );
                Ok(())
            })?;
        }

        Commands::Buy {
            trader,
            settlement,
            min_out,
        } => {
            with_engine(&data_dir, |engine| {
                let settlement_in = units(&settlement, sd)?;
                let min_out = token_units(engine, &min_out)?;
                let trade = engine.buy(&Address::new(&trader), settlement_in, min_out)?;
                println!(
                    "bought {} tokens for {} settlement",
                    format_units(trade.tokens, engine.state().decimals()),
                    format_units(trade.settlement, sd)
                );
                print_receipt(engine, &trade.transfer);
                Ok(())
            })?;
        }

        Commands::Sell {
            trader,
            amount,
            min_out,
        } => {
            with_engine(&data_dir, |engine| {
                let amount = token_units(engine, &amount)?;
                let min_out = units(&min_out, sd)?;
                let trade = engine.sell(&Address::new(&trader), amount, min_out)?;
                println!(
                    "sold {} tokens for {} settlement",
                    format_units(trade.tokens, engine.state().decimals()),
                    format_units(trade.settlement, sd)
                );
                print_receipt(engine, &trade.transfer);
                Ok(())
            })?;
        }

        Commands::AddLiquidity {
            provider,
            tokens,
            settlement,
        } => {
            with_engine(&data_dir, |engine| {
                let tokens = token_units(engine, &tokens)?;
                let settlement = units(&settlement, sd)?;
                let receipt = engine.add_liquidity(&Address::new(&provider), tokens, settlement)?;
                print_receipt(engine, &receipt);
                Ok(())
            })?;
        }

        Commands::ProcessFees {
            caller,
            amount,
            min_out,
        } => {
            with_engine(&data_dir, |engine| {
                let amount = token_units(engine, &amount)?;
                let min_out = units(&min_out, sd)?;
                let report = engine.process_fees(&Address::new(&caller), amount, min_out)?;
                println!(
                    "converted {} tokens into {} settlement ({} retained)",
                    format_units(report.tokens_in, engine.state().decimals()),
                    format_units(report.settlement_received, sd),
                    format_units(report.retained, sd)
                );
                for p in &report.payouts {
                    println!("  {} <- {}", p.collector, format_units(p.amount, sd));
                }
                Ok(())
            })?;
        }

        Commands::DistributeFees {
            caller,
            amount,
            in_token,
        } => {
            with_engine(&data_dir, |engine| {
                let amount = token_units(engine, &amount)?;
                let payouts = engine.distribute_fees(&Address::new(&caller), amount, in_token)?;
                let decimals = if in_token { engine.state().decimals() } else { sd };
                for p in &payouts {
                    println!("  {} <- {}", p.collector, format_units(p.amount, decimals));
                }
                Ok(())
            })?;
        }

        Commands::DistributeRetained { caller } => {
            with_engine(&data_dir, |engine| {
                for p in engine.distribute_retained(&Address::new(&caller))? {
                    println!("  {} <- {}", p.collector, format_units(p.amount, sd));
                }
                Ok(())
            })?;
        }

        Commands::SetFees {
            caller,
            buy_bps,
            sell_bps,
        } => {
            with_engine(&data_dir, |engine| {
                Ok(engine.set_fees(&Address::new(&caller), buy_bps, sell_bps)?)
            })?;
        }

        Commands::SetExempt {
            caller,
            address,
            exempt,
        } => {
            with_engine(&data_dir, |engine| {
                Ok(engine.set_exempt(&Address::new(&caller), &Address::new(&address), exempt)?)
            })?;
        }

        Commands::SetPool {
            caller,
            address,
            pool,
        } => {
            with_engine(&data_dir, |engine| {
                Ok(engine.set_pool(&Address::new(&caller), &Address::new(&address), pool)?)
            })?;
        }

        Commands::SetAutoProcess { caller, enabled } => {
            with_engine(&data_dir, |engine| {
                Ok(engine.set_auto_process(&Address::new(&caller), enabled)?)
            })?;
        }

        Commands::SetSwapThreshold { caller, amount } => {
            with_engine(&data_dir, |engine| {
                let amount = amount.map(|a| token_units(engine, &a)).transpose()?;
                Ok(engine.set_swap_threshold(&Address::new(&caller), amount)?)
            })?;
        }

        Commands::SetThresholdDivisor { caller, divisor } => {
            with_engine(&data_dir, |engine| {
                Ok(engine.set_threshold_divisor(&Address::new(&caller), divisor)?)
            })?;
        }

        Commands::SetCollectors { caller, collectors } => {
            let (addresses, weights) = parse_collectors(&collectors)?;
            with_engine(&data_dir, |engine| {
                Ok(engine.set_collectors(&Address::new(&caller), &addresses, &weights)?)
            })?;
        }

        Commands::MigrateRouter { caller, router } => {
            with_engine(&data_dir, |engine| {
                let state = engine.state();
                let next = SimulatedPool::new(
                    Address::new(&router),
                    state.token().clone(),
                    state.pools().settlement_asset().clone(),
                );
                let old = engine.migrate_router(&Address::new(&caller), next)?;
                let reserves = old.get_reserves();
                if reserves.is_funded() {
                    warn!(
                        old_router = %old.address(),
                        old_pool = %old.pool_address(),
                        "previous pool still holds liquidity and stays classified as a pool"
                    );
                }
                println!("router {} -> {}, pool {}", old.address(), router, engine.pool());
                Ok(())
            })?;
        }

        Commands::SetLiquidityOwner { caller, address } => {
            with_engine(&data_dir, |engine| {
                Ok(engine.set_liquidity_owner(&Address::new(&caller), &Address::new(&address))?)
            })?;
        }

        Commands::TransferOwnership { caller, new_owner } => {
            with_engine(&data_dir, |engine| {
                Ok(engine.transfer_ownership(&Address::new(&caller), &Address::new(&new_owner))?)
            })?;
        }

        Commands::Events { last, json } => {
            let engine = load(&data_dir)?.1;
            let records = engine.events().last(last);
            if json {
                println!("{}", serde_json::to_string_pretty(records)?);
            } else {
                for r in records {
                    println!(
                        "#{:<6} t={:<12} {}",
                        r.seq,
                        r.block_time,
                        serde_json::to_string(&r.event)?,
                    );
                }
            }
        }

        Commands::Simulate {
            config,
            trades,
            traders,
            seed,
        } => {
            let cfg = load_deployment(&config)?;
            simulate(&cfg, trades, traders, seed)?;
        }
    }
    Ok(())
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn units(raw: &str, decimals: u32) -> Result<Amount> {
    Ok(parse_units(raw, decimals)?)
}

fn token_units(engine: &Engine, raw: &str) -> Result<Amount> {
    units(raw, engine.state().decimals())
}

fn parse_collectors(raw: &[String]) -> Result<(Vec<Address>, Vec<u32>)> {
    let mut addresses = Vec::with_capacity(raw.len());
    let mut weights = Vec::with_capacity(raw.len());
    for entry in raw {
        let (addr, weight) = entry
            .rsplit_once(':')
            .ok_or_else(|| anyhow!("collector {} must look like ADDRESS:WEIGHT", entry))?;
        addresses.push(Address::new(addr));
        weights.push(
            weight
                .trim()
                .parse()
                .with_context(|| format!("collector weight in {}", entry))?,
        );
    }
    Ok((addresses, weights))
}

fn deploy_from_config(cfg: &DeploymentConfig) -> Result<Engine> {
    let router = SimulatedPool::new(cfg.router(), cfg.token_address(), cfg.settlement_asset());
    let mut engine = FeeEngine::deploy(cfg.engine_params()?, router)?;
    engine.set_block_time(now_secs());
    if let Some((tokens, settlement)) = cfg.initial_liquidity()? {
        let provider = engine.state().config().liquidity_owner.clone();
        engine.add_liquidity(&provider, tokens, settlement)?;
    }
    Ok(engine)
}

fn load(data_dir: &Path) -> Result<(EngineStore, Engine)> {
    let store = EngineStore::open(data_dir)?;
    let engine = store
        .load()?
        .ok_or_else(|| anyhow!("no engine in {}; run `init` first", data_dir.display()))?;
    Ok((store, engine))
}

/// Load, run `f` at the current wall-clock time, and save on success.
fn with_engine(data_dir: &Path, f: impl FnOnce(&mut Engine) -> Result<()>) -> Result<()> {
    let (store, mut engine) = load(data_dir)?;
    engine.set_block_time(now_secs());
    f(&mut engine)?;
    store.save(&engine)
}

fn print_receipt(engine: &Engine, receipt: &TransferReceipt) {
    let d = engine.state().decimals();
    println!(
        "{} {} -> {}: {} (net {}, tax {})",
        receipt.kind.as_str(),
        receipt.from,
        receipt.to,
        format_units(receipt.amount, d),
        format_units(receipt.net, d),
        format_units(receipt.tax, d)
    );
    if let Some(decision) = &receipt.monitor {
        println!("  monitor: {:?}", decision);
    }
    match &receipt.cycle {
        Some(CycleOutcome::Completed(report)) => println!(
            "  fees processed: {} tokens -> {} settlement units, {} payouts",
            format_units(report.tokens_in, d),
            report.settlement_received,
            report.payouts.len()
        ),
        Some(CycleOutcome::Failed(e)) => println!("  fee processing failed: {}", e),
        Some(CycleOutcome::Skipped) => println!("  fee processing skipped (in flight)"),
        None => {}
    }
}

fn simulate(cfg: &DeploymentConfig, trades: usize, traders: usize, seed: u64) -> Result<()> {
    if traders == 0 {
        bail!("--traders must be at least 1");
    }
    let mut engine = deploy_from_config(cfg)?;
    if !engine.router().get_reserves().is_funded() {
        let supply = engine.total_supply();
        let owner = engine.state().config().owner.clone();
        engine.add_liquidity(&owner, supply / 10, 10u128.pow(18))?;
    }

    let owner = engine.state().config().owner.clone();
    let wallets: Vec<Address> = (0..traders)
        .map(|i| Address::new(format!("0xtrader{:02}", i)))
        .collect();
    let stake = engine.balance_of(&owner) / (traders as u128 * 4);
    let purse = engine.router().get_reserves().settlement;
    for w in &wallets {
        engine.transfer(&owner, w, stake)?;
        engine.deposit_settlement(w, purse)?;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let (mut buys, mut sells, mut cycles, mut failures, mut rejected) =
        (0u32, 0u32, 0u32, 0u32, 0u32);
    let mut clock = now_secs();
    for _ in 0..trades {
        clock += rng.gen_range(1..=60);
        engine.set_block_time(clock);
        let trader = &wallets[rng.gen_range(0..wallets.len())];
        let held = engine.balance_of(trader);
        let result = if rng.gen_bool(0.5) || held == 0 {
            let depth = engine.router().get_reserves().settlement;
            let spend = rng.gen_range(1..=(depth / 50).max(1));
            buys += 1;
            engine.buy(trader, spend, 0).map(|t| t.transfer)
        } else {
            let amount = rng.gen_range(1..=held);
            sells += 1;
            engine.sell(trader, amount, 0).map(|t| t.transfer)
        };
        match result {
            Ok(receipt) => match receipt.cycle {
                Some(CycleOutcome::Completed(_)) => cycles += 1,
                Some(CycleOutcome::Failed(_)) => failures += 1,
                _ => {}
            },
            Err(e) => {
                rejected += 1;
                warn!(trader = %trader, error = %e, "simulated trade rejected");
            }
        }
    }

    print!("{}", engine.status().render());
    println!(
        "trades {} (buys {}, sells {}, rejected {}), cycles {}, failed cycles {}",
        trades, buys, sells, rejected, cycles, failures
    );
    let ledger = engine.state().ledger();
    if !ledger.is_conserved() {
        bail!(
            "supply not conserved: {} circulating vs {} total",
            ledger.circulating(),
            ledger.total_supply()
        );
    }
    println!(
        "supply conserved: {}",
        format_units(ledger.total_supply(), engine.state().decimals()),
    );
    Ok(())
}

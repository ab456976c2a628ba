// ============================================================================
// smile - command line driver for the SMILE testnet batch runner
// ============================================================================
// Usage:
//   smile generate 1000 --chain eth          Generate wallets in batches
//   smile wallets --page 2                   List stored wallets
//   smile discover [--offline]               Fetch and store new testnets
//   smile run [--job ID] [--limit N]         Run testnet tasks on wallets
//   smile parse "Claim faucet..."            Parse a free-form task
//   smile run-custom --file task.txt         Parse and run a custom task
//   smile cascade forward 1.5 --count 10     Chain transfers across wallets
//   smile export-wallets / backup / clear    Snapshots and maintenance
// ============================================================================

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use smile_core::upstream::Complexity;
use smile_core::{
    BotConfig, BotDb, CascadeEngine, CascadeReport, ChainKind, Collection, HttpJobSource,
    JobService, JobSource, OfflineJobSource, ParsedTask, Progress, RunController, RunGuard,
    RunResult, SecretCipher, TaskExecutor, TestnetJob, Wallet, WalletGenerator,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// SMILE testnet batch runner
#[derive(Parser)]
#[command(name = "smile", version, about = "Generate wallets and run testnet tasks across them")]
struct Cli {
    /// Path to the database file (default: ~/.smile/smile.redb)
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Use the built-in testnets and local parser instead of the backend
    #[arg(long, global = true)]
    offline: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate wallets (secrets sealed with SMILE_WALLET_PASSPHRASE)
    Generate {
        count: usize,
        /// eth, btc or sol
        #[arg(long, default_value = "eth")]
        chain: String,
    },

    /// List stored wallets page by page
    Wallets {
        #[arg(long, default_value = "1")]
        page: usize,
        #[arg(long)]
        page_size: Option<usize>,
    },

    /// Show collection counts
    Stats,

    /// Fetch testnets not yet completed and store them
    Discover,

    /// Run discovered testnets (or one stored testnet) on the wallets
    Run {
        /// Only this testnet id
        #[arg(long)]
        job: Option<String>,
        /// Only the first N wallets
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Parse a free-form task description
    Parse {
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Parse a free-form task and run it on the wallets
    RunCustom {
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Chain simulated transfers across consecutive wallets
    Cascade {
        #[command(subcommand)]
        direction: CascadeCommand,
    },

    /// Ask the backend which wallets can claim
    Eligibility {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Write all wallets with decrypted secrets as JSON
    ExportWallets {
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Write every collection as one JSON backup
    Backup {
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Delete one collection (wallets, testnets, completed, claims) or everything
    Clear {
        collection: Option<String>,
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum CascadeCommand {
    /// Spread AMOUNT evenly: first -> second -> ... -> last
    Forward {
        amount: Decimal,
        /// Index of the first wallet in the chain
        #[arg(long, default_value = "1")]
        start: u64,
        /// Number of wallets in the chain
        #[arg(long, default_value = "10")]
        count: u64,
    },
    /// Sweep back: last -> ... -> second -> destination
    Reverse {
        /// Final recipient (default: the first wallet of the chain)
        #[arg(long)]
        destination: Option<String>,
        #[arg(long, default_value = "1")]
        start: u64,
        #[arg(long, default_value = "10")]
        count: u64,
    },
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("smile_core={level},smile={level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = BotConfig::from_env();
    let db = Arc::new(BotDb::open(cli.db_path.as_deref())?);
    let source: Arc<dyn JobSource> = if cli.offline {
        Arc::new(OfflineJobSource)
    } else {
        Arc::new(HttpJobSource::new(&config.api_url)?)
    };
    let jobs = JobService::new(db.clone(), source);
    let controller = RunController::new();

    match cli.command {
        Commands::Generate { count, chain } => cmd_generate(&db, &config, count, &chain).await,
        Commands::Wallets { page, page_size } => {
            cmd_wallets(&db, page, page_size.unwrap_or(config.wallets_per_page))
        }
        Commands::Stats => cmd_stats(&db),
        Commands::Discover => cmd_discover(&jobs).await,
        Commands::Run { job, limit } => {
            cmd_run(&db, &config, &jobs, &controller, job.as_deref(), limit).await
        }
        Commands::Parse { text, file } => {
            let parsed = jobs.parse_task(&read_task_text(text, file)?).await;
            print_parsed(&parsed);
            Ok(())
        }
        Commands::RunCustom { text, file, limit } => {
            cmd_run_custom(&db, &config, &jobs, &controller, read_task_text(text, file)?, limit).await
        }
        Commands::Cascade { direction } => cmd_cascade(&db, &config, &controller, direction).await,
        Commands::Eligibility { limit } => cmd_eligibility(&db, &jobs, limit).await,
        Commands::ExportWallets { output } => cmd_export_wallets(&db, &config, output),
        Commands::Backup { output } => cmd_backup(&db, output),
        Commands::Clear { collection, yes } => cmd_clear(&db, collection.as_deref(), yes),
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn wallet_cipher(config: &BotConfig) -> Result<SecretCipher> {
    let passphrase = config
        .wallet_passphrase
        .as_deref()
        .context("SMILE_WALLET_PASSPHRASE must be set to generate or export wallets")?;
    Ok(SecretCipher::from_passphrase(passphrase)?)
}

/// Start a run that Ctrl-C cancels at the next wallet / step boundary.
fn start_run(controller: &RunController) -> Result<RunGuard> {
    let run = controller.begin()?;
    let handle = run.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, stopping after the current wallet");
            handle.cancel();
        }
    });
    Ok(run)
}

fn print_progress(label: &str, p: Progress) {
    println!("  [{}] {}/{} ({}%)", label, p.done, p.total, p.percent);
}

fn load_wallets(db: &BotDb, limit: Option<usize>) -> Result<Vec<Wallet>> {
    let wallets: Vec<Wallet> = match limit {
        Some(n) => db.get_page(1, n)?,
        None => db.get_all()?,
    };
    if wallets.is_empty() {
        bail!("No wallets stored. Run `smile generate <count>` first.");
    }
    Ok(wallets)
}

fn read_task_text(text: Option<String>, file: Option<PathBuf>) -> Result<String> {
    match (text, file) {
        (Some(t), None) => Ok(t),
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => bail!("Provide the task either as text or with --file"),
    }
}

fn output_file(output: Option<PathBuf>, prefix: &str) -> Result<(PathBuf, BufWriter<File>)> {
    let path = output.unwrap_or_else(|| {
        PathBuf::from(format!("{}-{}.json", prefix, Utc::now().timestamp_millis()))
    });
    let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok((path, BufWriter::new(file)))
}

fn print_result(job: &TestnetJob, result: &RunResult) {
    println!();
    println!("=== {} ({}) ===", job.name, job.id);
    println!("Wallets:    {}", result.total);
    println!("Successful: {}", result.successful);
    println!("Failed:     {}", result.failed);
    let skipped = result.total - result.processed();
    if skipped > 0 {
        println!("Skipped:    {} (cancelled)", skipped);
    }
    for detail in &result.details {
        println!("  {}  {}", detail.wallet, detail.error_message);
    }
}

fn print_parsed(parsed: &ParsedTask) {
    let complexity = match parsed.complexity {
        Complexity::Unknown => "unknown",
        Complexity::Simple => "simple",
        Complexity::Medium => "medium",
        Complexity::Hard => "hard",
    };
    println!("Testnet:    {}", parsed.testnet);
    println!("Network:    {}", parsed.network);
    println!("Complexity: {}", complexity);
    println!("Automatable: {}", if parsed.can_automate() { "yes" } else { "no" });
    println!();
    for (i, step) in parsed.steps.iter().enumerate() {
        println!("  {}. {:18} {}", i + 1, step.kind().as_str(), step.description());
    }
    if parsed.steps.is_empty() {
        println!("  (no steps recognised)");
    }
}

fn print_cascade(report: &CascadeReport) {
    println!();
    println!(
        "Cascade: {} of {} steps ok, {} failed",
        report.successful(),
        report.total_steps,
        report.failed()
    );
    for step in &report.steps {
        let amount = step.amount.map(|a| a.to_string()).unwrap_or_else(|| "all".into());
        match &step.error {
            None => println!("  {} -> {}  {}", step.from, step.to, amount),
            Some(e) => println!("  {} -> {}  {}  FAILED: {}", step.from, step.to, amount, e),
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn cmd_generate(db: &Arc<BotDb>, config: &BotConfig, count: usize, chain: &str) -> Result<()> {
    let Some(kind) = ChainKind::from_str(chain) else {
        bail!("Unknown chain '{}'. Valid values: eth, btc, sol", chain);
    };
    let generator = WalletGenerator::new(db.clone(), wallet_cipher(config)?, config);
    let generated = generator
        .generate(count, kind, |p| print_progress("generate", p))
        .await?;
    println!("Generated {} {} wallets ({} stored)", generated, kind, db.count(Collection::Wallets)?);
    Ok(())
}

fn cmd_wallets(db: &BotDb, page: usize, page_size: usize) -> Result<()> {
    let total = db.count(Collection::Wallets)?;
    let wallets: Vec<Wallet> = db.get_page(page, page_size)?;
    if wallets.is_empty() {
        println!("No wallets on page {}.", page);
        return Ok(());
    }

    println!("{:>8}  {:5}  {:46}  {:>10}  {}", "INDEX", "CHAIN", "ADDRESS", "BALANCE", "CREATED");
    println!("{}", "-".repeat(100));
    for w in &wallets {
        println!(
            "{:>8}  {:5}  {:46}  {:>10}  {}",
            w.index,
            w.chain_kind.as_str(),
            w.address,
            w.balance,
            w.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    let pages = (total as usize).div_ceil(page_size.max(1));
    println!("\nPage {}/{} ({} wallets total)", page.max(1), pages, total);
    Ok(())
}

fn cmd_stats(db: &BotDb) -> Result<()> {
    let stats = db.stats()?;
    println!("=== SMILE Database Stats ===");
    println!("Database:    {}", db.path().display());
    println!();
    println!("Wallets:     {} (highest index {})", stats.wallets, stats.max_wallet_index);
    println!("Testnets:    {}", stats.jobs);
    println!("Completions: {}", stats.completions);
    println!("Claims:      {}", stats.claims);
    Ok(())
}

async fn cmd_discover(jobs: &JobService) -> Result<()> {
    let found = jobs.discover().await?;
    if found.is_empty() {
        println!("No new testnets.");
        return Ok(());
    }
    println!("{:20}  {:20}  {:10}  {:>5}  {}", "ID", "NAME", "CHAIN", "SCORE", "TASKS");
    println!("{}", "-".repeat(80));
    for job in &found {
        println!(
            "{:20}  {:20}  {:10}  {:>5}  {}",
            job.id,
            job.name,
            job.chain,
            job.score.map(|s| s.to_string()).unwrap_or_default(),
            job.tasks.len()
        );
    }
    Ok(())
}

async fn cmd_run(
    db: &Arc<BotDb>,
    config: &BotConfig,
    jobs: &JobService,
    controller: &RunController,
    job_id: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    let wallets = load_wallets(db, limit)?;
    let selected = match job_id {
        Some(id) => {
            let stored = jobs.stored_jobs()?;
            match stored.into_iter().find(|j| j.id == id) {
                Some(job) => vec![job],
                None => bail!("Testnet '{}' not found. Run `smile discover` first.", id),
            }
        }
        None => jobs.discover().await?,
    };
    if selected.is_empty() {
        println!("Nothing to run: every known testnet is completed.");
        return Ok(());
    }

    let executor = TaskExecutor::simulated(db.clone(), config)?;
    let run = start_run(controller)?;
    let results = executor
        .execute_all(&selected, &wallets, &run, |job, p| print_progress(&job.id, p))
        .await?;

    for (job, (_, result)) in selected.iter().zip(&results) {
        print_result(job, result);
    }
    Ok(())
}

async fn cmd_run_custom(
    db: &Arc<BotDb>,
    config: &BotConfig,
    jobs: &JobService,
    controller: &RunController,
    text: String,
    limit: Option<usize>,
) -> Result<()> {
    let parsed = jobs.parse_task(&text).await;
    print_parsed(&parsed);
    if parsed.steps.is_empty() {
        bail!("No runnable steps found in the task description");
    }
    if !parsed.can_automate() {
        warn!("Task contains manual steps; wallets reaching them will fail");
    }

    let wallets = load_wallets(db, limit)?;
    let job = parsed.into_job();
    let executor = TaskExecutor::simulated(db.clone(), config)?;
    let run = start_run(controller)?;
    let result = executor
        .execute_tasks(&job, &wallets, &run, |p| print_progress(&job.id, p))
        .await?;
    print_result(&job, &result);
    Ok(())
}

fn chain_wallets(db: &BotDb, start: u64, count: u64) -> Result<Vec<Wallet>> {
    let end = start.saturating_add(count);
    let mut wallets = Vec::new();
    for index in start..end {
        match db.get_wallet(index)? {
            Some(w) => wallets.push(w),
            None => bail!("Wallet #{} does not exist", index),
        }
    }
    Ok(wallets)
}

async fn cmd_cascade(
    db: &Arc<BotDb>,
    config: &BotConfig,
    controller: &RunController,
    direction: CascadeCommand,
) -> Result<()> {
    let executor = TaskExecutor::simulated(db.clone(), config)?;
    let engine = CascadeEngine::from_executor(&executor);

    let report = match direction {
        CascadeCommand::Forward { amount, start, count } => {
            let wallets = chain_wallets(db, start, count)?;
            let run = start_run(controller)?;
            engine
                .forward(&wallets, amount, &run, |p| print_progress("forward", p))
                .await?
        }
        CascadeCommand::Reverse { destination, start, count } => {
            let wallets = chain_wallets(db, start, count)?;
            let run = start_run(controller)?;
            engine
                .reverse(&wallets, destination.as_deref(), &run, |p| print_progress("reverse", p))
                .await?
        }
    };
    print_cascade(&report);
    Ok(())
}

async fn cmd_eligibility(db: &BotDb, jobs: &JobService, limit: Option<usize>) -> Result<()> {
    let addresses: Vec<String> = load_wallets(db, limit)?
        .into_iter()
        .map(|w| w.address)
        .collect();
    let eligible = jobs.check_eligibility(&addresses).await?;
    println!("{} of {} wallets eligible", eligible.len(), addresses.len());
    for address in &eligible {
        println!("  {}", address);
    }
    Ok(())
}

fn cmd_export_wallets(db: &BotDb, config: &BotConfig, output: Option<PathBuf>) -> Result<()> {
    let cipher = wallet_cipher(config)?;
    let (path, writer) = output_file(output, "smile-wallets")?;
    let count = smile_core::export::export_wallets(db, &cipher, writer)?;
    println!("Exported {} wallets to {}", count, path.display());
    Ok(())
}

fn cmd_backup(db: &BotDb, output: Option<PathBuf>) -> Result<()> {
    let (path, writer) = output_file(output, "smile-backup")?;
    let backup = smile_core::export::export_backup(db, writer)?;
    println!(
        "Backup of {} wallets, {} testnets, {} completions, {} claims written to {}",
        backup.wallets.len(),
        backup.testnets.len(),
        backup.completed.len(),
        backup.claims.len(),
        path.display()
    );
    Ok(())
}

fn cmd_clear(db: &BotDb, collection: Option<&str>, yes: bool) -> Result<()> {
    let target = match collection {
        Some(name) => match Collection::from_str(name) {
            Some(c) => Some(c),
            None => bail!(
                "Unknown collection '{}'. Valid values: wallets, testnets, completed, claims",
                name
            ),
        },
        None => None,
    };

    if !yes {
        let what = target.map(|c| c.as_str()).unwrap_or("ALL data");
        bail!("Refusing to delete {} without --yes", what);
    }

    match target {
        Some(c) => {
            db.clear(c)?;
            println!("Cleared {}", c.as_str());
        }
        None => {
            db.clear_all()?;
            println!("Cleared all collections in {}", db.path().display());
        }
    }
    Ok(())
}

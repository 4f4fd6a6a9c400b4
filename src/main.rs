use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
mod auth;
mod console;
use console::ConsoleReporter;
use sniper_crypt::settings::{CONFIG_ENV, default_settings_path};
use sniper_crypt::{
    CancelToken, Engine, NullReporter, Operation, Settings, discover_sorted,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Parser)]
#[command(name = "sniper-crypt")]
#[command(
    version,
    about = "Encrypt and decrypt files or whole directories with a password."
)]
struct Cli {
    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Path to the settings file
    #[arg(long, global = true, value_name = "PATH", env = CONFIG_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Args)]
struct RunArgs {
    /// File or directory to process
    path: PathBuf,

    /// Securely delete the input after a successful run
    #[arg(long)]
    shred: bool,

    /// Number of files processed in parallel (directories only)
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,

    /// Extra file name suffix to skip when encrypting a directory
    #[arg(long, value_name = "SUFFIX")]
    exclude: Vec<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Encrypts a file, or every eligible file below a directory
    #[command(arg_required_else_help = true)]
    Encrypt(RunArgs),

    /// Decrypts a .enc file, or every .enc file below a directory
    #[command(arg_required_else_help = true)]
    Decrypt(RunArgs),
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let level = match verbose {
        0 => "error",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_settings(path: Option<PathBuf>) -> Result<Settings> {
    let path = match path {
        Some(p) => p,
        None => default_settings_path()?,
    };
    Settings::load(&path)
}

/// Returns `Ok(false)` when a directory run had failing files.
fn run(cli: Cli) -> Result<bool> {
    let (operation, args) = match cli.command {
        Commands::Encrypt(args) => (Operation::Encrypt, args),
        Commands::Decrypt(args) => (Operation::Decrypt, args),
    };

    let settings = load_settings(cli.config)?;
    let mut options = settings.batch_options();
    options.shred |= args.shred;
    if let Some(jobs) = args.jobs {
        options.concurrency = jobs.max(1);
    }

    let metadata = std::fs::metadata(&args.path)
        .with_context(|| format!("cannot access {}", args.path.display()))?;

    // an interrupt stops new files from starting; the current one finishes
    let cancel = CancelToken::new();
    let handler = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("interrupted: finishing files in progress");
        handler.cancel();
    })
    .context("failed to install Ctrl-C handler")?;

    if metadata.is_file() {
        let password = auth::read_password(operation == Operation::Encrypt)?;
        if cancel.is_cancelled() {
            bail!("interrupted before {operation} started");
        }
        let engine = Engine::new(options, Arc::new(NullReporter))?;
        let output = engine
            .process(&args.path, operation, &password)
            .with_context(|| format!("failed to {operation} {}", args.path.display()))?;
        println!("{operation}ed {} -> {}", args.path.display(), output.display());
        return Ok(true);
    }

    if !metadata.is_dir() {
        bail!("not a regular file or directory: {}", args.path.display());
    }

    let mut exclusions = settings.exclusions();
    exclusions.extend(args.exclude);
    debug!(suffixes = ?exclusions.suffixes(), "exclusions");

    let (paths, errors) = discover_sorted(&args.path, operation.mode(), exclusions);
    for e in &errors {
        warn!(error = %e, "skipping unreadable entry");
        eprintln!("warning: {e}");
    }
    if paths.is_empty() {
        println!("no files to {operation} in {}", args.path.display());
        return Ok(errors.is_empty());
    }

    let password = auth::read_password(operation == Operation::Encrypt)?;

    let engine = Engine::new(options, Arc::new(ConsoleReporter::new(paths.len())))?;
    let report = engine.run_batch(&paths, operation, &password, &cancel)?;

    Ok(report.is_success() && errors.is_empty() && report.skipped() == 0)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

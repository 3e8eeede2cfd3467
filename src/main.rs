use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use lintmux::cli::{Cli, Commands};
use lintmux::config::Config;
use lintmux::discovery;
use lintmux::engine::{Engine, Strategy};
use lintmux::report::SUCCESS_MESSAGE;

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lintmux")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("lintmux.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn print_targets(config: &Config, targets: &[String]) {
    let package = if config.package.is_empty() { "." } else { config.package.as_str() };
    println!("Dependencies in {}:", package);
    for target in targets {
        println!("{}", target);
    }
    println!("\n");
}

fn print_checkers(config: &Config) {
    if config.checkers.is_empty() {
        println!("{}", "No checkers configured".yellow());
        return;
    }
    for checker in &config.checkers {
        let strategy = match Strategy::for_checker(checker) {
            Strategy::Batch => "batch",
            Strategy::PerTarget => "per-target",
        };
        println!("{} [{}] {}", checker.command.green(), strategy, checker.args.join(" "));
    }
}

async fn run_checks(config: &Config) -> lintmux::Result<i32> {
    let targets = discovery::discover(config).await?;
    if config.show {
        print_targets(config, &targets);
    }

    let engine = Engine::from_config(config);
    let report = engine.run(&targets).await;

    if report.is_empty() {
        println!("{}", SUCCESS_MESSAGE.green());
    } else {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        report.render(&mut out)?;
        out.flush()?;
    }
    Ok(report.exit_code())
}

async fn run_application(cli: &Cli) -> lintmux::Result<i32> {
    let config = Config::load(cli.config.as_ref())?.with_overrides(cli.overrides());
    info!(
        "Starting with config from {:?}: {} checkers, cap {}",
        cli.config,
        config.checkers.len(),
        config.concurrency
    );

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match cli.command.clone().unwrap_or(Commands::Run) {
        Commands::Run => run_checks(&config).await,
        Commands::Targets => {
            let targets = discovery::discover(&config).await?;
            print_targets(&config, &targets);
            Ok(0)
        }
        Commands::Checkers => {
            print_checkers(&config);
            Ok(0)
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = setup_logging() {
        eprintln!("{} {:#}", "warning:".yellow(), e);
    }

    let cli = Cli::parse();

    let code = match run_application(&cli).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("{}", e.to_string().red());
            1
        }
    };

    std::process::exit(code);
}

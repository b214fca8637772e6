//! ghcontrib - contributor leaderboards across GitHub organizations
//!
//! A CLI tool that collects per-contributor activity from the GitHub REST
//! API into a versioned dataset, then turns it into leaderboards and a
//! static dashboard.
//!
//! Exit codes:
//!   0 - Success (degraded or partial repositories are reported, not fatal)
//!   1 - Runtime error (bad token, rate limit, unreadable dataset, etc.)

mod aggregate;
mod analysis;
mod cli;
mod config;
mod discovery;
mod error;
mod github;
mod models;
mod pipeline;
mod report;
mod retry;
mod store;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, Command, DashboardArgs, FetchArgs, ParseArgs};
use config::Config;
use github::{ApiClient, ClientOptions, ReqwestTransport};
use models::RepoStatus;
use pipeline::{FetchPipeline, FetchReport};
use std::sync::Arc;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if let Command::InitConfig = args.command {
        return handle_init_config();
    }

    init_logging(&args);

    info!("ghcontrib v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args)?;

    let outcome = match args.command.clone() {
        Command::Fetch(fetch) => run_fetch(&args, &config, fetch).await,
        Command::Parse(parse) => run_parse(&args, &config, parse),
        Command::Dashboard(dashboard) => run_dashboard(&args, &config, dashboard),
        Command::InitConfig => handle_init_config(),
    };

    if let Err(e) = outcome {
        error!("{:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

/// Handle init-config: generate a default .ghcontrib.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Edit it to set organizations, exclusions, retry and polling behavior.");
    Ok(())
}

/// Initialize logging based on verbosity settings; `RUST_LOG` overrides.
fn init_logging(args: &Args) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(args.log_level()).into())
        .from_env_lossy();

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .try_init();

    if let Err(e) = installed {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// Run Discover → Aggregate → Merge → Store.
async fn run_fetch(args: &Args, config: &Config, fetch: FetchArgs) -> Result<()> {
    let settings = config.resolve_fetch(&fetch, Utc::now())?;
    let show_output = !args.quiet;

    if show_output {
        println!("📥 Fetching contributions for: {}", settings.orgs.join(", "));
        println!("   Window: {}", settings.window);
        println!("   Mode: {}", settings.mode);
        if !settings.exclude_repos.is_empty() {
            println!("   Excluding: {}", settings.exclude_repos.join(", "));
        }
        if let Some(n) = settings.top_n_repos {
            println!("   Top repositories per org: {}", n);
        }
    }

    let transport = ReqwestTransport::new(
        Duration::from_secs(settings.github.timeout_seconds),
        &settings.github.user_agent,
    )
    .context("Failed to build HTTP client")?;
    let client = Arc::new(ApiClient::new(
        Arc::new(transport),
        settings.token.clone(),
        ClientOptions::from_settings(&settings.github, &settings.retry),
    ));

    // Ctrl-C cancels in-flight requests; the run lock is released on the way out.
    let cancel = client.cancellation().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling fetch");
            cancel.cancel();
        }
    });

    let report = FetchPipeline::new(client, settings)
        .with_progress(show_output)
        .run()
        .await
        .context("Fetch failed; no dataset was written")?;

    if show_output {
        print_fetch_summary(&report);
    }
    Ok(())
}

fn print_fetch_summary(report: &FetchReport) {
    println!("\n📊 Fetch Summary:");
    println!("   Repositories: {}", report.repositories);
    println!("   Contributors: {}", report.contributors);
    println!("   Records: {}", report.records);
    println!("   Duration: {:.1}s", report.elapsed.as_secs_f64());

    if !report.incomplete.is_empty() {
        println!(
            "\n⚠️  {} repositories were not fully aggregated:",
            report.incomplete.len()
        );
        for entry in &report.incomplete {
            let kind = match entry.status {
                RepoStatus::Degraded { .. } => "zero contributions",
                _ => "partial",
            };
            println!(
                "   - {}/{} ({}): {}",
                entry.org,
                entry.name,
                kind,
                entry.status.reason().unwrap_or_default()
            );
        }
    }

    println!(
        "\n✅ Fetch complete ({} mode)! Dataset saved to: {}",
        report.mode,
        report.output.display()
    );
}

/// Build the leaderboard from a stored dataset.
fn run_parse(args: &Args, config: &Config, parse: ParseArgs) -> Result<()> {
    let input = parse.input.unwrap_or_else(|| config.output.dataset.clone());
    let output = parse
        .output
        .unwrap_or_else(|| config.output.leaderboard.clone());

    let dataset = store::read_dataset(&input)
        .with_context(|| format!("Failed to load dataset {}", input.display()))?;
    for entry in dataset.incomplete() {
        warn!(
            "{} was incomplete during fetch: {}",
            entry.id(),
            entry.status.reason().unwrap_or_default()
        );
    }

    let board = analysis::build_leaderboard(&dataset);
    store::write_leaderboard(&output, &board)
        .with_context(|| format!("Failed to write leaderboard to {}", output.display()))?;
    info!(
        "Leaderboard: {} contributors, {} repositories",
        board.contributors.len(),
        board.repositories.len()
    );

    if let Some(ref md_path) = parse.markdown {
        let markdown = report::generate_markdown_report(&board, parse.limit);
        std::fs::write(md_path, markdown)
            .with_context(|| format!("Failed to write report to {}", md_path.display()))?;
        if !args.quiet {
            println!("📝 Markdown leaderboard saved to: {}", md_path.display());
        }
    }

    if !args.quiet {
        println!("✅ Leaderboard saved to: {}", output.display());
    }
    Ok(())
}

/// Render the static dashboard from a leaderboard file.
fn run_dashboard(args: &Args, config: &Config, dashboard: DashboardArgs) -> Result<()> {
    let input = dashboard
        .input
        .unwrap_or_else(|| config.output.leaderboard.clone());
    let output = dashboard
        .output
        .unwrap_or_else(|| config.output.dashboard.clone());

    let board = store::read_leaderboard(&input).with_context(|| {
        format!(
            "Failed to load leaderboard {} (run `ghcontrib parse` first)",
            input.display()
        )
    })?;

    let html = report::render_dashboard(&board);
    std::fs::write(&output, html)
        .with_context(|| format!("Failed to write dashboard to {}", output.display()))?;

    if !args.quiet {
        println!("✅ Dashboard saved to: {}", output.display());
    }
    Ok(())
}

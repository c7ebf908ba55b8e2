//! Top Sites entry point.

use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use top_sites::url::DEFAULT_CACHE_DIR;
use top_sites::{Credentials, FetchMode, HttpClient, Pipeline, SiteStore, DEFAULT_RETENTION};
use top_sites_cli::commands;
use top_sites_cli::config::{load_sites_file, resolve_db_path};

#[derive(Parser)]
#[command(
    name = "top-sites",
    about = "Collect newest posts, SEO metrics and social engagement for a list of sites",
    version
)]
struct Cli {
    /// Path to the site database.
    /// Also reads from TOP_SITES_DB env var.
    #[arg(long, global = true)]
    db: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and store the sites in a JSON file.
    Import {
        /// JSON array of site configurations.
        file: PathBuf,
    },

    /// Check a sites file without storing anything.
    Validate {
        /// JSON array of site configurations.
        file: PathBuf,
    },

    /// Run every directive for the stored sites, then render the report.
    Run {
        /// Read page HTML from the cache directory, fetching only on a miss.
        #[arg(long)]
        offline: bool,

        /// Cache directory used with --offline.
        #[arg(long, default_value = DEFAULT_CACHE_DIR)]
        cache_dir: PathBuf,

        /// Records kept per data point.
        #[arg(long, default_value_t = DEFAULT_RETENTION)]
        retention: usize,

        /// Report output file.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Only process these sites (by name).
        #[arg(long, num_args = 1..)]
        only: Vec<String>,
    },

    /// Render the report from stored data.
    Render {
        /// Report output file.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   top-sites completions bash > ~/.local/share/bash-completion/completions/top-sites
    ///   top-sites completions zsh > ~/.zfunc/_top-sites
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let db_path = resolve_db_path(cli.db.as_deref());

    match cli.command {
        Commands::Import { file } => {
            let blobs = load_sites_file(&file)?;
            let mut store = open_store(&db_path)?;
            let n = commands::import(&mut store, &blobs)?;
            println!("Imported {n} site(s) into {}", db_path.display());
        }

        Commands::Validate { file } => {
            let blobs = load_sites_file(&file)?;
            let results = commands::validate(&blobs);
            let mut invalid = 0;
            for result in &results {
                match &result.error {
                    None => println!("ok      {}", result.name),
                    Some(e) => {
                        invalid += 1;
                        println!("invalid {}: {e}", result.name);
                    }
                }
            }
            if invalid > 0 {
                eprintln!("{invalid} of {} site(s) invalid", results.len());
                std::process::exit(1);
            }
        }

        Commands::Run {
            offline,
            cache_dir,
            retention,
            report,
            only,
        } => {
            let credentials = Credentials::from_env()?;
            if credentials.moz.is_none() {
                tracing::warn!("No moz credentials; moz directives will fail");
            }
            if credentials.twitter.is_none() {
                tracing::warn!("No twitter credentials; twitter directives will fail");
            }

            let fetch_mode = if offline {
                FetchMode::CachedFile { cache_dir }
            } else {
                FetchMode::Live
            };
            let pipeline = Pipeline::from_credentials(HttpClient::default(), &credentials)
                .with_fetch_mode(fetch_mode)
                .with_retention(retention);

            let mut store = open_store(&db_path)?;
            let batch = commands::run(&mut store, &pipeline, &only).await?;

            let out = commands::report_path(report);
            let rendered = commands::render(&store, &out)?;
            println!(
                "Processed {} site(s), {} failed; report with {rendered} site(s) at {}",
                batch.sites.len(),
                batch.failures.len(),
                out.display()
            );
            for failure in &batch.failures {
                eprintln!("failed  {}: {}", failure.name, failure.error);
            }
            if !batch.is_clean() {
                std::process::exit(1);
            }
        }

        Commands::Render { report } => {
            let store = open_store(&db_path)?;
            let out = commands::report_path(report);
            let n = commands::render(&store, &out)?;
            println!("Rendered {n} site(s) to {}", out.display());
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "top-sites", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn open_store(path: &std::path::Path) -> anyhow::Result<SiteStore> {
    SiteStore::open(path).with_context(|| format!("failed to open site database {}", path.display()))
}

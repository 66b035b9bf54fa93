use clap::{Parser, Subcommand};
use log::{error, info, LevelFilter};
use std::path::PathBuf;
use std::process::ExitCode;
use unsplash_fill::client::ResilientClient;
use unsplash_fill::credentials::{resolve_access_keys, CredentialPool, KeySource};
use unsplash_fill::fill::{self, FillOptions};
use unsplash_fill::{config, output, scan};

const ENV_KEYS: &str = "UNSPLASH_ACCESS_KEYS";
const ENV_KEY: &str = "UNSPLASH_ACCESS_KEY";

#[derive(Parser)]
#[command(name = "unsplash-fill")]
#[command(about = "Fill image placeholders in HTML/JSX files with Unsplash photos")]
#[command(long_about = "\
Fill image placeholders in HTML/JSX files with Unsplash photos

Photos are hotlinked by URL, never downloaded. Mark up what you want filled:

  <img data-unsplash-auto>                   keyword derived from the page
  <img data-unsplash-search=\"misty forest\">  explicit search term
  <article data-unsplash-article>            photo after each heading section
  <div data-unsplash-article=\"paragraphs\">   photo after each paragraph
  <div data-unsplash-article=\"auto\">         headings if present, else a few paragraphs

Filled tags get data-unsplash-processed=\"true\" and are skipped on later runs.

Access keys (first source with any key wins):
  --keys a,b / --key a
  UNSPLASH_ACCESS_KEYS / UNSPLASH_ACCESS_KEY  (a .env file is honored)
  access_keys / access_key in unsplash.toml

Run 'unsplash-fill gen-config' to generate a documented unsplash.toml.")]
#[command(version)]
struct Cli {
    /// Target directory to scan
    #[arg(short, long, default_value = ".", global = true)]
    dir: PathBuf,

    /// Unsplash access key (single key)
    #[arg(short, long, global = true)]
    key: Option<String>,

    /// Comma-separated Unsplash access keys (key pool)
    #[arg(long, global = true)]
    keys: Option<String>,

    /// Log debug detail
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fill placeholders and illustrate articles, writing changed files
    Fill {
        /// Show what would be searched without calling the API or writing
        #[arg(long)]
        dry_run: bool,
    },
    /// List candidate files with their placeholders and articles (no network)
    Scan,
    /// Print a stock unsplash.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let mut clog = colog::default_builder();
    clog.filter(
        None,
        if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        },
    );
    clog.init();
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match cli.command {
        Command::Fill { dry_run } => {
            let config = config::load_config(&cli.dir)?;
            let keys = access_keys(cli.keys.as_deref(), cli.key.as_deref(), &config);
            let pool = CredentialPool::new(keys)?;
            let mut client = ResilientClient::new(pool, config.client.to_options());

            if dry_run {
                println!("=== DRY-RUN MODE: No changes will be made ===\n");
            }
            info!("Scanning directory: {}", cli.dir.display());
            let files = scan::scan(&cli.dir, &config.scan)?;
            info!("Found {} file(s)", files.len());

            let options = FillOptions { dry_run };
            let stats = fill::fill_directory(&cli.dir, &files, &mut client, &options);
            println!();
            output::print_summary(&stats, client.stats(), dry_run);

            Ok(if stats.has_failures() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Command::Scan => {
            let config = config::load_config(&cli.dir)?;
            let files = scan::scan(&cli.dir, &config.scan)?;
            let entries: Vec<output::ScanLine> = files
                .iter()
                .map(|file| {
                    let report = fill::inspect_file(&cli.dir, file).map_err(|e| e.to_string());
                    (file.document_key(), report)
                })
                .collect();
            output::print_scan(&entries);
            Ok(ExitCode::SUCCESS)
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Keys by precedence: CLI, then environment (after loading `.env`), then config.
fn access_keys(cli_keys: Option<&str>, cli_key: Option<&str>, config: &config::FillConfig) -> Vec<String> {
    dotenv::dotenv().ok();
    let env_keys = std::env::var(ENV_KEYS).ok();
    let env_key = std::env::var(ENV_KEY).ok();

    resolve_access_keys(
        &KeySource::from_values([cli_keys, cli_key]),
        &KeySource::from_values([env_keys.as_deref(), env_key.as_deref()]),
        &KeySource::from_values(config.key_values()),
    )
}

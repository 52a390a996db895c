//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use grimoire_catalog::{read_products, write_results};
use grimoire_core::{BatchOutcome, BatchProgress, BatchRunner, EnrichmentPipeline, StopFlag};
use grimoire_shared::{
    AppConfig, Credentials, EnrichmentResult, RunSettings, init_config, init_config_at,
    load_config, load_config_from,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Grimoire: enrich a product catalog with pages, images and copy.
#[derive(Parser)]
#[command(
    name = "grimoire",
    version,
    about = "Enrich a product catalog with sales pages, images and AI-written descriptions.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.grimoire/grimoire.toml).
    #[arg(long, global = true, env = "GRIMOIRE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Enrich every product in an input table and write the export.
    Enrich {
        /// Input table (.csv, .tsv, .txt, .xlsx or .xls).
        input: PathBuf,

        /// Export file, .csv or .xlsx (defaults to `output_file` from config).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory for downloaded images (defaults to `image_dir` from config).
        #[arg(long)]
        image_dir: Option<PathBuf>,

        /// Products processed at once; 1 runs strictly in order.
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "grimoire=info",
        1 => "grimoire=debug",
        _ => "grimoire=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Enrich {
            input,
            output,
            image_dir,
            concurrency,
        } => cmd_enrich(config_path, &input, output, image_dir, concurrency).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path).await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

/// Merge CLI overrides into the configured run settings.
fn run_settings(
    config: &AppConfig,
    output: Option<PathBuf>,
    image_dir: Option<PathBuf>,
    concurrency: Option<usize>,
) -> RunSettings {
    let mut settings = RunSettings::from(config);
    if let Some(output) = output {
        settings.output_file = output;
    }
    if let Some(image_dir) = image_dir {
        settings.image_dir = image_dir;
    }
    if let Some(concurrency) = concurrency {
        settings.concurrency = concurrency.max(1);
    }
    settings
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_enrich(
    config_path: Option<&Path>,
    input: &Path,
    output: Option<PathBuf>,
    image_dir: Option<PathBuf>,
    concurrency: Option<usize>,
) -> Result<()> {
    // Validate everything before the first product is touched
    let config = resolve_config(config_path)?;
    let credentials = Credentials::from_env(&config)?;
    let settings = run_settings(&config, output, image_dir, concurrency);

    if !input.exists() {
        return Err(eyre!("input file '{}' not found", input.display()));
    }
    let products = read_products(input, &config.columns)?;
    if products.is_empty() {
        println!("No products found in '{}'.", input.display());
        return Ok(());
    }

    let pipeline = EnrichmentPipeline::from_config(&config, &settings, &credentials)?;

    info!(
        input = %input.display(),
        products = products.len(),
        concurrency = settings.concurrency,
        "enriching catalog"
    );
    println!("Found {} products to process.", products.len());

    let stop = StopFlag::new();
    install_interrupt_handler(stop.clone());

    let reporter = Arc::new(CliProgress::new());
    let runner = BatchRunner::new(Arc::new(pipeline), settings.concurrency);
    let outcome = runner.run(products, &stop, reporter).await;

    if outcome.results.is_empty() {
        println!();
        println!("  No products were processed.");
        println!();
        return Ok(());
    }

    write_results(&settings.output_file, &outcome.results)?;
    print_summary(&outcome, &settings);

    Ok(())
}

/// Raise `stop` on the first Ctrl-C.
fn install_interrupt_handler(stop: StopFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight products");
            stop.stop();
        }
    });
}

fn print_summary(outcome: &BatchOutcome, settings: &RunSettings) {
    println!();
    if outcome.interrupted {
        println!("  Run interrupted; partial results saved.");
        println!("  Skipped:        {}", outcome.skipped);
    } else {
        println!("  All done!");
    }
    println!("  Products:       {}", outcome.results.len());
    println!("  Pages found:    {}", outcome.pages_found());
    println!("  Images found:   {}", outcome.images_found());
    println!("  Images saved:   {}", outcome.images_saved());
    println!("  Descriptions:   {}", outcome.descriptions_generated());
    println!("  Export:         {}", settings.output_file.display());
    println!("  Images:         {}", settings.image_dir.display());
    println!(
        "  Time:           {:.1}s",
        outcome.elapsed.as_secs_f64()
    );
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}",
            )
            .unwrap()
            .progress_chars("=> ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        Self { bar }
    }
}

impl BatchProgress for CliProgress {
    fn started(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_message("Processing products");
        self.bar.enable_steady_tick(std::time::Duration::from_millis(80));
    }

    fn product_done(&self, result: &EnrichmentResult) {
        self.bar.inc(1);
        self.bar.set_message(result.name().to_string());
    }

    fn finished(&self, _outcome: &BatchOutcome) {
        self.bar.finish_and_clear();
    }
}

async fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = match config_path {
        Some(p) => init_config_at(p)?,
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

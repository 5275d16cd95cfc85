use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jscov::cli;
use jscov::instrument::InstrumentOptions;
use jscov::tree::SummarizerKind;

/// JavaScript coverage instrumentation, merging and reporting.
#[derive(Parser)]
#[command(name = "jscov", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Instrument a JavaScript file.
    Instrument {
        /// Source file to instrument.
        file: PathBuf,

        /// Where to write the instrumented code (default: stdout).
        #[arg(long)]
        output: Option<PathBuf>,

        /// Where to write the zeroed coverage skeleton.
        #[arg(long)]
        coverage_out: Option<PathBuf>,

        /// JSON file with instrumenter options (camelCase keys).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Accept `import`/`export` statements.
        #[arg(long)]
        es_modules: bool,

        /// Allow top-level `return`.
        #[arg(long)]
        auto_wrap: bool,
    },

    /// Merge raw coverage snapshots into one.
    Merge {
        /// Raw coverage JSON files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output file.
        #[arg(long)]
        output: PathBuf,
    },

    /// Print a coverage table.
    Summary {
        /// Raw coverage JSON files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Tree shape: flat, pkg or nested.
        #[arg(long, default_value = "pkg")]
        tree: String,
    },

    /// Show uncovered lines for a source file.
    Uncovered {
        /// Raw coverage JSON files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// The source file path (as stored in the coverage data).
        #[arg(long)]
        source_file: String,
    },

    /// Remap coverage of generated files onto their original sources.
    Remap {
        /// Raw coverage JSON files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output file.
        #[arg(long)]
        output: PathBuf,
    },
}

fn load_options(config: Option<&PathBuf>) -> Result<InstrumentOptions> {
    let Some(path) = config else {
        return Ok(InstrumentOptions::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid options in {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let output = match cli.command {
        Commands::Instrument {
            file,
            output,
            coverage_out,
            config,
            es_modules,
            auto_wrap,
        } => {
            let mut opts = load_options(config.as_ref())?;
            opts.es_modules |= es_modules;
            opts.auto_wrap |= auto_wrap;
            cli::cmd_instrument(&file, output.as_deref(), coverage_out.as_deref(), opts)
        }
        Commands::Merge { files, output } => cli::cmd_merge(&files, &output),
        Commands::Summary { files, tree } => {
            let kind: SummarizerKind = tree.parse()?;
            cli::cmd_summary(&files, kind)
        }
        Commands::Uncovered { files, source_file } => cli::cmd_uncovered(&files, &source_file),
        Commands::Remap { files, output } => cli::cmd_remap(&files, &output),
    }?;

    print!("{output}");
    Ok(())
}

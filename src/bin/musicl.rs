use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, FromArgMatches, Parser};
use musicl::{report, AppConfig, GenreClassifier, GenreTable, RandomForestModel, VERSION};
use tracing_subscriber::EnvFilter;

/// Help description listing the genres the configured table can report
fn about(genres: &GenreTable) -> String {
    format!(
        "Script for genres Music Classification (MusiCl)\n\nRecognizable genres: {}",
        genres.labels().collect::<Vec<_>>().join(", ")
    )
}

#[derive(Parser, Debug)]
#[command(
    name = "musicl",
    after_help = "Authors: Aleksey Ermolaev, Katerina Danko, Daria Andreeva, \
                  Evgenia Khokhlova, Aleksandr Andreev, Daniil Panshin",
    disable_version_flag = true
)]
struct Cli {
    /// Show version
    #[arg(short = 'v', long = "version")]
    version: bool,

    /// Path to song
    #[arg(value_name = "path", required_unless_present = "version")]
    path: Option<PathBuf>,
}

fn main() -> ExitCode {
    init_logging();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<()> {
    let config = AppConfig::load();
    let matches = Cli::command().about(about(&config.genres)).get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());

    if cli.version {
        println!("Current version is {VERSION}");
        return Ok(());
    }
    let path = cli.path.context("missing song path")?;
    let span = tracing::info_span!("musicl", song = %path.display());
    let _guard = span.enter();

    let model = RandomForestModel::load(&config.model.path)
        .with_context(|| format!("loading model {}", config.model.path.display()))?;
    let classifier = GenreClassifier::new(Arc::new(model), &config.genres)
        .context("matching model classes to genre labels")?;

    // Transient status line; the report overwrites it
    print!("{}\r", report::PROGRESS_LINE);
    std::io::stdout().flush().context("writing progress line")?;

    let table = musicl::classify_file(&path, &classifier)
        .with_context(|| format!("classifying {}", path.display()))?;

    println!("{}", report::render_report(&report::song_name(&path), &table));
    Ok(())
}

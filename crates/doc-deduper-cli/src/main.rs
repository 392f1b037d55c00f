use clap::{Parser, Subcommand, ValueEnum};
use doc_deduper_core::config::LogLevel;
use doc_deduper_core::{
    logging, Config, DocDeduper, DuplicatePolicy, MetadataContextProvider, RunReport, SortStrategy,
};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::atomic::Ordering;

#[derive(Parser)]
#[command(name = "doc-deduper")]
#[command(about = "Deduplicate, rename and sort document files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Category,
    Date,
    Type,
}

impl From<SortArg> for SortStrategy {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Category => SortStrategy::ByCategory,
            SortArg::Date => SortStrategy::ByDate,
            SortArg::Type => SortStrategy::ByType,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a directory for duplicates and plan short names
    Scan {
        /// Directory to scan
        root: PathBuf,

        /// Apply changes (the default is a dry run)
        #[arg(long)]
        commit: bool,

        /// Send duplicates to the trash instead of quarantining them
        #[arg(long)]
        delete: bool,

        /// Move surviving files into subfolders
        #[arg(long, value_enum)]
        sort: Option<SortArg>,

        /// Maximum stem length of generated names
        #[arg(long)]
        budget: Option<usize>,

        /// Use YYMMDD dates in generated names
        #[arg(long)]
        short_date: bool,

        /// Also report near-duplicate documents
        #[arg(long)]
        near: bool,

        /// Near-duplicate similarity threshold
        #[arg(long)]
        threshold: Option<f64>,

        /// Where to write inventory.json and summary.json
        #[arg(long)]
        report_dir: Option<PathBuf>,

        /// Write a rotating log file here instead of logging to stderr
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Show a progress bar while hashing
        #[arg(long)]
        progress: bool,

        /// Verbosity level
        #[arg(short, long, action = clap::ArgAction::Count)]
        verbose: u8,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Generate default configuration file
    GenerateConfig {
        /// Path to save configuration file
        #[arg(default_value = "doc-deduper.json")]
        path: PathBuf,
    },
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            root,
            commit,
            delete,
            sort,
            budget,
            short_date,
            near,
            threshold,
            report_dir,
            log_dir,
            progress,
            verbose,
            config,
        } => {
            let mut config = match config {
                Some(path) => Config::from_file(&path)?,
                None => Config::default(),
            };

            // Override config with command line arguments
            if commit {
                config.dry_run = false;
            }
            if delete {
                config.duplicate_policy = DuplicatePolicy::Delete;
            }
            if let Some(sort) = sort {
                config.sort_strategy = Some(sort.into());
            }
            if let Some(budget) = budget {
                config.max_stem_len = budget;
            }
            if let Some(threshold) = threshold {
                config.near_threshold = threshold;
            }
            if report_dir.is_some() {
                config.report_dir = report_dir;
            }
            config.use_short_date |= short_date;
            config.detect_near |= near;
            config.show_progress |= progress;
            config.log_level = match verbose {
                0 => config.log_level,
                1 => LogLevel::Debug,
                _ => LogLevel::Trace,
            };

            init_logging(log_dir, config.log_level)?;

            let deduper = DocDeduper::new(config)?;
            let shutdown = deduper.shutdown_handle();
            ctrlc::set_handler(move || {
                warn!("Interrupt received, stopping after the current file");
                shutdown.store(true, Ordering::SeqCst);
            })?;

            let provider = MetadataContextProvider::from_config(deduper.config());
            let report = deduper.run(&root, &provider)?;
            print_summary(&report);
            info!("Run complete");
            Ok(())
        }

        Commands::GenerateConfig { path } => {
            let config = Config::default();
            config.save_to_file(&path)?;
            println!("Configuration file generated at: {}", path.display());
            Ok(())
        }
    }
}

fn init_logging(log_dir: Option<PathBuf>, level: LogLevel) -> anyhow::Result<()> {
    match log_dir {
        Some(dir) => logging::init_logger(&dir, level.into())?,
        None => env_logger::Builder::new()
            .filter_level(level.into())
            .parse_env(logging::LOG_ENV_VAR)
            .init(),
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    let s = &report.summary;
    println!("Mode:              {}", s.mode);
    println!("Files scanned:     {}", s.files_scanned);
    println!(
        "Renamed:           {} ({} failed, {} already named)",
        s.renamed, s.rename_failed, s.rename_skipped
    );
    println!(
        "Duplicate groups:  {} ({} redundant files)",
        s.duplicate_groups, s.duplicate_files
    );
    println!("Quarantined:       {}", s.quarantined);
    println!("Deleted:           {}", s.deleted);
    println!("Sorted:            {}", s.sorted);
    if s.near_pairs > 0 {
        println!("Near duplicates:   {}", s.near_pairs);
        for pair in &report.near_pairs {
            println!(
                "  {:.2}  {}  ~  {}",
                pair.similarity,
                pair.first.path.display(),
                pair.second.path.display()
            );
        }
    }
    if s.collisions > 0 {
        println!("Name collisions:   {}", s.collisions);
    }
    if s.naming_exhausted > 0 {
        println!("Naming exhausted:  {}", s.naming_exhausted);
    }
    if s.unreadable > 0 {
        println!("Unreadable files:  {}", s.unreadable);
    }

    let failed: Vec<_> = report.rows.iter().filter(|r| !r.error_msg.is_empty()).collect();
    if !failed.is_empty() {
        println!("Errors:");
        for row in failed {
            println!("  {}: {}", row.path_old.display(), row.error_msg);
        }
    }
    if s.interrupted {
        println!("Run was interrupted before all files were processed.");
    }
    println!("Finished in {:.2}s", s.duration_secs);
}

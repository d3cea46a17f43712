//! CLI module - Command line interface definitions and handlers

pub mod report;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use walkdir::{DirEntry, WalkDir};

use crate::config::{Config, OutputFormat, ScanConfig};
use crate::core::{Identification, MagicEngine};
use crate::db::RuleSet;
use report::{FileReport, ScanSummary};

/// magicdb - Signature-driven file format identification
///
/// Matches files against a FILE_ID magic database and reports the detected
/// format together with metadata such as MIME type, resolution or title.
/// Files are only ever read.
#[derive(Parser, Debug)]
#[command(name = "magicdb")]
#[command(version)]
#[command(about = "Identify file formats from a magic signature database", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output (per-rule decisions)
    #[arg(long, short, global = true)]
    pub debug: bool,

    /// Configuration file (default: platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Identify files and directories
    Identify(IdentifyArgs),

    /// Parse a rule database and report rule counts
    Check(CheckArgs),

    /// Print a sample configuration file
    Config,
}

#[derive(Debug, Clone, Args)]
pub struct IdentifyArgs {
    /// Files or directories to identify
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Recursively scan directories
    #[arg(long, short)]
    pub recursive: bool,

    /// Brief output: one line per file
    #[arg(long, short)]
    pub brief: bool,

    /// Report format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Rule database (default: built-in)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Read files as streams instead of memory mapping them
    #[arg(long)]
    pub stream: bool,

    /// Include hidden files and directories
    #[arg(long)]
    pub hidden: bool,

    /// Maximum depth to traverse
    #[arg(long)]
    pub depth: Option<usize>,

    /// Number of parallel workers (default: CPU count)
    #[arg(long, short)]
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Args)]
pub struct CheckArgs {
    /// Rule database to check (default: built-in)
    #[arg(long)]
    pub db: Option<PathBuf>,
}

/// Build an engine from `db`, or from the built-in database.
pub fn load_engine(db: Option<&Path>) -> Result<MagicEngine> {
    let rules = match db {
        Some(path) => RuleSet::from_path(path)
            .with_context(|| format!("Failed to load magic database: {}", path.display()))?,
        None => RuleSet::builtin().context("Built-in magic database is invalid")?,
    };
    Ok(MagicEngine::new(rules))
}

/// Expand the command line paths into the list of files to identify.
///
/// Plain files are taken as given. Directories are walked only when
/// `scan.recursive` is set; hidden entries below them are skipped unless
/// `scan.skip_hidden` is off.
pub fn collect_files(paths: &[PathBuf], scan: &ScanConfig) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for root in paths {
        if !root.is_dir() {
            files.push(root.clone());
            continue;
        }
        if !scan.recursive {
            tracing::warn!(path = %root.display(), "Skipping directory (use --recursive)");
            continue;
        }

        let mut walker = WalkDir::new(root)
            .follow_links(scan.follow_links)
            .sort_by_file_name();
        if scan.max_depth > 0 {
            walker = walker.max_depth(scan.max_depth);
        }

        let skip_hidden = scan.skip_hidden;
        let entries = walker
            .into_iter()
            .filter_entry(move |e| e.depth() == 0 || !skip_hidden || !is_hidden(e));

        for entry in entries {
            match entry {
                Ok(e) if e.file_type().is_file() => files.push(e.into_path()),
                Ok(_) => {}
                Err(e) => tracing::warn!("Walk error: {}", e),
            }
        }
    }

    tracing::debug!(files_found = files.len(), "Collected files");
    files
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

/// Identify one file, memory mapped or as a bounded stream.
pub fn identify_file(
    engine: &MagicEngine,
    path: &Path,
    stream: bool,
    mark_limit: usize,
) -> Result<Identification> {
    let id = if stream {
        let file = File::open(path)?;
        engine.identify_reader(BufReader::new(file), mark_limit)?
    } else {
        engine.identify_path(path)?
    };
    Ok(id)
}

/// Merge command line flags over the configuration.
pub fn effective_config(args: &IdentifyArgs, mut config: Config) -> Config {
    config.scan.recursive |= args.recursive;
    if args.hidden {
        config.scan.skip_hidden = false;
    }
    if let Some(depth) = args.depth {
        config.scan.max_depth = depth;
    }
    if let Some(workers) = args.workers {
        config.scan.workers = workers;
    }
    config.output.brief |= args.brief;
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if args.db.is_some() {
        config.database.path = args.db.clone();
    }
    config
}

/// `magicdb identify`
pub fn run_identify(args: &IdentifyArgs, config: Config) -> Result<ScanSummary> {
    let config = effective_config(args, config);
    let engine = load_engine(config.database.path.as_deref())?;
    let files = collect_files(&args.paths, &config.scan);

    let workers = config.scan.effective_workers();
    tracing::info!(files = files.len(), workers, "Identifying");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .context("Failed to start worker pool")?;

    let mark_limit = config.scan.mark_limit;
    let results: Vec<(PathBuf, Result<Identification>)> = pool.install(|| {
        files
            .par_iter()
            .map(|path| {
                let result = identify_file(&engine, path, args.stream, mark_limit);
                (path.clone(), result)
            })
            .collect()
    });

    let mut summary = ScanSummary::default();
    let mut reports = Vec::new();

    for (path, result) in results {
        match result {
            Ok(identification) => {
                summary.record(&identification);
                match config.output.format {
                    OutputFormat::Json => reports.push(FileReport {
                        path,
                        identification,
                    }),
                    OutputFormat::Human if config.output.brief => {
                        println!("{}", report::render_brief(&path, &identification));
                    }
                    OutputFormat::Human => {
                        print!("{}", report::render_human(&path, &identification));
                    }
                }
            }
            Err(e) => {
                summary.failed += 1;
                tracing::warn!(path = %path.display(), "Could not read, skipping: {:#}", e);
            }
        }
    }

    match config.output.format {
        OutputFormat::Json => {
            let doc = report::JsonReport {
                files: reports,
                summary,
            };
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        OutputFormat::Human => print!("\n{}", summary),
    }

    Ok(summary)
}

/// `magicdb check`
pub fn run_check(args: &CheckArgs, config: &Config) -> Result<()> {
    let path = args.db.as_deref().or(config.database.path.as_deref());
    let engine = load_engine(path)?;
    let stats = engine.rules().stats();

    let source = path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "built-in".to_string());
    println!("{}", report::render_stats(&source, &stats));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn scan(recursive: bool, skip_hidden: bool) -> ScanConfig {
        ScanConfig {
            recursive,
            skip_hidden,
            ..ScanConfig::default()
        }
    }

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.png"), b"\x89PNG\r\n\x1a\n").unwrap();
        fs::write(dir.path().join(".hidden"), b"x").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("b.txt"), b"text").unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git").join("HEAD"), b"ref").unwrap();
        dir
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_collect_recursive_skips_hidden() {
        let dir = tree();
        let files = collect_files(&[dir.path().to_path_buf()], &scan(true, true));
        assert_eq!(names(&files), vec!["a.png", "b.txt"]);
    }

    #[test]
    fn test_collect_including_hidden() {
        let dir = tree();
        let files = collect_files(&[dir.path().to_path_buf()], &scan(true, false));
        assert_eq!(files.len(), 4);
    }

    #[test]
    fn test_collect_directory_without_recursion() {
        let dir = tree();
        let file = dir.path().join("a.png");
        let files = collect_files(&[dir.path().to_path_buf(), file.clone()], &scan(false, true));
        assert_eq!(files, vec![file]);
    }

    #[test]
    fn test_collect_max_depth() {
        let dir = tree();
        let mut config = scan(true, true);
        config.max_depth = 1;
        let files = collect_files(&[dir.path().to_path_buf()], &config);
        assert_eq!(names(&files), vec!["a.png"]);
    }

    #[test]
    fn test_effective_config_flags_override() {
        let args = IdentifyArgs {
            paths: vec![PathBuf::from(".")],
            recursive: true,
            brief: false,
            format: Some(OutputFormat::Json),
            db: Some(PathBuf::from("custom.db")),
            stream: false,
            hidden: true,
            depth: Some(3),
            workers: Some(2),
        };
        let config = effective_config(&args, Config::default());
        assert!(config.scan.recursive);
        assert!(!config.scan.skip_hidden);
        assert_eq!(config.scan.max_depth, 3);
        assert_eq!(config.scan.workers, 2);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.database.path, Some(PathBuf::from("custom.db")));
    }

    #[test]
    fn test_identify_file_both_modes() {
        let dir = tree();
        let engine = load_engine(None).unwrap();
        let path = dir.path().join("a.png");
        let mapped = identify_file(&engine, &path, false, 1024).unwrap();
        let streamed = identify_file(&engine, &path, true, 1024).unwrap();
        assert_eq!(mapped.mime(), Some("image/png"));
        assert_eq!(mapped, streamed);
    }

    #[test]
    fn test_load_engine_reports_bad_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.db");
        fs::write(&path, "not a database\n").unwrap();
        let err = load_engine(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("bad.db"));
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["magicdb", "-d", "identify", "-r", "-b", "x", "y"]).unwrap();
        assert!(cli.debug);
        match cli.command {
            Commands::Identify(args) => {
                assert!(args.recursive);
                assert!(args.brief);
                assert_eq!(args.paths.len(), 2);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["magicdb", "identify"]).is_err());
    }
}

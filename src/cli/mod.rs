//! # CLI Module
//!
//! Command-line interface for the photo catalog.
//!
//! ## Usage
//! ```bash
//! # Register and index a folder, hashing for duplicate detection
//! photo-catalog scan ~/Pictures --duplicates
//!
//! # Whole-drive scan that skips system and program folders
//! photo-catalog scan / --safe-mode
//!
//! # Search, newest first, as JSON
//! photo-catalog query ~/Pictures --search "beach dog" --output json
//!
//! # Preview, then apply, a year/month reorganization
//! photo-catalog organize ~/Pictures
//! photo-catalog organize ~/Pictures --apply
//! ```

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use photo_catalog::core::cancel::CancellationToken;
use photo_catalog::core::catalog::{CatalogStore, SqliteCatalog};
use photo_catalog::core::duplicates::DuplicateDetector;
use photo_catalog::core::metadata::ExifMetadataExtractor;
use photo_catalog::core::model::{DateTakenSource, PhotoAsset, ScanRoot};
use photo_catalog::core::organize::{OrganizeExecutor, OrganizePlanner, OrganizerAuditLog};
use photo_catalog::core::paths::normalize_path;
use photo_catalog::core::query::{PhotoQueryFilter, PhotoSortOption, QueryEngine};
use photo_catalog::core::scanner::{ScanOptions, Scanner};
use photo_catalog::core::storage::StoragePaths;
use photo_catalog::error::{CatalogError, Result, StoreError};
use photo_catalog::events::{Event, EventChannel, EventReceiver, HashEvent, OrganizeEvent, ScanEvent};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

/// Photo Catalog - Index, search and organize your photos
#[derive(Parser, Debug)]
#[command(name = "photo-catalog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the catalog database and organizer log
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered scan roots
    Roots,

    /// Register a folder without scanning it
    AddRoot {
        path: PathBuf,

        /// Hash files so identical copies can be found
        #[arg(long)]
        duplicates: bool,
    },

    /// Index a folder, picking up new, changed and removed photos
    Scan {
        path: PathBuf,

        /// Turn on duplicate detection for this root
        #[arg(long)]
        duplicates: bool,

        /// Skip OS, program and package-cache folders (whole-drive scans)
        #[arg(long)]
        safe_mode: bool,

        /// Skip hidden and system folders
        #[arg(long)]
        skip_hidden: bool,

        /// Do not descend into symlinked folders
        #[arg(long)]
        skip_links: bool,
    },

    /// Hash photos that have no content hash yet
    Hash { path: PathBuf },

    /// List groups of byte-identical photos
    Duplicates {
        path: PathBuf,

        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Search the catalog
    Query {
        path: PathBuf,

        /// Words matched against names, notes, tags, people and animals
        #[arg(short, long)]
        search: Option<String>,

        #[arg(long)]
        person: Option<String>,

        #[arg(long)]
        animal: Option<String>,

        /// Earliest capture date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        from: Option<NaiveDate>,

        /// Latest capture date (YYYY-MM-DD), inclusive
        #[arg(long, value_parser = parse_date)]
        to: Option<NaiveDate>,

        /// Where the capture date came from
        #[arg(long)]
        date_source: Option<DateSource>,

        /// Folder below the root, e.g. "Vacation/2023"
        #[arg(long)]
        folder: Option<String>,

        /// all, unknown, recent, duplicates, dup:<hash>, year:YYYY, month:YYYY-MM
        #[arg(long)]
        album: Option<String>,

        #[arg(long, default_value = "date-taken-newest")]
        sort: Sort,

        #[arg(long, default_value_t = 1)]
        page: usize,

        #[arg(long, default_value_t = 120)]
        page_size: usize,

        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Show smart albums with their counts
    Albums { path: PathBuf },

    /// Show the folders that contain photos
    Folders { path: PathBuf },

    /// Plan a year/month reorganization, and apply it with --apply
    Organize {
        path: PathBuf,

        /// Move the files instead of only previewing
        #[arg(long)]
        apply: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Sort {
    DateTakenNewest,
    DateTakenOldest,
    DateIndexedNewest,
    DateIndexedOldest,
    SizeLargest,
    SizeSmallest,
    NameAscending,
    NameDescending,
}

impl From<Sort> for PhotoSortOption {
    fn from(sort: Sort) -> Self {
        match sort {
            Sort::DateTakenNewest => PhotoSortOption::DateTakenNewest,
            Sort::DateTakenOldest => PhotoSortOption::DateTakenOldest,
            Sort::DateIndexedNewest => PhotoSortOption::DateAddedNewest,
            Sort::DateIndexedOldest => PhotoSortOption::DateAddedOldest,
            Sort::SizeLargest => PhotoSortOption::FileSizeLargest,
            Sort::SizeSmallest => PhotoSortOption::FileSizeSmallest,
            Sort::NameAscending => PhotoSortOption::NameAscending,
            Sort::NameDescending => PhotoSortOption::NameDescending,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateSource {
    Exif,
    FileCreated,
    FileModified,
    Unknown,
}

impl From<DateSource> for DateTakenSource {
    fn from(source: DateSource) -> Self {
        match source {
            DateSource::Exif => DateTakenSource::Exif,
            DateSource::FileCreated => DateTakenSource::FileCreated,
            DateSource::FileModified => DateTakenSource::FileModified,
            DateSource::Unknown => DateTakenSource::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

fn parse_date(value: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

/// Open catalog plus where it lives
struct Session {
    paths: StoragePaths,
    store: Arc<dyn CatalogStore>,
    term: Term,
}

impl Session {
    fn open(data_dir: Option<PathBuf>) -> Result<Self> {
        let paths = StoragePaths::resolve(data_dir);
        paths.ensure_exists()?;
        let store = SqliteCatalog::open(&paths.database())?;
        Ok(Self {
            paths,
            store: Arc::new(store),
            term: Term::stderr(),
        })
    }

    fn scanner(&self) -> Scanner {
        Scanner::new(self.store.clone(), Arc::new(ExifMetadataExtractor))
    }

    fn audit_log(&self) -> OrganizerAuditLog {
        OrganizerAuditLog::new(self.paths.organizer_log())
    }

    /// The registered root for `path`.
    fn root(&self, path: &Path) -> Result<ScanRoot> {
        let normalized = normalize_path(path)?;
        self.store.find_root_by_path(&normalized)?.ok_or_else(|| {
            CatalogError::InvalidInput(format!(
                "{} is not a scan root yet. Run `photo-catalog scan {}` first.",
                normalized.display(),
                path.display()
            ))
        })
    }

    fn line(&self, text: impl AsRef<str>) {
        self.term.write_line(text.as_ref()).ok();
    }
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let session = Session::open(cli.data_dir)?;

    match cli.command {
        Commands::Roots => run_roots(&session),
        Commands::AddRoot { path, duplicates } => run_add_root(&session, &path, duplicates),
        Commands::Scan {
            path,
            duplicates,
            safe_mode,
            skip_hidden,
            skip_links,
        } => {
            let options = ScanOptions {
                exclude_likely_system_and_program_directories: safe_mode,
                skip_hidden_and_system_directories: skip_hidden || safe_mode,
                skip_reparse_points: skip_links || safe_mode,
            };
            run_scan(&session, &path, duplicates, options)
        }
        Commands::Hash { path } => run_hash(&session, &path),
        Commands::Duplicates { path, output } => run_duplicates(&session, &path, output),
        Commands::Query {
            path,
            search,
            person,
            animal,
            from,
            to,
            date_source,
            folder,
            album,
            sort,
            page,
            page_size,
            output,
        } => {
            let root = session.root(&path)?;
            let filter = PhotoQueryFilter {
                scan_root_id: Some(root.id),
                search_text: search,
                person_search_text: person,
                animal_search_text: animal,
                from_date_utc: from.map(start_of_day),
                to_date_utc: to.map(end_of_day),
                date_source: date_source.map(Into::into),
                folder_subpath: folder,
                album_key: album,
                sort_by: sort.into(),
                page,
                page_size,
            };
            run_query(&session, &filter, output)
        }
        Commands::Albums { path } => run_albums(&session, &path),
        Commands::Folders { path } => run_folders(&session, &path),
        Commands::Organize { path, apply } => run_organize(&session, &path, apply),
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    start_of_day(date) + chrono::Duration::days(1) - chrono::Duration::milliseconds(1)
}

fn run_roots(session: &Session) -> Result<()> {
    let roots = session.scanner().list_roots()?;
    if roots.is_empty() {
        session.line(format!("{}", style("No scan roots registered.").dim()));
        return Ok(());
    }

    for root in roots {
        let last_scan = root
            .last_scan_utc
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        session.line(format!(
            "  {} {}  {} files, last scan {}{}",
            style(format!("#{}", root.id)).bold(),
            root.root_path.display(),
            style(root.total_files_last_scan).cyan(),
            style(last_scan).dim(),
            if root.enable_duplicate_detection {
                style(" [duplicates]").yellow().to_string()
            } else {
                String::new()
            }
        ));
    }
    Ok(())
}

fn run_add_root(session: &Session, path: &Path, duplicates: bool) -> Result<()> {
    let root = session.scanner().get_or_create_root(path, duplicates)?;
    session.line(format!(
        "{} Registered {} as root #{}",
        style("✓").green().bold(),
        root.root_path.display(),
        root.id
    ));
    Ok(())
}

fn run_scan(session: &Session, path: &Path, duplicates: bool, options: ScanOptions) -> Result<()> {
    let scanner = session.scanner();
    let existing = session.store.find_root_by_path(&normalize_path(path)?)?;
    let enable = duplicates || existing.is_some_and(|r| r.enable_duplicate_detection);
    let root = scanner.get_or_create_root(path, enable)?;

    session.line(format!(
        "{} {}",
        style("Scanning").bold().cyan(),
        root.root_path.display()
    ));

    let (sender, receiver) = EventChannel::new();
    let progress = spawn_progress(receiver);
    let result = scanner.scan(root.id, &options, &sender, &CancellationToken::new());
    drop(sender);
    progress.join().ok();
    let summary = result?;

    session.line(format!("{} Scan Complete", style("✓").green().bold()));
    session.line(format!(
        "  {} found, {} new, {} updated, {} unchanged, {} removed in {:.1}s",
        style(summary.found).cyan(),
        style(summary.indexed).green(),
        style(summary.updated).yellow(),
        summary.skipped,
        style(summary.removed).red(),
        summary.duration_ms as f64 / 1000.0
    ));
    if summary.directories_skipped > 0 {
        session.line(format!(
            "  {}",
            style(format!("{} folders skipped", summary.directories_skipped)).dim()
        ));
    }
    Ok(())
}

fn run_hash(session: &Session, path: &Path) -> Result<()> {
    let root = session.root(path)?;
    let detector = DuplicateDetector::new(session.store.clone())?;

    let (sender, receiver) = EventChannel::new();
    let progress = spawn_progress(receiver);
    let result = detector.compute_missing_hashes(root.id, &sender, &CancellationToken::new());
    drop(sender);
    progress.join().ok();

    session.line(format!(
        "{} {} photos hashed",
        style("✓").green().bold(),
        style(result?).cyan()
    ));
    Ok(())
}

fn run_duplicates(session: &Session, path: &Path, output: OutputFormat) -> Result<()> {
    let root = session.root(path)?;
    let detector = DuplicateDetector::new(session.store.clone())?;
    let groups = detector.duplicate_groups(root.id)?;

    match output {
        OutputFormat::Json => print_json(&groups),
        OutputFormat::Pretty => {
            if groups.is_empty() {
                session.line("  No duplicates found.");
            }
            for group in &groups {
                session.line(format!(
                    "  {} {} copies",
                    style(&group.sha256[..group.sha256.len().min(16)]).yellow(),
                    style(group.count).cyan()
                ));
            }
            Ok(())
        }
    }
}

fn run_query(session: &Session, filter: &PhotoQueryFilter, output: OutputFormat) -> Result<()> {
    let engine = QueryEngine::new(session.store.clone())?;
    let result = engine.query(filter, &CancellationToken::new())?;

    match output {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Pretty => {
            let page_size = filter.effective_page_size();
            let pages = result.total_count.div_ceil(page_size).max(1);
            session.line(format!(
                "{} matches, page {} of {}",
                style(result.total_count).cyan().bold(),
                filter.effective_page(),
                pages
            ));
            for asset in &result.items {
                session.line(format_asset(asset));
            }
            Ok(())
        }
    }
}

fn format_asset(asset: &PhotoAsset) -> String {
    let taken = asset
        .date_taken
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "----------".to_string());
    format!(
        "  {} {} {}",
        style(taken).dim(),
        asset.full_path.display(),
        style(format_bytes(asset.file_size_bytes)).dim()
    )
}

fn run_albums(session: &Session, path: &Path) -> Result<()> {
    let root = session.root(path)?;
    let engine = QueryEngine::new(session.store.clone())?;
    for album in engine.smart_albums(Some(root.id))? {
        session.line(format!(
            "  {:<20} {:>8}  {}",
            album.name,
            style(album.count).cyan(),
            style(album.key).dim()
        ));
    }
    Ok(())
}

fn run_folders(session: &Session, path: &Path) -> Result<()> {
    let root = session.root(path)?;
    let engine = QueryEngine::new(session.store.clone())?;
    for folder in engine.folder_subpaths(root.id)? {
        println!("{}", folder);
    }
    Ok(())
}

fn run_organize(session: &Session, path: &Path, apply: bool) -> Result<()> {
    let root = session.root(path)?;
    let cancel = CancellationToken::new();
    let (sender, receiver) = EventChannel::new();
    let progress = spawn_progress(receiver);

    let planner = OrganizePlanner::new(session.store.clone(), session.audit_log());
    let plan = planner.create_plan(root.id, &sender, &cancel);
    let plan = match plan {
        Ok(plan) => plan,
        Err(e) => {
            drop(sender);
            progress.join().ok();
            return Err(e);
        }
    };

    for item in &plan.items {
        session.line(format!(
            "  {} {} {}",
            item.source_path.display(),
            style("→").dim(),
            item.destination_path.display()
        ));
    }
    session.line(format!(
        "{} photos evaluated, {} to move",
        style(plan.total_evaluated).cyan(),
        style(plan.total_moves).yellow().bold()
    ));

    if !apply {
        drop(sender);
        progress.join().ok();
        session.line(format!(
            "{}",
            style("Preview only. Nothing was moved; re-run with --apply.").dim()
        ));
        return Ok(());
    }

    let executor = OrganizeExecutor::new(session.store.clone(), session.audit_log());
    let result = executor.apply_plan(root.id, &plan.items, &sender, &cancel);
    drop(sender);
    progress.join().ok();
    let result = result?;

    session.line(format!(
        "{} Moved {}, skipped {}, failed {}",
        style("✓").green().bold(),
        style(result.moved).green(),
        style(result.skipped).yellow(),
        style(result.failed).red()
    ));
    for error in &result.errors {
        session.line(format!("  {}", style(error).red()));
    }
    session.line(format!(
        "{}",
        style(format!("Log: {}", session.paths.organizer_log().display())).dim()
    ));
    Ok(())
}

/// Drive a progress bar from catalog events until every sender is dropped.
fn spawn_progress(receiver: EventReceiver) -> thread::JoinHandle<()> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );

    thread::spawn(move || {
        for event in receiver.iter() {
            match event {
                Event::Scan(ScanEvent::Progress(p)) => {
                    pb.set_length(p.found as u64);
                    pb.set_position((p.indexed + p.updated + p.skipped) as u64);
                    pb.set_message(file_label(&p.current_file));
                }
                Event::Scan(ScanEvent::Completed(_)) => pb.finish_and_clear(),
                Event::Hash(HashEvent::Started { total }) => pb.set_length(total as u64),
                Event::Hash(HashEvent::Progress(p)) => {
                    pb.set_position(p.completed as u64);
                    pb.set_message(file_label(&p.current_path));
                }
                Event::Hash(HashEvent::Completed { .. }) => pb.finish_and_clear(),
                Event::Organize(OrganizeEvent::ApplyProgress {
                    attempted,
                    total,
                    current_path,
                }) => {
                    pb.set_length(total as u64);
                    pb.set_position(attempted as u64);
                    pb.set_message(file_label(&current_path));
                }
                Event::Organize(OrganizeEvent::ApplyCompleted { .. }) => pb.finish_and_clear(),
                _ => {}
            }
        }
        pb.finish_and_clear();
    })
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_bounds_cover_the_whole_day() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 31).unwrap();
        assert_eq!(start_of_day(date).to_rfc3339(), "2023-01-31T00:00:00+00:00");
        assert_eq!(
            end_of_day(date).timestamp_millis() - start_of_day(date).timestamp_millis(),
            86_399_999
        );
    }

    #[test]
    fn bad_dates_are_rejected() {
        assert!(parse_date("2023-13-01").is_err());
        assert!(parse_date("2023-02-28").is_ok());
    }

    #[test]
    fn bytes_are_human_readable() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(2048), "2.0 KB");
    }

    #[test]
    fn cli_parses_query_flags() {
        let cli = Cli::try_parse_from([
            "photo-catalog",
            "query",
            "/photos",
            "--search",
            "beach",
            "--sort",
            "name-ascending",
            "--page-size",
            "20",
        ])
        .unwrap();
        match cli.command {
            Commands::Query { sort, page_size, .. } => {
                assert_eq!(PhotoSortOption::from(sort), PhotoSortOption::NameAscending);
                assert_eq!(page_size, 20);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}

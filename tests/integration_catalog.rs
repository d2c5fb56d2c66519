//! Integration tests for scanning, duplicate detection and queries.
//!
//! These run against the SQLite catalog and real files:
//! - Rescans of unchanged trees
//! - Changed and removed files
//! - Duplicate groups
//! - Query pagination over a folder

use photo_catalog::core::cancel::CancellationToken;
use photo_catalog::core::catalog::{CatalogStore, SqliteCatalog};
use photo_catalog::core::duplicates::DuplicateDetector;
use photo_catalog::core::metadata::ExifMetadataExtractor;
use photo_catalog::core::query::{PhotoQueryFilter, PhotoSortOption, QueryEngine};
use photo_catalog::core::scanner::{ScanOptions, Scanner};
use photo_catalog::error::{CatalogError, ScanError};
use photo_catalog::events::{null_sender, ScanSummary};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

struct Library {
    _temp_dir: TempDir,
    root: PathBuf,
    store: Arc<SqliteCatalog>,
    scanner: Scanner,
}

impl Library {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("Pictures");
        fs::create_dir_all(&root).unwrap();
        let store = Arc::new(SqliteCatalog::open(&temp_dir.path().join("catalog.db")).unwrap());
        let scanner = Scanner::new(store.clone(), Arc::new(ExifMetadataExtractor));
        Self {
            _temp_dir: temp_dir,
            root,
            store,
            scanner,
        }
    }

    fn write(&self, relative: &str, content: &[u8]) -> PathBuf {
        let path = self.root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn root_id(&self, duplicates: bool) -> i64 {
        self.scanner.get_or_create_root(&self.root, duplicates).unwrap().id
    }

    fn scan(&self, root_id: i64, options: ScanOptions) -> ScanSummary {
        self.scanner
            .scan(root_id, &options, &null_sender(), &CancellationToken::new())
            .unwrap()
    }
}

#[test]
fn rescan_of_unchanged_tree_only_skips() {
    let lib = Library::new();
    lib.write("a.jpg", b"first");
    lib.write("trip/b.JPEG", b"second");
    lib.write("trip/c.png", b"third");
    lib.write("notes.txt", b"not a photo");
    let root_id = lib.root_id(false);

    let first = lib.scan(root_id, ScanOptions::default());
    assert_eq!(first.found, 3);
    assert_eq!(first.indexed, 3);

    let second = lib.scan(root_id, ScanOptions::default());
    assert_eq!(second.found, 3);
    assert_eq!(second.indexed, 0);
    assert_eq!(second.updated, 0);
    assert_eq!(second.skipped, 3);
    assert_eq!(second.removed, 0);

    let root = lib.store.get_root(root_id).unwrap().unwrap();
    assert_eq!(root.total_files_last_scan, 3);
    assert!(root.last_scan_utc.is_some());
}

#[test]
fn changed_and_removed_files_are_reconciled() {
    let lib = Library::new();
    let changed = lib.write("a.jpg", b"short");
    let removed = lib.write("b.jpg", b"gone soon");
    lib.write("c.jpg", b"stays");
    let root_id = lib.root_id(false);
    lib.scan(root_id, ScanOptions::default());

    fs::write(&changed, b"a much longer body than before").unwrap();
    fs::remove_file(&removed).unwrap();
    lib.write("d.heic", b"new");

    let summary = lib.scan(root_id, ScanOptions::default());
    assert_eq!(summary.found, 3);
    assert_eq!(summary.indexed, 1);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.removed, 1);

    let engine = QueryEngine::new(lib.store.clone()).unwrap();
    let all = engine
        .query(&PhotoQueryFilter::for_root(root_id), &CancellationToken::new())
        .unwrap();
    assert_eq!(all.total_count, 3);
    let a = all.items.iter().find(|p| p.full_path == changed).unwrap();
    assert_eq!(a.file_size_bytes, 30);
}

#[test]
fn scan_paths_are_unique_per_root() {
    let lib = Library::new();
    lib.write("a.jpg", b"x");
    lib.write("b.jpg", b"y");
    let root_id = lib.root_id(false);

    lib.scan(root_id, ScanOptions::default());
    lib.scan(root_id, ScanOptions::default());

    let engine = QueryEngine::new(lib.store.clone()).unwrap();
    let all = engine
        .query(&PhotoQueryFilter::for_root(root_id), &CancellationToken::new())
        .unwrap();
    let mut paths: Vec<&Path> = all.items.iter().map(|p| p.full_path.as_path()).collect();
    let before = paths.len();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), before);
    assert_eq!(before, 2);
}

#[test]
fn identical_files_form_one_duplicate_group() {
    let lib = Library::new();
    lib.write("IMG_001.jpg", b"same bytes");
    lib.write("copy of IMG_001.jpg", b"same bytes");
    lib.write("other.jpg", b"different bytes");
    let root_id = lib.root_id(true);
    lib.scan(root_id, ScanOptions::default());

    let detector = DuplicateDetector::new(lib.store.clone()).unwrap();
    let groups = detector.duplicate_groups(root_id).unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].count, 2);

    let engine = QueryEngine::new(lib.store.clone()).unwrap();
    let dupes = engine
        .query(
            &PhotoQueryFilter {
                album_key: Some(format!("dup:{}", groups[0].sha256)),
                ..PhotoQueryFilter::for_root(root_id)
            },
            &CancellationToken::new(),
        )
        .unwrap();
    assert_eq!(dupes.total_count, 2);
    assert!(dupes.items.iter().all(|p| p.sha256 == Some(groups[0].sha256.clone())));
}

#[test]
fn enabling_detection_later_fills_missing_hashes() {
    let lib = Library::new();
    lib.write("a.jpg", b"same");
    lib.write("b.jpg", b"same");
    lib.write("c.jpg", b"other");
    let root_id = lib.root_id(false);
    lib.scan(root_id, ScanOptions::default());

    let detector = DuplicateDetector::new(lib.store.clone()).unwrap();
    assert!(detector.duplicate_groups(root_id).unwrap().is_empty());

    lib.scanner.set_duplicate_detection(root_id, true).unwrap();
    let hashed = detector
        .compute_missing_hashes(root_id, &null_sender(), &CancellationToken::new())
        .unwrap();

    assert_eq!(hashed, 3);
    assert_eq!(detector.duplicate_groups(root_id).unwrap().len(), 1);
}

#[test]
fn missing_root_directory_fails_with_not_found() {
    let lib = Library::new();
    let root_id = lib.root_id(false);
    fs::remove_dir_all(&lib.root).unwrap();

    let result = lib
        .scanner
        .scan(root_id, &ScanOptions::default(), &null_sender(), &CancellationToken::new());

    assert!(matches!(
        result,
        Err(CatalogError::Scan(ScanError::DirectoryNotFound { .. }))
    ));
}

#[test]
fn safe_mode_skips_tool_directories() {
    let lib = Library::new();
    lib.write("keep/a.jpg", b"a");
    lib.write("node_modules/pkg/b.jpg", b"b");
    lib.write("keep/.git/c.jpg", b"c");
    let root_id = lib.root_id(false);

    let summary = lib.scan(root_id, ScanOptions::whole_computer_safe());

    assert_eq!(summary.found, 1);
    assert_eq!(summary.indexed, 1);
}

#[test]
fn folder_query_pages_are_stable() {
    let lib = Library::new();
    for i in 0..45 {
        lib.write(&format!("Vacation/day{}/img_{:02}.jpg", i % 3, i), format!("{}", i).as_bytes());
    }
    lib.write("Elsewhere/img_99.jpg", b"outside");
    let root_id = lib.root_id(false);
    lib.scan(root_id, ScanOptions::default());

    let engine = QueryEngine::new(lib.store.clone()).unwrap();
    let page = |n: usize| {
        engine
            .query(
                &PhotoQueryFilter {
                    folder_subpath: Some("Vacation".to_string()),
                    sort_by: PhotoSortOption::NameAscending,
                    page: n,
                    page_size: 20,
                    ..PhotoQueryFilter::for_root(root_id)
                },
                &CancellationToken::new(),
            )
            .unwrap()
    };

    let pages = [page(1), page(2), page(3)];
    for p in &pages {
        assert_eq!(p.total_count, 45);
    }
    assert_eq!(pages[0].items.len(), 20);
    assert_eq!(pages[2].items.len(), 5);

    let names: Vec<String> = pages
        .iter()
        .flat_map(|p| p.items.iter().map(|a| a.file_name.clone()))
        .collect();
    let expected: Vec<String> = (0..45).map(|i| format!("img_{:02}.jpg", i)).collect();
    assert_eq!(names, expected);

    // Same request, same answer
    let again = page(2);
    let ids = |r: &photo_catalog::core::query::PhotoQueryResult| {
        r.items.iter().map(|a| a.id).collect::<Vec<_>>()
    };
    assert_eq!(ids(&again), ids(&pages[1]));
}

#[test]
fn folder_listing_is_relative_to_root() {
    let lib = Library::new();
    lib.write("top.jpg", b"t");
    lib.write("Vacation/a.jpg", b"a");
    let root_id = lib.root_id(false);
    lib.scan(root_id, ScanOptions::default());

    let engine = QueryEngine::new(lib.store.clone()).unwrap();
    assert_eq!(
        engine.folder_subpaths(root_id).unwrap(),
        vec![".".to_string(), "Vacation".to_string()]
    );
}

//! Stack-based directory walk with the pruning rules used for unattended
//! whole-drive scans.
//!
//! Each directory is listed on its own with `walkdir` (depth 1), so a
//! listing failure only loses that subtree and cancellation is checked once
//! per directory.

use super::filter::ImageFilter;
use crate::core::cancel::CancellationToken;
use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Top-level names (relative to the scan root) that hold OS or program files
const EXCLUDED_TOP_LEVEL_NAMES: &[&str] = &[
    "$Recycle.Bin",
    "Config.Msi",
    "MSOCache",
    "PerfLogs",
    "Program Files",
    "Program Files (x86)",
    "ProgramData",
    "Recovery",
    "System Volume Information",
    "Windows",
    "proc",
    "sys",
    "dev",
    "boot",
    "usr",
    "bin",
    "sbin",
    "lib",
    "lib64",
    "etc",
    "var",
    "snap",
    "System",
    "Applications",
    "Library",
];

/// Directory names skipped at any depth
const EXCLUDED_SEGMENT_NAMES: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    ".nuget",
    ".npm",
    ".cargo",
    ".cache",
    "node_modules",
    "AppData",
];

/// Pruning rules for a scan. The root itself is never pruned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Skip OS/program trees at the top level and tool caches at any depth
    pub exclude_likely_system_and_program_directories: bool,
    /// Skip hidden or system directories
    pub skip_hidden_and_system_directories: bool,
    /// Skip symlinked directories (and junctions on Windows)
    pub skip_reparse_points: bool,
}

impl ScanOptions {
    /// Every pruning rule enabled, for scans of a whole drive
    pub fn whole_computer_safe() -> Self {
        Self {
            exclude_likely_system_and_program_directories: true,
            skip_hidden_and_system_directories: true,
            skip_reparse_points: true,
        }
    }
}

/// Result of walking one scan root
#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// Supported image files in walk order
    pub files: Vec<PathBuf>,
    /// Directories pruned by a rule or left out because they could not be read
    pub directories_skipped: usize,
}

/// Walks a tree with an explicit stack instead of recursion
pub struct DirectoryWalker {
    options: ScanOptions,
    filter: ImageFilter,
}

impl DirectoryWalker {
    pub fn new(options: ScanOptions) -> Self {
        Self {
            options,
            filter: ImageFilter::new(),
        }
    }

    /// Collect every supported file under `root`.
    ///
    /// Directories are visited depth-first in file-name order.
    pub fn walk(
        &self,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<WalkOutcome, CatalogError> {
        let mut outcome = WalkOutcome::default();
        let mut pending = vec![root.to_path_buf()];
        let mut visited: HashSet<PathBuf> = HashSet::new();

        while let Some(directory) = pending.pop() {
            cancel.check()?;

            // Followed links may lead back to an ancestor.
            if let Ok(canonical) = fs::canonicalize(&directory) {
                if !visited.insert(canonical) {
                    continue;
                }
            }

            let entries = match list_directory(&directory) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("Skipping unreadable directory {}: {}", directory.display(), e);
                    outcome.directories_skipped += 1;
                    continue;
                }
            };

            let mut subdirectories = Vec::new();
            for entry in entries {
                let path = entry.path();
                match entry_kind(&entry) {
                    EntryKind::Directory => {
                        if self.should_skip_directory(path, root) {
                            tracing::debug!("Pruned directory {}", path.display());
                            outcome.directories_skipped += 1;
                        } else {
                            subdirectories.push(path.to_path_buf());
                        }
                    }
                    EntryKind::File => {
                        if self.filter.should_include(path) {
                            outcome.files.push(path.to_path_buf());
                        }
                    }
                    EntryKind::Other => {}
                }
            }

            // Reverse so the stack pops siblings in name order.
            pending.extend(subdirectories.into_iter().rev());
        }

        Ok(outcome)
    }

    fn should_skip_directory(&self, directory: &Path, root: &Path) -> bool {
        if directory == root {
            return false;
        }

        if self.options.skip_reparse_points || self.options.skip_hidden_and_system_directories {
            let Ok(link_metadata) = fs::symlink_metadata(directory) else {
                // Attributes unreadable: treat like the OS would deny access.
                return true;
            };

            if self.options.skip_reparse_points && is_reparse_point(&link_metadata) {
                return true;
            }

            if self.options.skip_hidden_and_system_directories
                && is_hidden_or_system(directory, &link_metadata)
            {
                return true;
            }
        }

        if !self.options.exclude_likely_system_and_program_directories {
            return false;
        }

        is_excluded_location(directory, root)
    }
}

enum EntryKind {
    Directory,
    File,
    Other,
}

fn list_directory(directory: &Path) -> Result<Vec<DirEntry>, walkdir::Error> {
    let mut entries = Vec::new();
    let listing = WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in listing {
        match entry {
            Ok(entry) => entries.push(entry),
            // Depth 0 means the directory itself could not be opened.
            Err(e) if e.depth() == 0 => return Err(e),
            Err(e) => tracing::debug!("Skipping unreadable entry: {}", e),
        }
    }

    Ok(entries)
}

fn entry_kind(entry: &DirEntry) -> EntryKind {
    let file_type = entry.file_type();
    if file_type.is_dir() {
        return EntryKind::Directory;
    }
    if file_type.is_file() {
        return EntryKind::File;
    }
    if entry.path_is_symlink() {
        // Resolve the target; dangling links are ignored.
        return match fs::metadata(entry.path()) {
            Ok(m) if m.is_dir() => EntryKind::Directory,
            Ok(m) if m.is_file() => EntryKind::File,
            _ => EntryKind::Other,
        };
    }
    EntryKind::Other
}

/// Deny-listed first segment, or an ignored segment at any depth
fn is_excluded_location(directory: &Path, root: &Path) -> bool {
    let Ok(relative) = directory.strip_prefix(root) else {
        return false;
    };

    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    let Some(first) = segments.first() else {
        return false;
    };

    if EXCLUDED_TOP_LEVEL_NAMES
        .iter()
        .any(|name| name.eq_ignore_ascii_case(first))
    {
        return true;
    }

    segments.iter().any(|segment| {
        EXCLUDED_SEGMENT_NAMES
            .iter()
            .any(|name| name.eq_ignore_ascii_case(segment))
    })
}

#[cfg(windows)]
fn is_reparse_point(metadata: &fs::Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x400;
    metadata.file_attributes() & FILE_ATTRIBUTE_REPARSE_POINT != 0
}

#[cfg(not(windows))]
fn is_reparse_point(metadata: &fs::Metadata) -> bool {
    metadata.file_type().is_symlink()
}

#[cfg(windows)]
fn is_hidden_or_system(_path: &Path, metadata: &fs::Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;
    metadata.file_attributes() & (FILE_ATTRIBUTE_HIDDEN | FILE_ATTRIBUTE_SYSTEM) != 0
}

#[cfg(not(windows))]
fn is_hidden_or_system(path: &Path, _metadata: &fs::Metadata) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_test_photo(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        // Write minimal JPEG header
        file.write_all(&[0xFF, 0xD8, 0xFF, 0xE0]).unwrap();
        path
    }

    fn walk(root: &Path, options: ScanOptions) -> WalkOutcome {
        DirectoryWalker::new(options)
            .walk(root, &CancellationToken::new())
            .unwrap()
    }

    #[test]
    fn walk_empty_directory_returns_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let outcome = walk(temp_dir.path(), ScanOptions::default());
        assert!(outcome.files.is_empty());
        assert_eq!(outcome.directories_skipped, 0);
    }

    #[test]
    fn walk_traverses_nested_directories_in_name_order() {
        let temp_dir = TempDir::new().unwrap();
        let b = temp_dir.path().join("b");
        let a = temp_dir.path().join("a");
        fs::create_dir_all(a.join("deep")).unwrap();
        fs::create_dir(&b).unwrap();
        create_test_photo(temp_dir.path(), "root.jpg");
        create_test_photo(&a, "one.png");
        create_test_photo(&a.join("deep"), "two.heic");
        create_test_photo(&b, "three.JPEG");
        create_test_photo(&b, "notes.txt");

        let outcome = walk(temp_dir.path(), ScanOptions::default());
        let names: Vec<_> = outcome
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["root.jpg", "one.png", "two.heic", "three.JPEG"]);
    }

    #[test]
    fn safe_mode_prunes_tool_and_system_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for dir in ["Windows", "photos/node_modules", "photos/.git", "photos/keep"] {
            fs::create_dir_all(root.join(dir)).unwrap();
            create_test_photo(&root.join(dir), "x.jpg");
        }

        let unfiltered = walk(root, ScanOptions::default());
        assert_eq!(unfiltered.files.len(), 4);

        let safe = walk(root, ScanOptions::whole_computer_safe());
        assert_eq!(safe.files, vec![root.join("photos/keep/x.jpg")]);
        assert_eq!(safe.directories_skipped, 3);
    }

    #[test]
    fn deny_list_only_applies_at_top_level() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("trips").join("Windows");
        fs::create_dir_all(&nested).unwrap();
        create_test_photo(&nested, "view.jpg");

        let options = ScanOptions {
            exclude_likely_system_and_program_directories: true,
            ..Default::default()
        };
        assert_eq!(walk(temp_dir.path(), options).files.len(), 1);
    }

    #[test]
    fn excluded_names_match_case_insensitively() {
        assert!(is_excluded_location(
            Path::new("/r/program files/app"),
            Path::new("/r")
        ));
        assert!(is_excluded_location(
            Path::new("/r/a/NODE_MODULES"),
            Path::new("/r")
        ));
        assert!(!is_excluded_location(Path::new("/r"), Path::new("/r")));
    }

    #[cfg(unix)]
    #[test]
    fn hidden_directories_are_skipped_when_requested() {
        let temp_dir = TempDir::new().unwrap();
        let hidden = temp_dir.path().join(".thumbnails");
        fs::create_dir(&hidden).unwrap();
        create_test_photo(&hidden, "t.jpg");

        assert_eq!(walk(temp_dir.path(), ScanOptions::default()).files.len(), 1);

        let options = ScanOptions {
            skip_hidden_and_system_directories: true,
            ..Default::default()
        };
        assert!(walk(temp_dir.path(), options).files.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_cycles_terminate_and_links_can_be_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let real = temp_dir.path().join("real");
        fs::create_dir(&real).unwrap();
        create_test_photo(&real, "a.jpg");
        std::os::unix::fs::symlink(temp_dir.path(), real.join("loop")).unwrap();

        // Following links still terminates
        let followed = walk(temp_dir.path(), ScanOptions::default());
        assert_eq!(followed.files.len(), 1);

        let options = ScanOptions {
            skip_reparse_points: true,
            ..Default::default()
        };
        let skipped = walk(temp_dir.path(), options);
        assert_eq!(skipped.files.len(), 1);
        assert_eq!(skipped.directories_skipped, 1);
    }

    #[test]
    fn cancelled_walk_returns_cancelled() {
        let temp_dir = TempDir::new().unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let result = DirectoryWalker::new(ScanOptions::default()).walk(temp_dir.path(), &token);
        assert!(matches!(result, Err(CatalogError::Cancelled)));
    }
}

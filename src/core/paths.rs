//! Path rules shared by the scanner, the organizer and single-file edits.
//!
//! Paths are compared exactly (case-sensitive) after lexical normalization.
//! Destinations may not exist yet, so nothing here canonicalizes through the
//! filesystem.

use crate::error::{CatalogError, OrganizeError};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Make `path` absolute (against the current directory) and resolve `.` and
/// `..` lexically. Trailing separators disappear as a side effect.
pub fn normalize_path(path: &Path) -> Result<PathBuf, CatalogError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| CatalogError::Config(format!("cannot resolve current directory: {}", e)))?
            .join(path)
    };
    Ok(clean(&absolute))
}

/// Lexical cleanup of an already absolute path.
pub fn clean(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Never pop past the root or prefix.
                if matches!(
                    cleaned.components().next_back(),
                    Some(Component::Normal(_))
                ) {
                    cleaned.pop();
                }
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}

/// Reject any destination that leaves the owning scan root.
///
/// Returns the cleaned destination so callers act on exactly what was checked.
pub fn ensure_inside_root(candidate: &Path, root: &Path) -> Result<PathBuf, OrganizeError> {
    let resolved = if candidate.is_absolute() {
        clean(candidate)
    } else {
        clean(&root.join(candidate))
    };
    let root = clean(root);

    if resolved.starts_with(&root) {
        Ok(resolved)
    } else {
        Err(OrganizeError::OutsideScanRoot {
            path: resolved,
            root,
        })
    }
}

/// First of `path`, `stem_1.ext`, `stem_2.ext`, ... that is neither in
/// `occupied` nor present on disk.
///
/// `ignore_existing` names a file that may be overwritten by itself (the
/// source of a rename), so its presence on disk does not count.
pub fn resolve_unique_path(
    path: &Path,
    occupied: &HashSet<PathBuf>,
    ignore_existing: Option<&Path>,
) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());

    let taken = |candidate: &Path| {
        occupied.contains(candidate)
            || (candidate.exists() && ignore_existing != Some(candidate))
    };

    let mut candidate = path.to_path_buf();
    let mut counter = 1usize;
    while taken(&candidate) {
        let name = match &ext {
            Some(ext) => format!("{}_{}.{}", stem, counter, ext),
            None => format!("{}_{}", stem, counter),
        };
        candidate = parent.join(name);
        counter += 1;
    }
    candidate
}

/// Replace characters that are invalid in file names on any common platform.
pub fn sanitize_file_stem(stem: &str) -> String {
    stem.trim()
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn clean_resolves_dots() {
        assert_eq!(
            clean(Path::new("/photos/./2024/../2023/a.jpg")),
            PathBuf::from("/photos/2023/a.jpg")
        );
        assert_eq!(clean(Path::new("/../../etc")), PathBuf::from("/etc"));
    }

    #[test]
    fn normalize_drops_trailing_separator() {
        let normalized = normalize_path(Path::new("/photos/vacation/")).unwrap();
        assert_eq!(normalized, PathBuf::from("/photos/vacation"));
    }

    #[test]
    fn normalize_makes_relative_paths_absolute() {
        let normalized = normalize_path(Path::new("some/dir")).unwrap();
        assert!(normalized.is_absolute());
        assert!(normalized.ends_with("some/dir"));
    }

    #[test]
    fn containment_accepts_nested_destinations() {
        let resolved =
            ensure_inside_root(Path::new("/photos/2024/2024-01/a.jpg"), Path::new("/photos"))
                .unwrap();
        assert_eq!(resolved, PathBuf::from("/photos/2024/2024-01/a.jpg"));
    }

    #[test]
    fn containment_rejects_escape_through_parent_dirs() {
        let result = ensure_inside_root(Path::new("/photos/../etc/passwd"), Path::new("/photos"));
        assert!(matches!(result, Err(OrganizeError::OutsideScanRoot { .. })));
    }

    #[test]
    fn containment_rejects_sibling_with_common_prefix() {
        let result = ensure_inside_root(Path::new("/photos-old/a.jpg"), Path::new("/photos"));
        assert!(result.is_err());
    }

    #[test]
    fn unique_path_appends_counter_before_extension() {
        let occupied: HashSet<PathBuf> = [
            PathBuf::from("/dest/2024/photo.jpg"),
            PathBuf::from("/dest/2024/photo_1.jpg"),
        ]
        .into_iter()
        .collect();

        let unique = resolve_unique_path(Path::new("/dest/2024/photo.jpg"), &occupied, None);
        assert_eq!(unique, PathBuf::from("/dest/2024/photo_2.jpg"));
    }

    #[test]
    fn unique_path_checks_the_filesystem() {
        let temp_dir = TempDir::new().unwrap();
        let existing = temp_dir.path().join("a.png");
        std::fs::write(&existing, b"x").unwrap();

        let unique = resolve_unique_path(&existing, &HashSet::new(), None);
        assert_eq!(unique, temp_dir.path().join("a_1.png"));

        let same = resolve_unique_path(&existing, &HashSet::new(), Some(&existing));
        assert_eq!(same, existing);
    }

    #[test]
    fn unique_path_without_extension() {
        let occupied: HashSet<PathBuf> = [PathBuf::from("/d/README")].into_iter().collect();
        let unique = resolve_unique_path(Path::new("/d/README"), &occupied, None);
        assert_eq!(unique, PathBuf::from("/d/README_1"));
    }

    #[test]
    fn sanitize_replaces_invalid_characters() {
        assert_eq!(sanitize_file_stem("  beach: day/1?  "), "beach_ day_1_");
        assert_eq!(sanitize_file_stem("   "), "");
    }
}

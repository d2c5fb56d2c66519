//! # Query Module
//!
//! Filtered, sorted and paginated reads over the catalog, plus the smart
//! album and folder listings used to build browse views.
//!
//! Filtering runs over the scoped listing from the store so long queries
//! can be cancelled between chunks of rows.

mod sort;
mod syntax;

pub use sort::PhotoSortOption;
pub use syntax::{Album, QuerySyntax, MAX_SEARCH_TOKENS};

use crate::core::cancel::CancellationToken;
use crate::core::catalog::{AssetScope, CatalogStore};
use crate::core::model::{DateTakenSource, PhotoAsset};
use crate::core::paths::ensure_inside_root;
use crate::error::{CatalogError, Result};
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_PAGE_SIZE: usize = 120;
pub const MIN_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 500;
/// Window of the `recent` album
pub const RECENT_DAYS: i64 = 30;

/// Rows filtered between two cancellation checks
const CANCEL_CHECK_INTERVAL: usize = 512;

/// A query request. Unset fields do not filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoQueryFilter {
    pub scan_root_id: Option<i64>,
    /// Every token must match the file name, notes, a tag, a person or an animal
    pub search_text: Option<String>,
    /// Every token must match a person id
    pub person_search_text: Option<String>,
    /// Every token must match an animal id
    pub animal_search_text: Option<String>,
    /// Inclusive; undated rows are excluded when set
    pub from_date_utc: Option<DateTime<Utc>>,
    /// Inclusive; undated rows are excluded when set
    pub to_date_utc: Option<DateTime<Utc>>,
    pub date_source: Option<DateTakenSource>,
    /// Relative to the root; only applied together with `scan_root_id`
    pub folder_subpath: Option<String>,
    pub album_key: Option<String>,
    pub sort_by: PhotoSortOption,
    /// 1-based, values below 1 mean 1
    pub page: usize,
    /// Clamped to [`MIN_PAGE_SIZE`, `MAX_PAGE_SIZE`]
    pub page_size: usize,
}

impl Default for PhotoQueryFilter {
    fn default() -> Self {
        Self {
            scan_root_id: None,
            search_text: None,
            person_search_text: None,
            animal_search_text: None,
            from_date_utc: None,
            to_date_utc: None,
            date_source: None,
            folder_subpath: None,
            album_key: None,
            sort_by: PhotoSortOption::DateTakenNewest,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PhotoQueryFilter {
    pub fn for_root(scan_root_id: i64) -> Self {
        Self {
            scan_root_id: Some(scan_root_id),
            ..Default::default()
        }
    }

    pub fn effective_page(&self) -> usize {
        self.page.max(1)
    }

    pub fn effective_page_size(&self) -> usize {
        self.page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
    }
}

/// One page of results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhotoQueryResult {
    pub items: Vec<PhotoAsset>,
    /// Size of the whole filtered set, independent of the page
    pub total_count: usize,
}

/// A computed album and how many assets it holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartAlbum {
    pub key: String,
    pub name: String,
    pub count: usize,
}

/// Answers catalog queries
pub struct QueryEngine {
    store: Arc<dyn CatalogStore>,
    syntax: QuerySyntax,
}

/// Folder restriction resolved against the scan root
enum FolderFilter {
    Any,
    Under(PathBuf),
    /// The subpath escapes the root, so nothing matches
    Nowhere,
}

/// A filter resolved against the catalog, ready to test rows
struct Predicate {
    search: Vec<String>,
    people: Vec<String>,
    animals: Vec<String>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    date_source: Option<DateTakenSource>,
    folder: FolderFilter,
    album: Album,
    duplicate_hashes: HashSet<String>,
    recent_threshold: DateTime<Utc>,
}

impl Predicate {
    fn matches(&self, asset: &PhotoAsset) -> bool {
        let search_ok = self.search.iter().all(|token| {
            contains(&asset.file_name, token)
                || asset.notes.as_deref().is_some_and(|n| contains(n, token))
                || asset.tags.iter().any(|t| contains(t, token))
                || asset.people_ids.iter().any(|p| contains(p, token))
                || asset.animal_ids.iter().any(|a| contains(a, token))
        });
        if !search_ok {
            return false;
        }

        if !self
            .people
            .iter()
            .all(|token| asset.people_ids.iter().any(|p| contains(p, token)))
        {
            return false;
        }
        if !self
            .animals
            .iter()
            .all(|token| asset.animal_ids.iter().any(|a| contains(a, token)))
        {
            return false;
        }

        if let Some(from) = self.from {
            if !asset.date_taken.is_some_and(|d| d >= from) {
                return false;
            }
        }
        if let Some(to) = self.to {
            if !asset.date_taken.is_some_and(|d| d <= to) {
                return false;
            }
        }

        if let Some(source) = self.date_source {
            if asset.date_taken_source != source {
                return false;
            }
        }

        match &self.folder {
            FolderFilter::Any => {}
            FolderFilter::Under(folder) if asset.folder_path.starts_with(folder) => {}
            FolderFilter::Under(_) | FolderFilter::Nowhere => return false,
        }

        self.album_matches(asset)
    }

    fn album_matches(&self, asset: &PhotoAsset) -> bool {
        match &self.album {
            Album::All => true,
            Album::UnknownDate => asset.has_unknown_date(),
            Album::Recent => asset.indexed_utc >= self.recent_threshold,
            Album::Duplicates => asset
                .sha256
                .as_ref()
                .is_some_and(|h| self.duplicate_hashes.contains(h)),
            Album::DuplicateGroup(hash) => asset
                .sha256
                .as_deref()
                .is_some_and(|h| h.eq_ignore_ascii_case(hash)),
            Album::Year(year) => asset.date_taken.is_some_and(|d| d.year() == *year),
            Album::Month(year, month) => asset
                .date_taken
                .is_some_and(|d| d.year() == *year && d.month() == *month),
        }
    }
}

/// Case-insensitive substring test; `token` must already be lowercase.
fn contains(haystack: &str, token: &str) -> bool {
    haystack.to_lowercase().contains(token)
}

impl QueryEngine {
    pub fn new(store: Arc<dyn CatalogStore>) -> Result<Self> {
        let syntax = QuerySyntax::new()
            .map_err(|e| CatalogError::Config(format!("invalid query pattern: {}", e)))?;
        Ok(Self { store, syntax })
    }

    /// Run a query and return the requested page.
    pub fn query(
        &self,
        filter: &PhotoQueryFilter,
        cancel: &CancellationToken,
    ) -> Result<PhotoQueryResult> {
        let scope = AssetScope::from(filter.scan_root_id);
        let predicate = self.resolve(filter, scope)?;
        cancel.check()?;

        let mut matched = Vec::new();
        for (i, asset) in self.store.list_assets(scope)?.into_iter().enumerate() {
            if i % CANCEL_CHECK_INTERVAL == 0 {
                cancel.check()?;
            }
            if predicate.matches(&asset) {
                matched.push(asset);
            }
        }

        let total_count = matched.len();
        matched.sort_by(|a, b| filter.sort_by.compare(a, b));

        let page_size = filter.effective_page_size();
        let skip = (filter.effective_page() - 1).saturating_mul(page_size);
        let items: Vec<PhotoAsset> = matched.into_iter().skip(skip).take(page_size).collect();

        tracing::debug!(
            "Query matched {} assets, returning {} (page {})",
            total_count,
            items.len(),
            filter.effective_page()
        );
        Ok(PhotoQueryResult { items, total_count })
    }

    pub fn get_photo(&self, photo_id: i64) -> Result<Option<PhotoAsset>> {
        Ok(self.store.get_asset(photo_id)?)
    }

    /// `all`, `unknown`, `recent`, months and years (newest first), then
    /// `duplicates`, each with its count.
    pub fn smart_albums(&self, scan_root_id: Option<i64>) -> Result<Vec<SmartAlbum>> {
        let scope = AssetScope::from(scan_root_id);
        let assets = self.store.list_assets(scope)?;
        let shared = self.duplicate_hashes(scope)?;
        let recent_threshold = Utc::now() - Duration::days(RECENT_DAYS);

        let mut months: BTreeMap<(i32, u32), usize> = BTreeMap::new();
        let mut years: BTreeMap<i32, usize> = BTreeMap::new();
        for taken in assets.iter().filter_map(|a| a.date_taken) {
            *months.entry((taken.year(), taken.month())).or_default() += 1;
            *years.entry(taken.year()).or_default() += 1;
        }

        let mut albums = vec![
            album("all", "All Photos", assets.len()),
            album(
                "unknown",
                "Unknown Date",
                assets.iter().filter(|a| a.has_unknown_date()).count(),
            ),
            album(
                "recent",
                "Recently Added",
                assets
                    .iter()
                    .filter(|a| a.indexed_utc >= recent_threshold)
                    .count(),
            ),
        ];

        for ((year, month), count) in months.into_iter().rev() {
            let label = format!("{:04}-{:02}", year, month);
            albums.push(album(&format!("month:{}", label), &label, count));
        }
        for (year, count) in years.into_iter().rev() {
            albums.push(album(
                &format!("year:{:04}", year),
                &format!("Year {:04}", year),
                count,
            ));
        }

        let duplicates = assets
            .iter()
            .filter(|a| a.sha256.as_ref().is_some_and(|h| shared.contains(h)))
            .count();
        albums.push(album("duplicates", "Possible Duplicates", duplicates));

        Ok(albums)
    }

    /// Distinct folders of the root's assets, relative to the root (`.` for
    /// the root itself), sorted.
    pub fn folder_subpaths(&self, scan_root_id: i64) -> Result<Vec<String>> {
        let root = self
            .store
            .get_root(scan_root_id)?
            .ok_or(CatalogError::UnknownScanRoot { id: scan_root_id })?;

        let folders: BTreeSet<PathBuf> = self
            .store
            .list_assets(AssetScope::Root(scan_root_id))?
            .into_iter()
            .map(|a| a.folder_path)
            .collect();

        let mut seen = HashSet::new();
        let mut relative: Vec<String> = folders
            .iter()
            .map(|folder| match folder.strip_prefix(&root.root_path) {
                Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
                Ok(rel) => rel.to_string_lossy().into_owned(),
                Err(_) => folder.to_string_lossy().into_owned(),
            })
            .filter(|path| seen.insert(path.to_lowercase()))
            .collect();
        relative.sort();
        Ok(relative)
    }

    fn resolve(&self, filter: &PhotoQueryFilter, scope: AssetScope) -> Result<Predicate> {
        let tokens = |text: &Option<String>| -> Vec<String> {
            text.as_deref()
                .map(|t| self.syntax.tokenize(t))
                .unwrap_or_default()
                .into_iter()
                .map(|t| t.to_lowercase())
                .collect()
        };

        let root = match filter.scan_root_id {
            Some(root_id) => self.store.get_root(root_id)?,
            None => None,
        };
        let folder = match (root, filter.folder_subpath.as_deref().map(str::trim)) {
            (Some(root), Some(subpath)) if !subpath.is_empty() => {
                match ensure_inside_root(Path::new(subpath), &root.root_path) {
                    Ok(folder) => FolderFilter::Under(folder),
                    Err(e) => {
                        tracing::debug!("Folder filter matches nothing: {}", e);
                        FolderFilter::Nowhere
                    }
                }
            }
            _ => FolderFilter::Any,
        };

        let album = self.syntax.parse_album(filter.album_key.as_deref());
        let duplicate_hashes = if album == Album::Duplicates {
            self.duplicate_hashes(scope)?
        } else {
            HashSet::new()
        };

        Ok(Predicate {
            search: tokens(&filter.search_text),
            people: tokens(&filter.person_search_text),
            animals: tokens(&filter.animal_search_text),
            from: filter.from_date_utc,
            to: filter.to_date_utc,
            date_source: filter.date_source,
            folder,
            album,
            duplicate_hashes,
            recent_threshold: Utc::now() - Duration::days(RECENT_DAYS),
        })
    }

    fn duplicate_hashes(&self, scope: AssetScope) -> Result<HashSet<String>> {
        Ok(self
            .store
            .shared_hashes(scope)?
            .into_iter()
            .map(|(hash, _)| hash)
            .collect())
    }
}

fn album(key: &str, name: &str, count: usize) -> SmartAlbum {
    SmartAlbum {
        key: key.to_string(),
        name: name.to_string(),
        count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{CatalogWrite, InMemoryCatalog};
    use crate::core::model::ScanRoot;
    use chrono::TimeZone;
    use std::path::Path;

    struct Fixture {
        engine: QueryEngine,
        store: Arc<InMemoryCatalog>,
        root_id: i64,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(InMemoryCatalog::new());
            let root_id = store
                .insert_root(&ScanRoot::new(PathBuf::from("/photos"), true))
                .unwrap();
            let engine = QueryEngine::new(store.clone()).unwrap();
            Self {
                engine,
                store,
                root_id,
            }
        }

        fn add(&self, path: &str, configure: impl FnOnce(&mut PhotoAsset)) -> i64 {
            let mut asset = PhotoAsset::new(self.root_id, Path::new(path), Utc::now());
            configure(&mut asset);
            self.store.commit(&[CatalogWrite::InsertAsset(asset)]).unwrap()[0]
        }

        fn ids(&self, filter: PhotoQueryFilter) -> Vec<i64> {
            self.engine
                .query(&filter, &CancellationToken::new())
                .unwrap()
                .items
                .iter()
                .map(|a| a.id)
                .collect()
        }
    }

    fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn search_tokens_are_anded_across_fields() {
        let fx = Fixture::new();
        let beach_dog = fx.add("/photos/beach.jpg", |a| {
            a.animal_ids.insert("dog_rex".to_string());
        });
        let _beach = fx.add("/photos/beach2.jpg", |_| {});
        let noted = fx.add("/photos/x.jpg", |a| {
            a.notes = Some("Rex at the BEACH".to_string());
        });

        let filter = PhotoQueryFilter {
            search_text: Some("beach, rex".to_string()),
            sort_by: PhotoSortOption::NameAscending,
            ..PhotoQueryFilter::for_root(fx.root_id)
        };
        assert_eq!(fx.ids(filter), vec![beach_dog, noted]);
    }

    #[test]
    fn person_and_animal_filters_only_look_at_their_sets() {
        let fx = Fixture::new();
        let anna = fx.add("/photos/anna.jpg", |_| {});
        let tagged = fx.add("/photos/b.jpg", |a| {
            a.people_ids.insert("anna_smith".to_string());
        });

        let filter = PhotoQueryFilter {
            person_search_text: Some("Anna".to_string()),
            ..PhotoQueryFilter::for_root(fx.root_id)
        };
        let ids = fx.ids(filter);
        assert_eq!(ids, vec![tagged]);
        assert!(!ids.contains(&anna));
    }

    #[test]
    fn date_range_excludes_undated_rows() {
        let fx = Fixture::new();
        let inside = fx.add("/photos/a.jpg", |a| a.date_taken = Some(date(2023, 1, 20)));
        fx.add("/photos/b.jpg", |a| a.date_taken = Some(date(2023, 3, 1)));
        fx.add("/photos/c.jpg", |_| {});

        let filter = PhotoQueryFilter {
            from_date_utc: Some(date(2023, 1, 1)),
            to_date_utc: Some(date(2023, 1, 31)),
            ..PhotoQueryFilter::for_root(fx.root_id)
        };
        assert_eq!(fx.ids(filter), vec![inside]);

        let open_ended = PhotoQueryFilter {
            to_date_utc: Some(date(2030, 1, 1)),
            ..PhotoQueryFilter::for_root(fx.root_id)
        };
        assert_eq!(fx.ids(open_ended).len(), 2);
    }

    #[test]
    fn folder_subpath_is_a_component_prefix() {
        let fx = Fixture::new();
        let nested = fx.add("/photos/Vacation/2023/a.jpg", |_| {});
        let direct = fx.add("/photos/Vacation/b.jpg", |_| {});
        fx.add("/photos/Vacation-old/c.jpg", |_| {});
        fx.add("/photos/d.jpg", |_| {});

        let filter = PhotoQueryFilter {
            folder_subpath: Some("Vacation".to_string()),
            sort_by: PhotoSortOption::NameAscending,
            ..PhotoQueryFilter::for_root(fx.root_id)
        };
        assert_eq!(fx.ids(filter), vec![nested, direct]);
    }

    #[test]
    fn folder_subpath_cannot_leave_the_root() {
        let fx = Fixture::new();
        fx.add("/photos/a.jpg", |_| {});
        fx.add("/elsewhere/b.jpg", |_| {});

        for subpath in ["../elsewhere", "/elsewhere", "Vacation/../../elsewhere"] {
            let filter = PhotoQueryFilter {
                folder_subpath: Some(subpath.to_string()),
                ..PhotoQueryFilter::for_root(fx.root_id)
            };
            assert!(fx.ids(filter).is_empty(), "{} matched", subpath);
        }

        let inside = PhotoQueryFilter {
            folder_subpath: Some("Vacation/..".to_string()),
            ..PhotoQueryFilter::for_root(fx.root_id)
        };
        assert_eq!(fx.ids(inside).len(), 1);
    }

    #[test]
    fn album_filters() {
        let fx = Fixture::new();
        let jan = fx.add("/photos/jan.jpg", |a| {
            a.date_taken = Some(date(2023, 1, 5));
            a.date_taken_source = DateTakenSource::Exif;
            a.sha256 = Some("aa".to_string());
        });
        let feb = fx.add("/photos/feb.jpg", |a| {
            a.date_taken = Some(date(2023, 2, 1));
            a.date_taken_source = DateTakenSource::FileCreated;
            a.sha256 = Some("aa".to_string());
        });
        let old = fx.add("/photos/old.jpg", |a| {
            a.date_taken = Some(date(2019, 6, 1));
            a.date_taken_source = DateTakenSource::Unknown;
            a.indexed_utc = date(2020, 1, 1);
        });
        let undated = fx.add("/photos/none.jpg", |_| {});

        let with_album = |key: &str| {
            let mut ids = fx.ids(PhotoQueryFilter {
                album_key: Some(key.to_string()),
                ..PhotoQueryFilter::for_root(fx.root_id)
            });
            ids.sort();
            ids
        };

        assert_eq!(with_album("year:2023"), vec![jan, feb]);
        assert_eq!(with_album("month:2023-02"), vec![feb]);
        assert_eq!(with_album("unknown"), vec![old, undated]);
        assert_eq!(with_album("duplicates"), vec![jan, feb]);
        assert_eq!(with_album("dup:AA"), vec![jan, feb]);
        assert_eq!(with_album("recent"), vec![jan, feb, undated]);
        assert_eq!(with_album("nonsense").len(), 4);
    }

    #[test]
    fn pagination_is_stable_and_exhaustive() {
        let fx = Fixture::new();
        for i in 0..45 {
            fx.add(&format!("/photos/img_{:02}.jpg", 44 - i), |_| {});
        }

        let page = |n: usize| {
            fx.engine
                .query(
                    &PhotoQueryFilter {
                        sort_by: PhotoSortOption::NameAscending,
                        page: n,
                        page_size: 20,
                        ..PhotoQueryFilter::for_root(fx.root_id)
                    },
                    &CancellationToken::new(),
                )
                .unwrap()
        };

        let pages: Vec<_> = (1..=3).map(page).collect();
        assert!(pages.iter().all(|p| p.total_count == 45));
        assert_eq!(
            pages.iter().map(|p| p.items.len()).collect::<Vec<_>>(),
            vec![20, 20, 5]
        );

        let names: Vec<String> = pages
            .iter()
            .flat_map(|p| p.items.iter().map(|a| a.file_name.clone()))
            .collect();
        let mut expected = names.clone();
        expected.sort();
        expected.dedup();
        assert_eq!(names, expected);
        assert_eq!(names.len(), 45);
    }

    #[test]
    fn page_size_and_page_are_clamped() {
        let filter = PhotoQueryFilter {
            page: 0,
            page_size: 5,
            ..Default::default()
        };
        assert_eq!(filter.effective_page(), 1);
        assert_eq!(filter.effective_page_size(), MIN_PAGE_SIZE);

        let big = PhotoQueryFilter {
            page_size: 10_000,
            ..Default::default()
        };
        assert_eq!(big.effective_page_size(), MAX_PAGE_SIZE);
    }

    #[test]
    fn cancelled_query_returns_cancelled() {
        let fx = Fixture::new();
        fx.add("/photos/a.jpg", |_| {});
        let token = CancellationToken::new();
        token.cancel();

        let result = fx.engine.query(&PhotoQueryFilter::default(), &token);
        assert!(matches!(result, Err(CatalogError::Cancelled)));
    }

    #[test]
    fn smart_albums_list_months_and_years_newest_first() {
        let fx = Fixture::new();
        fx.add("/photos/a.jpg", |a| {
            a.date_taken = Some(date(2023, 1, 5));
            a.date_taken_source = DateTakenSource::Exif;
        });
        fx.add("/photos/b.jpg", |a| {
            a.date_taken = Some(date(2024, 3, 5));
            a.date_taken_source = DateTakenSource::Exif;
        });
        fx.add("/photos/c.jpg", |_| {});

        let albums = fx.engine.smart_albums(Some(fx.root_id)).unwrap();
        let keys: Vec<_> = albums.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "all",
                "unknown",
                "recent",
                "month:2024-03",
                "month:2023-01",
                "year:2024",
                "year:2023",
                "duplicates"
            ]
        );
        assert_eq!(albums[0].count, 3);
        assert_eq!(albums[1].count, 1);
        assert_eq!(albums[7].count, 0);
    }

    #[test]
    fn folder_subpaths_are_relative_and_sorted() {
        let fx = Fixture::new();
        fx.add("/photos/b/x.jpg", |_| {});
        fx.add("/photos/a/deep/y.jpg", |_| {});
        fx.add("/photos/z.jpg", |_| {});
        fx.add("/photos/a/deep/w.jpg", |_| {});

        let folders = fx.engine.folder_subpaths(fx.root_id).unwrap();
        let expected: Vec<String> = vec![
            ".".to_string(),
            Path::new("a").join("deep").to_string_lossy().into_owned(),
            "b".to_string(),
        ];
        assert_eq!(folders, expected);
    }

    #[test]
    fn folder_subpaths_unknown_root() {
        let fx = Fixture::new();
        assert!(matches!(
            fx.engine.folder_subpaths(42),
            Err(CatalogError::UnknownScanRoot { id: 42 })
        ));
    }
}

//! Result ordering. Every order ends with the asset id so ties never depend
//! on storage order.

use crate::core::model::PhotoAsset;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Available result orders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhotoSortOption {
    /// Dated photos first, newest date first
    #[default]
    DateTakenNewest,
    /// Oldest date first, undated photos last
    DateTakenOldest,
    DateAddedNewest,
    DateAddedOldest,
    FileSizeLargest,
    FileSizeSmallest,
    NameAscending,
    NameDescending,
}

impl PhotoSortOption {
    pub fn compare(&self, a: &PhotoAsset, b: &PhotoAsset) -> Ordering {
        let by_name = || a.file_name.cmp(&b.file_name);
        let indexed_desc = || b.indexed_utc.cmp(&a.indexed_utc);

        let ordering = match self {
            PhotoSortOption::DateTakenNewest => b
                .date_taken
                .is_some()
                .cmp(&a.date_taken.is_some())
                .then_with(|| b.date_taken.cmp(&a.date_taken))
                .then_with(indexed_desc)
                .then_with(by_name),
            PhotoSortOption::DateTakenOldest => a
                .date_taken
                .is_none()
                .cmp(&b.date_taken.is_none())
                .then_with(|| a.date_taken.cmp(&b.date_taken))
                .then_with(by_name),
            PhotoSortOption::DateAddedNewest => indexed_desc().then_with(by_name),
            PhotoSortOption::DateAddedOldest => {
                a.indexed_utc.cmp(&b.indexed_utc).then_with(by_name)
            }
            PhotoSortOption::FileSizeLargest => b
                .file_size_bytes
                .cmp(&a.file_size_bytes)
                .then_with(by_name),
            PhotoSortOption::FileSizeSmallest => a
                .file_size_bytes
                .cmp(&b.file_size_bytes)
                .then_with(by_name),
            PhotoSortOption::NameAscending => by_name().then_with(indexed_desc),
            PhotoSortOption::NameDescending => b
                .file_name
                .cmp(&a.file_name)
                .then_with(indexed_desc),
        };

        ordering.then_with(|| a.id.cmp(&b.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use std::path::Path;

    fn asset(id: i64, name: &str, taken: Option<DateTime<Utc>>, size: u64) -> PhotoAsset {
        let indexed = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut asset = PhotoAsset::new(1, &Path::new("/p").join(name), indexed);
        asset.id = id;
        asset.date_taken = taken;
        asset.file_size_bytes = size;
        asset
    }

    fn sorted(option: PhotoSortOption, mut assets: Vec<PhotoAsset>) -> Vec<i64> {
        assets.sort_by(|a, b| option.compare(a, b));
        assets.iter().map(|a| a.id).collect()
    }

    fn fixtures() -> Vec<PhotoAsset> {
        let jan = Utc.with_ymd_and_hms(2023, 1, 5, 12, 0, 0).unwrap();
        let feb = Utc.with_ymd_and_hms(2023, 2, 1, 12, 0, 0).unwrap();
        vec![
            asset(1, "b.jpg", Some(jan), 300),
            asset(2, "a.jpg", None, 100),
            asset(3, "c.jpg", Some(feb), 200),
            asset(4, "a.jpg", Some(jan), 300),
        ]
    }

    #[test]
    fn newest_puts_dated_first() {
        assert_eq!(sorted(PhotoSortOption::DateTakenNewest, fixtures()), vec![3, 4, 1, 2]);
    }

    #[test]
    fn oldest_puts_undated_last() {
        assert_eq!(sorted(PhotoSortOption::DateTakenOldest, fixtures()), vec![4, 1, 3, 2]);
    }

    #[test]
    fn size_orders_break_ties_by_name_then_id() {
        assert_eq!(sorted(PhotoSortOption::FileSizeLargest, fixtures()), vec![4, 1, 3, 2]);
        assert_eq!(sorted(PhotoSortOption::FileSizeSmallest, fixtures()), vec![2, 3, 4, 1]);
    }

    #[test]
    fn name_orders() {
        assert_eq!(sorted(PhotoSortOption::NameAscending, fixtures()), vec![2, 4, 1, 3]);
        assert_eq!(sorted(PhotoSortOption::NameDescending, fixtures()), vec![3, 1, 2, 4]);
    }
}

//! # Metadata Module
//!
//! Best-effort extraction of capture date, camera and dimensions.
//!
//! ## Fallback order for the capture date
//! 1. EXIF `DateTimeOriginal` (camera local time, stored as UTC)
//! 2. File creation time
//! 3. File last-write time
//! 4. `Unknown`
//!
//! Extraction never fails: unreadable files simply yield less data.

use crate::core::model::{catalog_time, DateTakenSource};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use exif::{In, Reader, Tag, Value};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Extracted photo metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoMetadata {
    pub date_taken: Option<DateTime<Utc>>,
    pub date_taken_source: DateTakenSource,
    /// Camera make (e.g., "Apple", "Canon")
    pub camera_make: Option<String>,
    /// Camera model (e.g., "iPhone 15 Pro")
    pub camera_model: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Source of per-file metadata used during reconciliation.
///
/// Implementations must not fail; the scanner treats the result as
/// authoritative.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> PhotoMetadata;
}

/// Reads EXIF with kamadak-exif and probes image headers for dimensions
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifMetadataExtractor;

impl MetadataExtractor for ExifMetadataExtractor {
    fn extract(&self, path: &Path) -> PhotoMetadata {
        let mut metadata = PhotoMetadata::default();

        read_exif(path, &mut metadata);

        if metadata.width.is_none() || metadata.height.is_none() {
            if let Ok((width, height)) = image::image_dimensions(path) {
                metadata.width.get_or_insert(width);
                metadata.height.get_or_insert(height);
            }
        }

        if metadata.date_taken.is_none() {
            apply_file_time_fallback(path, &mut metadata);
        }

        metadata
    }
}

fn read_exif(path: &Path, metadata: &mut PhotoMetadata) {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return,
    };

    let mut bufreader = BufReader::new(&file);
    let exif_reader = match Reader::new().read_from_container(&mut bufreader) {
        Ok(r) => r,
        Err(_) => return,
    };

    if let Some(field) = exif_reader.get_field(Tag::DateTimeOriginal, In::PRIMARY) {
        if let Some(raw) = get_string_value(&field.value) {
            if let Some(taken) = parse_exif_datetime(&raw) {
                metadata.date_taken = Some(taken);
                metadata.date_taken_source = DateTakenSource::Exif;
            }
        }
    }

    if let Some(field) = exif_reader.get_field(Tag::Make, In::PRIMARY) {
        metadata.camera_make = get_string_value(&field.value);
    }
    if let Some(field) = exif_reader.get_field(Tag::Model, In::PRIMARY) {
        metadata.camera_model = get_string_value(&field.value);
    }

    // Prefer actual pixel dimensions
    if let Some(field) = exif_reader.get_field(Tag::PixelXDimension, In::PRIMARY) {
        metadata.width = get_u32_value(&field.value);
    }
    if let Some(field) = exif_reader.get_field(Tag::PixelYDimension, In::PRIMARY) {
        metadata.height = get_u32_value(&field.value);
    }
    if metadata.width.is_none() {
        if let Some(field) = exif_reader.get_field(Tag::ImageWidth, In::PRIMARY) {
            metadata.width = get_u32_value(&field.value);
        }
    }
    if metadata.height.is_none() {
        if let Some(field) = exif_reader.get_field(Tag::ImageLength, In::PRIMARY) {
            metadata.height = get_u32_value(&field.value);
        }
    }
}

fn apply_file_time_fallback(path: &Path, metadata: &mut PhotoMetadata) {
    let Ok(fs_meta) = std::fs::metadata(path) else {
        metadata.date_taken_source = DateTakenSource::Unknown;
        return;
    };

    let created = fs_meta.created().ok().map(catalog_time).filter(is_usable);
    let modified = fs_meta.modified().ok().map(catalog_time).filter(is_usable);

    if let Some(created) = created {
        metadata.date_taken = Some(created);
        metadata.date_taken_source = DateTakenSource::FileCreated;
    } else if let Some(modified) = modified {
        metadata.date_taken = Some(modified);
        metadata.date_taken_source = DateTakenSource::FileModified;
    } else {
        metadata.date_taken_source = DateTakenSource::Unknown;
    }
}

fn is_usable(time: &DateTime<Utc>) -> bool {
    *time > DateTime::<Utc>::UNIX_EPOCH
}

/// Parse "YYYY:MM:DD HH:MM:SS" as camera-local time and convert to UTC.
fn parse_exif_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim_matches(|c: char| c == '"' || c == '\0' || c.is_whitespace());
    let naive = NaiveDateTime::parse_from_str(trimmed, "%Y:%m:%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S"))
        .ok()?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// Helper to extract u32 from various EXIF value types
fn get_u32_value(value: &Value) -> Option<u32> {
    match value {
        Value::Long(vec) => vec.first().copied(),
        Value::Short(vec) => vec.first().map(|v| *v as u32),
        _ => None,
    }
}

/// Helper to extract string from EXIF ASCII value
fn get_string_value(value: &Value) -> Option<String> {
    if let Value::Ascii(ref vec) = value {
        if let Some(bytes) = vec.first() {
            if let Ok(s) = std::str::from_utf8(bytes) {
                let trimmed = s.trim_end_matches('\0').trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn exif_datetime_is_parsed_as_local_time() {
        let parsed = parse_exif_datetime("2023:01:05 14:30:00").unwrap();
        let local = parsed.with_timezone(&Local);
        assert_eq!(local.year(), 2023);
        assert_eq!(local.month(), 1);
        assert_eq!(local.day(), 5);
        assert_eq!(local.hour(), 14);
    }

    #[test]
    fn exif_datetime_rejects_garbage() {
        assert!(parse_exif_datetime("not a date").is_none());
        assert!(parse_exif_datetime("0000:00:00 00:00:00").is_none());
    }

    #[test]
    fn file_without_exif_falls_back_to_file_times() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("plain.jpg");
        File::create(&path).unwrap().write_all(b"not really a jpeg").unwrap();

        let metadata = ExifMetadataExtractor.extract(&path);

        assert!(metadata.date_taken.is_some());
        assert!(matches!(
            metadata.date_taken_source,
            DateTakenSource::FileCreated | DateTakenSource::FileModified
        ));
        assert!(metadata.camera_make.is_none());
    }

    #[test]
    fn missing_file_yields_unknown_source() {
        let metadata = ExifMetadataExtractor.extract(Path::new("/nonexistent/file.jpg"));
        assert!(metadata.date_taken.is_none());
        assert_eq!(metadata.date_taken_source, DateTakenSource::Unknown);
    }

    #[test]
    fn png_header_provides_dimensions() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pixel.png");
        File::create(&path)
            .unwrap()
            .write_all(&[
                0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG header
                0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR chunk
                0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, // 1x1
                0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C,
                0x49, 0x44, 0x41, 0x54, 0x08, 0xD7, 0x63, 0xF8, 0xFF, 0xFF, 0x3F, 0x00, 0x05,
                0xFE, 0x02, 0xFE, 0xDC, 0xCC, 0x59, 0xE7, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45,
                0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
            ])
            .unwrap();

        let metadata = ExifMetadataExtractor.extract(&path);
        assert_eq!(metadata.width, Some(1));
        assert_eq!(metadata.height, Some(1));
    }
}

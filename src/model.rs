use crate::error::Error;
use chrono::Datelike;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

lazy_static! {
    // ex: 2005-06-27T09:56:05-04:00, 2006:05:22 19:17:28\0
    static ref DATE_PATTERN: Regex = Regex::new(
        r"^(\d{4})[:-](\d{2})[:-](\d{2})[T ](\d{2}):(\d{2}):(\d{2})Z?(\x00|[+-]\d{2}:\d{2})?$"
    )
    .unwrap();
    static ref DIMENSION_PATTERN: Regex = Regex::new(r"^(\d+)x(\d+)$").unwrap();
}

/// Anything earlier than this is taken to be a camera with an unset clock.
pub const EARLIEST_CAPTURE_YEAR: i32 = 1998;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaptureDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl CaptureDate {
    /// Parse a capture date, ignoring any timezone. Returns `None` for text
    /// that does not look like a date or holds obviously wrong values.
    pub fn parse(text: &str) -> Option<CaptureDate> {
        let caps = match DATE_PATTERN.captures(text) {
            Some(caps) => caps,
            None => {
                warn!("Failed to parse capture date: {:?}", text);
                return None;
            }
        };

        let field = |idx: usize| -> Option<i64> { caps.get(idx)?.as_str().parse().ok() };
        let values = [field(1)?, field(2)?, field(3)?, field(4)?, field(5)?, field(6)?];

        let current_year = chrono::Local::now().year() as i64;
        let bounds = [
            (EARLIEST_CAPTURE_YEAR as i64, current_year),
            (1, 12),
            (1, 31),
            (0, 24),
            (0, 59),
            (0, 59),
        ];
        if values
            .iter()
            .zip(bounds.iter())
            .any(|(v, (lo, hi))| v < lo || v > hi)
        {
            warn!("Capture date out of range: {:?}", text);
            return None;
        }

        Some(CaptureDate {
            year: values[0] as i32,
            month: values[1] as u32,
            day: values[2] as u32,
            hour: values[3] as u32,
            minute: values[4] as u32,
            second: values[5] as u32,
        })
    }
}

impl fmt::Display for CaptureDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn parse(text: &str) -> Result<Dimensions, Error> {
        let invalid = || Error::InvalidRecord(format!("unable to parse dimensions '{}'", text));
        let caps = DIMENSION_PATTERN.captures(text).ok_or_else(invalid)?;
        let width: u32 = caps[1].parse().map_err(|_| invalid())?;
        let height: u32 = caps[2].parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Dimensions { width, height })
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Optional image properties. At least one field is set whenever a record
/// carries a `MediaInfo` at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaInfo {
    pub captured: Option<CaptureDate>,
    pub dimensions: Option<Dimensions>,
}

impl MediaInfo {
    pub fn new(captured: Option<CaptureDate>, dimensions: Option<Dimensions>) -> Option<MediaInfo> {
        if captured.is_none() && dimensions.is_none() {
            None
        } else {
            Some(MediaInfo {
                captured,
                dimensions,
            })
        }
    }
}

/// Identifies byte-identical content regardless of name or location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentKey {
    pub size: u64,
    pub checksum: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRecord", into = "RawRecord")]
pub struct InventoryRecord {
    /// Forward-slash separated, relative to the inventoried root unless the
    /// snapshot was built or merged with directory prefixes.
    pub relative_path: String,
    pub size_bytes: u64,
    /// Lowercase hex; empty when identification skipped hashing.
    pub checksum: String,
    pub media: Option<MediaInfo>,
}

impl InventoryRecord {
    pub fn new(relative_path: impl Into<String>, size_bytes: u64, checksum: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            size_bytes,
            checksum: checksum.into(),
            media: None,
        }
    }

    pub fn with_media(mut self, media: Option<MediaInfo>) -> Self {
        self.media = media;
        self
    }

    pub fn content_key(&self) -> ContentKey {
        ContentKey {
            size: self.size_bytes,
            checksum: self.checksum.clone(),
        }
    }

    /// True when path, size and checksum agree; media fields are ignored.
    pub fn same_core(&self, other: &InventoryRecord) -> bool {
        self.relative_path == other.relative_path
            && self.size_bytes == other.size_bytes
            && self.checksum == other.checksum
    }

    /// The last path component.
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.relative_path)
    }
}

/// On-disk shape: `[path, size, checksum]` or
/// `[path, size, checksum, "YYYY-MM-DD HH:MM:SS" | null, "WxH" | null]`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum RawRecord {
    Extended(String, u64, String, Option<String>, Option<String>),
    Core(String, u64, String),
}

impl TryFrom<RawRecord> for InventoryRecord {
    type Error = Error;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        match raw {
            RawRecord::Core(path, size, checksum) => Ok(InventoryRecord::new(path, size, checksum)),
            RawRecord::Extended(path, size, checksum, date, dims) => {
                let captured = date.as_deref().and_then(CaptureDate::parse);
                let dimensions = dims.as_deref().map(Dimensions::parse).transpose()?;
                Ok(InventoryRecord::new(path, size, checksum)
                    .with_media(MediaInfo::new(captured, dimensions)))
            }
        }
    }
}

impl From<InventoryRecord> for RawRecord {
    fn from(record: InventoryRecord) -> Self {
        match record.media {
            Some(media) => RawRecord::Extended(
                record.relative_path,
                record.size_bytes,
                record.checksum,
                media.captured.map(|d| d.to_string()),
                media.dimensions.map(|d| d.to_string()),
            ),
            None => RawRecord::Core(record.relative_path, record.size_bytes, record.checksum),
        }
    }
}

/// Records for one directory tree at one point in time, strictly increasing
/// by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<InventoryRecord>", into = "Vec<InventoryRecord>")]
pub struct Snapshot {
    records: Vec<InventoryRecord>,
}

impl Snapshot {
    /// Sort the records by path. Fails if any path occurs twice.
    pub fn new(mut records: Vec<InventoryRecord>) -> Result<Snapshot, Error> {
        records.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        if let Some(pair) = records
            .windows(2)
            .find(|pair| pair[0].relative_path == pair[1].relative_path)
        {
            return Err(Error::DuplicatePath(pair[0].relative_path.clone()));
        }
        Ok(Snapshot { records })
    }

    pub fn records(&self) -> &[InventoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InventoryRecord> {
        self.records.iter()
    }

    pub fn get(&self, path: &str) -> Option<&InventoryRecord> {
        self.position(path).ok().map(|idx| &self.records[idx])
    }

    pub fn total_bytes(&self) -> u64 {
        self.records.iter().map(|r| r.size_bytes).sum()
    }

    /// Insert keeping the sort order. A path already present is a
    /// consistency error.
    pub fn insert(&mut self, record: InventoryRecord) -> Result<(), Error> {
        match self.position(&record.relative_path) {
            Ok(_) => Err(Error::PatchInconsistency(format!(
                "'{}' is already in the inventory",
                record.relative_path
            ))),
            Err(idx) => {
                self.records.insert(idx, record);
                Ok(())
            }
        }
    }

    /// Remove by path. A path that is not present is a consistency error.
    pub fn remove(&mut self, path: &str) -> Result<InventoryRecord, Error> {
        match self.position(path) {
            Ok(idx) => Ok(self.records.remove(idx)),
            Err(_) => Err(Error::PatchInconsistency(format!(
                "'{}' is not in the inventory",
                path
            ))),
        }
    }

    /// Keep only records for which `keep` holds.
    pub fn retain<F: FnMut(&InventoryRecord) -> bool>(&mut self, keep: F) {
        self.records.retain(keep);
    }

    pub fn into_records(self) -> Vec<InventoryRecord> {
        self.records
    }

    fn position(&self, path: &str) -> Result<usize, usize> {
        self.records
            .binary_search_by(|r| r.relative_path.as_str().cmp(path))
    }
}

impl TryFrom<Vec<InventoryRecord>> for Snapshot {
    type Error = Error;

    fn try_from(records: Vec<InventoryRecord>) -> Result<Self, Self::Error> {
        Snapshot::new(records)
    }
}

impl From<Snapshot> for Vec<InventoryRecord> {
    fn from(snapshot: Snapshot) -> Self {
        snapshot.records
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a InventoryRecord;
    type IntoIter = std::slice::Iter<'a, InventoryRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_capture_date_variants() {
        let expected = CaptureDate {
            year: 2006,
            month: 5,
            day: 22,
            hour: 19,
            minute: 17,
            second: 28,
        };
        assert_eq!(CaptureDate::parse("2006-05-22 19:17:28"), Some(expected));
        assert_eq!(CaptureDate::parse("2006:05:22 19:17:28\0"), Some(expected));
        assert_eq!(CaptureDate::parse("2006-05-22T19:17:28-04:00"), Some(expected));
        assert_eq!(CaptureDate::parse("2006-05-22T19:17:28Z"), Some(expected));
        assert_eq!(expected.to_string(), "2006-05-22 19:17:28");
    }

    #[test]
    fn test_parse_capture_date_rejects_implausible_values() {
        assert_eq!(CaptureDate::parse("1980-01-01 00:00:00"), None);
        assert_eq!(CaptureDate::parse("2005-13-01 00:00:00"), None);
        assert_eq!(CaptureDate::parse("2005-01-01 00:61:00"), None);
        assert_eq!(CaptureDate::parse("yesterday"), None);
    }

    #[test]
    fn test_parse_dimensions() {
        assert_eq!(
            Dimensions::parse("640x480").unwrap(),
            Dimensions {
                width: 640,
                height: 480
            }
        );
        assert!(Dimensions::parse("640 x 480").is_err());
        assert!(Dimensions::parse("0x480").is_err());
    }

    #[test]
    fn test_record_shapes_from_json() {
        let json = r#"[
            ["a.jpg", 100, "c1"],
            ["b.jpg", 50, "c2", "2005-06-27 09:56:05", "640x480"],
            ["c.jpg", 70, "c3", null, "10x20"],
            ["d.jpg", 80, "c4", null, null]
        ]"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot.records()[0].media, None);
        let b = snapshot.get("b.jpg").unwrap();
        let media = b.media.unwrap();
        assert_eq!(media.captured.unwrap().year, 2005);
        assert_eq!(media.dimensions.unwrap().width, 640);
        assert_eq!(snapshot.get("c.jpg").unwrap().media.unwrap().captured, None);
        assert_eq!(snapshot.get("d.jpg").unwrap().media, None);

        let written = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(written[0].as_array().unwrap().len(), 3);
        assert_eq!(written[1][3], "2005-06-27 09:56:05");
        assert_eq!(written[1][4], "640x480");
        assert!(written[2][3].is_null());
        assert_eq!(written[3].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_snapshot_sorts_and_rejects_duplicates() {
        let snapshot = Snapshot::new(vec![
            InventoryRecord::new("b.jpg", 1, "x"),
            InventoryRecord::new("a.jpg", 1, "x"),
        ])
        .unwrap();
        assert_eq!(snapshot.records()[0].relative_path, "a.jpg");

        let err = Snapshot::new(vec![
            InventoryRecord::new("a.jpg", 1, "x"),
            InventoryRecord::new("a.jpg", 2, "y"),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::DuplicatePath(p) if p == "a.jpg"));
    }

    #[test]
    fn test_snapshot_insert_and_remove_keep_order() {
        let mut snapshot = Snapshot::new(vec![
            InventoryRecord::new("a.jpg", 1, "x"),
            InventoryRecord::new("c.jpg", 1, "x"),
        ])
        .unwrap();
        snapshot.insert(InventoryRecord::new("b.jpg", 1, "x")).unwrap();
        let paths: Vec<_> = snapshot.iter().map(|r| r.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["a.jpg", "b.jpg", "c.jpg"]);

        assert!(snapshot.insert(InventoryRecord::new("b.jpg", 9, "z")).is_err());
        assert!(snapshot.remove("missing.jpg").is_err());
        assert_eq!(snapshot.remove("a.jpg").unwrap().relative_path, "a.jpg");
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_file_name_and_content_key() {
        let a = InventoryRecord::new("2005/trip/IMG_0001.JPG", 10, "ab");
        let b = InventoryRecord::new("copy.jpg", 10, "ab");
        assert_eq!(a.file_name(), "IMG_0001.JPG");
        assert_eq!(b.file_name(), "copy.jpg");
        assert_eq!(a.content_key(), b.content_key());
    }
}

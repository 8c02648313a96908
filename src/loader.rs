//! Dataset loading for the listening log and the song catalog.
//!
//! Both inputs are comma-delimited with a header row. Cells are typed the
//! way a schema-inferring reader would: empty cells are null, identifier
//! columns become integer or text keys as a whole, and cells that do not
//! fit their column type become null instead of failing the run.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use std::path::{Path, PathBuf};

use crate::models::{KeyKind, ListenEvent, RunStats, SongMeta, StringInterner};
use crate::progress::{create_spinner, log_done, Phase};

const READ_LOG_INTERVAL: u64 = 100_000;

/// Accepted timestamp layouts, tried in order before RFC 3339 and bare dates.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Untyped contents of one delimited input file.
#[derive(Debug)]
pub struct RawTable {
    pub path: PathBuf,
    pub headers: StringRecord,
    pub records: Vec<StringRecord>,
}

impl RawTable {
    /// Index of a required column, by exact header name.
    pub fn column(&self, name: &str) -> Result<usize> {
        match self.headers.iter().position(|h| h == name) {
            Some(idx) => Ok(idx),
            None => bail!(
                "Input file '{}' is missing required column '{}'",
                self.path.display(),
                name
            ),
        }
    }

    fn cells(&self, idx: usize) -> impl Iterator<Item = &str> + '_ {
        self.records.iter().map(move |r| r.get(idx).unwrap_or(""))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Read a header-first delimited file into memory.
///
/// A missing file, an empty file or a ragged record fails the whole run.
pub fn read_table(path: &Path) -> Result<RawTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Failed to open input file '{}'", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header of '{}'", path.display()))?
        .clone();
    if headers.is_empty() {
        bail!("Input file '{}' has no header row", path.display());
    }

    let phase = file_label(path);
    let spinner = create_spinner(&format!("Reading {}", phase));
    let mut records = Vec::new();
    for result in reader.records() {
        let record = result
            .with_context(|| format!("Malformed record in '{}'", path.display()))?;
        records.push(record);
        let n = records.len() as u64;
        if n % READ_LOG_INTERVAL == 0 {
            spinner.set_message(format!("Reading {} ({} rows)", phase, n));
            log_done(Phase::Read, &format!("{} rows from {}", n, phase));
        }
    }

    let msg = format!("Read {} rows from {}", records.len(), phase);
    spinner.finish_with_message(msg.clone());
    log_done(Phase::Read, &msg);

    Ok(RawTable {
        path: path.to_path_buf(),
        headers,
        records,
    })
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

/// Parse a timestamp cell; unparsable or empty cells are null.
pub fn parse_timestamp(cell: &str) -> Option<NaiveDateTime> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(cell, fmt) {
            return Some(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(cell) {
        // Keep the wall-clock time the event was logged in.
        return Some(ts.naive_local());
    }
    NaiveDate::parse_from_str(cell, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse a listen duration; non-numeric and non-finite cells are null.
pub fn parse_duration(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Load `listening_logs.csv`: user_id, song_id, timestamp, duration_sec.
pub fn load_listening_logs(
    path: &Path,
    interner: &mut StringInterner,
    stats: &mut RunStats,
) -> Result<Vec<ListenEvent>> {
    let table = read_table(path)?;
    let user_col = table.column("user_id")?;
    let song_col = table.column("song_id")?;
    let ts_col = table.column("timestamp")?;
    let dur_col = table.column("duration_sec")?;

    let user_kind = KeyKind::infer(table.cells(user_col));
    let song_kind = KeyKind::infer(table.cells(song_col));

    let mut events = Vec::with_capacity(table.len());
    for record in &table.records {
        let event = ListenEvent {
            user_id: user_kind.parse(record.get(user_col).unwrap_or(""), interner),
            song_id: song_kind.parse(record.get(song_col).unwrap_or(""), interner),
            timestamp: parse_timestamp(record.get(ts_col).unwrap_or("")),
            duration_sec: parse_duration(record.get(dur_col).unwrap_or("")),
        };
        stats.null_user_ids += event.user_id.is_none() as usize;
        stats.null_event_song_ids += event.song_id.is_none() as usize;
        stats.null_timestamps += event.timestamp.is_none() as usize;
        stats.null_durations += event.duration_sec.is_none() as usize;
        events.push(event);
    }

    stats.events_read = events.len();
    Ok(events)
}

/// Load `songs_metadata.csv`: song_id and genre; other columns are ignored.
pub fn load_songs(
    path: &Path,
    interner: &mut StringInterner,
    stats: &mut RunStats,
) -> Result<Vec<SongMeta>> {
    let table = read_table(path)?;
    let song_col = table.column("song_id")?;
    let genre_col = table.column("genre")?;

    let song_kind = KeyKind::infer(table.cells(song_col));

    let mut songs = Vec::with_capacity(table.len());
    for record in &table.records {
        let genre = record.get(genre_col).unwrap_or("");
        let song = SongMeta {
            song_id: song_kind.parse(record.get(song_col).unwrap_or(""), interner),
            genre: (!genre.is_empty()).then(|| interner.intern(genre)),
        };
        stats.null_catalog_song_ids += song.song_id.is_none() as usize;
        stats.null_genres += song.genre.is_none() as usize;
        songs.push(song);
    }

    stats.songs_read = songs.len();
    Ok(songs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Key;
    use chrono::Timelike;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(parse_timestamp("2024-01-01 02:15:00").unwrap().hour(), 2);
        assert_eq!(parse_timestamp("2024-01-01T23:59:59").unwrap().hour(), 23);
        assert_eq!(parse_timestamp("2024-03-10 04:00:00.250").unwrap().hour(), 4);
        assert_eq!(parse_timestamp("2024-03-10T01:30:00+05:00").unwrap().hour(), 1);
        assert_eq!(parse_timestamp("2024-03-10").unwrap().hour(), 0);
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("120"), Some(120.0));
        assert_eq!(parse_duration(" 61.5 "), Some(61.5));
        assert_eq!(parse_duration("abc"), None);
        assert_eq!(parse_duration("NaN"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_load_listening_logs_infers_types() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "listening_logs.csv",
            "user_id,song_id,timestamp,duration_sec\n\
             user_1,101,2024-01-01 02:00:00,120\n\
             user_2,102,not a time,oops\n\
             ,,2024-01-01 10:00:00,60\n",
        );
        let mut interner = StringInterner::new();
        let mut stats = RunStats::default();
        let events = load_listening_logs(&path, &mut interner, &mut stats).unwrap();

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].user_id, Some(Key::Text(Arc::from("user_1"))));
        assert_eq!(events[0].song_id, Some(Key::Int(101)));
        assert_eq!(events[0].duration_sec, Some(120.0));
        assert!(events[1].timestamp.is_none());
        assert!(events[1].duration_sec.is_none());
        assert!(events[2].user_id.is_none());
        assert!(events[2].song_id.is_none());

        assert_eq!(stats.events_read, 3);
        assert_eq!(stats.null_user_ids, 1);
        assert_eq!(stats.null_event_song_ids, 1);
        assert_eq!(stats.null_catalog_song_ids, 0);
        assert_eq!(stats.null_timestamps, 1);
        assert_eq!(stats.null_durations, 1);
    }

    #[test]
    fn test_load_songs_ignores_extra_columns() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "songs_metadata.csv",
            "song_id,title,artist,genre,mood\n\
             s1,Song A,Artist A,Rock,Happy\n\
             s2,Song B,Artist B,,Sad\n\
             ,Song C,Artist C,Pop,Calm\n",
        );
        let mut interner = StringInterner::new();
        let mut stats = RunStats::default();
        let songs = load_songs(&path, &mut interner, &mut stats).unwrap();

        assert_eq!(songs.len(), 3);
        assert_eq!(songs[0].genre.as_deref(), Some("Rock"));
        assert!(songs[1].genre.is_none());
        assert!(songs[2].song_id.is_none());
        assert_eq!(stats.songs_read, 3);
        assert_eq!(stats.null_genres, 1);
        assert_eq!(stats.null_catalog_song_ids, 1);
        assert_eq!(stats.null_event_song_ids, 0);
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "songs_metadata.csv", "song_id,title\ns1,Song A\n");
        let result = load_songs(&path, &mut StringInterner::new(), &mut RunStats::default());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("missing required column 'genre'"));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let result = read_table(&dir.path().join("absent.csv"));
        assert!(result.is_err());
    }

    #[test]
    fn test_ragged_record_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "bad.csv", "song_id,genre\ns1,Rock,extra\n");
        assert!(read_table(&path).is_err());
    }

    #[test]
    fn test_empty_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "empty.csv", "");
        let err = read_table(&path).unwrap_err().to_string();
        assert!(err.contains("no header row"));
    }
}

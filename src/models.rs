//! Core data models for the listening analytics pipeline.
//!
//! Input records, the joined fact row every query reads, the four result
//! row types, and the run statistics written at the end of a run.

use chrono::NaiveDateTime;
use rustc_hash::FxHashSet;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier kind inferred once per column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Int,
    Text,
}

impl KeyKind {
    /// Integer if every non-empty cell parses as i64, text otherwise.
    /// A column with no values at all is text.
    pub fn infer<'a>(cells: impl IntoIterator<Item = &'a str>) -> Self {
        let mut seen = false;
        for cell in cells.into_iter().filter(|c| !c.is_empty()) {
            if cell.parse::<i64>().is_err() {
                return KeyKind::Text;
            }
            seen = true;
        }
        if seen {
            KeyKind::Int
        } else {
            KeyKind::Text
        }
    }

    /// Parse a cell under this column kind. Empty cells are null.
    pub fn parse(self, cell: &str, interner: &mut StringInterner) -> Option<Key> {
        if cell.is_empty() {
            return None;
        }
        match self {
            KeyKind::Int => cell.parse().ok().map(Key::Int),
            KeyKind::Text => Some(Key::Text(interner.intern(cell))),
        }
    }
}

/// User or song identifier.
///
/// All keys of one column share a variant, so the derived ordering is
/// numeric for integer columns and lexicographic for text columns.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Int(i64),
    Text(Arc<str>),
}

impl Key {
    pub fn kind(&self) -> KeyKind {
        match self {
            Key::Int(_) => KeyKind::Int,
            Key::Text(_) => KeyKind::Text,
        }
    }

    /// Integer form of the key, used when two columns disagree on kind.
    /// Text that is not an integer has none, so `"007"` becomes 7 and
    /// `"s1"` matches nothing.
    pub fn to_int(&self) -> Option<Key> {
        match self {
            Key::Int(_) => Some(self.clone()),
            Key::Text(s) => s.trim().parse().ok().map(Key::Int),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(v) => write!(f, "{}", v),
            Key::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Key::Int(v) => serializer.serialize_i64(*v),
            Key::Text(s) => serializer.serialize_str(s),
        }
    }
}

// ============================================================================
// String Interning
// ============================================================================

/// Deduplicates repeated genre and user strings while loading.
/// A catalog has a handful of genres shared by every song row.
pub struct StringInterner {
    strings: FxHashSet<Arc<str>>,
}

impl StringInterner {
    pub fn new() -> Self {
        Self {
            strings: FxHashSet::default(),
        }
    }

    /// Intern a string, returning the shared handle if it was seen before.
    pub fn intern(&mut self, s: &str) -> Arc<str> {
        if let Some(existing) = self.strings.get(s) {
            return Arc::clone(existing);
        }
        let arc: Arc<str> = Arc::from(s);
        self.strings.insert(Arc::clone(&arc));
        arc
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Input Records
// ============================================================================

/// One row of the listening log
#[derive(Clone, Debug)]
pub struct ListenEvent {
    pub user_id: Option<Key>,
    pub song_id: Option<Key>,
    pub timestamp: Option<NaiveDateTime>,
    pub duration_sec: Option<f64>,
}

/// One row of the song catalog (only the columns the queries read)
#[derive(Clone, Debug)]
pub struct SongMeta {
    pub song_id: Option<Key>,
    pub genre: Option<Arc<str>>,
}

/// Event joined with its song's metadata.
#[derive(Clone, Debug)]
pub struct ListenFact {
    pub user_id: Option<Key>,
    pub song_id: Key,
    pub genre: Option<Arc<str>>,
    pub timestamp: Option<NaiveDateTime>,
    pub duration_sec: Option<f64>,
}

// ============================================================================
// Result Rows
// ============================================================================

/// A row of one of the task outputs.
///
/// Field names of the serialized struct match `HEADER`; `cells` renders
/// the same values for the console preview, with `null` for missing ones.
pub trait ResultRow: Serialize + Send + Sync {
    const HEADER: &'static [&'static str];

    fn cells(&self) -> Vec<String>;
}

fn cell_or_null<T: fmt::Display>(value: Option<&T>) -> String {
    value.map_or_else(|| "null".to_string(), |v| v.to_string())
}

/// Render a double the way the output files do: always with a fraction.
pub fn format_double(value: f64) -> String {
    let s = value.to_string();
    if value.is_finite() && !s.contains('.') {
        format!("{}.0", s)
    } else {
        s
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FavoriteGenre {
    pub user_id: Option<Key>,
    pub genre: Option<Arc<str>>,
    pub listen_count: u64,
}

impl ResultRow for FavoriteGenre {
    const HEADER: &'static [&'static str] = &["user_id", "genre", "listen_count"];

    fn cells(&self) -> Vec<String> {
        vec![
            cell_or_null(self.user_id.as_ref()),
            cell_or_null(self.genre.as_ref()),
            self.listen_count.to_string(),
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenreAverage {
    pub genre: Option<Arc<str>>,
    pub avg_duration_sec: Option<f64>,
}

impl ResultRow for GenreAverage {
    const HEADER: &'static [&'static str] = &["genre", "avg_duration_sec"];

    fn cells(&self) -> Vec<String> {
        vec![
            cell_or_null(self.genre.as_ref()),
            self.avg_duration_sec
                .map_or_else(|| "null".to_string(), format_double),
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenreLoyalty {
    pub user_id: Key,
    pub top_genre: Option<Arc<str>>,
    pub top_genre_plays: u64,
    pub total_plays: u64,
    pub loyalty_score: f64,
}

impl ResultRow for GenreLoyalty {
    const HEADER: &'static [&'static str] = &[
        "user_id",
        "top_genre",
        "top_genre_plays",
        "total_plays",
        "loyalty_score",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.user_id.to_string(),
            cell_or_null(self.top_genre.as_ref()),
            self.top_genre_plays.to_string(),
            self.total_plays.to_string(),
            format_double(self.loyalty_score),
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NightListener {
    pub user_id: Option<Key>,
}

impl ResultRow for NightListener {
    const HEADER: &'static [&'static str] = &["user_id"];

    fn cells(&self) -> Vec<String> {
        vec![cell_or_null(self.user_id.as_ref())]
    }
}

// ============================================================================
// Tasks
// ============================================================================

/// The four result sets a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    FavoriteGenres,
    AvgListenTime,
    GenreLoyalty,
    NightListeners,
}

impl Task {
    pub const ALL: [Task; 4] = [
        Task::FavoriteGenres,
        Task::AvgListenTime,
        Task::GenreLoyalty,
        Task::NightListeners,
    ];

    /// Result directory under the output root
    pub fn dir_name(self) -> &'static str {
        match self {
            Task::FavoriteGenres => "task1_user_favorite_genres",
            Task::AvgListenTime => "task2_avg_listen_time",
            Task::GenreLoyalty => "task3_genre_loyalty",
            Task::NightListeners => "task4_night_listeners",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Task::FavoriteGenres => "Task 1: User Favorite Genres",
            Task::AvgListenTime => "Task 2: Average Listen Time per Genre",
            Task::GenreLoyalty => "Task 3: Genre Loyalty Scores (Top 10)",
            Task::NightListeners => "Task 4: Night-Owl Users (12 AM - 5 AM)",
        }
    }

    /// Rows shown in the console preview
    pub fn preview_rows(self) -> usize {
        match self {
            Task::FavoriteGenres => 10,
            Task::AvgListenTime | Task::GenreLoyalty => 20,
            Task::NightListeners => 50,
        }
    }
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Counters collected over one run, logged and optionally written as JSON.
#[derive(Default, Debug, Clone, Serialize)]
pub struct RunStats {
    // Loading
    pub events_read: usize,
    pub songs_read: usize,
    pub null_user_ids: usize,
    pub null_event_song_ids: usize,
    pub null_catalog_song_ids: usize,
    pub null_timestamps: usize,
    pub null_durations: usize,
    pub null_genres: usize,

    // Join
    pub events_unmatched: usize,
    pub joined_rows: usize,

    // Outputs
    pub favorite_genre_rows: usize,
    pub avg_listen_time_rows: usize,
    pub genre_loyalty_rows: usize,
    pub night_listener_rows: usize,

    // Timing
    pub elapsed_seconds: f64,
}

impl RunStats {
    /// Share of events that found their song, as a percentage
    pub fn join_rate(&self) -> f64 {
        if self.events_read == 0 {
            0.0
        } else {
            100.0 * (self.events_read - self.events_unmatched) as f64 / self.events_read as f64
        }
    }

    /// Lines of the closing summary banner
    pub fn summary_lines(&self) -> Vec<String> {
        vec![
            format!("Events: {} ({} without a song)", self.events_read, self.events_unmatched),
            format!("Joined rows: {} ({:.1}%)", self.joined_rows, self.join_rate()),
            format!("Users with a favorite genre: {}", self.favorite_genre_rows),
            format!("Genres: {}", self.avg_listen_time_rows),
            format!("Loyalty rows: {}", self.genre_loyalty_rows),
            format!("Night-owl users: {}", self.night_listener_rows),
            format!("Elapsed: {:.2}s", self.elapsed_seconds),
        ]
    }

    /// Log stats to stderr in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[STATS:{}]\n{}", phase, json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

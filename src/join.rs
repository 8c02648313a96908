//! Inner join of listening events with song metadata on `song_id`.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::models::{Key, KeyKind, ListenEvent, ListenFact, SongMeta};
use crate::progress::{create_progress_bar, log_progress, Phase};

const JOIN_LOG_INTERVAL: u64 = 100_000;

/// Joined rows plus the number of events that found no song.
#[derive(Debug)]
pub struct JoinOutcome {
    pub facts: Vec<ListenFact>,
    pub unmatched: usize,
}

fn column_kind<'a>(mut keys: impl Iterator<Item = Option<&'a Key>>) -> Option<KeyKind> {
    keys.find_map(|k| k.map(Key::kind))
}

/// Hash join keeping only events whose `song_id` exists in the catalog.
///
/// Null ids never match. A song listed twice in the catalog yields one
/// fact per catalog row. If the two files inferred different id kinds
/// (say integer ids in the log, text ids in the catalog) text ids are
/// cast to integers and those that are not integers match nothing.
/// Facts keep the order of the events.
pub fn inner_join(events: &[ListenEvent], songs: &[SongMeta]) -> JoinOutcome {
    let event_kind = column_kind(events.iter().map(|e| e.song_id.as_ref()));
    let song_kind = column_kind(songs.iter().map(|s| s.song_id.as_ref()));
    let compare_as_int = matches!((event_kind, song_kind), (Some(a), Some(b)) if a != b);
    let join_key = |k: &Key| if compare_as_int { k.to_int() } else { Some(k.clone()) };

    let mut catalog: FxHashMap<Key, Vec<Option<Arc<str>>>> = FxHashMap::default();
    for song in songs {
        if let Some(key) = song.song_id.as_ref().and_then(join_key) {
            catalog.entry(key).or_default().push(song.genre.clone());
        }
    }

    let total = events.len() as u64;
    let pb = create_progress_bar(total, "Phase 2: Joining events to songs");

    let mut facts = Vec::with_capacity(events.len());
    let mut unmatched = 0;
    for (i, event) in events.iter().enumerate() {
        let genres = event
            .song_id
            .as_ref()
            .and_then(|id| catalog.get(&join_key(id)?).map(|g| (id, g)));
        match genres {
            Some((song_id, genres)) => {
                for genre in genres {
                    facts.push(ListenFact {
                        user_id: event.user_id.clone(),
                        song_id: song_id.clone(),
                        genre: genre.clone(),
                        timestamp: event.timestamp,
                        duration_sec: event.duration_sec,
                    });
                }
            }
            None => unmatched += 1,
        }
        pb.inc(1);
        log_progress(Phase::Join, i as u64 + 1, total, JOIN_LOG_INTERVAL);
    }

    pb.finish_with_message(format!(
        "Phase 2: Joined {} rows ({} events without a song)",
        facts.len(),
        unmatched
    ));

    JoinOutcome { facts, unmatched }
}

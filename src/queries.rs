//! The four aggregations over the joined listening facts.
//!
//! Every query is a pure function of `&[ListenFact]`. Ranking ties are
//! broken explicitly so that reruns on the same inputs write identical
//! files:
//! - favorite genre: higher `listen_count` first, then genre ascending
//!   (a null genre sorts before any name)
//! - loyalty: higher `loyalty_score` first, then `user_id` ascending

use chrono::Timelike;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::models::{
    FavoriteGenre, GenreAverage, GenreLoyalty, Key, ListenFact, NightListener,
};
use crate::progress::{create_spinner, log_done, Phase};

/// Decimal places of `avg_duration_sec`
pub const AVG_DURATION_SCALE: usize = 2;

/// Decimal places of `loyalty_score`
pub const LOYALTY_SCALE: usize = 4;

/// Rows kept by the loyalty ranking
pub const LOYALTY_TOP_N: usize = 10;

/// Night window in hours of the day, start inclusive, end exclusive
pub const NIGHT_HOURS: std::ops::Range<u32> = 0..5;

/// (user_id, genre) grouping key
pub type GenreKey = (Option<Key>, Option<Arc<str>>);

/// A user's most played genre (row_number() = 1 within the user partition)
#[derive(Clone, Debug, PartialEq)]
pub struct TopGenre {
    pub user_id: Option<Key>,
    pub genre: Option<Arc<str>>,
    pub listen_count: u64,
}

/// Round half away from zero on the shortest decimal form of `value`.
///
/// Working on the decimal text rather than on `value * 10^scale` keeps
/// 2.675 at 2.68 instead of the binary neighbour 2.67.
pub fn round_half_up(value: f64, scale: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let repr = value.abs().to_string();
    let (int_part, frac_part) = repr.split_once('.').unwrap_or((repr.as_str(), ""));
    if frac_part.len() <= scale {
        return value;
    }

    let mut digits: Vec<u8> = int_part
        .bytes()
        .chain(frac_part.bytes().take(scale))
        .map(|b| b - b'0')
        .collect();
    if frac_part.as_bytes()[scale] >= b'5' {
        let mut i = digits.len();
        loop {
            if i == 0 {
                digits.insert(0, 1);
                break;
            }
            i -= 1;
            if digits[i] == 9 {
                digits[i] = 0;
            } else {
                digits[i] += 1;
                break;
            }
        }
    }

    let split = digits.len() - scale;
    let mut text: String = digits[..split].iter().map(|d| char::from(b'0' + d)).collect();
    if scale > 0 {
        text.push('.');
        text.extend(digits[split..].iter().map(|d| char::from(b'0' + d)));
    }
    let rounded = text.parse::<f64>().unwrap_or(value.abs());
    if value.is_sign_negative() {
        -rounded
    } else {
        rounded
    }
}

/// Row count per (user_id, genre).
pub fn genre_counts(facts: &[ListenFact]) -> FxHashMap<GenreKey, u64> {
    facts
        .par_iter()
        .fold(FxHashMap::<GenreKey, u64>::default, |mut acc, fact| {
            *acc.entry((fact.user_id.clone(), fact.genre.clone()))
                .or_insert(0) += 1;
            acc
        })
        .reduce(FxHashMap::default, |mut acc, part| {
            for (key, count) in part {
                *acc.entry(key).or_insert(0) += count;
            }
            acc
        })
}

fn outranks(count: u64, genre: &Option<Arc<str>>, best: &(Option<Arc<str>>, u64)) -> bool {
    count > best.1 || (count == best.1 && *genre < best.0)
}

/// Top genre of every user, sorted by `user_id` (null first).
pub fn top_genres(facts: &[ListenFact]) -> Vec<TopGenre> {
    let mut best: FxHashMap<Option<Key>, (Option<Arc<str>>, u64)> = FxHashMap::default();
    for ((user_id, genre), count) in genre_counts(facts) {
        match best.entry(user_id) {
            Entry::Vacant(e) => {
                e.insert((genre, count));
            }
            Entry::Occupied(mut e) => {
                if outranks(count, &genre, e.get()) {
                    e.insert((genre, count));
                }
            }
        }
    }

    let mut top: Vec<TopGenre> = best
        .into_iter()
        .map(|(user_id, (genre, listen_count))| TopGenre {
            user_id,
            genre,
            listen_count,
        })
        .collect();
    top.sort_by(|a, b| a.user_id.cmp(&b.user_id));
    top
}

/// Task 1: each user's favorite genre.
pub fn favorite_genres(facts: &[ListenFact]) -> Vec<FavoriteGenre> {
    top_genres(facts)
        .into_iter()
        .map(|t| FavoriteGenre {
            user_id: t.user_id,
            genre: t.genre,
            listen_count: t.listen_count,
        })
        .collect()
}

/// Task 2: mean `duration_sec` per genre, nulls excluded.
///
/// A genre whose durations are all null still appears, with a null mean.
pub fn average_listen_time(facts: &[ListenFact]) -> Vec<GenreAverage> {
    let mut sums: FxHashMap<Option<Arc<str>>, (f64, u64)> = FxHashMap::default();
    for fact in facts {
        let entry = sums.entry(fact.genre.clone()).or_insert((0.0, 0));
        if let Some(duration) = fact.duration_sec {
            entry.0 += duration;
            entry.1 += 1;
        }
    }

    let mut rows: Vec<GenreAverage> = sums
        .into_iter()
        .map(|(genre, (sum, n))| GenreAverage {
            genre,
            avg_duration_sec: (n > 0).then(|| round_half_up(sum / n as f64, AVG_DURATION_SCALE)),
        })
        .collect();
    rows.sort_by(|a, b| a.genre.cmp(&b.genre));
    rows
}

/// Task 3: the ten users whose plays concentrate most on one genre.
///
/// Facts with a null `user_id` never take part: they cannot be joined
/// back to a per-user total.
pub fn genre_loyalty(facts: &[ListenFact]) -> Vec<GenreLoyalty> {
    let mut totals: FxHashMap<&Key, u64> = FxHashMap::default();
    for fact in facts {
        if let Some(user_id) = &fact.user_id {
            *totals.entry(user_id).or_insert(0) += 1;
        }
    }

    let mut rows: Vec<GenreLoyalty> = top_genres(facts)
        .into_iter()
        .filter_map(|top| {
            let user_id = top.user_id?;
            let total_plays = *totals.get(&user_id)?;
            Some(GenreLoyalty {
                loyalty_score: round_half_up(
                    top.listen_count as f64 / total_plays as f64,
                    LOYALTY_SCALE,
                ),
                user_id,
                top_genre: top.genre,
                top_genre_plays: top.listen_count,
                total_plays,
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        b.loyalty_score
            .total_cmp(&a.loyalty_score)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    rows.truncate(LOYALTY_TOP_N);
    rows
}

/// Task 4: distinct users with at least one event in the night window.
pub fn night_listeners(facts: &[ListenFact]) -> Vec<NightListener> {
    let users: BTreeSet<Option<Key>> = facts
        .iter()
        .filter(|f| f.timestamp.is_some_and(|ts| NIGHT_HOURS.contains(&ts.hour())))
        .map(|f| f.user_id.clone())
        .collect();
    users
        .into_iter()
        .map(|user_id| NightListener { user_id })
        .collect()
}

/// Results of all four tasks over one joined table.
#[derive(Debug, Default)]
pub struct TaskResults {
    pub favorite_genres: Vec<FavoriteGenre>,
    pub avg_listen_time: Vec<GenreAverage>,
    pub genre_loyalty: Vec<GenreLoyalty>,
    pub night_listeners: Vec<NightListener>,
}

/// Run the four independent aggregations in parallel.
pub fn run_all(facts: &[ListenFact]) -> TaskResults {
    let spinner = create_spinner("Phase 3: Running aggregations");

    let ((favorites, averages), (loyalty, night)) = rayon::join(
        || rayon::join(|| favorite_genres(facts), || average_listen_time(facts)),
        || rayon::join(|| genre_loyalty(facts), || night_listeners(facts)),
    );

    let msg = "Phase 3: Aggregations complete";
    spinner.finish_with_message(msg);
    log_done(Phase::Agg, msg);

    TaskResults {
        favorite_genres: favorites,
        avg_listen_time: averages,
        genre_loyalty: loyalty,
        night_listeners: night,
    }
}

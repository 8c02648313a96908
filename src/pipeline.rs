//! End-to-end run: load, join, aggregate, preview, write.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::join::inner_join;
use crate::loader::{load_listening_logs, load_songs};
use crate::models::{ResultRow, RunStats, StringInterner, Task};
use crate::preview;
use crate::progress::{format_duration, is_log_only, log_done, Phase};
use crate::queries::run_all;
use crate::sink::write_result;

/// Inputs, output root and reporting switches for one run.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub logs: PathBuf,
    pub songs: PathBuf,
    pub output_dir: PathBuf,
    /// Print a bordered preview of each result before writing it
    pub preview: bool,
    /// Where to write the run statistics as JSON, if anywhere
    pub stats_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            logs: PathBuf::from("listening_logs.csv"),
            songs: PathBuf::from("songs_metadata.csv"),
            output_dir: PathBuf::from("outputs"),
            preview: true,
            stats_path: None,
        }
    }
}

/// Run the whole job. Any error aborts the run; results already written
/// by earlier tasks stay in place, later ones are not touched.
pub fn run(config: &PipelineConfig) -> Result<RunStats> {
    let start = Instant::now();
    let mut stats = RunStats::default();
    let mut interner = StringInterner::new();

    println!("Phase 1: Loading {:?} and {:?}", config.logs, config.songs);
    let events = load_listening_logs(&config.logs, &mut interner, &mut stats)?;
    let songs = load_songs(&config.songs, &mut interner, &mut stats)?;
    println!(
        "Phase 1: Loaded {} events and {} songs ({} distinct strings)",
        events.len(),
        songs.len(),
        interner.len()
    );

    let joined = inner_join(&events, &songs);
    drop(events);
    drop(songs);
    stats.events_unmatched = joined.unmatched;
    stats.joined_rows = joined.facts.len();
    log_done(
        Phase::Join,
        &format!("{} rows, join rate {:.1}%", stats.joined_rows, stats.join_rate()),
    );

    let results = run_all(&joined.facts);
    stats.favorite_genre_rows = results.favorite_genres.len();
    stats.avg_listen_time_rows = results.avg_listen_time.len();
    stats.genre_loyalty_rows = results.genre_loyalty.len();
    stats.night_listener_rows = results.night_listeners.len();

    let inputs = [config.logs.as_path(), config.songs.as_path()];
    emit(config, Task::FavoriteGenres, &results.favorite_genres, &inputs)?;
    emit(config, Task::AvgListenTime, &results.avg_listen_time, &inputs)?;
    emit(config, Task::GenreLoyalty, &results.genre_loyalty, &inputs)?;
    emit(config, Task::NightListeners, &results.night_listeners, &inputs)?;

    stats.elapsed_seconds = start.elapsed().as_secs_f64();
    if let Some(path) = &config.stats_path {
        stats
            .write_to_file(path)
            .with_context(|| format!("Failed to write stats to {:?}", path))?;
    }
    if is_log_only() {
        stats.log_phase("FINAL");
    }

    println!(
        "\nAll tasks complete in {}. Check the {} directory.",
        format_duration(start.elapsed()),
        config.output_dir.display()
    );
    Ok(stats)
}

fn emit<R: ResultRow>(
    config: &PipelineConfig,
    task: Task,
    rows: &[R],
    inputs: &[&Path],
) -> Result<()> {
    if config.preview {
        preview::show(task, rows);
    }
    let path = write_result(&config.output_dir, task, rows, inputs)
        .with_context(|| format!("Failed to save {}", task.title()))?;
    println!("Phase 4: Wrote {} rows to {}", rows.len(), path.display());
    log_done(Phase::Write, &format!("{} -> {}", task.dir_name(), path.display()));
    Ok(())
}

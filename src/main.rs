use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use listen_analytics::pipeline::{run, PipelineConfig};
use listen_analytics::progress::set_log_only;

#[derive(Parser)]
#[command(name = "listen-analytics")]
#[command(about = "Favorite genres, listen times, genre loyalty and night-owl users from a listening log")]
struct Args {
    /// Listening log CSV (user_id, song_id, timestamp, duration_sec)
    #[arg(long, default_value = "listening_logs.csv")]
    logs: PathBuf,

    /// Song catalog CSV (song_id, genre, ...)
    #[arg(long, default_value = "songs_metadata.csv")]
    songs: PathBuf,

    /// Directory receiving one result directory per task
    #[arg(long, default_value = "outputs")]
    output_dir: PathBuf,

    /// Worker threads for the aggregations (0 = one per core)
    #[arg(long, default_value = "0")]
    workers: usize,

    /// Hide progress bars and print tail-friendly log lines instead
    #[arg(long)]
    log_only: bool,

    /// Skip the console preview of each result
    #[arg(long)]
    no_preview: bool,

    /// Write run statistics as JSON to this file
    #[arg(long)]
    stats: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    set_log_only(args.log_only);

    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    let config = PipelineConfig {
        logs: args.logs,
        songs: args.songs,
        output_dir: args.output_dir,
        preview: !args.no_preview,
        stats_path: args.stats,
    };

    let stats = run(&config)?;

    println!("\n{:=<60}", "");
    println!("Analysis complete!");
    for line in stats.summary_lines() {
        println!("  {}", line);
    }
    println!("{:=<60}", "");

    Ok(())
}

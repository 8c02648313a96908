//! Writing task results as single-file CSV directories.
//!
//! Each task owns `<output root>/<task dir>/` holding one `part-00000.csv`
//! and an empty `_SUCCESS` marker. A new result is assembled in a hidden
//! staging directory next to the target and only renamed into place once
//! every byte is on disk, so an interrupted run never leaves a partial
//! file where a finished result is expected.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::models::{ResultRow, Task};
use crate::safety::validate_output_dir;

pub const PART_FILE: &str = "part-00000.csv";
pub const SUCCESS_MARKER: &str = "_SUCCESS";

fn staging_dir(output_root: &Path, task: Task) -> PathBuf {
    output_root.join(format!(".{}.staging", task.dir_name()))
}

/// Write one task's rows, replacing any previous result for that task.
///
/// Returns the path of the written CSV file.
pub fn write_result<R: ResultRow>(
    output_root: &Path,
    task: Task,
    rows: &[R],
    inputs: &[&Path],
) -> Result<PathBuf> {
    let target = output_root.join(task.dir_name());
    validate_output_dir(&target, inputs)?;

    fs::create_dir_all(output_root).with_context(|| {
        format!("Failed to create output directory '{}'", output_root.display())
    })?;

    // Leftover from an interrupted run
    let staging = staging_dir(output_root, task);
    if staging.exists() {
        fs::remove_dir_all(&staging).with_context(|| {
            format!("Failed to remove stale staging directory '{}'", staging.display())
        })?;
    }
    fs::create_dir(&staging)
        .with_context(|| format!("Failed to create '{}'", staging.display()))?;

    write_part(&staging.join(PART_FILE), rows)?;
    File::create(staging.join(SUCCESS_MARKER))
        .with_context(|| format!("Failed to write marker in '{}'", staging.display()))?;

    replace_dir(&staging, &target)?;
    Ok(target.join(PART_FILE))
}

/// Header row first, then one record per row; null cells are left empty.
fn write_part<R: ResultRow>(path: &Path, rows: &[R]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create '{}'", path.display()))?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

    writer.write_record(R::HEADER)?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write row to '{}'", path.display()))?;
    }
    writer.flush()?;
    writer
        .get_ref()
        .sync_all()
        .with_context(|| format!("Failed to sync '{}'", path.display()))?;
    Ok(())
}

fn replace_dir(staging: &Path, target: &Path) -> Result<()> {
    match fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(target).with_context(|| {
            format!("Failed to remove existing output '{}'", target.display())
        })?,
        Ok(_) => fs::remove_file(target).with_context(|| {
            format!("Failed to remove existing output '{}'", target.display())
        })?,
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to inspect output '{}'", target.display()))
        }
    }

    fs::rename(staging, target).with_context(|| {
        format!(
            "Failed to move '{}' into place at '{}'",
            staging.display(),
            target.display()
        )
    })
}

//! Guard against replacing the wrong directory.
//!
//! Writing a task result deletes whatever sits at the target path first.
//! These checks make sure that path is one of our own result directories
//! and that removing it cannot take an input file with it.

use anyhow::{bail, Result};
use std::path::Path;

/// Every result directory name starts with this prefix
pub const OUTPUT_DIR_PREFIX: &str = "task";

/// Validates that a result directory is safe to replace.
///
/// Checks:
/// - The directory name must start with `OUTPUT_DIR_PREFIX`
/// - If it already exists, it must not be one of the inputs
/// - If it already exists, it must not contain any of the inputs
///
/// # Arguments
/// * `output` - The result directory that will be removed and recreated
/// * `inputs` - Input files that must survive the run
pub fn validate_output_dir(output: &Path, inputs: &[&Path]) -> Result<()> {
    let output_name = output.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if !output_name.starts_with(OUTPUT_DIR_PREFIX) {
        bail!(
            "Safety check failed: output directory '{}' must start with '{}'",
            output.display(),
            OUTPUT_DIR_PREFIX
        );
    }

    // Nothing to remove yet, so nothing can be lost.
    let Ok(target) = output.canonicalize() else {
        return Ok(());
    };

    for input in inputs {
        let Ok(input_path) = input.canonicalize() else {
            continue;
        };
        if input_path == target {
            bail!(
                "Safety check failed: output '{}' cannot be the same as input '{}'",
                output.display(),
                input.display()
            );
        }
        if input_path.starts_with(&target) {
            bail!(
                "Safety check failed: output '{}' contains input '{}'",
                output.display(),
                input.display()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_valid_new_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("listening_logs.csv");
        fs::write(&input, "user_id\n").unwrap();
        let output = dir.path().join("outputs").join("task1_user_favorite_genres");
        assert!(validate_output_dir(&output, &[&input]).is_ok());
    }

    #[test]
    fn test_valid_existing_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("songs_metadata.csv");
        fs::write(&input, "song_id\n").unwrap();
        let output = dir.path().join("task2_avg_listen_time");
        fs::create_dir(&output).unwrap();
        assert!(validate_output_dir(&output, &[&input]).is_ok());
    }

    #[test]
    fn test_missing_prefix() {
        let output = Path::new("/tmp/results");
        let result = validate_output_dir(output, &[]);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("must start with 'task'"));
    }

    #[test]
    fn test_output_equals_input() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("task_listening_logs.csv");
        fs::write(&input, "user_id\n").unwrap();
        let result = validate_output_dir(&input, &[&input]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot be the same as input"));
    }

    #[test]
    fn test_output_contains_input() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("task4_night_listeners");
        fs::create_dir(&output).unwrap();
        let input = output.join("listening_logs.csv");
        fs::write(&input, "user_id\n").unwrap();
        let result = validate_output_dir(&output, &[&input]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("contains input"));
    }
}

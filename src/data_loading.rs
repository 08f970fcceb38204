use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::fs::File;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Read one numeric column of a CSV file as samples.
///
/// Rows with fewer fields than `column + 1` are an error; so are cells that do not
/// parse as a number.
pub fn read_signal_csv(path: &Path, column: usize, has_headers: bool) -> Result<Vec<f32>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut samples = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result
            .with_context(|| format!("Bad CSV row {} in {}", row + 1, path.display()))?;
        let cell = record.get(column).with_context(|| {
            format!(
                "Row {} of {} has {} fields, no column {}",
                row + 1,
                path.display(),
                record.len(),
                column
            )
        })?;
        let value: f32 = cell.parse().with_context(|| {
            format!(
                "Failed to parse '{}' in row {} of {}",
                cell,
                row + 1,
                path.display()
            )
        })?;
        samples.push(value);
    }

    debug!(
        "Read {} samples from column {} of {}",
        samples.len(),
        column,
        path.display()
    );
    Ok(samples)
}

/// A single `.csv` file, or every `.csv` file below a directory, sorted by path
pub fn collect_inputs(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        anyhow::bail!("Input path {} does not exist", path.display());
    }

    let mut inputs = Vec::new();
    for entry in WalkDir::new(path) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", path.display(), e);
                continue;
            }
        };
        if entry.file_type().is_file() && is_csv(entry.path()) {
            inputs.push(entry.into_path());
        }
    }
    inputs.sort();

    info!("Found {} CSV files under {}", inputs.len(), path.display());
    Ok(inputs)
}

/// Record name used in output file names: the file stem
pub fn record_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "record".to_string())
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_selected_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("100.csv");
        fs::write(
            &path,
            "time,mlii,v5\n0,-0.145,-0.065\n1, -0.145,-0.065\n2,-0.12,-0.08\n",
        )
        .unwrap();

        let samples = read_signal_csv(&path, 1, true).unwrap();
        assert_eq!(samples, vec![-0.145, -0.145, -0.12]);
    }

    #[test]
    fn headerless_single_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sig.csv");
        fs::write(&path, "1.5\n2\n-3\n").unwrap();

        assert_eq!(read_signal_csv(&path, 0, false).unwrap(), vec![1.5, 2.0, -3.0]);
    }

    #[test]
    fn bad_cells_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "0.1\nabc\n").unwrap();
        let err = read_signal_csv(&path, 0, false).unwrap_err();
        assert!(format!("{:#}", err).contains("row 2"));

        fs::write(&path, "0.1,0.2\n0.3\n").unwrap();
        assert!(read_signal_csv(&path, 1, false).is_err());
    }

    #[test]
    fn collects_csv_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.csv"), "1\n").unwrap();
        fs::write(dir.path().join("nested").join("a.CSV"), "1\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let inputs = collect_inputs(dir.path()).unwrap();
        let names: Vec<String> = inputs.iter().map(|p| record_name(p)).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn single_file_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("203.csv");
        fs::write(&path, "1\n").unwrap();
        assert_eq!(collect_inputs(&path).unwrap(), vec![path]);
        assert!(collect_inputs(&dir.path().join("missing")).is_err());
    }
}

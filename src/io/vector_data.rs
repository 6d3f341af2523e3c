//! File listing of the `vector_data` directory. The layer encoding itself
//! belongs to the geometry collaborators; only the names are tracked here.

use crate::io::constants::VECTOR_DATA_DIR_NAME;
use crate::types::DimapResult;
use std::path::{Path, PathBuf};

const VECTOR_FILE_EXTENSION: &str = "csv";

pub fn vector_data_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(VECTOR_DATA_DIR_NAME)
}

fn layer_files(data_dir: &Path) -> DimapResult<Vec<(String, PathBuf)>> {
    let dir = vector_data_dir(data_dir);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut layers = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_csv = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case(VECTOR_FILE_EXTENSION))
            .unwrap_or(false);
        if let (true, Some(stem)) = (is_csv, path.file_stem().and_then(|s| s.to_str())) {
            layers.push((stem.to_string(), path.clone()));
        }
    }
    layers.sort();
    Ok(layers)
}

/// Names of the vector layers stored under `data_dir`, sorted
pub fn list_vector_data(data_dir: &Path) -> DimapResult<Vec<String>> {
    Ok(layer_files(data_dir)?.into_iter().map(|(name, _)| name).collect())
}

/// Delete layer files whose name is not in `keep`; returns the number removed
pub fn prune_vector_data(data_dir: &Path, keep: &[String]) -> DimapResult<usize> {
    let mut removed = 0;
    for (name, path) in layer_files(data_dir)? {
        if keep.iter().any(|k| k == &name) {
            continue;
        }
        std::fs::remove_file(&path)?;
        log::debug!("Removed vector layer '{}'", name);
        removed += 1;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_list_and_prune() {
        let dir = TempDir::new().unwrap();
        let vectors = vector_data_dir(dir.path());
        std::fs::create_dir_all(&vectors).unwrap();
        for name in ["pins.csv", "ground_control_points.csv", "coast.csv", "notes.txt"] {
            std::fs::write(vectors.join(name), "org.esa.snap.Pin\n").unwrap();
        }

        let layers = list_vector_data(dir.path()).unwrap();
        assert_eq!(layers, vec!["coast", "ground_control_points", "pins"]);

        let removed = prune_vector_data(dir.path(), &["pins".to_string()]).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(list_vector_data(dir.path()).unwrap(), vec!["pins"]);
        assert!(vectors.join("notes.txt").exists());
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(list_vector_data(dir.path()).unwrap().is_empty());
        assert_eq!(prune_vector_data(dir.path(), &[]).unwrap(), 0);
    }
}

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::QueueError;

pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), QueueError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .map_err(|err| QueueError::Filesystem(format!("create {}: {err}", parent.display())))?;
    let mut temp = NamedTempFile::new_in(parent)
        .map_err(|err| QueueError::Filesystem(format!("temp file in {}: {err}", parent.display())))?;
    temp.write_all(content)
        .map_err(|err| QueueError::Filesystem(err.to_string()))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| QueueError::Filesystem(err.to_string()))?;
    temp.persist(path)
        .map_err(|err| QueueError::Filesystem(format!("persist {}: {err}", path.display())))?;
    Ok(())
}

pub fn list_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, QueueError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir)
        .map_err(|err| QueueError::Filesystem(format!("read {}: {err}", dir.display())))?;
    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| QueueError::Filesystem(err.to_string()))?;
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|value| value.to_str())
            .map(|value| value == ext)
            .unwrap_or(false);
        if matches && path.is_file() {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.is_file() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.is_file() {
            return Some(plain);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_content() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("a.toml");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
        let leftovers = fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn lists_only_matching_extension() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("b.link"), "{}").unwrap();
        fs::write(temp.path().join("a.link"), "{}").unwrap();
        fs::write(temp.path().join("c.broken"), "{}").unwrap();
        let found = list_with_extension(temp.path(), "link").unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.link", "b.link"]);
    }

    #[test]
    fn missing_dir_lists_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let found = list_with_extension(&temp.path().join("nope"), "link").unwrap();
        assert!(found.is_empty());
    }
}

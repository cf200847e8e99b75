use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Last reading position, restored on startup. Persistence is best-effort:
/// a missing or unreadable file just means starting from the version list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub bible_id: String,
    pub book_id: String,
    pub chapter_id: String,
}

fn default_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("bibletui").join("position.json"))
}

pub fn load() -> Option<Position> {
    load_from(&default_path()?)
}

pub fn load_from(path: &Path) -> Option<Position> {
    let raw = fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

pub fn save(position: &Position) -> io::Result<()> {
    match default_path() {
        Some(path) => save_to(position, &path),
        None => {
            debug!("no data directory, skipping position save");
            Ok(())
        }
    }
}

pub fn save_to(position: &Position, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let raw = serde_json::to_string_pretty(position)?;
    fs::write(path, raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position() -> Position {
        Position {
            bible_id: "de4e12af7f28f599-02".into(),
            book_id: "GEN".into(),
            chapter_id: "GEN.1".into(),
        }
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("position.json");
        save_to(&position(), &path).unwrap();
        assert_eq!(load_from(&path), Some(position()));
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_from(&dir.path().join("position.json")), None);
    }

    #[test]
    fn corrupt_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("position.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(load_from(&path), None);
    }
}

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::warn;

use crate::models::{ProductState, StateMap};
use crate::{AppError, Result};

/// Load per-product state. A missing, empty or unreadable file yields an empty
/// map; an entry that does not decode is dropped on its own.
pub fn load_state(path: impl AsRef<Path>) -> StateMap {
    let path = path.as_ref();
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(_) => return StateMap::new(),
    };

    if contents.trim().is_empty() {
        return StateMap::new();
    }

    let raw: BTreeMap<String, serde_json::Value> = match serde_json::from_str(&contents) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Ignoring invalid state file {}: {}", path.display(), e);
            return StateMap::new();
        }
    };

    raw.into_iter()
        .filter_map(|(url, value)| match serde_json::from_value::<ProductState>(value) {
            Ok(mut entry) => {
                if entry.url.is_empty() {
                    entry.url = url.clone();
                }
                Some((url, entry))
            }
            Err(e) => {
                warn!("Dropping unreadable state for {} in {}: {}", url, path.display(), e);
                None
            }
        })
        .collect()
}

/// Write state as pretty JSON through a temp file renamed over `path`.
pub fn save_state(path: impl AsRef<Path>, state: &StateMap) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(tmp.as_file_mut(), state)?;
    tmp.as_file_mut().write_all(b"\n")?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(path).map_err(|e| AppError::Io(e.error))?;
    Ok(())
}

use super::Document;
use crate::error::{Result, SheetError};
use crate::history::History;
use std::path::{Path, PathBuf};

const MAX_SCRIPT_FILE_BYTES: u64 = 16 * 1_048_576; // 16 MiB

fn read_script_file(path: &Path) -> Result<String> {
    let meta = std::fs::metadata(path)?;
    if meta.len() > MAX_SCRIPT_FILE_BYTES {
        return Err(SheetError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "Refusing to read {}: script too large ({} bytes, max {})",
                path.display(),
                meta.len(),
                MAX_SCRIPT_FILE_BYTES
            ),
        )));
    }
    Ok(std::fs::read_to_string(path)?)
}

/// History file stored beside a script: `model.py` -> `model.history.json`.
pub fn history_path(script_path: &Path) -> PathBuf {
    script_path.with_extension("history.json")
}

impl Document {
    /// Open a script file and the history stored beside it.
    ///
    /// An unreadable history file is not fatal: the log is rebuilt from the
    /// script's generated region instead.
    pub fn load_file(path: &Path) -> Result<Self> {
        let script = read_script_file(path)?;
        let history_file = history_path(path);
        let history = if history_file.exists() {
            match History::load(&history_file) {
                Ok(h) => Some(h),
                Err(e) => {
                    log::warn!(
                        "ignoring history {}: {}; rebuilding from script",
                        history_file.display(),
                        e
                    );
                    None
                }
            }
        } else {
            None
        };
        let mut doc = Document::open(script, history);
        doc.file_path = Some(path.to_path_buf());
        Ok(doc)
    }

    /// Write the script and its history. Saves to the current path when
    /// `path` is `None`.
    pub fn save_file(&mut self, path: Option<&Path>) -> Result<PathBuf> {
        let path = match path.map(Path::to_path_buf).or_else(|| self.file_path.clone()) {
            Some(p) => p,
            None => {
                return Err(SheetError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "No file path set",
                )));
            }
        };
        std::fs::write(&path, &self.script)?;
        self.history().save(&history_path(&path))?;
        self.file_path = Some(path.clone());
        self.modified = false;
        Ok(path)
    }
}

//! Command history artifact: `{"commands": [...]}`.
//!
//! History is persisted beside the script so a hand-damaged script can
//! always be regenerated from it.

use crate::error::Result;
use crate::script::{extract_generated_region, strip_alias_declarations};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    pub commands: Vec<String>,
}

impl History {
    pub fn new(commands: Vec<String>) -> Self {
        History { commands }
    }

    /// Lines of a generated region with alias declarations removed.
    pub fn from_generated(generated: &str) -> Self {
        let stripped = strip_alias_declarations(generated);
        let mut commands: Vec<String> = stripped.lines().map(str::to_string).collect();
        while commands.last().is_some_and(|l| l.trim().is_empty()) {
            commands.pop();
        }
        History { commands }
    }

    /// History embedded in a full script; empty when the marker is missing.
    pub fn from_script(full: &str) -> Self {
        Self::from_generated(&extract_generated_region(full))
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()? + "\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::MARKER;

    #[test]
    fn test_from_script_drops_aliases_and_user_region() {
        let full = format!(
            "proj = Project()\n{}\nproj.add_sheet('S', sheet_id='s')\nt = proj.table('t')\nwith table_context(t):\n    a0 = 1\n\n",
            MARKER
        );
        let history = History::from_script(&full);
        assert_eq!(
            history.commands,
            vec![
                "proj.add_sheet('S', sheet_id='s')",
                "with table_context(t):",
                "    a0 = 1",
            ]
        );
    }

    #[test]
    fn test_missing_marker_gives_empty_history() {
        assert!(History::from_script("proj = Project()\nx = 1\n").is_empty());
    }

    #[test]
    fn test_json_shape() {
        let history = History::new(vec!["a()".into()]);
        let json = history.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["commands"][0], "a()");
        assert_eq!(History::from_json(&json).unwrap(), history);
        assert_eq!(History::from_json("{}").unwrap(), History::default());
        assert!(History::from_json("[1, 2]").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let history = History::new(vec!["x = 1".into(), "    y".into()]);
        history.save(&path).unwrap();
        assert_eq!(History::load(&path).unwrap(), history);
    }
}

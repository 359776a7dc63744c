//! Marker-based split of a script into user and generated regions.
//!
//! ```text
//! import numpy as np              <- user region, preserved byte-for-byte
//! from sheetscript_api import *
//!
//! proj = Project()
//! # --- sheetscript generated log (rebuilt on every edit) ---
//! proj.add_sheet('Sheet 1', sheet_id='sheet_1')   <- generated region
//! ```

use super::scan;
use sheetscript_engine::helpers::project_init;
use std::ops::Range;

pub const MARKER: &str = "# --- sheetscript generated log (rebuilt on every edit) ---";

/// Byte span of the marker line, including its line terminator.
fn find_marker(text: &str) -> Option<Range<usize>> {
    let mut offset = 0usize;
    for line in text.split_inclusive('\n') {
        let content = line.strip_suffix('\n').unwrap_or(line);
        if content.trim_end() == MARKER {
            return Some(offset..offset + line.len());
        }
        offset += line.len();
    }
    None
}

/// Preamble of a new document's user region.
pub fn default_preamble(helper_module: &str) -> String {
    format!(
        "import numpy as np\nfrom {} import *\n\n{}\n",
        helper_module,
        project_init()
    )
}

/// Full text of a new, empty document importing `helper_module`.
pub fn new_script(helper_module: &str) -> String {
    compose(&default_preamble(helper_module), "")
}

/// The user region: everything before the marker, or the whole text when
/// the marker is missing.
pub fn user_region(text: &str) -> &str {
    match find_marker(text) {
        Some(marker) => &text[..marker.start],
        None => text,
    }
}

/// Replace the generated region of `existing` with `generated`.
pub fn compose(existing: &str, generated: &str) -> String {
    if existing.is_empty() && generated.is_empty() {
        return String::new();
    }
    let user = user_region(existing);
    if find_marker(existing).is_none() && !existing.is_empty() {
        log::warn!("generated-log marker not found, keeping the whole script as user text");
    }
    let mut out = String::with_capacity(user.len() + MARKER.len() + generated.len() + 2);
    out.push_str(user);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(MARKER);
    out.push('\n');
    out.push_str(generated);
    if !generated.is_empty() && !generated.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Drop top-level `<name> = proj.table('<id>')` lines.
pub fn strip_alias_declarations(text: &str) -> String {
    text.split_inclusive('\n')
        .filter(|line| scan::alias_declaration(line.trim_end_matches(['\n', '\r'])).is_none())
        .collect()
}

/// Generated region without alias declarations; empty without a marker.
pub fn extract_generated_region(full: &str) -> String {
    match find_marker(full) {
        Some(marker) => strip_alias_declarations(&full[marker.end..]),
        None => String::new(),
    }
}

/// A runnable script for a byte range of `full`: a header, a project
/// initialization if missing, and the selected text.
pub fn selection_script(full: &str, range: Range<usize>) -> Option<String> {
    let slice = full.get(range.clone())?;
    if slice.trim().is_empty() {
        return None;
    }
    let header: String = match find_marker(full) {
        Some(marker) if range.start >= marker.end => full[..marker.start].to_string(),
        Some(marker) => import_lines(&full[..marker.start.min(range.start)]),
        None => import_lines(&full[..range.start]),
    };

    let mut out = header;
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    let initialized = out.lines().chain(slice.lines()).any(scan::is_project_init);
    if !initialized {
        out.push_str(&project_init());
        out.push('\n');
    }
    out.push_str(slice);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    Some(out)
}

fn import_lines(text: &str) -> String {
    text.lines()
        .filter(|l| scan::is_import_line(l))
        .flat_map(|l| [l, "\n"])
        .collect()
}

//! Region-qualified cell addresses.
//!
//! Addresses are written `region[A0]` or `region[A0:C2]`, where the column is
//! spreadsheet letters and the row is a zero-based number. A bare `A0` token
//! with no region prefix addresses the body.
//!
//! ```
//! use sheetscript_engine::engine::{CellAddress, Region};
//!
//! let addr = CellAddress::parse("top_labels[B3]").unwrap();
//! assert_eq!(addr.region, Region::TopLabels);
//! assert_eq!((addr.row, addr.col), (3, 1));
//! assert_eq!(addr.ident(), "b3");
//! assert_eq!(addr.to_string(), "top_labels[B3]");
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    #[error("Unknown region: {0}")]
    UnknownRegion(String),
}

/// One of the five disjoint addressable spaces of a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Body,
    TopLabels,
    BottomLabels,
    LeftLabels,
    RightLabels,
}

impl Region {
    pub const ALL: [Region; 5] = [
        Region::Body,
        Region::TopLabels,
        Region::BottomLabels,
        Region::LeftLabels,
        Region::RightLabels,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Body => "body",
            Region::TopLabels => "top_labels",
            Region::BottomLabels => "bottom_labels",
            Region::LeftLabels => "left_labels",
            Region::RightLabels => "right_labels",
        }
    }

    /// Parse a region name. Accepts `top_labels` and `top-labels` spellings.
    pub fn from_name(name: &str) -> Option<Region> {
        let name = name.trim().replace('-', "_");
        Region::ALL.into_iter().find(|r| r.as_str() == name)
    }

    /// Short band name used by label-band APIs (`top`, `left`, ...).
    pub fn band(&self) -> Option<&'static str> {
        match self {
            Region::Body => None,
            Region::TopLabels => Some("top"),
            Region::BottomLabels => Some("bottom"),
            Region::LeftLabels => Some("left"),
            Region::RightLabels => Some("right"),
        }
    }

    pub fn is_label(&self) -> bool {
        !matches!(self, Region::Body)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn cell_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\$?(?<letters>[A-Za-z]+)\$?(?<digits>[0-9]+)$")
            .expect("cell token regex must compile")
    })
}

fn plain_cell_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z]+[0-9]+$").expect("plain cell token regex must compile")
    })
}

/// True for a relative cell token such as `A0` or `ab12` (no `$`, no range).
pub fn is_cell_token(token: &str) -> bool {
    plain_cell_token_re().is_match(token)
}

/// Convert column index to spreadsheet-style letters (0 -> A, 25 -> Z, 26 -> AA).
pub fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col as u128 + 1;
    while n > 0 {
        n -= 1;
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    result
}

/// Convert column letters back to an index. Case-insensitive.
pub fn letters_to_col(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut acc = 0usize;
    for c in letters.bytes() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() - b'A') as usize + 1;
        acc = acc.checked_mul(26)?.checked_add(digit)?;
    }
    acc.checked_sub(1)
}

/// Lower-case script identifier for a cell (`(0, 2)` -> `c0`).
pub fn cell_label(row: usize, col: usize) -> String {
    format!("{}{}", col_to_letters(col).to_ascii_lowercase(), row)
}

/// Parse `A0` / `$A$0` into (row, col).
fn parse_cell_token(token: &str) -> Option<(usize, usize)> {
    let caps = cell_token_re().captures(token.trim())?;
    let col = letters_to_col(&caps["letters"])?;
    let row = caps["digits"].parse::<usize>().ok()?;
    Some((row, col))
}

/// Split `region[inner]` into its parts; a bare token is body-addressed.
fn split_region(input: &str) -> Result<(Region, &str), AddressError> {
    let trimmed = input.trim();
    match trimmed.split_once('[') {
        Some((region, rest)) => {
            let inner = rest
                .strip_suffix(']')
                .ok_or_else(|| AddressError::InvalidAddress(input.to_string()))?;
            let region = Region::from_name(region)
                .ok_or_else(|| AddressError::UnknownRegion(region.trim().to_string()))?;
            Ok((region, inner))
        }
        None => Ok((Region::Body, trimmed)),
    }
}

/// A single cell inside one region of a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    pub region: Region,
    pub row: usize,
    pub col: usize,
}

impl CellAddress {
    pub fn new(region: Region, row: usize, col: usize) -> CellAddress {
        CellAddress { region, row, col }
    }

    pub fn body(row: usize, col: usize) -> CellAddress {
        CellAddress::new(Region::Body, row, col)
    }

    pub fn parse(input: &str) -> Result<CellAddress, AddressError> {
        let (region, inner) = split_region(input)?;
        let (row, col) = parse_cell_token(inner)
            .ok_or_else(|| AddressError::InvalidAddress(input.to_string()))?;
        Ok(CellAddress { region, row, col })
    }

    /// Upper-case cell label without region (`A0`).
    pub fn label(&self) -> String {
        format!("{}{}", col_to_letters(self.col), self.row)
    }

    /// Lower-case script identifier (`a0`).
    pub fn ident(&self) -> String {
        cell_label(self.row, self.col)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.region, self.label())
    }
}

impl std::str::FromStr for CellAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CellAddress::parse(s)
    }
}

/// A rectangular span of cells within one region. Start is always top-left.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RangeAddress {
    pub region: Region,
    pub start_row: usize,
    pub start_col: usize,
    pub end_row: usize,
    pub end_col: usize,
}

impl RangeAddress {
    pub fn new(region: Region, a: (usize, usize), b: (usize, usize)) -> RangeAddress {
        RangeAddress {
            region,
            start_row: a.0.min(b.0),
            start_col: a.1.min(b.1),
            end_row: a.0.max(b.0),
            end_col: a.1.max(b.1),
        }
    }

    pub fn parse(input: &str) -> Result<RangeAddress, AddressError> {
        let (region, inner) = split_region(input)?;
        let invalid = || AddressError::InvalidAddress(input.to_string());
        let (start, end) = match inner.split_once(':') {
            Some((a, b)) => (
                parse_cell_token(a).ok_or_else(invalid)?,
                parse_cell_token(b).ok_or_else(invalid)?,
            ),
            None => {
                let cell = parse_cell_token(inner).ok_or_else(invalid)?;
                (cell, cell)
            }
        };
        Ok(RangeAddress::new(region, start, end))
    }

    pub fn is_single(&self) -> bool {
        self.start_row == self.end_row && self.start_col == self.end_col
    }

    pub fn rows(&self) -> usize {
        self.end_row - self.start_row + 1
    }

    pub fn cols(&self) -> usize {
        self.end_col - self.start_col + 1
    }

    pub fn start(&self) -> CellAddress {
        CellAddress::new(self.region, self.start_row, self.start_col)
    }

    pub fn contains(&self, addr: &CellAddress) -> bool {
        addr.region == self.region
            && (self.start_row..=self.end_row).contains(&addr.row)
            && (self.start_col..=self.end_col).contains(&addr.col)
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellAddress> + '_ {
        (self.start_row..=self.end_row).flat_map(move |row| {
            (self.start_col..=self.end_col).map(move |col| CellAddress::new(self.region, row, col))
        })
    }
}

impl fmt::Display for RangeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = format!("{}{}", col_to_letters(self.start_col), self.start_row);
        if self.is_single() {
            return write!(f, "{}[{}]", self.region, start);
        }
        write!(
            f,
            "{}[{}:{}{}]",
            self.region,
            start,
            col_to_letters(self.end_col),
            self.end_row
        )
    }
}

/// A formula target: one cell or a multi-cell range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    Cell(CellAddress),
    Range(RangeAddress),
}

impl Target {
    /// Parse an address; a one-cell range collapses to [`Target::Cell`].
    pub fn parse(input: &str) -> Result<Target, AddressError> {
        let range = RangeAddress::parse(input)?;
        if range.is_single() {
            Ok(Target::Cell(range.start()))
        } else {
            Ok(Target::Range(range))
        }
    }

    pub fn region(&self) -> Region {
        match self {
            Target::Cell(c) => c.region,
            Target::Range(r) => r.region,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Cell(c) => c.fmt(f),
            Target::Range(r) => r.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_region_qualified_cell() {
        let addr = CellAddress::parse("left_labels[AB12]").unwrap();
        assert_eq!(addr.region, Region::LeftLabels);
        assert_eq!(addr.row, 12);
        assert_eq!(addr.col, 27);
        assert_eq!(addr.to_string(), "left_labels[AB12]");
    }

    #[test]
    fn test_bare_token_defaults_to_body() {
        let addr = CellAddress::parse("c0").unwrap();
        assert_eq!(addr, CellAddress::body(0, 2));
    }

    #[test]
    fn test_absolute_markers_are_ignored() {
        assert_eq!(CellAddress::parse("$B$3").unwrap(), CellAddress::body(3, 1));
    }

    #[test]
    fn test_dashed_region_names() {
        let addr = CellAddress::parse("top-labels[A0]").unwrap();
        assert_eq!(addr.region, Region::TopLabels);
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(CellAddress::parse("").is_err());
        assert!(CellAddress::parse("body[A]").is_err());
        assert!(CellAddress::parse("body[A0").is_err());
        assert!(matches!(
            CellAddress::parse("middle[A0]"),
            Err(AddressError::UnknownRegion(_))
        ));
    }

    #[test]
    fn test_range_is_normalized() {
        let range = RangeAddress::parse("body[C2:A0]").unwrap();
        assert_eq!((range.start_row, range.start_col), (0, 0));
        assert_eq!((range.end_row, range.end_col), (2, 2));
        assert_eq!(range.to_string(), "body[A0:C2]");
        assert_eq!(range.cells().count(), 9);
    }

    #[test]
    fn test_single_cell_target_collapses() {
        assert!(matches!(Target::parse("body[B1:B1]"), Ok(Target::Cell(_))));
        assert!(matches!(Target::parse("body[B1:B3]"), Ok(Target::Range(_))));
    }

    #[test]
    fn test_col_letters_round_trip() {
        for col in [0, 1, 25, 26, 27, 51, 52, 701, 702] {
            assert_eq!(letters_to_col(&col_to_letters(col)), Some(col));
        }
        assert_eq!(letters_to_col(&"Z".repeat(40)), None);
    }

    #[test]
    fn test_cell_label_is_lowercase() {
        assert_eq!(cell_label(0, 2), "c0");
        assert_eq!(cell_label(10, 26), "aa10");
        assert!(is_cell_token("aa10"));
        assert!(!is_cell_token("$A1"));
        assert!(!is_cell_token("A1:B2"));
    }
}

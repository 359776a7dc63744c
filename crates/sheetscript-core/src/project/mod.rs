//! In-memory project model: an arena of sheets and tables addressed by id.
//!
//! The model is only a mirror of what the script runtime would build. It is
//! updated optimistically by [`crate::Command`]s and replaced wholesale by the
//! snapshot a successful run reports.

mod snapshot;

use crate::error::{Result, SheetError};
use sheetscript_engine::engine::{CellAddress, LabelBands, Rect, Region, Target, Value};
use std::collections::{BTreeMap, HashMap};

/// A sheet holds tables in creation order.
#[derive(Clone, Debug, PartialEq)]
pub struct Sheet {
    pub id: String,
    pub name: String,
    pub table_ids: Vec<String>,
}

/// Pivot-style table derived from another table.
#[derive(Clone, Debug, PartialEq)]
pub struct SummarySpec {
    pub source_table_id: String,
    pub source_range: Option<String>,
    pub group_by: Vec<String>,
    /// `(aggregate, column)` pairs.
    pub values: Vec<(String, String)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub id: String,
    pub name: String,
    pub sheet_id: String,
    pub rect: Rect,
    pub body_rows: usize,
    pub body_cols: usize,
    pub label_bands: LabelBands,
    /// Literal values by address. Empty cells are absent.
    pub cells: HashMap<CellAddress, Value>,
    /// Formula text (with leading `=`) by target address string.
    pub formulas: BTreeMap<String, String>,
    /// Body column types by column index (`currency`, `percent`, ...).
    pub column_types: BTreeMap<usize, String>,
    pub summary: Option<SummarySpec>,
}

impl Table {
    pub fn new(
        id: impl Into<String>,
        sheet_id: impl Into<String>,
        name: impl Into<String>,
        rect: Rect,
        rows: usize,
        cols: usize,
    ) -> Table {
        Table {
            id: id.into(),
            name: name.into(),
            sheet_id: sheet_id.into(),
            rect,
            body_rows: rows,
            body_cols: cols,
            label_bands: LabelBands::default(),
            cells: HashMap::new(),
            formulas: BTreeMap::new(),
            column_types: BTreeMap::new(),
            summary: None,
        }
    }

    pub fn value(&self, addr: &CellAddress) -> Option<&Value> {
        self.cells.get(addr)
    }

    /// Store a value; `Value::Empty` removes the entry.
    pub fn set_value(&mut self, addr: CellAddress, value: Value) {
        if value.is_empty() {
            self.cells.remove(&addr);
        } else {
            self.cells.insert(addr, value);
        }
    }

    pub fn formula(&self, target: &Target) -> Option<&str> {
        self.formulas.get(&target.to_string()).map(String::as_str)
    }

    /// Single-cell formulas with parsed targets, in address order.
    pub fn cell_formulas(&self) -> Vec<(CellAddress, &str)> {
        let mut out: Vec<(CellAddress, &str)> = self
            .formulas
            .iter()
            .filter_map(|(key, formula)| match Target::parse(key) {
                Ok(Target::Cell(addr)) => Some((addr, formula.as_str())),
                _ => None,
            })
            .collect();
        out.sort_by_key(|(addr, _)| *addr);
        out
    }

    /// Number of rows and columns of a region under the current bands.
    pub fn region_size(&self, region: Region) -> (usize, usize) {
        let b = &self.label_bands;
        match region {
            Region::Body => (self.body_rows, self.body_cols),
            Region::TopLabels => (b.top, self.body_cols),
            Region::BottomLabels => (b.bottom, self.body_cols),
            Region::LeftLabels => (self.body_rows, b.left),
            Region::RightLabels => (self.body_rows, b.right),
        }
    }

    /// Smallest body footprint holding every occupied body cell and formula
    /// target. `None` when the body is empty.
    pub fn occupied_footprint(&self) -> Option<(usize, usize)> {
        let mut extent: Option<(usize, usize)> = None;
        let mut grow = |row: usize, col: usize| {
            let (r, c) = extent.unwrap_or((0, 0));
            extent = Some((r.max(row + 1), c.max(col + 1)));
        };
        for addr in self.cells.keys().filter(|a| a.region == Region::Body) {
            grow(addr.row, addr.col);
        }
        for key in self.formulas.keys() {
            match Target::parse(key) {
                Ok(Target::Cell(c)) if c.region == Region::Body => grow(c.row, c.col),
                Ok(Target::Range(r)) if r.region == Region::Body => grow(r.end_row, r.end_col),
                _ => {}
            }
        }
        extent
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Project {
    pub sheets: Vec<Sheet>,
    tables: HashMap<String, Table>,
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet(&self, id: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.id == id)
    }

    pub fn sheet_mut(&mut self, id: &str) -> Result<&mut Sheet> {
        self.sheets
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| SheetError::UnknownSheet(id.to_string()))
    }

    pub fn table(&self, id: &str) -> Option<&Table> {
        self.tables.get(id)
    }

    pub fn table_mut(&mut self, id: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(id)
            .ok_or_else(|| SheetError::UnknownTable(id.to_string()))
    }

    /// Tables in sheet order, then creation order within each sheet.
    pub fn tables(&self) -> impl Iterator<Item = &Table> + '_ {
        self.sheets
            .iter()
            .flat_map(|s| s.table_ids.iter())
            .filter_map(|id| self.tables.get(id))
    }

    pub fn add_sheet(&mut self, id: &str, name: &str) -> Result<()> {
        if self.sheet(id).is_some() {
            return Err(SheetError::DuplicateId(id.to_string()));
        }
        self.sheets.push(Sheet {
            id: id.to_string(),
            name: name.to_string(),
            table_ids: Vec::new(),
        });
        Ok(())
    }

    pub fn add_table(&mut self, table: Table) -> Result<()> {
        if self.tables.contains_key(&table.id) {
            return Err(SheetError::DuplicateId(table.id));
        }
        let sheet = self.sheet_mut(&table.sheet_id)?;
        sheet.table_ids.push(table.id.clone());
        self.tables.insert(table.id.clone(), table);
        Ok(())
    }
}

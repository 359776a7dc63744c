//! Editor commands.
//!
//! A [`Command`] is an immutable record of one user action. It is applied to
//! the [`Project`] mirror and rendered to script lines; it is never mutated
//! after creation (a cell-edit merge replaces it with a new record).

pub(crate) mod render;
mod transaction;

pub use transaction::{Transaction, TransactionKind, TransactionManager};

use crate::error::{Result, SheetError};
use crate::project::{Project, SummarySpec, Table};
use chrono::{DateTime, Utc};
use sheetscript_engine::engine::{
    CellAddress, LabelBands, RangeAddress, Rect, Target, Value, strip_formula_prefix,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_COMMAND_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Debug, PartialEq)]
pub struct CreateSheet {
    pub sheet_id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenameSheet {
    pub sheet_id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CreateTable {
    pub sheet_id: String,
    pub table_id: String,
    pub name: String,
    pub rect: Rect,
    pub rows: usize,
    pub cols: usize,
    pub labels: LabelBands,
}

/// One aggregated column of a summary table.
#[derive(Clone, Debug, PartialEq)]
pub struct SummaryValue {
    /// Aggregate name as the runtime spells it (`sum`, `mean`, `count`, ...).
    pub agg: String,
    /// Source column letters.
    pub col: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CreateSummaryTable {
    pub sheet_id: String,
    pub table_id: String,
    pub name: String,
    pub rect: Rect,
    pub source_table_id: String,
    pub source_range: Option<RangeAddress>,
    pub group_by: Vec<String>,
    pub values: Vec<SummaryValue>,
}

/// Position-only change. Size changes are [`ResizeTable`].
#[derive(Clone, Debug, PartialEq)]
pub struct MoveTable {
    pub table_id: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResizeTable {
    pub table_id: String,
    pub rows: Option<usize>,
    pub cols: Option<usize>,
}

impl ResizeTable {
    /// Resize keeping only the dimensions that differ from the table's.
    pub fn new(table: &Table, rows: usize, cols: usize) -> ResizeTable {
        ResizeTable {
            table_id: table.id.clone(),
            rows: (rows != table.body_rows).then_some(rows),
            cols: (cols != table.body_cols).then_some(cols),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MinimizeTable {
    pub table_id: String,
    /// Body size after minimizing, `None` when there is nothing to do.
    pub footprint: Option<(usize, usize)>,
}

impl MinimizeTable {
    pub fn for_table(table: &Table) -> MinimizeTable {
        let footprint = table
            .occupied_footprint()
            .filter(|fp| *fp != (table.body_rows, table.body_cols));
        MinimizeTable {
            table_id: table.id.clone(),
            footprint,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SetLabelBands {
    pub table_id: String,
    pub bands: LabelBands,
}

/// Multi-cell literal write. The merge-eligible command kind.
#[derive(Clone, Debug, PartialEq)]
pub struct SetCells {
    pub table_id: String,
    pub cells: HashMap<CellAddress, Value>,
}

impl SetCells {
    pub fn single(table_id: impl Into<String>, addr: CellAddress, value: Value) -> SetCells {
        SetCells {
            table_id: table_id.into(),
            cells: HashMap::from([(addr, value)]),
        }
    }

    /// Entries sorted by address string.
    pub fn sorted(&self) -> Vec<(String, CellAddress, &Value)> {
        let mut entries: Vec<(String, CellAddress, &Value)> = self
            .cells
            .iter()
            .map(|(addr, value)| (addr.to_string(), *addr, value))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

/// Rectangular paste anchored at `start`, values in row-major order.
#[derive(Clone, Debug, PartialEq)]
pub struct SetRange {
    pub table_id: String,
    pub start: CellAddress,
    pub values: Vec<Vec<Value>>,
}

impl SetRange {
    pub fn cells(&self) -> impl Iterator<Item = (CellAddress, &Value)> + '_ {
        self.values.iter().enumerate().flat_map(move |(r, row)| {
            row.iter().enumerate().map(move |(c, value)| {
                let addr =
                    CellAddress::new(self.start.region, self.start.row + r, self.start.col + c);
                (addr, value)
            })
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SetFormula {
    pub table_id: String,
    pub target: Target,
    /// Formula source; an empty formula clears the target.
    pub formula: String,
}

impl SetFormula {
    pub fn is_clear(&self) -> bool {
        strip_formula_prefix(&self.formula).is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct InsertLines {
    pub table_id: String,
    pub at: usize,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SetColumnType {
    pub table_id: String,
    pub col: usize,
    pub column_type: String,
}

/// The closed set of editor mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    CreateSheet(CreateSheet),
    RenameSheet(RenameSheet),
    CreateTable(CreateTable),
    CreateSummaryTable(CreateSummaryTable),
    MoveTable(MoveTable),
    ResizeTable(ResizeTable),
    MinimizeTable(MinimizeTable),
    SetLabelBands(SetLabelBands),
    SetCells(SetCells),
    SetRange(SetRange),
    SetFormula(SetFormula),
    InsertRows(InsertLines),
    InsertCols(InsertLines),
    SetColumnType(SetColumnType),
    /// Already-rendered lines, used to seed history from an existing script.
    /// Applies no model change.
    Script(Vec<String>),
}

macro_rules! impl_from_payload {
    ($($payload:ident),* $(,)?) => {
        $(
            impl From<$payload> for Mutation {
                fn from(payload: $payload) -> Self {
                    Mutation::$payload(payload)
                }
            }
        )*
    };
}

impl_from_payload!(
    CreateSheet,
    RenameSheet,
    CreateTable,
    CreateSummaryTable,
    MoveTable,
    ResizeTable,
    MinimizeTable,
    SetLabelBands,
    SetCells,
    SetRange,
    SetFormula,
    SetColumnType,
);

impl Mutation {
    /// Table the mutation targets, if any.
    pub fn table_id(&self) -> Option<&str> {
        match self {
            Mutation::CreateSheet(_) | Mutation::RenameSheet(_) | Mutation::Script(_) => None,
            Mutation::CreateTable(c) => Some(&c.table_id),
            Mutation::CreateSummaryTable(c) => Some(&c.table_id),
            Mutation::MoveTable(c) => Some(&c.table_id),
            Mutation::ResizeTable(c) => Some(&c.table_id),
            Mutation::MinimizeTable(c) => Some(&c.table_id),
            Mutation::SetLabelBands(c) => Some(&c.table_id),
            Mutation::SetCells(c) => Some(&c.table_id),
            Mutation::SetRange(c) => Some(&c.table_id),
            Mutation::SetFormula(c) => Some(&c.table_id),
            Mutation::InsertRows(c) | Mutation::InsertCols(c) => Some(&c.table_id),
            Mutation::SetColumnType(c) => Some(&c.table_id),
        }
    }

    pub fn is_noop(&self) -> bool {
        match self {
            Mutation::ResizeTable(c) => c.rows.is_none() && c.cols.is_none(),
            Mutation::MinimizeTable(c) => c.footprint.is_none(),
            Mutation::SetCells(c) => c.cells.is_empty(),
            Mutation::SetRange(c) => c.values.iter().all(Vec::is_empty),
            Mutation::InsertRows(c) | Mutation::InsertCols(c) => c.count == 0,
            Mutation::Script(lines) => lines.is_empty(),
            _ => false,
        }
    }

    /// Apply to the project mirror. Deterministic given the prior state.
    pub fn apply(&self, project: &mut Project) -> Result<()> {
        match self {
            Mutation::CreateSheet(c) => project.add_sheet(&c.sheet_id, &c.name),
            Mutation::RenameSheet(c) => {
                project.sheet_mut(&c.sheet_id)?.name = c.name.clone();
                Ok(())
            }
            Mutation::CreateTable(c) => {
                let mut table =
                    Table::new(&c.table_id, &c.sheet_id, &c.name, c.rect, c.rows, c.cols);
                table.label_bands = c.labels;
                project.add_table(table)
            }
            Mutation::CreateSummaryTable(c) => {
                if project.table(&c.source_table_id).is_none() {
                    return Err(SheetError::UnknownTable(c.source_table_id.clone()));
                }
                let cols = (c.group_by.len() + c.values.len()).max(1);
                let mut table = Table::new(&c.table_id, &c.sheet_id, &c.name, c.rect, 1, cols);
                table.summary = Some(SummarySpec {
                    source_table_id: c.source_table_id.clone(),
                    source_range: c.source_range.map(|r| r.to_string()),
                    group_by: c.group_by.clone(),
                    values: c
                        .values
                        .iter()
                        .map(|v| (v.agg.clone(), v.col.clone()))
                        .collect(),
                });
                project.add_table(table)
            }
            Mutation::MoveTable(c) => {
                let table = project.table_mut(&c.table_id)?;
                table.rect.x = c.x;
                table.rect.y = c.y;
                Ok(())
            }
            Mutation::ResizeTable(c) => {
                let table = project.table_mut(&c.table_id)?;
                if let Some(rows) = c.rows {
                    table.body_rows = rows;
                }
                if let Some(cols) = c.cols {
                    table.body_cols = cols;
                }
                Ok(())
            }
            Mutation::MinimizeTable(c) => {
                let table = project.table_mut(&c.table_id)?;
                if let Some((rows, cols)) = c.footprint {
                    table.body_rows = rows;
                    table.body_cols = cols;
                }
                Ok(())
            }
            Mutation::SetLabelBands(c) => {
                project.table_mut(&c.table_id)?.label_bands = c.bands;
                Ok(())
            }
            Mutation::SetCells(c) => {
                let table = project.table_mut(&c.table_id)?;
                for (addr, value) in &c.cells {
                    table.set_value(*addr, value.clone());
                }
                Ok(())
            }
            Mutation::SetRange(c) => {
                let table = project.table_mut(&c.table_id)?;
                for (addr, value) in c.cells() {
                    table.set_value(addr, value.clone());
                }
                Ok(())
            }
            Mutation::SetFormula(c) => {
                let table = project.table_mut(&c.table_id)?;
                let key = c.target.to_string();
                if c.is_clear() {
                    table.formulas.remove(&key);
                    match c.target {
                        Target::Cell(addr) => {
                            table.cells.remove(&addr);
                        }
                        Target::Range(range) => table.cells.retain(|addr, _| !range.contains(addr)),
                    }
                } else {
                    let formula = format!("={}", strip_formula_prefix(&c.formula));
                    table.formulas.insert(key, formula);
                }
                Ok(())
            }
            Mutation::InsertRows(c) => {
                project.table_mut(&c.table_id)?.body_rows += c.count;
                Ok(())
            }
            Mutation::InsertCols(c) => {
                project.table_mut(&c.table_id)?.body_cols += c.count;
                Ok(())
            }
            Mutation::SetColumnType(c) => {
                project
                    .table_mut(&c.table_id)?
                    .column_types
                    .insert(c.col, c.column_type.clone());
                Ok(())
            }
            Mutation::Script(_) => Ok(()),
        }
    }
}

/// A recorded user action.
#[derive(Clone, Debug)]
pub struct Command {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub mutation: Mutation,
}

impl Command {
    pub fn new(mutation: impl Into<Mutation>) -> Command {
        Command {
            id: NEXT_COMMAND_ID.fetch_add(1, Ordering::Relaxed),
            created_at: Utc::now(),
            mutation: mutation.into(),
        }
    }

    pub fn insert_rows(table_id: impl Into<String>, at: usize, count: usize) -> Command {
        Command::new(Mutation::InsertRows(InsertLines {
            table_id: table_id.into(),
            at,
            count,
        }))
    }

    pub fn insert_cols(table_id: impl Into<String>, at: usize, count: usize) -> Command {
        Command::new(Mutation::InsertCols(InsertLines {
            table_id: table_id.into(),
            at,
            count,
        }))
    }

    pub fn script(lines: Vec<String>) -> Command {
        Command::new(Mutation::Script(lines))
    }

    pub fn is_noop(&self) -> bool {
        self.mutation.is_noop()
    }

    pub fn apply(&self, project: &mut Project) -> Result<()> {
        self.mutation.apply(project)
    }

    /// Script lines for this command. Block lines carry their indentation.
    pub fn render(&self) -> Vec<String> {
        render::render(&self.mutation)
    }
}

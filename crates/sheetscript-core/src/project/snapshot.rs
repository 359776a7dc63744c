//! Project snapshot JSON, as printed by the script runtime after a run.

use super::{Project, Sheet, Table};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use sheetscript_engine::engine::{CellAddress, LabelBands, Rect, Value};
use std::collections::{BTreeMap, HashMap};

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    sheets: Vec<SheetSnapshot>,
}

#[derive(Serialize, Deserialize)]
struct SheetSnapshot {
    id: String,
    name: String,
    #[serde(default)]
    tables: Vec<TableSnapshot>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableSnapshot {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    rect: Rect,
    grid_spec: GridSpec,
    #[serde(default)]
    cell_values: BTreeMap<String, Value>,
    #[serde(default)]
    formulas: BTreeMap<String, FormulaSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body_column_types: Option<ColumnTypes>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridSpec {
    body_rows: usize,
    body_cols: usize,
    #[serde(default)]
    label_bands: LabelBands,
}

#[derive(Serialize, Deserialize)]
struct FormulaSnapshot {
    formula: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mode: Option<String>,
}

/// Runtimes report column types either as a sparse object keyed by column
/// index or as a dense list.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ColumnTypes {
    Map(BTreeMap<String, String>),
    List(Vec<Option<String>>),
}

impl ColumnTypes {
    fn into_map(self) -> BTreeMap<usize, String> {
        match self {
            ColumnTypes::Map(map) => map
                .into_iter()
                .filter_map(|(k, v)| match k.trim().parse::<usize>() {
                    Ok(col) => Some((col, v)),
                    Err(_) => {
                        log::warn!("ignoring column type for non-numeric column {:?}", k);
                        None
                    }
                })
                .collect(),
            ColumnTypes::List(list) => list
                .into_iter()
                .enumerate()
                .filter_map(|(col, v)| v.map(|v| (col, v)))
                .collect(),
        }
    }
}

impl TableSnapshot {
    fn into_table(self, sheet_id: &str) -> Table {
        let mut table = Table::new(
            self.id,
            sheet_id,
            self.name,
            self.rect,
            self.grid_spec.body_rows,
            self.grid_spec.body_cols,
        );
        table.label_bands = self.grid_spec.label_bands;

        let mut cells = HashMap::new();
        for (key, value) in self.cell_values {
            match CellAddress::parse(&key) {
                Ok(addr) if !value.is_empty() => {
                    cells.insert(addr, value);
                }
                Ok(_) => {}
                Err(e) => log::warn!("table {}: skipping cell {:?}: {}", table.id, key, e),
            }
        }
        table.cells = cells;
        table.formulas = self
            .formulas
            .into_iter()
            .map(|(target, f)| (target, f.formula))
            .collect();
        table.column_types = self
            .body_column_types
            .map(ColumnTypes::into_map)
            .unwrap_or_default();
        table
    }

    fn from_table(table: &Table) -> TableSnapshot {
        TableSnapshot {
            id: table.id.clone(),
            name: table.name.clone(),
            rect: table.rect,
            grid_spec: GridSpec {
                body_rows: table.body_rows,
                body_cols: table.body_cols,
                label_bands: table.label_bands,
            },
            cell_values: table
                .cells
                .iter()
                .map(|(addr, value)| (addr.to_string(), value.clone()))
                .collect(),
            formulas: table
                .formulas
                .iter()
                .map(|(target, formula)| {
                    let snapshot = FormulaSnapshot {
                        formula: formula.clone(),
                        mode: Some("spreadsheet".to_string()),
                    };
                    (target.clone(), snapshot)
                })
                .collect(),
            body_column_types: (!table.column_types.is_empty()).then(|| {
                ColumnTypes::Map(
                    table
                        .column_types
                        .iter()
                        .map(|(col, ty)| (col.to_string(), ty.clone()))
                        .collect(),
                )
            }),
        }
    }
}

impl Project {
    /// Parse the JSON snapshot a script run prints as its last output line.
    pub fn from_snapshot_json(json: &str) -> Result<Project> {
        let file: SnapshotFile = serde_json::from_str(json)?;
        let mut project = Project::new();
        for sheet in file.sheets {
            let mut table_ids = Vec::with_capacity(sheet.tables.len());
            for snapshot in sheet.tables {
                let table = snapshot.into_table(&sheet.id);
                table_ids.push(table.id.clone());
                project.tables.insert(table.id.clone(), table);
            }
            project.sheets.push(Sheet {
                id: sheet.id,
                name: sheet.name,
                table_ids,
            });
        }
        Ok(project)
    }

    /// Serialize in the same shape the runtime reports.
    pub fn to_snapshot_json(&self) -> Result<String> {
        let file = SnapshotFile {
            sheets: self
                .sheets
                .iter()
                .map(|sheet| SheetSnapshot {
                    id: sheet.id.clone(),
                    name: sheet.name.clone(),
                    tables: sheet
                        .table_ids
                        .iter()
                        .filter_map(|id| self.table(id))
                        .map(TableSnapshot::from_table)
                        .collect(),
                })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }
}

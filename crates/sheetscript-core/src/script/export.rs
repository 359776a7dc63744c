//! Self-contained export: rebuilds each table as NumPy arrays without the
//! helper module. The output is not meant to be normalized again.

use crate::project::{Project, Table};
use sheetscript_engine::engine::{
    CellAddress, FormulaForm, InlineToken, RangeAddress, Region, Value, encode, encode_str,
    inline_tokens, is_numeric_literal, translate_formula,
};
use sheetscript_engine::helpers::AGGREGATE_HELPERS;
use std::fmt::Write;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportOptions {
    pub include_labels: bool,
    /// Re-apply single-cell formulas as NumPy code before storing tables.
    pub include_formulas: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            include_labels: true,
            include_formulas: false,
        }
    }
}

const HELPERS: &str = "\
def _flatten(items):
    out = []
    for item in items:
        if isinstance(item, np.ndarray):
            out.extend(item.ravel().tolist())
        else:
            out.append(item)
    return out


def _values(items):
    return [v for v in _flatten(items)
            if v is not None and not (isinstance(v, float) and np.isnan(v))]


def _numbers(items):
    return [float(v) for v in _values(items)
            if isinstance(v, (int, float)) and not isinstance(v, bool)]
";

/// Literal for export. Dates and times use NumPy types instead of helpers.
fn export_literal(value: &Value) -> String {
    match value {
        Value::Date(d) => format!("np.datetime64('{}')", d.format("%Y-%m-%d")),
        Value::Time(t) => format!("np.timedelta64({}, 's')", t),
        other => encode(other),
    }
}

fn region_var(region: Region) -> &'static str {
    region.as_str()
}

fn array_var(table: &Table, qualifier: Option<&str>) -> String {
    match qualifier {
        Some(q) if q != table.id && q != super::table_alias(&table.id) => {
            format!("tables[{}]['body']", encode_str(q))
        }
        _ => "body".to_string(),
    }
}

/// `name[r, c]` or `name[r0:r1, c0:c1]` for one aggregate operand.
fn operand(table: &Table, arg: &str) -> Option<String> {
    if is_numeric_literal(arg) {
        return Some(arg.to_string());
    }
    let arg = arg.replace('$', "");
    let (qualifier, reference) = match arg.rsplit_once('.') {
        Some((q, r)) => (Some(q), r),
        None => (None, arg.as_str()),
    };
    let var = array_var(table, qualifier);
    if reference.contains(':') {
        let range = RangeAddress::parse(reference).ok()?;
        Some(format!(
            "{}[{}:{}, {}:{}]",
            var,
            range.start_row,
            range.end_row + 1,
            range.start_col,
            range.end_col + 1
        ))
    } else {
        let cell = CellAddress::parse(reference).ok()?;
        Some(format!("{}[{}, {}]", var, cell.row, cell.col))
    }
}

/// NumPy statement for one single-cell formula, or `None` when it has no
/// export form.
fn formula_statement(table: &Table, target: &CellAddress, formula: &str) -> Option<String> {
    let lhs = format!("{}[{}, {}]", region_var(target.region), target.row, target.col);
    let translation = translate_formula(target, formula);
    let rhs = match translation.form {
        FormulaForm::Aggregate { helper, args } => {
            let template = AGGREGATE_HELPERS
                .iter()
                .find(|h| h.helper_name == helper)?
                .export_template;
            let operands: Option<Vec<String>> = args.iter().map(|a| operand(table, a)).collect();
            template.replace("{}", &format!("[{}]", operands?.join(", ")))
        }
        FormulaForm::Inline { expr } => {
            let mut out = String::new();
            for token in inline_tokens(&expr)? {
                match token {
                    InlineToken::Ref { table: q, cell } => {
                        let cell = CellAddress::parse(&cell).ok()?;
                        let _ = write!(
                            out,
                            "{}[{}, {}]",
                            array_var(table, q.as_deref()),
                            cell.row,
                            cell.col
                        );
                    }
                    InlineToken::Number(n) => out.push_str(&n),
                    InlineToken::Op(op) => out.push(op),
                    InlineToken::Space(s) => out.push_str(&s),
                }
            }
            out
        }
        FormulaForm::Fallback { .. } => return None,
    };
    Some(format!("{} = {}", lhs, rhs))
}

fn one_line(text: &str) -> String {
    text.replace(['\n', '\r'], " ")
}

fn write_region(out: &mut String, table: &Table, region: Region) {
    let (rows, cols) = table.region_size(region);
    let mut cells: Vec<(&CellAddress, &Value)> = table
        .cells
        .iter()
        .filter(|(addr, _)| addr.region == region && addr.row < rows && addr.col < cols)
        .collect();
    cells.sort_by_key(|(addr, _)| **addr);

    let var = region_var(region);
    let numeric = region == Region::Body && cells.iter().all(|(_, v)| v.is_numeric_or_empty());
    if numeric {
        let _ = writeln!(out, "{} = np.full(({}, {}), np.nan, dtype=float)", var, rows, cols);
    } else {
        let _ = writeln!(out, "{} = np.empty(({}, {}), dtype=object)", var, rows, cols);
    }
    for (addr, value) in cells {
        let _ = writeln!(out, "{}[{}, {}] = {}", var, addr.row, addr.col, export_literal(value));
    }
}

fn write_table(out: &mut String, table: &Table, options: &ExportOptions) {
    let _ = writeln!(out, "# {} ({})", one_line(&table.name), one_line(&table.id));
    write_region(out, table, Region::Body);

    let mut stored = vec![Region::Body];
    if options.include_labels {
        for region in Region::ALL.into_iter().filter(|r| r.is_label()) {
            let (rows, cols) = table.region_size(region);
            if rows > 0 && cols > 0 {
                write_region(out, table, region);
                stored.push(region);
            }
        }
    }

    let formulas: Vec<String> = table
        .formulas
        .iter()
        .map(|(target, formula)| format!("{}: {}", encode_str(target), encode_str(formula)))
        .collect();
    let _ = writeln!(out, "formulas = {{{}}}", formulas.join(", "));

    if options.include_formulas {
        for (target, formula) in table.cell_formulas() {
            if !stored.contains(&target.region) {
                continue;
            }
            match formula_statement(table, &target, formula) {
                Some(stmt) => {
                    let _ = writeln!(out, "{}", stmt);
                }
                None => {
                    let _ = writeln!(out, "# not exported: {} {}", target, one_line(formula));
                }
            }
        }
        for target in table.formulas.keys().filter(|k| k.contains(':')) {
            let _ = writeln!(out, "# not exported (range target): {}", one_line(target));
        }
    }

    let entries: Vec<String> = std::iter::once(format!("'name': {}", encode_str(&table.name)))
        .chain(stored.iter().map(|r| format!("'{}': {}", r.as_str(), region_var(*r))))
        .chain(std::iter::once("'formulas': formulas".to_string()))
        .collect();
    let _ = writeln!(out, "tables[{}] = {{{}}}", encode_str(&table.id), entries.join(", "));
}

/// Render `project` as a standalone NumPy script.
pub fn export_script(project: &Project, options: &ExportOptions) -> String {
    let mut out = String::new();
    out.push_str("import numpy as np\n\n\n");
    out.push_str(HELPERS);
    out.push_str("\n\ntables = {}\n");
    for table in project.tables() {
        out.push('\n');
        write_table(&mut out, table, options);
    }
    out.push_str(
        "\n\nif __name__ == '__main__':\n    for table_id, table in tables.items():\n        print(table_id)\n        print(table['body'])\n",
    );
    log::debug!("exported {} tables", project.tables().count());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, CreateSheet, CreateTable, SetCells, SetFormula};
    use sheetscript_engine::engine::{LabelBands, Rect, Target};

    fn project() -> Project {
        let mut project = Project::new();
        let commands = vec![
            Command::new(CreateSheet {
                sheet_id: "sheet_1".into(),
                name: "Sheet 1".into(),
            }),
            Command::new(CreateTable {
                sheet_id: "sheet_1".into(),
                table_id: "table_1".into(),
                name: "Table 1".into(),
                rect: Rect::default(),
                rows: 2,
                cols: 3,
                labels: LabelBands::new(1, 0, 0, 0),
            }),
            Command::new(SetCells::single("table_1", CellAddress::body(0, 0), 1.0.into())),
            Command::new(SetCells::single("table_1", CellAddress::body(0, 1), 2.0.into())),
            Command::new(SetCells::single(
                "table_1",
                CellAddress::new(Region::TopLabels, 0, 0),
                "Qty".into(),
            )),
        ];
        for command in commands {
            command.apply(&mut project).unwrap();
        }
        project
    }

    fn set_formula(project: &mut Project, target: &str, formula: &str) {
        Command::new(SetFormula {
            table_id: "table_1".into(),
            target: Target::parse(target).unwrap(),
            formula: formula.into(),
        })
        .apply(project)
        .unwrap();
    }

    #[test]
    fn test_numeric_body_is_float_array() {
        let script = export_script(&project(), &ExportOptions::default());
        assert!(script.contains("body = np.full((2, 3), np.nan, dtype=float)\n"));
        assert!(script.contains("body[0, 1] = 2\n"));
        assert!(script.contains("top_labels = np.empty((1, 3), dtype=object)\n"));
        assert!(script.contains("top_labels[0, 0] = 'Qty'\n"));
        assert!(script.contains(
            "tables['table_1'] = {'name': 'Table 1', 'body': body, 'top_labels': top_labels, 'formulas': formulas}"
        ));
        assert!(!script.contains("sheetscript_api"));
    }

    #[test]
    fn test_labels_can_be_left_out() {
        let options = ExportOptions {
            include_labels: false,
            include_formulas: false,
        };
        let script = export_script(&project(), &options);
        assert!(!script.contains("top_labels ="));
    }

    #[test]
    fn test_mixed_body_is_object_array() {
        let mut project = project();
        Command::new(SetCells::single("table_1", CellAddress::body(1, 0), "x".into()))
            .apply(&mut project)
            .unwrap();
        let script = export_script(&project, &ExportOptions::default());
        assert!(script.contains("body = np.empty((2, 3), dtype=object)\n"));
    }

    #[test]
    fn test_formulas_become_numpy_code() {
        let mut project = project();
        set_formula(&mut project, "body[C0]", "=SUM(A0:B0)");
        set_formula(&mut project, "body[C1]", "=A0*2 + table_2.B1");
        set_formula(&mut project, "body[A1]", "=IF(A0>1, 1, 0)");
        let options = ExportOptions {
            include_labels: true,
            include_formulas: true,
        };
        let script = export_script(&project, &options);
        assert!(script.contains("body[0, 2] = float(np.sum(_numbers([body[0:1, 0:2]])))\n"));
        assert!(script.contains("body[1, 2] = body[0, 0]*2 + tables['table_2']['body'][1, 1]\n"));
        assert!(script.contains("# not exported: body[A1] =IF(A0>1, 1, 0)\n"));
        assert!(script.contains("'body[C0]': '=SUM(A0:B0)'"));
    }

    #[test]
    fn test_formulas_skipped_by_default() {
        let mut project = project();
        set_formula(&mut project, "body[C0]", "=SUM(A0:B0)");
        let script = export_script(&project, &ExportOptions::default());
        assert!(!script.contains("_numbers([body"));
    }
}

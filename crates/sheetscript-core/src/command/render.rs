//! Command serialization to script lines.

use super::Mutation;
use crate::script::table_alias;
use sheetscript_engine::engine::{
    Region, Structured, Target, encode, encode_number, encode_str, encode_str_list,
    encode_structured, strip_formula_prefix, translate_formula,
};
use sheetscript_engine::helpers::{
    ADD_SHEET, ADD_SUMMARY_TABLE, ADD_TABLE, INSERT_COLS, INSERT_ROWS, LABEL_CONTEXT, MINIMIZE,
    PROJECT_VAR, RENAME_SHEET, RESIZE, SET_COLUMN_TYPE, SET_FORMULA, SET_LABELS, SET_POSITION,
    TABLE_CONTEXT, table_lookup_call,
};

const INDENT: &str = "    ";

/// `proj.table('<id>').<method>(<args>)`
fn table_call(table_id: &str, method: &str, args: &str) -> String {
    format!("{}.{}({})", table_lookup_call(table_id), method, args)
}

/// `<alias> = proj.table('<id>')`
pub(crate) fn binding_line(table_id: &str) -> String {
    format!("{} = {}", table_alias(table_id), table_lookup_call(table_id))
}

pub(crate) fn context_header(table_id: &str, region: Region) -> String {
    let alias = table_alias(table_id);
    if region.is_label() {
        format!(
            "with {}({}, {}):",
            LABEL_CONTEXT,
            alias,
            encode_str(region.as_str())
        )
    } else {
        format!("with {}({}):", TABLE_CONTEXT, alias)
    }
}

fn push_block(lines: &mut Vec<String>, table_id: &str, region: Region, body: &[String]) {
    if body.is_empty() {
        return;
    }
    lines.push(context_header(table_id, region));
    lines.extend(body.iter().map(|l| format!("{}{}", INDENT, l)));
}

pub(super) fn render(mutation: &Mutation) -> Vec<String> {
    match mutation {
        Mutation::CreateSheet(c) => vec![format!(
            "{}.{}({}, sheet_id={})",
            PROJECT_VAR,
            ADD_SHEET,
            encode_str(&c.name),
            encode_str(&c.sheet_id)
        )],
        Mutation::RenameSheet(c) => vec![format!(
            "{}.{}({}, name={})",
            PROJECT_VAR,
            RENAME_SHEET,
            encode_str(&c.sheet_id),
            encode_str(&c.name)
        )],
        Mutation::CreateTable(c) => vec![format!(
            "{}.{}({}, table_id={}, name={}, rect={}, rows={}, cols={}, labels={})",
            PROJECT_VAR,
            ADD_TABLE,
            encode_str(&c.sheet_id),
            encode_str(&c.table_id),
            encode_str(&c.name),
            encode_structured(Structured::Rect(&c.rect)),
            c.rows,
            c.cols,
            encode_structured(Structured::LabelCounts(&c.labels))
        )],
        Mutation::CreateSummaryTable(c) => {
            let mut args = vec![
                encode_str(&c.sheet_id),
                format!("table_id={}", encode_str(&c.table_id)),
                format!("name={}", encode_str(&c.name)),
                format!("rect={}", encode_structured(Structured::Rect(&c.rect))),
                format!("source_table_id={}", encode_str(&c.source_table_id)),
            ];
            if let Some(range) = &c.source_range {
                args.push(format!("source_range={}", encode_str(&range.to_string())));
            }
            args.push(format!("group_by={}", encode_str_list(&c.group_by)));
            let values: Vec<String> = c
                .values
                .iter()
                .map(|v| format!("dict(agg={}, col={})", encode_str(&v.agg), encode_str(&v.col)))
                .collect();
            args.push(format!("values=[{}]", values.join(", ")));
            vec![format!(
                "{}.{}({})",
                PROJECT_VAR,
                ADD_SUMMARY_TABLE,
                args.join(", ")
            )]
        }
        Mutation::MoveTable(c) => vec![table_call(
            &c.table_id,
            SET_POSITION,
            &format!("{}, {}", encode_number(c.x), encode_number(c.y)),
        )],
        Mutation::ResizeTable(c) => {
            let mut args = Vec::new();
            if let Some(rows) = c.rows {
                args.push(format!("rows={}", rows));
            }
            if let Some(cols) = c.cols {
                args.push(format!("cols={}", cols));
            }
            if args.is_empty() {
                return Vec::new();
            }
            vec![table_call(&c.table_id, RESIZE, &args.join(", "))]
        }
        Mutation::MinimizeTable(c) => match c.footprint {
            Some(_) => vec![table_call(&c.table_id, MINIMIZE, "")],
            None => Vec::new(),
        },
        Mutation::SetLabelBands(c) => vec![table_call(
            &c.table_id,
            SET_LABELS,
            &format!(
                "top={}, left={}, bottom={}, right={}",
                c.bands.top, c.bands.left, c.bands.bottom, c.bands.right
            ),
        )],
        Mutation::SetCells(c) => {
            if c.cells.is_empty() {
                return Vec::new();
            }
            let mut lines = vec![binding_line(&c.table_id)];
            let mut region: Option<Region> = None;
            let mut body: Vec<String> = Vec::new();
            for (_, addr, value) in c.sorted() {
                if region != Some(addr.region) {
                    if let Some(r) = region {
                        push_block(&mut lines, &c.table_id, r, &body);
                    }
                    body.clear();
                    region = Some(addr.region);
                }
                body.push(format!("{} = {}", addr.ident(), encode(value)));
            }
            if let Some(r) = region {
                push_block(&mut lines, &c.table_id, r, &body);
            }
            lines
        }
        Mutation::SetRange(c) => {
            let body: Vec<String> = c
                .cells()
                .map(|(addr, value)| format!("{} = {}", addr.ident(), encode(value)))
                .collect();
            if body.is_empty() {
                return Vec::new();
            }
            let mut lines = vec![binding_line(&c.table_id)];
            push_block(&mut lines, &c.table_id, c.start.region, &body);
            lines
        }
        Mutation::SetFormula(c) => {
            let target = encode_str(&c.target.to_string());
            if c.is_clear() {
                return vec![table_call(
                    &c.table_id,
                    SET_FORMULA,
                    &format!("{}, ''", target),
                )];
            }
            match c.target {
                Target::Cell(addr) => {
                    let translation = translate_formula(&addr, &c.formula);
                    let mut lines = vec![binding_line(&c.table_id)];
                    push_block(
                        &mut lines,
                        &c.table_id,
                        Region::Body,
                        &[translation.assignment()],
                    );
                    lines
                }
                Target::Range(_) => {
                    let formula = format!("={}", strip_formula_prefix(&c.formula));
                    vec![table_call(
                        &c.table_id,
                        SET_FORMULA,
                        &format!("{}, {}", target, encode_str(&formula)),
                    )]
                }
            }
        }
        Mutation::InsertRows(c) => vec![table_call(
            &c.table_id,
            INSERT_ROWS,
            &format!("at={}, count={}", c.at, c.count),
        )],
        Mutation::InsertCols(c) => vec![table_call(
            &c.table_id,
            INSERT_COLS,
            &format!("at={}, count={}", c.at, c.count),
        )],
        Mutation::SetColumnType(c) => vec![table_call(
            &c.table_id,
            SET_COLUMN_TYPE,
            &format!("{}, {}", c.col, encode_str(&c.column_type)),
        )],
        Mutation::Script(lines) => lines.clone(),
    }
}

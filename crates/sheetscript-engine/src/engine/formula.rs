//! Spreadsheet formula to script translation.
//!
//! A formula such as `=SUM(A0:B1)` set on `body[C0]` is rendered in the most
//! readable form the script runtime understands, tried in order:
//!
//! - **Aggregate helper**: a lone `SUM/AVERAGE/MIN/MAX/COUNT/COUNTA` call whose
//!   arguments are plain cell/range tokens or numbers: `c0 = c_sum('a0:b1')`
//! - **Inline expression**: cell references, numbers and `+ - * /` only:
//!   `c0 = a0 + b0`
//! - **Fallback**: the original text handed to the generic evaluator:
//!   `c0 = formula('A0^2')`

use super::address::{CellAddress, is_cell_token};
use super::literal::encode_str;
use crate::helpers::{AggregateHelper, FORMULA_CALL, aggregate_helper};

/// Strip surrounding whitespace and the leading `=`.
pub fn strip_formula_prefix(formula: &str) -> &str {
    let trimmed = formula.trim();
    trimmed.strip_prefix('=').unwrap_or(trimmed).trim()
}

/// True for a bare numeric literal: `12`, `-3.5`, `.5`, `1e-3`.
pub fn is_numeric_literal(s: &str) -> bool {
    let s = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (mantissa, exponent) = match s.find(['e', 'E']) {
        Some(idx) => (&s[..idx], Some(&s[idx + 1..])),
        None => (s, None),
    };
    let mut digits = 0usize;
    let mut dots = 0usize;
    for b in mantissa.bytes() {
        match b {
            b'0'..=b'9' => digits += 1,
            b'.' => dots += 1,
            _ => return false,
        }
    }
    if digits == 0 || dots > 1 {
        return false;
    }
    match exponent {
        None => true,
        Some(exp) => {
            let exp = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            !exp.is_empty() && exp.bytes().all(|b| b.is_ascii_digit())
        }
    }
}

/// An aggregate call recognised by the helper form.
#[derive(Clone, Debug)]
pub struct AggregateCall {
    pub helper: &'static AggregateHelper,
    /// Arguments as written, trimmed.
    pub args: Vec<String>,
}

fn is_aggregate_arg(arg: &str) -> bool {
    if arg.is_empty() {
        return false;
    }
    is_numeric_literal(arg)
        || arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '$' | '!'))
}

/// Recognise `NAME(arg, ...)` where the whole expression is one aggregate call.
pub fn aggregate_call(expr: &str) -> Option<AggregateCall> {
    let expr = expr.trim();
    let open = expr.find('(')?;
    let name = &expr[..open];
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    let helper = aggregate_helper(name)?;
    let inner = expr[open + 1..].strip_suffix(')')?;
    // Nested calls and grouping are left to the fallback.
    if inner.contains(['(', ')']) {
        return None;
    }
    let args: Vec<String> = inner.split(',').map(|a| a.trim().to_string()).collect();
    if !args.iter().all(|a| is_aggregate_arg(a)) {
        return None;
    }
    Some(AggregateCall { helper, args })
}

/// Token of an inline-eligible expression.
#[derive(Clone, Debug, PartialEq)]
pub enum InlineToken {
    /// `a0` or `table_2.b1`. The cell part is kept as written.
    Ref { table: Option<String>, cell: String },
    Number(String),
    Op(char),
    Space(String),
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Tokenize an expression made only of cell references, numbers, the four
/// arithmetic operators and whitespace. Anything else yields `None`.
pub fn inline_tokens(expr: &str) -> Option<Vec<InlineToken>> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0usize;
    let mut has_operand = false;

    let take_while = |start: usize, pred: fn(char) -> bool| -> usize {
        let mut end = start;
        while end < chars.len() && pred(chars[end]) {
            end += 1;
        }
        end
    };

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            let end = take_while(i, char::is_whitespace);
            tokens.push(InlineToken::Space(chars[i..end].iter().collect()));
            i = end;
        } else if matches!(c, '+' | '-' | '*' | '/') {
            tokens.push(InlineToken::Op(c));
            i += 1;
        } else if c.is_ascii_digit() || c == '.' {
            let end = take_while(i, |c| c.is_ascii_digit() || c == '.');
            let text: String = chars[i..end].iter().collect();
            if !is_numeric_literal(&text) || (end < chars.len() && is_ident_char(chars[end])) {
                return None;
            }
            tokens.push(InlineToken::Number(text));
            has_operand = true;
            i = end;
        } else if is_ident_start(c) {
            let end = take_while(i, is_ident_char);
            let first: String = chars[i..end].iter().collect();
            if end + 1 < chars.len() && chars[end] == '.' && is_ident_start(chars[end + 1]) {
                let cell_end = take_while(end + 1, is_ident_char);
                let cell: String = chars[end + 1..cell_end].iter().collect();
                if !is_cell_token(&cell) {
                    return None;
                }
                tokens.push(InlineToken::Ref {
                    table: Some(first),
                    cell,
                });
                i = cell_end;
            } else {
                if !is_cell_token(&first) {
                    return None;
                }
                tokens.push(InlineToken::Ref {
                    table: None,
                    cell: first,
                });
                i = end;
            }
            has_operand = true;
        } else {
            return None;
        }
    }

    has_operand.then_some(tokens)
}

/// Render inline tokens as script text. Cell labels are lower-cased; table
/// qualifiers keep their case so mixed-case ids still resolve.
fn render_inline(tokens: &[InlineToken]) -> String {
    let mut out = String::new();
    for token in tokens {
        match token {
            InlineToken::Ref { table, cell } => {
                if let Some(table) = table {
                    out.push_str(table);
                    out.push('.');
                }
                out.push_str(&cell.to_ascii_lowercase());
            }
            InlineToken::Number(n) => out.push_str(n),
            InlineToken::Op(op) => out.push(*op),
            InlineToken::Space(s) => out.push_str(s),
        }
    }
    out
}

/// Rewrite upper-case aggregate names to their NumPy spelling, outside string
/// literals and only where the name is not already qualified.
pub fn fallback_text(expr: &str) -> String {
    let chars: Vec<char> = expr.chars().collect();
    let mut out = String::with_capacity(expr.len());
    let mut quote: Option<char> = None;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        if c == '\'' || c == '"' {
            quote = Some(c);
            out.push(c);
            i += 1;
            continue;
        }
        let qualified = i > 0 && (is_ident_char(chars[i - 1]) || chars[i - 1] == '.');
        if is_ident_start(c) && !qualified {
            let mut end = i;
            while end < chars.len() && is_ident_char(chars[end]) {
                end += 1;
            }
            let name: String = chars[i..end].iter().collect();
            let numpy = aggregate_helper(&name)
                .filter(|h| h.sheet_name == name)
                .and_then(|h| h.numpy_name);
            match numpy {
                Some(np_name) if end < chars.len() && chars[end] == '(' => out.push_str(np_name),
                _ => out.push_str(&name),
            }
            i = end;
            continue;
        }
        out.push(c);
        i += 1;
    }
    out
}

/// The chosen rendering of one formula.
#[derive(Clone, Debug, PartialEq)]
pub enum FormulaForm {
    Aggregate {
        helper: &'static str,
        args: Vec<String>,
    },
    Inline {
        expr: String,
    },
    Fallback {
        text: String,
    },
}

/// A formula rendered for one target cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Translation {
    /// Assignment target inside a table context: `c0` or `top_labels.a0`.
    pub target: String,
    pub form: FormulaForm,
}

impl Translation {
    /// Right-hand side expression.
    pub fn expression(&self) -> String {
        match &self.form {
            FormulaForm::Aggregate { helper, args } => {
                let args: Vec<String> = args
                    .iter()
                    .map(|a| encode_str(&a.to_ascii_lowercase()))
                    .collect();
                format!("{}({})", helper, args.join(", "))
            }
            FormulaForm::Inline { expr } => expr.clone(),
            FormulaForm::Fallback { text } => format!("{}({})", FORMULA_CALL, encode_str(text)),
        }
    }

    pub fn assignment(&self) -> String {
        format!("{} = {}", self.target, self.expression())
    }
}

fn target_ident(target: &CellAddress) -> String {
    if target.region.is_label() {
        format!("{}.{}", target.region, target.ident())
    } else {
        target.ident()
    }
}

/// Translate `formula` (with or without its leading `=`) for a single cell.
pub fn translate_formula(target: &CellAddress, formula: &str) -> Translation {
    let expr = strip_formula_prefix(formula);
    let form = if let Some(call) = aggregate_call(expr) {
        FormulaForm::Aggregate {
            helper: call.helper.helper_name,
            args: call.args,
        }
    } else if let Some(tokens) = inline_tokens(expr) {
        FormulaForm::Inline {
            expr: render_inline(&tokens),
        }
    } else {
        FormulaForm::Fallback {
            text: fallback_text(expr),
        }
    };
    log::debug!("formula for {}: {:?}", target, form);
    Translation {
        target: target_ident(target),
        form,
    }
}

//! Line classifier for generated and hand-edited script text.
//!
//! Recognition is a small token scan (identifier, string literal, punctuation)
//! over one line at a time. Lines it does not recognise are never an error.

use sheetscript_engine::engine::{Region, is_numeric_literal};
use sheetscript_engine::helpers::{
    LABEL_CONTEXT, PROJECT_CTOR, PROJECT_VAR, TABLE_CONSTRUCTORS, TABLE_CONTEXT, TABLE_LOOKUP,
};
use std::collections::HashMap;

const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

/// Local variable name that binds a table id in generated script.
///
/// Ids that are already identifiers are used as is.
pub fn table_alias(table_id: &str) -> String {
    let mut alias: String = table_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if alias.is_empty() || alias.starts_with(|c: char| c.is_ascii_digit()) {
        alias.insert_str(0, "t_");
    }
    if PYTHON_KEYWORDS.contains(&alias.as_str()) {
        alias.push('_');
    }
    alias
}

pub(crate) fn indent_width(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Scanner { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    /// `=` that is an assignment, not `==`.
    fn eat_assign(&mut self) -> bool {
        if self.rest().starts_with('=') && !self.rest().starts_with("==") {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let first = rest.chars().next()?;
        if !(first.is_ascii_alphabetic() || first == '_') {
            return None;
        }
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        self.pos += len;
        Some(&rest[..len])
    }

    fn keyword(&mut self, word: &str) -> bool {
        let save = self.pos;
        if self.ident() == Some(word) {
            return true;
        }
        self.pos = save;
        false
    }

    /// Quoted string literal, decoded. Position is unchanged on failure.
    fn string_literal(&mut self) -> Option<String> {
        let save = self.pos;
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => return None,
        };
        self.pos += 1;
        let mut out = String::new();
        loop {
            let Some(c) = self.bump() else {
                self.pos = save;
                return None;
            };
            if c == quote {
                return Some(out);
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            match self.bump() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some('x') => {
                    let hex = self.rest().get(..2).and_then(|h| u32::from_str_radix(h, 16).ok());
                    match hex.and_then(char::from_u32) {
                        Some(ch) => {
                            self.pos += 2;
                            out.push(ch);
                        }
                        None => out.push_str("\\x"),
                    }
                }
                Some(c @ ('\\' | '\'' | '"')) => out.push(c),
                Some(c) => {
                    out.push('\\');
                    out.push(c);
                }
                None => {
                    self.pos = save;
                    return None;
                }
            }
        }
    }

    /// `proj.table('<id>')` at the current position.
    fn table_lookup(&mut self) -> Option<String> {
        let save = self.pos;
        let found = (|| {
            if !(self.keyword(PROJECT_VAR) && self.eat('.') && self.keyword(TABLE_LOOKUP)) {
                return None;
            }
            self.skip_ws();
            if !self.eat('(') {
                return None;
            }
            self.skip_ws();
            let id = self.string_literal()?;
            self.skip_ws();
            self.eat(')').then_some(id)
        })();
        if found.is_none() {
            self.pos = save;
        }
        found
    }

    /// `<ident> =` prefix of an assignment.
    fn binding(&mut self) -> Option<&'a str> {
        let save = self.pos;
        if let Some(name) = self.ident() {
            self.skip_ws();
            if self.eat_assign() {
                self.skip_ws();
                return Some(name);
            }
        }
        self.pos = save;
        None
    }

    /// Skip to the end of the line; true if only whitespace remained.
    fn only_ws_left(&mut self) -> bool {
        self.skip_ws();
        self.at_end()
    }

    /// Like `only_ws_left`, but a trailing `#` comment is allowed.
    fn only_comment_left(&mut self) -> bool {
        self.skip_ws();
        self.at_end() || self.peek() == Some('#')
    }
}

/// `<name> = proj.table('<id>')`, starting at column zero.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct AliasDecl<'a> {
    pub name: &'a str,
    pub table_id: String,
}

pub(crate) fn alias_declaration(line: &str) -> Option<AliasDecl<'_>> {
    let mut s = Scanner::new(line);
    let name = s.binding()?;
    let table_id = s.table_lookup()?;
    s.only_comment_left().then_some(AliasDecl { name, table_id })
}

/// `[<name> = ]proj.add_table(..., table_id='<id>', ...)` at column zero.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Creation<'a> {
    pub binding: Option<&'a str>,
    pub table_id: String,
    /// The call expression without any binding.
    pub call: &'a str,
}

pub(crate) fn creation(line: &str) -> Option<Creation<'_>> {
    let mut s = Scanner::new(line);
    let binding = s.binding();
    let call_start = s.pos;
    if !s.keyword(PROJECT_VAR) || !s.eat('.') {
        return None;
    }
    let method = s.ident()?;
    if !TABLE_CONSTRUCTORS.contains(&method) {
        return None;
    }
    s.skip_ws();
    if !s.eat('(') {
        return None;
    }
    let call = line[call_start..].trim_end();
    if !call.ends_with(')') {
        return None;
    }
    let table_id = keyword_string_arg(s.rest(), "table_id")?;
    Some(Creation {
        binding,
        table_id,
        call,
    })
}

/// Value of `key='...'` among call arguments, skipping string contents.
fn keyword_string_arg(args: &str, key: &str) -> Option<String> {
    let mut s = Scanner::new(args);
    while !s.at_end() {
        if matches!(s.peek(), Some('\'' | '"')) {
            if s.string_literal().is_none() {
                return None;
            }
            continue;
        }
        match s.ident() {
            Some(name) if name == key => {
                s.skip_ws();
                if s.eat_assign() {
                    s.skip_ws();
                    return s.string_literal();
                }
            }
            Some(_) => {}
            None => {
                s.bump();
            }
        }
    }
    None
}

/// Table argument of a context header.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum HeaderTarget {
    /// A local name to resolve through the alias table.
    Alias(String),
    /// A literal id or an inline `proj.table('<id>')`.
    Id(String),
}

/// `with table_context(<t>):` or `with label_context(<t>, '<region>'):`.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Header {
    pub target: HeaderTarget,
    pub region: Region,
}

pub(crate) fn context_header(line: &str) -> Option<Header> {
    let mut s = Scanner::new(line);
    if !s.keyword("with") || !s.skip_ws() {
        return None;
    }
    let kind = s.ident()?;
    let is_label = match kind {
        k if k == TABLE_CONTEXT => false,
        k if k == LABEL_CONTEXT => true,
        _ => return None,
    };
    s.skip_ws();
    if !s.eat('(') {
        return None;
    }
    s.skip_ws();
    let target = if let Some(id) = s.string_literal() {
        HeaderTarget::Id(id)
    } else if let Some(id) = s.table_lookup() {
        HeaderTarget::Id(id)
    } else {
        HeaderTarget::Alias(s.ident()?.to_string())
    };
    s.skip_ws();
    let region = if is_label {
        if !s.eat(',') {
            return None;
        }
        s.skip_ws();
        let region = Region::from_name(&s.string_literal()?).filter(Region::is_label)?;
        s.skip_ws();
        region
    } else {
        Region::Body
    };
    if !(s.eat(')') && {
        s.skip_ws();
        s.eat(':')
    }) {
        return None;
    }
    s.only_ws_left().then_some(Header { target, region })
}

/// First table a plain line refers to: an inline `proj.table('<id>')`, or a
/// known alias used as `<alias>.` at the start of the line.
pub(crate) fn referenced_table(line: &str, aliases: &HashMap<String, String>) -> Option<String> {
    let mut s = Scanner::new(line);
    if let Some(name) = s.ident() {
        if s.peek() == Some('.') {
            if let Some(id) = aliases.get(name) {
                return Some(id.clone());
            }
        }
    }
    let mut s = Scanner::new(line);
    while !s.at_end() {
        if matches!(s.peek(), Some('\'' | '"')) {
            if s.string_literal().is_none() {
                return None;
            }
            continue;
        }
        if let Some(id) = s.table_lookup() {
            return Some(id);
        }
        if s.ident().is_none() {
            s.bump();
        }
    }
    None
}

/// Split a single-line assignment statement into target and right-hand side.
/// Augmented assignments, comparisons and keyword arguments do not count.
pub(crate) fn split_assignment(stmt: &str) -> Option<(&str, &str)> {
    let mut s = Scanner::new(stmt);
    let mut depth = 0usize;
    while !s.at_end() {
        match s.peek() {
            Some('\'' | '"') => {
                s.string_literal()?;
                continue;
            }
            Some('(' | '[' | '{') => depth += 1,
            Some(')' | ']' | '}') => depth = depth.saturating_sub(1),
            Some('=') if depth == 0 => {
                let before = stmt[..s.pos].chars().last();
                let after = stmt[s.pos + 1..].chars().next();
                let augmented = matches!(
                    before,
                    Some('=' | '!' | '<' | '>' | '+' | '-' | '*' | '/' | '%' | '&' | '|' | '^' | '@' | ':')
                );
                if augmented || after == Some('=') {
                    return None;
                }
                let lhs = stmt[..s.pos].trim();
                let rhs = stmt[s.pos + 1..].trim();
                let target_like = !lhs.is_empty()
                    && lhs
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
                return (target_like && !rhs.is_empty()).then_some((lhs, rhs));
            }
            _ => {}
        }
        s.bump();
    }
    None
}

/// Literal right-hand side: a number, `None`/`True`/`False`, or one quoted
/// string with no other quote characters in it.
pub(crate) fn is_literal_rhs(rhs: &str) -> bool {
    let rhs = rhs.trim();
    if is_numeric_literal(rhs) || matches!(rhs, "None" | "True" | "False") {
        return true;
    }
    let mut chars = rhs.chars();
    match (chars.next(), chars.next_back()) {
        (Some(open @ ('\'' | '"')), Some(close)) if open == close && rhs.len() >= 2 => {
            let inner = &rhs[1..rhs.len() - 1];
            !inner.contains(['\'', '"']) && !inner.ends_with('\\')
        }
        _ => false,
    }
}

/// `proj = Project(...)` at column zero.
pub(crate) fn is_project_init(line: &str) -> bool {
    let mut s = Scanner::new(line);
    s.binding() == Some(PROJECT_VAR) && s.keyword(PROJECT_CTOR) && {
        s.skip_ws();
        s.eat('(')
    }
}

/// `import x` or `from x import y` at column zero.
pub(crate) fn is_import_line(line: &str) -> bool {
    let mut s = Scanner::new(line);
    if s.keyword("import") {
        return s.skip_ws();
    }
    s.keyword("from") && s.skip_ws() && line.contains(" import ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_alias() {
        assert_eq!(table_alias("table_1"), "table_1");
        assert_eq!(table_alias("my table"), "my_table");
        assert_eq!(table_alias("1st"), "t_1st");
        assert_eq!(table_alias("class"), "class_");
        assert_eq!(table_alias(""), "t_");
    }

    #[test]
    fn test_alias_declaration_spacing() {
        for line in [
            "t = proj.table('table_1')",
            "t=proj.table('table_1')",
            "t  =  proj.table( \"table_1\" )  ",
            "t = proj.table('table_1')  # main table",
            "t = proj.table('table_1')#",
        ] {
            let decl = alias_declaration(line).unwrap();
            assert_eq!(decl.name, "t");
            assert_eq!(decl.table_id, "table_1");
        }
        assert!(alias_declaration("    t = proj.table('x')").is_none());
        assert!(alias_declaration("t == proj.table('x')").is_none());
        assert!(alias_declaration("t = proj.table('x').resize(rows=2)").is_none());
        assert!(alias_declaration("t = proj.tables('x')").is_none());
        assert!(alias_declaration("t = proj.table('x') + 1  # not an alias").is_none());
    }

    #[test]
    fn test_creation_line() {
        let line = "proj.add_table('sheet_1', table_id='table_1', name='T(1)', rows=3)";
        let c = creation(line).unwrap();
        assert_eq!(c.binding, None);
        assert_eq!(c.table_id, "table_1");
        assert_eq!(c.call, line);

        let c = creation("t1 = proj.add_summary_table('s', name='table_id=x', table_id='sum_1')")
            .unwrap();
        assert_eq!(c.binding, Some("t1"));
        assert_eq!(c.table_id, "sum_1");

        assert!(creation("proj.add_table('s', rows=3)").is_none());
        assert!(creation("proj.add_sheet('S', sheet_id='s')").is_none());
    }

    #[test]
    fn test_context_headers() {
        let h = context_header("with table_context(table_1):").unwrap();
        assert_eq!(h.target, HeaderTarget::Alias("table_1".into()));
        assert_eq!(h.region, Region::Body);

        let h = context_header("with label_context(proj.table('t 2'), 'left_labels') :").unwrap();
        assert_eq!(h.target, HeaderTarget::Id("t 2".into()));
        assert_eq!(h.region, Region::LeftLabels);

        assert!(context_header("with label_context(t, 'body'):").is_none());
        assert!(context_header("with table_context(t)").is_none());
        assert!(context_header("  with table_context(t):").is_none());
        assert!(context_header("with open(f):").is_none());
    }

    #[test]
    fn test_referenced_table() {
        let aliases = HashMap::from([("t".to_string(), "table_1".to_string())]);
        assert_eq!(
            referenced_table("proj.table('table_2').resize(rows=2)", &aliases).as_deref(),
            Some("table_2")
        );
        assert_eq!(
            referenced_table("t.minimize()", &aliases).as_deref(),
            Some("table_1")
        );
        assert_eq!(referenced_table("print('proj.table(\"x\")')", &aliases), None);
        assert_eq!(referenced_table("u.minimize()", &aliases), None);
    }

    #[test]
    fn test_split_assignment() {
        assert_eq!(split_assignment("a0 = 1"), Some(("a0", "1")));
        assert_eq!(
            split_assignment("top_labels.b0='x = y'"),
            Some(("top_labels.b0", "'x = y'"))
        );
        assert_eq!(split_assignment("a0 += 1"), None);
        assert_eq!(split_assignment("f(x=1)"), None);
        assert_eq!(split_assignment("a0 == 1"), None);
        assert_eq!(split_assignment("# note"), None);
    }

    #[test]
    fn test_literal_rhs() {
        for lit in ["1", "-2.5", "None", "True", "'x'", "\"hello world\"", "''"] {
            assert!(is_literal_rhs(lit), "{}", lit);
        }
        for expr in ["a0", "a0 + 1", "c_sum('a0:a1')", r"'it\'s'", "'a' + 'b'", "date_value('2024-01-01')"] {
            assert!(!is_literal_rhs(expr), "{}", expr);
        }
    }

    #[test]
    fn test_project_init_and_imports() {
        assert!(is_project_init("proj = Project()"));
        assert!(is_project_init("proj=Project(name='x')"));
        assert!(!is_project_init("project = Project()"));
        assert!(is_import_line("import numpy as np"));
        assert!(is_import_line("from sheetscript_api import *"));
        assert!(!is_import_line("imported = 1"));
    }
}

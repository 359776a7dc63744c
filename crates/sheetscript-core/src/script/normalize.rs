//! Log normalizer.
//!
//! Turns the flat stream of rendered command lines into the generated region:
//! literal cell writes are hoisted next to their table's creation, adjacent
//! context blocks for the same table are merged, and table creations bind a
//! local alias. Every pass is recomputed from scratch and
//! `normalize(normalize(x)) == normalize(x)`.

use super::scan::{self, HeaderTarget, indent_width, table_alias};
use crate::command::render::{binding_line, context_header};
use sheetscript_engine::engine::Region;
use std::collections::{HashMap, HashSet};

const INDENT: &str = "    ";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Purpose {
    Data,
    Formula,
    Label,
}

#[derive(Clone, Debug)]
struct ContextBlock {
    table_id: String,
    region: Region,
    purpose: Purpose,
    /// Statements relative to the block indentation. A compound statement
    /// keeps its nested lines, separated by `\n`.
    statements: Vec<String>,
}

impl ContextBlock {
    fn same_scope(&self, other: &ContextBlock) -> bool {
        self.table_id == other.table_id
            && self.region == other.region
            && self.purpose == other.purpose
    }
}

#[derive(Debug)]
enum Block {
    Line {
        text: String,
        table: Option<String>,
    },
    Creation {
        binding: Option<String>,
        table_id: String,
        call: String,
    },
    Alias {
        name: String,
        table_id: String,
        text: String,
    },
    Context(ContextBlock),
}

impl Block {
    /// Table this block refers to, for placing hoisted data.
    fn reference(&self) -> Option<&str> {
        match self {
            Block::Line { table, .. } => table.as_deref(),
            Block::Alias { table_id, .. } => Some(table_id),
            Block::Context(cb) => Some(&cb.table_id),
            Block::Creation { .. } => None,
        }
    }
}

struct Parsed {
    blocks: Vec<Block>,
    /// Tables that get a lookup binding synthesized for them: named by a
    /// creation, a lookup or a resolved alias, or an unresolved header name
    /// that the script never assigns itself.
    known: HashSet<String>,
}

/// Statements of the indented body following a header at `start`.
fn take_body(lines: &[&str], start: usize) -> (Vec<String>, usize) {
    let mut statements: Vec<String> = Vec::new();
    let mut base: Option<usize> = None;
    let mut i = start;
    while i < lines.len() {
        let line = lines[i];
        if line.trim().is_empty() {
            match lines[i..].iter().position(|l| !l.trim().is_empty()) {
                Some(p) if indent_width(lines[i + p]) > 0 => {
                    i += p;
                    continue;
                }
                _ => break,
            }
        }
        let width = indent_width(line);
        if width == 0 {
            break;
        }
        match base {
            None => {
                base = Some(width);
                statements.push(line[width..].trim_end().to_string());
            }
            Some(b) if width > b => match statements.last_mut() {
                Some(last) => {
                    last.push('\n');
                    last.push_str(line[b..].trim_end());
                }
                None => statements.push(line[b..].trim_end().to_string()),
            },
            Some(_) => statements.push(line.trim().to_string()),
        }
        i += 1;
    }
    (statements, i)
}

/// Pass 1: classify lines into blocks, resolving header aliases.
fn parse_blocks(lines: &[&str]) -> Parsed {
    let mut aliases: HashMap<String, String> = HashMap::new();
    let mut known: HashSet<String> = HashSet::new();
    let mut assigned: HashSet<String> = HashSet::new();
    let mut unresolved: HashSet<String> = HashSet::new();
    let mut blocks = Vec::new();
    let mut i = 0usize;

    while i < lines.len() {
        let line = lines[i];

        if let Some(header) = scan::context_header(line) {
            let (statements, next) = take_body(lines, i + 1);
            let table_id = match header.target {
                HeaderTarget::Id(id) => {
                    known.insert(id.clone());
                    id
                }
                HeaderTarget::Alias(name) => match aliases.get(&name) {
                    Some(id) => {
                        known.insert(id.clone());
                        id.clone()
                    }
                    None => {
                        log::warn!("unresolved table alias {:?}, using it as the id", name);
                        unresolved.insert(name.clone());
                        name
                    }
                },
            };
            let purpose = if header.region.is_label() {
                Purpose::Label
            } else {
                Purpose::Formula
            };
            blocks.push(Block::Context(ContextBlock {
                table_id,
                region: header.region,
                purpose,
                statements,
            }));
            i = next;
            continue;
        }

        if let Some(c) = scan::creation(line) {
            let name = c
                .binding
                .map(str::to_string)
                .unwrap_or_else(|| table_alias(&c.table_id));
            assigned.insert(name.clone());
            aliases.insert(name, c.table_id.clone());
            known.insert(c.table_id.clone());
            blocks.push(Block::Creation {
                binding: c.binding.map(str::to_string),
                table_id: c.table_id,
                call: c.call.to_string(),
            });
        } else if let Some(a) = scan::alias_declaration(line) {
            assigned.insert(a.name.to_string());
            aliases.insert(a.name.to_string(), a.table_id.clone());
            known.insert(a.table_id.clone());
            blocks.push(Block::Alias {
                name: a.name.to_string(),
                table_id: a.table_id,
                text: line.trim_end().to_string(),
            });
        } else {
            let table = scan::referenced_table(line, &aliases);
            if let Some(id) = &table {
                known.insert(id.clone());
            }
            if indent_width(line) == 0 {
                if let Some((lhs, _)) = scan::split_assignment(line) {
                    assigned.insert(lhs.to_string());
                }
            }
            blocks.push(Block::Line {
                text: line.to_string(),
                table,
            });
        }
        i += 1;
    }

    known.extend(unresolved.into_iter().filter(|name| !assigned.contains(name)));
    Parsed { blocks, known }
}

fn is_data_statement(statement: &str) -> bool {
    !statement.contains('\n')
        && scan::split_assignment(statement).is_some_and(|(_, rhs)| scan::is_literal_rhs(rhs))
}

/// Pass 2: pull literal writes out of body blocks. Returns data statements
/// per table, in stream order.
fn partition(blocks: &mut [Block]) -> HashMap<String, Vec<String>> {
    let mut data: HashMap<String, Vec<String>> = HashMap::new();
    for block in blocks.iter_mut() {
        let Block::Context(cb) = block else { continue };
        if cb.purpose == Purpose::Label {
            continue;
        }
        let (literal, rest): (Vec<String>, Vec<String>) = std::mem::take(&mut cb.statements)
            .into_iter()
            .partition(|s| is_data_statement(s));
        if !literal.is_empty() {
            data.entry(cb.table_id.clone()).or_default().extend(literal);
        }
        cb.statements = rest;
    }
    data
}

enum Out {
    Text(String),
    Context(ContextBlock),
}

struct Emitter<'a> {
    out: Vec<Out>,
    /// Local name -> table id it currently holds in the emitted text.
    bound: HashMap<String, String>,
    known: &'a HashSet<String>,
    data: HashMap<String, Vec<String>>,
}

impl Emitter<'_> {
    fn text(&mut self, text: String) {
        self.out.push(Out::Text(text));
    }

    fn context(&mut self, block: ContextBlock) {
        if block.statements.is_empty() {
            return;
        }
        self.ensure_bound(&block.table_id);
        if let Some(Out::Context(last)) = self.out.last_mut() {
            if last.same_scope(&block) {
                last.statements.extend(block.statements);
                return;
            }
        }
        self.out.push(Out::Context(block));
    }

    fn is_bound(&self, name: &str, table_id: &str) -> bool {
        self.bound.get(name).is_some_and(|id| id == table_id)
    }

    /// Emit `<alias> = proj.table('<id>')` unless the alias already holds
    /// that table.
    fn ensure_bound(&mut self, table_id: &str) {
        if !self.known.contains(table_id) {
            return;
        }
        let alias = table_alias(table_id);
        if !self.is_bound(&alias, table_id) {
            self.text(binding_line(table_id));
            self.bound.insert(alias, table_id.to_string());
        }
    }

    fn flush_data(&mut self, table_id: &str) {
        if let Some(statements) = self.data.remove(table_id) {
            self.context(ContextBlock {
                table_id: table_id.to_string(),
                region: Region::Body,
                purpose: Purpose::Data,
                statements,
            });
        }
    }

    fn render(self) -> Vec<String> {
        let mut lines = Vec::new();
        for out in self.out {
            match out {
                Out::Text(text) => lines.push(text),
                Out::Context(cb) => {
                    lines.push(context_header(&cb.table_id, cb.region));
                    for statement in &cb.statements {
                        lines.extend(statement.split('\n').map(|l| format!("{}{}", INDENT, l)));
                    }
                }
            }
        }
        lines
    }
}

/// Pass 3: hoist data blocks and merge adjacent blocks.
fn emit(blocks: Vec<Block>, known: &HashSet<String>, data: HashMap<String, Vec<String>>) -> Vec<String> {
    let created: HashSet<String> = blocks
        .iter()
        .filter_map(|b| match b {
            Block::Creation { table_id, .. } => Some(table_id.clone()),
            _ => None,
        })
        .collect();
    let mut first_reference: HashMap<String, usize> = HashMap::new();
    for (idx, block) in blocks.iter().enumerate() {
        if let Some(id) = block.reference() {
            if !created.contains(id) {
                first_reference.entry(id.to_string()).or_insert(idx);
            }
        }
    }

    let hoisted: usize = data.values().map(Vec::len).sum();
    let mut em = Emitter {
        out: Vec::new(),
        bound: HashMap::new(),
        known,
        data,
    };

    for (idx, block) in blocks.into_iter().enumerate() {
        let is_first_reference =
            |id: &str| first_reference.get(id).is_some_and(|first| *first == idx);
        match block {
            Block::Creation {
                binding,
                table_id,
                call,
            } => {
                let name = binding.unwrap_or_else(|| table_alias(&table_id));
                em.text(format!("{} = {}", name, call));
                em.bound.insert(name, table_id.clone());
                em.flush_data(&table_id);
            }
            Block::Alias {
                name,
                table_id,
                text,
            } => {
                let canonical = name == table_alias(&table_id);
                if !(canonical && em.is_bound(&name, &table_id)) {
                    em.text(text);
                    em.bound.insert(name, table_id.clone());
                }
                if is_first_reference(table_id.as_str()) {
                    em.flush_data(&table_id);
                }
            }
            Block::Line { text, table } => {
                // Any other top-level assignment rebinds the name.
                if indent_width(&text) == 0 {
                    if let Some((lhs, _)) = scan::split_assignment(&text) {
                        em.bound.remove(lhs);
                    }
                }
                em.text(text);
                if let Some(id) = table.filter(|id| is_first_reference(id.as_str())) {
                    em.flush_data(&id);
                }
            }
            Block::Context(cb) => {
                if is_first_reference(cb.table_id.as_str()) {
                    em.flush_data(&cb.table_id);
                }
                em.context(cb);
            }
        }
    }

    // Data for a table nothing else mentions cannot happen, but never drop it.
    let mut leftovers: Vec<String> = em.data.keys().cloned().collect();
    leftovers.sort();
    for id in leftovers {
        em.flush_data(&id);
    }

    log::debug!("normalized log: {} output blocks, {} hoisted data lines", em.out.len(), hoisted);
    em.render()
}

/// Normalize rendered command lines. Elements may hold several lines.
pub fn normalize<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let flat: Vec<&str> = lines
        .iter()
        .flat_map(|l| l.as_ref().split('\n'))
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect();
    if flat.iter().all(|l| l.is_empty()) && flat.len() <= 1 {
        return Vec::new();
    }
    let mut parsed = parse_blocks(&flat);
    let data = partition(&mut parsed.blocks);
    emit(parsed.blocks, &parsed.known, data)
}

/// Normalize a whole generated region.
pub fn normalize_text(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let out = normalize(&lines);
    if out.is_empty() {
        return String::new();
    }
    let mut text = out.join("\n");
    text.push('\n');
    text
}

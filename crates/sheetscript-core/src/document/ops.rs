use super::Document;
use crate::command::{Command, Transaction, TransactionKind, TransactionManager};
use crate::error::{Result, SheetError};
use crate::history::History;
use crate::runner::{RunError, RunOutput, RunTicket, ScriptRunner};
use crate::script::{compose, normalize, selection_script};
use std::ops::Range;

impl Document {
    pub fn begin(&mut self, kind: TransactionKind) -> Result<()> {
        self.transactions.begin(kind)?;
        self.checkpoint = Some(self.project.clone());
        Ok(())
    }

    /// Apply `command` and record it in the active transaction.
    ///
    /// Returns `Ok(false)` for a no-op command, which is neither applied nor
    /// recorded. A command that fails to apply leaves the project untouched.
    pub fn record(&mut self, command: Command) -> Result<bool> {
        if !self.transactions.is_active() {
            return Err(SheetError::NoActiveTransaction);
        }
        if command.is_noop() {
            log::debug!("skipping no-op command {}", command.id);
            return Ok(false);
        }
        let mut next = self.project.clone();
        command.apply(&mut next)?;
        self.transactions.record(command)?;
        self.project = next;
        Ok(true)
    }

    /// Close the active transaction and rebuild the generated region.
    pub fn commit(&mut self) -> Result<Transaction> {
        let txn = self.transactions.commit()?;
        self.checkpoint = None;
        if !txn.commands.is_empty() {
            self.regenerate();
        }
        Ok(txn)
    }

    /// Drop the active transaction and restore the project as it was at `begin`.
    pub fn abort(&mut self) {
        if self.transactions.abort().is_some() {
            if let Some(project) = self.checkpoint.take() {
                self.project = project;
            }
        }
    }

    /// Run one command as its own general transaction.
    pub fn execute(&mut self, command: Command) -> Result<bool> {
        self.begin(TransactionKind::General)?;
        match self.record(command) {
            Ok(applied) => {
                self.commit()?;
                Ok(applied)
            }
            Err(e) => {
                self.abort();
                Err(e)
            }
        }
    }

    /// Normalized text of the whole command log.
    pub fn generated_text(&self) -> String {
        let lines = normalize(&self.transactions.all_commands());
        if lines.is_empty() {
            return String::new();
        }
        let mut text = lines.join("\n");
        text.push('\n');
        text
    }

    pub(crate) fn regenerate(&mut self) {
        let generated = self.generated_text();
        self.script = compose(&self.script, &generated);
        self.modified = true;
    }

    /// Replace the script with hand-edited text and rebuild the command log
    /// from its generated region.
    pub fn edit_script(&mut self, text: String) {
        self.abort();
        let history = History::from_script(&text);
        log::debug!("script edited, reseeding {} history lines", history.commands.len());
        self.transactions = TransactionManager::with_history(history.commands);
        self.script = text;
        self.modified = true;
    }

    /// Canonical history of the current command log.
    pub fn history(&self) -> History {
        History::from_generated(&self.generated_text())
    }

    /// Independently runnable script for a byte range of the script text.
    pub fn selection_script(&self, range: Range<usize>) -> Option<String> {
        selection_script(&self.script, range)
    }

    /// Start a run of the current script. Any earlier in-flight run becomes stale.
    pub fn begin_run(&mut self) -> RunTicket {
        let ticket = self.run_generation.next();
        self.pending_run = Some((ticket.generation(), self.script.clone()));
        ticket
    }

    /// Apply the outcome of a run.
    ///
    /// Results for stale tickets are ignored and return `Ok(false)`. On
    /// success the project snapshot is replaced and the command log is
    /// reseeded from the script that was executed.
    pub fn apply_run_result(
        &mut self,
        ticket: &RunTicket,
        result: std::result::Result<RunOutput, RunError>,
    ) -> std::result::Result<bool, RunError> {
        if !ticket.is_current() {
            log::debug!("ignoring result of stale run {}", ticket.generation());
            return Ok(false);
        }
        let executed = match self.pending_run.take() {
            Some((generation, script)) if generation == ticket.generation() => script,
            other => {
                self.pending_run = other;
                return Ok(false);
            }
        };
        let output = result?;
        if !output.log.is_empty() {
            log::info!("run {} output:\n{}", ticket.generation(), output.log);
        }
        self.abort();
        self.project = output.project;
        let history = History::from_script(&executed);
        self.transactions = TransactionManager::with_history(history.commands);
        Ok(true)
    }

    /// Run the whole script synchronously and apply the result.
    pub fn run(&mut self, runner: &ScriptRunner) -> std::result::Result<bool, RunError> {
        let ticket = self.begin_run();
        let result = runner.run(&self.script, &ticket);
        self.apply_run_result(&ticket, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CreateSheet, CreateTable, MoveTable, SetCells, SetFormula};
    use crate::project::Project;
    use crate::script::{MARKER, extract_generated_region, user_region};
    use sheetscript_engine::engine::{CellAddress, LabelBands, Rect, Target, Value};
    use std::time::Duration;

    fn create_commands() -> Vec<Command> {
        vec![
            Command::new(CreateSheet {
                sheet_id: "sheet_1".into(),
                name: "Sheet 1".into(),
            }),
            Command::new(CreateTable {
                sheet_id: "sheet_1".into(),
                table_id: "table_1".into(),
                name: "Table 1".into(),
                rect: Rect::new(0.0, 0.0, 300.0, 120.0),
                rows: 3,
                cols: 3,
                labels: LabelBands::default(),
            }),
        ]
    }

    fn doc_with_table() -> Document {
        let mut doc = Document::new();
        for cmd in create_commands() {
            assert!(doc.execute(cmd).unwrap());
        }
        doc
    }

    fn edit(doc: &mut Document, col: usize, value: f64) {
        doc.record(Command::new(SetCells::single(
            "table_1",
            CellAddress::body(0, col),
            Value::Number(value),
        )))
        .unwrap();
    }

    #[test]
    fn test_new_document_has_preamble_and_marker() {
        let doc = Document::new();
        assert!(doc.script().starts_with("import numpy as np\n"));
        assert!(doc.script().contains(MARKER));
        assert!(doc.generated_text().is_empty());
        assert!(!doc.modified);
    }

    #[test]
    fn test_preamble_uses_helper_module() {
        let mut doc = Document::with_helper_module("my_api");
        assert!(doc.script().contains("\nfrom my_api import *\n"));
        for cmd in create_commands() {
            doc.execute(cmd).unwrap();
        }
        assert!(doc.script().contains("\nfrom my_api import *\n"));
    }

    #[test]
    fn test_execute_updates_project_and_script() {
        let doc = doc_with_table();
        assert!(doc.project.table("table_1").is_some());
        assert!(doc.modified);
        let generated = extract_generated_region(doc.script());
        assert!(generated.contains("proj.add_sheet('Sheet 1', sheet_id='sheet_1')"));
        assert!(generated.contains("table_1 = proj.add_table('sheet_1'"));
        assert_eq!(user_region(doc.script()), user_region(&Document::new().script));
    }

    #[test]
    fn test_cell_edits_merge_into_one_block() {
        let mut doc = doc_with_table();
        doc.begin(TransactionKind::CellEdit).unwrap();
        edit(&mut doc, 0, 1.0);
        edit(&mut doc, 1, 2.0);
        let txn = doc.commit().unwrap();
        assert_eq!(txn.commands.len(), 1);
        assert!(doc.generated_text().contains("    a0 = 1\n    b0 = 2\n"));
    }

    #[test]
    fn test_failed_record_leaves_project_untouched() {
        let mut doc = doc_with_table();
        let before = doc.project.clone();
        let err = doc
            .execute(Command::new(MoveTable {
                table_id: "missing".into(),
                x: 1.0,
                y: 2.0,
            }))
            .unwrap_err();
        assert!(matches!(err, SheetError::UnknownTable(_)));
        assert_eq!(doc.project, before);
        assert!(!doc.transactions().is_active());
    }

    #[test]
    fn test_abort_restores_checkpoint() {
        let mut doc = doc_with_table();
        let script = doc.script().to_string();
        doc.begin(TransactionKind::CellEdit).unwrap();
        edit(&mut doc, 0, 5.0);
        assert!(doc.project.table("table_1").unwrap().value(&CellAddress::body(0, 0)).is_some());
        doc.abort();
        assert!(doc.project.table("table_1").unwrap().value(&CellAddress::body(0, 0)).is_none());
        assert_eq!(doc.script(), script);
    }

    #[test]
    fn test_noop_command_is_not_recorded() {
        let mut doc = doc_with_table();
        let clear = Command::new(SetFormula {
            table_id: "table_1".into(),
            target: Target::parse("body[C0]").unwrap(),
            formula: String::new(),
        });
        let applied = doc.execute(clear).unwrap();
        // Clearing is a real edit even when nothing was set.
        assert!(applied);
        let resize = Command::new(crate::command::ResizeTable::new(
            doc.project.table("table_1").unwrap(),
            3,
            3,
        ));
        assert!(!doc.execute(resize).unwrap());
    }

    #[test]
    fn test_record_requires_transaction() {
        let mut doc = Document::new();
        let err = doc.record(create_commands().remove(0)).unwrap_err();
        assert!(matches!(err, SheetError::NoActiveTransaction));
    }

    #[test]
    fn test_edit_script_reseeds_history() {
        let mut doc = doc_with_table();
        let edited = doc.script().replace("name='Table 1'", "name='Renamed'");
        doc.edit_script(edited.clone());
        assert_eq!(doc.script(), edited);
        assert!(doc.generated_text().contains("name='Renamed'"));

        doc.execute(Command::new(MoveTable {
            table_id: "table_1".into(),
            x: 10.0,
            y: 20.0,
        }))
        .unwrap();
        let generated = extract_generated_region(doc.script());
        assert!(generated.contains("name='Renamed'"));
        assert!(generated.contains("proj.table('table_1').set_position(10, 20)"));
    }

    #[test]
    fn test_open_prefers_history_over_script() {
        let script = format!("proj = Project()\n{}\nproj.add_sheet('A', sheet_id='a')\n", MARKER);
        let history = History::new(vec!["proj.add_sheet('B', sheet_id='b')".to_string()]);
        let doc = Document::open(script.clone(), Some(history));
        assert_eq!(doc.generated_text(), "proj.add_sheet('B', sheet_id='b')\n");
        assert_eq!(doc.script(), script);

        let doc = Document::open(script, Some(History::default()));
        assert_eq!(doc.generated_text(), "proj.add_sheet('A', sheet_id='a')\n");
    }

    #[test]
    fn test_history_has_no_alias_declarations() {
        let mut doc = doc_with_table();
        doc.begin(TransactionKind::CellEdit).unwrap();
        edit(&mut doc, 0, 1.0);
        doc.commit().unwrap();
        let history = doc.history();
        assert!(!history.commands.iter().any(|l| l.contains("= proj.table(")));
        let reopened = Document::open(String::new(), Some(history));
        assert_eq!(reopened.generated_text(), doc.generated_text());
    }

    #[test]
    fn test_selection_script_is_runnable() {
        let doc = doc_with_table();
        let start = doc.script().find("proj.add_sheet").unwrap();
        let end = start + doc.script()[start..].find('\n').unwrap();
        let partial = doc.selection_script(start..end).unwrap();
        assert!(partial.starts_with("import numpy as np\n"));
        assert!(partial.contains("proj = Project()\n"));
        assert!(partial.ends_with("sheet_id='sheet_1')\n"));
    }

    fn output_with(project: Project) -> RunOutput {
        RunOutput {
            project,
            log: String::new(),
            stderr: String::new(),
            elapsed: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_stale_run_result_is_ignored() {
        let mut doc = doc_with_table();
        let first = doc.begin_run();
        let second = doc.begin_run();
        let applied = doc.apply_run_result(&first, Ok(output_with(Project::new()))).unwrap();
        assert!(!applied);
        assert!(doc.project.table("table_1").is_some());

        let applied = doc
            .apply_run_result(&second, Ok(output_with(Project::new())))
            .unwrap();
        assert!(applied);
        assert!(doc.project.table("table_1").is_none());
    }

    #[test]
    fn test_failed_run_keeps_project() {
        let mut doc = doc_with_table();
        let ticket = doc.begin_run();
        let result = doc.apply_run_result(&ticket, Err(RunError::Timeout(Duration::from_secs(1))));
        assert!(matches!(result, Err(RunError::Timeout(_))));
        assert!(doc.project.table("table_1").is_some());
    }

    #[test]
    fn test_successful_run_reseeds_from_executed_script() {
        let mut doc = doc_with_table();
        let ticket = doc.begin_run();
        let executed = doc.script().to_string();
        doc.edit_script(executed.replace("sheet_id='sheet_1')", "sheet_id='sheet_1')\nprint(1)"));
        doc.apply_run_result(&ticket, Ok(output_with(Project::new()))).unwrap();
        assert!(!doc.generated_text().contains("print(1)"));
        assert_eq!(doc.history(), History::from_script(&executed));
    }
}

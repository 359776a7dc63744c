use crate::command::TransactionManager;
use crate::history::History;
use crate::project::Project;
use crate::runner::RunGeneration;
use crate::script::new_script;
use sheetscript_engine::helpers::DEFAULT_HELPER_MODULE;
use std::path::PathBuf;

/// UI-agnostic document: the project snapshot, its command log and the
/// script text built from that log.
pub struct Document {
    /// Last known project state: recorded commands applied on top of the
    /// snapshot of the most recent successful run.
    pub project: Project,
    pub(crate) transactions: TransactionManager,
    pub(crate) script: String,
    pub(crate) run_generation: RunGeneration,
    /// Snapshot taken at `begin`, restored by `abort`.
    pub(crate) checkpoint: Option<Project>,
    /// Script text handed to the newest run, keyed by its generation.
    pub(crate) pending_run: Option<(u64, String)>,
    /// Current file path
    pub file_path: Option<PathBuf>,
    /// Whether the script has changed since it was loaded or saved
    pub modified: bool,
}

impl Document {
    /// Create a new document with the default preamble and an empty log.
    ///
    /// This constructor is side-effect free: it does not touch the filesystem.
    pub fn new() -> Self {
        Self::with_helper_module(DEFAULT_HELPER_MODULE)
    }

    /// New document whose preamble imports `helper_module`.
    pub fn with_helper_module(helper_module: &str) -> Self {
        Document {
            project: Project::new(),
            transactions: TransactionManager::new(),
            script: new_script(helper_module),
            run_generation: RunGeneration::new(),
            checkpoint: None,
            pending_run: None,
            file_path: None,
            modified: false,
        }
    }

    /// Open an existing script. The command log is seeded from `history`
    /// when given and non-empty, otherwise from the script's generated region.
    ///
    /// The project snapshot starts empty; it is filled by the first run.
    pub fn open(script: String, history: Option<History>) -> Self {
        let history = match history {
            Some(h) if !h.is_empty() => h,
            _ => History::from_script(&script),
        };
        log::debug!("opened document with {} history lines", history.commands.len());
        Document {
            transactions: TransactionManager::with_history(history.commands),
            script,
            ..Self::new()
        }
    }

    /// Full script text.
    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

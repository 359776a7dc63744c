//! Script execution in an external interpreter.
//!
//! The script is written to a temporary file and run as
//! `<interpreter> <entry args...> <script path>` with the helper module on
//! `PYTHONPATH`. The last non-empty stdout line must be the project snapshot.

use crate::project::Project;
use serde::Deserialize;
use sheetscript_engine::helpers::DEFAULT_HELPER_MODULE;
use std::env;
use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command as Process, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

const DEFAULT_POLL_INTERVAL_MILLIS: u64 = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to launch interpreter: {0}")]
    Launch(#[source] io::Error),

    #[error("Script failed (exit code {code:?}):\n{stderr}")]
    Exit { code: Option<i32>, stderr: String },

    #[error("Script finished without a usable project snapshot: {0}")]
    MalformedOutput(String),

    #[error("Script timed out after {0:?}")]
    Timeout(Duration),

    #[error("Run was superseded by a newer run")]
    Superseded,
}

/// Interpreter settings, read from the `[runner]` config table.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    pub interpreter: PathBuf,
    /// Arguments placed before the script path. Empty means
    /// `-m <helper_module>.runner`.
    pub entry: Vec<String>,
    /// Directory that contains the helper module package.
    pub module_dir: Option<PathBuf>,
    pub helper_module: String,
    pub timeout_secs: u64,
    /// Capture budget per output stream. Bytes past it are dropped.
    pub max_output_bytes: usize,
}

impl RunnerConfig {
    /// Interpreter arguments that precede the script path.
    pub fn entry_args(&self) -> Vec<String> {
        if self.entry.is_empty() {
            vec!["-m".to_string(), format!("{}.runner", self.helper_module)]
        } else {
            self.entry.clone()
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            interpreter: PathBuf::from("python3"),
            entry: Vec::new(),
            module_dir: None,
            helper_module: DEFAULT_HELPER_MODULE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

/// Monotonic run counter shared by a document and its in-flight runs.
#[derive(Clone, Debug, Default)]
pub struct RunGeneration(Arc<AtomicU64>);

impl RunGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new run, invalidating every earlier ticket.
    pub fn next(&self) -> RunTicket {
        let generation = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        RunTicket {
            generation,
            counter: Arc::clone(&self.0),
        }
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub struct RunTicket {
    generation: u64,
    counter: Arc<AtomicU64>,
}

impl RunTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.generation
    }
}

#[derive(Clone, Debug)]
pub struct RunOutput {
    pub project: Project,
    /// Stdout before the snapshot line.
    pub log: String,
    pub stderr: String,
    pub elapsed: Duration,
}

pub struct ScriptRunner {
    config: RunnerConfig,
    timeout: Duration,
}

fn spawn_reader<R: Read + Send + 'static>(mut stream: R, limit: usize) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut captured = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let room = limit.saturating_sub(captured.len());
                    captured.extend_from_slice(&buf[..n.min(room)]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        captured
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    let bytes = handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn find_on_path(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

impl ScriptRunner {
    pub fn new(config: RunnerConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        ScriptRunner { config, timeout }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Locate the interpreter and helper module without spawning anything.
    pub fn check(&self) -> Result<(PathBuf, PathBuf), RunError> {
        let interpreter = find_on_path(&self.config.interpreter).ok_or_else(|| {
            RunError::Config(format!(
                "interpreter not found: {}",
                self.config.interpreter.display()
            ))
        })?;
        let module_dir = self.config.module_dir.clone().ok_or_else(|| {
            RunError::Config("helper module directory is not configured".to_string())
        })?;
        let package = module_dir.join(&self.config.helper_module);
        let found = package.join("__init__.py").is_file()
            || module_dir
                .join(format!("{}.py", self.config.helper_module))
                .is_file();
        if !found {
            return Err(RunError::Config(format!(
                "helper module {} not found in {}",
                self.config.helper_module,
                module_dir.display()
            )));
        }
        Ok((interpreter, module_dir))
    }

    fn search_path(module_dir: &Path) -> Result<OsString, RunError> {
        let mut paths = vec![module_dir.to_path_buf()];
        if let Some(existing) = env::var_os("PYTHONPATH") {
            paths.extend(env::split_paths(&existing));
        }
        env::join_paths(paths).map_err(|e| RunError::Config(e.to_string()))
    }

    /// Run `script` to completion. Fails with [`RunError::Superseded`] as soon
    /// as `ticket` is no longer current.
    pub fn run(&self, script: &str, ticket: &RunTicket) -> Result<RunOutput, RunError> {
        let (interpreter, module_dir) = self.check()?;
        let search_path = Self::search_path(&module_dir)?;

        let mut file = tempfile::Builder::new()
            .prefix("sheetscript-")
            .suffix(".py")
            .tempfile()
            .map_err(RunError::Launch)?;
        file.write_all(script.as_bytes()).map_err(RunError::Launch)?;
        file.flush().map_err(RunError::Launch)?;

        if !ticket.is_current() {
            return Err(RunError::Superseded);
        }

        let started_at = Instant::now();
        let mut child = Process::new(&interpreter)
            .args(self.config.entry_args())
            .arg(file.path())
            .env("PYTHONPATH", search_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(RunError::Launch)?;
        log::info!(
            "run {}: started {} (pid {})",
            ticket.generation(),
            interpreter.display(),
            child.id()
        );
        drop(child.stdin.take());

        let limit = self.config.max_output_bytes;
        let stdout = child.stdout.take().map(|s| spawn_reader(s, limit));
        let stderr = child.stderr.take().map(|s| spawn_reader(s, limit));
        let poll_interval = Duration::from_millis(DEFAULT_POLL_INTERVAL_MILLIS);

        // Reader threads of a killed run are left to finish on their own; a
        // grandchild may still hold the pipes open.
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if !ticket.is_current() {
                        let _ = child.kill();
                        let _ = child.wait();
                        log::info!("run {}: superseded, process killed", ticket.generation());
                        return Err(RunError::Superseded);
                    }
                    if started_at.elapsed() >= self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        log::warn!(
                            "run {}: timed out after {:?}, process killed",
                            ticket.generation(),
                            self.timeout
                        );
                        return Err(RunError::Timeout(self.timeout));
                    }
                    thread::sleep(poll_interval);
                }
                Err(e) => {
                    let _ = child.kill();
                    return Err(RunError::Launch(e));
                }
            }
        };

        let stdout = join_reader(stdout);
        let stderr = join_reader(stderr);
        let elapsed = started_at.elapsed();
        log::info!(
            "run {}: exited with {:?} after {:?}",
            ticket.generation(),
            status.code(),
            elapsed
        );

        if !status.success() {
            return Err(RunError::Exit {
                code: status.code(),
                stderr,
            });
        }

        let mut lines: Vec<&str> = stdout.lines().collect();
        while lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }
        let snapshot = lines
            .pop()
            .ok_or_else(|| RunError::MalformedOutput("no output".to_string()))?;
        let project = Project::from_snapshot_json(snapshot.trim())
            .map_err(|e| RunError::MalformedOutput(e.to_string()))?;

        Ok(RunOutput {
            project,
            log: lines.join("\n"),
            stderr,
            elapsed,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;

    const SNAPSHOT: &str = r#"{"sheets":[{"id":"s","name":"S","tables":[{"id":"t","name":"T","gridSpec":{"bodyRows":2,"bodyCols":1}}]}]}"#;

    /// A runner whose "interpreter" is `/bin/sh -c <body> sh <script>`.
    fn shell_runner(dir: &Path, body: &str) -> ScriptRunner {
        let package = dir.join(DEFAULT_HELPER_MODULE);
        fs::create_dir_all(&package).unwrap();
        fs::write(package.join("__init__.py"), "").unwrap();
        ScriptRunner::new(RunnerConfig {
            interpreter: PathBuf::from("/bin/sh"),
            entry: vec!["-c".to_string(), body.to_string(), "sh".to_string()],
            module_dir: Some(dir.to_path_buf()),
            ..RunnerConfig::default()
        })
    }

    fn ticket() -> RunTicket {
        RunGeneration::new().next()
    }

    #[test]
    fn test_successful_run_parses_last_line() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!("echo starting; echo \"$PYTHONPATH\"; echo '{}'; echo", SNAPSHOT);
        let runner = shell_runner(dir.path(), &body);
        let output = runner.run("print(1)\n", &ticket()).unwrap();
        assert!(output.project.table("t").is_some());
        assert!(output.log.starts_with("starting\n"));
        assert!(output.log.contains(dir.path().to_str().unwrap()));
    }

    #[test]
    fn test_script_file_is_passed_as_last_argument() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!("cat \"$1\"; echo '{}'", SNAPSHOT);
        let runner = shell_runner(dir.path(), &body);
        let output = runner.run("hello from script\n", &ticket()).unwrap();
        assert_eq!(output.log, "hello from script");
    }

    #[test]
    fn test_nonzero_exit_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let runner = shell_runner(dir.path(), "echo boom >&2; exit 3");
        match runner.run("", &ticket()) {
            Err(RunError::Exit { code, stderr }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr.trim(), "boom");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_malformed_output_is_distinct_from_exit() {
        let dir = tempfile::tempdir().unwrap();
        let runner = shell_runner(dir.path(), "echo not-json");
        assert!(matches!(
            runner.run("", &ticket()),
            Err(RunError::MalformedOutput(_))
        ));
        let runner = shell_runner(dir.path(), "true");
        assert!(matches!(
            runner.run("", &ticket()),
            Err(RunError::MalformedOutput(_))
        ));
    }

    #[test]
    fn test_timeout_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let runner =
            shell_runner(dir.path(), "exec sleep 10").with_timeout(Duration::from_millis(200));
        let started = Instant::now();
        assert!(matches!(runner.run("", &ticket()), Err(RunError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_large_output_is_drained_and_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!("head -c 200000 /dev/zero >&2; echo '{}'", SNAPSHOT);
        let mut runner = shell_runner(dir.path(), &body);
        runner.config.max_output_bytes = 1000;
        let output = runner.run("", &ticket()).unwrap();
        assert_eq!(output.stderr.len(), 1000);
    }

    #[test]
    fn test_superseded_run_is_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let runner = shell_runner(dir.path(), "exec sleep 10");
        let generation = RunGeneration::new();
        let ticket = generation.next();
        let bump = generation.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            bump.next();
        });
        assert!(matches!(runner.run("", &ticket), Err(RunError::Superseded)));
        handle.join().unwrap();

        // A stale ticket never spawns.
        assert!(matches!(runner.run("", &ticket), Err(RunError::Superseded)));
    }

    #[test]
    fn test_configuration_errors_fail_fast() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptRunner::new(RunnerConfig {
            interpreter: PathBuf::from("definitely-not-an-interpreter-4821"),
            module_dir: Some(dir.path().to_path_buf()),
            ..RunnerConfig::default()
        });
        assert!(matches!(runner.check(), Err(RunError::Config(_))));

        let runner = ScriptRunner::new(RunnerConfig {
            interpreter: PathBuf::from("/bin/sh"),
            module_dir: Some(dir.path().to_path_buf()),
            ..RunnerConfig::default()
        });
        let err = runner.run("", &ticket()).unwrap_err();
        assert!(err.to_string().contains("sheetscript_api"));

        let runner = ScriptRunner::new(RunnerConfig {
            interpreter: PathBuf::from("/bin/sh"),
            ..RunnerConfig::default()
        });
        assert!(matches!(runner.check(), Err(RunError::Config(_))));
    }

    #[test]
    fn test_entry_follows_helper_module() {
        let config = RunnerConfig {
            helper_module: "my_api".to_string(),
            ..RunnerConfig::default()
        };
        assert_eq!(config.entry_args(), vec!["-m", "my_api.runner"]);
        assert_eq!(
            RunnerConfig::default().entry_args(),
            vec!["-m", "sheetscript_api.runner"]
        );
    }

    #[test]
    fn test_configured_helper_module_is_checked_and_exported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("my_api.py"), "").unwrap();
        let runner = ScriptRunner::new(RunnerConfig {
            interpreter: PathBuf::from("/bin/sh"),
            entry: vec!["-c".to_string(), format!("echo '{}'", SNAPSHOT), "sh".to_string()],
            module_dir: Some(dir.path().to_path_buf()),
            helper_module: "my_api".to_string(),
            ..RunnerConfig::default()
        });
        assert!(runner.run("", &ticket()).is_ok());
    }

    #[test]
    fn test_generation_invalidates_older_tickets() {
        let generation = RunGeneration::new();
        let first = generation.next();
        assert!(first.is_current());
        let second = generation.next();
        assert!(!first.is_current());
        assert!(second.is_current());
        assert_eq!(generation.current(), second.generation());
    }
}

//! Integration tests for the sheetscript command-line front end

use std::fs;
use std::path::Path;
use std::process::Command;

const MARKER: &str = "# --- sheetscript generated log (rebuilt on every edit) ---";

const SNAPSHOT: &str = r#"{"sheets":[{"id":"sheet_1","name":"Sheet 1","tables":[{"id":"table_1","name":"Table 1","gridSpec":{"bodyRows":1,"bodyCols":3},"cellValues":{"body[A0]":{"type":"number","value":1},"body[B0]":{"type":"number","value":2}},"formulas":{"body[C0]":{"formula":"=SUM(A0:B0)","mode":"spreadsheet"}}}]}]}"#;

fn run_command(args: &[&str], config_home: &Path) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_sheetscript"))
        // Tests must not depend on a user's config.toml.
        .env("XDG_CONFIG_HOME", config_home)
        .env("HOME", config_home)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code().unwrap_or(-1);

    (stdout, stderr, exit_code)
}

fn write(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_normalize_hoists_data() {
    let dir = tempfile::tempdir().unwrap();
    let log = write(
        dir.path(),
        "log.py",
        "proj.add_table('sheet_1', table_id='t', name='T', rows=2, cols=2)\n\
         t = proj.table('t')\n\
         with table_context(t):\n    b0 = a0 * 2\n\
         t = proj.table('t')\n\
         with table_context(t):\n    a0 = 1\n",
    );
    let (stdout, _, code) = run_command(&["normalize", &log], dir.path());
    assert_eq!(code, 0);
    assert_eq!(
        stdout,
        "t = proj.add_table('sheet_1', table_id='t', name='T', rows=2, cols=2)\n\
         with table_context(t):\n    a0 = 1\n\
         with table_context(t):\n    b0 = a0 * 2\n"
    );
}

#[test]
fn test_compose_without_marker_keeps_user_text() {
    let dir = tempfile::tempdir().unwrap();
    let script = write(dir.path(), "script.py", "print('mine')\n");
    let log = write(dir.path(), "log.py", "proj.add_sheet('S', sheet_id='s')\n");
    let (stdout, _, code) = run_command(&["compose", &script, &log], dir.path());
    assert_eq!(code, 0);
    assert_eq!(
        stdout,
        format!("print('mine')\n{}\nproj.add_sheet('S', sheet_id='s')\n", MARKER)
    );
}

#[test]
fn test_extract_and_history_strip_aliases() {
    let dir = tempfile::tempdir().unwrap();
    let script = write(
        dir.path(),
        "script.py",
        &format!(
            "proj = Project()\n{}\nproj.add_sheet('S', sheet_id='s')\nt  =  proj.table('t')\nproj.table('t').minimize()\n",
            MARKER
        ),
    );
    let (stdout, _, code) = run_command(&["extract", &script], dir.path());
    assert_eq!(code, 0);
    assert_eq!(
        stdout,
        "proj.add_sheet('S', sheet_id='s')\nproj.table('t').minimize()\n"
    );

    let (stdout, _, code) = run_command(&["history", &script], dir.path());
    assert_eq!(code, 0);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["commands"].as_array().unwrap().len(), 2);
}

#[test]
fn test_export_snapshot_with_formulas() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write(dir.path(), "project.json", SNAPSHOT);
    let (stdout, _, code) =
        run_command(&["export", "--include-formulas", &snapshot], dir.path());
    assert_eq!(code, 0);
    assert!(stdout.starts_with("import numpy as np\n"));
    assert!(stdout.contains("body[0, 2] = float(np.sum(_numbers([body[0:1, 0:2]])))\n"));
    assert!(!stdout.contains("sheetscript_api"));
}

#[cfg(unix)]
#[test]
fn test_run_prints_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let package = dir.path().join("sheetscript_api");
    fs::create_dir_all(&package).unwrap();
    fs::write(package.join("__init__.py"), "").unwrap();
    let config = write(
        dir.path(),
        "config.toml",
        &format!(
            "[runner]\ninterpreter = \"/bin/sh\"\nentry = [\"-c\", \"echo '{}'\", \"sh\"]\nmodule_dir = \".\"\n",
            SNAPSHOT.replace('"', "\\\"")
        ),
    );
    let script = write(dir.path(), "model.py", "proj = Project()\n");
    let (stdout, stderr, code) = run_command(&["--config", &config, "run", &script], dir.path());
    assert_eq!(code, 0, "{}", stderr);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["sheets"][0]["tables"][0]["id"], "table_1");
}

#[cfg(unix)]
#[test]
fn test_run_failure_exits_with_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let package = dir.path().join("sheetscript_api");
    fs::create_dir_all(&package).unwrap();
    fs::write(package.join("__init__.py"), "").unwrap();
    let config = write(
        dir.path(),
        "config.toml",
        "[runner]\ninterpreter = \"/bin/sh\"\nentry = [\"-c\", \"echo NameError >&2; exit 1\", \"sh\"]\n",
    );
    let script = write(dir.path(), "model.py", "proj = Project()\n");
    let module_dir = dir.path().to_string_lossy().into_owned();
    let (_, stderr, code) = run_command(
        &["--config", &config, "--module-dir", &module_dir, "run", &script],
        dir.path(),
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("NameError"));
}

#[test]
fn test_new_uses_configured_helper_module() {
    let dir = tempfile::tempdir().unwrap();
    let config = write(dir.path(), "config.toml", "[runner]\nhelper_module = \"my_api\"\n");
    let script = dir.path().join("model.py");
    let script_arg = script.to_string_lossy().into_owned();
    let (_, stderr, code) = run_command(&["--config", &config, "new", &script_arg], dir.path());
    assert_eq!(code, 0, "{}", stderr);
    let text = fs::read_to_string(&script).unwrap();
    assert!(text.starts_with("import numpy as np\nfrom my_api import *\n"));
    assert!(text.contains(MARKER));
    assert!(dir.path().join("model.history.json").exists());

    let (_, stderr, code) = run_command(&["new", &script_arg], dir.path());
    assert_eq!(code, 1);
    assert!(stderr.contains("already exists"));
}

#[test]
fn test_bad_config_is_logged_as_warning() {
    let dir = tempfile::tempdir().unwrap();
    let config = write(dir.path(), "config.toml", "[runner]\nbogus = 1\n");
    let script = dir.path().join("fresh.py").to_string_lossy().into_owned();
    let (_, stderr, code) = run_command(&["--config", &config, "new", &script], dir.path());
    assert_eq!(code, 0, "{}", stderr);
    assert!(stderr.contains("Failed to parse"), "{}", stderr);
    let text = fs::read_to_string(dir.path().join("fresh.py")).unwrap();
    assert!(text.contains("from sheetscript_api import *"));
}

#[test]
fn test_unknown_command_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_command(&["frobnicate"], dir.path());
    assert_eq!(code, 1);
    assert!(stderr.contains("Unknown command"));
}

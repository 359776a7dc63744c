//! sheetscript - command-line front end for the script pipeline

mod config;

use anyhow::{Context, Result, bail};
use sheetscript_core::{
    Document, ExportOptions, History, Project, RunnerConfig, ScriptRunner, compose, export_script,
    extract_generated_region, normalize_text,
};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn print_usage() {
    eprintln!("Usage: sheetscript [OPTIONS] <COMMAND> [ARGS]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  new <SCRIPT>                Write an empty script and its history");
    eprintln!("  normalize <LOG>             Print the canonical form of a command log");
    eprintln!("  compose <SCRIPT> <LOG>      Replace the generated region of SCRIPT with LOG");
    eprintln!("  extract <SCRIPT>            Print the generated region without aliases");
    eprintln!("  history <SCRIPT>            Print the history JSON rebuilt from SCRIPT");
    eprintln!("  run <SCRIPT>                Execute SCRIPT and print the project snapshot");
    eprintln!("  export <SCRIPT|SNAPSHOT>    Print a self-contained NumPy script");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <FILE>             Read settings from FILE instead of the user config");
    eprintln!("  --timeout <SECS>            Run timeout in seconds");
    eprintln!("  --module-dir <DIR>          Directory containing the helper module");
    eprintln!("  --include-formulas          (export) Rebuild and apply formulas");
    eprintln!("  --no-labels                 (export) Leave out label arrays");
    eprintln!("  -h, --help                  Print help");
}

#[derive(Default)]
struct Options {
    config_file: Option<PathBuf>,
    timeout: Option<u64>,
    module_dir: Option<PathBuf>,
    export: ExportOptions,
    positional: Vec<String>,
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn runner_config(options: &Options) -> RunnerConfig {
    let (mut config, warnings) = config::load_config(options.config_file.as_deref());
    for warning in warnings {
        log::warn!("{}", warning);
    }
    if let Some(dir) = options.module_dir.clone() {
        config.module_dir = Some(dir);
    }
    if let Some(secs) = options.timeout {
        config.timeout_secs = secs;
    }
    config
}

fn runner(options: &Options) -> ScriptRunner {
    ScriptRunner::new(runner_config(options))
}

/// Execute a script file and return the resulting project.
fn run_script(path: &Path, options: &Options) -> Result<Project> {
    let runner = runner(options);
    let mut doc = Document::load_file(path)?;
    let ticket = doc.begin_run();
    let result = runner.run(doc.script(), &ticket);
    if let Ok(output) = &result
        && !output.stderr.is_empty()
    {
        eprint!("{}", output.stderr);
    }
    doc.apply_run_result(&ticket, result)?;
    Ok(doc.project)
}

fn positional<'a>(command: &str, args: &'a [String], n: usize) -> Result<&'a Path> {
    match args.get(n) {
        Some(a) => Ok(Path::new(a)),
        None => bail!("{} requires {} argument(s)", command, n + 1),
    }
}

fn dispatch(command: &str, args: &[String], options: &Options) -> Result<()> {
    let arg = |n: usize| positional(command, args, n);
    log::debug!("running {} with {} argument(s)", command, args.len());
    match command {
        "new" => {
            let path = arg(0)?;
            if path.exists() {
                bail!("{} already exists", path.display());
            }
            let config = runner_config(options);
            let mut doc = Document::with_helper_module(&config.helper_module);
            doc.save_file(Some(path))?;
        }
        "normalize" => {
            print!("{}", normalize_text(&read_text(arg(0)?)?));
        }
        "compose" => {
            let script = read_text(arg(0)?)?;
            let generated = normalize_text(&read_text(arg(1)?)?);
            print!("{}", compose(&script, &generated));
        }
        "extract" => {
            print!("{}", extract_generated_region(&read_text(arg(0)?)?));
        }
        "history" => {
            println!("{}", History::from_script(&read_text(arg(0)?)?).to_json()?);
        }
        "run" => {
            let project = run_script(arg(0)?, options)?;
            println!("{}", project.to_snapshot_json()?);
        }
        "export" => {
            let path = arg(0)?;
            let project = if path.extension().is_some_and(|e| e == "json") {
                Project::from_snapshot_json(&read_text(path)?)?
            } else {
                run_script(path, options)?
            };
            print!("{}", export_script(&project, &options.export));
        }
        other => bail!("Unknown command: {}", other),
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();
    let mut options = Options::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                return;
            }
            "--config" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a file path");
                    std::process::exit(1);
                }
                options.config_file = Some(PathBuf::from(&args[i]));
            }
            "--module-dir" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --module-dir requires a directory");
                    std::process::exit(1);
                }
                options.module_dir = Some(PathBuf::from(&args[i]));
            }
            "--timeout" => {
                i += 1;
                match args.get(i).and_then(|s| s.parse::<u64>().ok()) {
                    Some(secs) if secs > 0 => options.timeout = Some(secs),
                    _ => {
                        eprintln!("Error: --timeout requires a positive number of seconds");
                        std::process::exit(1);
                    }
                }
            }
            "--include-formulas" => options.export.include_formulas = true,
            "--no-labels" => options.export.include_labels = false,
            arg if arg.starts_with('-') => {
                eprintln!("Error: Unknown option: {}", arg);
                print_usage();
                std::process::exit(1);
            }
            _ => options.positional.push(args[i].clone()),
        }
        i += 1;
    }

    let Some((command, rest)) = options.positional.split_first() else {
        print_usage();
        std::process::exit(1);
    };

    if let Err(e) = dispatch(command, rest, &options) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

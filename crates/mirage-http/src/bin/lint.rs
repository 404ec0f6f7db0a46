//! Mirage Configuration Linter CLI
//!
//! Validates configuration documents offline, running the same decoding,
//! compilation and route binding the server performs on submission.
//!
//! Usage:
//!   mirage-lint <file_or_directory>... [OPTIONS]

use clap::Parser;
use mirage_http::dispatch::RouteTable;
use mirage_http::document::{self, ConfigurationSet};
use mirage_http::registry::{compile_configuration, CompiledConfiguration, Registry};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

const EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Mirage Configuration Linter
#[derive(Parser, Debug)]
#[command(name = "mirage-lint")]
#[command(author, version, about = "Validate Mirage configuration documents")]
struct Args {
    /// Configuration files or directories containing them
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Output format: text (default), json
    #[arg(short, long, default_value = "text")]
    output: String,

    /// Strict mode - treat warnings as errors
    #[arg(short, long)]
    strict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Serialize)]
struct LintIssue {
    severity: Severity,
    code: &'static str,
    file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    configuration: Option<String>,
    message: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct LintResult {
    files_checked: usize,
    errors: usize,
    warnings: usize,
    issues: Vec<LintIssue>,
}

impl LintResult {
    fn add(
        &mut self,
        severity: Severity,
        code: &'static str,
        file: &Path,
        configuration: Option<&str>,
        message: impl Into<String>,
    ) {
        match severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
        }
        self.issues.push(LintIssue {
            severity,
            code,
            file: file.to_path_buf(),
            configuration: configuration.map(str::to_string),
            message: message.into(),
        });
    }
}

fn main() {
    let args = Args::parse();
    let text = args.output != "json";

    if text {
        println!("{BOLD}{CYAN}Mirage Configuration Linter{RESET}");
        println!("{DIM}━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━{RESET}");
    }

    let files = collect_files(&args.paths);
    if files.is_empty() {
        if text {
            println!("{YELLOW}Warning:{RESET} No configuration files found");
        }
        std::process::exit(0);
    }

    let result = lint_files(&files);

    if text {
        print_results(&result);
    } else {
        match serde_json::to_string_pretty(&result) {
            Ok(output) => println!("{output}"),
            Err(e) => eprintln!("failed to encode results: {e}"),
        }
    }

    let has_errors = result.errors > 0 || (args.strict && result.warnings > 0);
    std::process::exit(if has_errors { 1 } else { 0 });
}

fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let has_extension = |path: &Path| {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| EXTENSIONS.contains(&ext))
    };

    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            if let Ok(entries) = std::fs::read_dir(path) {
                for entry in entries.flatten() {
                    let entry_path = entry.path();
                    if entry_path.is_file() && has_extension(&entry_path) {
                        files.push(entry_path);
                    }
                }
            }
        }
    }

    files.sort();
    files.dedup();
    files
}

/// Decode and compile every file, then bind them all into one scratch
/// router, as if submitted to one server in file order.
fn lint_files(files: &[PathBuf]) -> LintResult {
    let mut result = LintResult {
        files_checked: files.len(),
        ..Default::default()
    };
    let registry = Registry::new();
    let routes = RouteTable::new();
    let mut declared_in: HashMap<String, PathBuf> = HashMap::new();

    for file in files {
        let set = match document::from_file(file) {
            Ok(set) => set,
            Err(e) => {
                result.add(Severity::Error, "E001", file, None, e.to_string());
                continue;
            }
        };

        check_bodies(file, &set, &mut result);

        let mut compiled: Vec<CompiledConfiguration> = Vec::new();
        for (name, configuration) in &set {
            match compile_configuration(name, configuration) {
                Ok(configuration) => compiled.push(configuration),
                Err(e) => result.add(Severity::Error, "E002", file, Some(name.as_str()), e.to_string()),
            }

            if let Some(previous) = declared_in.insert(name.clone(), file.clone()) {
                result.add(
                    Severity::Warning,
                    "W002",
                    file,
                    Some(name.as_str()),
                    format!(
                        "configuration also declared in {}; the later submission overwrites it",
                        previous.display()
                    ),
                );
            }
        }

        if compiled.len() == set.len() {
            if let Err(e) = registry.register_all(compiled, &routes) {
                result.add(Severity::Error, "E003", file, None, e.to_string());
            }
        }
    }

    result
}

fn check_bodies(file: &Path, set: &ConfigurationSet, result: &mut LintResult) {
    for (name, configuration) in set {
        for (path, methods) in &configuration.paths {
            for (method, response) in methods {
                if response.body.is_some() && response.body_template.is_some() {
                    result.add(
                        Severity::Warning,
                        "W001",
                        file,
                        Some(name.as_str()),
                        format!("{method} {path} sets both body and bodyTemplate; the template wins"),
                    );
                }
            }
        }
    }
}

fn print_results(result: &LintResult) {
    println!("{DIM}Found:{RESET}    {BOLD}{}{RESET} file(s)\n", result.files_checked);

    if result.issues.is_empty() {
        println!("{GREEN}{BOLD}No issues found!{RESET}");
    }

    let mut by_file: Vec<(&PathBuf, Vec<&LintIssue>)> = Vec::new();
    for issue in &result.issues {
        match by_file.iter_mut().find(|(file, _)| *file == &issue.file) {
            Some((_, issues)) => issues.push(issue),
            None => by_file.push((&issue.file, vec![issue])),
        }
    }

    for (file, issues) in by_file {
        let failed = issues.iter().any(|i| i.severity == Severity::Error);
        let status = if failed {
            format!("{RED}FAIL{RESET}")
        } else {
            format!("{YELLOW}WARN{RESET}")
        };
        println!("{status} {BOLD}{CYAN}{}{RESET}", file.display());

        for issue in issues {
            let color = match issue.severity {
                Severity::Error => RED,
                Severity::Warning => YELLOW,
            };
            let label = match issue.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
            };
            let scope = issue
                .configuration
                .as_ref()
                .map(|c| format!("{DIM}[{RESET}{CYAN}{c}{RESET}{DIM}]{RESET} "))
                .unwrap_or_default();
            println!(
                "  {color}|{RESET} {scope}{BOLD}{color}{label}{RESET}: {} {DIM}({}){RESET}",
                issue.message, issue.code
            );
        }
        println!();
    }

    println!("{DIM}━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━{RESET}");
    println!("  {DIM}Files checked:{RESET} {BOLD}{}{RESET}", result.files_checked);
    if result.errors > 0 {
        println!("  {RED}Errors:{RESET}    {BOLD}{RED}{}{RESET}", result.errors);
    } else {
        println!("  {GREEN}Errors:{RESET}    {BOLD}{GREEN}0{RESET}");
    }
    if result.warnings > 0 {
        println!("  {YELLOW}Warnings:{RESET}  {BOLD}{YELLOW}{}{RESET}", result.warnings);
    } else {
        println!("  {DIM}Warnings:{RESET}  {BOLD}0{RESET}");
    }
    println!();

    if result.errors == 0 && result.warnings == 0 {
        println!("{GREEN}{BOLD}All checks passed!{RESET}");
    } else if result.errors == 0 {
        println!("{YELLOW}{BOLD}Passed with warnings{RESET}");
    } else {
        println!("{RED}{BOLD}Linting failed with errors{RESET}");
    }
}

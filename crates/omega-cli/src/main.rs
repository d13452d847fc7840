use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use omega_eval::{Engine, Value};
use omega_parser::{
    FileValidation, RuleSet, ValidationResult, load_rules, parse_rule_file,
    validate_rule_directory, validate_rule_file,
};

#[derive(Parser)]
#[command(name = "omega")]
#[command(about = "Parse, validate, and evaluate omega detection rules")]
#[command(version)]
struct Cli {
    /// Log debug diagnostics to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a single rule file and print the typed rule as JSON
    Parse {
        /// Path to a rule YAML file
        path: PathBuf,

        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Validate a rule file or every rule in a directory (recursive)
    Validate {
        /// Path to a rule file or a directory of rules
        path: PathBuf,
    },

    /// Parse a condition expression and print the AST
    Condition {
        /// The condition expression to parse
        expr: String,
    },

    /// Evaluate documents against rules
    ///
    /// Load rules from a file or directory, then evaluate JSON documents.
    /// Documents can be provided as a single JSON string (--event) or as
    /// NDJSON (newline-delimited JSON) from stdin.
    Eval {
        /// Path to a rule file or directory of rules
        #[arg(short, long, env = "OMEGA_RULES")]
        rules: PathBuf,

        /// A single document as a JSON string (if omitted, reads NDJSON from stdin)
        #[arg(short, long)]
        event: Option<String>,

        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match cli.command {
        Commands::Parse { path, pretty } => cmd_parse(path, pretty),
        Commands::Validate { path } => cmd_validate(path),
        Commands::Condition { expr } => cmd_condition(expr),
        Commands::Eval {
            rules,
            event,
            pretty,
        } => cmd_eval(rules, event, pretty),
    }
}

fn init_logger(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_parse(path: PathBuf, pretty: bool) {
    match parse_rule_file(&path) {
        Ok(rule) => print_json(&rule, pretty),
        Err(e) => {
            eprintln!("Error parsing {}: {e}", path.display());
            process::exit(1);
        }
    }
}

fn cmd_validate(path: PathBuf) {
    let files = if path.is_dir() {
        validate_rule_directory(&path)
    } else {
        validate_rule_file(&path).map(|result| {
            vec![FileValidation {
                path: path.clone(),
                result,
            }]
        })
    };

    let files = match files {
        Ok(files) => files,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let mut invalid = 0usize;
    for file in &files {
        print_validation(&file.path, &file.result);
        if !file.result.is_valid() {
            invalid += 1;
        }
    }

    println!(
        "Validated {} files: {} valid, {invalid} invalid",
        files.len(),
        files.len() - invalid
    );

    if invalid > 0 {
        process::exit(1);
    }
}

fn cmd_condition(expr: String) {
    match omega_parser::parse_condition(&expr) {
        Ok(ast) => print_json(&ast, true),
        Err(e) => {
            eprintln!("Condition parse error: {e}");
            process::exit(1);
        }
    }
}

fn cmd_eval(rules_path: PathBuf, event_json: Option<String>, pretty: bool) {
    let set = load_rule_set(&rules_path);

    let mut engine = Engine::new();
    let failures = engine.add_rule_set(&set);
    for (key, e) in &failures {
        eprintln!("Error compiling rule '{key}': {e}");
    }
    if engine.is_empty() {
        eprintln!("No usable rules in {}", rules_path.display());
        process::exit(1);
    }

    log::info!(
        "loaded {} rules from {}",
        engine.len(),
        rules_path.display()
    );

    if let Some(json_str) = event_json {
        let doc = match serde_json::from_str::<serde_json::Value>(&json_str) {
            Ok(v) => Value::from(v),
            Err(e) => {
                eprintln!("Invalid JSON event: {e}");
                process::exit(1);
            }
        };

        let matches = engine.evaluate(&doc);
        if matches.is_empty() {
            eprintln!("No matches.");
        } else {
            for m in &matches {
                print_json(&m.to_match_result(), pretty);
            }
        }
    } else {
        let stdin = io::stdin();
        let mut line_num = 0u64;
        let mut match_count = 0u64;

        for line in stdin.lock().lines() {
            line_num += 1;
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    eprintln!("Error reading line {line_num}: {e}");
                    continue;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            let doc = match serde_json::from_str::<serde_json::Value>(&line) {
                Ok(v) => Value::from(v),
                Err(e) => {
                    eprintln!("Invalid JSON on line {line_num}: {e}");
                    continue;
                }
            };

            for m in &engine.evaluate(&doc) {
                match_count += 1;
                print_json(&m.to_match_result(), pretty);
            }
        }

        eprintln!("Processed {line_num} events, {match_count} matches.");
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_rule_set(path: &Path) -> RuleSet {
    let set = match load_rules(path) {
        Ok(set) => set,
        Err(e) => {
            eprintln!("Error loading rules from {}: {e}", path.display());
            process::exit(1);
        }
    };

    if !set.errors.is_empty() {
        eprintln!("Warning: {} rules rejected while loading:", set.errors.len());
        for err in &set.errors {
            eprintln!("  - {err}");
        }
    }

    set
}

fn print_validation(path: &Path, result: &ValidationResult) {
    let status = if result.is_valid() { "valid" } else { "invalid" };
    println!("{}: {status}", path.display());
    for err in result.errors() {
        println!("  error: {err}");
    }
    for warning in result.warnings() {
        println!("  warning: {warning}");
    }
}

fn print_json(value: &impl serde::Serialize, pretty: bool) {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match json {
        Ok(j) => println!("{j}"),
        Err(e) => {
            eprintln!("JSON serialization error: {e}");
            process::exit(1);
        }
    }
}

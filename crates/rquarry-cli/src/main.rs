use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rquarry_engine::{CompileOptions, EvalError, Registry, Verdict};
use rquarry_rules::{
    RuleSet, SizeLiteral, UnitBasis, builtin_rule_set, parse_condition, parse_rules_directory,
    parse_rules_file,
};

#[derive(Parser)]
#[command(name = "rquarry")]
#[command(about = "Compile and evaluate byte-pattern detection rules")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a file or directory against a rule set
    ///
    /// Each candidate file is read wholly into memory and evaluated
    /// against every rule; flagged rules are printed with the pattern
    /// identifiers that matched.
    Scan {
        /// Path to a candidate file or directory
        path: PathBuf,

        /// Path to a rule file or directory (defaults to the built-in rules)
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Skip files larger than this size (e.g. 10MB, 512000)
        #[arg(long, default_value = "10MB")]
        max_filesize: String,

        /// Per-rule scan timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Resolve size units with decimal (1000-based) multipliers
        #[arg(long)]
        si: bool,

        /// Print JSON instead of human-readable lines
        #[arg(long)]
        json: bool,

        /// Report unflagged rules too
        #[arg(short, long)]
        all: bool,
    },

    /// Parse and compile rules, reporting any errors
    Validate {
        /// Path to a rule file or directory
        path: PathBuf,

        /// Show per-rule details, not just the summary
        #[arg(short, long)]
        verbose: bool,
    },

    /// Parse a condition expression and print the AST
    Condition {
        /// The condition expression to parse
        expr: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            path,
            rules,
            max_filesize,
            timeout_ms,
            si,
            json,
            all,
        } => cmd_scan(path, rules, max_filesize, timeout_ms, si, json, all),
        Commands::Validate { path, verbose } => cmd_validate(path, verbose),
        Commands::Condition { expr } => cmd_condition(expr),
    }
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
fn cmd_scan(
    path: PathBuf,
    rules: Option<PathBuf>,
    max_filesize: String,
    timeout_ms: Option<u64>,
    si: bool,
    json: bool,
    all: bool,
) {
    let basis = if si {
        UnitBasis::Decimal
    } else {
        UnitBasis::Binary
    };

    let max_bytes = match SizeLiteral::parse(&max_filesize) {
        Ok(lit) => lit.resolve(basis),
        Err(e) => {
            eprintln!("Invalid --max-filesize: {e}");
            process::exit(1);
        }
    };

    let registry = load_registry(rules.as_deref(), basis);
    let targets = collect_targets(&path, max_bytes);
    let timeout = timeout_ms.map(Duration::from_millis);

    let mut reports = Vec::new();
    let mut detections = 0usize;
    let mut scanned = 0usize;

    for target in &targets {
        let buffer = match fs::read(target) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("Error reading {}: {e}", target.display());
                continue;
            }
        };
        scanned += 1;
        let file_size = buffer.len() as u64;

        let outcomes: Vec<Result<Verdict, EvalError>> = match timeout {
            Some(t) => registry.evaluate_all_with_timeout(&buffer, file_size, t),
            None => registry
                .evaluate_all(&buffer, file_size)
                .into_iter()
                .map(Ok)
                .collect(),
        };

        for outcome in &outcomes {
            match outcome {
                Ok(v) if v.flagged => detections += 1,
                _ => {}
            }
        }

        if json {
            reports.push(file_report(target, &outcomes));
        } else {
            print_outcomes(target, &outcomes, all);
        }
    }

    if json {
        print_json(&reports, true);
    } else {
        println!("{scanned} file(s) scanned, {detections} detection(s)");
    }
}

fn cmd_validate(path: PathBuf, verbose: bool) {
    let set = load_rule_set(Some(&path));

    println!("Parsed {} rule(s) from {}", set.len(), path.display());
    for err in &set.errors {
        println!("  parse error: {err}");
    }

    let registry = match Registry::from_rule_set(&set) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    };

    println!("  Compiled OK: {}", registry.rule_count());
    println!("  Skipped:     {}", registry.skipped().len());
    for (_, err) in registry.skipped() {
        println!("  compile error: {err}");
    }

    if verbose {
        for rule in registry.rules() {
            println!(
                "  {} ({} patterns): {}",
                rule.name,
                rule.patterns.len(),
                rule.condition_string
            );
        }
    }

    if !set.errors.is_empty() || !registry.skipped().is_empty() {
        process::exit(1);
    }
}

fn cmd_condition(expr: String) {
    match parse_condition(&expr) {
        Ok(ast) => {
            println!("{ast}");
            print_json(&ast, true);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Rule and target loading
// ---------------------------------------------------------------------------

fn load_rule_set(rules: Option<&Path>) -> RuleSet {
    match rules {
        None => builtin_rule_set(),
        Some(path) => {
            let result = if path.is_dir() {
                parse_rules_directory(path)
            } else {
                parse_rules_file(path)
            };
            match result {
                Ok(set) => set,
                Err(e) => {
                    eprintln!("Error reading rules from {}: {e}", path.display());
                    process::exit(2);
                }
            }
        }
    }
}

fn load_registry(rules: Option<&Path>, basis: UnitBasis) -> Registry {
    let set = load_rule_set(rules);
    for err in &set.errors {
        eprintln!("warning: {err}");
    }

    let options = CompileOptions { unit_basis: basis };
    let registry = match Registry::load_with(&set.rules, options) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Error loading rules: {e}");
            process::exit(2);
        }
    };
    for (_, err) in registry.skipped() {
        eprintln!("warning: skipping rule: {err}");
    }
    if registry.rule_count() == 0 {
        eprintln!("Error: no rules loaded");
        process::exit(2);
    }
    registry
}

fn collect_targets(path: &Path, max_bytes: u64) -> Vec<PathBuf> {
    fn walk(dir: &Path, max_bytes: u64, out: &mut Vec<PathBuf>) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                eprintln!("Error reading {}: {e}", dir.display());
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, max_bytes, out);
            } else {
                push_candidate(&path, max_bytes, out);
            }
        }
    }

    fn push_candidate(path: &Path, max_bytes: u64, out: &mut Vec<PathBuf>) {
        match fs::metadata(path) {
            Ok(meta) if meta.len() > max_bytes => {
                eprintln!(
                    "skipping {} ({} bytes exceeds --max-filesize)",
                    path.display(),
                    meta.len()
                );
            }
            Ok(_) => out.push(path.to_path_buf()),
            Err(e) => eprintln!("Error reading {}: {e}", path.display()),
        }
    }

    let mut targets = Vec::new();
    if path.is_dir() {
        walk(path, max_bytes, &mut targets);
    } else if path.is_file() {
        push_candidate(path, max_bytes, &mut targets);
    } else {
        eprintln!("Error: {} is not a file or directory", path.display());
        process::exit(1);
    }
    // Directory iteration order is platform-dependent.
    targets.sort();
    targets
}

// ---------------------------------------------------------------------------
// Output rendering
// ---------------------------------------------------------------------------

fn print_outcomes(target: &Path, outcomes: &[Result<Verdict, EvalError>], all: bool) {
    for outcome in outcomes {
        match outcome {
            Ok(v) if v.flagged => {
                let matched: Vec<String> =
                    v.matched_patterns.iter().map(|id| format!("${id}")).collect();
                println!("{} {} [{}]", v.rule_name, target.display(), matched.join(", "));
            }
            Ok(v) if all => {
                println!("{} {} (not flagged)", v.rule_name, target.display());
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("inconclusive: {e} ({})", target.display());
            }
        }
    }
}

fn file_report(target: &Path, outcomes: &[Result<Verdict, EvalError>]) -> serde_json::Value {
    let verdicts: Vec<serde_json::Value> = outcomes
        .iter()
        .map(|outcome| match outcome {
            Ok(v) => serde_json::json!({
                "rule_name": v.rule_name,
                "flagged": v.flagged,
                "matched_patterns": v.matched_patterns,
            }),
            Err(e) => serde_json::json!({
                "inconclusive": true,
                "reason": e.to_string(),
            }),
        })
        .collect();

    serde_json::json!({
        "path": target.display().to_string(),
        "verdicts": verdicts,
    })
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) {
    let result = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match result {
        Ok(s) => println!("{s}"),
        Err(e) => {
            eprintln!("Error serializing output: {e}");
            process::exit(1);
        }
    }
}

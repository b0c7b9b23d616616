//! hashgen - Command-line front end for the hash engine.
//!
//! Resolves the algorithm, file and compute-now flag from the command line,
//! watches the file while it is hashed and prints progress to stderr and the
//! digest to stdout.

mod logging;

use clap::Parser;
use crossbeam_channel::select;
use hashgen_engine::{
    ChecksumValue, DigestRegistry, EngineConfig, FileWatcher, HashEngine, HashSignal, WatchSignal,
    DEFAULT_STEPS,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// hashgen - compute a file digest with progress
#[derive(Parser, Debug)]
#[command(name = "hashgen")]
#[command(version = "0.1.0")]
#[command(about = "Compute a file digest with progress, watching the file for changes")]
struct Args {
    /// Digest algorithm (see --list); defaults to the first supported one
    #[arg(short = 'a', long, value_name = "NAME")]
    algorithm: Option<String>,

    /// File to hash
    #[arg(short = 'f', long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Compute immediately instead of only validating the inputs
    #[arg(short = 'c', long)]
    compute: bool,

    /// Number of progress steps
    #[arg(short = 's', long, value_name = "N", default_value_t = DEFAULT_STEPS)]
    steps: u32,

    /// Expected digest to compare against (case-insensitive)
    #[arg(long, value_name = "HEX")]
    expect: Option<String>,

    /// List supported algorithms and exit
    #[arg(long)]
    list: bool,

    /// Read buffer size in bytes
    #[arg(long, value_name = "BYTES")]
    buffer_size: Option<usize>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// What a successful invocation did.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    /// Printed the algorithm list
    Listed,
    /// Inputs are valid; nothing was computed
    Ready,
    /// Digest computed; `matched` is set when an expected value was given
    Computed {
        value: ChecksumValue,
        matched: Option<bool>,
    },
}

/// Inputs resolved against the registry.
#[derive(Debug, PartialEq, Eq)]
struct Launch {
    algorithm: String,
    file: PathBuf,
    compute_now: bool,
}

/// Stderr progress display.
struct CliProgress {
    steps: u32,
    start_time: Instant,
}

impl CliProgress {
    fn new(steps: u32) -> Self {
        CliProgress {
            steps,
            start_time: Instant::now(),
        }
    }

    fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }

    fn format_duration(elapsed: std::time::Duration) -> String {
        let secs = elapsed.as_secs();
        let mins = secs / 60;
        let secs = secs % 60;

        if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{:.2}s", elapsed.as_secs_f64())
        }
    }

    /// `[=====     ] 5/10`, twenty columns wide whatever the step count.
    fn progress_bar(step: u32, steps: u32) -> String {
        let steps = steps.max(1);
        let filled = (u64::from(step.min(steps)) * 20 / u64::from(steps)) as usize;
        format!(
            "[{}{}] {}/{}",
            "=".repeat(filled),
            " ".repeat(20 - filled),
            step,
            steps
        )
    }

    fn on_started(&self, algorithm: &str, path: &Path) {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        eprintln!(
            "Hashing {} ({}) with {}",
            path.display(),
            Self::format_bytes(size),
            algorithm
        );
    }

    fn on_progress(&self, step: u32) {
        eprint!("\rProgress: {}", Self::progress_bar(step, self.steps));
        let _ = std::io::stderr().flush();
    }

    fn on_renamed(&self, path: &Path) {
        eprintln!();
        eprintln!("File renamed to {}", path.display());
    }

    fn on_finished(&self) {
        eprintln!();
        eprintln!("Elapsed: {}", Self::format_duration(self.start_time.elapsed()));
    }
}

/// Parse arguments, set up logging, then run
fn main() {
    let args = Args::parse();

    if let Err(msg) = logging::init_logging(args.verbose) {
        eprintln!("{}", msg);
    }

    let exit_code = match run_cli(&args) {
        Ok(Outcome::Computed {
            matched: Some(false),
            ..
        }) => 1,
        Ok(_) => 0,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args) -> Result<Outcome, String> {
    let registry = DigestRegistry::builtin();

    if args.list {
        for name in registry.supported_algorithms() {
            if name == registry.default_algorithm() {
                println!("{} (default)", name);
            } else {
                println!("{}", name);
            }
        }
        return Ok(Outcome::Listed);
    }

    let launch = resolve_launch(args, &registry)?;

    if args.steps < 1 {
        return Err("The progress step count must be higher than 0".to_string());
    }

    if let Some(expected) = &args.expect {
        validate_expected(expected, &launch.algorithm, &registry)?;
    }

    if !launch.compute_now {
        println!(
            "Ready: {} {} (pass --compute to start)",
            launch.algorithm,
            launch.file.display()
        );
        return Ok(Outcome::Ready);
    }

    let mut config = EngineConfig::default();
    if let Some(buffer_size) = args.buffer_size {
        config = config.with_buffer_size(buffer_size);
    }
    let engine = HashEngine::with_config(registry, config);
    let mut watcher = FileWatcher::new();
    let progress = CliProgress::new(args.steps);

    let value = compute(&engine, &mut watcher, &launch, args.steps, &progress)?;
    let matched = args.expect.as_deref().map(|expected| value.matches(expected));

    if args.json {
        println!("{}", json_report(&value, &launch.file, matched)?);
    } else {
        println!("{}  {}", value.hex(), launch.file.display());
        match matched {
            Some(true) => println!("MATCH"),
            Some(false) => println!("MISMATCH"),
            None => {}
        }
    }

    Ok(Outcome::Computed { value, matched })
}

/// `{"algorithm", "digest", "file", "matches"}` for `--json`.
fn json_report(
    value: &ChecksumValue,
    file: &Path,
    matched: Option<bool>,
) -> Result<serde_json::Value, String> {
    let mut report = serde_json::to_value(value)
        .map_err(|e| format!("Failed to serialize result: {}", e))?;
    if let Some(fields) = report.as_object_mut() {
        fields.insert("file".to_string(), file.display().to_string().into());
        fields.insert("matches".to_string(), serde_json::json!(matched));
    }
    Ok(report)
}

/// Apply defaults and validate algorithm and file.
fn resolve_launch(args: &Args, registry: &DigestRegistry) -> Result<Launch, String> {
    let algorithm = args
        .algorithm
        .clone()
        .unwrap_or_else(|| registry.default_algorithm().to_string());

    if !registry.exists(&algorithm) {
        let names: Vec<_> = registry.supported_algorithms().collect();
        return Err(format!(
            "Unknown hash algorithm '{}'. Must be one of: {}",
            algorithm,
            names.join(", ")
        ));
    }

    let file = args
        .file
        .clone()
        .ok_or_else(|| "No file given (use --file <PATH>)".to_string())?;

    if !file.is_file() {
        return Err(format!("File does not exist: {}", file.display()));
    }

    Ok(Launch {
        algorithm,
        file,
        compute_now: args.compute,
    })
}

fn validate_expected(
    expected: &str,
    algorithm: &str,
    registry: &DigestRegistry,
) -> Result<(), String> {
    let expected = expected.trim();
    if expected.is_empty() || !expected.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("Expected digest is not a hex string: '{}'", expected));
    }
    if let Some(entry) = registry.entry(algorithm) {
        if expected.len() != entry.output_len() * 2 {
            return Err(format!(
                "Expected digest has {} hex digits; {} produces {}",
                expected.len(),
                algorithm,
                entry.output_len() * 2
            ));
        }
    }
    Ok(())
}

/// Run one computation while watching the file.
///
/// A deletion of the file cancels the run; a rename is reported and the
/// computation carries on with the already open file.
fn compute(
    engine: &HashEngine,
    watcher: &mut FileWatcher,
    launch: &Launch,
    steps: u32,
    progress: &CliProgress,
) -> Result<ChecksumValue, String> {
    if let Err(e) = watcher.set_target(&launch.file) {
        warn!(error = %e, "cannot watch file; continuing without change detection");
    }

    let hash_signals = engine.signals();
    let watch_signals = watcher.signals();

    let run = engine
        .start(&launch.algorithm, &launch.file, steps)
        .map_err(|e| format!("Cannot start computation: {}", e))?;
    debug!(run = %run, "computation started");
    progress.on_started(&launch.algorithm, &launch.file);

    let mut deleted = false;
    let result = loop {
        select! {
            recv(hash_signals) -> signal => {
                let Ok(signal) = signal else {
                    break Err("Hash engine stopped unexpectedly".to_string());
                };
                match signal {
                    HashSignal::ProgressChanged(step) => progress.on_progress(step),
                    HashSignal::Completed(value) => break Ok(value),
                    HashSignal::Cancelled if deleted => {
                        break Err("The file was deleted during the computation".to_string())
                    }
                    HashSignal::Cancelled => break Err("Computation cancelled".to_string()),
                    HashSignal::Failed(e) => break Err(format!("Computation failed: {}", e)),
                }
            },
            recv(watch_signals) -> signal => {
                match signal {
                    Ok(WatchSignal::Deleted) => {
                        info!("file deleted; cancelling computation");
                        deleted = true;
                        engine.cancel();
                    }
                    Ok(WatchSignal::Renamed(path)) => progress.on_renamed(&path),
                    Err(_) => {}
                }
            },
        }
    };

    watcher.clear();
    progress.on_finished();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args_for(file: Option<PathBuf>) -> Args {
        Args {
            algorithm: None,
            file,
            compute: true,
            steps: DEFAULT_STEPS,
            expect: None,
            list: false,
            buffer_size: None,
            json: false,
            verbose: 0,
        }
    }

    fn hello_file(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hello").expect("Failed to write file");
        path
    }

    #[test]
    fn test_cli_computes_default_algorithm() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let args = args_for(Some(hello_file(&dir)));

        match run_cli(&args).expect("CLI should succeed") {
            Outcome::Computed { value, matched } => {
                assert_eq!(value.algorithm(), "SHA-1");
                assert_eq!(value.hex(), "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
                assert_eq!(matched, None);
            }
            other => panic!("expected Computed, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_expect_match_and_mismatch() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut args = args_for(Some(hello_file(&dir)));
        args.algorithm = Some("MD5".to_string());
        args.buffer_size = Some(2);
        args.json = true;

        args.expect = Some("5D41402ABC4B2A76B9719D911017C592".to_string());
        assert!(matches!(
            run_cli(&args),
            Ok(Outcome::Computed {
                matched: Some(true),
                ..
            })
        ));

        args.expect = Some("00000000000000000000000000000000".to_string());
        assert!(matches!(
            run_cli(&args),
            Ok(Outcome::Computed {
                matched: Some(false),
                ..
            })
        ));
    }

    #[test]
    fn test_cli_rejects_malformed_expected_digest() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut args = args_for(Some(hello_file(&dir)));
        args.algorithm = Some("MD5".to_string());

        args.expect = Some("not-hex".to_string());
        assert!(run_cli(&args).is_err());

        args.expect = Some("abcd".to_string());
        assert!(run_cli(&args).is_err(), "wrong length for MD5");
    }

    #[test]
    fn test_cli_without_compute_flag_only_validates() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut args = args_for(Some(hello_file(&dir)));
        args.compute = false;

        assert_eq!(run_cli(&args), Ok(Outcome::Ready));
    }

    #[test]
    fn test_cli_lists_algorithms() {
        let mut args = args_for(None);
        args.list = true;
        assert_eq!(run_cli(&args), Ok(Outcome::Listed));
    }

    #[test]
    fn test_cli_rejects_unknown_algorithm() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut args = args_for(Some(hello_file(&dir)));
        args.algorithm = Some("NOPE".to_string());

        let err = run_cli(&args).expect_err("CLI should reject unknown algorithm");
        assert!(err.contains("NOPE"));
        assert!(err.contains("SHA-256"));
    }

    #[test]
    fn test_cli_rejects_missing_file() {
        let args = args_for(Some(PathBuf::from("/nonexistent/path/file.bin")));
        assert!(run_cli(&args).is_err(), "CLI should reject missing file");

        let args = args_for(None);
        assert!(run_cli(&args).is_err(), "CLI should require a file");
    }

    #[test]
    fn test_cli_rejects_zero_steps() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut args = args_for(Some(hello_file(&dir)));
        args.steps = 0;
        assert!(run_cli(&args).is_err());
    }

    #[test]
    fn test_resolve_launch_defaults() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let file = hello_file(&dir);
        let mut args = args_for(Some(file.clone()));
        args.compute = false;

        let launch = resolve_launch(&args, &DigestRegistry::builtin()).expect("should resolve");
        assert_eq!(
            launch,
            Launch {
                algorithm: "SHA-1".to_string(),
                file,
                compute_now: false,
            }
        );
    }

    #[test]
    fn test_json_report_fields() {
        let value = ChecksumValue::from_bytes("MD5", &[0xab, 0xcd]);
        let report = json_report(&value, Path::new("data.bin"), Some(true)).unwrap();

        assert_eq!(
            report,
            serde_json::json!({
                "algorithm": "MD5",
                "digest": "abcd",
                "file": "data.bin",
                "matches": true,
            })
        );

        let report = json_report(&value, Path::new("data.bin"), None).unwrap();
        assert!(report["matches"].is_null());
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(CliProgress::progress_bar(0, 20), format!("[{}] 0/20", " ".repeat(20)));
        assert_eq!(
            CliProgress::progress_bar(10, 20),
            format!("[{}{}] 10/20", "=".repeat(10), " ".repeat(10))
        );
        assert_eq!(CliProgress::progress_bar(3, 3), format!("[{}] 3/3", "=".repeat(20)));
    }
}

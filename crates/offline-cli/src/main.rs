//! Offline launcher CLI.
//!
//! Provides the `offline-launcher` binary: keep a list of executables,
//! start them detached, and block or allow their network access through the
//! host firewall.
//!
//! Configuration comes from the environment (see
//! `offline_registry::config`), overridden by the global flags below.
//! Logging goes to stderr and is filtered by `OFFLINE_LAUNCHER_LOG`, then
//! `RUST_LOG`, defaulting to `warn`.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use offline_core::{display_attribute, IconKind, ProgramRecord, ProgramStatus, StatusColor};
use offline_enforce::BackendKind;
use offline_registry::{LauncherConfig, ProgramRegistry, RegistryError, StoreKind};

const LOG_ENV: &str = "OFFLINE_LAUNCHER_LOG";

/// Exit codes.
const EXIT_OK: i32 = 0;
const EXIT_VALIDATION: i32 = 1;
const EXIT_ENFORCEMENT: i32 = 2;
const EXIT_STORAGE: i32 = 3;
const EXIT_LAUNCH: i32 = 4;

/// Launch programs and control their network access.
#[derive(Parser)]
#[command(
    name = "offline-launcher",
    about = "Launch programs and control their network access"
)]
struct Cli {
    /// Store file (overrides OFFLINE_LAUNCHER_STORE).
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Store format: json or sqlite.
    #[arg(long, global = true)]
    store_kind: Option<StoreKind>,

    /// Enforcement backend: auto, netsh, socketfilterfw or none.
    #[arg(long, global = true)]
    backend: Option<BackendKind>,

    /// Timeout for a single firewall command, in seconds.
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Show tracked programs.
    List {
        /// Print machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Track one or more executables.
    Add {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Stop tracking the program at INDEX, lifting its block first.
    Remove { index: usize },

    /// Start a tracked program detached from the launcher.
    Start { path: PathBuf },

    /// Block network access for a tracked program.
    Block { path: PathBuf },

    /// Lift the block of a tracked program.
    Unblock { path: PathBuf },

    /// Mark a blocked program as always allowed.
    Allow { path: PathBuf },

    /// Compare tracked programs with the firewall and the filesystem.
    Check {
        /// Re-apply or lift firewall rules that disagree with the list.
        #[arg(long)]
        repair: bool,
    },
}

/// One row of `list --json`.
#[derive(Debug, Serialize)]
struct ProgramView<'a> {
    index: usize,
    path: &'a Path,
    status: ProgramStatus,
    color: StatusColor,
    label: &'static str,
    stale: bool,
    icon_kind: IconKind,
}

impl<'a> ProgramView<'a> {
    fn new(index: usize, record: &'a ProgramRecord) -> Self {
        let attribute = display_attribute(record.status());
        ProgramView {
            index,
            path: record.path(),
            status: record.status(),
            color: attribute.color,
            label: attribute.label,
            stale: record.is_stale(),
            icon_kind: record.icon().kind,
        }
    }
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    process::exit(run(cli));
}

fn init_logging() {
    let filter = std::env::var(LOG_ENV)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolves configuration, loads the registry and runs the subcommand.
///
/// Returns exit code: 0 = success, 1 = validation error, 2 = enforcement or
/// permission error, 3 = storage I/O error, 4 = launch error.
fn run(cli: Cli) -> i32 {
    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return EXIT_VALIDATION;
        }
    };
    debug!(?config, "resolved configuration");

    let mut registry = match config.open_registry() {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_VALIDATION;
        }
    };

    match registry.load() {
        Ok(report) => {
            if report.skipped > 0 {
                eprintln!("Warning: ignored {} unusable store entries", report.skipped);
            }
        }
        Err(e @ RegistryError::CorruptStore(_)) => {
            eprintln!("Warning: {}; starting with an empty list", e);
        }
        Err(e) => {
            // Writing over a store that could not be read would lose it.
            eprintln!("Error: {}", e);
            return exit_code(&e);
        }
    }

    match cli.command {
        Commands::List { json } => run_list(&registry, json),
        Commands::Add { paths } => run_add(&mut registry, &paths),
        Commands::Remove { index } => run_remove(&mut registry, index),
        Commands::Start { path } => run_start(&registry, &path),
        Commands::Block { path } => report(&path, registry.block(&path)),
        Commands::Unblock { path } => report(&path, registry.unblock(&path)),
        Commands::Allow { path } => report(&path, registry.allow_always(&path)),
        Commands::Check { repair } => run_check(&mut registry, repair),
    }
}

fn build_config(cli: &Cli) -> Result<LauncherConfig, String> {
    let mut config = LauncherConfig::from_env().map_err(|e| e.to_string())?;
    if let Some(store) = &cli.store {
        config.store_path = Some(store.clone());
    }
    if let Some(kind) = cli.store_kind {
        config.store_kind = kind;
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(secs) = cli.timeout_secs {
        config.enforce_timeout = std::time::Duration::from_secs(secs);
    }
    Ok(config)
}

/// Maps an error to its exit code.
fn exit_code(err: &RegistryError) -> i32 {
    match err {
        RegistryError::Duplicate { .. }
        | RegistryError::NotFound { .. }
        | RegistryError::InvalidPath { .. }
        | RegistryError::IndexOutOfRange { .. }
        | RegistryError::InvalidTransition { .. } => EXIT_VALIDATION,
        RegistryError::Enforcement(_) => EXIT_ENFORCEMENT,
        RegistryError::Io(_) | RegistryError::CorruptStore(_) | RegistryError::StaleStore(_) => {
            EXIT_STORAGE
        }
        RegistryError::Launch { .. } => EXIT_LAUNCH,
    }
}

fn fail(err: RegistryError) -> i32 {
    eprintln!("Error: {}", err);
    if err.is_permission_denied() {
        eprintln!("Hint: firewall changes need administrator rights; retry from an elevated shell.");
    }
    exit_code(&err)
}

fn report(path: &Path, result: Result<ProgramStatus, RegistryError>) -> i32 {
    match result {
        Ok(status) => {
            println!("{}: {}", path.display(), status);
            EXIT_OK
        }
        Err(e) => fail(e),
    }
}

fn run_list(registry: &ProgramRegistry, json: bool) -> i32 {
    let views: Vec<ProgramView<'_>> = registry
        .get_programs()
        .iter()
        .enumerate()
        .map(|(index, record)| ProgramView::new(index, record))
        .collect();

    if json {
        return print_json(&views);
    }

    if views.is_empty() {
        println!("No programs tracked.");
    }
    for view in &views {
        let missing = if view.stale { "  (missing)" } else { "" };
        println!(
            "{:>3}  {:<15} {}{}",
            view.index,
            view.label,
            view.path.display(),
            missing
        );
    }
    EXIT_OK
}

fn print_json(views: &[ProgramView<'_>]) -> i32 {
    match serde_json::to_string_pretty(views) {
        Ok(text) => {
            println!("{}", text);
            EXIT_OK
        }
        Err(e) => {
            eprintln!("Error: failed to serialize program list: {}", e);
            EXIT_STORAGE
        }
    }
}

fn run_add(registry: &mut ProgramRegistry, paths: &[PathBuf]) -> i32 {
    let batch = match registry.add_programs(paths) {
        Ok(batch) => batch,
        Err(e) => return fail(e),
    };
    for path in &batch.added {
        println!("added {}", path.display());
    }
    for (path, reason) in &batch.skipped {
        eprintln!("skipped {}: {}", path.display(), reason);
    }
    if batch.skipped.is_empty() {
        EXIT_OK
    } else {
        EXIT_VALIDATION
    }
}

fn run_remove(registry: &mut ProgramRegistry, index: usize) -> i32 {
    let path = registry
        .get_programs()
        .get(index)
        .map(|record| record.path().to_path_buf());
    match registry.delete_program(index) {
        Ok(()) => {
            if let Some(path) = path {
                println!("removed {}", path.display());
            }
            EXIT_OK
        }
        Err(e) => fail(e),
    }
}

fn run_start(registry: &ProgramRegistry, path: &Path) -> i32 {
    match registry.start(path) {
        Ok(pid) => {
            println!("started {} (pid {})", path.display(), pid);
            EXIT_OK
        }
        Err(e) => fail(e),
    }
}

fn run_check(registry: &mut ProgramRegistry, repair: bool) -> i32 {
    println!("backend: {}", registry.backend_name());

    for path in registry.refresh_stale() {
        println!("missing executable: {}", path.display());
    }

    let drift = if repair {
        match registry.repair_drift() {
            Ok(repaired) => {
                for entry in &repaired {
                    println!("repaired: {}", entry);
                }
                return EXIT_OK;
            }
            Err(e) => return fail(e),
        }
    } else {
        registry.reconcile()
    };

    if drift.is_empty() {
        println!("firewall matches the list");
    }
    for entry in &drift {
        println!("drift: {}", entry);
    }
    EXIT_OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use offline_enforce::EnforcementError;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "offline-launcher",
            "list",
            "--json",
            "--store-kind",
            "sqlite",
            "--backend",
            "none",
            "--timeout-secs",
            "4",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::List { json: true }));
        assert_eq!(cli.store_kind, Some(StoreKind::Sqlite));
        assert_eq!(cli.backend, Some(BackendKind::None));
        assert_eq!(cli.timeout_secs, Some(4));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(Cli::try_parse_from(["offline-launcher", "check", "--timeout-secs", "0"]).is_err());
        assert!(Cli::try_parse_from(["offline-launcher", "add"]).is_err());
    }

    #[test]
    fn errors_map_to_exit_codes() {
        let validation = RegistryError::NotFound {
            path: PathBuf::from("/x"),
        };
        assert_eq!(exit_code(&validation), EXIT_VALIDATION);

        let enforcement = RegistryError::Enforcement(EnforcementError::Unavailable {
            reason: "none".into(),
        });
        assert_eq!(exit_code(&enforcement), EXIT_ENFORCEMENT);

        let launch = RegistryError::Launch {
            path: PathBuf::from("/x"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(exit_code(&launch), EXIT_LAUNCH);
    }

    #[test]
    fn view_carries_display_attributes() {
        let record =
            ProgramRecord::restore(PathBuf::from("/apps/game.exe"), ProgramStatus::Deactivated)
                .unwrap();
        let json = serde_json::to_value(ProgramView::new(2, &record)).unwrap();
        assert_eq!(json["index"], 2);
        assert_eq!(json["status"], "deactivated");
        assert_eq!(json["color"], "red");
        assert_eq!(json["label"], "blocked");
        assert_eq!(json["stale"], true);
        assert_eq!(json["icon_kind"], "executable");
    }

    #[cfg(unix)]
    #[test]
    fn unserializable_list_is_an_error() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new("/apps").join(OsStr::from_bytes(b"bad\xff.exe"));
        let record = ProgramRecord::restore(path, ProgramStatus::SessionActive).unwrap();
        assert_eq!(print_json(&[ProgramView::new(0, &record)]), EXIT_STORAGE);
        assert_eq!(print_json(&[]), EXIT_OK);
    }
}

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};

use ec_app::{AppError, AppResult, ModuleCatalog, sync};
use ec_charts::{ArrayMerge, ChartRecord, biggest_y_max, merged};
use ec_core::{BatchId, CaseId, ModuleConfig, parse_id_list};
use ec_store::{LocalStore, SavedBatch, SavedCase};

#[derive(Parser)]
#[command(name = "ec-cli")]
#[command(about = "EnerCompare CLI - manage saved scenario cases and batches", long_about = None)]
struct Cli {
    /// Store directory (in-memory when omitted)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List modules in a catalog
    Modules {
        /// Path to the module catalog YAML file
        catalog: PathBuf,
    },
    /// Shared per-axis maxima across chart option files
    AxisMax {
        /// Chart option JSON files, one per column
        charts: Vec<PathBuf>,
        /// Report per-column scaling (nothing shared)
        #[arg(long)]
        unlocked: bool,
    },
    /// Deep-merge two chart option JSON files and print the result
    MergeOptions {
        base: PathBuf,
        overlay: PathBuf,
        #[arg(long, value_enum, default_value_t = ArrayMode::Replace)]
        arrays: ArrayMode,
    },
    #[command(flatten)]
    Store(StoreCommand),
}

/// Commands that read or write the local store.
#[derive(Subcommand)]
enum StoreCommand {
    /// List saved cases in display order
    Cases {
        /// Only cases of this module type
        #[arg(long)]
        module: Option<String>,
    },
    /// List saved batches in display order
    Batches,
    /// Duplicate saved cases under "(copy N)" names
    Duplicate {
        /// Comma separated case ids
        ids: String,
        /// Module catalog used to check the duplication flag
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Delete saved cases and remove them from batches
    DeleteCases {
        /// Comma separated case ids
        ids: String,
    },
    /// Delete a batch
    DeleteBatch {
        id: u32,
        /// Also delete cases no other batch references
        #[arg(long)]
        cascade: bool,
    },
    /// Move the given cases to the front of the list
    ReorderCases {
        /// Comma separated case ids, in the new order
        ids: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ArrayMode {
    Replace,
    Concat,
    ByIndex,
}

impl From<ArrayMode> for ArrayMerge {
    fn from(mode: ArrayMode) -> Self {
        match mode {
            ArrayMode::Replace => ArrayMerge::Replace,
            ArrayMode::Concat => ArrayMerge::Concat,
            ArrayMode::ByIndex => ArrayMerge::ByIndex,
        }
    }
}

fn main() -> AppResult<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Modules { catalog } => cmd_modules(&catalog),
        Commands::AxisMax { charts, unlocked } => cmd_axis_max(&charts, !unlocked),
        Commands::MergeOptions {
            base,
            overlay,
            arrays,
        } => cmd_merge_options(&base, &overlay, arrays.into()),
        Commands::Store(command) => {
            let store = open_store(cli.db.as_deref())?;
            run_store_command(&store, command)
        }
    }
}

fn run_store_command(store: &LocalStore, command: StoreCommand) -> AppResult<()> {
    match command {
        StoreCommand::Cases { module } => cmd_cases(store, module.as_deref()),
        StoreCommand::Batches => cmd_batches(store),
        StoreCommand::Duplicate { ids, catalog } => cmd_duplicate(store, &ids, catalog.as_deref()),
        StoreCommand::DeleteCases { ids } => cmd_delete_cases(store, &ids),
        StoreCommand::DeleteBatch { id, cascade } => cmd_delete_batch(store, id, cascade),
        StoreCommand::ReorderCases { ids } => cmd_reorder_cases(store, &ids),
    }
}

fn open_store(db: Option<&Path>) -> AppResult<LocalStore> {
    match db {
        Some(dir) => Ok(LocalStore::open(dir)?),
        None => {
            tracing::warn!("no --db given, using an empty in-memory store");
            Ok(LocalStore::in_memory())
        }
    }
}

fn case_ids(raw: &str) -> AppResult<Vec<CaseId>> {
    Ok(parse_id_list(raw)?)
}

fn cmd_modules(catalog_path: &Path) -> AppResult<()> {
    let catalog = ModuleCatalog::load(catalog_path)?;
    let modules = catalog.summaries();

    if modules.is_empty() {
        println!("No modules found in catalog");
    } else {
        println!("Modules in catalog:");
        for m in modules {
            println!(
                "  {} - {} ({} inputs, up to {} columns)",
                m.module_type, m.api_path, m.input_count, m.max_comparison_cases
            );
        }
    }
    Ok(())
}

fn cmd_cases(store: &LocalStore, module: Option<&str>) -> AppResult<()> {
    let cases: Vec<SavedCase> = sync::sorted::<SavedCase>(store)?
        .into_iter()
        .filter(|c| module.is_none_or(|m| c.module_type.as_str() == m))
        .collect();

    if cases.is_empty() {
        println!("No saved cases");
        return Ok(());
    }
    println!("Saved cases:");
    for case in cases {
        let id = case.id.map(|id| id.to_string()).unwrap_or_default();
        let ran = if case.data.analysis_result.is_some() {
            "has result"
        } else {
            "not run"
        };
        println!("  {:>4}  {}  [{}] {}", id, case.name, case.module_type, ran);
    }
    Ok(())
}

fn cmd_batches(store: &LocalStore) -> AppResult<()> {
    let batches = sync::sorted::<SavedBatch>(store)?;

    if batches.is_empty() {
        println!("No saved batches");
        return Ok(());
    }
    println!("Saved batches:");
    for batch in batches {
        let id = batch.id.map(|id| id.to_string()).unwrap_or_default();
        let members: Vec<String> = batch.case_ids.iter().map(|c| c.to_string()).collect();
        println!(
            "  {:>4}  {}  [{}] cases: {}",
            id,
            batch.name,
            batch.module_type,
            members.join(",")
        );
    }
    Ok(())
}

fn cmd_duplicate(store: &LocalStore, ids: &str, catalog: Option<&Path>) -> AppResult<()> {
    let catalog = catalog.map(ModuleCatalog::load).transpose()?;

    for id in case_ids(ids)? {
        let source = store
            .get::<SavedCase>(id)?
            .ok_or(AppError::CaseNotFound(id))?;
        let config = match &catalog {
            Some(catalog) => catalog.get(source.module_type.as_str())?.clone(),
            None => ModuleConfig::new(source.module_type.as_str(), "/"),
        };
        for copy in sync::duplicate_cases(store, &config, &[id])? {
            let new_id = copy.id.map(|id| id.to_string()).unwrap_or_default();
            println!("✓ {} -> {} ({})", id, new_id, copy.name);
        }
    }
    Ok(())
}

fn cmd_delete_cases(store: &LocalStore, ids: &str) -> AppResult<()> {
    let report = sync::delete_saved_case_ids(store, &case_ids(ids)?)?;
    println!("✓ Deleted {} case(s)", report.deleted);
    for batch in &report.pruned_batches {
        let note = if report.emptied_batches.contains(batch) {
            " (now empty)"
        } else {
            ""
        };
        println!("  pruned batch {}{}", batch, note);
    }
    Ok(())
}

fn cmd_delete_batch(store: &LocalStore, id: u32, cascade: bool) -> AppResult<()> {
    let id = BatchId::try_from(id)?;
    let report = sync::delete_batch(store, id, cascade)?;
    println!("✓ Deleted batch {}", id);

    let list = |ids: &[CaseId]| ids.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(",");
    if cascade {
        println!("  deleted dangling cases: {}", list(&report.dangling));
    } else {
        println!("  dangling cases (kept): {}", list(&report.dangling));
    }
    println!("  shared cases (kept): {}", list(&report.shared));
    Ok(())
}

fn cmd_reorder_cases(store: &LocalStore, ids: &str) -> AppResult<()> {
    sync::reorder_cases(store, &case_ids(ids)?)?;
    cmd_cases(store, None)
}

fn cmd_axis_max(paths: &[PathBuf], locked: bool) -> AppResult<()> {
    let charts = paths
        .iter()
        .map(|path| match ChartRecord::load(path) {
            Ok(chart) => Ok(Some(chart)),
            Err(e) => Err(AppError::InvalidInput(format!("{}: {}", path.display(), e))),
        })
        .collect::<AppResult<Vec<_>>>()?;

    let maxima = biggest_y_max(&charts, locked);
    for (axis, max) in maxima.iter().enumerate() {
        match max {
            Some(max) => println!("  axis {}: {}", axis, max),
            None => println!("  axis {}: auto", axis),
        }
    }
    Ok(())
}

fn cmd_merge_options(base: &Path, overlay: &Path, arrays: ArrayMerge) -> AppResult<()> {
    let read = |path: &Path| -> AppResult<serde_json::Value> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| AppError::InvalidInput(format!("{}: {}", path.display(), e)))
    };
    let out = merged(&read(base)?, &read(overlay)?, arrays);
    let pretty = serde_json::to_string_pretty(&out)
        .map_err(|e| AppError::InvalidInput(e.to_string()))?;
    println!("{}", pretty);
    Ok(())
}

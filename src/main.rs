// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result, anyhow, bail};
use boiler_docs::utils::logging::{
    format_error, format_info, format_step, format_success, format_warning, init_logger, set_color,
};
use boiler_docs::{
    Config, Document, DriftPolicy, FileArchive, FileScanner, IngestReport, Ingestor,
    InventoryStore, JsonExporter, ProgressTracker, RowStore, SchemaRegistry, SqliteClient,
    TableOutcome, Validator, parser,
};
use clap::{ArgAction, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

const CELL_WIDTH: usize = 40;

#[derive(Parser)]
#[command(name = "boiler_docs")]
#[command(version = "0.1.0")]
#[command(about = "Ingest boiler maintenance tables from Word, Excel and PDF into SQLite", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    /// Overrides database.path from the configuration
    #[arg(long, value_name = "FILE", env = "BOILER_DOCS_DB")]
    database: Option<PathBuf>,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract tables from documents or directories and store their rows
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// How to handle a table whose header changed: reject, replace, version
        #[arg(long, value_parser = parse_drift_policy)]
        drift: Option<DriftPolicy>,

        /// Delete existing rows of a table before storing the new ones
        #[arg(long)]
        clear: bool,

        /// Print the ingestion reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored tables with their row counts
    Tables,

    /// Print every row of a table, oldest first
    Show {
        table: String,

        /// Comma separated subset of columns
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Replace cell values of one row
    Edit {
        table: String,

        id: i64,

        /// Column assignment, repeatable: --set "Qty=12"
        #[arg(long = "set", value_name = "COLUMN=VALUE", required = true)]
        assignments: Vec<String>,
    },

    /// Drop a table and everything stored in it
    Drop {
        table: String,

        #[arg(long)]
        confirm: bool,
    },

    /// Delete all rows of a table but keep its columns
    Clear {
        table: String,

        #[arg(long)]
        confirm: bool,
    },

    /// Check the store and repair malformed internal tables
    Verify,

    /// Write stored tables to JSON files
    Export {
        #[arg(short, long, default_value = "./exports")]
        output: PathBuf,

        #[arg(short, long)]
        pretty: bool,

        /// Export a single table instead of all of them
        #[arg(long)]
        table: Option<String>,
    },

    /// Store, list, fetch and delete raw uploaded files
    Archive {
        #[command(subcommand)]
        command: ArchiveCommands,
    },

    /// Parts inventory imported from spreadsheets
    Inventory {
        #[command(subcommand)]
        command: InventoryCommands,
    },
}

#[derive(Subcommand)]
enum ArchiveCommands {
    Upload {
        path: PathBuf,

        #[arg(long)]
        collection: Option<String>,
    },

    List {
        #[arg(long)]
        collection: Option<String>,
    },

    Get {
        id: i64,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
enum InventoryCommands {
    Import {
        path: PathBuf,
    },

    List,

    Set {
        id: i64,

        #[arg(long)]
        available: i64,

        #[arg(long)]
        required: i64,
    },
}

fn parse_drift_policy(value: &str) -> std::result::Result<DriftPolicy, String> {
    match value.to_ascii_lowercase().as_str() {
        "reject" => Ok(DriftPolicy::Reject),
        "replace" => Ok(DriftPolicy::Replace),
        "version" => Ok(DriftPolicy::Version),
        other => Err(format!(
            "unknown drift policy '{}' (expected reject, replace or version)",
            other
        )),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    set_color(cli.color);
    init_logger(cli.color, cli.verbose);

    debug!("Loading configuration from: {}", cli.config.display());

    let mut config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        Config::default_config()
    };

    if let Some(database) = cli.database {
        config.database.path = database;
    }

    let client = SqliteClient::open(&config.database).context("Failed to open the SQLite store")?;

    // Failures inside a command are reported, not propagated as an exit code.
    if let Err(e) = run(&client, &mut config, cli.command) {
        eprintln!("{}", format_error(&format!("{:#}", e)));
    }

    Ok(())
}

fn run(client: &SqliteClient, config: &mut Config, command: Commands) -> Result<()> {
    match command {
        Commands::Ingest {
            paths,
            drift,
            clear,
            json,
        } => {
            if let Some(policy) = drift {
                config.ingestion.header_drift = policy;
            }
            config.ingestion.clear_before_ingest |= clear;
            cmd_ingest(client, config, &paths, json)
        }
        Commands::Tables => cmd_tables(client),
        Commands::Show {
            table,
            columns,
            json,
        } => cmd_show(client, &table, columns, json),
        Commands::Edit {
            table,
            id,
            assignments,
        } => cmd_edit(client, &table, id, &assignments),
        Commands::Drop { table, confirm } => cmd_drop(client, &table, confirm),
        Commands::Clear { table, confirm } => cmd_clear(client, &table, confirm),
        Commands::Verify => cmd_verify(client),
        Commands::Export {
            output,
            pretty,
            table,
        } => cmd_export(client, output, pretty, table),
        Commands::Archive { command } => cmd_archive(client, config, command),
        Commands::Inventory { command } => cmd_inventory(client, config, command),
    }
}

fn cmd_ingest(client: &SqliteClient, config: &Config, paths: &[PathBuf], json: bool) -> Result<()> {
    let start_time = Instant::now();
    let ingestor = Ingestor::new(client, &config.ingestion);
    let scanner = FileScanner::new(&config.ingestion);

    info!(
        "Ingesting with header drift policy '{}'",
        config.ingestion.header_drift
    );

    let mut reports = Vec::new();

    for path in paths {
        if path.is_dir() {
            let files = scanner
                .scan_directory(path)
                .with_context(|| format!("Failed to scan {}", path.display()))?;

            let progress = if json {
                ProgressTracker::hidden(files.len())
            } else {
                ProgressTracker::with_color(files.len(), colored::control::SHOULD_COLORIZE.should_colorize())
            };

            for item in ingestor.ingest_batch(&files, &progress) {
                match item.result {
                    Ok(report) => reports.push(report),
                    Err(e) => eprintln!(
                        "{}",
                        format_error(&format!("{}: {}", item.relative_path, e))
                    ),
                }
            }

            progress.finish();
            let stats = progress.get_stats();
            if !json {
                println!(
                    "{}",
                    format_info(&format!(
                        "{} files ingested, {} failed, {} tables stored, {} rows added ({:.1}% success)",
                        stats.files_ingested,
                        stats.files_failed,
                        stats.tables_stored,
                        stats.rows_inserted,
                        stats.success_rate()
                    ))
                );
            }
        } else {
            match ingestor.ingest_path(path) {
                Ok(report) => reports.push(report),
                Err(e) => eprintln!(
                    "{}",
                    format_error(&format!("{}: {}", path.display(), e))
                ),
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_report(report);
        }
        info!(
            "Ingestion finished in {:.2}s",
            start_time.elapsed().as_secs_f64()
        );
    }

    Ok(())
}

fn print_report(report: &IngestReport) {
    println!("{}", format_info(&report.document));

    if report.tables.is_empty() {
        println!("  {}", format_warning("no tables with data rows"));
    }

    let total = report.tables.len();
    for (idx, table) in report.tables.iter().enumerate() {
        let target = table.stored_as.as_deref().unwrap_or(&table.name);
        let line = match &table.outcome {
            TableOutcome::Failed => format_error(&format!(
                "{}: {}",
                table.name,
                table.error.as_deref().unwrap_or("failed")
            )),
            TableOutcome::Recreated { discarded_rows } => format_warning(&format!(
                "{}: recreated, {} old rows discarded, {}/{} rows added",
                target, discarded_rows, table.rows_inserted, table.rows_seen
            )),
            TableOutcome::Versioned { base } => format_warning(&format!(
                "{}: header changed, stored as '{}', {}/{} rows added",
                base, target, table.rows_inserted, table.rows_seen
            )),
            TableOutcome::Created | TableOutcome::Existing => format_success(&format!(
                "{}: {}/{} rows added",
                target, table.rows_inserted, table.rows_seen
            )),
        };
        println!("  {}", format_step(idx + 1, total, &line));
    }
}

fn cmd_tables(client: &SqliteClient) -> Result<()> {
    let rows = RowStore::new(client);
    let entries = SchemaRegistry::new(client, DriftPolicy::default()).entries()?;

    let tables = rows.list_tables()?;
    if tables.is_empty() {
        println!("{}", format_info("No tables stored yet"));
        return Ok(());
    }

    for table in tables {
        let count = rows.row_count(&table)?;
        let columns = rows.columns(&table)?;
        let source = entries
            .iter()
            .find(|entry| entry.table_name == table)
            .and_then(|entry| entry.source.clone())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<32} {:>6} rows  [{}]  from {}",
            table,
            count,
            columns.join(", "),
            source
        );
    }

    Ok(())
}

fn cmd_show(client: &SqliteClient, table: &str, columns: Vec<String>, json: bool) -> Result<()> {
    let rows = RowStore::new(client);
    let header = if columns.is_empty() {
        rows.columns(table)?
    } else {
        columns
    };

    let stored = rows.read_all(table, &header)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stored)?);
        return Ok(());
    }

    let mut grid = vec![
        std::iter::once("id".to_string())
            .chain(header.iter().cloned())
            .collect::<Vec<_>>(),
    ];
    grid.extend(stored.iter().map(|row| {
        std::iter::once(row.id.to_string())
            .chain(row.values.iter().cloned())
            .collect()
    }));

    print!("{}", render_grid(&grid));
    println!("{}", format_info(&format!("{} rows", stored.len())));
    Ok(())
}

/// Column-aligned plain text rendering; cells are shortened and flattened
/// to one line.
fn render_grid(grid: &[Vec<String>]) -> String {
    let cells: Vec<Vec<String>> = grid
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| Validator::truncate_text(&cell.replace(['\n', '\t'], " "), CELL_WIDTH))
                .collect()
        })
        .collect();

    let columns = cells.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|col| {
            cells
                .iter()
                .filter_map(|row| row.get(col))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    for row in &cells {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join(" | ");
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

fn cmd_edit(client: &SqliteClient, table: &str, id: i64, assignments: &[String]) -> Result<()> {
    if !client.table_exists(table)? {
        println!("{}", format_warning(&format!("No table '{}', nothing changed", table)));
        return Ok(());
    }

    let rows = RowStore::new(client);
    let header = rows.columns(table)?;

    let Some(current) = rows.read_all(table, &header)?.into_iter().find(|row| row.id == id) else {
        println!(
            "{}",
            format_warning(&format!("No row #{} in '{}', nothing changed", id, table))
        );
        return Ok(());
    };

    let mut values = current.values;
    for assignment in assignments {
        let (column, value) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected COLUMN=VALUE, got '{}'", assignment))?;
        let idx = header
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column.trim()))
            .ok_or_else(|| anyhow!("Table '{}' has no column '{}'", table, column.trim()))?;
        values[idx] = value.to_string();
    }

    if rows.update_row(table, &header, id, &values)? {
        println!("{}", format_success(&format!("Updated row #{} in '{}'", id, table)));
    } else {
        println!("{}", format_warning(&format!("Row #{} in '{}' was not changed", id, table)));
    }
    Ok(())
}

fn cmd_drop(client: &SqliteClient, table: &str, confirm: bool) -> Result<()> {
    if !confirm {
        bail!("Refusing to drop '{}' without --confirm", table);
    }

    if RowStore::new(client).drop_table(table)? {
        println!("{}", format_success(&format!("Dropped '{}'", table)));
    } else {
        println!("{}", format_info(&format!("No table '{}'", table)));
    }
    Ok(())
}

fn cmd_clear(client: &SqliteClient, table: &str, confirm: bool) -> Result<()> {
    if !confirm {
        bail!("Refusing to clear '{}' without --confirm", table);
    }

    let removed = RowStore::new(client).clear_table(table)?;
    println!(
        "{}",
        format_success(&format!("Removed {} rows from '{}'", removed, table))
    );
    Ok(())
}

fn cmd_verify(client: &SqliteClient) -> Result<()> {
    if !client.ping()? {
        bail!("SQLite store did not answer");
    }

    let registry = SchemaRegistry::new(client, DriftPolicy::default());

    let repairs = registry.verify_internal_tables()?;
    for repair in &repairs {
        println!(
            "{}",
            format_warning(&format!(
                "Rebuilt {} ({} rows discarded)",
                repair.table, repair.discarded_rows
            ))
        );
    }

    let mismatches = registry.find_mismatches()?;
    for table in &mismatches {
        println!(
            "{}",
            format_warning(&format!(
                "'{}' no longer matches its registered header; it is rebuilt on next ingest",
                table
            ))
        );
    }

    if repairs.is_empty() && mismatches.is_empty() {
        let location = client
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ":memory:".to_string());
        println!("{}", format_success(&format!("Store at {} verified", location)));
    }
    Ok(())
}

fn cmd_export(client: &SqliteClient, output: PathBuf, pretty: bool, table: Option<String>) -> Result<()> {
    let exporter = JsonExporter::new(output, pretty)?;

    match table {
        Some(table) => {
            let path = exporter.export_table(client, &table)?;
            println!(
                "{}",
                format_success(&format!("Exported '{}' to {}", table, path.display()))
            );
        }
        None => {
            let manifest = exporter.export_all(client)?;
            println!(
                "{}",
                format_success(&format!(
                    "Exported {} tables ({} rows)",
                    manifest.total_tables, manifest.total_rows
                ))
            );
        }
    }
    Ok(())
}

fn cmd_archive(client: &SqliteClient, config: &Config, command: ArchiveCommands) -> Result<()> {
    let archive = FileArchive::new(client);

    match command {
        ArchiveCommands::Upload { path, collection } => {
            let collection = collection.unwrap_or_else(|| config.archive.default_collection.clone());
            let document = read_document(&path, config.ingestion.max_file_size_mb)?;

            if let Some(existing) = archive.find_by_hash(&collection, &document.content_hash)? {
                println!(
                    "{}",
                    format_warning(&format!(
                        "Identical file already archived as #{} ({})",
                        existing.id, existing.file_name
                    ))
                );
            }

            let stored = archive.save(&collection, &document)?;
            println!(
                "{}",
                format_success(&format!(
                    "Archived {} in '{}' as #{}",
                    stored.file_name, stored.collection, stored.id
                ))
            );
        }
        ArchiveCommands::List { collection } => {
            let files = archive.list(collection.as_deref())?;
            if files.is_empty() {
                println!("{}", format_info("Archive is empty"));
            }
            for file in files {
                println!(
                    "#{:<5} {:<16} {:<40} {:>10.1} KiB  {}",
                    file.id,
                    file.collection,
                    file.file_name,
                    file.size_kib(),
                    file.uploaded_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        ArchiveCommands::Get { id, output } => {
            let (meta, bytes) = archive.load(id)?;
            let target = output.unwrap_or_else(|| PathBuf::from(&meta.file_name));
            fs::write(&target, bytes)
                .with_context(|| format!("Failed to write {}", target.display()))?;
            println!(
                "{}",
                format_success(&format!("Wrote #{} to {}", id, target.display()))
            );
        }
        ArchiveCommands::Delete { id } => {
            if archive.delete(id)? {
                println!("{}", format_success(&format!("Deleted #{}", id)));
            } else {
                println!("{}", format_info(&format!("No stored file #{}", id)));
            }
        }
    }
    Ok(())
}

fn cmd_inventory(client: &SqliteClient, config: &Config, command: InventoryCommands) -> Result<()> {
    let store = InventoryStore::new(client);

    match command {
        InventoryCommands::Import { path } => {
            let document = read_document(&path, config.ingestion.max_file_size_mb)?;
            let tables = parser::extract_tables(&document)?;

            let mut imported_any = false;
            for table in &tables {
                match store.import_table(table) {
                    Ok(report) => {
                        imported_any = true;
                        println!(
                            "{}",
                            format_success(&format!(
                                "{}: {} items added, {} duplicates",
                                table.name, report.inserted, report.duplicates
                            ))
                        );
                        for rejected in &report.rejected {
                            println!("  {}", format_warning(rejected));
                        }
                    }
                    Err(e) => debug!("Table '{}' is not an inventory table: {}", table.name, e),
                }
            }

            if !imported_any {
                bail!("No inventory table found in {}", path.display());
            }
        }
        InventoryCommands::List => {
            let items = store.list()?;
            let mut grid = vec![
                ["id", "Part Name", "Part Number", "Available", "Required", "Short"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>(),
            ];
            grid.extend(items.iter().map(|item| {
                vec![
                    item.id.to_string(),
                    item.part_name.clone(),
                    item.part_number.clone(),
                    item.available_quantity.to_string(),
                    item.required_quantity.to_string(),
                    item.shortfall().to_string(),
                ]
            }));
            print!("{}", render_grid(&grid));
        }
        InventoryCommands::Set {
            id,
            available,
            required,
        } => {
            if store.update_quantity(id, available, required)? {
                println!("{}", format_success(&format!("Updated item #{}", id)));
            } else {
                println!("{}", format_info(&format!("No inventory item #{}", id)));
            }
        }
    }
    Ok(())
}

fn read_document(path: &Path, max_file_size_mb: usize) -> Result<Document> {
    Validator::validate_file_path(path)?;

    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| anyhow!("{} has no file name", path.display()))?;

    Validator::validate_size(&name, bytes.len() as u64, max_file_size_mb)?;
    Ok(Document::new(name, bytes))
}

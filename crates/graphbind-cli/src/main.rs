use anyhow::Context;
use clap::Parser;
use graphbind_core::{LoggingProblemHandler, Mapper, MapperConfig, SchemaFile, TypeDescriptor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_FILE: &str = "graphbind.yaml";

/// graphbind - bind JSON documents to object graphs described by a schema
#[derive(Parser, Debug)]
#[command(name = "graphbind")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON documents to bind
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Type definitions (YAML, or JSON by extension)
    #[arg(short, long, value_name = "FILE")]
    schema: Option<PathBuf>,

    /// Root type expression, e.g. `Order` or `List<Order>`
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    root_type: Option<String>,

    /// Path to a graphbind.yaml or graphbind.json configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print single-line JSON
    #[arg(long)]
    compact: bool,

    /// Report binder counts on stderr
    #[arg(long)]
    stats: bool,

    /// Log and skip unknown fields instead of failing
    #[arg(long)]
    lenient: bool,

    /// Write a default configuration file
    #[arg(long)]
    init: bool,
}

fn main() -> anyhow::Result<()> {
    // Set RUST_LOG=debug to see binder construction
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.init {
        return init_config(Path::new(DEFAULT_CONFIG_FILE));
    }

    let (Some(schema), Some(root_type)) = (&cli.schema, &cli.root_type) else {
        eprintln!("Error: --schema and --type are required. Use --help for usage information.");
        std::process::exit(1);
    };
    if cli.files.is_empty() {
        eprintln!("Error: No input files specified. Use --help for usage information.");
        std::process::exit(1);
    }

    let mapper = build_mapper(&cli, schema)?;
    let ty = TypeDescriptor::parse(root_type)?;
    info!("Binding {} file(s) as {}", cli.files.len(), ty);

    let failed = bind_files(&mapper, &ty, &cli.files, !cli.compact);

    if cli.stats {
        let stats = mapper.stats();
        eprintln!(
            "Binders: {} read, {} write",
            stats.read_binders, stats.write_binders
        );
    }
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn init_config(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    MapperConfig::init_file(path)?;
    println!("Created {}", path.display());
    Ok(())
}

fn build_mapper(cli: &Cli, schema: &Path) -> anyhow::Result<Mapper> {
    let config = match &cli.config {
        Some(path) => MapperConfig::from_file(path)?,
        None => MapperConfig::default(),
    };
    let registry = SchemaFile::from_file(schema)
        .and_then(SchemaFile::into_registry)
        .with_context(|| format!("loading schema {}", schema.display()))?;
    debug!("Loaded {} type(s) from {}", registry.len(), schema.display());

    let mapper = Mapper::with_config(config, Arc::new(registry));
    Ok(if cli.lenient {
        mapper.with_problem_handler(Arc::new(LoggingProblemHandler::new()))
    } else {
        mapper
    })
}

/// Bind every file on the shared mapper; returns the number of failures.
/// Output keeps the command-line order.
fn bind_files(mapper: &Mapper, ty: &TypeDescriptor, files: &[PathBuf], pretty: bool) -> usize {
    use rayon::prelude::*;

    let results: Vec<anyhow::Result<String>> = files
        .par_iter()
        .map(|path| bind_file(mapper, ty, path, pretty))
        .collect();

    let mut failed = 0;
    for (path, result) in files.iter().zip(results) {
        match result {
            Ok(text) => println!("{}", text),
            Err(error) => {
                eprintln!("Error binding {}: {:#}", path.display(), error);
                failed += 1;
            }
        }
    }
    failed
}

fn bind_file(
    mapper: &Mapper,
    ty: &TypeDescriptor,
    path: &Path,
    pretty: bool,
) -> anyhow::Result<String> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let document = mapper.read_str(ty, &text)?;
    debug!(
        "Bound {:?}: {} object(s)",
        path,
        document.graph().len()
    );
    Ok(mapper.to_json_string(ty, &document, pretty)?)
}

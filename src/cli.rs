//! Command-line interface for docweave.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{self, Config};
use crate::index::build_navigation;
use crate::ingest;
use crate::layout::LayoutPlanner;
use crate::resolve::Resolver;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Default config file names to search for.
const DEFAULT_CONFIG_NAMES: &[&str] = &["docweave.yaml", "docweave.json", ".docweave.yaml"];

/// Output file name of the navigation index.
const NAV_INDEX_FILE: &str = "navigation.json";

/// Cross-linked API documentation generator for JavaScript codebases.
///
/// Docweave consumes the entity graph produced by a static-analysis
/// front end and computes everything needed to cross-link the generated
/// documentation: reference resolution, output paths, relative links,
/// and the navigation index driving client-side search.
#[derive(Parser)]
#[command(name = "docweave")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Plan the output layout and write the navigation index
    #[command(visible_alias = "gen")]
    Generate(GenerateArgs),
    /// Resolve one reference string against a graph (debug helper)
    Resolve(ResolveArgs),
}

/// Arguments for the generate command.
#[derive(Parser)]
pub struct GenerateArgs {
    /// Path to the entity-graph dump produced by the analysis front end
    pub graph: PathBuf,

    /// Path to config file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the configured output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the navigation index to stdout instead of writing it
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the resolve command.
#[derive(Parser)]
pub struct ResolveArgs {
    /// Path to the entity-graph dump produced by the analysis front end
    pub graph: PathBuf,

    /// Reference string to resolve, e.g. "Foo.Bar#baz"
    pub reference: String,

    /// Module id or require path to scope the resolution to
    #[arg(short, long)]
    pub module: Option<String>,
}

/// Discover a config file in the current directory.
fn discover_config() -> anyhow::Result<PathBuf> {
    for name in DEFAULT_CONFIG_NAMES {
        let path = PathBuf::from(name);
        if path.exists() {
            return Ok(path);
        }
    }
    anyhow::bail!(
        "no config file found (looked for {})",
        DEFAULT_CONFIG_NAMES.join(", ")
    )
}

/// Collect the JavaScript sources that render under `source/`.
fn collect_sources(config: &Config) -> anyhow::Result<Vec<PathBuf>> {
    let root = &config.source_prefix;
    if root.as_os_str().is_empty() || !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            // Skip hidden directories and dependency trees
            if e.file_type().is_dir() && (name.starts_with('.') || name == "node_modules") {
                return false;
            }
            true
        })
    {
        let entry = entry?;
        if entry.file_type().is_file() {
            let path = entry.path();
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if ext == "js" && !config.is_path_excluded(path) {
                files.push(path.to_path_buf());
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Run the generate command.
pub fn run_generate(args: &GenerateArgs) -> anyhow::Result<i32> {
    // Discover config if not specified
    let config_path = match &args.config {
        Some(p) => p.clone(),
        None => match discover_config() {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Error: {}", e);
                return Ok(EXIT_ERROR);
            }
        },
    };

    // Parse config
    let mut config = match Config::parse_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error parsing config: {}", e);
            return Ok(EXIT_ERROR);
        }
    };
    if let Some(output) = &args.output {
        config.output = output.clone();
    }

    // Validate config
    if let Err(e) = config::validate(&config) {
        eprintln!("Error: invalid config: {}", e);
        return Ok(EXIT_ERROR);
    }

    // Load the entity graph
    let registry = match ingest::load(&args.graph) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error loading graph {:?}: {}", args.graph, e);
            return Ok(EXIT_ERROR);
        }
    };

    // Plan the layout; collisions abort before anything is written
    let planner = match LayoutPlanner::plan(&registry, &config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    // Warm the rendered-source path table
    let sources = collect_sources(&config)?;
    for source in &sources {
        planner.path_for_source(source);
    }

    // Build the navigation index last, once every path is final
    let index = match build_navigation(&registry, &planner) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };
    let json = index.to_json()?;

    if args.dry_run {
        println!("{}", json);
        return Ok(EXIT_SUCCESS);
    }

    std::fs::create_dir_all(&config.output)?;
    let index_path = config.output.join(NAV_INDEX_FILE);
    std::fs::write(&index_path, json)?;

    write_summary(&registry, &sources, &index_path);
    Ok(EXIT_SUCCESS)
}

/// Run the resolve command.
pub fn run_resolve(args: &ResolveArgs) -> anyhow::Result<i32> {
    let registry = match ingest::load(&args.graph) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error loading graph {:?}: {}", args.graph, e);
            return Ok(EXIT_ERROR);
        }
    };

    let scope = match &args.module {
        Some(name) => {
            let module = registry
                .module_by_id(name)
                .or_else(|| registry.module_by_reference(name));
            match module {
                Some(m) => Some(m),
                None => {
                    eprintln!("Error: unknown module {:?}", name);
                    return Ok(EXIT_ERROR);
                }
            }
        }
        None => None,
    };

    let resolver = Resolver::new(&registry);
    match resolver.resolve(&args.reference, scope) {
        Some(id) => {
            let entity = registry.entity(id);
            print!("{}", entity.name.green());
            print!("  {}", entity.kind.to_string().dimmed());
            if let Some(position) = &entity.position {
                print!("  {}", position.to_string().blue());
            }
            println!();
            Ok(EXIT_SUCCESS)
        }
        None => {
            println!("{} {}", "unresolved:".yellow(), args.reference);
            Ok(EXIT_FAILED)
        }
    }
}

fn write_summary(
    registry: &crate::registry::EntityRegistry,
    sources: &[PathBuf],
    index_path: &Path,
) {
    let module_count = registry.modules().count();
    let type_count = registry
        .types()
        .filter(|&id| registry.is_canonical(id))
        .count();

    println!();
    print!("  ");
    print!("{}", "docweave".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Modules: ".dimmed());
    println!("{}", module_count);
    print!("  {}", "Types:   ".dimmed());
    println!("{}", type_count);
    print!("  {}", "Sources: ".dimmed());
    println!("{}", sources.len());
    println!();

    print!("  {}", "✓".green());
    println!(" wrote {}", index_path.display());
    println!();
}

//! CommerceML CLI
//!
//! Command-line interface for:
//! - Inspecting a feed file as a parsed JSON tree (`inspect`)
//! - Running a whole import batch against the in-memory reference store
//!   and printing the resulting catalog (`import`)
//!
//! The in-memory store makes `import` a dry run by nature: it shows what a
//! real backend would receive without touching one.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use commerceml_catalog::{FileRelationService, MemoryCatalog, NullProgress};
use commerceml_import::{ImportConfig, ImportJob};
use commerceml_xmltree::{normalize, parse_str};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "commerceml")]
#[command(author, version, about = "CommerceML feed inspection and import")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse one feed file and print the tree as JSON.
    Inspect {
        /// Feed file to parse
        file: PathBuf,
        /// Skip the singleton-collapse pass and show the raw tree
        #[arg(long)]
        raw: bool,
    },

    /// Import feed files into the in-memory reference store and print a
    /// summary of the resulting catalog.
    Import {
        /// Feed files, oldest first
        files: Vec<PathBuf>,
        /// Category pagination applied to created categories
        #[arg(long, default_value_t = 10)]
        pagination: u32,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Inspect { file, raw } => inspect(&file, raw),
        Commands::Import { files, pagination } => import(&files, pagination),
    }
}

fn inspect(file: &PathBuf, raw: bool) -> Result<()> {
    let xml = fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let mut tree = parse_str(&xml).with_context(|| format!("parsing {}", file.display()))?;
    if !raw {
        normalize(&mut tree);
    }
    println!("{}", serde_json::to_string_pretty(&tree)?);
    Ok(())
}

fn import(files: &[PathBuf], pagination: u32) -> Result<()> {
    let mut store = MemoryCatalog::new();
    let mut names = Vec::new();

    // Register each file with the store the way the upload endpoint would:
    // display name is the extension-less base name, dates keep CLI order.
    let now = Utc::now();
    for (index, path) in files.iter().enumerate() {
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .with_context(|| format!("{} has no usable file name", path.display()))?
            .to_string();
        store.add_file(&name, path.clone(), now + chrono::Duration::seconds(index as i64));
        names.push(name);
    }

    let config = ImportConfig {
        pagination,
        ..ImportConfig::default()
    };
    let mut job = ImportJob::new(names);
    job.execute(&mut store, &mut NullProgress, config)?;

    println!("{}", "categories".bold());
    for category in store.categories() {
        println!(
            "  {} {} (external_id={}, parent={})",
            "•".green(),
            category.title,
            category.external_id,
            category.parent
        );
    }

    println!("{}", "products".bold());
    for product in store.products() {
        let files = store.file_relations(product.uuid).len();
        println!(
            "  {} {} (external_id={}, files={})",
            "•".green(),
            product.title,
            product.external_id,
            files
        );
    }

    let batch = job.batch();
    println!(
        "\n{} {} categories, {} properties, {} products staged",
        "done:".bold(),
        batch.categories.len(),
        batch.properties.len(),
        batch.products.len()
    );
    Ok(())
}

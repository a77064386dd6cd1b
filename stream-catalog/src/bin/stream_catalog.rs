//! Build stream catalogs and their footprint masks from a JSON data directory.
//!
//! Subcommands:
//! - `build`: construct and populate catalogs for one stream, one file per pawprint
//! - `mask`: compute a selection mask from a saved catalog
//!
//! Set `RUST_LOG=info` to see progress.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use rayon::prelude::*;
use stream_catalog::sources::{DataSources, JsonDirectorySource};
use stream_catalog::{CatalogConfig, StreamCatalog};

#[derive(Parser, Debug)]
#[command(name = "stream_catalog")]
#[command(about = "Per-star catalogs and footprint masks for stellar streams")]
#[command(version)]
struct Args {
    /// Directory holding one subdirectory of JSON tables per stream
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// Config file (defaults to ~/.stream_catalog/config.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build and save catalogs for one stream
    Build {
        /// Stream identifier
        #[arg(short, long)]
        stream: String,

        /// Pawprint identifiers; built in parallel
        #[arg(short, long, required = true, num_args = 1..)]
        pawprint: Vec<String>,

        /// Output directory for <stream>_<pawprint>.json files
        #[arg(short, long, default_value = "catalogs")]
        output_dir: PathBuf,

        /// Also compute and store these masks (e.g. "sky")
        #[arg(short, long)]
        mask: Vec<String>,
    },

    /// Compute a mask from a saved catalog and print it as JSON
    Mask {
        /// Catalog file written by `build`
        #[arg(short, long)]
        catalog: PathBuf,

        /// Selection criterion, e.g. "sky" or "sky+proper_motion"
        #[arg(long, default_value = "sky")]
        criterion: String,

        /// Write the mask here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> Result<CatalogConfig> {
    let config = match path {
        Some(path) => CatalogConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CatalogConfig::load().context("loading default config")?,
    };
    info!(
        "Using source id version {} and bands {:?}",
        config.source_id_version, config.bands
    );
    Ok(config)
}

fn build_one(
    source: &JsonDirectorySource,
    config: &CatalogConfig,
    stream: &str,
    pawprint: &str,
    output_dir: &Path,
    masks: &[String],
) -> Result<PathBuf> {
    let mut catalog = StreamCatalog::build(stream, pawprint, &DataSources::uniform(source), config)
        .with_context(|| format!("building {stream}/{pawprint}"))?;
    for criterion in masks {
        let selected = catalog
            .derive_mask(criterion)
            .with_context(|| format!("mask {criterion:?} for {stream}/{pawprint}"))?
            .iter()
            .filter(|&&s| s)
            .count();
        info!("{stream}/{pawprint}: {criterion} selects {selected} stars");
    }

    let path = output_dir.join(format!("{stream}_{pawprint}.json"));
    catalog.save_to_file(&path)?;
    Ok(path)
}

fn run_build(
    source: &JsonDirectorySource,
    config: &CatalogConfig,
    stream: &str,
    pawprints: &[String],
    output_dir: &Path,
    masks: &[String],
) -> Result<()> {
    let source = source.for_stream(stream);
    let results: Vec<(&String, Result<PathBuf>)> = pawprints
        .par_iter()
        .map(|pawprint| {
            let result = build_one(&source, config, stream, pawprint, output_dir, masks);
            (pawprint, result)
        })
        .collect();

    let mut failures = 0;
    for (pawprint, result) in results {
        match result {
            Ok(path) => println!("{stream}/{pawprint} -> {}", path.display()),
            Err(e) => {
                error!("{e:#}");
                failures += 1;
            }
        }
    }
    anyhow::ensure!(
        failures == 0,
        "{failures} of {} pawprints failed",
        pawprints.len()
    );
    Ok(())
}

fn run_mask(
    source: &JsonDirectorySource,
    catalog_path: &Path,
    criterion: &str,
    output: Option<&Path>,
) -> Result<()> {
    let catalog = StreamCatalog::from_file(catalog_path, source)
        .with_context(|| format!("loading catalog {}", catalog_path.display()))?;
    let mask = catalog.data().make_mask(criterion)?;

    let json = serde_json::to_string(&serde_json::json!({
        "stream_id": catalog.data().stream_id(),
        "pawprint_id": catalog.data().pawprint_id(),
        "criterion": criterion,
        "source_id": catalog.data().source_ids(),
        "mask": mask,
    }))?;
    match output {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let source = JsonDirectorySource::new(args.data_dir.clone());

    match args.command {
        Command::Build {
            stream,
            pawprint,
            output_dir,
            mask,
        } => {
            let config = load_config(args.config.as_deref())?;
            run_build(&source, &config, &stream, &pawprint, &output_dir, &mask)
        }
        Command::Mask {
            catalog,
            criterion,
            output,
        } => run_mask(&source, &catalog, &criterion, output.as_deref()),
    }
}

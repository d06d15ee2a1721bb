use std::fs;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tarmac_core::Error;
use tarmac_core::export::{Report, to_geojson_string};
use tarmac_core::loading::{ingest_set, read_records};
use tarmac_core::pipeline::build_from_batch;

mod cli;
mod settings;

use cli::Args;

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Error> {
    let config = settings::load(args.config.as_deref())?;

    if let Some(threads) = args.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
        {
            warn!("Could not size the thread pool: {e}");
        }
    }

    let set = read_records(&args.input)?;
    info!(
        "Read {} records from {}",
        set.records.len() + set.unreadable,
        args.input.display()
    );

    let batch = ingest_set(set, &config.classifier);
    let output = build_from_batch(batch, &config)?;

    let report = Report::new(&output.graph, &output.quality);
    write(&args.output, &report.to_json_string()?)?;
    info!(
        "Wrote {} nodes and {} edges to {}",
        report.stats.node_count,
        report.stats.edge_count,
        args.output.display()
    );

    if let Some(path) = &args.geojson {
        write(path, &to_geojson_string(&output.graph)?)?;
        info!("Wrote GeoJSON to {}", path.display());
    }
    Ok(())
}

fn write(path: &Path, contents: &str) -> Result<(), Error> {
    fs::write(path, contents).map_err(|e| {
        std::io::Error::new(
            e.kind(),
            format!("Failed to write '{}': {}", path.display(), e),
        )
        .into()
    })
}

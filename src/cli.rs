use std::path::PathBuf;

use clap::Parser;

/// Infer an airport surface-movement graph from vehicle surveillance samples.
#[derive(Debug, Parser)]
#[command(name = "tarmac", version, about)]
pub struct Args {
    /// CSV file with `vehicle_id,timestamp,lat,lon,altitude,ground_speed,heading` rows
    #[arg(short, long)]
    pub input: PathBuf,

    /// TOML pipeline configuration; defaults apply to anything left out
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Where to write the `{graph, stats, quality}` JSON document
    #[arg(short, long, default_value = "graph.json")]
    pub output: PathBuf,

    /// Also write the graph as a GeoJSON FeatureCollection
    #[arg(long)]
    pub geojson: Option<PathBuf>,

    /// Worker threads, all cores when omitted
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,
}

//! Demonstration program: build an index over random vectors and query it

use std::time::Instant;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

use flatknn::{
    DistanceMetric, FlatIndex, Index, RefineFlatIndex, RefineParams, SearchResults,
    SortedAxisIndex, SortedAxisParams,
};

#[derive(Parser)]
#[command(name = "flatknn")]
#[command(about = "Exact nearest-neighbor search over random vectors", long_about = None)]
struct Cli {
    /// Index type to build
    #[arg(long, value_enum, default_value = "flat")]
    index: IndexType,

    /// Distance metric (the sorted-axis index is always L2)
    #[arg(long, value_enum, default_value = "l2")]
    metric: MetricArg,

    /// Vector dimension
    #[arg(short, long, default_value = "64")]
    dim: usize,

    /// Number of database vectors
    #[arg(long, default_value = "100000")]
    nb: usize,

    /// Number of query vectors
    #[arg(long, default_value = "10000")]
    nq: usize,

    /// Number of results per query
    #[arg(short, long, default_value = "4")]
    k: usize,

    /// Candidate multiplier for the refine index
    #[arg(long, default_value = "1.0")]
    k_factor: f32,

    /// Random seed for the generated data
    #[arg(long, default_value = "1234")]
    seed: u64,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

#[derive(ValueEnum, Clone, Copy)]
enum IndexType {
    Flat,
    Refine,
    SortedAxis,
}

#[derive(ValueEnum, Clone, Copy)]
enum MetricArg {
    L2,
    InnerProduct,
}

impl From<MetricArg> for DistanceMetric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::L2 => DistanceMetric::L2,
            MetricArg::InnerProduct => DistanceMetric::InnerProduct,
        }
    }
}

#[derive(ValueEnum, Clone, Copy)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

/// `n` uniform random vectors; component 0 of vector `i` is offset by `i / 1000`.
/// `dim` must be non-zero.
fn random_vectors(rng: &mut StdRng, n: usize, dim: usize) -> Vec<f32> {
    let mut data: Vec<f32> = (0..n * dim).map(|_| rng.gen::<f32>()).collect();
    for (i, row) in data.chunks_exact_mut(dim).enumerate() {
        row[0] += i as f32 / 1000.0;
    }
    data
}

fn build_index(cli: &Cli) -> Result<Box<dyn Index>> {
    let metric = DistanceMetric::from(cli.metric);
    let index: Box<dyn Index> = match cli.index {
        IndexType::Flat => Box::new(FlatIndex::new(cli.dim, metric)?),
        IndexType::Refine => Box::new(RefineFlatIndex::with_params(
            FlatIndex::new(cli.dim, metric)?,
            RefineParams::new(cli.k_factor),
        )?),
        IndexType::SortedAxis => {
            if cli.dim != 1 {
                bail!("the sorted-axis index requires --dim 1, got {}", cli.dim);
            }
            Box::new(SortedAxisIndex::new(SortedAxisParams::default())?)
        }
    };
    Ok(index)
}

fn print_labels(results: &SearchResults, rows: impl Iterator<Item = usize>) {
    for i in rows {
        let line: Vec<String> = results.row(i).1.iter().map(|l| format!("{l:5}")).collect();
        println!("{}", line.join(" "));
    }
}

fn print_distances(results: &SearchResults, rows: impl Iterator<Item = usize>) {
    for i in rows {
        let line: Vec<String> = results.row(i).0.iter().map(|d| format!("{d:7.4}")).collect();
        println!("{}", line.join(" "));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    // rejects a zero dimension before any data is generated
    let mut index = build_index(&cli)?;

    let mut rng = StdRng::seed_from_u64(cli.seed);
    let xb = random_vectors(&mut rng, cli.nb, cli.dim);
    let xq = random_vectors(&mut rng, cli.nq, cli.dim);

    println!("is_trained = {}", index.is_trained());
    index.train(&xb)?;
    index.add(&xb)?;
    println!("ntotal = {}", index.ntotal());

    // sanity check: the first database vectors should find themselves
    let n_check = cli.nb.min(5);
    let check = index.search_knn(&xb[..n_check * cli.dim], cli.k)?;
    println!("I=");
    print_labels(&check, 0..n_check);
    println!("D=");
    print_distances(&check, 0..n_check);

    let start = Instant::now();
    let results = index.search_knn(&xq, cli.k)?;
    tracing::info!(
        nq = cli.nq,
        k = cli.k,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "search complete"
    );

    let shown = cli.nq.min(5);
    println!("I (5 first results)=");
    print_labels(&results, 0..shown);
    println!("I (5 last results)=");
    print_labels(&results, cli.nq - shown..cli.nq);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_dimension_rejected_for_every_index() {
        for index in ["flat", "refine", "sorted-axis"] {
            let cli = Cli::parse_from(["flatknn", "--index", index, "--dim", "0"]);
            assert!(build_index(&cli).is_err(), "{index} accepted --dim 0");
        }
    }

    #[test]
    fn test_random_vectors_offsets_first_component() {
        let mut rng = StdRng::seed_from_u64(7);
        let data = random_vectors(&mut rng, 3000, 2);
        assert_eq!(data.len(), 6000);
        assert!(data[2 * 2999] >= 2.999);
    }
}

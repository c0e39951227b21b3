//! Sensor deployment driver.
//!
//! Loads an image, clusters its regions with k-means, assigns cluster weights,
//! runs a deployment strategy (optionally refined by annealing) on the
//! background worker and writes the resulting coverage map as a PNG.

mod kmeans;
mod render;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use tokio::io::AsyncWriteExt;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use sensor_deploy::{AreaConfig, DeploymentJob, DeploymentWorker, SensorArea};

use crate::kmeans::KMeans;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Greedy,
    Random,
    Genetic,
}

impl From<StrategyArg> for DeploymentJob {
    fn from(strategy: StrategyArg) -> Self {
        match strategy {
            StrategyArg::Greedy => DeploymentJob::Greedy,
            StrategyArg::Random => DeploymentJob::Random,
            StrategyArg::Genetic => DeploymentJob::Genetic,
        }
    }
}

#[derive(Parser)]
#[command(name = "deploy_tester")]
#[command(version)]
#[command(about = "Place sensors over a prioritized image and render the coverage")]
struct Cli {
    /// Input image (any format the `image` crate reads)
    image: PathBuf,

    /// JSON area configuration; its width and height must match the image
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sensor radius in pixels (ignored with --config)
    #[arg(long, default_value = "10")]
    radius: u32,

    /// Number of sensors (ignored with --config)
    #[arg(long, default_value = "20")]
    sensors: usize,

    /// Number of region clusters
    #[arg(long, default_value = "3")]
    clusters: usize,

    /// Cluster weights in cluster order (comma-separated); defaults to k, k-1, ..., 1 over k
    #[arg(long, value_delimiter = ',')]
    priorities: Vec<f64>,

    /// Construction strategy
    #[arg(long, value_enum, default_value = "greedy")]
    strategy: StrategyArg,

    /// Refine the deployment with simulated annealing
    #[arg(long)]
    anneal: bool,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Output PNG
    #[arg(long, default_value = "deployment.png")]
    output: PathBuf,

    /// Write every engine event as a JSON line to this file
    #[arg(long)]
    events: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn default_priorities(clusters: usize) -> Vec<f64> {
    (0..clusters)
        .map(|i| (clusters - i) as f64 / clusters as f64)
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    let image = image::open(&cli.image)
        .with_context(|| format!("failed to open {}", cli.image.display()))?
        .to_rgba8();

    let mut config = match &cli.config {
        Some(path) => AreaConfig::from_json_file(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => AreaConfig::new(image.width(), image.height(), cli.radius, cli.sensors),
    };
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }

    let priorities = if cli.priorities.is_empty() {
        default_priorities(cli.clusters)
    } else {
        cli.priorities.clone()
    };
    if priorities.len() != cli.clusters {
        bail!(
            "{} priorities given for {} clusters",
            priorities.len(),
            cli.clusters
        );
    }

    let mut area = SensorArea::new(config).context("invalid area configuration")?;
    area.import_image(&image).context("image does not fit the area")?;
    let labels = area
        .run_clustering(Box::new(KMeans::new(100)), cli.clusters)
        .context("clustering failed")?;
    area.set_cluster_priorities(&priorities)?;
    info!(
        regions = labels.len(),
        clusters = cli.clusters,
        ?priorities,
        "area prepared"
    );

    let (worker, mut events) = DeploymentWorker::spawn(area);
    let events_path = cli.events.clone();
    let event_log = tokio::spawn(async move {
        let mut writer = match events_path {
            Some(path) => Some(tokio::io::BufWriter::new(
                tokio::fs::File::create(&path)
                    .await
                    .with_context(|| format!("failed to create {}", path.display()))?,
            )),
            None => None,
        };
        let mut count = 0usize;
        while let Some(event) = events.recv().await {
            count += 1;
            if let Some(writer) = writer.as_mut() {
                let mut line = serde_json::to_vec(&event)?;
                line.push(b'\n');
                writer.write_all(&line).await?;
            }
        }
        if let Some(mut writer) = writer {
            writer.flush().await?;
        }
        anyhow::Ok(count)
    });

    let mut jobs = vec![DeploymentJob::from(cli.strategy)];
    if cli.anneal {
        jobs.push(DeploymentJob::Annealing);
    }
    let reports = worker.run(jobs).await.context("deployment failed")?;
    for report in &reports {
        info!(
            strategy = ?report.strategy,
            placed = report.placed,
            total_priority = report.total_priority,
            mean_component_priority = report.mean_component_priority,
            iterations = report.iterations,
            "run finished"
        );
    }

    let area = worker.shutdown().await?;
    let event_count = event_log.await.context("event log task panicked")??;
    info!(events = event_count, "event stream closed");

    let rendered = render::overlay(&image, &area);
    render::save(&cli.output, &rendered)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;
    info!(output = %cli.output.display(), "coverage map written");
    Ok(())
}

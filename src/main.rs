// Command line driver
//
// Loads the reference image, shrinks it to the working size, runs the
// simulation on a worker thread and writes renders of the best individual.

use clap::{Parser, ValueEnum};
use genetic_image::{render, Config, DiffMode, GenerationReport, Simulation};
use image::imageops::{self, FilterType};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

/// Genetic Image - evolve translucent polygons into a picture
///
/// Options given on the command line override the values of `--config`,
/// which in turn override the built-in defaults.
#[derive(Parser)]
#[command(name = "genetic-image")]
#[command(about = "Approximate an image with evolving polygons", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the reference image (PNG, JPEG, ...)
    #[arg(short, long)]
    input: PathBuf,

    /// JSON file with a base configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of individuals per generation
    #[arg(short, long)]
    population: Option<usize>,

    /// Fraction of each generation allowed to breed, in (0, 1]
    #[arg(long)]
    selection_cutoff: Option<f64>,

    /// Probability that an inherited gene is mutated
    #[arg(long)]
    mutation_chance: Option<f64>,

    /// Maximum change applied to each value of a mutated gene
    #[arg(long)]
    mutate_amount: Option<f64>,

    /// Inherit one contiguous block of genes from each parent
    #[arg(long)]
    random_inheritance: Option<bool>,

    /// Keep the breeding pool unchanged in the next generation
    #[arg(long)]
    fittest_survive: Option<bool>,

    /// Pixel difference metric
    #[arg(long)]
    diff: Option<DiffArg>,

    /// Side of the square working raster, in pixels
    #[arg(short = 'w', long)]
    working_size: Option<u32>,

    /// Number of polygons per genome
    #[arg(short = 'n', long)]
    polygons: Option<usize>,

    /// Number of vertices per polygon
    #[arg(short = 'v', long)]
    vertices: Option<usize>,

    /// Fill polygons (false draws outlines only)
    #[arg(long)]
    fill: Option<bool>,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Number of generations to run; 0 runs until interrupted
    #[arg(short, long, default_value_t = 0)]
    generations: u64,

    /// Output directory for rendered images
    #[arg(short, long, default_value = "./output")]
    output: PathBuf,

    /// Save a numbered snapshot every N generations
    #[arg(long, default_value_t = 100)]
    save_interval: u64,

    /// Side length of the saved renders
    #[arg(long, default_value_t = 350)]
    display_size: u32,

    /// Number of threads for parallel scoring (all cores by default)
    #[arg(short = 't', long)]
    threads: Option<usize>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DiffArg {
    Squared,
    Absolute,
}

impl From<DiffArg> for DiffMode {
    fn from(arg: DiffArg) -> Self {
        match arg {
            DiffArg::Squared => DiffMode::Squared,
            DiffArg::Absolute => DiffMode::Absolute,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Merge the config file and the command line flags
fn build_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };

    if let Some(v) = args.population {
        config.population_size = v;
    }
    if let Some(v) = args.selection_cutoff {
        config.selection_cutoff = v;
    }
    if let Some(v) = args.mutation_chance {
        config.mutation_chance = v;
    }
    if let Some(v) = args.mutate_amount {
        config.mutate_amount = v;
    }
    if let Some(v) = args.random_inheritance {
        config.random_inheritance = v;
    }
    if let Some(v) = args.fittest_survive {
        config.fittest_survive = v;
    }
    if let Some(v) = args.diff {
        config.diff_mode = v.into();
    }
    if let Some(v) = args.working_size {
        config.working_size = v;
    }
    if let Some(v) = args.polygons {
        config.polygon_count = v;
    }
    if let Some(v) = args.vertices {
        config.vertices_per_polygon = v;
    }
    if let Some(v) = args.fill {
        config.fill_polygons = v;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    config.validate()?;
    Ok(config)
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(num_threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .map_err(|e| format!("Failed to configure thread pool: {}", e))?;
        info!("using {} thread(s) for scoring", num_threads);
    }

    let config = build_config(&args)?;
    fs::create_dir_all(&args.output)?;

    if !args.input.exists() {
        return Err(format!("Input file not found: {}", args.input.display()).into());
    }

    // The reference is squashed to a square; aspect ratio is not preserved
    let source = image::open(&args.input)?.to_rgba8();
    info!(
        "loaded {} ({}x{}), working at {}x{}",
        args.input.display(),
        source.width(),
        source.height(),
        config.working_size,
        config.working_size
    );
    let reference = imageops::resize(
        &source,
        config.working_size,
        config.working_size,
        FilterType::Triangle,
    );

    info!(
        "population {}, cutoff {}, mutation {:.1}% x {}, {} polygons of {} vertices",
        config.population_size,
        config.selection_cutoff,
        config.mutation_chance * 100.0,
        config.mutate_amount,
        config.polygon_count,
        config.vertices_per_polygon
    );

    let fill_mode = config.fill_mode();
    let simulation = Simulation::new(config, reference)?;
    let handle = if args.generations > 0 {
        simulation.spawn_until(args.generations)?
    } else {
        simulation.spawn()?
    };

    let pb = if args.generations > 0 {
        let pb = ProgressBar::new(args.generations);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} (ETA: {eta}) | {msg}",
                )?
                .progress_chars("=>-"),
        );
        pb
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("[{elapsed_precise}] {spinner} {pos} | {msg}")?,
        );
        pb
    };

    loop {
        let report = match handle.reports().recv_timeout(Duration::from_millis(250)) {
            Ok(report) => report,
            Err(RecvTimeoutError::Timeout) => continue,
            // The worker reached the last generation or failed; `stop` below
            // returns its error
            Err(RecvTimeoutError::Disconnected) => break,
        };

        pb.set_position(report.generation);
        pb.set_message(format!(
            "Best: {:.3}% (low {:.3}%, high {:.3}%), {:?}/gen",
            report.fitness_percent, report.lowest_percent, report.highest_percent, report.elapsed
        ));

        if args.save_interval > 0 && report.generation % args.save_interval == 0 {
            save_snapshot(&report, &args.output, args.display_size, fill_mode)?;
        }

        // The worker never ticks past the limit, so this is the last report
        if args.generations > 0 && report.generation >= args.generations {
            break;
        }
    }

    let simulation = handle.stop()?;
    pb.finish_with_message("Evolution stopped");

    let best = simulation.best();
    let final_render = render(best.genome(), args.display_size, fill_mode)?;
    final_render.save(args.output.join("best.png"))?;

    println!("\nResults:");
    println!("  Final fitness: {:.4}%", best.fitness() * 100.0);
    println!("  Total generations: {}", simulation.population().generation());
    println!("  Output directory: {}", args.output.display());

    Ok(())
}

/// Render the best individual of a generation at display size
fn save_snapshot(
    report: &GenerationReport,
    output_dir: &Path,
    display_size: u32,
    fill_mode: genetic_image::FillMode,
) -> Result<(), Box<dyn std::error::Error>> {
    let img = render(report.best.genome(), display_size, fill_mode)?;

    img.save(output_dir.join(format!("generation_{:06}.png", report.generation)))?;
    img.save(output_dir.join("latest.png"))?;

    Ok(())
}

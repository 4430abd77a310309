// The simulation actor
//
// `Simulation` owns everything one run needs and advances it a generation at
// a time with `tick`. `Simulation::spawn` moves it onto a worker thread that
// ticks until asked to stop; generations never overlap because a single
// thread runs them back to back.
//
// Results leave the worker two ways:
// - `SimulationHandle::latest` is a snapshot swapped under a lock between
//   generations, for callers that poll
// - `SimulationHandle::reports` is a bounded channel that delivers reports in
//   generation order, for callers that want every one (a lagging reader misses
//   reports rather than stalling the worker)

use crate::config::Config;
use crate::error::Result;
use crate::population::{Evaluator, Individual, Population};

use image::RgbaImage;
use log::{debug, info, trace, warn};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Reports buffered for a slow subscriber before new ones are dropped
const REPORT_BUFFER: usize = 64;

/// What the outside world sees after each generation
#[derive(Clone, Debug)]
pub struct GenerationReport {
    /// Generation number of the population this report describes
    pub generation: u64,

    /// Fittest individual of the generation
    pub best: Individual,

    /// Best fitness, 1.0 being a perfect match
    pub best_fitness: f64,

    /// Best fitness as a percentage
    pub fitness_percent: f64,

    /// Lowest percentage seen so far in the run
    pub lowest_percent: f64,

    /// Highest percentage seen so far in the run
    pub highest_percent: f64,

    /// Mean fitness of the generation
    pub average_fitness: f64,

    /// Wall-clock time spent breeding this generation
    pub elapsed: Duration,
}

/// One run of the genetic algorithm
pub struct Simulation {
    config: Config,
    evaluator: Evaluator,
    population: Population,
    rng: StdRng,

    // Running range of the best-fitness percentage
    lowest_percent: f64,
    highest_percent: f64,
}

impl Simulation {
    /// Validate the configuration and build the random initial population
    ///
    /// # Errors
    /// * `ConfigError` for out-of-domain values or a reference of the wrong size
    /// * `Error::Shortfall` when the selection settings cannot refill the population
    pub fn new(config: Config, reference: RgbaImage) -> Result<Self> {
        let plan = config.selection_plan()?;
        let evaluator = Evaluator::new(Arc::new(reference), &config)?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let population = Population::random(&config, &evaluator, &mut rng)?;
        info!(
            "initial population: {} individuals, {} polygons each, best fitness {:.6}",
            population.len(),
            config.polygon_count,
            population.best().fitness()
        );
        info!(
            "breeding {} parents x {} children per generation{}",
            plan.select_count,
            plan.offspring_per_parent,
            if config.fittest_survive { ", parents survive" } else { "" }
        );

        Ok(Self {
            config,
            evaluator,
            population,
            rng,
            lowest_percent: 100.0,
            highest_percent: 0.0,
        })
    }

    /// Advance exactly one generation and report on it
    pub fn tick(&mut self) -> Result<GenerationReport> {
        let started = Instant::now();
        let next = self
            .population
            .step(&self.config, &self.evaluator, &mut self.rng)?;
        let elapsed = started.elapsed();

        self.population = next;

        let best = self.population.best().clone();
        let fitness_percent = best.fitness() * 100.0;
        self.lowest_percent = self.lowest_percent.min(fitness_percent);
        self.highest_percent = self.highest_percent.max(fitness_percent);

        debug!(
            "generation {} bred in {:?}: best {:.4}%",
            self.population.generation(),
            elapsed,
            fitness_percent
        );

        Ok(GenerationReport {
            generation: self.population.generation(),
            best_fitness: best.fitness(),
            best,
            fitness_percent,
            lowest_percent: self.lowest_percent,
            highest_percent: self.highest_percent,
            average_fitness: self.population.average_fitness(),
            elapsed,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn best(&self) -> &Individual {
        self.population.best()
    }

    /// Run the simulation on its own thread until stopped
    ///
    /// The simulation moves onto a thread named `simulation` and ticks back to
    /// back. After each generation the worker swaps the report into
    /// `SimulationHandle::latest` and offers it to `SimulationHandle::reports`.
    /// The stop flag is checked between generations, never inside one.
    ///
    /// # Errors
    /// Fails only if the OS refuses to start the thread
    pub fn spawn(self) -> std::io::Result<SimulationHandle> {
        self.spawn_worker(None)
    }

    /// Run the simulation on its own thread up to a given generation
    ///
    /// # Arguments
    /// * `last_generation` - Generation number after which the worker exits on
    ///   its own; a simulation already at or past it exits without ticking
    ///
    /// When the worker is done the report channel closes and
    /// `SimulationHandle::stop` hands back a simulation whose population is
    /// exactly at `last_generation`, unless it was stopped earlier.
    pub fn spawn_until(self, last_generation: u64) -> std::io::Result<SimulationHandle> {
        self.spawn_worker(Some(last_generation))
    }

    fn spawn_worker(self, last_generation: Option<u64>) -> std::io::Result<SimulationHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let latest = Arc::new(RwLock::new(None));
        let (tx, rx) = mpsc::sync_channel(REPORT_BUFFER);

        let worker = {
            let stop = Arc::clone(&stop);
            let latest = Arc::clone(&latest);
            thread::Builder::new()
                .name("simulation".to_owned())
                .spawn(move || self.run(last_generation, &stop, &latest, &tx))?
        };

        Ok(SimulationHandle {
            stop,
            latest,
            reports: rx,
            worker: Some(worker),
        })
    }

    /// Worker loop: tick, publish, repeat until stopped or at the last generation
    fn run(
        mut self,
        last_generation: Option<u64>,
        stop: &AtomicBool,
        latest: &RwLock<Option<Arc<GenerationReport>>>,
        tx: &SyncSender<Arc<GenerationReport>>,
    ) -> Result<Simulation> {
        info!("simulation started");

        while !stop.load(Ordering::Acquire)
            && last_generation.map_or(true, |last| self.population.generation() < last)
        {
            let report = match self.tick() {
                Ok(report) => Arc::new(report),
                Err(e) => {
                    warn!("simulation stopped by error: {}", e);
                    return Err(e);
                }
            };

            *latest.write() = Some(Arc::clone(&report));

            match tx.try_send(report) {
                Ok(()) => {}
                Err(TrySendError::Full(report)) => {
                    trace!("subscriber lagging, dropped report {}", report.generation);
                }
                // Nobody is listening; `latest` still carries the result
                Err(TrySendError::Disconnected(_)) => {}
            }
        }

        info!(
            "simulation stopped after {} generations",
            self.population.generation()
        );
        Ok(self)
    }
}

/// Control and results of a simulation running on a worker thread
///
/// Dropping the handle stops the worker and waits for it.
pub struct SimulationHandle {
    stop: Arc<AtomicBool>,
    latest: Arc<RwLock<Option<Arc<GenerationReport>>>>,
    reports: Receiver<Arc<GenerationReport>>,
    worker: Option<JoinHandle<Result<Simulation>>>,
}

impl SimulationHandle {
    /// Report of the most recently finished generation, if any
    pub fn latest(&self) -> Option<Arc<GenerationReport>> {
        self.latest.read().clone()
    }

    /// Reports in generation order
    ///
    /// The channel closes once the worker exits.
    pub fn reports(&self) -> &Receiver<Arc<GenerationReport>> {
        &self.reports
    }

    /// Ask the worker to stop after the current generation
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Stop the worker and hand back the simulation
    ///
    /// # Errors
    /// The error that made the worker stop on its own, if any
    pub fn stop(mut self) -> Result<Simulation> {
        self.request_stop();
        match self.worker.take().map(JoinHandle::join) {
            Some(Ok(result)) => result,
            Some(Err(panic)) => std::panic::resume_unwind(panic),
            None => unreachable!("the worker is only taken by stop or drop"),
        }
    }
}

impl Drop for SimulationHandle {
    fn drop(&mut self) {
        self.request_stop();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

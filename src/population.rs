// Individuals, the population and the evaluator that scores them

use crate::config::Config;
use crate::error::{ConfigError, RenderError, Result};
use crate::fitness::{fitness, DiffMode};
use crate::genes::Genome;
use crate::painting::{render, FillMode};

use image::RgbaImage;
use rand::Rng;
use rayon::prelude::*;
use std::sync::Arc;

/// Renders genomes and scores them against the reference raster
///
/// The reference is shared read-only between every evaluation of a run, so
/// an evaluator can be used from many rayon workers at once.
#[derive(Clone, Debug)]
pub struct Evaluator {
    reference: Arc<RgbaImage>,
    fill_mode: FillMode,
    diff_mode: DiffMode,
}

impl Evaluator {
    /// Build an evaluator for a run
    ///
    /// # Errors
    /// `ConfigError::ReferenceSize` unless the reference is
    /// `working_size` x `working_size`
    pub fn new(reference: Arc<RgbaImage>, config: &Config) -> Result<Self> {
        let (width, height) = reference.dimensions();
        if width != config.working_size || height != config.working_size {
            return Err(ConfigError::ReferenceSize {
                width,
                height,
                expected: config.working_size,
            }
            .into());
        }

        Ok(Self {
            reference,
            fill_mode: config.fill_mode(),
            diff_mode: config.diff_mode,
        })
    }

    /// Render a genome at the working size
    pub fn render(&self, genome: &Genome) -> std::result::Result<RgbaImage, RenderError> {
        render(genome, self.side(), self.fill_mode)
    }

    /// Render a genome and compare it to the reference
    pub fn score(&self, genome: &Genome) -> Result<f64> {
        let candidate = self.render(genome)?;
        Ok(fitness(&candidate, &self.reference, self.diff_mode)?)
    }

    /// Side length of the working raster
    pub fn side(&self) -> u32 {
        self.reference.width()
    }
}

/// A genome together with its fitness
///
/// Fitness is computed once, when the individual is created, and the genome
/// cannot be changed afterwards, so the two never go out of sync. The genome
/// sits behind an `Arc`: surviving parents are carried into the next
/// generation without copying their polygons.
#[derive(Clone, Debug)]
pub struct Individual {
    genome: Arc<Genome>,
    fitness: f64,
}

impl Individual {
    /// Score a genome and wrap it as an individual
    pub fn new(genome: Genome, evaluator: &Evaluator) -> Result<Self> {
        let fitness = evaluator.score(&genome)?;
        Ok(Self {
            genome: Arc::new(genome),
            fitness,
        })
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    /// Shared handle to the genome, for publishing without a copy
    pub fn shared_genome(&self) -> Arc<Genome> {
        Arc::clone(&self.genome)
    }

    /// Fitness in (≈0, 1], higher is better
    pub fn fitness(&self) -> f64 {
        self.fitness
    }
}

/// One generation of individuals
///
/// A population is never empty and, between generation steps, always holds
/// exactly `population_size` individuals.
#[derive(Clone, Debug)]
pub struct Population {
    individuals: Vec<Individual>,

    /// Generation number, 0 for the random initial population
    generation: u64,
}

impl Population {
    /// Wrap a list of already scored individuals
    ///
    /// # Panics
    /// Panics if `individuals` is empty
    pub fn new(individuals: Vec<Individual>, generation: u64) -> Self {
        assert!(!individuals.is_empty(), "A population needs at least one individual");
        Self {
            individuals,
            generation,
        }
    }

    /// Create the random initial population
    ///
    /// Genomes are drawn one after another from `rng`; only the scoring runs
    /// in parallel, so a seeded generator always yields the same population.
    pub fn random(config: &Config, evaluator: &Evaluator, rng: &mut impl Rng) -> Result<Self> {
        config.validate()?;

        let genomes: Vec<Genome> = (0..config.population_size)
            .map(|_| Genome::random(config.polygon_count, config.vertices_per_polygon, rng))
            .collect();

        Ok(Self::new(evaluate_all(genomes, evaluator)?, 0))
    }

    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// The fittest individual; the first one wins a tie
    pub fn best(&self) -> &Individual {
        let mut best = &self.individuals[0];
        for individual in &self.individuals[1..] {
            if individual.fitness > best.fitness {
                best = individual;
            }
        }
        best
    }

    pub fn average_fitness(&self) -> f64 {
        let sum: f64 = self.individuals.iter().map(|i| i.fitness).sum();
        sum / self.individuals.len() as f64
    }

    /// Individuals ordered best first
    ///
    /// The sort is stable, so equal fitness keeps the current order.
    pub fn sorted_by_fitness(&self) -> Vec<Individual> {
        let mut sorted = self.individuals.clone();
        sorted.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
        sorted
    }
}

/// Score many genomes on the rayon pool
///
/// Each worker reads only the shared reference and its own genome; results
/// come back in input order.
pub fn evaluate_all(genomes: Vec<Genome>, evaluator: &Evaluator) -> Result<Vec<Individual>> {
    genomes
        .into_par_iter()
        .map(|genome| Individual::new(genome, evaluator))
        .collect()
}

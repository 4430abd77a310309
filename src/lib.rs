// Library root for the genetic image algorithm
//
// A population of polygon genomes evolves toward a reference raster:
// - genes: the polygons and colors a genome is made of
// - painting: rasterizes a genome
// - fitness: compares a rendering with the reference
// - population / evolution: scoring, selection, breeding
// - simulation: the driver thread and its published results

pub mod config;
pub mod error;
pub mod genes;

// Rendering & fitness
pub mod fitness;
pub mod painting;

// Genetic algorithm engine
pub mod evolution;
pub mod population;
pub mod simulation;

// Re-export commonly used types at the library root, so callers can write
//   use genetic_image::Genome;
// instead of
//   use genetic_image::genes::Genome;
pub use config::{Config, SelectionPlan};
pub use error::{ConfigError, Error, FitnessError, RenderError, Result};
pub use evolution::{breed, BreedingParams};
pub use fitness::DiffMode;
pub use genes::{Color, Genome, Nucleotide, Point, Polygon};
pub use painting::{render, FillMode};
pub use population::{Evaluator, Individual, Population};
pub use simulation::{GenerationReport, Simulation, SimulationHandle};

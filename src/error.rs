// Error types for the genetic image library
//
// Every failure the library can report is one of these enums.
// `thiserror` derives the Display and Error impls from the #[error] strings.

use thiserror::Error;

/// A configuration value outside its allowed domain.
///
/// Detected when a `Config` is validated, so a run never starts with one.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("population_size must be at least 1")]
    EmptyPopulation,

    #[error("selection_cutoff must be in (0, 1], got {0}")]
    SelectionCutoff(f64),

    #[error("mutation_chance must be in [0, 1], got {0}")]
    MutationChance(f64),

    #[error("mutate_amount must be in [0, 1], got {0}")]
    MutateAmount(f64),

    #[error("working_size must be positive")]
    WorkingSize,

    #[error("polygon_count must be at least 1")]
    PolygonCount,

    #[error("vertices_per_polygon must be at least 3, got {0}")]
    VerticesPerPolygon(usize),

    #[error("reference raster is {width}x{height}, expected {expected}x{expected}")]
    ReferenceSize {
        width: u32,
        height: u32,
        expected: u32,
    },

    #[error("failed to read config: {0}")]
    Io(String),

    #[error("failed to parse config: {0}")]
    Parse(String),
}

/// A rasterization request that cannot produce a meaningful image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("canvas side must be positive")]
    EmptyCanvas,

    #[error("polygon {index} has {vertices} vertices, at least 3 are required")]
    DegeneratePolygon { index: usize, vertices: usize },
}

/// A fitness comparison between buffers of different sizes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FitnessError {
    #[error("candidate is {candidate:?} but reference is {reference:?}")]
    DimensionMismatch {
        candidate: (u32, u32),
        reference: (u32, u32),
    },
}

/// Top level error for population and simulation operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Fitness(#[from] FitnessError),

    /// The offspring of one generation cannot refill the population.
    #[error("{offspring} offspring cannot refill {population_size} slots ({required} needed)")]
    Shortfall {
        offspring: usize,
        required: usize,
        population_size: usize,
    },
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

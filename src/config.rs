// Run configuration
//
// One `Config` value describes a whole run. It is validated once before the
// population is built and never changes afterwards.

use crate::error::{ConfigError, Error, Result};
use crate::fitness::DiffMode;
use crate::painting::FillMode;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters controlling the evolution process
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of individuals in every generation
    pub population_size: usize,

    /// Fraction of the sorted population allowed to breed, in (0, 1]
    pub selection_cutoff: f64,

    /// Probability that an inherited gene is mutated, in [0, 1]
    pub mutation_chance: f64,

    /// Maximum change applied to each value of a mutated gene, in [0, 1]
    pub mutate_amount: f64,

    /// Inherit one contiguous block from each parent instead of gene-wise coin flips
    pub random_inheritance: bool,

    /// Carry the breeding pool unchanged into the next generation (elitism)
    pub fittest_survive: bool,

    /// Difference metric used by the fitness function
    pub diff_mode: DiffMode,

    /// Side length of the square working raster, in pixels
    pub working_size: u32,

    /// Number of polygons in every genome
    pub polygon_count: usize,

    /// Number of vertices of every random polygon
    pub vertices_per_polygon: usize,

    /// Fill polygons; when false only their outline is drawn
    pub fill_polygons: bool,

    /// Seed for the random generator; `None` seeds from the OS
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            population_size: 40,
            selection_cutoff: 0.25,
            mutation_chance: 0.024,
            mutate_amount: 0.1,
            random_inheritance: false,
            fittest_survive: false,
            diff_mode: DiffMode::Squared,
            working_size: 70,
            polygon_count: 120,
            vertices_per_polygon: 3,
            fill_polygons: true,
            seed: None,
        }
    }
}

/// How one generation is bred from the sorted population
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectionPlan {
    /// Size of the breeding pool (top individuals by fitness)
    pub select_count: usize,

    /// Children bred from each member of the pool
    pub offspring_per_parent: usize,
}

impl SelectionPlan {
    /// Number of children produced in one generation
    pub fn offspring_count(&self) -> usize {
        self.select_count * self.offspring_per_parent
    }
}

impl Config {
    /// Check every value against its allowed domain
    ///
    /// NaN fails every range check.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.population_size < 1 {
            return Err(ConfigError::EmptyPopulation);
        }
        if !(self.selection_cutoff > 0.0 && self.selection_cutoff <= 1.0) {
            return Err(ConfigError::SelectionCutoff(self.selection_cutoff));
        }
        if !(0.0..=1.0).contains(&self.mutation_chance) {
            return Err(ConfigError::MutationChance(self.mutation_chance));
        }
        if !(0.0..=1.0).contains(&self.mutate_amount) {
            return Err(ConfigError::MutateAmount(self.mutate_amount));
        }
        if self.working_size == 0 {
            return Err(ConfigError::WorkingSize);
        }
        if self.polygon_count < 1 {
            return Err(ConfigError::PolygonCount);
        }
        if self.vertices_per_polygon < 3 {
            return Err(ConfigError::VerticesPerPolygon(self.vertices_per_polygon));
        }
        Ok(())
    }

    /// Work out the breeding pool size and children per parent
    ///
    /// `select_count = floor(population_size * selection_cutoff)` and
    /// `offspring_per_parent = ceil(1 / selection_cutoff)`, minus one when the
    /// parents themselves survive.
    ///
    /// # Errors
    /// `Error::Shortfall` when the children (plus surviving parents) cannot
    /// refill the population. A population of one breeds asexually and
    /// always has a valid plan.
    pub fn selection_plan(&self) -> Result<SelectionPlan> {
        self.validate()?;

        if self.population_size == 1 {
            return Ok(SelectionPlan {
                select_count: 1,
                offspring_per_parent: 1,
            });
        }

        let select_count = (self.population_size as f64 * self.selection_cutoff).floor() as usize;
        let mut offspring_per_parent = (1.0 / self.selection_cutoff).ceil() as usize;
        if self.fittest_survive {
            offspring_per_parent -= 1;
        }

        let plan = SelectionPlan {
            select_count,
            offspring_per_parent,
        };

        let survivors = if self.fittest_survive { select_count } else { 0 };
        let required = self.population_size.saturating_sub(survivors);
        if select_count == 0 || plan.offspring_count() < required {
            return Err(Error::Shortfall {
                offspring: plan.offspring_count(),
                required,
                population_size: self.population_size,
            });
        }

        Ok(plan)
    }

    /// Painting mode implied by `fill_polygons`
    pub fn fill_mode(&self) -> FillMode {
        FillMode::from_fill_flag(self.fill_polygons)
    }

    /// Parse and validate a JSON config; missing fields take their defaults
    pub fn from_json_str(json: &str) -> std::result::Result<Self, ConfigError> {
        let config: Config =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.population_size, 40);
        assert_eq!(config.selection_cutoff, 0.25);
        assert_eq!(config.working_size, 70);
        assert_eq!(config.polygon_count, 120);
        assert_eq!(config.fill_mode(), FillMode::Fill);
    }

    #[test]
    fn test_out_of_domain_values() {
        let cases: Vec<(Config, ConfigError)> = vec![
            (
                Config {
                    population_size: 0,
                    ..Config::default()
                },
                ConfigError::EmptyPopulation,
            ),
            (
                Config {
                    selection_cutoff: 0.0,
                    ..Config::default()
                },
                ConfigError::SelectionCutoff(0.0),
            ),
            (
                Config {
                    selection_cutoff: 1.5,
                    ..Config::default()
                },
                ConfigError::SelectionCutoff(1.5),
            ),
            (
                Config {
                    mutation_chance: -0.1,
                    ..Config::default()
                },
                ConfigError::MutationChance(-0.1),
            ),
            (
                Config {
                    mutate_amount: 2.0,
                    ..Config::default()
                },
                ConfigError::MutateAmount(2.0),
            ),
            (
                Config {
                    working_size: 0,
                    ..Config::default()
                },
                ConfigError::WorkingSize,
            ),
            (
                Config {
                    polygon_count: 0,
                    ..Config::default()
                },
                ConfigError::PolygonCount,
            ),
            (
                Config {
                    vertices_per_polygon: 2,
                    ..Config::default()
                },
                ConfigError::VerticesPerPolygon(2),
            ),
        ];

        for (config, expected) in cases {
            assert_eq!(config.validate(), Err(expected));
        }
    }

    #[test]
    fn test_nan_cutoff_rejected() {
        let config = Config {
            selection_cutoff: f64::NAN,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::SelectionCutoff(_))));
    }

    #[test]
    fn test_selection_sizing_with_elitism() {
        let config = Config {
            population_size: 40,
            selection_cutoff: 0.25,
            fittest_survive: true,
            ..Config::default()
        };
        let plan = config.selection_plan().unwrap();

        assert_eq!(plan.select_count, 10);
        assert_eq!(plan.offspring_per_parent, 3);
        assert_eq!(plan.offspring_count(), 30);
    }

    #[test]
    fn test_selection_sizing_without_elitism() {
        let plan = Config::default().selection_plan().unwrap();
        assert_eq!(plan.select_count, 10);
        assert_eq!(plan.offspring_per_parent, 4);
        assert_eq!(plan.offspring_count(), 40);
    }

    #[test]
    fn test_shortfall_detected() {
        // floor(10 * 0.3) = 3 parents, ceil(1 / 0.3) = 4 children each = 12 >= 10: fine
        let ok = Config {
            population_size: 10,
            selection_cutoff: 0.3,
            ..Config::default()
        };
        assert!(ok.selection_plan().is_ok());

        // floor(10 * 0.35) = 3 parents, ceil(1 / 0.35) = 3 children each = 9 < 10
        let short = Config {
            population_size: 10,
            selection_cutoff: 0.35,
            ..Config::default()
        };
        assert_eq!(
            short.selection_plan(),
            Err(Error::Shortfall {
                offspring: 9,
                required: 10,
                population_size: 10
            })
        );
    }

    #[test]
    fn test_empty_breeding_pool_is_shortfall() {
        // floor(2 * 0.25) = 0 parents
        let config = Config {
            population_size: 2,
            ..Config::default()
        };
        assert!(matches!(config.selection_plan(), Err(Error::Shortfall { offspring: 0, .. })));
    }

    #[test]
    fn test_singleton_plan() {
        let config = Config {
            population_size: 1,
            ..Config::default()
        };
        assert_eq!(
            config.selection_plan().unwrap(),
            SelectionPlan { select_count: 1, offspring_per_parent: 1 }
        );
    }

    #[test]
    fn test_full_cutoff_with_elitism_keeps_everyone() {
        let config = Config {
            population_size: 2,
            selection_cutoff: 1.0,
            fittest_survive: true,
            ..Config::default()
        };
        let plan = config.selection_plan().unwrap();
        assert_eq!(plan.select_count, 2);
        assert_eq!(plan.offspring_per_parent, 0);
    }

    #[test]
    fn test_json_fills_defaults() {
        let config = Config::from_json_str(r#"{ "population_size": 12, "diff_mode": "Absolute" }"#)
            .unwrap();
        assert_eq!(config.population_size, 12);
        assert_eq!(config.diff_mode, DiffMode::Absolute);
        assert_eq!(config.polygon_count, 120);
    }

    #[test]
    fn test_json_is_validated() {
        let err = Config::from_json_str(r#"{ "vertices_per_polygon": 1 }"#).unwrap_err();
        assert_eq!(err, ConfigError::VerticesPerPolygon(1));

        let err = Config::from_json_str("not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_json_file_roundtrip() {
        let config = Config {
            seed: Some(7),
            fittest_survive: true,
            ..Config::default()
        };

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&config).unwrap().as_bytes()).unwrap();

        assert_eq!(Config::from_json_file(file.path()).unwrap(), config);
    }

    #[test]
    fn test_missing_file_reported() {
        let err = Config::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}

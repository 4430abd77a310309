// Breeding and the generation step
//
// One call to `Population::step` runs a whole generation:
//   1. sort the population by fitness (best first)
//   2. keep the top `select_count` as the breeding pool
//   3. breed `offspring_per_parent` children from every pool member
//   4. replace the population with the children (plus the pool under elitism)
// A population of one breeds with itself and keeps the child only if it is
// strictly better, so its fitness never goes down.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::genes::{Genome, Nucleotide};
use crate::population::{evaluate_all, Evaluator, Individual, Population};

use log::debug;
use rand::Rng;

/// The parts of a `Config` that drive breeding
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BreedingParams {
    /// Probability that an inherited gene is mutated
    pub mutation_chance: f64,

    /// Maximum change per value of a mutated gene
    pub mutate_amount: f64,

    /// Split the genome into one block from each parent instead of flipping a
    /// coin per gene
    pub random_inheritance: bool,
}

impl From<&Config> for BreedingParams {
    fn from(config: &Config) -> Self {
        Self {
            mutation_chance: config.mutation_chance,
            mutate_amount: config.mutate_amount,
            random_inheritance: config.random_inheritance,
        }
    }
}

/// Combine two parents into one child genome
///
/// Every gene of the child is copied from either the mother or the father at
/// the same index, then mutated with probability `mutation_chance`.
///
/// - With `random_inheritance`, one split index `k` is drawn per call: genes
///   before `k` come from the mother, the rest from the father.
/// - Otherwise a fair coin picks the parent for each gene.
///
/// # Panics
/// Panics if the parents have different lengths
pub fn breed(
    mother: &Genome,
    father: &Genome,
    params: &BreedingParams,
    rng: &mut impl Rng,
) -> Genome {
    assert_eq!(
        mother.len(),
        father.len(),
        "Parents must have the same number of genes"
    );

    let length = mother.len();
    let split = if params.random_inheritance {
        (rng.gen::<f64>() * length as f64).floor() as usize
    } else {
        0
    };

    mother
        .iter()
        .zip(father.iter())
        .enumerate()
        .map(|(i, (from_mother, from_father))| {
            let inherited = if params.random_inheritance {
                if i < split {
                    from_mother
                } else {
                    from_father
                }
            } else if rng.gen_bool(0.5) {
                from_mother
            } else {
                from_father
            };

            mutate_gene(inherited, params, rng)
        })
        .collect()
}

/// Copy a gene, mutating it with probability `mutation_chance`
fn mutate_gene(gene: &Nucleotide, params: &BreedingParams, rng: &mut impl Rng) -> Nucleotide {
    if rng.gen::<f64>() < params.mutation_chance {
        gene.mutate(params.mutate_amount, rng)
    } else {
        gene.clone()
    }
}

/// Pick a breeding partner for pool member `i`
///
/// Resamples until the partner differs from `i`. A pool of one has no other
/// member, so the parent breeds with itself.
fn pick_partner(i: usize, pool_size: usize, rng: &mut impl Rng) -> usize {
    if pool_size < 2 {
        return i;
    }
    loop {
        let j = rng.gen_range(0..pool_size);
        if j != i {
            return j;
        }
    }
}

impl Population {
    /// Run one generation and return the next population
    ///
    /// # Arguments
    /// * `config` - Selection cutoff, elitism and mutation settings
    /// * `evaluator` - Scores the children against the reference
    /// * `rng` - Source of every random choice made while breeding
    ///
    /// The population is sorted best first and the top
    /// `floor(population_size * selection_cutoff)` individuals form the
    /// breeding pool. Each of them breeds `offspring_per_parent` children with
    /// a random other member of the pool. With `fittest_survive` the pool is
    /// carried over unchanged ahead of the children. Anything beyond
    /// `population_size` is cut off.
    ///
    /// `self` is left untouched. Breeding draws from `rng` sequentially and only
    /// the scoring of children runs in parallel, so a seeded generator makes
    /// the whole step reproducible.
    ///
    /// # Errors
    /// * `Error::Shortfall` if the configuration cannot refill the population
    /// * any render or fitness error raised while scoring children
    pub fn step(
        &self,
        config: &Config,
        evaluator: &Evaluator,
        rng: &mut impl Rng,
    ) -> Result<Population> {
        let params = BreedingParams::from(config);

        if config.population_size == 1 {
            return self.step_asexual(&params, evaluator, rng);
        }

        let plan = config.selection_plan()?;

        // Evaluate: fitness is already known, so this is just the sort
        let sorted = self.sorted_by_fitness();

        // Select
        let pool = &sorted[..plan.select_count.min(sorted.len())];

        // Breed
        let mut genomes = Vec::with_capacity(plan.offspring_count());
        for (i, parent) in pool.iter().enumerate() {
            for _ in 0..plan.offspring_per_parent {
                let partner = &pool[pick_partner(i, pool.len(), rng)];
                genomes.push(breed(parent.genome(), partner.genome(), &params, rng));
            }
        }
        let offspring = evaluate_all(genomes, evaluator)?;

        // Replace
        let mut next: Vec<Individual> = Vec::with_capacity(config.population_size);
        if config.fittest_survive {
            next.extend(pool.iter().cloned());
        }
        let offspring_count = offspring.len();
        next.extend(offspring);

        if next.len() < config.population_size {
            return Err(Error::Shortfall {
                offspring: offspring_count,
                required: config.population_size - (next.len() - offspring_count),
                population_size: config.population_size,
            });
        }
        next.truncate(config.population_size);

        let next = Population::new(next, self.generation() + 1);
        debug!(
            "generation {}: pool {} x {} children, best {:.6}",
            next.generation(),
            pool.len(),
            plan.offspring_per_parent,
            next.best().fitness()
        );

        Ok(next)
    }

    /// Hill-climbing step for a population of one
    fn step_asexual(
        &self,
        params: &BreedingParams,
        evaluator: &Evaluator,
        rng: &mut impl Rng,
    ) -> Result<Population> {
        let parent = &self.individuals()[0];
        let child_genome = breed(parent.genome(), parent.genome(), params, rng);
        let child = Individual::new(child_genome, evaluator)?;

        let survivor = if child.fitness() > parent.fitness() {
            child
        } else {
            parent.clone()
        };

        Ok(Population::new(vec![survivor], self.generation() + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn no_mutation(random_inheritance: bool) -> BreedingParams {
        BreedingParams {
            mutation_chance: 0.0,
            mutate_amount: 0.1,
            random_inheritance,
        }
    }

    fn evaluator_for(config: &Config) -> Evaluator {
        let side = config.working_size;
        let reference = RgbaImage::from_pixel(side, side, Rgba([180, 90, 30, 255]));
        Evaluator::new(Arc::new(reference), config).unwrap()
    }

    #[test]
    fn test_breeding_keeps_length() {
        let mut rng = StdRng::seed_from_u64(1);
        let mother = Genome::random(20, 3, &mut rng);
        let father = Genome::random(20, 3, &mut rng);

        let params = BreedingParams {
            mutation_chance: 0.5,
            mutate_amount: 0.2,
            random_inheritance: false,
        };
        let child = breed(&mother, &father, &params, &mut rng);
        assert_eq!(child.len(), 20);
    }

    #[test]
    fn test_random_inheritance_is_two_blocks() {
        let mut rng = StdRng::seed_from_u64(2);
        let mother = Genome::random(30, 3, &mut rng);
        let father = Genome::random(30, 3, &mut rng);

        for _ in 0..50 {
            let child = breed(&mother, &father, &no_mutation(true), &mut rng);

            // Once a gene comes from the father, every later one must too
            let mut seen_father = false;
            for i in 0..child.len() {
                let gene = &child.nucleotides()[i];
                if gene == &father.nucleotides()[i] {
                    seen_father = true;
                } else {
                    assert!(!seen_father, "gene {} switched back to the mother", i);
                    assert_eq!(gene, &mother.nucleotides()[i]);
                }
            }
            // The split index is below the length, so the last gene is the father's
            assert_eq!(child.nucleotides()[29], father.nucleotides()[29]);
        }
    }

    #[test]
    fn test_full_mutation_changes_genes() {
        let mut rng = StdRng::seed_from_u64(3);
        let mother = Genome::random(10, 3, &mut rng);

        let params = BreedingParams {
            mutation_chance: 1.0,
            mutate_amount: 0.5,
            random_inheritance: false,
        };
        let child = breed(&mother, &mother, &params, &mut rng);

        let unchanged = child
            .iter()
            .zip(mother.iter())
            .filter(|(c, m)| c == m)
            .count();
        assert_eq!(unchanged, 0);
    }

    #[test]
    #[should_panic(expected = "same number of genes")]
    fn test_unequal_parents_panic() {
        let mut rng = StdRng::seed_from_u64(4);
        let mother = Genome::random(5, 3, &mut rng);
        let father = Genome::random(6, 3, &mut rng);
        breed(&mother, &father, &no_mutation(false), &mut rng);
    }

    #[test]
    fn test_pick_partner_never_self() {
        let mut rng = StdRng::seed_from_u64(5);
        for i in 0..4 {
            for _ in 0..100 {
                let j = pick_partner(i, 4, &mut rng);
                assert!(j < 4 && j != i);
            }
        }
        assert_eq!(pick_partner(0, 1, &mut rng), 0);
    }

    #[test]
    fn test_step_keeps_population_size() {
        let mut rng = StdRng::seed_from_u64(6);
        for (size, cutoff) in [(1, 0.25), (2, 0.5), (40, 0.25)] {
            for fittest_survive in [false, true] {
                let config = Config {
                    population_size: size,
                    selection_cutoff: cutoff,
                    fittest_survive,
                    working_size: 16,
                    polygon_count: 8,
                    ..Config::default()
                };
                let evaluator = evaluator_for(&config);
                let mut pop = Population::random(&config, &evaluator, &mut rng).unwrap();

                for _ in 0..3 {
                    assert_eq!(pop.len(), size);
                    pop = pop.step(&config, &evaluator, &mut rng).unwrap();
                }
                assert_eq!(pop.len(), size);
                assert_eq!(pop.generation(), 3);
            }
        }
    }

    #[test]
    fn test_elitism_preserves_top_parents() {
        let config = Config {
            population_size: 40,
            selection_cutoff: 0.25,
            fittest_survive: true,
            working_size: 16,
            polygon_count: 8,
            ..Config::default()
        };
        let evaluator = evaluator_for(&config);
        let mut rng = StdRng::seed_from_u64(7);
        let pop = Population::random(&config, &evaluator, &mut rng).unwrap();

        let top = pop.sorted_by_fitness();
        let next = pop.step(&config, &evaluator, &mut rng).unwrap();

        for elite in &top[..10] {
            assert!(next
                .individuals()
                .iter()
                .any(|i| i.genome() == elite.genome() && i.fitness() == elite.fitness()));
        }
        // Parents come first, in fitness order
        for (kept, elite) in next.individuals().iter().zip(&top[..10]) {
            assert!(Arc::ptr_eq(&kept.shared_genome(), &elite.shared_genome()));
        }
    }

    #[test]
    fn test_singleton_never_gets_worse() {
        let config = Config {
            population_size: 1,
            mutation_chance: 0.5,
            working_size: 16,
            polygon_count: 8,
            ..Config::default()
        };
        let evaluator = evaluator_for(&config);
        let mut rng = StdRng::seed_from_u64(8);
        let mut pop = Population::random(&config, &evaluator, &mut rng).unwrap();

        let mut previous = pop.best().fitness();
        for _ in 0..25 {
            pop = pop.step(&config, &evaluator, &mut rng).unwrap();
            assert!(pop.best().fitness() >= previous);
            previous = pop.best().fitness();
        }
    }

    #[test]
    fn test_seeded_steps_are_reproducible() {
        let config = Config {
            population_size: 8,
            selection_cutoff: 0.5,
            working_size: 16,
            polygon_count: 6,
            ..Config::default()
        };
        let evaluator = evaluator_for(&config);

        let run = || {
            let mut rng = StdRng::seed_from_u64(99);
            let mut pop = Population::random(&config, &evaluator, &mut rng).unwrap();
            for _ in 0..3 {
                pop = pop.step(&config, &evaluator, &mut rng).unwrap();
            }
            pop.individuals().iter().map(|i| i.fitness()).collect::<Vec<_>>()
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn test_shortfall_is_reported_not_truncated() {
        let valid = Config {
            population_size: 10,
            working_size: 8,
            polygon_count: 4,
            ..Config::default()
        };
        let evaluator = evaluator_for(&valid);
        let mut rng = StdRng::seed_from_u64(10);
        let pop = Population::random(&valid, &evaluator, &mut rng).unwrap();

        let short = Config {
            selection_cutoff: 0.35,
            ..valid
        };
        let err = pop.step(&short, &evaluator, &mut rng).unwrap_err();
        assert!(matches!(err, Error::Shortfall { .. }));
    }

    proptest! {
        #[test]
        fn uniform_crossover_copies_parent_genes(seed in any::<u64>(), length in 1usize..40) {
            let mut rng = StdRng::seed_from_u64(seed);
            let mother = Genome::random(length, 3, &mut rng);
            let father = Genome::random(length, 3, &mut rng);

            let child = breed(&mother, &father, &no_mutation(false), &mut rng);

            prop_assert_eq!(child.len(), length);
            for i in 0..length {
                let gene = &child.nucleotides()[i];
                prop_assert!(gene == &mother.nucleotides()[i] || gene == &father.nucleotides()[i]);
            }
        }
    }
}

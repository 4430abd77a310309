// The genes module: everything a genome is made of
//
// - `color` and `polygon` hold the two halves of a gene
// - this file ties them together as `Nucleotide` and `Genome`
// - the random constructors and `mutate` methods form the genome factory

use rand::Rng;
use serde::{Deserialize, Serialize};

mod color;
mod polygon;

pub use color::Color;
pub use polygon::{Point, Polygon};

/// Nudge a normalized value by a random amount and clamp it to [0, 1]
///
/// The offset is uniform in `[-amount, amount)`.
pub fn mutate_value(value: f64, amount: f64, rng: &mut impl Rng) -> f64 {
    (value + (rng.gen::<f64>() * 2.0 - 1.0) * amount).clamp(0.0, 1.0)
}

/// One paintable shape: a polygon and its fill color
///
/// Nucleotides are values. Mutation returns a new nucleotide and leaves the
/// original untouched, so parents can be shared between many children.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Nucleotide {
    color: Color,
    polygon: Polygon,
}

impl Nucleotide {
    pub fn new(color: Color, polygon: Polygon) -> Self {
        Self { color, polygon }
    }

    /// Create a random nucleotide with `vertex_count` vertices
    pub fn random(vertex_count: usize, rng: &mut impl Rng) -> Self {
        Self {
            color: Color::random(rng),
            polygon: Polygon::random(vertex_count, rng),
        }
    }

    /// Return a mutated copy
    ///
    /// Every color channel and every polygon coordinate moves independently
    /// by up to `amount`, clamped to [0, 1].
    pub fn mutate(&self, amount: f64, rng: &mut impl Rng) -> Self {
        Self {
            color: self.color.mutate(amount, rng),
            polygon: self.polygon.mutate(amount, rng),
        }
    }

    pub fn color(&self) -> &Color {
        &self.color
    }

    pub fn polygon(&self) -> &Polygon {
        &self.polygon
    }
}

/// An ordered list of nucleotides, painted first to last
///
/// The length is fixed for a whole run: breeding always produces a child
/// with exactly as many genes as its parents.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    nucleotides: Vec<Nucleotide>,
}

impl Genome {
    /// Create a genome of `polygon_count` independent random nucleotides
    pub fn random(polygon_count: usize, vertex_count: usize, rng: &mut impl Rng) -> Self {
        let nucleotides = (0..polygon_count)
            .map(|_| Nucleotide::random(vertex_count, rng))
            .collect();

        Self { nucleotides }
    }

    pub fn nucleotides(&self) -> &[Nucleotide] {
        &self.nucleotides
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Nucleotide> {
        self.nucleotides.iter()
    }

    pub fn len(&self) -> usize {
        self.nucleotides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nucleotides.is_empty()
    }
}

impl From<Vec<Nucleotide>> for Genome {
    fn from(nucleotides: Vec<Nucleotide>) -> Self {
        Self { nucleotides }
    }
}

impl FromIterator<Nucleotide> for Genome {
    fn from_iter<I: IntoIterator<Item = Nucleotide>>(iter: I) -> Self {
        Self {
            nucleotides: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Genome {
    type Item = &'a Nucleotide;
    type IntoIter = std::slice::Iter<'a, Nucleotide>;

    fn into_iter(self) -> Self::IntoIter {
        self.nucleotides.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_genome_shape() {
        let mut rng = StdRng::seed_from_u64(42);
        let genome = Genome::random(120, 3, &mut rng);

        assert_eq!(genome.len(), 120);
        assert!(genome.iter().all(|n| n.polygon().len() == 3));
    }

    #[test]
    fn test_mutate_leaves_original_untouched() {
        let mut rng = StdRng::seed_from_u64(5);
        let original = Nucleotide::random(4, &mut rng);
        let snapshot = original.clone();

        let mutated = original.mutate(0.5, &mut rng);

        assert_eq!(original, snapshot);
        assert_ne!(mutated, original);
        assert_eq!(mutated.polygon().len(), 4);
    }

    #[test]
    fn test_mutate_with_zero_amount_only_clamps() {
        let mut rng = StdRng::seed_from_u64(9);
        let nucleotide = Nucleotide::new(
            Color::new(0.1, 0.2, 0.3, 0.4),
            Polygon::new(vec![
                Point::new(0.1, 0.1),
                Point::new(0.9, 0.1),
                Point::new(0.5, 0.9),
            ]),
        );

        assert_eq!(nucleotide.mutate(0.0, &mut rng), nucleotide);
    }

    #[test]
    fn test_genome_from_iterator() {
        let mut rng = StdRng::seed_from_u64(3);
        let genome: Genome = (0..5).map(|_| Nucleotide::random(3, &mut rng)).collect();
        assert_eq!(genome.len(), 5);
        assert_eq!((&genome).into_iter().count(), 5);
    }

    proptest! {
        #[test]
        fn mutate_value_stays_in_unit_range(
            value in 0.0f64..=1.0,
            amount in 0.0f64..=1.0,
            seed in any::<u64>(),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let mutated = mutate_value(value, amount, &mut rng);
            prop_assert!((0.0..=1.0).contains(&mutated));
            prop_assert!((mutated - value).abs() <= amount + 1e-12);
        }
    }
}

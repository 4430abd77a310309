use rand::Rng;
use serde::{Deserialize, Serialize};

use super::mutate_value;

/// A vertex in normalized canvas space
///
/// (0, 0) is the top-left corner and (1, 1) the bottom-right one.
/// Coordinates are not clamped: random polygons may reach past the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An ordered list of vertices, closed from the last point back to the first
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    points: Vec<Point>,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Create a small random blob
    ///
    /// A base point is drawn uniformly in the unit square, then every vertex
    /// is offset from it by `uniform - 0.5` on each axis independently.
    pub fn random(vertex_count: usize, rng: &mut impl Rng) -> Self {
        let base = Point::new(rng.gen::<f64>(), rng.gen::<f64>());

        let points = (0..vertex_count)
            .map(|_| {
                let x = base.x + rng.gen::<f64>() - 0.5;
                let y = base.y + rng.gen::<f64>() - 0.5;
                Point::new(x, y)
            })
            .collect();

        Self { points }
    }

    /// Return a copy with every coordinate mutated independently
    ///
    /// Mutated coordinates are clamped to [0, 1].
    pub fn mutate(&self, amount: f64, rng: &mut impl Rng) -> Self {
        let points = self
            .points
            .iter()
            .map(|p| Point::new(mutate_value(p.x, amount, rng), mutate_value(p.y, amount, rng)))
            .collect();

        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

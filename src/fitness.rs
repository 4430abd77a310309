// The fitness evaluator: how close is a rendered canvas to the reference?
//
// Only the R, G and B channels are compared. Alpha is a generative trait of
// the polygons, not something to match against the reference.

use crate::error::FitnessError;

use image::RgbaImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Bytes per RGBA pixel
const CHANNELS: usize = 4;

/// Per-channel difference metric
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffMode {
    /// Sum of squared channel differences
    #[default]
    Squared,
    /// Sum of absolute channel differences
    Absolute,
}

impl DiffMode {
    /// Difference contributed by one channel pair
    #[inline]
    fn channel_diff(self, candidate: u8, reference: u8) -> u64 {
        let dp = candidate as i64 - reference as i64;
        match self {
            DiffMode::Squared => (dp * dp) as u64,
            DiffMode::Absolute => dp.unsigned_abs(),
        }
    }

    /// Largest difference a single channel can contribute
    fn max_channel_diff(self) -> u64 {
        match self {
            DiffMode::Squared => 255 * 255,
            DiffMode::Absolute => 255,
        }
    }
}

fn check_dimensions(candidate: &RgbaImage, reference: &RgbaImage) -> Result<(), FitnessError> {
    if candidate.dimensions() != reference.dimensions() {
        return Err(FitnessError::DimensionMismatch {
            candidate: candidate.dimensions(),
            reference: reference.dimensions(),
        });
    }
    Ok(())
}

/// Total RGB difference of one run of whole pixels
fn pixel_diff(candidate: &[u8], reference: &[u8], mode: DiffMode) -> u64 {
    candidate
        .chunks_exact(CHANNELS)
        .zip(reference.chunks_exact(CHANNELS))
        .map(|(c, r)| {
            // c[3] and r[3] are alpha and never compared
            mode.channel_diff(c[0], r[0])
                + mode.channel_diff(c[1], r[1])
                + mode.channel_diff(c[2], r[2])
        })
        .sum()
}

/// Map a raw difference onto a fitness score
///
/// 1.0 is a perfect RGB match; 0.0 is the maximum possible difference.
fn normalize(diff: u64, candidate: &RgbaImage, mode: DiffMode) -> f64 {
    let pixels = candidate.width() as u64 * candidate.height() as u64;
    let max_diff = pixels * 3 * mode.max_channel_diff();
    if max_diff == 0 {
        // An empty canvas matches an empty reference perfectly
        return 1.0;
    }
    1.0 - diff as f64 / max_diff as f64
}

/// Raw accumulated RGB difference between two images
///
/// Visits every pixel's three color channels exactly once, so the result never
/// exceeds `width * height * 3 * max_channel_diff`.
///
/// # Errors
/// `FitnessError::DimensionMismatch` if the images differ in size
pub fn raw_diff(
    candidate: &RgbaImage,
    reference: &RgbaImage,
    mode: DiffMode,
) -> Result<u64, FitnessError> {
    check_dimensions(candidate, reference)?;
    Ok(pixel_diff(candidate.as_raw(), reference.as_raw(), mode))
}

/// Fitness of a candidate against the reference (higher is better)
///
/// `fitness = 1 - diff / max_diff` where `max_diff` is
/// `side * side * 3 * 255²` for `Squared` and `side * side * 3 * 255` for
/// `Absolute`.
///
/// # Errors
/// `FitnessError::DimensionMismatch` if the images differ in size
pub fn fitness(
    candidate: &RgbaImage,
    reference: &RgbaImage,
    mode: DiffMode,
) -> Result<f64, FitnessError> {
    let diff = raw_diff(candidate, reference, mode)?;
    Ok(normalize(diff, candidate, mode))
}

/// Parallel version of `fitness` for large canvases
///
/// Splits the buffers into row bands and sums them on the rayon pool.
/// Integer accumulation makes the result identical to the sequential one.
pub fn fitness_parallel(
    candidate: &RgbaImage,
    reference: &RgbaImage,
    mode: DiffMode,
) -> Result<f64, FitnessError> {
    check_dimensions(candidate, reference)?;

    // Whole rows per chunk so a chunk never splits a pixel
    let row_bytes = (candidate.width() as usize * CHANNELS).max(CHANNELS);

    let diff: u64 = candidate
        .as_raw()
        .par_chunks(row_bytes)
        .zip(reference.as_raw().par_chunks(row_bytes))
        .map(|(c, r)| pixel_diff(c, r, mode))
        .sum();

    Ok(normalize(diff, candidate, mode))
}

// The raster engine: turns a genome into pixels
//
// Polygons are painted in genome order onto an opaque black canvas (painter's
// algorithm, no depth buffer). Every pixel a polygon covers is composited
// exactly once per polygon with
//   dst = src.rgb * src.a + dst.rgb * (1 - src.a)
// and the canvas alpha stays at 255.

use crate::error::RenderError;
use crate::genes::{Color, Genome, Polygon};

use image::{Rgba, RgbaImage};
use imageproc::drawing::BresenhamLineIter;
use serde::{Deserialize, Serialize};

/// Canvas color before any polygon is drawn
const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// How polygons are painted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillMode {
    /// Fill the interior using the even-odd rule
    #[default]
    Fill,
    /// Draw only the closed outline, one pixel wide
    Stroke,
}

impl FillMode {
    /// Map the `fill_polygons` flag onto a mode
    pub fn from_fill_flag(fill: bool) -> Self {
        if fill {
            FillMode::Fill
        } else {
            FillMode::Stroke
        }
    }
}

/// Pixels covered by the polygon currently being drawn
///
/// The mask guarantees a pixel is blended once per polygon, even where two
/// outline segments meet at a shared vertex.
struct Coverage {
    side: u32,
    marked: Vec<bool>,
    pixels: Vec<(u32, u32)>,
}

impl Coverage {
    fn new(side: u32) -> Self {
        Self {
            side,
            marked: vec![false; side as usize * side as usize],
            pixels: Vec::new(),
        }
    }

    /// Mark a pixel; anything outside the canvas is ignored
    fn mark(&mut self, x: i64, y: i64) {
        let side = self.side as i64;
        if x < 0 || y < 0 || x >= side || y >= side {
            return;
        }

        let idx = (y * side + x) as usize;
        if !self.marked[idx] {
            self.marked[idx] = true;
            self.pixels.push((x as u32, y as u32));
        }
    }

    /// Blend the color onto every marked pixel, then reset the mask
    fn composite(&mut self, img: &mut RgbaImage, color: &Color) {
        let alpha = color.opacity();
        let inv_alpha = 1.0 - alpha;
        let src = color.rgb8();

        for &(x, y) in &self.pixels {
            let dst = img.get_pixel_mut(x, y);
            for channel in 0..3 {
                let blended = src[channel] * alpha + dst.0[channel] as f64 * inv_alpha;
                dst.0[channel] = blended.round().clamp(0.0, 255.0) as u8;
            }
            self.marked[(y * self.side + x) as usize] = false;
        }

        self.pixels.clear();
    }
}

/// Render a genome onto a `side` x `side` canvas
///
/// # Arguments
/// * `genome` - Polygons to paint, bottom to top
/// * `side` - Width and height of the canvas in pixels; normalized vertices
///   are multiplied by it
/// * `mode` - Fill interiors or trace one-pixel outlines
///
/// The output depends only on these three inputs: the same genome, side and
/// mode always give byte-identical images. Geometry outside the canvas is
/// clipped in both modes.
///
/// # Errors
/// * `RenderError::EmptyCanvas` when `side` is zero
/// * `RenderError::DegeneratePolygon` when any polygon has fewer than 3 vertices
pub fn render(genome: &Genome, side: u32, mode: FillMode) -> Result<RgbaImage, RenderError> {
    if side == 0 {
        return Err(RenderError::EmptyCanvas);
    }

    // Reject the whole genome up front rather than returning a half-drawn image
    if let Some((index, nucleotide)) = genome
        .iter()
        .enumerate()
        .find(|(_, n)| n.polygon().len() < 3)
    {
        return Err(RenderError::DegeneratePolygon {
            index,
            vertices: nucleotide.polygon().len(),
        });
    }

    let mut img = RgbaImage::from_pixel(side, side, BACKGROUND);
    let mut coverage = Coverage::new(side);
    let mut vertices: Vec<(f64, f64)> = Vec::new();

    for nucleotide in genome {
        scale_vertices(nucleotide.polygon(), side, &mut vertices);

        match mode {
            FillMode::Fill => scan_fill(&vertices, side, &mut coverage),
            FillMode::Stroke => trace_outline(&vertices, &mut coverage),
        }

        coverage.composite(&mut img, nucleotide.color());
    }

    Ok(img)
}

/// Convert normalized vertices to pixel space
fn scale_vertices(polygon: &Polygon, side: u32, out: &mut Vec<(f64, f64)>) {
    let scale = side as f64;
    out.clear();
    out.extend(polygon.points().iter().map(|p| (p.x * scale, p.y * scale)));
}

/// Mark interior pixels with an even-odd scanline fill
///
/// A pixel is inside when its center is. Each row collects the crossings of
/// the horizontal line through the pixel centers with every edge, sorts them
/// and fills between consecutive pairs. Edges are treated as half-open in y
/// so a vertex lying on the scanline is counted once and the number of
/// crossings is always even.
fn scan_fill(vertices: &[(f64, f64)], side: u32, coverage: &mut Coverage) {
    let (min_y, max_y) = vertices
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, y)| {
            (lo.min(y), hi.max(y))
        });

    // Rows whose center lies in [min_y, max_y)
    let first_row = (min_y - 0.5).ceil().clamp(0.0, side as f64) as i64;
    let last_row = (max_y - 0.5).ceil().clamp(0.0, side as f64) as i64;

    let mut crossings: Vec<f64> = Vec::with_capacity(vertices.len());

    for row in first_row..last_row {
        let center_y = row as f64 + 0.5;
        crossings.clear();

        for (i, &(x0, y0)) in vertices.iter().enumerate() {
            let (x1, y1) = vertices[(i + 1) % vertices.len()];
            if (y0 <= center_y) != (y1 <= center_y) {
                crossings.push(x0 + (center_y - y0) * (x1 - x0) / (y1 - y0));
            }
        }

        crossings.sort_by(f64::total_cmp);

        for span in crossings.chunks_exact(2) {
            let start = (span[0] - 0.5).ceil().clamp(0.0, side as f64) as i64;
            let end = (span[1] - 0.5).ceil().clamp(0.0, side as f64) as i64;
            for x in start..end {
                coverage.mark(x, row);
            }
        }
    }
}

/// Mark the pixels of every edge, closing the loop back to the first vertex
///
/// Endpoints are floored to the pixel that contains them. A plain cast
/// truncates toward zero and would pull anything in (-1, 0) onto the border.
fn trace_outline(vertices: &[(f64, f64)], coverage: &mut Coverage) {
    for (i, &(x0, y0)) in vertices.iter().enumerate() {
        let (x1, y1) = vertices[(i + 1) % vertices.len()];
        let start = (x0.floor() as f32, y0.floor() as f32);
        let end = (x1.floor() as f32, y1.floor() as f32);
        for (x, y) in BresenhamLineIter::new(start, end) {
            coverage.mark(x as i64, y as i64);
        }
    }
}

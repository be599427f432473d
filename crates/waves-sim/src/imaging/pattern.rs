//! Aperture masks carved into the emitters.

use crate::error::{SimError, SimResult};
use std::path::Path;

/// Per-column/row switch for emitter cells in the xy plane. A masked-out
/// cell is never driven, whatever its z.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApertureMask {
    width: usize,
    height: usize,
    open: Vec<bool>,
}

impl ApertureMask {
    /// A mask that lets every cell through.
    pub fn full(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            open: vec![true; width * height],
        }
    }

    /// Build from row-major open flags.
    pub fn from_bits(width: usize, height: usize, open: Vec<bool>) -> SimResult<Self> {
        if open.len() != width * height {
            return Err(SimError::pattern_decode(format!(
                "{} mask entries for a {width}x{height} pattern",
                open.len()
            )));
        }
        Ok(Self {
            width,
            height,
            open,
        })
    }

    /// Build by evaluating `f(x, y)` for every position.
    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> bool) -> Self {
        let open = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        Self {
            width,
            height,
            open,
        }
    }

    /// Pattern width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Pattern height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Whether the emitter may drive `(x, y)`. Positions outside the
    /// pattern are closed.
    #[inline]
    pub fn allows(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.open[y * self.width + x]
    }

    /// Number of open positions.
    pub fn open_count(&self) -> usize {
        self.open.iter().filter(|&&o| o).count()
    }
}

/// Turns a pattern file into a mask.
pub trait PatternDecoder: Send {
    /// Decode the pattern at `path`.
    fn decode(&self, path: &Path) -> SimResult<ApertureMask>;
}

/// Decodes any image format the `image` crate was built with; pixels whose
/// luma reaches the threshold are open.
#[derive(Debug, Clone, Copy)]
pub struct ImagePatternDecoder {
    /// Luma at or above which a pixel is open.
    pub threshold: u8,
}

impl Default for ImagePatternDecoder {
    fn default() -> Self {
        Self { threshold: 128 }
    }
}

impl PatternDecoder for ImagePatternDecoder {
    fn decode(&self, path: &Path) -> SimResult<ApertureMask> {
        let image = image::open(path)
            .map_err(|e| SimError::pattern_decode(format!("{}: {e}", path.display())))?
            .to_luma8();
        let (width, height) = image.dimensions();
        let open = image.pixels().map(|p| p.0[0] >= self.threshold).collect();
        ApertureMask::from_bits(width as usize, height as usize, open)
    }
}

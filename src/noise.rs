//! Procedural turbulence volume used to distort the water surface.
//!
//! A uniform random seed field is generated once and then smoothed at six
//! octaves (zoom 32 down to 1) with trilinear interpolation. The result is
//! quantised to 8-bit luminance and uploaded as a static 3D texture.
//!
//! ## Wraparound
//!
//! When the lower lattice neighbour of a sample would fall below zero, it wraps
//! to `round(extent / zoom) - 1` rather than `extent - 1`. Each octave therefore
//! tiles at its own native resolution. Tiny volumes can make that expression
//! negative, in which case it is pinned to 0.
//!
//! ## Range
//!
//! The sine base term lies in `[0, 16]` and the six octaves add up to
//! `63 * seed`, so raw turbulence spans `[0, 316]` after the `128 / 32` scale.
//! Cells whose seeds sit near 1 exceed 255 and saturate to 255 when quantised.
//! The volume's brightest region is therefore flat rather than rescaled.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Largest zoom level (first octave).
pub const MAX_ZOOM: f64 = 32.0;

/// Octaves stop once zoom falls below this value.
const MIN_ZOOM: f64 = 0.9;

/// Uniform random values in `[0, 1)`, one per cell.
///
/// Consumed read-only by [`SeedField::turbulence`]; the turbulence itself is
/// fully deterministic for a given field.
#[derive(Debug, Clone)]
pub struct SeedField {
    width: usize,
    height: usize,
    depth: usize,
    values: Vec<f32>,
}

impl SeedField {
    /// Fill a field from the given random source.
    pub fn random<R: Rng + ?Sized>(width: usize, height: usize, depth: usize, rng: &mut R) -> Self {
        let values = (0..width * height * depth).map(|_| rng.gen::<f32>()).collect();
        Self { width, height, depth, values }
    }

    /// Fill a field from a fixed seed (repeatable across runs).
    pub fn seeded(width: usize, height: usize, depth: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::random(width, height, depth, &mut rng)
    }

    /// Wrap pre-computed values. `values` is indexed `x * (h * d) + y * d + z`.
    pub fn from_values(width: usize, height: usize, depth: usize, values: Vec<f32>) -> anyhow::Result<Self> {
        anyhow::ensure!(
            values.len() == width * height * depth,
            "seed field expects {} values for {}x{}x{}, got {}",
            width * height * depth,
            width,
            height,
            depth,
            values.len()
        );
        Ok(Self { width, height, depth, values })
    }

    pub fn dimensions(&self) -> (usize, usize, usize) {
        (self.width, self.height, self.depth)
    }

    #[inline]
    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x * (self.height * self.depth) + y * self.depth + z
    }

    #[inline]
    fn sample(&self, x: f64, y: f64, z: f64) -> f64 {
        self.values[self.index(x as usize, y as usize, z as usize)] as f64
    }

    /// Trilinear interpolation of the field at a fractional lattice coordinate.
    ///
    /// Coordinates must be non-negative and below the field extent (the caller
    /// divides integer cell positions by `zoom`).
    pub fn smooth(&self, zoom: f64, x1: f64, y1: f64, z1: f64) -> f64 {
        let fract_x = x1 - x1.floor();
        let fract_y = y1 - y1.floor();
        let fract_z = z1 - z1.floor();

        let x2 = lower_neighbour(x1, self.width, zoom);
        let y2 = lower_neighbour(y1, self.height, zoom);
        let z2 = lower_neighbour(z1, self.depth, zoom);

        let (x1, y1, z1) = (x1.floor(), y1.floor(), z1.floor());

        let mut value = 0.0;
        value += fract_x * fract_y * fract_z * self.sample(x1, y1, z1);
        value += (1.0 - fract_x) * fract_y * fract_z * self.sample(x2, y1, z1);
        value += fract_x * (1.0 - fract_y) * fract_z * self.sample(x1, y2, z1);
        value += (1.0 - fract_x) * (1.0 - fract_y) * fract_z * self.sample(x2, y2, z1);

        value += fract_x * fract_y * (1.0 - fract_z) * self.sample(x1, y1, z2);
        value += (1.0 - fract_x) * fract_y * (1.0 - fract_z) * self.sample(x2, y1, z2);
        value += fract_x * (1.0 - fract_y) * (1.0 - fract_z) * self.sample(x1, y2, z2);
        value += (1.0 - fract_x) * (1.0 - fract_y) * (1.0 - fract_z) * self.sample(x2, y2, z2);

        value
    }

    /// Multi-octave turbulence at integer cell `(x, y, z)`, in `[0, 316]`.
    pub fn turbulence(&self, x: usize, y: usize, z: usize, max_zoom: f64) -> f64 {
        let (xf, yf, zf) = (x as f64, y as f64, z as f64);
        let mut sum = (((1.0 / 512.0) * (8.0 * std::f64::consts::PI) * (xf + zf - 4.0 * yf)).sin() + 1.0) * 8.0;

        let mut zoom = max_zoom;
        while zoom >= MIN_ZOOM {
            sum += self.smooth(zoom, xf / zoom, yf / zoom, zf / zoom) * zoom;
            zoom /= 2.0;
        }

        (128.0 * sum) / max_zoom
    }
}

/// `coord - 1`, or the zoom-dependent wrap target when that goes negative.
#[inline]
fn lower_neighbour(coord: f64, extent: usize, zoom: f64) -> f64 {
    let below = coord - 1.0;
    if below < 0.0 {
        ((extent as f64 / zoom).round() - 1.0).max(0.0)
    } else {
        below.floor()
    }
}

/// Quantised turbulence volume, one luminance byte per cell.
#[derive(Debug, Clone)]
pub struct NoiseVolume {
    width: usize,
    height: usize,
    depth: usize,
    values: Vec<u8>,
}

impl NoiseVolume {
    /// Generate a volume from a fresh thread-local random seed field.
    pub fn generate(width: usize, height: usize, depth: usize) -> Self {
        let seeds = SeedField::random(width, height, depth, &mut rand::thread_rng());
        Self::from_seed_field(&seeds)
    }

    /// Generate a volume whose seed field is derived from `seed`.
    pub fn generate_seeded(width: usize, height: usize, depth: usize, seed: u64) -> Self {
        Self::from_seed_field(&SeedField::seeded(width, height, depth, seed))
    }

    /// Run the turbulence pass over every cell of `seeds`.
    pub fn from_seed_field(seeds: &SeedField) -> Self {
        let (width, height, depth) = seeds.dimensions();
        let mut values = Vec::with_capacity(width * height * depth);

        for x in 0..width {
            for y in 0..height {
                for z in 0..depth {
                    let turbulence = seeds.turbulence(x, y, z, MAX_ZOOM);
                    values.push(turbulence.floor().clamp(0.0, 255.0) as u8);
                }
            }
        }

        Self { width, height, depth, values }
    }

    pub fn dimensions(&self) -> (usize, usize, usize) {
        (self.width, self.height, self.depth)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw luminance values, indexed `x * (h * d) + y * d + z`.
    pub fn values(&self) -> &[u8] {
        &self.values
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<u8> {
        if x >= self.width || y >= self.height || z >= self.depth {
            return None;
        }
        self.values.get(x * (self.height * self.depth) + y * self.depth + z).copied()
    }

    /// Expand to RGBA8 texels in texture order (x fastest, then rows, then slices).
    /// RGB carry the luminance, alpha is opaque.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut texels = Vec::with_capacity(self.values.len() * 4);
        for z in 0..self.depth {
            for y in 0..self.height {
                for x in 0..self.width {
                    let l = self.values[x * (self.height * self.depth) + y * self.depth + z];
                    texels.extend_from_slice(&[l, l, l, 255]);
                }
            }
        }
        texels
    }

    /// One z-slice as row-major luminance (for previews).
    pub fn slice_luma(&self, z: usize) -> Vec<u8> {
        let z = z.min(self.depth.saturating_sub(1));
        let mut out = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                out.push(self.values[x * (self.height * self.depth) + y * self.depth + z]);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_size_and_range() {
        let volume = NoiseVolume::generate_seeded(8, 8, 8, 7);
        assert_eq!(volume.len(), 8 * 8 * 8);
        // u8 storage already bounds the range; make sure quantisation produced
        // real variation rather than a saturated block.
        let min = *volume.values().iter().min().unwrap();
        let max = *volume.values().iter().max().unwrap();
        assert!(min < max);
    }

    #[test]
    fn test_tiny_volume_wraps_in_bounds() {
        // round(1 / zoom) is 0 for every octave above zoom 2.
        let volume = NoiseVolume::generate_seeded(1, 1, 1, 3);
        assert_eq!(volume.len(), 1);
    }

    #[test]
    fn test_smooth_on_lattice_reads_lower_neighbour() {
        let values: Vec<f32> = (0..27).map(|i| i as f32 / 27.0).collect();
        let field = SeedField::from_values(3, 3, 3, values).unwrap();
        // With zero fractions the full weight lands on the (x-1, y-1, z-1) corner.
        let expected = field.values[field.index(1, 1, 1)] as f64;
        assert_eq!(field.smooth(1.0, 2.0, 2.0, 2.0), expected);
    }

    #[test]
    fn test_smooth_of_constant_field_is_constant() {
        let field = SeedField::from_values(4, 4, 4, vec![0.25; 64]).unwrap();
        let v = field.smooth(2.0, 1.3, 0.7, 1.9);
        assert!((v - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_turbulence_of_zero_field_is_sine_base() {
        let field = SeedField::from_values(4, 4, 4, vec![0.0; 64]).unwrap();
        // base = (sin 0 + 1) * 8 = 8, scaled by 128 / 32.
        assert!((field.turbulence(0, 0, 0, MAX_ZOOM) - 32.0).abs() < 1e-12);
    }

    #[test]
    fn test_bright_seed_field_saturates() {
        let field = SeedField::from_values(4, 4, 4, vec![0.999; 64]).unwrap();
        // base 8 + 63 * 0.999, scaled by 4.
        let raw = field.turbulence(0, 0, 0, MAX_ZOOM);
        assert!(raw > 255.0);

        let volume = NoiseVolume::from_seed_field(&field);
        assert_eq!(volume.get(0, 0, 0), Some(255));
        // Even a zero base leaves 4 * 62.937 > 251.
        assert!(volume.values().iter().all(|&v| v >= 251));
    }

    #[test]
    fn test_lower_neighbour_wrap_rule() {
        assert_eq!(lower_neighbour(2.5, 256, 1.0), 1.0);
        // 256 / 32 = 8 -> wraps to 7, not 255.
        assert_eq!(lower_neighbour(0.5, 256, 32.0), 7.0);
        // round(4 / 32) = 0 would give -1; pinned to 0.
        assert_eq!(lower_neighbour(0.1, 4, 32.0), 0.0);
    }

    #[test]
    fn test_rgba_expansion() {
        let volume = NoiseVolume::generate_seeded(2, 3, 4, 11);
        let rgba = volume.to_rgba8();
        assert_eq!(rgba.len(), 2 * 3 * 4 * 4);
        for texel in rgba.chunks(4) {
            assert_eq!(texel[0], texel[1]);
            assert_eq!(texel[1], texel[2]);
            assert_eq!(texel[3], 255);
        }
        // Texel (x=1, y=2, z=3) is the last one in texture order.
        assert_eq!(rgba[rgba.len() - 4], volume.get(1, 2, 3).unwrap());
    }

    #[test]
    fn test_seed_field_length_checked() {
        assert!(SeedField::from_values(2, 2, 2, vec![0.0; 7]).is_err());
    }
}

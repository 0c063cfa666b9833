//! # Kernel Generation and Convolution
//!
//! The numeric core of the worker pipeline: Gaussian kernel generation and a
//! single 2D convolution pass over a 24-bit BGR pixel buffer, with the two
//! boundary policies the pipeline needs (mirror for Gaussian passes,
//! edge-clamp for the heavy-mode sharpen stage).

use crate::filter::image_buf::PixelBuffer;

/// A square convolution kernel, row-major, normalized so its entries sum to
/// one.
#[derive(Debug, Clone)]
pub struct Kernel {
    pub size: usize,
    pub weights: Vec<f64>,
}

impl Kernel {
    fn at(&self, row: usize, col: usize) -> f64 {
        self.weights[row * self.size + col]
    }

    /// Build directly from a literal row-major matrix (used for the fixed
    /// 3x3 sharpen kernel in heavy mode, which isn't a Gaussian).
    pub fn from_rows(rows: &[&[f64]]) -> Self {
        let size = rows.len();
        let mut weights = Vec::with_capacity(size * size);
        for row in rows {
            assert_eq!(row.len(), size, "kernel must be square");
            weights.extend_from_slice(row);
        }
        Self { size, weights }
    }

    /// Generate a k×k Gaussian kernel with the given sigma.
    ///
    /// Entry at offset `(dx, dy)` from center is `exp(-(dx²+dy²)/(2σ²))`,
    /// then every entry is divided by the sum of all entries. `k` must be
    /// odd; center is `k / 2` (integer division).
    pub fn gaussian(size: usize, sigma: f64) -> Self {
        assert!(size % 2 == 1, "kernel size must be odd, got {size}");
        assert!(size > 0, "kernel size must be positive");

        let center = (size / 2) as isize;
        let mut weights = vec![0.0f64; size * size];
        let two_sigma_sq = 2.0 * sigma * sigma;

        for row in 0..size {
            for col in 0..size {
                let dx = col as isize - center;
                let dy = row as isize - center;
                let exponent = -((dx * dx + dy * dy) as f64) / two_sigma_sq;
                weights[row * size + col] = exponent.exp();
            }
        }

        let sum: f64 = weights.iter().sum();
        for w in &mut weights {
            *w /= sum;
        }

        Self { size, weights }
    }
}

/// How out-of-bounds sample coordinates are resolved during convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Negative coordinates reflect to `-v`; coordinates `>= bound` reflect
    /// to `2*bound - v - 1`. Used by every Gaussian pass.
    Mirror,
    /// Out-of-bounds coordinates clamp to the nearest edge pixel. Used by
    /// the heavy-mode sharpen stage only.
    Clamp,
}

fn resolve(coord: isize, bound: usize, boundary: Boundary) -> usize {
    let bound_i = bound as isize;
    match boundary {
        Boundary::Mirror => {
            let mut v = coord;
            if v < 0 {
                v = -v;
            }
            if v >= bound_i {
                v = 2 * bound_i - v - 1;
            }
            // A kernel larger than the image could in principle reflect
            // past the far edge too; clamp defensively rather than index
            // out of range.
            v.clamp(0, bound_i - 1) as usize
        }
        Boundary::Clamp => coord.clamp(0, bound_i - 1) as usize,
    }
}

/// Apply one convolution pass of `kernel` to `input`, producing a new
/// buffer of the same dimensions. Each of the three BGR channels is
/// convolved independently; results are clamped to `[0, 255]` and rounded by
/// truncation.
pub fn convolve(input: &PixelBuffer, kernel: &Kernel, boundary: Boundary) -> PixelBuffer {
    let (width, height) = (input.width, input.height);
    let center = (kernel.size / 2) as isize;
    let mut output = PixelBuffer::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let mut sums = [0.0f64; 3];
            for ky in 0..kernel.size {
                for kx in 0..kernel.size {
                    let sx = resolve(x as isize + kx as isize - center, width, boundary);
                    let sy = resolve(y as isize + ky as isize - center, height, boundary);
                    let weight = kernel.at(ky, kx);
                    let px = input.get(sx, sy);
                    sums[0] += px[0] as f64 * weight;
                    sums[1] += px[1] as f64 * weight;
                    sums[2] += px[2] as f64 * weight;
                }
            }
            let pixel = [
                clamp_to_u8(sums[0]),
                clamp_to_u8(sums[1]),
                clamp_to_u8(sums[2]),
            ];
            output.set(x, y, pixel);
        }
    }

    output
}

/// Clamp to `[0, 255]` and truncate to an integer; the rounding rule for
/// every convolution output.
pub fn clamp_to_u8(value: f64) -> u8 {
    value.clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaussian_kernel_entries_sum_to_one() {
        for size in [3, 5, 11, 15] {
            let kernel = Kernel::gaussian(size, 2.0);
            let sum: f64 = kernel.weights.iter().sum();
            assert!(
                (sum - 1.0).abs() < 1e-9,
                "kernel size {size} summed to {sum}"
            );
        }
    }

    #[test]
    #[should_panic(expected = "odd")]
    fn gaussian_kernel_rejects_even_size() {
        Kernel::gaussian(4, 2.0);
    }

    #[test]
    fn mirror_boundary_on_constant_image_preserves_color() {
        let mut buf = PixelBuffer::new(10, 10);
        let color = [40u8, 80u8, 120u8];
        for y in 0..10 {
            for x in 0..10 {
                buf.set(x, y, color);
            }
        }

        let kernel = Kernel::gaussian(5, 2.0);
        let out = convolve(&buf, &kernel, Boundary::Mirror);

        for y in 0..10 {
            for x in 0..10 {
                let px = out.get(x, y);
                for c in 0..3 {
                    assert!(
                        (px[c] as i32 - color[c] as i32).abs() <= 1,
                        "pixel ({x},{y}) channel {c} drifted: {px:?} vs {color:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn resolve_mirrors_negative_and_overflow_coordinates() {
        assert_eq!(resolve(-1, 10, Boundary::Mirror), 1);
        assert_eq!(resolve(-2, 10, Boundary::Mirror), 2);
        assert_eq!(resolve(10, 10, Boundary::Mirror), 9);
        assert_eq!(resolve(11, 10, Boundary::Mirror), 8);
        assert_eq!(resolve(5, 10, Boundary::Mirror), 5);
    }

    #[test]
    fn resolve_clamps_to_nearest_edge() {
        assert_eq!(resolve(-5, 10, Boundary::Clamp), 0);
        assert_eq!(resolve(15, 10, Boundary::Clamp), 9);
    }
}

//! # Filter Pipeline
//!
//! The transformation a worker applies to one image: either a single
//! Gaussian pass (light mode) or the fixed six-stage pipeline (heavy mode).
//! Both run synchronously on the calling thread — the worker runtime is
//! responsible for running this off the async reader task via
//! `spawn_blocking`.

pub mod image_buf;
pub mod kernel;

use self::image_buf::PixelBuffer;
use self::kernel::{clamp_to_u8, convolve, Boundary, Kernel};

/// Sigma used for the user-tunable light-mode Gaussian pass.
pub const LIGHT_MODE_SIGMA: f64 = 2.0;

const HEAVY_BLUR_SIZE: usize = 15;
const HEAVY_BLUR_SIGMA: f64 = 3.5;
const HEAVY_BLUR_PASSES: usize = 5;
const HEAVY_SMOOTH_SIZE: usize = 11;
const HEAVY_SMOOTH_SIGMA: f64 = 2.0;
const HEAVY_CONTRAST_FACTOR: f64 = 1.2;
const HEAVY_BRIGHTNESS_FACTOR: f64 = 1.05;

/// Which pipeline a job runs. Mirrors the CLI's `FilterMode` but lives here
/// since it's the thing that actually dispatches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Light,
    Heavy,
}

/// Run the light-mode pipeline: one Gaussian pass with the caller-supplied
/// odd kernel size and a fixed sigma, mirror boundary.
pub fn apply_light(input: &PixelBuffer, filter_size: usize) -> PixelBuffer {
    let kernel = Kernel::gaussian(filter_size, LIGHT_MODE_SIGMA);
    convolve(input, &kernel, Boundary::Mirror)
}

/// Run the heavy-mode pipeline: five Gaussian blur passes, an edge-clamped
/// sharpen, a contrast adjustment, a smoothing Gaussian pass, then a
/// brightness scale. `filterSize` from the request is ignored — heavy
/// mode's stages are fixed.
pub fn apply_heavy(input: &PixelBuffer) -> PixelBuffer {
    let blur_kernel = Kernel::gaussian(HEAVY_BLUR_SIZE, HEAVY_BLUR_SIGMA);
    let mut buf = input.clone();
    for _ in 0..HEAVY_BLUR_PASSES {
        buf = convolve(&buf, &blur_kernel, Boundary::Mirror);
    }

    let sharpen = Kernel::from_rows(&[
        &[-1.0, -1.0, -1.0],
        &[-1.0, 9.0, -1.0],
        &[-1.0, -1.0, -1.0],
    ]);
    buf = convolve(&buf, &sharpen, Boundary::Clamp);

    buf = adjust_contrast(&buf, HEAVY_CONTRAST_FACTOR);

    let smooth_kernel = Kernel::gaussian(HEAVY_SMOOTH_SIZE, HEAVY_SMOOTH_SIGMA);
    buf = convolve(&buf, &smooth_kernel, Boundary::Mirror);

    adjust_brightness(&buf, HEAVY_BRIGHTNESS_FACTOR)
}

/// Run whichever pipeline `mode` names.
pub fn apply(mode: FilterMode, input: &PixelBuffer, filter_size: usize) -> PixelBuffer {
    match mode {
        FilterMode::Light => apply_light(input, filter_size),
        FilterMode::Heavy => apply_heavy(input),
    }
}

/// `((in/255 - 0.5) * factor + 0.5) * 255`, per channel, clamped to
/// `[0, 255]`.
fn adjust_contrast(input: &PixelBuffer, factor: f64) -> PixelBuffer {
    map_channels(input, |v| ((v as f64 / 255.0 - 0.5) * factor + 0.5) * 255.0)
}

/// `in * factor`, per channel, clamped to `[0, 255]`.
fn adjust_brightness(input: &PixelBuffer, factor: f64) -> PixelBuffer {
    map_channels(input, |v| v as f64 * factor)
}

fn map_channels(input: &PixelBuffer, f: impl Fn(u8) -> f64) -> PixelBuffer {
    let mut output = PixelBuffer::new(input.width, input.height);
    for y in 0..input.height {
        for x in 0..input.width {
            let px = input.get(x, y);
            output.set(
                x,
                y,
                [
                    clamp_to_u8(f(px[0])),
                    clamp_to_u8(f(px[1])),
                    clamp_to_u8(f(px[2])),
                ],
            );
        }
    }
    output
}

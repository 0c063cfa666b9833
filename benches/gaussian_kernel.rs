//! Microbenchmarks for the numeric core: kernel generation and convolution
//! passes, the one piece of this system where throughput is a first-class
//! concern.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use image_dispatch::filter::image_buf::PixelBuffer;
use image_dispatch::filter::kernel::{Boundary, Kernel};

fn solid(width: usize, height: usize, color: [u8; 3]) -> PixelBuffer {
    let mut buf = PixelBuffer::new(width, height);
    for y in 0..height {
        for x in 0..width {
            buf.set(x, y, color);
        }
    }
    buf
}

fn bench_kernel_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("gaussian_kernel_generation");
    for size in [3usize, 5, 11, 15] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| Kernel::gaussian(size, 2.0));
        });
    }
    group.finish();
}

fn bench_convolution_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("convolution_pass");
    let image = solid(256, 256, [60, 90, 200]);
    for size in [3usize, 5, 11, 15] {
        let kernel = Kernel::gaussian(size, 2.0);
        group.bench_with_input(BenchmarkId::from_parameter(size), &kernel, |b, kernel| {
            b.iter(|| image_dispatch::filter::kernel::convolve(&image, kernel, Boundary::Mirror));
        });
    }
    group.finish();
}

fn bench_heavy_pipeline(c: &mut Criterion) {
    let image = solid(128, 128, [10, 200, 30]);
    c.bench_function("heavy_pipeline_128x128", |b| {
        b.iter(|| image_dispatch::filter::apply_heavy(&image));
    });
}

criterion_group!(
    benches,
    bench_kernel_generation,
    bench_convolution_pass,
    bench_heavy_pipeline
);
criterion_main!(benches);

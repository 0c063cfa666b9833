//! # Pixel Buffer and Codec Boundary
//!
//! The filter pipeline works in a de-serialized 24-bit BGR pixel buffer, not
//! in whatever container format the image arrived in. Decoding/encoding is
//! kept at the edges so the numeric core (`kernel.rs`, `mod.rs`) never has
//! to know about PNG/JPEG at all.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageEncoder, ImageFormat, ImageReader};
use std::io::Cursor;

/// A decoded image, BGR byte order, row-major, no padding.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pub width: usize,
    pub height: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width * height * 3],
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, pixel: [u8; 3]) {
        let i = (y * self.width + x) * 3;
        self.data[i] = pixel[0];
        self.data[i + 1] = pixel[1];
        self.data[i + 2] = pixel[2];
    }

    /// Decode an encoded image (PNG or JPEG, sniffed from content) into a
    /// BGR pixel buffer.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .context("could not guess image container format")?;
        let decoded = reader.decode().context("failed to decode image")?;
        let rgb = decoded.to_rgb8();
        let (width, height) = (rgb.width() as usize, rgb.height() as usize);

        let mut data = Vec::with_capacity(width * height * 3);
        for pixel in rgb.pixels() {
            // image gives RGB; the wire and the filter pipeline work in BGR.
            data.push(pixel[2]);
            data.push(pixel[1]);
            data.push(pixel[0]);
        }

        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Encode this buffer back to bytes in `format`, the same container the
    /// original request named.
    pub fn encode(&self, format: ImageFormat) -> Result<Vec<u8>> {
        let mut rgb = Vec::with_capacity(self.data.len());
        for chunk in self.data.chunks_exact(3) {
            rgb.push(chunk[2]);
            rgb.push(chunk[1]);
            rgb.push(chunk[0]);
        }

        let image_buffer =
            image::RgbImage::from_raw(self.width as u32, self.height as u32, rgb)
                .context("pixel buffer dimensions do not match its byte length")?;

        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(image_buffer)
            .write_to(&mut Cursor::new(&mut out), format)
            .context("failed to encode image")?;
        Ok(out)
    }

    /// Encode as JPEG at a specific quality (0-100). Used for the transport
    /// fallback when a PNG-encoded artifact exceeds the size ceiling — the
    /// plain [`Self::encode`] path has no quality knob since `image`'s
    /// `ImageFormat`-dispatched encoder always uses its own default.
    pub fn encode_jpeg_quality(&self, quality: u8) -> Result<Vec<u8>> {
        let mut rgb = Vec::with_capacity(self.data.len());
        for chunk in self.data.chunks_exact(3) {
            rgb.push(chunk[2]);
            rgb.push(chunk[1]);
            rgb.push(chunk[0]);
        }

        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, quality);
        encoder
            .write_image(&rgb, self.width as u32, self.height as u32, image::ExtendedColorType::Rgb8)
            .context("failed to encode image as JPEG")?;
        Ok(out)
    }
}

/// Map the wire's free-text format name (`"png"`, `"jpeg"`, `"jpg"`, ...) to
/// an `image::ImageFormat`, defaulting to PNG when the name is unrecognized.
pub fn format_from_name(name: &str) -> ImageFormat {
    match name.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => ImageFormat::Jpeg,
        "bmp" => ImageFormat::Bmp,
        "gif" => ImageFormat::Gif,
        _ => ImageFormat::Png,
    }
}

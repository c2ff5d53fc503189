//! raster: WebP frames, 8 bit per channel, RGB.
//!
//! save: value*255 → clamp [0,255] → u8 RGB → WebP (lossless encoder of `image`).
//! load: decode; 16-bit luminance is rescaled by 1/255 (saturating) before the
//! RGB conversion, everything else is converted to RGB directly; → [0,1] f32.

use anyhow::{Context, Result};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder as _, ImageFormat, ImageReader, RgbImage};
use std::fs::OpenOptions;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use super::{open_for_read, ImageEncoder};
use crate::error::BankError;
use crate::frames::Frame;

pub const RASTER_ENCODER_NAME: &str = "webp";
pub const RASTER_EXTENSION: &str = ".webp";

#[derive(Debug, Clone, Copy, Default)]
pub struct RasterEncoder;

/// Quantize a normalized frame to 8-bit RGB bytes.
/// 1 channel is replicated to gray RGB, 4+ channels keep the first three.
fn to_rgb8(frame: &Frame) -> Result<Vec<u8>> {
    let px = frame.height() * frame.width();
    let c = frame.channels();
    let data = frame.data();
    if c == 0 {
        return Err(BankError::Shape("raster frame has zero channels".into()).into());
    }
    let mut out = Vec::with_capacity(px * 3);
    for p in 0..px {
        let base = p * c;
        for ch in 0..3 {
            let v = if c >= 3 { data[base + ch] } else { data[base] };
            out.push(quantize(v));
        }
    }
    Ok(out)
}

#[inline]
fn quantize(v: f32) -> u8 {
    // NaN → 0
    let x = (v * 255.0).clamp(0.0, 255.0);
    if x.is_nan() {
        0
    } else {
        x as u8
    }
}

/// Integer luminance (16 bit) is scaled by 1/255 and saturated into 8 bit.
fn luma16_to_rgb(img: &image::ImageBuffer<image::Luma<u16>, Vec<u16>>) -> RgbImage {
    let (w, h) = img.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        let v = img.get_pixel(x, y).0[0] as f32 * (1.0 / 255.0);
        let b = v.round().clamp(0.0, 255.0) as u8;
        image::Rgb([b, b, b])
    })
}

impl ImageEncoder for RasterEncoder {
    fn name(&self) -> &'static str {
        RASTER_ENCODER_NAME
    }

    fn extension(&self) -> &'static str {
        RASTER_EXTENSION
    }

    fn save(&self, frame: &Frame, path_without_extension: &Path) -> Result<()> {
        let path = self.file_path(path_without_extension);
        let rgb = to_rgb8(frame)?;

        let f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("open {}", path.display()))?;
        let mut w = BufWriter::new(f);
        WebPEncoder::new_lossless(&mut w)
            .write_image(
                &rgb,
                frame.width() as u32,
                frame.height() as u32,
                ExtendedColorType::Rgb8,
            )
            .with_context(|| format!("encode webp {}", path.display()))?;
        w.flush()
            .with_context(|| format!("flush {}", path.display()))?;
        Ok(())
    }

    fn load(&self, path_without_extension: &Path) -> Result<Frame> {
        let path = self.file_path(path_without_extension);
        let f = open_for_read(&path)?;

        let mut reader = ImageReader::new(BufReader::new(f));
        reader.set_format(ImageFormat::WebP);
        let img = reader
            .decode()
            .map_err(|e| BankError::decode(&path, e))?;

        // WebP декодируется только в Rgb8/Rgba8; ветка Luma16 остаётся общим
        // правилом для 16-битной яркости (см. luma16_is_rescaled_before_rgb).
        let rgb = match img {
            DynamicImage::ImageLuma16(ref l) => luma16_to_rgb(l),
            other => other.to_rgb8(),
        };

        let (w, h) = rgb.dimensions();
        let data: Vec<f32> = rgb.into_raw().into_iter().map(|b| b as f32 / 255.0).collect();
        Frame::new(h as usize, w as usize, 3, data)
    }
}

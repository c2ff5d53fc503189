use anyhow::{Context, Result};
use image::ExtendedColorType;
use std::path::{Path, PathBuf};

use ImageBank::frames::{stack_frames, Frame, ImageBatch};
use ImageBank::{BankId, PersistConfig};

/// PersistConfig from the environment, with CLI overrides on top.
pub fn load_config(user_dir: Option<PathBuf>, output_dir: Option<PathBuf>) -> PersistConfig {
    let mut cfg = PersistConfig::from_env();
    if let Some(d) = user_dir {
        cfg = cfg.with_user_dir(d);
    }
    if let Some(d) = output_dir {
        cfg = cfg.with_output_dir(d);
    }
    cfg
}

pub fn parse_bank_id(arg: &str, structured: bool) -> Result<BankId> {
    if structured {
        BankId::from_json_str(arg)
    } else {
        Ok(BankId::literal(arg))
    }
}

/// Decode image files into one RGB batch; all files must share a size.
pub fn load_images(paths: &[PathBuf]) -> Result<ImageBatch> {
    let mut frames = Vec::with_capacity(paths.len());
    for p in paths {
        let img = image::open(p)
            .with_context(|| format!("open image {}", p.display()))?
            .to_rgb8();
        let (w, h) = img.dimensions();
        let data: Vec<f32> = img.into_raw().into_iter().map(|b| b as f32 / 255.0).collect();
        frames.push(Frame::new(h as usize, w as usize, 3, data)?);
    }
    stack_frames(&frames).context("input images must share one size")
}

/// Write a frame as 8-bit PNG (gray for 1 channel, RGB otherwise).
pub fn save_png(frame: &Frame, path: &Path) -> Result<()> {
    let px = frame.height() * frame.width();
    let c = frame.channels().max(1);
    let data = frame.data();
    let (bytes, color) = if frame.channels() == 1 {
        let b: Vec<u8> = data.iter().map(|&v| to_u8(v)).collect();
        (b, ExtendedColorType::L8)
    } else {
        let mut b = Vec::with_capacity(px * 3);
        for p in 0..px {
            for ch in 0..3 {
                let idx = p * c + ch.min(c - 1);
                b.push(to_u8(data.get(idx).copied().unwrap_or(0.0)));
            }
        }
        (b, ExtendedColorType::Rgb8)
    };
    image::save_buffer(path, &bytes, frame.width() as u32, frame.height() as u32, color)
        .with_context(|| format!("write {}", path.display()))
}

fn to_u8(v: f32) -> u8 {
    let x = (v * 255.0).clamp(0.0, 255.0);
    if x.is_nan() {
        0
    } else {
        x as u8
    }
}

//! encoders: pluggable per-frame codecs.
//!
//! Каждый энкодер пишет ровно один файл: `<path_without_extension><extension()>`.
//! - raster.rs: WebP, 8 bit per channel (name "webp", legacy alias "pil")
//! - tensor.rs: safetensors container + zstd (name "safetensors"), bit-exact
//!
//! Lookup goes through a static registry by name; there is no runtime type
//! inspection: the name stored in cache config or bank metadata decides.

use anyhow::Result;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::BankError;
use crate::frames::Frame;

pub mod raster;
pub mod tensor;

pub use raster::RasterEncoder;
pub use tensor::TensorEncoder;

/// Encoder used when neither cache config nor bank metadata name one.
pub const DEFAULT_ENCODER: &str = raster::RASTER_ENCODER_NAME;

pub trait ImageEncoder: Sync {
    /// Registry key of this variant.
    fn name(&self) -> &'static str;

    /// On-disk suffix, including the leading dot.
    fn extension(&self) -> &'static str;

    /// Write `frame` to `path_without_extension + extension()`, overwriting.
    fn save(&self, frame: &Frame, path_without_extension: &Path) -> Result<()>;

    /// Read `path_without_extension + extension()` back into a frame.
    fn load(&self, path_without_extension: &Path) -> Result<Frame>;

    /// Full path of the file this encoder uses for `path_without_extension`.
    fn file_path(&self, path_without_extension: &Path) -> PathBuf {
        with_suffix(path_without_extension, self.extension())
    }
}

/// Append a raw suffix to a path (no extension replacement: "3" + ".webp").
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

static RASTER: RasterEncoder = RasterEncoder;
static TENSOR: TensorEncoder = TensorEncoder;

static ENCODERS: [&dyn ImageEncoder; 2] = [&RASTER, &TENSOR];

/// Legacy names still found in metadata written by earlier tooling.
const ALIASES: &[(&str, &str)] = &[("pil", raster::RASTER_ENCODER_NAME)];

/// All registered encoders.
pub fn encoders() -> &'static [&'static dyn ImageEncoder] {
    &ENCODERS
}

/// Names accepted by `get_encoder` (canonical names only).
pub fn encoder_names() -> Vec<&'static str> {
    ENCODERS.iter().map(|e| e.name()).collect()
}

/// Look up an encoder by name. Unknown name → BankError::Configuration.
pub fn get_encoder(name: &str) -> Result<&'static dyn ImageEncoder> {
    let canonical = ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, target)| *target)
        .unwrap_or(name);
    ENCODERS
        .iter()
        .copied()
        .find(|e| e.name() == canonical)
        .ok_or_else(|| {
            BankError::config(format!(
                "encoder '{}' does not exist (known: {})",
                name,
                encoder_names().join(", ")
            ))
            .into()
        })
}

/// Map an open() error into NotFound (absent file) or keep it with context.
pub(crate) fn open_for_read(path: &Path) -> Result<std::fs::File> {
    match std::fs::File::open(path) {
        Ok(f) => Ok(f),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(BankError::NotFound(path.to_path_buf()).into())
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("open {}", path.display()))),
    }
}

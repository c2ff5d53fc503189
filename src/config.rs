//! Centralized configuration and builder for ImageBank.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - PersistConfig::from_env() reads IMAGEBANK_* variables on top of defaults.
//! - Fluent `with_*` setters so tests and embedders never touch the environment.
//!
//! The config is built once and passed by reference (CacheRegistry, ImageBank).
//!
//! Env:
//! - IMAGEBANK_USER_DIR       : directory holding image_banks.json (default ./user)
//! - IMAGEBANK_OUTPUT_DIR     : parent of the default cache (default ./output)
//! - IMAGEBANK_DEFAULT_ENCODER: encoder for caches without one (default "webp")
//! - IMAGEBANK_LOCK_BANKS     : advisory fs2 locks on bank dirs (default off)
//! - IMAGEBANK_EXPORT_VIDEO   : emit a video export request on write (default on)
//! - IMAGEBANK_VIDEO_CODEC / IMAGEBANK_VIDEO_FPS / IMAGEBANK_VIDEO_CRF

use std::path::PathBuf;

use crate::encoders::DEFAULT_ENCODER;

pub const DEFAULT_VIDEO_CODEC: &str = "vp9";
pub const DEFAULT_VIDEO_FPS: f32 = 16.0;
pub const DEFAULT_VIDEO_CRF: u32 = 32;

#[derive(Clone, Debug)]
pub struct PersistConfig {
    /// Where the cache registry file lives.
    /// Env: IMAGEBANK_USER_DIR
    pub user_dir: PathBuf,

    /// Parent directory of the default cache (<output_dir>/_persistence).
    /// Env: IMAGEBANK_OUTPUT_DIR
    pub output_dir: PathBuf,

    /// Encoder name used when a cache entry (or bank metadata) has none.
    /// Env: IMAGEBANK_DEFAULT_ENCODER
    pub default_encoder: String,

    /// Take advisory locks on <bank>/LOCK while writing/reading.
    /// Env: IMAGEBANK_LOCK_BANKS = 0|1|true|false (default false)
    pub lock_banks: bool,

    // ---------- video export request ----------
    /// Env: IMAGEBANK_EXPORT_VIDEO (default true)
    pub export_video: bool,
    /// Env: IMAGEBANK_VIDEO_CODEC (default "vp9")
    pub video_codec: String,
    /// Env: IMAGEBANK_VIDEO_FPS (default 16.0)
    pub video_fps: f32,
    /// Env: IMAGEBANK_VIDEO_CRF (default 32)
    pub video_crf: u32,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            user_dir: PathBuf::from("user"),
            output_dir: PathBuf::from("output"),
            default_encoder: DEFAULT_ENCODER.to_string(),
            lock_banks: false,

            export_video: true,
            video_codec: DEFAULT_VIDEO_CODEC.to_string(),
            video_fps: DEFAULT_VIDEO_FPS,
            video_crf: DEFAULT_VIDEO_CRF,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| {
        let s = v.trim().to_ascii_lowercase();
        s == "1" || s == "true" || s == "on" || s == "yes"
    })
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl PersistConfig {
    /// Load configuration from IMAGEBANK_* environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_string("IMAGEBANK_USER_DIR") {
            cfg.user_dir = PathBuf::from(v);
        }
        if let Some(v) = env_string("IMAGEBANK_OUTPUT_DIR") {
            cfg.output_dir = PathBuf::from(v);
        }
        if let Some(v) = env_string("IMAGEBANK_DEFAULT_ENCODER") {
            cfg.default_encoder = v;
        }
        if let Some(on) = env_flag("IMAGEBANK_LOCK_BANKS") {
            cfg.lock_banks = on;
        }

        // ----- video export -----
        if let Some(on) = env_flag("IMAGEBANK_EXPORT_VIDEO") {
            cfg.export_video = on;
        }
        if let Some(v) = env_string("IMAGEBANK_VIDEO_CODEC") {
            cfg.video_codec = v;
        }
        if let Some(v) = env_string("IMAGEBANK_VIDEO_FPS") {
            if let Ok(fps) = v.parse::<f32>() {
                cfg.video_fps = fps;
            }
        }
        if let Some(v) = env_string("IMAGEBANK_VIDEO_CRF") {
            if let Ok(crf) = v.parse::<u32>() {
                cfg.video_crf = crf;
            }
        }

        cfg
    }

    /// Path of the registry file (<user_dir>/image_banks.json).
    pub fn registry_path(&self) -> PathBuf {
        self.user_dir.join(crate::registry::BANK_CONF_FILE)
    }

    /// Fluent setters (builder-style) to override specific fields.

    pub fn with_user_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.user_dir = dir.into();
        self
    }

    pub fn with_output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_default_encoder<S: Into<String>>(mut self, name: S) -> Self {
        self.default_encoder = name.into();
        self
    }

    pub fn with_lock_banks(mut self, on: bool) -> Self {
        self.lock_banks = on;
        self
    }

    pub fn with_export_video(mut self, on: bool) -> Self {
        self.export_video = on;
        self
    }

    pub fn with_video(mut self, codec: &str, fps: f32, crf: u32) -> Self {
        self.video_codec = codec.to_string();
        self.video_fps = fps;
        self.video_crf = crf;
        self
    }
}

impl std::fmt::Display for PersistConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PersistConfig {{ user_dir: {}, output_dir: {}, default_encoder: {}, lock_banks: {}, export_video: {} ({} @ {} fps, crf {}) }}",
            self.user_dir.display(),
            self.output_dir.display(),
            self.default_encoder,
            self.lock_banks,
            self.export_video,
            self.video_codec,
            self.video_fps,
            self.video_crf
        )
    }
}

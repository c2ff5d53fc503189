//! bank/store: ImageBank: write a batch into a bank or serve it from disk.
//!
//! process():
//! - images given  → split; if writing: mkdir, encode frame i to <bank>/<i>,
//!   metadata {encoder, bank_config}, publish `persistence.written_bank`,
//!   build a VideoExport request. Returns (images, images[selected_index]).
//! - no images     → bank must be valid; frames 0..num_frames are decoded with
//!   the encoder recorded in metadata (not the cache's current default).
//!
//! selected_index follows negative indexing (-1 = last frame).

use anyhow::{Context, Result};
use log::{debug, info};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

use super::{
    bank_path, fingerprint, is_bank_valid, read_bank_metadata, write_bank_metadata, BankId,
    BankMetadata,
};
use crate::config::PersistConfig;
use crate::encoders::get_encoder;
use crate::error::BankError;
use crate::events::{EventSink, LogSink, VideoExport, EVENT_WRITTEN_BANK, VIDEO_EXPORT_NODE};
use crate::frames::{resolve_index, split_images, stack_frames, Frame, ImageBatch};
use crate::lock::{BankLock, LockMode};
use crate::metrics;
use crate::registry::{CacheRegistry, DEFAULT_CACHE_NAME};

/// Name of the optional input the host must supply when a bank is missing.
pub const IMAGES_INPUT: &str = "images";

/// Key parameters of one process() call.
#[derive(Debug, Clone)]
pub struct BankRequest<'r> {
    pub cache_name: &'r str,
    pub bank_name: &'r str,
    pub bank_id: &'r BankId,
    pub selected_index: i64,
    pub enable_write: bool,
}

impl<'r> BankRequest<'r> {
    /// Default cache, selected_index = -1, writing enabled.
    pub fn new(bank_name: &'r str, bank_id: &'r BankId) -> Self {
        Self {
            cache_name: DEFAULT_CACHE_NAME,
            bank_name,
            bank_id,
            selected_index: -1,
            enable_write: true,
        }
    }

    pub fn with_cache(mut self, cache_name: &'r str) -> Self {
        self.cache_name = cache_name;
        self
    }

    pub fn with_selected_index(mut self, index: i64) -> Self {
        self.selected_index = index;
        self
    }

    pub fn with_write(mut self, on: bool) -> Self {
        self.enable_write = on;
        self
    }
}

#[derive(Debug, Clone)]
pub struct BankOutput {
    /// Full batch (input batch on the write path, decoded batch on read).
    pub images: ImageBatch,
    /// images[selected_index]
    pub selected: Frame,
    /// Deferred video rendering for the host (write path only).
    pub video: Option<VideoExport>,
}

pub struct ImageBank<'a> {
    registry: &'a CacheRegistry,
    config: &'a PersistConfig,
    events: Box<dyn EventSink + 'a>,
}

impl<'a> ImageBank<'a> {
    pub fn new(registry: &'a CacheRegistry, config: &'a PersistConfig) -> Self {
        Self {
            registry,
            config,
            events: Box::new(LogSink),
        }
    }

    /// Replace the notification channel (default: LogSink).
    pub fn with_events<S: EventSink + 'a>(mut self, sink: S) -> Self {
        self.events = Box::new(sink);
        self
    }

    pub fn registry(&self) -> &CacheRegistry {
        self.registry
    }

    pub fn config(&self) -> &PersistConfig {
        self.config
    }

    pub(crate) fn events(&self) -> &dyn EventSink {
        self.events.as_ref()
    }

    /// Resolve the on-disk path of a bank through the registry.
    pub fn bank_path_for(&self, cache_name: &str, bank_name: &str, bank_id: &BankId) -> Result<PathBuf> {
        let root = self.registry.get_cache_root(cache_name)?;
        Ok(bank_path(&root, bank_name, bank_id))
    }

    /// Lazy-evaluation hook: `[]` if the bank is cached, `["images"]` if the
    /// host still has to produce the input images.
    pub fn check_lazy_status(
        &self,
        cache_name: &str,
        bank_name: &str,
        bank_id: &BankId,
    ) -> Result<Vec<&'static str>> {
        let path = self.bank_path_for(cache_name, bank_name, bank_id)?;
        if is_bank_valid(&path) {
            info!("{} images are already cached!", path.display());
            metrics::record_lazy_hit();
            return Ok(Vec::new());
        }
        info!("{} images are NOT already cached!", path.display());
        metrics::record_lazy_miss();
        Ok(vec![IMAGES_INPUT])
    }

    pub fn process(&self, req: &BankRequest<'_>, images: Option<ImageBatch>) -> Result<BankOutput> {
        let path = self.bank_path_for(req.cache_name, req.bank_name, req.bank_id)?;
        match images {
            Some(images) => self.store(req, &path, images),
            None => self.serve(req, &path),
        }
    }

    // ----------------- write path -----------------

    fn store(&self, req: &BankRequest<'_>, path: &Path, images: ImageBatch) -> Result<BankOutput> {
        let mut frames = split_images(&images);
        let selected_idx = resolve_index(req.selected_index, frames.len())?;

        let mut video = None;
        if req.enable_write {
            let encoder_name = self.registry.get_cache_encoder(req.cache_name)?;
            let encoder = get_encoder(&encoder_name)?;

            info!("caching {} ...", path.display());
            fs::create_dir_all(path).with_context(|| format!("create {}", path.display()))?;
            let _lock = self.lock(path, LockMode::Exclusive)?;

            for (idx, frame) in frames.iter().enumerate() {
                encoder
                    .save(frame, &path.join(idx.to_string()))
                    .with_context(|| format!("save frame {} of {}", idx, path.display()))?;
            }

            let metadata = BankMetadata::new(encoder.name(), req.bank_id.bank_config(frames.len()));
            write_bank_metadata(path, &metadata)?;
            metrics::record_bank_written(frames.len());
            debug!(
                "bank {} written: {} frame(s), encoder={}",
                path.display(),
                frames.len(),
                encoder.name()
            );

            video = self.video_export(path, frames.len());

            self.events.publish(
                EVENT_WRITTEN_BANK,
                json!({ "bank_id": fingerprint(req.bank_id) }),
            );
        }

        let selected = frames.swap_remove(selected_idx);
        Ok(BankOutput {
            images,
            selected,
            video,
        })
    }

    fn video_export(&self, path: &Path, num_frames: usize) -> Option<VideoExport> {
        if !self.config.export_video {
            return None;
        }
        Some(VideoExport {
            node: VIDEO_EXPORT_NODE.to_string(),
            codec: self.config.video_codec.clone(),
            fps: self.config.video_fps,
            crf: self.config.video_crf,
            filename_prefix: format!("{}/video", path.display()),
            num_frames,
        })
    }

    // ----------------- read path -----------------

    fn serve(&self, req: &BankRequest<'_>, path: &Path) -> Result<BankOutput> {
        info!("serving {} from cache", path.display());

        let _lock = if path.is_dir() {
            self.lock(path, LockMode::Shared)?
        } else {
            None
        };

        if !is_bank_valid(path) {
            return Err(BankError::BankNotFound(path.to_path_buf()).into());
        }

        let metadata = read_bank_metadata(path)?;
        let num_frames = match metadata.num_frames_value() {
            None => {
                return Err(BankError::corrupt(path, "unable to get num_frames from metadata").into())
            }
            Some(v) => metadata.num_frames().ok_or_else(|| {
                BankError::corrupt(path, format!("num_frames is not a frame count: {}", v))
            })?,
        };

        let encoder_name = metadata
            .encoder
            .as_deref()
            .unwrap_or_else(|| self.registry.default_encoder());
        let encoder = get_encoder(encoder_name)?;

        let selected_idx = resolve_index(req.selected_index, num_frames)?;

        let mut frames = Vec::with_capacity(num_frames);
        for idx in 0..num_frames {
            let frame = encoder
                .load(&path.join(idx.to_string()))
                .with_context(|| format!("load frame {} of {}", idx, path.display()))?;
            frames.push(frame);
        }
        metrics::record_bank_read(num_frames);

        let images = stack_frames(&frames)?;
        let selected = frames.swap_remove(selected_idx);
        Ok(BankOutput {
            images,
            selected,
            video: None,
        })
    }

    /// Advisory lock on the bank directory when `lock_banks` is enabled.
    fn lock(&self, path: &Path, mode: LockMode) -> Result<Option<BankLock>> {
        if !self.config.lock_banks {
            return Ok(None);
        }
        BankLock::acquire_or_wait(path, mode).map(Some)
    }
}

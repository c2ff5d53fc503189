#![allow(non_snake_case)]

//! ImageBank: on-disk image-bank cache.
//!
//! A bank is a directory of encoded frames plus `metadata.json`, addressed by
//! (cache, bank_name, bank_id). Banks are written once and served on later
//! calls instead of recomputing the images.

// Базовые модули
pub mod config;
pub mod error;
pub mod metrics;
pub mod util;

// Кадры и кодеки
pub mod frames;
pub mod encoders; // src/encoders/{mod,raster,tensor}.rs

// Реестр кэшей и банки
pub mod registry;
pub mod bank; // src/bank/{mod,store,stepped}.rs
pub mod events;
pub mod lock;

// Удобные реэкспорты
pub use bank::{
    bank_path, fingerprint, is_bank_valid, list_banks, read_bank_metadata, BankEntry, BankId,
    BankMetadata, BankOutput, BankRequest, ImageBank, SeriesStep, StepOutput, StepRequest,
    SteppedImageBank,
};
pub use config::PersistConfig;
pub use encoders::{get_encoder, ImageEncoder};
pub use error::BankError;
pub use events::{EventSink, LogSink, MemorySink, NullSink, VideoExport};
pub use frames::{Frame, ImageBatch};
pub use registry::CacheRegistry;

//! events: host-facing side channels of the bank engine.
//!
//! - EventSink: fire-and-forget notifications (`persistence.written_bank`,
//!   `persistence.bank_list`). No acknowledgment, errors are not reported back.
//! - VideoExport: description of the derived video the host should render
//!   after the call returns. The engine only builds it, never runs it.

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;

pub const EVENT_WRITTEN_BANK: &str = "persistence.written_bank";
pub const EVENT_BANK_LIST: &str = "persistence.bank_list";

/// Node name the host's graph expansion uses for the video writer.
pub const VIDEO_EXPORT_NODE: &str = "SaveWEBM";

pub trait EventSink {
    fn publish(&self, event: &str, payload: Value);
}

/// Default sink: writes events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn publish(&self, event: &str, payload: Value) {
        info!("event {}: {}", event, payload);
    }
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: &str, _payload: Value) {}
}

/// Keeps events in memory (inspection in tools and tests).
#[derive(Debug, Default)]
pub struct MemorySink {
    events: RefCell<Vec<(String, Value)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, Value)> {
        self.events.borrow().clone()
    }

    pub fn take(&self) -> Vec<(String, Value)> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

impl EventSink for MemorySink {
    fn publish(&self, event: &str, payload: Value) {
        self.events.borrow_mut().push((event.to_string(), payload));
    }
}

impl<T: EventSink + ?Sized> EventSink for &T {
    fn publish(&self, event: &str, payload: Value) {
        (**self).publish(event, payload)
    }
}

/// "Render these frames to a video" request handed to the host.
///
/// The frames are the `images` output of the same call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoExport {
    pub node: String,
    pub codec: String,
    pub fps: f32,
    pub crf: u32,
    pub filename_prefix: String,
    pub num_frames: usize,
}

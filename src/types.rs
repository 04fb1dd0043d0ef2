use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapError {
    #[error("fetch: {0}")]
    Fetch(String),
    #[error("render: {0}")]
    Render(String),
    #[error("timeout after {0} seconds")]
    Timeout(u64),
    #[error("cancelled")]
    Cancelled,
    #[error("slot {serial} out of range for {len} urls")]
    SlotOutOfRange { serial: usize, len: usize },
    #[error("slot {0} already filled")]
    SlotAlreadyFilled(usize),
}

/// One row of the report: everything captured for a single input URL.
///
/// `serial` is 1-based and follows input order. Zero/empty fields mean the
/// corresponding step failed or was skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureResult {
    pub serial: usize,
    pub url: String,
    pub status_code: u16,
    pub content_type: String,
    pub content_length: u64,
    pub screenshot_ref: String,
    pub response_ref: String,
}

impl CaptureResult {
    /// The result of a URL whose fetch never produced a response.
    pub fn empty(serial: usize, url: &str) -> Self {
        CaptureResult {
            serial,
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn fetched(&self) -> bool {
        self.status_code != 0
    }

    pub fn captured(&self) -> bool {
        !self.screenshot_ref.is_empty()
    }
}

/// What the HTTP step hands back to the worker.
#[derive(Debug)]
pub struct FetchedPage {
    pub status: u16,
    pub content_type: String,
    // None when the headers arrived but the body could not be read
    pub body: Option<Vec<u8>>,
}

use crate::frame::extract_frames;
use crate::wire::{classify, Message, ValidationError};

/// Outcome of running one raw line through extraction and classification.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub messages: Vec<Message>,
    pub errors: Vec<ValidationError>,
}

impl IngestReport {
    pub fn frames(&self) -> usize {
        self.messages.len() + self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.errors.is_empty()
    }
}

pub fn ingest_line(line: &str) -> IngestReport {
    let mut report = IngestReport::default();
    for frame in extract_frames(line) {
        match classify(&frame) {
            Ok(message) => report.messages.push(message),
            Err(error) => report.errors.push(error),
        }
    }
    report
}

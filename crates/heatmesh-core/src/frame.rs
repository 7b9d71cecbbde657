use serde_json::Value;
use std::str::CharIndices;

/// One complete JSON value recovered from a raw transport line, with the
/// text it was cut from.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub raw: String,
    pub value: Value,
}

/// Scans one line for JSON object frames. State never carries across lines;
/// a fresh iterator is built per line.
pub fn extract_frames(line: &str) -> FrameIter<'_> {
    FrameIter::new(line)
}

pub struct FrameIter<'a> {
    line: &'a str,
    chars: CharIndices<'a>,
    fast: Option<Frame>,
    depth: u32,
    start: Option<usize>,
    in_string: bool,
    escape_pending: bool,
    done: bool,
}

impl<'a> FrameIter<'a> {
    fn new(line: &'a str) -> Self {
        let trimmed = line.trim();
        let fast = if trimmed.is_empty() {
            None
        } else {
            serde_json::from_str::<Value>(trimmed)
                .ok()
                .map(|value| Frame {
                    raw: trimmed.to_string(),
                    value,
                })
        };
        Self {
            line,
            chars: line.char_indices(),
            fast,
            depth: 0,
            start: None,
            in_string: false,
            escape_pending: false,
            done: false,
        }
    }
}

impl<'a> Iterator for FrameIter<'a> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.done {
            return None;
        }
        if let Some(frame) = self.fast.take() {
            self.done = true;
            return Some(frame);
        }

        for (idx, ch) in self.chars.by_ref() {
            if self.escape_pending {
                self.escape_pending = false;
                continue;
            }
            match ch {
                '\\' => self.escape_pending = true,
                '"' => self.in_string = !self.in_string,
                _ if self.in_string => {}
                '{' => {
                    if self.depth == 0 {
                        self.start = Some(idx);
                    }
                    self.depth += 1;
                }
                '}' => {
                    // A stray closer outside any candidate is noise, not
                    // an underflow.
                    if self.depth == 0 {
                        continue;
                    }
                    self.depth -= 1;
                    if self.depth == 0 {
                        let Some(start) = self.start.take() else {
                            continue;
                        };
                        let candidate = &self.line[start..=idx];
                        // Balanced braces alone do not make a frame; the
                        // candidate must actually parse. Failures are
                        // dropped without disturbing the rest of the line.
                        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                            return Some(Frame {
                                raw: candidate.to_string(),
                                value,
                            });
                        }
                    }
                }
                _ => {}
            }
        }

        self.done = true;
        None
    }
}

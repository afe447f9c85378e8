//! Line framing for the device's text stream.
//!
//! The board prints one submission per line. [`LineFramer`] turns raw reads
//! into complete submissions: bytes are decoded as UTF-8 (a code point split
//! across two reads is finished on the next one), then scanned once for the
//! delimiter. Text before a delimiter is a submission; the delimiter itself is
//! never kept.
//!
//! The literal `READY` (any case, prefix match) is reserved for the board's
//! handshake and never reaches application code. Sketches must not start an
//! ordinary message with it.

/// Default end-of-submission character.
pub const DEFAULT_DELIMITER: char = '\n';

/// Handshake literal the board sends once it is listening.
pub const HANDSHAKE_KEYWORD: &str = "READY";

/// True when `text` starts with the handshake keyword, ignoring case.
pub fn is_handshake(text: &str) -> bool {
    text.get(..HANDSHAKE_KEYWORD.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(HANDSHAKE_KEYWORD))
}

/// A completed submission, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The board announced it is ready for commands.
    Handshake,
    /// Anything else, trailing whitespace already trimmed.
    Message(String),
}

impl Submission {
    pub fn classify(text: String) -> Self {
        if is_handshake(&text) {
            Submission::Handshake
        } else {
            Submission::Message(text)
        }
    }
}

/// Accumulates characters until the delimiter shows up.
#[derive(Debug, Clone)]
pub struct LineFramer {
    delimiter: char,
    buffer: String,
    /// Tail of an incomplete UTF-8 sequence from the previous read.
    pending: Vec<u8>,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new(DEFAULT_DELIMITER)
    }
}

impl LineFramer {
    pub fn new(delimiter: char) -> Self {
        Self {
            delimiter,
            buffer: String::new(),
            pending: Vec::new(),
        }
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Change the delimiter. Any partial submission is discarded.
    pub fn set_delimiter(&mut self, delimiter: char) {
        if delimiter != self.delimiter {
            self.delimiter = delimiter;
            self.reset();
        }
    }

    /// Characters received since the last delimiter.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// Drop everything accumulated so far.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.pending.clear();
    }

    /// Feed raw bytes, returning every submission they complete in order.
    pub fn push_bytes(&mut self, data: &[u8]) -> Vec<String> {
        let text = self.decode(data);
        self.push_str(&text)
    }

    /// Feed already decoded text.
    ///
    /// Submissions that are blank after trimming are dropped; the rest are
    /// returned with trailing whitespace removed.
    pub fn push_str(&mut self, text: &str) -> Vec<String> {
        let mut completed = Vec::new();
        for c in text.chars() {
            if c == self.delimiter {
                let submission = std::mem::take(&mut self.buffer);
                if !submission.trim().is_empty() {
                    completed.push(submission.trim_end().to_string());
                }
            } else {
                self.buffer.push(c);
            }
        }
        completed
    }

    fn decode(&mut self, data: &[u8]) -> String {
        self.pending.extend_from_slice(data);

        let mut text = String::with_capacity(self.pending.len());
        let mut consumed = 0;
        while consumed < self.pending.len() {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(valid) => {
                    text.push_str(valid);
                    consumed = self.pending.len();
                }
                Err(e) => {
                    let valid_up_to = consumed + e.valid_up_to();
                    text.push_str(&String::from_utf8_lossy(
                        &self.pending[consumed..valid_up_to],
                    ));
                    match e.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_up_to + len;
                        }
                        // Incomplete sequence at the end; wait for more bytes.
                        None => {
                            consumed = valid_up_to;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..consumed);
        text
    }
}

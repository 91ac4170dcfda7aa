//! Line-oriented event-stream codec.
//!
//! [`FrameCodec`] implements [`tokio_util::codec::Decoder`], so a response
//! body wrapped in a `StreamReader` and a `FramedRead` becomes a
//! `Stream<Item = Result<Frame<R>, FpbError>>`. `FramedRead` owns the
//! carry-over buffer; the codec only ever consumes complete lines from it,
//! which is what lets a frame straddle any number of reads.

use std::marker::PhantomData;

use bytes::{Buf, BytesMut};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::FpbError;
use crate::frame::Frame;

/// Prefix of the only lines that carry a payload.
pub const DATA_PREFIX: &[u8] = b"data:";

/// Default cap on a single line. A download `result` carries the whole file
/// as base64 on one line.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024 * 1024;

/// Decoder state. `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeState {
    #[default]
    AwaitingFrame,
    Done,
}

/// Turns `data: {json}` lines into [`Frame`]s.
#[derive(Debug)]
pub struct FrameCodec<R> {
    state: DecodeState,
    dropped: u64,
    /// Bytes of the carry-over already known to hold no `\n`.
    next_index: usize,
    max_line_length: usize,
    _result: PhantomData<fn() -> R>,
}

impl<R> FrameCodec<R> {
    pub fn new() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// A codec that rejects lines longer than `max_line_length` bytes.
    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            state: DecodeState::AwaitingFrame,
            dropped: 0,
            next_index: 0,
            max_line_length,
            _result: PhantomData,
        }
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Number of `data:` lines discarded because their JSON did not parse.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl<R> Default for FrameCodec<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: DeserializeOwned> FrameCodec<R> {
    fn too_long(&self, len: usize) -> FpbError {
        FpbError::ProtocolViolation(format!(
            "line of {len} bytes exceeds the {} byte limit",
            self.max_line_length
        ))
    }

    /// Parse one complete line (terminator already removed).
    ///
    /// Returns `None` for framing lines and for malformed payloads.
    fn parse_line(&mut self, line: &[u8]) -> Option<Frame<R>> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let payload = line.strip_prefix(DATA_PREFIX)?.trim_ascii_start();

        match serde_json::from_slice::<Frame<R>>(payload) {
            Ok(frame) => Some(frame),
            Err(e) => {
                self.dropped += 1;
                debug!(
                    "dropping malformed frame ({e}): {}",
                    String::from_utf8_lossy(payload)
                );
                None
            }
        }
    }
}

impl<R: DeserializeOwned> tokio_util::codec::Decoder for FrameCodec<R> {
    type Item = Frame<R>;
    type Error = FpbError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.state == DecodeState::Done {
            src.clear();
            return Ok(None);
        }

        // Consume every complete line until one of them yields a frame; the
        // unterminated tail stays in `src` for the next read and is not
        // rescanned.
        loop {
            let start = self.next_index.min(src.len());
            let Some(offset) = src[start..].iter().position(|b| *b == b'\n') else {
                if src.len() > self.max_line_length {
                    return Err(self.too_long(src.len()));
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let pos = start + offset;
            self.next_index = 0;
            if pos > self.max_line_length {
                return Err(self.too_long(pos));
            }
            let line = src.split_to(pos + 1);
            if let Some(frame) = self.parse_line(&line[..pos]) {
                return Ok(Some(frame));
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.has_remaining() {
            debug!("discarding {} unterminated trailing bytes", src.len());
            src.clear();
        }
        self.next_index = 0;
        self.state = DecodeState::Done;
        Ok(None)
    }
}

// ── Tests ─────────────────────────────────────────────────────────

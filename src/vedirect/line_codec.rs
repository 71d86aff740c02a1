use crate::prelude::*;
use crate::vedirect::{ProtocolLine, LINE_DELIMITER};

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024;

/// Splits a raw VE.Direct byte stream on `\r\n`.
///
/// Each emitted line keeps the delimiter bytes it consumed so the frame
/// accumulator can checksum the exact wire bytes.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_line_length: usize,
    discarded: u64,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl LineCodec {
    pub fn new(max_line_length: usize) -> Self {
        Self {
            max_line_length,
            discarded: 0,
        }
    }

    /// Number of bytes dropped because no delimiter arrived in time.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    fn find_delimiter(src: &[u8]) -> Option<usize> {
        src.windows(LINE_DELIMITER.len())
            .position(|window| window == LINE_DELIMITER)
    }
}

impl Decoder for LineCodec {
    type Item = ProtocolLine;
    type Error = anyhow::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ProtocolLine>> {
        match Self::find_delimiter(src) {
            Some(pos) => {
                let content = src.split_to(pos).freeze();
                let delimiter = src.split_to(LINE_DELIMITER.len()).freeze();
                Ok(Some(ProtocolLine::with_delimiter(content, delimiter)))
            }
            None => {
                if src.len() > self.max_line_length {
                    // keep a trailing '\r' in case its '\n' is still in flight
                    let keep = usize::from(src.last() == Some(&LINE_DELIMITER[0]));
                    let dropped = src.len() - keep;
                    warn!(
                        "no line delimiter within {} bytes, discarding {} bytes",
                        self.max_line_length, dropped
                    );
                    src.advance(dropped);
                    self.discarded += dropped as u64;
                }
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<ProtocolLine>> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None => {
                if !src.is_empty() {
                    debug!("dropping {} bytes of unterminated line at end of stream", src.len());
                    self.discarded += src.len() as u64;
                    src.clear();
                }
                Ok(None)
            }
        }
    }
}

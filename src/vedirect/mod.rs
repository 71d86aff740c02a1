//! VE.Direct text protocol: line framing and checksum-validated frames.
//!
//! On the wire a frame is a run of `\r\n<label>\t<value>` fields closed by a
//! `Checksum` field whose single value byte makes every byte of the frame sum
//! to zero modulo 256.

pub mod frame;
pub mod line_codec;

pub use frame::{AccumulatorResult, FieldEntry, Frame, FrameAccumulator, ProtocolLine};
pub use line_codec::LineCodec;

/// Label of the field that terminates a frame.
pub const CHECKSUM_LABEL: &str = "Checksum";

/// Label carrying the device serial number.
pub const SERIAL_NUMBER_LABEL: &str = "SER#";

/// Delimiter between fields on the wire.
pub const LINE_DELIMITER: [u8; 2] = [0x0d, 0x0a];

/// Separator between a field's label and its value.
pub const FIELD_SEPARATOR: u8 = b'\t';

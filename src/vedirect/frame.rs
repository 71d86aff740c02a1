use crate::error::VeDirectError;
use crate::vedirect::{CHECKSUM_LABEL, FIELD_SEPARATOR, LINE_DELIMITER};

use bytes::{BufMut, Bytes, BytesMut};

// ProtocolLine {{{
/// One line as delivered by the line framer.
///
/// `delimiter` holds the raw bytes the framer stripped along with this line.
/// They belong to the checksum domain even though they are not content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolLine {
    content: Bytes,
    delimiter: Bytes,
}

impl ProtocolLine {
    pub fn new(content: impl Into<Bytes>) -> Self {
        Self::with_delimiter(content, Bytes::from_static(b"\r\n"))
    }

    pub fn with_delimiter(content: impl Into<Bytes>, delimiter: impl Into<Bytes>) -> Self {
        Self {
            content: content.into(),
            delimiter: delimiter.into(),
        }
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }

    /// Modulo-256 sum of every raw byte of this line, delimiter included.
    pub fn byte_sum(&self) -> u8 {
        self.content
            .iter()
            .chain(self.delimiter.iter())
            .fold(0u8, |acc, b| acc.wrapping_add(*b))
    }
} // }}}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldEntry {
    pub label: String,
    pub value: String,
}

impl FieldEntry {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

// Frame {{{
/// A checksum-validated set of fields. The checksum field itself is kept
/// apart from `fields` and never surfaces as device data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    fields: Vec<FieldEntry>,
    checksum: u8,
}

impl Frame {
    pub fn from_fields<L, V>(fields: impl IntoIterator<Item = (L, V)>) -> Self
    where
        L: Into<String>,
        V: Into<String>,
    {
        let mut frame = Self::default();
        for (label, value) in fields {
            frame.insert(FieldEntry::new(label, value));
        }
        frame
    }

    pub fn fields(&self) -> &[FieldEntry] {
        &self.fields
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.label == label)
            .map(|f| f.value.as_str())
    }

    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    // a repeated label keeps the position of its first occurrence
    fn insert(&mut self, entry: FieldEntry) {
        match self.fields.iter_mut().find(|f| f.label == entry.label) {
            Some(existing) => existing.value = entry.value,
            None => self.fields.push(entry),
        }
    }

    /// Wire representation as a device would send it, checksum recomputed.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        for field in &self.fields {
            buf.put_slice(&LINE_DELIMITER);
            buf.put_slice(field.label.as_bytes());
            buf.put_u8(FIELD_SEPARATOR);
            buf.put_slice(field.value.as_bytes());
        }
        buf.put_slice(&LINE_DELIMITER);
        buf.put_slice(CHECKSUM_LABEL.as_bytes());
        buf.put_u8(FIELD_SEPARATOR);

        let sum = buf.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        buf.put_u8(0u8.wrapping_sub(sum));

        buf.freeze()
    }
} // }}}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccumulatorResult {
    Incomplete,
    Complete(Frame),
    Invalid(VeDirectError),
}

// FrameAccumulator {{{
/// Assembles lines from a single stream into frames.
///
/// Never share one accumulator between streams: the running checksum would
/// mix bytes from different devices.
#[derive(Debug, Default)]
pub struct FrameAccumulator {
    frame: Frame,
    sum: u8,
    in_progress: bool,
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress
    }

    /// Discards any partially assembled frame.
    pub fn reset(&mut self) {
        self.frame = Frame::default();
        self.sum = 0;
        self.in_progress = false;
    }

    pub fn accept(&mut self, line: &ProtocolLine) -> AccumulatorResult {
        let content = line.content();

        if !self.in_progress && content.is_empty() {
            return AccumulatorResult::Incomplete;
        }

        let separator = match content.iter().position(|b| *b == FIELD_SEPARATOR) {
            Some(pos) => pos,
            None => {
                self.reset();
                return AccumulatorResult::Invalid(VeDirectError::MalformedLine);
            }
        };

        self.in_progress = true;
        self.sum = self.sum.wrapping_add(line.byte_sum());

        let label = &content[..separator];
        let value = &content[separator + 1..];

        if label == CHECKSUM_LABEL.as_bytes() {
            return self.finish(value, line.delimiter());
        }

        self.frame.insert(FieldEntry::new(
            String::from_utf8_lossy(label),
            String::from_utf8_lossy(value),
        ));

        AccumulatorResult::Incomplete
    }

    fn finish(&mut self, value: &[u8], delimiter: &[u8]) -> AccumulatorResult {
        // a checksum byte equal to a delimiter byte may have been captured
        // by the framer instead of being left in the content
        let checksum = value.first().or_else(|| delimiter.first()).copied().unwrap_or(0);
        let sum = self.sum;
        let mut frame = std::mem::take(&mut self.frame);
        self.reset();

        if sum != 0 {
            return AccumulatorResult::Invalid(VeDirectError::ChecksumMismatch { sum });
        }

        frame.checksum = checksum;
        AccumulatorResult::Complete(frame)
    }
} // }}}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines_for(fields: &[(&str, &str)]) -> Vec<ProtocolLine> {
        let mut lines: Vec<ProtocolLine> = fields
            .iter()
            .map(|(label, value)| ProtocolLine::new(format!("{}\t{}", label, value).into_bytes()))
            .collect();

        let sum = lines.iter().fold(0u8, |acc, l| acc.wrapping_add(l.byte_sum()));
        let partial = ProtocolLine::new(&b"Checksum\t"[..]);
        let checksum = 0u8.wrapping_sub(sum.wrapping_add(partial.byte_sum()));

        let mut content = b"Checksum\t".to_vec();
        content.push(checksum);
        lines.push(ProtocolLine::new(content));
        lines
    }

    fn feed(acc: &mut FrameAccumulator, lines: &[ProtocolLine]) -> Vec<AccumulatorResult> {
        lines.iter().map(|l| acc.accept(l)).collect()
    }

    #[test]
    fn completes_valid_frame() {
        let mut acc = FrameAccumulator::new();
        let results = feed(&mut acc, &lines_for(&[("SER#", "HQ1234"), ("SOC", "87")]));

        assert_eq!(results[0], AccumulatorResult::Incomplete);
        assert_eq!(results[1], AccumulatorResult::Incomplete);
        match &results[2] {
            AccumulatorResult::Complete(frame) => {
                assert_eq!(frame.get("SER#"), Some("HQ1234"));
                assert_eq!(frame.get("SOC"), Some("87"));
                assert_eq!(frame.get("Checksum"), None);
                assert_eq!(frame.len(), 2);
            }
            other => panic!("expected complete frame, got {:?}", other),
        }
        assert!(!acc.is_in_progress());
    }

    #[test]
    fn rejects_bad_checksum() {
        let mut lines = lines_for(&[("V", "12800"), ("I", "-120")]);
        lines[0] = ProtocolLine::new(&b"V\t12801"[..]);

        let mut acc = FrameAccumulator::new();
        let results = feed(&mut acc, &lines);

        assert!(matches!(
            results.last(),
            Some(AccumulatorResult::Invalid(VeDirectError::ChecksumMismatch { .. }))
        ));
        assert!(!acc.is_in_progress());
    }

    #[test]
    fn malformed_line_discards_frame_in_progress() {
        let mut acc = FrameAccumulator::new();
        assert_eq!(acc.accept(&ProtocolLine::new(&b"V\t12800"[..])), AccumulatorResult::Incomplete);
        assert_eq!(
            acc.accept(&ProtocolLine::new(&b"garbage"[..])),
            AccumulatorResult::Invalid(VeDirectError::MalformedLine)
        );
        assert!(!acc.is_in_progress());

        // next frame decodes cleanly
        let results = feed(&mut acc, &lines_for(&[("SOC", "900")]));
        assert!(matches!(results.last(), Some(AccumulatorResult::Complete(_))));
    }

    #[test]
    fn leading_empty_line_is_ignored() {
        let mut acc = FrameAccumulator::new();
        assert_eq!(acc.accept(&ProtocolLine::new(Bytes::new())), AccumulatorResult::Incomplete);
        assert!(!acc.is_in_progress());

        let results = feed(&mut acc, &lines_for(&[("PID", "0xA053")]));
        assert!(matches!(results.last(), Some(AccumulatorResult::Complete(_))));
    }

    #[test]
    fn duplicate_label_keeps_position_and_counts_both() {
        let mut acc = FrameAccumulator::new();
        let results = feed(&mut acc, &lines_for(&[("V", "1"), ("I", "2"), ("V", "3")]));

        match results.last() {
            Some(AccumulatorResult::Complete(frame)) => {
                let labels: Vec<_> = frame.fields().iter().map(|f| f.label.as_str()).collect();
                assert_eq!(labels, vec!["V", "I"]);
                assert_eq!(frame.get("V"), Some("3"));
            }
            other => panic!("expected complete frame, got {:?}", other),
        }
    }

    #[test]
    fn any_single_bit_flip_never_completes() {
        let original = lines_for(&[("SER#", "HQ1234"), ("SOC", "87"), ("V", "12650")]);
        let checksum_line = original.len() - 1;

        for (line_idx, line) in original.iter().enumerate() {
            let mut raw = line.content().to_vec();
            let content_len = raw.len();
            raw.extend_from_slice(line.delimiter());

            for byte_idx in 0..raw.len() {
                for bit in 0..8 {
                    let mut flipped = raw.clone();
                    flipped[byte_idx] ^= 1 << bit;

                    let mut lines = original.clone();
                    lines[line_idx] = ProtocolLine::with_delimiter(
                        flipped[..content_len].to_vec(),
                        flipped[content_len..].to_vec(),
                    );

                    let mut acc = FrameAccumulator::new();
                    let results = feed(&mut acc, &lines);

                    assert!(
                        !results.iter().any(|r| matches!(r, AccumulatorResult::Complete(_))),
                        "line {} byte {} bit {} still completed",
                        line_idx,
                        byte_idx,
                        bit
                    );

                    let in_checksum_label =
                        line_idx == checksum_line && byte_idx < CHECKSUM_LABEL.len();
                    if !in_checksum_label {
                        assert!(
                            results.iter().any(|r| matches!(r, AccumulatorResult::Invalid(_))),
                            "line {} byte {} bit {} not reported invalid",
                            line_idx,
                            byte_idx,
                            bit
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn checksum_byte_matching_delimiter_bytes() {
        for target in [0x0du8, 0x0a] {
            // 'A' is odd, so some padding length hits every checksum value
            let lines = (0..256)
                .map(|n| {
                    let value = "A".repeat(n);
                    lines_for(&[("SER#", "HQ1234"), ("H1", value.as_str())])
                })
                .find(|lines| lines.last().and_then(|l| l.content().last()) == Some(&target))
                .expect("padding covers every checksum value");

            let mut acc = FrameAccumulator::new();
            let results = feed(&mut acc, &lines);
            match results.last() {
                Some(AccumulatorResult::Complete(frame)) => assert_eq!(frame.checksum(), target),
                other => panic!("expected complete frame, got {:?}", other),
            }
        }
    }

    #[test]
    fn checksum_byte_captured_into_delimiter() {
        let mut lines = lines_for(&[("SOC", "87")]);
        let last = lines.pop().unwrap();
        let checksum = *last.content().last().unwrap();

        let mut delimiter = vec![checksum];
        delimiter.extend_from_slice(&LINE_DELIMITER);
        lines.push(ProtocolLine::with_delimiter(&b"Checksum\t"[..], delimiter));

        let mut acc = FrameAccumulator::new();
        let results = feed(&mut acc, &lines);
        match results.last() {
            Some(AccumulatorResult::Complete(frame)) => assert_eq!(frame.checksum(), checksum),
            other => panic!("expected complete frame, got {:?}", other),
        }
    }

    #[test]
    fn encode_produces_zero_sum() {
        let frame = Frame::from_fields([("PID", "0xA053"), ("V", "13250")]);
        let wire = frame.encode();

        assert!(wire.starts_with(b"\r\nPID\t0xA053\r\nV\t13250\r\nChecksum\t"));
        assert_eq!(wire.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)), 0);
    }
}

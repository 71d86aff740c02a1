use crate::prelude::*;

use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct FrameStats {
    pub lines_received: u64,
    pub lines_dropped: u64,
    pub frames_complete: u64,
    pub frames_invalid: u64,
    pub malformed_lines: u64,
    pub checksum_mismatches: u64,
    pub unknown_stream_lines: u64,
    // per device key
    pub merges: HashMap<DeviceKey, u64>,
    pub stream_disconnections: u64,
}

impl FrameStats {
    pub fn record_invalid(&mut self, reason: &VeDirectError) {
        self.frames_invalid += 1;
        match reason {
            VeDirectError::MalformedLine => self.malformed_lines += 1,
            VeDirectError::ChecksumMismatch { .. } => self.checksum_mismatches += 1,
            _ => {}
        }
    }

    pub fn record_merge(&mut self, key: &DeviceKey) {
        self.frames_complete += 1;
        *self.merges.entry(key.clone()).or_insert(0) += 1;
    }

    pub fn print_summary(&self) {
        info!("Frame Statistics:");
        info!("  Lines received: {}", self.lines_received);
        info!("  Lines dropped (channel lag): {}", self.lines_dropped);
        info!("  Lines for unknown streams: {}", self.unknown_stream_lines);
        info!("  Complete frames: {}", self.frames_complete);
        info!("  Invalid frames: {}", self.frames_invalid);
        info!("    Malformed lines: {}", self.malformed_lines);
        info!("    Checksum mismatches: {}", self.checksum_mismatches);
        info!("  Stream disconnections: {}", self.stream_disconnections);
        info!("  Merges by device:");
        let mut merges: Vec<_> = self.merges.iter().collect();
        merges.sort();
        for (key, count) in merges {
            info!("    {}: {}", key, count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_invalid_by_reason() {
        let mut stats = FrameStats::default();
        stats.record_invalid(&VeDirectError::MalformedLine);
        stats.record_invalid(&VeDirectError::ChecksumMismatch { sum: 3 });
        stats.record_invalid(&VeDirectError::ChecksumMismatch { sum: 9 });

        assert_eq!(stats.frames_invalid, 3);
        assert_eq!(stats.malformed_lines, 1);
        assert_eq!(stats.checksum_mismatches, 2);
    }

    #[test]
    fn counts_merges_per_device() {
        let mut stats = FrameStats::default();
        let a = DeviceKey::new("A").unwrap();
        let b = DeviceKey::new("B").unwrap();
        stats.record_merge(&a);
        stats.record_merge(&a);
        stats.record_merge(&b);

        assert_eq!(stats.frames_complete, 3);
        assert_eq!(stats.merges[&a], 2);
        assert_eq!(stats.merges[&b], 1);
    }
}

use crate::multiplexer::StreamHandle;

/// Errors raised while decoding and routing VE.Direct frames.
///
/// None of these are fatal: the multiplexer recovers from each of them per
/// frame or per stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VeDirectError {
    /// Line lacks the label/value separator.
    #[error("malformed line: no label/value separator")]
    MalformedLine,

    /// Frame bytes did not sum to zero modulo 256.
    #[error("checksum mismatch (frame sums to {sum:#04x})")]
    ChecksumMismatch { sum: u8 },

    /// No device key could be derived. `resolve` always falls back to a
    /// synthesized key, so this is only produced by `DeviceKey::new("")`.
    #[error("unresolvable stream: empty device key")]
    UnresolvableStream,

    #[error("unknown stream {0}")]
    UnknownStream(StreamHandle),
}

/// Creates an anyhow error with the current file and line number
#[macro_export]
macro_rules! file_error {
    ($($arg:tt)*) => {
        anyhow::anyhow!(
            "[{}:{}] {}",
            std::path::Path::new(file!()).file_name().unwrap_or_default().to_string_lossy(),
            line!(),
            format!($($arg)*)
        )
    };
}

/// Creates an anyhow error with the current file and line number, and includes a source error
#[macro_export]
macro_rules! file_error_with_source {
    ($source:expr, $($arg:tt)*) => {
        anyhow::anyhow!(
            "[{}:{}] {}: {}",
            std::path::Path::new(file!()).file_name().unwrap_or_default().to_string_lossy(),
            line!(),
            format!($($arg)*),
            $source
        )
    };
}

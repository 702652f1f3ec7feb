use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("address {0} exceeds the 48-bit field")]
    AddressOverflow(u64),

    #[error("payload of {0} bytes exceeds the 16-bit length field")]
    PayloadOverflow(usize),

    #[error("invalid 5-bit codeword {bits:#07b} at bit offset {offset}")]
    InvalidCodeword { offset: usize, bits: u8 },

    #[error("truncated frame: {field} needs {needed} bits, {available} available")]
    TruncatedFrame {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("checksum mismatch: frame carries {expected:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { expected: u32, computed: u32 },

    #[error("payload is not valid text: {0}")]
    PayloadNotText(#[from] std::string::FromUtf8Error),

    #[error("analysis window has {got} samples, expected {expected}")]
    InvalidWindow { expected: usize, got: usize },

    #[error("FFT error: {0}")]
    Fft(String),

    #[error("no carrier tone detected before the input ended")]
    NoCarrier,

    #[error("audio stream error: {0}")]
    Stream(String),
}

pub type Result<T> = std::result::Result<T, LinkError>;

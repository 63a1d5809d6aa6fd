/// Reasons a request frame could not be turned into a [`crate::Request`].
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum FrameError {
    /// Fewer bytes were supplied than the function code requires.
    Incomplete,
    /// An unsupported function code (only 0x03/0x04/0x06/0x10 decode).
    UnknownFunction(u8),
    /// Register count or byte-count field outside the allowed range.
    IllegalDataValue,
}

impl std::error::Error for FrameError {}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FrameError::Incomplete => write!(f, "frame is shorter than its function code requires"),
            FrameError::UnknownFunction(fc) => write!(f, "unsupported function code 0x{:02x}", fc),
            FrameError::IllegalDataValue => write!(f, "illegal data value"),
        }
    }
}

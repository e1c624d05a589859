use rasterpack_codecs::CodecError;

/// All failures surfaced by the engine.
///
/// Operations never retry and never do partial best-effort work: a failed
/// call leaves the affected container in its pre-call state, except for a
/// failed write-back during iteration, which poisons the iterator (further
/// operations return [`Error::InvalidState`]).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The codec layer rejected a compress/decompress, or chunk bytes do not
    /// parse as a valid chunk.
    #[error("codec failure: {0}")]
    Codec(#[from] CodecError),

    /// A buffer length is inconsistent with the declared dimensions.
    #[error("size mismatch for {what}: expected {expected}, got {got}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// A chunk or channel index is out of range, or an iterator was advanced
    /// past the end.
    #[error("index {index} out of range for {len} {what}")]
    IndexOutOfRange {
        index: usize,
        len: usize,
        what: &'static str,
    },

    /// A channel name lookup failed.
    #[error("unknown channel '{0}'")]
    UnknownChannel(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation was attempted on a poisoned or uninitialised object.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// The external source cannot be consumed (tiled layout, unknown element
    /// type, missing subimage).
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// An external source failed to open or read.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
